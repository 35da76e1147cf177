// ABOUTME: OAuth 2.0 data models for the authorization-code grant flow
// ABOUTME: Domain records, wire request/response structures, and the protocol error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Domain records
// ============================================================================

/// A registered OAuth 2.0 client application ("consumer")
#[derive(Debug, Clone)]
pub struct Consumer {
    /// Unique client identifier
    pub client_id: String,
    /// Argon2id hash of the client secret; the secret itself is write-once
    /// at registration and never stored in the clear
    pub secret_hash: String,
    /// Registered redirect URIs for the authorization-code flow
    pub redirect_uris: Vec<String>,
    /// Scopes this consumer may be granted; used as the default set when a
    /// request omits `scope`
    pub default_scopes: Vec<String>,
    /// Human-readable description shown on the consent screen
    pub description: Option<String>,
    /// When this consumer was registered
    pub created_at: DateTime<Utc>,
}

/// Transient state bridging the authorization request and the consent step.
///
/// Created when a client initiates an authorization request; claimed (read
/// once, then promoted to an [`AuthorizationCode`] or discarded) when the
/// user completes consent.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Unique identifier for this in-flight request
    pub id: String,
    /// Client that initiated the request
    pub client_id: String,
    /// Validated redirect target
    pub redirect_uri: String,
    /// Response type ("code")
    pub response_type: String,
    /// Scopes resolved during validation, to present to the user
    pub requested_scopes: Vec<String>,
    /// Opaque client-supplied state, echoed back on the redirect
    pub state: Option<String>,
    /// When this request was stored
    pub created_at: DateTime<Utc>,
}

/// Single-use, time-boxed authorization code bound to a client, redirect
/// target, scope set, and user
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// High-entropy code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI that must match during token exchange
    pub redirect_uri: String,
    /// Scopes granted at consent time
    pub scopes: Vec<String>,
    /// User who approved the grant; opaque identifier from the external
    /// identity layer
    pub user_id: String,
    /// When this code expires
    pub expires_at: DateTime<Utc>,
    /// Flips to true atomically on first successful exchange
    pub consumed: bool,
}

/// Issued access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Opaque token value
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// User the token is bound to
    pub user_id: String,
    /// Granted scopes; exactly those on the exchanged code
    pub scopes: Vec<String>,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// When this token was created
    pub created_at: DateTime<Utc>,
}

/// Issued refresh token
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// Opaque token value
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// User the token is bound to
    pub user_id: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// When this token was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Consumer registry wire types
// ============================================================================

/// Consumer registration request
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerRegistration {
    /// Client identifier to register under; generated when omitted
    pub client_id: Option<String>,
    /// Redirect URIs for the authorization-code flow
    pub redirect_uris: Vec<String>,
    /// Scopes the consumer may be granted
    pub default_scopes: Vec<String>,
    /// Human-readable description
    pub description: Option<String>,
}

/// Consumer registration response; the only place the plaintext secret
/// ever appears
#[derive(Debug, Serialize)]
pub struct ConsumerCredentials {
    /// Registered client identifier
    pub client_id: String,
    /// Generated client secret, returned exactly once
    pub secret: String,
}

/// Partial consumer update. A `secret` field is accepted on the wire so the
/// immutability rule can be enforced with a clear error instead of a silent
/// drop; any update carrying one is rejected before persistence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerUpdate {
    /// Replacement redirect URIs
    pub redirect_uris: Option<Vec<String>>,
    /// Replacement default scopes
    pub default_scopes: Option<Vec<String>>,
    /// Replacement description
    pub description: Option<String>,
    /// Always rejected; consumer secrets are immutable after creation
    pub secret: Option<String>,
}

// ============================================================================
// Authorization endpoint wire types
// ============================================================================

/// OAuth 2.0 authorization request (phase 1, `GET /authorize`).
///
/// All fields are optional on the wire so that absence surfaces as a named
/// `invalid_request` instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    /// Response type; only "code" is supported
    pub response_type: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI; must exactly match a registered URI when supplied
    pub redirect_uri: Option<String>,
    /// Space-separated requested scopes
    pub scope: Option<String>,
    /// Opaque client state for CSRF protection, echoed verbatim
    pub state: Option<String>,
}

/// Authorization context produced by a successful validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAuthorization {
    /// Validated client identifier
    pub client_id: String,
    /// Resolved redirect target
    pub redirect_uri: String,
    /// Response type ("code")
    pub response_type: String,
    /// Resolved scope set, never empty
    pub scopes: Vec<String>,
    /// Client-supplied state
    pub state: Option<String>,
}

/// Payload for the consent screen, returned when an authorization request
/// has been validated and stored
#[derive(Debug, Serialize)]
pub struct AuthorizationPrompt {
    /// Handle the consent step passes back to claim the pending request
    pub pending_id: String,
    /// Requesting client
    pub client_id: String,
    /// Consumer description for display
    pub description: Option<String>,
    /// Scopes the user is asked to approve
    pub requested_scopes: Vec<String>,
    /// Where the user will be redirected after consent
    pub redirect_uri: String,
    /// Client-supplied state
    pub state: Option<String>,
}

/// User decision on the consent screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    /// Grant the requested scopes
    #[default]
    Approve,
    /// Decline the request
    Deny,
}

/// Consent completion request (phase 2, `POST /authorize`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsentRequest {
    /// Client whose pending authorization is being completed
    pub client_id: Option<String>,
    /// Identity of the consenting user, supplied by the external
    /// authentication layer
    pub user_id: Option<String>,
    /// Scopes the user granted
    pub scopes: Option<Vec<String>>,
    /// Pending-authorization handle; required under the per-request keying
    /// policy, ignored otherwise
    pub pending_id: Option<String>,
    /// Approve or deny
    #[serde(default)]
    pub decision: ConsentDecision,
}

/// Redirect produced by the consent step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentRedirect {
    /// Value for the `Location` header
    pub location: String,
    /// Suggested HTTP status (302)
    pub status: u16,
}

// ============================================================================
// Token endpoint wire types
// ============================================================================

/// OAuth 2.0 token request (`POST /token`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Grant type; only `authorization_code` is supported
    pub grant_type: Option<String>,
    /// Authorization code being exchanged
    pub code: Option<String>,
    /// Redirect URI the code was issued for
    pub redirect_uri: Option<String>,
    /// Client identifier, when not using HTTP Basic authentication
    pub client_id: Option<String>,
    /// Client secret, when not using HTTP Basic authentication
    pub client_secret: Option<String>,
}

/// OAuth 2.0 token response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Opaque access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
    /// Granted scopes; exactly those bound to the exchanged code
    pub scopes: Vec<String>,
    /// Refresh token, when issuance is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Headers the web layer should attach to a token response to keep
    /// token material out of caches (RFC 6749 Section 5.1)
    #[must_use]
    pub const fn recommended_headers() -> [(&'static str, &'static str); 3] {
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
        ]
    }
}

// ============================================================================
// Protocol errors
// ============================================================================

/// OAuth 2.0 protocol error response (`{error, error_description}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuth2Error {
    /// Error code from the RFC 6749 taxonomy
    pub error: String,
    /// Human-readable description; never carries secret material
    pub error_description: Option<String>,
    /// URI with further error information
    pub error_uri: Option<String>,
    /// Seconds the caller should wait before retrying, set on throttling
    /// errors; belongs in a `Retry-After` header, not the response body
    #[serde(skip_serializing)]
    pub retry_after_seconds: Option<u64>,
}

impl OAuth2Error {
    fn new(error: &str, description: Option<String>, rfc_section: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: description,
            error_uri: Some(format!(
                "https://datatracker.ietf.org/doc/html/rfc6749#{rfc_section}"
            )),
            retry_after_seconds: None,
        }
    }

    /// Attach a `Retry-After` hint in seconds
    #[must_use]
    pub const fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new(
            "invalid_request",
            Some(description.to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Create an `invalid_request` error naming the missing attribute and
    /// the request it was expected in
    #[must_use]
    pub fn missing_attribute(attribute: &str, target: &str) -> Self {
        Self::invalid_request(&format!(
            "Missing required attribute '{attribute}' in {target} request"
        ))
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            "invalid_client",
            Some("Client authentication failed".to_owned()),
            "section-5.2",
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", Some(description.to_owned()), "section-5.2")
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new(
            "unauthorized_client",
            Some(description.to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(
            "unsupported_response_type",
            Some("Only 'code' response_type is supported".to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            Some("Only 'authorization_code' grant_type is supported".to_owned()),
            "section-5.2",
        )
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new(
            "invalid_scope",
            Some(description.to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Create an `access_denied` error (user declined consent)
    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(
            "access_denied",
            Some("The resource owner denied the request".to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Create a `server_error` for unexpected backend failure
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self::new("server_error", Some(description.to_owned()), "section-4.1.2.1")
    }

    /// Create a `temporarily_unavailable` error
    #[must_use]
    pub fn temporarily_unavailable(description: &str) -> Self {
        Self::new(
            "temporarily_unavailable",
            Some(description.to_owned()),
            "section-4.1.2.1",
        )
    }

    /// Build the redirect target delivering this error as `error` /
    /// `error_description` query parameters, with the client state echoed.
    /// Only ever called with a redirect URI that validation has confirmed.
    #[must_use]
    pub fn redirect_location(&self, redirect_uri: &str, state: Option<&str>) -> String {
        let mut location = format!("{redirect_uri}?error={}", urlencoding::encode(&self.error));
        if let Some(description) = &self.error_description {
            location.push_str(&format!(
                "&error_description={}",
                urlencoding::encode(description)
            ));
        }
        if let Some(state) = state {
            location.push_str(&format!("&state={}", urlencoding::encode(state)));
        }
        location
    }

    /// HTTP status suggested for this error: 401 for failed client
    /// authentication, 5xx for backend trouble, 400 otherwise
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.error.as_str() {
            "invalid_client" => 401,
            "server_error" => 500,
            "temporarily_unavailable" => 503,
            _ => 400,
        }
    }
}

/// Rejection of an authorization-phase request.
///
/// Validation failures discovered before the redirect target has been
/// confirmed legitimate must never be delivered via redirect; once confirmed,
/// protocol errors are delivered as `error`/`error_description` query
/// parameters on that redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRejection {
    /// The protocol error
    pub error: OAuth2Error,
    /// Pre-built redirect target carrying the error, present only when the
    /// redirect URI was validated before the failure
    pub redirect: Option<String>,
}

impl AuthorizeRejection {
    /// Rejection rendered directly as an error page, never a redirect
    #[must_use]
    pub const fn direct(error: OAuth2Error) -> Self {
        Self {
            error,
            redirect: None,
        }
    }

    /// Rejection delivered to a validated redirect target
    #[must_use]
    pub fn redirect_to(redirect_uri: &str, error: OAuth2Error, state: Option<&str>) -> Self {
        let location = error.redirect_location(redirect_uri, state);
        Self {
            error,
            redirect: Some(location),
        }
    }
}
