// ABOUTME: Typestate model of the authorization-code grant state machine
// ABOUTME: Invalid grant-flow transitions become compile errors, not runtime errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::marker::PhantomData;

use chrono::{DateTime, Duration, Utc};

use super::models::{AuthorizationPrompt, ConsentRedirect, OAuth2Error, TokenResponse};

// ============================================================================
// State marker types
// ============================================================================

/// Initial state: the authorization request has been submitted but not yet
/// validated.
/// Valid transitions: -> `PendingConsent`
#[derive(Debug)]
pub struct Requested;

/// The request was validated and stored; the user is being asked to consent.
/// Valid transitions: -> `CodeIssued` (approval), -> `Denied` (refusal)
#[derive(Debug)]
pub struct PendingConsent {
    /// Handle for the stored pending authorization
    pub pending_id: String,
    /// Scopes presented to the user
    pub requested_scopes: Vec<String>,
    /// Client-supplied state
    pub state: Option<String>,
}

/// An authorization code has been issued and delivered via redirect.
/// Valid transitions: -> `Exchanged` (single successful token exchange)
#[derive(Debug)]
pub struct CodeIssued {
    /// The issued authorization code
    pub code: String,
    /// When the code expires
    pub expires_at: DateTime<Utc>,
    /// Client-supplied state echoed on the redirect
    pub state: Option<String>,
}

/// Terminal state: the code was exchanged for tokens. A code is exchanged at
/// most once; this state is never re-entered.
#[derive(Debug)]
pub struct Exchanged {
    /// Issued access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Refresh token, when issued
    pub refresh_token: Option<String>,
}

/// Terminal state: the user declined consent.
#[derive(Debug)]
pub struct Denied {
    /// The `access_denied` protocol error
    pub error: OAuth2Error,
}

// ============================================================================
// Grant flow with typestate
// ============================================================================

/// Authorization-code grant flow with compile-time state enforcement.
///
/// The grant spans two independent HTTP exchanges with no in-process
/// continuation; this type models the legal orderings so that, for example,
/// exchanging a code before consent is a compile error rather than a runtime
/// bug.
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use oauth2_grant_server::oauth2_server::flow::{GrantFlow, Requested};
/// use oauth2_grant_server::oauth2_server::models::TokenResponse;
///
/// # fn example() -> Result<(), oauth2_grant_server::oauth2_server::models::OAuth2Error> {
/// let flow = GrantFlow::<Requested>::new("foo", "https://foo.com/cb");
/// let pending = flow.submitted("handle-1", vec!["profile".to_owned()], Some("xyz".to_owned()));
/// let issued = pending.with_user("u1").approved("code-value", Duration::seconds(600));
///
/// let response = TokenResponse {
///     access_token: "access".to_owned(),
///     token_type: "Bearer".to_owned(),
///     expires_in: 3600,
///     scopes: vec!["profile".to_owned()],
///     refresh_token: None,
/// };
/// let exchanged = issued.exchanged(response)?;
/// assert_eq!(exchanged.access_token(), "access");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GrantFlow<State> {
    /// Client identifier
    client_id: String,
    /// Validated redirect target
    redirect_uri: String,
    /// Consenting user, set during the consent phase
    user_id: Option<String>,
    /// Current state data
    state: State,
    _marker: PhantomData<State>,
}

impl GrantFlow<Requested> {
    /// Start a grant flow for a client and redirect target
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            user_id: None,
            state: Requested,
            _marker: PhantomData,
        }
    }

    /// Transition to `PendingConsent` once the authorization request has
    /// been validated and stored
    #[must_use]
    pub fn submitted(
        self,
        pending_id: impl Into<String>,
        requested_scopes: Vec<String>,
        state: Option<String>,
    ) -> GrantFlow<PendingConsent> {
        GrantFlow {
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            user_id: self.user_id,
            state: PendingConsent {
                pending_id: pending_id.into(),
                requested_scopes,
                state,
            },
            _marker: PhantomData,
        }
    }

    /// Transition to `PendingConsent` from a server-produced prompt
    #[must_use]
    pub fn submitted_from_prompt(self, prompt: &AuthorizationPrompt) -> GrantFlow<PendingConsent> {
        self.submitted(
            prompt.pending_id.clone(),
            prompt.requested_scopes.clone(),
            prompt.state.clone(),
        )
    }
}

impl GrantFlow<PendingConsent> {
    /// Get the pending-authorization handle
    #[must_use]
    pub fn pending_id(&self) -> &str {
        &self.state.pending_id
    }

    /// Get the scopes presented on the consent screen
    #[must_use]
    pub fn requested_scopes(&self) -> &[String] {
        &self.state.requested_scopes
    }

    /// Record the identity of the consenting user
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Transition to `CodeIssued` on approval.
    ///
    /// `code_ttl` is the issuer's code lifetime
    /// (`OAuth2ServerConfig::auth_code_ttl_secs`), so the model tracks
    /// whatever window the server is actually configured with.
    #[must_use]
    pub fn approved(self, code: impl Into<String>, code_ttl: Duration) -> GrantFlow<CodeIssued> {
        let expires_at = Utc::now() + code_ttl;
        GrantFlow {
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            user_id: self.user_id,
            state: CodeIssued {
                code: code.into(),
                expires_at,
                state: self.state.state,
            },
            _marker: PhantomData,
        }
    }

    /// Transition to `CodeIssued` from the server's consent redirect,
    /// extracting the `code` query parameter
    ///
    /// # Errors
    /// Returns `invalid_request` when the redirect carries no code
    pub fn approved_from_redirect(
        self,
        redirect: &ConsentRedirect,
        code_ttl: Duration,
    ) -> Result<GrantFlow<CodeIssued>, OAuth2Error> {
        let url = url::Url::parse(&redirect.location)
            .map_err(|_| OAuth2Error::invalid_request("Consent redirect is not a valid URL"))?;
        let code = url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                OAuth2Error::invalid_request("Consent redirect carries no authorization code")
            })?;
        Ok(self.approved(code, code_ttl))
    }

    /// Terminal transition: the user declined the request
    #[must_use]
    pub fn denied(self) -> GrantFlow<Denied> {
        GrantFlow {
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            user_id: self.user_id,
            state: Denied {
                error: OAuth2Error::access_denied(),
            },
            _marker: PhantomData,
        }
    }
}

impl GrantFlow<CodeIssued> {
    /// Get the issued authorization code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.state.code
    }

    /// Get the state parameter echoed on the redirect
    #[must_use]
    pub fn state_param(&self) -> Option<&str> {
        self.state.state.as_deref()
    }

    /// Check whether the code's window has elapsed
    #[must_use]
    pub fn is_code_expired(&self) -> bool {
        Utc::now() > self.state.expires_at
    }

    /// Terminal transition: a single successful token exchange.
    ///
    /// Any further exchange attempt on the same code is rejected by the
    /// token issuer; the flow never leaves `Exchanged`.
    ///
    /// # Errors
    /// Returns `invalid_grant` when the code has already expired
    pub fn exchanged(self, response: TokenResponse) -> Result<GrantFlow<Exchanged>, OAuth2Error> {
        if self.is_code_expired() {
            return Err(OAuth2Error::invalid_grant("Authorization code has expired"));
        }

        let expires_at = Utc::now() + Duration::seconds(response.expires_in);
        Ok(GrantFlow {
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            user_id: self.user_id,
            state: Exchanged {
                access_token: response.access_token,
                token_type: response.token_type,
                expires_at,
                scopes: response.scopes,
                refresh_token: response.refresh_token,
            },
            _marker: PhantomData,
        })
    }
}

impl GrantFlow<Exchanged> {
    /// Get the access token
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.state.access_token
    }

    /// Get the token type (always "Bearer")
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.state.token_type
    }

    /// Get the granted scopes
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.state.scopes
    }

    /// Get the refresh token, when one was issued
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.state.refresh_token.as_deref()
    }

    /// Check whether the access token has expired
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        Utc::now() > self.state.expires_at
    }
}

impl GrantFlow<Denied> {
    /// Get the terminal `access_denied` error
    #[must_use]
    pub const fn error(&self) -> &OAuth2Error {
        &self.state.error
    }
}

// ============================================================================
// Common accessors
// ============================================================================

impl<State> GrantFlow<State> {
    /// Get the client identifier
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the validated redirect target
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Get the consenting user, when known
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
