// ABOUTME: OAuth 2.0 authorization and token endpoint implementation
// ABOUTME: Orchestrates validator, stores, and registry across the two-phase grant flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::models::{
    AccessToken, AuthorizationCode, AuthorizationPrompt, AuthorizationRequest, AuthorizeRejection,
    ConsentDecision, ConsentRedirect, ConsentRequest, OAuth2Error, PendingAuthorization,
    RefreshToken, TokenRequest, TokenResponse,
};
use super::rate_limiting::OAuth2RateLimiter;
use super::registry::{verify_secret, ConsumerRegistry};
use super::store::GrantStore;
use super::validator;
use crate::config::{OAuth2ServerConfig, PendingKeyPolicy};
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use uuid::Uuid;

/// Suggested HTTP status for the consent redirect
const REDIRECT_STATUS: u16 = 302;

/// OAuth 2.0 authorization server for the authorization-code grant.
///
/// Stateless across requests: each phase of the flow reads and writes the
/// injected stores. Constructed once at process start and passed by
/// reference to request handlers; there is no global instance.
pub struct OAuth2AuthorizationServer {
    registry: Arc<dyn ConsumerRegistry>,
    store: Arc<dyn GrantStore>,
    rate_limiter: OAuth2RateLimiter,
    config: OAuth2ServerConfig,
}

impl OAuth2AuthorizationServer {
    /// Create a server over the given registry and store
    #[must_use]
    pub fn new(
        registry: Arc<dyn ConsumerRegistry>,
        store: Arc<dyn GrantStore>,
        config: OAuth2ServerConfig,
    ) -> Self {
        Self {
            registry,
            store,
            rate_limiter: OAuth2RateLimiter::new(),
            config,
        }
    }

    /// Replace the default rate limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: OAuth2RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Handle an authorization request (phase 1, `GET /authorize`).
    ///
    /// On success the pending authorization is stored and a prompt for the
    /// consent screen is returned. Failures are classified by whether the
    /// redirect target was confirmed: before confirmation they must be
    /// rendered directly, never redirected.
    ///
    /// # Errors
    /// Returns a rejection carrying the protocol error and its disposition
    pub async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationPrompt, AuthorizeRejection> {
        let client_id = request.client_id.as_deref().ok_or_else(|| {
            AuthorizeRejection::direct(OAuth2Error::missing_attribute(
                "client_id",
                "authorization",
            ))
        })?;

        let throttle = self.rate_limiter.check("authorize", client_id);
        if throttle.is_limited {
            tracing::warn!(client_id, "Authorization endpoint rate limit exceeded");
            let mut error =
                OAuth2Error::temporarily_unavailable("Too many authorization requests; retry later");
            if let Some(seconds) = throttle.retry_after_seconds {
                error = error.with_retry_after(seconds);
            }
            return Err(AuthorizeRejection::direct(error));
        }

        let consumer = self
            .registry
            .get_consumer(client_id)
            .await
            .map_err(|e| {
                tracing::error!(client_id, error = %e, "Consumer lookup failed");
                AuthorizeRejection::direct(OAuth2Error::server_error("Consumer lookup failed"))
            })?
            .ok_or_else(|| AuthorizeRejection::direct(OAuth2Error::invalid_client()))?;

        let validated = validator::validate_authorization_request(&consumer, &request)?;

        let pending = PendingAuthorization {
            id: Uuid::new_v4().to_string(),
            client_id: validated.client_id,
            redirect_uri: validated.redirect_uri,
            response_type: validated.response_type,
            requested_scopes: validated.scopes,
            state: validated.state,
            created_at: Utc::now(),
        };

        let redirect_uri = pending.redirect_uri.clone();
        let state = pending.state.clone();
        let requested_scopes = pending.requested_scopes.clone();

        let pending_id = self.store.store_pending(pending).await.map_err(|e| {
            tracing::error!(client_id, error = %e, "Failed to store pending authorization");
            AuthorizeRejection::direct(OAuth2Error::temporarily_unavailable(
                "Could not persist the authorization request",
            ))
        })?;

        tracing::debug!(client_id, pending_id = %pending_id, "Stored pending authorization");

        Ok(AuthorizationPrompt {
            pending_id,
            client_id: client_id.to_owned(),
            description: consumer.description,
            requested_scopes,
            redirect_uri,
            state,
        })
    }

    /// Handle consent completion (phase 2, `POST /authorize`).
    ///
    /// An approval claims the pending authorization, mints a single-use
    /// authorization code, and returns the redirect carrying `code` and
    /// `state`. A denial claims the pending authorization and redirects with
    /// `error=access_denied`.
    ///
    /// # Errors
    /// Returns a rejection carrying the protocol error and its disposition
    pub async fn consent(
        &self,
        request: ConsentRequest,
    ) -> Result<ConsentRedirect, AuthorizeRejection> {
        match request.decision {
            ConsentDecision::Approve => self.approve_consent(request).await,
            ConsentDecision::Deny => self.deny_consent(request).await,
        }
    }

    async fn approve_consent(
        &self,
        request: ConsentRequest,
    ) -> Result<ConsentRedirect, AuthorizeRejection> {
        let attrs =
            validator::validate_consent_request(&request).map_err(AuthorizeRejection::direct)?;

        let pending = self
            .claim_pending(request.pending_id.as_deref(), &attrs.client_id)
            .await?;

        if pending.client_id != attrs.client_id {
            return Err(AuthorizeRejection::direct(OAuth2Error::invalid_request(
                "client_id does not match the pending authorization",
            )));
        }

        // Granted scopes may narrow the validated request but never widen it.
        if !attrs
            .scopes
            .iter()
            .all(|s| pending.requested_scopes.contains(s))
        {
            return Err(AuthorizeRejection::redirect_to(
                &pending.redirect_uri,
                OAuth2Error::invalid_scope("Granted scopes exceed the requested scope set"),
                pending.state.as_deref(),
            ));
        }

        let code_value = generate_random_string(32).map_err(|e| {
            tracing::error!(client_id = %attrs.client_id, error = %e, "Code generation failed");
            AuthorizeRejection::direct(OAuth2Error::server_error(
                "Failed to generate authorization code",
            ))
        })?;

        let auth_code = AuthorizationCode {
            code: code_value.clone(),
            client_id: pending.client_id.clone(),
            redirect_uri: pending.redirect_uri.clone(),
            scopes: attrs.scopes,
            user_id: attrs.user_id,
            expires_at: Utc::now() + Duration::seconds(self.config.auth_code_ttl_secs),
            consumed: false,
        };

        self.store.store_auth_code(auth_code).await.map_err(|e| {
            tracing::error!(client_id = %pending.client_id, error = %e, "Failed to store authorization code");
            AuthorizeRejection::direct(OAuth2Error::temporarily_unavailable(
                "Could not persist the authorization code",
            ))
        })?;

        tracing::info!(client_id = %pending.client_id, "Issued authorization code");

        // State is echoed verbatim, empty when none was supplied.
        let location = format!(
            "{}?code={}&state={}",
            pending.redirect_uri,
            urlencoding::encode(&code_value),
            urlencoding::encode(pending.state.as_deref().unwrap_or(""))
        );

        Ok(ConsentRedirect {
            location,
            status: REDIRECT_STATUS,
        })
    }

    async fn deny_consent(
        &self,
        request: ConsentRequest,
    ) -> Result<ConsentRedirect, AuthorizeRejection> {
        let client_id = request.client_id.as_deref().ok_or_else(|| {
            AuthorizeRejection::direct(OAuth2Error::missing_attribute("client_id", "consent"))
        })?;

        let pending = self
            .claim_pending(request.pending_id.as_deref(), client_id)
            .await?;

        tracing::info!(client_id = %pending.client_id, "User denied consent");

        // The denial is delivered to the validated redirect target as a
        // normal redirect, not surfaced as a server-side failure.
        let location = OAuth2Error::access_denied()
            .redirect_location(&pending.redirect_uri, pending.state.as_deref());

        Ok(ConsentRedirect {
            location,
            status: REDIRECT_STATUS,
        })
    }

    /// Claim the pending authorization named by the consent request,
    /// honoring the configured keying policy
    async fn claim_pending(
        &self,
        pending_id: Option<&str>,
        client_id: &str,
    ) -> Result<PendingAuthorization, AuthorizeRejection> {
        let handle = match self.config.pending_key_policy {
            PendingKeyPolicy::PerRequest => pending_id.ok_or_else(|| {
                AuthorizeRejection::direct(OAuth2Error::missing_attribute("pending_id", "consent"))
            })?,
            PendingKeyPolicy::SingleFlightPerClient => pending_id.unwrap_or(client_id),
        };

        self.store
            .claim_pending(handle, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(client_id, error = %e, "Pending authorization lookup failed");
                AuthorizeRejection::direct(OAuth2Error::server_error(
                    "Pending authorization lookup failed",
                ))
            })?
            .ok_or_else(|| {
                AuthorizeRejection::direct(OAuth2Error::invalid_request(
                    "No pending authorization request found for this client",
                ))
            })
    }

    /// Handle a token request (`POST /token`).
    ///
    /// Authenticates the client, consumes the authorization code exactly
    /// once, and mints the token bound to the code's client, user, and
    /// scopes. The error's `http_status()` supplies the suggested status
    /// (401 for failed client authentication, 400 otherwise); error bodies
    /// never carry token material.
    ///
    /// # Errors
    /// Returns the classified protocol error
    pub async fn token(
        &self,
        request: TokenRequest,
        authorization_header: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        // Step 1: authenticate the client. Basic auth wins over form fields.
        let (client_id, client_secret) = client_credentials(&request, authorization_header)
            .ok_or_else(OAuth2Error::invalid_client)?;

        let throttle = self.rate_limiter.check("token", &client_id);
        if throttle.is_limited {
            tracing::warn!(client_id = %client_id, "Token endpoint rate limit exceeded");
            let mut error =
                OAuth2Error::temporarily_unavailable("Too many token requests; retry later");
            if let Some(seconds) = throttle.retry_after_seconds {
                error = error.with_retry_after(seconds);
            }
            return Err(error);
        }

        let consumer = self
            .registry
            .get_consumer(&client_id)
            .await
            .map_err(|e| {
                tracing::error!(client_id = %client_id, error = %e, "Consumer lookup failed");
                OAuth2Error::server_error("Consumer lookup failed")
            })?
            .ok_or_else(|| {
                tracing::warn!(client_id = %client_id, "Token request from unknown client");
                OAuth2Error::invalid_client()
            })?;

        if !verify_secret(&consumer.secret_hash, &client_secret) {
            tracing::warn!(client_id = %client_id, "Client secret verification failed");
            return Err(OAuth2Error::invalid_client());
        }

        // Step 2 + 3: look up and atomically consume the code. Missing,
        // expired, already consumed, and mismatched bindings are
        // indistinguishable to the caller.
        let grant = validator::validate_token_request(&request)?;

        let auth_code = self
            .store
            .consume_auth_code(&grant.code, &client_id, &grant.redirect_uri, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(client_id = %client_id, error = %e, "Code consumption failed");
                OAuth2Error::server_error("Failed to consume authorization code")
            })?
            .ok_or_else(|| {
                tracing::warn!(
                    client_id = %client_id,
                    "Rejected exchange: code not found, expired, consumed, or mismatched"
                );
                OAuth2Error::invalid_grant("Invalid or expired authorization code")
            })?;

        // Step 4: mint the token. Scopes are exactly those granted at
        // code-issuance time, never expanded.
        let response = self.mint_token(&auth_code).await.map_err(|e| {
            tracing::error!(client_id = %client_id, error = %e, "Token minting failed");
            OAuth2Error::server_error("Failed to issue token")
        })?;

        tracing::info!(
            client_id = %client_id,
            user_id = %auth_code.user_id,
            "Exchanged authorization code for access token"
        );

        Ok(response)
    }

    async fn mint_token(&self, auth_code: &AuthorizationCode) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let access_token_value = generate_random_string(32)?;

        let access_token = AccessToken {
            token: access_token_value.clone(),
            client_id: auth_code.client_id.clone(),
            user_id: auth_code.user_id.clone(),
            scopes: auth_code.scopes.clone(),
            expires_at: now + Duration::seconds(self.config.access_token_ttl_secs),
            created_at: now,
        };
        self.store.store_access_token(access_token).await?;

        let refresh_token_value = if self.config.issue_refresh_tokens {
            let value = generate_random_string(32)?;
            let refresh_token = RefreshToken {
                token: value.clone(),
                client_id: auth_code.client_id.clone(),
                user_id: auth_code.user_id.clone(),
                scopes: auth_code.scopes.clone(),
                expires_at: now + Duration::days(self.config.refresh_token_ttl_days),
                created_at: now,
            };
            self.store.store_refresh_token(refresh_token).await?;
            Some(value)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token: access_token_value,
            token_type: "Bearer".to_owned(),
            expires_in: self.config.access_token_ttl_secs,
            scopes: auth_code.scopes.clone(),
            refresh_token: refresh_token_value,
        })
    }
}

/// Resolve client credentials from the `Authorization` header (HTTP Basic)
/// or the form body, header taking precedence
fn client_credentials(
    request: &TokenRequest,
    authorization_header: Option<&str>,
) -> Option<(String, String)> {
    if let Some(header) = authorization_header {
        return parse_basic_credentials(header);
    }

    match (&request.client_id, &request.client_secret) {
        (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
        _ => None,
    }
}

/// Parse an HTTP Basic `Authorization` header into `(client_id, secret)`
fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (client_id, secret) = text.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }
    Some((client_id.to_owned(), secret.to_owned()))
}

/// Generate a cryptographically unguessable URL-safe string
///
/// # Errors
/// Returns an error if the system RNG fails; the server cannot operate
/// securely without a working RNG
fn generate_random_string(length: usize) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!(error = ?e, "System RNG failure while generating token material");
        AppError::internal("System RNG failure")
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_round_trip() {
        let header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode("foo:s3cret")
        );
        assert_eq!(
            parse_basic_credentials(&header),
            Some(("foo".to_owned(), "s3cret".to_owned()))
        );
    }

    #[test]
    fn basic_credentials_reject_malformed_headers() {
        assert!(parse_basic_credentials("Bearer abc").is_none());
        assert!(parse_basic_credentials("Basic not-base64!!!").is_none());
        let no_colon = format!("Basic {}", general_purpose::STANDARD.encode("justuser"));
        assert!(parse_basic_credentials(&no_colon).is_none());
        let empty_id = format!("Basic {}", general_purpose::STANDARD.encode(":secret"));
        assert!(parse_basic_credentials(&empty_id).is_none());
    }

    #[test]
    fn generated_strings_are_unique_and_url_safe() {
        let a = generate_random_string(32).unwrap_or_default();
        let b = generate_random_string(32).unwrap_or_default();
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
