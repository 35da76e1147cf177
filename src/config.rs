// ABOUTME: Environment-driven configuration for the grant server core
// ABOUTME: Covers code/pending TTLs, token lifetimes, and the pending-key policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server configuration, loaded from the environment with sane defaults.

use crate::errors::{AppError, AppResult};
use std::env;

/// Keying policy for the pending-authorization store.
///
/// The reference behavior keys pending authorizations by `client_id` alone,
/// which makes a second concurrent authorization request from the same client
/// silently overwrite the first (last-writer-wins). `PerRequest` issues a
/// fresh unique key per request instead; the consent step must then thread
/// that key back via `pending_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingKeyPolicy {
    /// At most one pending authorization per client; overwrites are silent.
    /// Matches the reference system and is the default.
    #[default]
    SingleFlightPerClient,
    /// One pending authorization per request, keyed by a unique id.
    PerRequest,
}

impl PendingKeyPolicy {
    fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "single_flight" | "single_flight_per_client" => Ok(Self::SingleFlightPerClient),
            "per_request" => Ok(Self::PerRequest),
            other => Err(AppError::config(format!(
                "OAUTH2_PENDING_KEY_POLICY must be 'single_flight' or 'per_request', got '{other}'"
            ))),
        }
    }
}

/// Configuration for the OAuth 2.0 authorization server core
#[derive(Debug, Clone)]
pub struct OAuth2ServerConfig {
    /// Authorization code lifetime in seconds (reference: minutes, not hours)
    pub auth_code_ttl_secs: i64,
    /// Pending-authorization lifetime in seconds; entries older than this are
    /// rejected at consent time
    pub pending_ttl_secs: i64,
    /// Access token lifetime in seconds (reference: 3600)
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: i64,
    /// Whether the token endpoint mints a refresh token alongside the access token
    pub issue_refresh_tokens: bool,
    /// How pending authorizations are keyed between the two flow phases
    pub pending_key_policy: PendingKeyPolicy,
}

impl Default for OAuth2ServerConfig {
    fn default() -> Self {
        Self {
            auth_code_ttl_secs: 600,
            pending_ttl_secs: 600,
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
            issue_refresh_tokens: true,
            pending_key_policy: PendingKeyPolicy::default(),
        }
    }
}

impl OAuth2ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// # Errors
    /// Returns an error if any variable is set but cannot be parsed
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            auth_code_ttl_secs: env_i64("OAUTH2_AUTH_CODE_TTL_SECS", defaults.auth_code_ttl_secs)?,
            pending_ttl_secs: env_i64("OAUTH2_PENDING_TTL_SECS", defaults.pending_ttl_secs)?,
            access_token_ttl_secs: env_i64(
                "OAUTH2_ACCESS_TOKEN_TTL_SECS",
                defaults.access_token_ttl_secs,
            )?,
            refresh_token_ttl_days: env_i64(
                "OAUTH2_REFRESH_TOKEN_TTL_DAYS",
                defaults.refresh_token_ttl_days,
            )?,
            issue_refresh_tokens: env_bool(
                "OAUTH2_ISSUE_REFRESH_TOKENS",
                defaults.issue_refresh_tokens,
            )?,
            pending_key_policy: match env::var("OAUTH2_PENDING_KEY_POLICY") {
                Ok(raw) => PendingKeyPolicy::parse(&raw)?,
                Err(_) => defaults.pending_key_policy,
            },
        })
    }
}

fn env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| AppError::config(format!("{name} must be an integer: {e}"))),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(AppError::config(format!(
                "{name} must be a boolean, got '{other}'"
            ))),
        },
        Err(_) => Ok(default),
    }
}
