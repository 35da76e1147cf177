// ABOUTME: Storage abstraction for pending authorizations, codes, and tokens
// ABOUTME: Includes a sharded in-memory implementation with atomic code consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::models::{AccessToken, AuthorizationCode, PendingAuthorization, RefreshToken};
use crate::config::PendingKeyPolicy;
use crate::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Persistence interface consumed by the grant flow.
///
/// All cross-request shared state lives behind this trait: the
/// pending-authorization store bridging the two flow phases, the
/// authorization-code store, and the token store. Implementations must
/// support safe concurrent access; `consume_auth_code` in particular must be
/// a single atomic check-and-set.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Store a pending authorization and return the handle the consent step
    /// must present to claim it
    async fn store_pending(&self, pending: PendingAuthorization) -> AppResult<String>;

    /// Claim a pending authorization by handle: remove it and return it.
    /// Read-once semantics; entries past their TTL return `None`.
    async fn claim_pending(
        &self,
        handle: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingAuthorization>>;

    /// Persist a freshly issued authorization code
    async fn store_auth_code(&self, code: AuthorizationCode) -> AppResult<()>;

    /// Atomically consume an authorization code.
    ///
    /// Validates client binding, redirect binding, expiry, and the consumed
    /// flag, and flips the flag, all in one step. Two simultaneous exchanges
    /// of the same code must observe exactly one success. Returns `None` when
    /// the code is unknown, expired, already consumed, or bound to a
    /// different client or redirect target.
    async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AuthorizationCode>>;

    /// Persist an issued access token
    async fn store_access_token(&self, token: AccessToken) -> AppResult<()>;

    /// Persist an issued refresh token
    async fn store_refresh_token(&self, token: RefreshToken) -> AppResult<()>;

    /// Look up an access token by value
    async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessToken>>;
}

/// In-memory `GrantStore` backed by sharded concurrent maps.
///
/// `DashMap` mutable guards hold the shard write lock, which makes the
/// read-check-flip inside `consume_auth_code` atomic with respect to any
/// concurrent exchange of the same code.
pub struct MemoryGrantStore {
    pending: DashMap<String, PendingAuthorization>,
    codes: DashMap<String, AuthorizationCode>,
    access_tokens: DashMap<String, AccessToken>,
    refresh_tokens: DashMap<String, RefreshToken>,
    pending_policy: PendingKeyPolicy,
    pending_ttl: Duration,
}

impl MemoryGrantStore {
    /// Create a store with the given pending-key policy and pending TTL
    #[must_use]
    pub fn new(pending_policy: PendingKeyPolicy, pending_ttl_secs: i64) -> Self {
        Self {
            pending: DashMap::new(),
            codes: DashMap::new(),
            access_tokens: DashMap::new(),
            refresh_tokens: DashMap::new(),
            pending_policy,
            pending_ttl: Duration::seconds(pending_ttl_secs),
        }
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn store_pending(&self, pending: PendingAuthorization) -> AppResult<String> {
        let handle = match self.pending_policy {
            // Keyed by client_id: a second in-flight request from the same
            // client overwrites the first, last-writer-wins.
            PendingKeyPolicy::SingleFlightPerClient => pending.client_id.clone(),
            PendingKeyPolicy::PerRequest => pending.id.clone(),
        };

        if self.pending.insert(handle.clone(), pending).is_some() {
            tracing::warn!(
                handle = %handle,
                "Overwrote an in-flight pending authorization"
            );
        }

        Ok(handle)
    }

    async fn claim_pending(
        &self,
        handle: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingAuthorization>> {
        let Some((_, pending)) = self.pending.remove(handle) else {
            return Ok(None);
        };

        if now - pending.created_at > self.pending_ttl {
            tracing::warn!(
                client_id = %pending.client_id,
                "Pending authorization expired before consent"
            );
            return Ok(None);
        }

        Ok(Some(pending))
    }

    async fn store_auth_code(&self, code: AuthorizationCode) -> AppResult<()> {
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AuthorizationCode>> {
        // The mutable guard keeps the shard write-locked for the whole
        // check-and-set, so concurrent exchanges serialize here.
        let Some(mut entry) = self.codes.get_mut(code) else {
            return Ok(None);
        };

        if entry.consumed
            || entry.client_id != client_id
            || entry.redirect_uri != redirect_uri
            || now > entry.expires_at
        {
            return Ok(None);
        }

        entry.consumed = true;
        Ok(Some(entry.clone()))
    }

    async fn store_access_token(&self, token: AccessToken) -> AppResult<()> {
        self.access_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn store_refresh_token(&self, token: RefreshToken) -> AppResult<()> {
        self.refresh_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessToken>> {
        Ok(self.access_tokens.get(token).map(|t| t.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(client_id: &str) -> PendingAuthorization {
        PendingAuthorization {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.to_owned(),
            redirect_uri: "https://foo.com/cb".to_owned(),
            response_type: "code".to_owned(),
            requested_scopes: vec!["profile".to_owned()],
            state: None,
            created_at: Utc::now(),
        }
    }

    fn code(value: &str) -> AuthorizationCode {
        AuthorizationCode {
            code: value.to_owned(),
            client_id: "foo".to_owned(),
            redirect_uri: "https://foo.com/cb".to_owned(),
            scopes: vec!["profile".to_owned()],
            user_id: "u1".to_owned(),
            expires_at: Utc::now() + Duration::minutes(10),
            consumed: false,
        }
    }

    #[tokio::test]
    async fn single_flight_policy_overwrites_by_client() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::SingleFlightPerClient, 600);
        let first = pending("foo");
        let second = pending("foo");
        let second_id = second.id.clone();

        let h1 = store.store_pending(first).await.ok();
        let h2 = store.store_pending(second).await.ok();
        assert_eq!(h1.as_deref(), Some("foo"));
        assert_eq!(h1, h2);

        let claimed = store.claim_pending("foo", Utc::now()).await.ok().flatten();
        assert_eq!(claimed.map(|p| p.id), Some(second_id));
    }

    #[tokio::test]
    async fn per_request_policy_keeps_both_requests() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::PerRequest, 600);
        let first = pending("foo");
        let second = pending("foo");

        let h1 = store.store_pending(first).await.ok().unwrap_or_default();
        let h2 = store.store_pending(second).await.ok().unwrap_or_default();
        assert_ne!(h1, h2);

        assert!(store
            .claim_pending(&h1, Utc::now())
            .await
            .ok()
            .flatten()
            .is_some());
        assert!(store
            .claim_pending(&h2, Utc::now())
            .await
            .ok()
            .flatten()
            .is_some());
    }

    #[tokio::test]
    async fn claim_is_read_once_and_ttl_bound() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::SingleFlightPerClient, 600);
        store.store_pending(pending("foo")).await.ok();

        assert!(store
            .claim_pending("foo", Utc::now())
            .await
            .ok()
            .flatten()
            .is_some());
        // Second claim finds nothing.
        assert!(store
            .claim_pending("foo", Utc::now())
            .await
            .ok()
            .flatten()
            .is_none());

        // Past the TTL the entry is rejected.
        store.store_pending(pending("foo")).await.ok();
        let late = Utc::now() + Duration::seconds(601);
        assert!(store.claim_pending("foo", late).await.ok().flatten().is_none());
    }

    #[tokio::test]
    async fn consume_rejects_mismatched_bindings() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::SingleFlightPerClient, 600);
        store.store_auth_code(code("abc")).await.ok();

        let now = Utc::now();
        assert!(store
            .consume_auth_code("abc", "other_client", "https://foo.com/cb", now)
            .await
            .ok()
            .flatten()
            .is_none());
        assert!(store
            .consume_auth_code("abc", "foo", "https://elsewhere.com/cb", now)
            .await
            .ok()
            .flatten()
            .is_none());
        // Failed attempts must not consume the code.
        assert!(store
            .consume_auth_code("abc", "foo", "https://foo.com/cb", now)
            .await
            .ok()
            .flatten()
            .is_some());
    }

    #[tokio::test]
    async fn consume_is_exactly_once() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::SingleFlightPerClient, 600);
        store.store_auth_code(code("abc")).await.ok();

        let now = Utc::now();
        let first = store
            .consume_auth_code("abc", "foo", "https://foo.com/cb", now)
            .await
            .ok()
            .flatten();
        let second = store
            .consume_auth_code("abc", "foo", "https://foo.com/cb", now)
            .await
            .ok()
            .flatten();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn consume_rejects_expired_codes() {
        let store = MemoryGrantStore::new(PendingKeyPolicy::SingleFlightPerClient, 600);
        let mut expired = code("abc");
        expired.expires_at = Utc::now() - Duration::seconds(1);
        store.store_auth_code(expired).await.ok();

        assert!(store
            .consume_auth_code("abc", "foo", "https://foo.com/cb", Utc::now())
            .await
            .ok()
            .flatten()
            .is_none());
    }
}
