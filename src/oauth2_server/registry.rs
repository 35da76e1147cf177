// ABOUTME: Consumer registry - registered OAuth clients with Argon2-hashed secrets
// ABOUTME: Enforces write-once client secrets; updates carrying a secret are rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::models::{Consumer, ConsumerCredentials, ConsumerRegistration, ConsumerUpdate};
use crate::errors::{AppError, AppResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

/// Lookup interface the grant flow consumes.
///
/// The registry is a keyed store owned outside the protocol core; the flow
/// only ever reads from it.
#[async_trait]
pub trait ConsumerRegistry: Send + Sync {
    /// Get a consumer by `client_id`
    async fn get_consumer(&self, client_id: &str) -> AppResult<Option<Consumer>>;
}

/// In-memory consumer registry with just enough bookkeeping to enforce the
/// registration invariants: generated high-entropy secrets, Argon2id hashes
/// at rest, and immutable secrets after creation.
#[derive(Default)]
pub struct MemoryConsumerRegistry {
    consumers: DashMap<String, Consumer>,
}

impl MemoryConsumerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer and return its credentials.
    ///
    /// The plaintext secret appears here and nowhere else.
    ///
    /// # Errors
    /// Returns an error if the `client_id` is already registered, a redirect
    /// URI is invalid, or secret generation fails
    pub fn register_consumer(
        &self,
        registration: ConsumerRegistration,
    ) -> AppResult<ConsumerCredentials> {
        if registration.redirect_uris.is_empty() {
            return Err(AppError::invalid_input(
                "At least one redirect_uri is required",
            ));
        }
        for uri in &registration.redirect_uris {
            if url::Url::parse(uri).is_err() {
                return Err(AppError::invalid_input(format!(
                    "Invalid redirect_uri: {uri}"
                )));
            }
        }

        let client_id = registration
            .client_id
            .unwrap_or_else(|| format!("consumer_{}", Uuid::new_v4().simple()));
        let secret = generate_secret()?;
        let secret_hash = hash_secret(&secret)?;

        let consumer = Consumer {
            client_id: client_id.clone(),
            secret_hash,
            redirect_uris: registration.redirect_uris,
            default_scopes: registration.default_scopes,
            description: registration.description,
            created_at: Utc::now(),
        };

        match self.consumers.entry(client_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::already_exists(format!(
                "Consumer '{client_id}' is already registered"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(consumer);
                tracing::info!(client_id = %client_id, "Registered OAuth2 consumer");
                Ok(ConsumerCredentials { client_id, secret })
            }
        }
    }

    /// Apply a partial update to a registered consumer.
    ///
    /// The secret is write-once: an update that attempts to change it is
    /// rejected before anything is persisted.
    ///
    /// # Errors
    /// Returns an error if the update carries a `secret` or the consumer
    /// does not exist
    pub fn update_consumer(&self, client_id: &str, update: ConsumerUpdate) -> AppResult<Consumer> {
        if update.secret.is_some() {
            tracing::warn!(client_id = %client_id, "Rejected attempt to change consumer secret");
            return Err(AppError::invalid_input("Cannot change consumer secret"));
        }

        let mut entry = self
            .consumers
            .get_mut(client_id)
            .ok_or_else(|| AppError::not_found(format!("Consumer '{client_id}' not found")))?;

        if let Some(redirect_uris) = update.redirect_uris {
            entry.redirect_uris = redirect_uris;
        }
        if let Some(default_scopes) = update.default_scopes {
            entry.default_scopes = default_scopes;
        }
        if let Some(description) = update.description {
            entry.description = Some(description);
        }

        Ok(entry.clone())
    }
}

#[async_trait]
impl ConsumerRegistry for MemoryConsumerRegistry {
    async fn get_consumer(&self, client_id: &str) -> AppResult<Option<Consumer>> {
        Ok(self.consumers.get(client_id).map(|c| c.clone()))
    }
}

/// Generate a high-entropy client secret (32 bytes, base64)
///
/// # Errors
/// Returns an error if the system RNG fails; the server cannot operate
/// securely without a working RNG
pub fn generate_secret() -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!(error = ?e, "System RNG failure while generating client secret");
        AppError::internal("System RNG failure")
    })?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Hash a client secret for storage using Argon2id with a random salt
///
/// # Errors
/// Returns an error if Argon2 hashing fails
pub fn hash_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::internal(format!("Argon2 password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a presented client secret against the stored Argon2 hash
#[must_use]
pub fn verify_secret(secret_hash: &str, presented: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(secret_hash) else {
        tracing::error!("Stored consumer secret hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(presented.as_bytes(), &parsed)
        .is_ok()
}
