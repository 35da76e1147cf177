// ABOUTME: Library entry point for the OAuth 2.0 authorization-code grant server core
// ABOUTME: Exposes validation, pending/code/token storage, issuers, and the grant state machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # OAuth 2.0 Grant Server
//!
//! The protocol core of an OAuth 2.0 **authorization-code grant** server:
//! it validates authorization requests from registered client applications
//! ("consumers"), issues short-lived single-use authorization codes after
//! user consent, and exchanges valid codes plus client credentials for
//! access and refresh tokens.
//!
//! The surrounding identity-service plumbing is deliberately out of scope:
//! HTTP routing, user accounts, sessions, and durable persistence are
//! external collaborators reached through the [`oauth2_server::registry`]
//! and [`oauth2_server::store`] traits. The crate ships concurrent
//! in-memory implementations of both.
//!
//! ## Flow
//!
//! The grant spans two independent request/response cycles:
//!
//! 1. `authorize` validates the request against the consumer registry and
//!    stores a pending authorization bridging to the consent step.
//! 2. `consent` binds the pending authorization to a user identity and
//!    mints a single-use code, delivered on the validated redirect.
//! 3. `token` authenticates the client, consumes the code exactly once,
//!    and mints the access token (plus optional refresh token).
//!
//! Legal orderings of these steps are additionally encoded as a typestate
//! machine in [`oauth2_server::flow`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use oauth2_grant_server::config::OAuth2ServerConfig;
//! use oauth2_grant_server::oauth2_server::models::ConsumerRegistration;
//! use oauth2_grant_server::oauth2_server::{
//!     MemoryConsumerRegistry, MemoryGrantStore, OAuth2AuthorizationServer,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MemoryConsumerRegistry::new());
//! let credentials = registry.register_consumer(ConsumerRegistration {
//!     client_id: Some("foo".to_owned()),
//!     redirect_uris: vec!["https://foo.com/cb".to_owned()],
//!     default_scopes: vec!["profile".to_owned()],
//!     description: None,
//! })?;
//!
//! let config = OAuth2ServerConfig::default();
//! let store = Arc::new(MemoryGrantStore::new(
//!     config.pending_key_policy,
//!     config.pending_ttl_secs,
//! ));
//! let server = OAuth2AuthorizationServer::new(registry, store, config);
//! # let _ = (server, credentials);
//! # Ok(())
//! # }
//! ```

/// Server configuration loaded from the environment
pub mod config;

/// Unified application error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// OAuth 2.0 authorization-code grant implementation
pub mod oauth2_server;
