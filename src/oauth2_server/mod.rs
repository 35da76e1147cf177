// ABOUTME: OAuth 2.0 authorization-code grant server core
// ABOUTME: Validator, pending/code/token stores, issuers, and the grant state machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Authorization and token endpoint orchestration
pub mod endpoints;
/// Typestate model of the grant state machine
pub mod flow;
/// Data models and wire types
pub mod models;
/// Endpoint rate limiting
pub mod rate_limiting;
/// Consumer registry
pub mod registry;
/// Storage traits and in-memory implementation
pub mod store;
/// Pure request validation
pub mod validator;

/// OAuth 2.0 authorization server
pub use endpoints::OAuth2AuthorizationServer;

/// Grant flow with compile-time state transitions
pub use flow::GrantFlow;

/// Authorization request (phase 1)
pub use models::AuthorizationRequest;
/// Consent-screen payload
pub use models::AuthorizationPrompt;
/// Authorization-phase rejection with redirect disposition
pub use models::AuthorizeRejection;
/// Registered OAuth client
pub use models::Consumer;
/// Consent completion request (phase 2)
pub use models::ConsentRequest;
/// Consent redirect carrying code and state
pub use models::ConsentRedirect;
/// OAuth 2.0 protocol error
pub use models::OAuth2Error;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;

/// Endpoint rate limiter
pub use rate_limiting::OAuth2RateLimiter;

/// Consumer lookup interface
pub use registry::{ConsumerRegistry, MemoryConsumerRegistry};

/// Storage interface and in-memory implementation
pub use store::{GrantStore, MemoryGrantStore};
