// ABOUTME: Unit tests for OAuth2 data models and the protocol error type
// ABOUTME: Validates error taxonomy, redirect building, serialization, and wire shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use oauth2_grant_server::oauth2_server::models::{
    AuthorizationRequest, AuthorizeRejection, ConsentDecision, ConsentRequest, OAuth2Error,
    TokenRequest, TokenResponse,
};

// =============================================================================
// OAuth2Error taxonomy
// =============================================================================

#[test]
fn error_constructors_use_rfc6749_codes() {
    assert_eq!(OAuth2Error::invalid_request("x").error, "invalid_request");
    assert_eq!(OAuth2Error::invalid_client().error, "invalid_client");
    assert_eq!(OAuth2Error::invalid_grant("x").error, "invalid_grant");
    assert_eq!(
        OAuth2Error::unauthorized_client("x").error,
        "unauthorized_client"
    );
    assert_eq!(
        OAuth2Error::unsupported_response_type().error,
        "unsupported_response_type"
    );
    assert_eq!(
        OAuth2Error::unsupported_grant_type().error,
        "unsupported_grant_type"
    );
    assert_eq!(OAuth2Error::invalid_scope("x").error, "invalid_scope");
    assert_eq!(OAuth2Error::access_denied().error, "access_denied");
    assert_eq!(OAuth2Error::server_error("x").error, "server_error");
    assert_eq!(
        OAuth2Error::temporarily_unavailable("x").error,
        "temporarily_unavailable"
    );
}

#[test]
fn errors_link_to_the_rfc() {
    let error = OAuth2Error::invalid_grant("expired");
    assert!(error
        .error_uri
        .unwrap()
        .starts_with("https://datatracker.ietf.org/doc/html/rfc6749"));
}

#[test]
fn missing_attribute_names_both_attribute_and_request() {
    let error = OAuth2Error::missing_attribute("user_id", "consent");
    assert_eq!(error.error, "invalid_request");
    assert_eq!(
        error.error_description.as_deref(),
        Some("Missing required attribute 'user_id' in consent request")
    );
}

#[test]
fn http_status_follows_error_class() {
    assert_eq!(OAuth2Error::invalid_client().http_status(), 401);
    assert_eq!(OAuth2Error::server_error("x").http_status(), 500);
    assert_eq!(OAuth2Error::temporarily_unavailable("x").http_status(), 503);
    assert_eq!(OAuth2Error::invalid_grant("x").http_status(), 400);
    assert_eq!(OAuth2Error::access_denied().http_status(), 400);
}

#[test]
fn redirect_location_url_encodes_and_echoes_state() {
    let error = OAuth2Error::invalid_scope("scope set & more");
    let location = error.redirect_location("https://foo.com/cb", Some("a b"));

    assert!(location.starts_with("https://foo.com/cb?error=invalid_scope"));
    assert!(location.contains("error_description=scope%20set%20%26%20more"));
    assert!(location.ends_with("&state=a%20b"));
}

#[test]
fn redirect_location_omits_state_when_absent() {
    let location = OAuth2Error::access_denied().redirect_location("https://foo.com/cb", None);
    assert!(!location.contains("state="));
}

#[test]
fn error_serialization_skips_nothing_but_carries_no_secrets() {
    let error = OAuth2Error::invalid_grant("Invalid or expired authorization code");
    let json = serde_json::to_value(&error).unwrap();

    assert_eq!(json["error"], "invalid_grant");
    assert_eq!(
        json["error_description"],
        "Invalid or expired authorization code"
    );
}

#[test]
fn retry_after_hint_is_header_only_never_body() {
    let error = OAuth2Error::temporarily_unavailable("Too many requests").with_retry_after(42);
    assert_eq!(error.retry_after_seconds, Some(42));

    let json = serde_json::to_value(&error).unwrap();
    assert!(json.get("retry_after_seconds").is_none());
}

// =============================================================================
// AuthorizeRejection disposition
// =============================================================================

#[test]
fn direct_rejection_carries_no_redirect() {
    let rejection = AuthorizeRejection::direct(OAuth2Error::invalid_client());
    assert!(rejection.redirect.is_none());
}

#[test]
fn redirect_rejection_prebuilds_the_location() {
    let rejection = AuthorizeRejection::redirect_to(
        "https://foo.com/cb",
        OAuth2Error::unsupported_response_type(),
        Some("xyz"),
    );
    let location = rejection.redirect.unwrap();
    assert!(location.starts_with("https://foo.com/cb?error=unsupported_response_type"));
    assert!(location.contains("state=xyz"));
}

// =============================================================================
// Wire shapes
// =============================================================================

#[test]
fn authorization_request_deserializes_from_query_pairs() {
    let request: AuthorizationRequest = serde_urlencoded::from_str(
        "response_type=code&client_id=foo&redirect_uri=https%3A%2F%2Ffoo.com%2Fcb&scope=profile&state=xyz",
    )
    .unwrap();

    assert_eq!(request.response_type.as_deref(), Some("code"));
    assert_eq!(request.client_id.as_deref(), Some("foo"));
    assert_eq!(request.redirect_uri.as_deref(), Some("https://foo.com/cb"));
    assert_eq!(request.scope.as_deref(), Some("profile"));
    assert_eq!(request.state.as_deref(), Some("xyz"));
}

#[test]
fn absent_parameters_deserialize_as_none_not_failure() {
    let request: AuthorizationRequest = serde_urlencoded::from_str("client_id=foo").unwrap();
    assert!(request.response_type.is_none());
    assert!(request.redirect_uri.is_none());

    let token: TokenRequest = serde_urlencoded::from_str("grant_type=authorization_code").unwrap();
    assert!(token.code.is_none());
}

#[test]
fn consent_decision_defaults_to_approve() {
    let request: ConsentRequest =
        serde_json::from_str(r#"{"client_id":"foo","user_id":"u1","scopes":["profile"]}"#).unwrap();
    assert_eq!(request.decision, ConsentDecision::Approve);

    let denial: ConsentRequest = serde_json::from_str(
        r#"{"client_id":"foo","user_id":"u1","scopes":["profile"],"decision":"deny"}"#,
    )
    .unwrap();
    assert_eq!(denial.decision, ConsentDecision::Deny);
}

#[test]
fn token_response_omits_absent_refresh_token() {
    let response = TokenResponse {
        access_token: "access".to_owned(),
        token_type: "Bearer".to_owned(),
        expires_in: 3600,
        scopes: vec!["profile".to_owned()],
        refresh_token: None,
    };
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    assert!(json.get("refresh_token").is_none());
}
