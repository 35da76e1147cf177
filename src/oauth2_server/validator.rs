// ABOUTME: Pure request validation for the authorization, consent, and token endpoints
// ABOUTME: Produces validated contexts or classified protocol errors, no side effects
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::models::{
    AuthorizationRequest, AuthorizeRejection, Consumer, ConsentRequest, OAuth2Error, TokenRequest,
    ValidatedAuthorization,
};

/// Attributes extracted from a valid consent request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentAttributes {
    /// Client whose pending authorization is being completed
    pub client_id: String,
    /// Identity of the consenting user
    pub user_id: String,
    /// Scopes the user granted, non-empty
    pub scopes: Vec<String>,
}

/// Attributes extracted from a well-formed token request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrantAttributes {
    /// Authorization code being exchanged
    pub code: String,
    /// Redirect URI the code must be bound to
    pub redirect_uri: String,
}

/// Resolve the effective redirect URI for an authorization request.
///
/// A supplied URI must exactly match one of the consumer's registered URIs.
/// When omitted, the consumer's single registered URI is used; zero or
/// multiple registered URIs with none supplied is an error.
///
/// # Errors
/// Returns `invalid_request` on mismatch or when no default can be chosen
pub fn resolve_redirect_uri(
    consumer: &Consumer,
    requested: Option<&str>,
) -> Result<String, OAuth2Error> {
    match requested {
        Some(uri) => {
            if consumer.redirect_uris.iter().any(|r| r == uri) {
                Ok(uri.to_owned())
            } else {
                tracing::warn!(
                    client_id = %consumer.client_id,
                    "Authorization request supplied an unregistered redirect_uri"
                );
                Err(OAuth2Error::invalid_request(
                    "redirect_uri does not match any registered redirect URI",
                ))
            }
        }
        None => match consumer.redirect_uris.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(OAuth2Error::invalid_request(
                "Client has no registered redirect URI and none was supplied",
            )),
            _ => Err(OAuth2Error::invalid_request(
                "redirect_uri is required when multiple redirect URIs are registered",
            )),
        },
    }
}

/// Resolve the effective scope set for an authorization request.
///
/// Requested scopes are honored only when they are a subset of the
/// consumer's allowed scopes; otherwise the consumer's defaults are used.
/// An empty resolved set is rejected - scope-less grants are not supported.
///
/// # Errors
/// Returns `invalid_scope` when resolution yields an empty set
pub fn resolve_scopes(
    consumer: &Consumer,
    requested: Option<&str>,
) -> Result<Vec<String>, OAuth2Error> {
    let resolved = requested
        .map(|raw| {
            raw.split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter(|scopes| {
            !scopes.is_empty() && scopes.iter().all(|s| consumer.default_scopes.contains(s))
        })
        .unwrap_or_else(|| consumer.default_scopes.clone());

    if resolved.is_empty() {
        return Err(OAuth2Error::invalid_scope(
            "Resolved scope set is empty; scope-less grants are not supported",
        ));
    }

    Ok(resolved)
}

/// Validate an authorization request against a resolved consumer.
///
/// Pure check with no side effects. The redirect URI is resolved first so
/// that subsequent failures can be delivered to a confirmed-legitimate
/// target; everything before that point is rejected directly.
///
/// # Errors
/// Returns a classified rejection carrying the redirect disposition
pub fn validate_authorization_request(
    consumer: &Consumer,
    request: &AuthorizationRequest,
) -> Result<ValidatedAuthorization, AuthorizeRejection> {
    let redirect_uri = resolve_redirect_uri(consumer, request.redirect_uri.as_deref())
        .map_err(AuthorizeRejection::direct)?;

    // From here on the redirect target is confirmed; protocol errors travel
    // as query parameters on it.
    let state = request.state.as_deref();

    let response_type = request.response_type.as_deref().ok_or_else(|| {
        AuthorizeRejection::redirect_to(
            &redirect_uri,
            OAuth2Error::missing_attribute("response_type", "authorization"),
            state,
        )
    })?;

    if response_type != "code" {
        tracing::warn!(
            client_id = %consumer.client_id,
            response_type,
            "Unsupported response_type requested"
        );
        return Err(AuthorizeRejection::redirect_to(
            &redirect_uri,
            OAuth2Error::unsupported_response_type(),
            state,
        ));
    }

    let scopes = resolve_scopes(consumer, request.scope.as_deref())
        .map_err(|error| AuthorizeRejection::redirect_to(&redirect_uri, error, state))?;

    tracing::debug!(
        client_id = %consumer.client_id,
        scopes = ?scopes,
        "Authorization request validated"
    );

    Ok(ValidatedAuthorization {
        client_id: consumer.client_id.clone(),
        redirect_uri,
        response_type: response_type.to_owned(),
        scopes,
        state: request.state.clone(),
    })
}

/// Validate a consent completion request.
///
/// The reference system retains no browser session between the two phases,
/// so `client_id`, `user_id`, and a non-empty `scopes` list must all be
/// explicit in the body; each absence is a distinct named `invalid_request`.
///
/// # Errors
/// Returns `invalid_request` naming the missing attribute
pub fn validate_consent_request(request: &ConsentRequest) -> Result<ConsentAttributes, OAuth2Error> {
    let client_id = request
        .client_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::missing_attribute("client_id", "consent"))?;

    let user_id = request
        .user_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::missing_attribute("user_id", "consent"))?;

    let scopes = request
        .scopes
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::missing_attribute("scopes", "consent"))?;

    Ok(ConsentAttributes {
        client_id: client_id.to_owned(),
        user_id: user_id.to_owned(),
        scopes: scopes.to_vec(),
    })
}

/// Validate the shape of a token request.
///
/// Client authentication is handled separately by the token issuer; this
/// only checks grant parameters.
///
/// # Errors
/// Returns `unsupported_grant_type` or a named `invalid_request`
pub fn validate_token_request(request: &TokenRequest) -> Result<TokenGrantAttributes, OAuth2Error> {
    let grant_type = request
        .grant_type
        .as_deref()
        .ok_or_else(|| OAuth2Error::missing_attribute("grant_type", "token"))?;

    if grant_type != "authorization_code" {
        return Err(OAuth2Error::unsupported_grant_type());
    }

    let code = request
        .code
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::missing_attribute("code", "token"))?;

    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::missing_attribute("redirect_uri", "token"))?;

    Ok(TokenGrantAttributes {
        code: code.to_owned(),
        redirect_uri: redirect_uri.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn consumer(redirect_uris: &[&str], default_scopes: &[&str]) -> Consumer {
        Consumer {
            client_id: "foo".to_owned(),
            secret_hash: "unused".to_owned(),
            redirect_uris: redirect_uris.iter().map(|s| (*s).to_owned()).collect(),
            default_scopes: default_scopes.iter().map(|s| (*s).to_owned()).collect(),
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn redirect_uri_must_exactly_match() {
        let c = consumer(&["https://foo.com/cb"], &["profile"]);
        assert!(resolve_redirect_uri(&c, Some("https://foo.com/cb")).is_ok());

        let err = resolve_redirect_uri(&c, Some("https://evil.com/cb"));
        assert_eq!(err.err().map(|e| e.error), Some("invalid_request".to_owned()));
    }

    #[test]
    fn omitted_redirect_uri_defaults_to_single_registration() {
        let c = consumer(&["https://foo.com/cb"], &["profile"]);
        assert_eq!(
            resolve_redirect_uri(&c, None).ok().as_deref(),
            Some("https://foo.com/cb")
        );

        let many = consumer(&["https://a/cb", "https://b/cb"], &["profile"]);
        assert!(resolve_redirect_uri(&many, None).is_err());

        let none = consumer(&[], &["profile"]);
        assert!(resolve_redirect_uri(&none, None).is_err());
    }

    #[test]
    fn out_of_bound_scopes_fall_back_to_defaults() {
        let c = consumer(&["https://foo.com/cb"], &["profile", "email"]);
        assert_eq!(
            resolve_scopes(&c, Some("profile")).ok(),
            Some(vec!["profile".to_owned()])
        );
        // Superset of the allowed scopes falls back to the defaults.
        assert_eq!(
            resolve_scopes(&c, Some("profile admin")).ok(),
            Some(vec!["profile".to_owned(), "email".to_owned()])
        );
    }

    #[test]
    fn empty_resolved_scope_set_is_invalid_scope() {
        let c = consumer(&["https://foo.com/cb"], &[]);
        let err = resolve_scopes(&c, None);
        assert_eq!(err.err().map(|e| e.error), Some("invalid_scope".to_owned()));
    }

    #[test]
    fn unregistered_redirect_is_rejected_without_redirect() {
        let c = consumer(&["https://foo.com/cb"], &["profile"]);
        let request = AuthorizationRequest {
            response_type: Some("code".to_owned()),
            client_id: Some("foo".to_owned()),
            redirect_uri: Some("https://attacker.example/cb".to_owned()),
            scope: None,
            state: Some("xyz".to_owned()),
        };

        let rejection = validate_authorization_request(&c, &request)
            .err()
            .map(|r| (r.error.error, r.redirect));
        assert_eq!(rejection, Some(("invalid_request".to_owned(), None)));
    }

    #[test]
    fn unsupported_response_type_redirects_with_error() {
        let c = consumer(&["https://foo.com/cb"], &["profile"]);
        let request = AuthorizationRequest {
            response_type: Some("token".to_owned()),
            client_id: Some("foo".to_owned()),
            redirect_uri: Some("https://foo.com/cb".to_owned()),
            scope: None,
            state: Some("xyz".to_owned()),
        };

        let rejection = validate_authorization_request(&c, &request)
            .err()
            .map(|r| (r.error.error, r.redirect.unwrap_or_default()));
        let (error, redirect) = rejection.unwrap_or_default();
        assert_eq!(error, "unsupported_response_type");
        assert!(redirect.starts_with("https://foo.com/cb?error=unsupported_response_type"));
        assert!(redirect.contains("state=xyz"));
    }

    #[test]
    fn consent_request_names_each_missing_attribute() {
        let missing_user = ConsentRequest {
            client_id: Some("foo".to_owned()),
            scopes: Some(vec!["profile".to_owned()]),
            ..ConsentRequest::default()
        };
        let description = validate_consent_request(&missing_user)
            .err()
            .and_then(|e| e.error_description)
            .unwrap_or_default();
        assert!(description.contains("user_id"));

        let empty_scopes = ConsentRequest {
            client_id: Some("foo".to_owned()),
            user_id: Some("u1".to_owned()),
            scopes: Some(vec![]),
            ..ConsentRequest::default()
        };
        let description = validate_consent_request(&empty_scopes)
            .err()
            .and_then(|e| e.error_description)
            .unwrap_or_default();
        assert!(description.contains("scopes"));
    }

    #[test]
    fn token_request_requires_authorization_code_grant() {
        let request = TokenRequest {
            grant_type: Some("client_credentials".to_owned()),
            ..TokenRequest::default()
        };
        assert_eq!(
            validate_token_request(&request).err().map(|e| e.error),
            Some("unsupported_grant_type".to_owned())
        );
    }
}
