//! OAuth 2.1 flow primitives
//!
//! The four RFC-specified exchanges that the orchestrator composes:
//!
//! - [`start_authorization`] -- builds the PKCE-protected authorization URL
//!   (no I/O; the embedder performs the redirect).
//! - [`exchange_authorization`] -- redeems an authorization code at the
//!   token endpoint (RFC 6749 section 4.1.3).
//! - [`refresh_authorization`] -- exchanges a refresh token, carrying the
//!   old refresh token forward when the server rotates nothing
//!   (RFC 6749 section 6).
//! - [`register_client`] -- RFC 7591 dynamic client registration.
//!
//! Primitives tolerate absent server metadata by falling back to the
//! conventional endpoint locations (`/authorize`, `/token`, `/register`)
//! resolved against the authorization server's origin.  Every non-2xx token
//! or registration response is parsed as an RFC 6749 error document and
//! surfaced as a typed error.

use reqwest::header::{HeaderMap, ACCEPT};
use url::Url;

use crate::client_auth::{prepare_client_authentication, ClientAuthenticator};
use crate::discovery::AuthorizationServerMetadata;
use crate::error::{parse_error_response, AuthError, Result};
use crate::pkce::{self, PkcePair};
use crate::types::{ClientInformation, ClientInformationFull, ClientMetadata, OAuthTokens};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Inputs to [`start_authorization`].
#[derive(Debug)]
pub struct AuthorizationParams<'a> {
    /// Discovered server metadata, when any.
    pub metadata: Option<&'a AuthorizationServerMetadata>,
    /// The registered client's identity.
    pub client_information: &'a ClientInformation,
    /// Redirect URL registered with the server.
    pub redirect_url: &'a Url,
    /// Space-separated scope string to request.
    pub scope: Option<&'a str>,
    /// Opaque CSRF state token.
    pub state: Option<&'a str>,
    /// RFC 8707 resource indicator.
    pub resource: Option<&'a Url>,
}

/// Result of [`start_authorization`]: the URL to redirect the user agent to
/// and the verifier that must be persisted until code exchange.
#[derive(Debug)]
pub struct StartedAuthorization {
    /// Fully assembled authorization endpoint URL.
    pub authorization_url: Url,
    /// Fresh PKCE code verifier.
    pub code_verifier: String,
}

/// Inputs to [`exchange_authorization`].
pub struct TokenExchangeParams<'a> {
    /// Discovered server metadata, when any.
    pub metadata: Option<&'a AuthorizationServerMetadata>,
    /// The registered client's identity.
    pub client_information: &'a ClientInformation,
    /// The authorization code from the redirect callback.
    pub authorization_code: &'a str,
    /// The PKCE verifier persisted at redirect time.
    pub code_verifier: &'a str,
    /// The redirect URL the code was issued against.
    pub redirect_url: &'a Url,
    /// RFC 8707 resource indicator.
    pub resource: Option<&'a Url>,
    /// Provider-supplied authentication override.
    pub authenticator: Option<&'a dyn ClientAuthenticator>,
}

/// Inputs to [`refresh_authorization`].
pub struct TokenRefreshParams<'a> {
    /// Discovered server metadata, when any.
    pub metadata: Option<&'a AuthorizationServerMetadata>,
    /// The registered client's identity.
    pub client_information: &'a ClientInformation,
    /// The refresh token to exchange.
    pub refresh_token: &'a str,
    /// RFC 8707 resource indicator.
    pub resource: Option<&'a Url>,
    /// Provider-supplied authentication override.
    pub authenticator: Option<&'a dyn ClientAuthenticator>,
}

// ---------------------------------------------------------------------------
// start_authorization
// ---------------------------------------------------------------------------

/// Builds the authorization URL for a fresh PKCE-protected authorization
/// code request.
///
/// When metadata is present the server must advertise the `code` response
/// type, and an advertised challenge-method list must contain `S256`; with
/// no metadata the conventional `/authorize` endpoint at the server origin
/// is used.  Query parameters are appended in the order `response_type`,
/// `client_id`, `code_challenge`, `code_challenge_method`, `redirect_uri`,
/// then `state`, `scope`, and `resource` when supplied.  A scope containing
/// the `offline_access` token also requests `prompt=consent` so that a
/// refresh token is actually issued.
///
/// # Errors
///
/// [`AuthError::Incompatible`] when the advertised capabilities rule out
/// the authorization code flow with S256.
pub fn start_authorization(
    server_url: &Url,
    params: AuthorizationParams<'_>,
) -> Result<StartedAuthorization> {
    let mut authorization_url = match params.metadata {
        Some(metadata) => {
            if !metadata.response_types_supported.iter().any(|t| t == "code") {
                return Err(AuthError::Incompatible(
                    "authorization server does not support response type code".to_string(),
                ));
            }
            if let Some(methods) = &metadata.code_challenge_methods_supported {
                if !methods.iter().any(|m| m == "S256") {
                    return Err(AuthError::Incompatible(
                        "authorization server does not support code challenge method S256"
                            .to_string(),
                    ));
                }
            }
            Url::parse(&metadata.authorization_endpoint)?
        }
        None => server_url.join("/authorize")?,
    };

    let pair = PkcePair::generate();

    {
        let mut query = authorization_url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &params.client_information.client_id);
        query.append_pair("code_challenge", &pair.challenge);
        query.append_pair("code_challenge_method", pkce::CODE_CHALLENGE_METHOD);
        query.append_pair("redirect_uri", params.redirect_url.as_str());
        if let Some(state) = params.state {
            query.append_pair("state", state);
        }
        if let Some(scope) = params.scope {
            query.append_pair("scope", scope);
            if scope.split_whitespace().any(|token| token == "offline_access") {
                query.append_pair("prompt", "consent");
            }
        }
        if let Some(resource) = params.resource {
            query.append_pair("resource", resource.as_str());
        }
    }

    Ok(StartedAuthorization {
        authorization_url,
        code_verifier: pair.verifier,
    })
}

// ---------------------------------------------------------------------------
// Token endpoint exchanges
// ---------------------------------------------------------------------------

/// Resolves the token endpoint from metadata or the conventional location.
fn token_endpoint(server_url: &Url, metadata: Option<&AuthorizationServerMetadata>) -> Result<Url> {
    match metadata {
        Some(metadata) => Ok(Url::parse(&metadata.token_endpoint)?),
        None => Ok(server_url.join("/token")?),
    }
}

/// Fails when the server advertises a grant list without the needed grant.
fn require_grant(metadata: Option<&AuthorizationServerMetadata>, grant: &str) -> Result<()> {
    if let Some(grants) = metadata.and_then(|m| m.grant_types_supported.as_ref()) {
        if !grants.iter().any(|g| g == grant) {
            return Err(AuthError::Incompatible(format!(
                "authorization server does not support grant type {grant}"
            )));
        }
    }
    Ok(())
}

/// POSTs a form-encoded token request and parses the response.
async fn post_token_request(
    http: &reqwest::Client,
    token_url: &Url,
    headers: HeaderMap,
    params: Vec<(String, String)>,
) -> Result<OAuthTokens> {
    let response = http
        .post(token_url.clone())
        .headers(headers)
        .header(ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::Transport(format!("token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(format!("failed to read token response: {e}")))?;

    if !status.is_success() {
        return Err(parse_error_response(status.as_u16(), &body));
    }

    let tokens: OAuthTokens = serde_json::from_str(&body)?;
    Ok(tokens)
}

/// Exchanges an authorization code for tokens (RFC 6749 section 4.1.3).
///
/// Client authentication is applied by the provider's custom authenticator
/// when supplied, otherwise by the method selector in
/// [`crate::client_auth`].
pub async fn exchange_authorization(
    http: &reqwest::Client,
    server_url: &Url,
    params: TokenExchangeParams<'_>,
) -> Result<OAuthTokens> {
    require_grant(params.metadata, "authorization_code")?;
    let token_url = token_endpoint(server_url, params.metadata)?;

    let mut headers = HeaderMap::new();
    let mut form: Vec<(String, String)> = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), params.authorization_code.to_string()),
        (
            "code_verifier".to_string(),
            params.code_verifier.to_string(),
        ),
        ("redirect_uri".to_string(), params.redirect_url.to_string()),
    ];
    if let Some(resource) = params.resource {
        form.push(("resource".to_string(), resource.to_string()));
    }

    prepare_client_authentication(
        params.authenticator,
        params.client_information,
        params.metadata,
        &token_url,
        &mut headers,
        &mut form,
    )
    .await?;

    tracing::debug!("exchanging authorization code at {token_url}");
    post_token_request(http, &token_url, headers, form).await
}

/// Exchanges a refresh token for a new token set (RFC 6749 section 6).
///
/// When the server omits `refresh_token` from its response the previously
/// held refresh token is carried forward, so callers can always persist the
/// returned set verbatim.
pub async fn refresh_authorization(
    http: &reqwest::Client,
    server_url: &Url,
    params: TokenRefreshParams<'_>,
) -> Result<OAuthTokens> {
    require_grant(params.metadata, "refresh_token")?;
    let token_url = token_endpoint(server_url, params.metadata)?;

    let mut headers = HeaderMap::new();
    let mut form: Vec<(String, String)> = vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), params.refresh_token.to_string()),
    ];
    if let Some(resource) = params.resource {
        form.push(("resource".to_string(), resource.to_string()));
    }

    prepare_client_authentication(
        params.authenticator,
        params.client_information,
        params.metadata,
        &token_url,
        &mut headers,
        &mut form,
    )
    .await?;

    tracing::debug!("refreshing tokens at {token_url}");
    let mut tokens = post_token_request(http, &token_url, headers, form).await?;
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(params.refresh_token.to_string());
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Dynamic client registration
// ---------------------------------------------------------------------------

/// Registers a client with the authorization server (RFC 7591).
///
/// # Errors
///
/// [`AuthError::Unsupported`] when metadata is present but advertises no
/// `registration_endpoint`.
pub async fn register_client(
    http: &reqwest::Client,
    server_url: &Url,
    metadata: Option<&AuthorizationServerMetadata>,
    client_metadata: &ClientMetadata,
) -> Result<ClientInformationFull> {
    let registration_url = match metadata {
        Some(metadata) => match &metadata.registration_endpoint {
            Some(endpoint) => Url::parse(endpoint)?,
            None => {
                return Err(AuthError::Unsupported(
                    "authorization server does not support dynamic client registration"
                        .to_string(),
                ))
            }
        },
        None => server_url.join("/register")?,
    };

    tracing::debug!("registering client at {registration_url}");
    let response = http
        .post(registration_url.clone())
        .json(client_metadata)
        .send()
        .await
        .map_err(|e| AuthError::Transport(format!("registration request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(format!("failed to read registration response: {e}")))?;

    if !status.is_success() {
        return Err(parse_error_response(status.as_u16(), &body));
    }

    let information: ClientInformationFull = serde_json::from_str(&body)?;
    Ok(information)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metadata(
        challenge_methods: Option<Vec<&str>>,
        grants: Option<Vec<&str>>,
    ) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: "https://auth.example.com".to_string(),
            authorization_endpoint: "https://auth.example.com/authorize".to_string(),
            token_endpoint: "https://auth.example.com/token".to_string(),
            registration_endpoint: None,
            scopes_supported: None,
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: grants
                .map(|g| g.into_iter().map(str::to_string).collect()),
            code_challenge_methods_supported: challenge_methods
                .map(|m| m.into_iter().map(str::to_string).collect()),
            token_endpoint_auth_methods_supported: None,
            extra: HashMap::new(),
        }
    }

    fn client() -> ClientInformation {
        ClientInformation {
            client_id: "abc123".to_string(),
            client_secret: None,
            client_id_issued_at: None,
            client_secret_expires_at: None,
        }
    }

    fn query_pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // start_authorization
    // -----------------------------------------------------------------------

    #[test]
    fn test_start_authorization_parameter_order_and_values() {
        let server = Url::parse("https://srv.example/mcp").unwrap();
        let meta = metadata(Some(vec!["S256"]), None);
        let redirect = Url::parse("http://127.0.0.1:8765/callback").unwrap();
        let resource = Url::parse("https://srv.example/mcp").unwrap();

        let started = start_authorization(
            &server,
            AuthorizationParams {
                metadata: Some(&meta),
                client_information: &client(),
                redirect_url: &redirect,
                scope: Some("mcp:read"),
                state: Some("xyz"),
                resource: Some(&resource),
            },
        )
        .expect("start");

        let pairs = query_pairs(&started.authorization_url);
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "response_type",
                "client_id",
                "code_challenge",
                "code_challenge_method",
                "redirect_uri",
                "state",
                "scope",
                "resource",
            ]
        );

        let map: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(map["response_type"], "code");
        assert_eq!(map["client_id"], "abc123");
        assert_eq!(map["code_challenge_method"], "S256");
        assert_eq!(map["redirect_uri"], "http://127.0.0.1:8765/callback");
        assert_eq!(map["state"], "xyz");
        assert_eq!(map["scope"], "mcp:read");
        assert_eq!(map["resource"], "https://srv.example/mcp");
        assert_eq!(
            map["code_challenge"],
            crate::pkce::challenge_for(&started.code_verifier)
        );
    }

    #[test]
    fn test_start_authorization_offline_access_requests_consent_prompt() {
        let server = Url::parse("https://srv.example/").unwrap();
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        let started = start_authorization(
            &server,
            AuthorizationParams {
                metadata: None,
                client_information: &client(),
                redirect_url: &redirect,
                scope: Some("openid offline_access"),
                state: None,
                resource: None,
            },
        )
        .expect("start");

        let map: HashMap<_, _> = query_pairs(&started.authorization_url)
            .into_iter()
            .collect();
        assert_eq!(map["prompt"], "consent");
    }

    #[test]
    fn test_start_authorization_substring_scope_does_not_trigger_prompt() {
        let server = Url::parse("https://srv.example/").unwrap();
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        // "offline_access2" is not the offline_access token.
        let started = start_authorization(
            &server,
            AuthorizationParams {
                metadata: None,
                client_information: &client(),
                redirect_url: &redirect,
                scope: Some("offline_access2"),
                state: None,
                resource: None,
            },
        )
        .expect("start");

        let map: HashMap<_, _> = query_pairs(&started.authorization_url)
            .into_iter()
            .collect();
        assert!(!map.contains_key("prompt"));
    }

    #[test]
    fn test_start_authorization_falls_back_to_conventional_endpoint() {
        let server = Url::parse("https://srv.example/mcp").unwrap();
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        let started = start_authorization(
            &server,
            AuthorizationParams {
                metadata: None,
                client_information: &client(),
                redirect_url: &redirect,
                scope: None,
                state: None,
                resource: None,
            },
        )
        .expect("start");

        // Root-relative join: the /mcp path does not survive.
        assert!(started
            .authorization_url
            .as_str()
            .starts_with("https://srv.example/authorize?"));
        let map: HashMap<_, _> = query_pairs(&started.authorization_url)
            .into_iter()
            .collect();
        assert!(!map.contains_key("scope"));
        assert!(!map.contains_key("state"));
    }

    #[test]
    fn test_start_authorization_rejects_missing_code_response_type() {
        let server = Url::parse("https://srv.example/").unwrap();
        let mut meta = metadata(Some(vec!["S256"]), None);
        meta.response_types_supported = vec!["token".to_string()];
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        let err = start_authorization(
            &server,
            AuthorizationParams {
                metadata: Some(&meta),
                client_information: &client(),
                redirect_url: &redirect,
                scope: None,
                state: None,
                resource: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Incompatible(_)));
    }

    #[test]
    fn test_start_authorization_rejects_challenge_list_without_s256() {
        let server = Url::parse("https://srv.example/").unwrap();
        let meta = metadata(Some(vec!["plain"]), None);
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        let err = start_authorization(
            &server,
            AuthorizationParams {
                metadata: Some(&meta),
                client_information: &client(),
                redirect_url: &redirect,
                scope: None,
                state: None,
                resource: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Incompatible(_)));
    }

    #[test]
    fn test_start_authorization_tolerates_absent_challenge_list() {
        // An absent list is not a rejection; the OIDC hard requirement is
        // enforced at discovery time.
        let server = Url::parse("https://srv.example/").unwrap();
        let meta = metadata(None, None);
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();

        let result = start_authorization(
            &server,
            AuthorizationParams {
                metadata: Some(&meta),
                client_information: &client(),
                redirect_url: &redirect,
                scope: None,
                state: None,
                resource: None,
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_verifier_is_fresh_per_invocation() {
        let server = Url::parse("https://srv.example/").unwrap();
        let redirect = Url::parse("http://127.0.0.1/callback").unwrap();
        let info = client();
        let make = |info: &ClientInformation, redirect: &Url| {
            start_authorization(
                &server,
                AuthorizationParams {
                    metadata: None,
                    client_information: info,
                    redirect_url: redirect,
                    scope: None,
                    state: None,
                    resource: None,
                },
            )
            .map(|started| started.code_verifier)
        };
        let a = make(&info, &redirect).unwrap();
        let b = make(&info, &redirect).unwrap();
        assert_ne!(a, b);
    }

    // -----------------------------------------------------------------------
    // token_endpoint / require_grant
    // -----------------------------------------------------------------------

    #[test]
    fn test_token_endpoint_prefers_metadata() {
        let server = Url::parse("https://srv.example/mcp").unwrap();
        let meta = metadata(None, None);
        let url = token_endpoint(&server, Some(&meta)).unwrap();
        assert_eq!(url.as_str(), "https://auth.example.com/token");
    }

    #[test]
    fn test_token_endpoint_conventional_fallback_is_origin_rooted() {
        let server = Url::parse("https://srv.example/mcp/v1").unwrap();
        let url = token_endpoint(&server, None).unwrap();
        assert_eq!(url.as_str(), "https://srv.example/token");
    }

    #[test]
    fn test_require_grant_passes_when_list_absent() {
        let meta = metadata(None, None);
        assert!(require_grant(Some(&meta), "authorization_code").is_ok());
        assert!(require_grant(None, "refresh_token").is_ok());
    }

    #[test]
    fn test_require_grant_rejects_missing_advertised_grant() {
        let meta = metadata(None, Some(vec!["client_credentials"]));
        let err = require_grant(Some(&meta), "authorization_code").unwrap_err();
        assert!(matches!(err, AuthError::Incompatible(_)));
    }

    #[test]
    fn test_require_grant_accepts_advertised_grant() {
        let meta = metadata(None, Some(vec!["authorization_code", "refresh_token"]));
        assert!(require_grant(Some(&meta), "refresh_token").is_ok());
    }
}
