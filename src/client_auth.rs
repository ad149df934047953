//! Token endpoint client authentication
//!
//! Selects and applies one of the three RFC 6749 client authentication
//! methods (`client_secret_basic`, `client_secret_post`, `none`) based on
//! what the authorization server advertises in
//! `token_endpoint_auth_methods_supported` and whether the registered client
//! holds a secret.  A session provider may bypass the selector entirely by
//! supplying a [`ClientAuthenticator`].

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use url::Url;

use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, Result};
use crate::types::ClientInformation;

// ---------------------------------------------------------------------------
// ClientAuthMethod
// ---------------------------------------------------------------------------

/// A token endpoint client authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// `client_secret_basic`: credentials in an `Authorization: Basic`
    /// header.
    Basic,
    /// `client_secret_post`: credentials in the form body.
    Post,
    /// `none`: public client, `client_id` only.
    None,
}

impl ClientAuthMethod {
    /// Returns the RFC 7591 registry name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "client_secret_basic",
            Self::Post => "client_secret_post",
            Self::None => "none",
        }
    }
}

// ---------------------------------------------------------------------------
// Custom authenticator seam
// ---------------------------------------------------------------------------

/// Embedder-supplied client authentication.
///
/// When a session provider returns one of these, the built-in selector is
/// skipped and the authenticator alone decides how the pending token request
/// identifies the client.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    /// Mutates the pending token request's headers and form body.
    async fn authenticate(
        &self,
        headers: &mut HeaderMap,
        params: &mut Vec<(String, String)>,
        token_url: &Url,
        metadata: Option<&AuthorizationServerMetadata>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Chooses the authentication method for a client against a server's
/// advertised method list.
///
/// With an empty list the RFC 6749 default applies: `client_secret_post`
/// for confidential clients, `none` for public ones.  `client_secret_basic`
/// is preferred over `client_secret_post` when both are advertised and a
/// secret is held; `none` is used when advertised and nothing better
/// matches.  The fallback mirrors the empty-list default.
///
/// # Examples
///
/// ```
/// use mcp_oauth::client_auth::{select_client_auth_method, ClientAuthMethod};
/// use mcp_oauth::types::ClientInformation;
///
/// let confidential = ClientInformation {
///     client_id: "abc".to_string(),
///     client_secret: Some("shh".to_string()),
///     client_id_issued_at: None,
///     client_secret_expires_at: None,
/// };
///
/// let supported = vec!["client_secret_basic".to_string(), "none".to_string()];
/// assert_eq!(
///     select_client_auth_method(&confidential, &supported),
///     ClientAuthMethod::Basic
/// );
/// ```
pub fn select_client_auth_method(
    client: &ClientInformation,
    supported_methods: &[String],
) -> ClientAuthMethod {
    let has_secret = client.has_secret();

    if supported_methods.is_empty() {
        return if has_secret {
            ClientAuthMethod::Post
        } else {
            ClientAuthMethod::None
        };
    }
    if has_secret && supported_methods.iter().any(|m| m == "client_secret_basic") {
        return ClientAuthMethod::Basic;
    }
    if has_secret && supported_methods.iter().any(|m| m == "client_secret_post") {
        return ClientAuthMethod::Post;
    }
    if supported_methods.iter().any(|m| m == "none") {
        return ClientAuthMethod::None;
    }
    if has_secret {
        ClientAuthMethod::Post
    } else {
        ClientAuthMethod::None
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Applies the chosen method to a pending token request.
///
/// # Errors
///
/// [`AuthError::MissingClientSecret`] when `client_secret_basic` is applied
/// to a client without a secret.
pub fn apply_client_authentication(
    method: ClientAuthMethod,
    client: &ClientInformation,
    headers: &mut HeaderMap,
    params: &mut Vec<(String, String)>,
) -> Result<()> {
    match method {
        ClientAuthMethod::Basic => {
            let secret = client
                .client_secret
                .as_deref()
                .ok_or(AuthError::MissingClientSecret)?;
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", client.client_id, secret));
            let value = HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(|e| AuthError::Transport(format!("invalid Authorization header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        ClientAuthMethod::Post => {
            params.push(("client_id".to_string(), client.client_id.clone()));
            if let Some(secret) = &client.client_secret {
                params.push(("client_secret".to_string(), secret.clone()));
            }
        }
        ClientAuthMethod::None => {
            params.push(("client_id".to_string(), client.client_id.clone()));
        }
    }
    Ok(())
}

/// Authenticates a pending token request: delegates to the provider's
/// custom authenticator when present, otherwise selects and applies a
/// method from the server's advertised list.
pub(crate) async fn prepare_client_authentication(
    authenticator: Option<&dyn ClientAuthenticator>,
    client: &ClientInformation,
    metadata: Option<&AuthorizationServerMetadata>,
    token_url: &Url,
    headers: &mut HeaderMap,
    params: &mut Vec<(String, String)>,
) -> Result<()> {
    if let Some(custom) = authenticator {
        return custom.authenticate(headers, params, token_url, metadata).await;
    }

    let supported = metadata
        .and_then(|m| m.token_endpoint_auth_methods_supported.as_deref())
        .unwrap_or(&[]);
    let method = select_client_auth_method(client, supported);
    tracing::debug!("authenticating token request with {}", method.as_str());
    apply_client_authentication(method, client, headers, params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
