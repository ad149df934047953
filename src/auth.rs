//! Top-level authorization orchestration
//!
//! [`auth`] is the single entry point embedders call, typically after a
//! protected request came back `401 Unauthorized`.  It composes discovery,
//! dynamic registration, and the flow primitives into one state machine
//! driven by whatever the session provider has persisted:
//!
//! - an authorization code pending exchange → redeem it, persist tokens,
//!   [`AuthResult::Authorized`];
//! - a refresh token → try a refresh, persist on success; a server-side
//!   failure falls through to a fresh authorization;
//! - otherwise → build an authorization URL, persist the PKCE verifier,
//!   trigger the provider's redirect, [`AuthResult::Redirect`].
//!
//! A single recovery wrapper retries once after invalidating credentials
//! when the server reports `invalid_client`, `unauthorized_client`, or
//! `invalid_grant` -- stale registrations and revoked grants heal without
//! embedder involvement.

use url::Url;

use crate::discovery::{
    fetch_authorization_server_metadata, fetch_protected_resource_metadata,
};
use crate::error::{AuthError, OAuthErrorCode, Result};
use crate::flow::{
    exchange_authorization, refresh_authorization, register_client, start_authorization,
    AuthorizationParams, TokenExchangeParams, TokenRefreshParams,
};
use crate::provider::{CredentialScope, OAuthClientProvider};
use crate::resource::select_resource_url;

// ---------------------------------------------------------------------------
// Request and result types
// ---------------------------------------------------------------------------

/// Inputs to one [`auth`] invocation.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Base URL of the resource server to authorize against.
    pub server_url: Url,

    /// Authorization code delivered to the redirect URL, when the embedder
    /// is completing a pending redirect.
    pub authorization_code: Option<String>,

    /// Scope to request; falls back to the provider's registered
    /// `client_metadata.scope` when absent.
    pub scope: Option<String>,

    /// Protected-resource metadata URL from a `WWW-Authenticate` challenge
    /// (see [`crate::discovery::extract_resource_metadata_url`]).
    pub resource_metadata_url: Option<Url>,

    /// Overrides the `MCP-Protocol-Version` header value sent during
    /// discovery.
    pub protocol_version: Option<String>,
}

impl AuthRequest {
    /// Creates a request with only the server URL set.
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            authorization_code: None,
            scope: None,
            resource_metadata_url: None,
            protocol_version: None,
        }
    }
}

/// Outcome of a completed [`auth`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// Tokens are persisted; the embedder may retry its protected request.
    Authorized,
    /// The provider's redirect hook was invoked; the flow resumes when the
    /// embedder calls [`auth`] again with the delivered authorization code.
    Redirect,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Runs the authorization state machine against a session provider.
///
/// The inner flow is wrapped once for recovery: `invalid_client` and
/// `unauthorized_client` invalidate [`CredentialScope::All`] and retry,
/// `invalid_grant` invalidates [`CredentialScope::Tokens`] and retries.
/// A second failure, and every other error, propagates.
///
/// # Examples
///
/// ```no_run
/// use mcp_oauth::auth::{auth, AuthRequest, AuthResult};
/// use mcp_oauth::provider::OAuthClientProvider;
/// use url::Url;
///
/// # async fn example(provider: &dyn OAuthClientProvider) -> mcp_oauth::error::Result<()> {
/// let http = reqwest::Client::new();
/// let request = AuthRequest::new(Url::parse("https://srv.example/mcp")?);
///
/// match auth(&http, provider, &request).await? {
///     AuthResult::Authorized => { /* retry the protected request */ }
///     AuthResult::Redirect => { /* wait for the callback to deliver a code */ }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn auth(
    http: &reqwest::Client,
    provider: &dyn OAuthClientProvider,
    request: &AuthRequest,
) -> Result<AuthResult> {
    match auth_internal(http, provider, request).await {
        Err(AuthError::OAuth {
            code: code @ (OAuthErrorCode::InvalidClient | OAuthErrorCode::UnauthorizedClient),
            ..
        }) => {
            tracing::warn!("server rejected client ({code}); invalidating credentials and retrying");
            provider.invalidate_credentials(CredentialScope::All).await?;
            auth_internal(http, provider, request).await
        }
        Err(AuthError::OAuth {
            code: OAuthErrorCode::InvalidGrant,
            ..
        }) => {
            tracing::warn!("server rejected grant; invalidating tokens and retrying");
            provider
                .invalidate_credentials(CredentialScope::Tokens)
                .await?;
            auth_internal(http, provider, request).await
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Inner state machine
// ---------------------------------------------------------------------------

async fn auth_internal(
    http: &reqwest::Client,
    provider: &dyn OAuthClientProvider,
    request: &AuthRequest,
) -> Result<AuthResult> {
    let protocol_version = request.protocol_version.as_deref();

    // Step 1: protected resource discovery.  Absence is normal; any failure
    // degrades to treating the server URL as its own authorization server.
    let mut authorization_server_url = request.server_url.clone();
    let resource_metadata = match fetch_protected_resource_metadata(
        http,
        &request.server_url,
        request.resource_metadata_url.as_ref(),
        protocol_version,
    )
    .await
    {
        Ok(metadata) => {
            if let Some(first) = metadata.authorization_servers.first() {
                authorization_server_url = Url::parse(first)?;
            }
            Some(metadata)
        }
        Err(err) => {
            tracing::debug!(
                "protected resource discovery failed ({err}); using server URL as authorization server"
            );
            None
        }
    };

    // Step 2: resolve the resource indicator.
    let resource =
        select_resource_url(&request.server_url, provider, resource_metadata.as_ref()).await?;

    // Step 3: authorization server discovery.  Metadata may be absent; the
    // primitives fall back to conventional endpoints.
    let metadata =
        fetch_authorization_server_metadata(http, &authorization_server_url, protocol_version)
            .await?;

    // Step 4: client identity, registering dynamically when necessary.
    let client_information = match provider.client_information().await? {
        Some(info) => info,
        None => {
            if request.authorization_code.is_some() {
                return Err(AuthError::StateMissing(
                    "existing client information is required when exchanging an authorization code"
                        .to_string(),
                ));
            }
            if !provider.supports_client_registration() {
                return Err(AuthError::Unsupported(
                    "provider cannot persist dynamic client registration".to_string(),
                ));
            }

            let full = register_client(
                http,
                &authorization_server_url,
                metadata.as_ref(),
                &provider.client_metadata(),
            )
            .await?;
            tracing::debug!("registered client {}", full.client_id);

            let info = full.as_client_information();
            provider.save_client_information(full).await?;
            info
        }
    };

    // Step 5a: a delivered authorization code takes priority.
    if let Some(code) = &request.authorization_code {
        let code_verifier = provider.code_verifier().await?;
        let redirect_url = provider.redirect_url();
        let tokens = exchange_authorization(
            http,
            &authorization_server_url,
            TokenExchangeParams {
                metadata: metadata.as_ref(),
                client_information: &client_information,
                authorization_code: code,
                code_verifier: &code_verifier,
                redirect_url: &redirect_url,
                resource: resource.as_ref(),
                authenticator: provider.client_authenticator(),
            },
        )
        .await?;
        provider.save_tokens(tokens).await?;
        return Ok(AuthResult::Authorized);
    }

    // Step 5b: try a refresh when one is possible.
    let tokens = provider.tokens().await?;
    if let Some(refresh_token) = tokens.as_ref().and_then(|t| t.refresh_token.as_deref()) {
        let refreshed = refresh_authorization(
            http,
            &authorization_server_url,
            TokenRefreshParams {
                metadata: metadata.as_ref(),
                client_information: &client_information,
                refresh_token,
                resource: resource.as_ref(),
                authenticator: provider.client_authenticator(),
            },
        )
        .await;

        match refreshed {
            Ok(new_tokens) => {
                provider.save_tokens(new_tokens).await?;
                return Ok(AuthResult::Authorized);
            }
            Err(err) => match &err {
                // Protocol errors other than server_error are definitive.
                AuthError::OAuth { code, .. } if *code != OAuthErrorCode::ServerError => {
                    return Err(err)
                }
                _ => {
                    tracing::warn!("token refresh failed ({err}); starting new authorization");
                }
            },
        }
    }

    // Step 6: fresh authorization redirect.
    let state = provider.state().await?;
    let client_metadata = provider.client_metadata();
    let scope = request
        .scope
        .as_deref()
        .or(client_metadata.scope.as_deref());
    let redirect_url = provider.redirect_url();

    let started = start_authorization(
        &authorization_server_url,
        AuthorizationParams {
            metadata: metadata.as_ref(),
            client_information: &client_information,
            redirect_url: &redirect_url,
            scope,
            state: state.as_deref(),
            resource: resource.as_ref(),
        },
    )?;

    provider.save_code_verifier(started.code_verifier).await?;
    provider
        .redirect_to_authorization(started.authorization_url)
        .await?;
    Ok(AuthResult::Redirect)
}
