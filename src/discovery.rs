//! OAuth 2.1 / OIDC server discovery
//!
//! Implements RFC 9728 Protected Resource Metadata discovery and RFC 8414 /
//! OpenID Connect Discovery 1.0 authorization-server metadata discovery.
//!
//! # Discovery sequence
//!
//! 1. The client issues an unauthenticated request to the resource server.
//! 2. The server responds `401 Unauthorized`, optionally with a
//!    `WWW-Authenticate` challenge carrying a `resource_metadata` URL
//!    ([`extract_resource_metadata_url`]).
//! 3. [`fetch_protected_resource_metadata`] retrieves that document, or
//!    probes the RFC 9728 well-known URI with a path-aware → origin-root
//!    fallback.
//! 4. The document names one or more authorization servers; the client picks
//!    the first and calls [`fetch_authorization_server_metadata`], which
//!    probes the well-known orderings produced by [`build_discovery_urls`].
//!
//! Every discovery request carries the `MCP-Protocol-Version` header.  A
//! transport-level failure triggers a single retry with the header omitted
//! (some servers reject the header preflight outright); a second failure
//! counts as "no response".
//!
//! # References
//!
//! - RFC 9728 <https://www.rfc-editor.org/rfc/rfc9728>
//! - RFC 8414 <https://www.rfc-editor.org/rfc/rfc8414>
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Header naming the MCP protocol revision the client speaks.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Protocol revision sent when the caller does not override it.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-11-25";

// ---------------------------------------------------------------------------
// Protected Resource Metadata (RFC 9728)
// ---------------------------------------------------------------------------

/// Metadata document describing a protected OAuth 2.1 resource.
///
/// # Examples
///
/// ```
/// use mcp_oauth::discovery::ProtectedResourceMetadata;
///
/// let json = r#"{
///     "resource": "https://api.example.com",
///     "authorization_servers": ["https://auth.example.com"]
/// }"#;
/// let meta: ProtectedResourceMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.authorization_servers.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Canonical URI of the protected resource.
    pub resource: String,

    /// Authorization server issuer URIs protecting this resource, in
    /// preference order.
    #[serde(default)]
    pub authorization_servers: Vec<String>,

    /// OAuth scopes supported by this resource, if advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported methods for presenting bearer tokens (e.g. `"header"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,

    /// RFC 9728 fields the core does not consume.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Authorization Server Metadata (RFC 8414 / OIDC Discovery)
// ---------------------------------------------------------------------------

/// Metadata document describing an OAuth 2.1 / OIDC authorization server.
///
/// The same struct deserializes both RFC 8414 documents and OpenID Connect
/// Discovery documents; [`fetch_authorization_server_metadata`] tracks which
/// well-known family produced the response and applies the OIDC-specific
/// `S256` requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// The issuer identifier URI for this authorization server.
    pub issuer: String,

    /// Authorization endpoint URL (RFC 6749 section 3.1).
    pub authorization_endpoint: String,

    /// Token endpoint URL (RFC 6749 section 3.2).
    pub token_endpoint: String,

    /// Dynamic Client Registration endpoint (RFC 7591), if offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// OAuth scopes the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// `response_type` values the server supports.
    pub response_types_supported: Vec<String>,

    /// `grant_type` values the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// PKCE challenge methods the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Client authentication methods accepted at the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Server metadata fields the core does not consume.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AuthorizationServerMetadata {
    /// Returns `true` when the server advertises PKCE `S256`.
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .any(|m| m == "S256")
    }
}

// ---------------------------------------------------------------------------
// Discovery URL builder
// ---------------------------------------------------------------------------

/// Which well-known family a discovery candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// RFC 8414 `oauth-authorization-server`.
    OAuth,
    /// OpenID Connect Discovery `openid-configuration`.
    Oidc,
}

/// A single well-known URL to probe, tagged with its family.
#[derive(Debug, Clone)]
pub struct DiscoveryCandidate {
    /// The well-known URL.
    pub url: Url,
    /// The metadata family the URL belongs to.
    pub kind: MetadataKind,
}

/// Produces the ordered list of well-known URLs to probe for an
/// authorization server URL.
///
/// For an issuer with no path component the list is the two root documents;
/// for an issuer with a path component `P` (trailing slash stripped) it is:
///
/// 1. `{origin}/.well-known/oauth-authorization-server{P}`
/// 2. `{origin}/.well-known/oauth-authorization-server`
/// 3. `{origin}/.well-known/openid-configuration{P}` (RFC 8414 style)
/// 4. `{origin}{P}/.well-known/openid-configuration` (OIDC 1.0 style)
///
/// The builder performs no I/O.
///
/// # Examples
///
/// ```
/// use mcp_oauth::discovery::{build_discovery_urls, MetadataKind};
/// use url::Url;
///
/// let issuer = Url::parse("https://auth.example.com/tenant1").unwrap();
/// let candidates = build_discovery_urls(&issuer);
/// assert_eq!(candidates.len(), 4);
/// assert_eq!(candidates[0].kind, MetadataKind::OAuth);
/// assert_eq!(
///     candidates[0].url.as_str(),
///     "https://auth.example.com/.well-known/oauth-authorization-server/tenant1"
/// );
/// ```
pub fn build_discovery_urls(authorization_server_url: &Url) -> Vec<DiscoveryCandidate> {
    let mut base = authorization_server_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let at_path = |path: String, kind: MetadataKind| {
        let mut url = base.clone();
        url.set_path(&path);
        DiscoveryCandidate { url, kind }
    };

    let path = authorization_server_url.path();
    if path == "/" || path.is_empty() {
        return vec![
            at_path(
                "/.well-known/oauth-authorization-server".to_string(),
                MetadataKind::OAuth,
            ),
            at_path(
                "/.well-known/openid-configuration".to_string(),
                MetadataKind::Oidc,
            ),
        ];
    }

    let path = path.trim_end_matches('/');
    vec![
        at_path(
            format!("/.well-known/oauth-authorization-server{path}"),
            MetadataKind::OAuth,
        ),
        at_path(
            "/.well-known/oauth-authorization-server".to_string(),
            MetadataKind::OAuth,
        ),
        at_path(
            format!("/.well-known/openid-configuration{path}"),
            MetadataKind::Oidc,
        ),
        at_path(
            format!("{path}/.well-known/openid-configuration"),
            MetadataKind::Oidc,
        ),
    ]
}

// ---------------------------------------------------------------------------
// HTTP plumbing
// ---------------------------------------------------------------------------

/// Issues a GET with the protocol-version header, retrying once without
/// headers on a transport-level failure.  `None` means neither attempt
/// produced an HTTP response.
async fn get_with_cors_retry(
    http: &reqwest::Client,
    url: &Url,
    protocol_version: &str,
) -> Option<reqwest::Response> {
    match http
        .get(url.clone())
        .header(PROTOCOL_VERSION_HEADER, protocol_version)
        .send()
        .await
    {
        Ok(response) => Some(response),
        Err(err) => {
            tracing::debug!("GET {url} failed ({err}); retrying without headers");
            match http.get(url.clone()).send().await {
                Ok(response) => Some(response),
                Err(retry_err) => {
                    tracing::debug!("GET {url} retry failed ({retry_err}); no response");
                    None
                }
            }
        }
    }
}

/// Reads a response body, mapping read failures to [`AuthError::Transport`].
async fn read_body(response: reqwest::Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| AuthError::Transport(format!("failed to read response body: {e}")))
}

// ---------------------------------------------------------------------------
// Protected resource discovery
// ---------------------------------------------------------------------------

/// Fetches the RFC 9728 Protected Resource Metadata document for a resource
/// server.
///
/// When `resource_metadata_url` is supplied (typically extracted from a
/// `WWW-Authenticate` challenge) only that URL is probed.  Otherwise the
/// path-aware well-known URI
/// `/.well-known/oauth-protected-resource{path}` is tried first, falling
/// back to the origin-root document when the path-aware probe yields no
/// response or a 404.
///
/// # Errors
///
/// - [`AuthError::NotImplemented`] when every probe yields 404.
/// - [`AuthError::Transport`] when every probe yields no HTTP response.
/// - [`AuthError::Server`] on any other non-2xx response.
/// - [`AuthError::Serialization`] when a 2xx body is not a valid document.
pub async fn fetch_protected_resource_metadata(
    http: &reqwest::Client,
    server_url: &Url,
    resource_metadata_url: Option<&Url>,
    protocol_version: Option<&str>,
) -> Result<ProtectedResourceMetadata> {
    let version = protocol_version.unwrap_or(DEFAULT_PROTOCOL_VERSION);

    if let Some(metadata_url) = resource_metadata_url {
        let response = get_with_cors_retry(http, metadata_url, version).await;
        return classify_protected_resource(response, false, metadata_url).await;
    }

    let mut base = server_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = server_url.path();
    let path_aware = path != "/" && !path.is_empty();

    let mut probe_url = base.clone();
    if path_aware {
        probe_url.set_path(&format!("/.well-known/oauth-protected-resource{path}"));
    } else {
        probe_url.set_path("/.well-known/oauth-protected-resource");
    }

    let first = get_with_cors_retry(http, &probe_url, version).await;
    let first_absent = match &first {
        None => true,
        Some(response) => response.status().as_u16() == 404,
    };

    if !(path_aware && first_absent) {
        return classify_protected_resource(first, false, &probe_url).await;
    }

    tracing::debug!("{probe_url} absent; falling back to origin well-known URI");
    let first_had_response = first.is_some();
    let mut root_url = base;
    root_url.set_path("/.well-known/oauth-protected-resource");
    let second = get_with_cors_retry(http, &root_url, version).await;
    classify_protected_resource(second, first_had_response, &root_url).await
}

/// Maps the final probe outcome to a metadata document or a typed error.
///
/// `earlier_had_response` distinguishes "the server is unreachable" from
/// "the server is reachable but does not publish the document".
async fn classify_protected_resource(
    response: Option<reqwest::Response>,
    earlier_had_response: bool,
    url: &Url,
) -> Result<ProtectedResourceMetadata> {
    let Some(response) = response else {
        if earlier_had_response {
            return Err(AuthError::NotImplemented(format!(
                "no response from {url}"
            )));
        }
        return Err(AuthError::Transport(format!(
            "no response from protected resource metadata endpoint {url}"
        )));
    };

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(AuthError::NotImplemented(format!(
            "{url} returned 404; resource server does not publish protected resource metadata"
        )));
    }
    if !status.is_success() {
        let body = read_body(response).await.unwrap_or_default();
        return Err(AuthError::Server {
            status: status.as_u16(),
            body,
        });
    }

    let body = read_body(response).await?;
    let metadata: ProtectedResourceMetadata = serde_json::from_str(&body)?;
    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Authorization server discovery
// ---------------------------------------------------------------------------

/// Fetches authorization server metadata, probing the well-known orderings
/// from [`build_discovery_urls`] sequentially.
///
/// Per-candidate outcomes:
///
/// - no HTTP response after the header-less retry: fail with
///   [`AuthError::Transport`] naming the candidate;
/// - any 4xx: continue to the next candidate;
/// - any other non-2xx: fail with [`AuthError::Server`];
/// - 2xx: parse the document.  An OIDC-family document that does not
///   advertise `S256` fails with [`AuthError::Incompatible`].
///
/// Returns `Ok(None)` when every candidate yields 4xx: the server publishes
/// no metadata, and callers fall back to conventional endpoint locations.
pub async fn fetch_authorization_server_metadata(
    http: &reqwest::Client,
    authorization_server_url: &Url,
    protocol_version: Option<&str>,
) -> Result<Option<AuthorizationServerMetadata>> {
    let version = protocol_version.unwrap_or(DEFAULT_PROTOCOL_VERSION);

    for candidate in build_discovery_urls(authorization_server_url) {
        tracing::debug!("probing {} ({:?})", candidate.url, candidate.kind);

        let Some(response) = get_with_cors_retry(http, &candidate.url, version).await else {
            return Err(AuthError::Transport(format!(
                "no response from authorization server metadata endpoint {}",
                candidate.url
            )));
        };

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!("{} returned {status}; trying next candidate", candidate.url);
            continue;
        }
        if !status.is_success() {
            let body = read_body(response).await.unwrap_or_default();
            return Err(AuthError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = read_body(response).await?;
        let metadata: AuthorizationServerMetadata = serde_json::from_str(&body)?;

        if candidate.kind == MetadataKind::Oidc && !metadata.supports_s256() {
            return Err(AuthError::Incompatible(format!(
                "OIDC provider {} does not support S256 code challenges",
                metadata.issuer
            )));
        }

        return Ok(Some(metadata));
    }

    Ok(None)
}

// ---------------------------------------------------------------------------
// WWW-Authenticate extraction
// ---------------------------------------------------------------------------

/// Extracts the `resource_metadata` URL from a 401 response's
/// `WWW-Authenticate` header, if present.
pub fn extract_resource_metadata_url(response: &reqwest::Response) -> Option<Url> {
    let header = response
        .headers()
        .get(reqwest::header::WWW_AUTHENTICATE)?
        .to_str()
        .ok()?;
    resource_metadata_url_from_challenge(header)
}

/// Parses a `WWW-Authenticate` challenge string for a `resource_metadata`
/// parameter.
///
/// The auth scheme token must be `Bearer` (compared case-insensitively);
/// any other scheme, a bare scheme with no parameters, or a missing or
/// unparseable parameter yields `None`.
///
/// # Examples
///
/// ```
/// use mcp_oauth::discovery::resource_metadata_url_from_challenge;
///
/// let challenge = r#"Bearer realm="x", resource_metadata="https://srv.example/.well-known/oauth-protected-resource""#;
/// let url = resource_metadata_url_from_challenge(challenge).unwrap();
/// assert_eq!(url.path(), "/.well-known/oauth-protected-resource");
///
/// assert!(resource_metadata_url_from_challenge(r#"Basic realm="x""#).is_none());
/// ```
pub fn resource_metadata_url_from_challenge(www_authenticate: &str) -> Option<Url> {
    let (scheme, params) = www_authenticate.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let value = challenge_param(params, "resource_metadata")?;
    Url::parse(&value).ok()
}

/// Scans challenge parameters for `key=` and returns its quoted or unquoted
/// value.
fn challenge_param(params: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=");
    let pos = params.find(&needle)?;
    let rest = &params[pos + needle.len()..];

    if let Some(inner) = rest.strip_prefix('"') {
        let end = inner.find('"')?;
        Some(inner[..end].to_string())
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
