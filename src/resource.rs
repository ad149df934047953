//! RFC 8707 resource indicator selection
//!
//! Access tokens are bound to the resource server they are minted for by
//! sending a `resource` parameter in authorization and token requests.  The
//! indicator is the canonicalized server URL, optionally overridden by the
//! `resource` value of discovered protected-resource metadata; a metadata
//! value that does not cover the server URL is rejected rather than silently
//! redirecting tokens to a different audience.
//!
//! # References
//!
//! - RFC 8707 <https://www.rfc-editor.org/rfc/rfc8707>

use url::Url;

use crate::discovery::ProtectedResourceMetadata;
use crate::error::{AuthError, Result};
use crate::provider::OAuthClientProvider;

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

/// Canonicalizes a server URL into a resource indicator.
///
/// The fragment is stripped (forbidden by RFC 8707); scheme and host are
/// already lower-cased by `Url` parsing.  Path and query are preserved.
///
/// # Examples
///
/// ```
/// use mcp_oauth::resource::resource_url_from_server_url;
/// use url::Url;
///
/// let server = Url::parse("HTTPS://SRV.Example/mcp#frag").unwrap();
/// let resource = resource_url_from_server_url(&server);
/// assert_eq!(resource.as_str(), "https://srv.example/mcp");
/// ```
pub fn resource_url_from_server_url(server_url: &Url) -> Url {
    let mut url = server_url.clone();
    url.set_fragment(None);
    url
}

/// Checks whether `requested` falls under `configured`: same origin, and
/// the configured path is a segment-wise prefix of the requested path.
pub fn is_resource_allowed(requested: &Url, configured: &str) -> Result<bool> {
    let configured = Url::parse(configured)?;
    if requested.origin() != configured.origin() {
        return Ok(false);
    }

    // Terminate both paths with a slash so that /mcp does not match /mcpx.
    let mut requested_path = requested.path().to_string();
    let mut configured_path = configured.path().to_string();
    if !requested_path.ends_with('/') {
        requested_path.push('/');
    }
    if !configured_path.ends_with('/') {
        configured_path.push('/');
    }
    Ok(requested_path.starts_with(&configured_path))
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Resolves the resource indicator for a flow.
///
/// A provider-supplied [`crate::provider::ResourceValidator`] is
/// authoritative when present.  Otherwise the metadata's `resource` is used
/// when compatible with the canonicalized server URL, and no indicator is
/// produced when no metadata was discovered.
///
/// # Errors
///
/// [`AuthError::ResourceMismatch`] when the metadata's `resource` does not
/// cover the server URL.
pub async fn select_resource_url(
    server_url: &Url,
    provider: &dyn OAuthClientProvider,
    resource_metadata: Option<&ProtectedResourceMetadata>,
) -> Result<Option<Url>> {
    let default_resource = resource_url_from_server_url(server_url);

    if let Some(validator) = provider.resource_validator() {
        return validator
            .validate(
                &default_resource,
                resource_metadata.map(|m| m.resource.as_str()),
            )
            .await;
    }

    let Some(metadata) = resource_metadata else {
        return Ok(None);
    };

    if !is_resource_allowed(&default_resource, &metadata.resource)? {
        return Err(AuthError::ResourceMismatch {
            expected: default_resource.to_string(),
            actual: metadata.resource.clone(),
        });
    }

    Ok(Some(Url::parse(&metadata.resource)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // resource_url_from_server_url
    // -----------------------------------------------------------------------

    #[test]
    fn test_canonicalization_strips_fragment() {
        let server = Url::parse("https://srv.example/mcp#section").unwrap();
        assert_eq!(
            resource_url_from_server_url(&server).as_str(),
            "https://srv.example/mcp"
        );
    }

    #[test]
    fn test_canonicalization_preserves_path_and_query() {
        let server = Url::parse("https://srv.example/mcp/v1?tenant=a").unwrap();
        assert_eq!(
            resource_url_from_server_url(&server).as_str(),
            "https://srv.example/mcp/v1?tenant=a"
        );
    }

    #[test]
    fn test_canonicalization_lowers_scheme_and_host() {
        // Url::parse already lower-cases these; the helper relies on it.
        let server = Url::parse("HTTPS://SRV.EXAMPLE/MCP").unwrap();
        let resource = resource_url_from_server_url(&server);
        assert_eq!(resource.scheme(), "https");
        assert_eq!(resource.host_str(), Some("srv.example"));
        assert_eq!(resource.path(), "/MCP");
    }

    // -----------------------------------------------------------------------
    // is_resource_allowed
    // -----------------------------------------------------------------------

    #[test]
    fn test_exact_match_is_allowed() {
        let requested = Url::parse("https://srv.example/mcp").unwrap();
        assert!(is_resource_allowed(&requested, "https://srv.example/mcp").unwrap());
    }

    #[test]
    fn test_parent_path_is_allowed() {
        let requested = Url::parse("https://srv.example/mcp/v1").unwrap();
        assert!(is_resource_allowed(&requested, "https://srv.example/mcp").unwrap());
        assert!(is_resource_allowed(&requested, "https://srv.example/").unwrap());
    }

    #[test]
    fn test_partial_segment_is_not_allowed() {
        // /mcp must not be covered by /mc, nor /mcpx by /mcp.
        let requested = Url::parse("https://srv.example/mcpx").unwrap();
        assert!(!is_resource_allowed(&requested, "https://srv.example/mcp").unwrap());
    }

    #[test]
    fn test_child_path_does_not_cover_parent() {
        let requested = Url::parse("https://srv.example/mcp").unwrap();
        assert!(!is_resource_allowed(&requested, "https://srv.example/mcp/v1").unwrap());
    }

    #[test]
    fn test_different_origin_is_not_allowed() {
        let requested = Url::parse("https://srv.example/mcp").unwrap();
        assert!(!is_resource_allowed(&requested, "https://other.example/mcp").unwrap());
        assert!(!is_resource_allowed(&requested, "http://srv.example/mcp").unwrap());
        assert!(!is_resource_allowed(&requested, "https://srv.example:8443/mcp").unwrap());
    }

    #[test]
    fn test_invalid_configured_url_is_an_error() {
        let requested = Url::parse("https://srv.example/mcp").unwrap();
        assert!(is_resource_allowed(&requested, "not a url").is_err());
    }
}
