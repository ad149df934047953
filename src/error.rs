//! Error types for the OAuth 2.1 client
//!
//! The taxonomy follows RFC 6749 section 5.2: every error code the token and
//! authorization endpoints may return maps to an [`OAuthErrorCode`], carried
//! by [`AuthError::OAuth`] together with the optional `error_description` and
//! `error_uri` fields.  Failures that are not OAuth protocol errors (network
//! failures, incompatible server capabilities, missing session state) get
//! their own variants so that callers can match on the failure kind instead
//! of inspecting message strings.
//!
//! # References
//!
//! - RFC 6749 section 5.2 <https://www.rfc-editor.org/rfc/rfc6749#section-5.2>

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// OAuthErrorCode
// ---------------------------------------------------------------------------

/// An OAuth 2.0 error code as defined by RFC 6749 section 5.2.
///
/// Codes outside the registered set (specification extensions such as
/// `interaction_required`) are preserved verbatim in [`Self::Other`].
///
/// # Examples
///
/// ```
/// use mcp_oauth::error::OAuthErrorCode;
///
/// assert_eq!(OAuthErrorCode::from_code("invalid_grant"), OAuthErrorCode::InvalidGrant);
/// assert_eq!(OAuthErrorCode::InvalidGrant.as_str(), "invalid_grant");
///
/// let ext = OAuthErrorCode::from_code("interaction_required");
/// assert_eq!(ext.as_str(), "interaction_required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthErrorCode {
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_client`
    InvalidClient,
    /// `invalid_grant`
    InvalidGrant,
    /// `unauthorized_client`
    UnauthorizedClient,
    /// `unsupported_grant_type`
    UnsupportedGrantType,
    /// `invalid_scope`
    InvalidScope,
    /// `access_denied`
    AccessDenied,
    /// `unsupported_response_type`
    UnsupportedResponseType,
    /// `server_error`
    ServerError,
    /// `temporarily_unavailable`
    TemporarilyUnavailable,
    /// Any other code, kept verbatim.
    Other(String),
}

impl OAuthErrorCode {
    /// Parses a wire-format error code string.
    pub fn from_code(code: &str) -> Self {
        match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire-format error code string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

/// Errors produced by discovery, the flow primitives, and the orchestrator.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An OAuth 2.0 protocol error returned by the authorization server
    /// (RFC 6749 section 5.2).
    #[error("OAuth error {code}: {}", .description.as_deref().unwrap_or("no description"))]
    OAuth {
        /// The RFC 6749 error code.
        code: OAuthErrorCode,
        /// Optional human-readable `error_description`.
        description: Option<String>,
        /// Optional `error_uri` pointing at documentation.
        uri: Option<String>,
    },

    /// A non-OAuth server failure: the response was not 2xx and the body was
    /// not a parseable RFC 6749 error document.
    #[error("server returned HTTP {status}: {body}")]
    Server {
        /// HTTP status code of the response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Network-level failure: the request produced no HTTP response at all.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server's advertised capabilities do not meet the guarantees this
    /// client requires (missing `code` response type, missing `S256`,
    /// unsupported grant type).
    #[error("incompatible authorization server: {0}")]
    Incompatible(String),

    /// The discovered protected-resource `resource` is not compatible with
    /// the server URL the client was asked to authorize against.
    #[error("protected resource {actual} does not match expected {expected}")]
    ResourceMismatch {
        /// Canonicalized server URL the client expected to be covered.
        expected: String,
        /// The `resource` value advertised by the metadata document.
        actual: String,
    },

    /// Saved session state required by the current step is absent.
    #[error("session state missing: {0}")]
    StateMissing(String),

    /// An optional provider or server capability is absent but required by
    /// the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Convenience wrapper for callers whose protected request failed with
    /// 401 before authorization was attempted.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The resource server does not publish RFC 9728 protected resource
    /// metadata at any probed location.
    #[error("protected resource metadata not implemented: {0}")]
    NotImplemented(String),

    /// `client_secret_basic` was selected for a client without a secret.
    #[error("client_secret_basic authentication requires a client_secret")]
    MissingClientSecret,

    /// URL construction or parsing failure.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Returns the OAuth error code when this is a protocol error.
    pub fn oauth_code(&self) -> Option<&OAuthErrorCode> {
        match self {
            Self::OAuth { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns the HTTP status code, when one is attached.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error-body parsing
// ---------------------------------------------------------------------------

/// The RFC 6749 section 5.2 error document shape.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_uri: Option<String>,
}

/// Maps a non-2xx endpoint response to a typed error.
///
/// The body is parsed as an RFC 6749 error document; when that fails the raw
/// status and body are preserved in [`AuthError::Server`].
///
/// # Examples
///
/// ```
/// use mcp_oauth::error::{parse_error_response, AuthError, OAuthErrorCode};
///
/// let err = parse_error_response(400, r#"{"error":"invalid_grant"}"#);
/// assert_eq!(err.oauth_code(), Some(&OAuthErrorCode::InvalidGrant));
///
/// let err = parse_error_response(502, "Bad Gateway");
/// assert!(matches!(err, AuthError::Server { status: 502, .. }));
/// ```
pub fn parse_error_response(status: u16, body: &str) -> AuthError {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(parsed) => AuthError::OAuth {
            code: OAuthErrorCode::from_code(&parsed.error),
            description: parsed.error_description,
            uri: parsed.error_uri,
        },
        Err(_) => AuthError::Server {
            status,
            body: body.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // OAuthErrorCode
    // -----------------------------------------------------------------------

    #[test]
    fn test_error_code_round_trips_registered_codes() {
        let codes = [
            "invalid_request",
            "invalid_client",
            "invalid_grant",
            "unauthorized_client",
            "unsupported_grant_type",
            "invalid_scope",
            "access_denied",
            "unsupported_response_type",
            "server_error",
            "temporarily_unavailable",
        ];
        for code in codes {
            assert_eq!(OAuthErrorCode::from_code(code).as_str(), code);
        }
    }

    #[test]
    fn test_error_code_preserves_extension_codes() {
        let code = OAuthErrorCode::from_code("interaction_required");
        assert_eq!(
            code,
            OAuthErrorCode::Other("interaction_required".to_string())
        );
        assert_eq!(code.as_str(), "interaction_required");
    }

    #[test]
    fn test_error_code_display_matches_wire_format() {
        assert_eq!(OAuthErrorCode::InvalidGrant.to_string(), "invalid_grant");
    }

    // -----------------------------------------------------------------------
    // parse_error_response
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_error_response_full_document() {
        let body = r#"{
            "error": "invalid_client",
            "error_description": "unknown client",
            "error_uri": "https://auth.example.com/errors/invalid_client"
        }"#;
        let err = parse_error_response(401, body);
        match err {
            AuthError::OAuth {
                code,
                description,
                uri,
            } => {
                assert_eq!(code, OAuthErrorCode::InvalidClient);
                assert_eq!(description.as_deref(), Some("unknown client"));
                assert_eq!(
                    uri.as_deref(),
                    Some("https://auth.example.com/errors/invalid_client")
                );
            }
            other => panic!("expected OAuth error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_response_code_only() {
        let err = parse_error_response(400, r#"{"error":"access_denied"}"#);
        assert_eq!(err.oauth_code(), Some(&OAuthErrorCode::AccessDenied));
    }

    #[test]
    fn test_parse_error_response_falls_back_to_server_error() {
        let err = parse_error_response(503, "<html>maintenance</html>");
        match err {
            AuthError::Server { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("maintenance"));
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_response_non_error_json_falls_back() {
        // Valid JSON that is not an error document still falls back.
        let err = parse_error_response(500, r#"{"message":"boom"}"#);
        assert!(matches!(err, AuthError::Server { status: 500, .. }));
    }

    // -----------------------------------------------------------------------
    // AuthError accessors and display
    // -----------------------------------------------------------------------

    #[test]
    fn test_oauth_error_display_includes_code_and_description() {
        let err = AuthError::OAuth {
            code: OAuthErrorCode::InvalidGrant,
            description: Some("refresh token revoked".to_string()),
            uri: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid_grant"));
        assert!(msg.contains("refresh token revoked"));
    }

    #[test]
    fn test_oauth_error_display_without_description() {
        let err = AuthError::OAuth {
            code: OAuthErrorCode::AccessDenied,
            description: None,
            uri: None,
        };
        assert!(err.to_string().contains("no description"));
    }

    #[test]
    fn test_status_accessor() {
        let err = AuthError::Server {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(AuthError::MissingClientSecret.status(), None);
    }

    #[test]
    fn test_resource_mismatch_display_names_both_urls() {
        let err = AuthError::ResourceMismatch {
            expected: "https://srv.example/mcp".to_string(),
            actual: "https://other.example/".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://srv.example/mcp"));
        assert!(msg.contains("https://other.example/"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
