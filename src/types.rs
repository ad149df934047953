//! OAuth 2.1 wire types
//!
//! Registration request/response records (RFC 7591) and the token endpoint
//! response (RFC 6749 section 5.1).  Fields the core does not consume are
//! preserved in flattened extras maps so that round-tripping through a
//! session store loses nothing the server sent.
//!
//! # References
//!
//! - RFC 7591 <https://www.rfc-editor.org/rfc/rfc7591>
//! - RFC 6749 section 5.1 <https://www.rfc-editor.org/rfc/rfc6749#section-5.1>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ClientMetadata (RFC 7591 registration request)
// ---------------------------------------------------------------------------

/// Declarative client registration metadata sent to the registration
/// endpoint (RFC 7591 section 2).
///
/// # Examples
///
/// ```
/// use mcp_oauth::types::ClientMetadata;
///
/// let metadata = ClientMetadata {
///     redirect_uris: vec!["http://127.0.0.1:8765/callback".to_string()],
///     client_name: Some("example-agent".to_string()),
///     token_endpoint_auth_method: Some("none".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(metadata.redirect_uris.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Redirect URIs registered for the authorization code flow, in
    /// preference order.
    pub redirect_uris: Vec<String>,

    /// Requested token endpoint authentication method
    /// (`client_secret_basic`, `client_secret_post`, or `none`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,

    /// Grant types the client intends to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,

    /// Response types the client intends to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,

    /// Human-readable client name shown on consent screens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Client homepage URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    /// Space-separated default scope string requested at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Contact addresses for the client operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,

    /// Terms-of-service URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    /// Privacy policy URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    /// Software identifier, stable across versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    /// Software version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,

    /// RFC 7591 fields the core does not consume.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// ClientInformation (RFC 7591 registration response, credential subset)
// ---------------------------------------------------------------------------

/// The credential subset of a registered client's identity: what the token
/// endpoint needs to authenticate the client.
///
/// A client without a `client_secret` is a public client and may only use
/// the `none` token endpoint authentication method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInformation {
    /// The client identifier issued by the authorization server.
    pub client_id: String,

    /// The client secret, absent for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Epoch seconds at which the client identifier was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<u64>,

    /// Epoch seconds at which the client secret expires; `0` means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<u64>,
}

impl ClientInformation {
    /// Returns `true` when a `client_secret` is present.
    pub fn has_secret(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Returns `true` when the registered client secret has expired.
    ///
    /// Per RFC 7591 a `client_secret_expires_at` of `0` means the secret
    /// never expires; an absent field is treated the same way.
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_oauth::types::ClientInformation;
    ///
    /// let info = ClientInformation {
    ///     client_id: "abc".to_string(),
    ///     client_secret: Some("shh".to_string()),
    ///     client_id_issued_at: None,
    ///     client_secret_expires_at: Some(0),
    /// };
    /// assert!(!info.client_secret_expired());
    /// ```
    pub fn client_secret_expired(&self) -> bool {
        match self.client_secret_expires_at {
            None | Some(0) => false,
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at as i64,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientInformationFull (complete RFC 7591 registration response)
// ---------------------------------------------------------------------------

/// The complete record returned by a registration endpoint, including the
/// management fields and the echoed registration metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInformationFull {
    /// The client identifier issued by the authorization server.
    pub client_id: String,

    /// The client secret, absent for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Epoch seconds at which the client identifier was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<u64>,

    /// Epoch seconds at which the client secret expires; `0` means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<u64>,

    /// Token for subsequent registration management requests
    /// (RFC 7592).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<String>,

    /// URI for subsequent registration management requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_client_uri: Option<String>,

    /// Echo of the registered metadata plus any server additions.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ClientInformationFull {
    /// Extracts the credential subset used by token requests.
    pub fn as_client_information(&self) -> ClientInformation {
        ClientInformation {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            client_id_issued_at: self.client_id_issued_at,
            client_secret_expires_at: self.client_secret_expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// OAuthTokens (RFC 6749 token endpoint response)
// ---------------------------------------------------------------------------

/// A successful token endpoint response (RFC 6749 section 5.1).
///
/// When a refresh response omits `refresh_token`, the flow carries the
/// previously held refresh token forward; see
/// [`crate::flow::refresh_authorization`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token string.
    pub access_token: String,

    /// The token type, typically `"Bearer"`.
    pub token_type: String,

    /// OpenID Connect ID token, when the `openid` scope was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Space-separated scopes actually granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Refresh token for obtaining a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
