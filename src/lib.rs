//! OAuth 2.1 authorization client for MCP resource servers
//!
//! This crate drives the full client-side authorization lifecycle against a
//! resource server that advertises its requirements via RFC 9728 Protected
//! Resource Metadata:
//!
//! 1. protected-resource discovery (RFC 9728) and authorization-server
//!    discovery (RFC 8414 / OpenID Connect Discovery 1.0),
//! 2. dynamic client registration (RFC 7591),
//! 3. the PKCE-protected authorization code flow (RFC 7636) with resource
//!    indicators (RFC 8707),
//! 4. token refresh with rotation handling, and
//! 5. recovery from server-side credential invalidation.
//!
//! Everything that must survive the redirect boundary lives behind an
//! embedder-supplied [`provider::OAuthClientProvider`]; the crate itself
//! holds no state and spawns no background work.
//!
//! # Architecture
//!
//! - [`auth`]: the orchestrating state machine and entry point
//! - [`discovery`]: well-known URL construction and metadata fetching
//! - [`flow`]: the individual RFC-specified HTTP exchanges
//! - [`client_auth`]: token endpoint client authentication selection
//! - [`resource`]: RFC 8707 resource indicator canonicalization
//! - [`pkce`]: S256 verifier/challenge generation
//! - [`provider`]: the session provider contract
//! - [`types`] / [`error`]: wire types and the error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use mcp_oauth::{auth, AuthRequest, AuthResult, OAuthClientProvider};
//! use url::Url;
//!
//! # async fn example(provider: &dyn OAuthClientProvider) -> mcp_oauth::Result<()> {
//! let http = reqwest::Client::new();
//! let request = AuthRequest::new(Url::parse("https://srv.example/mcp")?);
//!
//! match auth(&http, provider, &request).await? {
//!     AuthResult::Authorized => println!("tokens persisted; retry the request"),
//!     AuthResult::Redirect => println!("user agent sent to the authorization server"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client_auth;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod provider;
pub mod resource;
pub mod types;

// Re-export the surface embedders touch most.
pub use auth::{auth, AuthRequest, AuthResult};
pub use error::{AuthError, OAuthErrorCode, Result};
pub use provider::{CredentialScope, OAuthClientProvider, ResourceValidator};
pub use types::{ClientInformation, ClientInformationFull, ClientMetadata, OAuthTokens};
