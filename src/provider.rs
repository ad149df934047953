//! Session provider contract
//!
//! The client core owns no mutable state: everything that must survive the
//! redirect boundary (client registration, tokens, the PKCE verifier) lives
//! behind an embedder-supplied [`OAuthClientProvider`].  Providers may be
//! backed by anything from an in-memory map to remote storage; all methods
//! are async so both kinds implement the same trait.
//!
//! Optional capabilities are modelled two ways, matching how each is
//! consumed:
//!
//! - accessors returning `Option<&dyn Trait>` for behavior overrides
//!   ([`OAuthClientProvider::client_authenticator`],
//!   [`OAuthClientProvider::resource_validator`]) -- a provider that wants
//!   the capability implements the companion trait, often on itself;
//! - default method bodies for hooks that are safe to no-op
//!   ([`OAuthClientProvider::state`],
//!   [`OAuthClientProvider::invalidate_credentials`]).
//!
//! The provider is solely responsible for serializing concurrent flows
//! against the same session; the core never spawns background work.

use async_trait::async_trait;
use url::Url;

use crate::client_auth::ClientAuthenticator;
use crate::error::{AuthError, Result};
use crate::types::{ClientInformation, ClientInformationFull, ClientMetadata, OAuthTokens};

// ---------------------------------------------------------------------------
// CredentialScope
// ---------------------------------------------------------------------------

/// Which persisted artifacts an invalidation discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    /// Client registration, tokens, and verifier.
    All,
    /// The client registration only.
    Client,
    /// Access and refresh tokens only.
    Tokens,
    /// The pending PKCE code verifier only.
    Verifier,
}

// ---------------------------------------------------------------------------
// ResourceValidator
// ---------------------------------------------------------------------------

/// Embedder override for resource-indicator selection.
///
/// When a provider supplies one, its result is authoritative: the built-in
/// origin/path compatibility check in [`crate::resource::select_resource_url`]
/// is skipped entirely.
#[async_trait]
pub trait ResourceValidator: Send + Sync {
    /// Decides the resource indicator for a flow.
    ///
    /// `server_url` is the canonicalized server URL; `metadata_resource` is
    /// the `resource` value from discovered protected-resource metadata,
    /// when any was obtained.  Returning `Ok(None)` omits the `resource`
    /// parameter from the flow.
    async fn validate(
        &self,
        server_url: &Url,
        metadata_resource: Option<&str>,
    ) -> Result<Option<Url>>;
}

// ---------------------------------------------------------------------------
// OAuthClientProvider
// ---------------------------------------------------------------------------

/// The capability set the orchestrator consumes from its embedder.
///
/// Required methods cover the artifacts every flow touches.  The
/// registration pair ([`Self::supports_client_registration`] /
/// [`Self::save_client_information`]) is required only when dynamic client
/// registration may occur; the defaults refuse it.
#[async_trait]
pub trait OAuthClientProvider: Send + Sync {
    /// Absolute redirect URL registered (or to be registered) with the
    /// authorization server.
    fn redirect_url(&self) -> Url;

    /// RFC 7591 registration body used for dynamic client registration.
    fn client_metadata(&self) -> ClientMetadata;

    /// Opaque per-flow `state` token, when the embedder tracks one.
    async fn state(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Loads the persisted client registration, if any.
    async fn client_information(&self) -> Result<Option<ClientInformation>>;

    /// Whether [`Self::save_client_information`] is implemented.
    ///
    /// The orchestrator checks this before registering so that a client is
    /// never registered with a server and then dropped on the floor.
    fn supports_client_registration(&self) -> bool {
        false
    }

    /// Persists a fresh dynamic client registration.
    async fn save_client_information(&self, info: ClientInformationFull) -> Result<()> {
        let _ = info;
        Err(AuthError::Unsupported(
            "provider cannot persist dynamic client registration".to_string(),
        ))
    }

    /// Loads the current token set, if any.
    async fn tokens(&self) -> Result<Option<OAuthTokens>>;

    /// Persists tokens after a successful exchange or refresh.
    async fn save_tokens(&self, tokens: OAuthTokens) -> Result<()>;

    /// Loads the PKCE verifier persisted before the pending redirect.
    ///
    /// Providers should fail with [`AuthError::StateMissing`] when no
    /// verifier has been saved.
    async fn code_verifier(&self) -> Result<String>;

    /// Persists the PKCE verifier; always called before
    /// [`Self::redirect_to_authorization`].
    async fn save_code_verifier(&self, verifier: String) -> Result<()>;

    /// Sends the user agent to the authorization endpoint.
    async fn redirect_to_authorization(&self, authorization_url: Url) -> Result<()>;

    /// Custom token endpoint authentication, overriding the built-in
    /// selector entirely when present.
    fn client_authenticator(&self) -> Option<&dyn ClientAuthenticator> {
        None
    }

    /// Custom resource-indicator validation, overriding the built-in
    /// compatibility check when present.
    fn resource_validator(&self) -> Option<&dyn ResourceValidator> {
        None
    }

    /// Discards persisted artifacts after the server rejected them.
    ///
    /// Providers without revocable storage may leave this as the default
    /// no-op; the orchestrator's retry will then re-read whatever is still
    /// persisted.
    async fn invalidate_credentials(&self, scope: CredentialScope) -> Result<()> {
        let _ = scope;
        Ok(())
    }
}
