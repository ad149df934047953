//! PKCE S256 code verifier and challenge generation
//!
//! Implements the Proof Key for Code Exchange extension (RFC 7636) with the
//! `S256` method mandated by OAuth 2.1.  The verifier travels to the token
//! endpoint during code exchange; the challenge travels once, in the
//! authorization request.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

/// The only challenge method this crate produces.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

// ---------------------------------------------------------------------------
// PkcePair
// ---------------------------------------------------------------------------

/// A PKCE verifier together with its derived S256 challenge.
///
/// # Examples
///
/// ```
/// use mcp_oauth::pkce::PkcePair;
///
/// let pair = PkcePair::generate();
/// assert_eq!(pair.verifier.len(), 43);
/// assert_ne!(pair.verifier, pair.challenge);
/// ```
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// High-entropy code verifier: 32 random bytes as base64url without
    /// padding, 43 characters (RFC 7636 section 4.1 allows 43-128).
    pub verifier: String,

    /// `BASE64URL(SHA256(ASCII(verifier)))` per RFC 7636 section 4.2.
    pub challenge: String,
}

impl PkcePair {
    /// Generates a fresh verifier/challenge pair.
    pub fn generate() -> Self {
        use rand::RngCore as _;

        let mut random_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut random_bytes);

        let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
        let challenge = challenge_for(&verifier);

        Self {
            verifier,
            challenge,
        }
    }
}

/// Derives the S256 challenge for an existing verifier string.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
