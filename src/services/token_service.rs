//! Token Service for markd.
//!
//! Random session tokens and sign-in states, PKCE challenges and token
//! hashing, all built on `ring`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use crate::types::errors::AuthError;

/// Session token length in bytes before encoding.
const TOKEN_LENGTH: usize = 32;

/// PKCE verifier length in bytes before encoding (43 chars once encoded).
const VERIFIER_LENGTH: usize = 32;

/// Generates and hashes opaque tokens.
pub struct TokenService {
    rng: SystemRandom,
}

impl TokenService {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    fn random_encoded(&self, len: usize) -> Result<String, AuthError> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::CryptoError("random generation failed".to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(&bytes);
        bytes.zeroize();
        Ok(encoded)
    }

    /// A new session token, URL-safe base64.
    pub fn generate_token(&self) -> Result<String, AuthError> {
        self.random_encoded(TOKEN_LENGTH)
    }

    /// A new sign-in `state` value.
    pub fn generate_state(&self) -> Result<String, AuthError> {
        self.random_encoded(16)
    }

    /// A new PKCE code verifier.
    pub fn generate_verifier(&self) -> Result<String, AuthError> {
        self.random_encoded(VERIFIER_LENGTH)
    }
}

impl Default for TokenService {
    fn default() -> Self {
        Self::new()
    }
}

/// S256 PKCE challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, verifier.as_bytes()).as_ref())
}

/// Hash under which a session token is stored. The raw token never touches disk.
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, token.as_bytes()).as_ref())
}
