// pod-core/src/auth/pkce.rs
use std::fmt;

use crate::utils::{generate_secure_token, sha256_base64url};

pub const VERIFIER_LENGTH: usize = 64;
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier and its S256 challenge
#[derive(Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        Self::from_verifier(generate_secure_token(VERIFIER_LENGTH))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

pub fn challenge(verifier: &str) -> String {
    sha256_base64url(verifier)
}
