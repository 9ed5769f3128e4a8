//! PKCE (Proof Key for Code Exchange) utilities for OAuth 2.0
//!
//! Implements PKCE as defined in RFC 7636 with the S256 (SHA-256) challenge
//! method, plus generation of the CSRF state parameter. The verifier and the
//! state are seeded independently; neither is ever derived from the other.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Verifier length in characters. RFC 7636 requires 43-128.
const VERIFIER_LEN: usize = 64;

/// State nonce length in characters
const STATE_LEN: usize = 32;

/// PKCE pair for one authorization attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceChallenge {
    /// Code verifier (random string, 43-128 characters)
    pub code_verifier: String,

    /// Code challenge (BASE64URL(SHA256(code_verifier)))
    pub code_challenge: String,

    /// Challenge method (always "S256")
    pub code_challenge_method: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier/challenge pair
    pub fn generate() -> Self {
        let code_verifier = generate_verifier();
        let code_challenge = generate_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: "S256".to_string(),
        }
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}

/// Generate a cryptographically random code verifier
///
/// 64 characters from the RFC 7636 unreserved set (A-Z, a-z, 0-9).
pub fn generate_verifier() -> String {
    random_urlsafe(VERIFIER_LEN)
}

/// Derive the code challenge for a verifier: base64url-encoded SHA-256,
/// no padding
pub fn generate_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state nonce for CSRF protection
///
/// The state binds the browser redirect to this session; the verifier binds
/// the code exchange to the original requester. They are generated from
/// separate draws of the RNG.
pub fn generate_state() -> String {
    random_urlsafe(STATE_LEN)
}
