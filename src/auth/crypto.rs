//! Random-state and PKCE primitives
//!
//! Pure functions over the OS secure-random source. These back the CSRF
//! state parameter and the PKCE S256 verifier/challenge pair.

use crate::{Result, TrackbeatError};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Bytes of entropy behind a state token (256 bits, well past the 128 floor)
const STATE_BYTES: usize = 32;

/// Bytes of entropy behind a code verifier (encodes to 86 chars, inside the
/// 43-128 range RFC 7636 requires)
const VERIFIER_BYTES: usize = 64;

fn random_urlsafe(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TrackbeatError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate an opaque, single-use authorization state token
pub fn generate_state() -> Result<String> {
    random_urlsafe(STATE_BYTES)
}

/// Generate a PKCE code verifier
pub fn generate_code_verifier() -> Result<String> {
    random_urlsafe(VERIFIER_BYTES)
}

/// Derive the S256 code challenge for a verifier
///
/// Deterministic: base64url(SHA-256(verifier)), no padding.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_urlsafe_and_long_enough() {
        let state = generate_state().unwrap();
        // 32 bytes -> 43 base64url chars
        assert_eq!(state.len(), 43);
        assert!(
            state
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_states_do_not_repeat() {
        let a = generate_state().unwrap();
        let b = generate_state().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verifier_length_within_pkce_bounds() {
        let verifier = generate_code_verifier().unwrap();
        assert!((43..=128).contains(&verifier.len()));
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(code_challenge(verifier), code_challenge(verifier));
        // RFC 7636 appendix B reference pair
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_distinct_verifiers_give_distinct_challenges() {
        let a = generate_code_verifier().unwrap();
        let b = generate_code_verifier().unwrap();
        assert_ne!(code_challenge(&a), code_challenge(&b));
    }
}
