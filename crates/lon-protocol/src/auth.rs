//! Authentication (§4.3): when a data-point or message's authenticated
//! flag is set, an outgoing request carries a challenge; the peer returns
//! an encrypted response computed from the shared key derived from the
//! domain key. OMA (OEM Message Authentication) replaces the legacy
//! scheme when the domain's auth-type attribute selects it.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Legacy,
    Oma,
}

/// An outgoing challenge. `nonce` must not repeat for a given key within
/// the lifetime of an outstanding transaction; the caller (the transport
/// layer) supplies it from a monotonic counter rather than this crate
/// reaching for entropy it has no way to source on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: u64,
}

impl Challenge {
    pub fn new(nonce: u64) -> Self {
        Self { nonce }
    }

    pub fn expected_response(&self, key: &[u8; 12], scheme: AuthScheme) -> [u8; 8] {
        compute_response(key, self.nonce, scheme)
    }

    /// Validates a peer's response. A mismatch does not reject the
    /// message: the caller delivers it with `authenticated=false` and
    /// leaves policy to the application (§4.3, §7).
    pub fn verify(&self, key: &[u8; 12], scheme: AuthScheme, response: &[u8; 8]) -> bool {
        self.expected_response(key, scheme) == *response
    }
}

fn compute_response(key: &[u8; 12], nonce: u64, scheme: AuthScheme) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(nonce.to_le_bytes());
    hasher.update([match scheme {
        AuthScheme::Legacy => 0u8,
        AuthScheme::Oma => 1u8,
    }]);
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_response_verifies() {
        let key = [7u8; 12];
        let challenge = Challenge::new(42);
        let response = challenge.expected_response(&key, AuthScheme::Legacy);
        assert!(challenge.verify(&key, AuthScheme::Legacy, &response));
    }

    #[test]
    fn oma_and_legacy_diverge_for_same_key_and_nonce() {
        let key = [7u8; 12];
        let challenge = Challenge::new(42);
        let legacy = challenge.expected_response(&key, AuthScheme::Legacy);
        let oma = challenge.expected_response(&key, AuthScheme::Oma);
        assert_ne!(legacy, oma);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let challenge = Challenge::new(1);
        let response = challenge.expected_response(&[1u8; 12], AuthScheme::Legacy);
        assert!(!challenge.verify(&[2u8; 12], AuthScheme::Legacy, &response));
    }
}
