//! Running handshake transcript hash.
//!
//! Every handshake record that is sent or accepted — header and body — is
//! folded into a SHA-256 state in TLS canonical order. Intermediate digests
//! come from finalizing a clone, so the state keeps absorbing afterwards.

use sha2::{Digest, Sha256};

pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Absorb one full handshake record.
    pub fn absorb(&mut self, record: &[u8]) {
        self.hasher.update(record);
    }

    /// Digest of everything absorbed so far.
    pub fn digest(&self) -> [u8; 32] {
        self.hasher.clone().finalize().into()
    }

    /// Discard the accumulated transcript once nothing derives from it
    /// any more (after the server accepts the client Finished).
    pub fn reset(&mut self) {
        self.hasher = Sha256::new();
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_one_shot_hash() {
        let mut t = Transcript::new();
        t.absorb(b"client");
        t.absorb(b"hello");
        let expected: [u8; 32] = Sha256::digest(b"clienthello").into();
        assert_eq!(t.digest(), expected);
    }

    #[test]
    fn digest_does_not_consume() {
        let mut t = Transcript::new();
        t.absorb(b"record");
        assert_eq!(t.digest(), t.digest());
        t.absorb(b"more");
        assert_ne!(t.digest(), Sha256::digest(b"record").as_slice());
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut t = Transcript::new();
        t.absorb(b"anything");
        t.reset();
        let empty: [u8; 32] = Sha256::digest(b"").into();
        assert_eq!(t.digest(), empty);
    }
}
