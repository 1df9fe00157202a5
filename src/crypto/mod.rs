//! Cryptographic primitives for QUIC packet protection.
//!
//! The endpoint runs a single suite: AES-128-GCM-SHA256 with ECDHE over
//! secp256r1 and ECDSA-secp256r1-SHA256 signatures, so the primitives are
//! concrete types rather than a pluggable provider.

pub mod aead;
pub mod ecdh;
pub mod ecdsa_p256;
pub mod hkdf;
pub mod key_schedule;
pub mod pn_mask;

pub use aead::AeadKey;
pub use pn_mask::PnMask;

use zeroize::Zeroizing;

/// A 32-byte secret that is wiped when dropped.
pub type Secret = Zeroizing<[u8; 32]>;

/// Encryption level — selects which keys protect a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Initial,
    /// 0-RTT data, protected with material derived from the initial secrets.
    EarlyData,
    Handshake,
    /// 1-RTT application data.
    Protected,
}

impl Level {
    /// Index into per-level tables (offsets, packet-number spaces).
    pub(crate) fn index(self) -> usize {
        match self {
            Level::Initial => 0,
            Level::EarlyData => 1,
            Level::Handshake => 2,
            Level::Protected => 3,
        }
    }
}

/// AEAD key and nonce mask for one direction at one encryption level.
pub struct DirectionalKeys {
    pub aead: AeadKey,
    /// Nonce base — XORed with the packet number to form per-packet nonces.
    pub iv: [u8; 12],
}

impl DirectionalKeys {
    /// Per-packet AEAD nonce: the IV XORed with the packet number
    /// left-padded to 12 bytes, big-endian.
    pub fn nonce(&self, packet_number: u64) -> [u8; 12] {
        let mut nonce = self.iv;
        for (n, p) in nonce[4..].iter_mut().zip(packet_number.to_be_bytes()) {
            *n ^= p;
        }
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn nonce_xors_low_bytes() {
        let dk = DirectionalKeys {
            aead: AeadKey::new(&[0u8; 16]),
            iv: hex!("fa044b2f42a3fd3b46fb255c"),
        };
        assert_eq!(dk.nonce(0), dk.iv);

        let n1 = dk.nonce(1);
        let mut expected = dk.iv;
        expected[11] ^= 1;
        assert_eq!(n1, expected);

        let big = dk.nonce(0x0102_0304_0506_0708);
        let mut expected = dk.iv;
        for (i, b) in [1u8, 2, 3, 4, 5, 6, 7, 8].iter().enumerate() {
            expected[4 + i] ^= b;
        }
        assert_eq!(big, expected);
    }

    #[test]
    fn level_order_is_monotone() {
        assert!(Level::Initial < Level::EarlyData);
        assert!(Level::EarlyData < Level::Handshake);
        assert!(Level::Handshake < Level::Protected);
    }
}
