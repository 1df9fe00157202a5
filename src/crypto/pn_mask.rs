//! Packet-number obfuscation.
//!
//! The encoded packet number is XORed with an AES-128-CTR keystream before
//! it goes on the wire. The CTR key is the first 16 bytes of the level's
//! packet-number secret; the initial counter block is a 16-byte sample of
//! the ciphertext, so the mask changes per packet without extra state.
//!
//! XOR makes the mask involutive: applying the same keystream again
//! restores the original bytes, which is how the receiver recovers the
//! packet number.

use crate::error::Error;
use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

/// Ciphertext sample length used to seed the keystream.
pub const SAMPLE_LEN: usize = 16;

type Aes128Ctr = Ctr128BE<Aes128>;

/// Packet-number protection key for one encryption level.
pub struct PnMask {
    key: [u8; 16],
}

impl PnMask {
    /// Build from a level's 32-byte packet-number secret.
    pub fn new(pn_secret: &[u8; 32]) -> Self {
        let mut key = [0u8; 16];
        key.copy_from_slice(&pn_secret[..16]);
        Self { key }
    }

    /// XOR the keystream seeded by `sample` over `pn_bytes`.
    ///
    /// Used for both protecting and unprotecting.
    pub fn apply(&self, sample: &[u8], pn_bytes: &mut [u8]) -> Result<(), Error> {
        if sample.len() != SAMPLE_LEN {
            return Err(Error::Crypto);
        }
        let mut block = [0u8; SAMPLE_LEN];
        block.copy_from_slice(sample);
        let mut cipher = Aes128Ctr::new(&self.key.into(), &block.into());
        cipher.apply_keystream(pn_bytes);
        Ok(())
    }
}
