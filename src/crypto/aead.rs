//! AES-128-GCM payload protection.
//!
//! The associated data for every packet is the full QUIC header including
//! the unprotected encoded packet number; the 16-byte tag is appended to
//! the ciphertext.

use crate::error::Error;
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce, Tag};

/// AEAD tag length in bytes.
pub const TAG_LEN: usize = 16;
/// AEAD key length in bytes.
pub const KEY_LEN: usize = 16;

/// An AES-128-GCM key bound to one direction of one encryption level.
pub struct AeadKey {
    cipher: Aes128Gcm,
}

impl AeadKey {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes128Gcm::new(key.into()),
        }
    }

    /// Encrypt `buf[..payload_len]` in place and append the tag.
    ///
    /// Returns the ciphertext-plus-tag length.
    pub fn seal_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error> {
        let total = payload_len + TAG_LEN;
        if buf.len() < total {
            return Err(Error::BufferTooSmall { needed: total });
        }
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buf[..payload_len])
            .map_err(|_| Error::Crypto)?;
        buf[payload_len..total].copy_from_slice(&tag);
        Ok(total)
    }

    /// Decrypt `buf[..ciphertext_len]` (ciphertext followed by tag) in place.
    ///
    /// Returns the plaintext length. A tag mismatch yields
    /// [`Error::DecryptError`]; the caller drops the packet silently.
    pub fn open_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        ciphertext_len: usize,
    ) -> Result<usize, Error> {
        if ciphertext_len < TAG_LEN || buf.len() < ciphertext_len {
            return Err(Error::DecryptError);
        }
        let plaintext_len = ciphertext_len - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&buf[plaintext_len..ciphertext_len]);
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                aad,
                &mut buf[..plaintext_len],
                &Tag::from(tag),
            )
            .map_err(|_| Error::DecryptError)?;
        Ok(plaintext_len)
    }
}
