//! HKDF-SHA256 and the TLS 1.3 HKDF-Expand-Label construction.
//!
//! All key derivation in the crate funnels through these three functions.
//! `expand_label` builds the HkdfLabel info structure from RFC 8446 §7.1:
//!
//! ```text
//! uint16 length
//! opaque label<7..255>   = "tls13 " + label
//! opaque context<0..255> = context
//! ```
//!
//! The context is passed verbatim; callers that derive from a transcript
//! hash the transcript first (see [`derive_secret`]).

use crate::error::Error;
use sha2::{Digest, Sha256};

/// HKDF-Extract over SHA-256.
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    let (prk, _) = hkdf::Hkdf::<Sha256>::extract(Some(salt), ikm);
    prk.into()
}

/// HKDF-Expand-Label with the TLS 1.3 "tls13 " label prefix.
///
/// Output length is taken from `out.len()`; keys take the first 16 bytes of
/// a 32-byte secret expansion, IVs are 12 bytes.
pub fn expand_label(
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    out: &mut [u8],
) -> Result<(), Error> {
    const PREFIX: &[u8] = b"tls13 ";

    let full_label_len = PREFIX.len() + label.len();
    let info_len = 2 + 1 + full_label_len + 1 + context.len();

    // Stack buffer; 80 bytes covers every label/context pair we derive.
    if info_len > 80 {
        return Err(Error::Crypto);
    }
    let mut info = [0u8; 80];
    info[..2].copy_from_slice(&(out.len() as u16).to_be_bytes());
    info[2] = full_label_len as u8;
    info[3..3 + PREFIX.len()].copy_from_slice(PREFIX);
    info[3 + PREFIX.len()..3 + full_label_len].copy_from_slice(label);
    info[3 + full_label_len] = context.len() as u8;
    info[4 + full_label_len..info_len].copy_from_slice(context);

    let hk = hkdf::Hkdf::<Sha256>::from_prk(secret).map_err(|_| Error::Crypto)?;
    hk.expand(&info[..info_len], out).map_err(|_| Error::Crypto)
}

/// Derive-Secret(secret, label, messages) = Expand-Label over the
/// transcript hash. An empty transcript hashes to SHA-256 of nothing.
pub fn derive_secret(secret: &[u8], label: &[u8], transcript: &[u8]) -> Result<[u8; 32], Error> {
    let th: [u8; 32] = Sha256::digest(transcript).into();
    let mut out = [0u8; 32];
    expand_label(secret, label, &th, &mut out)?;
    Ok(out)
}

/// SHA-256 of the empty string, the context of every "derived" step.
pub fn empty_hash() -> [u8; 32] {
    Sha256::digest(b"").into()
}
