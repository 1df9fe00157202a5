//! QUIC key derivation: initial secrets and per-level packet keys.
//!
//! Initial secrets are extracted from the client's first Destination
//! Connection ID with the QUIC v1 salt; every level then expands its
//! directional traffic secrets into an AEAD key ("quic key"), a nonce base
//! ("quic iv"), and the level-wide packet-number secret ("pn").

use crate::crypto::hkdf::{expand_label, extract};
use crate::crypto::{AeadKey, DirectionalKeys, Secret};
use crate::error::Error;
use zeroize::Zeroizing;

/// QUIC v1 initial salt (RFC 9001 §5.2).
pub const INITIAL_SALT_V1: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

/// Secrets anchoring the initial encryption level.
pub struct InitialSecrets {
    /// HKDF-Extract(salt, cid); kept as the "derived" input of the
    /// handshake transition.
    pub initial: Secret,
    pub client: Secret,
    pub server: Secret,
    /// Packet-number secret shared by both directions of the level.
    pub pn: Secret,
}

/// Derive the full initial secret family from the connection ID that
/// salted the first Initial packet. Both roles call this with the same
/// bytes and obtain identical material.
pub fn derive_initial_secrets(cid: &[u8]) -> Result<InitialSecrets, Error> {
    let initial = Zeroizing::new(extract(&INITIAL_SALT_V1, cid));

    let mut client = Zeroizing::new([0u8; 32]);
    let mut server = Zeroizing::new([0u8; 32]);
    expand_label(&*initial, b"client in", &[], &mut *client)?;
    expand_label(&*initial, b"server in", &[], &mut *server)?;
    let pn = derive_pn_secret(&initial, &[])?;

    Ok(InitialSecrets {
        initial,
        client,
        server,
        pn,
    })
}

/// Expand a directional traffic secret into its AEAD key and IV.
pub fn derive_packet_keys(secret: &[u8; 32]) -> Result<([u8; 16], [u8; 12]), Error> {
    let mut key = [0u8; 16];
    let mut iv = [0u8; 12];
    expand_label(secret, b"quic key", &[], &mut key)?;
    expand_label(secret, b"quic iv", &[], &mut iv)?;
    Ok((key, iv))
}

/// Derive a level's packet-number secret from its parent secret.
///
/// The context is the same transcript hash that contextualized the level's
/// traffic secrets (empty at the initial level).
pub fn derive_pn_secret(parent: &[u8; 32], context: &[u8]) -> Result<Secret, Error> {
    let mut pn = Zeroizing::new([0u8; 32]);
    expand_label(parent, b"pn", context, &mut *pn)?;
    Ok(pn)
}

/// Build ready-to-use directional keys from a traffic secret.
pub fn directional_keys(secret: &[u8; 32]) -> Result<DirectionalKeys, Error> {
    let (key, iv) = derive_packet_keys(secret)?;
    Ok(DirectionalKeys {
        aead: AeadKey::new(&key),
        iv,
    })
}
