//! TLS 1.3 handshake machinery specialized for QUIC.
//!
//! QUIC carries raw handshake records inside CRYPTO frames — there is no
//! TLS record layer and no TLS content encryption; packet protection is
//! QUIC's own. Transport parameters ride along as a TLS extension.

pub mod extensions;
pub mod key_schedule;
pub mod messages;
pub mod transcript;
pub mod transport_params;

/// Which end of the connection this state machine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// TLS protocol version selected in supported_versions.
pub const TLS13: u16 = 0x0304;
/// Legacy version pinned in the hello headers.
pub const LEGACY_VERSION: u16 = 0x0303;
/// The single supported cipher suite: TLS_AES_128_GCM_SHA256.
pub const CIPHER_AES128_GCM_SHA256: u16 = 0x1301;
/// The single supported key-exchange group: secp256r1.
pub const GROUP_SECP256R1: u16 = 0x0017;
