/// Errors surfaced by the crypto core.
///
/// Negotiation and authentication failures are fatal for the connection:
/// the caller converts them into a TLS alert and closes. `DecryptError` is
/// the one exception — a packet that fails AEAD authentication is dropped
/// silently and never reported to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peer offered or selected an unsupported TLS version.
    TlsVersion,
    /// No mutually supported cipher suite.
    NoCipher,
    /// No mutually supported signature algorithm.
    NoSignatureAlg,
    /// No mutually supported key-exchange group.
    NoGroup,
    /// Missing or malformed key_share entry.
    KeyShare,
    /// Certificate chain malformed, or a chain signature did not verify.
    Cert,
    /// CertificateVerify signature did not verify.
    CertVerify,
    /// Finished MAC mismatch.
    Finished,
    /// Transport parameters malformed or out of range.
    InvalidParams,
    /// AEAD tag mismatch while opening a packet.
    DecryptError,
    /// A record or operation that no (role, level, type) transition accepts.
    ProtocolViolation,
    /// A cryptographic primitive failed (bad key length, point decode, ...).
    Crypto,
    /// Caller-provided buffer too small.
    BufferTooSmall { needed: usize },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TlsVersion => write!(f, "unsupported TLS version"),
            Error::NoCipher => write!(f, "no common cipher suite"),
            Error::NoSignatureAlg => write!(f, "no common signature algorithm"),
            Error::NoGroup => write!(f, "no common key-exchange group"),
            Error::KeyShare => write!(f, "missing or malformed key share"),
            Error::Cert => write!(f, "certificate chain rejected"),
            Error::CertVerify => write!(f, "certificate verify signature rejected"),
            Error::Finished => write!(f, "finished MAC mismatch"),
            Error::InvalidParams => write!(f, "invalid transport parameters"),
            Error::DecryptError => write!(f, "packet failed authentication"),
            Error::ProtocolViolation => write!(f, "protocol violation"),
            Error::Crypto => write!(f, "cryptographic operation failed"),
            Error::BufferTooSmall { needed } => {
                write!(f, "buffer too small, need {needed} bytes")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
