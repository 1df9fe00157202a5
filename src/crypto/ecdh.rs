//! ECDHE over secp256r1.
//!
//! The only key-exchange group the endpoint negotiates. Key shares travel
//! as 65-byte uncompressed SEC1 points. The scalar is either ephemeral
//! (from caller-supplied entropy) or, on a server carrying a certificate,
//! the certificate's own private key.

use crate::crypto::Secret;
use crate::error::Error;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

/// Length of an uncompressed SEC1 point: 0x04 || x || y.
pub const PUBLIC_KEY_LEN: usize = 65;

/// A secp256r1 keypair for the connection's key exchange.
pub struct KeyExchange {
    secret: p256::SecretKey,
    public: [u8; PUBLIC_KEY_LEN],
}

impl KeyExchange {
    /// Build a keypair from a 32-byte scalar.
    ///
    /// Fails on the (cryptographically negligible) chance the bytes do not
    /// form a valid non-zero scalar; callers drawing from a CSPRNG can
    /// simply redraw.
    pub fn new(scalar: &[u8; 32]) -> Result<Self, Error> {
        let secret = p256::SecretKey::from_slice(scalar).map_err(|_| Error::Crypto)?;
        let point = secret.public_key().to_encoded_point(false);
        let mut public = [0u8; PUBLIC_KEY_LEN];
        public.copy_from_slice(point.as_bytes());
        Ok(Self { secret, public })
    }

    /// Our key share as an uncompressed SEC1 point.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    /// Run ECDH against the peer's key share.
    ///
    /// Returns the 32-byte x-coordinate of the shared point, the `dhe`
    /// input of the handshake-secret extraction.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<Secret, Error> {
        let peer = p256::PublicKey::from_sec1_bytes(peer_public).map_err(|_| Error::KeyShare)?;
        let shared =
            p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes());
        Ok(out)
    }
}
