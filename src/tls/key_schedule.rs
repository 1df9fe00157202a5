//! TLS 1.3 secret schedule specialized for the QUIC handshake.
//!
//! ```text
//!   base secret (the connection's initial secret)
//!             |
//!             +-> Derive-Secret(., "derived", "")
//!             v
//!   ECDHE -> HKDF-Extract = Handshake Secret
//!             |
//!             +-> Derive-Secret(., "c hs traffic", CH..SH)
//!             +-> Derive-Secret(., "s hs traffic", CH..SH)
//!             +-> Derive-Secret(., "derived", "")
//!             v
//!     0  ->  HKDF-Extract = Master Secret
//!             |
//!             +-> Derive-Secret(., "c ap traffic", CH..SF)
//!             +-> Derive-Secret(., "s ap traffic", CH..SF)
//! ```
//!
//! The chain is anchored on the connection's initial secret rather than a
//! PSK-style early secret; resumption is out of scope. Seeding the chain
//! with `HKDF-Extract(0, 0)` reproduces the RFC 8446 schedule, which is
//! how the RFC 8448 trace below pins the construction.

use crate::crypto::hkdf::{empty_hash, expand_label, extract};
use crate::crypto::Secret;
use crate::error::Error;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

pub struct KeySchedule {
    base: Secret,
    handshake_secret: Secret,
    master_secret: Secret,
}

impl KeySchedule {
    /// Anchor the schedule on a base secret — the initial secret extracted
    /// from the connection ID.
    pub fn new(base: Secret) -> Self {
        Self {
            base,
            handshake_secret: Zeroizing::new([0u8; 32]),
            master_secret: Zeroizing::new([0u8; 32]),
        }
    }

    /// Extract the handshake secret from the ECDHE shared secret:
    /// `HKDF-Extract(Derive-Secret(base, "derived", ""), dhe)`.
    pub fn mix_dhe(&mut self, dhe: &[u8; 32]) -> Result<(), Error> {
        let mut salt = [0u8; 32];
        expand_label(&*self.base, b"derived", &empty_hash(), &mut salt)?;
        self.handshake_secret = Zeroizing::new(extract(&salt, dhe));
        Ok(())
    }

    /// Handshake secret — also the parent of the handshake-level
    /// packet-number secret.
    pub fn handshake_secret(&self) -> &[u8; 32] {
        &self.handshake_secret
    }

    /// Master secret — also the parent of the protected-level
    /// packet-number secret.
    pub fn master_secret(&self) -> &[u8; 32] {
        &self.master_secret
    }

    /// Client and server handshake traffic secrets, contextualized by the
    /// transcript hash through ServerHello.
    pub fn handshake_traffic_secrets(&self, th: &[u8; 32]) -> Result<(Secret, Secret), Error> {
        let mut client = Zeroizing::new([0u8; 32]);
        let mut server = Zeroizing::new([0u8; 32]);
        expand_label(&*self.handshake_secret, b"c hs traffic", th, &mut *client)?;
        expand_label(&*self.handshake_secret, b"s hs traffic", th, &mut *server)?;
        Ok((client, server))
    }

    /// Extract the master secret (zero IKM under the "derived" salt).
    pub fn derive_master(&mut self) -> Result<(), Error> {
        let mut salt = [0u8; 32];
        expand_label(&*self.handshake_secret, b"derived", &empty_hash(), &mut salt)?;
        self.master_secret = Zeroizing::new(extract(&salt, &[0u8; 32]));
        Ok(())
    }

    /// Client and server application traffic secrets, contextualized by
    /// the transcript hash through the server Finished.
    pub fn app_traffic_secrets(&self, th: &[u8; 32]) -> Result<(Secret, Secret), Error> {
        let mut client = Zeroizing::new([0u8; 32]);
        let mut server = Zeroizing::new([0u8; 32]);
        expand_label(&*self.master_secret, b"c ap traffic", th, &mut *client)?;
        expand_label(&*self.master_secret, b"s ap traffic", th, &mut *server)?;
        Ok((client, server))
    }
}

/// finished_key = HKDF-Expand-Label(traffic_secret, "finished", "", 32).
pub fn finished_key(traffic_secret: &[u8; 32]) -> Result<Secret, Error> {
    let mut key = Zeroizing::new([0u8; 32]);
    expand_label(traffic_secret, b"finished", &[], &mut *key)?;
    Ok(key)
}

/// verify_data = HMAC-SHA256(finished_key, transcript_hash).
pub fn finished_verify_data(key: &[u8; 32], th: &[u8; 32]) -> [u8; 32] {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(th);
    mac.finalize().into_bytes().into()
}

/// Constant-time check of a received Finished MAC.
pub fn verify_finished(key: &[u8; 32], th: &[u8; 32], received: &[u8]) -> Result<(), Error> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(th);
    mac.verify_slice(received).map_err(|_| Error::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// A schedule anchored on HKDF-Extract(0, 0) is the plain RFC 8446
    /// schedule with no PSK; the RFC 8448 trace applies verbatim.
    fn rfc8446_schedule() -> KeySchedule {
        KeySchedule::new(Zeroizing::new(extract(&[0u8; 32], &[0u8; 32])))
    }

    /// RFC 8448 §3: Handshake Secret from the ECDHE shared secret.
    #[test]
    fn rfc8448_handshake_secret() {
        let mut ks = rfc8446_schedule();
        let dhe = hex!("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");
        ks.mix_dhe(&dhe).unwrap();
        assert_eq!(
            *ks.handshake_secret,
            hex!("1dc826e93606aa6fdc0aadc12f741b01046aa6b99f691ed221a9f0ca043fbeac")
        );
    }

    /// RFC 8448 §3: handshake traffic secrets.
    #[test]
    fn rfc8448_handshake_traffic_secrets() {
        let mut ks = rfc8446_schedule();
        let dhe = hex!("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");
        ks.mix_dhe(&dhe).unwrap();

        let th = hex!("860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8");
        let (client, server) = ks.handshake_traffic_secrets(&th).unwrap();
        assert_eq!(
            *client,
            hex!("b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21")
        );
        assert_eq!(
            *server,
            hex!("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38")
        );
    }

    /// RFC 8448 §3: master secret and application traffic secrets.
    #[test]
    fn rfc8448_master_and_app_secrets() {
        let mut ks = rfc8446_schedule();
        let dhe = hex!("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");
        ks.mix_dhe(&dhe).unwrap();
        ks.derive_master().unwrap();
        assert_eq!(
            *ks.master_secret,
            hex!("18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919")
        );

        let th = hex!("9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13");
        let (client, server) = ks.app_traffic_secrets(&th).unwrap();
        assert_eq!(
            *client,
            hex!("9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5")
        );
        assert_eq!(
            *server,
            hex!("a11af9f05531f856ad47116b45a950328204b4f44bfb6b3a4b4f1f3fcb631643")
        );
    }

    /// RFC 8448 §3: server finished key and client verify_data.
    #[test]
    fn rfc8448_finished() {
        let server_hs =
            hex!("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38");
        let key = finished_key(&server_hs).unwrap();
        assert_eq!(
            *key,
            hex!("008d3b66f816ea559f96b537e885c31fc068bf492c652f01f288a1d8cdc19fc8")
        );

        let client_hs =
            hex!("b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21");
        let ckey = finished_key(&client_hs).unwrap();
        let th = hex!("9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13");
        let verify = finished_verify_data(&ckey, &th);
        assert_eq!(
            verify,
            hex!("a8ec436d677634ae525ac1fcebe11a039ec17694fac6e98527b642f2edd5ce61")
        );
        verify_finished(&ckey, &th, &verify).unwrap();
    }

    #[test]
    fn finished_mismatch_rejected() {
        let key = [0x42u8; 32];
        let th = [0xaa; 32];
        let mut verify = finished_verify_data(&key, &th);
        verify[0] ^= 1;
        assert_eq!(verify_finished(&key, &th, &verify), Err(Error::Finished));
    }

    #[test]
    fn distinct_bases_give_distinct_chains() {
        let dhe = [0x42u8; 32];
        let th = [0xaa; 32];

        let mut a = KeySchedule::new(Zeroizing::new([0x01; 32]));
        let mut b = KeySchedule::new(Zeroizing::new([0x02; 32]));
        a.mix_dhe(&dhe).unwrap();
        b.mix_dhe(&dhe).unwrap();
        let (ca, _) = a.handshake_traffic_secrets(&th).unwrap();
        let (cb, _) = b.handshake_traffic_secrets(&th).unwrap();
        assert_ne!(*ca, *cb);
    }
}
