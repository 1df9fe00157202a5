//! Per-connection crypto state.
//!
//! One [`CryptoSession`] exists per QUIC connection and owns everything the
//! handshake touches: the encryption-level key material, the per-level
//! CRYPTO stream offsets, the running transcript, the ECDHE keypair, and
//! the negotiated parameters. The connection layer drives it through five
//! operations — encode a handshake record, validate an inbound record,
//! advance the key schedule, seal a packet, open a packet — and never sees
//! key material directly.
//!
//! Levels advance `initial → handshake → protected`, each transition armed
//! by the validator (or the record encoder, on the server) and performed
//! one-shot by [`CryptoSession::advance_keys`]. The traffic secrets of a
//! retired level are wiped as soon as its successor is installed; the AEAD
//! keys stay usable for packets still in flight.

use crate::crypto::ecdh::{KeyExchange, PUBLIC_KEY_LEN};
use crate::crypto::ecdsa_p256::{self, ECDSA_SECP256R1_SHA256};
use crate::crypto::key_schedule::{derive_initial_secrets, derive_pn_secret, directional_keys};
use crate::crypto::{DirectionalKeys, Level, PnMask, Secret};
use crate::error::Error;
use crate::frame::{crypto_frame_overhead, encode_crypto_frame_header, CryptoFrame};
use crate::packet;
use crate::tls::extensions;
use crate::tls::key_schedule::{finished_key, finished_verify_data, verify_finished, KeySchedule};
use crate::tls::messages::{self, HandshakeType};
use crate::tls::transcript::Transcript;
use crate::tls::transport_params::TransportParams;
use crate::tls::{Role, CIPHER_AES128_GCM_SHA256, GROUP_SECP256R1, TLS13};
use zeroize::Zeroize;

/// Outcome of feeding one CRYPTO record to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The record completed a handshake milestone.
    Valid,
    /// The record was consumed (or was a repeat); more are needed.
    Incomplete,
    /// The record starts past the next expected stream byte; the caller
    /// buffers it and retries after earlier bytes arrive.
    OutOfOrder,
}

/// The connection IDs a session is instantiated with.
///
/// The initial-secret salt input is role-dependent: a client salts with
/// the destination ID it chose for the peer, a server with its own source
/// ID — the same bytes on both ends of one connection.
pub struct ConnectionIds {
    pub local: heapless::Vec<u8, 20>,
    pub remote: heapless::Vec<u8, 20>,
}

impl ConnectionIds {
    pub fn new(local: &[u8], remote: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            local: heapless::Vec::from_slice(local).map_err(|_| Error::ProtocolViolation)?,
            remote: heapless::Vec::from_slice(remote).map_err(|_| Error::ProtocolViolation)?,
        })
    }
}

/// One DER certificate, owned by the session.
pub type CertDer = heapless::Vec<u8, 704>;
/// Leaf-first certificate chain.
pub type CertChain = heapless::Vec<CertDer, 3>;

/// Client-side configuration. Entropy is injected by the caller; the core
/// never draws randomness itself.
pub struct ClientConfig {
    pub quic_version: u32,
    pub params: TransportParams,
    /// ClientHello random.
    pub random: [u8; 32],
    /// Seed for the ephemeral ECDHE scalar.
    pub ecdh_seed: [u8; 32],
}

/// Server-side configuration.
pub struct ServerConfig {
    pub quic_version: u32,
    pub params: TransportParams,
    /// ServerHello random.
    pub random: [u8; 32],
    /// Leaf-first DER chain. When empty, a self-signed certificate is
    /// minted from `cert_key` at init.
    pub cert_chain: CertChain,
    /// ECDSA-P256 private scalar: signs CertificateVerify and doubles as
    /// the ECDHE key, binding the key share to the certificate.
    pub cert_key: [u8; 32],
}

/// Negotiated algorithm choices, each set exactly once.
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    tls_version: u16,
    cipher: u16,
    sig_alg: u16,
    group: u16,
}

/// Per-level CRYPTO stream offsets and packet-number spaces.
#[derive(Default, Clone, Copy)]
struct StreamState {
    send_offset: u64,
    recv_offset: u64,
    largest_acked: u64,
    largest_recv_pn: u64,
}

/// Key material for one encryption level.
struct LevelKeys {
    client: DirectionalKeys,
    server: DirectionalKeys,
    pn: PnMask,
    client_secret: Secret,
    server_secret: Secret,
}

impl LevelKeys {
    fn new(client_secret: Secret, server_secret: Secret, pn_secret: &Secret) -> Result<Self, Error> {
        Ok(Self {
            client: directional_keys(&client_secret)?,
            server: directional_keys(&server_secret)?,
            pn: PnMask::new(pn_secret),
            client_secret,
            server_secret,
        })
    }

    /// Wipe the traffic secrets once nothing derives from them any more.
    fn wipe_secrets(&mut self) {
        self.client_secret.zeroize();
        self.server_secret.zeroize();
    }
}

/// 0-RTT material: the client-direction expansion of the initial secrets.
struct EarlyKeys {
    keys: DirectionalKeys,
    pn: PnMask,
}

/// A level transition armed by the validator, consumed by `advance_keys`.
enum PendingTransition {
    /// Transcript hash through ServerHello.
    Handshake { th: [u8; 32] },
    /// Transcript hash through the relevant Finished.
    Protected { th: [u8; 32] },
}

pub struct CryptoSession {
    role: Role,
    level: Level,
    quic_version: u32,
    cid_initial: heapless::Vec<u8, 20>,
    random: [u8; 32],

    transcript: Transcript,
    tls_ks: KeySchedule,
    key_exchange: KeyExchange,
    peer_public: Option<[u8; PUBLIC_KEY_LEN]>,
    negotiated: Option<Negotiated>,

    params: TransportParams,
    peer_params: Option<TransportParams>,

    cert_chain: CertChain,
    cert_key: Option<[u8; 32]>,

    initial: LevelKeys,
    early: EarlyKeys,
    handshake: Option<LevelKeys>,
    protected: Option<LevelKeys>,
    pending: Option<PendingTransition>,

    streams: [StreamState; 4],
    complete: bool,
}

impl CryptoSession {
    /// Create a client session. Installs initial and 0-RTT keys.
    pub fn client(cids: ConnectionIds, config: ClientConfig) -> Result<Self, Error> {
        let key_exchange = KeyExchange::new(&config.ecdh_seed)?;
        Self::init(
            Role::Client,
            cids.remote,
            config.quic_version,
            config.params,
            config.random,
            key_exchange,
            CertChain::new(),
            None,
        )
    }

    /// Create a server session. The certificate key is also the ECDHE key.
    pub fn server(cids: ConnectionIds, config: ServerConfig) -> Result<Self, Error> {
        let key_exchange = KeyExchange::new(&config.cert_key)?;
        let chain = if config.cert_chain.is_empty() {
            let mut buf = [0u8; 512];
            let len = ecdsa_p256::build_self_signed_cert(&config.cert_key, &mut buf)?;
            let mut chain = CertChain::new();
            let cert = CertDer::from_slice(&buf[..len]).map_err(|_| Error::Cert)?;
            chain.push(cert).map_err(|_| Error::Cert)?;
            chain
        } else {
            config.cert_chain
        };
        Self::init(
            Role::Server,
            cids.local,
            config.quic_version,
            config.params,
            config.random,
            key_exchange,
            chain,
            Some(config.cert_key),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn init(
        role: Role,
        cid_initial: heapless::Vec<u8, 20>,
        quic_version: u32,
        params: TransportParams,
        random: [u8; 32],
        key_exchange: KeyExchange,
        cert_chain: CertChain,
        cert_key: Option<[u8; 32]>,
    ) -> Result<Self, Error> {
        let secrets = derive_initial_secrets(&cid_initial)?;
        let early = EarlyKeys {
            keys: directional_keys(&secrets.client)?,
            pn: PnMask::new(&secrets.pn),
        };
        let tls_ks = KeySchedule::new(secrets.initial.clone());
        let initial = LevelKeys::new(secrets.client, secrets.server, &secrets.pn)?;

        Ok(Self {
            role,
            level: Level::Initial,
            quic_version,
            cid_initial,
            random,
            transcript: Transcript::new(),
            tls_ks,
            key_exchange,
            peer_public: None,
            negotiated: None,
            params,
            peer_params: None,
            cert_chain,
            cert_key,
            initial,
            early,
            handshake: None,
            protected: None,
            pending: None,
            streams: [StreamState::default(); 4],
            complete: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Current (highest installed) encryption level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// True once the role's side of the handshake has fully concluded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The connection ID that salted the initial secrets.
    pub fn cid_initial(&self) -> &[u8] {
        &self.cid_initial
    }

    /// The peer's transport parameters, once negotiated.
    pub fn peer_transport_params(&self) -> Option<&TransportParams> {
        self.peer_params.as_ref()
    }

    /// Negotiated TLS version, once the hellos have crossed.
    pub fn negotiated_tls_version(&self) -> Option<u16> {
        self.negotiated.map(|n| n.tls_version)
    }

    /// Negotiated cipher suite codepoint.
    pub fn negotiated_cipher(&self) -> Option<u16> {
        self.negotiated.map(|n| n.cipher)
    }

    /// Negotiated signature algorithm codepoint.
    pub fn negotiated_sig_alg(&self) -> Option<u16> {
        self.negotiated.map(|n| n.sig_alg)
    }

    /// Negotiated key-exchange group codepoint.
    pub fn negotiated_group(&self) -> Option<u16> {
        self.negotiated.map(|n| n.group)
    }

    /// Record a peer acknowledgment; steers packet-number truncation.
    pub fn ack_received(&mut self, level: Level, pkt_num: u64) {
        let stream = &mut self.streams[level.index()];
        if pkt_num > stream.largest_acked {
            stream.largest_acked = pkt_num;
        }
    }

    /// CRYPTO stream receive offset at the current level (test hook).
    pub fn recv_offset(&self) -> u64 {
        self.streams[self.level.index()].recv_offset
    }

    // ========================================================================
    // Record validation
    // ========================================================================

    /// Feed one inbound CRYPTO frame to the handshake validator.
    ///
    /// The frame must carry exactly one handshake record. Stream ordering
    /// is enforced first: bytes before the receive offset are a repeat
    /// (`Incomplete`, state untouched), bytes past it are `OutOfOrder`.
    /// Only a contiguous record is validated, absorbed into the
    /// transcript, and advances the offset.
    pub fn validate_record(&mut self, frame: &CryptoFrame<'_>) -> Result<Validation, Error> {
        let stream = self.streams[self.level.index()];
        if frame.offset < stream.recv_offset {
            return Ok(Validation::Incomplete);
        }
        if frame.offset > stream.recv_offset {
            return Ok(Validation::OutOfOrder);
        }

        let (typ, body) = messages::parse_record(frame.data)?;
        let outcome = match (self.role, self.level, typ) {
            (Role::Server, Level::Initial, HandshakeType::ClientHello) => {
                self.on_client_hello(frame.data, body)?
            }
            (Role::Client, Level::Initial, HandshakeType::ServerHello) => {
                self.on_server_hello(frame.data, body)?
            }
            (Role::Client, Level::Handshake, HandshakeType::EncryptedExtensions) => {
                self.on_encrypted_extensions(frame.data, body)?
            }
            (Role::Client, Level::Handshake, HandshakeType::Certificate) => {
                self.on_certificate(frame.data, body)?
            }
            (Role::Client, Level::Handshake, HandshakeType::CertificateVerify) => {
                self.on_certificate_verify(frame.data, body)?
            }
            (Role::Client, Level::Handshake, HandshakeType::Finished) => {
                self.on_server_finished(frame.data, body)?
            }
            (Role::Server, Level::Protected, HandshakeType::Finished) => {
                self.on_client_finished(frame.data, body)?
            }
            _ => return Err(Error::ProtocolViolation),
        };

        self.streams[self.level.index()].recv_offset = frame.offset + frame.data.len() as u64;
        Ok(outcome)
    }

    fn on_client_hello(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        if self.negotiated.is_some() {
            return Err(Error::ProtocolViolation);
        }
        let ch = messages::parse_client_hello(body)?;
        let ext = extensions::parse_client_hello_extensions(ch.extensions)?;

        if !ext.offers_tls13 {
            return Err(Error::TlsVersion);
        }
        if !messages::iter_cipher_suites(ch.cipher_suites).any(|c| c == CIPHER_AES128_GCM_SHA256)
        {
            return Err(Error::NoCipher);
        }
        if !ext.sig_algs.contains(&ECDSA_SECP256R1_SHA256) {
            return Err(Error::NoSignatureAlg);
        }
        if !ext.groups.contains(&GROUP_SECP256R1) {
            return Err(Error::NoGroup);
        }
        let share = ext.key_share.ok_or(Error::KeyShare)?;
        let params = ext.transport_params.ok_or(Error::InvalidParams)?;

        self.peer_public = Some(share);
        self.peer_params = Some(params);
        self.negotiated = Some(Negotiated {
            tls_version: TLS13,
            cipher: CIPHER_AES128_GCM_SHA256,
            sig_alg: ECDSA_SECP256R1_SHA256,
            group: GROUP_SECP256R1,
        });
        self.transcript.absorb(record);
        Ok(Validation::Valid)
    }

    fn on_server_hello(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        if self.negotiated.is_some() {
            return Err(Error::ProtocolViolation);
        }
        let sh = messages::parse_server_hello(body)?;
        if sh.cipher_suite != CIPHER_AES128_GCM_SHA256 {
            return Err(Error::NoCipher);
        }
        let ext = extensions::parse_server_hello_extensions(sh.extensions)?;
        if ext.selected_version != Some(TLS13) {
            return Err(Error::TlsVersion);
        }
        let share = ext.key_share.ok_or(Error::KeyShare)?;

        self.peer_public = Some(share);
        self.negotiated = Some(Negotiated {
            tls_version: TLS13,
            cipher: CIPHER_AES128_GCM_SHA256,
            sig_alg: ECDSA_SECP256R1_SHA256,
            group: GROUP_SECP256R1,
        });
        self.transcript.absorb(record);
        self.pending = Some(PendingTransition::Handshake {
            th: self.transcript.digest(),
        });
        Ok(Validation::Valid)
    }

    fn on_encrypted_extensions(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        let block = messages::parse_encrypted_extensions(body)?;
        let ee = extensions::parse_encrypted_extensions(block)?;

        if !ee.sig_algs.contains(&negotiated.sig_alg) {
            return Err(Error::NoSignatureAlg);
        }
        if !ee.groups.contains(&negotiated.group) {
            return Err(Error::NoGroup);
        }
        let params = ee.transport_params.ok_or(Error::InvalidParams)?;
        if ee.negotiated_version != Some(self.quic_version) {
            return Err(Error::InvalidParams);
        }

        self.peer_params = Some(params);
        self.transcript.absorb(record);
        Ok(Validation::Incomplete)
    }

    fn on_certificate(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        let mut chain: heapless::Vec<&[u8], 4> = heapless::Vec::new();
        for entry in messages::parse_certificate(body)? {
            chain.push(entry?).map_err(|_| Error::Cert)?;
        }
        ecdsa_p256::verify_chain(&chain)?;

        // The leaf must hold the key the peer offered in its key share;
        // the key exchange and the certificate are the same identity.
        let leaf_key = ecdsa_p256::extract_public_key(chain[0])?;
        let peer = self.peer_public.ok_or(Error::ProtocolViolation)?;
        if leaf_key != peer {
            return Err(Error::Cert);
        }

        self.transcript.absorb(record);
        Ok(Validation::Incomplete)
    }

    fn on_certificate_verify(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
        let cv = messages::parse_certificate_verify(body)?;
        if cv.algorithm != negotiated.sig_alg {
            return Err(Error::NoSignatureAlg);
        }

        // Signed content is the transcript digest before this record.
        let digest = self.transcript.digest();
        let peer = self.peer_public.ok_or(Error::ProtocolViolation)?;
        ecdsa_p256::verify_digest(&peer, cv.signature, &digest)?;

        self.transcript.absorb(record);
        Ok(Validation::Valid)
    }

    fn on_server_finished(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        let verify = messages::parse_finished(body)?;
        let hs = self.handshake.as_ref().ok_or(Error::ProtocolViolation)?;
        let key = finished_key(&hs.server_secret)?;
        let th = self.transcript.digest();
        verify_finished(&key, &th, verify)?;

        self.transcript.absorb(record);
        self.pending = Some(PendingTransition::Protected {
            th: self.transcript.digest(),
        });
        Ok(Validation::Valid)
    }

    fn on_client_finished(&mut self, record: &[u8], body: &[u8]) -> Result<Validation, Error> {
        let verify = messages::parse_finished(body)?;
        let hs = self.handshake.as_mut().ok_or(Error::ProtocolViolation)?;
        let key = finished_key(&hs.client_secret)?;
        let th = self.transcript.digest();
        verify_finished(&key, &th, verify)?;

        hs.wipe_secrets();
        self.transcript.absorb(record);
        self.transcript.reset();
        self.complete = true;
        Ok(Validation::Valid)
    }

    // ========================================================================
    // Record encoding
    // ========================================================================

    /// Build the named handshake record, absorb it into the transcript,
    /// and wrap it in a CRYPTO frame at the current level's send offset.
    ///
    /// Returns the frame length and the encryption level it belongs to.
    pub fn encode_crypto_record(
        &mut self,
        typ: HandshakeType,
        out: &mut [u8],
    ) -> Result<(usize, Level), Error> {
        let rec_len = match (self.role, self.level, typ) {
            (Role::Client, Level::Initial, HandshakeType::ClientHello) => {
                let mut ext = [0u8; 512];
                let ext_len = extensions::encode_client_hello_extensions(
                    self.key_exchange.public_key(),
                    self.quic_version,
                    &self.params,
                    &mut ext,
                )?;
                messages::encode_client_hello(&self.random, &ext[..ext_len], out)?
            }
            (Role::Server, Level::Initial, HandshakeType::ServerHello) => {
                if self.negotiated.is_none() {
                    return Err(Error::ProtocolViolation);
                }
                let mut ext = [0u8; 128];
                let ext_len = extensions::encode_server_hello_extensions(
                    self.key_exchange.public_key(),
                    &mut ext,
                )?;
                messages::encode_server_hello(&self.random, &[], &ext[..ext_len], out)?
            }
            (Role::Server, Level::Handshake, HandshakeType::EncryptedExtensions) => {
                let negotiated = self.negotiated.ok_or(Error::ProtocolViolation)?;
                let mut ext = [0u8; 512];
                let ext_len = extensions::encode_encrypted_extensions(
                    negotiated.sig_alg,
                    negotiated.group,
                    self.quic_version,
                    &[],
                    &self.params,
                    &mut ext,
                )?;
                messages::encode_encrypted_extensions(&ext[..ext_len], out)?
            }
            (Role::Server, Level::Handshake, HandshakeType::Certificate) => {
                let mut chain: heapless::Vec<&[u8], 3> = heapless::Vec::new();
                for cert in &self.cert_chain {
                    chain.push(&cert[..]).map_err(|_| Error::Cert)?;
                }
                messages::encode_certificate(&chain, out)?
            }
            (Role::Server, Level::Handshake, HandshakeType::CertificateVerify) => {
                let key = self.cert_key.ok_or(Error::ProtocolViolation)?;
                let digest = self.transcript.digest();
                let sig = ecdsa_p256::sign_digest(&key, &digest)?;
                messages::encode_certificate_verify(ECDSA_SECP256R1_SHA256, &sig, out)?
            }
            (Role::Server, Level::Handshake, HandshakeType::Finished) => {
                let hs = self.handshake.as_ref().ok_or(Error::ProtocolViolation)?;
                let key = finished_key(&hs.server_secret)?;
                let verify = finished_verify_data(&key, &self.transcript.digest());
                messages::encode_finished(&verify, out)?
            }
            (Role::Client, Level::Protected, HandshakeType::Finished) => {
                let hs = self.handshake.as_ref().ok_or(Error::ProtocolViolation)?;
                let key = finished_key(&hs.client_secret)?;
                let verify = finished_verify_data(&key, &self.transcript.digest());
                messages::encode_finished(&verify, out)?
            }
            _ => return Err(Error::ProtocolViolation),
        };

        self.transcript.absorb(&out[..rec_len]);

        // Post-record bookkeeping: arm transitions, finish the handshake.
        match (self.role, typ) {
            (Role::Server, HandshakeType::ServerHello) => {
                self.pending = Some(PendingTransition::Handshake {
                    th: self.transcript.digest(),
                });
            }
            (Role::Server, HandshakeType::Finished) => {
                self.pending = Some(PendingTransition::Protected {
                    th: self.transcript.digest(),
                });
            }
            (Role::Client, HandshakeType::Finished) => {
                if let Some(hs) = self.handshake.as_mut() {
                    hs.wipe_secrets();
                }
                self.complete = true;
            }
            _ => {}
        }

        // Wrap in a CRYPTO frame at the current level's send offset.
        let stream = &mut self.streams[self.level.index()];
        let hdr = crypto_frame_overhead(stream.send_offset, rec_len)?;
        let total = hdr + rec_len;
        if out.len() < total {
            return Err(Error::BufferTooSmall { needed: total });
        }
        out.copy_within(0..rec_len, hdr);
        encode_crypto_frame_header(stream.send_offset, rec_len, out)?;
        stream.send_offset += rec_len as u64;

        Ok((total, self.level))
    }

    // ========================================================================
    // Key schedule transitions
    // ========================================================================

    /// Perform the one-shot level transition armed by the last milestone.
    ///
    /// `initial → handshake` needs the ECDH shared secret and the
    /// post-ServerHello transcript; `handshake → protected` the frozen
    /// Finished-boundary transcript. The new level's material is fully
    /// installed before this returns, and the predecessor's traffic
    /// secrets are wiped.
    pub fn advance_keys(&mut self) -> Result<Level, Error> {
        match self.pending.take() {
            Some(PendingTransition::Handshake { th }) => {
                let peer = self.peer_public.ok_or(Error::ProtocolViolation)?;
                let dhe = self.key_exchange.shared_secret(&peer)?;
                self.tls_ks.mix_dhe(&dhe)?;
                let (client, server) = self.tls_ks.handshake_traffic_secrets(&th)?;
                let pn = derive_pn_secret(self.tls_ks.handshake_secret(), &th)?;
                self.handshake = Some(LevelKeys::new(client, server, &pn)?);
                self.initial.wipe_secrets();
                self.level = Level::Handshake;
            }
            Some(PendingTransition::Protected { th }) => {
                self.tls_ks.derive_master()?;
                let (client, server) = self.tls_ks.app_traffic_secrets(&th)?;
                let pn = derive_pn_secret(self.tls_ks.master_secret(), &th)?;
                self.protected = Some(LevelKeys::new(client, server, &pn)?);
                self.level = Level::Protected;
            }
            None => return Err(Error::ProtocolViolation),
        }
        Ok(self.level)
    }

    // ========================================================================
    // Packet protection
    // ========================================================================

    fn level_keys(&self, level: Level) -> Result<&LevelKeys, Error> {
        match level {
            Level::Initial => Ok(&self.initial),
            Level::Handshake => self.handshake.as_ref().ok_or(Error::ProtocolViolation),
            Level::Protected => self.protected.as_ref().ok_or(Error::ProtocolViolation),
            Level::EarlyData => Err(Error::ProtocolViolation),
        }
    }

    fn send_keys(&self, level: Level) -> Result<(&DirectionalKeys, &PnMask), Error> {
        if level == Level::EarlyData {
            // 0-RTT flows client to server only.
            if self.role != Role::Client {
                return Err(Error::ProtocolViolation);
            }
            return Ok((&self.early.keys, &self.early.pn));
        }
        let keys = self.level_keys(level)?;
        let dir = match self.role {
            Role::Client => &keys.client,
            Role::Server => &keys.server,
        };
        Ok((dir, &keys.pn))
    }

    fn recv_keys(&self, level: Level) -> Result<(&DirectionalKeys, &PnMask), Error> {
        if level == Level::EarlyData {
            if self.role != Role::Server {
                return Err(Error::ProtocolViolation);
            }
            return Ok((&self.early.keys, &self.early.pn));
        }
        let keys = self.level_keys(level)?;
        let dir = match self.role {
            Role::Client => &keys.server,
            Role::Server => &keys.client,
        };
        Ok((dir, &keys.pn))
    }

    /// Seal a packet at `level`: `header || obfuscated_pn || ciphertext ||
    /// tag` written to `out`, total length returned.
    pub fn seal_packet(
        &self,
        level: Level,
        header: &[u8],
        pkt_num: u64,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let largest_acked = self.streams[level.index()].largest_acked;
        let (keys, pn_mask) = self.send_keys(level)?;
        packet::seal(keys, pn_mask, largest_acked, header, pkt_num, plaintext, out)
    }

    /// Open a packet at `level` in place. `pn_offset` is where the header
    /// ends and the obfuscated packet number begins. Returns the decoded
    /// packet number and the plaintext.
    pub fn open_packet<'a>(
        &mut self,
        level: Level,
        pn_offset: usize,
        datagram: &'a mut [u8],
    ) -> Result<(u64, &'a [u8]), Error> {
        let largest = self.streams[level.index()].largest_recv_pn;
        let (keys, pn_mask) = self.recv_keys(level)?;
        let (pkt_num, plaintext) = packet::open(keys, pn_mask, largest, pn_offset, datagram)?;
        let stream = &mut self.streams[level.index()];
        if pkt_num > stream.largest_recv_pn {
            stream.largest_recv_pn = pkt_num;
        }
        Ok((pkt_num, plaintext))
    }
}
