//! End-to-end handshake tests: a client and a server session exchanging
//! every record through CRYPTO frames, then protecting packets with the
//! derived keys at each level.

use hex_literal::hex;
use quicseal::crypto::key_schedule::{derive_initial_secrets, derive_packet_keys};
use quicseal::frame::parse_crypto_frame;
use quicseal::session::{CertChain, ClientConfig, ConnectionIds, ServerConfig};
use quicseal::tls::messages::HandshakeType;
use quicseal::{CryptoSession, Error, Level, Validation};

const CLIENT_CHOSEN_DCID: [u8; 8] = hex!("8394c8f03e515708");
const CLIENT_SCID: [u8; 8] = [0x11; 8];

fn new_client() -> CryptoSession {
    CryptoSession::client(
        ConnectionIds::new(&CLIENT_SCID, &CLIENT_CHOSEN_DCID).unwrap(),
        ClientConfig {
            quic_version: 1,
            params: Default::default(),
            random: [0x0a; 32],
            ecdh_seed: [0x21; 32],
        },
    )
    .unwrap()
}

fn new_server() -> CryptoSession {
    CryptoSession::server(
        ConnectionIds::new(&CLIENT_CHOSEN_DCID, &CLIENT_SCID).unwrap(),
        ServerConfig {
            quic_version: 1,
            params: Default::default(),
            random: [0x0b; 32],
            cert_chain: CertChain::new(),
            cert_key: [0x37; 32],
        },
    )
    .unwrap()
}

fn encode(session: &mut CryptoSession, typ: HandshakeType) -> (Vec<u8>, Level) {
    let mut buf = [0u8; 2048];
    let (len, level) = session.encode_crypto_record(typ, &mut buf).unwrap();
    (buf[..len].to_vec(), level)
}

fn feed(session: &mut CryptoSession, frame_bytes: &[u8]) -> Result<Validation, Error> {
    let (frame, consumed) = parse_crypto_frame(frame_bytes).unwrap();
    assert_eq!(consumed, frame_bytes.len());
    session.validate_record(&frame)
}

/// Run the complete handshake and return both finished sessions.
fn complete_handshake() -> (CryptoSession, CryptoSession) {
    let mut client = new_client();
    let mut server = new_server();

    let (ch, level) = encode(&mut client, HandshakeType::ClientHello);
    assert_eq!(level, Level::Initial);
    assert_eq!(feed(&mut server, &ch).unwrap(), Validation::Valid);
    assert_eq!(server.level(), Level::Initial);

    let (sh, level) = encode(&mut server, HandshakeType::ServerHello);
    assert_eq!(level, Level::Initial);
    assert_eq!(feed(&mut client, &sh).unwrap(), Validation::Valid);

    assert_eq!(client.advance_keys().unwrap(), Level::Handshake);
    assert_eq!(server.advance_keys().unwrap(), Level::Handshake);

    for (typ, expect) in [
        (HandshakeType::EncryptedExtensions, Validation::Incomplete),
        (HandshakeType::Certificate, Validation::Incomplete),
        (HandshakeType::CertificateVerify, Validation::Valid),
        (HandshakeType::Finished, Validation::Valid),
    ] {
        let (frame, level) = encode(&mut server, typ);
        assert_eq!(level, Level::Handshake);
        assert_eq!(feed(&mut client, &frame).unwrap(), expect, "{typ:?}");
    }

    assert_eq!(server.advance_keys().unwrap(), Level::Protected);
    assert_eq!(client.advance_keys().unwrap(), Level::Protected);

    let (fin, level) = encode(&mut client, HandshakeType::Finished);
    assert_eq!(level, Level::Protected);
    assert!(client.is_complete());
    assert_eq!(feed(&mut server, &fin).unwrap(), Validation::Valid);
    assert!(server.is_complete());

    (client, server)
}

/// RFC 9001 A.1 (scenario S1): the published initial vectors fall out of
/// the key derivation for the canonical DCID.
#[test]
fn initial_vectors_match_rfc9001() {
    let secrets = derive_initial_secrets(&CLIENT_CHOSEN_DCID).unwrap();
    assert_eq!(
        *secrets.initial,
        hex!("7db5df06e7a69e432496adedb00851923595221596ae2ae9fb8115c1e9ed0a44")
    );
    assert_eq!(
        *secrets.client,
        hex!("c00cf151ca5be075ed0ebfb5c80323c42d6b7db67881289af4008f1f6c357aea")
    );
    let (key, iv) = derive_packet_keys(&secrets.client).unwrap();
    assert_eq!(key, hex!("1f369613dd76d5467730efcbe3b1a22d"));
    assert_eq!(iv, hex!("fa044b2f42a3fd3b46fb255c"));
}

#[test]
fn full_handshake_completes() {
    let (client, server) = complete_handshake();
    assert_eq!(client.level(), Level::Protected);
    assert_eq!(server.level(), Level::Protected);
    assert!(client.peer_transport_params().is_some());
    assert!(server.peer_transport_params().is_some());
    assert_eq!(
        client.peer_transport_params().unwrap().max_packet_size,
        1200
    );

    for session in [&client, &server] {
        assert_eq!(session.negotiated_tls_version(), Some(0x0304));
        assert_eq!(session.negotiated_cipher(), Some(0x1301));
        assert_eq!(session.negotiated_sig_alg(), Some(0x0403));
        assert_eq!(session.negotiated_group(), Some(0x0017));
    }
}

#[test]
fn one_rtt_packets_flow_both_ways() {
    let (mut client, mut server) = complete_handshake();

    let header = [0x43, 0x11, 0x11, 0x11];
    let mut datagram = [0u8; 512];
    let total = client
        .seal_packet(Level::Protected, &header, 0, b"GET /index.html", &mut datagram)
        .unwrap();
    let (pn, plaintext) = server
        .open_packet(Level::Protected, header.len(), &mut datagram[..total])
        .unwrap();
    assert_eq!(pn, 0);
    assert_eq!(plaintext, b"GET /index.html");

    let mut reply = [0u8; 512];
    let total = server
        .seal_packet(Level::Protected, &header, 1, b"200 OK hello world", &mut reply)
        .unwrap();
    let (pn, plaintext) = client
        .open_packet(Level::Protected, header.len(), &mut reply[..total])
        .unwrap();
    assert_eq!(pn, 1);
    assert_eq!(plaintext, b"200 OK hello world");
}

#[test]
fn handshake_level_packets_survive_completion() {
    let (client, mut server) = complete_handshake();

    // Late handshake-level retransmissions still open: the AEAD keys
    // outlive the wiped traffic secrets.
    let header = [0xe0, 0x01];
    let mut datagram = [0u8; 256];
    let total = client
        .seal_packet(Level::Handshake, &header, 9, b"late crypto frame", &mut datagram)
        .unwrap();
    let (pn, plaintext) = server
        .open_packet(Level::Handshake, header.len(), &mut datagram[..total])
        .unwrap();
    assert_eq!(pn, 9);
    assert_eq!(plaintext, b"late crypto frame");
}

#[test]
fn cross_direction_open_fails() {
    let (mut client, _) = complete_handshake();

    // A packet the client sealed cannot be opened by the client itself:
    // receive keys point the other way.
    let header = [0x43];
    let mut datagram = [0u8; 256];
    let total = client
        .seal_packet(Level::Protected, &header, 5, b"to the server", &mut datagram)
        .unwrap();
    assert_eq!(
        client
            .open_packet(Level::Protected, header.len(), &mut datagram[..total])
            .unwrap_err(),
        Error::DecryptError
    );
}

/// Scenario S6: delivering the final frame twice appends once.
#[test]
fn duplicate_final_frame_is_a_noop() {
    let mut client = new_client();
    let mut server = new_server();

    let (ch, _) = encode(&mut client, HandshakeType::ClientHello);
    assert_eq!(feed(&mut server, &ch).unwrap(), Validation::Valid);
    let offset_after = server.recv_offset();

    // Same frame again: repeat, no state change; negotiation already done.
    assert_eq!(feed(&mut server, &ch).unwrap(), Validation::Incomplete);
    assert_eq!(server.recv_offset(), offset_after);

    // The handshake still proceeds normally afterwards.
    let (sh, _) = encode(&mut server, HandshakeType::ServerHello);
    assert_eq!(feed(&mut client, &sh).unwrap(), Validation::Valid);
}

/// Scenario S5: a Finished record with a wrong MAC is rejected without
/// touching the transcript, and the genuine record still validates.
#[test]
fn corrupted_server_finished_rejected_then_recovered() {
    let mut client = new_client();
    let mut server = new_server();

    let (ch, _) = encode(&mut client, HandshakeType::ClientHello);
    feed(&mut server, &ch).unwrap();
    let (sh, _) = encode(&mut server, HandshakeType::ServerHello);
    feed(&mut client, &sh).unwrap();
    client.advance_keys().unwrap();
    server.advance_keys().unwrap();

    for typ in [
        HandshakeType::EncryptedExtensions,
        HandshakeType::Certificate,
        HandshakeType::CertificateVerify,
    ] {
        let (frame, _) = encode(&mut server, typ);
        feed(&mut client, &frame).unwrap();
    }

    let (fin, _) = encode(&mut server, HandshakeType::Finished);
    let offset_before = client.recv_offset();

    // Flip a verify_data byte (the last record byte).
    let mut bad = fin.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0x80;
    assert_eq!(feed(&mut client, &bad), Err(Error::Finished));
    assert_eq!(client.recv_offset(), offset_before);

    // The untampered Finished still lands at the same offset.
    assert_eq!(feed(&mut client, &fin).unwrap(), Validation::Valid);
}

#[test]
fn out_of_order_server_flight_is_buffered_by_caller() {
    let mut client = new_client();
    let mut server = new_server();

    let (ch, _) = encode(&mut client, HandshakeType::ClientHello);
    feed(&mut server, &ch).unwrap();
    let (sh, _) = encode(&mut server, HandshakeType::ServerHello);
    feed(&mut client, &sh).unwrap();
    client.advance_keys().unwrap();
    server.advance_keys().unwrap();

    let (ee, _) = encode(&mut server, HandshakeType::EncryptedExtensions);
    let (cert, _) = encode(&mut server, HandshakeType::Certificate);

    // Certificate arrives before EncryptedExtensions: a gap.
    assert_eq!(feed(&mut client, &cert).unwrap(), Validation::OutOfOrder);
    // Caller retries in order once the gap fills.
    assert_eq!(feed(&mut client, &ee).unwrap(), Validation::Incomplete);
    assert_eq!(feed(&mut client, &cert).unwrap(), Validation::Incomplete);
}

#[test]
fn zero_rtt_flows_before_the_server_flight() {
    let client = new_client();
    let mut server = new_server();

    // 0-RTT keys exist from init on both ends, before any record moved.
    let header = [0xc1, 0x00];
    let mut datagram = [0u8; 256];
    let total = client
        .seal_packet(Level::EarlyData, &header, 0, b"0rtt application data", &mut datagram)
        .unwrap();
    let (pn, plaintext) = server
        .open_packet(Level::EarlyData, header.len(), &mut datagram[..total])
        .unwrap();
    assert_eq!(pn, 0);
    assert_eq!(plaintext, b"0rtt application data");
}

#[test]
fn sessions_disagreeing_on_cid_cannot_talk() {
    let client = new_client();
    // Server salted with a different DCID derives different initial keys.
    let mut server = CryptoSession::server(
        ConnectionIds::new(&[0xde, 0xad, 0xbe, 0xef], &CLIENT_SCID).unwrap(),
        ServerConfig {
            quic_version: 1,
            params: Default::default(),
            random: [0x0b; 32],
            cert_chain: CertChain::new(),
            cert_key: [0x37; 32],
        },
    )
    .unwrap();

    let header = [0xc0];
    let mut datagram = [0u8; 256];
    let total = client
        .seal_packet(Level::Initial, &header, 0, b"initial payload", &mut datagram)
        .unwrap();
    assert_eq!(
        server
            .open_packet(Level::Initial, header.len(), &mut datagram[..total])
            .unwrap_err(),
        Error::DecryptError
    );
}
