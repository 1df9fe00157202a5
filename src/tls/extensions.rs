//! TLS extension encoding and parsing.
//!
//! Extension block format: each entry is `type:u16 || length:u16 || data`.
//! The QUIC transport parameters ride in a private-use extension
//! (0xFFA5) whose payload is version-prefixed: the ClientHello form leads
//! with the initiating QUIC version, the EncryptedExtensions form with the
//! negotiated version plus the server's other supported versions.

use crate::codec::{Reader, Writer};
use crate::crypto::ecdh::PUBLIC_KEY_LEN;
use crate::error::Error;
use crate::tls::transport_params::TransportParams;
use crate::tls::{GROUP_SECP256R1, TLS13};

pub const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
pub const EXT_SERVER_CERT_TYPE: u16 = 0x0014;
pub const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
pub const EXT_KEY_SHARE: u16 = 0x0033;
pub const EXT_QUIC_TRANSPORT_PARAMS: u16 = 0xffa5;

/// X.509 in server_certificate_type.
pub const CERT_TYPE_X509: u8 = 0;

/// Extensions parsed from a ClientHello.
pub struct ClientHelloExtensions {
    pub offers_tls13: bool,
    pub groups: heapless::Vec<u16, 8>,
    pub sig_algs: heapless::Vec<u16, 8>,
    /// secp256r1 key share, if the client offered one.
    pub key_share: Option<[u8; PUBLIC_KEY_LEN]>,
    pub quic_version: Option<u32>,
    pub transport_params: Option<TransportParams>,
}

/// Extensions parsed from a ServerHello.
pub struct ServerHelloExtensions {
    pub selected_version: Option<u16>,
    /// The server's single key share; `None` if absent or not secp256r1.
    pub key_share: Option<[u8; PUBLIC_KEY_LEN]>,
}

/// Extensions parsed from EncryptedExtensions.
pub struct EncryptedExtensionsData {
    pub sig_algs: heapless::Vec<u16, 8>,
    pub groups: heapless::Vec<u16, 8>,
    pub negotiated_version: Option<u32>,
    pub other_versions: heapless::Vec<u32, 8>,
    pub transport_params: Option<TransportParams>,
}

fn write_ext(w: &mut Writer<'_>, ext_type: u16, body: &[u8]) -> Result<(), Error> {
    w.u16(ext_type)?;
    w.u16(body.len() as u16)?;
    w.bytes(body)
}

fn write_u16_list(w: &mut Writer<'_>, ext_type: u16, items: &[u16]) -> Result<(), Error> {
    w.u16(ext_type)?;
    w.u16((2 + items.len() * 2) as u16)?;
    w.u16((items.len() * 2) as u16)?;
    for item in items {
        w.u16(*item)?;
    }
    Ok(())
}

// ---- ClientHello ----

/// Encode the ClientHello extension block.
pub fn encode_client_hello_extensions(
    public_key: &[u8; PUBLIC_KEY_LEN],
    quic_version: u32,
    params: &TransportParams,
    out: &mut [u8],
) -> Result<usize, Error> {
    let mut w = Writer::new(out);

    // supported_versions: u8 list length, then versions
    write_ext(&mut w, EXT_SUPPORTED_VERSIONS, &[0x02, (TLS13 >> 8) as u8, TLS13 as u8])?;
    write_u16_list(&mut w, EXT_SUPPORTED_GROUPS, &[GROUP_SECP256R1])?;
    write_u16_list(
        &mut w,
        EXT_SIGNATURE_ALGORITHMS,
        &[crate::crypto::ecdsa_p256::ECDSA_SECP256R1_SHA256],
    )?;

    // key_share: client share list with one secp256r1 entry
    w.u16(EXT_KEY_SHARE)?;
    w.u16((2 + 4 + PUBLIC_KEY_LEN) as u16)?;
    w.u16((4 + PUBLIC_KEY_LEN) as u16)?;
    w.u16(GROUP_SECP256R1)?;
    w.u16(PUBLIC_KEY_LEN as u16)?;
    w.bytes(public_key)?;

    // server_certificate_type: u8 list with X.509 only
    write_ext(&mut w, EXT_SERVER_CERT_TYPE, &[0x01, CERT_TYPE_X509])?;

    // QUIC transport parameters: initial_version || params_len || params
    let mut body = [0u8; 256];
    let mut bw = Writer::new(&mut body);
    bw.u32(quic_version)?;
    let mut pbuf = [0u8; 220];
    let plen = params.encode(&mut pbuf)?;
    bw.u16(plen as u16)?;
    bw.bytes(&pbuf[..plen])?;
    let blen = bw.used();
    write_ext(&mut w, EXT_QUIC_TRANSPORT_PARAMS, &body[..blen])?;

    Ok(w.used())
}

/// Parse a ClientHello extension block.
pub fn parse_client_hello_extensions(data: &[u8]) -> Result<ClientHelloExtensions, Error> {
    let mut out = ClientHelloExtensions {
        offers_tls13: false,
        groups: heapless::Vec::new(),
        sig_algs: heapless::Vec::new(),
        key_share: None,
        quic_version: None,
        transport_params: None,
    };

    let mut r = Reader::new(data);
    while !r.is_empty() {
        let ext_type = r.u16()?;
        let len = r.u16()? as usize;
        let mut ext = r.sub(len)?;

        match ext_type {
            EXT_SUPPORTED_VERSIONS => {
                let list_len = ext.u8()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    if list.u16()? == TLS13 {
                        out.offers_tls13 = true;
                    }
                }
            }
            EXT_SUPPORTED_GROUPS => {
                let list_len = ext.u16()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    let _ = out.groups.push(list.u16()?);
                }
            }
            EXT_SIGNATURE_ALGORITHMS => {
                let list_len = ext.u16()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    let _ = out.sig_algs.push(list.u16()?);
                }
            }
            EXT_KEY_SHARE => {
                let list_len = ext.u16()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    let group = list.u16()?;
                    let key_len = list.u16()? as usize;
                    let key = list.take(key_len)?;
                    if group == GROUP_SECP256R1 && key_len == PUBLIC_KEY_LEN {
                        let mut share = [0u8; PUBLIC_KEY_LEN];
                        share.copy_from_slice(key);
                        out.key_share = Some(share);
                    }
                }
            }
            EXT_QUIC_TRANSPORT_PARAMS => {
                let version = ext.u32()?;
                let plen = ext.u16()? as usize;
                let params = TransportParams::decode(ext.take(plen)?)?;
                out.quic_version = Some(version);
                out.transport_params = Some(params);
            }
            _ => {}
        }
    }

    Ok(out)
}

// ---- ServerHello ----

/// Encode the ServerHello extension block: selected version plus our share.
pub fn encode_server_hello_extensions(
    public_key: &[u8; PUBLIC_KEY_LEN],
    out: &mut [u8],
) -> Result<usize, Error> {
    let mut w = Writer::new(out);

    // supported_versions: the selected version alone
    write_ext(&mut w, EXT_SUPPORTED_VERSIONS, &[(TLS13 >> 8) as u8, TLS13 as u8])?;

    // key_share: single entry, no list framing
    w.u16(EXT_KEY_SHARE)?;
    w.u16((4 + PUBLIC_KEY_LEN) as u16)?;
    w.u16(GROUP_SECP256R1)?;
    w.u16(PUBLIC_KEY_LEN as u16)?;
    w.bytes(public_key)?;

    Ok(w.used())
}

/// Parse a ServerHello extension block.
pub fn parse_server_hello_extensions(data: &[u8]) -> Result<ServerHelloExtensions, Error> {
    let mut out = ServerHelloExtensions {
        selected_version: None,
        key_share: None,
    };

    let mut r = Reader::new(data);
    while !r.is_empty() {
        let ext_type = r.u16()?;
        let len = r.u16()? as usize;
        let mut ext = r.sub(len)?;

        match ext_type {
            EXT_SUPPORTED_VERSIONS => out.selected_version = Some(ext.u16()?),
            EXT_KEY_SHARE => {
                let group = ext.u16()?;
                let key_len = ext.u16()? as usize;
                let key = ext.take(key_len)?;
                if group == GROUP_SECP256R1 && key_len == PUBLIC_KEY_LEN {
                    let mut share = [0u8; PUBLIC_KEY_LEN];
                    share.copy_from_slice(key);
                    out.key_share = Some(share);
                }
            }
            _ => {}
        }
    }

    Ok(out)
}

// ---- EncryptedExtensions ----

/// Encode the EncryptedExtensions block: the negotiated signature
/// algorithm and group echoed back, plus the server's QUIC parameters.
pub fn encode_encrypted_extensions(
    sig_alg: u16,
    group: u16,
    negotiated_version: u32,
    other_versions: &[u32],
    params: &TransportParams,
    out: &mut [u8],
) -> Result<usize, Error> {
    let mut w = Writer::new(out);

    write_u16_list(&mut w, EXT_SIGNATURE_ALGORITHMS, &[sig_alg])?;
    write_u16_list(&mut w, EXT_SUPPORTED_GROUPS, &[group])?;
    write_ext(&mut w, EXT_SERVER_CERT_TYPE, &[CERT_TYPE_X509])?;

    // negotiated_version || other_versions || params_len || params
    let mut body = [0u8; 288];
    let mut bw = Writer::new(&mut body);
    bw.u32(negotiated_version)?;
    bw.u8((other_versions.len() * 4) as u8)?;
    for v in other_versions {
        bw.u32(*v)?;
    }
    let mut pbuf = [0u8; 220];
    let plen = params.encode(&mut pbuf)?;
    bw.u16(plen as u16)?;
    bw.bytes(&pbuf[..plen])?;
    let blen = bw.used();
    write_ext(&mut w, EXT_QUIC_TRANSPORT_PARAMS, &body[..blen])?;

    Ok(w.used())
}

/// Parse an EncryptedExtensions block.
pub fn parse_encrypted_extensions(data: &[u8]) -> Result<EncryptedExtensionsData, Error> {
    let mut out = EncryptedExtensionsData {
        sig_algs: heapless::Vec::new(),
        groups: heapless::Vec::new(),
        negotiated_version: None,
        other_versions: heapless::Vec::new(),
        transport_params: None,
    };

    let mut r = Reader::new(data);
    while !r.is_empty() {
        let ext_type = r.u16()?;
        let len = r.u16()? as usize;
        let mut ext = r.sub(len)?;

        match ext_type {
            EXT_SIGNATURE_ALGORITHMS => {
                let list_len = ext.u16()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    let _ = out.sig_algs.push(list.u16()?);
                }
            }
            EXT_SUPPORTED_GROUPS => {
                let list_len = ext.u16()? as usize;
                let mut list = ext.sub(list_len)?;
                while !list.is_empty() {
                    let _ = out.groups.push(list.u16()?);
                }
            }
            EXT_QUIC_TRANSPORT_PARAMS => {
                let version = ext.u32()?;
                let others_len = ext.u8()? as usize;
                let mut others = ext.sub(others_len)?;
                while !others.is_empty() {
                    let _ = out.other_versions.push(others.u32()?);
                }
                let plen = ext.u16()? as usize;
                let params = TransportParams::decode(ext.take(plen)?)?;
                out.negotiated_version = Some(version);
                out.transport_params = Some(params);
            }
            _ => {}
        }
    }

    Ok(out)
}
