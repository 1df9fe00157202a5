//! Handshake record encoding and parsing.
//!
//! Every record is `type:u8 || length:u24 || body`. Hello bodies pin the
//! legacy version to 0x0303, carry a 32-byte random, an empty legacy
//! session id, the single cipher suite 0x1301, and null compression; the
//! interesting content all lives in the extension blocks.

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::tls::{CIPHER_AES128_GCM_SHA256, LEGACY_VERSION};

/// Handshake record types carried in CRYPTO frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateVerify = 15,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            8 => Some(Self::EncryptedExtensions),
            11 => Some(Self::Certificate),
            15 => Some(Self::CertificateVerify),
            20 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Parsed ClientHello body.
pub struct ClientHello<'a> {
    pub random: &'a [u8; 32],
    pub session_id: &'a [u8],
    /// Raw suite list: big-endian u16 pairs.
    pub cipher_suites: &'a [u8],
    pub extensions: &'a [u8],
}

/// Parsed ServerHello body.
pub struct ServerHello<'a> {
    pub random: &'a [u8; 32],
    pub cipher_suite: u16,
    pub extensions: &'a [u8],
}

/// Parsed CertificateVerify body.
pub struct CertificateVerify<'a> {
    pub algorithm: u16,
    pub signature: &'a [u8],
}

/// Split a record into its type and body; checks the length against the
/// actual bytes present.
pub fn parse_record(data: &[u8]) -> Result<(HandshakeType, &[u8]), Error> {
    let mut r = Reader::new(data);
    let type_byte = r.u8()?;
    let body_len = r.u24()? as usize;
    let body = r.take(body_len)?;
    if !r.is_empty() {
        return Err(Error::ProtocolViolation);
    }
    let typ = HandshakeType::from_u8(type_byte).ok_or(Error::ProtocolViolation)?;
    Ok((typ, body))
}

/// Write `type || u24 length || body`, where `body` was already encoded at
/// `out[4..]`. Returns the total record length.
fn finish_record(typ: HandshakeType, body_len: usize, out: &mut [u8]) -> Result<usize, Error> {
    let mut w = Writer::new(out);
    w.u8(typ as u8)?;
    w.u24(body_len as u32)?;
    Ok(4 + body_len)
}

/// Encode a ClientHello around a pre-built extension block.
pub fn encode_client_hello(
    random: &[u8; 32],
    extensions: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.u16(LEGACY_VERSION)?;
        w.bytes(random)?;
        w.u8(0)?; // legacy_session_id
        w.u16(2)?; // one cipher suite
        w.u16(CIPHER_AES128_GCM_SHA256)?;
        w.u8(1)?; // legacy_compression_methods
        w.u8(0)?;
        w.u16(extensions.len() as u16)?;
        w.bytes(extensions)?;
        w.used()
    };
    finish_record(HandshakeType::ClientHello, body_len, out)
}

pub fn parse_client_hello(body: &[u8]) -> Result<ClientHello<'_>, Error> {
    let mut r = Reader::new(body);
    let legacy_version = r.u16()?;
    if legacy_version != LEGACY_VERSION {
        return Err(Error::TlsVersion);
    }
    let random: &[u8; 32] = r.take(32)?.try_into().map_err(|_| Error::ProtocolViolation)?;
    let sid_len = r.u8()? as usize;
    let session_id = r.take(sid_len)?;
    let cs_len = r.u16()? as usize;
    let cipher_suites = r.take(cs_len)?;
    let comp_len = r.u8()? as usize;
    r.take(comp_len)?;
    let ext_len = r.u16()? as usize;
    let extensions = r.take(ext_len)?;

    Ok(ClientHello {
        random,
        session_id,
        cipher_suites,
        extensions,
    })
}

/// Iterate the raw cipher-suite list of a ClientHello.
pub fn iter_cipher_suites(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
}

/// Encode a ServerHello around a pre-built extension block.
pub fn encode_server_hello(
    random: &[u8; 32],
    session_id_echo: &[u8],
    extensions: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.u16(LEGACY_VERSION)?;
        w.bytes(random)?;
        w.u8(session_id_echo.len() as u8)?;
        w.bytes(session_id_echo)?;
        w.u16(CIPHER_AES128_GCM_SHA256)?;
        w.u8(0)?; // null compression
        w.u16(extensions.len() as u16)?;
        w.bytes(extensions)?;
        w.used()
    };
    finish_record(HandshakeType::ServerHello, body_len, out)
}

pub fn parse_server_hello(body: &[u8]) -> Result<ServerHello<'_>, Error> {
    let mut r = Reader::new(body);
    let legacy_version = r.u16()?;
    if legacy_version != LEGACY_VERSION {
        return Err(Error::TlsVersion);
    }
    let random: &[u8; 32] = r.take(32)?.try_into().map_err(|_| Error::ProtocolViolation)?;
    let sid_len = r.u8()? as usize;
    r.take(sid_len)?;
    let cipher_suite = r.u16()?;
    let _compression = r.u8()?;
    let ext_len = r.u16()? as usize;
    let extensions = r.take(ext_len)?;

    Ok(ServerHello {
        random,
        cipher_suite,
        extensions,
    })
}

/// Encode EncryptedExtensions around a pre-built extension block.
pub fn encode_encrypted_extensions(extensions: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.u16(extensions.len() as u16)?;
        w.bytes(extensions)?;
        w.used()
    };
    finish_record(HandshakeType::EncryptedExtensions, body_len, out)
}

/// Returns the raw extension block of an EncryptedExtensions body.
pub fn parse_encrypted_extensions(body: &[u8]) -> Result<&[u8], Error> {
    let mut r = Reader::new(body);
    let ext_len = r.u16()? as usize;
    r.take(ext_len)
}

/// Encode a Certificate record carrying a leaf-first DER chain.
pub fn encode_certificate(chain: &[&[u8]], out: &mut [u8]) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.u8(0)?; // certificate_request_context
        let list_len: usize = chain.iter().map(|c| 3 + c.len() + 2).sum();
        w.u24(list_len as u32)?;
        for cert in chain {
            w.u24(cert.len() as u32)?;
            w.bytes(cert)?;
            w.u16(0)?; // per-entry extensions
        }
        w.used()
    };
    finish_record(HandshakeType::Certificate, body_len, out)
}

/// Iterate the DER certificates of a Certificate body, leaf first.
pub fn parse_certificate(body: &[u8]) -> Result<CertificateIter<'_>, Error> {
    let mut r = Reader::new(body);
    let ctx_len = r.u8()? as usize;
    r.take(ctx_len)?;
    let list_len = r.u24()? as usize;
    let entries = r.take(list_len)?;
    Ok(CertificateIter { entries })
}

pub struct CertificateIter<'a> {
    entries: &'a [u8],
}

impl<'a> Iterator for CertificateIter<'a> {
    type Item = Result<&'a [u8], Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.entries.is_empty() {
            return None;
        }
        let mut r = Reader::new(self.entries);
        let item = (|| {
            let cert_len = r.u24()? as usize;
            let cert = r.take(cert_len)?;
            let ext_len = r.u16()? as usize;
            r.take(ext_len)?;
            Ok(cert)
        })();
        match item {
            Ok(cert) => {
                self.entries = &self.entries[r.used()..];
                Some(Ok(cert))
            }
            Err(e) => {
                self.entries = &[];
                Some(Err(e))
            }
        }
    }
}

/// Encode a CertificateVerify record.
pub fn encode_certificate_verify(
    algorithm: u16,
    signature: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.u16(algorithm)?;
        w.u16(signature.len() as u16)?;
        w.bytes(signature)?;
        w.used()
    };
    finish_record(HandshakeType::CertificateVerify, body_len, out)
}

pub fn parse_certificate_verify(body: &[u8]) -> Result<CertificateVerify<'_>, Error> {
    let mut r = Reader::new(body);
    let algorithm = r.u16()?;
    let sig_len = r.u16()? as usize;
    let signature = r.take(sig_len)?;
    Ok(CertificateVerify {
        algorithm,
        signature,
    })
}

/// Encode a Finished record; the body is the 32-byte verify_data.
pub fn encode_finished(verify_data: &[u8; 32], out: &mut [u8]) -> Result<usize, Error> {
    let body_len = {
        let mut w = Writer::new(out.get_mut(4..).ok_or(Error::BufferTooSmall { needed: 4 })?);
        w.bytes(verify_data)?;
        w.used()
    };
    finish_record(HandshakeType::Finished, body_len, out)
}

/// Returns the verify_data of a Finished body.
pub fn parse_finished(body: &[u8]) -> Result<&[u8; 32], Error> {
    if body.len() != 32 {
        return Err(Error::Finished);
    }
    body.try_into().map_err(|_| Error::Finished)
}
