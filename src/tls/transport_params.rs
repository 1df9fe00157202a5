//! QUIC transport parameter encoding.
//!
//! Parameters travel inside the TLS extensions block as a sequence of
//! `{id:u16, len:u16, value}` entries. Integer values are varints,
//! `disable_migration` is zero-length, `stateless_reset_token` is exactly
//! 16 bytes, and `preferred_address` is a small structure. Unknown ids are
//! skipped.

use crate::codec::{Reader, Writer};
use crate::error::Error;

const PARAM_INITIAL_MAX_STREAM_DATA: u16 = 0x0000;
const PARAM_INITIAL_MAX_DATA: u16 = 0x0001;
const PARAM_INITIAL_MAX_BIDI_STREAMS: u16 = 0x0002;
const PARAM_IDLE_TIMEOUT: u16 = 0x0003;
const PARAM_PREFERRED_ADDRESS: u16 = 0x0004;
const PARAM_MAX_PACKET_SIZE: u16 = 0x0005;
const PARAM_STATELESS_RESET_TOKEN: u16 = 0x0006;
const PARAM_ACK_DELAY_EXPONENT: u16 = 0x0007;
const PARAM_INITIAL_MAX_UNI_STREAMS: u16 = 0x0008;
const PARAM_DISABLE_MIGRATION: u16 = 0x0009;

/// Smallest max_packet_size a peer may advertise.
pub const MIN_MAX_PACKET_SIZE: u64 = 1200;

/// A server's preferred address advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredAddress {
    /// 4 for IPv4, 6 for IPv6.
    pub ip_version: u8,
    pub ip: heapless::Vec<u8, 16>,
    pub port: u16,
    pub conn_id: heapless::Vec<u8, 20>,
    pub reset_token: [u8; 16],
}

/// Negotiated QUIC transport parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    pub initial_max_stream_data: u64,
    pub initial_max_data: u64,
    pub initial_max_bidi_streams: u64,
    pub idle_timeout: u64,
    pub preferred_address: Option<PreferredAddress>,
    pub max_packet_size: u64,
    pub stateless_reset_token: Option<[u8; 16]>,
    pub ack_delay_exponent: u8,
    pub initial_max_uni_streams: u64,
    pub disable_migration: bool,
    /// Fixed default; has no codepoint of its own.
    pub max_ack_delay: u64,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            initial_max_stream_data: 5000,
            initial_max_data: 5000,
            initial_max_bidi_streams: 1,
            idle_timeout: 0,
            preferred_address: None,
            max_packet_size: 1200,
            stateless_reset_token: None,
            ack_delay_exponent: 3,
            initial_max_uni_streams: 1,
            disable_migration: false,
            max_ack_delay: 25,
        }
    }
}

impl TransportParams {
    /// Encode the parameter block (without any extension framing).
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Error> {
        let mut w = Writer::new(out);

        encode_int(&mut w, PARAM_INITIAL_MAX_STREAM_DATA, self.initial_max_stream_data)?;
        encode_int(&mut w, PARAM_INITIAL_MAX_DATA, self.initial_max_data)?;
        encode_int(&mut w, PARAM_INITIAL_MAX_BIDI_STREAMS, self.initial_max_bidi_streams)?;
        encode_int(&mut w, PARAM_IDLE_TIMEOUT, self.idle_timeout)?;
        if let Some(pa) = &self.preferred_address {
            let mut body = [0u8; 64];
            let body_len = encode_preferred_address(pa, &mut body)?;
            w.u16(PARAM_PREFERRED_ADDRESS)?;
            w.u16(body_len as u16)?;
            w.bytes(&body[..body_len])?;
        }
        encode_int(&mut w, PARAM_MAX_PACKET_SIZE, self.max_packet_size)?;
        if let Some(token) = &self.stateless_reset_token {
            w.u16(PARAM_STATELESS_RESET_TOKEN)?;
            w.u16(16)?;
            w.bytes(token)?;
        }
        encode_int(&mut w, PARAM_ACK_DELAY_EXPONENT, u64::from(self.ack_delay_exponent))?;
        encode_int(&mut w, PARAM_INITIAL_MAX_UNI_STREAMS, self.initial_max_uni_streams)?;
        if self.disable_migration {
            w.u16(PARAM_DISABLE_MIGRATION)?;
            w.u16(0)?;
        }

        Ok(w.used())
    }

    /// Decode and validate a parameter block.
    ///
    /// Absent parameters keep their defaults. Out-of-range values are
    /// rejected as [`Error::InvalidParams`].
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut params = Self::default();
        let mut r = Reader::new(buf);

        while !r.is_empty() {
            let id = r.u16().map_err(|_| Error::InvalidParams)?;
            let len = r.u16().map_err(|_| Error::InvalidParams)? as usize;
            let mut value = r.sub(len).map_err(|_| Error::InvalidParams)?;

            match id {
                PARAM_INITIAL_MAX_STREAM_DATA => {
                    params.initial_max_stream_data = decode_int(&mut value)?
                }
                PARAM_INITIAL_MAX_DATA => params.initial_max_data = decode_int(&mut value)?,
                PARAM_INITIAL_MAX_BIDI_STREAMS => {
                    params.initial_max_bidi_streams = decode_int(&mut value)?
                }
                PARAM_IDLE_TIMEOUT => params.idle_timeout = decode_int(&mut value)?,
                PARAM_PREFERRED_ADDRESS => {
                    params.preferred_address = Some(decode_preferred_address(&mut value)?)
                }
                PARAM_MAX_PACKET_SIZE => {
                    let v = decode_int(&mut value)?;
                    if v < MIN_MAX_PACKET_SIZE {
                        return Err(Error::InvalidParams);
                    }
                    params.max_packet_size = v;
                }
                PARAM_STATELESS_RESET_TOKEN => {
                    if len != 16 {
                        return Err(Error::InvalidParams);
                    }
                    let mut token = [0u8; 16];
                    token.copy_from_slice(value.rest());
                    params.stateless_reset_token = Some(token);
                }
                PARAM_ACK_DELAY_EXPONENT => {
                    let v = decode_int(&mut value)?;
                    if v > 20 {
                        return Err(Error::InvalidParams);
                    }
                    params.ack_delay_exponent = v as u8;
                }
                PARAM_INITIAL_MAX_UNI_STREAMS => {
                    params.initial_max_uni_streams = decode_int(&mut value)?
                }
                PARAM_DISABLE_MIGRATION => {
                    if len != 0 {
                        return Err(Error::InvalidParams);
                    }
                    params.disable_migration = true;
                }
                // Unknown parameters are skipped.
                _ => {}
            }
        }

        Ok(params)
    }
}

fn encode_int(w: &mut Writer<'_>, id: u16, value: u64) -> Result<(), Error> {
    w.u16(id)?;
    w.u16(crate::codec::varint_len(value).map_err(|_| Error::InvalidParams)? as u16)?;
    w.varint(value)
}

fn decode_int(r: &mut Reader<'_>) -> Result<u64, Error> {
    let v = r.varint().map_err(|_| Error::InvalidParams)?;
    if !r.is_empty() {
        return Err(Error::InvalidParams);
    }
    Ok(v)
}

fn encode_preferred_address(pa: &PreferredAddress, out: &mut [u8]) -> Result<usize, Error> {
    let mut w = Writer::new(out);
    w.u8(pa.ip_version)?;
    w.u8(pa.ip.len() as u8)?;
    w.bytes(&pa.ip)?;
    w.u16(pa.port)?;
    w.u8(pa.conn_id.len() as u8)?;
    w.bytes(&pa.conn_id)?;
    w.bytes(&pa.reset_token)?;
    Ok(w.used())
}

fn decode_preferred_address(r: &mut Reader<'_>) -> Result<PreferredAddress, Error> {
    let mut inner = || -> Result<PreferredAddress, Error> {
        let ip_version = r.u8()?;
        let ip_len = r.u8()? as usize;
        let ip = heapless::Vec::from_slice(r.take(ip_len)?).map_err(|_| Error::InvalidParams)?;
        let port = r.u16()?;
        let cid_len = r.u8()? as usize;
        let conn_id =
            heapless::Vec::from_slice(r.take(cid_len)?).map_err(|_| Error::InvalidParams)?;
        let mut reset_token = [0u8; 16];
        reset_token.copy_from_slice(r.take(16)?);
        if !r.is_empty() {
            return Err(Error::InvalidParams);
        }
        Ok(PreferredAddress {
            ip_version,
            ip,
            port,
            conn_id,
            reset_token,
        })
    };
    inner().map_err(|_| Error::InvalidParams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_negotiation_baseline() {
        let p = TransportParams::default();
        assert_eq!(p.initial_max_stream_data, 5000);
        assert_eq!(p.initial_max_data, 5000);
        assert_eq!(p.initial_max_bidi_streams, 1);
        assert_eq!(p.initial_max_uni_streams, 1);
        assert_eq!(p.idle_timeout, 0);
        assert_eq!(p.max_packet_size, 1200);
        assert_eq!(p.ack_delay_exponent, 3);
        assert_eq!(p.max_ack_delay, 25);
        assert!(!p.disable_migration);
    }

    #[test]
    fn roundtrip_defaults() {
        let p = TransportParams::default();
        let mut buf = [0u8; 256];
        let len = p.encode(&mut buf).unwrap();
        assert_eq!(TransportParams::decode(&buf[..len]).unwrap(), p);
    }

    #[test]
    fn roundtrip_everything_set() {
        let p = TransportParams {
            initial_max_stream_data: 100_000,
            initial_max_data: 10_000_000,
            initial_max_bidi_streams: 100,
            idle_timeout: 30_000,
            preferred_address: Some(PreferredAddress {
                ip_version: 4,
                ip: heapless::Vec::from_slice(&[10, 0, 0, 1]).unwrap(),
                port: 4433,
                conn_id: heapless::Vec::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
                reset_token: [0x42; 16],
            }),
            max_packet_size: 1500,
            stateless_reset_token: Some([0x99; 16]),
            ack_delay_exponent: 10,
            initial_max_uni_streams: 3,
            disable_migration: true,
            max_ack_delay: 25,
        };
        let mut buf = [0u8; 256];
        let len = p.encode(&mut buf).unwrap();
        assert_eq!(TransportParams::decode(&buf[..len]).unwrap(), p);
    }

    #[test]
    fn undersized_max_packet_size_rejected() {
        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        w.u16(PARAM_MAX_PACKET_SIZE).unwrap();
        w.u16(2).unwrap();
        w.varint(1199).unwrap();
        let len = w.used();
        assert_eq!(TransportParams::decode(&buf[..len]), Err(Error::InvalidParams));
    }

    #[test]
    fn bad_reset_token_length_rejected() {
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        w.u16(PARAM_STATELESS_RESET_TOKEN).unwrap();
        w.u16(15).unwrap();
        w.bytes(&[0u8; 15]).unwrap();
        let len = w.used();
        assert_eq!(TransportParams::decode(&buf[..len]), Err(Error::InvalidParams));
    }

    #[test]
    fn migration_flag_must_be_empty() {
        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        w.u16(PARAM_DISABLE_MIGRATION).unwrap();
        w.u16(1).unwrap();
        w.u8(0).unwrap();
        let len = w.used();
        assert_eq!(TransportParams::decode(&buf[..len]), Err(Error::InvalidParams));
    }

    #[test]
    fn unknown_ids_skipped() {
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        // id 0x0040, 3 opaque bytes
        w.u16(0x0040).unwrap();
        w.u16(3).unwrap();
        w.bytes(&[1, 2, 3]).unwrap();
        // then a real one
        w.u16(PARAM_IDLE_TIMEOUT).unwrap();
        w.u16(2).unwrap();
        w.varint(5000).unwrap();
        let len = w.used();
        let p = TransportParams::decode(&buf[..len]).unwrap();
        assert_eq!(p.idle_timeout, 5000);
    }

    #[test]
    fn truncated_entry_rejected() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        w.u16(PARAM_INITIAL_MAX_DATA).unwrap();
        w.u16(4).unwrap();
        w.u8(0x80).unwrap(); // claims 4 bytes, provides 1
        let len = w.used();
        assert_eq!(TransportParams::decode(&buf[..len]), Err(Error::InvalidParams));
    }

    #[test]
    fn trailing_bytes_in_int_value_rejected() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        w.u16(PARAM_IDLE_TIMEOUT).unwrap();
        w.u16(2).unwrap();
        w.u8(5).unwrap(); // 1-byte varint...
        w.u8(0).unwrap(); // ...plus a stray byte
        let len = w.used();
        assert_eq!(TransportParams::decode(&buf[..len]), Err(Error::InvalidParams));
    }
}
