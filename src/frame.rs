//! CRYPTO frame codec.
//!
//! The CRYPTO frame carries an ordered byte stream of TLS handshake records
//! at each encryption level. Wire layout:
//!
//! ```text
//! type (0x18) || offset (varint) || length (varint) || data
//! ```
//!
//! The codec is pure: per-level offset bookkeeping lives in the session.

use crate::codec::{varint_len, Reader, Writer};
use crate::error::Error;

/// CRYPTO frame type byte.
pub const FRAME_CRYPTO: u8 = 0x18;

/// A parsed CRYPTO frame borrowing its payload from the input datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoFrame<'a> {
    /// Byte offset into the level's CRYPTO stream.
    pub offset: u64,
    /// TLS handshake record bytes.
    pub data: &'a [u8],
}

/// Bytes a CRYPTO frame header occupies for the given offset and data length.
pub fn crypto_frame_overhead(offset: u64, data_len: usize) -> Result<usize, Error> {
    Ok(1 + varint_len(offset)? + varint_len(data_len as u64)?)
}

/// Write just the frame header for a payload of `data_len` bytes.
/// Returns the header length.
pub fn encode_crypto_frame_header(
    offset: u64,
    data_len: usize,
    out: &mut [u8],
) -> Result<usize, Error> {
    let mut w = Writer::new(out);
    w.u8(FRAME_CRYPTO)?;
    w.varint(offset)?;
    w.varint(data_len as u64)?;
    Ok(w.used())
}

/// Encode a CRYPTO frame into `out`. Returns the number of bytes written.
pub fn encode_crypto_frame(offset: u64, data: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let hdr = encode_crypto_frame_header(offset, data.len(), out)?;
    let mut w = Writer::new(&mut out[hdr..]);
    w.bytes(data)?;
    Ok(hdr + w.used())
}

/// Parse one CRYPTO frame from the front of `buf`.
///
/// Returns the frame and the number of bytes consumed; any remaining bytes
/// belong to subsequent frames.
pub fn parse_crypto_frame(buf: &[u8]) -> Result<(CryptoFrame<'_>, usize), Error> {
    let mut r = Reader::new(buf);
    if r.u8()? != FRAME_CRYPTO {
        return Err(Error::ProtocolViolation);
    }
    let offset = r.varint()?;
    let length = r.varint()?;
    let data = r.take(length as usize)?;
    Ok((CryptoFrame { offset, data }, r.used()))
}
