//! ECDSA-secp256r1-SHA256: CertificateVerify signatures and X.509 chain
//! checks.
//!
//! The endpoint negotiates exactly one signature algorithm (0x0403). The
//! DER handling here is deliberately narrow: enough ASN.1 to split a
//! certificate into its signed TBS region and signature, locate a P-256
//! SubjectPublicKeyInfo, and mint a self-signed certificate for a supplied
//! scalar. It is not a general X.509 library.

use crate::error::Error;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};

/// TLS SignatureScheme code for ecdsa_secp256r1_sha256.
pub const ECDSA_SECP256R1_SHA256: u16 = 0x0403;

/// Largest DER-encoded ECDSA-P256 signature (72 bytes) with headroom.
pub type Signature = heapless::Vec<u8, 80>;

const SECP256R1_OID: &[u8] = &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];

/// Sign a handshake transcript digest with a 32-byte private scalar.
///
/// Returns the DER-encoded signature carried in CertificateVerify.
pub fn sign_digest(scalar: &[u8; 32], digest: &[u8; 32]) -> Result<Signature, Error> {
    let key = SigningKey::from_bytes(scalar.into()).map_err(|_| Error::Crypto)?;
    let sig: DerSignature = key.sign(digest);
    let mut out = Signature::new();
    out.extend_from_slice(sig.as_bytes())
        .map_err(|_| Error::Crypto)?;
    Ok(out)
}

/// Verify a CertificateVerify signature over a transcript digest.
///
/// `public_key` is an uncompressed SEC1 point (the peer's key share).
pub fn verify_digest(public_key: &[u8], signature: &[u8], digest: &[u8; 32]) -> Result<(), Error> {
    let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| Error::CertVerify)?;
    let sig = DerSignature::try_from(signature).map_err(|_| Error::CertVerify)?;
    key.verify(digest, &sig).map_err(|_| Error::CertVerify)
}

/// Derive the uncompressed SEC1 public point from a private scalar.
pub fn public_key_from_scalar(scalar: &[u8; 32]) -> Result<[u8; 65], Error> {
    let key = SigningKey::from_bytes(scalar.into()).map_err(|_| Error::Crypto)?;
    let point = key.verifying_key().to_encoded_point(false);
    let mut out = [0u8; 65];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

// ---- DER walking ----

/// Parse one DER length field: (value, bytes consumed).
fn der_length(data: &[u8]) -> Result<(usize, usize), Error> {
    match data.first() {
        Some(&b) if b < 0x80 => Ok((b as usize, 1)),
        Some(0x81) if data.len() >= 2 => Ok((data[1] as usize, 2)),
        Some(0x82) if data.len() >= 3 => {
            Ok((((data[1] as usize) << 8) | data[2] as usize, 3))
        }
        _ => Err(Error::Cert),
    }
}

/// Split one TLV element off the front of `data`.
///
/// Returns `(tag, content, full_encoding, rest)`.
fn der_element(data: &[u8]) -> Result<(u8, &[u8], &[u8], &[u8]), Error> {
    if data.is_empty() {
        return Err(Error::Cert);
    }
    let tag = data[0];
    let (len, len_bytes) = der_length(&data[1..])?;
    let total = 1 + len_bytes + len;
    if data.len() < total {
        return Err(Error::Cert);
    }
    let content = &data[1 + len_bytes..total];
    Ok((tag, content, &data[..total], &data[total..]))
}

/// The regions of a certificate relevant to signature checking.
pub struct CertParts<'a> {
    /// The full DER encoding of tbsCertificate — the bytes the issuer signed.
    pub signed: &'a [u8],
    /// DER-encoded ECDSA signature from the signatureValue BIT STRING.
    pub signature: &'a [u8],
}

/// Split a DER certificate into its signed TBS bytes and signature.
pub fn split_certificate(cert_der: &[u8]) -> Result<CertParts<'_>, Error> {
    let (tag, content, _, _) = der_element(cert_der)?;
    if tag != 0x30 {
        return Err(Error::Cert);
    }

    // tbsCertificate
    let (tbs_tag, _, tbs_full, rest) = der_element(content)?;
    if tbs_tag != 0x30 {
        return Err(Error::Cert);
    }
    // signatureAlgorithm
    let (alg_tag, _, _, rest) = der_element(rest)?;
    if alg_tag != 0x30 {
        return Err(Error::Cert);
    }
    // signatureValue
    let (sig_tag, sig_content, _, _) = der_element(rest)?;
    if sig_tag != 0x03 || sig_content.first() != Some(&0x00) {
        return Err(Error::Cert);
    }

    Ok(CertParts {
        signed: tbs_full,
        signature: &sig_content[1..],
    })
}

/// Extract the P-256 public key from a DER certificate.
///
/// Locates the secp256r1 OID, then the SubjectPublicKeyInfo BIT STRING
/// holding the uncompressed point.
pub fn extract_public_key(cert_der: &[u8]) -> Result<[u8; 65], Error> {
    let oid_at = cert_der
        .windows(SECP256R1_OID.len())
        .position(|w| w == SECP256R1_OID)
        .ok_or(Error::Cert)?;

    let mut pos = oid_at + SECP256R1_OID.len();
    while pos < cert_der.len() {
        if cert_der[pos] == 0x03 {
            if let Ok((len, len_bytes)) = der_length(&cert_der[pos + 1..]) {
                // 1 unused-bits byte + 65-byte uncompressed point
                let start = pos + 1 + len_bytes;
                if len == 66 && cert_der.get(start) == Some(&0x00) {
                    let point = cert_der.get(start + 1..start + 66).ok_or(Error::Cert)?;
                    let mut out = [0u8; 65];
                    out.copy_from_slice(point);
                    return Ok(out);
                }
            }
        }
        pos += 1;
    }
    Err(Error::Cert)
}

/// Check that `cert_der` was signed by the holder of `issuer_key`.
pub fn verify_cert_signature(cert_der: &[u8], issuer_key: &[u8]) -> Result<(), Error> {
    let parts = split_certificate(cert_der)?;
    let key = VerifyingKey::from_sec1_bytes(issuer_key).map_err(|_| Error::Cert)?;
    let sig = DerSignature::try_from(parts.signature).map_err(|_| Error::Cert)?;
    key.verify(parts.signed, &sig).map_err(|_| Error::Cert)
}

/// Validate a leaf-first certificate chain.
///
/// Every certificate must be signed by its successor's key; the final
/// certificate must be self-signed. A chain whose root equals its leaf is
/// the degenerate self-signed case and is accepted on the same terms.
pub fn verify_chain(chain: &[&[u8]]) -> Result<(), Error> {
    let root = *chain.last().ok_or(Error::Cert)?;
    for pair in chain.windows(2) {
        let issuer_key = extract_public_key(pair[1])?;
        verify_cert_signature(pair[0], &issuer_key)?;
    }
    let root_key = extract_public_key(root)?;
    verify_cert_signature(root, &root_key)
}

// ---- Certificate construction ----

const ECDSA_SHA256_ALG_ID: &[u8] = &[
    0x30, 0x0a, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02,
];

fn der_length_size(len: usize) -> usize {
    if len < 0x80 {
        1
    } else if len < 0x100 {
        2
    } else {
        3
    }
}

fn write_der_length(len: usize, out: &mut [u8]) -> Result<usize, Error> {
    let size = der_length_size(len);
    if out.len() < size {
        return Err(Error::BufferTooSmall { needed: size });
    }
    match size {
        1 => out[0] = len as u8,
        2 => {
            out[0] = 0x81;
            out[1] = len as u8;
        }
        _ => {
            out[0] = 0x82;
            out[1] = (len >> 8) as u8;
            out[2] = len as u8;
        }
    }
    Ok(size)
}

/// Build a self-signed DER certificate for a P-256 scalar.
///
/// The TBS is a minimal X.509v3 body (fixed issuer/subject, ten-year
/// validity) around the scalar's public key, genuinely signed with the
/// scalar so chain validation accepts it. Returns bytes written to `out`.
pub fn build_self_signed_cert(scalar: &[u8; 32], out: &mut [u8]) -> Result<usize, Error> {
    let public = public_key_from_scalar(scalar)?;

    // CN=quicseal as SET { SEQUENCE { OID 2.5.4.3, UTF8String } }
    const NAME: &[u8] = &[
        0x30, 0x13, 0x31, 0x11, 0x30, 0x0f, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0c, 0x08, b'q',
        b'u', b'i', b'c', b's', b'e', b'a', b'l',
    ];
    const VALIDITY: &[u8] = &[
        0x30, 0x1e, 0x17, 0x0d, b'2', b'5', b'0', b'1', b'0', b'1', b'0', b'0', b'0', b'0',
        b'0', b'0', b'Z', 0x17, 0x0d, b'3', b'5', b'0', b'1', b'0', b'1', b'0', b'0', b'0',
        b'0', b'0', b'0', b'Z',
    ];
    const VERSION_V3: &[u8] = &[0xa0, 0x03, 0x02, 0x01, 0x02];
    const SERIAL: &[u8] = &[0x02, 0x01, 0x01];
    // SPKI: SEQUENCE { SEQUENCE { ecPublicKey, secp256r1 }, BIT STRING }
    const SPKI_PREFIX: &[u8] = &[
        0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06,
        0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
    ];

    // Assemble the TBS content.
    let mut tbs = [0u8; 256];
    let mut len = 0;
    for part in [VERSION_V3, SERIAL, ECDSA_SHA256_ALG_ID, NAME, VALIDITY, NAME, SPKI_PREFIX] {
        tbs[len..len + part.len()].copy_from_slice(part);
        len += part.len();
    }
    tbs[len..len + 65].copy_from_slice(&public);
    len += 65;

    // Wrap in the TBS SEQUENCE and sign the wrapped encoding.
    let mut tbs_full = [0u8; 300];
    tbs_full[0] = 0x30;
    let lb = write_der_length(len, &mut tbs_full[1..])?;
    tbs_full[1 + lb..1 + lb + len].copy_from_slice(&tbs[..len]);
    let tbs_full_len = 1 + lb + len;

    let key = SigningKey::from_bytes(scalar.into()).map_err(|_| Error::Crypto)?;
    let sig: DerSignature = key.sign(&tbs_full[..tbs_full_len]);
    let sig_bytes = sig.as_bytes();

    let bitstring_content_len = 1 + sig_bytes.len();
    let bitstring_len = 1 + der_length_size(bitstring_content_len) + bitstring_content_len;
    let body_len = tbs_full_len + ECDSA_SHA256_ALG_ID.len() + bitstring_len;
    let total = 1 + der_length_size(body_len) + body_len;
    if out.len() < total {
        return Err(Error::BufferTooSmall { needed: total });
    }

    let mut pos = 0;
    out[pos] = 0x30;
    pos += 1;
    pos += write_der_length(body_len, &mut out[pos..])?;
    out[pos..pos + tbs_full_len].copy_from_slice(&tbs_full[..tbs_full_len]);
    pos += tbs_full_len;
    out[pos..pos + ECDSA_SHA256_ALG_ID.len()].copy_from_slice(ECDSA_SHA256_ALG_ID);
    pos += ECDSA_SHA256_ALG_ID.len();
    out[pos] = 0x03;
    pos += 1;
    pos += write_der_length(bitstring_content_len, &mut out[pos..])?;
    out[pos] = 0x00;
    pos += 1;
    out[pos..pos + sig_bytes.len()].copy_from_slice(sig_bytes);
    pos += sig_bytes.len();

    Ok(pos)
}
