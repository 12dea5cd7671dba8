//! Tachograph certificates.
//!
//! Neither generation uses X.509. A first generation certificate is a
//! fixed 194 bytes: a 128 byte signature with message recovery, the 58
//! non-recoverable content bytes and the 8 byte reference to the
//! issuing authority. Opening the signature with the issuer's key
//! recovers the first 106 content bytes; the SHA-1 hash inside the
//! opened message links the two halves. A second generation
//! certificate is an ISO 7816 TLV structure `7F21 { 7F4E body, 5F37
//! signature }` signed with plain-format ECDSA over the complete body
//! TLV.

use sha1::{Digest, Sha1};

use crate::error::{Result, TachoError};
use crate::vu::auth::ecdsa::{self, Curve};
use crate::vu::auth::rsa::RsaPublicKey;

/// Fixed width of a first generation certificate.
pub const CERTIFICATE_GEN1_SIZE: usize = 194;
/// Content layout: CPI(1) CAR(8) CHA(7) EOV(4) CHR(8) n(128) e(8).
const CONTENT_SIZE: usize = 164;
const RECOVERABLE_SIZE: usize = 106;

fn chain_err(detail: impl Into<String>) -> TachoError {
    TachoError::CertificateVerificationFailed(detail.into())
}

/// A first generation certificate after successful recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateGen1 {
    pub profile_identifier: u8,
    pub authority_reference: [u8; 8],
    pub holder_authorisation: [u8; 7],
    pub end_of_validity: [u8; 4],
    pub holder_reference: [u8; 8],
    pub public_key: RsaPublicKey,
}

/// Open a first generation certificate against its issuer's key and
/// reassemble the content from the recovered and plain halves.
pub fn verify_gen1(certificate: &[u8], issuer: &RsaPublicKey) -> Result<CertificateGen1> {
    if certificate.len() != CERTIFICATE_GEN1_SIZE {
        return Err(chain_err(format!(
            "certificate is {} bytes, 194 expected",
            certificate.len()
        )));
    }
    let signature = &certificate[..128];
    let plain = &certificate[128..128 + (CONTENT_SIZE - RECOVERABLE_SIZE)];
    let (recovered, hash) = issuer
        .recover(signature)
        .ok_or_else(|| chain_err("certificate signature does not open under the issuer key"))?;
    if recovered.len() != RECOVERABLE_SIZE {
        return Err(chain_err("recovered content has the wrong width"));
    }
    let mut content = recovered;
    content.extend_from_slice(plain);
    if Sha1::digest(&content).as_slice() != hash {
        return Err(chain_err("certificate content hash mismatch"));
    }

    let mut authority_reference = [0u8; 8];
    authority_reference.copy_from_slice(&content[1..9]);
    let mut holder_authorisation = [0u8; 7];
    holder_authorisation.copy_from_slice(&content[9..16]);
    let mut end_of_validity = [0u8; 4];
    end_of_validity.copy_from_slice(&content[16..20]);
    let mut holder_reference = [0u8; 8];
    holder_reference.copy_from_slice(&content[20..28]);
    Ok(CertificateGen1 {
        profile_identifier: content[0],
        authority_reference,
        holder_authorisation,
        end_of_validity,
        holder_reference,
        public_key: RsaPublicKey::new(&content[28..156], &content[156..164]),
    })
}

/// A parsed (not yet verified) second generation certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateGen2 {
    pub authority_reference: Vec<u8>,
    pub holder_reference: Vec<u8>,
    pub curve: Curve,
    pub public_point: Vec<u8>,
    /// Complete `7F4E` body TLV, the signed bytes.
    pub body: Vec<u8>,
    /// Raw `R || S` from the `5F37` element.
    pub signature: Vec<u8>,
}

const TAG_CERTIFICATE: u16 = 0x7f21;
const TAG_BODY: u16 = 0x7f4e;
const TAG_SIGNATURE: u16 = 0x5f37;
const TAG_AUTHORITY_REFERENCE: u16 = 0x0042;
const TAG_HOLDER_REFERENCE: u16 = 0x5f20;
const TAG_PUBLIC_KEY: u16 = 0x7f49;
const TAG_DOMAIN_PARAMETERS: u16 = 0x0006;
const TAG_PUBLIC_POINT: u16 = 0x0086;

/// One DER-TLV element: tag, value span, and the span of the complete
/// element including tag and length bytes.
struct Tlv<'a> {
    tag: u16,
    value: &'a [u8],
    raw: &'a [u8],
}

fn read_tlv<'a>(buffer: &'a [u8], offset: &mut usize) -> Result<Tlv<'a>> {
    let start = *offset;
    let err = |detail: &str| chain_err(format!("certificate TLV: {detail}"));
    let first = *buffer.get(*offset).ok_or_else(|| err("missing tag"))?;
    *offset += 1;
    let tag = if first & 0x1f == 0x1f {
        let second = *buffer.get(*offset).ok_or_else(|| err("missing tag byte"))?;
        *offset += 1;
        u16::from_be_bytes([first, second])
    } else {
        u16::from(first)
    };
    let length_byte = *buffer.get(*offset).ok_or_else(|| err("missing length"))?;
    *offset += 1;
    let length = match length_byte {
        0x00..=0x7f => usize::from(length_byte),
        0x81 => {
            let value = *buffer.get(*offset).ok_or_else(|| err("missing length byte"))?;
            *offset += 1;
            usize::from(value)
        }
        0x82 => {
            let hi = *buffer.get(*offset).ok_or_else(|| err("missing length byte"))?;
            let lo = *buffer
                .get(*offset + 1)
                .ok_or_else(|| err("missing length byte"))?;
            *offset += 2;
            usize::from(u16::from_be_bytes([hi, lo]))
        }
        _ => return Err(err("unsupported length form")),
    };
    let value_start = *offset;
    let value_end = value_start
        .checked_add(length)
        .filter(|&end| end <= buffer.len())
        .ok_or_else(|| err("length exceeds buffer"))?;
    *offset = value_end;
    Ok(Tlv {
        tag,
        value: &buffer[value_start..value_end],
        raw: &buffer[start..value_end],
    })
}

/// Parse a second generation certificate. Verification happens
/// separately because it needs the issuer's key.
pub fn parse_gen2(certificate: &[u8]) -> Result<CertificateGen2> {
    let mut offset = 0;
    let outer = read_tlv(certificate, &mut offset)?;
    if outer.tag != TAG_CERTIFICATE {
        return Err(chain_err(format!(
            "outer certificate tag {:#06x}",
            outer.tag
        )));
    }

    let mut offset = 0;
    let body = read_tlv(outer.value, &mut offset)?;
    if body.tag != TAG_BODY {
        return Err(chain_err(format!("certificate body tag {:#06x}", body.tag)));
    }
    let signature = read_tlv(outer.value, &mut offset)?;
    if signature.tag != TAG_SIGNATURE {
        return Err(chain_err(format!(
            "certificate signature tag {:#06x}",
            signature.tag
        )));
    }

    let mut authority_reference = None;
    let mut holder_reference = None;
    let mut public_key = None;
    let mut offset = 0;
    while offset < body.value.len() {
        let element = read_tlv(body.value, &mut offset)?;
        match element.tag {
            TAG_AUTHORITY_REFERENCE => authority_reference = Some(element.value.to_vec()),
            TAG_HOLDER_REFERENCE => holder_reference = Some(element.value.to_vec()),
            TAG_PUBLIC_KEY => public_key = Some(element.value.to_vec()),
            _ => {}
        }
    }
    let key_value =
        public_key.ok_or_else(|| chain_err("certificate carries no public key element"))?;

    let mut curve = None;
    let mut public_point = None;
    let mut offset = 0;
    while offset < key_value.len() {
        let element = read_tlv(&key_value, &mut offset)?;
        match element.tag {
            TAG_DOMAIN_PARAMETERS => {
                curve = Some(Curve::from_oid(element.value).ok_or_else(|| {
                    chain_err("certificate names domain parameters outside the admitted set")
                })?)
            }
            TAG_PUBLIC_POINT => public_point = Some(element.value.to_vec()),
            _ => {}
        }
    }

    Ok(CertificateGen2 {
        authority_reference: authority_reference
            .ok_or_else(|| chain_err("certificate carries no authority reference"))?,
        holder_reference: holder_reference
            .ok_or_else(|| chain_err("certificate carries no holder reference"))?,
        curve: curve.ok_or_else(|| chain_err("certificate carries no domain parameters"))?,
        public_point: public_point
            .ok_or_else(|| chain_err("certificate carries no public point"))?,
        body: body.raw.to_vec(),
        signature: signature.value.to_vec(),
    })
}

/// Check a second generation certificate's signature against its
/// issuer. The hash function follows the issuer's curve.
pub fn verify_gen2(
    certificate: &CertificateGen2,
    issuer_curve: Curve,
    issuer_point: &[u8],
) -> Result<()> {
    let digest = issuer_curve.digest(&certificate.body);
    if !ecdsa::verify(
        issuer_curve,
        issuer_point,
        &digest,
        &certificate.signature,
    ) {
        return Err(chain_err(format!(
            "certificate for holder {} does not verify under its issuer",
            hex::encode(&certificate.holder_reference),
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testbuild {
    use num_bigint::BigUint;
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::vu::auth::ecdsa;
    use crate::vu::auth::rsa::testkey::RsaTestKey;

    /// Assemble and sign a first generation certificate for the given
    /// subject key.
    pub(crate) fn gen1_certificate(
        issuer: &RsaTestKey,
        holder_reference: [u8; 8],
        subject_modulus: &[u8],
        subject_exponent: &[u8],
    ) -> Vec<u8> {
        let mut content = vec![0x01];
        content.extend(*b"EUR__CA_"); // CAR
        content.extend([0x00; 7]); // CHA
        content.extend([0xff; 4]); // EOV
        content.extend(holder_reference);
        content.extend(subject_modulus);
        let mut exponent = vec![0u8; 8 - subject_exponent.len()];
        exponent.extend(subject_exponent);
        content.extend(exponent);
        assert_eq!(CONTENT_SIZE, content.len());

        let mut message = vec![0x6a];
        message.extend(&content[..RECOVERABLE_SIZE]);
        message.extend(Sha1::digest(&content));
        message.push(0xbc);
        let mut certificate = issuer.raw_sign(&message);
        certificate.extend(&content[RECOVERABLE_SIZE..]);
        certificate.extend(*b"EUR__CA_");
        assert_eq!(CERTIFICATE_GEN1_SIZE, certificate.len());
        certificate
    }

    fn tlv(tag: u16, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        if tag > 0xff {
            out.extend(tag.to_be_bytes());
        } else {
            out.push(tag as u8);
        }
        match value.len() {
            0..=0x7f => out.push(value.len() as u8),
            0x80..=0xff => {
                out.push(0x81);
                out.push(value.len() as u8);
            }
            _ => {
                out.push(0x82);
                out.extend((value.len() as u16).to_be_bytes());
            }
        }
        out.extend(value);
        out
    }

    /// Assemble and sign a second generation certificate for the given
    /// subject point.
    pub(crate) fn gen2_certificate(
        issuer_curve: Curve,
        issuer_private: &BigUint,
        nonce: &BigUint,
        subject_curve: Curve,
        subject_point: &[u8],
        holder_reference: &[u8; 8],
    ) -> Vec<u8> {
        let oid: &[u8] = match subject_curve {
            Curve::NistP256 => &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07],
            Curve::NistP384 => &[0x2b, 0x81, 0x04, 0x00, 0x22],
            Curve::NistP521 => &[0x2b, 0x81, 0x04, 0x00, 0x23],
            Curve::BrainpoolP256R1 => &[0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07],
            Curve::BrainpoolP384R1 => &[0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0b],
            Curve::BrainpoolP512R1 => &[0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0d],
        };
        let mut key = tlv(TAG_DOMAIN_PARAMETERS, oid);
        key.extend(tlv(TAG_PUBLIC_POINT, subject_point));

        let mut body_value = tlv(0x5f29, &[0x01]);
        body_value.extend(tlv(TAG_AUTHORITY_REFERENCE, b"EUR_ECA_"));
        body_value.extend(tlv(0x5f4c, &[0x00; 7]));
        body_value.extend(tlv(TAG_PUBLIC_KEY, &key));
        body_value.extend(tlv(TAG_HOLDER_REFERENCE, holder_reference));
        body_value.extend(tlv(0x5f25, &[0x00; 4]));
        body_value.extend(tlv(0x5f24, &[0xff; 4]));
        let body = tlv(TAG_BODY, &body_value);

        let digest = issuer_curve.digest(&body);
        let signature = ecdsa::sign(issuer_curve, issuer_private, nonce, &digest);

        let mut certificate_value = body;
        certificate_value.extend(tlv(TAG_SIGNATURE, &signature));
        tlv(TAG_CERTIFICATE, &certificate_value)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    use super::testbuild;
    use super::*;
    use crate::vu::auth::ecdsa::public_key;
    use crate::vu::auth::rsa::testkey;

    #[test]
    fn gen1_certificate_recovers_its_subject_key() {
        let key = testkey::key();
        let certificate = testbuild::gen1_certificate(
            &key,
            *b"MSCA_DE_",
            &key.modulus,
            &key.exponent,
        );
        let parsed = verify_gen1(&certificate, &key.public()).unwrap();
        assert_eq!(*b"MSCA_DE_", parsed.holder_reference);
        assert_eq!(key.public(), parsed.public_key);
    }

    #[test]
    fn gen1_certificate_rejects_tampering() {
        let key = testkey::key();
        let certificate = testbuild::gen1_certificate(
            &key,
            *b"MSCA_DE_",
            &key.modulus,
            &key.exponent,
        );
        let mut tampered = certificate.clone();
        tampered[0] ^= 0x01;
        assert!(verify_gen1(&tampered, &key.public()).is_err());
    }

    #[test]
    fn gen2_certificate_parses_and_verifies() {
        let issuer_private = BigUint::from(0x0acc_e550_1234u64);
        let subject_private = BigUint::from(0x0bad_c0de_5678u64);
        let nonce = BigUint::from(0x0fed_f00d_9abcu64);
        let curve = Curve::BrainpoolP256R1;
        let issuer_point = public_key(curve, &issuer_private);
        let subject_point = public_key(curve, &subject_private);

        let bytes = testbuild::gen2_certificate(
            curve,
            &issuer_private,
            &nonce,
            curve,
            &subject_point,
            b"VU_SER01",
        );
        let parsed = parse_gen2(&bytes).unwrap();
        assert_eq!(b"VU_SER01".to_vec(), parsed.holder_reference);
        assert_eq!(b"EUR_ECA_".to_vec(), parsed.authority_reference);
        assert_eq!(curve, parsed.curve);
        assert_eq!(subject_point, parsed.public_point);
        verify_gen2(&parsed, curve, &issuer_point).unwrap();

        // The subject's own key must not open the issuer's signature.
        assert!(verify_gen2(&parsed, curve, &subject_point).is_err());
    }

    #[test]
    fn gen2_parse_rejects_foreign_outer_tag() {
        assert!(parse_gen2(&[0x30, 0x03, 0x01, 0x02, 0x03]).is_err());
    }
}
