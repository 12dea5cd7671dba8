//! Record authentication: the EUR -> MSCA -> VU certificate chain and
//! the per-record data signatures.
//!
//! Authentication is soft-fail. Every record in the file is attempted,
//! each receives an `Authentication` outcome, and one joined error
//! listing every failing record is returned at the end, so callers can
//! inspect partially trustworthy content without retrying.

pub mod certificate;
pub mod ecdsa;
pub mod resolver;
pub mod rsa;

use tracing::debug;

use crate::error::{Result, TachoError};
use crate::vu::auth::ecdsa::Curve;
use crate::vu::auth::resolver::{CertificateResolver, RootCertificate};
use crate::vu::auth::rsa::RsaPublicKey;
use crate::vu::raw::{RawFile, RawRecord};
use crate::vu::record_array::{header_at, RecordArrayType, RECORD_ARRAY_HEADER_SIZE};
use crate::vu::sizer::CERTIFICATE_GEN1_SIZE;
use crate::vu::transfer::{Generation, TransferType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationStatus {
    Verified,
    CertificateVerificationFailed,
    DataSignatureInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    RsaSha1,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SignatureAlgorithm {
    fn for_curve(curve: Curve) -> SignatureAlgorithm {
        match curve {
            Curve::NistP256 | Curve::BrainpoolP256R1 => SignatureAlgorithm::EcdsaSha256,
            Curve::NistP384 | Curve::BrainpoolP384R1 => SignatureAlgorithm::EcdsaSha384,
            Curve::NistP521 | Curve::BrainpoolP512R1 => SignatureAlgorithm::EcdsaSha512,
        }
    }
}

/// Per-record authentication outcome, attached to the raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct Authentication {
    pub status: AuthenticationStatus,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Human-readable reason when the status is not `Verified`.
    pub detail: Option<String>,
}

impl Authentication {
    fn verified(algorithm: SignatureAlgorithm) -> Authentication {
        Authentication {
            status: AuthenticationStatus::Verified,
            signature_algorithm: Some(algorithm),
            detail: None,
        }
    }

    fn chain_failed(detail: String) -> Authentication {
        Authentication {
            status: AuthenticationStatus::CertificateVerificationFailed,
            signature_algorithm: None,
            detail: Some(detail),
        }
    }

    fn signature_invalid(algorithm: SignatureAlgorithm, detail: String) -> Authentication {
        Authentication {
            status: AuthenticationStatus::DataSignatureInvalid,
            signature_algorithm: Some(algorithm),
            detail: Some(detail),
        }
    }
}

/// Verify every record in the file against the certificates carried in
/// its overview, annotating each record with the outcome.
///
/// The chain is established once per generation from the overview
/// record; records of a generation with no usable chain all report
/// `CertificateVerificationFailed`. The call returns `Ok` only when
/// every signed record verified; otherwise the joined error lists each
/// failing record, while the per-record annotations remain attached.
pub fn authenticate(raw: &mut RawFile, resolver: &dyn CertificateResolver) -> Result<()> {
    let gen1_chain = if raw
        .records
        .iter()
        .any(|r| r.generation == Generation::Gen1)
    {
        Some(gen1_chain(raw, resolver))
    } else {
        None
    };
    let gen2_chain = if raw
        .records
        .iter()
        .any(|r| r.generation == Generation::Gen2)
    {
        Some(gen2_chain(raw, resolver))
    } else {
        None
    };

    let mut failures = Vec::new();
    for index in 0..raw.records.len() {
        let Some(outcome) = verify_record(
            &raw.records[index],
            gen1_chain.as_ref(),
            gen2_chain.as_ref(),
        ) else {
            continue;
        };
        debug!(
            transfer = ?raw.records[index].transfer_type,
            status = ?outcome.status,
            "record authenticated"
        );
        if outcome.status != AuthenticationStatus::Verified {
            failures.push(format!(
                "{:?}: {}",
                raw.records[index].transfer_type,
                outcome.detail.as_deref().unwrap_or("unspecified failure"),
            ));
        }
        raw.records[index].authentication = Some(outcome);
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TachoError::Authentication(failures))
    }
}

/// EUR -> MSCA -> VU for generation 1: both 194 byte certificates sit
/// at the front of the overview data.
fn gen1_chain(raw: &RawFile, resolver: &dyn CertificateResolver) -> Result<RsaPublicKey> {
    let overview = raw
        .records
        .iter()
        .find(|r| r.transfer_type == TransferType::OverviewGen1)
        .ok_or_else(|| {
            TachoError::CertificateVerificationFailed(
                "no generation 1 overview to take certificates from".into(),
            )
        })?;
    let data = overview.data();
    if data.len() < 2 * CERTIFICATE_GEN1_SIZE {
        return Err(TachoError::CertificateVerificationFailed(
            "overview too short to carry both certificates".into(),
        ));
    }
    let root = match resolver.root(Generation::Gen1)? {
        RootCertificate::Rsa { modulus, exponent } => RsaPublicKey::new(&modulus, &exponent),
        RootCertificate::Ecc { .. } => {
            return Err(TachoError::CertificateVerificationFailed(
                "resolver served an ECC anchor for generation 1".into(),
            ))
        }
    };
    let msca = certificate::verify_gen1(&data[..CERTIFICATE_GEN1_SIZE], &root)?;
    let vu = certificate::verify_gen1(
        &data[CERTIFICATE_GEN1_SIZE..2 * CERTIFICATE_GEN1_SIZE],
        &msca.public_key,
    )?;
    Ok(vu.public_key)
}

/// EUR -> MSCA -> VU for generation 2: the overview's first two record
/// arrays hold one certificate each.
fn gen2_chain(raw: &RawFile, resolver: &dyn CertificateResolver) -> Result<(Curve, Vec<u8>)> {
    let overview = raw
        .records
        .iter()
        .find(|r| {
            matches!(
                r.transfer_type,
                TransferType::OverviewGen2V1 | TransferType::OverviewGen2V2
            )
        })
        .ok_or_else(|| {
            TachoError::CertificateVerificationFailed(
                "no generation 2 overview to take certificates from".into(),
            )
        })?;
    let data = overview.data();
    let msca_bytes = certificate_array(data, 0, RecordArrayType::MemberStateCertificate)?;
    let vu_offset = RECORD_ARRAY_HEADER_SIZE + msca_bytes.len();
    let vu_bytes = certificate_array(data, vu_offset, RecordArrayType::VuCertificate)?;

    let (root_curve, root_point) = match resolver.root(Generation::Gen2)? {
        RootCertificate::Ecc { curve, point } => (curve, point),
        RootCertificate::Rsa { .. } => {
            return Err(TachoError::CertificateVerificationFailed(
                "resolver served an RSA anchor for generation 2".into(),
            ))
        }
    };
    let msca = certificate::parse_gen2(msca_bytes)?;
    certificate::verify_gen2(&msca, root_curve, &root_point)?;
    let vu = certificate::parse_gen2(vu_bytes)?;
    certificate::verify_gen2(&vu, msca.curve, &msca.public_point)?;
    Ok((vu.curve, vu.public_point))
}

/// Body of a single-record certificate array at `offset`.
fn certificate_array(
    data: &[u8],
    offset: usize,
    expected: RecordArrayType,
) -> Result<&[u8]> {
    let header = header_at(data, offset)?;
    header.expect_type(expected)?;
    if header.no_of_records != 1 {
        return Err(TachoError::CertificateVerificationFailed(format!(
            "{expected:?} array holds {} records",
            header.no_of_records
        )));
    }
    let start = offset + RECORD_ARRAY_HEADER_SIZE;
    TachoError::check_len(data, start, header.body_size())?;
    Ok(&data[start..start + header.body_size()])
}

fn verify_record(
    record: &RawRecord,
    gen1_chain: Option<&Result<RsaPublicKey>>,
    gen2_chain: Option<&Result<(Curve, Vec<u8>)>>,
) -> Option<Authentication> {
    if record.transfer_type == TransferType::DownloadInterfaceVersion {
        // Two bytes, no signature; nothing to verify.
        return None;
    }
    match record.generation {
        Generation::Gen1 => Some(verify_gen1_record(record, gen1_chain?)),
        Generation::Gen2 => Some(verify_gen2_record(record, gen2_chain?)),
    }
}

fn verify_gen1_record(record: &RawRecord, chain: &Result<RsaPublicKey>) -> Authentication {
    let key = match chain {
        Ok(key) => key,
        Err(err) => return Authentication::chain_failed(err.to_string()),
    };
    let (data, signature) = record.split_value();
    // The overview signs only what follows its two certificates.
    let signed = if record.transfer_type == TransferType::OverviewGen1 {
        &data[2 * CERTIFICATE_GEN1_SIZE..]
    } else {
        data
    };
    if key.verify_pkcs1_sha1(signed, signature) {
        Authentication::verified(SignatureAlgorithm::RsaSha1)
    } else {
        Authentication::signature_invalid(
            SignatureAlgorithm::RsaSha1,
            "RSA signature does not match the record data".into(),
        )
    }
}

fn verify_gen2_record(record: &RawRecord, chain: &Result<(Curve, Vec<u8>)>) -> Authentication {
    let (curve, point) = match chain {
        Ok(chain) => chain,
        Err(err) => return Authentication::chain_failed(err.to_string()),
    };
    let algorithm = SignatureAlgorithm::for_curve(*curve);
    let (data, signature_array) = record.split_value();
    if signature_array.len() < RECORD_ARRAY_HEADER_SIZE {
        return Authentication::signature_invalid(
            algorithm,
            "record carries no signature array".into(),
        );
    }
    let signature = &signature_array[RECORD_ARRAY_HEADER_SIZE..];
    if signature.len() != 2 * curve.field_size() {
        return Authentication::signature_invalid(
            algorithm,
            format!(
                "signature is {} bytes where the curve requires {}",
                signature.len(),
                2 * curve.field_size()
            ),
        );
    }
    let digest = curve.digest(data);
    if ecdsa::verify(*curve, point, &digest, signature) {
        Authentication::verified(algorithm)
    } else {
        Authentication::signature_invalid(
            algorithm,
            "ECDSA signature does not match the record data".into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    use super::certificate::testbuild;
    use super::rsa::testkey;
    use super::*;
    use crate::vu::record_array::emit_header;
    use crate::vu::sizer::{
        COMPANY_LOCKS_GEN2_SIZE, CONTROL_ACTIVITY_GEN2_SIZE, DOWNLOAD_ACTIVITY_GEN2_SIZE,
        OVERVIEW_GEN1_FIXED, SIGNATURE_GEN1_SIZE,
    };
    use crate::vu::ParseOptions;

    struct TestRsaResolver {
        modulus: Vec<u8>,
        exponent: Vec<u8>,
    }

    impl CertificateResolver for TestRsaResolver {
        fn root(&self, generation: Generation) -> Result<RootCertificate> {
            match generation {
                Generation::Gen1 => Ok(RootCertificate::Rsa {
                    modulus: self.modulus.clone(),
                    exponent: self.exponent.clone(),
                }),
                Generation::Gen2 => Err(TachoError::CertificateVerificationFailed(
                    "no generation 2 anchor".into(),
                )),
            }
        }
    }

    struct TestEccResolver {
        curve: Curve,
        point: Vec<u8>,
    }

    impl CertificateResolver for TestEccResolver {
        fn root(&self, generation: Generation) -> Result<RootCertificate> {
            match generation {
                Generation::Gen2 => Ok(RootCertificate::Ecc {
                    curve: self.curve,
                    point: self.point.clone(),
                }),
                Generation::Gen1 => Err(TachoError::CertificateVerificationFailed(
                    "no generation 1 anchor".into(),
                )),
            }
        }
    }

    /// A generation 1 file whose certificates and signatures all chain
    /// from the fixed test key.
    fn signed_gen1_file() -> (Vec<u8>, TestRsaResolver) {
        let key = testkey::key();
        let msca =
            testbuild::gen1_certificate(&key, *b"MSCA_DE_", &key.modulus, &key.exponent);
        let vu = testbuild::gen1_certificate(&key, *b"VU_SER01", &key.modulus, &key.exponent);

        let mut overview_data = Vec::new();
        overview_data.extend(&msca);
        overview_data.extend(&vu);
        overview_data.extend(vec![0u8; OVERVIEW_GEN1_FIXED - 2 * CERTIFICATE_GEN1_SIZE]);
        overview_data.extend([0x00, 0x00]); // no locks, no controls
        let overview_signature = key.sign_pkcs1_sha1(&overview_data[2 * CERTIFICATE_GEN1_SIZE..]);

        let mut speed_data = vec![0x00, 0x00];
        let speed_signature = key.sign_pkcs1_sha1(&speed_data);

        let mut input = vec![0x76, 0x01];
        input.extend(&overview_data);
        input.extend(&overview_signature);
        input.extend([0x76, 0x04]);
        input.append(&mut speed_data);
        input.extend(&speed_signature);

        let resolver = TestRsaResolver {
            modulus: key.modulus.clone(),
            exponent: key.exponent.clone(),
        };
        (input, resolver)
    }

    #[test]
    fn gen1_chain_and_signatures_verify() {
        let (input, resolver) = signed_gen1_file();
        let mut raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        authenticate(&mut raw, &resolver).unwrap();
        for record in &raw.records {
            let outcome = record.authentication.as_ref().unwrap();
            assert_eq!(AuthenticationStatus::Verified, outcome.status);
            assert_eq!(Some(SignatureAlgorithm::RsaSha1), outcome.signature_algorithm);
        }
    }

    #[test]
    fn authentication_is_deterministic() {
        let (input, resolver) = signed_gen1_file();
        let mut first = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        let mut second = first.clone();
        let _ = authenticate(&mut first, &resolver);
        let _ = authenticate(&mut second, &resolver);
        assert_eq!(first, second);
    }

    #[test]
    fn zeroed_signature_fails_soft_with_a_joined_error() {
        let (mut input, resolver) = signed_gen1_file();
        let len = input.len();
        input[len - SIGNATURE_GEN1_SIZE..].fill(0x00);
        let mut raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();

        let err = authenticate(&mut raw, &resolver).unwrap_err();
        let TachoError::Authentication(failures) = err else {
            panic!("expected a joined authentication error");
        };
        assert_eq!(1, failures.len());
        assert!(failures[0].starts_with("DetailedSpeedGen1"));

        // Every record still carries its outcome.
        assert_eq!(
            AuthenticationStatus::Verified,
            raw.records[0].authentication.as_ref().unwrap().status
        );
        assert_eq!(
            AuthenticationStatus::DataSignatureInvalid,
            raw.records[1].authentication.as_ref().unwrap().status
        );
    }

    #[test]
    fn missing_overview_fails_every_record_of_that_generation() {
        let key = testkey::key();
        let mut speed_data = vec![0x00, 0x00];
        let signature = key.sign_pkcs1_sha1(&speed_data);
        let mut input = vec![0x76, 0x04];
        input.append(&mut speed_data);
        input.extend(&signature);

        let resolver = TestRsaResolver {
            modulus: key.modulus.clone(),
            exponent: key.exponent.clone(),
        };
        let mut raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        let err = authenticate(&mut raw, &resolver).unwrap_err();
        assert!(matches!(err, TachoError::Authentication(_)));
        assert_eq!(
            AuthenticationStatus::CertificateVerificationFailed,
            raw.records[0].authentication.as_ref().unwrap().status
        );
    }

    /// A generation 2 file with a Brainpool P-256 hierarchy.
    fn signed_gen2_file() -> (Vec<u8>, TestEccResolver) {
        let curve = Curve::BrainpoolP256R1;
        let root_private = BigUint::from(0x0acc_e550_1234u64);
        let msca_private = BigUint::from(0x0bad_c0de_5678u64);
        let vu_private = BigUint::from(0x0c0f_fee0_9abcu64);
        let nonce = BigUint::from(0x0fed_f00d_4321u64);

        let root_point = ecdsa::public_key(curve, &root_private);
        let msca_point = ecdsa::public_key(curve, &msca_private);
        let vu_point = ecdsa::public_key(curve, &vu_private);

        let msca_cert = testbuild::gen2_certificate(
            curve,
            &root_private,
            &nonce,
            curve,
            &msca_point,
            b"MSCA_DE_",
        );
        let vu_cert = testbuild::gen2_certificate(
            curve,
            &msca_private,
            &nonce,
            curve,
            &vu_point,
            b"VU_SER01",
        );

        let mut data = Vec::new();
        emit_header(
            &mut data,
            RecordArrayType::MemberStateCertificate.code(),
            msca_cert.len() as u16,
            1,
        );
        data.extend(&msca_cert);
        emit_header(
            &mut data,
            RecordArrayType::VuCertificate.code(),
            vu_cert.len() as u16,
            1,
        );
        data.extend(&vu_cert);
        for (ty, size) in [
            (RecordArrayType::VehicleIdentificationNumber, 17u16),
            (RecordArrayType::VehicleRegistrationIdentification, 15),
            (RecordArrayType::CurrentDateTime, 4),
            (RecordArrayType::VuDownloadablePeriod, 8),
            (RecordArrayType::CardSlotsStatus, 1),
            (
                RecordArrayType::VuDownloadActivityData,
                DOWNLOAD_ACTIVITY_GEN2_SIZE as u16,
            ),
            (
                RecordArrayType::VuCompanyLocksRecord,
                COMPANY_LOCKS_GEN2_SIZE as u16,
            ),
            (
                RecordArrayType::VuControlActivityRecord,
                CONTROL_ACTIVITY_GEN2_SIZE as u16,
            ),
        ] {
            emit_header(&mut data, ty.code(), size, 0);
        }
        let digest = curve.digest(&data);
        let signature = ecdsa::sign(curve, &vu_private, &nonce, &digest);

        let mut input = vec![0x76, 0x11];
        input.extend(&data);
        emit_header(
            &mut input,
            RecordArrayType::Signature.code(),
            signature.len() as u16,
            1,
        );
        input.extend(&signature);

        let resolver = TestEccResolver {
            curve,
            point: root_point,
        };
        (input, resolver)
    }

    #[test]
    fn gen2_chain_and_signature_verify() {
        let (input, resolver) = signed_gen2_file();
        let mut raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        authenticate(&mut raw, &resolver).unwrap();
        let outcome = raw.records[0].authentication.as_ref().unwrap();
        assert_eq!(AuthenticationStatus::Verified, outcome.status);
        assert_eq!(
            Some(SignatureAlgorithm::EcdsaSha256),
            outcome.signature_algorithm
        );
    }

    #[test]
    fn gen2_zeroed_signature_body_is_invalid() {
        let (mut input, resolver) = signed_gen2_file();
        let len = input.len();
        input[len - 64..].fill(0x00);
        let mut raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        let err = authenticate(&mut raw, &resolver).unwrap_err();
        assert!(matches!(err, TachoError::Authentication(_)));
        assert_eq!(
            AuthenticationStatus::DataSignatureInvalid,
            raw.records[0].authentication.as_ref().unwrap().status
        );
    }
}
