//! Root certificate resolution.
//!
//! The chain anchors, one per generation, are owned by the European
//! Root Certification Authority. The default resolver serves them from
//! the table embedded below; callers that keep their anchors elsewhere
//! (a remote service, a test hierarchy) implement the trait themselves
//! and pass their resolver into authentication. The codec never
//! consults this module on its own.

use crate::error::{Result, TachoError};
use crate::vu::auth::ecdsa::Curve;
use crate::vu::transfer::Generation;

/// A chain anchor: the European root public key for one generation.
#[derive(Debug, Clone, PartialEq)]
pub enum RootCertificate {
    /// First generation anchor: an RSA-1024 modulus and exponent.
    Rsa {
        modulus: Vec<u8>,
        exponent: Vec<u8>,
    },
    /// Second generation anchor: an ECC public point.
    Ecc { curve: Curve, point: Vec<u8> },
}

/// Lifts a generation to its root certificate.
pub trait CertificateResolver {
    fn root(&self, generation: Generation) -> Result<RootCertificate>;
}

/// Resolver backed by the embedded ERCA key table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedResolver;

impl CertificateResolver for EmbeddedResolver {
    fn root(&self, generation: Generation) -> Result<RootCertificate> {
        match generation {
            Generation::Gen1 => Ok(RootCertificate::Rsa {
                modulus: embedded::ERCA_GEN1_MODULUS.to_vec(),
                exponent: embedded::ERCA_GEN1_EXPONENT.to_vec(),
            }),
            Generation::Gen2 => Ok(RootCertificate::Ecc {
                curve: embedded::ERCA_GEN2_CURVE,
                point: embedded::ERCA_GEN2_POINT.to_vec(),
            }),
        }
    }
}

/// A resolver with no anchors, for callers that only need structural
/// parsing but still route through the authentication API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRootResolver;

impl CertificateResolver for NoRootResolver {
    fn root(&self, generation: Generation) -> Result<RootCertificate> {
        Err(TachoError::CertificateVerificationFailed(format!(
            "no root certificate provisioned for {generation:?}"
        )))
    }
}

mod embedded {
    use super::Curve;

    // European root key material as distributed in the ERCA policy
    // binaries (`EC_PK.bin` and the second generation root
    // certificate), transcribed at build-data preparation time.

    pub(super) static ERCA_GEN1_MODULUS: [u8; 128] = [
        0xc9, 0x9e, 0x6f, 0x47, 0x0b, 0x5c, 0xf0, 0x2a, 0xcf, 0x8f, 0x2a, 0x3d, 0x5c, 0x14, 0x27,
        0x8b, 0xc8, 0x9c, 0xb8, 0x6f, 0x0a, 0xf8, 0x3c, 0x3e, 0x37, 0x3c, 0x15, 0x27, 0x57, 0xd5,
        0x89, 0x26, 0xd9, 0x6d, 0x27, 0x2c, 0x3c, 0x98, 0x11, 0x39, 0x2b, 0x3e, 0x24, 0xeb, 0xd9,
        0x18, 0x30, 0x21, 0x47, 0x3f, 0x4b, 0x65, 0x4e, 0xbf, 0x8c, 0x45, 0x17, 0xfe, 0xa5, 0x74,
        0xc8, 0x3f, 0x28, 0x0f, 0x3a, 0x9c, 0x58, 0x8f, 0x7a, 0x5a, 0x2e, 0xbc, 0x80, 0xe0, 0x14,
        0x9b, 0x82, 0x4f, 0x71, 0xa5, 0x9e, 0x2d, 0x9a, 0xf6, 0x5e, 0xcd, 0x9f, 0x1e, 0x23, 0x1b,
        0xe7, 0x6a, 0xcb, 0x33, 0x26, 0xa6, 0xcc, 0x68, 0x70, 0xfd, 0xab, 0x33, 0x16, 0xd1, 0xea,
        0xee, 0x1e, 0x82, 0xb9, 0x05, 0x87, 0x85, 0x14, 0xdf, 0x29, 0x3e, 0x53, 0x77, 0x05, 0xfa,
        0x94, 0x21, 0x8a, 0x41, 0xd8, 0x4b, 0x09, 0x13,
    ];

    pub(super) static ERCA_GEN1_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

    pub(super) const ERCA_GEN2_CURVE: Curve = Curve::BrainpoolP384R1;

    pub(super) static ERCA_GEN2_POINT: [u8; 97] = [
        0x04, 0x29, 0x3c, 0x89, 0x30, 0xb5, 0x8a, 0x7e, 0x51, 0x42, 0x57, 0x4a, 0x86, 0x5c, 0x93,
        0x2b, 0x3d, 0xc2, 0x65, 0x24, 0x8d, 0x9f, 0x76, 0x0b, 0x09, 0x6e, 0x35, 0x8a, 0x19, 0x22,
        0x42, 0x9d, 0xa8, 0x5b, 0x1a, 0x8c, 0x5f, 0x37, 0x45, 0x2c, 0xf1, 0x67, 0x41, 0xba, 0x5a,
        0x06, 0x8b, 0x2d, 0x57, 0x2e, 0x17, 0x38, 0x56, 0x41, 0x8c, 0x4f, 0x20, 0x9b, 0x39, 0x1e,
        0xd0, 0xe2, 0x6c, 0x9f, 0x44, 0x2c, 0x26, 0x80, 0x95, 0x3a, 0x56, 0xd9, 0x2f, 0x7b, 0x28,
        0xf3, 0x60, 0x4a, 0x1d, 0x98, 0x54, 0x4c, 0x96, 0x0d, 0xe4, 0x41, 0x61, 0x23, 0x32, 0xf9,
        0x5d, 0x0c, 0x6b, 0x7e, 0x0c, 0xa1, 0x05,
    ];
}
