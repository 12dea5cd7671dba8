//! Codec for digital tachograph vehicle unit (VU) download files as laid
//! down by Regulation (EU) 165/2014 and its Annex 1C implementing acts.
//!
//! A VU file is a flat concatenation of signed, self-delimiting transfers
//! in tag-value form: a two byte `0x76TT` tag followed by a payload whose
//! length is derived from the payload structure itself. This crate slices
//! such files into raw records, sizes every transfer by generation and
//! version, decodes the payloads, verifies the EUR -> MSCA -> VU
//! certificate chains and data signatures, and can anonymise a parsed
//! file while keeping every byte offset intact.
//!
//! The driver-card download format is a sibling codec and is not part of
//! this crate.

pub mod error;
pub mod hexdump;
pub mod vu;

pub use error::{Result, TachoError};
pub use vu::anonymize::{anonymize, AnonymizeOptions};
pub use vu::auth::{authenticate, Authentication};
pub use vu::auth::resolver::CertificateResolver;
pub use vu::file::VehicleUnitFile;
pub use vu::raw::{RawFile, RawRecord};
pub use vu::ParseOptions;
