//! The vehicle unit download-file format.
//!
//! Data flows through two passes. The first pass (`raw`) slices the
//! input into tagged records, using `sizer` to derive each value length
//! from the payload structure. The second pass (`file`) dispatches the
//! raw records through the per-transfer codecs in `messages` and groups
//! them by generation and version. `auth` annotates raw records with
//! certificate-chain and signature outcomes, and `anonymize` rewrites a
//! parsed file without moving a single byte offset.

pub mod anonymize;
pub mod auth;
pub mod file;
pub mod messages;
pub mod raw;
pub mod record_array;
pub mod sizer;
pub mod transfer;
pub mod types;

/// Options for the first-pass parse.
///
/// In strict mode an unrecognised tag is an error. Outside strict mode
/// parsing halts at the unknown tag and the records sliced so far are
/// kept; with no length encoded anywhere there is no way to skip an
/// unknown transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub strict: bool,
}
