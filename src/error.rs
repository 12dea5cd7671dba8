use thiserror::Error;

use crate::vu::transfer::TransferType;

pub type Result<T, E = TachoError> = std::result::Result<T, E>;

/// Error taxonomy of the codec. The binary codec fails hard: the first
/// error aborts the call. The authenticator fails soft and reports one
/// joined `Authentication` error covering every failing record.
#[derive(Error, Debug)]
pub enum TachoError {
    /// A length-bounded read would have run past the end of the buffer.
    #[error("insufficient data at offset {offset}: {needed} bytes needed, {available} available")]
    InsufficientData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The first-pass parse met a tag outside the 0x76XX transfer set.
    #[error("unknown transfer tag {tag:#06x} at offset {offset}")]
    UnknownTag { tag: u16, offset: usize },

    /// A structural invariant was violated: a record array advertised the
    /// wrong record size, or a value was not consumed exactly.
    #[error("structure mismatch: {0}")]
    StructureMismatch(String),

    /// The sizer was dispatched on a transfer type it does not carry a
    /// layout for (CardDownload).
    #[error("unsupported transfer type {0:?}")]
    UnsupportedTransferType(TransferType),

    /// The EUR -> MSCA -> VU chain could not be established.
    #[error("certificate verification failed: {0}")]
    CertificateVerificationFailed(String),

    /// The chain is fine but the signature over the record data is not.
    #[error("data signature invalid: {0}")]
    DataSignatureInvalid(String),

    /// Caller-level precondition failure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A character other than a hex digit, whitespace or `|` appeared in
    /// the hex column of a hexdump.
    #[error("hexdump line {line}: {detail}")]
    HexdumpSyntax { line: usize, detail: String },

    /// Joined soft-fail report from the authenticator, one entry per
    /// record that did not verify.
    #[error("{} record(s) failed authentication: {}", .0.len(), .0.join("; "))]
    Authentication(Vec<String>),

    /// The input contained no transfers at all.
    #[error("empty file: no transfers present")]
    EmptyFile,
}

impl TachoError {
    /// Bounds check used throughout the sizer and the codecs.
    pub(crate) fn check_len(buffer: &[u8], offset: usize, needed: usize) -> Result<()> {
        if offset.checked_add(needed).map_or(true, |end| end > buffer.len()) {
            return Err(TachoError::InsufficientData {
                offset,
                needed,
                available: buffer.len().saturating_sub(offset),
            });
        }
        Ok(())
    }
}
