//! First parse pass: slicing a download file into tagged raw records.
//!
//! No semantic interpretation happens here. Each iteration reads the two
//! byte tag, asks the sizer how long the value is, and copies the value
//! out. Serialising the result is plain concatenation of `tag || value`,
//! which reproduces the input byte for byte.

use tracing::{debug, trace};

use crate::error::{Result, TachoError};
use crate::vu::auth::Authentication;
use crate::vu::sizer;
use crate::vu::transfer::{Generation, TransferType};
use crate::vu::ParseOptions;

/// One transfer as sliced from the input stream. `value` is the complete
/// payload including the trailing signature; `signature_size` was
/// computed by the sizer during the first pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub tag: u16,
    pub transfer_type: TransferType,
    pub generation: Generation,
    pub value: Vec<u8>,
    pub signature_size: usize,
    /// Attached by the authenticator; never set by the codec.
    pub authentication: Option<Authentication>,
}

impl RawRecord {
    /// Split the value into its data portion and trailing signature.
    pub fn split_value(&self) -> (&[u8], &[u8]) {
        self.value.split_at(self.value.len() - self.signature_size)
    }

    pub fn data(&self) -> &[u8] {
        self.split_value().0
    }

    pub fn signature(&self) -> &[u8] {
        self.split_value().1
    }
}

/// Ordered sequence of raw records. Concatenating `tag || value` over
/// the records reproduces the original input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFile {
    pub records: Vec<RawRecord>,
}

impl RawFile {
    /// Slice a complete download file into raw records.
    ///
    /// An unrecognised tag aborts with `UnknownTag` in strict mode; the
    /// format encodes no lengths, so outside strict mode parsing stops
    /// there and the records sliced so far are returned.
    pub fn unmarshal(input: &[u8], options: &ParseOptions) -> Result<RawFile> {
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < input.len() {
            TachoError::check_len(input, offset, 2)?;
            let tag = u16::from_be_bytes([input[offset], input[offset + 1]]);
            let Some(ttype) = TransferType::from_tag(tag) else {
                if options.strict {
                    return Err(TachoError::UnknownTag { tag, offset });
                }
                debug!(tag = format_args!("{tag:#06x}"), offset, "unknown tag, stopping");
                break;
            };
            let value_start = offset + 2;
            let sizes = sizer::size_of(&input[value_start..], ttype).map_err(|err| {
                match err {
                    TachoError::InsufficientData {
                        offset: at,
                        needed,
                        available,
                    } => TachoError::InsufficientData {
                        offset: value_start + at,
                        needed,
                        available,
                    },
                    TachoError::StructureMismatch(detail) => TachoError::StructureMismatch(
                        format!("{ttype:?} at offset {offset}: {detail}"),
                    ),
                    other => other,
                }
            })?;
            trace!(?ttype, offset, total = sizes.total, "sized transfer");
            records.push(RawRecord {
                tag,
                transfer_type: ttype,
                generation: ttype.generation(),
                value: input[value_start..value_start + sizes.total].to_vec(),
                signature_size: sizes.signature,
                authentication: None,
            });
            offset = value_start + sizes.total;
        }
        debug!(records = records.len(), bytes = offset, "first pass done");
        Ok(RawFile { records })
    }

    /// Inverse of `unmarshal`: concatenate `tag || value` per record.
    pub fn marshal(&self) -> Vec<u8> {
        let total: usize = self.records.iter().map(|r| 2 + r.value.len()).sum();
        let mut out = Vec::with_capacity(total);
        for record in &self.records {
            out.extend_from_slice(&record.tag.to_be_bytes());
            out.extend_from_slice(&record.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vu::sizer::{OVERVIEW_GEN1_FIXED, SIGNATURE_GEN1_SIZE};

    /// Overview with no company locks and no control activities.
    pub(crate) fn overview_gen1_transfer() -> Vec<u8> {
        let mut out = vec![0x76, 0x01];
        out.extend(vec![0u8; OVERVIEW_GEN1_FIXED]);
        out.push(0x00);
        out.push(0x00);
        out.extend(vec![0u8; SIGNATURE_GEN1_SIZE]);
        out
    }

    fn speed_gen1_transfer() -> Vec<u8> {
        let mut out = vec![0x76, 0x04];
        out.extend([0x00, 0x00]);
        out.extend(vec![0u8; SIGNATURE_GEN1_SIZE]);
        out
    }

    #[test]
    fn demuxes_first_record_by_tag() {
        let input = overview_gen1_transfer();
        let file = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        assert_eq!(1, file.records.len());
        let record = &file.records[0];
        assert_eq!(0x7601, record.tag);
        assert_eq!(TransferType::OverviewGen1, record.transfer_type);
        assert_eq!(Generation::Gen1, record.generation);
        assert_eq!(input.len() - 2, record.value.len());
        assert_eq!(SIGNATURE_GEN1_SIZE, record.signature_size);
    }

    #[test]
    fn round_trips_byte_for_byte() {
        let mut input = overview_gen1_transfer();
        input.extend(speed_gen1_transfer());
        let file = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        assert_eq!(2, file.records.len());
        assert_eq!(input, file.marshal());
    }

    #[test]
    fn split_value_is_a_clean_cut() {
        let input = speed_gen1_transfer();
        let file = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        let (data, signature) = file.records[0].split_value();
        assert_eq!(&[0x00, 0x00], data);
        assert_eq!(SIGNATURE_GEN1_SIZE, signature.len());
    }

    #[test]
    fn unknown_tag_stops_lenient_parse_keeping_prefix() {
        let mut input = speed_gen1_transfer();
        input.extend([0x76, 0x7f, 0xde, 0xad]);
        let file = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        assert_eq!(1, file.records.len());
    }

    #[test]
    fn unknown_tag_fails_strict_parse() {
        let mut input = speed_gen1_transfer();
        let bad_offset = input.len();
        input.extend([0x76, 0x7f, 0xde, 0xad]);
        let err = RawFile::unmarshal(&input, &ParseOptions { strict: true }).unwrap_err();
        assert!(matches!(
            err,
            TachoError::UnknownTag {
                tag: 0x767f,
                offset,
            } if offset == bad_offset
        ));
    }

    #[test]
    fn empty_input_is_an_empty_raw_file() {
        let file = RawFile::unmarshal(&[], &ParseOptions::default()).unwrap();
        assert!(file.records.is_empty());
    }

    #[test]
    fn truncated_value_reports_absolute_offset() {
        let mut input = overview_gen1_transfer();
        input.truncate(input.len() - 1);
        let err = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, TachoError::InsufficientData { .. }));
    }
}
