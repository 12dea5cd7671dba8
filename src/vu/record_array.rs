//! Record arrays, the building block of every generation 2 transfer.
//!
//! A record array is a 5 byte header `{record_type, record_size,
//! no_of_records}` followed by `record_size * no_of_records` payload
//! bytes. Each generation 2 transfer is a fixed sequence of record
//! arrays whose order is laid down by the regulation, the last one
//! always being the signature.

use nom::{combinator::map, sequence::tuple, IResult};

use crate::error::{Result, TachoError};
use crate::vu::types::{t_u16, t_u8};

pub const RECORD_ARRAY_HEADER_SIZE: usize = 5;

/// Record type codes of the regulation's data dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordArrayType {
    ActivityChangeInfo,
    CardSlotsStatus,
    CurrentDateTime,
    MemberStateCertificate,
    OdometerValueMidnight,
    DateOfDayDownloaded,
    SensorPaired,
    Signature,
    SpecificConditionRecord,
    VehicleIdentificationNumber,
    VehicleRegistrationNumber,
    VuCalibrationRecord,
    VuCardIwRecord,
    VuCardRecord,
    VuCertificate,
    VuCompanyLocksRecord,
    VuControlActivityRecord,
    VuDetailedSpeedBlock,
    VuDownloadablePeriod,
    VuDownloadActivityData,
    VuEventRecord,
    VuGnssAdRecord,
    VuItsConsentRecord,
    VuFaultRecord,
    VuIdentification,
    VuOverSpeedingControlData,
    VuOverSpeedingEventRecord,
    VuPlaceDailyWorkPeriodRecord,
    VuTimeAdjustmentGnssRecord,
    VuTimeAdjustmentRecord,
    VuPowerSupplyInterruptionRecord,
    SensorPairedRecord,
    SensorExternalGnssCoupledRecord,
    VuBorderCrossingRecord,
    VuLoadUnloadRecord,
    LoadType,
    VehicleRegistrationIdentification,
}

impl RecordArrayType {
    pub fn code(self) -> u8 {
        match self {
            RecordArrayType::ActivityChangeInfo => 0x01,
            RecordArrayType::CardSlotsStatus => 0x02,
            RecordArrayType::CurrentDateTime => 0x03,
            RecordArrayType::MemberStateCertificate => 0x04,
            RecordArrayType::OdometerValueMidnight => 0x05,
            RecordArrayType::DateOfDayDownloaded => 0x06,
            RecordArrayType::SensorPaired => 0x07,
            RecordArrayType::Signature => 0x08,
            RecordArrayType::SpecificConditionRecord => 0x09,
            RecordArrayType::VehicleIdentificationNumber => 0x0a,
            RecordArrayType::VehicleRegistrationNumber => 0x0b,
            RecordArrayType::VuCalibrationRecord => 0x0c,
            RecordArrayType::VuCardIwRecord => 0x0d,
            RecordArrayType::VuCardRecord => 0x0e,
            RecordArrayType::VuCertificate => 0x0f,
            RecordArrayType::VuCompanyLocksRecord => 0x10,
            RecordArrayType::VuControlActivityRecord => 0x11,
            RecordArrayType::VuDetailedSpeedBlock => 0x12,
            RecordArrayType::VuDownloadablePeriod => 0x13,
            RecordArrayType::VuDownloadActivityData => 0x14,
            RecordArrayType::VuEventRecord => 0x15,
            RecordArrayType::VuGnssAdRecord => 0x16,
            RecordArrayType::VuItsConsentRecord => 0x17,
            RecordArrayType::VuFaultRecord => 0x18,
            RecordArrayType::VuIdentification => 0x19,
            RecordArrayType::VuOverSpeedingControlData => 0x1a,
            RecordArrayType::VuOverSpeedingEventRecord => 0x1b,
            RecordArrayType::VuPlaceDailyWorkPeriodRecord => 0x1c,
            RecordArrayType::VuTimeAdjustmentGnssRecord => 0x1d,
            RecordArrayType::VuTimeAdjustmentRecord => 0x1e,
            RecordArrayType::VuPowerSupplyInterruptionRecord => 0x1f,
            RecordArrayType::SensorPairedRecord => 0x20,
            RecordArrayType::SensorExternalGnssCoupledRecord => 0x21,
            RecordArrayType::VuBorderCrossingRecord => 0x22,
            RecordArrayType::VuLoadUnloadRecord => 0x23,
            RecordArrayType::LoadType => 0x24,
            RecordArrayType::VehicleRegistrationIdentification => 0x25,
        }
    }
}

/// The 5 byte header in front of every record array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordArrayHeader {
    pub record_type: u8,
    pub record_size: u16,
    pub no_of_records: u16,
}

impl RecordArrayHeader {
    pub fn body_size(&self) -> usize {
        usize::from(self.record_size) * usize::from(self.no_of_records)
    }

    /// Compare the advertised type against the one the regulation fixes
    /// for this position in the transfer.
    pub fn expect_type(&self, expected: RecordArrayType) -> Result<()> {
        if self.record_type != expected.code() {
            return Err(TachoError::StructureMismatch(format!(
                "record array type {:#04x} where {expected:?} ({:#04x}) was required",
                self.record_type,
                expected.code(),
            )));
        }
        Ok(())
    }

    /// Compare the advertised record size against the regulation's fixed
    /// size for this array. The primary mis-version detector.
    pub fn expect_record_size(&self, expected: usize) -> Result<()> {
        if usize::from(self.record_size) != expected {
            return Err(TachoError::StructureMismatch(format!(
                "record array type {:#04x} advertises {} byte records, regulation fixes {expected}",
                self.record_type, self.record_size,
            )));
        }
        Ok(())
    }
}

pub fn t_record_array_header(buffer: &[u8]) -> IResult<&[u8], RecordArrayHeader> {
    map(
        tuple((t_u8, t_u16, t_u16)),
        |(record_type, record_size, no_of_records)| RecordArrayHeader {
            record_type,
            record_size,
            no_of_records,
        },
    )(buffer)
}

/// Total size of the record array starting at `offset`: header plus
/// `record_size * no_of_records`, bounds-checked against the buffer. No
/// record type validation happens here; callers that care compare the
/// header against their expectation.
pub fn size_of_record_array(buffer: &[u8], offset: usize) -> Result<usize> {
    TachoError::check_len(buffer, offset, RECORD_ARRAY_HEADER_SIZE)?;
    let record_size = usize::from(u16::from_be_bytes([buffer[offset + 1], buffer[offset + 2]]));
    let no_of_records = usize::from(u16::from_be_bytes([buffer[offset + 3], buffer[offset + 4]]));
    let body = record_size * no_of_records;
    TachoError::check_len(buffer, offset + RECORD_ARRAY_HEADER_SIZE, body)?;
    Ok(RECORD_ARRAY_HEADER_SIZE + body)
}

/// Read the header at `offset`, bounds-checked.
pub fn header_at(buffer: &[u8], offset: usize) -> Result<RecordArrayHeader> {
    TachoError::check_len(buffer, offset, RECORD_ARRAY_HEADER_SIZE)?;
    Ok(RecordArrayHeader {
        record_type: buffer[offset],
        record_size: u16::from_be_bytes([buffer[offset + 1], buffer[offset + 2]]),
        no_of_records: u16::from_be_bytes([buffer[offset + 3], buffer[offset + 4]]),
    })
}

/// Append the 5 byte header to a growing buffer.
pub fn emit_header(dst: &mut Vec<u8>, record_type: u8, record_size: u16, no_of_records: u16) {
    dst.push(record_type);
    dst.extend_from_slice(&record_size.to_be_bytes());
    dst.extend_from_slice(&no_of_records.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sizes_a_populated_array() {
        // type 0x01, 2 byte records, 3 of them
        let mut buffer = vec![0x01, 0x00, 0x02, 0x00, 0x03];
        buffer.extend([0xaa; 6]);
        assert_eq!(11, size_of_record_array(&buffer, 0).unwrap());
    }

    #[test]
    fn sizes_an_empty_array() {
        let buffer = [0x09, 0x00, 0x05, 0x00, 0x00];
        assert_eq!(5, size_of_record_array(&buffer, 0).unwrap());
    }

    #[test]
    fn large_count_is_only_rejected_when_bytes_are_missing() {
        let mut buffer = vec![0x01, 0x00, 0x01, 0xff, 0xff];
        let err = size_of_record_array(&buffer, 0).unwrap_err();
        assert!(matches!(err, TachoError::InsufficientData { .. }));

        buffer.extend(vec![0x00; 0xffff]);
        assert_eq!(5 + 0xffff, size_of_record_array(&buffer, 0).unwrap());
    }

    #[test]
    fn truncated_header_is_insufficient_data() {
        let err = size_of_record_array(&[0x01, 0x00], 0).unwrap_err();
        assert!(matches!(
            err,
            TachoError::InsufficientData {
                offset: 0,
                needed: 5,
                available: 2,
            }
        ));
    }

    #[test]
    fn emits_the_header_it_parses() {
        let mut dst = Vec::new();
        emit_header(&mut dst, 0x0d, 131, 2);
        let (rest, header) = t_record_array_header(&dst).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            RecordArrayHeader {
                record_type: 0x0d,
                record_size: 131,
                no_of_records: 2,
            },
            header
        );
        assert_eq!(RecordArrayType::VuCardIwRecord.code(), header.record_type);
    }
}
