//! Transfer sizing, the engine of the first parse pass.
//!
//! Nothing in the tag-value format encodes a length, so the size of a
//! transfer value has to be derived from its structure: generation 1
//! layouts interleave count fields with runs of fixed-size records,
//! generation 2 layouts are a fixed sequence of record arrays. The
//! functions here walk those structures without materialising anything,
//! bounds-checking every advance.

use crate::error::{Result, TachoError};
use crate::vu::record_array::{self, RecordArrayType};
use crate::vu::transfer::TransferType;

/// Trailing RSA signature on every generation 1 transfer value.
pub const SIGNATURE_GEN1_SIZE: usize = 128;
/// Generation 1 certificates are a fixed 194 bytes.
pub const CERTIFICATE_GEN1_SIZE: usize = 194;

// Fixed record sizes from the regulation's field tables.
pub const DOWNLOAD_ACTIVITY_GEN1_SIZE: usize = 58;
pub const DOWNLOAD_ACTIVITY_GEN2_SIZE: usize = 59;
pub const COMPANY_LOCKS_GEN1_SIZE: usize = 98;
pub const COMPANY_LOCKS_GEN2_SIZE: usize = 99;
pub const CONTROL_ACTIVITY_GEN1_SIZE: usize = 31;
pub const CONTROL_ACTIVITY_GEN2_SIZE: usize = 32;
pub const CARD_IW_GEN1_SIZE: usize = 129;
pub const CARD_IW_GEN2_SIZE: usize = 131;
pub const ACTIVITY_CHANGE_SIZE: usize = 2;
pub const PLACE_GEN1_SIZE: usize = 28;
pub const PLACE_GEN2_SIZE: usize = 41;
pub const SPECIFIC_CONDITION_SIZE: usize = 5;
pub const GNSS_AD_V1_SIZE: usize = 58;
pub const GNSS_AD_V2_SIZE: usize = 59;
pub const BORDER_CROSSING_SIZE: usize = 57;
pub const LOAD_UNLOAD_SIZE: usize = 60;
pub const SPEED_BLOCK_SIZE: usize = 64;
pub const FAULT_GEN1_SIZE: usize = 82;
pub const EVENT_GEN1_SIZE: usize = 83;
pub const OVERSPEED_CONTROL_SIZE: usize = 9;
pub const OVERSPEED_EVENT_GEN1_SIZE: usize = 31;
pub const TIME_ADJUSTMENT_GEN1_SIZE: usize = 98;
pub const VU_IDENTIFICATION_GEN1_SIZE: usize = 116;
pub const SENSOR_PAIRED_GEN1_SIZE: usize = 20;
pub const CALIBRATION_GEN1_SIZE: usize = 167;

/// Fixed head of the generation 1 overview: both certificates, VIN,
/// registration, current date/time, downloadable period, card slots
/// status and the download activity block.
pub const OVERVIEW_GEN1_FIXED: usize =
    2 * CERTIFICATE_GEN1_SIZE + 17 + 15 + 4 + 8 + 1 + DOWNLOAD_ACTIVITY_GEN1_SIZE;

/// Result of sizing one transfer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizes {
    /// Complete value length, trailing signature included.
    pub total: usize,
    /// Length of the trailing signature: 128 for generation 1, the full
    /// signature record array (header and body) for generation 2.
    pub signature: usize,
}

/// Record array sequences the regulation fixes per generation 2
/// transfer. The signature array is always last.
pub fn record_array_sequence(ttype: TransferType) -> Option<&'static [RecordArrayType]> {
    use RecordArrayType::*;
    Some(match ttype {
        TransferType::OverviewGen2V1 | TransferType::OverviewGen2V2 => &[
            MemberStateCertificate,
            VuCertificate,
            VehicleIdentificationNumber,
            VehicleRegistrationIdentification,
            CurrentDateTime,
            VuDownloadablePeriod,
            CardSlotsStatus,
            VuDownloadActivityData,
            VuCompanyLocksRecord,
            VuControlActivityRecord,
            Signature,
        ],
        TransferType::ActivitiesGen2V1 => &[
            DateOfDayDownloaded,
            OdometerValueMidnight,
            VuCardIwRecord,
            ActivityChangeInfo,
            VuPlaceDailyWorkPeriodRecord,
            VuGnssAdRecord,
            SpecificConditionRecord,
            Signature,
        ],
        TransferType::ActivitiesGen2V2 => &[
            DateOfDayDownloaded,
            OdometerValueMidnight,
            VuCardIwRecord,
            ActivityChangeInfo,
            VuPlaceDailyWorkPeriodRecord,
            VuGnssAdRecord,
            SpecificConditionRecord,
            VuBorderCrossingRecord,
            VuLoadUnloadRecord,
            Signature,
        ],
        TransferType::EventsAndFaultsGen2V1 => &[
            VuFaultRecord,
            VuEventRecord,
            VuOverSpeedingControlData,
            VuOverSpeedingEventRecord,
            VuTimeAdjustmentGnssRecord,
            VuTimeAdjustmentRecord,
            Signature,
        ],
        TransferType::EventsAndFaultsGen2V2 => &[
            VuFaultRecord,
            VuEventRecord,
            VuOverSpeedingControlData,
            VuOverSpeedingEventRecord,
            VuTimeAdjustmentRecord,
            Signature,
        ],
        TransferType::DetailedSpeedGen2 => &[VuDetailedSpeedBlock, Signature],
        TransferType::TechnicalDataGen2V1 | TransferType::TechnicalDataGen2V2 => &[
            VuIdentification,
            SensorPairedRecord,
            SensorExternalGnssCoupledRecord,
            VuCalibrationRecord,
            VuCardRecord,
            VuItsConsentRecord,
            VuPowerSupplyInterruptionRecord,
            Signature,
        ],
        _ => return None,
    })
}

/// Compute `(total, signature)` for the transfer value starting at
/// `data[0]`, without materialising records. `data` may extend past the
/// transfer; only the structure decides where the value ends.
pub fn size_of(data: &[u8], ttype: TransferType) -> Result<Sizes> {
    match ttype {
        TransferType::DownloadInterfaceVersion => {
            TachoError::check_len(data, 0, 2)?;
            Ok(Sizes {
                total: 2,
                signature: 0,
            })
        }
        TransferType::OverviewGen1 => {
            let mut walk = Walk::new(data);
            walk.skip(OVERVIEW_GEN1_FIXED)?;
            walk.records_u8(COMPANY_LOCKS_GEN1_SIZE)?;
            walk.records_u8(CONTROL_ACTIVITY_GEN1_SIZE)?;
            walk.finish_gen1()
        }
        TransferType::ActivitiesGen1 => {
            let mut walk = Walk::new(data);
            // date of day downloaded + odometer at midnight
            walk.skip(4 + 3)?;
            walk.records_u16(CARD_IW_GEN1_SIZE)?;
            walk.records_u16(ACTIVITY_CHANGE_SIZE)?;
            walk.records_u8(PLACE_GEN1_SIZE)?;
            walk.records_u16(SPECIFIC_CONDITION_SIZE)?;
            walk.finish_gen1()
        }
        TransferType::EventsAndFaultsGen1 => {
            let mut walk = Walk::new(data);
            walk.records_u8(FAULT_GEN1_SIZE)?;
            walk.records_u8(EVENT_GEN1_SIZE)?;
            walk.skip(OVERSPEED_CONTROL_SIZE)?;
            walk.records_u8(OVERSPEED_EVENT_GEN1_SIZE)?;
            walk.records_u8(TIME_ADJUSTMENT_GEN1_SIZE)?;
            walk.finish_gen1()
        }
        TransferType::DetailedSpeedGen1 => {
            let mut walk = Walk::new(data);
            walk.records_u16(SPEED_BLOCK_SIZE)?;
            walk.finish_gen1()
        }
        TransferType::TechnicalDataGen1 => {
            let mut walk = Walk::new(data);
            walk.skip(VU_IDENTIFICATION_GEN1_SIZE + SENSOR_PAIRED_GEN1_SIZE)?;
            walk.records_u8(CALIBRATION_GEN1_SIZE)?;
            walk.finish_gen1()
        }
        TransferType::CardDownload => Err(TachoError::UnsupportedTransferType(ttype)),
        _ => {
            let sequence = record_array_sequence(ttype)
                .ok_or(TachoError::UnsupportedTransferType(ttype))?;
            size_of_record_arrays(data, sequence)
        }
    }
}

fn size_of_record_arrays(data: &[u8], sequence: &[RecordArrayType]) -> Result<Sizes> {
    let mut offset = 0;
    let mut signature = 0;
    for expected in sequence {
        let header = record_array::header_at(data, offset)?;
        header.expect_type(*expected)?;
        let size = record_array::size_of_record_array(data, offset)?;
        if *expected == RecordArrayType::Signature {
            signature = size;
        }
        offset += size;
    }
    Ok(Sizes {
        total: offset,
        signature,
    })
}

/// Allocation-free cursor over a generation 1 layout.
struct Walk<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Walk<'a> {
    fn new(data: &'a [u8]) -> Walk<'a> {
        Walk { data, offset: 0 }
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        TachoError::check_len(self.data, self.offset, count)?;
        self.offset += count;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<usize> {
        TachoError::check_len(self.data, self.offset, 1)?;
        let value = usize::from(self.data[self.offset]);
        self.offset += 1;
        Ok(value)
    }

    fn read_u16(&mut self) -> Result<usize> {
        TachoError::check_len(self.data, self.offset, 2)?;
        let value = usize::from(u16::from_be_bytes([
            self.data[self.offset],
            self.data[self.offset + 1],
        ]));
        self.offset += 2;
        Ok(value)
    }

    /// One byte count field followed by that many fixed-size records.
    fn records_u8(&mut self, record_size: usize) -> Result<()> {
        let count = self.read_u8()?;
        self.skip(count * record_size)
    }

    /// Two byte count field followed by that many fixed-size records.
    fn records_u16(&mut self, record_size: usize) -> Result<()> {
        let count = self.read_u16()?;
        self.skip(count * record_size)
    }

    fn finish_gen1(mut self) -> Result<Sizes> {
        self.skip(SIGNATURE_GEN1_SIZE)?;
        Ok(Sizes {
            total: self.offset,
            signature: SIGNATURE_GEN1_SIZE,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vu::record_array::emit_header;

    /// Activities layout with one insertion/withdrawal record, two
    /// activity changes, three places and four specific conditions.
    fn activities_gen1_value() -> Vec<u8> {
        let mut value = vec![0u8; 7];
        value.extend([0x00, 0x01]);
        value.extend(vec![0u8; CARD_IW_GEN1_SIZE]);
        value.extend([0x00, 0x02]);
        value.extend(vec![0u8; 2 * ACTIVITY_CHANGE_SIZE]);
        value.push(0x03);
        value.extend(vec![0u8; 3 * PLACE_GEN1_SIZE]);
        value.extend([0x00, 0x04]);
        value.extend(vec![0u8; 4 * SPECIFIC_CONDITION_SIZE]);
        value.extend(vec![0u8; SIGNATURE_GEN1_SIZE]);
        value
    }

    #[test]
    fn sizes_activities_gen1() {
        let value = activities_gen1_value();
        assert_eq!(379, value.len());
        let sizes = size_of(&value, TransferType::ActivitiesGen1).unwrap();
        assert_eq!(
            Sizes {
                total: 379,
                signature: 128,
            },
            sizes
        );
    }

    #[test]
    fn sizing_ignores_trailing_bytes() {
        let mut value = activities_gen1_value();
        let expected = value.len();
        value.extend([0x76, 0x03]);
        let sizes = size_of(&value, TransferType::ActivitiesGen1).unwrap();
        assert_eq!(expected, sizes.total);
    }

    #[test]
    fn truncation_is_insufficient_data_not_a_short_size() {
        let value = activities_gen1_value();
        for cut in [0, 1, 8, 200, value.len() - 1] {
            let err = size_of(&value[..cut], TransferType::ActivitiesGen1).unwrap_err();
            assert!(
                matches!(err, TachoError::InsufficientData { .. }),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn sizes_download_interface_version() {
        let sizes = size_of(&[0x01, 0x01], TransferType::DownloadInterfaceVersion).unwrap();
        assert_eq!(
            Sizes {
                total: 2,
                signature: 0,
            },
            sizes
        );
    }

    #[test]
    fn card_download_is_unsupported() {
        let err = size_of(&[0x00; 16], TransferType::CardDownload).unwrap_err();
        assert!(matches!(
            err,
            TachoError::UnsupportedTransferType(TransferType::CardDownload)
        ));
    }

    fn empty_array(record_type: RecordArrayType, record_size: u16) -> Vec<u8> {
        let mut out = Vec::new();
        emit_header(&mut out, record_type.code(), record_size, 0);
        out
    }

    #[test]
    fn sizes_gen2_activities_with_signature_array() {
        use RecordArrayType::*;
        let mut value = Vec::new();
        for (ty, size) in [
            (DateOfDayDownloaded, 4),
            (OdometerValueMidnight, 3),
            (VuCardIwRecord, CARD_IW_GEN2_SIZE as u16),
            (ActivityChangeInfo, 2),
            (VuPlaceDailyWorkPeriodRecord, PLACE_GEN2_SIZE as u16),
            (VuGnssAdRecord, GNSS_AD_V1_SIZE as u16),
            (SpecificConditionRecord, 5),
        ] {
            value.extend(empty_array(ty, size));
        }
        emit_header(&mut value, Signature.code(), 64, 1);
        value.extend([0xab; 64]);

        let sizes = size_of(&value, TransferType::ActivitiesGen2V1).unwrap();
        assert_eq!(
            Sizes {
                total: 7 * 5 + 5 + 64,
                signature: 5 + 64,
            },
            sizes
        );
    }

    #[test]
    fn gen2_array_out_of_sequence_is_a_structure_mismatch() {
        use RecordArrayType::*;
        let mut value = empty_array(OdometerValueMidnight, 3);
        value.extend(empty_array(DateOfDayDownloaded, 4));
        let err = size_of(&value, TransferType::ActivitiesGen2V1).unwrap_err();
        assert!(matches!(err, TachoError::StructureMismatch(_)));
    }

    #[test]
    fn zero_count_records_parse_everywhere() {
        // All counts zero: 7 byte head, four count fields, signature.
        let mut value = vec![0u8; 7];
        value.extend([0x00, 0x00]); // card IW
        value.extend([0x00, 0x00]); // activity changes
        value.push(0x00); // places
        value.extend([0x00, 0x00]); // specific conditions
        value.extend(vec![0u8; SIGNATURE_GEN1_SIZE]);
        let sizes = size_of(&value, TransferType::ActivitiesGen1).unwrap();
        assert_eq!(value.len(), sizes.total);
    }
}
