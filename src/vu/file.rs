//! Second parse pass: grouping raw records into a typed file, and the
//! inverse that rebuilds the raw record stream.
//!
//! The generation of a file follows from its transfer types, since each
//! TREP code is permanently generation 1 or generation 2. The minor
//! version of a generation 2 file follows from the presence of any
//! version 2 only transfer. Each transfer's own layout is fixed by its
//! TREP code alone, so a version 1 overview inside a version 2 file
//! still decodes with the version 1 layout.

use tracing::debug;

use crate::error::{Result, TachoError};
use crate::vu::messages::activities::{ActivitiesGen1, ActivitiesGen2};
use crate::vu::messages::download_interface::DownloadInterfaceVersion;
use crate::vu::messages::events::{EventsAndFaultsGen1, EventsAndFaultsGen2};
use crate::vu::messages::overview::{OverviewGen1, OverviewGen2};
use crate::vu::messages::speed::{DetailedSpeedGen1, DetailedSpeedGen2};
use crate::vu::messages::technical::{TechnicalDataGen1, TechnicalDataGen2};
use crate::vu::raw::{RawFile, RawRecord};
use crate::vu::sizer::SIGNATURE_GEN1_SIZE;
use crate::vu::transfer::{Generation, TransferType, Version};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VuFileGen1 {
    pub overview: Option<OverviewGen1>,
    pub activities: Vec<ActivitiesGen1>,
    pub events_and_faults: Vec<EventsAndFaultsGen1>,
    pub detailed_speed: Vec<DetailedSpeedGen1>,
    pub technical_data: Vec<TechnicalDataGen1>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VuFileGen2 {
    pub download_interface_version: Option<DownloadInterfaceVersion>,
    pub overview: Option<OverviewGen2>,
    pub activities: Vec<ActivitiesGen2>,
    pub events_and_faults: Vec<EventsAndFaultsGen2>,
    pub detailed_speed: Vec<DetailedSpeedGen2>,
    pub technical_data: Vec<TechnicalDataGen2>,
}

/// A parsed download file, organised by generation and minor version.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleUnitFile {
    Gen1(VuFileGen1),
    Gen2V1(VuFileGen2),
    Gen2V2(VuFileGen2),
}

impl VehicleUnitFile {
    pub fn generation(&self) -> Generation {
        match self {
            VehicleUnitFile::Gen1(_) => Generation::Gen1,
            VehicleUnitFile::Gen2V1(_) | VehicleUnitFile::Gen2V2(_) => Generation::Gen2,
        }
    }

    /// Minor version; generation 1 predates versioning and reports V1.
    pub fn version(&self) -> Version {
        match self {
            VehicleUnitFile::Gen1(_) | VehicleUnitFile::Gen2V1(_) => Version::V1,
            VehicleUnitFile::Gen2V2(_) => Version::V2,
        }
    }

    /// Group a raw record stream into the typed file.
    pub fn parse(raw: &RawFile) -> Result<VehicleUnitFile> {
        if raw.records.is_empty() {
            return Err(TachoError::EmptyFile);
        }
        let has_gen1 = raw
            .records
            .iter()
            .any(|r| r.generation == Generation::Gen1);
        let has_gen2 = raw
            .records
            .iter()
            .any(|r| r.generation == Generation::Gen2);
        if has_gen1 && has_gen2 {
            return Err(TachoError::InvalidInput(
                "file mixes generation 1 and generation 2 transfers".into(),
            ));
        }
        if has_gen1 {
            Self::parse_gen1(raw).map(VehicleUnitFile::Gen1)
        } else {
            let version = if raw
                .records
                .iter()
                .any(|r| r.transfer_type.is_gen2_v2_only())
            {
                Version::V2
            } else {
                Version::V1
            };
            debug!(?version, "inferred generation 2 file version");
            let file = Self::parse_gen2(raw)?;
            Ok(match version {
                Version::V1 => VehicleUnitFile::Gen2V1(file),
                Version::V2 => VehicleUnitFile::Gen2V2(file),
            })
        }
    }

    fn parse_gen1(raw: &RawFile) -> Result<VuFileGen1> {
        let mut file = VuFileGen1::default();
        for record in &raw.records {
            match record.transfer_type {
                TransferType::OverviewGen1 => {
                    if file.overview.is_some() {
                        return Err(TachoError::StructureMismatch(
                            "more than one generation 1 overview in the file".into(),
                        ));
                    }
                    let mut message = OverviewGen1::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.overview = Some(message);
                }
                TransferType::ActivitiesGen1 => {
                    let mut message = ActivitiesGen1::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.activities.push(message);
                }
                TransferType::EventsAndFaultsGen1 => {
                    let mut message = EventsAndFaultsGen1::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.events_and_faults.push(message);
                }
                TransferType::DetailedSpeedGen1 => {
                    let mut message = DetailedSpeedGen1::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.detailed_speed.push(message);
                }
                TransferType::TechnicalDataGen1 => {
                    let mut message = TechnicalDataGen1::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.technical_data.push(message);
                }
                other => {
                    return Err(TachoError::InvalidInput(format!(
                        "{other:?} in a generation 1 file"
                    )))
                }
            }
        }
        Ok(file)
    }

    fn parse_gen2(raw: &RawFile) -> Result<VuFileGen2> {
        let mut file = VuFileGen2::default();
        for record in &raw.records {
            // The layout version of a transfer follows its TREP code,
            // independent of the file version.
            match record.transfer_type {
                TransferType::DownloadInterfaceVersion => {
                    if file.download_interface_version.is_some() {
                        return Err(TachoError::StructureMismatch(
                            "more than one download interface version in the file".into(),
                        ));
                    }
                    let mut message = DownloadInterfaceVersion::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.download_interface_version = Some(message);
                }
                TransferType::OverviewGen2V1 | TransferType::OverviewGen2V2 => {
                    if file.overview.is_some() {
                        return Err(TachoError::StructureMismatch(
                            "more than one generation 2 overview in the file".into(),
                        ));
                    }
                    let version = trep_version(record.transfer_type);
                    let mut message = OverviewGen2::unmarshal_value(&record.value, version)?;
                    message.authentication = record.authentication.clone();
                    file.overview = Some(message);
                }
                TransferType::ActivitiesGen2V1 | TransferType::ActivitiesGen2V2 => {
                    let version = trep_version(record.transfer_type);
                    let mut message = ActivitiesGen2::unmarshal_value(&record.value, version)?;
                    message.authentication = record.authentication.clone();
                    file.activities.push(message);
                }
                TransferType::EventsAndFaultsGen2V1 | TransferType::EventsAndFaultsGen2V2 => {
                    let version = trep_version(record.transfer_type);
                    let mut message =
                        EventsAndFaultsGen2::unmarshal_value(&record.value, version)?;
                    message.authentication = record.authentication.clone();
                    file.events_and_faults.push(message);
                }
                TransferType::DetailedSpeedGen2 => {
                    let mut message = DetailedSpeedGen2::unmarshal_value(&record.value)?;
                    message.authentication = record.authentication.clone();
                    file.detailed_speed.push(message);
                }
                TransferType::TechnicalDataGen2V1 | TransferType::TechnicalDataGen2V2 => {
                    let version = trep_version(record.transfer_type);
                    let mut message = TechnicalDataGen2::unmarshal_value(&record.value, version)?;
                    message.authentication = record.authentication.clone();
                    file.technical_data.push(message);
                }
                other => {
                    return Err(TachoError::InvalidInput(format!(
                        "{other:?} in a generation 2 file"
                    )))
                }
            }
        }
        Ok(file)
    }

    /// Rebuild the raw record stream in the fixed transfer order: the
    /// download interface version when present, the overview, then all
    /// activities, events and faults, detailed speed and technical data.
    pub fn unparse(&self) -> RawFile {
        let mut records = Vec::new();
        match self {
            VehicleUnitFile::Gen1(file) => {
                if let Some(overview) = &file.overview {
                    records.push(gen1_record(TransferType::OverviewGen1, overview.marshal_value()));
                }
                for message in &file.activities {
                    records.push(gen1_record(TransferType::ActivitiesGen1, message.marshal_value()));
                }
                for message in &file.events_and_faults {
                    records.push(gen1_record(
                        TransferType::EventsAndFaultsGen1,
                        message.marshal_value(),
                    ));
                }
                for message in &file.detailed_speed {
                    records.push(gen1_record(
                        TransferType::DetailedSpeedGen1,
                        message.marshal_value(),
                    ));
                }
                for message in &file.technical_data {
                    records.push(gen1_record(
                        TransferType::TechnicalDataGen1,
                        message.marshal_value(),
                    ));
                }
            }
            VehicleUnitFile::Gen2V1(file) | VehicleUnitFile::Gen2V2(file) => {
                if let Some(div) = &file.download_interface_version {
                    records.push(gen2_record(
                        TransferType::DownloadInterfaceVersion,
                        div.marshal_value(),
                        0,
                    ));
                }
                if let Some(overview) = &file.overview {
                    let ttype = match overview.version {
                        Version::V1 => TransferType::OverviewGen2V1,
                        Version::V2 => TransferType::OverviewGen2V2,
                    };
                    records.push(gen2_record(ttype, overview.marshal_value(), overview.signature.len()));
                }
                for message in &file.activities {
                    let ttype = match message.version {
                        Version::V1 => TransferType::ActivitiesGen2V1,
                        Version::V2 => TransferType::ActivitiesGen2V2,
                    };
                    records.push(gen2_record(ttype, message.marshal_value(), message.signature.len()));
                }
                for message in &file.events_and_faults {
                    let ttype = match message.version {
                        Version::V1 => TransferType::EventsAndFaultsGen2V1,
                        Version::V2 => TransferType::EventsAndFaultsGen2V2,
                    };
                    records.push(gen2_record(ttype, message.marshal_value(), message.signature.len()));
                }
                for message in &file.detailed_speed {
                    records.push(gen2_record(
                        TransferType::DetailedSpeedGen2,
                        message.marshal_value(),
                        message.signature.len(),
                    ));
                }
                for message in &file.technical_data {
                    let ttype = match message.version {
                        Version::V1 => TransferType::TechnicalDataGen2V1,
                        Version::V2 => TransferType::TechnicalDataGen2V2,
                    };
                    records.push(gen2_record(ttype, message.marshal_value(), message.signature.len()));
                }
            }
        }
        RawFile { records }
    }
}

fn trep_version(ttype: TransferType) -> Version {
    if ttype.is_gen2_v2_only() {
        Version::V2
    } else {
        Version::V1
    }
}

fn gen1_record(ttype: TransferType, value: Vec<u8>) -> RawRecord {
    RawRecord {
        tag: ttype.tag(),
        transfer_type: ttype,
        generation: Generation::Gen1,
        value,
        signature_size: SIGNATURE_GEN1_SIZE,
        authentication: None,
    }
}

fn gen2_record(ttype: TransferType, value: Vec<u8>, signature_size: usize) -> RawRecord {
    RawRecord {
        tag: ttype.tag(),
        transfer_type: ttype,
        generation: Generation::Gen2,
        value,
        signature_size,
        authentication: None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vu::record_array::{emit_header, RecordArrayType};
    use crate::vu::sizer::{
        CARD_IW_GEN2_SIZE, GNSS_AD_V1_SIZE, OVERVIEW_GEN1_FIXED, PLACE_GEN2_SIZE,
        SPECIFIC_CONDITION_SIZE,
    };
    use crate::vu::ParseOptions;

    fn overview_gen1_transfer() -> Vec<u8> {
        let mut out = vec![0x76, 0x01];
        out.extend(vec![0u8; OVERVIEW_GEN1_FIXED]);
        out.extend([0x00, 0x00]);
        out.extend(vec![0x11; SIGNATURE_GEN1_SIZE]);
        out
    }

    fn activities_gen1_transfer() -> Vec<u8> {
        let mut out = vec![0x76, 0x02];
        out.extend(vec![0u8; 7]);
        out.extend([0x00, 0x00]);
        out.extend([0x00, 0x01, 0x20, 0x3c]);
        out.push(0x00);
        out.extend([0x00, 0x00]);
        out.extend(vec![0x22; SIGNATURE_GEN1_SIZE]);
        out
    }

    fn speed_gen1_transfer() -> Vec<u8> {
        let mut out = vec![0x76, 0x04];
        out.extend([0x00, 0x00]);
        out.extend(vec![0x33; SIGNATURE_GEN1_SIZE]);
        out
    }

    fn gen1_file_bytes() -> Vec<u8> {
        let mut input = overview_gen1_transfer();
        input.extend(activities_gen1_transfer());
        input.extend(activities_gen1_transfer());
        input.extend(speed_gen1_transfer());
        input
    }

    #[test]
    fn groups_gen1_records_and_round_trips() {
        let input = gen1_file_bytes();
        let raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        let file = VehicleUnitFile::parse(&raw).unwrap();
        assert_eq!(Generation::Gen1, file.generation());
        let VehicleUnitFile::Gen1(inner) = &file else {
            panic!("expected a generation 1 file");
        };
        assert!(inner.overview.is_some());
        assert_eq!(2, inner.activities.len());
        assert_eq!(1, inner.activities[0].activity_changes.len());
        assert_eq!(input, file.unparse().marshal());
    }

    #[test]
    fn empty_record_list_is_an_error() {
        let raw = RawFile { records: Vec::new() };
        assert!(matches!(
            VehicleUnitFile::parse(&raw),
            Err(TachoError::EmptyFile)
        ));
    }

    fn empty_gen2_array(ty: RecordArrayType, size: u16) -> Vec<u8> {
        let mut out = Vec::new();
        emit_header(&mut out, ty.code(), size, 0);
        out
    }

    fn activities_gen2_v1_transfer() -> Vec<u8> {
        use RecordArrayType::*;
        let mut out = vec![0x76, 0x12];
        let mut value = Vec::new();
        emit_header(&mut value, DateOfDayDownloaded.code(), 4, 1);
        value.extend(0x64b2_0000u32.to_be_bytes());
        value.extend(empty_gen2_array(OdometerValueMidnight, 3));
        value.extend(empty_gen2_array(VuCardIwRecord, CARD_IW_GEN2_SIZE as u16));
        value.extend(empty_gen2_array(ActivityChangeInfo, 2));
        value.extend(empty_gen2_array(
            VuPlaceDailyWorkPeriodRecord,
            PLACE_GEN2_SIZE as u16,
        ));
        value.extend(empty_gen2_array(VuGnssAdRecord, GNSS_AD_V1_SIZE as u16));
        value.extend(empty_gen2_array(
            SpecificConditionRecord,
            SPECIFIC_CONDITION_SIZE as u16,
        ));
        emit_header(&mut value, Signature.code(), 64, 1);
        value.extend(vec![0xdd; 64]);
        out.extend(value);
        out
    }

    fn download_interface_version_transfer() -> Vec<u8> {
        vec![0x76, 0x00, 0x02, 0x02]
    }

    #[test]
    fn gen2_version_is_inferred_from_v2_only_transfers() {
        let v1_input = activities_gen2_v1_transfer();
        let raw = RawFile::unmarshal(&v1_input, &ParseOptions::default()).unwrap();
        let file = VehicleUnitFile::parse(&raw).unwrap();
        assert_eq!(Version::V1, file.version());

        let mut v2_input = download_interface_version_transfer();
        v2_input.extend(activities_gen2_v1_transfer());
        let raw = RawFile::unmarshal(&v2_input, &ParseOptions::default()).unwrap();
        let file = VehicleUnitFile::parse(&raw).unwrap();
        assert_eq!(Version::V2, file.version());
        // A version 1 activities transfer keeps its own layout and tag.
        assert_eq!(v2_input, file.unparse().marshal());
    }

    #[test]
    fn mixed_generations_are_rejected() {
        let mut input = overview_gen1_transfer();
        input.extend(activities_gen2_v1_transfer());
        let raw = RawFile::unmarshal(&input, &ParseOptions::default()).unwrap();
        assert!(matches!(
            VehicleUnitFile::parse(&raw),
            Err(TachoError::InvalidInput(_))
        ));
    }
}
