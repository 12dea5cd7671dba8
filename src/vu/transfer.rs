//! Transfer demultiplexing.
//!
//! Every transfer in a download file is introduced by a two byte tag
//! `0x76TT` where `TT` is the TREP code assigned by the regulation. The
//! TREP fixes the transfer kind, its generation and (for generation 2)
//! whether it belongs to the version 2 dialogue. The set is closed by
//! regulation, so everything here is an exhaustive match.

/// High byte shared by all transfer tags.
pub const TAG_PREFIX: u8 = 0x76;

/// Device generation a transfer belongs to. Each TREP code is
/// permanently assigned to one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    Gen1,
    Gen2,
}

/// Minor version of a generation 2 download file. Decided for the whole
/// file by the transfer set present, never encoded per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2,
}

/// The closed set of recognised transfers.
///
/// `CardDownload` (TREP 0x21) is recognised by the demultiplexer so
/// errors can name it, but carries no codec: the embedded card file
/// belongs to the sibling card codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferType {
    DownloadInterfaceVersion,
    OverviewGen1,
    ActivitiesGen1,
    EventsAndFaultsGen1,
    DetailedSpeedGen1,
    TechnicalDataGen1,
    OverviewGen2V1,
    ActivitiesGen2V1,
    EventsAndFaultsGen2V1,
    DetailedSpeedGen2,
    TechnicalDataGen2V1,
    CardDownload,
    OverviewGen2V2,
    ActivitiesGen2V2,
    EventsAndFaultsGen2V2,
    TechnicalDataGen2V2,
}

impl TransferType {
    /// TREP code carried in the low byte of the tag.
    pub fn trep(self) -> u8 {
        match self {
            TransferType::DownloadInterfaceVersion => 0x00,
            TransferType::OverviewGen1 => 0x01,
            TransferType::ActivitiesGen1 => 0x02,
            TransferType::EventsAndFaultsGen1 => 0x03,
            TransferType::DetailedSpeedGen1 => 0x04,
            TransferType::TechnicalDataGen1 => 0x05,
            TransferType::OverviewGen2V1 => 0x11,
            TransferType::ActivitiesGen2V1 => 0x12,
            TransferType::EventsAndFaultsGen2V1 => 0x13,
            TransferType::DetailedSpeedGen2 => 0x14,
            TransferType::TechnicalDataGen2V1 => 0x15,
            TransferType::CardDownload => 0x21,
            TransferType::OverviewGen2V2 => 0x31,
            TransferType::ActivitiesGen2V2 => 0x32,
            TransferType::EventsAndFaultsGen2V2 => 0x33,
            TransferType::TechnicalDataGen2V2 => 0x35,
        }
    }

    pub fn from_trep(trep: u8) -> Option<TransferType> {
        Some(match trep {
            0x00 => TransferType::DownloadInterfaceVersion,
            0x01 => TransferType::OverviewGen1,
            0x02 => TransferType::ActivitiesGen1,
            0x03 => TransferType::EventsAndFaultsGen1,
            0x04 => TransferType::DetailedSpeedGen1,
            0x05 => TransferType::TechnicalDataGen1,
            0x11 => TransferType::OverviewGen2V1,
            0x12 => TransferType::ActivitiesGen2V1,
            0x13 => TransferType::EventsAndFaultsGen2V1,
            0x14 => TransferType::DetailedSpeedGen2,
            0x15 => TransferType::TechnicalDataGen2V1,
            0x21 => TransferType::CardDownload,
            0x31 => TransferType::OverviewGen2V2,
            0x32 => TransferType::ActivitiesGen2V2,
            0x33 => TransferType::EventsAndFaultsGen2V2,
            0x35 => TransferType::TechnicalDataGen2V2,
            _ => return None,
        })
    }

    /// Complete two byte tag as it appears on the wire.
    pub fn tag(self) -> u16 {
        u16::from_be_bytes([TAG_PREFIX, self.trep()])
    }

    pub fn from_tag(tag: u16) -> Option<TransferType> {
        let [prefix, trep] = tag.to_be_bytes();
        if prefix != TAG_PREFIX {
            return None;
        }
        TransferType::from_trep(trep)
    }

    pub fn generation(self) -> Generation {
        match self {
            TransferType::OverviewGen1
            | TransferType::ActivitiesGen1
            | TransferType::EventsAndFaultsGen1
            | TransferType::DetailedSpeedGen1
            | TransferType::TechnicalDataGen1 => Generation::Gen1,
            TransferType::DownloadInterfaceVersion
            | TransferType::OverviewGen2V1
            | TransferType::ActivitiesGen2V1
            | TransferType::EventsAndFaultsGen2V1
            | TransferType::DetailedSpeedGen2
            | TransferType::TechnicalDataGen2V1
            | TransferType::CardDownload
            | TransferType::OverviewGen2V2
            | TransferType::ActivitiesGen2V2
            | TransferType::EventsAndFaultsGen2V2
            | TransferType::TechnicalDataGen2V2 => Generation::Gen2,
        }
    }

    /// Transfers that only occur in a generation 2 version 2 download
    /// dialogue. The presence of any of these decides the file version.
    pub fn is_gen2_v2_only(self) -> bool {
        matches!(
            self,
            TransferType::DownloadInterfaceVersion
                | TransferType::OverviewGen2V2
                | TransferType::ActivitiesGen2V2
                | TransferType::EventsAndFaultsGen2V2
                | TransferType::TechnicalDataGen2V2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_for_every_transfer() {
        let all = [
            TransferType::DownloadInterfaceVersion,
            TransferType::OverviewGen1,
            TransferType::ActivitiesGen1,
            TransferType::EventsAndFaultsGen1,
            TransferType::DetailedSpeedGen1,
            TransferType::TechnicalDataGen1,
            TransferType::OverviewGen2V1,
            TransferType::ActivitiesGen2V1,
            TransferType::EventsAndFaultsGen2V1,
            TransferType::DetailedSpeedGen2,
            TransferType::TechnicalDataGen2V1,
            TransferType::CardDownload,
            TransferType::OverviewGen2V2,
            TransferType::ActivitiesGen2V2,
            TransferType::EventsAndFaultsGen2V2,
            TransferType::TechnicalDataGen2V2,
        ];
        for ttype in all {
            assert_eq!(Some(ttype), TransferType::from_tag(ttype.tag()));
        }
    }

    #[test]
    fn demuxes_overview_gen1() {
        assert_eq!(
            Some(TransferType::OverviewGen1),
            TransferType::from_tag(0x7601)
        );
        assert_eq!(
            Generation::Gen1,
            TransferType::OverviewGen1.generation()
        );
    }

    #[test]
    fn rejects_foreign_tags() {
        assert_eq!(None, TransferType::from_tag(0x7706));
        assert_eq!(None, TransferType::from_tag(0x7622));
    }
}
