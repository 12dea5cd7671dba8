//! Events and faults transfers.
//!
//! The first generation layout is decoded in full. The second
//! generation arrays are structure-validated only: their position and
//! headers are checked against the regulation's sequence, the record
//! content stays opaque. Raw-data painting keeps the opaque spans byte
//! exact on the way out.

use nom::{combinator::map, multi::count, sequence::tuple, IResult};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{
    paint_opaque, raw_canvas, run_parser, split_signature, ArrayReader, OpaqueRecordArray,
};
use crate::vu::record_array::RecordArrayType;
use crate::vu::sizer::{
    EVENT_GEN1_SIZE, FAULT_GEN1_SIZE, OVERSPEED_CONTROL_SIZE, OVERSPEED_EVENT_GEN1_SIZE,
    SIGNATURE_GEN1_SIZE, TIME_ADJUSTMENT_GEN1_SIZE,
};
use crate::vu::transfer::Version;
use crate::vu::types::{
    t_full_card_number, t_name, t_time_real, t_u8, Canvas, CodePageString, FullCardNumber,
    TimeReal,
};

/// VuFaultRecord, 82 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaultGen1 {
    pub fault_type: u8,
    pub record_purpose: u8,
    pub begin_time: TimeReal,
    pub end_time: TimeReal,
    pub card_driver_slot_begin: FullCardNumber,
    pub card_codriver_slot_begin: FullCardNumber,
    pub card_driver_slot_end: FullCardNumber,
    pub card_codriver_slot_end: FullCardNumber,
}

/// VuEventRecord, 83 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventGen1 {
    pub event_type: u8,
    pub record_purpose: u8,
    pub begin_time: TimeReal,
    pub end_time: TimeReal,
    pub card_driver_slot_begin: FullCardNumber,
    pub card_codriver_slot_begin: FullCardNumber,
    pub card_driver_slot_end: FullCardNumber,
    pub card_codriver_slot_end: FullCardNumber,
    pub similar_events_number: u8,
}

/// VuOverSpeedingControlData, 9 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverspeedControl {
    pub last_overspeed_control_time: TimeReal,
    pub first_overspeed_since: TimeReal,
    pub number_of_overspeed_since: u8,
}

/// VuOverSpeedingEventRecord, 31 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverspeedEventGen1 {
    pub event_type: u8,
    pub record_purpose: u8,
    pub begin_time: TimeReal,
    pub end_time: TimeReal,
    pub max_speed: u8,
    pub average_speed: u8,
    pub card_driver_slot_begin: FullCardNumber,
    pub similar_events_number: u8,
}

/// VuTimeAdjustmentRecord, 98 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeAdjustmentGen1 {
    pub old_time: TimeReal,
    pub new_time: TimeReal,
    pub workshop_name: CodePageString,
    pub workshop_address: CodePageString,
    pub workshop_card_number: FullCardNumber,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventsAndFaultsGen1 {
    pub faults: Vec<FaultGen1>,
    pub events: Vec<EventGen1>,
    pub overspeed_control: OverspeedControl,
    pub overspeed_events: Vec<OverspeedEventGen1>,
    pub time_adjustments: Vec<TimeAdjustmentGen1>,
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_fault_gen1(buffer: &[u8]) -> IResult<&[u8], FaultGen1> {
    map(
        tuple((
            t_u8,
            t_u8,
            t_time_real,
            t_time_real,
            t_full_card_number,
            t_full_card_number,
            t_full_card_number,
            t_full_card_number,
        )),
        |(
            fault_type,
            record_purpose,
            begin_time,
            end_time,
            card_driver_slot_begin,
            card_codriver_slot_begin,
            card_driver_slot_end,
            card_codriver_slot_end,
        )| FaultGen1 {
            fault_type,
            record_purpose,
            begin_time,
            end_time,
            card_driver_slot_begin,
            card_codriver_slot_begin,
            card_driver_slot_end,
            card_codriver_slot_end,
        },
    )(buffer)
}

fn t_event_gen1(buffer: &[u8]) -> IResult<&[u8], EventGen1> {
    map(
        tuple((t_fault_gen1, t_u8)),
        |(base, similar_events_number)| EventGen1 {
            event_type: base.fault_type,
            record_purpose: base.record_purpose,
            begin_time: base.begin_time,
            end_time: base.end_time,
            card_driver_slot_begin: base.card_driver_slot_begin,
            card_codriver_slot_begin: base.card_codriver_slot_begin,
            card_driver_slot_end: base.card_driver_slot_end,
            card_codriver_slot_end: base.card_codriver_slot_end,
            similar_events_number,
        },
    )(buffer)
}

fn t_overspeed_control(buffer: &[u8]) -> IResult<&[u8], OverspeedControl> {
    map(
        tuple((t_time_real, t_time_real, t_u8)),
        |(last_overspeed_control_time, first_overspeed_since, number_of_overspeed_since)| {
            OverspeedControl {
                last_overspeed_control_time,
                first_overspeed_since,
                number_of_overspeed_since,
            }
        },
    )(buffer)
}

fn t_overspeed_event_gen1(buffer: &[u8]) -> IResult<&[u8], OverspeedEventGen1> {
    map(
        tuple((
            t_u8,
            t_u8,
            t_time_real,
            t_time_real,
            t_u8,
            t_u8,
            t_full_card_number,
            t_u8,
        )),
        |(
            event_type,
            record_purpose,
            begin_time,
            end_time,
            max_speed,
            average_speed,
            card_driver_slot_begin,
            similar_events_number,
        )| OverspeedEventGen1 {
            event_type,
            record_purpose,
            begin_time,
            end_time,
            max_speed,
            average_speed,
            card_driver_slot_begin,
            similar_events_number,
        },
    )(buffer)
}

fn t_time_adjustment_gen1(buffer: &[u8]) -> IResult<&[u8], TimeAdjustmentGen1> {
    map(
        tuple((t_time_real, t_time_real, t_name, t_name, t_full_card_number)),
        |(old_time, new_time, workshop_name, workshop_address, workshop_card_number)| {
            TimeAdjustmentGen1 {
                old_time,
                new_time,
                workshop_name,
                workshop_address,
                workshop_card_number,
            }
        },
    )(buffer)
}

fn parse_events_gen1(buffer: &[u8]) -> IResult<&[u8], EventsAndFaultsGen1> {
    let (buffer, fault_count) = t_u8(buffer)?;
    let (buffer, faults) = count(t_fault_gen1, usize::from(fault_count))(buffer)?;
    let (buffer, event_count) = t_u8(buffer)?;
    let (buffer, events) = count(t_event_gen1, usize::from(event_count))(buffer)?;
    let (buffer, overspeed_control) = t_overspeed_control(buffer)?;
    let (buffer, overspeed_count) = t_u8(buffer)?;
    let (buffer, overspeed_events) =
        count(t_overspeed_event_gen1, usize::from(overspeed_count))(buffer)?;
    let (buffer, adjustment_count) = t_u8(buffer)?;
    let (buffer, time_adjustments) =
        count(t_time_adjustment_gen1, usize::from(adjustment_count))(buffer)?;
    Ok((
        buffer,
        EventsAndFaultsGen1 {
            faults,
            events,
            overspeed_control,
            overspeed_events,
            time_adjustments,
            signature: Vec::new(),
            raw_data: None,
            authentication: None,
        },
    ))
}

fn paint_card_quad(canvas: &mut Canvas, record: &FaultGen1) {
    canvas.put_card(&record.card_driver_slot_begin);
    canvas.put_card(&record.card_codriver_slot_begin);
    canvas.put_card(&record.card_driver_slot_end);
    canvas.put_card(&record.card_codriver_slot_end);
}

impl EventsAndFaultsGen1 {
    pub fn unmarshal_value(value: &[u8]) -> Result<EventsAndFaultsGen1> {
        let (data, signature) = split_signature(value, SIGNATURE_GEN1_SIZE)?;
        let mut message = run_parser(data, parse_events_gen1, "EventsAndFaults Gen1")?;
        message.signature = signature.to_vec();
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn data_size(&self) -> usize {
        1 + self.faults.len() * FAULT_GEN1_SIZE
            + 1
            + self.events.len() * EVENT_GEN1_SIZE
            + OVERSPEED_CONTROL_SIZE
            + 1
            + self.overspeed_events.len() * OVERSPEED_EVENT_GEN1_SIZE
            + 1
            + self.time_adjustments.len() * TIME_ADJUSTMENT_GEN1_SIZE
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        canvas.put_u8(self.faults.len() as u8);
        for fault in &self.faults {
            canvas.put_u8(fault.fault_type);
            canvas.put_u8(fault.record_purpose);
            canvas.put_time(fault.begin_time);
            canvas.put_time(fault.end_time);
            paint_card_quad(&mut canvas, fault);
        }
        canvas.put_u8(self.events.len() as u8);
        for event in &self.events {
            canvas.put_u8(event.event_type);
            canvas.put_u8(event.record_purpose);
            canvas.put_time(event.begin_time);
            canvas.put_time(event.end_time);
            canvas.put_card(&event.card_driver_slot_begin);
            canvas.put_card(&event.card_codriver_slot_begin);
            canvas.put_card(&event.card_driver_slot_end);
            canvas.put_card(&event.card_codriver_slot_end);
            canvas.put_u8(event.similar_events_number);
        }
        canvas.put_time(self.overspeed_control.last_overspeed_control_time);
        canvas.put_time(self.overspeed_control.first_overspeed_since);
        canvas.put_u8(self.overspeed_control.number_of_overspeed_since);
        canvas.put_u8(self.overspeed_events.len() as u8);
        for event in &self.overspeed_events {
            canvas.put_u8(event.event_type);
            canvas.put_u8(event.record_purpose);
            canvas.put_time(event.begin_time);
            canvas.put_time(event.end_time);
            canvas.put_u8(event.max_speed);
            canvas.put_u8(event.average_speed);
            canvas.put_card(&event.card_driver_slot_begin);
            canvas.put_u8(event.similar_events_number);
        }
        canvas.put_u8(self.time_adjustments.len() as u8);
        for adjustment in &self.time_adjustments {
            canvas.put_time(adjustment.old_time);
            canvas.put_time(adjustment.new_time);
            canvas.put_string(&adjustment.workshop_name);
            canvas.put_string(&adjustment.workshop_address);
            canvas.put_card(&adjustment.workshop_card_number);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

// ---------------------------------------------------------------------
// Generation 2

#[derive(Debug, Clone, PartialEq)]
pub struct EventsAndFaultsGen2 {
    pub version: Version,
    /// Every non-signature array in regulation order, content opaque.
    pub arrays: Vec<OpaqueRecordArray>,
    /// Complete signature record array, header included.
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

impl EventsAndFaultsGen2 {
    fn array_sequence(version: Version) -> &'static [RecordArrayType] {
        use RecordArrayType::*;
        match version {
            Version::V1 => &[
                VuFaultRecord,
                VuEventRecord,
                VuOverSpeedingControlData,
                VuOverSpeedingEventRecord,
                VuTimeAdjustmentGnssRecord,
                VuTimeAdjustmentRecord,
            ],
            Version::V2 => &[
                VuFaultRecord,
                VuEventRecord,
                VuOverSpeedingControlData,
                VuOverSpeedingEventRecord,
                VuTimeAdjustmentRecord,
            ],
        }
    }

    pub fn unmarshal_value(value: &[u8], version: Version) -> Result<EventsAndFaultsGen2> {
        let mut reader = ArrayReader::new(value, "EventsAndFaults Gen2");
        let mut arrays = Vec::new();
        for expected in Self::array_sequence(version) {
            arrays.push(reader.opaque(*expected)?);
        }
        let signature = reader.signature()?;
        reader.finish()?;
        Ok(EventsAndFaultsGen2 {
            version,
            arrays,
            signature,
            raw_data: Some(value.to_vec()),
            authentication: None,
        })
    }

    pub fn data_size(&self) -> usize {
        self.arrays.iter().map(OpaqueRecordArray::size).sum()
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        for array in &self.arrays {
            paint_opaque(&mut canvas, array);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vu::record_array::emit_header;
    use crate::vu::sizer::{size_of, Sizes};
    use crate::vu::transfer::TransferType;

    pub(crate) fn events_gen1_value() -> Vec<u8> {
        let mut value = Vec::new();
        value.push(0x00); // no faults
        value.push(0x01); // one event
        value.push(0x09); // vehicle motion data error
        value.push(0x01);
        value.extend(0x64b2_5c80u32.to_be_bytes());
        value.extend(0x64b2_5d00u32.to_be_bytes());
        value.extend([0x01, 0x0a]);
        value.extend(b"D123456789012345");
        value.extend(vec![0x00; 18 * 3]);
        value.push(0x02);
        // overspeed control block
        value.extend(0x64b2_0000u32.to_be_bytes());
        value.extend(0x64b1_0000u32.to_be_bytes());
        value.push(0x05);
        value.push(0x00); // no overspeed events
        value.push(0x01); // one time adjustment
        value.extend(0x64b2_0000u32.to_be_bytes());
        value.extend(0x64b2_0010u32.to_be_bytes());
        value.push(0x01);
        value.extend(b"WORKSHOP");
        value.extend(vec![b' '; 27]);
        value.push(0x01);
        value.extend(b"GARAGE LANE 2");
        value.extend(vec![b' '; 22]);
        value.extend([0x03, 0x0a]);
        value.extend(b"W123456789012345");
        value.extend(vec![0xcc; SIGNATURE_GEN1_SIZE]);
        value
    }

    #[test]
    fn gen1_layout_agrees_with_the_sizer() {
        let value = events_gen1_value();
        assert_eq!(
            Sizes {
                total: value.len(),
                signature: SIGNATURE_GEN1_SIZE,
            },
            size_of(&value, TransferType::EventsAndFaultsGen1).unwrap()
        );
    }

    #[test]
    fn gen1_round_trips_with_and_without_raw_data() {
        let value = events_gen1_value();
        let message = EventsAndFaultsGen1::unmarshal_value(&value).unwrap();
        assert_eq!(1, message.events.len());
        assert_eq!(0x09, message.events[0].event_type);
        assert_eq!(1, message.time_adjustments.len());
        assert_eq!(
            "WORKSHOP",
            message.time_adjustments[0].workshop_name.to_latin1()
        );
        assert_eq!(value, message.marshal_value());

        let mut semantic = message.clone();
        semantic.raw_data = None;
        assert_eq!(value, semantic.marshal_value());
    }

    pub(crate) fn events_gen2_value(version: Version) -> Vec<u8> {
        let mut value = Vec::new();
        let sizes: &[(RecordArrayType, u16, u16)] = match version {
            Version::V1 => &[
                (RecordArrayType::VuFaultRecord, 105, 1),
                (RecordArrayType::VuEventRecord, 106, 0),
                (RecordArrayType::VuOverSpeedingControlData, 9, 1),
                (RecordArrayType::VuOverSpeedingEventRecord, 31, 0),
                (RecordArrayType::VuTimeAdjustmentGnssRecord, 11, 0),
                (RecordArrayType::VuTimeAdjustmentRecord, 100, 0),
            ],
            Version::V2 => &[
                (RecordArrayType::VuFaultRecord, 105, 1),
                (RecordArrayType::VuEventRecord, 106, 0),
                (RecordArrayType::VuOverSpeedingControlData, 9, 1),
                (RecordArrayType::VuOverSpeedingEventRecord, 31, 0),
                (RecordArrayType::VuTimeAdjustmentRecord, 100, 0),
            ],
        };
        for &(ty, size, records) in sizes {
            emit_header(&mut value, ty.code(), size, records);
            value.extend(vec![0x5a; usize::from(size) * usize::from(records)]);
        }
        emit_header(&mut value, RecordArrayType::Signature.code(), 64, 1);
        value.extend(vec![0xdd; 64]);
        value
    }

    #[test]
    fn gen2_keeps_opaque_bodies_byte_exact() {
        let value = events_gen2_value(Version::V1);
        let message = EventsAndFaultsGen2::unmarshal_value(&value, Version::V1).unwrap();
        assert_eq!(6, message.arrays.len());
        assert_eq!(vec![0x5a; 105], message.arrays[0].body);
        assert_eq!(value, message.marshal_value());

        let mut semantic = message.clone();
        semantic.raw_data = None;
        assert_eq!(value, semantic.marshal_value());
    }

    #[test]
    fn gen2_v2_drops_the_gnss_adjustment_array() {
        let value = events_gen2_value(Version::V2);
        let message = EventsAndFaultsGen2::unmarshal_value(&value, Version::V2).unwrap();
        assert_eq!(5, message.arrays.len());
        assert_eq!(value, message.marshal_value());
    }
}
