//! Activity transfers: one per downloaded day, carrying the card
//! insertion/withdrawal cycles, the minute-grained activity changes,
//! the daily work period places, and (second generation) the GNSS
//! positions plus the version 2 border crossing and load/unload logs.

use nom::{combinator::map, multi::count, sequence::tuple, IResult};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{
    array_size, paint_array, raw_canvas, run_parser, split_signature, ArrayReader,
};
use crate::vu::record_array::RecordArrayType;
use crate::vu::sizer::{
    ACTIVITY_CHANGE_SIZE, BORDER_CROSSING_SIZE, CARD_IW_GEN1_SIZE, CARD_IW_GEN2_SIZE,
    GNSS_AD_V1_SIZE, GNSS_AD_V2_SIZE, LOAD_UNLOAD_SIZE, PLACE_GEN1_SIZE, PLACE_GEN2_SIZE,
    SIGNATURE_GEN1_SIZE, SPECIFIC_CONDITION_SIZE,
};
use crate::vu::transfer::Version;
use crate::vu::types::{
    t_datef, t_full_card_number, t_full_card_number_and_generation, t_gnss_place_auth_record,
    t_gnss_place_record, t_holder_name, t_odometer, t_time_real, t_u16, t_u8,
    t_vehicle_registration, Canvas, Datef, FullCardNumber, FullCardNumberAndGeneration,
    GnssPlaceAuthRecord, GnssPlaceRecord, HolderName, OdometerShort, TimeReal,
    VehicleRegistrationIdentification,
};

/// ActivityChangeInfo: a two byte bitfield `scpaattt tttttttt` packing
/// slot, crew status, card presence, activity and the minute of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityChange(pub u16);

impl ActivityChange {
    /// Driver (0) or co-driver (1) slot.
    pub fn slot(self) -> u8 {
        (self.0 >> 15) as u8
    }

    /// Single driver (0) or crew (1).
    pub fn crew(self) -> u8 {
        (self.0 >> 14 & 1) as u8
    }

    /// Card inserted during the change.
    pub fn card_inserted(self) -> bool {
        self.0 >> 13 & 1 == 0
    }

    /// Break/rest (0), availability (1), work (2) or driving (3).
    pub fn activity(self) -> u8 {
        (self.0 >> 11 & 0b11) as u8
    }

    /// Minute of the day the change happened, 0..=1439.
    pub fn minute_of_day(self) -> u16 {
        self.0 & 0x07ff
    }
}

/// PreviousVehicleInfo, first generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviousVehicleGen1 {
    pub registration: VehicleRegistrationIdentification,
    pub withdrawal_time: TimeReal,
}

/// VuCardIWRecord, first generation, 129 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CardIwGen1 {
    pub holder_name: HolderName,
    pub full_card_number: FullCardNumber,
    pub card_expiry_date: Datef,
    pub insertion_time: TimeReal,
    pub odometer_at_insertion: OdometerShort,
    pub slot_number: u8,
    pub withdrawal_time: TimeReal,
    pub odometer_at_withdrawal: OdometerShort,
    pub previous_vehicle: PreviousVehicleGen1,
    pub manual_input_flag: u8,
}

/// PlaceRecord with the leading full card number, first generation,
/// 28 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceGen1 {
    pub full_card_number: FullCardNumber,
    pub entry_time: TimeReal,
    pub entry_type: u8,
    pub country: u8,
    pub region: u8,
    pub odometer: OdometerShort,
}

/// SpecificConditionRecord, 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecificCondition {
    pub entry_time: TimeReal,
    pub condition_type: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivitiesGen1 {
    pub date_of_day: TimeReal,
    pub odometer_midnight: OdometerShort,
    pub card_iw_records: Vec<CardIwGen1>,
    pub activity_changes: Vec<ActivityChange>,
    pub places: Vec<PlaceGen1>,
    pub specific_conditions: Vec<SpecificCondition>,
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_activity_change(buffer: &[u8]) -> IResult<&[u8], ActivityChange> {
    map(t_u16, ActivityChange)(buffer)
}

fn t_specific_condition(buffer: &[u8]) -> IResult<&[u8], SpecificCondition> {
    map(tuple((t_time_real, t_u8)), |(entry_time, condition_type)| {
        SpecificCondition {
            entry_time,
            condition_type,
        }
    })(buffer)
}

fn t_card_iw_gen1(buffer: &[u8]) -> IResult<&[u8], CardIwGen1> {
    map(
        tuple((
            t_holder_name,
            t_full_card_number,
            t_datef,
            t_time_real,
            t_odometer,
            t_u8,
            t_time_real,
            t_odometer,
            tuple((t_vehicle_registration, t_time_real)),
            t_u8,
        )),
        |(
            holder_name,
            full_card_number,
            card_expiry_date,
            insertion_time,
            odometer_at_insertion,
            slot_number,
            withdrawal_time,
            odometer_at_withdrawal,
            (previous_registration, previous_withdrawal_time),
            manual_input_flag,
        )| CardIwGen1 {
            holder_name,
            full_card_number,
            card_expiry_date,
            insertion_time,
            odometer_at_insertion,
            slot_number,
            withdrawal_time,
            odometer_at_withdrawal,
            previous_vehicle: PreviousVehicleGen1 {
                registration: previous_registration,
                withdrawal_time: previous_withdrawal_time,
            },
            manual_input_flag,
        },
    )(buffer)
}

fn t_place_gen1(buffer: &[u8]) -> IResult<&[u8], PlaceGen1> {
    map(
        tuple((t_full_card_number, t_time_real, t_u8, t_u8, t_u8, t_odometer)),
        |(full_card_number, entry_time, entry_type, country, region, odometer)| PlaceGen1 {
            full_card_number,
            entry_time,
            entry_type,
            country,
            region,
            odometer,
        },
    )(buffer)
}

fn parse_activities_gen1(buffer: &[u8]) -> IResult<&[u8], ActivitiesGen1> {
    let (buffer, date_of_day) = t_time_real(buffer)?;
    let (buffer, odometer_midnight) = t_odometer(buffer)?;
    let (buffer, iw_count) = t_u16(buffer)?;
    let (buffer, card_iw_records) = count(t_card_iw_gen1, usize::from(iw_count))(buffer)?;
    let (buffer, change_count) = t_u16(buffer)?;
    let (buffer, activity_changes) =
        count(t_activity_change, usize::from(change_count))(buffer)?;
    let (buffer, place_count) = t_u8(buffer)?;
    let (buffer, places) = count(t_place_gen1, usize::from(place_count))(buffer)?;
    let (buffer, condition_count) = t_u16(buffer)?;
    let (buffer, specific_conditions) =
        count(t_specific_condition, usize::from(condition_count))(buffer)?;
    Ok((
        buffer,
        ActivitiesGen1 {
            date_of_day,
            odometer_midnight,
            card_iw_records,
            activity_changes,
            places,
            specific_conditions,
            signature: Vec::new(),
            raw_data: None,
            authentication: None,
        },
    ))
}

fn paint_card_iw_gen1(canvas: &mut Canvas, record: &CardIwGen1) {
    canvas.put_holder_name(&record.holder_name);
    canvas.put_card(&record.full_card_number);
    canvas.put_datef(record.card_expiry_date);
    canvas.put_time(record.insertion_time);
    canvas.put_odometer(record.odometer_at_insertion);
    canvas.put_u8(record.slot_number);
    canvas.put_time(record.withdrawal_time);
    canvas.put_odometer(record.odometer_at_withdrawal);
    canvas.put_vehicle_registration(&record.previous_vehicle.registration);
    canvas.put_time(record.previous_vehicle.withdrawal_time);
    canvas.put_u8(record.manual_input_flag);
}

impl ActivitiesGen1 {
    pub fn unmarshal_value(value: &[u8]) -> Result<ActivitiesGen1> {
        let (data, signature) = split_signature(value, SIGNATURE_GEN1_SIZE)?;
        let mut message = run_parser(data, parse_activities_gen1, "Activities Gen1")?;
        message.signature = signature.to_vec();
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn data_size(&self) -> usize {
        4 + 3
            + 2
            + self.card_iw_records.len() * CARD_IW_GEN1_SIZE
            + 2
            + self.activity_changes.len() * ACTIVITY_CHANGE_SIZE
            + 1
            + self.places.len() * PLACE_GEN1_SIZE
            + 2
            + self.specific_conditions.len() * SPECIFIC_CONDITION_SIZE
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        canvas.put_time(self.date_of_day);
        canvas.put_odometer(self.odometer_midnight);
        canvas.put_u16(self.card_iw_records.len() as u16);
        for record in &self.card_iw_records {
            paint_card_iw_gen1(&mut canvas, record);
        }
        canvas.put_u16(self.activity_changes.len() as u16);
        for change in &self.activity_changes {
            canvas.put_u16(change.0);
        }
        canvas.put_u8(self.places.len() as u8);
        for place in &self.places {
            canvas.put_card(&place.full_card_number);
            canvas.put_time(place.entry_time);
            canvas.put_u8(place.entry_type);
            canvas.put_u8(place.country);
            canvas.put_u8(place.region);
            canvas.put_odometer(place.odometer);
        }
        canvas.put_u16(self.specific_conditions.len() as u16);
        for condition in &self.specific_conditions {
            canvas.put_time(condition.entry_time);
            canvas.put_u8(condition.condition_type);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

// ---------------------------------------------------------------------
// Generation 2

/// PreviousVehicleInfo, second generation: the registration now travels
/// with the generation of the recording VU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviousVehicleGen2 {
    pub registration: VehicleRegistrationIdentification,
    pub withdrawal_time: TimeReal,
    pub vu_generation: u8,
}

/// VuCardIWRecord, second generation, 131 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CardIwGen2 {
    pub holder_name: HolderName,
    pub card_number: FullCardNumberAndGeneration,
    pub card_expiry_date: Datef,
    pub insertion_time: TimeReal,
    pub odometer_at_insertion: OdometerShort,
    pub slot_number: u8,
    pub withdrawal_time: TimeReal,
    pub odometer_at_withdrawal: OdometerShort,
    pub previous_vehicle: PreviousVehicleGen2,
    pub manual_input_flag: u8,
}

/// VuPlaceDailyWorkPeriodRecord, 41 bytes: the card number, the work
/// period entry and its GNSS place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceGen2 {
    pub card_number: FullCardNumberAndGeneration,
    pub entry_time: TimeReal,
    pub entry_type: u8,
    pub country: u8,
    pub odometer: OdometerShort,
    pub gnss_place: GnssPlaceRecord,
}

/// VuGNSSADRecord: the accumulated-driving position log. Version 2 adds
/// the position authentication status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GnssAdRecord {
    pub time_stamp: TimeReal,
    pub driver_card: FullCardNumberAndGeneration,
    pub codriver_card: FullCardNumberAndGeneration,
    pub gnss_place: GnssPlaceRecord,
    pub position_authentication: Option<u8>,
    pub odometer: OdometerShort,
}

/// VuBorderCrossingRecord, 57 bytes, version 2 only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderCrossing {
    pub driver_card: FullCardNumberAndGeneration,
    pub codriver_card: FullCardNumberAndGeneration,
    pub country_left: u8,
    pub country_entered: u8,
    pub gnss_place: GnssPlaceAuthRecord,
    pub odometer: OdometerShort,
}

/// VuLoadUnloadRecord, 60 bytes, version 2 only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadUnload {
    pub time_stamp: TimeReal,
    pub operation_type: u8,
    pub driver_card: FullCardNumberAndGeneration,
    pub codriver_card: FullCardNumberAndGeneration,
    pub gnss_place: GnssPlaceAuthRecord,
    pub odometer: OdometerShort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitiesGen2 {
    pub version: Version,
    pub date_of_day: Option<TimeReal>,
    pub odometer_midnight: Option<OdometerShort>,
    pub card_iw_records: Vec<CardIwGen2>,
    pub activity_changes: Vec<ActivityChange>,
    pub places: Vec<PlaceGen2>,
    pub gnss_ad_records: Vec<GnssAdRecord>,
    pub specific_conditions: Vec<SpecificCondition>,
    pub border_crossings: Vec<BorderCrossing>,
    pub load_unload_operations: Vec<LoadUnload>,
    /// Complete signature record array, header included.
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_card_iw_gen2(buffer: &[u8]) -> IResult<&[u8], CardIwGen2> {
    map(
        tuple((
            t_holder_name,
            t_full_card_number_and_generation,
            t_datef,
            t_time_real,
            t_odometer,
            t_u8,
            t_time_real,
            t_odometer,
            tuple((t_vehicle_registration, t_time_real, t_u8)),
            t_u8,
        )),
        |(
            holder_name,
            card_number,
            card_expiry_date,
            insertion_time,
            odometer_at_insertion,
            slot_number,
            withdrawal_time,
            odometer_at_withdrawal,
            (previous_registration, previous_withdrawal_time, vu_generation),
            manual_input_flag,
        )| CardIwGen2 {
            holder_name,
            card_number,
            card_expiry_date,
            insertion_time,
            odometer_at_insertion,
            slot_number,
            withdrawal_time,
            odometer_at_withdrawal,
            previous_vehicle: PreviousVehicleGen2 {
                registration: previous_registration,
                withdrawal_time: previous_withdrawal_time,
                vu_generation,
            },
            manual_input_flag,
        },
    )(buffer)
}

fn t_place_gen2(buffer: &[u8]) -> IResult<&[u8], PlaceGen2> {
    map(
        tuple((
            t_full_card_number_and_generation,
            t_time_real,
            t_u8,
            t_u8,
            t_odometer,
            t_gnss_place_record,
        )),
        |(card_number, entry_time, entry_type, country, odometer, gnss_place)| PlaceGen2 {
            card_number,
            entry_time,
            entry_type,
            country,
            odometer,
            gnss_place,
        },
    )(buffer)
}

fn t_gnss_ad_record(version: Version) -> impl FnMut(&[u8]) -> IResult<&[u8], GnssAdRecord> {
    move |buffer| {
        let (buffer, time_stamp) = t_time_real(buffer)?;
        let (buffer, driver_card) = t_full_card_number_and_generation(buffer)?;
        let (buffer, codriver_card) = t_full_card_number_and_generation(buffer)?;
        let (buffer, gnss_place) = t_gnss_place_record(buffer)?;
        let (buffer, position_authentication) = match version {
            Version::V1 => (buffer, None),
            Version::V2 => map(t_u8, Some)(buffer)?,
        };
        let (buffer, odometer) = t_odometer(buffer)?;
        Ok((
            buffer,
            GnssAdRecord {
                time_stamp,
                driver_card,
                codriver_card,
                gnss_place,
                position_authentication,
                odometer,
            },
        ))
    }
}

fn t_border_crossing(buffer: &[u8]) -> IResult<&[u8], BorderCrossing> {
    map(
        tuple((
            t_full_card_number_and_generation,
            t_full_card_number_and_generation,
            t_u8,
            t_u8,
            t_gnss_place_auth_record,
            t_odometer,
        )),
        |(driver_card, codriver_card, country_left, country_entered, gnss_place, odometer)| {
            BorderCrossing {
                driver_card,
                codriver_card,
                country_left,
                country_entered,
                gnss_place,
                odometer,
            }
        },
    )(buffer)
}

fn t_load_unload(buffer: &[u8]) -> IResult<&[u8], LoadUnload> {
    map(
        tuple((
            t_time_real,
            t_u8,
            t_full_card_number_and_generation,
            t_full_card_number_and_generation,
            t_gnss_place_auth_record,
            t_odometer,
        )),
        |(time_stamp, operation_type, driver_card, codriver_card, gnss_place, odometer)| {
            LoadUnload {
                time_stamp,
                operation_type,
                driver_card,
                codriver_card,
                gnss_place,
                odometer,
            }
        },
    )(buffer)
}

impl ActivitiesGen2 {
    fn gnss_record_size(version: Version) -> usize {
        match version {
            Version::V1 => GNSS_AD_V1_SIZE,
            Version::V2 => GNSS_AD_V2_SIZE,
        }
    }

    pub fn unmarshal_value(value: &[u8], version: Version) -> Result<ActivitiesGen2> {
        let mut reader = ArrayReader::new(value, "Activities Gen2");
        let date_of_day = reader.single(RecordArrayType::DateOfDayDownloaded, 4, t_time_real)?;
        let odometer_midnight =
            reader.single(RecordArrayType::OdometerValueMidnight, 3, t_odometer)?;
        let card_iw_records = reader.records(
            RecordArrayType::VuCardIwRecord,
            CARD_IW_GEN2_SIZE,
            t_card_iw_gen2,
        )?;
        let activity_changes = reader.records(
            RecordArrayType::ActivityChangeInfo,
            ACTIVITY_CHANGE_SIZE,
            t_activity_change,
        )?;
        let places = reader.records(
            RecordArrayType::VuPlaceDailyWorkPeriodRecord,
            PLACE_GEN2_SIZE,
            t_place_gen2,
        )?;
        let gnss_ad_records = reader.records(
            RecordArrayType::VuGnssAdRecord,
            Self::gnss_record_size(version),
            t_gnss_ad_record(version),
        )?;
        let specific_conditions = reader.records(
            RecordArrayType::SpecificConditionRecord,
            SPECIFIC_CONDITION_SIZE,
            t_specific_condition,
        )?;
        let (border_crossings, load_unload_operations) = match version {
            Version::V1 => (Vec::new(), Vec::new()),
            Version::V2 => (
                reader.records(
                    RecordArrayType::VuBorderCrossingRecord,
                    BORDER_CROSSING_SIZE,
                    t_border_crossing,
                )?,
                reader.records(
                    RecordArrayType::VuLoadUnloadRecord,
                    LOAD_UNLOAD_SIZE,
                    t_load_unload,
                )?,
            ),
        };
        let signature = reader.signature()?;
        reader.finish()?;

        Ok(ActivitiesGen2 {
            version,
            date_of_day,
            odometer_midnight,
            card_iw_records,
            activity_changes,
            places,
            gnss_ad_records,
            specific_conditions,
            border_crossings,
            load_unload_operations,
            signature,
            raw_data: Some(value.to_vec()),
            authentication: None,
        })
    }

    pub fn data_size(&self) -> usize {
        let mut size = array_size(4, self.date_of_day.iter().count())
            + array_size(3, self.odometer_midnight.iter().count())
            + array_size(CARD_IW_GEN2_SIZE, self.card_iw_records.len())
            + array_size(ACTIVITY_CHANGE_SIZE, self.activity_changes.len())
            + array_size(PLACE_GEN2_SIZE, self.places.len())
            + array_size(
                Self::gnss_record_size(self.version),
                self.gnss_ad_records.len(),
            )
            + array_size(SPECIFIC_CONDITION_SIZE, self.specific_conditions.len());
        if self.version == Version::V2 {
            size += array_size(BORDER_CROSSING_SIZE, self.border_crossings.len())
                + array_size(LOAD_UNLOAD_SIZE, self.load_unload_operations.len());
        }
        size
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::DateOfDayDownloaded,
            4,
            self.date_of_day.as_slice(),
            |canvas, time| canvas.put_time(*time),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::OdometerValueMidnight,
            3,
            self.odometer_midnight.as_slice(),
            |canvas, odometer| canvas.put_odometer(*odometer),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuCardIwRecord,
            CARD_IW_GEN2_SIZE,
            &self.card_iw_records,
            |canvas, record| {
                canvas.put_holder_name(&record.holder_name);
                canvas.put_card_and_generation(&record.card_number);
                canvas.put_datef(record.card_expiry_date);
                canvas.put_time(record.insertion_time);
                canvas.put_odometer(record.odometer_at_insertion);
                canvas.put_u8(record.slot_number);
                canvas.put_time(record.withdrawal_time);
                canvas.put_odometer(record.odometer_at_withdrawal);
                canvas.put_vehicle_registration(&record.previous_vehicle.registration);
                canvas.put_time(record.previous_vehicle.withdrawal_time);
                canvas.put_u8(record.previous_vehicle.vu_generation);
                canvas.put_u8(record.manual_input_flag);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::ActivityChangeInfo,
            ACTIVITY_CHANGE_SIZE,
            &self.activity_changes,
            |canvas, change| canvas.put_u16(change.0),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuPlaceDailyWorkPeriodRecord,
            PLACE_GEN2_SIZE,
            &self.places,
            |canvas, place| {
                canvas.put_card_and_generation(&place.card_number);
                canvas.put_time(place.entry_time);
                canvas.put_u8(place.entry_type);
                canvas.put_u8(place.country);
                canvas.put_odometer(place.odometer);
                canvas.put_gnss_place_record(place.gnss_place);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuGnssAdRecord,
            Self::gnss_record_size(self.version),
            &self.gnss_ad_records,
            |canvas, record| {
                canvas.put_time(record.time_stamp);
                canvas.put_card_and_generation(&record.driver_card);
                canvas.put_card_and_generation(&record.codriver_card);
                canvas.put_gnss_place_record(record.gnss_place);
                if let Some(status) = record.position_authentication {
                    canvas.put_u8(status);
                }
                canvas.put_odometer(record.odometer);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::SpecificConditionRecord,
            SPECIFIC_CONDITION_SIZE,
            &self.specific_conditions,
            |canvas, condition| {
                canvas.put_time(condition.entry_time);
                canvas.put_u8(condition.condition_type);
            },
        );
        if self.version == Version::V2 {
            paint_array(
                &mut canvas,
                RecordArrayType::VuBorderCrossingRecord,
                BORDER_CROSSING_SIZE,
                &self.border_crossings,
                |canvas, crossing| {
                    canvas.put_card_and_generation(&crossing.driver_card);
                    canvas.put_card_and_generation(&crossing.codriver_card);
                    canvas.put_u8(crossing.country_left);
                    canvas.put_u8(crossing.country_entered);
                    canvas.put_gnss_place_auth_record(crossing.gnss_place);
                    canvas.put_odometer(crossing.odometer);
                },
            );
            paint_array(
                &mut canvas,
                RecordArrayType::VuLoadUnloadRecord,
                LOAD_UNLOAD_SIZE,
                &self.load_unload_operations,
                |canvas, operation| {
                    canvas.put_time(operation.time_stamp);
                    canvas.put_u8(operation.operation_type);
                    canvas.put_card_and_generation(&operation.driver_card);
                    canvas.put_card_and_generation(&operation.codriver_card);
                    canvas.put_gnss_place_auth_record(operation.gnss_place);
                    canvas.put_odometer(operation.odometer);
                },
            );
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

    fn card_iw_gen1_bytes() -> Vec<u8> {
        let mut record = Vec::new();
        record.push(0x01);
        record.extend(b"M\xfcller");
        record.extend(vec![b' '; 29]);
        record.push(0x01);
        record.extend(b"Hans");
        record.extend(vec![b' '; 31]);
        record.extend([0x01, 0x0a]); // card type, member state
        record.extend(b"D123456789012345");
        record.extend([0x20, 0x28, 0x07, 0x15]); // expiry
        record.extend(0x64b2_5c80u32.to_be_bytes()); // insertion 2023-07-15T08:00:00Z
        record.extend([0x01, 0xe2, 0x40]); // odometer 123456
        record.push(0x00);
        record.extend(0x64b2_a3a0u32.to_be_bytes()); // withdrawal
        record.extend([0x01, 0xe2, 0xf9]); // odometer 123641
        record.push(0x0b); // previous vehicle nation
        record.push(0x01);
        record.extend(b"XYZ-987      ");
        record.extend(0x64b1_0000u32.to_be_bytes());
        record.push(0x01);
        assert_eq!(CARD_IW_GEN1_SIZE, record.len());
        record
    }

    pub(crate) fn activities_gen1_value() -> Vec<u8> {
        let mut value = Vec::new();
        value.extend(0x64b2_0000u32.to_be_bytes());
        value.extend([0x01, 0xe2, 0x40]);
        value.extend([0x00, 0x01]);
        value.extend(card_iw_gen1_bytes());
        value.extend([0x00, 0x02]);
        value.extend([0x20, 0x3c]); // driving at minute 60
        value.extend([0x00, 0x78]); // rest at minute 120
        value.push(0x01);
        // one place record
        value.extend([0x01, 0x0a]);
        value.extend(b"D123456789012345");
        value.extend(0x64b2_5c80u32.to_be_bytes());
        value.push(0x01);
        value.push(0x0a);
        value.push(0x00);
        value.extend([0x01, 0xe2, 0x40]);
        value.extend([0x00, 0x01]);
        value.extend(0x64b2_5c80u32.to_be_bytes());
        value.push(0x01);
        value.extend(vec![0xcc; SIGNATURE_GEN1_SIZE]);
        value
    }

    #[test]
    fn gen1_layout_agrees_with_the_sizer() {
        let value = activities_gen1_value();
        assert_eq!(
            Sizes {
                total: value.len(),
                signature: SIGNATURE_GEN1_SIZE,
            },
            size_of(&value, TransferType::ActivitiesGen1).unwrap()
        );
    }

    #[test]
    fn gen1_round_trips_with_and_without_raw_data() {
        let value = activities_gen1_value();
        let message = ActivitiesGen1::unmarshal_value(&value).unwrap();
        assert_eq!(1, message.card_iw_records.len());
        let iw = &message.card_iw_records[0];
        assert_eq!("M\u{fc}ller", iw.holder_name.surname.to_latin1());
        assert_eq!(OdometerShort(123_456), iw.odometer_at_insertion);
        assert_eq!(2, message.activity_changes.len());
        assert_eq!(value, message.marshal_value());

        let mut semantic = message.clone();
        semantic.raw_data = None;
        assert_eq!(value, semantic.marshal_value());
    }

    #[test]
    fn activity_change_bitfield_accessors() {
        // co-driver slot, single driver, card absent, driving, minute 1439
        let change = ActivityChange(0b1011_1101_1001_1111);
        assert_eq!(1, change.slot());
        assert_eq!(0, change.crew());
        assert!(!change.card_inserted());
        assert_eq!(0b11, change.activity());
        assert_eq!(0b101_1001_1111, change.minute_of_day());
    }

    pub(crate) fn activities_gen2_value(version: Version) -> Vec<u8> {
        let mut value = Vec::new();
        emit_header(&mut value, RecordArrayType::DateOfDayDownloaded.code(), 4, 1);
        value.extend(0x64b2_0000u32.to_be_bytes());
        emit_header(&mut value, RecordArrayType::OdometerValueMidnight.code(), 3, 1);
        value.extend([0x01, 0xe2, 0x40]);
        emit_header(
            &mut value,
            RecordArrayType::VuCardIwRecord.code(),
            CARD_IW_GEN2_SIZE as u16,
            0,
        );
        emit_header(
            &mut value,
            RecordArrayType::ActivityChangeInfo.code(),
            ACTIVITY_CHANGE_SIZE as u16,
            2,
        );
        value.extend([0x20, 0x3c, 0x00, 0x78]);
        emit_header(
            &mut value,
            RecordArrayType::VuPlaceDailyWorkPeriodRecord.code(),
            PLACE_GEN2_SIZE as u16,
            0,
        );
        let gnss_size = match version {
            Version::V1 => GNSS_AD_V1_SIZE,
            Version::V2 => GNSS_AD_V2_SIZE,
        };
        emit_header(
            &mut value,
            RecordArrayType::VuGnssAdRecord.code(),
            gnss_size as u16,
            1,
        );
        value.extend(0x64b2_0e10u32.to_be_bytes());
        value.extend(vec![0x00; 2 * 19]); // both card numbers zero
        value.extend(0x64b2_0e10u32.to_be_bytes()); // place time stamp
        value.push(0x05); // accuracy
        value.extend(601_700i32.to_be_bytes());
        value.extend(249_400i32.to_be_bytes());
        if version == Version::V2 {
            value.push(0x01);
        }
        value.extend([0x01, 0xe2, 0x40]);
        emit_header(
            &mut value,
            RecordArrayType::SpecificConditionRecord.code(),
            SPECIFIC_CONDITION_SIZE as u16,
            0,
        );
        if version == Version::V2 {
            emit_header(
                &mut value,
                RecordArrayType::VuBorderCrossingRecord.code(),
                BORDER_CROSSING_SIZE as u16,
                0,
            );
            emit_header(
                &mut value,
                RecordArrayType::VuLoadUnloadRecord.code(),
                LOAD_UNLOAD_SIZE as u16,
                0,
            );
        }
        emit_header(&mut value, RecordArrayType::Signature.code(), 64, 1);
        value.extend(vec![0xdd; 64]);
        value
    }

    #[test]
    fn gen2_v1_round_trips() {
        let value = activities_gen2_value(Version::V1);
        let message = ActivitiesGen2::unmarshal_value(&value, Version::V1).unwrap();
        assert_eq!(Some(TimeReal(0x64b2_0000)), message.date_of_day);
        assert_eq!(1, message.gnss_ad_records.len());
        assert_eq!(None, message.gnss_ad_records[0].position_authentication);
        assert_eq!(601_700, message.gnss_ad_records[0].gnss_place.coordinates.latitude);
        assert_eq!(value, message.marshal_value());
    }

    #[test]
    fn gen2_v2_round_trips_from_semantics_alone() {
        let value = activities_gen2_value(Version::V2);
        let mut message = ActivitiesGen2::unmarshal_value(&value, Version::V2).unwrap();
        assert_eq!(Some(0x01), message.gnss_ad_records[0].position_authentication);
        message.raw_data = None;
        assert_eq!(value, message.marshal_value());
    }

    #[test]
    fn gen2_wrong_record_size_is_a_structure_mismatch() {
        let mut value = Vec::new();
        emit_header(&mut value, RecordArrayType::DateOfDayDownloaded.code(), 4, 1);
        value.extend(0x64b2_0000u32.to_be_bytes());
        emit_header(&mut value, RecordArrayType::OdometerValueMidnight.code(), 3, 1);
        value.extend([0x01, 0xe2, 0x40]);
        // VuCardIW with the confused 132 byte record size
        emit_header(&mut value, RecordArrayType::VuCardIwRecord.code(), 132, 1);
        value.extend(vec![0x00; 132]);
        let err = ActivitiesGen2::unmarshal_value(&value, Version::V1).unwrap_err();
        assert!(matches!(
            err,
            crate::error::TachoError::StructureMismatch(_)
        ));
    }
}
