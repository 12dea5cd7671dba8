//! Structure-preserving anonymisation.
//!
//! Produces a deep copy of a parsed file with every personal field
//! replaced by a deterministic test value, every signature voided, and
//! every certificate cleared, while keeping every byte offset where it
//! was: fixed width strings are rewritten in place, vectors keep their
//! lengths, and cleared buffers keep theirs. `raw_data` is dropped on
//! every rewritten message so marshalling takes the semantic path and
//! nothing personal survives in a retained buffer.
//!
//! Timestamps become `2024-01-01T00:00:00Z + i * k` hours, `i` being
//! the record index within its array and `k` a per-array stride, so
//! per-array ordering stays distinct. Odometers round down to the
//! nearest 100 km. Positions move to Helsinki.

use crate::vu::file::{VehicleUnitFile, VuFileGen1, VuFileGen2};
use crate::vu::messages::activities::{ActivitiesGen1, ActivitiesGen2};
use crate::vu::messages::events::EventsAndFaultsGen1;
use crate::vu::messages::overview::{OverviewGen1, OverviewGen2};
use crate::vu::messages::speed::{DetailedSpeedGen1, SpeedBlock};
use crate::vu::messages::technical::TechnicalDataGen1;
use crate::vu::messages::OpaqueRecordArray;
use crate::vu::record_array::RECORD_ARRAY_HEADER_SIZE;
use crate::vu::types::{
    CodePageString, Datef, FullCardNumber, FullCardNumberAndGeneration, GeoCoordinates,
    GnssPlaceAuthRecord, GnssPlaceRecord, HolderName, OdometerShort, TimeReal,
    VehicleRegistrationIdentification,
};

/// 2024-01-01T00:00:00Z, the base of every replacement timestamp.
const EPOCH: u32 = 1_704_067_200;

/// Helsinki, in 1/10 000 of a degree.
const HELSINKI: GeoCoordinates = GeoCoordinates {
    latitude: 601_700,
    longitude: 249_400,
};

const TEST_VIN: &[u8; 17] = b"TESTVIN1234567890";

// Per-array timestamp strides, in hours.
const STRIDE_DAY: u32 = 24;
const STRIDE_CARD_IW: u32 = 2;
const STRIDE_PLACE: u32 = 3;
const STRIDE_GNSS: u32 = 4;
const STRIDE_CONDITION: u32 = 5;
const STRIDE_BORDER: u32 = 6;
const STRIDE_LOAD: u32 = 7;
const STRIDE_EVENT: u32 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymizeOptions {
    /// Keep every original timestamp instead of the deterministic
    /// sequence.
    pub preserve_timestamps: bool,
    /// Keep odometer values and speed samples.
    pub preserve_distance_and_trips: bool,
}

/// Anonymise a parsed file. The input is left untouched.
pub fn anonymize(file: &VehicleUnitFile, options: &AnonymizeOptions) -> VehicleUnitFile {
    let worker = Anonymizer { options: *options };
    match file {
        VehicleUnitFile::Gen1(inner) => VehicleUnitFile::Gen1(worker.gen1(inner)),
        VehicleUnitFile::Gen2V1(inner) => VehicleUnitFile::Gen2V1(worker.gen2(inner)),
        VehicleUnitFile::Gen2V2(inner) => VehicleUnitFile::Gen2V2(worker.gen2(inner)),
    }
}

struct Anonymizer {
    options: AnonymizeOptions,
}

impl Anonymizer {
    fn time(&self, original: TimeReal, index: usize, stride_hours: u32) -> TimeReal {
        if self.options.preserve_timestamps {
            original
        } else {
            TimeReal(EPOCH + index as u32 * stride_hours * 3600)
        }
    }

    /// Second timestamp of a record, half a stride after the first.
    fn time_end(&self, original: TimeReal, index: usize, stride_hours: u32) -> TimeReal {
        if self.options.preserve_timestamps {
            original
        } else {
            TimeReal(EPOCH + index as u32 * stride_hours * 3600 + 1800)
        }
    }

    fn odometer(&self, original: OdometerShort) -> OdometerShort {
        if self.options.preserve_distance_and_trips {
            original
        } else {
            original.rounded_down()
        }
    }

    fn gen1(&self, file: &VuFileGen1) -> VuFileGen1 {
        let mut out = file.clone();
        if let Some(overview) = &mut out.overview {
            self.overview_gen1(overview);
        }
        for (day, message) in out.activities.iter_mut().enumerate() {
            self.activities_gen1(message, day);
        }
        for message in &mut out.events_and_faults {
            self.events_gen1(message);
        }
        for message in &mut out.detailed_speed {
            self.speed_gen1(message);
        }
        for message in &mut out.technical_data {
            self.technical_gen1(message);
        }
        out
    }

    fn gen2(&self, file: &VuFileGen2) -> VuFileGen2 {
        let mut out = file.clone();
        if let Some(message) = &mut out.download_interface_version {
            message.raw_data = None;
        }
        if let Some(overview) = &mut out.overview {
            self.overview_gen2(overview);
        }
        for (day, message) in out.activities.iter_mut().enumerate() {
            self.activities_gen2(message, day);
        }
        for message in &mut out.events_and_faults {
            for array in &mut message.arrays {
                clear_opaque(array);
            }
            void_gen2_signature(&mut message.signature);
            message.raw_data = None;
        }
        for message in &mut out.detailed_speed {
            self.speed_blocks(&mut message.blocks);
            void_gen2_signature(&mut message.signature);
            message.raw_data = None;
        }
        for message in &mut out.technical_data {
            for array in &mut message.arrays {
                clear_opaque(array);
            }
            void_gen2_signature(&mut message.signature);
            message.raw_data = None;
        }
        out
    }

    fn overview_gen1(&self, message: &mut OverviewGen1) {
        clear_bytes(&mut message.member_state_certificate);
        clear_bytes(&mut message.vu_certificate);
        message.vehicle_identification_number = TEST_VIN.to_vec();
        registration(&mut message.vehicle_registration);
        message.current_date_time = self.time(message.current_date_time, 0, STRIDE_DAY);
        message.downloadable_period_begin =
            self.time(message.downloadable_period_begin, 0, STRIDE_DAY);
        message.downloadable_period_end = self.time(message.downloadable_period_end, 1, STRIDE_DAY);
        message.download_activity.downloading_time =
            self.time(message.download_activity.downloading_time, 0, STRIDE_DAY);
        card(&mut message.download_activity.full_card_number);
        test_name(&mut message.download_activity.company_or_workshop_name);
        for (index, lock) in message.company_locks.iter_mut().enumerate() {
            lock.lock_in_time = self.time(lock.lock_in_time, index, STRIDE_EVENT);
            lock.lock_out_time = self.time_end(lock.lock_out_time, index, STRIDE_EVENT);
            test_name(&mut lock.company_name);
            test_name(&mut lock.company_address);
            card(&mut lock.company_card_number);
        }
        for (index, control) in message.control_activities.iter_mut().enumerate() {
            control.control_time = self.time(control.control_time, index, STRIDE_EVENT);
            control.download_period_begin =
                self.time(control.download_period_begin, index, STRIDE_EVENT);
            control.download_period_end =
                self.time_end(control.download_period_end, index, STRIDE_EVENT);
            card(&mut control.control_card_number);
        }
        message.signature = vec![0x00; message.signature.len()];
        message.raw_data = None;
    }

    fn overview_gen2(&self, message: &mut OverviewGen2) {
        clear_opaque(&mut message.member_state_certificate);
        clear_opaque(&mut message.vu_certificate);
        if let Some(vin) = &mut message.vehicle_identification_number {
            *vin = TEST_VIN.to_vec();
        }
        if let Some(identification) = &mut message.vehicle_registration {
            registration(identification);
        }
        if let Some(time) = &mut message.current_date_time {
            *time = self.time(*time, 0, STRIDE_DAY);
        }
        if let Some(time) = &mut message.downloadable_period_begin {
            *time = self.time(*time, 0, STRIDE_DAY);
        }
        if let Some(time) = &mut message.downloadable_period_end {
            *time = self.time(*time, 1, STRIDE_DAY);
        }
        if let Some(activity) = &mut message.download_activity {
            activity.downloading_time = self.time(activity.downloading_time, 0, STRIDE_DAY);
            card_and_generation(&mut activity.card_number);
            test_name(&mut activity.company_or_workshop_name);
        }
        for (index, lock) in message.company_locks.iter_mut().enumerate() {
            lock.lock_in_time = self.time(lock.lock_in_time, index, STRIDE_EVENT);
            lock.lock_out_time = self.time_end(lock.lock_out_time, index, STRIDE_EVENT);
            test_name(&mut lock.company_name);
            test_name(&mut lock.company_address);
            card_and_generation(&mut lock.company_card_number);
        }
        for (index, control) in message.control_activities.iter_mut().enumerate() {
            control.control_time = self.time(control.control_time, index, STRIDE_EVENT);
            control.download_period_begin =
                self.time(control.download_period_begin, index, STRIDE_EVENT);
            control.download_period_end =
                self.time_end(control.download_period_end, index, STRIDE_EVENT);
            card_and_generation(&mut control.control_card_number);
        }
        void_gen2_signature(&mut message.signature);
        message.raw_data = None;
    }

    fn activities_gen1(&self, message: &mut ActivitiesGen1, day: usize) {
        message.date_of_day = self.time(message.date_of_day, day, STRIDE_DAY);
        message.odometer_midnight = self.odometer(message.odometer_midnight);
        for (index, record) in message.card_iw_records.iter_mut().enumerate() {
            holder(&mut record.holder_name);
            card(&mut record.full_card_number);
            record.card_expiry_date = test_expiry();
            record.insertion_time = self.time(record.insertion_time, index, STRIDE_CARD_IW);
            record.withdrawal_time = self.time_end(record.withdrawal_time, index, STRIDE_CARD_IW);
            record.odometer_at_insertion = self.odometer(record.odometer_at_insertion);
            record.odometer_at_withdrawal = self.odometer(record.odometer_at_withdrawal);
            registration(&mut record.previous_vehicle.registration);
            record.previous_vehicle.withdrawal_time =
                self.time(record.previous_vehicle.withdrawal_time, index, STRIDE_CARD_IW);
        }
        for (index, place) in message.places.iter_mut().enumerate() {
            card(&mut place.full_card_number);
            place.entry_time = self.time(place.entry_time, index, STRIDE_PLACE);
            place.odometer = self.odometer(place.odometer);
        }
        for (index, condition) in message.specific_conditions.iter_mut().enumerate() {
            condition.entry_time = self.time(condition.entry_time, index, STRIDE_CONDITION);
        }
        message.signature = vec![0x00; message.signature.len()];
        message.raw_data = None;
    }

    fn activities_gen2(&self, message: &mut ActivitiesGen2, day: usize) {
        if let Some(time) = &mut message.date_of_day {
            *time = self.time(*time, day, STRIDE_DAY);
        }
        if let Some(odometer) = &mut message.odometer_midnight {
            *odometer = self.odometer(*odometer);
        }
        for (index, record) in message.card_iw_records.iter_mut().enumerate() {
            holder(&mut record.holder_name);
            card_and_generation(&mut record.card_number);
            record.card_expiry_date = test_expiry();
            record.insertion_time = self.time(record.insertion_time, index, STRIDE_CARD_IW);
            record.withdrawal_time = self.time_end(record.withdrawal_time, index, STRIDE_CARD_IW);
            record.odometer_at_insertion = self.odometer(record.odometer_at_insertion);
            record.odometer_at_withdrawal = self.odometer(record.odometer_at_withdrawal);
            registration(&mut record.previous_vehicle.registration);
            record.previous_vehicle.withdrawal_time =
                self.time(record.previous_vehicle.withdrawal_time, index, STRIDE_CARD_IW);
        }
        for (index, place) in message.places.iter_mut().enumerate() {
            card_and_generation(&mut place.card_number);
            place.entry_time = self.time(place.entry_time, index, STRIDE_PLACE);
            place.odometer = self.odometer(place.odometer);
            self.gnss(&mut place.gnss_place, index, STRIDE_PLACE);
        }
        for (index, record) in message.gnss_ad_records.iter_mut().enumerate() {
            record.time_stamp = self.time(record.time_stamp, index, STRIDE_GNSS);
            card_and_generation(&mut record.driver_card);
            card_and_generation(&mut record.codriver_card);
            self.gnss(&mut record.gnss_place, index, STRIDE_GNSS);
            record.odometer = self.odometer(record.odometer);
        }
        for (index, condition) in message.specific_conditions.iter_mut().enumerate() {
            condition.entry_time = self.time(condition.entry_time, index, STRIDE_CONDITION);
        }
        for (index, crossing) in message.border_crossings.iter_mut().enumerate() {
            card_and_generation(&mut crossing.driver_card);
            card_and_generation(&mut crossing.codriver_card);
            self.gnss_auth(&mut crossing.gnss_place, index, STRIDE_BORDER);
            crossing.odometer = self.odometer(crossing.odometer);
        }
        for (index, operation) in message.load_unload_operations.iter_mut().enumerate() {
            operation.time_stamp = self.time(operation.time_stamp, index, STRIDE_LOAD);
            card_and_generation(&mut operation.driver_card);
            card_and_generation(&mut operation.codriver_card);
            self.gnss_auth(&mut operation.gnss_place, index, STRIDE_LOAD);
            operation.odometer = self.odometer(operation.odometer);
        }
        void_gen2_signature(&mut message.signature);
        message.raw_data = None;
    }

    fn events_gen1(&self, message: &mut EventsAndFaultsGen1) {
        for (index, fault) in message.faults.iter_mut().enumerate() {
            fault.begin_time = self.time(fault.begin_time, index, STRIDE_EVENT);
            fault.end_time = self.time_end(fault.end_time, index, STRIDE_EVENT);
            card(&mut fault.card_driver_slot_begin);
            card(&mut fault.card_codriver_slot_begin);
            card(&mut fault.card_driver_slot_end);
            card(&mut fault.card_codriver_slot_end);
        }
        for (index, event) in message.events.iter_mut().enumerate() {
            event.begin_time = self.time(event.begin_time, index, STRIDE_EVENT);
            event.end_time = self.time_end(event.end_time, index, STRIDE_EVENT);
            card(&mut event.card_driver_slot_begin);
            card(&mut event.card_codriver_slot_begin);
            card(&mut event.card_driver_slot_end);
            card(&mut event.card_codriver_slot_end);
        }
        message.overspeed_control.last_overspeed_control_time =
            self.time(message.overspeed_control.last_overspeed_control_time, 0, STRIDE_EVENT);
        message.overspeed_control.first_overspeed_since =
            self.time(message.overspeed_control.first_overspeed_since, 0, STRIDE_EVENT);
        for (index, event) in message.overspeed_events.iter_mut().enumerate() {
            event.begin_time = self.time(event.begin_time, index, STRIDE_EVENT);
            event.end_time = self.time_end(event.end_time, index, STRIDE_EVENT);
            card(&mut event.card_driver_slot_begin);
        }
        for (index, adjustment) in message.time_adjustments.iter_mut().enumerate() {
            adjustment.old_time = self.time(adjustment.old_time, index, STRIDE_EVENT);
            adjustment.new_time = self.time_end(adjustment.new_time, index, STRIDE_EVENT);
            test_name(&mut adjustment.workshop_name);
            test_name(&mut adjustment.workshop_address);
            card(&mut adjustment.workshop_card_number);
        }
        message.signature = vec![0x00; message.signature.len()];
        message.raw_data = None;
    }

    fn speed_gen1(&self, message: &mut DetailedSpeedGen1) {
        self.speed_blocks(&mut message.blocks);
        message.signature = vec![0x00; message.signature.len()];
        message.raw_data = None;
    }

    fn speed_blocks(&self, blocks: &mut [SpeedBlock]) {
        for (index, block) in blocks.iter_mut().enumerate() {
            if !self.options.preserve_timestamps {
                // One block per minute of driving.
                block.begin_time = TimeReal(EPOCH + index as u32 * 60);
            }
            if !self.options.preserve_distance_and_trips {
                block.speeds = [0; 60];
            }
        }
    }

    fn technical_gen1(&self, message: &mut TechnicalDataGen1) {
        clear_bytes(&mut message.vu_identification.serial_number);
        clear_bytes(&mut message.sensor_paired.serial_number);
        message.sensor_paired.first_pairing_date =
            self.time(message.sensor_paired.first_pairing_date, 0, STRIDE_DAY);
        for (index, calibration) in message.calibrations.iter_mut().enumerate() {
            test_name(&mut calibration.workshop_name);
            test_name(&mut calibration.workshop_address);
            card(&mut calibration.workshop_card_number);
            calibration.workshop_card_expiry_date = test_expiry();
            calibration.vehicle_identification_number = TEST_VIN.to_vec();
            registration(&mut calibration.vehicle_registration);
            calibration.old_odometer = self.odometer(calibration.old_odometer);
            calibration.new_odometer = self.odometer(calibration.new_odometer);
            calibration.old_time = self.time(calibration.old_time, index, STRIDE_EVENT);
            calibration.new_time = self.time_end(calibration.new_time, index, STRIDE_EVENT);
            calibration.next_calibration_date =
                self.time(calibration.next_calibration_date, index + 1, STRIDE_DAY);
        }
        message.signature = vec![0x00; message.signature.len()];
        message.raw_data = None;
    }

    fn gnss(&self, place: &mut GnssPlaceRecord, index: usize, stride: u32) {
        place.time_stamp = self.time(place.time_stamp, index, stride);
        place.coordinates = HELSINKI;
    }

    fn gnss_auth(&self, place: &mut GnssPlaceAuthRecord, index: usize, stride: u32) {
        self.gnss(&mut place.place, index, stride);
    }
}

fn holder(name: &mut HolderName) {
    name.surname.set_latin1("TEST");
    name.first_names.set_latin1("DRIVER");
}

fn test_name(name: &mut CodePageString) {
    name.set_latin1("TEST");
}

fn card(number: &mut FullCardNumber) {
    *number = FullCardNumber::default();
}

fn card_and_generation(number: &mut FullCardNumberAndGeneration) {
    *number = FullCardNumberAndGeneration::default();
}

fn registration(identification: &mut VehicleRegistrationIdentification) {
    identification.number.set_latin1("TEST123");
}

fn test_expiry() -> Datef {
    Datef([0x20, 0x24, 0x01, 0x01])
}

fn clear_bytes(bytes: &mut [u8]) {
    bytes.fill(0x00);
}

fn clear_opaque(array: &mut OpaqueRecordArray) {
    array.body.fill(0x00);
}

/// Void a generation 2 signature array: the header keeps the layout,
/// the body is emptied of its value.
fn void_gen2_signature(signature: &mut [u8]) {
    if signature.len() > RECORD_ARRAY_HEADER_SIZE {
        signature[RECORD_ARRAY_HEADER_SIZE..].fill(0x00);
    }
}
