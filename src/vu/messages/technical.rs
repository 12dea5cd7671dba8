//! Technical data transfers: VU identity, the paired motion sensor and
//! the calibration history.
//!
//! The first generation layout is decoded in full. The second
//! generation arrays are structure-validated with opaque content, the
//! same treatment as the second generation events and faults.

use nom::{bytes::complete::take, combinator::map, multi::count, sequence::tuple, IResult};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{
    paint_opaque, raw_canvas, run_parser, split_signature, ArrayReader, OpaqueRecordArray,
};
use crate::vu::record_array::RecordArrayType;
use crate::vu::sizer::{
    CALIBRATION_GEN1_SIZE, SENSOR_PAIRED_GEN1_SIZE, SIGNATURE_GEN1_SIZE,
    VU_IDENTIFICATION_GEN1_SIZE,
};
use crate::vu::transfer::Version;
use crate::vu::types::{
    t_datef, t_full_card_number, t_name, t_odometer, t_time_real, t_u16, t_u8,
    t_vehicle_registration, Canvas, CodePageString, Datef, FullCardNumber, OdometerShort,
    TimeReal, VehicleRegistrationIdentification, VIN_SIZE,
};

/// VuIdentification, first generation, 116 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VuIdentificationGen1 {
    pub manufacturer_name: CodePageString,
    pub manufacturer_address: CodePageString,
    pub part_number: Vec<u8>,
    pub serial_number: Vec<u8>,
    pub software_version: Vec<u8>,
    pub software_installation_date: TimeReal,
    pub manufacturing_date: TimeReal,
    pub approval_number: Vec<u8>,
}

/// SensorPaired, first generation, 20 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorPairedGen1 {
    pub serial_number: Vec<u8>,
    pub approval_number: Vec<u8>,
    pub first_pairing_date: TimeReal,
}

/// VuCalibrationRecord, first generation, 167 bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationGen1 {
    pub purpose: u8,
    pub workshop_name: CodePageString,
    pub workshop_address: CodePageString,
    pub workshop_card_number: FullCardNumber,
    pub workshop_card_expiry_date: Datef,
    pub vehicle_identification_number: Vec<u8>,
    pub vehicle_registration: VehicleRegistrationIdentification,
    pub w_vehicle_characteristic_constant: u16,
    pub k_constant_of_recording_equipment: u16,
    pub l_tyre_circumference: u16,
    pub tyre_size: Vec<u8>,
    pub authorised_speed: u8,
    pub old_odometer: OdometerShort,
    pub new_odometer: OdometerShort,
    pub old_time: TimeReal,
    pub new_time: TimeReal,
    pub next_calibration_date: TimeReal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TechnicalDataGen1 {
    pub vu_identification: VuIdentificationGen1,
    pub sensor_paired: SensorPairedGen1,
    pub calibrations: Vec<CalibrationGen1>,
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_vu_identification_gen1(buffer: &[u8]) -> IResult<&[u8], VuIdentificationGen1> {
    map(
        tuple((
            t_name,
            t_name,
            map(take(16usize), <[u8]>::to_vec),
            map(take(8usize), <[u8]>::to_vec),
            map(take(4usize), <[u8]>::to_vec),
            t_time_real,
            t_time_real,
            map(take(8usize), <[u8]>::to_vec),
        )),
        |(
            manufacturer_name,
            manufacturer_address,
            part_number,
            serial_number,
            software_version,
            software_installation_date,
            manufacturing_date,
            approval_number,
        )| VuIdentificationGen1 {
            manufacturer_name,
            manufacturer_address,
            part_number,
            serial_number,
            software_version,
            software_installation_date,
            manufacturing_date,
            approval_number,
        },
    )(buffer)
}

fn t_sensor_paired_gen1(buffer: &[u8]) -> IResult<&[u8], SensorPairedGen1> {
    map(
        tuple((
            map(take(8usize), <[u8]>::to_vec),
            map(take(8usize), <[u8]>::to_vec),
            t_time_real,
        )),
        |(serial_number, approval_number, first_pairing_date)| SensorPairedGen1 {
            serial_number,
            approval_number,
            first_pairing_date,
        },
    )(buffer)
}

fn t_calibration_gen1(buffer: &[u8]) -> IResult<&[u8], CalibrationGen1> {
    let (buffer, purpose) = t_u8(buffer)?;
    let (buffer, workshop_name) = t_name(buffer)?;
    let (buffer, workshop_address) = t_name(buffer)?;
    let (buffer, workshop_card_number) = t_full_card_number(buffer)?;
    let (buffer, workshop_card_expiry_date) = t_datef(buffer)?;
    let (buffer, vehicle_identification_number) = map(take(VIN_SIZE), <[u8]>::to_vec)(buffer)?;
    let (buffer, vehicle_registration) = t_vehicle_registration(buffer)?;
    let (buffer, w_vehicle_characteristic_constant) = t_u16(buffer)?;
    let (buffer, k_constant_of_recording_equipment) = t_u16(buffer)?;
    let (buffer, l_tyre_circumference) = t_u16(buffer)?;
    let (buffer, tyre_size) = map(take(15usize), <[u8]>::to_vec)(buffer)?;
    let (buffer, authorised_speed) = t_u8(buffer)?;
    let (buffer, old_odometer) = t_odometer(buffer)?;
    let (buffer, new_odometer) = t_odometer(buffer)?;
    let (buffer, old_time) = t_time_real(buffer)?;
    let (buffer, new_time) = t_time_real(buffer)?;
    let (buffer, next_calibration_date) = t_time_real(buffer)?;
    Ok((
        buffer,
        CalibrationGen1 {
            purpose,
            workshop_name,
            workshop_address,
            workshop_card_number,
            workshop_card_expiry_date,
            vehicle_identification_number,
            vehicle_registration,
            w_vehicle_characteristic_constant,
            k_constant_of_recording_equipment,
            l_tyre_circumference,
            tyre_size,
            authorised_speed,
            old_odometer,
            new_odometer,
            old_time,
            new_time,
            next_calibration_date,
        },
    ))
}

fn parse_technical_gen1(buffer: &[u8]) -> IResult<&[u8], TechnicalDataGen1> {
    let (buffer, vu_identification) = t_vu_identification_gen1(buffer)?;
    let (buffer, sensor_paired) = t_sensor_paired_gen1(buffer)?;
    let (buffer, calibration_count) = t_u8(buffer)?;
    let (buffer, calibrations) =
        count(t_calibration_gen1, usize::from(calibration_count))(buffer)?;
    Ok((
        buffer,
        TechnicalDataGen1 {
            vu_identification,
            sensor_paired,
            calibrations,
            signature: Vec::new(),
            raw_data: None,
            authentication: None,
        },
    ))
}

fn paint_calibration_gen1(canvas: &mut Canvas, calibration: &CalibrationGen1) {
    canvas.put_u8(calibration.purpose);
    canvas.put_string(&calibration.workshop_name);
    canvas.put_string(&calibration.workshop_address);
    canvas.put_card(&calibration.workshop_card_number);
    canvas.put_datef(calibration.workshop_card_expiry_date);
    canvas.put(&calibration.vehicle_identification_number);
    canvas.put_vehicle_registration(&calibration.vehicle_registration);
    canvas.put_u16(calibration.w_vehicle_characteristic_constant);
    canvas.put_u16(calibration.k_constant_of_recording_equipment);
    canvas.put_u16(calibration.l_tyre_circumference);
    canvas.put(&calibration.tyre_size);
    canvas.put_u8(calibration.authorised_speed);
    canvas.put_odometer(calibration.old_odometer);
    canvas.put_odometer(calibration.new_odometer);
    canvas.put_time(calibration.old_time);
    canvas.put_time(calibration.new_time);
    canvas.put_time(calibration.next_calibration_date);
}

impl TechnicalDataGen1 {
    pub fn unmarshal_value(value: &[u8]) -> Result<TechnicalDataGen1> {
        let (data, signature) = split_signature(value, SIGNATURE_GEN1_SIZE)?;
        let mut message = run_parser(data, parse_technical_gen1, "TechnicalData Gen1")?;
        message.signature = signature.to_vec();
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn data_size(&self) -> usize {
        VU_IDENTIFICATION_GEN1_SIZE
            + SENSOR_PAIRED_GEN1_SIZE
            + 1
            + self.calibrations.len() * CALIBRATION_GEN1_SIZE
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        canvas.put_string(&self.vu_identification.manufacturer_name);
        canvas.put_string(&self.vu_identification.manufacturer_address);
        canvas.put(&self.vu_identification.part_number);
        canvas.put(&self.vu_identification.serial_number);
        canvas.put(&self.vu_identification.software_version);
        canvas.put_time(self.vu_identification.software_installation_date);
        canvas.put_time(self.vu_identification.manufacturing_date);
        canvas.put(&self.vu_identification.approval_number);
        canvas.put(&self.sensor_paired.serial_number);
        canvas.put(&self.sensor_paired.approval_number);
        canvas.put_time(self.sensor_paired.first_pairing_date);
        canvas.put_u8(self.calibrations.len() as u8);
        for calibration in &self.calibrations {
            paint_calibration_gen1(&mut canvas, calibration);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

// ---------------------------------------------------------------------
// Generation 2

#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalDataGen2 {
    pub version: Version,
    /// Every non-signature array in regulation order, content opaque.
    pub arrays: Vec<OpaqueRecordArray>,
    /// Complete signature record array, header included.
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

impl TechnicalDataGen2 {
    fn array_sequence() -> &'static [RecordArrayType] {
        use RecordArrayType::*;
        &[
            VuIdentification,
            SensorPairedRecord,
            SensorExternalGnssCoupledRecord,
            VuCalibrationRecord,
            VuCardRecord,
            VuItsConsentRecord,
            VuPowerSupplyInterruptionRecord,
        ]
    }

    pub fn unmarshal_value(value: &[u8], version: Version) -> Result<TechnicalDataGen2> {
        let mut reader = ArrayReader::new(value, "TechnicalData Gen2");
        let mut arrays = Vec::new();
        for expected in Self::array_sequence() {
            arrays.push(reader.opaque(*expected)?);
        }
        let signature = reader.signature()?;
        reader.finish()?;
        Ok(TechnicalDataGen2 {
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
