//! Overview transfers: the certificates, vehicle identity, download
//! window, company locks and control activities. The overview is also
//! the anchor of authentication, since every other transfer in the file
//! is verified against the certificates carried here.

use nom::{
    bytes::complete::take,
    combinator::map,
    multi::count,
    sequence::tuple,
    IResult,
};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{
    array_size, paint_array, paint_opaque, raw_canvas, run_parser, split_signature, ArrayReader,
    OpaqueRecordArray,
};
use crate::vu::record_array::RecordArrayType;
use crate::vu::sizer::{
    CERTIFICATE_GEN1_SIZE, COMPANY_LOCKS_GEN1_SIZE, COMPANY_LOCKS_GEN2_SIZE,
    CONTROL_ACTIVITY_GEN1_SIZE, CONTROL_ACTIVITY_GEN2_SIZE, DOWNLOAD_ACTIVITY_GEN2_SIZE,
    OVERVIEW_GEN1_FIXED, SIGNATURE_GEN1_SIZE,
};
use crate::vu::transfer::Version;
use crate::vu::types::{
    t_full_card_number, t_full_card_number_and_generation, t_name, t_time_real, t_u8,
    t_vehicle_registration, Canvas, CodePageString, FullCardNumber, FullCardNumberAndGeneration,
    TimeReal, VehicleRegistrationIdentification, VEHICLE_REGISTRATION_IDENTIFICATION_SIZE,
    VIN_SIZE,
};

/// VuDownloadActivityData: when the last download happened and by whom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadActivityGen1 {
    pub downloading_time: TimeReal,
    pub full_card_number: FullCardNumber,
    pub company_or_workshop_name: CodePageString,
}

/// VuCompanyLocksRecord.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyLockGen1 {
    pub lock_in_time: TimeReal,
    pub lock_out_time: TimeReal,
    pub company_name: CodePageString,
    pub company_address: CodePageString,
    pub company_card_number: FullCardNumber,
}

/// VuControlActivityRecord.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlActivityGen1 {
    pub control_type: u8,
    pub control_time: TimeReal,
    pub control_card_number: FullCardNumber,
    pub download_period_begin: TimeReal,
    pub download_period_end: TimeReal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverviewGen1 {
    /// Member state certificate, 194 bytes.
    pub member_state_certificate: Vec<u8>,
    /// VU certificate, 194 bytes.
    pub vu_certificate: Vec<u8>,
    /// VehicleIdentificationNumber, 17 IA5 characters, no code page.
    pub vehicle_identification_number: Vec<u8>,
    pub vehicle_registration: VehicleRegistrationIdentification,
    pub current_date_time: TimeReal,
    pub downloadable_period_begin: TimeReal,
    pub downloadable_period_end: TimeReal,
    pub card_slots_status: u8,
    pub download_activity: DownloadActivityGen1,
    pub company_locks: Vec<CompanyLockGen1>,
    pub control_activities: Vec<ControlActivityGen1>,
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_download_activity_gen1(buffer: &[u8]) -> IResult<&[u8], DownloadActivityGen1> {
    map(
        tuple((t_time_real, t_full_card_number, t_name)),
        |(downloading_time, full_card_number, company_or_workshop_name)| DownloadActivityGen1 {
            downloading_time,
            full_card_number,
            company_or_workshop_name,
        },
    )(buffer)
}

fn t_company_lock_gen1(buffer: &[u8]) -> IResult<&[u8], CompanyLockGen1> {
    map(
        tuple((t_time_real, t_time_real, t_name, t_name, t_full_card_number)),
        |(lock_in_time, lock_out_time, company_name, company_address, company_card_number)| {
            CompanyLockGen1 {
                lock_in_time,
                lock_out_time,
                company_name,
                company_address,
                company_card_number,
            }
        },
    )(buffer)
}

fn t_control_activity_gen1(buffer: &[u8]) -> IResult<&[u8], ControlActivityGen1> {
    map(
        tuple((t_u8, t_time_real, t_full_card_number, t_time_real, t_time_real)),
        |(
            control_type,
            control_time,
            control_card_number,
            download_period_begin,
            download_period_end,
        )| ControlActivityGen1 {
            control_type,
            control_time,
            control_card_number,
            download_period_begin,
            download_period_end,
        },
    )(buffer)
}

fn parse_overview_gen1(buffer: &[u8]) -> IResult<&[u8], OverviewGen1> {
    let (buffer, member_state_certificate) =
        map(take(CERTIFICATE_GEN1_SIZE), <[u8]>::to_vec)(buffer)?;
    let (buffer, vu_certificate) = map(take(CERTIFICATE_GEN1_SIZE), <[u8]>::to_vec)(buffer)?;
    let (buffer, vehicle_identification_number) = map(take(VIN_SIZE), <[u8]>::to_vec)(buffer)?;
    let (buffer, vehicle_registration) = t_vehicle_registration(buffer)?;
    let (buffer, current_date_time) = t_time_real(buffer)?;
    let (buffer, downloadable_period_begin) = t_time_real(buffer)?;
    let (buffer, downloadable_period_end) = t_time_real(buffer)?;
    let (buffer, card_slots_status) = t_u8(buffer)?;
    let (buffer, download_activity) = t_download_activity_gen1(buffer)?;
    let (buffer, lock_count) = t_u8(buffer)?;
    let (buffer, company_locks) = count(t_company_lock_gen1, usize::from(lock_count))(buffer)?;
    let (buffer, control_count) = t_u8(buffer)?;
    let (buffer, control_activities) =
        count(t_control_activity_gen1, usize::from(control_count))(buffer)?;
    Ok((
        buffer,
        OverviewGen1 {
            member_state_certificate,
            vu_certificate,
            vehicle_identification_number,
            vehicle_registration,
            current_date_time,
            downloadable_period_begin,
            downloadable_period_end,
            card_slots_status,
            download_activity,
            company_locks,
            control_activities,
            signature: Vec::new(),
            raw_data: None,
            authentication: None,
        },
    ))
}

impl OverviewGen1 {
    pub fn unmarshal_value(value: &[u8]) -> Result<OverviewGen1> {
        let (data, signature) = split_signature(value, SIGNATURE_GEN1_SIZE)?;
        let mut message = run_parser(data, parse_overview_gen1, "Overview Gen1")?;
        message.signature = signature.to_vec();
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn data_size(&self) -> usize {
        OVERVIEW_GEN1_FIXED
            + 1
            + self.company_locks.len() * COMPANY_LOCKS_GEN1_SIZE
            + 1
            + self.control_activities.len() * CONTROL_ACTIVITY_GEN1_SIZE
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        canvas.put(&self.member_state_certificate);
        canvas.put(&self.vu_certificate);
        canvas.put(&self.vehicle_identification_number);
        canvas.put_vehicle_registration(&self.vehicle_registration);
        canvas.put_time(self.current_date_time);
        canvas.put_time(self.downloadable_period_begin);
        canvas.put_time(self.downloadable_period_end);
        canvas.put_u8(self.card_slots_status);
        paint_download_activity_gen1(&mut canvas, &self.download_activity);
        canvas.put_u8(self.company_locks.len() as u8);
        for lock in &self.company_locks {
            canvas.put_time(lock.lock_in_time);
            canvas.put_time(lock.lock_out_time);
            canvas.put_string(&lock.company_name);
            canvas.put_string(&lock.company_address);
            canvas.put_card(&lock.company_card_number);
        }
        canvas.put_u8(self.control_activities.len() as u8);
        for control in &self.control_activities {
            canvas.put_u8(control.control_type);
            canvas.put_time(control.control_time);
            canvas.put_card(&control.control_card_number);
            canvas.put_time(control.download_period_begin);
            canvas.put_time(control.download_period_end);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

fn paint_download_activity_gen1(canvas: &mut Canvas, activity: &DownloadActivityGen1) {
    canvas.put_time(activity.downloading_time);
    canvas.put_card(&activity.full_card_number);
    canvas.put_string(&activity.company_or_workshop_name);
}

// ---------------------------------------------------------------------
// Generation 2

/// VuDownloadActivityData, second generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadActivityGen2 {
    pub downloading_time: TimeReal,
    pub card_number: FullCardNumberAndGeneration,
    pub company_or_workshop_name: CodePageString,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyLockGen2 {
    pub lock_in_time: TimeReal,
    pub lock_out_time: TimeReal,
    pub company_name: CodePageString,
    pub company_address: CodePageString,
    pub company_card_number: FullCardNumberAndGeneration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlActivityGen2 {
    pub control_type: u8,
    pub control_time: TimeReal,
    pub control_card_number: FullCardNumberAndGeneration,
    pub download_period_begin: TimeReal,
    pub download_period_end: TimeReal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverviewGen2 {
    pub version: Version,
    /// Certificate record arrays, kept with their headers so an empty
    /// array round-trips with its advertised record size. The body is
    /// the certificate.
    pub member_state_certificate: OpaqueRecordArray,
    pub vu_certificate: OpaqueRecordArray,
    pub vehicle_identification_number: Option<Vec<u8>>,
    pub vehicle_registration: Option<VehicleRegistrationIdentification>,
    pub current_date_time: Option<TimeReal>,
    pub downloadable_period_begin: Option<TimeReal>,
    pub downloadable_period_end: Option<TimeReal>,
    pub card_slots_status: Option<u8>,
    pub download_activity: Option<DownloadActivityGen2>,
    pub company_locks: Vec<CompanyLockGen2>,
    pub control_activities: Vec<ControlActivityGen2>,
    /// Complete signature record array, header included.
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn t_download_activity_gen2(buffer: &[u8]) -> IResult<&[u8], DownloadActivityGen2> {
    map(
        tuple((t_time_real, t_full_card_number_and_generation, t_name)),
        |(downloading_time, card_number, company_or_workshop_name)| DownloadActivityGen2 {
            downloading_time,
            card_number,
            company_or_workshop_name,
        },
    )(buffer)
}

fn t_company_lock_gen2(buffer: &[u8]) -> IResult<&[u8], CompanyLockGen2> {
    map(
        tuple((
            t_time_real,
            t_time_real,
            t_name,
            t_name,
            t_full_card_number_and_generation,
        )),
        |(lock_in_time, lock_out_time, company_name, company_address, company_card_number)| {
            CompanyLockGen2 {
                lock_in_time,
                lock_out_time,
                company_name,
                company_address,
                company_card_number,
            }
        },
    )(buffer)
}

fn t_control_activity_gen2(buffer: &[u8]) -> IResult<&[u8], ControlActivityGen2> {
    map(
        tuple((
            t_u8,
            t_time_real,
            t_full_card_number_and_generation,
            t_time_real,
            t_time_real,
        )),
        |(
            control_type,
            control_time,
            control_card_number,
            download_period_begin,
            download_period_end,
        )| ControlActivityGen2 {
            control_type,
            control_time,
            control_card_number,
            download_period_begin,
            download_period_end,
        },
    )(buffer)
}

/// VuDownloadablePeriod record: min and max downloadable dates.
fn t_downloadable_period(buffer: &[u8]) -> IResult<&[u8], (TimeReal, TimeReal)> {
    tuple((t_time_real, t_time_real))(buffer)
}

impl OverviewGen2 {
    pub fn unmarshal_value(value: &[u8], version: Version) -> Result<OverviewGen2> {
        let mut reader = ArrayReader::new(value, "Overview Gen2");
        let member_state_certificate =
            reader.opaque(RecordArrayType::MemberStateCertificate)?;
        let vu_certificate = reader.opaque(RecordArrayType::VuCertificate)?;
        let vehicle_identification_number = reader.single(
            RecordArrayType::VehicleIdentificationNumber,
            VIN_SIZE,
            map(take(VIN_SIZE), <[u8]>::to_vec),
        )?;
        let vehicle_registration = reader.single(
            RecordArrayType::VehicleRegistrationIdentification,
            VEHICLE_REGISTRATION_IDENTIFICATION_SIZE,
            t_vehicle_registration,
        )?;
        let current_date_time =
            reader.single(RecordArrayType::CurrentDateTime, 4, t_time_real)?;
        let downloadable_period =
            reader.single(RecordArrayType::VuDownloadablePeriod, 8, t_downloadable_period)?;
        let card_slots_status = reader.single(RecordArrayType::CardSlotsStatus, 1, t_u8)?;
        let download_activity = reader.single(
            RecordArrayType::VuDownloadActivityData,
            DOWNLOAD_ACTIVITY_GEN2_SIZE,
            t_download_activity_gen2,
        )?;
        let company_locks = reader.records(
            RecordArrayType::VuCompanyLocksRecord,
            COMPANY_LOCKS_GEN2_SIZE,
            t_company_lock_gen2,
        )?;
        let control_activities = reader.records(
            RecordArrayType::VuControlActivityRecord,
            CONTROL_ACTIVITY_GEN2_SIZE,
            t_control_activity_gen2,
        )?;
        let signature = reader.signature()?;
        reader.finish()?;

        Ok(OverviewGen2 {
            version,
            member_state_certificate,
            vu_certificate,
            vehicle_identification_number,
            vehicle_registration,
            current_date_time,
            downloadable_period_begin: downloadable_period.map(|p| p.0),
            downloadable_period_end: downloadable_period.map(|p| p.1),
            card_slots_status,
            download_activity,
            company_locks,
            control_activities,
            signature,
            raw_data: Some(value.to_vec()),
            authentication: None,
        })
    }

    pub fn data_size(&self) -> usize {
        self.member_state_certificate.size()
            + self.vu_certificate.size()
            + array_size(VIN_SIZE, self.vehicle_identification_number.iter().count())
            + array_size(
                VEHICLE_REGISTRATION_IDENTIFICATION_SIZE,
                self.vehicle_registration.iter().count(),
            )
            + array_size(4, self.current_date_time.iter().count())
            + array_size(8, self.downloadable_period_begin.iter().count())
            + array_size(1, self.card_slots_status.iter().count())
            + array_size(
                DOWNLOAD_ACTIVITY_GEN2_SIZE,
                self.download_activity.iter().count(),
            )
            + array_size(COMPANY_LOCKS_GEN2_SIZE, self.company_locks.len())
            + array_size(CONTROL_ACTIVITY_GEN2_SIZE, self.control_activities.len())
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        paint_opaque(&mut canvas, &self.member_state_certificate);
        paint_opaque(&mut canvas, &self.vu_certificate);
        paint_array(
            &mut canvas,
            RecordArrayType::VehicleIdentificationNumber,
            VIN_SIZE,
            self.vehicle_identification_number.as_slice(),
            |canvas, vin| canvas.put(vin),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VehicleRegistrationIdentification,
            VEHICLE_REGISTRATION_IDENTIFICATION_SIZE,
            self.vehicle_registration.as_slice(),
            |canvas, registration| canvas.put_vehicle_registration(registration),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::CurrentDateTime,
            4,
            self.current_date_time.as_slice(),
            |canvas, time| canvas.put_time(*time),
        );
        let period: Vec<(TimeReal, TimeReal)> = self
            .downloadable_period_begin
            .iter()
            .zip(self.downloadable_period_end.iter())
            .map(|(b, e)| (*b, *e))
            .collect();
        paint_array(
            &mut canvas,
            RecordArrayType::VuDownloadablePeriod,
            8,
            &period,
            |canvas, (begin, end)| {
                canvas.put_time(*begin);
                canvas.put_time(*end);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::CardSlotsStatus,
            1,
            self.card_slots_status.as_slice(),
            |canvas, status| canvas.put_u8(*status),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuDownloadActivityData,
            DOWNLOAD_ACTIVITY_GEN2_SIZE,
            self.download_activity.as_slice(),
            |canvas, activity| {
                canvas.put_time(activity.downloading_time);
                canvas.put_card_and_generation(&activity.card_number);
                canvas.put_string(&activity.company_or_workshop_name);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuCompanyLocksRecord,
            COMPANY_LOCKS_GEN2_SIZE,
            &self.company_locks,
            |canvas, lock| {
                canvas.put_time(lock.lock_in_time);
                canvas.put_time(lock.lock_out_time);
                canvas.put_string(&lock.company_name);
                canvas.put_string(&lock.company_address);
                canvas.put_card_and_generation(&lock.company_card_number);
            },
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuControlActivityRecord,
            CONTROL_ACTIVITY_GEN2_SIZE,
            &self.control_activities,
            |canvas, control| {
                canvas.put_u8(control.control_type);
                canvas.put_time(control.control_time);
                canvas.put_card_and_generation(&control.control_card_number);
                canvas.put_time(control.download_period_begin);
                canvas.put_time(control.download_period_end);
            },
        );
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}
