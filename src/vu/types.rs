//! Primitive data types shared by every transfer, their nom field
//! parsers, and the paint canvas used on the marshal side.
//!
//! Byte order is big-endian throughout the format. Strings are fixed
//! width and prefixed by a one byte code page identifier selecting an
//! ISO-8859 variant; unused width is space padded.

use nom::{
    bytes::complete::take,
    combinator::map,
    number::complete::{be_i32, be_u32},
    sequence::tuple,
    IResult,
};

// Fixed widths, in bytes and including the code page byte where one is
// carried.
pub const NAME_SIZE: usize = 36;
pub const HOLDER_NAME_SIZE: usize = 2 * NAME_SIZE;
pub const CARD_NUMBER_SIZE: usize = 16;
pub const FULL_CARD_NUMBER_SIZE: usize = 18;
pub const FULL_CARD_NUMBER_AND_GENERATION_SIZE: usize = 19;
pub const VEHICLE_REGISTRATION_NUMBER_SIZE: usize = 14;
pub const VEHICLE_REGISTRATION_IDENTIFICATION_SIZE: usize = 15;
pub const VIN_SIZE: usize = 17;
pub const GEO_COORDINATES_SIZE: usize = 8;
pub const GNSS_PLACE_RECORD_SIZE: usize = 13;
pub const GNSS_PLACE_AUTH_RECORD_SIZE: usize = 14;

/// TimeReal: seconds since 1970-01-01T00:00:00Z, unsigned 32 bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeReal(pub u32);

/// OdometerShort: kilometres as an unsigned 24 bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OdometerShort(pub u32);

impl OdometerShort {
    /// Round down to the nearest 100 km, used by the anonymiser.
    pub fn rounded_down(self) -> OdometerShort {
        OdometerShort(self.0 / 100 * 100)
    }
}

/// Datef: a 4 byte BCD calendar date `yyyymmdd`. Carried opaque; the
/// codec never interprets the digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Datef(pub [u8; 4]);

/// A fixed width character string prefixed by its code page byte. The
/// raw bytes are retained so an unknown code page still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodePageString {
    pub code_page: u8,
    pub text: Vec<u8>,
}

impl CodePageString {
    /// Total encoded width, code page byte included.
    pub fn size(&self) -> usize {
        1 + self.text.len()
    }

    /// Replace the content with an ISO-8859-1 string, space padded to
    /// the existing width. Longer input is truncated.
    pub fn set_latin1(&mut self, value: &str) {
        let width = self.text.len();
        let mut text = vec![b' '; width];
        for (slot, byte) in text.iter_mut().zip(value.bytes()) {
            *slot = byte;
        }
        self.code_page = 0x01;
        self.text = text;
    }

    /// Lossy ISO-8859-1 reading with the padding trimmed, for display
    /// and tests.
    pub fn to_latin1(&self) -> String {
        self.text
            .iter()
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}

/// HolderName: surname and first names, one `Name` each.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HolderName {
    pub surname: CodePageString,
    pub first_names: CodePageString,
}

/// FullCardNumber: card type, issuing member state and the 16 character
/// card number proper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FullCardNumber {
    pub card_type: u8,
    pub issuing_member_state: u8,
    pub number: [u8; CARD_NUMBER_SIZE],
}

/// FullCardNumberAndGeneration: generation 2 cards also carry the card
/// generation byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FullCardNumberAndGeneration {
    pub number: FullCardNumber,
    pub generation: u8,
}

/// VehicleRegistrationIdentification: registering member state plus the
/// code-paged registration number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VehicleRegistrationIdentification {
    pub nation: u8,
    pub number: CodePageString,
}

/// GeoCoordinates: signed latitude and longitude in units of 1/10 000
/// of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeoCoordinates {
    pub latitude: i32,
    pub longitude: i32,
}

/// GNSSPlaceRecord: a timestamped, accuracy-qualified position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GnssPlaceRecord {
    pub time_stamp: TimeReal,
    pub accuracy: u8,
    pub coordinates: GeoCoordinates,
}

/// GNSSPlaceAuthRecord: version 2 adds the position authentication
/// status to the place record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GnssPlaceAuthRecord {
    pub place: GnssPlaceRecord,
    pub authentication_status: u8,
}

// ---------------------------------------------------------------------
// nom field parsers

pub fn t_u8(buffer: &[u8]) -> IResult<&[u8], u8> {
    nom::number::complete::u8(buffer)
}

pub fn t_u16(buffer: &[u8]) -> IResult<&[u8], u16> {
    nom::number::complete::be_u16(buffer)
}

pub fn t_time_real(buffer: &[u8]) -> IResult<&[u8], TimeReal> {
    map(be_u32, TimeReal)(buffer)
}

pub fn t_odometer(buffer: &[u8]) -> IResult<&[u8], OdometerShort> {
    map(take(3usize), |bytes: &[u8]| {
        OdometerShort(u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]))
    })(buffer)
}

pub fn t_datef(buffer: &[u8]) -> IResult<&[u8], Datef> {
    map(take(4usize), |bytes: &[u8]| {
        Datef([bytes[0], bytes[1], bytes[2], bytes[3]])
    })(buffer)
}

/// Parser for a code-paged string of the given total width.
pub fn t_code_page_string(total: usize) -> impl Fn(&[u8]) -> IResult<&[u8], CodePageString> {
    move |buffer| {
        map(
            tuple((t_u8, take(total - 1))),
            |(code_page, text): (u8, &[u8])| CodePageString {
                code_page,
                text: text.to_vec(),
            },
        )(buffer)
    }
}

pub fn t_name(buffer: &[u8]) -> IResult<&[u8], CodePageString> {
    t_code_page_string(NAME_SIZE)(buffer)
}

pub fn t_holder_name(buffer: &[u8]) -> IResult<&[u8], HolderName> {
    map(tuple((t_name, t_name)), |(surname, first_names)| {
        HolderName {
            surname,
            first_names,
        }
    })(buffer)
}

pub fn t_full_card_number(buffer: &[u8]) -> IResult<&[u8], FullCardNumber> {
    map(
        tuple((t_u8, t_u8, take(CARD_NUMBER_SIZE))),
        |(card_type, issuing_member_state, number): (u8, u8, &[u8])| {
            let mut fixed = [0u8; CARD_NUMBER_SIZE];
            fixed.copy_from_slice(number);
            FullCardNumber {
                card_type,
                issuing_member_state,
                number: fixed,
            }
        },
    )(buffer)
}

pub fn t_full_card_number_and_generation(
    buffer: &[u8],
) -> IResult<&[u8], FullCardNumberAndGeneration> {
    map(
        tuple((t_full_card_number, t_u8)),
        |(number, generation)| FullCardNumberAndGeneration { number, generation },
    )(buffer)
}

pub fn t_vehicle_registration(
    buffer: &[u8],
) -> IResult<&[u8], VehicleRegistrationIdentification> {
    map(
        tuple((t_u8, t_code_page_string(VEHICLE_REGISTRATION_NUMBER_SIZE))),
        |(nation, number)| VehicleRegistrationIdentification { nation, number },
    )(buffer)
}

pub fn t_geo_coordinates(buffer: &[u8]) -> IResult<&[u8], GeoCoordinates> {
    map(tuple((be_i32, be_i32)), |(latitude, longitude)| {
        GeoCoordinates {
            latitude,
            longitude,
        }
    })(buffer)
}

pub fn t_gnss_place_record(buffer: &[u8]) -> IResult<&[u8], GnssPlaceRecord> {
    map(
        tuple((t_time_real, t_u8, t_geo_coordinates)),
        |(time_stamp, accuracy, coordinates)| GnssPlaceRecord {
            time_stamp,
            accuracy,
            coordinates,
        },
    )(buffer)
}

pub fn t_gnss_place_auth_record(buffer: &[u8]) -> IResult<&[u8], GnssPlaceAuthRecord> {
    map(
        tuple((t_gnss_place_record, t_u8)),
        |(place, authentication_status)| GnssPlaceAuthRecord {
            place,
            authentication_status,
        },
    )(buffer)
}

// ---------------------------------------------------------------------
// Paint canvas

/// Mutable canvas for raw-data painting.
///
/// Seeded from the retained raw value when its length matches, a zeroed
/// buffer otherwise. Writers then overwrite exactly the spans they hold
/// decoded values for and `skip` everything they kept opaque, so
/// undecoded bytes stay identical to the original input.
#[derive(Debug)]
pub struct Canvas {
    buffer: Vec<u8>,
    position: usize,
}

impl Canvas {
    pub fn new(size: usize, raw: Option<&[u8]>) -> Canvas {
        let buffer = match raw {
            Some(raw) if raw.len() == size => raw.to_vec(),
            _ => vec![0; size],
        };
        Canvas {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Leave `count` bytes exactly as seeded.
    pub fn skip(&mut self, count: usize) {
        self.position += count;
    }

    pub fn put(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put(&value.to_be_bytes());
    }

    pub fn put_u24(&mut self, value: u32) {
        self.put(&value.to_be_bytes()[1..]);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put(&value.to_be_bytes());
    }

    pub fn put_time(&mut self, value: TimeReal) {
        self.put_u32(value.0);
    }

    pub fn put_odometer(&mut self, value: OdometerShort) {
        self.put_u24(value.0);
    }

    pub fn put_datef(&mut self, value: Datef) {
        self.put(&value.0);
    }

    pub fn put_string(&mut self, value: &CodePageString) {
        self.put_u8(value.code_page);
        self.put(&value.text);
    }

    pub fn put_holder_name(&mut self, value: &HolderName) {
        self.put_string(&value.surname);
        self.put_string(&value.first_names);
    }

    pub fn put_card(&mut self, value: &FullCardNumber) {
        self.put_u8(value.card_type);
        self.put_u8(value.issuing_member_state);
        self.put(&value.number);
    }

    pub fn put_card_and_generation(&mut self, value: &FullCardNumberAndGeneration) {
        self.put_card(&value.number);
        self.put_u8(value.generation);
    }

    pub fn put_vehicle_registration(&mut self, value: &VehicleRegistrationIdentification) {
        self.put_u8(value.nation);
        self.put_string(&value.number);
    }

    pub fn put_geo_coordinates(&mut self, value: GeoCoordinates) {
        self.put(&value.latitude.to_be_bytes());
        self.put(&value.longitude.to_be_bytes());
    }

    pub fn put_gnss_place_record(&mut self, value: GnssPlaceRecord) {
        self.put_time(value.time_stamp);
        self.put_u8(value.accuracy);
        self.put_geo_coordinates(value.coordinates);
    }

    pub fn put_gnss_place_auth_record(&mut self, value: GnssPlaceAuthRecord) {
        self.put_gnss_place_record(value.place);
        self.put_u8(value.authentication_status);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
