//! Per-transfer codecs.
//!
//! Every transfer type has an `unmarshal_value`/`marshal_value` pair
//! obeying three contracts: the unmarshaller consumes its input exactly,
//! the trailing signature is kept verbatim and re-emitted, and each
//! message retains the original value as `raw_data` for painting. On
//! marshal the codec seeds a canvas from `raw_data` (zeroes when absent
//! or cleared) and overwrites exactly the spans it holds decoded values
//! for, so partial semantic coverage still round-trips byte for byte.

pub mod activities;
pub mod download_interface;
pub mod events;
pub mod overview;
pub mod speed;
pub mod technical;

use nom::IResult;

use crate::error::{Result, TachoError};
use crate::vu::record_array::{
    emit_header, header_at, RecordArrayHeader, RecordArrayType, RECORD_ARRAY_HEADER_SIZE,
};
use crate::vu::types::Canvas;

/// Run a nom parser over the complete buffer, requiring full
/// consumption.
pub(crate) fn run_parser<'a, T>(
    buffer: &'a [u8],
    mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
    what: &str,
) -> Result<T> {
    match parser(buffer) {
        Ok((rest, value)) if rest.is_empty() => Ok(value),
        Ok((rest, _)) => Err(TachoError::StructureMismatch(format!(
            "{what}: {} byte(s) left over after parsing",
            rest.len()
        ))),
        Err(nom::Err::Incomplete(_)) => Err(TachoError::InsufficientData {
            offset: buffer.len(),
            needed: 1,
            available: 0,
        }),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(TachoError::StructureMismatch(format!(
                "{what}: parse failed at offset {}",
                buffer.len() - e.input.len()
            )))
        }
    }
}

/// Split a value into data and signature portions, as recorded by the
/// sizer during the first pass.
pub(crate) fn split_signature(value: &[u8], signature_size: usize) -> Result<(&[u8], &[u8])> {
    if signature_size > value.len() {
        return Err(TachoError::StructureMismatch(format!(
            "signature of {signature_size} bytes on a {} byte value",
            value.len()
        )));
    }
    Ok(value.split_at(value.len() - signature_size))
}

/// Seed a paint canvas for the data portion of a message. The retained
/// raw value (data plus signature) is used when its length matches the
/// expected layout; otherwise the canvas starts zero-filled and every
/// undecoded span marshals as zeroes.
pub(crate) fn raw_canvas(
    raw_data: Option<&[u8]>,
    data_size: usize,
    signature_size: usize,
) -> Canvas {
    let seed = raw_data.and_then(|raw| {
        (raw.len() == data_size + signature_size).then(|| &raw[..data_size])
    });
    Canvas::new(data_size, seed)
}

/// One record array kept structural: the header is validated against
/// the expected type sequence but the record content stays opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueRecordArray {
    pub record_type: u8,
    pub record_size: u16,
    pub no_of_records: u16,
    pub body: Vec<u8>,
}

impl OpaqueRecordArray {
    pub fn size(&self) -> usize {
        RECORD_ARRAY_HEADER_SIZE + self.body.len()
    }
}

/// Cursor over the record array sequence of a generation 2 value.
pub(crate) struct ArrayReader<'a> {
    data: &'a [u8],
    offset: usize,
    what: &'static str,
}

impl<'a> ArrayReader<'a> {
    pub(crate) fn new(data: &'a [u8], what: &'static str) -> ArrayReader<'a> {
        ArrayReader {
            data,
            offset: 0,
            what,
        }
    }

    fn header(&mut self, expected: RecordArrayType) -> Result<(RecordArrayHeader, &'a [u8])> {
        let header = header_at(self.data, self.offset)?;
        header.expect_type(expected)?;
        let body_end = self.offset + RECORD_ARRAY_HEADER_SIZE + header.body_size();
        TachoError::check_len(self.data, self.offset + RECORD_ARRAY_HEADER_SIZE, header.body_size())?;
        let body = &self.data[self.offset + RECORD_ARRAY_HEADER_SIZE..body_end];
        self.offset = body_end;
        Ok((header, body))
    }

    /// A run of fixed-size records, each decoded with `parse`.
    pub(crate) fn records<T>(
        &mut self,
        expected: RecordArrayType,
        record_size: usize,
        mut parse: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
    ) -> Result<Vec<T>> {
        let (header, body) = self.header(expected)?;
        header.expect_record_size(record_size)?;
        let mut records = Vec::with_capacity(usize::from(header.no_of_records));
        for chunk in body.chunks_exact(record_size) {
            records.push(run_parser(chunk, &mut parse, self.what)?);
        }
        Ok(records)
    }

    /// An array the regulation populates with at most one record.
    pub(crate) fn single<T>(
        &mut self,
        expected: RecordArrayType,
        record_size: usize,
        parse: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
    ) -> Result<Option<T>> {
        let mut records = self.records(expected, record_size, parse)?;
        if records.len() > 1 {
            return Err(TachoError::StructureMismatch(format!(
                "{}: {expected:?} array holds {} records, at most one expected",
                self.what,
                records.len()
            )));
        }
        Ok(records.pop())
    }

    /// Keep an array opaque: validate its position, copy the body.
    pub(crate) fn opaque(&mut self, expected: RecordArrayType) -> Result<OpaqueRecordArray> {
        let (header, body) = self.header(expected)?;
        Ok(OpaqueRecordArray {
            record_type: header.record_type,
            record_size: header.record_size,
            no_of_records: header.no_of_records,
            body: body.to_vec(),
        })
    }

    /// The trailing signature array, kept verbatim with its header.
    pub(crate) fn signature(&mut self) -> Result<Vec<u8>> {
        let start = self.offset;
        let (_, _) = self.header(RecordArrayType::Signature)?;
        Ok(self.data[start..self.offset].to_vec())
    }

    /// Full-buffer consumption check.
    pub(crate) fn finish(self) -> Result<()> {
        if self.offset != self.data.len() {
            return Err(TachoError::StructureMismatch(format!(
                "{}: {} byte(s) left over after parsing",
                self.what,
                self.data.len() - self.offset
            )));
        }
        Ok(())
    }
}

/// Paint a record array: header plus one fixed-size record per item.
pub(crate) fn paint_array<T>(
    canvas: &mut Canvas,
    record_type: RecordArrayType,
    record_size: usize,
    items: &[T],
    mut put: impl FnMut(&mut Canvas, &T),
) {
    let mut header = Vec::with_capacity(RECORD_ARRAY_HEADER_SIZE);
    emit_header(
        &mut header,
        record_type.code(),
        record_size as u16,
        items.len() as u16,
    );
    canvas.put(&header);
    for item in items {
        let before = canvas.position();
        put(canvas, item);
        debug_assert_eq!(record_size, canvas.position() - before);
    }
}

/// Paint an opaque array back out unchanged.
pub(crate) fn paint_opaque(canvas: &mut Canvas, array: &OpaqueRecordArray) {
    let mut header = Vec::with_capacity(RECORD_ARRAY_HEADER_SIZE);
    emit_header(
        &mut header,
        array.record_type,
        array.record_size,
        array.no_of_records,
    );
    canvas.put(&header);
    canvas.put(&array.body);
}

/// Encoded size of an array of fixed-size records.
pub(crate) fn array_size(record_size: usize, count: usize) -> usize {
    RECORD_ARRAY_HEADER_SIZE + record_size * count
}
