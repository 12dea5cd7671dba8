//! Detailed speed transfers: per-minute speed blocks of 60 one second
//! samples each.

use nom::{bytes::complete::take, combinator::map, multi::count, sequence::tuple, IResult};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{
    array_size, paint_array, raw_canvas, run_parser, split_signature, ArrayReader,
};
use crate::vu::record_array::RecordArrayType;
use crate::vu::sizer::{SIGNATURE_GEN1_SIZE, SPEED_BLOCK_SIZE};
use crate::vu::types::{t_time_real, t_u16, Canvas, TimeReal};

/// VuDetailedSpeedBlock: one minute of speed, km/h per second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedBlock {
    pub begin_time: TimeReal,
    pub speeds: [u8; 60],
}

impl Default for SpeedBlock {
    fn default() -> SpeedBlock {
        SpeedBlock {
            begin_time: TimeReal::default(),
            speeds: [0; 60],
        }
    }
}

fn t_speed_block(buffer: &[u8]) -> IResult<&[u8], SpeedBlock> {
    map(
        tuple((t_time_real, take(60usize))),
        |(begin_time, samples): (TimeReal, &[u8])| {
            let mut speeds = [0u8; 60];
            speeds.copy_from_slice(samples);
            SpeedBlock { begin_time, speeds }
        },
    )(buffer)
}

fn paint_speed_block(canvas: &mut Canvas, block: &SpeedBlock) {
    canvas.put_time(block.begin_time);
    canvas.put(&block.speeds);
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedSpeedGen1 {
    pub blocks: Vec<SpeedBlock>,
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

fn parse_speed_gen1(buffer: &[u8]) -> IResult<&[u8], DetailedSpeedGen1> {
    let (buffer, block_count) = t_u16(buffer)?;
    let (buffer, blocks) = count(t_speed_block, usize::from(block_count))(buffer)?;
    Ok((
        buffer,
        DetailedSpeedGen1 {
            blocks,
            signature: Vec::new(),
            raw_data: None,
            authentication: None,
        },
    ))
}

impl DetailedSpeedGen1 {
    pub fn unmarshal_value(value: &[u8]) -> Result<DetailedSpeedGen1> {
        let (data, signature) = split_signature(value, SIGNATURE_GEN1_SIZE)?;
        let mut message = run_parser(data, parse_speed_gen1, "DetailedSpeed Gen1")?;
        message.signature = signature.to_vec();
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn data_size(&self) -> usize {
        2 + self.blocks.len() * SPEED_BLOCK_SIZE
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        canvas.put_u16(self.blocks.len() as u16);
        for block in &self.blocks {
            paint_speed_block(&mut canvas, block);
        }
        let mut out = canvas.into_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedSpeedGen2 {
    pub blocks: Vec<SpeedBlock>,
    /// Complete signature record array, header included.
    pub signature: Vec<u8>,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

impl DetailedSpeedGen2 {
    pub fn unmarshal_value(value: &[u8]) -> Result<DetailedSpeedGen2> {
        let mut reader = ArrayReader::new(value, "DetailedSpeed Gen2");
        let blocks = reader.records(
            RecordArrayType::VuDetailedSpeedBlock,
            SPEED_BLOCK_SIZE,
            t_speed_block,
        )?;
        let signature = reader.signature()?;
        reader.finish()?;
        Ok(DetailedSpeedGen2 {
            blocks,
            signature,
            raw_data: Some(value.to_vec()),
            authentication: None,
        })
    }

    pub fn data_size(&self) -> usize {
        array_size(SPEED_BLOCK_SIZE, self.blocks.len())
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(
            self.raw_data.as_deref(),
            self.data_size(),
            self.signature.len(),
        );
        paint_array(
            &mut canvas,
            RecordArrayType::VuDetailedSpeedBlock,
            SPEED_BLOCK_SIZE,
            &self.blocks,
            |canvas, block| paint_speed_block(canvas, block),
        );
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

    fn block_bytes(start: u32, base_speed: u8) -> Vec<u8> {
        let mut out = start.to_be_bytes().to_vec();
        out.extend((0..60).map(|i| base_speed.wrapping_add(i)));
        out
    }

    #[test]
    fn gen1_round_trips_with_and_without_raw_data() {
        let mut value = vec![0x00, 0x02];
        value.extend(block_bytes(0x64b2_0000, 40));
        value.extend(block_bytes(0x64b2_003c, 60));
        value.extend(vec![0xcc; SIGNATURE_GEN1_SIZE]);

        let message = DetailedSpeedGen1::unmarshal_value(&value).unwrap();
        assert_eq!(2, message.blocks.len());
        assert_eq!(40, message.blocks[0].speeds[0]);
        assert_eq!(value, message.marshal_value());

        let mut semantic = message.clone();
        semantic.raw_data = None;
        assert_eq!(value, semantic.marshal_value());
    }

    #[test]
    fn gen2_round_trips() {
        let mut value = Vec::new();
        emit_header(
            &mut value,
            RecordArrayType::VuDetailedSpeedBlock.code(),
            SPEED_BLOCK_SIZE as u16,
            1,
        );
        value.extend(block_bytes(0x64b2_0000, 85));
        emit_header(&mut value, RecordArrayType::Signature.code(), 64, 1);
        value.extend(vec![0xdd; 64]);

        let message = DetailedSpeedGen2::unmarshal_value(&value).unwrap();
        assert_eq!(1, message.blocks.len());
        assert_eq!(value, message.marshal_value());
    }

    #[test]
    fn gen1_empty_block_list_is_valid() {
        let mut value = vec![0x00, 0x00];
        value.extend(vec![0x00; SIGNATURE_GEN1_SIZE]);
        let message = DetailedSpeedGen1::unmarshal_value(&value).unwrap();
        assert!(message.blocks.is_empty());
        assert_eq!(value, message.marshal_value());
    }
}
