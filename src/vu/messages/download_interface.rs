//! Download interface version, the two byte transfer that opens every
//! generation 2 version 2 download. It carries no signature.

use nom::{combinator::map, sequence::tuple, IResult};

use crate::error::Result;
use crate::vu::auth::Authentication;
use crate::vu::messages::{raw_canvas, run_parser};
use crate::vu::types::t_u8;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadInterfaceVersion {
    pub generation: u8,
    pub version: u8,
    pub raw_data: Option<Vec<u8>>,
    pub authentication: Option<Authentication>,
}

pub const DOWNLOAD_INTERFACE_VERSION_SIZE: usize = 2;

fn parse_value(buffer: &[u8]) -> IResult<&[u8], DownloadInterfaceVersion> {
    map(tuple((t_u8, t_u8)), |(generation, version)| {
        DownloadInterfaceVersion {
            generation,
            version,
            raw_data: None,
            authentication: None,
        }
    })(buffer)
}

impl DownloadInterfaceVersion {
    pub fn unmarshal_value(value: &[u8]) -> Result<DownloadInterfaceVersion> {
        let mut message = run_parser(value, parse_value, "DownloadInterfaceVersion")?;
        message.raw_data = Some(value.to_vec());
        Ok(message)
    }

    pub fn marshal_value(&self) -> Vec<u8> {
        let mut canvas = raw_canvas(self.raw_data.as_deref(), DOWNLOAD_INTERFACE_VERSION_SIZE, 0);
        canvas.put_u8(self.generation);
        canvas.put_u8(self.version);
        canvas.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips() {
        let value = [0x02, 0x02];
        let message = DownloadInterfaceVersion::unmarshal_value(&value).unwrap();
        assert_eq!(0x02, message.generation);
        assert_eq!(0x02, message.version);
        assert_eq!(value.to_vec(), message.marshal_value());
    }

    #[test]
    fn rejects_oversized_value() {
        assert!(DownloadInterfaceVersion::unmarshal_value(&[0x02, 0x02, 0x00]).is_err());
    }
}
