// ICE! header layout: magic, big-endian packed size (header included), big-endian depacked size.
use crate::core::error::{Error, ErrorKind};

pub const ICE_MAGIC: [u8; 4] = *b"ICE!";
/// Magic written by pre-2.3 ICE packers.
pub const ICE_MAGIC_LEGACY: [u8; 4] = *b"Ice!";
pub const ICE_HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IceHeader {
    pub packed_size: u32,
    pub depacked_size: u32,
}

impl IceHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < ICE_HEADER_LEN {
            return Err(Error::new(ErrorKind::InvalidHeader).with_message(format!(
                "input is {} bytes, shorter than the {ICE_HEADER_LEN}-byte ICE header",
                bytes.len()
            )));
        }
        let magic = &bytes[0..4];
        if magic != ICE_MAGIC && magic != ICE_MAGIC_LEGACY {
            return Err(Error::new(ErrorKind::InvalidHeader).with_message("missing ICE! magic"));
        }
        let packed_size = read_u32_be(&bytes[4..8]);
        if (packed_size as usize) < ICE_HEADER_LEN {
            return Err(Error::new(ErrorKind::InvalidHeader)
                .with_message(format!("packed size {packed_size} is smaller than the header")));
        }
        Ok(Self {
            packed_size,
            depacked_size: read_u32_be(&bytes[8..12]),
        })
    }

    /// Header-only stream describing empty input.
    pub fn empty() -> [u8; ICE_HEADER_LEN] {
        let mut out = [0u8; ICE_HEADER_LEN];
        out[0..4].copy_from_slice(&ICE_MAGIC);
        out[4..8].copy_from_slice(&(ICE_HEADER_LEN as u32).to_be_bytes());
        out
    }
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}
