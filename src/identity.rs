//! Device identity burned into flash at provisioning time.
//!
//! The record is the UID text padded with NULs to 32 bytes, followed by a
//! big-endian CRC-16/ARC over those 32 bytes.

use crc::{Crc, CRC_16_ARC};
use heapless::String;

pub const UID_SIZE: usize = 32;
pub const UID_RECORD_SIZE: usize = UID_SIZE + 2;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identity record too short: {0} bytes")]
    Truncated(usize),
    #[error("identity checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    Checksum { stored: u16, computed: u16 },
    #[error("identity is not valid UTF-8")]
    Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String<UID_SIZE>);

impl DeviceId {
    pub fn from_record(record: &[u8]) -> Result<Self, IdentityError> {
        if record.len() < UID_RECORD_SIZE {
            return Err(IdentityError::Truncated(record.len()));
        }
        let uid = &record[..UID_SIZE];
        let stored = u16::from_be_bytes([record[UID_SIZE], record[UID_SIZE + 1]]);
        let computed = checksum(uid);
        if stored != computed {
            return Err(IdentityError::Checksum { stored, computed });
        }

        let end = uid.iter().position(|&b| b == 0).unwrap_or(UID_SIZE);
        let text = core::str::from_utf8(&uid[..end]).map_err(|_| IdentityError::Encoding)?;
        let mut id = String::new();
        id.push_str(text).map_err(|_| IdentityError::Encoding)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
