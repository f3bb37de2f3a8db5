//! Device ID beacon
//!
//! Lets a viewer on the LAN discover which kind of monitor is present.

use core::fmt::Write;

use heapless::String;

use crate::{utf8_prefix, FrameError};

/// Beacon tag preceding the numeric ID
pub const BEACON_PREFIX: &str = "TYPE_D_ID:";

/// ID this monitor announces unless configured otherwise
pub const DEFAULT_DEVICE_ID: u8 = 6;

/// Beacon datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beacon {
    pub device_id: u8,
}

impl Default for Beacon {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
        }
    }
}

impl Beacon {
    pub fn encode(&self) -> Result<String<16>, FrameError> {
        let mut out = String::new();
        write!(out, "{}{}", BEACON_PREFIX, self.device_id).map_err(|_| FrameError::Overflow)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let id = utf8_prefix(bytes)
            .trim()
            .strip_prefix(BEACON_PREFIX)
            .ok_or(FrameError::BadPrefix)?;
        let device_id = id.trim().parse().map_err(|_| FrameError::BadEncoding)?;
        Ok(Self { device_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_beacon_text() {
        assert_eq!(Beacon::default().encode().unwrap().as_str(), "TYPE_D_ID:6");
    }

    #[test]
    fn test_decode() {
        assert_eq!(Beacon::decode(b"TYPE_D_ID:12\n"), Ok(Beacon { device_id: 12 }));
        assert_eq!(Beacon::decode(b"TYPE_X_ID:1"), Err(FrameError::BadPrefix));
        assert_eq!(Beacon::decode(b"TYPE_D_ID:x"), Err(FrameError::BadEncoding));
    }
}
