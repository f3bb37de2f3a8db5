//! Core channel: fan speed, temperatures and running title
//!
//! Layout (little-endian):
//! ```text
//! ┌──────────┬──────────┬──────────────┬──────────────────────┐
//! │ fan i32  │ cpu i32  │ ambient i32  │ app name [u8; 32]    │
//! └──────────┴──────────┴──────────────┴──────────────────────┘
//! ```
//! An older sender packs the three numbers as `i16`, giving a 38-byte
//! record. Both are accepted; only the 44-byte form is produced.

use heapless::String;

use crate::{truncated, utf8_prefix, FrameError};

/// Canonical core record size
pub const CORE_FRAME_LEN: usize = 44;

/// Legacy core record size (16-bit numeric fields)
pub const LEGACY_CORE_FRAME_LEN: usize = 38;

/// Size of the NUL-padded name field
pub const APP_FIELD_LEN: usize = 32;

/// Fan value meaning "not read yet"
pub const FAN_ABSENT: i32 = -1;

/// Temperature value meaning "not read yet"
pub const TEMP_ABSENT: i32 = -1000;

/// Title name; one byte of the wire field is reserved for the terminator
pub type AppName = String<{ APP_FIELD_LEN - 1 }>;

/// Decoded core record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreFrame {
    pub fan_percent: i32,
    pub cpu_temp_c: i32,
    pub ambient_temp_c: i32,
    pub app_name: AppName,
}

impl Default for CoreFrame {
    fn default() -> Self {
        Self {
            fan_percent: FAN_ABSENT,
            cpu_temp_c: TEMP_ABSENT,
            ambient_temp_c: TEMP_ABSENT,
            app_name: AppName::new(),
        }
    }
}

impl CoreFrame {
    /// Build a frame, truncating the name to the wire field
    pub fn new(fan_percent: i32, cpu_temp_c: i32, ambient_temp_c: i32, app_name: &str) -> Self {
        Self {
            fan_percent,
            cpu_temp_c,
            ambient_temp_c,
            app_name: truncated(app_name),
        }
    }

    /// Encode into the 44-byte canonical layout
    pub fn encode(&self) -> [u8; CORE_FRAME_LEN] {
        let mut out = [0u8; CORE_FRAME_LEN];
        out[0..4].copy_from_slice(&self.fan_percent.to_le_bytes());
        out[4..8].copy_from_slice(&self.cpu_temp_c.to_le_bytes());
        out[8..12].copy_from_slice(&self.ambient_temp_c.to_le_bytes());
        let name = self.app_name.as_bytes();
        out[12..12 + name.len()].copy_from_slice(name);
        out
    }

    /// Decode either record width
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        match bytes.len() {
            CORE_FRAME_LEN => {
                let word = |i: usize| i32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
                Ok(Self {
                    fan_percent: word(0),
                    cpu_temp_c: word(4),
                    ambient_temp_c: word(8),
                    app_name: decode_name(&bytes[12..]),
                })
            }
            LEGACY_CORE_FRAME_LEN => {
                let half = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]) as i32;
                Ok(Self {
                    fan_percent: half(0),
                    cpu_temp_c: half(2),
                    ambient_temp_c: half(4),
                    app_name: decode_name(&bytes[6..]),
                })
            }
            n if n < LEGACY_CORE_FRAME_LEN => Err(FrameError::TooShort),
            _ => Err(FrameError::BadLength),
        }
    }
}

fn decode_name(field: &[u8]) -> AppName {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    truncated(utf8_prefix(&field[..end]))
}
