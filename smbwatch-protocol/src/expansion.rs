//! Expansion channel: tray, AV pack, firmware, revision, video mode
//!
//! The canonical record is seven little-endian `i32` in this order:
//! tray, AV pack, firmware version, console revision, width, height,
//! encoder bus address. Unknown values are `-1`.
//!
//! Older senders emit ASCII `key=value;key=value`. Those are decoded into
//! an [`ExpansionPatch`] that only carries the keys actually present.

use crate::{utf8_prefix, FrameError};

/// Canonical expansion record size
pub const EXPANSION_FRAME_LEN: usize = 28;

/// Value meaning "unknown" in every field
pub const UNKNOWN: i32 = -1;

/// Decoded binary expansion record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExpansionFrame {
    pub tray: i32,
    pub av_pack: i32,
    pub pic_version: i32,
    pub console_revision: i32,
    pub width: i32,
    pub height: i32,
    /// Bus address of the detected video encoder
    pub encoder_address: i32,
}

impl Default for ExpansionFrame {
    fn default() -> Self {
        Self {
            tray: UNKNOWN,
            av_pack: UNKNOWN,
            pic_version: UNKNOWN,
            console_revision: UNKNOWN,
            width: UNKNOWN,
            height: UNKNOWN,
            encoder_address: UNKNOWN,
        }
    }
}

impl ExpansionFrame {
    fn fields(&self) -> [i32; 7] {
        [
            self.tray,
            self.av_pack,
            self.pic_version,
            self.console_revision,
            self.width,
            self.height,
            self.encoder_address,
        ]
    }

    /// Encode into the 28-byte record
    pub fn encode(&self) -> [u8; EXPANSION_FRAME_LEN] {
        let mut out = [0u8; EXPANSION_FRAME_LEN];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.fields()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode the 28-byte record
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != EXPANSION_FRAME_LEN {
            return Err(FrameError::BadLength);
        }
        let mut v = [0i32; 7];
        for (slot, chunk) in v.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self {
            tray: v[0],
            av_pack: v[1],
            pic_version: v[2],
            console_revision: v[3],
            width: v[4],
            height: v[5],
            encoder_address: v[6],
        })
    }

    /// Overwrite the fields present in a legacy patch
    pub fn apply(&mut self, patch: &ExpansionPatch) {
        let pairs = [
            (&mut self.tray, patch.tray),
            (&mut self.av_pack, patch.av_pack),
            (&mut self.pic_version, patch.pic_version),
            (&mut self.console_revision, patch.console_revision),
            (&mut self.width, patch.width),
            (&mut self.height, patch.height),
            (&mut self.encoder_address, patch.encoder),
        ];
        for (field, value) in pairs {
            if let Some(v) = value {
                *field = v;
            }
        }
    }
}

/// Fields carried by a legacy ASCII expansion datagram
///
/// `encoder` holds whatever the sender put there: a bus address or a
/// small index, depending on the sender's age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExpansionPatch {
    pub tray: Option<i32>,
    pub av_pack: Option<i32>,
    pub pic_version: Option<i32>,
    pub console_revision: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub encoder: Option<i32>,
}

impl ExpansionPatch {
    /// Parse `key=value;key=value`
    ///
    /// Keys are case-insensitive, unknown keys and malformed values are
    /// skipped. At least one known key must parse.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut patch = Self::default();
        let mut any = false;

        for token in text.split([';', ',', '\n']) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let Some(value) = parse_number(value.trim()) else {
                continue;
            };
            let key = key.trim();
            let slot = if key.eq_ignore_ascii_case("tray") {
                &mut patch.tray
            } else if key.eq_ignore_ascii_case("av") || key.eq_ignore_ascii_case("avpack") {
                &mut patch.av_pack
            } else if key.eq_ignore_ascii_case("pic") {
                &mut patch.pic_version
            } else if key.eq_ignore_ascii_case("ver") || key.eq_ignore_ascii_case("xboxver") {
                &mut patch.console_revision
            } else if key.eq_ignore_ascii_case("w") || key.eq_ignore_ascii_case("width") {
                &mut patch.width
            } else if key.eq_ignore_ascii_case("h") || key.eq_ignore_ascii_case("height") {
                &mut patch.height
            } else if key.eq_ignore_ascii_case("enc") || key.eq_ignore_ascii_case("encoder") {
                &mut patch.encoder
            } else {
                continue;
            };
            *slot = Some(value);
            any = true;
        }

        if any {
            Ok(patch)
        } else {
            Err(FrameError::BadEncoding)
        }
    }
}

/// Decimal, or hex with a `0x` prefix
fn parse_number(s: &str) -> Option<i32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Anything that can arrive on the expansion port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExpansionPayload {
    Binary(ExpansionFrame),
    Legacy(ExpansionPatch),
}

impl ExpansionPayload {
    /// Dispatch on size: exactly 28 bytes is binary, anything else is tried as text
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() == EXPANSION_FRAME_LEN {
            return ExpansionFrame::decode(bytes).map(Self::Binary);
        }
        if bytes.is_empty() {
            return Err(FrameError::TooShort);
        }
        ExpansionPatch::parse(utf8_prefix(bytes)).map(Self::Legacy)
    }
}
