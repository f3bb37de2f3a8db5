//! smbwatch wire protocol
//!
//! Every status update is a single broadcast UDP datagram. There is no
//! acknowledgement, sequencing or retransmission; receivers tolerate loss,
//! duplication and reordering.
//!
//! # Channels
//!
//! ```text
//! ┌──────────────┬───────┬──────────────────────────────────────────────┐
//! │ Channel      │ Port  │ Payload                                      │
//! ├──────────────┼───────┼──────────────────────────────────────────────┤
//! │ core         │ 50504 │ 3 × i32 LE + 32-byte app name (44 B)         │
//! │ expansion    │ 50505 │ 7 × i32 LE (28 B), or legacy `key=value;`    │
//! │ config memory│ 50506 │ ASCII `EE:` lines (RAW / HDD / labeled / ERR)│
//! │ title        │ 50506 │ ASCII `APP:<name>|TID:<hex>` from the console│
//! │ beacon       │ 50502 │ ASCII `TYPE_D_ID:<id>`                       │
//! └──────────────┴───────┴──────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod beacon;
pub mod core_frame;
pub mod eeprom;
pub mod expansion;
pub mod title;

pub use beacon::Beacon;
pub use core_frame::{AppName, CoreFrame, CORE_FRAME_LEN, LEGACY_CORE_FRAME_LEN};
pub use eeprom::{EepromFrame, EepromLine, HddKey, Labeled, IMAGE_LEN};
pub use expansion::{ExpansionFrame, ExpansionPatch, ExpansionPayload, EXPANSION_FRAME_LEN};
pub use title::TitleAnnouncement;

/// Default port for the core (fan / temperature / app) channel
pub const CORE_PORT: u16 = 50504;

/// Default port for the expansion (video / tray / revision) channel
pub const EXPANSION_PORT: u16 = 50505;

/// Default port for configuration-memory lines
pub const EEPROM_PORT: u16 = 50506;

/// Default port the console-side title script sends to
pub const TITLE_PORT: u16 = 50506;

/// Default port for the device ID beacon
pub const BEACON_PORT: u16 = 50502;

/// Errors that can occur while encoding or decoding a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Datagram shorter than any accepted layout
    TooShort,
    /// Datagram length matches no accepted layout
    BadLength,
    /// Text datagram does not start with an expected tag
    BadPrefix,
    /// Field contents could not be decoded (base64, hex, number)
    BadEncoding,
    /// Output buffer too small
    Overflow,
}

/// Longest prefix of `bytes` that is valid UTF-8
pub(crate) fn utf8_prefix(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Copy `s` into a bounded string, cutting at a char boundary when it does not fit
pub(crate) fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    // Cannot fail: `end <= N` and lies on a char boundary
    let _ = out.push_str(&s[..end]);
    out
}
