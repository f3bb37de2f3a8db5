//! Human-readable labels for the aggregate status
//!
//! The encoder probes do not agree on exact active-area counts, so
//! resolutions are matched against tolerance bands rather than exact
//! sizes.

use core::fmt::Write;

use heapless::String;

/// Short display label
pub type Label = String<24>;

fn label(s: &str) -> Label {
    let mut out = Label::new();
    // every fixed label fits
    let _ = out.push_str(s);
    out
}

/// Connected AV pack, decoded from the controller's state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvPack {
    Scart,
    Hdtv,
    Vga,
    Rfu,
    Advanced,
    Undefined,
    Standard,
    Disconnected,
    /// No known encoding
    Other(u8),
}

impl AvPack {
    /// Primary table, then the even-nibble fallback some controllers use
    pub fn from_state(state: u8) -> Self {
        match state {
            0x00 => AvPack::Scart,
            0x01 => AvPack::Hdtv,
            0x02 => AvPack::Vga,
            0x03 => AvPack::Rfu,
            0x04 => AvPack::Advanced,
            0x05 => AvPack::Undefined,
            0x06 => AvPack::Standard,
            0x07 => AvPack::Disconnected,
            v => match v & 0x0E {
                0x00 => AvPack::Disconnected,
                0x02 => AvPack::Standard,
                0x06 => AvPack::Advanced,
                0x0A => AvPack::Hdtv,
                0x0E => AvPack::Scart,
                _ => AvPack::Other(v),
            },
        }
    }

    /// `None` for the wire's "unknown" value
    pub fn from_wire(value: i32) -> Option<Self> {
        u8::try_from(value).ok().map(Self::from_state)
    }

    pub fn name(self) -> Label {
        match self {
            AvPack::Scart => label("SCART"),
            AvPack::Hdtv => label("HDTV (Component)"),
            AvPack::Vga => label("VGA"),
            AvPack::Rfu => label("RFU"),
            AvPack::Advanced => label("Advanced (S-Video)"),
            AvPack::Undefined => label("Undefined"),
            AvPack::Standard => label("Standard (Composite)"),
            AvPack::Disconnected => label("Disconnected"),
            AvPack::Other(v) => {
                let mut out = Label::new();
                let _ = write!(out, "0x{:02X}", v);
                out
            }
        }
    }
}

/// Encoder name from its bus address, or from the small index older senders used
pub fn encoder_name(encoder: i32) -> Label {
    match encoder {
        0x45 | 0 => label("Conexant"),
        0x6A | 1 => label("Focus"),
        0x70 | 2 => label("Xcalibur"),
        other => {
            let mut out = Label::new();
            let _ = write!(out, "0x{:02X}", other & 0xFF);
            out
        }
    }
}

/// Within `dw` / `dh` of `w`×`h`
fn near(width: i32, height: i32, w: i32, h: i32, dw: i32, dh: i32) -> bool {
    (width - w).abs() <= dw && (height - h).abs() <= dh
}

/// Nominal mode name for a reported active size
///
/// SD sizes are reported progressive only with an HDTV pack connected.
pub fn resolution_label(width: i32, height: i32, av_pack: Option<AvPack>) -> Label {
    if width <= 0 || height <= 0 {
        return label("Unknown");
    }
    let hdtv = av_pack == Some(AvPack::Hdtv);
    if near(width, height, 1280, 720, 32, 8) {
        label("720p")
    } else if near(width, height, 1920, 1080, 64, 16) {
        label("1080i")
    } else if near(width, height, 720, 480, 16, 8) {
        label(if hdtv { "480p" } else { "480i" })
    } else if near(width, height, 720, 576, 16, 8) {
        label(if hdtv { "576p" } else { "576i" })
    } else {
        let mut out = Label::new();
        let _ = write!(out, "{}x{}", width, height);
        out
    }
}

/// Board revision from the manufacturing code in the serial number
///
/// Uses the final five digits of the last run of at least five
/// (`Y WW FF`: year digit, week, factory).
pub fn revision_from_serial(serial: &str) -> Option<&'static str> {
    let bytes = serial.trim().as_bytes();
    let start = bytes
        .windows(5)
        .rposition(|w| w.iter().all(u8::is_ascii_digit))?;
    let d = |i: usize| i32::from(bytes[start + i] - b'0');
    let year = d(0);
    let week = d(1) * 10 + d(2);
    let factory = d(3) * 10 + d(4);

    match (factory, year) {
        (3, _) => Some("1.0 (03)"),
        (2, 2) if week < 45 => Some("1.0 (02)"),
        (2, _) => Some("1.1 (02)"),
        (_, 2) if week >= 50 => Some("1.2"),
        (_, 2) => Some("1.1"),
        (_, 3) if week <= 10 => Some("1.2"),
        (_, 3) if week <= 20 => Some("1.3"),
        (_, 3) if week >= 31 => Some("1.4"),
        (_, 3) => Some("1.3"),
        (_, 4) if week <= 12 => Some("1.4"),
        (_, 4) if week >= 38 => Some("1.6b"),
        (_, 4) => Some("1.6"),
        (_, y) if y >= 5 => Some("1.6b"),
        _ => None,
    }
}

/// Revision range implied by the fitted encoder
pub fn revision_from_encoder(encoder: i32) -> &'static str {
    match encoder {
        0x45 | 0 => "1.0-1.3",
        0x6A | 1 => "1.4",
        0x70 | 2 => "1.6/1.6b",
        _ => "Unknown",
    }
}

/// Serial-based revision, else the encoder-based range
pub fn revision_label(serial: Option<&str>, encoder: i32) -> &'static str {
    serial
        .and_then(revision_from_serial)
        .unwrap_or_else(|| revision_from_encoder(encoder))
}
