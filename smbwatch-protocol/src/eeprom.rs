//! Configuration-memory channel
//!
//! One ASCII line per datagram:
//!
//! - `EE:ERR=READ_FAIL`
//! - `EE:RAW=<base64 of the 256-byte image>`
//! - `EE:HDD=<32 uppercase hex chars>`
//! - `EE:SN=<serial>|MAC=<XX:XX:XX:XX:XX:XX>|REG=<region>|HDD=<hex>|RAW=<base64>`
//!
//! The labeled form tolerates missing and reordered fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use heapless::String;

use crate::{truncated, utf8_prefix, FrameError};

/// Size of the configuration memory image
pub const IMAGE_LEN: usize = 256;

/// Base64 length of a full image
pub const RAW_B64_LEN: usize = 344;

/// Longest line this module produces
pub const MAX_LINE_LEN: usize = 448;

/// Line prefix shared by every frame on this channel
pub const LINE_PREFIX: &str = "EE:";

/// Encoded line
pub type EepromLine = String<MAX_LINE_LEN>;

/// 16-byte device key recovered from the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HddKey(pub [u8; 16]);

impl HddKey {
    /// Uppercase hex rendering
    pub fn to_hex(&self) -> String<32> {
        let mut buf = [0u8; 32];
        let mut out = String::new();
        if hex::encode_to_slice(self.0, &mut buf).is_ok() {
            buf.make_ascii_uppercase();
            out.push_str(utf8_prefix(&buf)).ok();
        }
        out
    }

    /// Parse exactly 32 hex chars, either case
    pub fn from_hex(s: &str) -> Result<Self, FrameError> {
        let mut key = [0u8; 16];
        hex::decode_to_slice(s, &mut key).map_err(|_| FrameError::BadEncoding)?;
        Ok(Self(key))
    }
}

/// Fields of the combined labeled line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Labeled {
    pub serial: Option<String<16>>,
    pub mac: Option<String<17>>,
    pub region: Option<String<12>>,
    pub hdd: Option<HddKey>,
    pub raw: Option<[u8; IMAGE_LEN]>,
}

/// One configuration-memory datagram
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromFrame {
    /// The one-time read failed; no image will follow
    ReadFail,
    Raw([u8; IMAGE_LEN]),
    Hdd(HddKey),
    Labeled(Labeled),
}

impl EepromFrame {
    /// Render as a single ASCII line
    pub fn encode(&self) -> Result<EepromLine, FrameError> {
        let mut line = EepromLine::new();
        push(&mut line, LINE_PREFIX)?;
        match self {
            Self::ReadFail => push(&mut line, "ERR=READ_FAIL")?,
            Self::Raw(image) => {
                push(&mut line, "RAW=")?;
                push_base64(&mut line, image)?;
            }
            Self::Hdd(key) => {
                push(&mut line, "HDD=")?;
                push(&mut line, &key.to_hex())?;
            }
            Self::Labeled(fields) => {
                let mut first = true;
                let mut field = |line: &mut EepromLine, tag: &str| {
                    if !first {
                        push(line, "|")?;
                    }
                    first = false;
                    push(line, tag)
                };
                if let Some(serial) = &fields.serial {
                    field(&mut line, "SN=")?;
                    push(&mut line, serial)?;
                }
                if let Some(mac) = &fields.mac {
                    field(&mut line, "MAC=")?;
                    push(&mut line, mac)?;
                }
                if let Some(region) = &fields.region {
                    field(&mut line, "REG=")?;
                    push(&mut line, region)?;
                }
                if let Some(hdd) = &fields.hdd {
                    field(&mut line, "HDD=")?;
                    push(&mut line, &hdd.to_hex())?;
                }
                if let Some(raw) = &fields.raw {
                    field(&mut line, "RAW=")?;
                    push_base64(&mut line, raw)?;
                }
            }
        }
        Ok(line)
    }

    /// Parse one datagram
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = utf8_prefix(bytes).trim_end_matches(['\0', '\r', '\n', ' ']);
        let body = text.strip_prefix(LINE_PREFIX).ok_or(FrameError::BadPrefix)?;

        if body.contains('|') {
            return parse_labeled(body).map(Self::Labeled);
        }

        match body.get(..3) {
            Some("ERR") => Ok(Self::ReadFail),
            Some("RAW") => {
                let value = body.strip_prefix("RAW=").ok_or(FrameError::BadPrefix)?;
                decode_base64(value).map(Self::Raw)
            }
            Some("HDD") => {
                let value = body.strip_prefix("HDD=").ok_or(FrameError::BadPrefix)?;
                HddKey::from_hex(value.trim()).map(Self::Hdd)
            }
            _ => parse_labeled(body).map(Self::Labeled),
        }
    }
}

fn push(line: &mut EepromLine, s: &str) -> Result<(), FrameError> {
    line.push_str(s).map_err(|_| FrameError::Overflow)
}

fn push_base64(line: &mut EepromLine, image: &[u8; IMAGE_LEN]) -> Result<(), FrameError> {
    let mut buf = [0u8; RAW_B64_LEN];
    let n = STANDARD
        .encode_slice(image, &mut buf)
        .map_err(|_| FrameError::Overflow)?;
    push(line, utf8_prefix(&buf[..n]))
}

fn decode_base64(s: &str) -> Result<[u8; IMAGE_LEN], FrameError> {
    // decode_slice wants room for its length estimate, which rounds up
    let mut buf = [0u8; IMAGE_LEN + 3];
    let n = STANDARD
        .decode_slice(s.trim(), &mut buf)
        .map_err(|_| FrameError::BadEncoding)?;
    if n != IMAGE_LEN {
        return Err(FrameError::BadLength);
    }
    let mut image = [0u8; IMAGE_LEN];
    image.copy_from_slice(&buf[..IMAGE_LEN]);
    Ok(image)
}

fn parse_labeled(body: &str) -> Result<Labeled, FrameError> {
    let mut out = Labeled::default();
    let mut any = false;

    for token in body.split('|') {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("SN") {
            out.serial = Some(truncated(value));
        } else if key.eq_ignore_ascii_case("MAC") {
            out.mac = Some(truncated(value));
        } else if key.eq_ignore_ascii_case("REG") {
            out.region = Some(truncated(value));
        } else if key.eq_ignore_ascii_case("HDD") {
            out.hdd = HddKey::from_hex(value).ok();
        } else if key.eq_ignore_ascii_case("RAW") {
            out.raw = decode_base64(value).ok();
        } else {
            continue;
        }
        any = true;
    }

    if any {
        Ok(out)
    } else {
        Err(FrameError::BadPrefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_image() -> [u8; IMAGE_LEN] {
        let mut image = [0u8; IMAGE_LEN];
        for (i, b) in image.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        image
    }

    const KEY: HddKey = HddKey([
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        0xFF,
    ]);

    #[test]
    fn test_read_fail_line() {
        let line = EepromFrame::ReadFail.encode().unwrap();
        assert_eq!(line.as_str(), "EE:ERR=READ_FAIL");
        assert_eq!(EepromFrame::decode(line.as_bytes()), Ok(EepromFrame::ReadFail));
    }

    #[test]
    fn test_hdd_line_is_uppercase() {
        let line = EepromFrame::Hdd(KEY).encode().unwrap();
        assert_eq!(line.as_str(), "EE:HDD=00112233445566778899AABBCCDDEEFF");
    }

    #[test]
    fn test_hdd_accepts_lowercase() {
        let frame = EepromFrame::decode(b"EE:HDD=00112233445566778899aabbccddeeff\n").unwrap();
        assert_eq!(frame, EepromFrame::Hdd(KEY));
    }

    #[test]
    fn test_raw_line_length() {
        let line = EepromFrame::Raw(sample_image()).encode().unwrap();
        assert_eq!(line.len(), LINE_PREFIX.len() + 4 + RAW_B64_LEN);
        assert_eq!(
            EepromFrame::decode(line.as_bytes()),
            Ok(EepromFrame::Raw(sample_image()))
        );
    }

    #[test]
    fn test_raw_wrong_size_rejected() {
        assert_eq!(EepromFrame::decode(b"EE:RAW=AAAA"), Err(FrameError::BadLength));
        assert_eq!(EepromFrame::decode(b"EE:RAW=!!!!"), Err(FrameError::BadEncoding));
    }

    #[test]
    fn test_labeled_roundtrip_fits_line() {
        let frame = EepromFrame::Labeled(Labeled {
            serial: Some(truncated("112233445566")),
            mac: Some(truncated("00:50:F2:12:34:56")),
            region: Some(truncated("NTSC-U")),
            hdd: Some(KEY),
            raw: Some(sample_image()),
        });
        let line = frame.encode().unwrap();
        assert!(line.starts_with("EE:SN=112233445566|MAC=00:50:F2:12:34:56|REG=NTSC-U|HDD="));
        assert_eq!(EepromFrame::decode(line.as_bytes()), Ok(frame));
    }

    #[test]
    fn test_labeled_reordered_and_partial() {
        let frame = EepromFrame::decode(b"EE:REG=PAL|sn=A1B2|foo=bar").unwrap();
        match frame {
            EepromFrame::Labeled(l) => {
                assert_eq!(l.region.as_deref(), Some("PAL"));
                assert_eq!(l.serial.as_deref(), Some("A1B2"));
                assert_eq!(l.mac, None);
                assert_eq!(l.hdd, None);
                assert_eq!(l.raw, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_labeled_without_hdd_omits_field() {
        let frame = EepromFrame::Labeled(Labeled {
            serial: Some(truncated("SN1")),
            region: Some(truncated("UNKNOWN")),
            ..Default::default()
        });
        assert_eq!(frame.encode().unwrap().as_str(), "EE:SN=SN1|REG=UNKNOWN");
    }

    #[test]
    fn test_rejects_foreign_lines() {
        assert_eq!(EepromFrame::decode(b"APP:Halo|TID:4D530004"), Err(FrameError::BadPrefix));
        assert_eq!(EepromFrame::decode(b"EE:nothing"), Err(FrameError::BadPrefix));
    }

    proptest! {
        #[test]
        fn test_raw_roundtrip(bytes in proptest::collection::vec(any::<u8>(), IMAGE_LEN)) {
            let mut image = [0u8; IMAGE_LEN];
            image.copy_from_slice(&bytes);
            let line = EepromFrame::Raw(image).encode().unwrap();
            prop_assert_eq!(EepromFrame::decode(line.as_bytes()), Ok(EepromFrame::Raw(image)));
        }

        #[test]
        fn test_hdd_roundtrip(key in proptest::array::uniform16(any::<u8>())) {
            let line = EepromFrame::Hdd(HddKey(key)).encode().unwrap();
            prop_assert_eq!(EepromFrame::decode(line.as_bytes()), Ok(EepromFrame::Hdd(HddKey(key))));
        }
    }
}
