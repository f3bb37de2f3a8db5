//! Identifier fields at fixed image offsets

use core::fmt::Write;

use heapless::String;

pub const SERIAL_OFFSET: usize = 0x34;
pub const SERIAL_LEN: usize = 12;
pub const MAC_OFFSET: usize = 0x40;
pub const REGION_OFFSET: usize = 0x58;

/// Serial as printed on the label
///
/// Stops at the first `0x00` or `0xFF`, uppercases, and drops anything
/// outside `A-Z0-9`.
pub fn clean_serial(raw: &[u8]) -> String<16> {
    let mut out = String::new();
    for &b in raw.iter().take(SERIAL_LEN) {
        if b == 0x00 || b == 0xFF {
            break;
        }
        let c = b.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            // at most SERIAL_LEN chars
            let _ = out.push(char::from(c));
        }
    }
    out
}

/// `XX:XX:XX:XX:XX:XX`
pub fn format_mac(mac: &[u8; 6]) -> String<17> {
    let mut out = String::new();
    for (i, b) in mac.iter().enumerate() {
        if i > 0 {
            let _ = out.push(':');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

pub fn region_name(code: u8) -> &'static str {
    match code {
        0x00 => "NTSC-U",
        0x01 => "NTSC-J",
        0x02 => "PAL",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_cleaning() {
        assert_eq!(clean_serial(b"1234-5678ab\x00zz").as_str(), "12345678AB");
        assert_eq!(clean_serial(b"11223344\xFF556").as_str(), "11223344");
        assert_eq!(clean_serial(b"ABCDEFGHIJKLMNOP").as_str(), "ABCDEFGHIJKL");
        assert_eq!(clean_serial(b"").as_str(), "");
    }

    #[test]
    fn test_mac_format() {
        assert_eq!(
            format_mac(&[0x00, 0x50, 0xF2, 0x0a, 0xbc, 0x01]).as_str(),
            "00:50:F2:0A:BC:01"
        );
    }

    #[test]
    fn test_region_names() {
        assert_eq!(region_name(0), "NTSC-U");
        assert_eq!(region_name(1), "NTSC-J");
        assert_eq!(region_name(2), "PAL");
        assert_eq!(region_name(0x40), "UNKNOWN");
    }
}
