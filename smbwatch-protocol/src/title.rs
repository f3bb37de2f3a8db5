//! Title announcements from the console
//!
//! A script running on the console broadcasts `APP:<name>|TID:<hex id>`
//! every second or so. Bare title strings are accepted too. The port is
//! shared with the configuration-memory channel, so `EE:` lines are ignored.

use crate::core_frame::AppName;
use crate::eeprom::LINE_PREFIX;
use crate::{truncated, utf8_prefix};

/// Parsed title announcement
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TitleAnnouncement {
    pub name: AppName,
    pub title_id: Option<u32>,
}

impl TitleAnnouncement {
    /// Parse a datagram; `None` for our own lines and empty names
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = utf8_prefix(bytes).trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if text.is_empty() || text.starts_with(LINE_PREFIX) {
            return None;
        }

        let name = match text.find("APP:") {
            Some(pos) => &text[pos + 4..],
            None => text,
        };
        let name = name.split('|').next().unwrap_or_default().trim();
        if name.is_empty() {
            return None;
        }

        let title_id = text
            .split('|')
            .filter_map(|field| field.trim().strip_prefix("TID:"))
            .find_map(parse_title_id);

        Some(Self {
            name: truncated(name),
            title_id,
        })
    }
}

fn parse_title_id(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_announcement() {
        let t = TitleAnnouncement::parse(b"APP:Halo 2|TID:0x4D530064").unwrap();
        assert_eq!(t.name.as_str(), "Halo 2");
        assert_eq!(t.title_id, Some(0x4D53_0064));
    }

    #[test]
    fn test_parse_bare_title() {
        let t = TitleAnnouncement::parse(b"  Dashboard \n").unwrap();
        assert_eq!(t.name.as_str(), "Dashboard");
        assert_eq!(t.title_id, None);
    }

    #[test]
    fn test_tid_without_prefix() {
        let t = TitleAnnouncement::parse(b"APP:Forza|TID:4D53004A").unwrap();
        assert_eq!(t.title_id, Some(0x4D53_004A));
    }

    #[test]
    fn test_ignores_eeprom_lines() {
        assert_eq!(TitleAnnouncement::parse(b"EE:HDD=00112233445566778899AABBCCDDEEFF"), None);
        assert_eq!(TitleAnnouncement::parse(b"EE:ERR=READ_FAIL"), None);
    }

    #[test]
    fn test_empty_names_ignored() {
        assert_eq!(TitleAnnouncement::parse(b""), None);
        assert_eq!(TitleAnnouncement::parse(b"APP:|TID:0"), None);
        assert_eq!(TitleAnnouncement::parse(b"APP:   "), None);
    }

    #[test]
    fn test_long_name_truncated() {
        let t = TitleAnnouncement::parse(b"APP:Tom Clancy's Splinter Cell Chaos Theory|TID:5553003B").unwrap();
        assert_eq!(t.name.len(), 31);
        assert!(t.name.starts_with("Tom Clancy's Splinter Cell"));
    }
}
