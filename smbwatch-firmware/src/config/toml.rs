//! Simple TOML parser for the monitor configuration
//!
//! Handles only the subset `monitor.toml` uses. It does NOT support the
//! full TOML spec.
//!
//! Supported features:
//! - `[section]` headers
//! - Key = value pairs (string, integer)
//! - Comments (# ...), including after a value
//!
//! NOT supported:
//! - Booleans, arrays and inline tables
//! - Multi-line strings and escapes
//! - Dotted keys

use heapless::String as HString;

use smbwatch_core::config::MonitorConfig;
use smbwatch_hal::BusConfig;

/// Longest accepted SSID
pub const MAX_SSID_LEN: usize = 32;

/// Longest accepted passphrase
pub const MAX_PASSWORD_LEN: usize = 64;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// Key not valid in its section
    UnknownKey,
    /// String longer than its field
    TooLong,
}

/// Network credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WifiConfig {
    pub ssid: HString<MAX_SSID_LEN>,
    pub password: HString<MAX_PASSWORD_LEN>,
}

/// Board wiring of the tapped bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPins {
    pub sda_pin: u8,
    pub scl_pin: u8,
    pub frequency_hz: u32,
}

impl Default for BusPins {
    fn default() -> Self {
        Self {
            sda_pin: 4,
            scl_pin: 5,
            frequency_hz: BusConfig::CONSOLE.frequency,
        }
    }
}

impl BusPins {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            frequency: self.frequency_hz,
            ..BusConfig::CONSOLE
        }
    }
}

/// Everything the firmware reads from `monitor.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareConfig {
    pub wifi: WifiConfig,
    pub pins: BusPins,
    pub monitor: MonitorConfig,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Wifi,
    Bus,
    Poller,
    Expansion,
    Eeprom,
    Publish,
}

/// Parse TOML configuration; unset keys keep their defaults
pub fn parse_config(input: &str) -> Result<FirmwareConfig, ParseError> {
    let mut config = FirmwareConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = strip_comment(line);
            let name = header
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .ok_or(ParseError::InvalidSection)?;
            section = parse_section_header(name)?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config)?;
        }
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "wifi" => Ok(Section::Wifi),
        "bus" => Ok(Section::Bus),
        "poller" => Ok(Section::Poller),
        "expansion" => Ok(Section::Expansion),
        "eeprom" => Ok(Section::Eeprom),
        "publish" => Ok(Section::Publish),
        _ => Err(ParseError::InvalidSection),
    }
}

fn apply_value(section: Section, key: &str, value: &str, config: &mut FirmwareConfig) -> Result<(), ParseError> {
    let m = &mut config.monitor;
    match (section, key) {
        (Section::Wifi, "ssid") => config.wifi.ssid = parse_bounded(value)?,
        (Section::Wifi, "password") => config.wifi.password = parse_bounded(value)?,

        (Section::Bus, "sda_pin") => config.pins.sda_pin = parse_pin(value)?,
        (Section::Bus, "scl_pin") => config.pins.scl_pin = parse_pin(value)?,
        (Section::Bus, "frequency_hz") => config.pins.frequency_hz = parse_nonzero(value)?,
        (Section::Bus, "lock_timeout_ms") => m.eeprom.lock_timeout_ms = parse_int(value)?,

        (Section::Poller, "startup_grace_ms") => m.poller.startup_grace_ms = parse_int(value)?,
        (Section::Poller, "min_tick_ms") => m.poller.min_tick_ms = parse_nonzero(value)?,
        (Section::Poller, "backoff_base_ms") => m.poller.backoff_base_ms = parse_nonzero(value)?,
        (Section::Poller, "backoff_cap_ms") => m.poller.backoff_cap_ms = parse_nonzero(value)?,
        (Section::Poller, "family_c_detect_delay_ms") => m.poller.family_c_detect_delay_ms = parse_int(value)?,

        (Section::Expansion, "interval_ms") => m.expansion.interval_ms = parse_nonzero(value)?,
        (Section::Expansion, "startup_grace_ms") => m.expansion.startup_grace_ms = parse_int(value)?,
        (Section::Expansion, "backoff_base_ms") => m.expansion.backoff_base_ms = parse_nonzero(value)?,
        (Section::Expansion, "rescan_ms") => m.expansion.rescan_ms = parse_nonzero(value)?,

        (Section::Eeprom, "rebroadcast_ms") => m.eeprom.rebroadcast_ms = parse_nonzero(value)?,

        (Section::Publish, "core_port") => m.publish.core_port = parse_nonzero(value)?,
        (Section::Publish, "expansion_port") => m.publish.expansion_port = parse_nonzero(value)?,
        (Section::Publish, "eeprom_port") => m.publish.eeprom_port = parse_nonzero(value)?,
        (Section::Publish, "beacon_port") => m.publish.beacon_port = parse_nonzero(value)?,
        (Section::Publish, "title_port") => m.publish.title_port = parse_nonzero(value)?,
        (Section::Publish, "device_id") => m.publish.device_id = parse_int(value)?,
        (Section::Publish, "check_interval_ms") => m.publish.check_interval_ms = parse_nonzero(value)?,
        (Section::Publish, "beacon_interval_ms") => m.publish.beacon_interval_ms = parse_nonzero(value)?,
        (Section::Publish, "bus_quiet_ms") => m.publish.bus_quiet_ms = parse_int(value)?,

        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Drop a trailing comment that is not inside a string
fn strip_comment(text: &str) -> &str {
    text.match_indices('#')
        .map(|(pos, _)| pos)
        .find(|&pos| text[..pos].matches('"').count() % 2 == 0)
        .map_or(text, |pos| text[..pos].trim())
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_comment(line[eq_pos + 1..].trim());

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

fn parse_bounded<const N: usize>(value: &str) -> Result<HString<N>, ParseError> {
    HString::try_from(parse_string(value)).map_err(|_| ParseError::TooLong)
}

/// Parse an integer value; `_` separators are allowed
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    let mut digits: HString<24> = HString::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_nonzero<T: core::str::FromStr + Default + PartialEq>(value: &str) -> Result<T, ParseError> {
    let v: T = parse_int(value)?;
    if v == T::default() {
        Err(ParseError::InvalidValue)
    } else {
        Ok(v)
    }
}

/// Bank 0 pin number, bare or as "gpioN"
fn parse_pin(value: &str) -> Result<u8, ParseError> {
    let value = parse_string(value);
    let digits = value.strip_prefix("gpio").unwrap_or(value);
    let pin: u8 = parse_int(digits)?;
    if pin < 30 {
        Ok(pin)
    } else {
        Err(ParseError::InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file() {
        let config = parse_config(
            r#"
# bench setup
[wifi]
ssid = "lab-net"
password = "hunter22" # not really

[bus]
sda_pin = "gpio8"
scl_pin = 9
frequency_hz = 100_000
lock_timeout_ms = 750

[poller]
min_tick_ms = 400

[expansion]
rescan_ms = 45000

[eeprom]
rebroadcast_ms = 20000

[publish]
device_id = 9
core_port = 40504
"#,
        )
        .unwrap();

        assert_eq!(config.wifi.ssid.as_str(), "lab-net");
        assert_eq!(config.wifi.password.as_str(), "hunter22");
        assert_eq!(config.pins.sda_pin, 8);
        assert_eq!(config.pins.scl_pin, 9);
        assert_eq!(config.pins.bus_config().frequency, 100_000);
        assert_eq!(config.monitor.eeprom.lock_timeout_ms, 750);
        assert_eq!(config.monitor.poller.min_tick_ms, 400);
        assert_eq!(config.monitor.expansion.rescan_ms, 45_000);
        assert_eq!(config.monitor.eeprom.rebroadcast_ms, 20_000);
        assert_eq!(config.monitor.publish.device_id, 9);
        assert_eq!(config.monitor.publish.core_port, 40504);
        // untouched keys keep defaults
        assert_eq!(config.monitor.publish.beacon_port, 50502);
        assert_eq!(config.monitor.poller.backoff_base_ms, 8_000);
    }

    #[test]
    fn test_empty_input_is_defaults() {
        assert_eq!(parse_config("").unwrap(), FirmwareConfig::default());
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_config("[network]"), Err(ParseError::InvalidSection));
        assert_eq!(parse_config("[bus\nsda_pin = 4"), Err(ParseError::InvalidSection));
        assert_eq!(parse_config("[bus]\nspeed = 4"), Err(ParseError::UnknownKey));
        assert_eq!(parse_config("ssid = \"x\""), Err(ParseError::UnknownKey));
        assert_eq!(parse_config("[bus]\nsda_pin = 30"), Err(ParseError::InvalidValue));
        assert_eq!(parse_config("[poller]\nmin_tick_ms = 0"), Err(ParseError::InvalidValue));
        assert_eq!(parse_config("[publish]\ndevice_id = 300"), Err(ParseError::InvalidValue));

        let long = "[wifi]\nssid = \"0123456789012345678901234567890123\"";
        assert_eq!(parse_config(long), Err(ParseError::TooLong));
    }

    #[test]
    fn test_hash_inside_string_is_kept() {
        let config = parse_config("[wifi]\npassword = \"a#b\" # comment").unwrap();
        assert_eq!(config.wifi.password.as_str(), "a#b");
    }
}
