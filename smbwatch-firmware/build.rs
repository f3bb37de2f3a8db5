//! Build script for smbwatch-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates monitor.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// SDA/SCL pairs routed to I2C0
const I2C0_PAIRS: [(i64, i64); 6] = [(0, 1), (4, 5), (8, 9), (12, 13), (16, 17), (20, 21)];

/// Keys accepted per section (mirrors the firmware's line parser)
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("wifi", &["ssid", "password"]),
    ("bus", &["sda_pin", "scl_pin", "frequency_hz", "lock_timeout_ms"]),
    (
        "poller",
        &["startup_grace_ms", "min_tick_ms", "backoff_base_ms", "backoff_cap_ms", "family_c_detect_delay_ms"],
    ),
    ("expansion", &["interval_ms", "startup_grace_ms", "backoff_base_ms", "rescan_ms"]),
    ("eeprom", &["rebroadcast_ms"]),
    (
        "publish",
        &[
            "core_port",
            "expansion_port",
            "eeprom_port",
            "beacon_port",
            "title_port",
            "device_id",
            "check_interval_ms",
            "beacon_interval_ms",
            "bus_quiet_ms",
        ],
    ),
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate monitor.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=monitor.toml");

    let config_path = Path::new("monitor.toml");
    if !config_path.exists() {
        fail("monitor.toml not found", &["The firmware embeds monitor.toml from the crate directory.".to_string()]);
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read monitor.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in monitor.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    validate_keys(&config, &mut errors);
    validate_wifi(&config, &mut errors);
    validate_bus(&config, &mut errors);
    validate_numbers(&config, &mut errors);

    if !errors.is_empty() {
        fail("Invalid configuration in monitor.toml", &errors);
    }

    println!("cargo:warning=monitor.toml validated successfully");
}

/// Reject sections and keys the firmware parser would refuse
fn validate_keys(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        return;
    };
    for (section, value) in root {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(name, _)| name == section) else {
            errors.push(format!("unknown section [{}]", section));
            continue;
        };
        let Some(table) = value.as_table() else {
            errors.push(format!("[{}] must be a table", section));
            continue;
        };
        for key in table.keys() {
            if !keys.contains(&key.as_str()) {
                errors.push(format!("[{}] unknown key '{}'", section, key));
            }
        }
    }
}

fn validate_wifi(config: &toml::Value, errors: &mut Vec<String>) {
    match config.get("wifi").and_then(|w| w.get("ssid")) {
        Some(toml::Value::String(ssid)) if ssid.is_empty() => errors.push("[wifi] ssid cannot be empty".into()),
        Some(toml::Value::String(ssid)) if ssid.len() > 32 => errors.push("[wifi] ssid longer than 32 bytes".into()),
        Some(toml::Value::String(_)) => {}
        Some(_) => errors.push("[wifi] ssid must be a string".into()),
        None => errors.push("missing [wifi] ssid".into()),
    }
    match config.get("wifi").and_then(|w| w.get("password")) {
        Some(toml::Value::String(pw)) if pw.len() > 64 => errors.push("[wifi] password longer than 64 bytes".into()),
        Some(toml::Value::String(pw)) if !pw.is_empty() && pw.len() < 8 => {
            errors.push("[wifi] password must be empty (open) or at least 8 bytes".into())
        }
        Some(toml::Value::String(_)) | None => {}
        Some(_) => errors.push("[wifi] password must be a string".into()),
    }
}

/// Pin number from an integer or a "gpioN" string
fn pin(value: &toml::Value) -> Option<i64> {
    match value {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.strip_prefix("gpio").unwrap_or(s).parse().ok(),
        _ => None,
    }
}

fn validate_bus(config: &toml::Value, errors: &mut Vec<String>) {
    let bus = config.get("bus");
    let get = |key: &str, default: i64| match bus.and_then(|b| b.get(key)) {
        Some(v) => pin(v),
        None => Some(default),
    };
    match (get("sda_pin", 4), get("scl_pin", 5)) {
        (Some(sda), Some(scl)) if I2C0_PAIRS.contains(&(sda, scl)) => {}
        (Some(sda), Some(scl)) => errors.push(format!(
            "[bus] sda_pin {} / scl_pin {} is not an I2C0 pair (0/1, 4/5, 8/9, 12/13, 16/17, 20/21)",
            sda, scl
        )),
        _ => errors.push("[bus] pins must be integers or \"gpioN\"".into()),
    }
}

/// Every remaining value is an integer; ports and intervals must be positive
fn validate_numbers(config: &toml::Value, errors: &mut Vec<String>) {
    for (section, keys) in KNOWN_KEYS {
        if *section == "wifi" {
            continue;
        }
        let Some(table) = config.get(section).and_then(|s| s.as_table()) else {
            continue;
        };
        for key in keys.iter().filter(|k| !k.ends_with("_pin")) {
            let Some(value) = table.get(*key) else {
                continue;
            };
            let Some(n) = value.as_integer() else {
                errors.push(format!("[{}] {} must be an integer", section, key));
                continue;
            };
            let zero_ok = key.ends_with("grace_ms")
                || *key == "family_c_detect_delay_ms"
                || *key == "bus_quiet_ms"
                || *key == "lock_timeout_ms"
                || *key == "device_id";
            let max = if key.ends_with("_port") {
                i64::from(u16::MAX)
            } else if *key == "device_id" {
                i64::from(u8::MAX)
            } else {
                i64::from(u32::MAX)
            };
            if n < 0 || (n == 0 && !zero_ok) || n > max {
                errors.push(format!("[{}] {} = {} out of range", section, key, n));
            }
        }
    }
}

/// Abort the build with a boxed error listing
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|e| {
                let e = if e.chars().count() > 62 {
                    format!("{}...", e.chars().take(59).collect::<String>())
                } else {
                    e.clone()
                };
                format!("║  • {:<62} ║", e)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}
