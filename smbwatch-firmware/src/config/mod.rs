//! Configuration loading and parsing
//!
//! `monitor.toml` is compiled into the image and parsed at boot by a
//! custom no_std parser. `build.rs` has already validated it on the host.

pub mod toml;

pub use toml::{parse_config, BusPins, FirmwareConfig, ParseError, WifiConfig};
