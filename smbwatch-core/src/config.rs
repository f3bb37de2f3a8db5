//! Timing and port configuration
//!
//! Every constant the monitor runs on lives here with its default. The
//! firmware overrides individual values from its TOML file; tests use the
//! defaults directly.

use smbwatch_protocol::beacon::DEFAULT_DEVICE_ID;
use smbwatch_protocol::{BEACON_PORT, CORE_PORT, EEPROM_PORT, EXPANSION_PORT, TITLE_PORT};

/// Complete monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MonitorConfig {
    pub bus: BusTiming,
    pub poller: PollerConfig,
    pub expansion: ExpansionConfig,
    pub eeprom: EepromConfig,
    pub publish: PublishConfig,
}

/// Transaction pacing on the shared bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusTiming {
    /// Gap after each terminated phase (µs)
    pub op_gap_us: u32,
    /// Longest wait for the lines to go idle (ms)
    pub idle_wait_ms: u32,
    /// Consecutive idle samples required
    pub idle_checks: u8,
    /// Spacing between line samples (µs)
    pub idle_sample_us: u32,
    /// Failed settles before the controller is reinitialized
    pub wedged_threshold: u8,
    /// Configuration memory chunk size (bytes)
    pub chunk_len: usize,
    /// Gap after each chunk (µs)
    pub chunk_gap_us: u32,
    /// Lock polling interval (ms)
    pub lock_poll_ms: u32,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            op_gap_us: 300,
            idle_wait_ms: 15,
            idle_checks: 3,
            idle_sample_us: 150,
            wedged_threshold: 3,
            chunk_len: 16,
            chunk_gap_us: 200,
            lock_poll_ms: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollerConfig {
    /// No bus access before this much uptime
    pub startup_grace_ms: u32,
    /// Nominal interval between ticks
    pub min_tick_ms: u32,
    pub jitter_min_ms: u32,
    pub jitter_max_ms: u32,
    /// First backoff step; doubles per consecutive failure
    pub backoff_base_ms: u32,
    pub backoff_cap_ms: u32,
    pub backoff_max_streak: u8,
    /// Uptime before the one-time family C probe
    pub family_c_detect_delay_ms: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: 10_000,
            min_tick_ms: 500,
            jitter_min_ms: 100,
            jitter_max_ms: 299,
            backoff_base_ms: 8_000,
            backoff_cap_ms: 60_000,
            backoff_max_streak: 5,
            family_c_detect_delay_ms: 12_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExpansionConfig {
    pub startup_grace_ms: u32,
    /// Nominal sampling cadence
    pub interval_ms: u32,
    pub jitter_max_ms: u32,
    /// Retry delay when the bus lock is busy
    pub contended_retry_ms: u32,
    pub backoff_base_ms: u32,
    pub backoff_cap_ms: u32,
    pub backoff_max_streak: u8,
    /// Minimum spacing of family C mode re-probes
    pub rescan_ms: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: 10_000,
            interval_ms: 2_000,
            jitter_max_ms: 200,
            contended_retry_ms: 500,
            backoff_base_ms: 4_000,
            backoff_cap_ms: 60_000,
            backoff_max_streak: 5,
            rescan_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EepromConfig {
    /// Bounded wait for the bus lock before the one-time read
    pub lock_timeout_ms: u32,
    pub rebroadcast_ms: u32,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 500,
            rebroadcast_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PublishConfig {
    pub core_port: u16,
    pub expansion_port: u16,
    pub eeprom_port: u16,
    pub beacon_port: u16,
    pub title_port: u16,
    pub device_id: u8,
    /// Core change-check interval
    pub check_interval_ms: u32,
    pub jitter_max_ms: u32,
    /// Required bus silence before a send
    pub bus_quiet_ms: u32,
    /// Base retry when the bus was not quiet
    pub defer_ms: u32,
    pub defer_jitter_ms: u32,
    pub beacon_interval_ms: u32,
    pub beacon_retry_ms: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            core_port: CORE_PORT,
            expansion_port: EXPANSION_PORT,
            eeprom_port: EEPROM_PORT,
            beacon_port: BEACON_PORT,
            title_port: TITLE_PORT,
            device_id: DEFAULT_DEVICE_ID,
            check_interval_ms: 5_000,
            jitter_max_ms: 200,
            bus_quiet_ms: 6,
            defer_ms: 150,
            defer_jitter_ms: 150,
            beacon_interval_ms: 1_500,
            beacon_retry_ms: 300,
        }
    }
}
