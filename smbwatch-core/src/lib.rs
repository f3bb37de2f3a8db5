//! Board-agnostic core of the console bus monitor
//!
//! This crate contains everything that touches the console's management
//! bus or interprets what comes back, without depending on a specific chip:
//!
//! - Bus lock and transaction primitives (STOP-separated reads, idle
//!   detection, one-shot recovery)
//! - Sensor poller (temperatures, fan)
//! - Extended status sampler (tray, AV pack, encoder, video mode)
//! - Configuration memory reader and device key recovery
//! - Publish schedules for the UDP channels
//! - Single-writer caches shared between producers and the publisher
//! - Status LED patterns
//!
//! Every component takes the current time as an argument and every bus
//! access goes through [`bus::BusLock`], so the whole crate runs on the
//! host against fakes.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bus;
pub mod cache;
pub mod config;
pub mod eeprom;
pub mod expansion;
pub mod led;
pub mod pace;
pub mod publish;
pub mod sensor;

#[cfg(test)]
pub(crate) mod testing;
