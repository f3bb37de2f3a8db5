//! smbwatch Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the bus instrumentation core is
//! written against. Chip-specific crates implement them, which keeps the
//! core logic testable on the host with fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  smbwatch-core (lock, poller, sampler)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  smbwatch-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ smbwatch-hal- │       │  host fakes   │
//! │    rp2040     │       │  (unit tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`bus::SmBus`] - Read-side SMBus master operations plus soft reinit
//! - [`lines::BusLines`] - Raw SDA/SCL level sampling for idle detection
//! - [`gpio::InputPin`] - Digital input, used to build [`lines::PinLines`]
//! - [`clock::Clock`] - Monotonic millisecond time source

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bus;
pub mod clock;
pub mod gpio;
pub mod lines;

pub use bus::{BusConfig, BusFault, SmBus};
pub use clock::Clock;
pub use gpio::InputPin;
pub use lines::{BusLines, PinLines};
