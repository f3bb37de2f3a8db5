//! Receiving side of the smbwatch wire protocol
//!
//! This crate provides:
//! - [`Receiver`], which polls one datagram source per channel and folds
//!   every decoded frame into an [`AggregateStatus`]
//! - Per-channel update flags for the display layer
//!   ([`Receiver::has_update`], [`Receiver::latest`], [`Receiver::acknowledge`])
//! - Presentation helpers: resolution labels, revision inference, AV pack
//!   and encoder names
//!
//! # Architecture
//!
//! ```text
//!  core :50504 ──────┐
//!  expansion :50505 ─┼─► Receiver ─► AggregateStatus ─► display layer
//!  eeprom :50506 ────┘
//! ```
//!
//! The receiver is `no_std`. With the `std` feature, [`udp::UdpSource`]
//! wraps a non-blocking `std::net::UdpSocket`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod presentation;
pub mod receiver;
#[cfg(feature = "std")]
pub mod udp;

pub use aggregate::AggregateStatus;
pub use presentation::{AvPack, Label};
pub use receiver::{Channel, DatagramSource, Receiver};
