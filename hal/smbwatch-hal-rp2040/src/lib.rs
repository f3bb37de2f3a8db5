//! RP2040 implementation of the smbwatch HAL
//!
//! - [`i2c::RpSmBus`]: async I2C master implementing `SmBus`, with
//!   soft reinit through the peripheral's `SetConfig`
//! - [`lines::SioPin`]: pad level sampling that works while the pin is
//!   muxed to the I2C block
//! - [`timer::EmbassyTimer`]: `Clock` and `DelayNs` on `embassy-time`

#![no_std]

pub mod i2c;
pub mod lines;
pub mod timer;

pub use i2c::{I2cBusError, RpSmBus};
pub use lines::{sio_lines, SioPin};
pub use timer::EmbassyTimer;
