//! SDA/SCL sampling through the SIO input register
//!
//! The pad input path stays live whatever function the pin is muxed to,
//! so the lines can be observed while the I2C block owns them.

use embassy_rp::pac;
use smbwatch_hal::{InputPin, PinLines};

/// Bank 0 pad observed through SIO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SioPin {
    pin: u8,
}

impl SioPin {
    /// `None` for pins outside bank 0
    pub fn new(pin: u8) -> Option<Self> {
        (pin < 30).then_some(Self { pin })
    }
}

impl InputPin for SioPin {
    fn is_high(&self) -> bool {
        pac::SIO.gpio_in(0).read() & (1 << self.pin) != 0
    }
}

/// Bus lines for the given pad numbers
pub fn sio_lines(sda: u8, scl: u8) -> Option<PinLines<SioPin, SioPin>> {
    Some(PinLines::new(SioPin::new(sda)?, SioPin::new(scl)?))
}
