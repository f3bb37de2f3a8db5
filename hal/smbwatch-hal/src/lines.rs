//! Bus line sampling
//!
//! An idle two-wire bus has both lines pulled high. Sampling them before a
//! read burst lets a passive observer avoid starting a transaction in the
//! middle of someone else's.

use crate::gpio::InputPin;

/// Raw SDA/SCL level observation
pub trait BusLines {
    /// SDA reads high
    fn sda_high(&self) -> bool;

    /// SCL reads high
    fn scl_high(&self) -> bool;

    /// Both lines released
    fn is_idle(&self) -> bool {
        self.sda_high() && self.scl_high()
    }
}

/// [`BusLines`] built from two input pins
pub struct PinLines<S, C> {
    sda: S,
    scl: C,
}

impl<S: InputPin, C: InputPin> PinLines<S, C> {
    pub fn new(sda: S, scl: C) -> Self {
        Self { sda, scl }
    }
}

impl<S: InputPin, C: InputPin> BusLines for PinLines<S, C> {
    fn sda_high(&self) -> bool {
        self.sda.is_high()
    }

    fn scl_high(&self) -> bool {
        self.scl.is_high()
    }
}
