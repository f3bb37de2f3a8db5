//! GPIO input abstraction

/// Digital input pin
///
/// Implementations read the pad level without taking the pin away from
/// the peripheral that drives it.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}
