//! SMBus master on the RP2040 I2C block
//!
//! Uses the interrupt-driven driver. The controller has no clock-stretch
//! timeout of its own, so a phase held up by the console simply stays
//! pending until the caller drops it.

use embassy_embedded_hal::SetConfig;
use embassy_rp::i2c::{self, AbortReason, Async, I2c, Instance};
use embedded_hal_async::i2c::I2c as _;
use smbwatch_hal::{BusConfig, BusFault, SmBus};

/// Error from I2C operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusError {
    /// Address or data not acknowledged
    Nack,
    /// Arbitration lost
    ArbitrationLost,
    /// Buffer length rejected by the driver
    InvalidBuffer,
    /// Address outside the 7-bit range or reserved
    InvalidAddress,
    /// Other abort
    Other,
}

impl From<i2c::Error> for I2cBusError {
    fn from(e: i2c::Error) -> Self {
        match e {
            i2c::Error::Abort(AbortReason::NoAcknowledge) => I2cBusError::Nack,
            i2c::Error::Abort(AbortReason::ArbitrationLoss) => I2cBusError::ArbitrationLost,
            i2c::Error::Abort(_) => I2cBusError::Other,
            i2c::Error::InvalidReadBufferLength | i2c::Error::InvalidWriteBufferLength => {
                I2cBusError::InvalidBuffer
            }
            i2c::Error::AddressOutOfRange(_) | i2c::Error::AddressReserved(_) => {
                I2cBusError::InvalidAddress
            }
            _ => I2cBusError::Other,
        }
    }
}

impl From<I2cBusError> for BusFault {
    fn from(e: I2cBusError) -> Self {
        match e {
            I2cBusError::Nack => BusFault::Nack,
            I2cBusError::ArbitrationLost => BusFault::ArbitrationLost,
            _ => BusFault::Other,
        }
    }
}

/// Peripheral configuration for a bus clock
pub fn i2c_config(bus: &BusConfig) -> i2c::Config {
    let mut config = i2c::Config::default();
    config.frequency = bus.frequency;
    config
}

pub struct RpSmBus<'d, T: Instance> {
    i2c: I2c<'d, T, Async>,
    config: BusConfig,
}

impl<'d, T: Instance> RpSmBus<'d, T> {
    /// Wrap a driver created with [`i2c_config`] of the same `config`
    pub fn new(i2c: I2c<'d, T, Async>, config: BusConfig) -> Self {
        Self { i2c, config }
    }
}

impl<T: Instance> SmBus for RpSmBus<'_, T> {
    type Error = I2cBusError;

    async fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address, data).await.map_err(Into::into)
    }

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.read(address, buf).await.map_err(Into::into)
    }

    async fn write_read(&mut self, address: u8, write_data: &[u8], read_buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c
            .write_read(address, write_data, read_buf)
            .await
            .map_err(Into::into)
    }

    fn reinit(&mut self) {
        // Re-applying the config disables the block, clears its FIFOs and
        // aborts, then re-enables it with the same timing
        if self.i2c.set_config(&i2c_config(&self.config)).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("i2c reinit rejected config");
        }
    }

    fn config(&self) -> BusConfig {
        self.config
    }
}
