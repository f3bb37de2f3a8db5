//! SMBus master abstraction
//!
//! The monitored bus belongs to the console. Implementations are used for
//! register-select writes and reads only; nothing here is meant to change
//! device state.

/// SMBus master
///
/// Each method is one complete bus transaction ending in a STOP condition,
/// except [`SmBus::write_read`] which joins both phases with a repeated start.
/// A phase may wait on the bus for as long as the console stretches the
/// clock; callers bound every phase with [`BusConfig::timeout_ms`] and
/// reinitialize the controller when it elapses.
#[allow(async_fn_in_trait)]
pub trait SmBus {
    /// Error type for bus operations
    type Error: Into<BusFault>;

    /// Write bytes to a device and end with STOP
    ///
    /// In this workspace the payload is always a single register index.
    async fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read bytes from a device and end with STOP
    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read joined by a repeated start
    async fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;

    /// Soft-reinitialize the controller (re-apply pins and clock)
    fn reinit(&mut self);

    /// Timing the controller was configured with
    fn config(&self) -> BusConfig;
}

/// Transfer failure as seen by the bus master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Address or data byte not acknowledged
    Nack,
    /// Another master won arbitration
    ArbitrationLost,
    /// Clock stretched past the transaction timeout
    Timeout,
    /// Controller-specific failure
    Other,
}

/// Bus timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Longest a single transaction phase may take (ms)
    pub timeout_ms: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::CONSOLE
    }
}

impl BusConfig {
    /// Conservative clock the console's controller tolerates alongside its own traffic
    pub const CONSOLE: Self = Self {
        frequency: 55_000,
        timeout_ms: 80,
    };

    /// SMBus standard mode (100 kHz)
    pub const STANDARD: Self = Self {
        frequency: 100_000,
        timeout_ms: 35,
    };
}
