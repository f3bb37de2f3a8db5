//! Shared console bus: addresses, errors, lock and transactions
//!
//! ```text
//!  poller ─┐
//!  sampler ├─► BusLock ─► BusGuard ─► BusPort (Transact) ─► SmBus + BusLines
//!  eeprom ─┘
//! ```
//!
//! Nothing in this crate writes device registers. The only writes on the
//! wire are single-byte register selects preceding a read.

pub mod lock;
pub mod port;

pub use lock::{ActivityStamp, BusGuard, BusLock};
pub use port::BusPort;

use smbwatch_hal::BusFault;

/// Device addresses on the console bus (7-bit)
pub mod addr {
    /// System management controller
    pub const SMC: u8 = 0x10;
    /// Video encoder, family A (Conexant)
    pub const CONEXANT: u8 = 0x45;
    /// Configuration memory (24C02-class)
    pub const EEPROM: u8 = 0x54;
    /// Video encoder, family B (Focus)
    pub const FOCUS: u8 = 0x6A;
    /// Video encoder, family C (Xcalibur)
    pub const XCALIBUR: u8 = 0x70;
}

/// System management controller registers
pub mod smc {
    pub const CONSOLE_REVISION: u8 = 0x00;
    pub const PIC_VERSION: u8 = 0x01;
    pub const TRAY: u8 = 0x03;
    pub const AV_PACK: u8 = 0x04;
    pub const CPU_TEMP: u8 = 0x09;
    pub const BOARD_TEMP: u8 = 0x0A;
    pub const FAN_SPEED: u8 = 0x10;
}

/// Bus transaction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The controller reported a transfer failure
    Fault(BusFault),
    /// Lines did not settle idle in time
    Busy,
    /// Lines did not settle and the controller was just reinitialized
    Wedged,
    /// The bus lock could not be taken in time
    LockTimeout,
}

impl From<BusFault> for BusError {
    fn from(fault: BusFault) -> Self {
        BusError::Fault(fault)
    }
}

/// Read-only transaction set used by every producer
///
/// Implemented by [`BusPort`]; producers only ever see it through a
/// [`BusGuard`].
#[allow(async_fn_in_trait)]
pub trait Transact {
    /// Wait for idle lines before a burst, recovering a wedged bus once
    async fn settle(&mut self) -> Result<(), BusError>;

    /// Register select and data phase as two STOP-terminated transactions
    async fn read_byte(&mut self, address: u8, reg: u8) -> Result<u8, BusError>;

    /// Repeated-start read, falling back to [`Transact::read_byte`]'s form
    async fn read_byte_compat(&mut self, address: u8, reg: u8) -> Result<u8, BusError>;

    /// Two-byte read, most significant byte first
    async fn read_word(&mut self, address: u8, reg: u8) -> Result<u16, BusError>;

    /// Sequential read in terminated, paced chunks
    async fn read_block(&mut self, address: u8, offset: u8, out: &mut [u8]) -> Result<(), BusError>;
}
