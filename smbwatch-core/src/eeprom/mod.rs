//! Configuration memory reader
//!
//! The 256-byte image is read once per boot under the bus lock. Key
//! recovery and field extraction run off the bus, and every later
//! broadcast is served from the cached snapshot. A failed read is
//! latched: it is reported once and never retried.

pub mod fields;
pub mod keys;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};
use smbwatch_hal::Clock;
use smbwatch_protocol::{EepromFrame, HddKey, Labeled, IMAGE_LEN};

use crate::bus::{addr, BusError, BusLock, Transact};
use crate::config::EepromConfig;
use crate::pace::is_due;

pub use keys::{recover_key, Recovered};

/// Frames produced by one broadcast round
///
/// Sized for the longest round: RAW, HDD and the labeled line.
pub type FrameBatch = Vec<EepromFrame, 3>;

fn push_frame(batch: &mut FrameBatch, frame: EepromFrame) {
    let pushed = batch.push(frame).is_ok();
    debug_assert!(pushed, "frame batch overflow");
}

/// Read the whole image under the lock
///
/// Waits at most `timeout_ms` for the lock.
pub async fn read_image<M, P, T>(lock: &BusLock<M, P, T>, timeout_ms: u32) -> Result<[u8; IMAGE_LEN], BusError>
where
    M: RawMutex,
    P: Transact,
    T: Clock + DelayNs + Clone,
{
    let mut bus = lock.acquire(timeout_ms).await.ok_or(BusError::LockTimeout)?;
    bus.settle().await?;
    let mut image = [0u8; IMAGE_LEN];
    bus.read_block(addr::EEPROM, 0, &mut image).await?;
    Ok(image)
}

/// Cached image plus everything derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMemory {
    image: [u8; IMAGE_LEN],
    recovered: Option<Recovered>,
}

impl ConfigMemory {
    pub fn new(image: [u8; IMAGE_LEN]) -> Self {
        Self {
            recovered: recover_key(&image),
            image,
        }
    }

    pub fn image(&self) -> &[u8; IMAGE_LEN] {
        &self.image
    }

    pub fn recovered(&self) -> Option<&Recovered> {
        self.recovered.as_ref()
    }

    pub fn hdd_key(&self) -> Option<HddKey> {
        self.recovered.as_ref().map(|r| r.key)
    }

    /// Image with the factory region decrypted when a key was recovered
    pub fn view(&self) -> [u8; IMAGE_LEN] {
        let mut view = self.image;
        if let Some(r) = &self.recovered {
            view[keys::FACTORY_OFFSET..keys::FACTORY_OFFSET + keys::FACTORY_LEN].copy_from_slice(&r.plaintext);
        }
        view
    }

    /// Combined labeled record; the device key is left out when absent
    pub fn labeled(&self) -> Labeled {
        let view = self.view();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&view[fields::MAC_OFFSET..fields::MAC_OFFSET + 6]);
        let mut region = String::new();
        let _ = region.push_str(fields::region_name(view[fields::REGION_OFFSET]));

        Labeled {
            serial: Some(fields::clean_serial(
                &view[fields::SERIAL_OFFSET..fields::SERIAL_OFFSET + fields::SERIAL_LEN],
            )),
            mac: Some(fields::format_mac(&mac)),
            region: Some(region),
            hdd: self.hdd_key(),
            raw: Some(self.image),
        }
    }

    /// RAW, then HDD when recovered, then the labeled line
    pub fn frames(&self) -> FrameBatch {
        let mut batch = FrameBatch::new();
        push_frame(&mut batch, EepromFrame::Raw(self.image));
        if let Some(key) = self.hdd_key() {
            push_frame(&mut batch, EepromFrame::Hdd(key));
        }
        push_frame(&mut batch, EepromFrame::Labeled(self.labeled()));
        batch
    }
}

/// Lifetime of the one-time read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMemoryState {
    Pending,
    /// Latched; the bus is not touched again
    ReadFailed(BusError),
    Ready(ConfigMemory),
}

/// One-time reader and rebroadcast schedule
pub struct ConfigMemoryReader {
    config: EepromConfig,
    state: ConfigMemoryState,
    failure_sent: bool,
    next_broadcast_ms: Option<u32>,
}

impl ConfigMemoryReader {
    pub fn new(config: EepromConfig) -> Self {
        Self {
            config,
            state: ConfigMemoryState::Pending,
            failure_sent: false,
            next_broadcast_ms: None,
        }
    }

    pub fn state(&self) -> &ConfigMemoryState {
        &self.state
    }

    /// Perform the read if it has not been attempted yet
    pub async fn load<M, P, T>(&mut self, lock: &BusLock<M, P, T>) -> &ConfigMemoryState
    where
        M: RawMutex,
        P: Transact,
        T: Clock + DelayNs + Clone,
    {
        if self.state == ConfigMemoryState::Pending {
            self.state = match read_image(lock, self.config.lock_timeout_ms).await {
                Ok(image) => ConfigMemoryState::Ready(ConfigMemory::new(image)),
                Err(e) => ConfigMemoryState::ReadFailed(e),
            };
        }
        &self.state
    }

    /// Frames to broadcast now, if any
    ///
    /// The first round follows the read immediately, then one round per
    /// `rebroadcast_ms`. A failed read yields a single `ERR` frame.
    pub fn due_frames(&mut self, now_ms: u32) -> FrameBatch {
        let mut batch = FrameBatch::new();
        match &self.state {
            ConfigMemoryState::Pending => {}
            ConfigMemoryState::ReadFailed(_) => {
                if !self.failure_sent {
                    self.failure_sent = true;
                    push_frame(&mut batch, EepromFrame::ReadFail);
                }
            }
            ConfigMemoryState::Ready(memory) => {
                let due = self.next_broadcast_ms.map_or(true, |next| is_due(now_ms, next));
                if due {
                    self.next_broadcast_ms = Some(now_ms.wrapping_add(self.config.rebroadcast_ms));
                    batch = memory.frames();
                }
            }
        }
        batch
    }
}
