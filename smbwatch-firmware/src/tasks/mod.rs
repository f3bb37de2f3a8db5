//! Embassy async tasks
//!
//! Producers sample the bus through the shared lock and publish into the
//! caches in `channels`; the senders broadcast from those caches.

pub mod beacon;
pub mod core_tx;
pub mod eeprom;
pub mod expansion;
pub mod led;
pub mod net;
pub mod sensor;
pub mod title_rx;

pub use beacon::beacon_task;
pub use core_tx::core_tx_task;
pub use eeprom::eeprom_task;
pub use expansion::expansion_task;
pub use led::led_task;
pub use net::{net_task, wifi_task};
pub use sensor::sensor_task;
pub use title_rx::title_rx_task;

use embassy_time::{Instant, Timer};
use smbwatch_core::pace::is_due;

/// Uptime in wrapping milliseconds
pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Sleep until the wrapping deadline `due_ms` has passed
pub async fn wait_until(due_ms: u32) {
    let now = now_ms();
    if !is_due(now, due_ms) {
        Timer::after_millis(u64::from(due_ms.wrapping_sub(now))).await;
    }
}
