//! Configuration memory task
//!
//! Reads the 256-byte image once, after the startup grace period and
//! with the network up, then rebroadcasts the decoded lines forever. A
//! failed read is reported once and never retried.

use defmt::*;
use embassy_net::Stack;
use embassy_time::Timer;

use smbwatch_core::config::EepromConfig;
use smbwatch_core::eeprom::{ConfigMemoryReader, ConfigMemoryState};
use smbwatch_protocol::eeprom::MAX_LINE_LEN;

use super::{now_ms, wait_until};
use crate::channels::SharedBus;
use crate::net::{broadcast, SocketBuffers};

/// Rebroadcast schedule check interval
const CHECK_INTERVAL_MS: u64 = 250;

#[embassy_executor::task]
pub async fn eeprom_task(stack: Stack<'static>, bus: &'static SharedBus, config: EepromConfig, grace_ms: u32, port: u16) {
    let mut buffers = SocketBuffers::<64, { 2 * MAX_LINE_LEN }>::new();
    let Some(socket) = buffers.bind(stack, 0) else {
        error!("EEPROM socket bind failed");
        return;
    };

    wait_until(now_ms().wrapping_add(grace_ms)).await;
    stack.wait_config_up().await;

    let mut reader = ConfigMemoryReader::new(config);
    match reader.load(bus).await {
        ConfigMemoryState::Ready(memory) => match memory.recovered() {
            Some(_) => info!("Configuration memory read, device key recovered"),
            None => warn!("Configuration memory read, no device key matched"),
        },
        ConfigMemoryState::ReadFailed(e) => error!("Configuration memory read failed: {}", e),
        ConfigMemoryState::Pending => {}
    }

    loop {
        for frame in reader.due_frames(now_ms()) {
            match frame.encode() {
                Ok(line) => {
                    if let Err(e) = broadcast(&socket, port, line.as_bytes()).await {
                        warn!("EEPROM send failed: {:?}", e);
                    }
                }
                Err(e) => warn!("EEPROM line encode failed: {}", e),
            }
        }
        Timer::after_millis(CHECK_INTERVAL_MS).await;
    }
}
