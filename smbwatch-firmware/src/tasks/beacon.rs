//! Device ID beacon

use defmt::*;
use embassy_net::Stack;
use embassy_rp::clocks::RoscRng;

use smbwatch_core::config::PublishConfig;
use smbwatch_core::publish::BeaconPublisher;

use super::{now_ms, wait_until};
use crate::channels::SharedBus;
use crate::net::{broadcast, SocketBuffers};

#[embassy_executor::task]
pub async fn beacon_task(stack: Stack<'static>, bus: &'static SharedBus, config: PublishConfig) {
    let mut buffers = SocketBuffers::<32, 64>::new();
    let Some(socket) = buffers.bind(stack, 0) else {
        error!("Beacon socket bind failed");
        return;
    };
    stack.wait_config_up().await;

    let mut publisher = BeaconPublisher::new(now_ms(), config);
    let mut rng = RoscRng;

    loop {
        wait_until(publisher.next_due_ms()).await;

        let Some(beacon) = publisher.poll(now_ms(), bus, &mut rng) else {
            continue;
        };
        match beacon.encode() {
            Ok(text) => {
                if let Err(e) = broadcast(&socket, config.beacon_port, text.as_bytes()).await {
                    warn!("Beacon send failed: {:?}", e);
                }
            }
            Err(e) => warn!("Beacon encode failed: {}", e),
        }
    }
}
