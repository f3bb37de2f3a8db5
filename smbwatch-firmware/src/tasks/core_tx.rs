//! Core channel sender
//!
//! Builds the core frame from the cached sample and app name and sends it
//! only when it differs from the last frame that actually went out.

use defmt::*;
use embassy_net::Stack;
use embassy_rp::clocks::RoscRng;

use smbwatch_core::config::PublishConfig;
use smbwatch_core::publish::{CoreDecision, CorePublisher};

use super::{now_ms, wait_until};
use crate::channels::{SharedBus, APP_NAME, SENSOR_SAMPLE};
use crate::net::{broadcast, SocketBuffers};

#[embassy_executor::task]
pub async fn core_tx_task(stack: Stack<'static>, bus: &'static SharedBus, config: PublishConfig) {
    let mut buffers = SocketBuffers::<64, 256>::new();
    let Some(socket) = buffers.bind(stack, 0) else {
        error!("Core socket bind failed");
        return;
    };
    stack.wait_config_up().await;
    info!("Core sender started on port {}", config.core_port);

    let mut publisher = CorePublisher::new(now_ms(), config);
    let mut rng = RoscRng;

    loop {
        wait_until(publisher.next_due_ms()).await;

        let current = SENSOR_SAMPLE.get().to_core_frame(&APP_NAME.get());
        match publisher.poll(now_ms(), bus, &current, &mut rng) {
            CoreDecision::Send(frame) => match broadcast(&socket, config.core_port, &frame.encode()).await {
                Ok(()) => {
                    debug!("Core frame sent: {}", frame);
                    publisher.sent(frame);
                }
                // retried at the next check
                Err(e) => warn!("Core send failed: {:?}", e),
            },
            CoreDecision::Deferred => trace!("Bus active, core send deferred"),
            CoreDecision::Unchanged | CoreDecision::NotDue => {}
        }
    }
}
