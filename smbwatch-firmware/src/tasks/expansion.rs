//! Extended status task
//!
//! Samples tray, AV pack, encoder and video mode and broadcasts each
//! complete pass on the expansion port.

use defmt::*;
use embassy_net::Stack;
use embassy_rp::clocks::RoscRng;

use smbwatch_core::config::ExpansionConfig;
use smbwatch_core::expansion::{ExtendedSampler, SampleOutcome};

use super::{now_ms, wait_until};
use crate::channels::SharedBus;
use crate::net::{broadcast, SocketBuffers};

#[embassy_executor::task]
pub async fn expansion_task(stack: Stack<'static>, bus: &'static SharedBus, config: ExpansionConfig, port: u16) {
    let mut buffers = SocketBuffers::<64, 128>::new();
    let Some(socket) = buffers.bind(stack, 0) else {
        error!("Expansion socket bind failed");
        return;
    };
    info!("Expansion task started, broadcasting to port {}", port);

    let mut sampler = ExtendedSampler::new(now_ms(), config);
    let mut rng = RoscRng;
    let mut encoder_logged = false;

    loop {
        wait_until(sampler.next_due_ms()).await;

        match sampler.poll(now_ms(), bus, &mut rng).await {
            SampleOutcome::Sampled(status) if stack.is_config_up() => {
                let frame = status.to_frame();
                if let Err(e) = broadcast(&socket, port, &frame.encode()).await {
                    warn!("Expansion send failed: {:?}", e);
                }
            }
            SampleOutcome::Sampled(_) => trace!("Network down, expansion frame dropped"),
            SampleOutcome::Failed(e) => warn!("Extended status failed: {}", e),
            SampleOutcome::Contended => trace!("Bus busy, extended status deferred"),
            SampleOutcome::NotDue => {}
        }

        if !encoder_logged {
            if let Some(encoder) = sampler.encoder() {
                match encoder {
                    Some(kind) => info!("Video encoder: {}", kind),
                    None => warn!("No video encoder answered"),
                }
                encoder_logged = true;
            }
        }
    }
}
