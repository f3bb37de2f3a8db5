//! Sensor poller task
//!
//! Round-robins the controller's temperature and fan registers and keeps
//! the latest accepted values in `SENSOR_SAMPLE`.

use defmt::*;
use embassy_rp::clocks::RoscRng;

use smbwatch_core::config::PollerConfig;
use smbwatch_core::sensor::{PollOutcome, SensorPoller};

use super::{now_ms, wait_until};
use crate::channels::{SharedBus, SENSOR_SAMPLE};

#[embassy_executor::task]
pub async fn sensor_task(bus: &'static SharedBus, config: PollerConfig) {
    let Some(mut sample) = SENSOR_SAMPLE.writer() else {
        error!("Sensor sample already has a writer");
        return;
    };
    info!("Sensor task started, first poll in {} ms", config.startup_grace_ms);

    let mut poller = SensorPoller::new(now_ms(), config);
    let mut rng = RoscRng;
    let mut family_logged = false;

    loop {
        wait_until(poller.next_due_ms()).await;

        match poller.poll(now_ms(), bus, &mut rng).await {
            PollOutcome::Sampled(step) => {
                trace!("Sampled {}", step);
                sample.publish(poller.sample());
            }
            PollOutcome::Failed(step, e) => {
                warn!("Sensor step {} failed: {}", step, e);
            }
            PollOutcome::Contended => trace!("Bus busy, sensor tick skipped"),
            PollOutcome::NotDue => {}
        }

        if !family_logged {
            if let Some(family_c) = poller.family_c() {
                info!("Family C board: {}", family_c);
                family_logged = true;
            }
        }
    }
}
