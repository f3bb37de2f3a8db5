//! `embassy-time` backed clock and delay

use embassy_time::{Delay, Instant};
use embedded_hal_async::delay::DelayNs;
use smbwatch_hal::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTimer;

impl Clock for EmbassyTimer {
    fn now_ms(&self) -> u32 {
        // wraps after ~49 days
        Instant::now().as_millis() as u32
    }
}

impl DelayNs for EmbassyTimer {
    async fn delay_ns(&mut self, ns: u32) {
        DelayNs::delay_ns(&mut Delay, ns).await
    }

    async fn delay_us(&mut self, us: u32) {
        DelayNs::delay_us(&mut Delay, us).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        DelayNs::delay_ms(&mut Delay, ms).await
    }
}
