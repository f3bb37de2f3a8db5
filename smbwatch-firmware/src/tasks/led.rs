//! Status LED on the radio's GPIO 0
//!
//! Steady on while booting, blinking while joining, dark after a failed
//! join and steady on once connected. Every broadcast flashes it off.
//! The radio mutex is also taken by join attempts, so the LED holds its
//! level while one is in flight.

use defmt::*;
use embassy_time::{with_timeout, Duration};

use smbwatch_core::led::LedIndicator;

use super::now_ms;
use crate::channels::{SharedControl, LED_EVENTS};

/// Radio GPIO wired to the onboard LED
const LED_GPIO: u8 = 0;

#[embassy_executor::task]
pub async fn led_task(control: SharedControl) -> ! {
    let mut led = LedIndicator::new(now_ms());
    let mut lit = None;

    loop {
        let now = now_ms();
        let level = led.level(now);
        if lit != Some(level) {
            control.0.lock().await.gpio_set(LED_GPIO, level).await;
            lit = Some(level);
        }

        let event = match led.next_change_ms(now) {
            Some(due) => {
                let wait = Duration::from_millis(u64::from(due.wrapping_sub(now)));
                with_timeout(wait, LED_EVENTS.receive()).await.ok()
            }
            None => Some(LED_EVENTS.receive().await),
        };
        if let Some(event) = event {
            trace!("LED event {}", event);
            led.apply(event, now_ms());
        }
    }
}
