//! Shared state between Embassy tasks
//!
//! Each cell has exactly one producer task holding its writer. The
//! publishers read snapshots.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;

use smbwatch_core::bus::{BusLock, BusPort};
use smbwatch_core::cache::Shared;
use smbwatch_core::led::LedEvent;
use smbwatch_core::sensor::SensorSample;
use smbwatch_hal::PinLines;
use smbwatch_hal_rp2040::{EmbassyTimer, RpSmBus, SioPin};
use smbwatch_protocol::AppName;

use embassy_rp::peripherals::I2C0;

/// Transaction port on the tapped bus
pub type Port = BusPort<RpSmBus<'static, I2C0>, PinLines<SioPin, SioPin>, EmbassyTimer>;

/// The one bus lock every producer goes through
pub type SharedBus = BusLock<CriticalSectionRawMutex, Port, EmbassyTimer>;

/// Latest accepted sensor readings (written by the sensor task)
pub static SENSOR_SAMPLE: Shared<CriticalSectionRawMutex, SensorSample> = Shared::new(SensorSample {
    fan_percent: None,
    cpu_temp_c: None,
    board_temp_c: None,
});

/// Running title name (written by the title listener)
pub static APP_NAME: Shared<CriticalSectionRawMutex, AppName> = Shared::new(AppName::new());

/// Channel capacity for LED events
const LED_CHANNEL_SIZE: usize = 8;

/// Link state changes and transmit flashes for the LED task
pub static LED_EVENTS: Channel<CriticalSectionRawMutex, LedEvent, LED_CHANNEL_SIZE> = Channel::new();

/// Radio control shared by the link loop and the LED task
#[derive(Clone, Copy)]
pub struct SharedControl(pub &'static Mutex<CriticalSectionRawMutex, cyw43::Control<'static>>);

/// Queue an LED event without waiting
///
/// A full queue means the LED is already behind; the event is dropped.
pub fn notify_led(event: LedEvent) {
    if LED_EVENTS.try_send(event).is_err() {
        trace!("LED queue full, dropped {}", event);
    }
}
