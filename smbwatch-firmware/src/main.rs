//! smbwatch - console bus monitor firmware
//!
//! Runs on a Pico W tapped onto the console's management bus. Reads the
//! controller's sensors, the extended AV status and the configuration
//! memory, and broadcasts everything as UDP datagrams on the local
//! network.
//!
//! The radio firmware is not linked in. Flash it once next to the
//! application:
//!
//! ```text
//! probe-rs download 43439A0.bin --binary-format bin --chip RP2040 --base-address 0x10100000
//! probe-rs download 43439A0_clm.bin --binary-format bin --chip RP2040 --base-address 0x10140000
//! ```

#![no_std]
#![no_main]

use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::{I2C0, PIO0};
use embassy_rp::pio::{self, Pio};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use rand_core::RngCore;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use smbwatch_core::bus::{BusLock, BusPort};
use smbwatch_core::led::{LedEvent, LedStatus};
use smbwatch_hal_rp2040::i2c::i2c_config;
use smbwatch_hal_rp2040::{sio_lines, EmbassyTimer, RpSmBus};

use crate::channels::{SharedBus, SharedControl, LED_EVENTS};
use crate::config::{parse_config, FirmwareConfig, WifiConfig};

mod channels;
mod config;
mod net;
mod tasks;

/// Embedded configuration (compiled into firmware)
/// Edit monitor.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../monitor.toml");

/// Radio firmware blobs, flashed separately
const CYW43_FW_ADDR: usize = 0x1010_0000;
const CYW43_FW_LEN: usize = 230_321;
const CYW43_CLM_ADDR: usize = 0x1014_0000;
const CYW43_CLM_LEN: usize = 4_752;

/// Delay between join attempts and link checks
const JOIN_RETRY_SECS: u64 = 5;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
});

static BUS: StaticCell<SharedBus> = StaticCell::new();
static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<8>> = StaticCell::new();
static CONTROL: StaticCell<Mutex<CriticalSectionRawMutex, cyw43::Control<'static>>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("smbwatch firmware starting...");

    let p = embassy_rp::init(Default::default());
    let config = load_config();

    // Tapped bus on I2C0. Pads are sampled through SIO for idle detection
    let bus_config = config.pins.bus_config();
    let i2c_cfg = i2c_config(&bus_config);
    let (sda, scl) = match (config.pins.sda_pin, config.pins.scl_pin) {
        pair @ ((0, 1) | (4, 5) | (8, 9) | (12, 13) | (16, 17) | (20, 21)) => pair,
        (sda, scl) => {
            warn!("SDA {} / SCL {} is not an I2C0 pin pair, using 4 / 5", sda, scl);
            (4, 5)
        }
    };
    let i2c = match (sda, scl) {
        (0, 1) => I2c::new_async(p.I2C0, p.PIN_1, p.PIN_0, Irqs, i2c_cfg),
        (8, 9) => I2c::new_async(p.I2C0, p.PIN_9, p.PIN_8, Irqs, i2c_cfg),
        (12, 13) => I2c::new_async(p.I2C0, p.PIN_13, p.PIN_12, Irqs, i2c_cfg),
        (16, 17) => I2c::new_async(p.I2C0, p.PIN_17, p.PIN_16, Irqs, i2c_cfg),
        (20, 21) => I2c::new_async(p.I2C0, p.PIN_21, p.PIN_20, Irqs, i2c_cfg),
        _ => I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c_cfg),
    };
    let Some(lines) = sio_lines(sda, scl) else {
        // unreachable for the pairs above
        error!("Invalid bus pads");
        return;
    };
    let port = BusPort::new(RpSmBus::new(i2c, bus_config), lines, EmbassyTimer, config.monitor.bus);
    let bus: &'static SharedBus = BUS.init(BusLock::new(port, EmbassyTimer, config.monitor.bus.lock_poll_ms));
    info!("Bus tap on SDA {} / SCL {} at {} Hz", sda, scl, bus_config.frequency);

    // CYW43 radio over PIO SPI
    // SAFETY: the blobs are written to these flash regions before first boot
    // and nothing else is placed there (see memory.x)
    let fw = unsafe { core::slice::from_raw_parts(CYW43_FW_ADDR as *const u8, CYW43_FW_LEN) };
    let clm = unsafe { core::slice::from_raw_parts(CYW43_CLM_ADDR as *const u8, CYW43_CLM_LEN) };

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(tasks::wifi_task(runner)).unwrap();

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;
    let control = SharedControl(CONTROL.init(Mutex::new(control)));
    spawner.spawn(tasks::led_task(control)).unwrap();

    let seed = RoscRng.next_u64();
    let (stack, runner) = embassy_net::new(
        net_device,
        NetConfig::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(tasks::net_task(runner)).unwrap();

    // Bus producers start on their own grace timers, network or not
    let m = config.monitor;
    spawner.spawn(tasks::sensor_task(bus, m.poller)).unwrap();
    spawner
        .spawn(tasks::expansion_task(stack, bus, m.expansion, m.publish.expansion_port))
        .unwrap();
    spawner
        .spawn(tasks::eeprom_task(
            stack,
            bus,
            m.eeprom,
            m.expansion.startup_grace_ms,
            m.publish.eeprom_port,
        ))
        .unwrap();
    spawner.spawn(tasks::core_tx_task(stack, bus, m.publish)).unwrap();
    spawner.spawn(tasks::beacon_task(stack, bus, m.publish)).unwrap();
    spawner.spawn(tasks::title_rx_task(stack, m.publish.title_port)).unwrap();

    join(control, &config.wifi).await;
    stack.wait_config_up().await;
    if let Some(v4) = stack.config_v4() {
        info!("Network up, address {}", v4.address);
    }

    info!("All tasks spawned, firmware running");

    // Keep the association alive
    loop {
        Timer::after_secs(JOIN_RETRY_SECS).await;
        if !stack.is_link_up() {
            warn!("Link lost, rejoining");
            join(control, &config.wifi).await;
        }
        trace!("Link check ok");
    }
}

/// Parse the embedded configuration, falling back to defaults
fn load_config() -> FirmwareConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            // build.rs validates monitor.toml, so this is a parser/validator mismatch
            error!("Failed to parse embedded config: {}", e);
            error!("Using default configuration");
            FirmwareConfig::default()
        }
    }
}

/// Join the configured network, retrying until it succeeds
async fn join(control: SharedControl, wifi: &WifiConfig) {
    info!("Connecting to WiFi: {}", wifi.ssid.as_str());
    loop {
        LED_EVENTS.send(LedEvent::Status(LedStatus::Joining)).await;
        let options = if wifi.password.is_empty() {
            cyw43::JoinOptions::new_open()
        } else {
            cyw43::JoinOptions::new(wifi.password.as_bytes())
        };
        let result = control.0.lock().await.join(wifi.ssid.as_str(), options).await;
        match result {
            Ok(()) => {
                info!("WiFi connected");
                LED_EVENTS.send(LedEvent::Status(LedStatus::Connected)).await;
                return;
            }
            Err(e) => {
                warn!("WiFi join failed: status={}, retrying in {}s", e.status, JOIN_RETRY_SECS);
                LED_EVENTS.send(LedEvent::Status(LedStatus::JoinFailed)).await;
                Timer::after_secs(JOIN_RETRY_SECS).await;
            }
        }
    }
}
