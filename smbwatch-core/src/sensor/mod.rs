//! Sensor poller
//!
//! Reads one controller register per tick in a fixed rotation:
//!
//! ```text
//! CpuTemp ─► BoardTemp ─► Fan ─► Idle ─┐
//!    ▲                                 │
//!    └─────────────────────────────────┘
//! ```
//!
//! The idle step holds the lock briefly and reads nothing, which leaves
//! room for the other producers. A failed read leaves the cached value
//! alone and pushes the next tick out by an exponential backoff.

use rand_core::RngCore;
use smbwatch_protocol::core_frame::{FAN_ABSENT, TEMP_ABSENT};
use smbwatch_protocol::CoreFrame;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use smbwatch_hal::Clock;

use crate::bus::{addr, smc, BusError, BusLock, Transact};
use crate::config::PollerConfig;
use crate::pace::{is_due, jitter, Backoff};

/// Highest raw fan value the controller reports
pub const FAN_RAW_MAX: u8 = 50;

/// Upper clamp of the corrected board temperature
pub const CORRECTED_TEMP_MAX: i32 = 120;

/// Latest accepted controller readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSample {
    pub fan_percent: Option<u8>,
    pub cpu_temp_c: Option<u8>,
    pub board_temp_c: Option<u8>,
}

impl SensorSample {
    /// Core wire record; absent fields become the wire sentinels
    pub fn to_core_frame(&self, app_name: &str) -> CoreFrame {
        CoreFrame::new(
            self.fan_percent.map_or(FAN_ABSENT, i32::from),
            self.cpu_temp_c.map_or(TEMP_ABSENT, i32::from),
            self.board_temp_c.map_or(TEMP_ABSENT, i32::from),
            app_name,
        )
    }
}

/// Round-robin position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    CpuTemp,
    BoardTemp,
    Fan,
    Idle,
}

impl Step {
    pub fn next(self) -> Self {
        match self {
            Step::CpuTemp => Step::BoardTemp,
            Step::BoardTemp => Step::Fan,
            Step::Fan => Step::Idle,
            Step::Idle => Step::CpuTemp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollError {
    Bus(BusError),
    /// Register answered with an implausible value
    OutOfRange(u8),
}

impl From<BusError> for PollError {
    fn from(e: BusError) -> Self {
        PollError::Bus(e)
    }
}

/// Result of one [`SensorPoller::poll`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// Called before the next tick was due
    NotDue,
    /// Another producer held the bus; retried after the nominal interval
    Contended,
    Sampled(Step),
    Failed(Step, PollError),
}

/// Accept a temperature strictly between 0 and 100 °C
pub fn accept_temperature(raw: u8) -> Option<u8> {
    (1..=99).contains(&raw).then_some(raw)
}

/// Map the raw 0..=50 fan value to percent
pub fn accept_fan(raw: u8) -> Option<u8> {
    (raw <= FAN_RAW_MAX).then(|| raw * 2)
}

/// Board temperature correction for the family C board
///
/// Scales by 0.8 in Fahrenheit, i.e. `0.8·C − 32/9`, rounded half away
/// from zero and clamped to `0..=120`. Computed in 1/45 °C.
pub fn correct_board_temp(celsius: u8) -> u8 {
    let num = 36 * i32::from(celsius) - 160;
    let rounded = if num >= 0 {
        (2 * num + 45) / 90
    } else {
        -((-2 * num + 45) / 90)
    };
    rounded.clamp(0, CORRECTED_TEMP_MAX) as u8
}

/// Paced round-robin reader of the controller's sensors
pub struct SensorPoller {
    config: PollerConfig,
    next_ms: u32,
    detect_at_ms: u32,
    step: Step,
    backoff: Backoff,
    family_c: Option<bool>,
    sample: SensorSample,
}

impl SensorPoller {
    /// First tick after the startup grace period
    pub fn new(now_ms: u32, config: PollerConfig) -> Self {
        Self {
            next_ms: now_ms.wrapping_add(config.startup_grace_ms),
            detect_at_ms: now_ms.wrapping_add(config.family_c_detect_delay_ms),
            step: Step::CpuTemp,
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_cap_ms, config.backoff_max_streak),
            family_c: None,
            sample: SensorSample::default(),
            config,
        }
    }

    pub fn sample(&self) -> SensorSample {
        self.sample
    }

    /// Family C board, once probed
    pub fn family_c(&self) -> Option<bool> {
        self.family_c
    }

    pub fn next_due_ms(&self) -> u32 {
        self.next_ms
    }

    /// Run one tick if it is due
    ///
    /// Never waits for the lock: contention just reschedules.
    pub async fn poll<M, P, T, R>(&mut self, now_ms: u32, lock: &BusLock<M, P, T>, rng: &mut R) -> PollOutcome
    where
        M: RawMutex,
        P: Transact,
        T: Clock + DelayNs + Clone,
        R: RngCore,
    {
        if !is_due(now_ms, self.next_ms) {
            return PollOutcome::NotDue;
        }

        let Some(mut bus) = lock.try_acquire() else {
            self.next_ms = now_ms.wrapping_add(self.config.min_tick_ms);
            return PollOutcome::Contended;
        };

        let step = self.step;
        self.step = step.next();
        let result = self.tick(&mut *bus, now_ms, step).await;
        drop(bus);

        let j = jitter(rng, self.config.jitter_min_ms, self.config.jitter_max_ms);
        match result {
            Ok(()) => {
                self.backoff.reset();
                self.next_ms = now_ms.wrapping_add(self.config.min_tick_ms).wrapping_add(j);
                PollOutcome::Sampled(step)
            }
            Err(e) => {
                let delay = self.backoff.fail();
                self.next_ms = now_ms.wrapping_add(delay).wrapping_add(j);
                PollOutcome::Failed(step, e)
            }
        }
    }

    async fn tick<P: Transact>(&mut self, bus: &mut P, now_ms: u32, step: Step) -> Result<(), PollError> {
        bus.settle().await?;

        if self.family_c.is_none() && is_due(now_ms, self.detect_at_ms) {
            // cached whether or not it answers
            self.family_c = Some(bus.read_byte(addr::XCALIBUR, 0x00).await.is_ok());
        }

        match step {
            Step::CpuTemp => {
                let raw = bus.read_byte(addr::SMC, smc::CPU_TEMP).await?;
                let c = accept_temperature(raw).ok_or(PollError::OutOfRange(raw))?;
                self.sample.cpu_temp_c = Some(c);
            }
            Step::BoardTemp => {
                let raw = bus.read_byte(addr::SMC, smc::BOARD_TEMP).await?;
                let c = accept_temperature(raw).ok_or(PollError::OutOfRange(raw))?;
                self.sample.board_temp_c = Some(if self.family_c == Some(true) {
                    correct_board_temp(c)
                } else {
                    c
                });
            }
            Step::Fan => {
                let raw = bus.read_byte(addr::SMC, smc::FAN_SPEED).await?;
                let pct = accept_fan(raw).ok_or(PollError::OutOfRange(raw))?;
                self.sample.fan_percent = Some(pct);
            }
            Step::Idle => {}
        }
        Ok(())
    }
}
