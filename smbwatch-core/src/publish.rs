//! Send schedules for the core channel and the device beacon
//!
//! Both only transmit while the bus has been quiet for a moment, so the
//! radio's interrupt load never lands on top of a bus transaction. The
//! expansion and config-memory channels are paced by their producers.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use rand_core::RngCore;
use smbwatch_hal::Clock;
use smbwatch_protocol::{Beacon, CoreFrame};

use crate::bus::BusLock;
use crate::config::PublishConfig;
use crate::pace::{is_due, jitter};

/// What the core schedule decided this call
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreDecision {
    NotDue,
    /// Bus was busy; checked again shortly
    Deferred,
    Unchanged,
    Send(CoreFrame),
}

/// Change-driven core frame publisher
pub struct CorePublisher {
    config: PublishConfig,
    next_ms: u32,
    last_sent: Option<CoreFrame>,
}

impl CorePublisher {
    pub fn new(now_ms: u32, config: PublishConfig) -> Self {
        Self {
            next_ms: now_ms.wrapping_add(config.check_interval_ms),
            last_sent: None,
            config,
        }
    }

    pub fn next_due_ms(&self) -> u32 {
        self.next_ms
    }

    /// Compare `current` with the last frame sent
    pub fn poll<M, P, T, R>(&mut self, now_ms: u32, lock: &BusLock<M, P, T>, current: &CoreFrame, rng: &mut R) -> CoreDecision
    where
        M: RawMutex,
        T: Clock + DelayNs + Clone,
        R: RngCore,
    {
        if !is_due(now_ms, self.next_ms) {
            return CoreDecision::NotDue;
        }
        // only fresh data waits for a quiet bus
        let changed = self.last_sent.as_ref() != Some(current);
        if changed && !lock.is_quiet(self.config.bus_quiet_ms) {
            let delay = self.config.defer_ms + jitter(rng, 0, self.config.defer_jitter_ms);
            self.next_ms = now_ms.wrapping_add(delay);
            return CoreDecision::Deferred;
        }

        let delay = self.config.check_interval_ms + jitter(rng, 0, self.config.jitter_max_ms);
        self.next_ms = now_ms.wrapping_add(delay);
        if changed {
            CoreDecision::Send(current.clone())
        } else {
            CoreDecision::Unchanged
        }
    }

    /// Record a frame that actually went out
    pub fn sent(&mut self, frame: CoreFrame) {
        self.last_sent = Some(frame);
    }
}

/// Periodic device ID beacon
pub struct BeaconPublisher {
    config: PublishConfig,
    next_ms: u32,
}

impl BeaconPublisher {
    pub fn new(now_ms: u32, config: PublishConfig) -> Self {
        Self { config, next_ms: now_ms }
    }

    pub fn next_due_ms(&self) -> u32 {
        self.next_ms
    }

    pub fn poll<M, P, T, R>(&mut self, now_ms: u32, lock: &BusLock<M, P, T>, rng: &mut R) -> Option<Beacon>
    where
        M: RawMutex,
        T: Clock + DelayNs + Clone,
        R: RngCore,
    {
        if !is_due(now_ms, self.next_ms) {
            return None;
        }
        let j = jitter(rng, 0, self.config.jitter_max_ms);
        if !lock.is_quiet(self.config.bus_quiet_ms) {
            self.next_ms = now_ms.wrapping_add(self.config.beacon_retry_ms + j);
            return None;
        }
        self.next_ms = now_ms.wrapping_add(self.config.beacon_interval_ms + j);
        Some(Beacon {
            device_id: self.config.device_id,
        })
    }
}
