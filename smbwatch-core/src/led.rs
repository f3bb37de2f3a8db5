//! Status LED patterns
//!
//! The Pico W has one on/off LED behind the radio, so every state maps to
//! a steady level or a blink. A sent datagram briefly turns the LED off
//! on top of whatever the link state shows.

use crate::pace::is_due;

/// Half period of the blink while joining
pub const JOIN_BLINK_MS: u32 = 400;

/// How long the LED stays dark after a datagram goes out
pub const TX_FLASH_MS: u32 = 150;

/// Link state shown on the LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedStatus {
    /// Steady on until the first join attempt
    Booting,
    /// Blinking while associating with the access point
    Joining,
    /// Steady off between failed join attempts
    JoinFailed,
    /// Steady on, flashed by transmits
    Connected,
}

/// Input to the LED task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedEvent {
    Status(LedStatus),
    Transmit,
}

/// Current LED pattern
#[derive(Debug, Clone)]
pub struct LedIndicator {
    status: LedStatus,
    since_ms: u32,
    flash_until: Option<u32>,
}

impl LedIndicator {
    pub fn new(now_ms: u32) -> Self {
        Self {
            status: LedStatus::Booting,
            since_ms: now_ms,
            flash_until: None,
        }
    }

    pub fn status(&self) -> LedStatus {
        self.status
    }

    pub fn apply(&mut self, event: LedEvent, now_ms: u32) {
        match event {
            LedEvent::Status(status) => self.set_status(status, now_ms),
            LedEvent::Transmit => self.transmitted(now_ms),
        }
    }

    /// Switch state; the blink phase restarts only on a real change
    pub fn set_status(&mut self, status: LedStatus, now_ms: u32) {
        if status != self.status {
            self.status = status;
            self.since_ms = now_ms;
            self.flash_until = None;
        }
    }

    /// Flash for a sent datagram; ignored unless connected
    pub fn transmitted(&mut self, now_ms: u32) {
        if self.status == LedStatus::Connected {
            self.flash_until = Some(now_ms.wrapping_add(TX_FLASH_MS));
        }
    }

    fn flashing(&self, now_ms: u32) -> bool {
        self.flash_until.is_some_and(|until| !is_due(now_ms, until))
    }

    /// LED level at `now_ms`
    pub fn level(&self, now_ms: u32) -> bool {
        if self.flashing(now_ms) {
            return false;
        }
        match self.status {
            LedStatus::Booting | LedStatus::Connected => true,
            LedStatus::JoinFailed => false,
            LedStatus::Joining => (now_ms.wrapping_sub(self.since_ms) / JOIN_BLINK_MS) % 2 == 0,
        }
    }

    /// When the level next changes without a new event
    pub fn next_change_ms(&self, now_ms: u32) -> Option<u32> {
        if let Some(until) = self.flash_until.filter(|_| self.flashing(now_ms)) {
            return Some(until);
        }
        match self.status {
            LedStatus::Joining => {
                let phase = now_ms.wrapping_sub(self.since_ms) / JOIN_BLINK_MS;
                Some(self.since_ms.wrapping_add((phase + 1) * JOIN_BLINK_MS))
            }
            _ => None,
        }
    }
}
