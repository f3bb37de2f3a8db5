//! Deadlines, jitter and exponential backoff
//!
//! All times are `u32` milliseconds since boot and wrap; comparisons go
//! through [`is_due`].

use rand_core::RngCore;

/// True once `now` has reached `deadline`, across wraparound
pub fn is_due(now_ms: u32, deadline_ms: u32) -> bool {
    (now_ms.wrapping_sub(deadline_ms) as i32) >= 0
}

/// Uniform value in `min..=max`
pub fn jitter<R: RngCore>(rng: &mut R, min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    // the full u32 range has no representable span
    min + rng.next_u32() % (max - min).saturating_add(1)
}

/// Exponential backoff with a capped failure streak
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Backoff {
    base_ms: u32,
    cap_ms: u32,
    max_streak: u8,
    streak: u8,
}

impl Backoff {
    pub fn new(base_ms: u32, cap_ms: u32, max_streak: u8) -> Self {
        Self {
            base_ms,
            cap_ms,
            max_streak: max_streak.max(1),
            streak: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt
    ///
    /// `base << (streak - 1)`, capped.
    pub fn fail(&mut self) -> u32 {
        if self.streak < self.max_streak {
            self.streak += 1;
        }
        let shift = u32::from(self.streak - 1);
        self.base_ms
            .checked_shl(shift)
            .filter(|d| d >> shift == self.base_ms)
            .unwrap_or(u32::MAX)
            .min(self.cap_ms)
    }

    pub fn reset(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u8 {
        self.streak
    }
}
