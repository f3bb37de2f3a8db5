//! Transaction primitives over a raw SMBus master
//!
//! Every read is issued as a register-select write terminated by STOP,
//! a short gap, then a data read terminated by STOP. At least one console
//! revision's controller misbehaves on repeated starts, so the combined
//! form is only used by [`Transact::read_byte_compat`], which falls back
//! to the terminated form on failure.
//!
//! Each phase is raced against the controller's configured timeout. A
//! phase that loses is dropped mid-transfer, so the controller is
//! reinitialized before the timeout is reported.

use core::future::Future;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use smbwatch_hal::{BusFault, BusLines, SmBus};

use super::{BusError, Transact};
use crate::config::BusTiming;

/// Owner of the bus master and its line sampler
///
/// Lives inside [`super::BusLock`]; only a lock holder can reach it.
pub struct BusPort<B, L, D> {
    bus: B,
    lines: L,
    delay: D,
    timing: BusTiming,
    stuck_streak: u8,
    reinits: u32,
}

fn fault<E: Into<BusFault>>(e: E) -> BusError {
    BusError::Fault(e.into())
}

/// Run one bus phase, giving up after `timeout_ms`
async fn bounded<D, E, F>(delay: &mut D, timeout_ms: u32, phase: F) -> Result<(), BusError>
where
    D: DelayNs,
    E: Into<BusFault>,
    F: Future<Output = Result<(), E>>,
{
    match select(phase, delay.delay_ms(timeout_ms)).await {
        Either::First(result) => result.map_err(fault),
        Either::Second(()) => Err(BusError::Fault(BusFault::Timeout)),
    }
}

impl<B, L, D> BusPort<B, L, D>
where
    B: SmBus,
    L: BusLines,
    D: DelayNs,
{
    pub fn new(bus: B, lines: L, delay: D, timing: BusTiming) -> Self {
        Self {
            bus,
            lines,
            delay,
            timing,
            stuck_streak: 0,
            reinits: 0,
        }
    }

    /// Number of soft reinitializations performed so far
    pub fn reinit_count(&self) -> u32 {
        self.reinits
    }

    /// Sample both lines until they read idle for `idle_checks` samples in a row
    async fn wait_idle(&mut self) -> bool {
        let spacing = self.timing.idle_sample_us.max(1);
        let samples = (self.timing.idle_wait_ms * 1000 / spacing).max(1);
        let mut stable = 0u8;

        for _ in 0..samples {
            if self.lines.is_idle() {
                stable += 1;
                if stable >= self.timing.idle_checks {
                    return true;
                }
            } else {
                stable = 0;
            }
            self.delay.delay_us(spacing).await;
        }
        false
    }

    async fn gap(&mut self) {
        self.delay.delay_us(self.timing.op_gap_us).await;
    }

    /// Reinitialize after a timed-out phase so the next one starts clean
    fn recover(&mut self, result: Result<(), BusError>) -> Result<(), BusError> {
        if result == Err(BusError::Fault(BusFault::Timeout)) {
            self.bus.reinit();
            self.reinits = self.reinits.wrapping_add(1);
        }
        result
    }

    async fn write_phase(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        let timeout_ms = self.bus.config().timeout_ms;
        let result = bounded(&mut self.delay, timeout_ms, self.bus.write(address, data)).await;
        self.recover(result)
    }

    async fn read_phase(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let timeout_ms = self.bus.config().timeout_ms;
        let result = bounded(&mut self.delay, timeout_ms, self.bus.read(address, buf)).await;
        self.recover(result)
    }

    async fn write_read_phase(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let timeout_ms = self.bus.config().timeout_ms;
        let result = bounded(&mut self.delay, timeout_ms, self.bus.write_read(address, &[reg], buf)).await;
        self.recover(result)
    }

    async fn select(&mut self, address: u8, reg: u8) -> Result<(), BusError> {
        self.write_phase(address, &[reg]).await?;
        self.gap().await;
        Ok(())
    }
}

impl<B, L, D> Transact for BusPort<B, L, D>
where
    B: SmBus,
    L: BusLines,
    D: DelayNs,
{
    async fn settle(&mut self) -> Result<(), BusError> {
        if self.wait_idle().await {
            self.stuck_streak = 0;
            return Ok(());
        }

        let mut reinitialized = false;
        self.stuck_streak = self.stuck_streak.saturating_add(1);
        if self.stuck_streak >= self.timing.wedged_threshold {
            self.bus.reinit();
            self.reinits = self.reinits.wrapping_add(1);
            self.stuck_streak = 0;
            reinitialized = true;
        }

        if self.wait_idle().await {
            Ok(())
        } else if reinitialized {
            Err(BusError::Wedged)
        } else {
            Err(BusError::Busy)
        }
    }

    async fn read_byte(&mut self, address: u8, reg: u8) -> Result<u8, BusError> {
        self.select(address, reg).await?;
        let mut buf = [0u8; 1];
        self.read_phase(address, &mut buf).await?;
        self.gap().await;
        Ok(buf[0])
    }

    async fn read_byte_compat(&mut self, address: u8, reg: u8) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        match self.write_read_phase(address, reg, &mut buf).await {
            Ok(()) => {
                self.gap().await;
                Ok(buf[0])
            }
            Err(_) => {
                self.gap().await;
                self.read_byte(address, reg).await
            }
        }
    }

    async fn read_word(&mut self, address: u8, reg: u8) -> Result<u16, BusError> {
        self.select(address, reg).await?;
        let mut buf = [0u8; 2];
        self.read_phase(address, &mut buf).await?;
        self.gap().await;
        Ok(u16::from_be_bytes(buf))
    }

    async fn read_block(&mut self, address: u8, offset: u8, out: &mut [u8]) -> Result<(), BusError> {
        let chunk_len = self.timing.chunk_len.max(1);
        for (i, chunk) in out.chunks_mut(chunk_len).enumerate() {
            let start = offset.wrapping_add((i * chunk_len) as u8);
            self.select(address, start).await?;
            self.read_phase(address, chunk).await?;
            self.delay.delay_us(self.timing.chunk_gap_us).await;
        }
        Ok(())
    }
}
