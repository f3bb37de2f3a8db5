//! Host fakes for the bus, its lines and time

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_async::delay::DelayNs;
use smbwatch_hal::{BusConfig, BusFault, BusLines, Clock, SmBus};

use crate::bus::{BusLock, BusPort};
use crate::config::BusTiming;

/// Shared clock whose delays advance time instead of sleeping
#[derive(Clone, Default)]
pub struct MockTimer {
    us: Arc<AtomicU64>,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_us(&self) -> u64 {
        self.us.load(Ordering::SeqCst)
    }

    pub fn set_ms(&self, ms: u32) {
        self.us.store(u64::from(ms) * 1000, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u32) {
        self.us.fetch_add(u64::from(ms) * 1000, Ordering::SeqCst);
    }
}

impl Clock for MockTimer {
    fn now_ms(&self) -> u32 {
        (self.now_us() / 1000) as u32
    }
}

impl DelayNs for MockTimer {
    async fn delay_ns(&mut self, ns: u32) {
        self.us.fetch_add(u64::from(ns).div_ceil(1000), Ordering::SeqCst);
        embassy_futures::yield_now().await;
    }

    async fn delay_us(&mut self, us: u32) {
        self.us.fetch_add(u64::from(us), Ordering::SeqCst);
        embassy_futures::yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(ms);
        embassy_futures::yield_now().await;
    }
}

#[derive(Default)]
struct LineState {
    busy_samples: u32,
    stuck: bool,
}

/// Scriptable SDA/SCL levels
#[derive(Clone, Default)]
pub struct FakeLines {
    state: Rc<RefCell<LineState>>,
}

impl FakeLines {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Lines held low until released
    pub fn stuck() -> Self {
        let lines = Self::default();
        lines.hold();
        lines
    }

    /// Report busy for the next `samples` observations
    pub fn busy_for(&self, samples: u32) {
        self.state.borrow_mut().busy_samples = samples;
    }

    pub fn hold(&self) {
        self.state.borrow_mut().stuck = true;
    }

    pub fn release(&self) {
        self.state.borrow_mut().stuck = false;
    }
}

impl BusLines for FakeLines {
    fn sda_high(&self) -> bool {
        self.is_idle()
    }

    fn scl_high(&self) -> bool {
        self.is_idle()
    }

    fn is_idle(&self) -> bool {
        let mut s = self.state.borrow_mut();
        if s.stuck {
            return false;
        }
        if s.busy_samples > 0 {
            s.busy_samples -= 1;
            return false;
        }
        true
    }
}

/// One recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Register select terminated by STOP
    Write(u8, u8),
    /// Data read terminated by STOP, with length
    Read(u8, usize),
    /// Repeated-start read of one register
    WriteRead(u8, u8),
}

#[derive(Default)]
struct BusState {
    memory: HashMap<u8, [u8; 256]>,
    pointer: HashMap<u8, u8>,
    failing: HashSet<(u8, u8)>,
    hanging: HashSet<(u8, u8)>,
    no_repeated_start: HashSet<u8>,
    log: Vec<Op>,
    reinits: u32,
}

/// Register-file devices with an auto-increment pointer
///
/// An address with no memory configured does not acknowledge. Clones
/// share state, so a test keeps a handle after moving one into a port.
#[derive(Clone, Default)]
pub struct FakeBus {
    state: Rc<RefCell<BusState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reg(&self, address: u8, reg: u8, value: u8) {
        self.state
            .borrow_mut()
            .memory
            .entry(address)
            .or_insert([0; 256])[reg as usize] = value;
    }

    /// Store a word MSB first at `reg`
    pub fn set_word(&self, address: u8, reg: u8, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.set_reg(address, reg, hi);
        self.set_reg(address, reg.wrapping_add(1), lo);
    }

    pub fn set_memory(&self, address: u8, image: [u8; 256]) {
        self.state.borrow_mut().memory.insert(address, image);
    }

    /// Make every read starting at `reg` fail
    pub fn fail_reg(&self, address: u8, reg: u8) {
        self.state.borrow_mut().failing.insert((address, reg));
    }

    pub fn heal_reg(&self, address: u8, reg: u8) {
        self.state.borrow_mut().failing.remove(&(address, reg));
        self.state.borrow_mut().hanging.remove(&(address, reg));
    }

    /// Make every read starting at `reg` stall forever, like a held clock
    pub fn hang_reg(&self, address: u8, reg: u8) {
        self.state.borrow_mut().hanging.insert((address, reg));
    }

    pub fn reject_repeated_start(&self, address: u8) {
        self.state.borrow_mut().no_repeated_start.insert(address);
    }

    pub fn log(&self) -> Vec<Op> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    pub fn reinits(&self) -> u32 {
        self.state.borrow().reinits
    }

    /// Any register select or write-read was issued to `address`
    pub fn touched(&self, address: u8) -> bool {
        self.log().iter().any(|op| match *op {
            Op::Write(a, _) | Op::Read(a, _) | Op::WriteRead(a, _) => a == address,
        })
    }
}

impl SmBus for FakeBus {
    type Error = BusFault;

    async fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusFault> {
        let mut s = self.state.borrow_mut();
        let reg = data.first().copied().unwrap_or(0);
        s.log.push(Op::Write(address, reg));
        if !s.memory.contains_key(&address) {
            return Err(BusFault::Nack);
        }
        s.pointer.insert(address, reg);
        Ok(())
    }

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        let hang = {
            let mut s = self.state.borrow_mut();
            s.log.push(Op::Read(address, buf.len()));
            let start = s.pointer.get(&address).copied().unwrap_or(0);
            s.hanging.contains(&(address, start))
        };
        if hang {
            core::future::pending::<()>().await;
        }
        self.read_now(address, buf)
    }

    async fn write_read(&mut self, address: u8, write_data: &[u8], read_buf: &mut [u8]) -> Result<(), BusFault> {
        let reg = write_data.first().copied().unwrap_or(0);
        {
            let mut s = self.state.borrow_mut();
            s.log.push(Op::WriteRead(address, reg));
            if s.no_repeated_start.contains(&address) {
                return Err(BusFault::ArbitrationLost);
            }
            if !s.memory.contains_key(&address) {
                return Err(BusFault::Nack);
            }
            if s.hanging.contains(&(address, reg)) {
                drop(s);
                core::future::pending::<()>().await;
                return Ok(());
            }
            s.pointer.insert(address, reg);
        }
        self.read_now(address, read_buf)
    }

    fn reinit(&mut self) {
        self.state.borrow_mut().reinits += 1;
    }

    fn config(&self) -> BusConfig {
        BusConfig::CONSOLE
    }
}

impl FakeBus {
    /// Data phase from the current pointer, without logging
    fn read_now(&self, address: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        let mut s = self.state.borrow_mut();
        let start = s.pointer.get(&address).copied().unwrap_or(0);
        if s.failing.contains(&(address, start)) {
            return Err(BusFault::Other);
        }
        let Some(mem) = s.memory.get(&address).copied() else {
            return Err(BusFault::Nack);
        };
        let mut ptr = start;
        for b in buf.iter_mut() {
            *b = mem[ptr as usize];
            ptr = ptr.wrapping_add(1);
        }
        s.pointer.insert(address, ptr);
        Ok(())
    }
}

pub type TestPort = BusPort<FakeBus, FakeLines, MockTimer>;
pub type TestLock = BusLock<NoopRawMutex, TestPort, MockTimer>;

/// Lock over a fake bus with idle lines and default timing
pub fn test_lock(bus: &FakeBus, timer: &MockTimer) -> TestLock {
    let timing = BusTiming::default();
    let port = BusPort::new(bus.clone(), FakeLines::idle(), timer.clone(), timing);
    BusLock::new(port, timer.clone(), timing.lock_poll_ms)
}
