//! Extended status sampler
//!
//! Each pass reads the controller's tray, AV-pack and firmware version
//! registers, then works out the console revision and the active video
//! mode from whichever encoder is fitted.
//!
//! ```text
//! settle ─► tray / AV / PIC ─► encoder (probed once) ─► revision ─► video
//!              │ any failure
//!              ▼
//!          no frame, backoff
//! ```

pub mod video;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use rand_core::RngCore;
use smbwatch_hal::Clock;
use smbwatch_protocol::expansion::UNKNOWN;
use smbwatch_protocol::ExpansionFrame;

use crate::bus::{addr, smc, BusError, BusLock, Transact};
use crate::config::ExpansionConfig;
use crate::pace::{is_due, jitter, Backoff};

pub use video::Resolution;

/// Highest revision byte the controller reports directly
pub const MAX_REPORTED_REVISION: u8 = 6;

/// Family C register holding the mode code
pub const XCALIBUR_MODE_REG: u8 = 0x1C;

/// Family A flags / raster select register
pub const CONEXANT_MODE_REG: u8 = 0x2E;

/// Video encoder families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderKind {
    /// Family A
    Conexant,
    /// Family B
    Focus,
    /// Family C, fitted only to the last board revision
    Xcalibur,
}

impl EncoderKind {
    /// Detection order
    pub const PROBE_ORDER: [EncoderKind; 3] = [EncoderKind::Conexant, EncoderKind::Focus, EncoderKind::Xcalibur];

    pub const fn address(self) -> u8 {
        match self {
            EncoderKind::Conexant => addr::CONEXANT,
            EncoderKind::Focus => addr::FOCUS,
            EncoderKind::Xcalibur => addr::XCALIBUR,
        }
    }

    pub fn from_address(address: u8) -> Option<Self> {
        Self::PROBE_ORDER.into_iter().find(|k| k.address() == address)
    }
}

/// One consistent extended status pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtendedStatus {
    pub tray: u8,
    pub av_pack: u8,
    pub pic_version: u8,
    pub console_revision: Option<u8>,
    pub encoder: Option<EncoderKind>,
    pub video: Resolution,
}

impl ExtendedStatus {
    pub fn to_frame(&self) -> ExpansionFrame {
        ExpansionFrame {
            tray: i32::from(self.tray),
            av_pack: i32::from(self.av_pack),
            pic_version: i32::from(self.pic_version),
            console_revision: self.console_revision.map_or(UNKNOWN, i32::from),
            width: i32::from(self.video.width),
            height: i32::from(self.video.height),
            encoder_address: self.encoder.map_or(UNKNOWN, |e| i32::from(e.address())),
        }
    }
}

/// Console revision priority policy
///
/// A reported byte in `0..=6` wins. Family C only exists on revision 6.
/// Anything else stays unknown.
pub fn resolve_revision(reported: Option<u8>, encoder: Option<EncoderKind>) -> Option<u8> {
    match reported {
        Some(rev) if rev <= MAX_REPORTED_REVISION => Some(rev),
        _ if encoder == Some(EncoderKind::Xcalibur) => Some(MAX_REPORTED_REVISION),
        _ => None,
    }
}

/// Result of one [`ExtendedSampler::poll`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleOutcome {
    NotDue,
    Contended,
    /// A complete pass; publish it
    Sampled(ExtendedStatus),
    /// A base register failed; nothing to publish
    Failed(BusError),
}

/// Rate-limited family C mode code
#[derive(Debug, Clone, Copy, Default)]
struct ModeCache {
    code: Option<u8>,
    probed_at_ms: Option<u32>,
}

/// Paced extended status reader
pub struct ExtendedSampler {
    config: ExpansionConfig,
    next_ms: u32,
    backoff: Backoff,
    /// `None` until probed; the inner `None` means nothing answered
    encoder: Option<Option<EncoderKind>>,
    xcalibur: ModeCache,
}

impl ExtendedSampler {
    pub fn new(now_ms: u32, config: ExpansionConfig) -> Self {
        Self {
            next_ms: now_ms.wrapping_add(config.startup_grace_ms),
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_cap_ms, config.backoff_max_streak),
            encoder: None,
            xcalibur: ModeCache::default(),
            config,
        }
    }

    pub fn next_due_ms(&self) -> u32 {
        self.next_ms
    }

    /// Detected encoder, once probed
    pub fn encoder(&self) -> Option<Option<EncoderKind>> {
        self.encoder
    }

    pub async fn poll<M, P, T, R>(&mut self, now_ms: u32, lock: &BusLock<M, P, T>, rng: &mut R) -> SampleOutcome
    where
        M: RawMutex,
        P: Transact,
        T: Clock + DelayNs + Clone,
        R: RngCore,
    {
        if !is_due(now_ms, self.next_ms) {
            return SampleOutcome::NotDue;
        }

        let Some(mut bus) = lock.try_acquire() else {
            self.next_ms = now_ms.wrapping_add(self.config.contended_retry_ms);
            return SampleOutcome::Contended;
        };
        let result = self.sample(&mut *bus, now_ms).await;
        drop(bus);

        let j = jitter(rng, 0, self.config.jitter_max_ms);
        match result {
            Ok(status) => {
                self.backoff.reset();
                self.next_ms = now_ms.wrapping_add(self.config.interval_ms).wrapping_add(j);
                SampleOutcome::Sampled(status)
            }
            Err(e) => {
                let delay = self.backoff.fail();
                self.next_ms = now_ms.wrapping_add(delay).wrapping_add(j);
                SampleOutcome::Failed(e)
            }
        }
    }

    async fn sample<P: Transact>(&mut self, bus: &mut P, now_ms: u32) -> Result<ExtendedStatus, BusError> {
        bus.settle().await?;

        let tray = bus.read_byte_compat(addr::SMC, smc::TRAY).await?;
        let av_pack = bus.read_byte_compat(addr::SMC, smc::AV_PACK).await?;
        let pic_version = bus.read_byte_compat(addr::SMC, smc::PIC_VERSION).await?;

        let encoder = match self.encoder {
            Some(known) => known,
            None => {
                let found = detect_encoder(bus).await;
                self.encoder = Some(found);
                found
            }
        };

        let reported = bus.read_byte_compat(addr::SMC, smc::CONSOLE_REVISION).await.ok();
        let console_revision = resolve_revision(reported, encoder);

        let detected = match encoder {
            Some(EncoderKind::Conexant) => bus
                .read_byte(addr::CONEXANT, CONEXANT_MODE_REG)
                .await
                .ok()
                .and_then(video::conexant_mode),
            Some(EncoderKind::Focus) => focus_mode(bus).await,
            Some(EncoderKind::Xcalibur) => self.xcalibur_mode(bus, now_ms).await,
            None => None,
        };

        Ok(ExtendedStatus {
            tray,
            av_pack,
            pic_version,
            console_revision,
            encoder,
            video: detected.unwrap_or_else(|| video::sd_fallback(av_pack)),
        })
    }

    /// Re-read the mode code at most once per `rescan_ms`; keep the last good one
    async fn xcalibur_mode<P: Transact>(&mut self, bus: &mut P, now_ms: u32) -> Option<Resolution> {
        let stale = match self.xcalibur.probed_at_ms {
            Some(at) => now_ms.wrapping_sub(at) >= self.config.rescan_ms,
            None => true,
        };
        if stale {
            self.xcalibur.probed_at_ms = Some(now_ms);
            if let Ok(raw) = bus.read_byte(addr::XCALIBUR, XCALIBUR_MODE_REG).await {
                if let Some(code) = video::xcalibur_code(raw) {
                    self.xcalibur.code = Some(code);
                }
            }
        }
        self.xcalibur.code.and_then(video::xcalibur_mode)
    }
}

/// First encoder address that answers a register read
async fn detect_encoder<P: Transact>(bus: &mut P) -> Option<EncoderKind> {
    for kind in EncoderKind::PROBE_ORDER {
        if bus.read_byte(kind.address(), 0x00).await.is_ok() {
            return Some(kind);
        }
    }
    None
}

/// Family B register pairs in order; first plausible answer wins
async fn focus_mode<P: Transact>(bus: &mut P) -> Option<Resolution> {
    for attempt in video::FOCUS_ATTEMPTS {
        let Ok(a) = bus.read_word(addr::FOCUS, attempt.first).await else {
            continue;
        };
        let Ok(b) = bus.read_word(addr::FOCUS, attempt.second).await else {
            continue;
        };
        if let Some(res) = (attempt.decode)(a, b) {
            return Some(res);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::video::{HD_1080, HD_720, NTSC_SD, PAL_SD};
    use super::*;
    use crate::testing::{test_lock, FakeBus, MockTimer, Op};
    use embassy_futures::block_on;
    use rand::rngs::mock::StepRng;

    fn controller(av_pack: u8) -> FakeBus {
        let bus = FakeBus::new();
        bus.set_reg(addr::SMC, smc::TRAY, 0x10);
        bus.set_reg(addr::SMC, smc::AV_PACK, av_pack);
        bus.set_reg(addr::SMC, smc::PIC_VERSION, 0xC1);
        bus.set_reg(addr::SMC, smc::CONSOLE_REVISION, 0xFF);
        bus
    }

    fn sampled(outcome: SampleOutcome) -> ExtendedStatus {
        match outcome {
            SampleOutcome::Sampled(s) => s,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_revision_policy() {
        assert_eq!(resolve_revision(Some(3), Some(EncoderKind::Conexant)), Some(3));
        assert_eq!(resolve_revision(Some(0), Some(EncoderKind::Xcalibur)), Some(0));
        assert_eq!(resolve_revision(Some(0xFF), Some(EncoderKind::Xcalibur)), Some(6));
        assert_eq!(resolve_revision(None, Some(EncoderKind::Xcalibur)), Some(6));
        assert_eq!(resolve_revision(Some(7), Some(EncoderKind::Focus)), None);
        assert_eq!(resolve_revision(None, None), None);
    }

    #[test]
    fn test_conexant_hd_mode() {
        let bus = controller(0x01);
        bus.set_reg(addr::CONEXANT, 0x00, 0);
        bus.set_reg(addr::CONEXANT, CONEXANT_MODE_REG, 0x82);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.encoder, Some(EncoderKind::Conexant));
        assert_eq!(status.video, HD_720);
        assert_eq!(status.console_revision, None);
        assert_eq!(sampler.next_due_ms(), 12_000);

        let frame = status.to_frame();
        assert_eq!(frame.encoder_address, 0x45);
        assert_eq!(frame.console_revision, -1);
        assert_eq!(frame.tray, 0x10);
        assert_eq!(frame.pic_version, 0xC1);
    }

    #[test]
    fn test_conexant_sd_falls_back_to_av_pack() {
        let bus = controller(0x00);
        bus.set_reg(addr::CONEXANT, CONEXANT_MODE_REG, 0x02);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.video, PAL_SD);
    }

    #[test]
    fn test_focus_attempts_in_order() {
        let bus = controller(0x06);
        bus.set_reg(addr::SMC, smc::CONSOLE_REVISION, 4);
        // chip ID mismatch, active area implausible, counters good
        bus.set_word(addr::FOCUS, video::FOCUS_CHIP_ID, 0x0000);
        bus.set_word(addr::FOCUS, video::FOCUS_QPR, 0x0005);
        bus.set_word(addr::FOCUS, video::FOCUS_HACT, 0x0010);
        bus.set_word(addr::FOCUS, video::FOCUS_VACT, 0x0010);
        bus.set_word(addr::FOCUS, video::FOCUS_NPIXELS, 1920);
        bus.set_word(addr::FOCUS, video::FOCUS_NLINES, 1080);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.encoder, Some(EncoderKind::Focus));
        assert_eq!(status.console_revision, Some(4));
        assert_eq!(status.video, HD_1080);
    }

    #[test]
    fn test_focus_chip_id_pair_wins() {
        let bus = controller(0x06);
        bus.set_word(addr::FOCUS, video::FOCUS_CHIP_ID, 0xFE05);
        bus.set_word(addr::FOCUS, video::FOCUS_QPR, 0x0005);
        bus.set_word(addr::FOCUS, video::FOCUS_HACT, 1920);
        bus.set_word(addr::FOCUS, video::FOCUS_VACT, 1080);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.video, HD_720);
        assert!(!bus.log().contains(&Op::Write(addr::FOCUS, video::FOCUS_HACT)));
    }

    #[test]
    fn test_encoder_detected_once() {
        let bus = controller(0x06);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.encoder, None);
        assert_eq!(status.video, NTSC_SD);
        assert_eq!(sampler.encoder(), Some(None));
        assert!(bus.touched(addr::XCALIBUR));

        // encoders cannot appear later; nobody is probed again
        bus.clear_log();
        bus.set_reg(addr::FOCUS, 0x00, 0);
        sampled(block_on(sampler.poll(12_000, &lock, &mut rng)));
        assert!(!bus.touched(addr::FOCUS));
        assert!(!bus.touched(addr::CONEXANT));
    }

    #[test]
    fn test_xcalibur_rescan_is_rate_limited() {
        let bus = controller(0x01);
        bus.set_reg(addr::XCALIBUR, XCALIBUR_MODE_REG, 0x04);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.encoder, Some(EncoderKind::Xcalibur));
        assert_eq!(status.console_revision, Some(6));
        assert_eq!(status.video, HD_720);

        // mode changes on the console but is not re-read for 30 s
        bus.set_reg(addr::XCALIBUR, XCALIBUR_MODE_REG, 0x05);
        bus.clear_log();
        let status = sampled(block_on(sampler.poll(12_000, &lock, &mut rng)));
        assert_eq!(status.video, HD_720);
        assert!(!bus.touched(addr::XCALIBUR));

        // a failed re-probe keeps the last good code
        bus.fail_reg(addr::XCALIBUR, XCALIBUR_MODE_REG);
        let status = sampled(block_on(sampler.poll(40_000, &lock, &mut rng)));
        assert_eq!(status.video, HD_720);

        bus.heal_reg(addr::XCALIBUR, XCALIBUR_MODE_REG);
        let status = sampled(block_on(sampler.poll(70_000, &lock, &mut rng)));
        assert_eq!(status.video, HD_1080);
    }

    #[test]
    fn test_xcalibur_without_code_uses_av_pack() {
        let bus = controller(0x00);
        bus.set_reg(addr::XCALIBUR, XCALIBUR_MODE_REG, 0x07);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let status = sampled(block_on(sampler.poll(10_000, &lock, &mut rng)));
        assert_eq!(status.video, PAL_SD);
    }

    #[test]
    fn test_av_pack_failure_sends_nothing_and_backs_off() {
        let bus = controller(0x06);
        bus.set_reg(addr::CONEXANT, 0x00, 0);
        bus.fail_reg(addr::SMC, smc::AV_PACK);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let outcome = block_on(sampler.poll(10_000, &lock, &mut rng));
        assert!(matches!(outcome, SampleOutcome::Failed(BusError::Fault(_))));
        assert_eq!(sampler.next_due_ms(), 10_000 + 4_000);
        // the pass stopped before any encoder access
        assert!(!bus.touched(addr::CONEXANT));

        let outcome = block_on(sampler.poll(14_000, &lock, &mut rng));
        assert!(matches!(outcome, SampleOutcome::Failed(_)));
        assert_eq!(sampler.next_due_ms(), 14_000 + 8_000);

        bus.heal_reg(addr::SMC, smc::AV_PACK);
        sampled(block_on(sampler.poll(22_000, &lock, &mut rng)));
        assert_eq!(sampler.next_due_ms(), 24_000);
    }

    #[test]
    fn test_contention_retries_soon() {
        let bus = controller(0x06);
        let timer = MockTimer::new();
        let lock = test_lock(&bus, &timer);
        let mut sampler = ExtendedSampler::new(0, ExpansionConfig::default());
        let mut rng = StepRng::new(0, 0);

        let _held = lock.try_acquire();
        assert_eq!(block_on(sampler.poll(10_000, &lock, &mut rng)), SampleOutcome::Contended);
        assert_eq!(sampler.next_due_ms(), 10_500);
    }

    #[test]
    fn test_encoder_address_roundtrip() {
        for kind in EncoderKind::PROBE_ORDER {
            assert_eq!(EncoderKind::from_address(kind.address()), Some(kind));
        }
        assert_eq!(EncoderKind::from_address(0x54), None);
    }
}
