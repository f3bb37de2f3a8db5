//! Non-blocking receiver for the three status channels
//!
//! ```text
//!            poll()
//!   core ──► try_recv ──► CoreFrame::decode ───────┐
//!   exp  ──► try_recv ──► ExpansionPayload::decode ─┼──► AggregateStatus
//!   ee   ──► try_recv ──► EepromFrame::decode ──────┘       + dirty[channel]
//! ```
//!
//! Datagrams that fail to decode are drained and counted, never applied.
//! Each poll reads at most [`MAX_PER_POLL`] datagrams per channel so a
//! flooded socket cannot starve the others.

use smbwatch_protocol::{CoreFrame, EepromFrame, ExpansionPayload, FrameError};

use crate::aggregate::AggregateStatus;

/// Largest datagram any channel carries, with headroom
pub const RECV_BUF_LEN: usize = 512;

/// Datagrams drained per channel per poll
pub const MAX_PER_POLL: usize = 16;

/// Logical status channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Core,
    Expansion,
    Eeprom,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Core, Channel::Expansion, Channel::Eeprom];

    fn index(self) -> usize {
        match self {
            Channel::Core => 0,
            Channel::Expansion => 1,
            Channel::Eeprom => 2,
        }
    }
}

/// Something that yields whole datagrams without blocking
pub trait DatagramSource {
    type Error;

    /// Copy the next pending datagram into `buf`
    ///
    /// Returns `Ok(None)` when nothing is pending. Datagrams longer than
    /// `buf` are truncated.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;
}

/// Per-channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    pub accepted: u32,
    pub rejected: u32,
    /// Source errors other than "nothing pending"
    pub source_errors: u32,
}

pub struct Receiver<C, X, E> {
    core: C,
    expansion: X,
    eeprom: E,
    status: AggregateStatus,
    dirty: [bool; 3],
    stats: [ChannelStats; 3],
}

impl<C, X, E> Receiver<C, X, E>
where
    C: DatagramSource,
    X: DatagramSource,
    E: DatagramSource,
{
    pub fn new(core: C, expansion: X, eeprom: E) -> Self {
        Self {
            core,
            expansion,
            eeprom,
            status: AggregateStatus::default(),
            dirty: [false; 3],
            stats: [ChannelStats::default(); 3],
        }
    }

    /// Drain every channel once
    pub fn poll(&mut self) {
        let mut buf = [0u8; RECV_BUF_LEN];
        for channel in Channel::ALL {
            for _ in 0..MAX_PER_POLL {
                let received = match channel {
                    Channel::Core => self.core.try_recv(&mut buf).map_err(|_| ()),
                    Channel::Expansion => self.expansion.try_recv(&mut buf).map_err(|_| ()),
                    Channel::Eeprom => self.eeprom.try_recv(&mut buf).map_err(|_| ()),
                };
                match received {
                    Ok(Some(len)) => {
                        let len = len.min(buf.len());
                        // rejection is already counted
                        let _ = self.ingest(channel, &buf[..len]);
                    }
                    Ok(None) => break,
                    Err(()) => {
                        self.stats[channel.index()].source_errors += 1;
                        break;
                    }
                }
            }
        }
    }

    /// Decode one datagram and fold it into the aggregate
    pub fn ingest(&mut self, channel: Channel, bytes: &[u8]) -> Result<(), FrameError> {
        let result = match channel {
            Channel::Core => CoreFrame::decode(bytes).map(|frame| self.status.apply_core(frame)),
            Channel::Expansion => ExpansionPayload::decode(bytes).map(|p| self.status.apply_expansion(&p)),
            Channel::Eeprom => EepromFrame::decode(bytes).map(|f| self.status.apply_eeprom(&f)),
        };
        let stats = &mut self.stats[channel.index()];
        match result {
            Ok(()) => {
                stats.accepted += 1;
                self.dirty[channel.index()] = true;
            }
            Err(_) => stats.rejected += 1,
        }
        result
    }

    pub fn has_update(&self, channel: Channel) -> bool {
        self.dirty[channel.index()]
    }

    pub fn latest(&self) -> &AggregateStatus {
        &self.status
    }

    /// Clear the update flag after the display has consumed it
    pub fn acknowledge(&mut self, channel: Channel) {
        self.dirty[channel.index()] = false;
    }

    pub fn stats(&self, channel: Channel) -> ChannelStats {
        self.stats[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smbwatch_protocol::{ExpansionFrame, HddKey};
    use std::collections::VecDeque;

    /// Scripted datagram queue
    #[derive(Default)]
    struct Queue(VecDeque<Result<Vec<u8>, ()>>);

    impl Queue {
        fn with(datagrams: &[&[u8]]) -> Self {
            Self(datagrams.iter().map(|d| Ok(d.to_vec())).collect())
        }
    }

    impl DatagramSource for Queue {
        type Error = ();

        fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            match self.0.pop_front() {
                None => Ok(None),
                Some(Err(())) => Err(()),
                Some(Ok(d)) => {
                    let n = d.len().min(buf.len());
                    buf[..n].copy_from_slice(&d[..n]);
                    Ok(Some(n))
                }
            }
        }
    }

    fn receiver(core: Queue, expansion: Queue, eeprom: Queue) -> Receiver<Queue, Queue, Queue> {
        Receiver::new(core, expansion, eeprom)
    }

    #[test]
    fn test_binary_then_legacy_expansion() {
        let binary = ExpansionFrame {
            tray: 0x10,
            av_pack: 0x01,
            pic_version: 0xC1,
            console_revision: 6,
            width: 1280,
            height: 720,
            encoder_address: 0x70,
        }
        .encode();
        let legacy = b"tray=96;av=6;pic=193;ver=4;w=720;h=576;x=1";
        assert_eq!(binary.len(), 28);
        assert_eq!(legacy.len(), 42);

        let mut rx = receiver(Queue::default(), Queue::with(&[&binary, legacy]), Queue::default());
        rx.poll();

        let e = rx.latest().expansion;
        assert_eq!(e.tray, 96);
        assert_eq!(e.av_pack, 6);
        assert_eq!(e.pic_version, 193);
        assert_eq!(e.console_revision, 4);
        assert_eq!((e.width, e.height), (720, 576));
        // not carried by the legacy datagram
        assert_eq!(e.encoder_address, 0x70);
        assert_eq!(rx.stats(Channel::Expansion).accepted, 2);
        assert_eq!(rx.latest().resolution_label().as_str(), "576i");
    }

    #[test]
    fn test_core_rejects_odd_sizes() {
        let good = CoreFrame::new(50, 41, 33, "Dashboard").encode();
        let mut rx = receiver(Queue::with(&[&[0u8; 20], &good, &[1u8; 60]]), Queue::default(), Queue::default());
        rx.poll();

        assert_eq!(rx.latest().core, CoreFrame::new(50, 41, 33, "Dashboard"));
        assert_eq!(rx.stats(Channel::Core).accepted, 1);
        assert_eq!(rx.stats(Channel::Core).rejected, 2);
    }

    #[test]
    fn test_legacy_core_width() {
        let mut legacy = [0u8; 38];
        legacy[0..2].copy_from_slice(&40i16.to_le_bytes());
        legacy[2..4].copy_from_slice(&(-1000i16).to_le_bytes());
        legacy[4..6].copy_from_slice(&30i16.to_le_bytes());
        legacy[6..10].copy_from_slice(b"Halo");

        let mut rx = receiver(Queue::default(), Queue::default(), Queue::default());
        rx.ingest(Channel::Core, &legacy).unwrap();
        assert_eq!(rx.latest().core, CoreFrame::new(40, -1000, 30, "Halo"));
    }

    #[test]
    fn test_dirty_flags() {
        let mut rx = receiver(Queue::default(), Queue::default(), Queue::with(&[b"EE:HDD=000102030405060708090A0B0C0D0E0F"]));
        for channel in Channel::ALL {
            assert!(!rx.has_update(channel));
        }
        rx.poll();
        assert!(rx.has_update(Channel::Eeprom));
        assert!(!rx.has_update(Channel::Core));
        assert_eq!(
            rx.latest().hdd,
            Some(HddKey([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]))
        );

        rx.acknowledge(Channel::Eeprom);
        assert!(!rx.has_update(Channel::Eeprom));
    }

    #[test]
    fn test_rejected_datagram_does_not_mark_update() {
        let mut rx = receiver(Queue::default(), Queue::default(), Queue::default());
        assert_eq!(rx.ingest(Channel::Eeprom, b"XX:nothing"), Err(FrameError::BadPrefix));
        assert!(!rx.has_update(Channel::Eeprom));
        assert_eq!(rx.stats(Channel::Eeprom).rejected, 1);
    }

    #[test]
    fn test_source_error_stops_channel_for_this_poll() {
        let mut core = Queue::default();
        core.0.push_back(Err(()));
        core.0.push_back(Ok(CoreFrame::default().encode().to_vec()));
        let mut rx = receiver(core, Queue::default(), Queue::default());

        rx.poll();
        assert_eq!(rx.stats(Channel::Core).source_errors, 1);
        assert!(!rx.has_update(Channel::Core));
        rx.poll();
        assert!(rx.has_update(Channel::Core));
    }

    #[test]
    fn test_poll_is_bounded_per_channel() {
        let frame = CoreFrame::default().encode();
        let datagrams: Vec<&[u8]> = (0..MAX_PER_POLL + 4).map(|_| &frame[..]).collect();
        let mut rx = receiver(Queue::with(&datagrams), Queue::default(), Queue::default());

        rx.poll();
        assert_eq!(rx.stats(Channel::Core).accepted, MAX_PER_POLL as u32);
        rx.poll();
        assert_eq!(rx.stats(Channel::Core).accepted, MAX_PER_POLL as u32 + 4);
    }

    proptest! {
        #[test]
        fn test_core_fields_survive_the_wire(
            fan in -1i32..=100,
            cpu in -1000i32..=120,
            ambient in -1000i32..=120,
            name in "[ -~]{0,31}",
        ) {
            let sent = CoreFrame::new(fan, cpu, ambient, &name);
            let mut rx = receiver(Queue::default(), Queue::default(), Queue::default());
            rx.ingest(Channel::Core, &sent.encode()).unwrap();
            prop_assert_eq!(&rx.latest().core, &sent);
        }

        #[test]
        fn test_expansion_fields_survive_the_wire(v in proptest::array::uniform7(any::<i32>())) {
            let sent = ExpansionFrame {
                tray: v[0],
                av_pack: v[1],
                pic_version: v[2],
                console_revision: v[3],
                width: v[4],
                height: v[5],
                encoder_address: v[6],
            };
            let mut rx = receiver(Queue::default(), Queue::default(), Queue::default());
            rx.ingest(Channel::Expansion, &sent.encode()).unwrap();
            prop_assert_eq!(rx.latest().expansion, sent);
        }
    }
}
