//! Receiver-side union of everything seen on the wire
//!
//! Each field is last-value-wins. Frames only ever overwrite the fields
//! they carry, so a labeled line without an `HDD=` token keeps a key that
//! arrived earlier on its own line.

use heapless::String;
use smbwatch_protocol::{CoreFrame, EepromFrame, ExpansionFrame, ExpansionPayload, HddKey, IMAGE_LEN};

use crate::presentation::{self, AvPack, Label};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AggregateStatus {
    pub core: CoreFrame,
    pub expansion: ExpansionFrame,
    pub serial: Option<String<16>>,
    pub mac: Option<String<17>>,
    pub region: Option<String<12>>,
    pub hdd: Option<HddKey>,
    pub raw: Option<[u8; IMAGE_LEN]>,
    /// The sender reported that its one-time read failed
    pub eeprom_read_failed: bool,
}

impl AggregateStatus {
    pub fn apply_core(&mut self, frame: CoreFrame) {
        self.core = frame;
    }

    /// A binary record replaces every field; a legacy patch only the keys it names
    pub fn apply_expansion(&mut self, payload: &ExpansionPayload) {
        match payload {
            ExpansionPayload::Binary(frame) => self.expansion = *frame,
            ExpansionPayload::Legacy(patch) => self.expansion.apply(patch),
        }
    }

    pub fn apply_eeprom(&mut self, frame: &EepromFrame) {
        match frame {
            EepromFrame::ReadFail => self.eeprom_read_failed = true,
            EepromFrame::Raw(image) => {
                self.eeprom_read_failed = false;
                self.raw = Some(*image);
            }
            EepromFrame::Hdd(key) => self.hdd = Some(*key),
            EepromFrame::Labeled(fields) => {
                if fields.serial.is_some() {
                    self.serial.clone_from(&fields.serial);
                }
                if fields.mac.is_some() {
                    self.mac.clone_from(&fields.mac);
                }
                if fields.region.is_some() {
                    self.region.clone_from(&fields.region);
                }
                if fields.hdd.is_some() {
                    self.hdd = fields.hdd;
                }
                if fields.raw.is_some() {
                    self.eeprom_read_failed = false;
                    self.raw = fields.raw;
                }
            }
        }
    }

    pub fn av_pack(&self) -> Option<AvPack> {
        AvPack::from_wire(self.expansion.av_pack)
    }

    pub fn resolution_label(&self) -> Label {
        presentation::resolution_label(self.expansion.width, self.expansion.height, self.av_pack())
    }

    pub fn encoder_label(&self) -> Label {
        presentation::encoder_name(self.expansion.encoder_address)
    }

    /// Revision from the serial number, else from the encoder
    pub fn revision_label(&self) -> &'static str {
        presentation::revision_label(self.serial.as_deref(), self.expansion.encoder_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smbwatch_protocol::{ExpansionPatch, Labeled};

    #[test]
    fn test_defaults_are_unknown() {
        let status = AggregateStatus::default();
        assert_eq!(status.av_pack(), None);
        assert_eq!(status.resolution_label().as_str(), "Unknown");
        assert_eq!(status.revision_label(), "Unknown");
        assert!(!status.eeprom_read_failed);
    }

    #[test]
    fn test_labeled_line_keeps_missing_fields() {
        let mut status = AggregateStatus::default();
        status.apply_eeprom(&EepromFrame::Hdd(HddKey([0x11; 16])));

        let mut serial = String::new();
        serial.push_str("A33505").unwrap();
        status.apply_eeprom(&EepromFrame::Labeled(Labeled {
            serial: Some(serial),
            ..Labeled::default()
        }));

        assert_eq!(status.hdd, Some(HddKey([0x11; 16])));
        assert_eq!(status.serial.as_deref(), Some("A33505"));
        assert_eq!(status.mac, None);
        assert_eq!(status.revision_label(), "1.4");
    }

    #[test]
    fn test_read_failure_cleared_by_image() {
        let mut status = AggregateStatus::default();
        status.apply_eeprom(&EepromFrame::ReadFail);
        assert!(status.eeprom_read_failed);
        status.apply_eeprom(&EepromFrame::Raw([0x5A; IMAGE_LEN]));
        assert!(!status.eeprom_read_failed);
        assert_eq!(status.raw, Some([0x5A; IMAGE_LEN]));
    }

    #[test]
    fn test_expansion_labels() {
        let mut status = AggregateStatus::default();
        status.apply_expansion(&ExpansionPayload::Binary(ExpansionFrame {
            tray: 0x10,
            av_pack: 0x01,
            pic_version: 0xC1,
            console_revision: 6,
            width: 1276,
            height: 722,
            encoder_address: 0x70,
        }));
        assert_eq!(status.resolution_label().as_str(), "720p");
        assert_eq!(status.encoder_label().as_str(), "Xcalibur");
        assert_eq!(status.revision_label(), "1.6/1.6b");

        status.apply_expansion(&ExpansionPayload::Legacy(ExpansionPatch {
            av_pack: Some(0x06),
            width: Some(720),
            height: Some(480),
            ..ExpansionPatch::default()
        }));
        assert_eq!(status.resolution_label().as_str(), "480i");
        assert_eq!(status.expansion.encoder_address, 0x70);
    }
}
