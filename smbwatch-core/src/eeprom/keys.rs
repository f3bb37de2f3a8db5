//! Device key recovery from the configuration image
//!
//! The image starts with a 20-byte HMAC-SHA1 checksum, followed by an
//! RC4-encrypted factory region:
//!
//! ```text
//! 0x00 ┌──────────────────────┐
//!      │ checksum (20)        │  HMAC-SHA1(k, plaintext[..len])
//! 0x14 ├──────────────────────┤
//!      │ confounder (8)       │ ┐
//!      │ device key (16)      │ ├ RC4(HMAC-SHA1(k, checksum))
//!      │ padding (4)          │ ┘
//! 0x30 └──────────────────────┘
//! ```
//!
//! `k` is one of a few per-revision candidate keys. Some revisions only
//! cover the first 0x18 bytes with the checksum, so each candidate is
//! tried at both lengths. The first combination whose checksum verifies
//! wins.

use hmac::{Hmac, Mac};
use rc4::consts::U20;
use rc4::{KeyInit, Rc4, StreamCipher};
use sha1::Sha1;
use smbwatch_protocol::{HddKey, IMAGE_LEN};

type HmacSha1 = Hmac<Sha1>;

pub const CHECKSUM_LEN: usize = 0x14;
pub const FACTORY_OFFSET: usize = 0x14;
/// Full factory region
pub const FACTORY_LEN: usize = 0x1C;
/// Checksummed lengths, tried in this order
pub const FACTORY_LENS: [usize; 2] = [0x1C, 0x18];
/// Random bytes ahead of the device key
pub const CONFOUNDER_LEN: usize = 8;

/// Published per-revision key
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CandidateKey {
    /// Board revisions this key belongs to
    pub family: &'static str,
    pub key: [u8; 16],
}

/// Candidates, most common revision first
pub static CANDIDATE_KEYS: [CandidateKey; 3] = [
    CandidateKey {
        family: "1.0",
        key: [
            0x2A, 0x3B, 0xAD, 0x2C, 0xB1, 0x94, 0x4F, 0x93, 0xAA, 0xCD, 0xCD, 0x7E, 0x0A, 0xC2, 0xEE, 0x5A,
        ],
    },
    CandidateKey {
        family: "1.1-1.4",
        key: [
            0x1D, 0xF3, 0x5C, 0x83, 0x8E, 0xC9, 0xB6, 0xFC, 0xBD, 0xF6, 0x61, 0xAB, 0x4F, 0x06, 0x33, 0xE4,
        ],
    },
    CandidateKey {
        family: "1.6",
        key: [
            0x2B, 0x84, 0x57, 0xBE, 0x9B, 0x1E, 0x65, 0xC6, 0xCD, 0x9D, 0x2B, 0xCE, 0xC1, 0xA2, 0x09, 0x61,
        ],
    },
];

/// One (candidate, length) pair of the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub candidate: &'static CandidateKey,
    pub factory_len: usize,
}

/// Every attempt in search order
pub fn attempts() -> impl Iterator<Item = Attempt> {
    CANDIDATE_KEYS.iter().flat_map(|candidate| {
        FACTORY_LENS.into_iter().map(move |factory_len| Attempt { candidate, factory_len })
    })
}

/// Accepted attempt and what it decrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub key: HddKey,
    pub candidate: &'static CandidateKey,
    pub factory_len: usize,
    /// Factory region with the checksummed prefix decrypted
    pub plaintext: [u8; FACTORY_LEN],
    /// Attempts evaluated, including the accepted one
    pub attempts: usize,
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Option<HmacSha1> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac)
}

/// Decrypt and verify one attempt
///
/// Returns the decrypted factory region when the recomputed checksum
/// matches the stored one.
pub fn try_attempt(image: &[u8; IMAGE_LEN], attempt: &Attempt) -> Option<[u8; FACTORY_LEN]> {
    let checksum = &image[..CHECKSUM_LEN];
    let derived = hmac_sha1(&attempt.candidate.key, checksum)?.finalize().into_bytes();

    let mut plain = [0u8; FACTORY_LEN];
    plain.copy_from_slice(&image[FACTORY_OFFSET..FACTORY_OFFSET + FACTORY_LEN]);
    let mut cipher = Rc4::<U20>::new(&derived);
    cipher.apply_keystream(&mut plain[..attempt.factory_len]);

    hmac_sha1(&attempt.candidate.key, &plain[..attempt.factory_len])?
        .verify_slice(checksum)
        .ok()?;
    Some(plain)
}

/// Search all attempts in order; stops at the first match
pub fn recover_key(image: &[u8; IMAGE_LEN]) -> Option<Recovered> {
    attempts().enumerate().find_map(|(i, attempt)| {
        let plaintext = try_attempt(image, &attempt)?;
        let mut key = [0u8; 16];
        key.copy_from_slice(&plaintext[CONFOUNDER_LEN..CONFOUNDER_LEN + 16]);
        Some(Recovered {
            key: HddKey(key),
            candidate: attempt.candidate,
            factory_len: attempt.factory_len,
            plaintext,
            attempts: i + 1,
        })
    })
}
