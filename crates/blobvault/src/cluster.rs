//! Cluster encode/decode (§4.E): one fixed-size, constant-shape record
//! carrying one part of a named value, or a decoy.
//!
//! ```text
//! offset 0                  imprint (FULL_LEN bytes)
//! offset FULL_LEN           encrypted(header, 12 bytes)
//! offset FULL_LEN+12        encrypted(header_mac, 16 bytes)
//! offset CLUSTER_META_SIZE  encrypted(part_bytes, part_size bytes)
//! ...                       uniform random padding to target_size
//! ```
//!
//! Decoding is an explicit state machine (§9):
//! `Opened -> ImprintChecked -> HeaderDecoded -> BodyRead`. Each transition
//! is one method; calling a later-stage method before its prerequisite is a
//! programmer error (`GroupImprintMismatch` / panic on double body read).

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2sVar;
use rand::RngCore;

use crate::codec::{
    bytes_to_uint16, bytes_to_uint32, get_highest_bit_16, get_lower15bits, set_highest_bit_16,
    uint16_to_bytes, uint32_to_bytes,
};
use crate::cryptographer::Cryptographer;
use crate::error::{Error, Result};
use crate::imprint::{self, Imprint, FULL_LEN};
use crate::kdf::CodenameKey;

/// Length of the plaintext header, in bytes: body_crc32(4) + part_idx(2) +
/// flags_and_size(2) + data_version(4).
pub const HEADER_LEN: usize = 12;
/// Length of the encrypted BLAKE2s-128 header MAC, in bytes.
pub const HEADER_MAC_LEN: usize = 16;
/// Bytes of fixed metadata preceding part data in every cluster.
pub const CLUSTER_META_SIZE: usize = FULL_LEN + HEADER_LEN + HEADER_MAC_LEN;
/// The sentinel `data_version` marking a decoy cluster.
pub const FAKE_CONTENT_VERSION: u32 = 0xFFFF_FFFF;
/// Largest part body a cluster can carry: the header's `flags_and_size`
/// field reserves its high bit for `is_last`, leaving 15 bits for the size
/// (§6, `_20_encdec_part.py`'s `assert MAX_CLUSTER_CONTENT_SIZE <= 0x7FFF`).
pub const MAX_CLUSTER_CONTENT_SIZE: usize = 0x7FFF;

fn blake2s_128(data: &[u8]) -> [u8; HEADER_MAC_LEN] {
    let mut hasher = Blake2sVar::new(HEADER_MAC_LEN).expect("16 is a valid Blake2s output size");
    Update::update(&mut hasher, data);
    let mut out = [0u8; HEADER_MAC_LEN];
    hasher.finalize_variable(&mut out).expect("output buffer matches declared size");
    out
}

/// A decoded cluster header (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// CRC-32 of the part body (random bytes for a decoy).
    pub body_crc32: u32,
    /// 0-based index of this part within its value.
    pub part_idx: u16,
    /// Size in bytes of the part body carried by this cluster.
    pub part_size: u16,
    /// Whether this is the last part of its value.
    pub is_last: bool,
    /// The data version this part belongs to, or `FAKE_CONTENT_VERSION`.
    pub data_version: u32,
}

impl Header {
    /// True iff this header marks a decoy cluster.
    pub fn is_fake(&self) -> bool {
        self.data_version == FAKE_CONTENT_VERSION
    }

    fn to_plain_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&uint32_to_bytes(self.body_crc32));
        out[4..6].copy_from_slice(&uint16_to_bytes(self.part_idx));
        let flags_and_size = set_highest_bit_16(self.part_size, self.is_last);
        out[6..8].copy_from_slice(&uint16_to_bytes(flags_and_size));
        out[8..12].copy_from_slice(&uint32_to_bytes(self.data_version));
        out
    }

    fn from_plain_bytes(b: &[u8; HEADER_LEN]) -> Self {
        let body_crc32 = bytes_to_uint32(&b[0..4]);
        let part_idx = bytes_to_uint16(&b[4..6]);
        let flags_and_size = bytes_to_uint16(&b[6..8]);
        let part_size = get_lower15bits(flags_and_size);
        let is_last = get_highest_bit_16(flags_and_size);
        let data_version = bytes_to_uint32(&b[8..12]);
        Self { body_crc32, part_idx, part_size, is_last, data_version }
    }
}

/// Parameters for encoding one real (non-decoy) part into a cluster.
pub struct PartSpec<'a> {
    /// The part's plaintext bytes (length <= `MAX_CLUSTER_CONTENT_SIZE`).
    pub plaintext: &'a [u8],
    /// 0-based index of this part within its value.
    pub part_idx: u16,
    /// Whether this is the value's last part.
    pub is_last: bool,
    /// The data version of the value being written.
    pub data_version: u32,
}

/// Encodes a real part into a cluster of exactly `target_size` bytes.
///
/// `data_version` must not be `FAKE_CONTENT_VERSION` (reserved for decoys;
/// callers enforce version exhaustion before reaching here, see `update.rs`).
/// `spec.plaintext` must be no longer than `MAX_CLUSTER_CONTENT_SIZE`
/// (0x7FFF bytes): the header's `part_size` field is only 15 bits wide, so a
/// longer part would silently truncate (and the decoded `part_size` would
/// then disagree with the actual encrypted body length, surfacing on read
/// as a spurious `BodyChecksumMismatch`). Callers split values into parts of
/// at most `Config::max_part_size()` before reaching here (see `update.rs`).
pub fn encode_real(key: &CodenameKey, spec: &PartSpec, target_size: usize) -> Vec<u8> {
    debug_assert_ne!(spec.data_version, FAKE_CONTENT_VERSION);
    assert!(
        spec.plaintext.len() <= MAX_CLUSTER_CONTENT_SIZE,
        "part body of {} bytes exceeds MAX_CLUSTER_CONTENT_SIZE (0x7FFF)",
        spec.plaintext.len()
    );
    let header = Header {
        body_crc32: crc32fast::hash(spec.plaintext),
        part_idx: spec.part_idx,
        part_size: spec.plaintext.len() as u16,
        is_last: spec.is_last,
        data_version: spec.data_version,
    };
    encode_cluster(key, header, Some(spec.plaintext), target_size)
}

/// Encodes a decoy cluster: random body_crc32, zero part_size, the FAKE
/// sentinel version, and no real body bytes (the body region is random
/// padding indistinguishable from an encrypted real part to a non-holder
/// of `key`).
pub fn encode_fake(key: &CodenameKey, target_size: usize) -> Vec<u8> {
    let mut rng = rand::rngs::OsRng;
    let mut crc_bytes = [0u8; 4];
    rng.fill_bytes(&mut crc_bytes);
    let header = Header {
        body_crc32: bytes_to_uint32(&crc_bytes),
        part_idx: 0,
        part_size: 0,
        is_last: false,
        data_version: FAKE_CONTENT_VERSION,
    };
    encode_cluster(key, header, None, target_size)
}

fn encode_cluster(key: &CodenameKey, header: Header, body: Option<&[u8]>, target_size: usize) -> Vec<u8> {
    assert!(target_size >= CLUSTER_META_SIZE, "target_size too small for cluster metadata");
    let imprint = Imprint::new(key);
    let mut cryptographer = Cryptographer::new(key, &imprint.nonce());

    let mut out = Vec::with_capacity(target_size);
    out.extend_from_slice(imprint.as_bytes());

    let plain_header = header.to_plain_bytes();
    let mac = blake2s_128(&plain_header);
    out.extend_from_slice(&cryptographer.encrypt(&plain_header));
    out.extend_from_slice(&cryptographer.encrypt(&mac));
    debug_assert_eq!(out.len(), CLUSTER_META_SIZE);

    if let Some(body) = body {
        out.extend_from_slice(&cryptographer.encrypt(body));
    }

    let mut rng = rand::rngs::OsRng;
    let padding_size = target_size - out.len();
    let mut padding = vec![0u8; padding_size];
    rng.fill_bytes(&mut padding);
    out.extend_from_slice(&padding);

    debug_assert_eq!(out.len(), target_size);
    out
}

/// Decode state after the imprint has been read and matched (or not).
enum State {
    /// Imprint read; not yet known whether it matches the key under test.
    Opened,
    /// Imprint matched; header not yet decoded.
    ImprintChecked { cryptographer: Cryptographer },
    /// Header decoded; body not yet read.
    HeaderDecoded { cryptographer: Cryptographer, header: Header },
    /// Body has been read and verified (or the read failed and the decoder
    /// must not be reused).
    BodyRead,
}

/// A lazy decoder over one cluster's bytes: `source` must be exactly one
/// cluster (`ClusterSize` bytes), e.g. a windowed view from `store_io.rs`.
///
/// Mirrors `DecryptedIO` in the original source: imprint is read eagerly at
/// construction, the header is decrypted only on first access, and the
/// body only on an explicit, single-shot `read_data()` call.
pub struct ClusterDecoder<'a> {
    source: &'a [u8],
    pos: usize,
    imprint_bytes: [u8; FULL_LEN],
    state: State,
}

impl<'a> ClusterDecoder<'a> {
    /// Open a decoder over `source`, reading (but not yet interpreting)
    /// the imprint. Fails with `InsufficientData` if `source` is shorter
    /// than `FULL_LEN`.
    pub fn open(source: &'a [u8]) -> Result<Self> {
        if source.len() < FULL_LEN {
            return Err(Error::InsufficientData);
        }
        let mut imprint_bytes = [0u8; FULL_LEN];
        imprint_bytes.copy_from_slice(&source[..FULL_LEN]);
        Ok(Self { source, pos: FULL_LEN, imprint_bytes, state: State::Opened })
    }

    /// Whether this cluster's imprint matches `key`. Safe to call
    /// repeatedly.
    pub fn belongs_to(&self, key: &CodenameKey) -> bool {
        imprint::matches(key, &self.imprint_bytes)
    }

    /// Transition into `ImprintChecked` for `key`, or fail with
    /// `GroupImprintMismatch` if the imprint does not match.
    fn ensure_imprint_checked(&mut self, key: &CodenameKey) -> Result<()> {
        if let State::Opened = self.state {
            if !self.belongs_to(key) {
                return Err(Error::GroupImprintMismatch);
            }
            let nonce = imprint::nonce_of(&self.imprint_bytes);
            self.state = State::ImprintChecked { cryptographer: Cryptographer::new(key, &nonce) };
        }
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.source.len() {
            return Err(Error::InsufficientData);
        }
        let slice = &self.source[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Decode and verify the header for `key`. Requires the imprint to
    /// match `key` (`GroupImprintMismatch` otherwise); fails with
    /// `HeaderChecksumMismatch` if the encrypted header's MAC does not
    /// verify.
    pub fn header(&mut self, key: &CodenameKey) -> Result<Header> {
        self.ensure_imprint_checked(key)?;
        if let State::HeaderDecoded { header, .. } = &self.state {
            return Ok(*header);
        }
        let State::ImprintChecked { mut cryptographer } =
            std::mem::replace(&mut self.state, State::BodyRead)
        else {
            unreachable!("ensure_imprint_checked guarantees ImprintChecked or HeaderDecoded")
        };

        let enc_header = self.read(HEADER_LEN)?;
        let plain_header_vec = cryptographer.decrypt(enc_header);
        let mut plain_header = [0u8; HEADER_LEN];
        plain_header.copy_from_slice(&plain_header_vec);

        let enc_mac = self.read(HEADER_MAC_LEN)?;
        let mac = cryptographer.decrypt(enc_mac);

        if blake2s_128(&plain_header) != mac.as_slice() {
            return Err(Error::HeaderChecksumMismatch);
        }

        let header = Header::from_plain_bytes(&plain_header);
        self.state = State::HeaderDecoded { cryptographer, header };
        Ok(header)
    }

    /// Read and verify this cluster's body. `InsufficientData` or
    /// `BodyChecksumMismatch` is fatal for the caller's `get`. Calling this
    /// a second time is a contract violation (panics), matching the
    /// "single-shot" requirement of §4.E.
    pub fn read_data(&mut self, key: &CodenameKey) -> Result<Vec<u8>> {
        let header = self.header(key)?;
        let State::HeaderDecoded { mut cryptographer, header } =
            std::mem::replace(&mut self.state, State::BodyRead)
        else {
            panic!("read_data() called more than once on the same ClusterDecoder")
        };

        let enc_body = self.read(header.part_size as usize)?;
        let body = cryptographer.decrypt(enc_body);
        if crc32fast::hash(&body) != header.body_crc32 {
            return Err(Error::BodyChecksumMismatch);
        }
        Ok(body)
    }
}
