//! Imprint: proves knowledge of a `CodenameKey` without revealing it (§4.C).
//!
//! An imprint is `nonce (12 random bytes) || tag (BLAKE2s, 160-bit, of
//! key||nonce)`, filling the bit-exact `FULL_LEN = 32` from §6. This is a
//! wider variable-output BLAKE2s than the 128-bit header MAC in
//! `cluster.rs`; the two use the same primitive at different output sizes
//! for different purposes and are not interchangeable.
//! The nonce doubles as the stream-cipher nonce for the cluster it heads.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2sVar;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::kdf::CodenameKey;

/// Length of a serialized imprint, in bytes (§6).
pub const FULL_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = FULL_LEN - NONCE_LEN;

fn blake2s_tag(data: &[u8]) -> [u8; TAG_LEN] {
    let mut hasher = Blake2sVar::new(TAG_LEN).expect("20 is a valid Blake2s output size");
    Update::update(&mut hasher, data);
    let mut out = [0u8; TAG_LEN];
    hasher.finalize_variable(&mut out).expect("output buffer matches declared size");
    out
}

fn tag_for(key: &CodenameKey, nonce: &[u8; NONCE_LEN]) -> [u8; TAG_LEN] {
    let mut buf = Vec::with_capacity(32 + NONCE_LEN);
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(nonce);
    blake2s_tag(&buf)
}

/// A fresh `(nonce, tag)` pair for one cluster, proving knowledge of `key`.
pub struct Imprint {
    bytes: [u8; FULL_LEN],
}

impl Imprint {
    /// Generate a fresh imprint for `key` with a newly drawn random nonce.
    pub fn new(key: &CodenameKey) -> Self {
        let mut rng = rand::rngs::OsRng;
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        Self::with_nonce(key, nonce)
    }

    /// Build an imprint for `key` with a caller-supplied nonce. Exposed for
    /// testing collision scenarios; production code should use [`Imprint::new`].
    pub fn with_nonce(key: &CodenameKey, nonce: [u8; NONCE_LEN]) -> Self {
        let tag = tag_for(key, &nonce);
        let mut bytes = [0u8; FULL_LEN];
        bytes[..NONCE_LEN].copy_from_slice(&nonce);
        bytes[NONCE_LEN..].copy_from_slice(&tag);
        Self { bytes }
    }

    /// The serialized `FULL_LEN`-byte imprint.
    pub fn as_bytes(&self) -> &[u8; FULL_LEN] {
        &self.bytes
    }

    /// The 12-byte nonce embedded in this imprint.
    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        let mut n = [0u8; NONCE_LEN];
        n.copy_from_slice(&self.bytes[..NONCE_LEN]);
        n
    }
}

/// Extracts the embedded nonce from a serialized imprint without checking
/// the tag.
pub fn nonce_of(bytes: &[u8; FULL_LEN]) -> [u8; NONCE_LEN] {
    let mut n = [0u8; NONCE_LEN];
    n.copy_from_slice(&bytes[..NONCE_LEN]);
    n
}

/// Re-derives the tag from `key` and the nonce embedded in `bytes`, and
/// compares it to the stored tag in constant time. Returns `false` (never
/// panics or throws) on short input.
pub fn matches(key: &CodenameKey, bytes: &[u8]) -> bool {
    if bytes.len() < FULL_LEN {
        return false;
    }
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&bytes[..NONCE_LEN]);
    let expected = tag_for(key, &nonce);
    let actual = &bytes[NONCE_LEN..FULL_LEN];
    expected.ct_eq(actual).into()
}
