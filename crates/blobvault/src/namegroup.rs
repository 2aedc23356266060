//! Name-group manager (§4.G): given a reader over the container's clusters
//! and a `CodenameKey`, locate that name's clusters, pick out the fresh
//! set, and reassemble the plaintext value.

use crate::cluster::{ClusterDecoder, Header};
use crate::kdf::CodenameKey;

/// A cluster matched to some key, with its index in the container and its
/// decoded header. The encrypted body is re-read lazily from `bytes` when
/// needed, so matches that turn out stale never pay for a body decrypt.
pub struct Match {
    /// Index of this cluster within the container's cluster list.
    pub index: usize,
    /// The cluster's raw bytes (exactly one cluster, §4.F).
    pub bytes: Vec<u8>,
    /// This cluster's decoded header.
    pub header: Header,
}

/// The outcome of scanning a container for one codename.
pub struct Located {
    /// Clusters belonging to this name whose header marks them real
    /// (`data_version != FAKE_CONTENT_VERSION`).
    pub reals: Vec<Match>,
    /// Clusters belonging to this name marked as decoys.
    pub decoys: Vec<Match>,
}

/// Whether `bytes` (one cluster) belongs to `key`'s name-group and carries
/// real (non-decoy) data. Used by tests and by callers auditing a
/// container without needing the full `locate` scan.
pub fn is_content_io(key: &CodenameKey, bytes: &[u8]) -> bool {
    let Ok(mut decoder) = ClusterDecoder::open(bytes) else { return false };
    if !decoder.belongs_to(key) {
        return false;
    }
    matches!(decoder.header(key), Ok(h) if !h.is_fake())
}

/// Whether `bytes` (one cluster) belongs to `key`'s name-group and is a
/// decoy.
pub fn is_fake_io(key: &CodenameKey, bytes: &[u8]) -> bool {
    let Ok(mut decoder) = ClusterDecoder::open(bytes) else { return false };
    if !decoder.belongs_to(key) {
        return false;
    }
    matches!(decoder.header(key), Ok(h) if h.is_fake())
}

/// Scan every cluster in `clusters` and split the ones matching `key` into
/// real parts and decoys. Clusters belonging to other names are silently
/// skipped (they are indistinguishable from decoys to everyone but their
/// own key's holder).
pub fn locate(key: &CodenameKey, clusters: &[Vec<u8>]) -> Located {
    let mut reals = Vec::new();
    let mut decoys = Vec::new();

    for (index, bytes) in clusters.iter().enumerate() {
        let Ok(mut decoder) = ClusterDecoder::open(bytes) else { continue };
        if !decoder.belongs_to(key) {
            continue;
        }
        let Ok(header) = decoder.header(key) else { continue };
        let m = Match { index, bytes: bytes.clone(), header };
        if header.is_fake() {
            decoys.push(m);
        } else {
            reals.push(m);
        }
    }

    Located { reals, decoys }
}

/// The fresh set for a name: the subset of `reals` at the highest
/// `data_version`, verified to form a contiguous `{0..P-1}` run with
/// exactly one `last = true` cluster at `P-1`.
///
/// Returns `None` if there are no real clusters, or if the highest-version
/// subset fails the contiguity/last-part invariant -- §4.G is explicit that
/// this must be treated as "no fresh content", not an error, so that a
/// partially written update is simply recoverable by overwrite rather than
/// fatal to read.
pub fn fresh_set(reals: &[Match]) -> Option<Vec<&Match>> {
    let fresh_version = reals.iter().map(|m| m.header.data_version).max()?;
    let mut set: Vec<&Match> = reals.iter().filter(|m| m.header.data_version == fresh_version).collect();
    set.sort_by_key(|m| m.header.part_idx);

    let p = set.len();
    let mut last_count = 0;
    for (i, m) in set.iter().enumerate() {
        if m.header.part_idx as usize != i {
            return None;
        }
        if m.header.is_last {
            last_count += 1;
            if i != p - 1 {
                return None;
            }
        }
    }
    if last_count != 1 {
        return None;
    }
    Some(set)
}

/// Decrypts and concatenates a fresh set's parts in `part_idx` order.
/// Fails the whole read (propagating the first error) if any part's
/// header MAC or body CRC does not verify.
pub fn read_value(key: &CodenameKey, fresh_set: &[&Match]) -> crate::error::Result<Vec<u8>> {
    let mut out = Vec::new();
    for m in fresh_set {
        let mut decoder = ClusterDecoder::open(&m.bytes)?;
        let body = decoder.read_data(key)?;
        out.extend_from_slice(&body);
    }
    Ok(out)
}
