//! Update protocol (§4.H): rewrite a whole container, replacing one
//! codename's name-group while leaving every other cluster byte-for-byte
//! unchanged, and shuffling the result so that positional correlations
//! between successive updates are destroyed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A fast, non-cryptographic PRNG freshly seeded from a crypto source.
/// Used for decoy-count and shuffle decisions, never for key material.
fn fast_rng() -> rand::rngs::SmallRng {
    rand::rngs::SmallRng::from_rng(rand::rngs::OsRng).expect("OsRng never fails to fill a seed")
}

use crate::cluster::{encode_fake, encode_real, PartSpec, FAKE_CONTENT_VERSION};
use crate::error::{Error, Result};
use crate::kdf::CodenameKey;
use crate::namegroup::{self, Located};

/// Plan for how many decoy clusters to append to the next version of a
/// name-group. Drawn from `1..=8` decoys via a fast, non-cryptographic
/// PRNG seeded from a crypto source -- §5's "cluster shuffling may use a
/// non-crypto PRNG seeded from a crypto source" extends naturally to this
/// sibling randomness source, since both exist purely to vary an
/// observable shape rather than to protect key material.
const MIN_DECOYS: u32 = 1;
const MAX_DECOYS: u32 = 8;

fn decoy_count() -> u32 {
    let mut rng = fast_rng();
    rng.gen_range(MIN_DECOYS..=MAX_DECOYS)
}

/// Determines the version the new value will be written at, given the
/// highest existing version in the target name-group (`None` if the
/// name-group has no real clusters yet).
pub fn next_version(existing_max: Option<u32>) -> Result<u32> {
    let next = existing_max.map_or(0, |v| v + 1);
    if next == FAKE_CONTENT_VERSION {
        return Err(Error::VersionExhausted);
    }
    Ok(next)
}

/// Splits `plaintext` into parts no larger than `max_part_size`. Returns an
/// empty `Vec` for empty input (the P = 0 deletion case, §4.H step 2).
fn split_into_parts(plaintext: &[u8], max_part_size: usize) -> Vec<&[u8]> {
    if plaintext.is_empty() {
        return Vec::new();
    }
    plaintext.chunks(max_part_size).collect()
}

/// Rewrites the cluster list for one `update` call: carries over foreign
/// clusters unchanged, appends the new value's real parts at the next
/// version, appends a randomized count of decoys, then uniformly shuffles
/// the whole list.
///
/// `existing` is every cluster currently in the container, in their
/// on-disk order. `plaintext` is the new value (empty for a delete).
/// `max_part_size` and `cluster_size` are `MAX_CLUSTER_CONTENT_SIZE` and
/// `CLUSTER_SIZE` respectively (kept as parameters here so this module
/// stays independent of the container-level constants in `lib.rs`).
pub fn build_new_cluster_list(
    key: &CodenameKey,
    existing: &[Vec<u8>],
    plaintext: &[u8],
    max_part_size: usize,
    cluster_size: usize,
) -> Result<Vec<Vec<u8>>> {
    let Located { reals, decoys: _ } = namegroup::locate(key, existing);
    let existing_max = reals.iter().map(|m| m.header.data_version).max();
    let new_version = next_version(existing_max)?;

    let foreign: Vec<Vec<u8>> = existing
        .iter()
        .filter(|bytes| {
            crate::cluster::ClusterDecoder::open(bytes).map(|d| !d.belongs_to(key)).unwrap_or(true)
        })
        .cloned()
        .collect();

    let parts = split_into_parts(plaintext, max_part_size);
    let p = parts.len();
    let mut new_clusters: Vec<Vec<u8>> = foreign;

    for (idx, part) in parts.iter().enumerate() {
        let spec = PartSpec {
            plaintext: part,
            part_idx: idx as u16,
            is_last: idx == p - 1,
            data_version: new_version,
        };
        new_clusters.push(encode_real(key, &spec, cluster_size));
    }

    for _ in 0..decoy_count() {
        new_clusters.push(encode_fake(key, cluster_size));
    }

    let mut shuffle_rng = fast_rng();
    new_clusters.shuffle(&mut shuffle_rng);

    Ok(new_clusters)
}
