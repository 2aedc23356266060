//! Container configuration (§10.C).
//!
//! Bundles the per-container constants that a caller might legitimately
//! want to override (cluster size, KDF cost, container path). File-format
//! config loading (TOML/env/CLI flags) is an external collaborator, not
//! implemented here.

use std::path::{Path, PathBuf};

use crate::kdf::KdfParams;

/// Default cluster size, in bytes (§6).
///
/// §6 requires `MAX_CLUSTER_CONTENT_SIZE = CLUSTER_SIZE - CLUSTER_META_SIZE
/// <= 0x7FFF` so a part's size fits the header's 15-bit `flags_and_size`
/// field (`_20_encdec_part.py`'s own `assert MAX_CLUSTER_CONTENT_SIZE <=
/// 0x7FFF`). A 128 KiB cluster would violate that, so the default is 32 KiB
/// instead, leaving `max_part_size()` comfortably under the 15-bit limit.
pub const DEFAULT_CLUSTER_SIZE: usize = 32 * 1024;

/// Container-level configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the container file.
    pub path: PathBuf,
    /// Fixed size of every cluster in this container, in bytes.
    pub cluster_size: usize,
    /// KDF cost parameters used to derive every `CodenameKey` in this
    /// container.
    pub kdf: KdfParams,
}

impl Config {
    /// A config for `path` using the default cluster size and the
    /// build's default KDF cost profile.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cluster_size: DEFAULT_CLUSTER_SIZE, kdf: KdfParams::default() }
    }

    /// The container path as a borrowed `Path`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `MAX_CLUSTER_CONTENT_SIZE` for this config's `cluster_size` (§6):
    /// capped at `0x7FFF` regardless of `cluster_size`, since that is the
    /// largest value the header's 15-bit `flags_and_size` field can record.
    pub fn max_part_size(&self) -> usize {
        (self.cluster_size - crate::cluster::CLUSTER_META_SIZE).min(0x7FFF)
    }
}
