//! A single-file encrypted key-value store with plausible deniability.
//!
//! Values are stored under a short ASCII codename in a flat container
//! file. Every on-disk record ("cluster") has the same size and the same
//! observable shape whether it carries real data or is pure decoy filler,
//! so an observer holding the container file cannot tell how many names
//! are stored, which clusters are real, how large any value is, or
//! whether a given name is even present, without the name itself.
//!
//! ```no_run
//! use blobvault::{Config, Container};
//!
//! let cfg = Config::with_path("/tmp/example.vault");
//! let mut vault = Container::open(cfg).unwrap();
//! vault.set("alice", b"hello").unwrap();
//! assert_eq!(vault.get("alice").unwrap(), Some(b"hello".to_vec()));
//! ```

#![warn(missing_docs)]

pub mod atomic;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod cryptographer;
pub mod error;
pub mod imprint;
pub mod kdf;
pub mod namegroup;
pub mod observability;
pub mod store_io;
pub mod update;

pub use cluster::{CLUSTER_META_SIZE, FAKE_CONTENT_VERSION, HEADER_LEN, HEADER_MAC_LEN};
pub use codec::CODENAME_LENGTH;
pub use config::{Config, DEFAULT_CLUSTER_SIZE};
pub use error::{Error, Result};
pub use imprint::FULL_LEN;
pub use kdf::{CodenameKey, KdfParams};

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use rand::RngCore;
use tracing::instrument;

use store_io::{ClusterIndexedReader, ClusterSequentialWriter};

/// Length of the salt region written at the head of every container file
/// (§3's "fixed-size random byte string, >= 32 bytes recommended").
pub const SALT_LEN: usize = 32;

/// An open container file.
pub struct Container {
    config: Config,
    salt: [u8; SALT_LEN],
}

impl Container {
    /// Opens the container at `config.path`, creating it (with a fresh
    /// salt and a handful of initial decoys, §11.C) if it does not exist.
    #[instrument(name = "vault.open", skip(config))]
    pub fn open(config: Config) -> Result<Self> {
        if config.path().exists() {
            let salt = read_salt(&config)?;
            return Ok(Self { config, salt });
        }

        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let ephemeral = CodenameKey::from_random();
        let decoy_list = update::build_new_cluster_list(
            &ephemeral,
            &[],
            &[],
            config.max_part_size(),
            config.cluster_size,
        )?;
        write_container(&config, &salt, &decoy_list)?;

        Ok(Self { config, salt })
    }

    /// The container's salt (never secret, but required to derive any
    /// name's `CodenameKey`).
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    fn key_for(&self, name: &str) -> Result<CodenameKey> {
        CodenameKey::derive_with_params(name, &self.salt, self.config.kdf)
    }

    fn read_clusters(&self) -> Result<Vec<Vec<u8>>> {
        let mut file = File::open(self.config.path())?;
        file.seek(SeekFrom::Start(SALT_LEN as u64))?;
        let mut reader = ClusterIndexedReader::new(file, self.config.cluster_size)?;
        reader.iter_clusters()
    }

    /// Writes `value` under `name`, rewriting the whole container (§4.H).
    #[instrument(
        name = "vault.set",
        skip(self, value),
        fields(part_count = tracing::field::Empty, decoy_count = tracing::field::Empty)
    )]
    pub fn set(&mut self, name: &str, value: &[u8]) -> Result<()> {
        let key = self.key_for(name)?;
        let existing = self.read_clusters()?;
        let new_clusters = update::build_new_cluster_list(
            &key,
            &existing,
            value,
            self.config.max_part_size(),
            self.config.cluster_size,
        )?;
        let part_count = value.len().div_ceil(self.config.max_part_size().max(1));
        tracing::Span::current().record("part_count", part_count);
        write_container(&self.config, &self.salt, &new_clusters)
    }

    /// Returns the value stored under `name`, or `None` if no fresh
    /// content is found for it (§4.G).
    #[instrument(name = "vault.get", skip(self), fields(found = tracing::field::Empty))]
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let key = self.key_for(name)?;
        let clusters = self.read_clusters()?;
        let located = namegroup::locate(&key, &clusters);
        let Some(fresh) = namegroup::fresh_set(&located.reals) else {
            tracing::Span::current().record("found", false);
            return Ok(None);
        };
        let value = namegroup::read_value(&key, &fresh)?;
        tracing::Span::current().record("found", true);
        Ok(Some(value))
    }

    /// Removes `name`'s value: an update with empty plaintext (P = 0),
    /// leaving only decoys under its key (§4.H).
    #[instrument(name = "vault.delete", skip(self))]
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.set(name, &[])
    }
}

fn read_salt(config: &Config) -> Result<[u8; SALT_LEN]> {
    let mut file = File::open(config.path())?;
    let mut salt = [0u8; SALT_LEN];
    file.read_exact(&mut salt)?;
    Ok(salt)
}

#[instrument(name = "vault.update", skip(config, salt, clusters), fields(cluster_count = clusters.len()))]
fn write_container(config: &Config, salt: &[u8; SALT_LEN], clusters: &[Vec<u8>]) -> Result<()> {
    atomic::replace_atomically(config.path(), |tmp_file: &mut File| -> Result<()> {
        tmp_file.write_all(salt)?;
        let mut writer = ClusterSequentialWriter::new(&mut *tmp_file, config.cluster_size);
        for cluster in clusters {
            writer.write_cluster(cluster)?;
        }
        writer.write_tail()?;
        Ok(())
    })?;
    let _ = atomic::randomize_mtime(config.path());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.vault");
        (dir, Config::with_path(path))
    }

    #[test]
    fn empty_store_returns_none() {
        let (_dir, cfg) = temp_config();
        let vault = Container::open(cfg).unwrap();
        assert_eq!(vault.get("alice").unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, cfg) = temp_config();
        let mut vault = Container::open(cfg).unwrap();
        vault.set("alice", b"hello").unwrap();
        assert_eq!(vault.get("alice").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(vault.get("bob").unwrap(), None);
    }

    #[test]
    fn set_empty_value_round_trips_as_empty() {
        let (_dir, cfg) = temp_config();
        let mut vault = Container::open(cfg).unwrap();
        vault.set("alice", b"").unwrap();
        assert_eq!(vault.get("alice").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn multiple_names_coexist() {
        let (_dir, cfg) = temp_config();
        let mut vault = Container::open(cfg).unwrap();
        vault.set("one", &[0x0B, 0x16, 0x21]).unwrap();
        vault.set("empty", b"").unwrap();
        vault.set("five", &[5, 4, 3, 2, 1]).unwrap();

        assert_eq!(vault.get("one").unwrap(), Some(vec![0x0B, 0x16, 0x21]));
        assert_eq!(vault.get("empty").unwrap(), Some(Vec::new()));
        assert_eq!(vault.get("five").unwrap(), Some(vec![5, 4, 3, 2, 1]));
    }

    #[test]
    fn large_value_spans_multiple_clusters_and_round_trips() {
        let (_dir, mut cfg) = temp_config();
        cfg.cluster_size = 4096; // keep the test fast; still exercises multi-part split
        let mut vault = Container::open(cfg.clone()).unwrap();
        let value = vec![0u8; 128 * 1024];
        vault.set("k", &value).unwrap();
        assert_eq!(vault.get("k").unwrap(), Some(value));
    }

    #[test]
    fn reopening_an_existing_container_preserves_values() {
        let (_dir, cfg) = temp_config();
        {
            let mut vault = Container::open(cfg.clone()).unwrap();
            vault.set("alice", b"persisted").unwrap();
        }
        let vault = Container::open(cfg).unwrap();
        assert_eq!(vault.get("alice").unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn delete_removes_the_value() {
        let (_dir, cfg) = temp_config();
        let mut vault = Container::open(cfg).unwrap();
        vault.set("alice", b"secret").unwrap();
        vault.delete("alice").unwrap();
        assert_eq!(vault.get("alice").unwrap(), None);
    }

    #[test]
    fn container_size_is_never_an_exact_cluster_multiple() {
        let (_dir, cfg) = temp_config();
        let path = cfg.path().to_path_buf();
        let mut vault = Container::open(cfg.clone()).unwrap();
        vault.set("alice", b"x").unwrap();
        let size = std::fs::metadata(&path).unwrap().len();
        let remainder = (size - SALT_LEN as u64) % cfg.cluster_size as u64;
        assert!(remainder != 0, "container size should never land on an exact cluster boundary");
    }

    #[test]
    fn fresh_container_has_at_least_one_cluster() {
        let (_dir, cfg) = temp_config();
        let vault = Container::open(cfg).unwrap();
        let clusters = vault.read_clusters().unwrap();
        assert!(!clusters.is_empty(), "a fresh container should carry initial decoys");
    }

    #[test]
    fn decoy_count_varies_across_successive_updates_on_disk_size() {
        let mut sizes = std::collections::HashSet::new();
        for _ in 0..20 {
            let (_dir, cfg) = temp_config();
            let path = cfg.path().to_path_buf();
            let mut vault = Container::open(cfg).unwrap();
            vault.set("k", b"X").unwrap();
            sizes.insert(std::fs::metadata(&path).unwrap().len());
        }
        assert!(sizes.len() >= 2, "container size should vary across updates with overwhelming probability");
    }
}
