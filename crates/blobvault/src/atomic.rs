//! Atomic whole-file replace and mtime randomization (§10.E).
//!
//! The spec treats "atomic replace" as an external collaborator; this
//! module is the concrete version of it, generalized from the donor's
//! per-blob temp-file-then-rename sequence (`blob_store::put_reader`) up
//! to whole-container rewrites.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use rand::RngCore;

use crate::error::Result;

/// Invokes `write_fn` with a writable handle to a temp file living next to
/// `target`, then atomically replaces `target` with it.
///
/// On success the temp file is renamed over `target` and both the file and
/// its parent directory are fsynced. On failure the temp file is removed
/// and `target` is left untouched, matching the "all-or-nothing" guarantee
/// required of updates (§4.H).
pub fn replace_atomically<F>(target: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = unique_temp_path(parent, target);

    let result = (|| -> Result<()> {
        let mut tmp_file = File::create(&tmp_path)?;
        write_fn(&mut tmp_file)?;
        tmp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, target)?;
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

fn unique_temp_path(dir: &Path, target: &Path) -> std::path::PathBuf {
    let file_name = target.file_name().and_then(|n| n.to_str()).unwrap_or("container");
    let mut suffix = [0u8; 4];
    rand::rngs::OsRng.fill_bytes(&mut suffix);
    dir.join(format!(".{file_name}.tmp-{}", hex_encode(&suffix)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Sets `path`'s modification time to a uniformly random instant within the
/// last `MAX_BACKDATE` from now, suppressing the mtime side channel that
/// would otherwise reveal "this file was just rewritten".
const MAX_BACKDATE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

pub fn randomize_mtime(path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    let now = SystemTime::now();
    let offset_secs = rand::rngs::OsRng.next_u64() % MAX_BACKDATE.as_secs();
    let backdated = now - Duration::from_secs(offset_secs);
    file.set_modified(backdated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn replace_atomically_writes_final_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("container.bin");
        fs::write(&target, b"old").unwrap();

        replace_atomically(&target, |f| {
            f.write_all(b"new content").map_err(Into::into)
        })
        .unwrap();

        let mut got = String::new();
        File::open(&target).unwrap().read_to_string(&mut got).unwrap();
        assert_eq!(got, "new content");
    }

    #[test]
    fn failed_write_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("container.bin");
        fs::write(&target, b"original").unwrap();

        let result = replace_atomically(&target, |_f| {
            Err(crate::error::Error::Io(io::Error::other("synthetic failure")))
        });
        assert!(result.is_err());

        let mut got = String::new();
        File::open(&target).unwrap().read_to_string(&mut got).unwrap();
        assert_eq!(got, "original");

        let leftover = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftover, 1, "temp file should have been removed on failure");
    }

    #[test]
    fn randomize_mtime_changes_the_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f.bin");
        fs::write(&target, b"x").unwrap();
        let before = fs::metadata(&target).unwrap().modified().unwrap();
        randomize_mtime(&target).unwrap();
        let after = fs::metadata(&target).unwrap().modified().unwrap();
        assert_ne!(before, after);
    }
}
