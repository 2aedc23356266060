//! Sequential cluster writer and indexed cluster reader over a container
//! stream (§4.F).
//!
//! A container is a sequence of fixed-size clusters followed by a tail of
//! `1..CLUSTER_SIZE` random bytes that makes the file size ambiguous with
//! respect to the cluster count from the outside.

use std::io::{Read, Seek, SeekFrom, Write};

use rand::RngCore;

use crate::error::{Error, Result};

/// Writes clusters sequentially to a stream, then a one-shot random tail.
pub struct ClusterSequentialWriter<W: Write> {
    target: W,
    cluster_size: usize,
    tail_written: bool,
}

impl<W: Write> ClusterSequentialWriter<W> {
    /// Wrap `target`, writing clusters of exactly `cluster_size` bytes.
    pub fn new(target: W, cluster_size: usize) -> Self {
        Self { target, cluster_size, tail_written: false }
    }

    /// Write one cluster. `buffer.len()` must equal `cluster_size`.
    pub fn write_cluster(&mut self, buffer: &[u8]) -> Result<()> {
        if self.tail_written {
            return Err(Error::Io(std::io::Error::other(
                "cannot write a cluster after the tail has been written",
            )));
        }
        if buffer.len() != self.cluster_size {
            return Err(Error::Io(std::io::Error::other(format!(
                "cluster buffer is {} bytes, expected {}",
                buffer.len(),
                self.cluster_size
            ))));
        }
        self.target.write_all(buffer)?;
        Ok(())
    }

    /// Write the random tail that terminates the cluster list. May be
    /// called at most once.
    pub fn write_tail(&mut self) -> Result<()> {
        if self.tail_written {
            return Err(Error::Io(std::io::Error::other("tail already written")));
        }
        let mut rng = rand::rngs::OsRng;
        let len = 1 + (rng.next_u32() as usize % (self.cluster_size - 1));
        let mut tail = vec![0u8; len];
        rng.fill_bytes(&mut tail);
        self.target.write_all(&tail)?;
        self.tail_written = true;
        Ok(())
    }

    /// Consume the writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.target
    }
}

/// Scans the cluster list in a seekable stream and provides windowed,
/// random-access byte views over individual clusters.
///
/// The cluster list is assumed to start at the stream's position when this
/// reader is constructed, which need not be the start of the stream (it is
/// not, once a salt region precedes it, see §11.C).
pub struct ClusterIndexedReader<S> {
    source: S,
    start_pos: u64,
    cluster_size: u64,
    len: usize,
}

impl<S: Read + Seek> ClusterIndexedReader<S> {
    /// Open a reader over the cluster list beginning at `source`'s current
    /// position and continuing to the end of the stream.
    pub fn new(mut source: S, cluster_size: usize) -> Result<Self> {
        let start_pos = source.stream_position()?;
        let io_size = source.seek(SeekFrom::End(0))?;
        let available = io_size.saturating_sub(start_pos);
        let len = (available / cluster_size as u64) as usize;
        source.seek(SeekFrom::Start(start_pos))?;
        Ok(Self { source, start_pos, cluster_size: cluster_size as u64, len })
    }

    /// Number of complete clusters in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the cluster list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of trailing bytes after the last complete cluster.
    pub fn tail_size(&mut self) -> Result<u64> {
        let io_size = self.source.seek(SeekFrom::End(0))?;
        let available = io_size.saturating_sub(self.start_pos);
        Ok(available - self.len as u64 * self.cluster_size)
    }

    /// Read cluster `idx` into memory in full.
    pub fn read_cluster(&mut self, idx: usize) -> Result<Vec<u8>> {
        if idx >= self.len {
            return Err(Error::Io(std::io::Error::other(format!(
                "cluster index {idx} out of range (len {})",
                self.len
            ))));
        }
        let offset = self.start_pos + idx as u64 * self.cluster_size;
        self.source.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.cluster_size as usize];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Iterate over all clusters, reading each into memory in turn.
    pub fn iter_clusters(&mut self) -> Result<Vec<Vec<u8>>> {
        (0..self.len).map(|i| self.read_cluster(i)).collect()
    }

    /// Consume the reader, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CLUSTER_SIZE: usize = 64;

    #[test]
    fn write_then_read_round_trips_clusters() {
        let mut buf = Vec::new();
        {
            let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
            w.write_cluster(&[1u8; CLUSTER_SIZE]).unwrap();
            w.write_cluster(&[2u8; CLUSTER_SIZE]).unwrap();
            w.write_tail().unwrap();
        }

        let mut reader = ClusterIndexedReader::new(Cursor::new(buf), CLUSTER_SIZE).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.read_cluster(0).unwrap(), vec![1u8; CLUSTER_SIZE]);
        assert_eq!(reader.read_cluster(1).unwrap(), vec![2u8; CLUSTER_SIZE]);
        let tail = reader.tail_size().unwrap();
        assert!((1..CLUSTER_SIZE as u64).contains(&tail));
    }

    #[test]
    fn wrong_size_cluster_is_rejected() {
        let mut buf = Vec::new();
        let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
        assert!(w.write_cluster(&[0u8; CLUSTER_SIZE - 1]).is_err());
    }

    #[test]
    fn cannot_write_cluster_after_tail() {
        let mut buf = Vec::new();
        let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
        w.write_tail().unwrap();
        assert!(w.write_cluster(&[0u8; CLUSTER_SIZE]).is_err());
    }

    #[test]
    fn cannot_write_tail_twice() {
        let mut buf = Vec::new();
        let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
        w.write_tail().unwrap();
        assert!(w.write_tail().is_err());
    }

    #[test]
    fn out_of_range_index_errors() {
        let mut buf = Vec::new();
        {
            let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
            w.write_cluster(&[1u8; CLUSTER_SIZE]).unwrap();
            w.write_tail().unwrap();
        }
        let mut reader = ClusterIndexedReader::new(Cursor::new(buf), CLUSTER_SIZE).unwrap();
        assert!(reader.read_cluster(1).is_err());
    }

    #[test]
    fn reader_respects_a_nonzero_start_position() {
        let mut buf = vec![0xAAu8; 10]; // simulated preceding salt region
        {
            let mut w = ClusterSequentialWriter::new(&mut buf, CLUSTER_SIZE);
            w.write_cluster(&[3u8; CLUSTER_SIZE]).unwrap();
            w.write_tail().unwrap();
        }
        let mut cursor = Cursor::new(buf);
        cursor.seek(SeekFrom::Start(10)).unwrap();
        let mut reader = ClusterIndexedReader::new(cursor, CLUSTER_SIZE).unwrap();
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.read_cluster(0).unwrap(), vec![3u8; CLUSTER_SIZE]);
    }
}
