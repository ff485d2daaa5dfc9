//! Block writer: streams framed bytes into the ring

use super::BLOCK_HEADER_SIZE;
use crate::ring::RingFile;
use bytes::BufMut;
use std::io::{self, Write};

/// Streams one block into the ring under the store lock
///
/// `begin` reserves the length prefix at the current write head; the `Write`
/// impl lands compressed payload bytes behind it (wrapping as needed); and
/// `commit` back-fills the prefix and advances the head. If the writer is
/// dropped without committing, the head never moves and the partial bytes
/// are already logically expired, to be trampled by the next write.
pub(crate) struct BlockWriter<'a> {
    ring: &'a mut RingFile,
    start: u64,
    written: u64,
}

impl<'a> BlockWriter<'a> {
    /// Start a block at the current write head
    pub(crate) fn begin(ring: &'a mut RingFile) -> Self {
        let start = ring.current_length();
        Self {
            ring,
            start,
            written: 0,
        }
    }

    /// Back-fill the length prefix, advance the write head, return the id
    pub(crate) fn commit(self) -> io::Result<u64> {
        let mut prefix = [0u8; BLOCK_HEADER_SIZE as usize];
        (&mut prefix[..]).put_u64_le(self.written);
        self.ring.write_at(self.start, &prefix)?;
        self.ring.advance(BLOCK_HEADER_SIZE + self.written);
        Ok(self.start)
    }
}

impl Write for BlockWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ring
            .write_at(self.start + BLOCK_HEADER_SIZE + self.written, buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_ring(dir: &TempDir, size_kb: u32) -> RingFile {
        RingFile::open(&dir.path().join("capped.db"), size_kb).unwrap()
    }

    fn read_block_raw(ring: &mut RingFile, id: u64) -> Vec<u8> {
        let mut prefix = [0u8; 8];
        ring.read_exact_at(id, &mut prefix).unwrap();
        let len = u64::from_le_bytes(prefix);
        let mut payload = vec![0u8; len as usize];
        ring.read_exact_at(id + BLOCK_HEADER_SIZE, &mut payload).unwrap();
        payload
    }

    #[test]
    fn test_commit_advances_head() {
        let dir = TempDir::new().unwrap();
        let mut ring = open_ring(&dir, 1);

        let mut writer = BlockWriter::begin(&mut ring);
        writer.write_all(b"payload").unwrap();
        let id = writer.commit().unwrap();

        assert_eq!(id, 0);
        assert_eq!(ring.current_length(), 8 + 7);
        assert_eq!(read_block_raw(&mut ring, id), b"payload");
    }

    #[test]
    fn test_uncommitted_block_leaves_head_alone() {
        let dir = TempDir::new().unwrap();
        let mut ring = open_ring(&dir, 1);

        {
            let mut writer = BlockWriter::begin(&mut ring);
            writer.write_all(b"abandoned").unwrap();
        }
        assert_eq!(ring.current_length(), 0);

        let mut writer = BlockWriter::begin(&mut ring);
        writer.write_all(b"kept").unwrap();
        let id = writer.commit().unwrap();
        assert_eq!(read_block_raw(&mut ring, id), b"kept");
    }

    #[test]
    fn test_prefix_straddles_wrap_boundary() {
        let dir = TempDir::new().unwrap();
        let mut ring = open_ring(&dir, 1);

        // park the head 4 bytes shy of the boundary so the 8-byte prefix
        // lands half before and half after the wrap
        ring.advance(1020);
        let mut writer = BlockWriter::begin(&mut ring);
        let payload: Vec<u8> = (0..100).map(|i| i as u8).collect();
        writer.write_all(&payload).unwrap();
        let id = writer.commit().unwrap();

        assert_eq!(id, 1020);
        assert_eq!(read_block_raw(&mut ring, id), payload);
    }
}
