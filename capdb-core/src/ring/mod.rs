//! Fixed-size circular file region with a persisted header
//!
//! File layout (little-endian):
//! - 8 bytes: `current_length`, total bytes ever written to the ring
//! - 4 bytes: `size_kb`, ring capacity in kilobytes
//! - 8 bytes: `base_index`, start of the window relocated by the last
//!   resize (zero until a resize happens)
//! - `size_kb * 1024` bytes: the ring, addressed modulo capacity
//!
//! `current_length` is monotone for the lifetime of the file; the write head
//! is `current_length % capacity`. `base_index` keeps ids that had already
//! expired before a grow from coming back to life and reading trampled
//! bytes. The header is persisted periodically and on close, never per
//! block, so a crash loses at most one flush interval of addressable
//! history.

use crate::{config, CapError, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Size of the persisted header in bytes
pub const HEADER_SIZE: u64 = 20;

/// The backing file: a header plus a circular byte region
///
/// Holds two descriptors on the same file, one for writes and one for
/// random-access reads. All access is serialized by the owning store's lock.
pub struct RingFile {
    path: PathBuf,
    writer: File,
    reader: File,
    current_length: u64,
    size_kb: u32,
    base_index: u64,
    dirty: bool,
    last_flush: Option<Duration>,
}

impl RingFile {
    /// Open or create the backing file
    ///
    /// A fresh file is initialized with the requested size. For an existing
    /// file the stored size wins; capacity changes go through [`resize`].
    ///
    /// [`resize`]: RingFile::resize
    pub fn open(path: &Path, requested_size_kb: u32) -> Result<Self> {
        if requested_size_kb == 0 {
            return Err(CapError::InvalidArgument(
                "ring size must be positive".to_string(),
            ));
        }

        let mut writer = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_len = writer.metadata()?.len();

        let (current_length, size_kb, base_index, dirty) = if file_len == 0 {
            (0, requested_size_kb, 0, true)
        } else {
            let (current_length, size_kb, base_index) = read_header(&mut writer, path)?;
            if size_kb != requested_size_kb {
                info!(
                    "Ring at {} keeps stored size {} KiB (requested {} KiB)",
                    path.display(),
                    size_kb,
                    requested_size_kb
                );
            }
            (current_length, size_kb, base_index, false)
        };

        let reader = OpenOptions::new().read(true).open(path)?;
        let mut ring = Self {
            path: path.to_path_buf(),
            writer,
            reader,
            current_length,
            size_kb,
            base_index,
            dirty,
            last_flush: None,
        };
        if ring.dirty {
            ring.persist_header(true)?;
        }
        Ok(ring)
    }

    /// Ring capacity in bytes
    pub fn capacity_bytes(&self) -> u64 {
        self.size_kb as u64 * 1024
    }

    /// Current ring size in kilobytes
    pub fn size_kb(&self) -> u32 {
        self.size_kb
    }

    /// Total bytes ever written to the ring
    pub fn current_length(&self) -> u64 {
        self.current_length
    }

    /// Check whether a block id has been overwritten by the wrap-around
    ///
    /// Ids at or beyond the write head are treated as overwritten too, so
    /// any id reads as either live data or the overwritten sentinel.
    pub fn is_overwritten(&self, id: u64) -> bool {
        id >= self.current_length || id < self.smallest_live_id()
    }

    /// Smallest id that is still live
    ///
    /// Bounded below by the last resize: ids that had expired before a grow
    /// stay expired even though they fit the new window arithmetically.
    pub fn smallest_live_id(&self) -> u64 {
        self.base_index
            .max(self.current_length.saturating_sub(self.capacity_bytes()))
    }

    /// Advance the write head after a committed block
    pub fn advance(&mut self, delta: u64) {
        self.current_length += delta;
        self.dirty = true;
    }

    /// Write bytes at a logical offset, splitting at every wrap boundary
    pub fn write_at(&mut self, logical: u64, buf: &[u8]) -> io::Result<()> {
        let cap = self.capacity_bytes();
        let mut done = 0;
        while done < buf.len() {
            let phys = (logical + done as u64) % cap;
            let n = (buf.len() - done).min((cap - phys) as usize);
            self.writer.seek(SeekFrom::Start(HEADER_SIZE + phys))?;
            self.writer.write_all(&buf[done..done + n])?;
            done += n;
        }
        Ok(())
    }

    /// Read a single contiguous segment at a logical offset
    ///
    /// Reads at most up to the wrap boundary and returns the byte count, so
    /// one call maps to one syscall on the reader descriptor.
    pub fn read_contiguous_at(&mut self, logical: u64, buf: &mut [u8]) -> io::Result<usize> {
        let cap = self.capacity_bytes();
        let phys = logical % cap;
        let n = buf.len().min((cap - phys) as usize);
        self.reader.seek(SeekFrom::Start(HEADER_SIZE + phys))?;
        self.reader.read_exact(&mut buf[..n])?;
        Ok(n)
    }

    /// Read exactly `buf.len()` bytes at a logical offset, crossing the wrap
    /// boundary if needed (the block length prefix may straddle it)
    pub fn read_exact_at(&mut self, logical: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.read_contiguous_at(logical + done as u64, &mut buf[done..])?;
            done += n;
        }
        Ok(())
    }

    /// Whether the in-memory header is ahead of the persisted one
    pub fn header_dirty(&self) -> bool {
        self.dirty
    }

    /// Time of the last successful header flush
    pub fn last_flush(&self) -> Option<Duration> {
        self.last_flush
    }

    /// Record a successful header flush
    pub fn set_last_flush(&mut self, at: Duration) {
        self.last_flush = Some(at);
    }

    /// Write the in-memory header back to disk, optionally syncing
    pub fn persist_header(&mut self, sync: bool) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_u64_le(self.current_length);
        buf.put_u32_le(self.size_kb);
        buf.put_u64_le(self.base_index);

        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&buf)?;
        if sync {
            self.writer.sync_data()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Change the ring capacity, preserving as much live history as fits
    ///
    /// The live window (truncated to the new capacity when shrinking) is
    /// copied into a temporary file at its new physical locations, which is
    /// then renamed over the original. `current_length` is preserved, so ids
    /// stay stable; ids whose bytes no longer fit expire naturally.
    pub fn resize(&mut self, new_size_kb: u32) -> Result<()> {
        if new_size_kb == 0 {
            return Err(CapError::InvalidArgument(
                "ring size must be positive".to_string(),
            ));
        }
        if new_size_kb == self.size_kb {
            return Ok(());
        }

        let new_cap = new_size_kb as u64 * 1024;
        let start = self
            .smallest_live_id()
            .max(self.current_length.saturating_sub(new_cap));

        let tmp_path = self.path.with_extension("resize");
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut header = BytesMut::with_capacity(HEADER_SIZE as usize);
        header.put_u64_le(self.current_length);
        header.put_u32_le(new_size_kb);
        header.put_u64_le(start);
        tmp.write_all(&header)?;

        let mut buf = vec![0u8; config::RESIZE_COPY_BUFFER];
        let mut pos = start;
        while pos < self.current_length {
            let want = buf.len().min((self.current_length - pos) as usize);
            let n = self.read_contiguous_at(pos, &mut buf[..want])?;

            let mut off = 0;
            let mut logical = pos;
            while off < n {
                let phys = logical % new_cap;
                let seg = (n - off).min((new_cap - phys) as usize);
                tmp.seek(SeekFrom::Start(HEADER_SIZE + phys))?;
                tmp.write_all(&buf[off..off + seg])?;
                off += seg;
                logical += seg as u64;
            }
            pos += n as u64;
        }

        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;

        self.writer = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.reader = OpenOptions::new().read(true).open(&self.path)?;
        self.size_kb = new_size_kb;
        self.base_index = start;
        self.dirty = false;
        self.last_flush = None;
        Ok(())
    }
}

fn read_header(file: &mut File, path: &Path) -> Result<(u64, u32, u64)> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; HEADER_SIZE as usize];
    file.read_exact(&mut buf).map_err(|_| {
        CapError::InvalidFormat(format!("truncated header at {}", path.display()))
    })?;

    let mut cursor = Cursor::new(&buf[..]);
    let current_length = cursor.get_u64_le();
    let size_kb = cursor.get_u32_le();
    let base_index = cursor.get_u64_le();
    if size_kb == 0 {
        return Err(CapError::InvalidFormat(format!(
            "zero ring size in header at {}",
            path.display()
        )));
    }
    Ok((current_length, size_kb, base_index))
}
