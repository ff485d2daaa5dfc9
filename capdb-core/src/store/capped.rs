//! CappedStore - the public face of the block store

use super::StoreShared;
use crate::block::{BlockStream, BlockWriter};
use crate::clock::Clock;
use crate::codec;
use crate::ring::RingFile;
use crate::scheduler::Scheduler;
use crate::shutdown::{self, HookHandle};
use crate::source::TextSource;
use crate::{config, CapError, Result};
use std::io;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Capped, append-only, compressed block store over a single circular file
///
/// One writer at a time; any number of concurrent readers. A single coarse
/// mutex serializes the block encode and every reader syscall, so readers
/// hold the lock only for one buffered read at a time.
///
/// # Example
///
/// ```no_run
/// use capdb_core::{CappedStore, SystemClock, ThreadScheduler};
/// use std::io::Read;
/// use std::sync::Arc;
///
/// # fn main() -> capdb_core::Result<()> {
/// let scheduler = ThreadScheduler::new();
/// let store = CappedStore::open("trace.db", 1024, &scheduler, Arc::new(SystemClock::new()))?;
///
/// let id = store.write_text("trace payload")?.unwrap();
///
/// let mut text = String::new();
/// store.read(id, "{\"overwritten\":true}").read_to_string(&mut text)?;
/// # Ok(())
/// # }
/// ```
pub struct CappedStore {
    shared: Arc<StoreShared>,
    clock: Arc<dyn Clock>,
    hook: HookHandle,
}

impl CappedStore {
    /// Open or create a store at `path`
    ///
    /// Registers a process shutdown hook and schedules the periodic header
    /// flush on the given scheduler. An existing file keeps its stored size;
    /// use [`resize`] to change it.
    ///
    /// [`resize`]: CappedStore::resize
    pub fn open<P: AsRef<Path>>(
        path: P,
        requested_size_kb: u32,
        scheduler: &dyn Scheduler,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let ring = RingFile::open(path, requested_size_kb)?;
        let shared = Arc::new(StoreShared::new(ring));

        let hook_shared = Arc::downgrade(&shared);
        let hook = shutdown::register(Box::new(move || {
            if let Some(shared) = hook_shared.upgrade() {
                shared.close_for_shutdown();
            }
        }));

        let flush_shared = Arc::downgrade(&shared);
        let flush_clock = Arc::clone(&clock);
        scheduler.schedule(
            config::HEADER_FLUSH_INTERVAL,
            Box::new(move || {
                if let Some(shared) = flush_shared.upgrade() {
                    shared.flush_header(flush_clock.as_ref());
                }
            }),
        );

        info!("Opened capped store at {}", path.display());
        Ok(Self {
            shared,
            clock,
            hook,
        })
    }

    /// Append one block, returning its id
    ///
    /// Returns `None` (the closed sentinel) when the store is closing. The
    /// source is drained through the compressor under the store lock; on
    /// failure the write head never advances and any partially written bytes
    /// are already logically expired.
    pub fn write<S: TextSource + ?Sized>(&self, source: &S) -> Result<Option<u64>> {
        if self.shared.is_closing() {
            return Ok(None);
        }
        let mut guard = self.shared.ring.lock();
        if self.shared.is_closing() {
            return Ok(None);
        }
        let Some(ring) = guard.as_mut() else {
            return Ok(None);
        };

        let block = BlockWriter::begin(ring);
        let mut encoder = codec::compressor(block);
        let mut input = source.open()?;
        io::copy(&mut input, &mut encoder)?;
        let block = encoder
            .finish()
            .map_err(|e| CapError::Compression(e.to_string()))?;
        let id = block.commit()?;
        Ok(Some(id))
    }

    /// Append one block of plain text
    pub fn write_text(&self, text: &str) -> Result<Option<u64>> {
        self.write(text)
    }

    /// Open a lazy stream over the block at `id`
    ///
    /// No I/O happens until the stream is read. An expired id yields the
    /// `overwritten_response` bytes instead; see [`BlockStream`] for the
    /// mid-read rollover contract. The stream is single-shot: re-reading a
    /// block requires a fresh call.
    pub fn read(&self, id: u64, overwritten_response: &str) -> BlockStream {
        BlockStream::new(
            Arc::clone(&self.shared),
            id,
            overwritten_response.to_string(),
        )
    }

    /// Check whether a block id has been overwritten by the wrap-around
    ///
    /// Best-effort: the block may expire between this check and a read.
    pub fn is_expired(&self, id: u64) -> bool {
        match self.shared.ring.lock().as_ref() {
            Some(ring) => ring.is_overwritten(id),
            None => true,
        }
    }

    /// Smallest id that is still live
    pub fn smallest_live_id(&self) -> u64 {
        match self.shared.ring.lock().as_ref() {
            Some(ring) => ring.smallest_live_id(),
            None => 0,
        }
    }

    /// Change the ring capacity, keeping ids stable for blocks that still fit
    ///
    /// Writes and reads are blocked for the duration. A no-op while the
    /// store is closing.
    pub fn resize(&self, new_size_kb: u32) -> Result<()> {
        let mut guard = self.shared.ring.lock();
        if self.shared.is_closing() {
            return Ok(());
        }
        let Some(ring) = guard.as_mut() else {
            return Ok(());
        };
        ring.resize(new_size_kb)?;
        info!("Resized capped store to {} KiB", new_size_kb);
        Ok(())
    }

    /// Flush the in-memory header to disk
    ///
    /// This is the scheduler hook; it is rate-limited through the injected
    /// clock so an over-eager scheduler cannot force a sync storm. Failures
    /// are logged at warn level.
    pub fn flush_header(&self) {
        self.shared.flush_header(self.clock.as_ref());
    }

    /// Close the store, flushing the header and dropping both file handles
    ///
    /// Safe to call more than once, and tolerates racing with the shutdown
    /// hook. In-flight readers observe the closing flag as soon as they
    /// acquire the lock and fail with a closed error.
    pub fn close(&self) -> Result<()> {
        // flipped outside the lock so queued waiters abort fast
        self.shared.closing.store(true, Ordering::Release);
        let result = self.shared.close_inner();
        shutdown::deregister(&self.hook);
        result
    }

    /// Store statistics
    pub fn stats(&self) -> StoreStats {
        match self.shared.ring.lock().as_ref() {
            Some(ring) => StoreStats {
                current_length: ring.current_length(),
                capacity_bytes: ring.capacity_bytes(),
                smallest_live_id: ring.smallest_live_id(),
            },
            None => StoreStats::default(),
        }
    }
}

impl Drop for CappedStore {
    fn drop(&mut self) {
        // no header flush here; only close() and the shutdown hook persist
        shutdown::deregister(&self.hook);
    }
}

/// Store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub current_length: u64,
    pub capacity_bytes: u64,
    pub smallest_live_id: u64,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::scheduler::Task;
    use proptest::prelude::*;
    use std::io::Read;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NoopScheduler;

    impl Scheduler for NoopScheduler {
        fn schedule(&self, _period: Duration, _task: Task) {}
    }

    fn open_store(dir: &TempDir, size_kb: u32) -> CappedStore {
        CappedStore::open(
            dir.path().join("capped.db"),
            size_kb,
            &NoopScheduler,
            Arc::new(SystemClock::new()),
        )
        .unwrap()
    }

    fn read_text(store: &CappedStore, id: u64, response: &str) -> String {
        let mut text = String::new();
        store
            .read(id, response)
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_while_unexpired(payloads in prop::collection::vec(".{0,300}", 1..20)) {
            let dir = TempDir::new().unwrap();
            let store = open_store(&dir, 64);

            let mut ids = Vec::new();
            for payload in &payloads {
                ids.push(store.write(payload.as_str()).unwrap().unwrap());
            }

            for (id, payload) in ids.iter().zip(&payloads) {
                prop_assert!(!store.is_expired(*id));
                prop_assert_eq!(&read_text(&store, *id, "gone"), payload);
            }
        }

        #[test]
        fn ids_are_monotone_and_expiry_matches_window(
            payloads in prop::collection::vec("[a-z ]{0,200}", 1..40),
        ) {
            let dir = TempDir::new().unwrap();
            let store = open_store(&dir, 1);

            let mut ids = Vec::new();
            for payload in &payloads {
                ids.push(store.write(payload.as_str()).unwrap().unwrap());
            }

            for window in ids.windows(2) {
                prop_assert!(window[0] < window[1]);
            }

            let stats = store.stats();
            prop_assert_eq!(
                stats.smallest_live_id,
                stats.current_length.saturating_sub(stats.capacity_bytes)
            );
            for id in &ids {
                let expired = stats.current_length - *id > stats.capacity_bytes;
                prop_assert_eq!(store.is_expired(*id), expired);
            }
        }

        #[test]
        fn wrapped_blocks_read_back_or_yield_sentinel(
            payloads in prop::collection::vec("[a-zA-Z0-9 ]{1,150}", 30..60),
        ) {
            let dir = TempDir::new().unwrap();
            let store = open_store(&dir, 1);

            let mut blocks = Vec::new();
            for payload in &payloads {
                let id = store.write(payload.as_str()).unwrap().unwrap();
                blocks.push((id, payload.clone()));
            }
            // make sure the ring wrapped at least once
            let mut filler = 0;
            while store.stats().current_length <= 1024 {
                store.write(format!("filler {}", filler).as_str()).unwrap().unwrap();
                filler += 1;
            }

            for (id, payload) in blocks {
                if store.is_expired(id) {
                    prop_assert_eq!(read_text(&store, id, "gone"), "gone");
                } else {
                    prop_assert_eq!(read_text(&store, id, "gone"), payload);
                }
            }
        }
    }
}
