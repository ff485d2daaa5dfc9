//! Capped store front - coordinates writer, readers and shutdown

mod capped;

pub use capped::{CappedStore, StoreStats};

use crate::clock::Clock;
use crate::ring::RingFile;
use crate::{config, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// State shared between the store, its readers, the flush task and the
/// shutdown hook
///
/// The single mutex serializes the writer and every reader syscall; the
/// `closing` flag is flipped outside the lock so queued waiters observe it
/// as soon as they acquire the lock and abort instead of touching a closing
/// file.
pub(crate) struct StoreShared {
    pub(crate) closing: AtomicBool,
    pub(crate) ring: Mutex<Option<RingFile>>,
}

impl StoreShared {
    pub(crate) fn new(ring: RingFile) -> Self {
        Self {
            closing: AtomicBool::new(false),
            ring: Mutex::new(Some(ring)),
        }
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Persist the header and drop both file handles; `closing` must already
    /// be set. Idempotent: a second call finds no ring and succeeds.
    pub(crate) fn close_inner(&self) -> Result<()> {
        let mut guard = self.ring.lock();
        if let Some(mut ring) = guard.take() {
            ring.persist_header(true)?;
        }
        Ok(())
    }

    /// Shutdown-hook entry point; failures are logged, not propagated
    pub(crate) fn close_for_shutdown(&self) {
        self.closing.store(true, Ordering::Release);
        if let Err(e) = self.close_inner() {
            warn!("Failed to close capped store from shutdown hook: {}", e);
        }
    }

    /// Periodic header flush, rate-limited through the injected clock
    pub(crate) fn flush_header(&self, clock: &dyn Clock) {
        if self.is_closing() {
            return;
        }
        let mut guard = self.ring.lock();
        let Some(ring) = guard.as_mut() else {
            return;
        };
        if !ring.header_dirty() {
            return;
        }
        let now = clock.monotonic();
        if let Some(last) = ring.last_flush() {
            if now.saturating_sub(last) < config::HEADER_FLUSH_INTERVAL {
                return;
            }
        }
        match ring.persist_header(true) {
            Ok(()) => ring.set_last_flush(now),
            Err(e) => warn!("Failed to flush capped store header: {}", e),
        }
    }
}
