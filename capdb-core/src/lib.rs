//! CapDB Core - Capped Circular Block Store
//!
//! A fixed-size, append-only block store backed by a single file that behaves
//! as a circular log. Designed as the persistent backbone of an always-on
//! profiler: disk usage never grows beyond the configured cap, while the
//! newest history window survives process restart.
//!
//! # Architecture
//!
//! The store consists of several cooperating components:
//!
//! - **RingFile**: owns the backing file, the persisted header, and the
//!   logical-to-physical offset mapping
//! - **BlockWriter**: streams compressed bytes into the ring behind a
//!   length prefix and commits a block id
//! - **BlockStream**: lazy, decompressing reads rooted at a block id, with
//!   well-defined behavior when the ring laps the block mid-read
//! - **CappedStore**: the composition front that serializes writers and
//!   reader syscalls behind a single lock

pub mod block;
pub mod clock;
pub mod codec;
pub mod ring;
pub mod scheduler;
pub mod shutdown;
pub mod source;
pub mod store;

mod error;

pub use block::BlockStream;
pub use clock::{Clock, SystemClock};
pub use error::{CapError, Result};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use source::TextSource;
pub use store::{CappedStore, StoreStats};

/// CapDB version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    use std::time::Duration;

    /// Buffer size for block reads (32 KiB), so the number of locked
    /// syscalls scales with block size / buffer size rather than per byte
    pub const READ_BUFFER_SIZE: usize = 32 * 1024;

    /// Cadence for periodic header flushes; also the minimum gap the store
    /// enforces between two flushes when the scheduler ticks faster
    pub const HEADER_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

    /// Copy buffer used while relocating the live window during resize (8 KiB)
    pub const RESIZE_COPY_BUFFER: usize = 8 * 1024;
}
