//! Block framing on the ring
//!
//! A block is one logical payload framed by an 8-byte little-endian length
//! prefix followed by that many compressed bytes. The block id is the
//! logical offset of the prefix, assigned when the write commits.

mod reader;
mod writer;

pub use reader::BlockStream;
pub(crate) use writer::BlockWriter;

/// Size of the per-block length prefix in bytes
pub const BLOCK_HEADER_SIZE: u64 = 8;
