//! Streaming block compression
//!
//! Blocks are stored in the LZ4 frame format: byte-oriented, streamable over
//! plain `Write`/`Read`, and self-terminating given the exact compressed byte
//! count (the frame carries its own end mark), which is what lets the reader
//! stop at the stored block length without any out-of-band framing.

use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::io::{Read, Write};

/// Wrap a sink in a streaming compressor
pub fn compressor<W: Write>(sink: W) -> FrameEncoder<W> {
    FrameEncoder::new(sink)
}

/// Wrap a source in a streaming decompressor
pub fn decompressor<R: Read>(source: R) -> FrameDecoder<R> {
    FrameDecoder::new(source)
}
