//! Block reader: lazy, decompressing, rollover-aware

use super::BLOCK_HEADER_SIZE;
use crate::codec;
use crate::store::StoreShared;
use crate::{config, CapError};
use bytes::Buf;
use lz4_flex::frame::FrameDecoder;
use std::io::{self, BufReader, Cursor, Read};
use std::mem;
use std::sync::Arc;

/// The character stream returned by `CappedStore::read`
///
/// No file I/O happens until the first read. If the block was overwritten by
/// the time the stream is first read, it yields the caller-supplied
/// overwritten response instead; if the writer laps the block while the
/// stream is being consumed, reads fail with [`CapError::RolledOver`]
/// carried inside the I/O error. The stream is single-shot.
pub struct BlockStream {
    state: StreamState,
}

enum StreamState {
    Unopened {
        shared: Arc<StoreShared>,
        id: u64,
        overwritten_response: String,
    },
    Overwritten(Cursor<Vec<u8>>),
    Live(FrameDecoder<BufReader<RingReader>>),
}

impl BlockStream {
    pub(crate) fn new(shared: Arc<StoreShared>, id: u64, overwritten_response: String) -> Self {
        Self {
            state: StreamState::Unopened {
                shared,
                id,
                overwritten_response,
            },
        }
    }
}

impl Read for BlockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match &mut self.state {
                StreamState::Unopened {
                    shared,
                    id,
                    overwritten_response,
                } => {
                    let shared = Arc::clone(shared);
                    let id = *id;
                    let response = mem::take(overwritten_response);

                    let overwritten = {
                        let guard = shared.ring.lock();
                        if shared.is_closing() {
                            return Err(CapError::Closed.into_io());
                        }
                        let Some(ring) = guard.as_ref() else {
                            return Err(CapError::Closed.into_io());
                        };
                        ring.is_overwritten(id)
                    };

                    self.state = if overwritten {
                        StreamState::Overwritten(Cursor::new(response.into_bytes()))
                    } else {
                        let inner = RingReader::new(shared, id);
                        StreamState::Live(codec::decompressor(BufReader::with_capacity(
                            config::READ_BUFFER_SIZE,
                            inner,
                        )))
                    };
                }
                StreamState::Overwritten(cursor) => return cursor.read(buf),
                StreamState::Live(decoder) => return decoder.read(buf),
            }
        }
    }
}

/// Raw ring access for one block; every read re-validates liveness under
/// the store lock
struct RingReader {
    shared: Arc<StoreShared>,
    id: u64,
    block_length: Option<u64>,
    consumed: u64,
}

impl RingReader {
    fn new(shared: Arc<StoreShared>, id: u64) -> Self {
        Self {
            shared,
            id,
            block_length: None,
            consumed: 0,
        }
    }
}

impl Read for RingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(length) = self.block_length {
            if self.consumed >= length {
                return Ok(0);
            }
        }

        let mut guard = self.shared.ring.lock();
        if self.shared.is_closing() {
            return Err(CapError::Closed.into_io());
        }
        let Some(ring) = guard.as_mut() else {
            return Err(CapError::Closed.into_io());
        };
        if ring.is_overwritten(self.id) {
            return Err(CapError::RolledOver { id: self.id }.into_io());
        }

        let length = match self.block_length {
            Some(length) => length,
            None => {
                let mut prefix = [0u8; BLOCK_HEADER_SIZE as usize];
                ring.read_exact_at(self.id, &mut prefix)?;
                let length = Cursor::new(&prefix[..]).get_u64_le();
                self.block_length = Some(length);
                length
            }
        };
        if self.consumed >= length {
            return Ok(0);
        }

        // clip at the block boundary and at the ring wrap, so one read maps
        // to one contiguous syscall
        let logical = self.id + BLOCK_HEADER_SIZE + self.consumed;
        let cap = ring.capacity_bytes();
        let max = (buf.len() as u64)
            .min(length - self.consumed)
            .min(cap - logical % cap);
        let n = ring.read_contiguous_at(logical, &mut buf[..max as usize])?;
        self.consumed += n as u64;
        Ok(n)
    }
}
