//! Producer input abstraction

use crate::Result;
use std::io::{Cursor, Read};

/// A restartable source of UTF-8 text
///
/// Producers hand the store a `TextSource` rather than a one-shot stream so
/// the store can drain a fresh stream per block. `open` may be called any
/// number of times.
pub trait TextSource {
    /// Open a fresh byte stream over the source text
    fn open(&self) -> Result<Box<dyn Read + Send + '_>>;
}

impl TextSource for str {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.as_bytes())))
    }
}

impl TextSource for String {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        self.as_str().open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_source_is_restartable() {
        let source = "hello world";
        for _ in 0..2 {
            let mut out = String::new();
            source.open().unwrap().read_to_string(&mut out).unwrap();
            assert_eq!(out, "hello world");
        }
    }
}
