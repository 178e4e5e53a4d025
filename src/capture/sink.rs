// src/capture/sink.rs

//! Append-only byte sink shared between drain threads and the program's own
//! output handle.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Cheaply clonable handle to one shared byte buffer.
///
/// Each `write` appends under the lock, so bytes from a single writer stay in
/// order. Writes from different writers may interleave at write granularity.
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes`, returning how many were taken (always all of them).
    pub fn append(&self, bytes: &[u8]) -> usize {
        self.buf.lock().extend_from_slice(bytes);
        bytes.len()
    }

    /// Current contents as text. Invalid UTF-8 is replaced, never dropped.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
