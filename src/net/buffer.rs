//! Per-connection byte accumulator.
//!
//! # Responsibilities
//! - Hold bytes read from the socket that have not been framed yet
//! - Expose the unconsumed bytes for inspection without copying
//! - Drop consumed bytes from the front once a unit has been framed
//!
//! # Design Decisions
//! - Owned by exactly one connection task; never shared
//! - Backed by `BytesMut` so consumed prefixes are released without shifting

use bytes::{Buf, BytesMut};

/// Initial capacity for a fresh connection buffer.
const INITIAL_CAPACITY: usize = 4 * 1024;

/// Growable buffer of unconsumed bytes for a single connection.
#[derive(Debug)]
pub struct ConnectionBuffer {
    inner: BytesMut,
}

impl ConnectionBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append freshly read bytes. No parsing happens here.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Unconsumed bytes, oldest first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Remove up to `n` bytes from the front and return them.
    pub fn split_to(&mut self, n: usize) -> BytesMut {
        self.inner.split_to(n.min(self.inner.len()))
    }

    /// Discard `n` bytes from the front.
    pub fn advance(&mut self, n: usize) {
        self.inner.advance(n.min(self.inner.len()));
    }

    /// Mutable access for socket reads (`AsyncReadExt::read_buf`).
    pub fn as_read_target(&mut self) -> &mut BytesMut {
        &mut self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for ConnectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}
