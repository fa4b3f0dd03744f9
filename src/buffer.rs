// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Buffer pool for zero-allocation payload capture.
//!
//! Producers render payload bytes into fixed-size buffers loaned from a
//! lock-free pool, so the hot path performs no heap allocation in the
//! steady state. A per-thread cache batches buffers in and out of the
//! global pool to amortize contention; its contents are returned when
//! the thread exits.

use crossbeam_queue::SegQueue;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

/// Fixed capacity of every pooled buffer, in bytes.
pub const BUFFER_CAPACITY: usize = 4096;

/// A fixed-capacity byte buffer. Bytes beyond `len` are undefined.
pub struct Buffer {
    data: [u8; BUFFER_CAPACITY],
    len: usize,
}

impl Buffer {
    fn new() -> Box<Self> {
        Box::new(Buffer {
            data: [0; BUFFER_CAPACITY],
            len: 0,
        })
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// An owning handle to one pooled buffer. Dropping the handle returns
/// the buffer to its originating pool.
pub struct PooledBuffer {
    inner: Option<Box<Buffer>>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |b| b.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View of the written payload.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            Some(b) => &b.data[..b.len],
            None => &[],
        }
    }

    /// Append raw bytes, silently truncating at capacity.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if let Some(b) = self.inner.as_mut() {
            let room = BUFFER_CAPACITY - b.len;
            let n = bytes.len().min(room);
            b.data[b.len..b.len + n].copy_from_slice(&bytes[..n]);
            b.len += n;
        }
    }
}

// Payloads are opaque bytes; formatted text lands here via `write!`.
// Overflow truncates rather than erroring so a too-long message costs
// its tail, never the record.
impl std::fmt::Write for PooledBuffer {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.push_bytes(s.as_bytes());
        Ok(())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.inner.take() {
            self.pool.release(buf);
        }
    }
}

/// The lock-free pool manager. Cheap to share via `Arc`.
///
/// `alloc` never fails: when the free list is empty it falls back to a
/// plain heap allocation, and the new buffer joins the pool on release.
/// Steady-state footprint is self-bounding because each producer holds
/// at most one buffer at a time.
pub struct BufferPool {
    free: SegQueue<Box<Buffer>>,
    tls_batch: usize,
}

impl BufferPool {
    /// Creates a pool pre-seeded with `count` buffers. `tls_batch` is the
    /// number of buffers a thread-local cache pulls per refill.
    pub fn new(count: usize, tls_batch: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            free: SegQueue::new(),
            tls_batch: tls_batch.max(1),
        });
        for _ in 0..count {
            pool.free.push(Buffer::new());
        }
        pool
    }

    /// Acquires a zero-length buffer, allocating if the pool is empty.
    pub fn alloc(self: &Arc<Self>) -> PooledBuffer {
        let mut buf = self.free.pop().unwrap_or_else(Buffer::new);
        buf.reset();
        PooledBuffer {
            inner: Some(buf),
            pool: Arc::clone(self),
        }
    }

    /// Acquires a buffer through this thread's local cache, refilling the
    /// cache from the global pool in batches.
    pub fn alloc_cached(self: &Arc<Self>) -> PooledBuffer {
        TLS_CACHE.with(|cell| {
            let mut cache = cell.borrow_mut();
            let mut buf = cache.take(self).unwrap_or_else(Buffer::new);
            buf.reset();
            PooledBuffer {
                inner: Some(buf),
                pool: Arc::clone(self),
            }
        })
    }

    /// Moves up to `max` buffers from the free list into `out`.
    /// Returns the number moved.
    pub fn alloc_batch(&self, out: &mut Vec<Box<Buffer>>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.free.pop() {
                Some(buf) => {
                    out.push(buf);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    /// Returns a batch of buffers to the free list.
    pub fn free_batch(&self, bufs: Vec<Box<Buffer>>) {
        for buf in bufs {
            self.free.push(buf);
        }
    }

    /// Number of buffers currently on the free list.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    fn release(&self, buf: Box<Buffer>) {
        self.free.push(buf);
    }
}

// Per-thread buffer cache. Bound to the pool it last refilled from;
// rebinding (a re-init with a fresh pool) flushes the old contents back
// to their owner first.
struct LocalCache {
    pool: Weak<BufferPool>,
    bufs: Vec<Box<Buffer>>,
}

impl LocalCache {
    fn take(&mut self, pool: &Arc<BufferPool>) -> Option<Box<Buffer>> {
        if !Weak::ptr_eq(&self.pool, &Arc::downgrade(pool)) {
            self.flush();
            self.pool = Arc::downgrade(pool);
        }
        if self.bufs.is_empty() {
            pool.alloc_batch(&mut self.bufs, pool.tls_batch);
        }
        self.bufs.pop()
    }

    fn flush(&mut self) {
        if self.bufs.is_empty() {
            return;
        }
        if let Some(pool) = self.pool.upgrade() {
            pool.free_batch(std::mem::take(&mut self.bufs));
        } else {
            self.bufs.clear();
        }
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        self.flush();
    }
}

thread_local! {
    static TLS_CACHE: RefCell<LocalCache> = RefCell::new(LocalCache {
        pool: Weak::new(),
        bufs: Vec::new(),
    });
}
