// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Bounded multi-producer / single-consumer record queue.
//!
//! Admission uses an approximate length counter; the strict count does
//! not matter because capacity is a soft cap. Enqueue is lock-free, the
//! single consumer drains in batches, and a full queue is handled by
//! the configured backpressure policy:
//!
//! - `DROP`: `push` returns false and the caller counts the drop.
//! - `BLOCK`: spin-yield for a bounded number of iterations, then sleep
//!   for a doubling interval, re-checking the length, until either room
//!   appears or `block_timeout_us` is exceeded.
//!
//! Flush barriers are pushed with `force` and bypass admission.

use crossbeam_queue::SegQueue;
use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::config::{FullPolicy, QueueConfig};
use crate::record::Record;

// Spin iterations before the BLOCK path starts sleeping.
const SPIN_LIMIT: usize = 100;
// Cap on the doubling sleep interval.
const MAX_NAP: Duration = Duration::from_millis(1);

pub struct RecordQueue {
    inner: SegQueue<Record>,
    approx_len: AtomicUsize,
    capacity: usize,
    policy: FullPolicy,
    block_timeout: Duration,
}

impl RecordQueue {
    pub fn new(config: &QueueConfig) -> Self {
        RecordQueue {
            inner: SegQueue::new(),
            approx_len: AtomicUsize::new(0),
            capacity: config.capacity,
            policy: config.full_policy,
            block_timeout: Duration::from_micros(config.block_timeout_us),
        }
    }

    /// Enqueue a record. With `force`, admission is skipped entirely
    /// (used for flush barriers and shutdown sentinels). Returns false
    /// when the record was refused; the record is dropped and its buffer
    /// returns to the pool.
    pub fn push(&self, record: Record, force: bool) -> bool {
        if force || self.has_room() {
            self.enqueue(record);
            return true;
        }

        match self.policy {
            FullPolicy::Drop => false,
            FullPolicy::Block => self.push_blocking(record),
        }
    }

    fn push_blocking(&self, record: Record) -> bool {
        let start = Instant::now();

        let backoff = Backoff::new();
        for _ in 0..SPIN_LIMIT {
            if self.has_room() {
                self.enqueue(record);
                return true;
            }
            backoff.spin();
        }

        let mut nap = Duration::from_micros(10);
        loop {
            if self.has_room() {
                self.enqueue(record);
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= self.block_timeout {
                return false;
            }
            let remaining = self.block_timeout - elapsed;
            std::thread::sleep(nap.min(remaining));
            nap = (nap * 2).min(MAX_NAP);
        }
    }

    /// Non-blocking bulk drain: moves up to `max` records into `out`.
    /// Per-producer FIFO order is preserved.
    pub fn pop_batch(&self, out: &mut Vec<Record>, max: usize) -> usize {
        let mut count = 0;
        while count < max {
            match self.inner.pop() {
                Some(record) => {
                    out.push(record);
                    count += 1;
                }
                None => break,
            }
        }
        if count > 0 {
            self.approx_len.fetch_sub(count, Ordering::Relaxed);
        }
        count
    }

    /// Approximate number of queued records.
    pub fn approx_len(&self) -> usize {
        self.approx_len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn has_room(&self) -> bool {
        self.capacity == 0 || self.approx_len.load(Ordering::Relaxed) < self.capacity
    }

    fn enqueue(&self, record: Record) {
        self.inner.push(record);
        self.approx_len.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::Level;
    use std::fmt::Write;
    use std::sync::mpsc::sync_channel;
    use std::sync::Arc;

    fn config(capacity: usize, policy: FullPolicy, timeout_us: u64) -> QueueConfig {
        QueueConfig {
            capacity,
            full_policy: policy,
            block_timeout_us: timeout_us,
        }
    }

    fn record(pool: &Arc<BufferPool>, text: &str) -> Record {
        let mut buf = pool.alloc();
        write!(buf, "{}", text).unwrap();
        Record::message(Level::Info, "queue.rs", 1, 0, 0, buf)
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let pool = BufferPool::new(4, 1);
        let queue = RecordQueue::new(&config(16, FullPolicy::Drop, 0));

        assert!(queue.push(record(&pool, "a"), false));
        assert!(queue.push(record(&pool, "b"), false));
        assert_eq!(queue.approx_len(), 2);

        let mut out = Vec::new();
        assert_eq!(queue.pop_batch(&mut out, 10), 2);
        assert_eq!(out[0].payload(), b"a");
        assert_eq!(out[1].payload(), b"b");
        assert!(queue.is_empty());
        assert_eq!(queue.approx_len(), 0);
    }

    #[test]
    fn test_drop_policy_refuses_when_full() {
        let pool = BufferPool::new(8, 1);
        let queue = RecordQueue::new(&config(1, FullPolicy::Drop, 0));

        assert!(queue.push(record(&pool, "kept"), false));
        for _ in 0..5 {
            assert!(!queue.push(record(&pool, "lost"), false));
        }
        // refused records released their buffers immediately
        assert_eq!(pool.available(), 7);
        assert_eq!(queue.approx_len(), 1);
    }

    #[test]
    fn test_force_push_bypasses_admission() {
        let pool = BufferPool::new(4, 1);
        let queue = RecordQueue::new(&config(1, FullPolicy::Drop, 0));

        assert!(queue.push(record(&pool, "fill"), false));
        let (tx, _rx) = sync_channel(1);
        assert!(queue.push(Record::barrier(tx), true));
        assert_eq!(queue.approx_len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let pool = BufferPool::new(4, 1);
        let queue = RecordQueue::new(&config(0, FullPolicy::Drop, 0));

        for i in 0..100 {
            assert!(queue.push(record(&pool, &i.to_string()), false));
        }
        assert_eq!(queue.approx_len(), 100);
    }

    #[test]
    fn test_block_times_out() {
        let pool = BufferPool::new(4, 1);
        let queue = RecordQueue::new(&config(1, FullPolicy::Block, 2_000));

        assert!(queue.push(record(&pool, "fill"), false));

        let start = Instant::now();
        assert!(!queue.push(record(&pool, "late"), false));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_micros(2_000));
        // generous upper bound for scheduler jitter
        assert!(waited < Duration::from_millis(100));
    }

    #[test]
    fn test_block_succeeds_when_room_appears() {
        let pool = BufferPool::new(8, 1);
        let queue = Arc::new(RecordQueue::new(&config(1, FullPolicy::Block, 1_000_000)));

        assert!(queue.push(record(&pool, "fill"), false));

        let drainer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                let mut out = Vec::new();
                queue.pop_batch(&mut out, 1)
            })
        };

        assert!(queue.push(record(&pool, "waited"), false));
        assert_eq!(drainer.join().unwrap(), 1);
    }

    #[test]
    fn test_per_producer_fifo() {
        let pool = BufferPool::new(64, 8);
        let queue = Arc::new(RecordQueue::new(&config(0, FullPolicy::Drop, 0)));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(record(&pool, &format!("{}:{}", t, i)), false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut out = Vec::new();
        queue.pop_batch(&mut out, 1000);
        assert_eq!(out.len(), 200);

        // each producer's records emerge in its submit order
        let mut last_seen = [0i64; 4];
        for r in &out {
            let text = std::str::from_utf8(r.payload()).unwrap();
            let (t, i) = text.split_once(':').unwrap();
            let (t, i): (usize, i64) = (t.parse().unwrap(), i.parse().unwrap());
            assert!(i >= last_seen[t]);
            last_seen[t] = i;
        }
    }
}
