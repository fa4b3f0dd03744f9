// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log record: metadata plus an owned buffer handle, or a flush barrier

use crate::buffer::PooledBuffer;
use crate::Level;
use std::sync::mpsc::SyncSender;

/// What a record carries. A message owns one pooled buffer; a barrier
/// owns the one-shot notifier a `flush()` caller is waiting on.
pub(crate) enum Payload {
    Message { buffer: PooledBuffer },
    Barrier { notify: SyncSender<()> },
}

/// A single log event, immutable after construction.
///
/// Records are move-only: the buffer handle is returned to its pool
/// exactly once, when the record is dropped. Ownership flows producer →
/// queue → worker, and the worker's batch clear is what releases the
/// buffers.
pub struct Record {
    pub time_ns: i64,
    pub level: Level,
    pub file: &'static str,
    pub line: u32,
    pub thread_id_hash: u64,
    pub(crate) payload: Payload,
}

impl Record {
    /// Build a message record taking ownership of `buffer`.
    pub fn message(
        level: Level,
        file: &'static str,
        line: u32,
        thread_id_hash: u64,
        time_ns: i64,
        buffer: PooledBuffer,
    ) -> Self {
        Record {
            time_ns,
            level,
            file,
            line,
            thread_id_hash,
            payload: Payload::Message { buffer },
        }
    }

    /// Build a flush barrier. Carries no buffer; the worker fires
    /// `notify` once every sink ahead of it has been flushed.
    pub(crate) fn barrier(notify: SyncSender<()>) -> Self {
        Record {
            time_ns: 0,
            level: Level::Fatal,
            file: "",
            line: 0,
            thread_id_hash: 0,
            payload: Payload::Barrier { notify },
        }
    }

    /// True for flush barriers.
    pub fn is_barrier(&self) -> bool {
        matches!(self.payload, Payload::Barrier { .. })
    }

    /// Payload bytes; empty for barriers.
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            Payload::Message { buffer } => buffer.as_bytes(),
            Payload::Barrier { .. } => &[],
        }
    }

    pub(crate) fn fire_barrier(&self) {
        if let Payload::Barrier { notify } = &self.payload {
            // the waiter may have given up; a closed channel is fine
            let _ = notify.try_send(());
        }
    }
}

/// Hash of the current thread's id, cached once per thread so the hot
/// path never touches `thread::current()`.
pub fn thread_id_hash() -> u64 {
    use std::hash::{Hash, Hasher};
    thread_local! {
        static CACHED: u64 = {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish()
        };
    }
    CACHED.with(|h| *h)
}
