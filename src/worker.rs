// SPDX-License-Identifier: Apache-2.0 OR MIT
// Consumer worker: drains the queue in batches and fans out to sinks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::queue::RecordQueue;
use crate::record::Record;
use crate::sink::Sink;

const IDLE_MIN: Duration = Duration::from_millis(1);
const IDLE_MAX: Duration = Duration::from_millis(100);

pub(crate) type SharedSinks = Arc<Mutex<Vec<Box<dyn Sink>>>>;

/// The single consumer thread. Runs until the stop flag is set AND the
/// queue is drained, then gives every sink a final flush.
pub(crate) struct Worker {
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        queue: Arc<RecordQueue>,
        sinks: SharedSinks,
        stop: Arc<AtomicBool>,
        batch_size: usize,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("logpump-worker".to_string())
            .spawn(move || run(queue, sinks, stop, batch_size))
            .expect("failed to spawn worker thread");
        Worker {
            handle: Some(handle),
        }
    }

    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(queue: Arc<RecordQueue>, sinks: SharedSinks, stop: Arc<AtomicBool>, batch_size: usize) {
    let mut batch: Vec<Record> = Vec::with_capacity(batch_size);
    let mut idle = IDLE_MIN;

    loop {
        let popped = queue.pop_batch(&mut batch, batch_size);
        if popped > 0 {
            dispatch(&batch, &sinks);
            // clearing the batch drops the records, which returns
            // their buffers to the pool
            batch.clear();
            idle = IDLE_MIN;
        } else {
            if stop.load(Ordering::Acquire) && queue.is_empty() {
                break;
            }
            thread::sleep(idle);
            idle = (idle * 2).min(IDLE_MAX);
        }
    }

    let mut sinks = sinks.lock().expect("sink list poisoned");
    for sink in sinks.iter_mut() {
        sink.flush();
    }
}

/// Fan a batch out to every sink. Runs of message records between
/// barriers go out via `write_batch`; at each barrier every sink is
/// flushed before the waiter is signalled, so everything the producer
/// enqueued ahead of its barrier is already written.
fn dispatch(batch: &[Record], sinks: &SharedSinks) {
    let mut sinks = sinks.lock().expect("sink list poisoned");

    let mut start = 0;
    for i in 0..batch.len() {
        if !batch[i].is_barrier() {
            continue;
        }
        if start < i {
            let run = &batch[start..i];
            for sink in sinks.iter_mut() {
                sink.write_batch(run);
            }
        }
        for sink in sinks.iter_mut() {
            sink.flush();
        }
        batch[i].fire_barrier();
        start = i + 1;
    }

    if start < batch.len() {
        let run = &batch[start..];
        for sink in sinks.iter_mut() {
            sink.write_batch(run);
        }
    }
}
