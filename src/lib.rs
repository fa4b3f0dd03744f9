// SPDX-License-Identifier: Apache-2.0 OR MIT
//! High-throughput asynchronous logging engine.
//!
//! Producer threads render payload bytes into fixed-size buffers loaned
//! from a lock-free pool, wrap them in move-only records and push them
//! into a bounded MPSC queue. A single worker thread drains the queue
//! in batches and fans records out to the configured sinks (console,
//! file with rotation and retention, HTTP). Flush barriers give callers
//! a blocking `flush()` with a hard ordering guarantee: everything a
//! producer enqueued before the barrier is written to every sink before
//! the call returns.
//!
//! Typical use:
//!
//! ```ignore
//! let config = logpump::Config::load_from_file(Path::new("log.json5"))?;
//! logpump::Logger::init(config)?;
//! log_info!("engine up, pid {}", std::process::id());
//! logpump::Logger::global().unwrap().shutdown();
//! ```

pub mod buffer;
pub mod clock;
pub mod config;
pub mod format;
pub mod level;
pub mod logger;
#[macro_use]
mod macros;
pub mod queue;
pub mod record;
pub mod sink;
mod worker;

pub use buffer::{Buffer, BufferPool, PooledBuffer, BUFFER_CAPACITY};
pub use clock::{exact_now_ns, CoarseClock};
pub use config::{Config, ConfigError, FullPolicy, RotatePolicy};
pub use level::Level;
pub use logger::Logger;
pub use queue::RecordQueue;
pub use record::{thread_id_hash, Record};
pub use sink::{ConsoleSink, FileSink, HttpSink, Sink, SinkError};
