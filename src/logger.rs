// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Logger facade: owns the pool, queue, worker, sinks and clock.
//!
//! One `Logger` is usually installed process-wide via [`Logger::init`]
//! and reached from the logging macros through [`Logger::global`];
//! embedding code and tests can also own instances directly via
//! [`Logger::new`]. `init(config)` must run before the first submit;
//! there is no life-before-main registration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use crate::buffer::{BufferPool, PooledBuffer};
use crate::clock::CoarseClock;
use crate::config::{Config, ConfigError};
use crate::queue::RecordQueue;
use crate::record::{thread_id_hash, Record};
use crate::sink::{ConsoleSink, FileSink, FileSinkStats, HttpSink, Sink};
use crate::worker::{SharedSinks, Worker};
use crate::Level;

static GLOBAL: OnceLock<Logger> = OnceLock::new();

pub struct Logger {
    config: Config,
    min_level: Arc<AtomicU8>,
    drop_count: AtomicU64,
    stopped: AtomicBool,
    worker_stop: Arc<AtomicBool>,
    pool: Arc<BufferPool>,
    queue: Arc<RecordQueue>,
    sinks: SharedSinks,
    worker: Mutex<Option<Worker>>,
    clock: CoarseClock,
    flush_gate: Mutex<()>,
    file_stats: Option<Arc<FileSinkStats>>,
    watcher: Mutex<Option<ReloadWatcher>>,
}

impl Logger {
    /// Build a running logger from `config`: size the pool, create the
    /// queue, register the built-in sinks per config flags, start the
    /// worker and the coarse-time thread. A sink whose `initialize`
    /// fails is reported on stderr and skipped; the logger runs without
    /// it.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let pool = BufferPool::new(config.buffer_pool.size, config.buffer_pool.tls_cache);
        let queue = Arc::new(RecordQueue::new(&config.queue));
        let clock = CoarseClock::start();

        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        let mut file_stats = None;

        if config.console.enabled {
            let mut sink = ConsoleSink::new();
            match sink.initialize(&config) {
                Ok(()) => sinks.push(Box::new(sink)),
                Err(e) => eprintln!("[logpump] console sink disabled: {}", e),
            }
        }
        if config.file.enabled {
            let mut sink = FileSink::new();
            match sink.initialize(&config) {
                Ok(()) => {
                    file_stats = Some(sink.stats());
                    sinks.push(Box::new(sink));
                }
                Err(e) => eprintln!("[logpump] file sink disabled: {}", e),
            }
        }
        if config.http.enabled {
            let mut sink = HttpSink::new();
            match sink.initialize(&config) {
                Ok(()) => sinks.push(Box::new(sink)),
                Err(e) => eprintln!("[logpump] http sink disabled: {}", e),
            }
        }

        let sinks: SharedSinks = Arc::new(Mutex::new(sinks));
        let worker_stop = Arc::new(AtomicBool::new(false));
        let worker = Worker::spawn(
            Arc::clone(&queue),
            Arc::clone(&sinks),
            Arc::clone(&worker_stop),
            config.worker.batch_size,
        );

        Ok(Logger {
            min_level: Arc::new(AtomicU8::new(config.level.as_u8())),
            drop_count: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            worker_stop,
            pool,
            queue,
            sinks,
            worker: Mutex::new(Some(worker)),
            clock,
            flush_gate: Mutex::new(()),
            file_stats,
            watcher: Mutex::new(None),
            config,
        })
    }

    /// Install the process-wide logger. Idempotent: a second call
    /// returns the already-installed instance without re-initializing.
    pub fn init(config: Config) -> Result<&'static Logger, ConfigError> {
        if let Some(logger) = GLOBAL.get() {
            return Ok(logger);
        }
        let logger = Logger::new(config)?;
        Ok(GLOBAL.get_or_init(|| logger))
    }

    /// The installed process-wide logger, if `init` has run.
    pub fn global() -> Option<&'static Logger> {
        GLOBAL.get()
    }

    /// Add a runtime sink. The current config is applied to it first;
    /// an init failure is returned to the caller and the sink is not
    /// registered.
    pub fn add_sink(&self, mut sink: Box<dyn Sink>) -> Result<(), crate::sink::SinkError> {
        sink.initialize(&self.config)?;
        self.sinks.lock().expect("sink list poisoned").push(sink);
        Ok(())
    }

    /// Build a record and push it into the queue. Returns whether the
    /// record was accepted; a refusal bumps the drop counter. Level
    /// filtering is duplicated here as a safety net behind the macro
    /// gate (a filtered submit has no observable effect).
    pub fn submit(
        &self,
        level: Level,
        file: &'static str,
        line: u32,
        tid_hash: u64,
        time_ns: i64,
        buffer: PooledBuffer,
    ) -> bool {
        if self.stopped.load(Ordering::Acquire) || level < self.level() {
            return false;
        }
        let record = Record::message(level, file, line, tid_hash, time_ns, buffer);
        if self.queue.push(record, false) {
            true
        } else {
            self.drop_count.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Hot-path entry used by the macros: renders `args` into a pooled
    /// buffer through the thread-local cache and submits it stamped
    /// with the coarse clock.
    pub fn log(&self, level: Level, file: &'static str, line: u32, args: fmt::Arguments<'_>) {
        if self.stopped.load(Ordering::Acquire) || level < self.level() {
            return;
        }
        let mut buffer = self.pool.alloc_cached();
        let _ = fmt::Write::write_fmt(&mut buffer, args);
        self.submit(level, file, line, thread_id_hash(), self.now_ns(), buffer);
    }

    /// Block until every record enqueued before this call has been
    /// written to every sink and the sinks have flushed. Serialized so
    /// concurrent flushes cannot interleave barrier completion. Returns
    /// immediately once `shutdown` has begun; the final drain happens
    /// there.
    pub fn flush(&self) {
        let _gate = self.flush_gate.lock().expect("flush gate poisoned");
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let (tx, rx) = sync_channel(1);
        self.queue.push(Record::barrier(tx), true);
        // a worker that exits mid-shutdown closes the channel; either
        // way the wait ends
        let _ = rx.recv();
    }

    /// `flush` plus a durability request (`fsync` or equivalent) on
    /// every sink that supports one.
    pub fn sync(&self) {
        self.flush();
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let mut sinks = self.sinks.lock().expect("sink list poisoned");
        for sink in sinks.iter_mut() {
            sink.sync();
        }
    }

    /// Stop accepting records, drain the queue, join the worker and
    /// shut every sink down. Idempotent; `submit` after return is a
    /// no-op.
    pub fn shutdown(&self) {
        {
            // taken through the flush gate so a flush that already
            // pushed its barrier finishes before the worker is stopped
            let _gate = self.flush_gate.lock().expect("flush gate poisoned");
            if self.stopped.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        if let Some(watcher) = self.watcher.lock().expect("watcher lock poisoned").take() {
            watcher.stop();
        }
        self.worker_stop.store(true, Ordering::Release);
        if let Some(mut worker) = self.worker.lock().expect("worker lock poisoned").take() {
            worker.join();
        }
        let mut sinks = self.sinks.lock().expect("sink list poisoned");
        for sink in sinks.iter_mut() {
            sink.shutdown();
        }
        drop(sinks);
        self.clock.stop();
    }

    /// Monotonic count of submissions the queue refused (DROP policy or
    /// BLOCK timeout).
    pub fn drop_count(&self) -> u64 {
        self.drop_count.load(Ordering::Relaxed)
    }

    /// Current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.min_level.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    /// Change the minimum level; takes effect on subsequent submits.
    pub fn set_level(&self, level: Level) {
        self.min_level.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Coarse timestamp, ~1 ms stale at worst.
    #[inline]
    pub fn now_ns(&self) -> i64 {
        self.clock.now_ns()
    }

    /// The pool producers render payloads into.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Rotation count of the built-in file sink, if one is running.
    pub fn rotation_count(&self) -> Option<u64> {
        self.file_stats.as_ref().map(|s| s.rotation_count())
    }

    /// Live file path of the built-in file sink, if one is running.
    pub fn current_log_path(&self) -> Option<PathBuf> {
        self.file_stats.as_ref().map(|s| s.current_path())
    }

    /// Watch `path` and re-apply `level` when the file changes. Only
    /// the level is hot-reloadable; other knobs apply on the next init.
    pub fn start_hot_reload(&self, path: impl AsRef<Path>) {
        let mut slot = self.watcher.lock().expect("watcher lock poisoned");
        if slot.is_some() {
            return;
        }
        let interval = match self.config.reload_interval_ms {
            0 => Duration::from_millis(1000),
            ms => Duration::from_millis(ms),
        };
        *slot = Some(ReloadWatcher::spawn(
            path.as_ref().to_path_buf(),
            interval,
            Arc::clone(&self.min_level),
        ));
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Polls a config file's mtime and re-applies the level on change.
struct ReloadWatcher {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReloadWatcher {
    fn spawn(path: PathBuf, interval: Duration, level: Arc<AtomicU8>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("logpump-reload".to_string())
            .spawn(move || {
                let mut last_mtime = mtime_of(&path);
                while flag.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    let current = mtime_of(&path);
                    if current != last_mtime {
                        last_mtime = current;
                        match Config::load_from_file(&path) {
                            Ok(config) => level.store(config.level.as_u8(), Ordering::Relaxed),
                            Err(e) => eprintln!("[logpump] hot reload failed: {}", e),
                        }
                    }
                }
            })
            .expect("failed to spawn reload watcher");
        ReloadWatcher {
            running,
            handle: Some(handle),
        }
    }

    fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn mtime_of(path: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
