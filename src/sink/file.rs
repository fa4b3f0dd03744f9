// SPDX-License-Identifier: Apache-2.0 OR MIT
//! File sink with rotation and bounded retention.
//!
//! The sink is CLOSED until `initialize` opens the base path, then OPEN
//! until `shutdown`. Every write checks `needs_rotation()` (a size
//! counter compare and a date compare, both cheap). Rotation closes the
//! live file, opens a freshly generated name as the new live file (the
//! rotated-out file keeps its name), prunes old files down to
//! `max_files`, resets the byte counter and bumps the rotation counter.
//!
//! Two layers of buffering coalesce syscalls: a user-space byte buffer
//! flushed at a threshold, on a 100 ms interval, at batch end and at
//! rotation, plus a large `BufWriter` around the file handle.

use chrono::{Local, NaiveDate};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{Config, FileConfig, RotatePolicy};
use crate::format::Formatter;
use crate::record::Record;
use crate::sink::{Sink, SinkError};

const FLUSH_THRESHOLD: usize = 32 * 1024;
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Read-only observables shared with the facade.
pub struct FileSinkStats {
    rotations: AtomicU64,
    current_path: Mutex<PathBuf>,
}

impl FileSinkStats {
    fn new() -> Arc<Self> {
        Arc::new(FileSinkStats {
            rotations: AtomicU64::new(0),
            current_path: Mutex::new(PathBuf::new()),
        })
    }

    /// Number of successful rotations on this sink.
    pub fn rotation_count(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Path of the live log file.
    pub fn current_path(&self) -> PathBuf {
        self.current_path.lock().expect("stats lock poisoned").clone()
    }

    fn set_path(&self, path: &Path) {
        *self.current_path.lock().expect("stats lock poisoned") = path.to_path_buf();
    }
}

type DateSource = Box<dyn Fn() -> NaiveDate + Send>;

pub struct FileSink {
    formatter: Formatter,
    cfg: FileConfig,
    dir: PathBuf,
    stem: String,
    ext: String,
    file: Option<BufWriter<fs::File>>,
    buf: Vec<u8>,
    written_bytes: u64,
    last_flush: Instant,
    open_date: NaiveDate,
    rotate_seq: u32,
    stats: Arc<FileSinkStats>,
    today: DateSource,
}

impl FileSink {
    pub fn new() -> Self {
        FileSink {
            formatter: Formatter::new("%Y-%m-%d %H:%M:%S"),
            cfg: FileConfig::default(),
            dir: PathBuf::new(),
            stem: String::new(),
            ext: String::new(),
            file: None,
            buf: Vec::new(),
            written_bytes: 0,
            last_flush: Instant::now(),
            open_date: NaiveDate::MIN,
            rotate_seq: 0,
            stats: FileSinkStats::new(),
            today: Box::new(|| Local::now().date_naive()),
        }
    }

    /// Shared rotation-count / current-path observables.
    pub fn stats(&self) -> Arc<FileSinkStats> {
        Arc::clone(&self.stats)
    }

    /// Replace the local-date source. Rotation tests inject a movable
    /// date here instead of waiting for midnight.
    pub fn set_date_source(&mut self, source: impl Fn() -> NaiveDate + Send + 'static) {
        self.today = Box::new(source);
    }

    /// Rotate now, regardless of policy.
    pub fn force_rotation(&mut self) {
        self.drain_buffer();
        self.rotate();
    }

    fn needs_rotation(&self) -> bool {
        if self.file.is_none() {
            return false;
        }
        let by_size = matches!(
            self.cfg.rotate_policy,
            RotatePolicy::Size | RotatePolicy::SizeAndTime
        ) && self.written_bytes >= self.cfg.max_size_mb * 1024 * 1024;
        let by_date = matches!(
            self.cfg.rotate_policy,
            RotatePolicy::Daily | RotatePolicy::SizeAndTime
        ) && (self.today)() != self.open_date;
        by_size || by_date
    }

    fn rotate(&mut self) {
        // close the live file under its current name
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let today = (self.today)();
        let new_path = if matches!(
            self.cfg.rotate_policy,
            RotatePolicy::Daily | RotatePolicy::SizeAndTime
        ) && today != self.open_date
        {
            self.daily_file_name(today)
        } else {
            self.sequenced_file_name()
        };

        match self.open_file(&new_path) {
            Ok(file) => {
                self.file = Some(file);
                self.stats.set_path(&new_path);
            }
            Err(e) => {
                // go dormant for this file; counters still advance
                eprintln!("[FileSink] failed to open '{}': {}", new_path.display(), e);
            }
        }

        self.apply_retention();

        self.written_bytes = 0;
        self.open_date = today;
        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// `<stem>_<YYYYMMDD>.<ext>`, with a numbered suffix if today's name
    /// is already taken.
    fn daily_file_name(&mut self, date: NaiveDate) -> PathBuf {
        let base = self.dir.join(format!(
            "{}_{}.{}",
            self.stem,
            date.format("%Y%m%d"),
            self.ext
        ));
        if !base.exists() {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!(
                "{}_{}_{}.{}",
                self.stem,
                date.format("%Y%m%d"),
                n,
                self.ext
            ));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// `<stem>_<YYYYMMDD_HHMMSS>_<counter>.<ext>`; the counter is
    /// process-monotonic and resynchronized on collision.
    fn sequenced_file_name(&mut self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        loop {
            self.rotate_seq += 1;
            let candidate = self.dir.join(format!(
                "{}_{}_{}.{}",
                self.stem, stamp, self.rotate_seq, self.ext
            ));
            if !candidate.exists() {
                return candidate;
            }
        }
    }

    fn open_file(&self, path: &Path) -> std::io::Result<BufWriter<fs::File>> {
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::with_capacity(self.cfg.buffer_kb * 1024, file))
    }

    /// Delete files matching the stem prefix beyond the `max_files` most
    /// recently modified. Best effort.
    fn apply_retention(&self) {
        if self.cfg.max_files == 0 {
            return;
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("[FileSink] retention: cannot list '{}': {}", self.dir.display(), e);
                return;
            }
        };

        let mut matches: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.starts_with(&self.stem) || !name.ends_with(&format!(".{}", self.ext)) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH);
            matches.push((modified, path));
        }

        matches.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in matches.into_iter().skip(self.cfg.max_files) {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("[FileSink] retention: cannot remove '{}': {}", path.display(), e);
            }
        }
    }

    /// Move the user-space buffer into the (buffered) file.
    fn drain_buffer(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(&self.buf) {
                eprintln!("[FileSink] write failed: {}", e);
            }
        }
        self.buf.clear();
    }

    fn flush_to_os(&mut self) {
        self.drain_buffer();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        self.last_flush = Instant::now();
    }

    fn append_record(&mut self, record: &Record) {
        if self.needs_rotation() {
            self.drain_buffer();
            self.rotate();
        }

        let before = self.buf.len();
        self.formatter.format_into(record, &mut self.buf);
        self.written_bytes += (self.buf.len() - before) as u64;

        if self.buf.len() >= FLUSH_THRESHOLD {
            self.drain_buffer();
        }
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for FileSink {
    fn initialize(&mut self, config: &Config) -> Result<(), SinkError> {
        self.formatter = Formatter::new(&config.time_format);
        self.cfg = config.file.clone();

        let base = PathBuf::from(&self.cfg.path);
        self.dir = base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.stem = base
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("logfile")
            .to_string();
        self.ext = base
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("log")
            .to_string();

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|source| SinkError::Open {
                path: self.dir.clone(),
                source,
            })?;
        }

        let file = self.open_file(&base).map_err(|source| SinkError::Open {
            path: base.clone(),
            source,
        })?;
        self.written_bytes = file.get_ref().metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        self.buf = Vec::with_capacity(self.cfg.buffer_kb * 1024);
        self.open_date = (self.today)();
        self.last_flush = Instant::now();
        self.stats.set_path(&base);
        Ok(())
    }

    fn write(&mut self, record: &Record) {
        if self.file.is_none() {
            return;
        }
        self.append_record(record);
        if self.last_flush.elapsed() >= FLUSH_INTERVAL {
            self.flush_to_os();
        }
    }

    fn write_batch(&mut self, records: &[Record]) {
        if self.file.is_none() || records.is_empty() {
            return;
        }
        for record in records {
            self.append_record(record);
        }
        // one flush per batch amortizes the syscall
        self.flush_to_os();
    }

    fn flush(&mut self) {
        self.flush_to_os();
    }

    fn sync(&mut self) {
        self.flush_to_os();
        if let Some(file) = self.file.as_ref() {
            let _ = file.get_ref().sync_all();
        }
    }

    fn shutdown(&mut self) {
        self.flush_to_os();
        self.file = None;
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn recommended_batch_size(&self) -> usize {
        2048
    }
}
