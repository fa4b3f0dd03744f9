// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Line formatter owned by each sink.
//!
//! Renders `<time> <LEVEL> <tid-hash> <file>:<line> <payload>\n`. The
//! calendar rendering of the timestamp is cached per second: as long as
//! the clock has not advanced a full second, the previous rendition is
//! reused and only the payload changes.

use chrono::{Local, TimeZone};
use std::io::Write;

use crate::record::Record;
use crate::Level;

const RESET: &str = "\x1b[0m";

const fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => "\x1b[36m",
        Level::Info => "\x1b[32m",
        Level::Warn => "\x1b[33m",
        Level::Error => "\x1b[31m",
        Level::Fatal => "\x1b[1;31m",
    }
}

pub struct Formatter {
    time_format: String,
    color: bool,
    last_second: i64,
    rendered_time: String,
}

impl Formatter {
    pub fn new(time_format: &str) -> Self {
        Formatter {
            time_format: time_format.to_string(),
            color: false,
            last_second: i64::MIN,
            rendered_time: String::new(),
        }
    }

    /// Wrap each line in a level-specific ANSI color, resetting before
    /// the trailing newline.
    pub fn with_color(time_format: &str) -> Self {
        let mut f = Self::new(time_format);
        f.color = true;
        f
    }

    /// Append one rendered line for `record` to `out`.
    pub fn format_into(&mut self, record: &Record, out: &mut Vec<u8>) {
        if self.color {
            out.extend_from_slice(level_color(record.level).as_bytes());
        }

        let time = self.render_time(record.time_ns);
        out.extend_from_slice(time.as_bytes());

        let _ = write!(
            out,
            " {} {} {}:{} ",
            record.level.as_str(),
            record.thread_id_hash,
            record.file,
            record.line
        );
        out.extend_from_slice(record.payload());

        if self.color {
            out.extend_from_slice(RESET.as_bytes());
        }
        out.push(b'\n');
    }

    fn render_time(&mut self, time_ns: i64) -> &str {
        let second = time_ns.div_euclid(1_000_000_000);
        if second != self.last_second || self.rendered_time.is_empty() {
            self.last_second = second;
            self.rendered_time = match Local.timestamp_opt(second, 0) {
                chrono::LocalResult::Single(dt) => dt.format(&self.time_format).to_string(),
                _ => String::from("????-??-?? ??:??:??"),
            };
        }
        &self.rendered_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use std::fmt::Write as FmtWrite;

    fn record(text: &str, level: Level, time_ns: i64) -> Record {
        let pool = BufferPool::new(1, 1);
        let mut buf = pool.alloc();
        write!(buf, "{}", text).unwrap();
        Record::message(level, "src/app.rs", 42, 99, time_ns, buf)
    }

    #[test]
    fn test_line_layout() {
        let mut formatter = Formatter::new("%Y-%m-%d %H:%M:%S");
        let mut out = Vec::new();
        formatter.format_into(&record("hello", Level::Info, 1_700_000_000_000_000_000), &mut out);

        let line = String::from_utf8(out).unwrap();
        assert!(line.ends_with("hello\n"));
        assert!(line.contains(" INFO 99 src/app.rs:42 hello"));
        // timestamp comes first and matches the pattern length
        let time_part = line.split(" INFO").next().unwrap();
        assert_eq!(time_part.len(), "2023-11-14 22:13:20".len());
    }

    #[test]
    fn test_color_wrapping() {
        let mut formatter = Formatter::with_color("%H:%M:%S");
        let mut out = Vec::new();
        formatter.format_into(&record("x", Level::Error, 0), &mut out);

        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("\x1b[31m"));
        assert!(line.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn test_second_cache_reused_within_second() {
        let mut formatter = Formatter::new("%Y-%m-%d %H:%M:%S");
        let base = 1_700_000_000_000_000_000;

        let mut first = Vec::new();
        formatter.format_into(&record("a", Level::Info, base), &mut first);
        let cached = formatter.rendered_time.clone();

        // 500 ms later, same second: rendition must be identical
        let mut second = Vec::new();
        formatter.format_into(&record("b", Level::Info, base + 500_000_000), &mut second);
        assert_eq!(formatter.rendered_time, cached);

        // next second: rendition changes
        let mut third = Vec::new();
        formatter.format_into(&record("c", Level::Info, base + 1_000_000_000), &mut third);
        assert_ne!(formatter.rendered_time, cached);
    }

    #[test]
    fn test_custom_pattern() {
        let mut formatter = Formatter::new("%H:%M:%S");
        let mut out = Vec::new();
        formatter.format_into(&record("m", Level::Warn, 1_700_000_000_000_000_000), &mut out);
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line.split(' ').next().unwrap().len(), "22:13:20".len());
    }
}
