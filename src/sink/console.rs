// SPDX-License-Identifier: Apache-2.0 OR MIT
// Console sink: color-wrapped lines on stdout

use std::io::Write;

use crate::config::Config;
use crate::format::Formatter;
use crate::record::Record;
use crate::sink::{Sink, SinkError};

/// Writes color-wrapped lines to stdout. Formatting happens into a
/// reusable buffer so a batch costs one `write_all` per record body
/// and a single flush.
pub struct ConsoleSink {
    formatter: Formatter,
    buffer: Vec<u8>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink {
            formatter: Formatter::with_color("%Y-%m-%d %H:%M:%S"),
            buffer: Vec::with_capacity(1024),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn initialize(&mut self, config: &Config) -> Result<(), SinkError> {
        self.formatter = Formatter::with_color(&config.time_format);
        Ok(())
    }

    fn write(&mut self, record: &Record) {
        self.buffer.clear();
        self.formatter.format_into(record, &mut self.buffer);
        let _ = std::io::stdout().write_all(&self.buffer);
    }

    fn write_batch(&mut self, records: &[Record]) {
        self.buffer.clear();
        for record in records {
            self.formatter.format_into(record, &mut self.buffer);
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(&self.buffer);
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }

    fn shutdown(&mut self) {
        self.flush();
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn recommended_batch_size(&self) -> usize {
        256
    }
}
