// SPDX-License-Identifier: Apache-2.0 OR MIT
// Sink abstraction: downstream byte destinations for rendered records

mod console;
mod file;
mod http;

pub use console::ConsoleSink;
pub use file::{FileSink, FileSinkStats};
pub use http::{HttpSink, HttpTransport, TcpTransport};

use crate::config::Config;
use crate::record::Record;

/// A downstream destination for log records.
///
/// Sinks are driven only by the worker thread after `initialize`, so
/// implementations need `Send` but not `Sync`. Runtime write errors are
/// a sink-internal concern: they are reported on stderr and never stop
/// the worker or reach producers.
pub trait Sink: Send {
    /// Prepare I/O resources. A failing sink is dropped by the facade;
    /// the logger keeps running without it.
    fn initialize(&mut self, config: &Config) -> Result<(), SinkError>;

    /// Render and append one record.
    fn write(&mut self, record: &Record);

    /// Render and append a batch. The default loops `write`; sinks
    /// override it to amortize (the file sink flushes once at the end,
    /// the HTTP sink posts one body).
    fn write_batch(&mut self, records: &[Record]) {
        for record in records {
            self.write(record);
        }
    }

    /// Hand previously written bytes to the sink's medium (OS or
    /// remote). Stronger durability is `sync`.
    fn flush(&mut self);

    /// Request medium-level durability (fsync or equivalent). Optional;
    /// the default does nothing beyond `flush`.
    fn sync(&mut self) {
        self.flush();
    }

    /// Flush and release resources.
    fn shutdown(&mut self);

    fn name(&self) -> &'static str;

    fn recommended_batch_size(&self) -> usize {
        1024
    }

    fn supports_async(&self) -> bool {
        true
    }
}

/// Sink initialization and transport errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http transport: {0}")]
    Transport(String),
}

/// Parse an `http://host[:port]` url into host and port.
/// Only plain http is supported; anything else is an init error.
pub fn parse_http_url(url: &str) -> Result<(String, u16), String> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| "expected http:// scheme".to_string())?;
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err("missing host".to_string());
    }
    match rest.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err("missing host".to_string());
            }
            let port: u16 = port.parse().map_err(|_| format!("bad port '{}'", port))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), 80)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url() {
        assert_eq!(
            parse_http_url("http://127.0.0.1:8080"),
            Ok(("127.0.0.1".to_string(), 8080))
        );
        assert_eq!(
            parse_http_url("http://logs.example.com/"),
            Ok(("logs.example.com".to_string(), 80))
        );
        assert!(parse_http_url("https://secure.example.com").is_err());
        assert!(parse_http_url("http://").is_err());
        assert!(parse_http_url("http://host:notaport").is_err());
    }
}
