// SPDX-License-Identifier: Apache-2.0 OR MIT
//! HTTP sink: ships rendered records as JSON batches.
//!
//! Only the batch contract lives here; the wire transport is behind the
//! [`HttpTransport`] trait. Records accumulate in a pending buffer and
//! are posted as `{"logs": [...]}` once `batch_size` is reached, on
//! `flush`, and on `shutdown`. Failed posts are retried with a growing
//! delay; if the endpoint stays down the pending buffer is capped by
//! shedding its oldest batch.

use chrono::{Local, TimeZone};
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{Config, HttpConfig};
use crate::record::Record;
use crate::sink::{parse_http_url, Sink, SinkError};

/// Posts one request body; `Ok` means the server accepted it.
pub trait HttpTransport: Send {
    fn post(&mut self, body: &[u8]) -> Result<(), SinkError>;
}

/// Minimal HTTP/1.1 POST over a fresh TCP connection per request.
pub struct TcpTransport {
    host: String,
    port: u16,
    endpoint: String,
    content_type: String,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, SinkError> {
        let (host, port) = parse_http_url(&config.url).map_err(|reason| SinkError::InvalidUrl {
            url: config.url.clone(),
            reason,
        })?;
        Ok(TcpTransport {
            host,
            port,
            endpoint: if config.endpoint.is_empty() {
                "/logs".to_string()
            } else {
                config.endpoint.clone()
            },
            content_type: config.content_type.clone(),
            timeout: Duration::from_secs(config.timeout_sec.max(1)),
        })
    }
}

impl HttpTransport for TcpTransport {
    fn post(&mut self, body: &[u8]) -> Result<(), SinkError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| SinkError::Transport(format!("resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| SinkError::Transport(format!("no address for {}", self.host)))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| SinkError::Transport(format!("connect {}: {}", addr, e)))?;
        let _ = stream.set_read_timeout(Some(self.timeout));
        let _ = stream.set_write_timeout(Some(self.timeout));

        let header = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.endpoint,
            self.host,
            self.content_type,
            body.len()
        );
        stream
            .write_all(header.as_bytes())
            .and_then(|_| stream.write_all(body))
            .map_err(|e| SinkError::Transport(format!("send: {}", e)))?;

        let mut response = [0u8; 512];
        let n = stream
            .read(&mut response)
            .map_err(|e| SinkError::Transport(format!("recv: {}", e)))?;
        let status_line = String::from_utf8_lossy(&response[..n]);
        if status_line.split_whitespace().nth(1) == Some("200") {
            Ok(())
        } else {
            Err(SinkError::Transport(format!(
                "unexpected status: {}",
                status_line.lines().next().unwrap_or("<empty>")
            )))
        }
    }
}

#[derive(Serialize)]
struct HttpLogEntry {
    timestamp: String,
    level: &'static str,
    thread_id: u64,
    file: &'static str,
    line: u32,
    content: String,
}

#[derive(Serialize)]
struct HttpLogBatch<'a> {
    logs: &'a [HttpLogEntry],
}

pub struct HttpSink {
    cfg: HttpConfig,
    time_format: String,
    transport: Option<Box<dyn HttpTransport>>,
    pending: Vec<HttpLogEntry>,
    initialized: bool,
}

impl HttpSink {
    pub fn new() -> Self {
        HttpSink {
            cfg: HttpConfig::default(),
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            transport: None,
            pending: Vec::new(),
            initialized: false,
        }
    }

    /// Use a caller-supplied transport instead of the TCP default.
    pub fn with_transport(transport: Box<dyn HttpTransport>) -> Self {
        let mut sink = Self::new();
        sink.transport = Some(transport);
        sink
    }

    fn render(&self, record: &Record) -> HttpLogEntry {
        let secs = record.time_ns.div_euclid(1_000_000_000);
        let nanos = record.time_ns.rem_euclid(1_000_000_000) as u32;
        let timestamp = match Local.timestamp_opt(secs, nanos) {
            chrono::LocalResult::Single(dt) => dt.format(&self.time_format).to_string(),
            _ => String::new(),
        };
        HttpLogEntry {
            timestamp,
            level: record.level.as_str(),
            thread_id: record.thread_id_hash,
            file: record.file,
            line: record.line,
            content: String::from_utf8_lossy(record.payload()).into_owned(),
        }
    }

    fn post_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => return,
        };
        let body = match serde_json::to_vec(&HttpLogBatch {
            logs: &self.pending,
        }) {
            Ok(body) => body,
            Err(e) => {
                eprintln!("[HttpSink] serialize failed: {}", e);
                self.pending.clear();
                return;
            }
        };

        let mut attempt: u32 = 0;
        loop {
            match transport.post(&body) {
                Ok(()) => {
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    eprintln!("[HttpSink] post failed (attempt {}): {}", attempt + 1, e);
                }
            }
            attempt += 1;
            if attempt > self.cfg.max_retries {
                break;
            }
            std::thread::sleep(Duration::from_millis(100 * attempt as u64));
        }

        // endpoint stays down: keep the batch for the next try, but
        // shed the oldest records once the backlog doubles
        if self.pending.len() > self.cfg.batch_size * 2 {
            self.pending.drain(..self.cfg.batch_size);
        }
    }
}

impl Default for HttpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for HttpSink {
    fn initialize(&mut self, config: &Config) -> Result<(), SinkError> {
        self.cfg = config.http.clone();
        self.time_format = config.time_format.clone();
        if self.transport.is_none() {
            self.transport = Some(Box::new(TcpTransport::new(&self.cfg)?));
        }
        self.pending.reserve(self.cfg.batch_size);
        self.initialized = true;
        Ok(())
    }

    fn write(&mut self, record: &Record) {
        if !self.initialized {
            return;
        }
        let entry = self.render(record);
        self.pending.push(entry);
        if self.pending.len() >= self.cfg.batch_size {
            self.post_pending();
        }
    }

    fn write_batch(&mut self, records: &[Record]) {
        if !self.initialized || records.is_empty() {
            return;
        }
        for record in records {
            let entry = self.render(record);
            self.pending.push(entry);
        }
        self.post_pending();
    }

    fn flush(&mut self) {
        if self.initialized {
            self.post_pending();
        }
    }

    fn shutdown(&mut self) {
        self.flush();
        self.initialized = false;
        self.transport = None;
    }

    fn name(&self) -> &'static str {
        "http"
    }

    fn recommended_batch_size(&self) -> usize {
        self.cfg.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::Level;
    use std::fmt::Write as FmtWrite;
    use std::sync::{Arc, Mutex};

    struct MockTransport {
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        fail: Arc<Mutex<bool>>,
    }

    fn mock() -> (
        Box<MockTransport>,
        Arc<Mutex<Vec<serde_json::Value>>>,
        Arc<Mutex<bool>>,
    ) {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let fail = Arc::new(Mutex::new(false));
        (
            Box::new(MockTransport {
                bodies: Arc::clone(&bodies),
                fail: Arc::clone(&fail),
            }),
            bodies,
            fail,
        )
    }

    impl HttpTransport for MockTransport {
        fn post(&mut self, body: &[u8]) -> Result<(), SinkError> {
            if *self.fail.lock().unwrap() {
                return Err(SinkError::Transport("mock down".to_string()));
            }
            self.bodies
                .lock()
                .unwrap()
                .push(serde_json::from_slice(body).unwrap());
            Ok(())
        }
    }

    fn http_config(batch_size: usize, max_retries: u32) -> Config {
        let mut config = Config::default();
        config.http.enabled = true;
        config.http.url = "http://127.0.0.1:9".to_string();
        config.http.batch_size = batch_size;
        config.http.max_retries = max_retries;
        config
    }

    fn make_record(pool: &Arc<BufferPool>, text: &str) -> Record {
        let mut buf = pool.alloc();
        write!(buf, "{}", text).unwrap();
        Record::message(Level::Warn, "http.rs", 3, 11, 1_700_000_000_000_000_000, buf)
    }

    #[test]
    fn test_batch_posted_at_threshold() {
        let pool = BufferPool::new(8, 1);
        let (transport, bodies, _) = mock();
        let mut sink = HttpSink::with_transport(transport);
        sink.initialize(&http_config(3, 0)).unwrap();

        sink.write(&make_record(&pool, "one"));
        sink.write(&make_record(&pool, "two"));
        assert!(bodies.lock().unwrap().is_empty());

        sink.write(&make_record(&pool, "three"));
        let posted = bodies.lock().unwrap();
        assert_eq!(posted.len(), 1);
        let logs = posted[0]["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0]["content"], "one");
        assert_eq!(logs[0]["level"], "WARN");
        assert_eq!(logs[0]["file"], "http.rs");
        assert_eq!(logs[0]["line"], 3);
    }

    #[test]
    fn test_flush_posts_partial_batch() {
        let pool = BufferPool::new(4, 1);
        let (transport, bodies, _) = mock();
        let mut sink = HttpSink::with_transport(transport);
        sink.initialize(&http_config(100, 0)).unwrap();

        sink.write(&make_record(&pool, "lonely"));
        sink.flush();
        assert_eq!(bodies.lock().unwrap().len(), 1);

        // nothing new pending: flush is a no-op
        sink.flush();
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failure_keeps_pending_until_recovery() {
        let pool = BufferPool::new(4, 1);
        let (transport, bodies, fail) = mock();
        let mut sink = HttpSink::with_transport(transport);
        sink.initialize(&http_config(100, 0)).unwrap();

        *fail.lock().unwrap() = true;
        sink.write(&make_record(&pool, "stuck"));
        sink.flush();
        assert!(bodies.lock().unwrap().is_empty());

        *fail.lock().unwrap() = false;
        sink.flush();
        let posted = bodies.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["logs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_backlog_shedding() {
        let pool = BufferPool::new(4, 1);
        let (transport, _, fail) = mock();
        let mut sink = HttpSink::with_transport(transport);
        sink.initialize(&http_config(2, 0)).unwrap();
        *fail.lock().unwrap() = true;

        for i in 0..10 {
            sink.write(&make_record(&pool, &format!("m{}", i)));
        }
        // pending never exceeds 2 * batch_size by more than one write cycle
        assert!(sink.pending.len() <= 5);
    }

    #[test]
    fn test_write_batch_posts_once() {
        let pool = BufferPool::new(8, 1);
        let (transport, bodies, _) = mock();
        let mut sink = HttpSink::with_transport(transport);
        sink.initialize(&http_config(100, 0)).unwrap();

        let records: Vec<Record> = (0..4).map(|i| make_record(&pool, &format!("b{}", i))).collect();
        sink.write_batch(&records);

        let posted = bodies.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["logs"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_bad_url_fails_initialize() {
        let mut config = Config::default();
        config.http.url = "not a url".to_string();
        let mut sink = HttpSink::new();
        assert!(matches!(
            sink.initialize(&config),
            Err(SinkError::InvalidUrl { .. })
        ));
    }
}
