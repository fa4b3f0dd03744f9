// SPDX-License-Identifier: Apache-2.0 OR MIT
// Coarse clock: a process-wide timestamp refreshed by a timer thread

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Nanoseconds since the unix epoch, read from the real clock.
pub fn exact_now_ns() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        Err(_) => 0,
    }
}

/// A shared timestamp updated roughly every millisecond by a dedicated
/// thread. Producers read it with a relaxed load instead of paying a
/// full clock read per record; staleness is bounded by the refresh
/// interval. Callers that need precision use [`exact_now_ns`].
pub struct CoarseClock {
    now_ns: Arc<AtomicI64>,
    running: Arc<AtomicBool>,
    updater: std::sync::Mutex<Option<thread::JoinHandle<()>>>,
}

impl CoarseClock {
    /// Starts the updater thread.
    pub fn start() -> Self {
        let now_ns = Arc::new(AtomicI64::new(exact_now_ns()));
        let running = Arc::new(AtomicBool::new(true));

        let updater = {
            let now_ns = Arc::clone(&now_ns);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("logpump-clock".to_string())
                .spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        now_ns.store(exact_now_ns(), Ordering::Relaxed);
                        thread::sleep(REFRESH_INTERVAL);
                    }
                })
                .expect("failed to spawn clock thread")
        };

        CoarseClock {
            now_ns,
            running,
            updater: std::sync::Mutex::new(Some(updater)),
        }
    }

    /// Latest published timestamp, at most ~1 ms stale.
    #[inline]
    pub fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Relaxed)
    }

    /// Stops and joins the updater thread. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.updater.lock().expect("clock lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CoarseClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_clock_advances() {
        let clock = CoarseClock::start();
        let first = clock.now_ns();
        assert!(first > 0);

        thread::sleep(Duration::from_millis(20));
        let second = clock.now_ns();
        assert!(second > first);
    }

    #[test]
    fn test_coarse_close_to_exact() {
        let clock = CoarseClock::start();
        thread::sleep(Duration::from_millis(5));
        let coarse = clock.now_ns();
        let exact = exact_now_ns();
        // staleness bounded by the refresh interval plus scheduling slack
        assert!((exact - coarse).abs() < 500_000_000);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let clock = CoarseClock::start();
        clock.stop();
        clock.stop();
    }
}
