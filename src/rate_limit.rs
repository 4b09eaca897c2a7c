use crate::errors::ApiError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-key fixed-window request counter.
///
/// Each key (API key or peer address) gets a counter that resets whenever the
/// configured window elapses. The window is fixed, not sliding: a burst
/// straddling a window boundary can pass up to twice the nominal rate. That
/// boundary behavior is part of the limiter's contract and is covered by
/// tests; do not swap in a sliding window without revisiting them.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    records: Mutex<HashMap<String, RateRecord>>,
}

struct RateRecord {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key`, failing once the window budget is spent.
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        let mut records = self.records.lock().expect("rate limiter lock poisoned");
        let record = records.entry(key.to_string()).or_insert(RateRecord {
            count: 0,
            window_start: now,
        });
        if now.duration_since(record.window_start) > self.window {
            record.count = 0;
            record.window_start = now;
        }
        record.count += 1;
        if record.count > self.max_requests {
            return Err(ApiError::RateLimitExceeded);
        }
        Ok(())
    }
}
