//! Scan debouncer.
//!
//! A camera decodes the same symbol many times per second while it is held
//! in view. The debouncer forwards the first sighting of a string and drops
//! identical strings until the cool-down window has passed since that string
//! was last forwarded. Strings that cannot be payloads are dropped outright.

use std::time::{Duration, Instant};

use gatepass_crypto::looks_like_payload;

#[derive(Debug)]
pub struct ScanDebouncer {
    window: Duration,
    min_len: usize,
    last: Option<(String, Instant)>,
}

impl ScanDebouncer {
    pub const fn new(window: Duration, min_len: usize) -> Self {
        Self {
            window,
            min_len,
            last: None,
        }
    }

    /// Offer a decoded string seen at `now`. Returns the string to forward,
    /// or `None` if it is suppressed.
    pub fn offer(&mut self, decoded: &str, now: Instant) -> Option<String> {
        let candidate = decoded.trim();
        if !looks_like_payload(candidate, self.min_len) {
            return None;
        }

        if let Some((last, forwarded_at)) = &self.last
            && last == candidate
            && now.saturating_duration_since(*forwarded_at) < self.window
        {
            return None;
        }

        self.last = Some((candidate.to_string(), now));
        Some(candidate.to_string())
    }

    /// Forget the last forwarded string so the next sighting goes through.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
