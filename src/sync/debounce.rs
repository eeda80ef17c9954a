use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Trailing-edge, per-path debouncer for change events.
///
/// A new event for a path already pending resets its deadline rather
/// than scheduling a second one; distinct paths pend independently and
/// are all flushed together once due. Poll-driven: the owner ticks
/// `due()` from its loop, so there are no timers or threads here.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<String, Instant>,
}

/// Delay for coalescing bursts of modify/create events on one file.
pub const SCAN_DEBOUNCE: Duration = Duration::from_millis(1000);

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Record a change event, resetting the path's deadline.
    pub fn note_change(&mut self, path: &str, now: Instant) {
        self.pending.insert(path.to_string(), now + self.delay);
    }

    /// Drain every path whose deadline has passed, in stable order.
    pub fn due(&mut self, now: Instant) -> Vec<String> {
        let mut ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();
        for path in &ready {
            self.pending.remove(path);
        }
        ready
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.pending.contains_key(path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
