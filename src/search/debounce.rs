use std::time::{Duration, Instant};

/// Cooperative settle timer for an active search session.
///
/// Each keystroke replaces the raw query and restarts the window; only the
/// last value within the window is ever applied. A zero settle time applies
/// synchronously. This gates *when* the query takes effect, never *what*
/// the search computes.
#[derive(Debug, Clone)]
pub struct DebouncedQuery {
    raw: String,
    applied: String,
    settle: Duration,
    pending_since: Option<Instant>,
}

impl DebouncedQuery {
    pub fn new(settle: Duration) -> Self {
        Self {
            raw: String::new(),
            applied: String::new(),
            settle,
            pending_since: None,
        }
    }

    pub fn from_millis(settle_ms: u64) -> Self {
        Self::new(Duration::from_millis(settle_ms))
    }

    /// The query as typed, for display.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The query the visible filtered set currently reflects.
    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Record a new query value and restart the settle window.
    pub fn set(&mut self, query: &str) {
        if self.raw == query {
            return;
        }
        self.raw.clear();
        self.raw.push_str(query);
        if self.settle.is_zero() {
            self.applied = self.raw.clone();
            self.pending_since = None;
        } else {
            self.pending_since = Some(Instant::now());
        }
    }

    /// Apply the pending query if the settle window has elapsed. Returns
    /// the newly applied value, or `None` when nothing became ready.
    pub fn poll(&mut self) -> Option<&str> {
        let since = self.pending_since?;
        if since.elapsed() < self.settle {
            return None;
        }
        self.applied = self.raw.clone();
        self.pending_since = None;
        Some(&self.applied)
    }

    /// Apply the latest value immediately, bypassing the window.
    pub fn flush(&mut self) -> &str {
        self.applied = self.raw.clone();
        self.pending_since = None;
        &self.applied
    }

    /// Drop any pending value without applying it. Session teardown must
    /// call this so a stale query never lands after the caller is gone.
    pub fn cancel(&mut self) {
        self.pending_since = None;
    }
}
