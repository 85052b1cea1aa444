//! Debounced search input.
//!
//! Keystrokes update [`SearchController::local_value`] immediately and arm a
//! single deadline. The event loop calls [`SearchController::poll`] on every
//! tick; once the deadline passes, exactly one filter change is produced with
//! the latest value. There is no background timer, so after
//! [`SearchController::teardown`] nothing can fire.

use std::time::{Duration, Instant};
use tracing::trace;

use crate::sort::Filter;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SearchController {
    local: String,
    /// Last search value seen in (or sent to) the caller's filter.
    external: String,
    deadline: Option<Instant>,
    loading: bool,
    debounce: Duration,
    torn_down: bool,
}

impl SearchController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            local: String::new(),
            external: String::new(),
            deadline: None,
            loading: false,
            debounce,
            torn_down: false,
        }
    }

    pub fn local_value(&self) -> &str {
        &self.local
    }

    /// True from a keystroke until its debounced change is emitted.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record a keystroke. Re-arms the deadline; earlier pending values are
    /// superseded.
    pub fn input(&mut self, value: impl Into<String>, now: Instant) {
        if self.torn_down {
            return;
        }
        self.local = value.into();
        self.deadline = Some(now + self.debounce);
        self.loading = true;
    }

    /// Emit the debounced change once the deadline has passed.
    pub fn poll(&mut self, now: Instant, filter: &Filter) -> Option<Filter> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.loading = false;
        self.external = self.local.clone();
        trace!(search = %self.local, "search debounced");
        Some(filter.with_search(self.local.clone()))
    }

    /// Clear immediately, cancelling any pending change.
    pub fn clear(&mut self, filter: &Filter) -> Filter {
        self.deadline = None;
        self.loading = false;
        self.local.clear();
        self.external.clear();
        filter.with_search("")
    }

    /// Follow an out-of-band change of the caller's `search` value. A pending
    /// keystroke is dropped, the caller's value wins.
    pub fn sync_external(&mut self, search: &str) {
        if search == self.external {
            return;
        }
        trace!(search, "search changed externally");
        self.external = search.to_string();
        self.local = search.to_string();
        self.deadline = None;
        self.loading = false;
    }

    /// Cancel the pending deadline for good.
    pub fn teardown(&mut self) {
        self.deadline = None;
        self.loading = false;
        self.torn_down = true;
    }
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
