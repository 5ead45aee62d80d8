//! Deduplication of already-seen call identifiers.
//!
//! The store is volatile by design: it lives for one process run and grows
//! monotonically. The poller must check `seen` and call `mark` synchronously
//! before spawning any per-call work, which is what makes dispatch
//! at-most-once per cli_number for the run.

use std::collections::HashSet;

/// Registry of call identifiers that have already been dispatched.
///
/// Kept as a trait so tests (or a future bounded/TTL store) can substitute
/// their own implementation.
pub trait CallRegistry {
    /// Whether this cli_number was already marked during this run.
    fn seen(&self, cli_number: &str) -> bool;

    /// Record a cli_number. Idempotent; never evicts.
    fn mark(&mut self, cli_number: &str);
}

/// In-memory `HashSet` registry, the default for a single run.
#[derive(Debug, Default)]
pub struct InMemorySeenCalls {
    entries: HashSet<String>,
}

impl InMemorySeenCalls {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CallRegistry for InMemorySeenCalls {
    fn seen(&self, cli_number: &str) -> bool {
        self.entries.contains(cli_number)
    }

    fn mark(&mut self, cli_number: &str) {
        self.entries.insert(cli_number.to_string());
    }
}
