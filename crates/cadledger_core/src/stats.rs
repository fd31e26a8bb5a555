//! Session statistics.
//!
//! All counters are atomic and can be read while commands are running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Session counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    submitted: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    undone: AtomicU64,
    redone: AtomicU64,
    evicted: AtomicU64,
    released: AtomicU64,
}

impl SessionStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_undo(&self) {
        self.undone.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_redo(&self) {
        self.redone.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self, entities: usize) {
        self.released.fetch_add(entities as u64, Ordering::Relaxed);
    }

    /// Returns the number of submitted commands.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of committed commands.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed (rolled back) commands.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of undos.
    pub fn undone(&self) -> u64 {
        self.undone.load(Ordering::Relaxed)
    }

    /// Returns the number of redos.
    pub fn redone(&self) -> u64 {
        self.redone.load(Ordering::Relaxed)
    }

    /// Returns the number of commands evicted by the history limit.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Returns the number of entities physically released.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted(),
            committed: self.committed(),
            failed: self.failed(),
            undone: self.undone(),
            redone: self.redone(),
            evicted: self.evicted(),
            released: self.released(),
        }
    }
}

/// A point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct StatsSnapshot {
    /// Submitted commands.
    pub submitted: u64,
    /// Committed commands.
    pub committed: u64,
    /// Failed commands.
    pub failed: u64,
    /// Undos.
    pub undone: u64,
    /// Redos.
    pub redone: u64,
    /// Commands evicted from history.
    pub evicted: u64,
    /// Entities released.
    pub released: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters() {
        let stats = SessionStats::new();
        stats.record_submit();
        stats.record_submit();
        stats.record_commit();
        stats.record_failure();
        stats.record_release(3);

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.committed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.released, 3);
        assert_eq!(snap.undone, 0);
    }

    #[test]
    fn concurrent_updates() {
        let stats = Arc::new(SessionStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_undo();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.undone(), 400);
    }
}
