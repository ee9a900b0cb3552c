//! Engine statistics for Cambium data trees.
//!
//! Counters are cumulative since the tree was created or last reset.

/// Counters kept by the computation engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// (column, row) pairs accepted into the invalidation queue.
    invalidations: u64,
    /// Stored expression values evaluated by the engine.
    recomputes: u64,
    /// Flushes started by an outermost resume.
    flushes: u64,
    /// Queued rows dropped because they were detached before the flush.
    skipped_stale: u64,
    /// Events raised, before coalescing.
    events: u64,
}

impl EngineStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn skipped_stale(&self) -> u64 {
        self.skipped_stale
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    pub(crate) fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    pub(crate) fn record_recompute(&mut self) {
        self.recomputes += 1;
    }

    pub(crate) fn record_flush(&mut self) {
        self.flushes += 1;
    }

    pub(crate) fn record_skipped_stale(&mut self) {
        self.skipped_stale += 1;
    }

    pub(crate) fn record_event(&mut self) {
        self.events += 1;
    }

    /// Resets every counter to zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
