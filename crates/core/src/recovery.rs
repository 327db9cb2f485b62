//! Repair outcomes and the per-pass recovery summary.

use serde::{Deserialize, Serialize};

/// What a handler did to reconcile one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The interrupted operation was carried forward to completion.
    Resumed,
    /// Leftover side effects (orphaned temp file, unusable entry) were removed.
    Cleaned,
    /// The on-disk state was already consistent; nothing was touched.
    Verified,
}

/// Aggregate counters for one recovery pass.
///
/// Returned by value from the pass and published once; there is no
/// process-wide counter state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySummary {
    pub resumed: u32,
    pub cleaned: u32,
    pub verified: u32,
    /// Repair attempts that raised an error (including those dead-lettered).
    pub failed: u32,
    pub dead_lettered: u32,
    /// Checkpoints left for their owning subsystem (downloads).
    pub deferred: u32,
    /// Checkpoints of an unknown operation type, deleted without repair.
    pub discarded: u32,
    /// Stale checkpoints removed by the sweep before processing.
    pub stale_cleared: u64,
    pub duration_ms: u64,
}

impl RecoverySummary {
    /// Count a successful repair.
    pub fn record(&mut self, outcome: RepairOutcome) {
        match outcome {
            RepairOutcome::Resumed => self.resumed += 1,
            RepairOutcome::Cleaned => self.cleaned += 1,
            RepairOutcome::Verified => self.verified += 1,
        }
    }

    /// Checkpoints fully reconciled by repair in this pass.
    pub fn recovered(&self) -> u32 {
        self.resumed + self.cleaned + self.verified
    }

    /// Whether the pass produced anything worth telling the user about.
    pub fn should_notify(&self) -> bool {
        self.resumed > 0 || self.dead_lettered > 0
    }

    /// Whether the pass changed the journal: repaired, failed, quarantined,
    /// discarded or swept at least one checkpoint.
    ///
    /// Deferred checkpoints are left exactly as found and do not count.
    pub fn changed_journal(&self) -> bool {
        self.recovered() > 0
            || self.failed > 0
            || self.dead_lettered > 0
            || self.discarded > 0
            || self.stale_cleared > 0
    }

    /// Whether the pass touched no checkpoint at all.
    pub fn is_empty(&self) -> bool {
        self.recovered() == 0
            && self.failed == 0
            && self.dead_lettered == 0
            && self.deferred == 0
            && self.discarded == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_routes_outcomes_to_counters() {
        let mut summary = RecoverySummary::default();
        summary.record(RepairOutcome::Resumed);
        summary.record(RepairOutcome::Cleaned);
        summary.record(RepairOutcome::Cleaned);
        summary.record(RepairOutcome::Verified);

        assert_eq!(summary.resumed, 1);
        assert_eq!(summary.cleaned, 2);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.recovered(), 4);
    }

    #[test]
    fn notify_only_for_resumed_or_dead_lettered() {
        let mut summary = RecoverySummary {
            cleaned: 3,
            failed: 1,
            ..Default::default()
        };
        assert!(!summary.should_notify());

        summary.dead_lettered = 1;
        assert!(summary.should_notify());

        let resumed = RecoverySummary {
            resumed: 1,
            ..Default::default()
        };
        assert!(resumed.should_notify());
    }

    #[test]
    fn default_summary_is_empty() {
        assert!(RecoverySummary::default().is_empty());
        let deferred = RecoverySummary {
            deferred: 1,
            ..Default::default()
        };
        assert!(!deferred.is_empty());
    }

    #[test]
    fn deferred_only_pass_leaves_journal_unchanged() {
        let deferred = RecoverySummary {
            deferred: 2,
            ..Default::default()
        };
        assert!(!deferred.changed_journal());

        let swept = RecoverySummary {
            stale_cleared: 1,
            ..deferred.clone()
        };
        assert!(swept.changed_journal());

        let failed = RecoverySummary {
            failed: 1,
            ..Default::default()
        };
        assert!(failed.changed_journal());
    }
}
