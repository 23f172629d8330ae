//! Progress notification port
//!
//! Defines the interface for reporting time-travel progress as each stage or
//! parallel unit finishes.

use ensemble_domain::{Complexity, Model, Narrative, Snapshot, TemporalSensitivity, TimePoint};

/// Callback for progress updates during a time-travel run
///
/// Implementations live in the presentation layer (console) or wrap an event
/// queue (streaming). Every method has an empty default so adapters only
/// implement what they display.
pub trait TimeTravelProgress: Send + Sync {
    /// Sensitivity decided and time points chosen
    fn on_classified(
        &self,
        _sensitivity: &TemporalSensitivity,
        _complexity: Complexity,
        _model: &Model,
        _time_points: &[TimePoint],
    ) {
    }

    /// One snapshot settled; called in completion order
    fn on_snapshot(&self, _snapshot: &Snapshot, _completed: usize, _total: usize) {}

    /// A snapshot task died before producing a result
    fn on_snapshot_lost(&self, _label: &str, _reason: &str) {}

    /// Key changes attached; `snapshots` is chronological
    fn on_key_changes(&self, _snapshots: &[Snapshot]) {}

    /// The narrative call is about to start
    fn on_narrative_start(&self) {}

    /// Narrative finished; `success` is false when the call failed
    fn on_narrative(&self, _narrative: &Narrative, _success: bool) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl TimeTravelProgress for NoProgress {}
