//! Time-travel entities and the per-request stage machine.

use super::sensitivity::SensitivityLevel;
use super::time_point::TimePoint;
use crate::classification::entities::Complexity;
use crate::core::model::Model;
use crate::ensemble::value_objects::ModelCallResult;
use serde::{Deserialize, Serialize};

/// The answer as of one time point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time_point: TimePoint,
    pub result: ModelCallResult,
    /// Changes relative to the previous successful snapshot
    pub key_changes: Vec<String>,
    pub data_points: Vec<String>,
}

impl Snapshot {
    pub fn new(time_point: TimePoint, result: ModelCallResult) -> Self {
        let data_points = if result.success {
            super::parsing::extract_data_points(&result.text)
        } else {
            Vec::new()
        };
        Self {
            time_point,
            result,
            key_changes: Vec::new(),
            data_points,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.success
    }
}

/// Sort snapshots ascending by time point, whatever order they finished in
pub fn sort_chronologically(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| a.time_point.cmp(&b.time_point));
}

/// How fast the answer changed across snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeVelocity {
    Fast,
    #[default]
    Moderate,
    Slow,
    Minimal,
    Unknown,
}

impl ChangeVelocity {
    /// Lenient parse of a model-written label; unrecognised text is `Moderate`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.starts_with("fast") || label.starts_with("rapid") {
            ChangeVelocity::Fast
        } else if label.starts_with("slow") {
            ChangeVelocity::Slow
        } else if label.starts_with("minimal") || label.starts_with("stable") || label.starts_with("none") {
            ChangeVelocity::Minimal
        } else {
            ChangeVelocity::Moderate
        }
    }
}

/// Evolution narrative written over the snapshot set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub narrative: String,
    pub insights: Vec<String>,
    pub velocity: ChangeVelocity,
    pub outlook: String,
}

/// Per-request pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTravelStage {
    Idle,
    Classifying,
    GeneratingSnapshots,
    ExtractingChanges,
    Narrating,
    Complete,
    Error,
}

impl TimeTravelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeTravelStage::Idle => "idle",
            TimeTravelStage::Classifying => "classifying",
            TimeTravelStage::GeneratingSnapshots => "generating_snapshots",
            TimeTravelStage::ExtractingChanges => "extracting_changes",
            TimeTravelStage::Narrating => "narrating",
            TimeTravelStage::Complete => "complete",
            TimeTravelStage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TimeTravelStage::Complete | TimeTravelStage::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// Stages advance in order. `Classifying` and `GeneratingSnapshots` may
    /// shortcut to `Complete` (ineligible question, identical answers), and
    /// any non-terminal stage may fail into `Error`.
    pub fn can_transition_to(&self, next: TimeTravelStage) -> bool {
        use TimeTravelStage::*;
        match (self, next) {
            (from, Error) => !from.is_terminal(),
            (Idle, Classifying)
            | (Classifying, GeneratingSnapshots)
            | (Classifying, Complete)
            | (GeneratingSnapshots, ExtractingChanges)
            | (GeneratingSnapshots, Complete)
            | (ExtractingChanges, Narrating)
            | (Narrating, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TimeTravelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub classification_ms: u64,
    pub snapshots_parallel_ms: u64,
    pub key_changes_ms: u64,
    pub narrative_ms: u64,
    pub total_ms: u64,
}

/// Complete output of one time-travel request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTravelResult {
    pub question: String,
    pub sensitivity: SensitivityLevel,
    pub sensitivity_reason: String,
    pub is_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub complexity: Complexity,
    pub snapshot_model: Model,
    /// Ascending by time point
    pub snapshots: Vec<Snapshot>,
    pub evolution_narrative: String,
    pub insights: Vec<String>,
    pub change_velocity: ChangeVelocity,
    pub future_outlook: String,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub timings: StageTimings,
    pub final_stage: TimeTravelStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TimeTravelResult {
    /// An empty result for `question`, before any stage has run
    pub fn new(question: impl Into<String>, sensitivity: SensitivityLevel, reason: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sensitivity,
            sensitivity_reason: reason.into(),
            is_eligible: true,
            skip_reason: None,
            complexity: Complexity::Moderate,
            snapshot_model: Model::Gpt4o,
            snapshots: Vec::new(),
            evolution_narrative: String::new(),
            insights: Vec::new(),
            change_velocity: ChangeVelocity::Unknown,
            future_outlook: String::new(),
            total_cost: 0.0,
            total_tokens: 0,
            timings: StageTimings::default(),
            final_stage: TimeTravelStage::Idle,
            error: None,
        }
    }

    /// Mark the question as not worth time-travelling
    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.is_eligible = false;
        self.skip_reason = Some(reason.into());
        self
    }

    pub fn successful_snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter().filter(|s| s.is_success())
    }

    pub fn apply_narrative(&mut self, narrative: Narrative) {
        self.evolution_narrative = narrative.narrative;
        self.insights = narrative.insights;
        self.change_velocity = narrative.velocity;
        self.future_outlook = narrative.outlook;
    }

    /// Add the cost and tokens of one model call to the running totals
    pub fn record_call(&mut self, call: &ModelCallResult) {
        if call.success {
            self.total_cost += call.cost;
        }
        self.total_tokens += call.total_tokens();
    }
}
