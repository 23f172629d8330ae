//! Stream event variants.
//!
//! Each event carries only the payload of the stage that produced it and
//! serializes as a flat JSON object tagged by `type`, e.g.
//! `{"type": "snapshot", "index": 1, "total": 4, ...}`.

use crate::classification::entities::Complexity;
use crate::core::model::Model;
use crate::time_travel::entities::{ChangeVelocity, Snapshot};
use crate::time_travel::sensitivity::SensitivityLevel;
use serde::{Deserialize, Serialize};

/// Changes between two consecutive successful snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionChanges {
    pub from: String,
    pub to: String,
    pub changes: Vec<String>,
}

/// Timing breakdown sent after the narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub total_ms: u64,
    pub snapshots_parallel_ms: u64,
    pub key_changes_ms: u64,
    pub narrative_ms: u64,
    /// Sum of individual call latencies, i.e. the cost of running them one by one
    pub sequential_estimate_ms: u64,
    pub time_saved_ms: u64,
    /// Slowest single step
    pub bottleneck: String,
    pub bottleneck_ms: u64,
}

/// Final summary closing a successful stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteSummary {
    pub is_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub total_snapshots: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_ms: u64,
    /// Ascending by time point
    pub snapshots: Vec<Snapshot>,
    pub narrative: String,
    pub insights: Vec<String>,
    pub velocity: ChangeVelocity,
    pub outlook: String,
}

/// One incremental stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {
        question: String,
        message: String,
    },
    Classification {
        sensitivity: SensitivityLevel,
        sensitivity_reason: String,
        complexity: Complexity,
        model: Model,
        num_snapshots: usize,
        time_points: Vec<String>,
    },
    /// One snapshot, in completion order
    Snapshot {
        index: usize,
        total: usize,
        remaining: usize,
        snapshot: Box<Snapshot>,
    },
    KeyChanges {
        transitions: Vec<TransitionChanges>,
    },
    Narrative {
        narrative: String,
        velocity: ChangeVelocity,
        outlook: String,
        success: bool,
    },
    Insight {
        index: usize,
        total: usize,
        insight: String,
    },
    Timing(TimingReport),
    Complete(Box<CompleteSummary>),
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
        recoverable: bool,
    },
    Heartbeat {
        message: String,
    },
}

impl StreamEvent {
    pub fn heartbeat(message: impl Into<String>) -> Self {
        StreamEvent::Heartbeat {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>, stage: Option<&str>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            stage: stage.map(str::to_string),
            recoverable: false,
        }
    }

    /// Wire name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::Classification { .. } => "classification",
            StreamEvent::Snapshot { .. } => "snapshot",
            StreamEvent::KeyChanges { .. } => "key_changes",
            StreamEvent::Narrative { .. } => "narrative",
            StreamEvent::Insight { .. } => "insight",
            StreamEvent::Timing(_) => "timing",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Ends the stream: `complete` or a non-recoverable `error`
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamEvent::Complete(_) => true,
            StreamEvent::Error { recoverable, .. } => !recoverable,
            _ => false,
        }
    }

    /// May be dropped under backpressure; carries no result data
    pub fn is_droppable(&self) -> bool {
        matches!(self, StreamEvent::Heartbeat { .. })
    }
}

/// A stream event stamped with its creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub event: StreamEvent,
}

impl StreamFrame {
    pub fn new(event: StreamEvent, timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_flat_with_type_tag() {
        let event = StreamEvent::Insight {
            index: 1,
            total: 3,
            insight: "Costs fell".to_string(),
        };
        let json = serde_json::to_value(StreamFrame::new(event, 42)).unwrap();
        assert_eq!(json["type"], "insight");
        assert_eq!(json["timestamp_ms"], 42);
        assert_eq!(json["insight"], "Costs fell");
    }

    #[test]
    fn test_newtype_variant_flattens() {
        let event = StreamEvent::Timing(TimingReport {
            total_ms: 10,
            snapshots_parallel_ms: 5,
            key_changes_ms: 2,
            narrative_ms: 3,
            sequential_estimate_ms: 20,
            time_saved_ms: 10,
            bottleneck: "narrative".to_string(),
            bottleneck_ms: 3,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "timing");
        assert_eq!(json["total_ms"], 10);
        assert_eq!(event.kind(), "timing");
    }

    #[test]
    fn test_terminal_and_droppable() {
        assert!(StreamEvent::fatal("boom", Some("narrating")).is_terminal());
        let recoverable = StreamEvent::Error {
            message: "one snapshot failed".to_string(),
            stage: None,
            recoverable: true,
        };
        assert!(!recoverable.is_terminal());
        assert!(StreamEvent::heartbeat("still working").is_droppable());
        assert!(!recoverable.is_droppable());
    }

    #[test]
    fn test_roundtrip_through_json() {
        let event = StreamEvent::KeyChanges {
            transitions: vec![TransitionChanges {
                from: "Jan 2023".to_string(),
                to: "Jan 2024".to_string(),
                changes: vec!["cheaper".to_string()],
            }],
        };
        let text = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}
