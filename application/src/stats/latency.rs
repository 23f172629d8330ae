//! Rolling latency samples per operation.
//!
//! Each operation keeps its most recent [`LATENCY_SAMPLE_LIMIT`] samples.
//! Summaries report nearest-rank percentiles over those samples, and the
//! alert table compares p95 latency and error rate against fixed thresholds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;
use tracing::debug;

/// Samples kept per operation
pub const LATENCY_SAMPLE_LIMIT: usize = 1000;

/// Operation names recorded by the use cases
pub mod ops {
    pub const TIME_TRAVEL_TOTAL: &str = "time_travel_total";
    pub const SNAPSHOTS_PARALLEL: &str = "parallel_snapshot_generation";
    pub const SNAPSHOT: &str = "generate_snapshot";
    pub const KEY_CHANGES: &str = "batch_key_changes_extraction";
    pub const NARRATIVE: &str = "evolution_narrative";
    pub const ENSEMBLE: &str = "ensemble";
    pub const SYNTHESIS: &str = "synthesis";
    pub const ROUTE_AND_ANSWER: &str = "route_and_answer";
}

/// Sequential time-travel latency the parallel pipeline is measured against
pub const BREAKDOWN_BASELINE_MS: f64 = 90_000.0;
pub const BREAKDOWN_TARGET_MS: f64 = 30_000.0;

const BREAKDOWN_OPERATIONS: [&str; 5] = [
    ops::TIME_TRAVEL_TOTAL,
    ops::SNAPSHOTS_PARALLEL,
    ops::KEY_CHANGES,
    ops::NARRATIVE,
    ops::SNAPSHOT,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertThreshold {
    pub operation: &'static str,
    pub p95_warning_ms: f64,
    pub p95_critical_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate_warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate_critical: Option<f64>,
}

pub const ALERT_THRESHOLDS: [AlertThreshold; 3] = [
    AlertThreshold {
        operation: ops::TIME_TRAVEL_TOTAL,
        p95_warning_ms: 45_000.0,
        p95_critical_ms: 90_000.0,
        error_rate_warning: Some(0.05),
        error_rate_critical: Some(0.10),
    },
    AlertThreshold {
        operation: ops::SNAPSHOT,
        p95_warning_ms: 25_000.0,
        p95_critical_ms: 45_000.0,
        error_rate_warning: None,
        error_rate_critical: None,
    },
    AlertThreshold {
        operation: ops::SNAPSHOTS_PARALLEL,
        p95_warning_ms: 30_000.0,
        p95_critical_ms: 60_000.0,
        error_rate_warning: None,
        error_rate_critical: None,
    },
];

/// Percentiles and spread over one operation's retained samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub operations: BTreeMap<String, LatencySummary>,
    pub uptime_seconds: u64,
    pub alert_thresholds: Vec<AlertThreshold>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub operation: String,
    /// "p95_latency" or "error_rate"
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub alerts: Vec<Alert>,
    pub alert_count: usize,
    pub has_critical: bool,
    pub has_warning: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyBreakdown {
    pub breakdown: BTreeMap<String, LatencySummary>,
    pub baseline_ms: f64,
    pub current_p95_ms: f64,
    pub improvement_percentage: f64,
    pub target_ms: f64,
    pub on_target: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    ms: u64,
    success: bool,
}

struct Inner {
    samples: BTreeMap<String, VecDeque<Sample>>,
    started: Instant,
}

pub struct LatencyMetrics {
    inner: Mutex<Inner>,
}

impl Default for LatencyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                samples: BTreeMap::new(),
                started: Instant::now(),
            }),
        }
    }

    pub fn record(&self, operation: &str, ms: u64, success: bool) {
        debug!(operation, duration_ms = ms, success, "latency sample");
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let samples = inner.samples.entry(operation.to_string()).or_default();
        samples.push_back(Sample { ms, success });
        while samples.len() > LATENCY_SAMPLE_LIMIT {
            samples.pop_front();
        }
    }

    pub fn summary(&self, operation: &str) -> Option<LatencySummary> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.samples.get(operation).and_then(summarize)
    }

    pub fn report(&self) -> LatencyReport {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        LatencyReport {
            operations: summaries(&inner.samples),
            uptime_seconds: inner.started.elapsed().as_secs(),
            alert_thresholds: ALERT_THRESHOLDS.to_vec(),
            timestamp: Utc::now(),
        }
    }

    pub fn alerts(&self) -> AlertReport {
        let mut alerts = Vec::new();
        for threshold in &ALERT_THRESHOLDS {
            let Some(summary) = self.summary(threshold.operation) else {
                continue;
            };
            alerts.extend(check_threshold(
                threshold.operation,
                "p95_latency",
                summary.p95,
                Some(threshold.p95_warning_ms),
                Some(threshold.p95_critical_ms),
            ));
            alerts.extend(check_threshold(
                threshold.operation,
                "error_rate",
                summary.error_rate,
                threshold.error_rate_warning,
                threshold.error_rate_critical,
            ));
        }

        AlertReport {
            alert_count: alerts.len(),
            has_critical: alerts.iter().any(|a| a.severity == AlertSeverity::Critical),
            has_warning: alerts.iter().any(|a| a.severity == AlertSeverity::Warning),
            alerts,
            timestamp: Utc::now(),
        }
    }

    /// Time-travel stage latencies against the sequential baseline
    pub fn breakdown(&self) -> LatencyBreakdown {
        let breakdown: BTreeMap<String, LatencySummary> = BREAKDOWN_OPERATIONS
            .iter()
            .filter_map(|op| self.summary(op).map(|s| (op.to_string(), s)))
            .collect();
        let current_p95_ms = breakdown
            .get(ops::TIME_TRAVEL_TOTAL)
            .map_or(BREAKDOWN_BASELINE_MS, |s| s.p95);
        let improvement = (1.0 - current_p95_ms / BREAKDOWN_BASELINE_MS) * 100.0;

        LatencyBreakdown {
            breakdown,
            baseline_ms: BREAKDOWN_BASELINE_MS,
            current_p95_ms,
            improvement_percentage: (improvement * 10.0).round() / 10.0,
            target_ms: BREAKDOWN_TARGET_MS,
            on_target: current_p95_ms <= BREAKDOWN_TARGET_MS,
            timestamp: Utc::now(),
        }
    }

    /// Drop every sample and restart the uptime clock
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.samples.clear();
        inner.started = Instant::now();
    }

    /// Prometheus text exposition, one summary per operation
    pub fn prometheus(&self) -> String {
        let operations = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            summaries(&inner.samples)
        };

        let mut out = String::new();
        for (operation, s) in operations {
            let name = format!("{}_duration_seconds", operation.replace(['.', '-'], "_"));
            let _ = writeln!(out, "# HELP {name} Latency for {operation}");
            let _ = writeln!(out, "# TYPE {name} summary");
            for (quantile, value) in [("0.5", s.p50), ("0.95", s.p95), ("0.99", s.p99)] {
                let _ = writeln!(out, "{name}{{quantile=\"{quantile}\"}} {:.6}", value / 1000.0);
            }
            let _ = writeln!(out, "{name}_count {}", s.count);
            let _ = writeln!(out, "{name}_sum {:.6}", s.avg * s.count as f64 / 1000.0);
            out.push('\n');
        }
        out
    }
}

fn summaries(samples: &BTreeMap<String, VecDeque<Sample>>) -> BTreeMap<String, LatencySummary> {
    samples
        .iter()
        .filter_map(|(op, s)| summarize(s).map(|summary| (op.clone(), summary)))
        .collect()
}

fn summarize(samples: &VecDeque<Sample>) -> Option<LatencySummary> {
    if samples.is_empty() {
        return None;
    }
    let mut durations: Vec<u64> = samples.iter().map(|s| s.ms).collect();
    durations.sort_unstable();
    let n = durations.len();
    let percentile = |p: usize| durations[(n * p / 100).min(n - 1)] as f64;
    let failures = samples.iter().filter(|s| !s.success).count();

    Some(LatencySummary {
        count: n,
        avg: durations.iter().sum::<u64>() as f64 / n as f64,
        min: durations[0] as f64,
        max: durations[n - 1] as f64,
        p50: percentile(50),
        p95: percentile(95),
        p99: percentile(99),
        error_rate: failures as f64 / n as f64,
    })
}

/// Critical wins over warning; values must exceed the threshold
fn check_threshold(
    operation: &str,
    metric: &'static str,
    value: f64,
    warning: Option<f64>,
    critical: Option<f64>,
) -> Option<Alert> {
    let (severity, threshold) = match (warning, critical) {
        (_, Some(critical)) if value > critical => (AlertSeverity::Critical, critical),
        (Some(warning), _) if value > warning => (AlertSeverity::Warning, warning),
        _ => return None,
    };
    let label = match severity {
        AlertSeverity::Critical => "CRITICAL",
        AlertSeverity::Warning => "WARNING",
    };
    let message = if metric == "error_rate" {
        format!(
            "{label}: {operation} error rate ({:.1}%) exceeds threshold ({:.1}%)",
            value * 100.0,
            threshold * 100.0
        )
    } else {
        format!("{label}: {operation} p95 latency ({value:.0}ms) exceeds threshold ({threshold:.0}ms)")
    };
    Some(Alert {
        severity,
        operation: operation.to_string(),
        metric,
        value,
        threshold,
        message,
    })
}
