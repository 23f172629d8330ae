//! Process-wide counters owned by the [`EnsembleService`](crate::EnsembleService).

pub mod latency;
pub mod routing;
pub mod usage;

pub use latency::{
    Alert, AlertReport, AlertSeverity, LatencyBreakdown, LatencyMetrics, LatencyReport, LatencySummary,
};
pub use routing::{QueryRecord, RoutingStats, RoutingStatsSnapshot, QUERY_HISTORY_LIMIT};
pub use usage::{ModelUsage, UsageSnapshot, UsageStats};
