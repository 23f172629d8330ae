//! Routing statistics and the bounded recent-query history.

use chrono::{DateTime, Utc};
use ensemble_domain::{Complexity, core::string::truncate_chars};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Most recent queries kept in the history
pub const QUERY_HISTORY_LIMIT: usize = 100;

const QUESTION_PREVIEW_CHARS: usize = 100;

/// One executed query, as seen by the router statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    /// Absent when the caller bypassed the classifier
    pub complexity: Option<Complexity>,
    pub models: Vec<String>,
    pub used_synthesis: bool,
    pub actual_cost: f64,
    pub baseline_cost: f64,
    pub savings: f64,
    pub savings_percent: f64,
    pub fallback_used: bool,
}

impl QueryRecord {
    pub fn new(
        question: &str,
        complexity: Option<Complexity>,
        models: Vec<String>,
        used_synthesis: bool,
        actual_cost: f64,
        baseline_cost: f64,
    ) -> Self {
        let savings = (baseline_cost - actual_cost).max(0.0);
        let savings_percent = if baseline_cost > 0.0 {
            savings / baseline_cost * 100.0
        } else {
            0.0
        };
        Self {
            timestamp: Utc::now(),
            question: truncate_chars(question, QUESTION_PREVIEW_CHARS),
            complexity,
            models,
            used_synthesis,
            actual_cost,
            baseline_cost,
            savings,
            savings_percent,
            fallback_used: false,
        }
    }

    pub fn with_fallback(mut self, fallback_used: bool) -> Self {
        self.fallback_used = fallback_used;
        self
    }
}

/// Point-in-time copy of [`RoutingStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingStatsSnapshot {
    pub total_queries: u64,
    pub by_complexity: BTreeMap<String, u64>,
    pub total_actual_cost: f64,
    pub total_savings: f64,
    pub average_savings_percent: f64,
    pub model_usage: BTreeMap<String, u64>,
    pub fallback_count: u64,
    /// Newest first
    pub recent_queries: Vec<QueryRecord>,
}

#[derive(Default)]
struct Inner {
    total_queries: u64,
    by_complexity: BTreeMap<String, u64>,
    total_actual_cost: f64,
    total_savings: f64,
    savings_percent_sum: f64,
    model_usage: BTreeMap<String, u64>,
    fallback_count: u64,
    history: VecDeque<QueryRecord>,
}

/// Running router counters; one upsert per executed query
#[derive(Default)]
pub struct RoutingStats {
    inner: Mutex<Inner>,
}

impl RoutingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: QueryRecord) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total_queries += 1;
        if let Some(complexity) = record.complexity {
            *inner
                .by_complexity
                .entry(complexity.as_str().to_string())
                .or_insert(0) += 1;
        }
        inner.total_actual_cost += record.actual_cost;
        inner.total_savings += record.savings;
        inner.savings_percent_sum += record.savings_percent;
        for model in &record.models {
            *inner.model_usage.entry(model.clone()).or_insert(0) += 1;
        }
        if record.fallback_used {
            inner.fallback_count += 1;
        }

        inner.history.push_back(record);
        while inner.history.len() > QUERY_HISTORY_LIMIT {
            inner.history.pop_front();
        }
    }

    pub fn snapshot(&self) -> RoutingStatsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let average_savings_percent = if inner.total_queries > 0 {
            inner.savings_percent_sum / inner.total_queries as f64
        } else {
            0.0
        };
        RoutingStatsSnapshot {
            total_queries: inner.total_queries,
            by_complexity: inner.by_complexity.clone(),
            total_actual_cost: inner.total_actual_cost,
            total_savings: inner.total_savings,
            average_savings_percent,
            model_usage: inner.model_usage.clone(),
            fallback_count: inner.fallback_count,
            recent_queries: inner.history.iter().rev().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_computes_savings() {
        let record = QueryRecord::new("q", Some(Complexity::Simple), vec![], false, 0.01, 0.04);
        assert!((record.savings - 0.03).abs() < 1e-12);
        assert!((record.savings_percent - 75.0).abs() < 1e-9);

        let overspent = QueryRecord::new("q", None, vec![], true, 0.05, 0.04);
        assert_eq!(overspent.savings, 0.0);
    }

    #[test]
    fn test_aggregates() {
        let stats = RoutingStats::new();
        stats.record(QueryRecord::new(
            "first",
            Some(Complexity::Simple),
            vec!["gpt-4o-mini".into()],
            false,
            0.001,
            0.01,
        ));
        stats.record(
            QueryRecord::new(
                "second",
                Some(Complexity::Complex),
                vec!["gpt-4o".into(), "gpt-4o-mini".into()],
                true,
                0.01,
                0.01,
            )
            .with_fallback(true),
        );

        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 2);
        assert_eq!(snap.by_complexity["simple"], 1);
        assert_eq!(snap.by_complexity["complex"], 1);
        assert_eq!(snap.model_usage["gpt-4o-mini"], 2);
        assert_eq!(snap.fallback_count, 1);
        assert!((snap.average_savings_percent - 45.0).abs() < 1e-9);
        assert_eq!(snap.recent_queries[0].question, "second");
    }

    #[test]
    fn test_history_is_bounded() {
        let stats = RoutingStats::new();
        for i in 0..(QUERY_HISTORY_LIMIT + 20) {
            stats.record(QueryRecord::new(&format!("q{i}"), None, vec![], false, 0.0, 0.0));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, (QUERY_HISTORY_LIMIT + 20) as u64);
        assert_eq!(snap.recent_queries.len(), QUERY_HISTORY_LIMIT);
        assert_eq!(snap.recent_queries[0].question, format!("q{}", QUERY_HISTORY_LIMIT + 19));
        assert_eq!(
            snap.recent_queries.last().map(|r| r.question.as_str()),
            Some("q20")
        );
    }
}
