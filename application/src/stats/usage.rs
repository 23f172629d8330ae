//! Gateway usage counters.
//!
//! Totals are plain atomics; per-model and per-error-kind breakdowns are
//! small maps behind a mutex that is held only for the upsert.

use ensemble_domain::{CallErrorKind, ModelCallResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Cost is accumulated in nano-dollars so it fits an atomic integer
const NANOS_PER_DOLLAR: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelUsage {
    pub calls: u64,
    pub failures: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Point-in-time copy of [`UsageStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub total_queries: u64,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub per_model: BTreeMap<String, ModelUsage>,
    pub errors: BTreeMap<String, u64>,
    pub uptime_seconds: u64,
}

pub struct UsageStats {
    started: Instant,
    queries: AtomicU64,
    calls: AtomicU64,
    failed_calls: AtomicU64,
    tokens: AtomicU64,
    cost_nanos: AtomicU64,
    per_model: Mutex<HashMap<String, ModelUsage>>,
    errors: Mutex<HashMap<CallErrorKind, u64>>,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            queries: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            tokens: AtomicU64::new(0),
            cost_nanos: AtomicU64::new(0),
            per_model: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
        }
    }

    /// Count one user-facing query
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one settled model call
    pub fn record_call(&self, result: &ModelCallResult) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let tokens = result.total_tokens();
        self.tokens.fetch_add(tokens, Ordering::Relaxed);

        let cost = if result.success { result.cost } else { 0.0 };
        self.cost_nanos
            .fetch_add((cost * NANOS_PER_DOLLAR).round() as u64, Ordering::Relaxed);

        if !result.success {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
            if let Some(kind) = result.error_kind {
                let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
                *errors.entry(kind).or_insert(0) += 1;
            }
        }

        let mut per_model = self.per_model.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = per_model.entry(result.model.to_string()).or_default();
        entry.calls += 1;
        entry.tokens += tokens;
        entry.cost += cost;
        if !result.success {
            entry.failures += 1;
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.cost_nanos.load(Ordering::Relaxed) as f64 / NANOS_PER_DOLLAR
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let per_model = self
            .per_model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let errors = self
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect();

        UsageSnapshot {
            total_queries: self.queries.load(Ordering::Relaxed),
            total_calls: self.calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            total_tokens: self.tokens.load(Ordering::Relaxed),
            total_cost: self.total_cost(),
            per_model,
            errors,
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_domain::{Model, TokenUsage};
    use std::time::Duration;

    #[test]
    fn test_records_success_and_failure() {
        let stats = UsageStats::new();
        let ok = ModelCallResult::success(
            Model::Gpt4o,
            "answer",
            TokenUsage::new(1000, 1000),
            Duration::from_millis(5),
        );
        let failed = ModelCallResult::failure(
            Model::Gpt4oMini,
            CallErrorKind::Timeout,
            "slow",
            Duration::from_millis(5),
        );
        stats.record_query();
        stats.record_call(&ok);
        stats.record_call(&failed);

        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 1);
        assert_eq!(snap.total_calls, 2);
        assert_eq!(snap.failed_calls, 1);
        assert_eq!(snap.total_tokens, 2000);
        assert!((snap.total_cost - ok.cost).abs() < 1e-9);
        assert_eq!(snap.errors.get("timeout"), Some(&1));
        assert_eq!(snap.per_model["gpt-4o"].calls, 1);
        assert_eq!(snap.per_model["gpt-4o-mini"].failures, 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = std::sync::Arc::new(UsageStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_query();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().total_queries, 800);
    }
}
