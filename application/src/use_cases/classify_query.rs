//! Classify Query use case
//!
//! One fast model call grades the question; the result is cached by the
//! normalized question text. The call never fails: any gateway or parse
//! error yields the fail-open "complex, all models" classification.

use crate::config::ClassifierParams;
use crate::ports::model_gateway::{CompletionRequest, ModelGateway};
use crate::resilience::GuardedGateway;
use chrono::Datelike;
use ensemble_domain::{
    Classification, Model, PromptTemplate, Question, detect_temporal, parse_classification,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Expired entries are swept at most this often, on insert
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

struct Entries {
    map: HashMap<String, (Classification, Instant)>,
    last_sweep: Instant,
}

/// TTL cache of classifications keyed by normalized question
///
/// Concurrent misses on one key are collapsed: the first caller fills the
/// entry while the others wait on a per-key lock and then read it.
pub struct ClassificationCache {
    ttl: Duration,
    entries: Mutex<Entries>,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClassificationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fresh entry for `key`, counted as a hit or a miss
    pub fn get(&self, key: &str) -> Option<Classification> {
        let fresh = self.lookup(key);
        self.count(fresh.is_some());
        fresh
    }

    fn lookup(&self, key: &str) -> Option<Classification> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.map.get(key) {
            Some((classification, stored)) if stored.elapsed() < self.ttl => {
                Some(classification.clone())
            }
            Some(_) => {
                entries.map.remove(key);
                None
            }
            None => None,
        }
    }

    fn count(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn insert(&self, key: String, classification: Classification) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.map.insert(key, (classification, Instant::now()));
        if entries.last_sweep.elapsed() >= SWEEP_INTERVAL.min(self.ttl) {
            let removed = Self::sweep(&mut entries, self.ttl);
            if removed > 0 {
                debug!("Swept {} expired classifications", removed);
            }
        }
    }

    /// Remove every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::sweep(&mut entries, self.ttl)
    }

    fn sweep(entries: &mut Entries, ttl: Duration) -> usize {
        let before = entries.map.len();
        entries.map.retain(|_, (_, stored)| stored.elapsed() < ttl);
        entries.last_sweep = Instant::now();
        before - entries.map.len()
    }

    /// Per-key lock held while one caller fills the entry
    fn flight(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(key.to_string()).or_default())
    }

    fn land(&self, key: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.map.len();
        entries.map.clear();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().unwrap_or_else(PoisonError::into_inner).map.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Classification plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOutput {
    pub classification: Classification,
    pub cached: bool,
    /// Cost of the classifier call; zero on cache hits
    pub cost: f64,
}

/// Use case for classifying a question
pub struct ClassifyQueryUseCase<G: ModelGateway + 'static> {
    gateway: Arc<GuardedGateway<G>>,
    model: Model,
    params: ClassifierParams,
    /// Recommended by the fail-open default
    all_models: Vec<Model>,
    cache: ClassificationCache,
}

impl<G: ModelGateway + 'static> ClassifyQueryUseCase<G> {
    pub fn new(
        gateway: Arc<GuardedGateway<G>>,
        model: Model,
        params: ClassifierParams,
        all_models: Vec<Model>,
    ) -> Self {
        let cache = ClassificationCache::new(params.cache_ttl);
        Self {
            gateway,
            model,
            params,
            all_models,
            cache,
        }
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    pub async fn execute(&self, question: &Question, cancel: &CancellationToken) -> ClassifyOutput {
        let key = question.normalized();
        if let Some(hit) = self.cached(&key) {
            return hit;
        }

        let flight = self.cache.flight(&key);
        let _filling = flight.lock().await;
        // Another caller may have filled the entry while this one waited
        if let Some(hit) = self.cached(&key) {
            return hit;
        }
        self.cache.count(false);

        let output = self.classify(question, &key, cancel).await;
        self.cache.land(&key);
        output
    }

    fn cached(&self, key: &str) -> Option<ClassifyOutput> {
        let classification = self.cache.lookup(key)?;
        self.cache.count(true);
        debug!("Classification cache hit");
        Some(ClassifyOutput {
            classification,
            cached: true,
            cost: 0.0,
        })
    }

    async fn classify(
        &self,
        question: &Question,
        key: &str,
        cancel: &CancellationToken,
    ) -> ClassifyOutput {
        let request = CompletionRequest::new(
            self.model.clone(),
            PromptTemplate::classification_prompt(question.content()),
        )
        .with_system(PromptTemplate::classification_system())
        .with_max_tokens(self.params.max_tokens)
        .with_temperature(self.params.temperature)
        .with_json_mode()
        .with_timeout(self.params.timeout);

        let call = self.gateway.call(&request, cancel).await;
        let cost = call.cost;
        let parsed = if call.success {
            parse_classification(&call.text).map_err(|e| e.to_string())
        } else {
            Err(call.error.unwrap_or_else(|| "classifier call failed".to_string()))
        };

        let signal = detect_temporal(question.content(), chrono::Utc::now().year());
        let classification = match parsed {
            Ok(classification) => {
                info!(
                    "Classified as {} (confidence {:.2})",
                    classification.complexity, classification.confidence
                );
                let merged = classification.merge_temporal(&signal);
                self.cache.insert(key.to_string(), merged.clone());
                merged
            }
            Err(reason) => {
                warn!("Classification failed, using full ensemble: {}", reason);
                Classification::fallback(reason, &self.all_models).merge_temporal(&signal)
            }
        };

        ClassifyOutput {
            classification,
            cached: false,
            cost,
        }
    }
}
