//! Run Time Travel use case
//!
//! Answers a question "as of" several historical dates and explains how the
//! answer evolved.
//!
//! ```text
//! Idle -> Classifying -> GeneratingSnapshots -> ExtractingChanges -> Narrating -> Complete
//!              |                  |
//!              +--> Complete      +--> Complete   (not eligible / no evolution)
//! any non-terminal stage --> Error
//! ```
//!
//! Snapshot calls run concurrently; key changes for every consecutive pair
//! come from one batched call. A failed snapshot stays in the result but is
//! left out of the comparison and the narrative.

use super::shared::fan_out;
use crate::config::TimeTravelParams;
use crate::ports::model_gateway::{CompletionRequest, ModelGateway};
use crate::ports::progress::{NoProgress, TimeTravelProgress};
use crate::ports::query_logger::{QueryEvent, QueryLogger};
use crate::resilience::GuardedGateway;
use crate::stats::latency::ops;
use crate::stats::{LatencyMetrics, UsageStats};
use chrono::NaiveDate;
use ensemble_domain::time_travel::entities::sort_chronologically;
use ensemble_domain::time_travel::parsing::{
    answers_identical, attach_key_changes, parse_key_changes, parse_narrative,
};
use ensemble_domain::time_travel::sensitivity::{snapshot_complexity, snapshot_plan};
use ensemble_domain::{
    CallErrorKind, ChangeVelocity, Model, Narrative, PromptTemplate, Question, Snapshot,
    TimeTravelResult, TimeTravelStage, classify_sensitivity, duration_ms, identify_time_points,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NO_EVOLUTION_REASON: &str = "no temporal evolution detected";

const KEY_CHANGES_TEMPERATURE: f32 = 0.3;
const NARRATIVE_TEMPERATURE: f32 = 0.5;

/// Input for the RunTimeTravel use case
#[derive(Debug, Clone)]
pub struct TimeTravelInput {
    pub question: Question,
    /// Run even when the question is not time-sensitive
    pub force: bool,
    /// The last time point; snapshots are only taken before it
    pub today: NaiveDate,
}

impl TimeTravelInput {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            force: false,
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Tracks the current stage and rejects illegal transitions
struct StageTracker {
    stage: TimeTravelStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: TimeTravelStage::Idle,
        }
    }

    fn advance(&mut self, next: TimeTravelStage) {
        if self.stage.can_transition_to(next) {
            debug!("Time travel stage {} -> {}", self.stage, next);
            self.stage = next;
        } else {
            warn!("Ignoring illegal stage transition {} -> {}", self.stage, next);
        }
    }
}

/// Use case for generating a time-travel comparison
pub struct RunTimeTravelUseCase<G: ModelGateway + 'static> {
    gateway: Arc<GuardedGateway<G>>,
    params: TimeTravelParams,
    /// Key-change extraction
    fast_model: Model,
    narrative_model: Model,
    usage: Arc<UsageStats>,
    logger: Arc<dyn QueryLogger>,
    latency: Arc<LatencyMetrics>,
}

impl<G: ModelGateway + 'static> RunTimeTravelUseCase<G> {
    pub fn new(
        gateway: Arc<GuardedGateway<G>>,
        params: TimeTravelParams,
        fast_model: Model,
        narrative_model: Model,
        usage: Arc<UsageStats>,
        logger: Arc<dyn QueryLogger>,
    ) -> Self {
        Self {
            gateway,
            params,
            fast_model,
            narrative_model,
            usage,
            logger,
            latency: Arc::new(LatencyMetrics::new()),
        }
    }

    pub fn with_latency(mut self, latency: Arc<LatencyMetrics>) -> Self {
        self.latency = latency;
        self
    }

    pub fn params(&self) -> &TimeTravelParams {
        &self.params
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, input: &TimeTravelInput, cancel: &CancellationToken) -> TimeTravelResult {
        self.execute_with_progress(input, &NoProgress, cancel).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: &TimeTravelInput,
        progress: &dyn TimeTravelProgress,
        cancel: &CancellationToken,
    ) -> TimeTravelResult {
        self.usage.record_query();
        let start = Instant::now();
        let deadline = start + self.params.request_timeout;
        let mut stages = StageTracker::new();
        let question = input.question.content();

        // Classifying
        stages.advance(TimeTravelStage::Classifying);
        let sensitivity = classify_sensitivity(question);
        let complexity = snapshot_complexity(question);
        let (model, max_tokens) = snapshot_plan(complexity);
        let mut result =
            TimeTravelResult::new(question, sensitivity.level, sensitivity.reason.clone());
        result.complexity = complexity;
        result.snapshot_model = model.clone();

        if !input.force && !sensitivity.level.is_eligible() {
            info!("Question not time-sensitive ({}), skipping", sensitivity.level);
            progress.on_classified(&sensitivity, complexity, &model, &[]);
            result = result.skipped(format!(
                "{} temporal sensitivity: {}",
                sensitivity.level, sensitivity.reason
            ));
            result.timings.classification_ms = duration_ms(start.elapsed());
            stages.advance(TimeTravelStage::Complete);
            return self.finish(result, stages, start);
        }

        let time_points = identify_time_points(question, input.today, self.params.max_snapshots);
        result.timings.classification_ms = duration_ms(start.elapsed());
        progress.on_classified(&sensitivity, complexity, &model, &time_points);

        // GeneratingSnapshots
        stages.advance(TimeTravelStage::GeneratingSnapshots);
        info!(
            "Generating {} snapshots with {}",
            time_points.len(),
            model
        );
        let requests: Vec<CompletionRequest> = time_points
            .iter()
            .map(|tp| {
                let date = tp.prompt_date();
                CompletionRequest::new(model.clone(), PromptTemplate::snapshot_prompt(question, &date))
                    .with_system(PromptTemplate::snapshot_system(&date))
                    .with_max_tokens(max_tokens)
                    .with_temperature(self.params.snapshot_temperature)
                    .with_timeout(self.params.snapshot_timeout)
            })
            .collect();

        let snapshots_start = Instant::now();
        let total = requests.len();
        let mut completed = 0;
        let calls = fan_out(&self.gateway, &requests, cancel, |index, call| {
            completed += 1;
            let snapshot = Snapshot::new(time_points[index].clone(), call.clone());
            progress.on_snapshot(&snapshot, completed, total);
        })
        .await;
        result.timings.snapshots_parallel_ms = duration_ms(snapshots_start.elapsed());
        for call in &calls {
            self.latency.record(ops::SNAPSHOT, call.latency_ms, call.success);
        }
        self.latency.record(
            ops::SNAPSHOTS_PARALLEL,
            result.timings.snapshots_parallel_ms,
            calls.iter().any(|c| c.success),
        );

        let mut snapshots: Vec<Snapshot> = calls
            .into_iter()
            .zip(time_points)
            .map(|(call, tp)| {
                if call.error_kind == Some(CallErrorKind::Internal) {
                    progress.on_snapshot_lost(&tp.label, call.error.as_deref().unwrap_or_default());
                }
                Snapshot::new(tp, call)
            })
            .collect();
        sort_chronologically(&mut snapshots);
        for snapshot in &snapshots {
            result.record_call(&snapshot.result);
        }
        result.snapshots = snapshots;

        let successful = result.successful_snapshots().count();
        if let Some(reason) = self.interrupted(cancel, deadline) {
            return self.fail(result, stages, start, reason);
        }
        if successful == 0 {
            return self.fail(result, stages, start, "all snapshot calls failed".to_string());
        }
        if answers_identical(&result.snapshots) {
            info!("First and last snapshots are near-identical, stopping");
            result = result.skipped(NO_EVOLUTION_REASON);
            stages.advance(TimeTravelStage::Complete);
            return self.finish(result, stages, start);
        }

        // ExtractingChanges
        stages.advance(TimeTravelStage::ExtractingChanges);
        let changes_start = Instant::now();
        let compared: Vec<(String, String)> = result
            .successful_snapshots()
            .map(|s| (s.time_point.label.clone(), s.result.text.clone()))
            .collect();
        if compared.len() >= 2 {
            let request = CompletionRequest::new(
                self.fast_model.clone(),
                PromptTemplate::key_changes_prompt(&compared),
            )
            .with_system(PromptTemplate::key_changes_system())
            .with_max_tokens(self.params.key_changes_max_tokens)
            .with_temperature(KEY_CHANGES_TEMPERATURE);
            let call = self.gateway.call(&request, cancel).await;
            result.record_call(&call);
            self.latency
                .record(ops::KEY_CHANGES, duration_ms(changes_start.elapsed()), call.success);
            if call.success {
                let transitions = parse_key_changes(&call.text, compared.len() - 1);
                attach_key_changes(&mut result.snapshots, transitions);
            } else {
                warn!(
                    "Key change extraction failed, continuing without: {}",
                    call.error.as_deref().unwrap_or_default()
                );
            }
        }
        result.timings.key_changes_ms = duration_ms(changes_start.elapsed());
        progress.on_key_changes(&result.snapshots);

        if let Some(reason) = self.interrupted(cancel, deadline) {
            return self.fail(result, stages, start, reason);
        }

        // Narrating
        stages.advance(TimeTravelStage::Narrating);
        progress.on_narrative_start();
        let narrative_start = Instant::now();
        let timeline: Vec<(String, String, Vec<String>)> = result
            .successful_snapshots()
            .map(|s| {
                (
                    s.time_point.label.clone(),
                    s.result.text.clone(),
                    s.key_changes.clone(),
                )
            })
            .collect();
        let request = CompletionRequest::new(
            self.narrative_model.clone(),
            PromptTemplate::narrative_prompt(question, &timeline),
        )
        .with_system(PromptTemplate::narrative_system())
        .with_max_tokens(self.params.narrative_max_tokens)
        .with_temperature(NARRATIVE_TEMPERATURE);
        let call = self.gateway.call(&request, cancel).await;
        result.record_call(&call);
        if call.success {
            let narrative = parse_narrative(&call.text);
            progress.on_narrative(&narrative, true);
            result.apply_narrative(narrative);
        } else {
            let message = format!(
                "narrative generation failed: {}",
                call.error.as_deref().unwrap_or_default()
            );
            warn!("{}", message);
            let empty = Narrative {
                velocity: ChangeVelocity::Unknown,
                ..Narrative::default()
            };
            progress.on_narrative(&empty, false);
            result.error = Some(message);
        }
        result.timings.narrative_ms = duration_ms(narrative_start.elapsed());
        self.latency
            .record(ops::NARRATIVE, result.timings.narrative_ms, result.error.is_none());

        stages.advance(TimeTravelStage::Complete);
        self.finish(result, stages, start)
    }

    fn interrupted(&self, cancel: &CancellationToken, deadline: Instant) -> Option<String> {
        if cancel.is_cancelled() {
            Some("request cancelled".to_string())
        } else if Instant::now() >= deadline {
            Some(format!(
                "request deadline of {}s exceeded",
                self.params.request_timeout.as_secs()
            ))
        } else {
            None
        }
    }

    fn fail(
        &self,
        mut result: TimeTravelResult,
        mut stages: StageTracker,
        start: Instant,
        reason: String,
    ) -> TimeTravelResult {
        warn!("Time travel failed during {}: {}", stages.stage, reason);
        result.error = Some(reason);
        stages.advance(TimeTravelStage::Error);
        self.finish(result, stages, start)
    }

    fn finish(&self, mut result: TimeTravelResult, stages: StageTracker, start: Instant) -> TimeTravelResult {
        result.final_stage = stages.stage;
        result.timings.total_ms = duration_ms(start.elapsed());
        // Skipped questions never reach the snapshot stage and would flatten the percentiles
        if !result.snapshots.is_empty() {
            self.latency
                .record(ops::TIME_TRAVEL_TOTAL, result.timings.total_ms, result.error.is_none());
        }
        self.logger.log(QueryEvent::new(
            "time_travel_completed",
            json!({
                "question": result.question,
                "sensitivity": result.sensitivity,
                "is_eligible": result.is_eligible,
                "skip_reason": result.skip_reason,
                "snapshots": result.snapshots.len(),
                "successful_snapshots": result.successful_snapshots().count(),
                "final_stage": result.final_stage,
                "error": result.error,
                "total_cost": result.total_cost,
                "total_ms": result.timings.total_ms,
            }),
        ));
        info!(
            "Time travel finished at stage {} in {}ms",
            result.final_stage, result.timings.total_ms
        );
        result
    }
}
