//! Stream Time Travel use case
//!
//! Runs the time-travel pipeline on a background task and turns each stage
//! result into a [`StreamEvent`] the moment it exists. The producer never
//! waits on the consumer: events go into a bounded queue that sheds only
//! heartbeats when full.

use super::run_time_travel::{RunTimeTravelUseCase, TimeTravelInput};
use crate::ports::model_gateway::ModelGateway;
use crate::ports::progress::TimeTravelProgress;
use chrono::Utc;
use ensemble_domain::{
    CompleteSummary, Complexity, Model, Narrative, Snapshot, StreamEvent, StreamFrame,
    TemporalSensitivity, TimePoint, TimeTravelResult, TimeTravelStage, TimingReport,
    TransitionChanges,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

/// Bounded single-consumer event queue
pub struct EventQueue {
    events: Mutex<VecDeque<StreamEvent>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicUsize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Enqueue `event`; returns false when it was shed
    ///
    /// Only droppable events are shed, and only once the queue holds
    /// `capacity` pending events. Result-bearing events are always kept.
    pub fn push(&self, event: StreamEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            if event.is_droppable() && events.len() >= self.capacity {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Event queue full, dropping {}", event.kind());
                return false;
            }
            events.push_back(event);
        }
        self.notify.notify_one();
        true
    }

    /// No more events will be pushed
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Next pending event; `None` once the queue is closed and drained
    pub async fn pop(&self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
            {
                return Some(event);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

/// Consumer half of a streaming time-travel run
///
/// Dropping it cancels the run: in-flight model calls are abandoned and no
/// further events are produced.
pub struct TimeTravelStream {
    queue: Arc<EventQueue>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl TimeTravelStream {
    /// Next event, or `None` when the stream finished or was cancelled
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.queue.pop() => event,
        }
    }

    /// Like [`next`](Self::next), stamped with the wall-clock time
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        let event = self.next().await?;
        Some(StreamFrame::new(event, Utc::now().timestamp_millis()))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Progress adapter that turns pipeline callbacks into stream events
struct QueueProgress {
    queue: Arc<EventQueue>,
    cancel: CancellationToken,
    stage: Mutex<TimeTravelStage>,
}

impl QueueProgress {
    fn emit(&self, event: StreamEvent) {
        if !self.cancel.is_cancelled() {
            self.queue.push(event);
        }
    }

    fn enter(&self, stage: TimeTravelStage) {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    fn stage(&self) -> TimeTravelStage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimeTravelProgress for QueueProgress {
    fn on_classified(
        &self,
        sensitivity: &TemporalSensitivity,
        complexity: Complexity,
        model: &Model,
        time_points: &[TimePoint],
    ) {
        if !time_points.is_empty() {
            self.enter(TimeTravelStage::GeneratingSnapshots);
        }
        self.emit(StreamEvent::Classification {
            sensitivity: sensitivity.level,
            sensitivity_reason: sensitivity.reason.clone(),
            complexity,
            model: model.clone(),
            num_snapshots: time_points.len(),
            time_points: time_points.iter().map(|tp| tp.label.clone()).collect(),
        });
    }

    fn on_snapshot(&self, snapshot: &Snapshot, completed: usize, total: usize) {
        self.emit(StreamEvent::Snapshot {
            index: completed,
            total,
            remaining: total.saturating_sub(completed),
            snapshot: Box::new(snapshot.clone()),
        });
    }

    fn on_snapshot_lost(&self, label: &str, reason: &str) {
        self.emit(StreamEvent::Error {
            message: format!("snapshot {label} failed: {reason}"),
            stage: Some(TimeTravelStage::GeneratingSnapshots.as_str().to_string()),
            recoverable: true,
        });
    }

    fn on_key_changes(&self, snapshots: &[Snapshot]) {
        self.enter(TimeTravelStage::ExtractingChanges);
        self.emit(StreamEvent::KeyChanges {
            transitions: transitions(snapshots),
        });
    }

    fn on_narrative_start(&self) {
        self.enter(TimeTravelStage::Narrating);
        self.emit(StreamEvent::heartbeat("generating evolution narrative"));
    }

    fn on_narrative(&self, narrative: &Narrative, success: bool) {
        self.emit(StreamEvent::Narrative {
            narrative: narrative.narrative.clone(),
            velocity: narrative.velocity,
            outlook: narrative.outlook.clone(),
            success,
        });
        let total = narrative.insights.len();
        for (i, insight) in narrative.insights.iter().enumerate() {
            self.emit(StreamEvent::Insight {
                index: i + 1,
                total,
                insight: insight.clone(),
            });
        }
    }
}

/// Consecutive successful snapshots with the changes attached to the later one
fn transitions(snapshots: &[Snapshot]) -> Vec<TransitionChanges> {
    let successful: Vec<&Snapshot> = snapshots.iter().filter(|s| s.is_success()).collect();
    successful
        .windows(2)
        .map(|pair| TransitionChanges {
            from: pair[0].time_point.label.clone(),
            to: pair[1].time_point.label.clone(),
            changes: pair[1].key_changes.clone(),
        })
        .collect()
}

/// Parallel vs. sequential timing for a finished run
pub fn timing_report(result: &TimeTravelResult) -> TimingReport {
    let t = &result.timings;
    let snapshot_latency: u64 = result.snapshots.iter().map(|s| s.result.latency_ms).sum();
    let sequential_estimate_ms = snapshot_latency + t.key_changes_ms + t.narrative_ms;
    let (bottleneck, bottleneck_ms) = [
        ("classification", t.classification_ms),
        ("snapshots", t.snapshots_parallel_ms),
        ("key_changes", t.key_changes_ms),
        ("narrative", t.narrative_ms),
    ]
    .into_iter()
    .max_by_key(|(_, ms)| *ms)
    .unwrap_or(("snapshots", 0));

    TimingReport {
        total_ms: t.total_ms,
        snapshots_parallel_ms: t.snapshots_parallel_ms,
        key_changes_ms: t.key_changes_ms,
        narrative_ms: t.narrative_ms,
        sequential_estimate_ms,
        time_saved_ms: sequential_estimate_ms.saturating_sub(t.total_ms),
        bottleneck: bottleneck.to_string(),
        bottleneck_ms,
    }
}

pub fn complete_summary(result: TimeTravelResult) -> CompleteSummary {
    CompleteSummary {
        is_eligible: result.is_eligible,
        skip_reason: result.skip_reason,
        total_snapshots: result.snapshots.len(),
        total_cost: result.total_cost,
        total_tokens: result.total_tokens,
        total_ms: result.timings.total_ms,
        snapshots: result.snapshots,
        narrative: result.evolution_narrative,
        insights: result.insights,
        velocity: result.change_velocity,
        outlook: result.future_outlook,
    }
}

/// Use case for streaming a time-travel run
pub struct StreamTimeTravelUseCase<G: ModelGateway + 'static> {
    pipeline: Arc<RunTimeTravelUseCase<G>>,
}

impl<G: ModelGateway + 'static> StreamTimeTravelUseCase<G> {
    pub fn new(pipeline: Arc<RunTimeTravelUseCase<G>>) -> Self {
        Self { pipeline }
    }

    /// Spawn the pipeline and return the consumer half
    pub fn start(&self, input: TimeTravelInput) -> TimeTravelStream {
        let params = self.pipeline.params();
        let queue = Arc::new(EventQueue::new(params.stream_buffer));
        let cancel = CancellationToken::new();

        tokio::spawn(produce(
            Arc::clone(&self.pipeline),
            input,
            Arc::clone(&queue),
            cancel.clone(),
            params.heartbeat_interval,
        ));

        TimeTravelStream {
            queue,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }
}

async fn produce<G: ModelGateway + 'static>(
    pipeline: Arc<RunTimeTravelUseCase<G>>,
    input: TimeTravelInput,
    queue: Arc<EventQueue>,
    cancel: CancellationToken,
    heartbeat_interval: Duration,
) {
    let progress = QueueProgress {
        queue: Arc::clone(&queue),
        cancel: cancel.clone(),
        stage: Mutex::new(TimeTravelStage::Classifying),
    };
    progress.emit(StreamEvent::Start {
        question: input.question.content().to_string(),
        message: "starting time travel analysis".to_string(),
    });

    let ticker_stop = cancel.child_token();
    let ticker = tokio::spawn(heartbeats(
        Arc::clone(&queue),
        ticker_stop.clone(),
        heartbeat_interval,
    ));

    let result = pipeline
        .execute_with_progress(&input, &progress, &cancel)
        .await;
    ticker_stop.cancel();
    let _ = ticker.await;

    if cancel.is_cancelled() {
        info!("Time travel stream cancelled by client");
        queue.close();
        return;
    }

    if result.final_stage == TimeTravelStage::Error {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "time travel failed".to_string());
        progress.emit(StreamEvent::fatal(message, Some(progress.stage().as_str())));
    } else {
        if !result.snapshots.is_empty() {
            progress.emit(StreamEvent::Timing(timing_report(&result)));
        }
        progress.emit(StreamEvent::Complete(Box::new(complete_summary(result))));
    }
    queue.close();
}

async fn heartbeats(queue: Arc<EventQueue>, stop: CancellationToken, interval: Duration) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                queue.push(StreamEvent::heartbeat("still working"));
            }
        }
    }
}
