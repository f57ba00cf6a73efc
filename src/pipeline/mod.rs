//! Submission pipeline: optimize, then analyze, then account
//!
//! Drives one submission end to end against the two collaborators and holds
//! the only process-scoped state: the session ledger, the ad trigger, and
//! the latest submission's results. Everything else in the crate is pure.
//!
//! The two collaborator calls are sequential awaits; the analyze call never
//! starts unless the optimize call succeeded.

use crate::align::{align, AlignMode, AlignmentSpan};
use crate::api::{
    AnalysisResult, AnalyzeRequest, AnalyzeService, ApiError, OptimizationResult, OptimizeService,
};
use crate::ledger::SessionLedger;
use crate::trigger::{AdTrigger, DEFAULT_AD_THRESHOLD};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A submission is already in flight. The policy is to reject the new
    /// one rather than cancel the old: resubmit once the current run
    /// reaches a terminal state.
    #[error("a submission is already in flight")]
    Busy,

    /// The run was cancelled by an explicit [`cancel`] call.
    ///
    /// [`cancel`]: OptimizationPipeline::cancel
    #[error("submission cancelled")]
    Cancelled,

    /// The optimize collaborator failed; no answer is available.
    #[error("optimize call failed: {0}")]
    Optimize(#[source] ApiError),

    /// The analyze collaborator failed. The fetched answers remain
    /// available through the pipeline even though no savings were
    /// recorded.
    #[error("analyze call failed: {0}")]
    Analyze(#[source] ApiError),
}

/// Which call a failed run died in, for the presentation layer to
/// distinguish "no answer" from "answer but no score".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Optimize,
    Analyze,
    Cancelled,
}

/// Observable lifecycle of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Optimizing,
    Analyzing,
    Completed,
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed(_))
    }
}

/// Everything a completed submission hands to the presentation layer.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub optimization: OptimizationResult,
    pub analysis: AnalysisResult,
    /// Ledger snapshot taken right after this submission was recorded.
    pub ledger: SessionLedger,
    /// Whether this submission tripped the one-shot ad trigger.
    pub ad_fired: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Submissions before the ad trigger fires.
    pub ad_threshold: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ad_threshold: DEFAULT_AD_THRESHOLD,
        }
    }
}

/// Orchestrates submissions against the optimize and analyze collaborators.
pub struct OptimizationPipeline<C> {
    collaborator: C,
    state_tx: watch::Sender<PipelineState>,
    in_flight: AtomicBool,
    /// Submissions whose optimize call succeeded; feeds the ad trigger.
    submissions: AtomicU64,
    ledger: Mutex<SessionLedger>,
    trigger: Mutex<AdTrigger>,
    latest_prompt: RwLock<Option<String>>,
    latest_optimization: RwLock<Option<OptimizationResult>>,
    latest_analysis: RwLock<Option<AnalysisResult>>,
    cancel: Notify,
}

/// Clears the in-flight flag on every exit path out of `submit`.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C> OptimizationPipeline<C>
where
    C: OptimizeService + AnalyzeService,
{
    pub fn new(collaborator: C, config: PipelineConfig) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);

        Self {
            collaborator,
            state_tx,
            in_flight: AtomicBool::new(false),
            submissions: AtomicU64::new(0),
            ledger: Mutex::new(SessionLedger::new()),
            trigger: Mutex::new(AdTrigger::new(config.ad_threshold)),
            latest_prompt: RwLock::new(None),
            latest_optimization: RwLock::new(None),
            latest_analysis: RwLock::new(None),
            cancel: Notify::new(),
        }
    }

    /// Run one submission to a terminal state.
    ///
    /// Returns [`PipelineError::Busy`] synchronously when a run is already
    /// in flight. On an analyze failure the optimize answers stay
    /// retrievable via [`latest_optimization`], a documented
    /// partial-success surface.
    ///
    /// [`latest_optimization`]: OptimizationPipeline::latest_optimization
    pub async fn submit(&self, prompt: &str) -> Result<SubmissionReport, PipelineError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }
        let _guard = FlightGuard(&self.in_flight);

        if let Ok(mut slot) = self.latest_prompt.write() {
            *slot = Some(prompt.to_string());
        }
        self.set_state(PipelineState::Optimizing);

        let optimization = tokio::select! {
            result = self.collaborator.optimize(prompt) => result,
            _ = self.cancel.notified() => {
                info!("submission cancelled during optimize");
                self.set_state(PipelineState::Failed(FailureKind::Cancelled));
                return Err(PipelineError::Cancelled);
            }
        };

        let optimization = match optimization {
            Ok(result) => result,
            Err(err) => {
                warn!("optimize collaborator failed: {err}");
                self.set_state(PipelineState::Failed(FailureKind::Optimize));
                return Err(PipelineError::Optimize(err));
            }
        };

        // Successful exit from Optimizing: the ad counter moves exactly
        // once per submission, before the analyze outcome is known.
        let count = self.submissions.fetch_add(1, Ordering::AcqRel) + 1;
        let ad_fired = self
            .trigger
            .lock()
            .map(|mut trigger| trigger.advance(count))
            .unwrap_or(false);
        if ad_fired {
            info!(count, "ad trigger fired");
        }

        if let Ok(mut slot) = self.latest_optimization.write() {
            *slot = Some(optimization.clone());
        }
        if let Ok(mut slot) = self.latest_analysis.write() {
            *slot = None;
        }

        self.set_state(PipelineState::Analyzing);

        let request = AnalyzeRequest::from_submission(prompt, &optimization);
        let analysis = tokio::select! {
            result = self.collaborator.analyze(&request) => result,
            _ = self.cancel.notified() => {
                info!("submission cancelled during analyze");
                self.set_state(PipelineState::Failed(FailureKind::Cancelled));
                return Err(PipelineError::Cancelled);
            }
        };

        let mut analysis = match analysis {
            Ok(result) => result,
            Err(err) => {
                warn!("analyze collaborator failed: {err}");
                self.set_state(PipelineState::Failed(FailureKind::Analyze));
                return Err(PipelineError::Analyze(err));
            }
        };

        if analysis.sanitize() {
            warn!("analyze collaborator returned out-of-range data, clamped");
        }

        let ledger = self
            .ledger
            .lock()
            .map(|mut ledger| {
                ledger.record(&analysis);
                ledger.clone()
            })
            .unwrap_or_default();

        if let Ok(mut slot) = self.latest_analysis.write() {
            *slot = Some(analysis.clone());
        }

        self.set_state(PipelineState::Completed);
        info!(tokens_saved = analysis.tokens_saved(), "submission completed");

        Ok(SubmissionReport {
            optimization,
            analysis,
            ledger,
            ad_fired,
        })
    }

    /// Cancel the in-flight run, if any.
    ///
    /// The run transitions to `Failed(Cancelled)` and records nothing in
    /// the ledger. No-op when nothing is in flight.
    pub fn cancel(&self) {
        if self.in_flight.load(Ordering::Acquire) {
            // notify_waiters wakes only a currently-awaiting submit; it
            // stores no permit that could cancel a future run.
            self.cancel.notify_waiters();
        }
    }

    /// Reset ledger, trigger, counters and cached results for a new
    /// session. Rejected while a run is in flight.
    pub fn start_session(&self) -> Result<(), PipelineError> {
        if self.in_flight.load(Ordering::Acquire) {
            return Err(PipelineError::Busy);
        }

        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.reset();
        }
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.reset();
        }
        self.submissions.store(0, Ordering::Release);
        if let Ok(mut slot) = self.latest_prompt.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.latest_optimization.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.latest_analysis.write() {
            *slot = None;
        }
        self.set_state(PipelineState::Idle);
        info!("session reset");

        Ok(())
    }

    /// Current state snapshot.
    pub fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state transitions of current and future runs.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Ledger snapshot.
    pub fn ledger(&self) -> SessionLedger {
        self.ledger
            .lock()
            .map(|ledger| ledger.clone())
            .unwrap_or_default()
    }

    /// Latest optimize outcome, retained across an analyze failure.
    pub fn latest_optimization(&self) -> Option<OptimizationResult> {
        self.latest_optimization
            .read()
            .ok()
            .and_then(|slot| slot.clone())
    }

    /// Latest completed analysis, if the last run got that far.
    pub fn latest_analysis(&self) -> Option<AnalysisResult> {
        self.latest_analysis
            .read()
            .ok()
            .and_then(|slot| slot.clone())
    }

    /// Whether the session's one-shot ad trigger has fired.
    pub fn ad_fired(&self) -> bool {
        self.trigger
            .lock()
            .map(|trigger| trigger.has_fired())
            .unwrap_or(false)
    }

    /// Submissions whose optimize call succeeded this session.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Acquire)
    }

    /// Span sequence for the latest prompt against its optimized form.
    pub fn highlight_prompt(&self, mode: AlignMode) -> Option<Vec<AlignmentSpan>> {
        let prompt = self.latest_prompt.read().ok()?.clone()?;
        let optimization = self.latest_optimization()?;
        Some(align(&prompt, &optimization.optimized_prompt, mode))
    }

    /// Span sequence for the original answer against the optimized one.
    pub fn highlight_answer(&self, mode: AlignMode) -> Option<Vec<AlignmentSpan>> {
        let optimization = self.latest_optimization()?;
        Some(align(
            &optimization.original_answer,
            &optimization.optimized_answer,
            mode,
        ))
    }

    fn set_state(&self, state: PipelineState) {
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Scripted collaborator: `None` makes the corresponding call fail.
    struct StubCollaborator {
        optimization: Option<OptimizationResult>,
        analysis: Option<AnalysisResult>,
        hang_optimize: bool,
    }

    fn optimization() -> OptimizationResult {
        OptimizationResult {
            optimized_prompt: "cat sat".to_string(),
            optimized_answer: "short answer".to_string(),
            original_answer: "long answer".to_string(),
            is_cached: false,
        }
    }

    fn analysis(original: u64, optimized: u64) -> AnalysisResult {
        AnalysisResult {
            original_tokens: original,
            optimized_tokens: optimized,
            energy_saved_watts: 0.004,
            similarity_score_cosine: 0.95,
            similarity_score_gpt: 0.9,
            token_savings: None,
            token_savings_percentage: None,
            cost_saved_dollars: None,
        }
    }

    fn rejected() -> ApiError {
        ApiError::Rejected {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".to_string(),
        }
    }

    impl StubCollaborator {
        fn working() -> Self {
            Self {
                optimization: Some(optimization()),
                analysis: Some(analysis(100, 60)),
                hang_optimize: false,
            }
        }
    }

    #[async_trait]
    impl OptimizeService for StubCollaborator {
        async fn optimize(&self, _prompt: &str) -> Result<OptimizationResult, ApiError> {
            if self.hang_optimize {
                std::future::pending::<()>().await;
            }
            self.optimization.clone().ok_or_else(rejected)
        }
    }

    #[async_trait]
    impl AnalyzeService for StubCollaborator {
        async fn analyze(&self, _request: &AnalyzeRequest) -> Result<AnalysisResult, ApiError> {
            self.analysis.clone().ok_or_else(rejected)
        }
    }

    fn pipeline(stub: StubCollaborator) -> OptimizationPipeline<StubCollaborator> {
        OptimizationPipeline::new(stub, PipelineConfig::default())
    }

    #[tokio::test]
    async fn completed_run_records_savings() {
        let pipeline = pipeline(StubCollaborator::working());

        let report = pipeline.submit("the cat sat").await.unwrap();

        assert_eq!(report.ledger.total_tokens_saved, 40);
        assert_eq!(report.ledger.submission_count, 1);
        assert!(!report.ad_fired);
        assert_eq!(pipeline.state(), PipelineState::Completed);
        assert!(pipeline.latest_analysis().is_some());
    }

    #[tokio::test]
    async fn optimize_failure_retains_nothing() {
        let pipeline = pipeline(StubCollaborator {
            optimization: None,
            analysis: Some(analysis(100, 60)),
            hang_optimize: false,
        });

        let err = pipeline.submit("prompt").await.unwrap_err();

        assert!(matches!(err, PipelineError::Optimize(_)));
        assert_eq!(
            pipeline.state(),
            PipelineState::Failed(FailureKind::Optimize)
        );
        assert!(pipeline.latest_optimization().is_none());
        assert_eq!(pipeline.ledger(), SessionLedger::default());
        assert_eq!(pipeline.submission_count(), 0);
    }

    #[tokio::test]
    async fn analyze_failure_retains_answers_without_ledger_update() {
        let pipeline = pipeline(StubCollaborator {
            optimization: Some(optimization()),
            analysis: None,
            hang_optimize: false,
        });

        let err = pipeline.submit("the cat sat").await.unwrap_err();

        assert!(matches!(err, PipelineError::Analyze(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed(FailureKind::Analyze));
        // Partial success: the answers survive the failed scoring.
        assert!(pipeline.latest_optimization().is_some());
        assert!(pipeline.latest_analysis().is_none());
        assert_eq!(pipeline.ledger(), SessionLedger::default());
    }

    #[tokio::test]
    async fn ad_trigger_fires_on_third_submission() {
        let pipeline = pipeline(StubCollaborator::working());

        let fires = [
            pipeline.submit("one").await.unwrap().ad_fired,
            pipeline.submit("two").await.unwrap().ad_fired,
            pipeline.submit("three").await.unwrap().ad_fired,
            pipeline.submit("four").await.unwrap().ad_fired,
        ];

        assert_eq!(fires, [false, false, true, false]);
        assert!(pipeline.ad_fired());
    }

    #[tokio::test]
    async fn ad_counter_advances_even_when_analyze_fails() {
        let stub = StubCollaborator {
            optimization: Some(optimization()),
            analysis: None,
            hang_optimize: false,
        };
        let pipeline = OptimizationPipeline::new(stub, PipelineConfig { ad_threshold: 1 });

        let _ = pipeline.submit("prompt").await;

        // The counter moves on the successful exit from Optimizing,
        // regardless of the later analyze outcome.
        assert_eq!(pipeline.submission_count(), 1);
        assert!(pipeline.ad_fired());
    }

    #[tokio::test]
    async fn overlapping_submit_is_rejected() {
        let pipeline = Arc::new(pipeline(StubCollaborator {
            optimization: Some(optimization()),
            analysis: Some(analysis(100, 60)),
            hang_optimize: true,
        }));

        let background = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit("first").await })
        };
        tokio::task::yield_now().await;

        let err = pipeline.submit("second").await.unwrap_err();
        assert!(matches!(err, PipelineError::Busy));

        pipeline.cancel();
        let first = background.await.unwrap();
        assert!(matches!(first, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn cancel_fails_the_run_without_ledger_update() {
        let pipeline = Arc::new(pipeline(StubCollaborator {
            optimization: Some(optimization()),
            analysis: Some(analysis(100, 60)),
            hang_optimize: true,
        }));

        let background = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit("prompt").await })
        };
        tokio::task::yield_now().await;

        pipeline.cancel();
        let outcome = background.await.unwrap();

        assert!(matches!(outcome, Err(PipelineError::Cancelled)));
        assert_eq!(
            pipeline.state(),
            PipelineState::Failed(FailureKind::Cancelled)
        );
        assert_eq!(pipeline.ledger(), SessionLedger::default());
    }

    #[tokio::test]
    async fn cancel_with_nothing_in_flight_is_a_no_op() {
        let pipeline = pipeline(StubCollaborator::working());

        pipeline.cancel();

        // The stored-permit hazard would cancel this run; it must complete.
        let report = pipeline.submit("the cat sat").await.unwrap();
        assert_eq!(report.ledger.submission_count, 1);
    }

    #[tokio::test]
    async fn out_of_range_analysis_is_clamped_before_recording() {
        let pipeline = pipeline(StubCollaborator {
            optimization: Some(optimization()),
            analysis: Some(AnalysisResult {
                similarity_score_cosine: 1.4,
                ..analysis(10, 25)
            }),
            hang_optimize: false,
        });

        let report = pipeline.submit("prompt").await.unwrap();

        assert_eq!(report.analysis.optimized_tokens, 10);
        assert_eq!(report.analysis.similarity_score_cosine, 1.0);
        assert_eq!(report.ledger.total_tokens_saved, 0);
    }

    #[tokio::test]
    async fn start_session_resets_all_session_state() {
        let pipeline = pipeline(StubCollaborator::working());
        for prompt in ["one", "two", "three"] {
            pipeline.submit(prompt).await.unwrap();
        }
        assert!(pipeline.ad_fired());

        pipeline.start_session().unwrap();

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.ledger(), SessionLedger::default());
        assert_eq!(pipeline.submission_count(), 0);
        assert!(!pipeline.ad_fired());
        assert!(pipeline.latest_optimization().is_none());
    }

    #[tokio::test]
    async fn state_transitions_are_observable() {
        let pipeline = Arc::new(pipeline(StubCollaborator::working()));
        let mut states = pipeline.subscribe();

        let background = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit("the cat sat").await })
        };

        // watch only retains the latest value, so intermediate states can
        // coalesce; the terminal state must always be observed.
        let mut last = None;
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            last = Some(state);
            if state.is_terminal() {
                break;
            }
        }
        background.await.unwrap().unwrap();

        assert_eq!(last, Some(PipelineState::Completed));
    }

    #[tokio::test]
    async fn highlight_uses_latest_submission() {
        let pipeline = pipeline(StubCollaborator::working());
        pipeline.submit("the cat sat").await.unwrap();

        let spans = pipeline.highlight_prompt(AlignMode::WordSet).unwrap();
        let removed: Vec<&str> = spans
            .iter()
            .filter(|s| !s.matched)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(removed, vec!["the"]);

        assert!(pipeline.highlight_answer(AlignMode::CharGreedy).is_some());
    }
}
