//! Orchestrates one survey attempt: begin, answer, submit.
//!
//! The flow glues the autosave tracker to the questionnaire lifecycle and
//! runs the final submission through a retrying executor so the host gets
//! loading/error/retry state for its submit button.

use std::sync::Arc;

use clinic_core::Clock;
use clinic_core::backoff::RetryPolicy;
use clinic_core::model::{ContactHint, LikertAnswer, QuestionId, SessionId, SurveyProgress};
use clinic_core::score::ScoreSummary;

use crate::autosave::ProgressAutosaveTracker;
use crate::error::SurveyFlowError;
use crate::progress_api::ProgressApi;
use crate::retry::{ExecutorStatus, RetryingCallExecutor};

pub struct SurveyFlowService {
    clock: Clock,
    api: Arc<dyn ProgressApi>,
    tracker: Arc<ProgressAutosaveTracker>,
    submit_executor: RetryingCallExecutor<ScoreSummary>,
}

impl SurveyFlowService {
    #[must_use]
    pub fn new(
        clock: Clock,
        api: Arc<dyn ProgressApi>,
        tracker: Arc<ProgressAutosaveTracker>,
    ) -> Self {
        Self::with_submit_policy(clock, api, tracker, RetryPolicy::default())
    }

    #[must_use]
    pub fn with_submit_policy(
        clock: Clock,
        api: Arc<dyn ProgressApi>,
        tracker: Arc<ProgressAutosaveTracker>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            clock,
            api,
            tracker,
            submit_executor: RetryingCallExecutor::new(policy),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<ProgressAutosaveTracker> {
        Arc::clone(&self.tracker)
    }

    /// Start a new attempt, resuming the cached autosave session when one
    /// exists.
    ///
    /// An autosave start failure degrades to "no autosave for this attempt"
    /// and is not fatal to survey-taking.
    ///
    /// # Errors
    ///
    /// Returns `SurveyFlowError::Progress` when `total_steps` is zero.
    pub async fn begin(
        &self,
        total_steps: u32,
        company_context: Option<String>,
    ) -> Result<SurveyProgress, SurveyFlowError> {
        let mut progress =
            SurveyProgress::new(SessionId::generate(), total_steps, self.clock.now())?;
        progress.set_company_context(company_context);

        if let Err(error) = self.tracker.start(&mut progress).await {
            tracing::warn!(%error, "autosave unavailable, continuing without it");
        }
        Ok(progress)
    }

    /// Record an answer, advance one step, and push an autosave update.
    ///
    /// # Errors
    ///
    /// Returns `SurveyFlowError::Progress` when the survey is already past
    /// its final step.
    pub async fn answer(
        &self,
        progress: &mut SurveyProgress,
        question: QuestionId,
        answer: LikertAnswer,
    ) -> Result<(), SurveyFlowError> {
        let now = self.clock.now();
        progress.record_answer(question, answer, now);
        progress.advance_to(progress.current_step() + 1, now)?;
        self.tracker.update(progress).await;
        Ok(())
    }

    /// Attach contact details to the attempt and push an autosave update.
    pub async fn provide_contact(&self, progress: &mut SurveyProgress, hint: ContactHint) {
        progress.set_contact_hint(hint);
        progress.touch(self.clock.now());
        self.tracker.update(progress).await;
    }

    /// Submit the finished survey and tear down the autosave session.
    ///
    /// Retries transient submission failures per the executor policy; the
    /// executor state stays observable for the host's submit UI.
    ///
    /// # Errors
    ///
    /// Returns `SurveyFlowError::Api` with the final error once retries are
    /// exhausted.
    pub async fn submit(&self, progress: &SurveyProgress) -> Result<ScoreSummary, SurveyFlowError> {
        let api = Arc::clone(&self.api);
        let snapshot = progress.clone();
        let summary = self
            .submit_executor
            .handle_call(move || {
                let api = Arc::clone(&api);
                let snapshot = snapshot.clone();
                async move {
                    let outcome = api.submit_survey(&snapshot).await?;
                    Ok(ScoreSummary::from_outcome(&outcome))
                }
            })
            .await?;

        self.tracker.complete().await;
        Ok(summary)
    }

    /// Re-run the last submission attempt after a terminal failure.
    ///
    /// # Errors
    ///
    /// Returns `SurveyFlowError::Api` when the retried call fails again or
    /// nothing was submitted yet.
    pub async fn retry_submit(&self) -> Result<ScoreSummary, SurveyFlowError> {
        let summary = self.submit_executor.retry().await?;
        self.tracker.complete().await;
        Ok(summary)
    }

    /// Loading/error/retry state of the submission call.
    #[must_use]
    pub fn submit_status(&self) -> ExecutorStatus {
        self.submit_executor.status()
    }

    /// Dismiss a surfaced submission error without re-submitting.
    pub fn clear_submit_error(&self) {
        self.submit_executor.clear_error();
    }
}
