//! Remote progress store boundary.
//!
//! `ProgressApi` is the only surface the engine consumes from the backend:
//! create/update/delete of in-progress survey state plus final submission.
//! `HttpProgressApi` is the production transport; it owns error
//! classification (kind + retryable flag), which downstream consumers trust
//! as-is. `InMemoryProgressApi` backs tests and prototyping.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::env;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use clinic_core::model::{PillarScore, SessionId, SurveyOutcome, SurveyProgress, SurveyResponseId};
use clinic_core::score::reconcile;

use crate::error::ApiError;

/// Remote store for in-progress and submitted surveys.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Register a new in-progress attempt; the backend mints the session id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` classified by the transport.
    async fn create_progress(&self, progress: &SurveyProgress) -> Result<SessionId, ApiError>;

    /// Replace the stored snapshot for a session with the given state.
    ///
    /// # Errors
    ///
    /// Returns `ApiError`; a `NotFound` kind means the session expired
    /// server-side and is non-fatal to autosave callers.
    async fn update_progress(
        &self,
        session_id: &SessionId,
        progress: &SurveyProgress,
    ) -> Result<(), ApiError>;

    /// Delete the stored snapshot for a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` classified by the transport.
    async fn delete_progress(&self, session_id: &SessionId) -> Result<(), ApiError>;

    /// Submit the finished survey for scoring.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` classified by the transport.
    async fn submit_survey(&self, progress: &SurveyProgress) -> Result<SurveyOutcome, ApiError>;
}

// ─── HTTP Transport ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ClinicApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ClinicApiConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Reads configuration from `CLINIC_API_BASE_URL` / `CLINIC_API_KEY`.
    ///
    /// Returns `None` when no base URL is configured, letting hosts fall back
    /// to an offline backend.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("CLINIC_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("CLINIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Some(Self {
            base_url,
            api_key,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }
}

/// reqwest-backed `ProgressApi`.
#[derive(Clone)]
pub struct HttpProgressApi {
    client: Client,
    config: ClinicApiConfig,
}

impl HttpProgressApi {
    #[must_use]
    pub fn new(config: ClinicApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.config.timeout);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_status(status))
        }
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn create_progress(&self, progress: &SurveyProgress) -> Result<SessionId, ApiError> {
        let body = ProgressBody::from_progress(progress);
        let response = self
            .send(self.client.post(self.url("progress")).json(&body))
            .await?;
        let created: CreateProgressResponse = response
            .json()
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        Ok(created.session_id)
    }

    async fn update_progress(
        &self,
        session_id: &SessionId,
        progress: &SurveyProgress,
    ) -> Result<(), ApiError> {
        let body = ProgressBody::from_progress(progress);
        let path = format!("progress/{session_id}");
        self.send(self.client.put(self.url(&path)).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_progress(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let path = format!("progress/{session_id}");
        self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn submit_survey(&self, progress: &SurveyProgress) -> Result<SurveyOutcome, ApiError> {
        let body = SubmitBody::from_progress(progress);
        let response = self
            .send(self.client.post(self.url("submissions")).json(&body))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::validation(e.to_string()))
    }
}

fn classify_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout(error.to_string())
    } else if error.is_decode() {
        ApiError::validation(error.to_string())
    } else {
        // Connect failures, DNS, refused connections: all transient.
        ApiError::network(error.to_string())
    }
}

fn classify_status(status: StatusCode) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::auth("unauthorized"),
        StatusCode::FORBIDDEN => ApiError::permission("forbidden"),
        StatusCode::NOT_FOUND => ApiError::not_found("unknown or expired session"),
        StatusCode::TOO_MANY_REQUESTS => ApiError::rate_limited("rate limited"),
        StatusCode::REQUEST_TIMEOUT => ApiError::timeout("request timed out"),
        s if s.is_server_error() => ApiError::server(s.as_u16(), "server error"),
        s => ApiError::new(
            crate::error::ApiErrorKind::Unknown,
            false,
            format!("unexpected status {s}"),
        )
        .with_status(s.as_u16()),
    }
}

// ─── Wire Shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBody<'a> {
    current_step: u32,
    total_steps: u32,
    responses: BTreeMap<&'a str, u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_hint: Option<ContactBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_context: Option<&'a str>,
    last_activity: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ContactBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

impl<'a> ProgressBody<'a> {
    fn from_progress(progress: &'a SurveyProgress) -> Self {
        Self {
            current_step: progress.current_step(),
            total_steps: progress.total_steps(),
            responses: progress
                .responses()
                .iter()
                .map(|(q, a)| (q.as_str(), a.value()))
                .collect(),
            contact_hint: progress.contact_hint().map(|hint| ContactBody {
                email: hint.email.as_deref(),
                phone: hint.phone.as_deref(),
            }),
            company_context: progress.company_context(),
            last_activity: progress.last_activity(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    responses: BTreeMap<&'a str, u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_hint: Option<ContactBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_context: Option<&'a str>,
}

impl<'a> SubmitBody<'a> {
    fn from_progress(progress: &'a SurveyProgress) -> Self {
        Self {
            responses: progress
                .responses()
                .iter()
                .map(|(q, a)| (q.as_str(), a.value()))
                .collect(),
            contact_hint: progress.contact_hint().map(|hint| ContactBody {
                email: hint.email.as_deref(),
                phone: hint.phone.as_deref(),
            }),
            company_context: progress.company_context(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProgressResponse {
    session_id: SessionId,
}

// ─── In-Memory Backend ─────────────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryState {
    histories: HashMap<SessionId, Vec<SurveyProgress>>,
    queued_failures: VecDeque<ApiError>,
    outcome: Option<SurveyOutcome>,
    update_delay: Option<Duration>,
    create_calls: u32,
    update_calls: u32,
    delete_calls: u32,
    submit_calls: u32,
}

/// In-memory `ProgressApi` for tests and prototyping.
///
/// Records every snapshot it receives per session so callers can inspect the
/// remote-visible history, and supports scripting failures and artificial
/// update latency.
#[derive(Clone, Default)]
pub struct InMemoryProgressApi {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryProgressApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an error; the next operation of any kind consumes it and fails.
    pub fn queue_failure(&self, error: ApiError) {
        self.lock().queued_failures.push_back(error);
    }

    /// Fix the outcome returned by `submit_survey`.
    pub fn set_outcome(&self, outcome: SurveyOutcome) {
        self.lock().outcome = Some(outcome);
    }

    /// Delay applied inside `update_progress`, for ordering tests.
    pub fn set_update_delay(&self, delay: Duration) {
        self.lock().update_delay = Some(delay);
    }

    #[must_use]
    pub fn create_calls(&self) -> u32 {
        self.lock().create_calls
    }

    #[must_use]
    pub fn update_calls(&self) -> u32 {
        self.lock().update_calls
    }

    #[must_use]
    pub fn delete_calls(&self) -> u32 {
        self.lock().delete_calls
    }

    #[must_use]
    pub fn submit_calls(&self) -> u32 {
        self.lock().submit_calls
    }

    /// Every snapshot received for a session, oldest first.
    #[must_use]
    pub fn history(&self, session_id: &SessionId) -> Vec<SurveyProgress> {
        self.lock()
            .histories
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The latest stored snapshot for a session.
    #[must_use]
    pub fn latest(&self, session_id: &SessionId) -> Option<SurveyProgress> {
        self.lock()
            .histories
            .get(session_id)
            .and_then(|h| h.last().cloned())
    }

    fn take_failure(&self) -> Option<ApiError> {
        self.lock().queued_failures.pop_front()
    }
}

#[async_trait]
impl ProgressApi for InMemoryProgressApi {
    async fn create_progress(&self, progress: &SurveyProgress) -> Result<SessionId, ApiError> {
        self.lock().create_calls += 1;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        let session_id = SessionId::generate();
        let mut snapshot = progress.clone();
        snapshot.adopt_session(session_id.clone());
        self.lock()
            .histories
            .insert(session_id.clone(), vec![snapshot]);
        Ok(session_id)
    }

    async fn update_progress(
        &self,
        session_id: &SessionId,
        progress: &SurveyProgress,
    ) -> Result<(), ApiError> {
        let delay = {
            let mut state = self.lock();
            state.update_calls += 1;
            state.update_delay
        };
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        match state.histories.get_mut(session_id) {
            Some(history) => {
                history.push(progress.clone());
                Ok(())
            }
            None => Err(ApiError::not_found("unknown or expired session")),
        }
    }

    async fn delete_progress(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.delete_calls += 1;
        if let Some(error) = state.queued_failures.pop_front() {
            return Err(error);
        }
        state
            .histories
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("unknown or expired session"))
    }

    async fn submit_survey(&self, progress: &SurveyProgress) -> Result<SurveyOutcome, ApiError> {
        let mut state = self.lock();
        state.submit_calls += 1;
        if let Some(error) = state.queued_failures.pop_front() {
            return Err(error);
        }
        if let Some(outcome) = &state.outcome {
            return Ok(outcome.clone());
        }

        // Minimal stand-in for the backend's weighted scoring: one overall
        // pillar averaging every Likert answer.
        let answers: Vec<f64> = progress
            .responses()
            .values()
            .map(|a| f64::from(a.value()))
            .collect();
        let mean = if answers.is_empty() {
            0.0
        } else {
            answers.iter().sum::<f64>() / answers.len() as f64
        };
        let overall = PillarScore::from_raw("overall", mean, 5.0);
        Ok(SurveyOutcome {
            total_score: reconcile(&overall),
            pillar_scores: vec![overall],
            advice: Vec::new(),
            survey_response_id: SurveyResponseId::generate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::model::{LikertAnswer, QuestionId};
    use clinic_core::time::fixed_now;

    fn build_progress() -> SurveyProgress {
        let mut progress =
            SurveyProgress::new(SessionId::new("placeholder"), 15, fixed_now()).unwrap();
        progress.record_answer(
            QuestionId::new("q1"),
            LikertAnswer::new(4).unwrap(),
            fixed_now(),
        );
        progress
    }

    #[tokio::test]
    async fn create_mints_and_stores_initial_snapshot() {
        let api = InMemoryProgressApi::new();
        let progress = build_progress();

        let id = api.create_progress(&progress).await.unwrap();
        assert_eq!(api.create_calls(), 1);
        let stored = api.latest(&id).unwrap();
        assert_eq!(stored.session_id(), &id);
        assert_eq!(stored.responses().len(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_session_is_not_found() {
        let api = InMemoryProgressApi::new();
        let progress = build_progress();
        let err = api
            .update_progress(&SessionId::new("ghost"), &progress)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let api = InMemoryProgressApi::new();
        api.queue_failure(ApiError::server(503, "down"));
        let err = api.create_progress(&build_progress()).await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert!(api.create_progress(&build_progress()).await.is_ok());
    }

    #[tokio::test]
    async fn default_submit_scores_the_mean_answer() {
        let api = InMemoryProgressApi::new();
        let mut progress = build_progress();
        progress.record_answer(
            QuestionId::new("q2"),
            LikertAnswer::new(2).unwrap(),
            fixed_now(),
        );

        let outcome = api.submit_survey(&progress).await.unwrap();
        // Answers 4 and 2 average to 3 out of 5.
        assert_eq!(outcome.total_score, 60.0);
        assert_eq!(outcome.pillar_scores.len(), 1);
    }
}
