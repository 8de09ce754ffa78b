use std::sync::Arc;

use clinic_core::Clock;
use storage::repository::Storage;

use crate::autosave::ProgressAutosaveTracker;
use crate::error::BootstrapError;
use crate::events::{EventSink, NullSink};
use crate::progress_api::{ClinicApiConfig, HttpProgressApi, InMemoryProgressApi, ProgressApi};
use crate::survey_flow::SurveyFlowService;

/// Assembles the survey engine for a host application.
#[derive(Clone)]
pub struct ClinicServices {
    survey_flow: Arc<SurveyFlowService>,
    tracker: Arc<ProgressAutosaveTracker>,
}

impl ClinicServices {
    /// Build services against the HTTP backend and `SQLite`-cached session id.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::MissingApiConfig` when `CLINIC_API_BASE_URL`
    /// is unset, or a storage error when the database cannot be opened.
    pub async fn from_env(db_url: &str, clock: Clock) -> Result<Self, BootstrapError> {
        let config = ClinicApiConfig::from_env().ok_or(BootstrapError::MissingApiConfig)?;
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn ProgressApi> = Arc::new(HttpProgressApi::new(config));
        Ok(Self::assemble(clock, api, storage, Arc::new(NullSink)))
    }

    /// Build fully in-memory services, for tests and prototyping.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        let api: Arc<dyn ProgressApi> = Arc::new(InMemoryProgressApi::new());
        Self::assemble(clock, api, Storage::in_memory(), Arc::new(NullSink))
    }

    /// Wire services from explicit parts.
    #[must_use]
    pub fn assemble(
        clock: Clock,
        api: Arc<dyn ProgressApi>,
        storage: Storage,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let tracker = Arc::new(
            ProgressAutosaveTracker::new(Arc::clone(&api), Arc::clone(&storage.sessions))
                .with_sink(sink),
        );
        let survey_flow = Arc::new(SurveyFlowService::new(clock, api, Arc::clone(&tracker)));
        Self {
            survey_flow,
            tracker,
        }
    }

    #[must_use]
    pub fn survey_flow(&self) -> Arc<SurveyFlowService> {
        Arc::clone(&self.survey_flow)
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<ProgressAutosaveTracker> {
        Arc::clone(&self.tracker)
    }
}
