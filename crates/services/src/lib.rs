#![forbid(unsafe_code)]

pub mod app_services;
pub mod autosave;
pub mod error;
pub mod events;
pub mod progress_api;
pub mod retry;
pub mod survey_flow;

pub use clinic_core::Clock;
pub use clinic_core::backoff::RetryPolicy;

pub use app_services::ClinicServices;
pub use autosave::ProgressAutosaveTracker;
pub use error::{ApiError, ApiErrorKind, AutosaveError, BootstrapError, SurveyFlowError};
pub use events::{EventSink, MemorySink, NullSink, ProgressEvent, SkipReason};
pub use progress_api::{ClinicApiConfig, HttpProgressApi, InMemoryProgressApi, ProgressApi};
pub use retry::{ExecutorStatus, RetryingCallExecutor};
pub use survey_flow::SurveyFlowService;
