//! Shared error types for the services crate.

use std::fmt;
use thiserror::Error;

use clinic_core::model::ProgressError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Classification of a remote call failure, assigned by the transport layer.
///
/// Consumers (the retrying executor, the autosave tracker) trust the
/// accompanying `retryable` flag and never reclassify. `Cors` only arises in
/// browser-embedded hosts; it is part of the taxonomy so such hosts can map
/// their transport errors onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ApiErrorKind {
    Network,
    Timeout,
    Server,
    RateLimit,
    Cors,
    Auth,
    Permission,
    NotFound,
    Validation,
    Unknown,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Network => "network",
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::Server => "server",
            ApiErrorKind::RateLimit => "rate limit",
            ApiErrorKind::Cors => "cors",
            ApiErrorKind::Auth => "auth",
            ApiErrorKind::Permission => "permission",
            ApiErrorKind::NotFound => "not found",
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A typed remote call failure.
///
/// `retryable` is set where the error is raised (the transport layer) and
/// decides whether the executor schedules automatic retries.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub retryable: bool,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ApiErrorKind, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable,
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, true, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, true, message)
    }

    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Server, true, message).with_status(status)
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::RateLimit, true, message).with_status(429)
    }

    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Auth, false, message).with_status(401)
    }

    #[must_use]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Permission, false, message).with_status(403)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, false, message).with_status(404)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, false, message)
    }

    /// True for a stale or expired autosave session.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

/// Errors emitted by `ProgressAutosaveTracker::start`.
///
/// Updates and completion never surface errors; only failing to obtain a
/// session id is reported, and callers should treat it as "proceed without
/// autosave" rather than as fatal.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutosaveError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SurveyFlowService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurveyFlowError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while bootstrapping clinic services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("CLINIC_API_BASE_URL is not configured")]
    MissingApiConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_retryability() {
        assert!(ApiError::network("offline").retryable);
        assert!(ApiError::timeout("slow").retryable);
        assert!(ApiError::server(503, "boom").retryable);
        assert!(ApiError::rate_limited("slow down").retryable);
        assert!(!ApiError::auth("who?").retryable);
        assert!(!ApiError::permission("no").retryable);
        assert!(!ApiError::not_found("gone").retryable);
        assert!(!ApiError::validation("bad").retryable);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = ApiError::server(500, "exploded");
        assert_eq!(err.to_string(), "server error: exploded");
        assert_eq!(err.status, Some(500));
    }
}
