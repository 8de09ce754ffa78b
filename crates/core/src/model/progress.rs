use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{LikertAnswer, QuestionId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("a survey must have at least one step")]
    NoSteps,

    #[error("step {requested} is behind the current step {current}")]
    StepRegression { current: u32, requested: u32 },

    #[error("step {requested} exceeds the survey's {total_steps} steps")]
    StepOutOfRange { requested: u32, total_steps: u32 },
}

/// Optional contact details used to link a guest session to an identity later.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactHint {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactHint {
    /// True when neither field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }
}

/// Partial state of one survey attempt, pushed to the remote store by autosave.
///
/// The current step never moves backwards for the lifetime of a value; this is
/// what keeps remotely observed snapshots monotonic even when pushes race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyProgress {
    session_id: SessionId,
    current_step: u32,
    total_steps: u32,
    responses: BTreeMap<QuestionId, LikertAnswer>,
    contact_hint: Option<ContactHint>,
    company_context: Option<String>,
    last_activity: DateTime<Utc>,
}

impl SurveyProgress {
    /// Creates progress for a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoSteps` when `total_steps` is zero.
    pub fn new(
        session_id: SessionId,
        total_steps: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if total_steps == 0 {
            return Err(ProgressError::NoSteps);
        }
        Ok(Self {
            session_id,
            current_step: 0,
            total_steps,
            responses: BTreeMap::new(),
            contact_hint: None,
            company_context: None,
            last_activity: now,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    #[must_use]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    #[must_use]
    pub fn responses(&self) -> &BTreeMap<QuestionId, LikertAnswer> {
        &self.responses
    }

    #[must_use]
    pub fn contact_hint(&self) -> Option<&ContactHint> {
        self.contact_hint.as_ref()
    }

    #[must_use]
    pub fn company_context(&self) -> Option<&str> {
        self.company_context.as_deref()
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// True once every step has been passed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.total_steps
    }

    /// Replaces the session id, used when the backend mints one during start.
    pub fn adopt_session(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    /// Records or overwrites an answer and bumps the activity timestamp.
    pub fn record_answer(&mut self, question: QuestionId, answer: LikertAnswer, now: DateTime<Utc>) {
        self.responses.insert(question, answer);
        self.last_activity = now;
    }

    /// Moves the current step forward.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StepRegression` when `step` is behind the current
    /// step, or `ProgressError::StepOutOfRange` when it exceeds `total_steps`.
    pub fn advance_to(&mut self, step: u32, now: DateTime<Utc>) -> Result<(), ProgressError> {
        if step < self.current_step {
            return Err(ProgressError::StepRegression {
                current: self.current_step,
                requested: step,
            });
        }
        if step > self.total_steps {
            return Err(ProgressError::StepOutOfRange {
                requested: step,
                total_steps: self.total_steps,
            });
        }
        self.current_step = step;
        self.last_activity = now;
        Ok(())
    }

    pub fn set_contact_hint(&mut self, hint: ContactHint) {
        self.contact_hint = if hint.is_empty() { None } else { Some(hint) };
    }

    pub fn set_company_context(&mut self, slug: Option<String>) {
        self.company_context = slug.filter(|s| !s.trim().is_empty());
    }

    /// Bumps the activity timestamp without other changes.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}
