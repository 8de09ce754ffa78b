//! Percentage reconciliation for pillar scores.
//!
//! The scoring backend reports each pillar either as a raw score/max pair or
//! with a precomputed percentage, and any of those fields may be missing or
//! garbage. These functions pick one authoritative percentage per record and
//! never fail: bad data degrades to a safe value instead of breaking display.

use crate::model::{PillarScore, SurveyResponseId, SurveyOutcome};

/// Default maximum score when the backend omits one (Likert 1..=5).
pub const DEFAULT_MAX_SCORE: f64 = 5.0;

/// Reduces a pillar record to one percentage in `[0, 100]`.
///
/// A finite backend-computed `percentage` wins over the raw pair. Otherwise
/// the raw score (0 when missing or non-finite) is scaled against the max
/// score (5 when missing, non-finite, or non-positive). The result is always
/// finite and clamped; this function never panics.
#[must_use]
pub fn reconcile(record: &PillarScore) -> f64 {
    if let Some(pct) = record.percentage.filter(|p| p.is_finite()) {
        return pct.clamp(0.0, 100.0);
    }

    let score = record.raw_score.filter(|s| s.is_finite()).unwrap_or(0.0);
    let max = record
        .max_score
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(DEFAULT_MAX_SCORE);

    (score / max * 100.0).clamp(0.0, 100.0)
}

/// True when a record is well-formed enough to display.
///
/// Requires a non-blank pillar name and a finite raw score. A raw score of
/// zero is valid (0%); malformed records should be filtered out rather than
/// coerced to 0%.
#[must_use]
pub fn is_valid_record(record: &PillarScore) -> bool {
    let named = record
        .pillar
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    let scored = record.raw_score.is_some_and(f64::is_finite);
    named && scored
}

/// Display-ready percentage for one pillar.
#[derive(Debug, Clone, PartialEq)]
pub struct PillarSummary {
    pub pillar: String,
    pub percentage: f64,
}

/// Reconciled view of a submission outcome, safe to hand to presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub total_score: f64,
    pub pillars: Vec<PillarSummary>,
    pub advice: Vec<String>,
    pub survey_response_id: SurveyResponseId,
}

impl ScoreSummary {
    /// Filters malformed pillar records and reconciles the rest.
    #[must_use]
    pub fn from_outcome(outcome: &SurveyOutcome) -> Self {
        let pillars = outcome
            .pillar_scores
            .iter()
            .filter(|record| is_valid_record(record))
            .map(|record| PillarSummary {
                pillar: record
                    .pillar
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                percentage: reconcile(record),
            })
            .collect();

        Self {
            total_score: outcome.total_score,
            pillars,
            advice: outcome.advice.clone(),
            survey_response_id: outcome.survey_response_id.clone(),
        }
    }
}
