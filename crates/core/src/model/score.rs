use serde::{Deserialize, Serialize};

use crate::model::SurveyResponseId;

/// One pillar's score as reported by the scoring backend.
///
/// The payload is untrusted: every numeric field may be missing, null, or
/// out of range, and the pillar name may be absent. Reconciliation in
/// [`crate::score`] turns a record into a single trustworthy percentage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PillarScore {
    /// Canonical factor key, e.g. "savings_habit".
    #[serde(alias = "name")]
    pub pillar: Option<String>,
    /// Raw weighted score for the pillar.
    #[serde(alias = "score")]
    pub raw_score: Option<f64>,
    /// Maximum attainable score; Likert convention says 5 when absent.
    pub max_score: Option<f64>,
    /// Backend-computed percentage; authoritative when present and finite.
    pub percentage: Option<f64>,
}

impl PillarScore {
    /// Convenience constructor for a raw score/max pair.
    #[must_use]
    pub fn from_raw(pillar: impl Into<String>, raw_score: f64, max_score: f64) -> Self {
        Self {
            pillar: Some(pillar.into()),
            raw_score: Some(raw_score),
            max_score: Some(max_score),
            percentage: None,
        }
    }
}

/// Result of a successful survey submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyOutcome {
    pub total_score: f64,
    pub pillar_scores: Vec<PillarScore>,
    pub advice: Vec<String>,
    pub survey_response_id: SurveyResponseId,
}
