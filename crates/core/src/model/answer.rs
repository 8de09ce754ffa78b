use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("answer {value} is outside the Likert range 1..=5")]
    OutOfRange { value: u8 },
}

/// A single Likert-scale response, validated to the 1..=5 range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LikertAnswer(u8);

impl LikertAnswer {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Validates and wraps a raw answer value.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::OutOfRange` when the value is not within 1..=5.
    pub fn new(value: u8) -> Result<Self, AnswerError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AnswerError::OutOfRange { value })
        }
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for LikertAnswer {
    type Error = AnswerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LikertAnswer> for u8 {
    fn from(answer: LikertAnswer) -> Self {
        answer.0
    }
}

impl fmt::Debug for LikertAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LikertAnswer({})", self.0)
    }
}

impl fmt::Display for LikertAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_likert_range() {
        for v in 1..=5 {
            assert_eq!(LikertAnswer::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(
            LikertAnswer::new(0).unwrap_err(),
            AnswerError::OutOfRange { value: 0 }
        );
        assert_eq!(
            LikertAnswer::new(6).unwrap_err(),
            AnswerError::OutOfRange { value: 6 }
        );
    }

    #[test]
    fn serde_rejects_invalid_answers() {
        let ok: LikertAnswer = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 3);
        assert!(serde_json::from_str::<LikertAnswer>("7").is_err());
    }
}
