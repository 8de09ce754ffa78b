mod answer;
mod ids;
mod progress;
mod score;

pub use answer::{AnswerError, LikertAnswer};
pub use ids::{ParseIdError, QuestionId, SessionId, SurveyResponseId};
pub use progress::{ContactHint, ProgressError, SurveyProgress};
pub use score::{PillarScore, SurveyOutcome};
