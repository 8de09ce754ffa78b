#![forbid(unsafe_code)]

pub mod backoff;
pub mod model;
pub mod score;
pub mod time;

pub use backoff::RetryPolicy;
pub use score::{PillarSummary, ScoreSummary, is_valid_record, reconcile};
pub use time::Clock;
