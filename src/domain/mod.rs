pub mod request;
pub mod result;

pub use request::{FetchRequest, TypeHint};
pub use result::{Confidence, FetchResult, Outcome, SubAttempt, TierAttempt, TierKind};
