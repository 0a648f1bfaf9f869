mod candidate;
mod reason;
mod scorer;

pub use candidate::UrlCandidate;
pub use reason::{Reason, ScoreResult};
pub use scorer::{merge_hits, url_spellings, Scorer};
