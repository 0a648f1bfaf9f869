mod advisory;
mod doh;
mod engine;
mod urlhaus;

pub use advisory::{Advisory, DohAdvisory, HostResolver, Signal};
pub use doh::DohResolver;
pub use engine::{Action, DecisionEngine, DecisiveReason, Verdict};
pub use urlhaus::UrlhausAdvisory;
