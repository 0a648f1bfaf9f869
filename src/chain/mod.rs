mod extract;
mod resolver;
mod types;

pub use extract::Extractor;
pub use resolver::ChainResolver;
pub use types::{Chain, Extraction, Hop, HopDiff, TerminalReason};
