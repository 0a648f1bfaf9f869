mod fetcher;
mod snapshot;
mod store;
mod traits;

pub use fetcher::HttpFetcher;
pub use snapshot::{Feed, FeedEntry, FeedFailure, FeedHit, FeedSnapshot, FeedToken};
pub use store::{FeedSource, FeedStore};
pub use traits::FeedFetcher;
