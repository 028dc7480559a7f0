pub mod client;
pub mod paginator;
pub mod parser;
pub mod rate_limiter;
pub mod source;

pub use client::PlayStoreClient;
pub use paginator::{FetchOutcome, ReviewPaginator};
pub use rate_limiter::RateLimiter;
pub use source::{AppDetails, ReviewPage, ReviewSource, StoreReview};
