use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single review as the store reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreReview {
    pub review_id: String,
    pub user_name: Option<String>,
    pub content: Option<String>,
    pub score: u8,
    pub thumbs_up: u32,
    pub app_version: Option<String>,
    pub reply_content: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub reviews: Vec<StoreReview>,
    /// Continuation token; `None` once the source has nothing more to give.
    pub next_token: Option<String>,
}

/// Listing-level details for an app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppDetails {
    pub title: String,
    pub score: Option<f64>,
    pub ratings: u64,
    pub reviews: u64,
    pub installs: Option<String>,
}

#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_app_details(&self, app_id: &str) -> Result<AppDetails>;

    async fn fetch_page(
        &self,
        app_id: &str,
        count: u32,
        token: Option<&str>,
    ) -> Result<ReviewPage>;
    fn max_page_size(&self) -> u32;
    fn name(&self) -> &str;
}
