use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::playstore::parser::{build_reviews_request, parse_app_details, parse_reviews_response};
use crate::playstore::rate_limiter::RateLimiter;
use crate::playstore::source::{AppDetails, ReviewPage, ReviewSource};

const BATCH_EXECUTE_PATH: &str = "/_/PlayStoreUi/data/batchexecute";
const DETAILS_PATH: &str = "/store/apps/details";

/// Largest page the reviews RPC will return.
pub const MAX_PAGE_SIZE: u32 = 199;

/// Sort code for "newest first" in the reviews RPC.
const SORT_NEWEST: u8 = 2;

pub struct PlayStoreClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    lang: String,
    country: String,
}

impl PlayStoreClient {
    pub fn new(lang: &str, country: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("bankreviews/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::default(),
            base_url: "https://play.google.com".to_string(),
            lang: lang.to_string(),
            country: country.to_string(),
        })
    }

    // 404 means the listing does not exist; 429 arms the limiter's back-off.
    async fn check_status(&self, response: Response, app_id: &str) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::AppNotFound(app_id.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30);
            self.rate_limiter
                .back_off(Duration::from_secs(retry_after))
                .await;
            return Err(Error::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Request for {} failed: {} - {}",
                app_id,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ReviewSource for PlayStoreClient {
    async fn fetch_app_details(&self, app_id: &str) -> Result<AppDetails> {
        self.rate_limiter.wait().await;

        let url = format!("{}{}", self.base_url, DETAILS_PATH);
        tracing::debug!("Fetching listing details for {}", app_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", app_id),
                ("hl", self.lang.as_str()),
                ("gl", self.country.as_str()),
            ])
            .send()
            .await?;

        let body = self.check_status(response, app_id).await?.text().await?;
        parse_app_details(&body)
    }

    async fn fetch_page(
        &self,
        app_id: &str,
        count: u32,
        token: Option<&str>,
    ) -> Result<ReviewPage> {
        self.rate_limiter.wait().await;

        let url = format!("{}{}", self.base_url, BATCH_EXECUTE_PATH);
        let payload = build_reviews_request(app_id, SORT_NEWEST, count.min(MAX_PAGE_SIZE), token);
        tracing::debug!("Fetching {} reviews for {} (token: {:?})", count, app_id, token);

        let response = self
            .client
            .post(&url)
            .query(&[("hl", self.lang.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", payload)])
            .send()
            .await?;

        let body = self.check_status(response, app_id).await?.text().await?;
        parse_reviews_response(&body)
    }

    fn max_page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    fn name(&self) -> &str {
        "Google Play"
    }
}
