use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::playstore::source::{ReviewPage, ReviewSource, StoreReview};

/// Result of walking a review feed.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub reviews: Vec<StoreReview>,
    /// The source ran out of pages before the target was reached.
    pub exhausted: bool,
    /// A page failed after all retries; `reviews` holds what came before it.
    pub interrupted: bool,
}

pub struct ReviewPaginator<'a> {
    source: &'a dyn ReviewSource,
    max_retries: u32,
    retry_delay: Duration,
}

impl<'a> ReviewPaginator<'a> {
    pub fn new(source: &'a dyn ReviewSource, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            source,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Fetch pages until at least `min_items` reviews are held or the feed ends.
    pub async fn fetch_at_least(&self, app_id: &str, min_items: u32) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut token: Option<String> = None;
        let per_page = self.source.max_page_size().max(1);

        loop {
            let remaining = (min_items as usize).saturating_sub(outcome.reviews.len());
            let count = (remaining as u32).clamp(1, per_page);

            let page = match self.fetch_with_retry(app_id, count, token.as_deref()).await {
                Ok(page) => page,
                Err((e, attempts)) if outcome.reviews.is_empty() => {
                    tracing::error!(
                        "First fetch for {} failed after {} attempts: {}",
                        app_id,
                        attempts,
                        e
                    );
                    return Err(match e {
                        Error::AppNotFound(_) => e,
                        _ => Error::SourceExhausted {
                            app_id: app_id.to_string(),
                            attempts,
                        },
                    });
                }
                Err((e, _)) => {
                    tracing::warn!(
                        "Stopping {} after {} reviews, page fetch failed: {}",
                        app_id,
                        outcome.reviews.len(),
                        e
                    );
                    outcome.interrupted = true;
                    break;
                }
            };

            let page_len = page.reviews.len();
            outcome.reviews.extend(page.reviews);

            if outcome.reviews.len() >= min_items as usize {
                break;
            }

            match page.next_token {
                Some(next) if page_len > 0 => token = Some(next),
                _ => {
                    outcome.exhausted = true;
                    break;
                }
            }
        }

        Ok(outcome)
    }

    // On failure, also reports how many attempts were made.
    async fn fetch_with_retry(
        &self,
        app_id: &str,
        count: u32,
        token: Option<&str>,
    ) -> std::result::Result<ReviewPage, (Error, u32)> {
        let mut attempt = 1;
        loop {
            match self.source.fetch_page(app_id, count, token).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        self.max_retries,
                        app_id,
                        e,
                        self.retry_delay
                    );
                    sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::playstore::source::AppDetails;

    /// Replays a fixed script of page results, one per call.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ReviewPage>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ReviewPage>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReviewSource for ScriptedSource {
        async fn fetch_app_details(&self, app_id: &str) -> Result<AppDetails> {
            Err(Error::AppNotFound(app_id.to_string()))
        }

        async fn fetch_page(
            &self,
            _app_id: &str,
            _count: u32,
            _token: Option<&str>,
        ) -> Result<ReviewPage> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ReviewPage::default()))
        }

        fn max_page_size(&self) -> u32 {
            2
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<ReviewPage> {
        Ok(ReviewPage {
            reviews: ids
                .iter()
                .map(|id| StoreReview {
                    review_id: id.to_string(),
                    user_name: None,
                    content: Some("ok".to_string()),
                    score: 4,
                    thumbs_up: 0,
                    app_version: None,
                    reply_content: None,
                    at: None,
                })
                .collect(),
            next_token: next.map(|t| t.to_string()),
        })
    }

    fn unavailable() -> Result<ReviewPage> {
        Err(Error::Fetch("503 Service Unavailable".to_string()))
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_earlier_reviews() {
        let source = ScriptedSource::new(vec![
            page(&["gp:1", "gp:2"], Some("p2")),
            unavailable(),
            unavailable(),
            unavailable(),
        ]);
        let paginator = ReviewPaginator::new(&source, 3, Duration::ZERO);

        let outcome = paginator.fetch_at_least("com.cbe", 10).await.unwrap();
        assert_eq!(outcome.reviews.len(), 2);
        assert!(outcome.interrupted);
        assert!(!outcome.exhausted);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_app_not_found_passes_through() {
        let source = ScriptedSource::new(vec![Err(Error::AppNotFound("com.gone".to_string()))]);
        let paginator = ReviewPaginator::new(&source, 3, Duration::ZERO);

        let err = paginator.fetch_at_least("com.gone", 10).await.unwrap_err();
        assert!(matches!(err, Error::AppNotFound(ref id) if id == "com.gone"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_reports_single_attempt() {
        let source = ScriptedSource::new(vec![Err(Error::ParseError("captcha".to_string()))]);
        let paginator = ReviewPaginator::new(&source, 3, Duration::ZERO);

        let err = paginator.fetch_at_least("com.cbe", 10).await.unwrap_err();
        assert!(matches!(err, Error::SourceExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_retries_exhausted_on_first_page() {
        let source = ScriptedSource::new(vec![unavailable(), unavailable()]);
        let paginator = ReviewPaginator::new(&source, 2, Duration::ZERO);

        let err = paginator.fetch_at_least("com.cbe", 10).await.unwrap_err();
        assert!(matches!(err, Error::SourceExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_feed_is_exhausted() {
        let source = ScriptedSource::new(vec![page(&[], None)]);
        let paginator = ReviewPaginator::new(&source, 3, Duration::ZERO);

        let outcome = paginator.fetch_at_least("com.cbe", 10).await.unwrap();
        assert!(outcome.reviews.is_empty());
        assert!(outcome.exhausted);
    }
}
