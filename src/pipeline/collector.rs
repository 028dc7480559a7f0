use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;

use crate::config::{CollectorConfig, DataPaths};
use crate::error::Result;
use crate::models::{
    AppCollection, AppInfo, BankApp, CollectionReport, RawReview, DEFAULT_SOURCE,
};
use crate::playstore::{ReviewPaginator, ReviewSource, StoreReview};
use crate::storage::files::{write_app_info, write_raw_reviews};

/// Reviews gathered for one app, before they are written out.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub reviews: Vec<RawReview>,
    pub target: u32,
    pub exhausted: bool,
}

impl CollectionOutcome {
    pub fn shortfall(&self) -> u32 {
        self.target.saturating_sub(self.reviews.len() as u32)
    }
}

pub struct Collector<S: ReviewSource> {
    source: S,
    paths: DataPaths,
    config: CollectorConfig,
}

impl<S: ReviewSource> Collector<S> {
    pub fn new(source: S, paths: DataPaths, config: CollectorConfig) -> Self {
        Self {
            source,
            paths,
            config,
        }
    }

    pub async fn collect_app(&self, app: &BankApp, min_count: u32) -> Result<CollectionOutcome> {
        tracing::info!(
            "Collecting reviews for {} ({}), target {}",
            app.name,
            app.app_id,
            min_count
        );

        let paginator =
            ReviewPaginator::new(&self.source, self.config.max_retries, self.config.retry_delay);
        let fetched = paginator.fetch_at_least(&app.app_id, min_count).await?;

        let reviews: Vec<RawReview> = fetched
            .reviews
            .into_iter()
            .map(|r| to_raw_review(r, app, self.source.name()))
            .collect();

        let outcome = CollectionOutcome {
            reviews,
            target: min_count,
            exhausted: fetched.exhausted || fetched.interrupted,
        };

        if outcome.shortfall() > 0 {
            tracing::warn!(
                "Source exhausted for {}: collected {} of {} reviews",
                app.name,
                outcome.reviews.len(),
                min_count
            );
        } else {
            tracing::info!("Collected {} reviews for {}", outcome.reviews.len(), app.name);
        }

        Ok(outcome)
    }

    /// Fetch the store listing of each app. A listing that cannot be fetched
    /// is logged and left out; it never stops review collection.
    pub async fn collect_app_info(&self, apps: &[BankApp]) -> Vec<AppInfo> {
        let mut infos = Vec::new();

        for app in apps {
            match self.source.fetch_app_details(&app.app_id).await {
                Ok(details) => {
                    tracing::info!(
                        "{}: rating {:?}, {} ratings, installs {}",
                        details.title,
                        details.score,
                        details.ratings,
                        details.installs.as_deref().unwrap_or("unknown")
                    );
                    infos.push(AppInfo {
                        app_id: app.app_id.clone(),
                        bank_code: app.code,
                        bank_name: app.name.clone(),
                        title: details.title,
                        score: details.score,
                        ratings: details.ratings,
                        reviews: details.reviews,
                        installs: details.installs,
                    });
                }
                Err(e) => tracing::warn!("No listing details for {}: {}", app.app_id, e),
            }
        }

        infos
    }

    /// Collect every app in order, writing one raw export per app plus
    /// `app_info.csv` with the listings that could be fetched.
    pub async fn collect_all(&self, apps: &[BankApp]) -> Result<CollectionReport> {
        std::fs::create_dir_all(&self.paths.raw_dir)?;

        let mut report = CollectionReport {
            app_info: self.collect_app_info(apps).await,
            ..Default::default()
        };
        if !report.app_info.is_empty() {
            let path = self.paths.app_info();
            write_app_info(&path, &report.app_info)?;
            tracing::info!("App info written to {}", path.display());
        }

        let pb = ProgressBar::new(apps.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} apps")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for (i, app) in apps.iter().enumerate() {
            if i > 0 && !self.config.request_delay.is_zero() {
                sleep(self.config.request_delay).await;
            }

            let outcome = match self.collect_app(app, self.config.reviews_per_bank).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    pb.abandon_with_message("Collection aborted");
                    return Err(e);
                }
            };

            let path = self.paths.raw_reviews(app.code);
            write_raw_reviews(&path, &outcome.reviews)?;
            tracing::info!("Raw reviews written to {}", path.display());

            report.apps.push(AppCollection {
                bank_code: Some(app.code),
                app_id: app.app_id.clone(),
                target: outcome.target,
                collected: outcome.reviews.len() as u32,
                exhausted: outcome.exhausted,
                output_path: Some(path.display().to_string()),
            });

            pb.inc(1);
        }

        pb.finish_with_message("Collection complete");
        tracing::info!("Total reviews collected: {}", report.total_collected());

        Ok(report)
    }

}

fn to_raw_review(review: StoreReview, app: &BankApp, source: &str) -> RawReview {
    let source = if source.is_empty() {
        DEFAULT_SOURCE
    } else {
        source
    };

    RawReview {
        review_id: review.review_id,
        review_text: review.content.unwrap_or_default(),
        rating: review.score,
        review_date: review.at.map(|at| at.to_rfc3339()).unwrap_or_default(),
        app_id: app.app_id.clone(),
        bank_code: app.code,
        bank_name: app.name.clone(),
        user_name: review.user_name,
        thumbs_up: Some(review.thumbs_up),
        app_version: review.app_version,
        reply_content: review.reply_content,
        source: source.to_string(),
    }
}
