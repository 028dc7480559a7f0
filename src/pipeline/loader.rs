use std::collections::BTreeMap;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::models::{BankApp, BankCode, CleanedReview, LoadReport};
use crate::storage::files::read_cleaned_reviews;
use crate::storage::Storage;

pub struct Loader<'a> {
    storage: &'a Storage,
    apps: Vec<BankApp>,
    config: LoaderConfig,
}

impl<'a> Loader<'a> {
    pub fn new(storage: &'a Storage, apps: &[BankApp], config: LoaderConfig) -> Self {
        Self {
            storage,
            apps: apps.to_vec(),
            config,
        }
    }

    /// Load a cleaned CSV; rows that fail to parse count as failed inserts.
    pub fn load_file(&self, path: &Path) -> Result<LoadReport> {
        let records = read_cleaned_reviews(path)?;
        tracing::info!("Read {} cleaned rows from {}", records.len(), path.display());

        let mut reviews = Vec::with_capacity(records.len());
        let mut unreadable = 0;
        for (line, record) in records.into_iter().enumerate() {
            match record {
                Ok(review) => reviews.push(review),
                Err(e) => {
                    tracing::warn!("Skipping unreadable row {}: {}", line + 2, e);
                    unreadable += 1;
                }
            }
        }

        let mut report = self.load(&reviews)?;
        report.attempted += unreadable;
        report.failed += unreadable;
        log_report(&report);
        Ok(report)
    }

    pub fn load(&self, reviews: &[CleanedReview]) -> Result<LoadReport> {
        let bank_ids = self.storage.seed_banks(&self.apps)?;
        let mut report = LoadReport::default();

        let mut by_bank: BTreeMap<BankCode, Vec<&CleanedReview>> = BTreeMap::new();
        for review in reviews {
            by_bank.entry(review.bank_code).or_default().push(review);
        }

        let pb = ProgressBar::new(reviews.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for (code, rows) in by_bank {
            let bank_name = self
                .apps
                .iter()
                .find(|a| a.code == code)
                .map(|a| a.name.as_str())
                .unwrap_or_else(|| code.bank_name());

            let Some(&bank_id) = bank_ids.get(bank_name) else {
                tracing::warn!("No bank row for {}, skipping {} reviews", bank_name, rows.len());
                report.attempted += rows.len();
                report.failed += rows.len();
                pb.inc(rows.len() as u64);
                continue;
            };

            // Row-count reconciliation instead of a uniqueness constraint.
            // Rows the schema would reject never count towards a complete load.
            let expected = rows.iter().filter(|r| is_storable(r)).count();
            let existing = self.storage.count_reviews(bank_id)?;
            if existing >= expected && existing > 0 {
                tracing::info!(
                    "{} already holds {} reviews ({} storable of {} in dataset), skipping",
                    bank_name,
                    existing,
                    expected,
                    rows.len()
                );
                report.skipped_existing += rows.len();
                pb.inc(rows.len() as u64);
                continue;
            }
            if existing > 0 {
                let deleted = self.storage.delete_reviews(bank_id)?;
                tracing::info!(
                    "{} holds a partial load ({} of {}), reloading",
                    bank_name,
                    deleted,
                    expected
                );
            }

            let mut inserted_for_bank = 0;
            for batch in rows.chunks(self.config.batch_size.max(1)) {
                let (inserted, failed) = self.insert_batch(bank_id, batch)?;
                report.attempted += batch.len();
                report.inserted += inserted;
                report.failed += failed;
                inserted_for_bank += inserted;
                pb.inc(batch.len() as u64);
            }

            report.per_bank.insert(code, inserted_for_bank);

            let stored = self.storage.count_reviews(bank_id)?;
            if stored != inserted_for_bank {
                tracing::warn!(
                    "Row count mismatch for {}: {} inserted, {} stored",
                    bank_name,
                    inserted_for_bank,
                    stored
                );
            }
        }

        pb.finish_with_message("Load complete");
        Ok(report)
    }

    // One transaction per batch; constraint failures skip the row only.
    fn insert_batch(&self, bank_id: i64, batch: &[&CleanedReview]) -> Result<(usize, usize)> {
        self.storage.in_transaction(|storage| {
            let mut inserted = 0;
            let mut failed = 0;

            for review in batch {
                match storage.insert_review(bank_id, review) {
                    Ok(_) => inserted += 1,
                    Err(e) if e.is_constraint_violation() => {
                        tracing::debug!("Constraint violation for {}: {}", review.review_id, e);
                        failed += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            Ok((inserted, failed))
        })
    }
}

// Mirrors the CHECK constraints on the reviews table.
fn is_storable(review: &CleanedReview) -> bool {
    (1..=5).contains(&review.rating) && !review.review_text.trim().is_empty()
}

fn log_report(report: &LoadReport) {
    tracing::info!(
        "Inserted {} of {} attempted rows ({:.2}% success), {} failed, {} already loaded",
        report.inserted,
        report.attempted,
        report.success_rate() * 100.0,
        report.failed,
        report.skipped_existing
    );
}

/// Open the database and load `path` in one call, closing the connection after.
pub fn load_into_database(
    database: &Path,
    input: &Path,
    apps: &[BankApp],
    config: LoaderConfig,
) -> Result<LoadReport> {
    let storage = Storage::new(database).map_err(|e| {
        tracing::error!("Database unreachable at {}: {}", database.display(), e);
        e
    })?;

    let loader = Loader::new(&storage, apps, config);
    loader.load_file(input)
}
