use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::models::{
    BankApp, CleanedReview, DropReason, PreprocessReport, RatingBucket, RawRow, DEFAULT_SOURCE,
};
use crate::registry::BankRegistry;
use crate::storage::files::{read_raw_rows, write_cleaned_reviews, RowResult};
use crate::text::TextCleaner;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const CRITICAL_COLUMNS: [&str; 3] = ["review_text", "rating", "bank_code"];

pub struct Preprocessor {
    registry: BankRegistry,
    cleaner: TextCleaner,
}

impl Preprocessor {
    pub fn new(apps: &[BankApp]) -> Self {
        Self {
            registry: BankRegistry::new(apps),
            cleaner: TextCleaner::new(),
        }
    }

    /// Load raw exports, clean them and write the processed dataset.
    pub fn process_files(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<(Vec<CleanedReview>, PreprocessReport)> {
        let records = read_raw_rows(inputs)?;
        tracing::info!("Loaded {} raw rows from {} files", records.len(), inputs.len());

        let (cleaned, mut report) = self.process_records(records);

        write_cleaned_reviews(output, &cleaned)?;
        report.output_path = Some(output.display().to_string());
        tracing::info!("Processed data saved to {}", output.display());

        Ok((cleaned, report))
    }

    /// Clean rows in memory. Deterministic for a given input.
    pub fn process(&self, rows: Vec<RawRow>) -> (Vec<CleanedReview>, PreprocessReport) {
        self.process_records(rows.into_iter().map(Ok).collect())
    }

    /// Like [`process`](Self::process), but rows that failed to deserialize
    /// are dropped as `unreadable` instead of aborting the run.
    pub fn process_records(
        &self,
        records: Vec<RowResult<RawRow>>,
    ) -> (Vec<CleanedReview>, PreprocessReport) {
        let mut report = PreprocessReport {
            input_rows: records.len(),
            ..Default::default()
        };

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!("Dropping unreadable raw row: {}", e);
                    report.record_drop(DropReason::Unreadable);
                }
            }
        }

        for row in &rows {
            for column in row.missing_columns() {
                *report.missing_by_column.entry(column.to_string()).or_insert(0) += 1;
            }
        }

        // Step 1: exact duplicates
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(rows.len());
        for row in rows {
            if seen.insert(row.clone()) {
                unique.push(row);
            } else {
                report.record_drop(DropReason::Duplicate);
            }
        }

        // Steps 2-7: row-level validation and derivation
        let mut cleaned = Vec::with_capacity(unique.len());
        for row in &unique {
            match self.clean_row(row) {
                Ok(review) => cleaned.push(review),
                Err(reason) => {
                    if reason == DropReason::UnknownEntity {
                        tracing::warn!(
                            "Dropping review {} for unknown app {:?} / bank {:?}",
                            row.review_id.as_deref().unwrap_or("<none>"),
                            row.app_id,
                            row.bank_code
                        );
                    } else {
                        tracing::debug!(
                            "Dropping review {}: {}",
                            row.review_id.as_deref().unwrap_or("<none>"),
                            reason
                        );
                    }
                    report.record_drop(reason);
                }
            }
        }

        // Step 8: stable output order
        cleaned.sort_by(|a, b| {
            a.bank_code
                .cmp(&b.bank_code)
                .then_with(|| b.review_date.cmp(&a.review_date))
                .then_with(|| a.review_id.cmp(&b.review_id))
                .then_with(|| a.review_text.cmp(&b.review_text))
        });

        summarize(&cleaned, &mut report);
        log_report(&report);

        (cleaned, report)
    }

    pub fn clean_row(&self, row: &RawRow) -> std::result::Result<CleanedReview, DropReason> {
        let raw_text = row
            .review_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(DropReason::MissingField)?;
        let raw_rating = non_empty(&row.rating).ok_or(DropReason::MissingField)?;

        let review_date = non_empty(&row.review_date)
            .and_then(parse_review_date)
            .ok_or(DropReason::InvalidDate)?;

        let rating = parse_rating(raw_rating).ok_or(DropReason::InvalidRating)?;

        let app = self.resolve_bank(row).ok_or(DropReason::UnknownEntity)?;

        let review_text = self.cleaner.clean(raw_text);
        if review_text.is_empty() {
            return Err(DropReason::EmptyText);
        }
        let normalized_text = self.cleaner.normalize(&review_text);
        let text_length = review_text.chars().count();

        Ok(CleanedReview {
            review_id: non_empty(&row.review_id).unwrap_or_default().to_string(),
            normalized_text,
            rating,
            rating_bucket: RatingBucket::from_rating(rating),
            review_date,
            review_year: review_date.year(),
            review_month: review_date.month(),
            bank_code: app.code,
            bank_name: app.name.clone(),
            app_id: app.app_id.clone(),
            user_name: non_empty(&row.user_name).unwrap_or("Anonymous").to_string(),
            thumbs_up: non_empty(&row.thumbs_up)
                .and_then(|t| t.parse::<f64>().ok())
                .filter(|t| t.is_finite() && *t >= 0.0)
                .map(|t| t as u32)
                .unwrap_or(0),
            app_version: non_empty(&row.app_version).map(|v| v.to_string()),
            reply_content: non_empty(&row.reply_content).map(|v| self.cleaner.clean(v)),
            text_length,
            source: non_empty(&row.source).unwrap_or(DEFAULT_SOURCE).to_string(),
            review_text,
            sentiment_label: None,
            sentiment_score: None,
        })
    }

    // Store identifier first; the code column covers exports without one.
    fn resolve_bank(&self, row: &RawRow) -> Option<&BankApp> {
        match non_empty(&row.app_id) {
            Some(app_id) => self.registry.resolve_app_id(app_id),
            None => non_empty(&row.bank_code)
                .or_else(|| non_empty(&row.bank_name))
                .and_then(|code| self.registry.resolve(code)),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_review_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Integer star rating in 1..=5. Whole-valued floats such as "4.0" count.
pub fn parse_rating(value: &str) -> Option<u8> {
    let value = value.trim();
    let rating = match value.parse::<i64>() {
        Ok(r) => r,
        Err(_) => {
            let f = value.parse::<f64>().ok()?;
            if !f.is_finite() || f.fract() != 0.0 {
                return None;
            }
            f as i64
        }
    };

    (1..=5).contains(&rating).then_some(rating as u8)
}

fn summarize(cleaned: &[CleanedReview], report: &mut PreprocessReport) {
    report.output_rows = cleaned.len();

    for review in cleaned {
        *report.per_bank.entry(review.bank_code).or_insert(0) += 1;
        *report.rating_distribution.entry(review.rating).or_insert(0) += 1;
    }

    if cleaned.is_empty() {
        return;
    }

    let mut lengths: Vec<usize> = cleaned.iter().map(|r| r.text_length).collect();
    lengths.sort_unstable();
    report.mean_text_length = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;

    let mid = lengths.len() / 2;
    report.median_text_length = if lengths.len() % 2 == 0 {
        (lengths[mid - 1] + lengths[mid]) as f64 / 2.0
    } else {
        lengths[mid] as f64
    };
}

fn log_report(report: &PreprocessReport) {
    tracing::info!(
        "Preprocessing kept {} of {} rows ({:.2}% retained)",
        report.output_rows,
        report.input_rows,
        report.retention_rate()
    );
    for column in CRITICAL_COLUMNS {
        let missing = report.missing_for(column);
        if missing > 0 {
            tracing::warn!("  missing {}: {} rows", column, missing);
        }
    }
    for (reason, count) in &report.dropped {
        tracing::info!("  dropped {}: {}", reason, count);
    }
    for (bank, count) in &report.per_bank {
        tracing::info!("  {}: {} reviews", bank, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BankCode;

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(&[
            BankApp::new(BankCode::Cbe, "com.cbe"),
            BankApp::new(BankCode::Boa, "com.boa"),
            BankApp::new(BankCode::Dashen, "com.dashen"),
        ])
    }

    fn row(text: &str, rating: &str, date: &str, app: &str) -> RawRow {
        RawRow {
            review_id: Some(format!("{}-{}", app, text.len())),
            review_text: Some(text.to_string()),
            rating: Some(rating.to_string()),
            review_date: Some(date.to_string()),
            app_id: Some(app.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_row_example() {
        let review = preprocessor()
            .clean_row(&row("Great app!", "5", "2024-01-15", "com.cbe"))
            .unwrap();

        assert_eq!(review.bank_name, "Commercial Bank of Ethiopia");
        assert_eq!(review.bank_code, BankCode::Cbe);
        assert_eq!(review.rating_bucket, RatingBucket::High);
        assert_eq!(review.text_length, 10);
        assert_eq!(review.normalized_text, "great app!");
        assert_eq!(review.review_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(review.user_name, "Anonymous");
        assert_eq!(review.source, "Google Play");
    }

    #[test]
    fn test_out_of_range_rating_dropped() {
        let p = preprocessor();
        assert_eq!(
            p.clean_row(&row("Great app!", "7", "2024-01-15", "com.cbe")),
            Err(DropReason::InvalidRating)
        );

        let (cleaned, report) = p.process(vec![row("Great app!", "7", "2024-01-15", "com.cbe")]);
        assert!(cleaned.is_empty());
        assert_eq!(report.dropped_for(DropReason::InvalidRating), 1);
        assert_eq!(DropReason::InvalidRating.as_str(), "invalid_rating");
    }

    #[test]
    fn test_drop_reasons() {
        let p = preprocessor();
        let mut missing_text = row("x", "4", "2024-01-15", "com.cbe");
        missing_text.review_text = None;

        let rows = vec![
            row("Fine", "4", "2024-01-15", "com.cbe"),
            row("Fine", "4", "2024-01-15", "com.cbe"),
            missing_text,
            row("No rating", "", "2024-01-15", "com.boa"),
            row("Bad date", "3", "15th of never", "com.boa"),
            row("Half star", "4.5", "2024-01-15", "com.boa"),
            row("Other bank", "4", "2024-01-15", "com.awash"),
            row("   \n ", "4", "2024-01-15", "com.dashen"),
        ];

        let (cleaned, report) = p.process(rows);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(report.input_rows, 8);
        assert_eq!(report.output_rows, 1);
        assert_eq!(report.dropped_for(DropReason::Duplicate), 1);
        assert_eq!(report.dropped_for(DropReason::MissingField), 2);
        assert_eq!(report.dropped_for(DropReason::EmptyText), 1);
        assert_eq!(report.dropped_for(DropReason::InvalidDate), 1);
        assert_eq!(report.dropped_for(DropReason::InvalidRating), 1);
        assert_eq!(report.dropped_for(DropReason::UnknownEntity), 1);
        assert_eq!(report.total_dropped() + report.output_rows, report.input_rows);
    }

    #[test]
    fn test_missing_values_counted_per_column() {
        let mut no_rating = row("Fine", "4", "2024-01-15", "com.cbe");
        no_rating.rating = None;
        let (_, report) = preprocessor().process(vec![
            row("Fine", "4", "2024-01-15", "com.cbe"),
            no_rating,
        ]);

        assert_eq!(report.missing_for("rating"), 1);
        assert_eq!(report.missing_for("user_name"), 2);
        assert_eq!(report.missing_for("review_text"), 0);
    }

    #[test]
    fn test_unreadable_raw_row_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reviews_cbe.csv");
        let output = dir.path().join("processed").join("reviews_processed.csv");

        let mut contents = b"review_id,review_text,rating,review_date,app_id\n".to_vec();
        contents.extend_from_slice(b"gp:1,Great app!,5,2024-01-15,com.cbe\n");
        contents.extend_from_slice(b"gp:2,\xff\xfex,4,2024-01-16,com.cbe\n");
        contents.extend_from_slice(b"gp:3,Slow login,2,2024-01-17,com.cbe\n");
        std::fs::write(&input, contents).unwrap();

        let (cleaned, report) = preprocessor().process_files(&[input], &output).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(report.input_rows, 3);
        assert_eq!(report.dropped_for(DropReason::Unreadable), 1);
        assert_eq!(report.total_dropped() + report.output_rows, report.input_rows);
        assert!(output.exists());
    }

    #[test]
    fn test_reply_content_carried_through() {
        let mut r = row("Card blocked", "1", "2024-01-15", "com.cbe");
        r.reply_content = Some("  Please visit   a branch ".to_string());
        let review = preprocessor().clean_row(&r).unwrap();
        assert_eq!(review.reply_content.as_deref(), Some("Please visit a branch"));
    }

    #[test]
    fn test_whitespace_only_text_after_cleaning() {
        // non-breaking and em spaces clean down to nothing
        let p = preprocessor();
        let r = row("\u{a0}\u{2003}", "4", "2024-01-15", "com.dashen");
        assert_eq!(p.clean_row(&r), Err(DropReason::EmptyText));
    }

    #[test]
    fn test_bank_code_fallback() {
        let p = preprocessor();
        let r = RawRow {
            review_text: Some("Works".to_string()),
            rating: Some("4".to_string()),
            review_date: Some("2024-03-02".to_string()),
            bank_code: Some("Dashen".to_string()),
            ..Default::default()
        };
        assert_eq!(p.clean_row(&r).unwrap().bank_code, BankCode::Dashen);
    }

    #[test]
    fn test_processing_is_idempotent() {
        let p = preprocessor();
        let rows = vec![
            row("Slow", "2", "2024-02-01 10:00:00", "com.boa"),
            row("Great app!", "5", "2024-01-15T09:30:00+03:00", "com.cbe"),
            row("Okay", "3", "2024/01/20", "com.cbe"),
            row("Okay", "3", "2024/01/20", "com.cbe"),
            row("Love it", "5.0", "2024-03-01", "com.dashen"),
        ];

        let (first, first_report) = p.process(rows.clone());
        let (second, second_report) = p.process(rows);
        assert_eq!(first, second);
        assert_eq!(first_report.dropped, second_report.dropped);

        let codes: Vec<_> = first.iter().map(|r| r.bank_code).collect();
        assert_eq!(codes, vec![BankCode::Boa, BankCode::Cbe, BankCode::Cbe, BankCode::Dashen]);
        // newest first within a bank
        assert_eq!(first[1].review_date.to_string(), "2024-01-20");
    }

    #[test]
    fn test_cleaned_rows_satisfy_invariants() {
        let p = preprocessor();
        let rows = vec![
            row("a", "0", "2024-01-01", "com.cbe"),
            row("b", "1", "2024-02-30", "com.cbe"),
            row("c", "5", "2024-02-29", "com.cbe"),
            row("d", "-3", "2024-01-01", "com.boa"),
            row("e", "3", "2023-12-31T23:59:59Z", "com.boa"),
        ];
        let (cleaned, _) = p.process(rows);
        assert_eq!(cleaned.len(), 2);
        for review in &cleaned {
            assert!((1..=5).contains(&review.rating));
            assert!(!review.review_text.is_empty());
            assert!(NaiveDate::parse_from_str(&review.review_date.to_string(), "%Y-%m-%d").is_ok());
        }
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("5"), Some(5));
        assert_eq!(parse_rating(" 1 "), Some(1));
        assert_eq!(parse_rating("4.0"), Some(4));
        assert_eq!(parse_rating("4.5"), None);
        assert_eq!(parse_rating("abc"), None);
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("NaN"), None);
    }

    #[test]
    fn test_parse_review_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_review_date("2024-01-15"), expected);
        assert_eq!(parse_review_date("2024/01/15"), expected);
        assert_eq!(parse_review_date("2024-01-15 08:30:00"), expected);
        assert_eq!(parse_review_date("2024-01-15T08:30:00.123"), expected);
        assert_eq!(parse_review_date("2024-01-15T08:30:00+00:00"), expected);
        assert_eq!(parse_review_date("01/15/2024"), None);
        assert_eq!(parse_review_date(""), None);
    }
}
