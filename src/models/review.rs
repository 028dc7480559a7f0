use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bank::BankCode;

pub const DEFAULT_SOURCE: &str = "Google Play";

/// A review as fetched from the store, before any validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawReview {
    pub review_id: String,
    pub review_text: String,
    pub rating: u8,
    pub review_date: String,
    pub app_id: String,
    pub bank_code: BankCode,
    pub bank_name: String,
    pub user_name: Option<String>,
    pub thumbs_up: Option<u32>,
    pub app_version: Option<String>,
    pub reply_content: Option<String>,
    pub source: String,
}

/// One line of a raw export as read back from disk.
///
/// Every column is optional text: exports may come from older runs or other
/// tools, so typing happens during validation rather than deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct RawRow {
    pub review_id: Option<String>,
    pub review_text: Option<String>,
    pub rating: Option<String>,
    pub review_date: Option<String>,
    pub app_id: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub user_name: Option<String>,
    pub thumbs_up: Option<String>,
    pub app_version: Option<String>,
    pub reply_content: Option<String>,
    pub source: Option<String>,
}

impl RawRow {
    /// Column names in export order, paired with their values.
    pub fn columns(&self) -> [(&'static str, &Option<String>); 12] {
        [
            ("review_id", &self.review_id),
            ("review_text", &self.review_text),
            ("rating", &self.rating),
            ("review_date", &self.review_date),
            ("app_id", &self.app_id),
            ("bank_code", &self.bank_code),
            ("bank_name", &self.bank_name),
            ("user_name", &self.user_name),
            ("thumbs_up", &self.thumbs_up),
            ("app_version", &self.app_version),
            ("reply_content", &self.reply_content),
            ("source", &self.source),
        ]
    }

    /// Names of the columns that are absent or blank.
    pub fn missing_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns()
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name)
    }
}

/// The first `per_bank` rows of each bank, banks in order of first appearance.
/// Rows are grouped by bank name, falling back to the app id.
pub fn samples_by_bank(rows: &[RawRow], per_bank: usize) -> Vec<(String, Vec<&RawRow>)> {
    let mut groups: Vec<(String, Vec<&RawRow>)> = Vec::new();

    for row in rows {
        let bank = [&row.bank_name, &row.app_id]
            .into_iter()
            .filter_map(|v| v.as_deref().map(str::trim))
            .find(|v| !v.is_empty())
            .unwrap_or("unknown")
            .to_string();

        match groups.iter_mut().find(|(name, _)| *name == bank) {
            Some((_, group)) => {
                if group.len() < per_bank {
                    group.push(row);
                }
            }
            None if per_bank > 0 => groups.push((bank, vec![row])),
            None => {}
        }
    }

    groups
}

impl From<&RawReview> for RawRow {
    fn from(review: &RawReview) -> Self {
        Self {
            review_id: Some(review.review_id.clone()),
            review_text: Some(review.review_text.clone()),
            rating: Some(review.rating.to_string()),
            review_date: Some(review.review_date.clone()),
            app_id: Some(review.app_id.clone()),
            bank_code: Some(review.bank_code.to_string()),
            bank_name: Some(review.bank_name.clone()),
            user_name: review.user_name.clone(),
            thumbs_up: review.thumbs_up.map(|t| t.to_string()),
            app_version: review.app_version.clone(),
            reply_content: review.reply_content.clone(),
            source: Some(review.source.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RatingBucket {
    Low,
    Medium,
    High,
}

impl RatingBucket {
    pub fn from_rating(rating: u8) -> Self {
        match rating {
            0..=2 => RatingBucket::Low,
            3 => RatingBucket::Medium,
            _ => RatingBucket::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingBucket::Low => "low",
            RatingBucket::Medium => "medium",
            RatingBucket::High => "high",
        }
    }
}

impl std::fmt::Display for RatingBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated, normalized review ready to be stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanedReview {
    pub review_id: String,
    pub review_text: String,
    pub normalized_text: String,
    pub rating: u8,
    pub rating_bucket: RatingBucket,
    pub review_date: NaiveDate,
    pub review_year: i32,
    pub review_month: u32,
    pub bank_code: BankCode,
    pub bank_name: String,
    pub app_id: String,
    pub user_name: String,
    pub thumbs_up: u32,
    pub app_version: Option<String>,
    /// Developer response, when the bank answered the review.
    #[serde(default)]
    pub reply_content: Option<String>,
    pub text_length: usize,
    pub source: String,
    #[serde(default)]
    pub sentiment_label: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

/// Row of the `reviews` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredReview {
    pub review_id: i64,
    pub bank_id: i64,
    pub review_text: String,
    pub rating: u8,
    pub review_date: NaiveDate,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_buckets() {
        assert_eq!(RatingBucket::from_rating(1), RatingBucket::Low);
        assert_eq!(RatingBucket::from_rating(2), RatingBucket::Low);
        assert_eq!(RatingBucket::from_rating(3), RatingBucket::Medium);
        assert_eq!(RatingBucket::from_rating(4), RatingBucket::High);
        assert_eq!(RatingBucket::from_rating(5).to_string(), "high");
    }

    #[test]
    fn test_missing_columns() {
        let row = RawRow {
            review_id: Some("gp:1".to_string()),
            review_text: Some("  ".to_string()),
            rating: Some("4".to_string()),
            review_date: Some("2024-01-15".to_string()),
            app_id: Some("com.cbe".to_string()),
            bank_code: Some("CBE".to_string()),
            bank_name: Some("Commercial Bank of Ethiopia".to_string()),
            source: Some("Google Play".to_string()),
            ..Default::default()
        };
        let missing: Vec<_> = row.missing_columns().collect();
        assert_eq!(
            missing,
            vec!["review_text", "user_name", "thumbs_up", "app_version", "reply_content"]
        );
    }

    #[test]
    fn test_samples_by_bank() {
        let row = |id: &str, bank: Option<&str>, app: &str| RawRow {
            review_id: Some(id.to_string()),
            bank_name: bank.map(|b| b.to_string()),
            app_id: Some(app.to_string()),
            ..Default::default()
        };
        let rows = vec![
            row("1", Some("Dashen Bank"), "com.dashen"),
            row("2", Some("Bank of Abyssinia"), "com.boa"),
            row("3", Some("Dashen Bank"), "com.dashen"),
            row("4", Some("Dashen Bank"), "com.dashen"),
            row("5", None, "com.example.wallet"),
        ];

        let samples = samples_by_bank(&rows, 2);
        let summary: Vec<_> = samples
            .iter()
            .map(|(bank, group)| {
                let ids: Vec<_> = group.iter().map(|r| r.review_id.as_deref().unwrap()).collect();
                (bank.as_str(), ids)
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Dashen Bank", vec!["1", "3"]),
                ("Bank of Abyssinia", vec!["2"]),
                ("com.example.wallet", vec!["5"]),
            ]
        );
        assert!(samples_by_bank(&rows, 0).is_empty());
    }
}
