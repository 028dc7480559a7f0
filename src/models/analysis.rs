use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSummary {
    pub bank_name: String,
    pub review_count: u32,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, u32>,
    pub sentiment_counts: BTreeMap<String, u32>,
    pub average_sentiment: Option<f64>,
    pub top_keywords: Vec<KeywordCount>,
}

impl BankSummary {
    /// Percentage of reviews with the given star rating.
    pub fn rating_share(&self, rating: u8) -> f64 {
        if self.review_count == 0 {
            return 0.0;
        }
        let count = self.rating_distribution.get(&rating).copied().unwrap_or(0);
        count as f64 / self.review_count as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyVolume {
    pub month: String,
    pub review_count: u32,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub total_reviews: u32,
    pub banks: Vec<BankSummary>,
    pub monthly: Vec<MonthlyVolume>,
}
