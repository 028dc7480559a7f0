use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::models::{AnalysisReport, BankSummary, KeywordCount, MonthlyVolume, StoredReview};
use crate::storage::Storage;
use crate::text::TextCleaner;

pub struct Analyzer<'a> {
    storage: &'a Storage,
    cleaner: TextCleaner,
    top_keywords: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            cleaner: TextCleaner::new(),
            top_keywords: 10,
        }
    }

    pub fn with_top_keywords(mut self, n: usize) -> Self {
        self.top_keywords = n;
        self
    }

    pub fn analyze(&self) -> Result<AnalysisReport> {
        let mut banks = Vec::new();
        for bank in self.storage.list_banks()? {
            let reviews = self.storage.reviews_for_bank(bank.bank_id)?;
            tracing::debug!("Summarizing {} reviews for {}", reviews.len(), bank.bank_name);
            banks.push(self.summarize_bank(&bank.bank_name, &reviews));
        }

        let monthly = self
            .storage
            .monthly_volume()?
            .into_iter()
            .map(|(month, review_count, average_rating)| MonthlyVolume {
                month,
                review_count,
                average_rating,
            })
            .collect();

        Ok(AnalysisReport {
            total_reviews: banks.iter().map(|b| b.review_count).sum(),
            banks,
            monthly,
        })
    }

    pub fn summarize_bank(&self, bank_name: &str, reviews: &[StoredReview]) -> BankSummary {
        let review_count = reviews.len() as u32;

        let mut rating_distribution: BTreeMap<u8, u32> = (1..=5).map(|r| (r, 0)).collect();
        for review in reviews {
            *rating_distribution.entry(review.rating).or_insert(0) += 1;
        }

        let average_rating = if reviews.is_empty() {
            0.0
        } else {
            reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64
        };

        let mut sentiment_counts: BTreeMap<String, u32> = BTreeMap::new();
        for label in reviews.iter().filter_map(|r| r.sentiment_label.as_deref()) {
            *sentiment_counts.entry(label.to_lowercase()).or_insert(0) += 1;
        }

        let scores: Vec<f64> = reviews.iter().filter_map(|r| r.sentiment_score).collect();
        let average_sentiment = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        BankSummary {
            bank_name: bank_name.to_string(),
            review_count,
            average_rating,
            rating_distribution,
            sentiment_counts,
            average_sentiment,
            top_keywords: self.keyword_counts(reviews),
        }
    }

    fn keyword_counts(&self, reviews: &[StoredReview]) -> Vec<KeywordCount> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for review in reviews {
            for word in self.cleaner.keywords(&review.review_text) {
                *counts.entry(word).or_insert(0) += 1;
            }
        }

        let mut keywords: Vec<KeywordCount> = counts
            .into_iter()
            .map(|(word, count)| KeywordCount { word, count })
            .collect();

        // Ties broken alphabetically so output is stable
        keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        keywords.truncate(self.top_keywords);
        keywords
    }
}
