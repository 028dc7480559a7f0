use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::models::{Bank, BankApp, CleanedReview, StoredReview};

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS banks (
                bank_id INTEGER PRIMARY KEY,
                bank_name TEXT UNIQUE NOT NULL,
                app_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                review_id INTEGER PRIMARY KEY,
                bank_id INTEGER NOT NULL REFERENCES banks(bank_id),
                review_text TEXT NOT NULL CHECK (length(trim(review_text)) > 0),
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                review_date TEXT NOT NULL,
                sentiment_label TEXT,
                sentiment_score REAL,
                source TEXT NOT NULL DEFAULT 'Google Play'
            );

            CREATE INDEX IF NOT EXISTS idx_reviews_bank_id ON reviews(bank_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_review_date ON reviews(review_date);
            CREATE INDEX IF NOT EXISTS idx_reviews_rating ON reviews(rating);
            CREATE INDEX IF NOT EXISTS idx_reviews_sentiment_score ON reviews(sentiment_score);
            "#,
        )?;

        Ok(())
    }

    /// Insert the tracked banks if absent and return name -> bank_id.
    pub fn seed_banks(&self, apps: &[BankApp]) -> Result<HashMap<String, i64>> {
        for app in apps {
            self.conn.execute(
                "INSERT OR IGNORE INTO banks (bank_name, app_name) VALUES (?1, ?2)",
                params![app.name, app.app_id],
            )?;
        }

        let banks = self.list_banks()?;
        Ok(banks.into_iter().map(|b| (b.bank_name, b.bank_id)).collect())
    }

    pub fn list_banks(&self) -> Result<Vec<Bank>> {
        let mut stmt = self
            .conn
            .prepare("SELECT bank_id, bank_name, app_name FROM banks ORDER BY bank_id")?;

        let banks = stmt.query_map([], |row| {
            Ok(Bank {
                bank_id: row.get(0)?,
                bank_name: row.get(1)?,
                app_name: row.get(2)?,
            })
        })?;

        banks.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn insert_review(&self, bank_id: i64, review: &CleanedReview) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO reviews (bank_id, review_text, rating, review_date, sentiment_label, sentiment_score, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                bank_id,
                review.review_text,
                review.rating,
                review.review_date.format("%Y-%m-%d").to_string(),
                review.sentiment_label,
                review.sentiment_score,
                review.source,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back on `Err`.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn count_reviews(&self, bank_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE bank_id = ?1",
            params![bank_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn total_reviews(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn delete_reviews(&self, bank_id: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM reviews WHERE bank_id = ?1", params![bank_id])?;
        Ok(deleted)
    }

    pub fn reviews_for_bank(&self, bank_id: i64) -> Result<Vec<StoredReview>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT review_id, bank_id, review_text, rating, review_date,
                   sentiment_label, sentiment_score, source
            FROM reviews
            WHERE bank_id = ?1
            ORDER BY review_date DESC, review_id
            "#,
        )?;

        let reviews = stmt.query_map(params![bank_id], |row| {
            let date_str: String = row.get(4)?;
            let review_date = chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;

            Ok(StoredReview {
                review_id: row.get(0)?,
                bank_id: row.get(1)?,
                review_text: row.get(2)?,
                rating: row.get(3)?,
                review_date,
                sentiment_label: row.get(5)?,
                sentiment_score: row.get(6)?,
                source: row.get(7)?,
            })
        })?;

        reviews.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// (YYYY-MM, review count, average rating) across all banks.
    pub fn monthly_volume(&self) -> Result<Vec<(String, u32, f64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT substr(review_date, 1, 7) AS month, COUNT(*), AVG(rating)
            FROM reviews
            GROUP BY month
            ORDER BY month
            "#,
        )?;

        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankCode, RatingBucket};
    use chrono::NaiveDate;

    fn review(text: &str, rating: u8) -> CleanedReview {
        CleanedReview {
            review_id: format!("r-{}", text.len()),
            review_text: text.to_string(),
            normalized_text: text.to_lowercase(),
            rating,
            rating_bucket: RatingBucket::from_rating(rating),
            review_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            review_year: 2024,
            review_month: 1,
            bank_code: BankCode::Cbe,
            bank_name: "Commercial Bank of Ethiopia".to_string(),
            app_id: "com.cbe".to_string(),
            user_name: "Anonymous".to_string(),
            thumbs_up: 0,
            app_version: None,
            reply_content: None,
            text_length: text.chars().count(),
            source: "Google Play".to_string(),
            sentiment_label: None,
            sentiment_score: None,
        }
    }

    #[test]
    fn test_seed_banks_is_idempotent() {
        let storage = Storage::in_memory().unwrap();
        let apps = vec![
            BankApp::new(BankCode::Cbe, "com.cbe"),
            BankApp::new(BankCode::Boa, "com.boa"),
        ];
        let first = storage.seed_banks(&apps).unwrap();
        let second = storage.seed_banks(&apps).unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.list_banks().unwrap().len(), 2);
        assert!(first.contains_key("Bank of Abyssinia"));
        assert!(!first.contains_key("Dashen Bank"));
    }

    #[test]
    fn test_insert_and_read_back() {
        let storage = Storage::in_memory().unwrap();
        let ids = storage
            .seed_banks(&[BankApp::new(BankCode::Cbe, "com.cbe")])
            .unwrap();
        let bank_id = ids["Commercial Bank of Ethiopia"];

        storage.insert_review(bank_id, &review("Great app!", 5)).unwrap();
        let stored = storage.reviews_for_bank(bank_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rating, 5);
        assert_eq!(stored[0].review_date.to_string(), "2024-01-15");
        assert_eq!(storage.count_reviews(bank_id).unwrap(), 1);
    }

    #[test]
    fn test_constraints_reject_bad_rows() {
        let storage = Storage::in_memory().unwrap();
        let ids = storage
            .seed_banks(&[BankApp::new(BankCode::Cbe, "com.cbe")])
            .unwrap();
        let bank_id = ids["Commercial Bank of Ethiopia"];

        let err = storage.insert_review(bank_id, &review("   ", 4)).unwrap_err();
        assert!(err.is_constraint_violation());

        let err = storage.insert_review(bank_id, &review("Bad", 9)).unwrap_err();
        assert!(err.is_constraint_violation());

        let err = storage.insert_review(999, &review("Orphan", 3)).unwrap_err();
        assert!(err.is_constraint_violation());

        assert_eq!(storage.total_reviews().unwrap(), 0);
    }
}
