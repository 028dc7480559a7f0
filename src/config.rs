use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{BankApp, BankCode};

#[derive(Debug, Clone)]
pub struct Config {
    pub apps: Vec<BankApp>,
    pub reviews_per_bank: u32,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub request_delay_secs: u64,
    pub lang: String,
    pub country: String,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub load_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apps: BankCode::ALL
                .iter()
                .map(|code| BankApp::new(*code, code.default_app_id()))
                .collect(),
            reviews_per_bank: 450,
            max_retries: 3,
            retry_delay_secs: 5,
            request_delay_secs: 2,
            lang: "en".to_string(),
            country: "et".to_string(),
            data_dir: PathBuf::from("data"),
            database_path: PathBuf::from("data/bank_reviews.db"),
            load_batch_size: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let apps = BankCode::ALL
            .iter()
            .map(|code| {
                let app_id = env::var(code.app_id_var())
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| code.default_app_id().to_string());
                BankApp::new(*code, app_id)
            })
            .collect();

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("bank_reviews.db"));

        let config = Self {
            apps,
            reviews_per_bank: parse_var("REVIEWS_PER_BANK", defaults.reviews_per_bank)?,
            max_retries: parse_var("MAX_RETRIES", defaults.max_retries)?,
            retry_delay_secs: parse_var("RETRY_DELAY_SECS", defaults.retry_delay_secs)?,
            request_delay_secs: parse_var("REQUEST_DELAY_SECS", defaults.request_delay_secs)?,
            lang: env::var("REVIEW_LANG").unwrap_or(defaults.lang),
            country: env::var("REVIEW_COUNTRY").unwrap_or(defaults.country),
            data_dir,
            database_path,
            load_batch_size: parse_var("LOAD_BATCH_SIZE", defaults.load_batch_size)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reviews_per_bank == 0 {
            return Err(Error::Config("REVIEWS_PER_BANK must be at least 1".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("MAX_RETRIES must be at least 1".to_string()));
        }
        if self.load_batch_size == 0 {
            return Err(Error::Config("LOAD_BATCH_SIZE must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, value))),
        Err(_) => Ok(default),
    }
}

/// Canonical on-disk layout under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            raw_dir: data_dir.join("raw"),
            processed_dir: data_dir.join("processed"),
        }
    }

    pub fn raw_reviews(&self, code: BankCode) -> PathBuf {
        self.raw_dir
            .join(format!("reviews_{}.csv", code.as_str().to_lowercase()))
    }

    /// Listing details for every collected app.
    pub fn app_info(&self) -> PathBuf {
        self.raw_dir.join("app_info.csv")
    }

    pub fn processed_reviews(&self) -> PathBuf {
        self.processed_dir.join("reviews_processed.csv")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        std::fs::create_dir_all(&self.processed_dir)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub reviews_per_bank: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_delay: Duration,
}

impl From<&Config> for CollectorConfig {
    fn from(config: &Config) -> Self {
        Self {
            reviews_per_bank: config.reviews_per_bank,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            request_delay: Duration::from_secs(config.request_delay_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub batch_size: usize,
}

impl From<&Config> for LoaderConfig {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.load_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.apps.len(), 3);
        assert_eq!(config.apps[0].name, "Commercial Bank of Ethiopia");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = Config {
            load_batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::new(Path::new("data"));
        assert_eq!(paths.raw_reviews(BankCode::Dashen), PathBuf::from("data/raw/reviews_dashen.csv"));
        assert_eq!(
            paths.processed_reviews(),
            PathBuf::from("data/processed/reviews_processed.csv")
        );
        assert_eq!(paths.app_info(), PathBuf::from("data/raw/app_info.csv"));
    }
}
