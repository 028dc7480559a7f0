use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bank::{AppInfo, BankCode};

/// Why a raw row did not make it into the cleaned dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Unreadable,
    Duplicate,
    MissingField,
    InvalidDate,
    InvalidRating,
    UnknownEntity,
    EmptyText,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Unreadable => "unreadable",
            DropReason::Duplicate => "duplicate",
            DropReason::MissingField => "missing_field",
            DropReason::InvalidDate => "invalid_date",
            DropReason::InvalidRating => "invalid_rating",
            DropReason::UnknownEntity => "unknown_entity",
            DropReason::EmptyText => "empty_text",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppCollection {
    pub bank_code: Option<BankCode>,
    pub app_id: String,
    pub target: u32,
    pub collected: u32,
    pub exhausted: bool,
    pub output_path: Option<String>,
}

impl AppCollection {
    pub fn shortfall(&self) -> u32 {
        self.target.saturating_sub(self.collected)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionReport {
    pub apps: Vec<AppCollection>,
    /// Store listing details, for the apps whose listing could be fetched.
    pub app_info: Vec<AppInfo>,
}

impl CollectionReport {
    pub fn total_collected(&self) -> u32 {
        self.apps.iter().map(|a| a.collected).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Absent or blank values per raw column, counted before any row is dropped.
    pub missing_by_column: BTreeMap<String, usize>,
    pub per_bank: BTreeMap<BankCode, usize>,
    pub rating_distribution: BTreeMap<u8, usize>,
    pub mean_text_length: f64,
    pub median_text_length: f64,
    pub output_path: Option<String>,
}

impl PreprocessReport {
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn missing_for(&self, column: &str) -> usize {
        self.missing_by_column.get(column).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    /// Share of input rows kept, in percent.
    pub fn retention_rate(&self) -> f64 {
        if self.input_rows == 0 {
            return 0.0;
        }
        self.output_rows as f64 / self.input_rows as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
    pub skipped_existing: usize,
    pub per_bank: BTreeMap<BankCode, usize>,
}

impl LoadReport {
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.inserted as f64 / self.attempted as f64
    }
}
