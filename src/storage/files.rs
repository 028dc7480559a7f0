use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{AppInfo, CleanedReview, RawReview, RawRow};

pub fn write_raw_reviews(path: &Path, reviews: &[RawReview]) -> Result<()> {
    write_records(path, reviews)
}

pub fn write_app_info(path: &Path, apps: &[AppInfo]) -> Result<()> {
    write_records(path, apps)
}

pub fn write_cleaned_reviews(path: &Path, reviews: &[CleanedReview]) -> Result<()> {
    write_records(path, reviews)
}

/// A single CSV row: the record, or the error it failed to deserialize with.
pub type RowResult<T> = std::result::Result<T, csv::Error>;

/// Read every raw export in order and concatenate their rows. Rows that do
/// not deserialize (bad UTF-8, broken quoting) are returned as errors so the
/// caller can count them; only a missing or unopenable file is fatal.
pub fn read_raw_rows(paths: &[PathBuf]) -> Result<Vec<RowResult<RawRow>>> {
    let mut rows = Vec::new();
    for path in paths {
        let file_rows: Vec<RowResult<RawRow>> = read_records(path)?;
        let unreadable = file_rows.iter().filter(|r| r.is_err()).count();
        if unreadable > 0 {
            tracing::warn!("{} unreadable rows in {}", unreadable, path.display());
        }
        tracing::info!("Loaded {} rows from {}", file_rows.len(), path.display());
        rows.extend(file_rows);
    }
    Ok(rows)
}

/// Rows of a cleaned dataset; a row that does not deserialize is returned as
/// its error so the caller can count it.
pub fn read_cleaned_reviews(path: &Path) -> Result<Vec<RowResult<CleanedReview>>> {
    read_records(path)
}

/// Raw exports in `dir` named `reviews_*.csv`, sorted by file name.
pub fn discover_raw_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::MissingInput(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("reviews_") && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<RowResult<T>>> {
    if !path.exists() {
        return Err(Error::MissingInput(path.display().to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(File::open(path)?);

    Ok(reader.deserialize().collect())
}
