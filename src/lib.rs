pub mod config;
pub mod error;
pub mod models;
pub mod playstore;
pub mod registry;
pub mod text;
pub mod pipeline;
pub mod analysis;
pub mod storage;

pub use config::{CollectorConfig, Config, DataPaths, LoaderConfig};
pub use error::{Error, Result};
pub use playstore::{PlayStoreClient, ReviewSource};
pub use pipeline::{Collector, Loader, Preprocessor};
pub use analysis::Analyzer;
pub use registry::BankRegistry;
pub use storage::Storage;
