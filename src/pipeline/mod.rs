pub mod collector;
pub mod preprocessor;
pub mod loader;

pub use collector::{CollectionOutcome, Collector};
pub use preprocessor::Preprocessor;
pub use loader::{load_into_database, Loader};
