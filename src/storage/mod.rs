pub mod files;
pub mod sqlite;

pub use sqlite::Storage;
