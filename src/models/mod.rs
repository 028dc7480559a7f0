pub mod bank;
pub mod review;
pub mod report;
pub mod analysis;

pub use bank::*;
pub use review::*;
pub use report::*;
pub use analysis::*;
