pub mod report;
pub mod snapshot;
pub mod standards;
