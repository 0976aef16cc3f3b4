pub mod scanner;
pub mod scoring;
pub mod trends;
