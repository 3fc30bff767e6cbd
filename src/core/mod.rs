pub mod engine;
pub mod insights;
pub mod ranking;
pub mod scorer;
pub mod types;
