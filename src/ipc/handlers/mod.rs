pub mod auth;
pub mod backup;
pub mod catalog;
pub mod core;
pub mod dashboard;
pub mod progress;
pub mod reading_log;
pub mod setup;
pub mod stats;
