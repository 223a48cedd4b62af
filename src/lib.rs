pub mod apis;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod types;
