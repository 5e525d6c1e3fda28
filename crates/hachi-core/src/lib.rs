//! hachi-core: day planner, KPI goals and metric tracking
//!
//! This crate provides the storage layer and the two stateful cores of hachi:
//! the day-plan engine (one-shot carry-over of unfinished tasks) and the KPI
//! progress aggregator (monthly actual vs. target), plus the supporting
//! catalog, wins, references and metric sync plumbing.

pub mod config;
pub mod dayplan;
pub mod db;
pub mod error;
pub mod models;
pub mod period;
pub mod progress;
pub mod providers;
pub mod references;
pub mod wins;
pub mod report;
pub mod schema;
pub mod sync;

pub use config::Config;
pub use db::Database;
pub use error::Error;
pub use error::Result;
pub use period::Period;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "hachi";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "HACHI".to_string()
}
