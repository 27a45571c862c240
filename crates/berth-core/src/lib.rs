//! berth-core — configuration shared by the berth scheduling crates.

pub mod config;

pub use config::{BerthConfig, EvictionMode, SchedulerConfig};
