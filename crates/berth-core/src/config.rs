//! berth.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default scheduler identity used in log fields.
const DEFAULT_SCHEDULER_NAME: &str = "berth";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BerthConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub eviction: EvictionMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            eviction: EvictionMode::default(),
        }
    }
}

fn default_name() -> String {
    DEFAULT_SCHEDULER_NAME.to_string()
}

/// What happens to an item after the core evicts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    /// The item reverts to pending and is replanned on the next cycle.
    #[default]
    Unbind,
    /// The adapter evicts by deleting the item. It stays out of planning
    /// until it is removed or recreated under a new instance id, and any
    /// group it belongs to waits with it.
    AwaitRemoval,
}

impl BerthConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BerthConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
