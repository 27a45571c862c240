//! Lifecycle events delivered to the scheduler.
//!
//! The adapter decodes its payloads into [`Event`] once, at the boundary.
//! The JSON wire form is a tagged object:
//!
//! ```text
//! {"type":"node_added","id":"node-1"}
//! {"type":"node_removed","id":"node-1"}
//! {"type":"item_added","item":{"name":"w1","instance_id":"uid-1","priority":50,"group":"g","node":null}}
//! {"type":"item_removed","name":"w1","instance_id":"uid-1"}
//! ```
//!
//! `priority` may be an integer, a numeric string, or absent. Anything that
//! does not parse as an integer is treated as 0.

use berth_state::{ItemName, NodeId, WorkItem};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SchedulerError, SchedulerResult};

/// A scheduling-relevant lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NodeAdded { id: NodeId },
    NodeRemoved { id: NodeId },
    ItemAdded { item: WorkItem },
    /// `instance_id`, when present, guards against removing a newer
    /// instance that was recreated under the same name.
    ItemRemoved {
        name: ItemName,
        instance_id: Option<String>,
    },
}

impl Event {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeAdded { .. } => "node_added",
            Self::NodeRemoved { .. } => "node_removed",
            Self::ItemAdded { .. } => "item_added",
            Self::ItemRemoved { .. } => "item_removed",
        }
    }

    pub fn from_json(json: &str) -> SchedulerResult<Self> {
        let wire: WireEvent = serde_json::from_str(json)?;
        Self::try_from(wire)
    }

    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(&WireEvent::from(self))?)
    }
}

/// Read a priority from whatever the adapter found, defaulting to 0.
pub fn parse_priority(value: Option<&serde_json::Value>) -> i64 {
    use serde_json::Value;

    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(|| {
            warn!(priority = %n, "priority is not an integer, using 0");
            0
        }),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
            warn!(priority = %s, "unparsable priority, using 0");
            0
        }),
        Some(other) => {
            warn!(priority = %other, "unexpected priority value, using 0");
            0
        }
    }
}

// ── Wire form ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    NodeAdded {
        id: String,
    },
    NodeRemoved {
        id: String,
    },
    ItemAdded {
        item: WireItem,
    },
    ItemRemoved {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_id: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireItem {
    name: String,
    instance_id: String,
    #[serde(default)]
    priority: Option<serde_json::Value>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    node: Option<String>,
}

fn require(field: &str, value: String) -> SchedulerResult<String> {
    if value.trim().is_empty() {
        return Err(SchedulerError::InvalidEvent(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Empty strings from the adapter mean "not set".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<WireEvent> for Event {
    type Error = SchedulerError;

    fn try_from(wire: WireEvent) -> SchedulerResult<Self> {
        Ok(match wire {
            WireEvent::NodeAdded { id } => Self::NodeAdded {
                id: require("node id", id)?,
            },
            WireEvent::NodeRemoved { id } => Self::NodeRemoved {
                id: require("node id", id)?,
            },
            WireEvent::ItemAdded { item } => Self::ItemAdded {
                item: WorkItem {
                    priority: parse_priority(item.priority.as_ref()),
                    name: require("item name", item.name)?,
                    instance_id: item.instance_id,
                    group: non_empty(item.group),
                    node: non_empty(item.node),
                },
            },
            WireEvent::ItemRemoved { name, instance_id } => Self::ItemRemoved {
                name: require("item name", name)?,
                instance_id: non_empty(instance_id),
            },
        })
    }
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        match event {
            Event::NodeAdded { id } => Self::NodeAdded { id: id.clone() },
            Event::NodeRemoved { id } => Self::NodeRemoved { id: id.clone() },
            Event::ItemAdded { item } => Self::ItemAdded {
                item: WireItem {
                    name: item.name.clone(),
                    instance_id: item.instance_id.clone(),
                    priority: Some(item.priority.into()),
                    group: item.group.clone(),
                    node: item.node.clone(),
                },
            },
            Event::ItemRemoved { name, instance_id } => Self::ItemRemoved {
                name: name.clone(),
                instance_id: instance_id.clone(),
            },
        }
    }
}
