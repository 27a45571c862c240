//! Domain types for the berth state store.
//!
//! Nodes carry nothing but an identifier: every node has exactly one slot.
//! Work items are identified by name; the instance id changes whenever the
//! underlying workload is recreated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Stable identity of a work item (survives recreation).
pub type ItemName = String;

// ── Work item ─────────────────────────────────────────────────────

/// A schedulable work item as last observed by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub name: ItemName,
    /// Changes every time the workload is recreated under the same name.
    pub instance_id: String,
    /// Higher number = more urgent.
    #[serde(default)]
    pub priority: i64,
    /// Gang key; items sharing one are placed all-or-nothing.
    #[serde(default)]
    pub group: Option<String>,
    /// Node this item is currently bound to, if any.
    #[serde(default)]
    pub node: Option<NodeId>,
}

impl WorkItem {
    pub fn new(name: &str, instance_id: &str, priority: i64) -> Self {
        Self {
            name: name.to_string(),
            instance_id: instance_id.to_string(),
            priority,
            group: None,
            node: None,
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn bound_to(mut self, node: &str) -> Self {
        self.node = Some(node.to_string());
        self
    }

    pub fn is_bound(&self) -> bool {
        self.node.is_some()
    }
}

// ── Actions ───────────────────────────────────────────────────────

/// Bind `item` onto `node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Binding {
    pub item: ItemName,
    pub node: NodeId,
}

impl Binding {
    pub fn new(item: &str, node: &str) -> Self {
        Self {
            item: item.to_string(),
            node: node.to_string(),
        }
    }
}

/// The bind/evict actions produced by one scheduling cycle.
///
/// Evictions must be executed before binds: a bind may target a node that
/// one of the evictions frees.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionSet {
    pub binds: Vec<Binding>,
    pub evicts: Vec<ItemName>,
}

impl ActionSet {
    pub fn is_empty(&self) -> bool {
        self.binds.is_empty() && self.evicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.binds.len() + self.evicts.len()
    }

    /// Whether `item` appears anywhere in this action set.
    pub fn touches(&self, item: &str) -> bool {
        self.evicts.iter().any(|e| e == item) || self.binds.iter().any(|b| b.item == item)
    }
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Immutable view of the store taken at the start of a planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub(crate) nodes: BTreeSet<NodeId>,
    pub(crate) items: BTreeMap<ItemName, WorkItem>,
    pub(crate) held: BTreeSet<ItemName>,
    pub(crate) transitioning: BTreeSet<String>,
}

impl Snapshot {
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All known items, ordered by name.
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    pub fn item(&self, name: &str) -> Option<&WorkItem> {
        self.items.get(name)
    }

    /// Whether `name` was evicted and is waiting for removal or recreation.
    pub fn is_held(&self, name: &str) -> bool {
        self.held.contains(name)
    }

    /// Whether `group` is waiting for evicted members to be re-added.
    pub fn is_in_transition(&self, group: &str) -> bool {
        self.transitioning.contains(group)
    }

    /// Node → item for every occupied node, ordered by node id.
    pub fn bindings(&self) -> BTreeMap<&str, &str> {
        self.items
            .values()
            .filter_map(|item| {
                item.node
                    .as_deref()
                    .map(|node| (node, item.name.as_str()))
            })
            .collect()
    }

    /// Unoccupied nodes in ascending id order.
    pub fn free_nodes(&self) -> Vec<&str> {
        let bindings = self.bindings();
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(|node| !bindings.contains_key(node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_defaults_when_fields_absent() {
        let json = r#"{"name":"w1","instance_id":"uid-1"}"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.priority, 0);
        assert_eq!(item.group, None);
        assert!(!item.is_bound());
    }

    #[test]
    fn action_set_serializes_binds_and_evicts() {
        let actions = ActionSet {
            binds: vec![Binding::new("high", "node-1")],
            evicts: vec!["low".to_string()],
        };
        let json = serde_json::to_value(&actions).unwrap();
        assert_eq!(json["binds"][0]["item"], "high");
        assert_eq!(json["binds"][0]["node"], "node-1");
        assert_eq!(json["evicts"][0], "low");
    }

    #[test]
    fn action_set_touches() {
        let actions = ActionSet {
            binds: vec![Binding::new("a", "n1")],
            evicts: vec!["b".to_string()],
        };
        assert!(actions.touches("a"));
        assert!(actions.touches("b"));
        assert!(!actions.touches("c"));
        assert_eq!(actions.len(), 2);
        assert!(ActionSet::default().is_empty());
    }
}
