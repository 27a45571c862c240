//! ClusterStateStore — the authoritative record of nodes and bindings.
//!
//! Every operation is an in-memory mutation. Anomalies in the input
//! (duplicate registrations, unknown ids, bindings to nodes we have never
//! seen) are absorbed and logged rather than reported as errors.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::types::*;

/// In-memory cluster state: nodes, items, and the node ↔ item bijection.
#[derive(Debug, Clone, Default)]
pub struct ClusterStateStore {
    /// Node id → name of the item occupying it.
    nodes: BTreeMap<NodeId, Option<ItemName>>,
    /// Item name → last observed record. `node` mirrors `nodes`.
    items: BTreeMap<ItemName, WorkItem>,
    /// Evicted items waiting for removal or recreation.
    held: BTreeSet<ItemName>,
    /// Groups with an evicted member that have not been fully re-added.
    transitioning: BTreeSet<String>,
}

impl ClusterStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Register a node. Returns false if it was already known.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.nodes.contains_key(id) {
            debug!(node = id, "node already known");
            return false;
        }
        self.nodes.insert(id.to_string(), None);
        debug!(node = id, "node added");
        true
    }

    /// Forget a node. The item bound to it, if any, becomes unbound and
    /// its name is returned.
    pub fn remove_node(&mut self, id: &str) -> Option<ItemName> {
        let Some(occupant) = self.nodes.remove(id) else {
            debug!(node = id, "ignoring removal of unknown node");
            return None;
        };
        if let Some(name) = &occupant {
            if let Some(item) = self.items.get_mut(name) {
                item.node = None;
            }
            info!(node = id, item = %name, "node removed, item unbound");
        } else {
            debug!(node = id, "node removed");
        }
        occupant
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Name of the item bound to `node`, if any.
    pub fn occupant(&self, node: &str) -> Option<&str> {
        self.nodes.get(node)?.as_deref()
    }

    /// Unoccupied nodes in ascending id order.
    pub fn free_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, occupant)| occupant.is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    // ── Items ──────────────────────────────────────────────────────

    /// Insert or update an item from an observation.
    ///
    /// The observed binding replaces whatever the store believed before.
    /// A binding to an unknown node is dropped; a binding to a node held
    /// by another item displaces that item. A new instance id under a held
    /// name clears the hold.
    pub fn upsert_item(&mut self, mut item: WorkItem) {
        let requested = item.node.take();

        if let Some(previous) = self.items.get(&item.name) {
            let previous_node = previous.node.clone();
            if previous.instance_id != item.instance_id && self.held.remove(&item.name) {
                debug!(
                    item = %item.name,
                    instance = %item.instance_id,
                    "recreated item released from hold"
                );
            }
            if let Some(node) = previous_node {
                if requested.as_deref() != Some(node.as_str()) {
                    self.release(&node);
                }
            }
        }

        if let Some(node) = requested {
            if self.occupy(&item.name, &node) {
                item.node = Some(node);
            }
        }

        debug!(
            item = %item.name,
            instance = %item.instance_id,
            priority = item.priority,
            group = ?item.group,
            node = ?item.node,
            "item upserted"
        );
        let group = item.group.clone();
        self.items.insert(item.name.clone(), item);
        if let Some(group) = group {
            self.check_reformed(&group);
        }
    }

    /// Delete an item, freeing its node. Unknown names are ignored.
    pub fn remove_item(&mut self, name: &str) -> Option<WorkItem> {
        self.held.remove(name);
        let Some(item) = self.items.remove(name) else {
            debug!(item = name, "ignoring removal of unknown item");
            return None;
        };
        if let Some(node) = &item.node {
            self.release(node);
        }
        if let Some(group) = &item.group {
            let emptied = self.members_of(group).next().is_none();
            if emptied && self.transitioning.remove(group) {
                debug!(group = %group, "last member removed, group no longer in transition");
            }
        }
        debug!(item = name, node = ?item.node, "item removed");
        Some(item)
    }

    /// Delete an item only if it is still the given instance.
    ///
    /// A removal notice for an instance that has since been recreated
    /// under the same name refers to the old instance and is ignored.
    pub fn remove_item_instance(&mut self, name: &str, instance_id: &str) -> Option<WorkItem> {
        if let Some(current) = self.items.get(name) {
            if current.instance_id != instance_id {
                debug!(
                    item = name,
                    stale = instance_id,
                    current = %current.instance_id,
                    "ignoring removal of stale instance"
                );
                return None;
            }
        }
        self.remove_item(name)
    }

    pub fn item(&self, name: &str) -> Option<&WorkItem> {
        self.items.get(name)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.contains(name)
    }

    /// Whether `group` lost a member to eviction and is still waiting for
    /// every member to be re-added.
    pub fn is_in_transition(&self, group: &str) -> bool {
        self.transitioning.contains(group)
    }

    // ── Recording decisions ────────────────────────────────────────

    /// Record that `name` is now bound to `node`.
    ///
    /// Fails (returns false) if either is unknown or the node is occupied
    /// by a different item.
    pub fn bind(&mut self, name: &str, node: &str) -> bool {
        if !self.items.contains_key(name) {
            warn!(item = name, node, "cannot bind unknown item");
            return false;
        }
        match self.occupant(node) {
            None if self.contains_node(node) => {}
            Some(current) if current == name => return true,
            Some(current) => {
                warn!(item = name, node, occupant = current, "cannot bind to occupied node");
                return false;
            }
            None => {
                warn!(item = name, node, "cannot bind to unknown node");
                return false;
            }
        }
        self.unbind(name);
        self.nodes.insert(node.to_string(), Some(name.to_string()));
        if let Some(item) = self.items.get_mut(name) {
            item.node = Some(node.to_string());
        }
        true
    }

    /// Record that `name` no longer occupies a node. Returns the freed node.
    pub fn unbind(&mut self, name: &str) -> Option<NodeId> {
        let node = self.items.get_mut(name)?.node.take()?;
        self.release(&node);
        Some(node)
    }

    /// Keep an evicted item out of planning until it is removed or
    /// recreated. Returns false for unknown items.
    ///
    /// Holding a gang member puts its whole group in transition. The group
    /// stays out of planning until an upsert leaves it with no held member,
    /// even if held members are removed in the meantime.
    pub fn hold(&mut self, name: &str) -> bool {
        let Some(item) = self.items.get(name) else {
            return false;
        };
        if let Some(group) = &item.group {
            if self.transitioning.insert(group.clone()) {
                info!(group = %group, member = name, "group in transition");
            }
        }
        self.held.insert(name.to_string())
    }

    /// Record a whole action set: evictions first, then binds.
    pub fn apply(&mut self, actions: &ActionSet) {
        for name in &actions.evicts {
            self.unbind(name);
        }
        for binding in &actions.binds {
            self.bind(&binding.item, &binding.node);
        }
    }

    // ── Snapshots ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.keys().cloned().collect(),
            items: self.items.clone(),
            held: self.held.clone(),
            transitioning: self.transitioning.clone(),
        }
    }

    /// Discard everything and install a fresh baseline.
    ///
    /// Items are applied in order, so if two items claim the same node the
    /// later one keeps it.
    pub fn load_snapshot(
        &mut self,
        nodes: impl IntoIterator<Item = NodeId>,
        items: impl IntoIterator<Item = WorkItem>,
    ) {
        *self = Self::default();
        for node in nodes {
            self.add_node(&node);
        }
        for item in items {
            self.upsert_item(item);
        }
        info!(
            nodes = self.nodes.len(),
            items = self.items.len(),
            bound = self.nodes.values().filter(|o| o.is_some()).count(),
            "state reloaded from snapshot"
        );
    }

    // ── Internals ──────────────────────────────────────────────────

    fn members_of<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a WorkItem> + 'a {
        self.items
            .values()
            .filter(move |item| item.group.as_deref() == Some(group))
    }

    /// Clear the transition mark once every known member is back.
    fn check_reformed(&mut self, group: &str) {
        if !self.transitioning.contains(group) {
            return;
        }
        let complete = {
            let mut members = self.members_of(group).peekable();
            members.peek().is_some() && members.all(|m| !self.held.contains(&m.name))
        };
        if complete {
            self.transitioning.remove(group);
            info!(group, "group re-formed, eligible for planning");
        }
    }

    fn release(&mut self, node: &str) {
        if let Some(slot) = self.nodes.get_mut(node) {
            *slot = None;
        }
    }

    /// Point `node` at `name`, displacing any other occupant.
    fn occupy(&mut self, name: &str, node: &str) -> bool {
        let Some(slot) = self.nodes.get_mut(node) else {
            warn!(item = name, node, "observed binding to unknown node, treating item as unbound");
            return false;
        };
        let displaced = slot.replace(name.to_string()).filter(|prev| prev != name);
        if let Some(prev) = displaced {
            warn!(item = name, node, displaced = %prev, "node observed with a new occupant");
            if let Some(prev_item) = self.items.get_mut(&prev) {
                prev_item.node = None;
            }
        }
        true
    }

    /// Whether the node map and the item records agree.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let from_nodes: BTreeMap<&str, &str> = self
            .nodes
            .iter()
            .filter_map(|(n, o)| o.as_deref().map(|o| (n.as_str(), o)))
            .collect();
        let from_items: BTreeMap<&str, &str> = self
            .items
            .values()
            .filter_map(|i| i.node.as_deref().map(|n| (n, i.name.as_str())))
            .collect();
        let bound_items = self.items.values().filter(|i| i.node.is_some()).count();
        from_nodes == from_items && bound_items == from_items.len()
    }
}
