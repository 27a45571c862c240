//! EventProcessor — the only entry point the adapter talks to.
//!
//! Every call runs one full scheduling cycle synchronously:
//!
//! 1. Mutate the owned [`ClusterStateStore`] for the event
//! 2. Rebuild units from a fresh snapshot
//! 3. Plan against the current node count
//! 4. Reconcile the plan against current bindings
//! 5. Record the resulting actions back into the store
//!
//! The processor is not internally synchronized. Hosts receiving events on
//! several threads must funnel them through one owner (a mutex or a single
//! consumer queue) in the order they were observed.

use berth_core::{EvictionMode, SchedulerConfig};
use berth_placement::{Plan, build_units, reconcile};
use berth_state::{ActionSet, ClusterStateStore, NodeId, Snapshot, WorkItem};
use tracing::{debug, info};

use crate::events::Event;
use crate::phase::{GroupPhase, PhaseTracker};

/// Where a single work item stands from the scheduler's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// Known and unbound.
    Pending,
    /// Bound to the given node.
    Bound(NodeId),
    /// Evicted, waiting for removal or recreation.
    Held,
    /// Not known (never added, or removed).
    Removed,
}

/// Owns the cluster state and turns lifecycle events into actions.
pub struct EventProcessor {
    config: SchedulerConfig,
    state: ClusterStateStore,
    phases: PhaseTracker,
    last_plan: Plan,
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl EventProcessor {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: ClusterStateStore::new(),
            phases: PhaseTracker::default(),
            last_plan: Plan::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> &ClusterStateStore {
        &self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// The plan computed by the most recent cycle.
    pub fn last_plan(&self) -> &Plan {
        &self.last_plan
    }

    pub fn group_phase(&self, group: &str) -> Option<GroupPhase> {
        self.phases.phase(group)
    }

    pub fn group_phases(&self) -> impl Iterator<Item = (&str, GroupPhase)> {
        self.phases.phases()
    }

    pub fn item_state(&self, name: &str) -> ItemState {
        match self.state.item(name) {
            None => ItemState::Removed,
            Some(_) if self.state.is_held(name) => ItemState::Held,
            Some(item) => match &item.node {
                Some(node) => ItemState::Bound(node.clone()),
                None => ItemState::Pending,
            },
        }
    }

    // ── Entry points ───────────────────────────────────────────────

    /// Dispatch a decoded event.
    pub fn handle(&mut self, event: Event) -> ActionSet {
        debug!(scheduler = %self.config.name, event = event.kind(), "handling event");
        match event {
            Event::NodeAdded { id } => self.on_node_added(&id),
            Event::NodeRemoved { id } => self.on_node_removed(&id),
            Event::ItemAdded { item } => self.on_item_added(item),
            Event::ItemRemoved {
                name,
                instance_id: Some(instance_id),
            } => self.on_item_instance_removed(&name, &instance_id),
            Event::ItemRemoved {
                name,
                instance_id: None,
            } => self.on_item_removed(&name),
        }
    }

    pub fn on_item_added(&mut self, item: WorkItem) -> ActionSet {
        self.state.upsert_item(item);
        self.cycle("item_added")
    }

    pub fn on_item_removed(&mut self, name: &str) -> ActionSet {
        self.state.remove_item(name);
        self.cycle("item_removed")
    }

    /// Remove `name` only if it is still `instance_id`.
    pub fn on_item_instance_removed(&mut self, name: &str, instance_id: &str) -> ActionSet {
        self.state.remove_item_instance(name, instance_id);
        self.cycle("item_removed")
    }

    pub fn on_node_added(&mut self, id: &str) -> ActionSet {
        self.state.add_node(id);
        self.cycle("node_added")
    }

    pub fn on_node_removed(&mut self, id: &str) -> ActionSet {
        self.state.remove_node(id);
        self.cycle("node_removed")
    }

    /// Throw away all state and start over from a full listing.
    ///
    /// Used by the adapter to recover from failures it cannot reconcile
    /// incrementally. No history is replayed.
    pub fn load_snapshot(
        &mut self,
        nodes: impl IntoIterator<Item = NodeId>,
        items: impl IntoIterator<Item = WorkItem>,
    ) -> ActionSet {
        self.state.load_snapshot(nodes, items);
        self.phases.clear();
        self.last_plan = Plan::default();
        info!(scheduler = %self.config.name, "scheduler state reset");
        self.cycle("snapshot")
    }

    // ── Cycle ──────────────────────────────────────────────────────

    fn cycle(&mut self, trigger: &'static str) -> ActionSet {
        let snapshot = self.state.snapshot();
        self.phases.observe(&snapshot);

        let units = build_units(&snapshot);
        let plan = berth_placement::plan(units, snapshot.node_count());
        let actions = reconcile(&snapshot, &plan);

        self.state.apply(&actions);
        if self.config.eviction == EvictionMode::AwaitRemoval {
            for name in &actions.evicts {
                self.state.hold(name);
            }
        }
        self.phases.settle(&plan, &self.state.snapshot());

        for name in &actions.evicts {
            info!(scheduler = %self.config.name, item = %name, "evict");
        }
        for binding in &actions.binds {
            info!(
                scheduler = %self.config.name,
                item = %binding.item,
                node = %binding.node,
                "bind"
            );
        }
        debug!(
            scheduler = %self.config.name,
            trigger,
            admitted = plan.admitted().len(),
            skipped = plan.skipped().len(),
            used = plan.used(),
            capacity = plan.capacity(),
            binds = actions.binds.len(),
            evicts = actions.evicts.len(),
            "scheduling cycle complete"
        );

        self.last_plan = plan;
        actions
    }
}
