//! Reconciler — turns a plan into the smallest set of bind/evict actions.
//!
//! 1. Items already bound and still planned keep their nodes.
//! 2. Bound items whose unit is not planned are evicted.
//! 3. Free nodes (already free or freed in step 2) are handed out in
//!    ascending id order to planned units that still need nodes, walking
//!    units in rank order and members lexicographically. A unit gets all
//!    the nodes it needs in one pass or none; a gang that cannot be
//!    completed has its bound members evicted instead of staying half-bound.
//!
//! The same snapshot and plan always produce the same action set.

use std::collections::BTreeSet;

use berth_state::{ActionSet, Binding, ItemName, Snapshot};
use tracing::{debug, info, warn};

use crate::planner::Plan;

/// Compute the actions that move `snapshot` to `plan`.
pub fn reconcile(snapshot: &Snapshot, plan: &Plan) -> ActionSet {
    let wanted = plan.admitted_members();
    let mut evicts: BTreeSet<ItemName> = BTreeSet::new();
    let mut free: BTreeSet<&str> = snapshot.free_nodes().into_iter().collect();

    for (node, name) in snapshot.bindings() {
        if !wanted.contains_key(name) {
            debug!(item = name, node, "bound item not in plan, evicting");
            evicts.insert(name.to_string());
            free.insert(node);
        }
    }

    let mut binds = Vec::new();
    for unit in plan.admitted() {
        let pending: Vec<&str> = unit
            .members
            .iter()
            .map(String::as_str)
            .filter(|m| snapshot.item(m).is_some_and(|item| !item.is_bound()))
            .collect();

        if pending.is_empty() {
            continue;
        }

        if pending.len() > free.len() {
            warn!(
                unit = %unit.key,
                needed = pending.len(),
                free = free.len(),
                "planned unit cannot be completed this cycle, unwinding"
            );
            for member in &unit.members {
                if let Some(node) = snapshot.item(member).and_then(|i| i.node.as_deref()) {
                    evicts.insert(member.clone());
                    free.insert(node);
                }
            }
            continue;
        }

        for member in pending {
            let Some(node) = free.pop_first() else {
                break;
            };
            binds.push(Binding::new(member, node));
        }
    }

    let actions = ActionSet {
        binds,
        evicts: evicts.into_iter().collect(),
    };

    if !actions.is_empty() {
        info!(
            binds = actions.binds.len(),
            evicts = actions.evicts.len(),
            "reconciled plan against bindings"
        );
    }
    actions
}

/// Items whose binding survives `actions` untouched.
pub fn stable_items<'a>(snapshot: &'a Snapshot, actions: &ActionSet) -> Vec<&'a str> {
    snapshot
        .items()
        .filter(|item| item.is_bound() && !actions.evicts.contains(&item.name))
        .map(|item| item.name.as_str())
        .collect()
}
