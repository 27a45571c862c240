//! Planner — decides which units should be placed this cycle.
//!
//! Every known unit is a candidate, bound or not, so a returning
//! high-priority unit can displace one that is already running. Units are
//! walked in rank order and admitted greedily while they fit; a unit that
//! does not fit is skipped without blocking smaller units ranked after it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::units::{SchedulingUnit, UnitKey};

/// The desired assignment for one cycle: which units get nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Admitted units, in rank order.
    admitted: Vec<SchedulingUnit>,
    /// Units that did not fit, in rank order.
    skipped: Vec<UnitKey>,
    /// Node count the plan was computed against.
    capacity: usize,
}

impl Plan {
    pub fn admitted(&self) -> &[SchedulingUnit] {
        &self.admitted
    }

    pub fn skipped(&self) -> &[UnitKey] {
        &self.skipped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Nodes claimed by admitted units. Never exceeds `capacity`.
    pub fn used(&self) -> usize {
        self.admitted.iter().map(SchedulingUnit::size).sum()
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.admitted.iter().any(|u| &u.key == key)
    }

    /// Admitted item name → the unit it was admitted with.
    pub fn admitted_members(&self) -> BTreeMap<&str, &UnitKey> {
        self.admitted
            .iter()
            .flat_map(|u| u.members.iter().map(move |m| (m.as_str(), &u.key)))
            .collect()
    }
}

/// Total rank order: higher priority first, then smaller units, then key.
pub fn rank_order(a: &SchedulingUnit, b: &SchedulingUnit) -> Ordering {
    b.effective_priority
        .cmp(&a.effective_priority)
        .then_with(|| a.size().cmp(&b.size()))
        .then_with(|| a.key.cmp(&b.key))
}

/// Compute a plan for `units` on a cluster of `node_count` single-slot nodes.
pub fn plan(mut units: Vec<SchedulingUnit>, node_count: usize) -> Plan {
    units.sort_by(rank_order);

    let mut remaining = node_count;
    let mut admitted = Vec::new();
    let mut skipped = Vec::new();

    for unit in units {
        if unit.size() <= remaining {
            remaining -= unit.size();
            debug!(
                unit = %unit.key,
                size = unit.size(),
                priority = unit.effective_priority,
                remaining,
                "unit admitted"
            );
            admitted.push(unit);
        } else {
            debug!(
                unit = %unit.key,
                size = unit.size(),
                priority = unit.effective_priority,
                remaining,
                "unit does not fit, skipped"
            );
            skipped.push(unit.key);
        }
    }

    Plan {
        admitted,
        skipped,
        capacity: node_count,
    }
}
