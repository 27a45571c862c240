//! Scheduling units — the indivisible objects the planner admits.
//!
//! Items without a group key become singleton units. Items sharing a group
//! key form one gang unit whose effective priority is the minimum of its
//! members' priorities: a gang is only as urgent as its least urgent member.
//!
//! Units are rebuilt from a snapshot on every cycle and never cached, so a
//! recreated item (same name, new instance id) lands back in its group.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use berth_state::{ItemName, Snapshot, WorkItem};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identity of a scheduling unit.
///
/// Ordering is derived: every group key sorts before every singleton, then
/// lexicographically. A group and an item with the same string never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum UnitKey {
    Group(String),
    Single(ItemName),
}

impl UnitKey {
    pub fn group(key: &str) -> Self {
        Self::Group(key.to_string())
    }

    pub fn single(name: &str) -> Self {
        Self::Single(name.to_string())
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(name) => write!(f, "group:{name}"),
            Self::Single(name) => write!(f, "item:{name}"),
        }
    }
}

/// A singleton or a gang, considered as a whole by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingUnit {
    pub key: UnitKey,
    /// Member item names, lexicographic.
    pub members: BTreeSet<ItemName>,
    pub effective_priority: i64,
}

impl SchedulingUnit {
    pub fn single(item: &WorkItem) -> Self {
        Self {
            key: UnitKey::Single(item.name.clone()),
            members: BTreeSet::from([item.name.clone()]),
            effective_priority: item.priority,
        }
    }

    /// Number of nodes this unit needs.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// How many members are currently bound in `snapshot`.
    pub fn bound_members(&self, snapshot: &Snapshot) -> usize {
        self.members
            .iter()
            .filter(|m| snapshot.item(m).is_some_and(WorkItem::is_bound))
            .count()
    }

    /// Every member is bound.
    pub fn is_satisfied(&self, snapshot: &Snapshot) -> bool {
        self.bound_members(snapshot) == self.size()
    }
}

/// Derive every scheduling unit from a snapshot, ordered by key.
///
/// Items held after an eviction are left out, and so is any group in
/// transition: one that lost a member to eviction and has not yet seen
/// every member re-added.
pub fn build_units(snapshot: &Snapshot) -> Vec<SchedulingUnit> {
    let mut units = Vec::new();
    let mut groups: BTreeMap<&str, Vec<&WorkItem>> = BTreeMap::new();

    for item in snapshot.items() {
        match item.group.as_deref() {
            Some(key) => groups.entry(key).or_default().push(item),
            None if snapshot.is_held(&item.name) => {
                debug!(item = %item.name, "held item left out of planning");
            }
            None => units.push(SchedulingUnit::single(item)),
        }
    }

    for (key, members) in groups {
        if snapshot.is_in_transition(key) {
            debug!(group = key, "group in transition, left out of planning");
            continue;
        }
        if let Some(held) = members.iter().find(|m| snapshot.is_held(&m.name)) {
            debug!(
                group = key,
                member = %held.name,
                "group has a held member, left out of planning"
            );
            continue;
        }
        let effective_priority = members
            .iter()
            .map(|m| m.priority)
            .min()
            .unwrap_or_default();
        units.push(SchedulingUnit {
            key: UnitKey::group(key),
            members: members.iter().map(|m| m.name.clone()).collect(),
            effective_priority,
        });
    }

    units.sort_by(|a, b| a.key.cmp(&b.key));
    debug!(units = units.len(), "units rebuilt");
    units
}
