//! Group phases — where each gang stands across scheduling cycles.
//!
//! ```text
//! Forming ──admitted──▶ Planned ──all bound──▶ Satisfied
//!    ▲                                             │
//!    └──membership changes── Disrupted ◀──member evicted/removed/unbound
//! ```
//!
//! A disrupted group that is not re-admitted stays disrupted until its
//! membership changes (typically once evicted members are recreated).
//!
//! `EventProcessor` settles after its actions are recorded, and reconcile
//! binds every admitted unit in full, so through the processor a group
//! moves from Forming or Disrupted straight to Satisfied. `Planned` is only
//! seen when `settle` runs against a snapshot the plan has not yet been
//! applied to.

use std::collections::{BTreeMap, BTreeSet};

use berth_placement::{Plan, UnitKey};
use berth_state::{ItemName, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current phase of a gang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    /// Known, but not admitted by the current plan.
    Forming,
    /// Admitted, members not yet all bound. Never left standing by
    /// `EventProcessor`, which binds admitted units in the same cycle.
    Planned,
    /// Every member bound.
    Satisfied,
    /// Was satisfied until a member was evicted, removed, or lost its node.
    Disrupted,
}

#[derive(Debug, Clone)]
struct Tracked {
    phase: GroupPhase,
    members: BTreeSet<ItemName>,
}

/// Group key → (members, whether all of them are bound).
fn groups_in(snapshot: &Snapshot) -> BTreeMap<&str, (BTreeSet<ItemName>, bool)> {
    let mut groups: BTreeMap<&str, (BTreeSet<ItemName>, bool)> = BTreeMap::new();
    for item in snapshot.items() {
        if let Some(group) = item.group.as_deref() {
            let entry = groups.entry(group).or_insert_with(|| (BTreeSet::new(), true));
            entry.0.insert(item.name.clone());
            entry.1 &= item.is_bound();
        }
    }
    groups
}

/// Tracks the phase of every known group.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    groups: BTreeMap<String, Tracked>,
}

impl PhaseTracker {
    pub fn phase(&self, group: &str) -> Option<GroupPhase> {
        self.groups.get(group).map(|t| t.phase)
    }

    /// All tracked groups and their phases, ordered by key.
    pub fn phases(&self) -> impl Iterator<Item = (&str, GroupPhase)> {
        self.groups.iter().map(|(k, t)| (k.as_str(), t.phase))
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Before planning: mark satisfied groups that lost a member or a
    /// member's binding since the last cycle.
    pub fn observe(&mut self, snapshot: &Snapshot) {
        let current = groups_in(snapshot);
        for (key, tracked) in &mut self.groups {
            if tracked.phase != GroupPhase::Satisfied {
                continue;
            }
            let intact = current.get(key.as_str()).is_some_and(|(members, _)| {
                tracked.members.iter().all(|m| {
                    members.contains(m) && snapshot.item(m).is_some_and(|i| i.is_bound())
                })
            });
            if !intact {
                transition(key, tracked, GroupPhase::Disrupted);
            }
        }
    }

    /// After the cycle's actions have been recorded.
    pub fn settle(&mut self, plan: &Plan, snapshot: &Snapshot) {
        let current = groups_in(snapshot);

        self.groups.retain(|key, tracked| {
            let present = current.contains_key(key.as_str());
            if !present {
                info!(group = %key, last = ?tracked.phase, "group has no members left");
            }
            present
        });

        for (key, (members, all_bound)) in current {
            let admitted = plan.contains(&UnitKey::group(key));
            let previous = self.groups.get(key);
            let next = match (admitted, all_bound) {
                (true, true) => GroupPhase::Satisfied,
                (true, false) => GroupPhase::Planned,
                (false, _) => match previous {
                    Some(t)
                        if matches!(t.phase, GroupPhase::Satisfied | GroupPhase::Disrupted)
                            && t.members == members =>
                    {
                        GroupPhase::Disrupted
                    }
                    _ => GroupPhase::Forming,
                },
            };

            match self.groups.get_mut(key) {
                Some(tracked) => {
                    transition(key, tracked, next);
                    tracked.members = members;
                }
                None => {
                    info!(group = key, phase = ?next, members = members.len(), "group tracked");
                    self.groups.insert(key.to_string(), Tracked { phase: next, members });
                }
            }
        }
    }
}

fn transition(key: &str, tracked: &mut Tracked, next: GroupPhase) {
    if tracked.phase != next {
        info!(group = key, from = ?tracked.phase, to = ?next, "group phase changed");
        tracked.phase = next;
    }
}
