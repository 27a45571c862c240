//! berth planning engine — units, plans, and reconciliation.
//!
//! This crate decides which work items should occupy which nodes. It does
//! NOT own any state (that's `berth-state`) and performs no I/O. Every
//! function is a pure computation over a [`Snapshot`](berth_state::Snapshot).
//!
//! # Components
//!
//! - **`units`** — Groups items into singletons and gangs
//! - **`planner`** — Priority-ordered greedy admission against node count
//! - **`reconciler`** — Minimal bind/evict diff between bindings and a plan
//!
//! # Pipeline
//!
//! ```text
//! Snapshot ──build_units──▶ [SchedulingUnit] ──plan──▶ Plan
//!     │                                                 │
//!     └──────────────────reconcile◀─────────────────────┘
//!                            │
//!                            ▼
//!                        ActionSet
//! ```

pub mod planner;
pub mod reconciler;
pub mod units;

pub use planner::{Plan, plan, rank_order};
pub use reconciler::{reconcile, stable_items};
pub use units::{SchedulingUnit, UnitKey, build_units};
