//! berth-state — authoritative in-memory cluster state for berth.
//!
//! Records the known nodes, the known work items, and which item occupies
//! which node. Each node hosts at most one item and each item occupies at
//! most one node; every mutation preserves that bijection.
//!
//! # Architecture
//!
//! The `ClusterStateStore` is a plain owned value with no interior
//! mutability. Planning reads an immutable [`Snapshot`] of it; the only
//! writer is whoever owns the store (the event processor in
//! `berth-scheduler`). Hosts that deliver events from several threads must
//! serialize access themselves.

pub mod store;
pub mod types;

pub use store::ClusterStateStore;
pub use types::*;
