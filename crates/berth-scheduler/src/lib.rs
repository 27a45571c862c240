//! berth-scheduler — lifecycle events in, bind/evict actions out.
//!
//! Wraps the state store and the planning engine behind a single owned
//! [`EventProcessor`]. The processor:
//!
//! - Applies node and item lifecycle events to its `ClusterStateStore`
//! - Re-derives units and replans from scratch on every event
//! - Returns the minimal `ActionSet` (evictions before binds)
//! - Records its own decisions back into the store
//! - Tracks the phase of every gang across cycles
//!
//! # Architecture
//!
//! ```text
//! adapter ──Event──▶ EventProcessor
//!                      ├── ClusterStateStore (berth-state)
//!                      ├── build_units → plan → reconcile (berth-placement)
//!                      └── PhaseTracker (group phases)
//!                    ◀──ActionSet──
//! ```

pub mod error;
pub mod events;
pub mod phase;
pub mod processor;

pub use error::{SchedulerError, SchedulerResult};
pub use events::{Event, parse_priority};
pub use phase::{GroupPhase, PhaseTracker};
pub use processor::{EventProcessor, ItemState};
