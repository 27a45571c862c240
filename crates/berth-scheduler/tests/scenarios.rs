//! End-to-end scheduling scenarios driven through the event processor.
//!
//! Run with `RUST_LOG=debug cargo test -p berth-scheduler --test scenarios`
//! to see every cycle's decisions.

use std::sync::Once;

use berth_core::{BerthConfig, EvictionMode};
use berth_placement::UnitKey;
use berth_scheduler::{Event, EventProcessor, GroupPhase, ItemState};
use berth_state::{Binding, WorkItem};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn cluster(nodes: &[&str]) -> EventProcessor {
    init_tracing();
    let mut processor = EventProcessor::default();
    for node in nodes {
        processor.on_node_added(node);
    }
    processor
}

fn member(name: &str, instance: &str, group: &str) -> WorkItem {
    WorkItem::new(name, instance, 50).in_group(group)
}

// ── Core scenarios ────────────────────────────────────────────────

#[test]
fn scenario_a_capacity_for_everyone() {
    let mut p = cluster(&["node-1", "node-2", "node-3"]);

    let first = p.on_item_added(WorkItem::new("p1", "u1", 100));
    let second = p.on_item_added(WorkItem::new("p2", "u2", 10));

    assert_eq!(first.binds, vec![Binding::new("p1", "node-1")]);
    assert_eq!(second.binds, vec![Binding::new("p2", "node-2")]);
    assert!(first.evicts.is_empty() && second.evicts.is_empty());
}

#[test]
fn scenario_a_from_snapshot() {
    let mut p = cluster(&[]);
    let actions = p.load_snapshot(
        vec!["node-1".to_string(), "node-2".to_string(), "node-3".to_string()],
        vec![WorkItem::new("p1", "u1", 100), WorkItem::new("p2", "u2", 10)],
    );

    assert!(actions.evicts.is_empty());
    assert_eq!(
        actions.binds,
        vec![Binding::new("p1", "node-1"), Binding::new("p2", "node-2")]
    );
}

#[test]
fn scenario_b_preemption() {
    let mut p = cluster(&["node-1"]);
    p.on_item_added(WorkItem::new("p-low", "u1", 10).bound_to("node-1"));

    let actions = p.on_item_added(WorkItem::new("p-high", "u2", 100));

    assert_eq!(actions.evicts, vec!["p-low".to_string()]);
    assert_eq!(actions.binds, vec![Binding::new("p-high", "node-1")]);
}

#[test]
fn scenario_c_gang_fits() {
    let mut p = cluster(&[]);
    let actions = p.load_snapshot(
        vec!["node-1".to_string(), "node-2".to_string(), "node-3".to_string()],
        vec![
            member("g-0", "u0", "g"),
            member("g-1", "u1", "g"),
            member("g-2", "u2", "g"),
        ],
    );

    assert!(actions.evicts.is_empty());
    assert_eq!(
        actions.binds,
        vec![
            Binding::new("g-0", "node-1"),
            Binding::new("g-1", "node-2"),
            Binding::new("g-2", "node-3"),
        ]
    );
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Satisfied));
}

#[test]
fn scenario_d_gang_too_large() {
    let mut p = cluster(&[]);
    let actions = p.load_snapshot(
        vec!["node-1".to_string(), "node-2".to_string()],
        vec![
            member("g-0", "u0", "g"),
            member("g-1", "u1", "g"),
            member("g-2", "u2", "g"),
        ],
    );

    assert!(actions.is_empty());
    assert_eq!(p.last_plan().skipped(), &[UnitKey::group("g")]);
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Forming));
}

#[test]
fn scenario_e_recreated_member_rejoins_group() {
    let mut p = cluster(&["node-1", "node-2"]);
    p.on_item_added(member("w1", "old", "g"));
    p.on_item_added(member("w2", "u2", "g"));
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Satisfied));

    // A more urgent singleton squeezes the gang out.
    let actions = p.on_item_added(WorkItem::new("urgent", "u3", 100));
    assert_eq!(actions.evicts, vec!["w1".to_string(), "w2".to_string()]);
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Disrupted));

    // w1 is deleted and recreated under a new instance id.
    p.on_item_removed("w1");
    p.on_item_added(member("w1", "new", "g"));

    let snap = p.snapshot();
    let units = berth_placement::build_units(&snap);
    let gang = units
        .iter()
        .find(|u| u.key == UnitKey::group("g"))
        .expect("gang unit");
    assert_eq!(gang.size(), 2);
    assert!(gang.members.contains("w1"));

    // Once the urgent item leaves, the whole gang comes back.
    let actions = p.on_item_removed("urgent");
    assert_eq!(
        actions.binds,
        vec![Binding::new("w1", "node-1"), Binding::new("w2", "node-2")]
    );
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Satisfied));
}

// ── Properties on fixed inputs ────────────────────────────────────

#[test]
fn priority_domination_between_competing_gangs() {
    let mut p = cluster(&["node-1", "node-2", "node-3"]);
    p.on_item_added(member("a-0", "u0", "a"));
    p.on_item_added(member("a-1", "u1", "a"));
    p.on_item_added(WorkItem::new("b-0", "u2", 70).in_group("b"));
    let actions = p.on_item_added(WorkItem::new("b-1", "u3", 70).in_group("b"));

    // Both gangs fit alone but not together; b has the higher priority.
    assert_eq!(actions.evicts, vec!["a-0".to_string(), "a-1".to_string()]);
    assert_eq!(p.item_state("b-0"), ItemState::Bound("node-3".to_string()));
    assert_eq!(p.item_state("b-1"), ItemState::Bound("node-1".to_string()));
    assert_eq!(p.item_state("a-0"), ItemState::Pending);
}

#[test]
fn weakest_member_gates_the_gang() {
    let mut p = cluster(&["node-1", "node-2"]);
    p.on_item_added(WorkItem::new("w1", "u1", 90).in_group("g"));
    p.on_item_added(WorkItem::new("w2", "u2", 5).in_group("g"));
    p.on_item_added(WorkItem::new("solo", "u3", 40));

    // The gang's effective priority is 5, so the singleton wins one node
    // and the gang cannot fit in the other.
    assert_eq!(p.item_state("solo"), ItemState::Bound("node-1".to_string()));
    assert_eq!(p.item_state("w1"), ItemState::Pending);
    assert_eq!(p.item_state("w2"), ItemState::Pending);
}

#[test]
fn gang_never_left_partially_bound_after_node_loss() {
    let mut p = cluster(&["node-1", "node-2", "node-3"]);
    for i in 0..3 {
        p.on_item_added(member(&format!("g-{i}"), &format!("u{i}"), "g"));
    }
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Satisfied));

    let actions = p.on_node_removed("node-2");
    let mut evicted = actions.evicts.clone();
    evicted.sort();
    assert_eq!(evicted, vec!["g-0".to_string(), "g-2".to_string()]);
    assert!(actions.binds.is_empty());
    for i in 0..3 {
        assert_eq!(p.item_state(&format!("g-{i}")), ItemState::Pending);
    }
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Disrupted));

    let actions = p.on_node_added("node-4");
    assert_eq!(actions.binds.len(), 3);
    assert_eq!(p.group_phase("g"), Some(GroupPhase::Satisfied));
}

#[test]
fn decoded_events_drive_the_processor() {
    let mut p = cluster(&[]);
    let lines = [
        r#"{"type":"node_added","id":"node-1"}"#,
        r#"{"type":"item_added","item":{"name":"w","instance_id":"u1","priority":"not-a-number"}}"#,
        r#"{"type":"item_added","item":{"name":"v","instance_id":"u2","priority":"3"}}"#,
    ];
    let mut last = None;
    for line in lines {
        last = Some(p.handle(Event::from_json(line).unwrap()));
    }

    // "w" degraded to priority 0 and loses the only node to "v".
    let actions = last.unwrap();
    assert_eq!(actions.evicts, vec!["w".to_string()]);
    assert_eq!(actions.binds, vec![Binding::new("v", "node-1")]);
}

#[test]
fn configured_await_removal_holds_evictions() {
    init_tracing();
    let config = BerthConfig::from_toml_str(
        r#"
[scheduler]
name = "test-scheduler"
eviction = "await_removal"
"#,
    )
    .unwrap();
    assert_eq!(config.scheduler.eviction, EvictionMode::AwaitRemoval);

    let mut p = EventProcessor::new(config.scheduler);
    p.on_node_added("node-1");
    p.on_item_added(WorkItem::new("low", "u1", 1));
    p.on_item_added(WorkItem::new("high", "u2", 2));
    assert_eq!(p.item_state("low"), ItemState::Held);
    assert_eq!(p.config().name, "test-scheduler");
}

#[test]
fn processor_can_be_shared_behind_a_mutex() {
    use std::sync::{Arc, Mutex};

    let shared = Arc::new(Mutex::new(cluster(&["node-1", "node-2"])));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let mut p = shared.lock().unwrap();
                p.on_item_added(WorkItem::new(&format!("t{i}"), &format!("u{i}"), i))
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let p = shared.lock().unwrap();
    assert_eq!(p.state().free_nodes().len(), 0);
    assert!(matches!(p.item_state("t0"), ItemState::Bound(_)));
    assert!(matches!(p.item_state("t1"), ItemState::Bound(_)));
}
