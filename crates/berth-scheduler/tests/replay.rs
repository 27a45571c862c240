//! Replays recorded event streams and checks every cycle's actions.
//!
//! Fixtures live in `tests/fixtures/events/*.jsonl` at the workspace root.
//! Each line is one event and the actions it must produce:
//!
//! ```text
//! {"event":{"type":"node_added","id":"n1"},"expect":{"binds":[],"evicts":[]}}
//! ```

use std::path::{Path, PathBuf};
use std::sync::Once;

use berth_scheduler::{Event, EventProcessor};
use berth_state::{ActionSet, Binding, ItemName};
use serde::Deserialize;

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

fn fixtures_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures/events"))
}

#[derive(Debug, Deserialize)]
struct Step {
    event: serde_json::Value,
    expect: Expect,
}

#[derive(Debug, Default, Deserialize)]
struct Expect {
    #[serde(default)]
    binds: Vec<Binding>,
    #[serde(default)]
    evicts: Vec<ItemName>,
}

impl From<Expect> for ActionSet {
    fn from(expect: Expect) -> Self {
        ActionSet {
            binds: expect.binds,
            evicts: expect.evicts,
        }
    }
}

fn replay(path: &Path) {
    init_tracing();
    let contents = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));

    let mut processor = EventProcessor::default();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let step: Step = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("{}:{}: bad fixture line: {e}", path.display(), number + 1));
        let event = Event::from_json(&step.event.to_string())
            .unwrap_or_else(|e| panic!("{}:{}: bad event: {e}", path.display(), number + 1));

        let actions = processor.handle(event);
        assert_eq!(
            actions,
            ActionSet::from(step.expect),
            "{}:{}: unexpected actions",
            path.display(),
            number + 1
        );
    }
}

#[test]
fn preemption_stream() {
    replay(&fixtures_dir().join("preemption.jsonl"));
}

#[test]
fn gang_node_loss_stream() {
    replay(&fixtures_dir().join("gang_node_loss.jsonl"));
}

#[test]
fn observed_bindings_stream() {
    replay(&fixtures_dir().join("observed_bindings.jsonl"));
}

#[test]
fn every_fixture_replays() {
    let mut count = 0;
    for entry in std::fs::read_dir(fixtures_dir()).expect("fixtures directory") {
        let path = entry.expect("directory entry").path();
        if path.extension().is_some_and(|ext| ext == "jsonl") {
            replay(&path);
            count += 1;
        }
    }
    assert!(count >= 3, "expected at least three fixtures, found {count}");
}
