//! Persistent Workflow Host
//!
//! This example demonstrates workflows that live in a snapshot store
//! between events.
//!
//! Key concepts:
//! - File-backed snapshot store with atomic writes
//! - Restore, deliver, persist, stop on every event
//! - Guards reading the event payload
//!
//! Run with: cargo run --example workflow_host

use serde_json::json;
use statecraft::checkpoint::FileStore;
use statecraft::host::WorkflowHost;
use statecraft::telemetry::init_tracing;
use statecraft::{Event, Guard, Machine, MachineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("=== Persistent Workflow Host ===\n");

    let config: MachineConfig = serde_json::from_value(json!({
        "id": "expense",
        "initial": "submitted",
        "context": { "amount": 0 },
        "states": {
            "submitted": {
                "on": {
                    "REVIEW": [
                        { "target": "approved", "guard": "small_amount" },
                        { "target": "escalated" }
                    ]
                }
            },
            "escalated": {
                "on": { "APPROVE": "approved", "DENY": "denied" }
            },
            "approved": { "type": "final" },
            "denied": { "type": "final" }
        }
    }))?;

    let machine = Machine::builder(config)
        .guard(
            "small_amount",
            Guard::new(|ctx, _| ctx["amount"].as_i64().unwrap_or(0) < 100),
        )
        .build()?;

    let dir = std::env::temp_dir().join("statecraft-workflows");
    let host = WorkflowHost::new(machine, FileStore::new(&dir)?);

    let small = host.start_workflow(json!({ "amount": 40 }))?;
    let large = host.start_workflow(json!({ "amount": 4000 }))?;
    println!("Started workflows {small} and {large} in {}\n", dir.display());

    for id in [&small, &large] {
        let snapshot = host.send(id, Event::new("REVIEW"))?;
        println!("  {id}: {} ({:?})", snapshot.value, snapshot.status);
    }

    let snapshot = host.send(&large, Event::new("APPROVE"))?;
    println!("  {large}: {} ({:?})", snapshot.value, snapshot.status);

    let persisted = host.persisted(&large)?;
    println!("\nPersisted state:\n{}", persisted.to_json_pretty()?);

    println!("\n=== Example Complete ===");
    Ok(())
}
