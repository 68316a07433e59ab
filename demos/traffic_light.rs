//! Traffic Light Statechart
//!
//! This example demonstrates a cyclic statechart driven by timers.
//!
//! Key concepts:
//! - Delayed (`after`) transitions scheduled on the tokio runtime
//! - Context updates with a pure assigner
//! - Snapshot subscriptions
//! - Waiting for a condition with `wait_for`
//!
//! Run with: cargo run --example traffic_light

use serde_json::json;
use statecraft::telemetry::init_tracing;
use statecraft::{Actor, ActorOptions, Machine, MachineConfig, Snapshot};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("=== Traffic Light Statechart ===\n");

    let config: MachineConfig = serde_json::from_value(json!({
        "id": "light",
        "initial": "green",
        "context": { "cycles": 0 },
        "states": {
            "green": { "after": { "300": "yellow" } },
            "yellow": { "after": { "100": "red" } },
            "red": {
                "after": { "200": { "target": "green", "actions": "count_cycle" } }
            }
        }
    }))?;

    let machine = Machine::builder(config)
        .assign("count_cycle", |ctx, _| {
            Ok(json!({ "cycles": ctx["cycles"].as_i64().unwrap_or(0) + 1 }))
        })
        .build()?;

    let mut light = Actor::new(machine, ActorOptions::default());
    let _subscription = light.subscribe(|snapshot: &Snapshot| {
        println!("  light is {} (cycles: {})", snapshot.value, snapshot.context["cycles"]);
    });

    light.start()?;
    let snapshot = light
        .wait_for(|snapshot| snapshot.context["cycles"] == 2)
        .await?;

    println!("\nCompleted {} cycles", snapshot.context["cycles"]);
    light.stop();

    println!("\n=== Example Complete ===");
    Ok(())
}
