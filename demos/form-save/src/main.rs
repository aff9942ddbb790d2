//! # Form Save Example
//!
//! Binds a `save` async function to SAVE / SAVE_SUCCESS / SAVE_ERROR
//! events. A simulated backend subscribes to SAVE and answers with the
//! outcome event; the caller just awaits the function.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tether_core::{BindingConfig, BindingLifecycle, DispatchEngine, Event, MemoryBus};

// ============================================================================
// Backend (subscribes to SAVE, answers with SAVE_SUCCESS / SAVE_ERROR)
// ============================================================================

fn attach_backend(bus: &Arc<MemoryBus>) -> Result<()> {
    let responder = Arc::clone(bus);
    bus.subscribe(
        "SAVE".into(),
        Arc::new(move |event: &Event| {
            let bus = Arc::clone(&responder);
            let payload = event.payload.clone();
            // Answer on a later tick, the way a real backend would.
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                match payload["name"].as_str() {
                    Some(name) if !name.is_empty() => {
                        bus.dispatch(Event::new("SAVE_SUCCESS", json!({ "saved": name })));
                    }
                    _ => {
                        bus.dispatch(Event::new("SAVE_ERROR", "a name is required"));
                    }
                }
            });
        }),
    )?;
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let bus = Arc::new(MemoryBus::new());
    attach_backend(&bus)?;

    let engine: Arc<dyn DispatchEngine> = bus.clone();
    let mut lifecycle = BindingLifecycle::new(engine);
    let save = lifecycle.activate(
        BindingConfig::new("SAVE", "SAVE_SUCCESS", "SAVE_ERROR")
            .get_payload(|event| event.payload["saved"].clone()),
    )?;

    for name in ["Ada", ""] {
        println!("Saving {name:?}...");
        match save.invoke(json!({ "name": name })).await {
            Ok(saved) => println!("  saved: {saved}"),
            Err(err) => println!("  failed: {err}"),
        }
    }

    lifecycle.deactivate();
    println!("All saves complete!");

    Ok(())
}
