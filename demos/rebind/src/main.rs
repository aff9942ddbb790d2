//! # Rebind Example
//!
//! Shows the lifecycle rules end to end: reconfiguring swaps the
//! binding in place, events matching the superseded rules stop
//! mattering, and teardown abandons whatever is still in flight.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tether_core::{BindingConfig, BindingLifecycle, DispatchEngine, Event, MemoryBus};
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<()> {
    let bus: Arc<dyn DispatchEngine> = Arc::new(MemoryBus::new());
    let mut lifecycle = BindingLifecycle::new(Arc::clone(&bus));

    // First configuration: SYNC completes on SYNC_DONE.
    let sync = lifecycle.activate(BindingConfig::new("SYNC", "SYNC_DONE", "SYNC_FAILED"))?;
    let call = sync.invoke(());
    bus.dispatch(Event::new("SYNC_DONE", "v1 complete"));
    println!("first binding resolved: {}", call.await?);

    // Same trigger, new resolve rule: the old binding is disposed
    // before the replacement registers.
    let sync = lifecycle.activate(BindingConfig::new("SYNC", "SYNC_COMPLETE", "SYNC_FAILED"))?;
    let call = sync.invoke(());

    bus.dispatch(Event::new("SYNC_DONE", "stale rule, ignored"));
    bus.dispatch(Event::new("SYNC_COMPLETE", "v2 complete"));
    println!("second binding skipped the stale event: {}", call.await?);

    // Teardown abandons in-flight calls; they simply never settle.
    let call = sync.invoke(());
    lifecycle.deactivate();
    bus.dispatch(Event::new("SYNC_COMPLETE", "too late"));
    match timeout(Duration::from_millis(50), call).await {
        Ok(settled) => println!("unexpected settlement: {settled:?}"),
        Err(_) => println!("call made before teardown stays pending, as documented"),
    }

    Ok(())
}
