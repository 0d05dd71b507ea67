//! Example demonstrating the offline queue with the baselaunch runtime
//!
//! This example shows how to:
//! 1. Build a runtime against a local backend
//! 2. Queue mutations while offline
//! 3. Replay them when connectivity returns
//!
//! # Usage
//!
//! ```bash
//! BASELAUNCH_ORIGIN=http://localhost:3000 cargo run --example offline_sync --features trace
//! ```

use anyhow::Context;
use baselaunch::prelude::*;
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "trace")]
    baselaunch::observability::init_tracing();

    let runtime = Runtime::from_env().context("failed to build runtime")?;
    let tasks = runtime.start();

    println!("Origin: {}", runtime.client.origin());

    runtime.connectivity.set_online(false);
    for app_id in [12, 31] {
        let options = RequestOptions::json(Method::Post, &json!({ "appId": app_id }))?;
        let action = runtime
            .client
            .queue_offline_action("/api/stack/add", options)
            .await;
        println!("Queued {} -> {}", action.id, action.endpoint);
    }
    println!("Pending: {}", runtime.client.offline_queue().len());

    runtime.connectivity.set_online(true);
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("Pending after reconnect: {}", runtime.client.offline_queue().len());
    for toast in runtime.toasts.active() {
        println!("[{:?}] {}", toast.severity, toast.message);
    }

    tasks.shutdown();
    Ok(())
}
