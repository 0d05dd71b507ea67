//! Common test utilities and helpers

use baselaunch::{ClientConfig, ManualClock, Runtime, ScriptedTransport};
use std::path::Path;
use std::sync::Arc;

/// Epoch milliseconds the manual clock starts at
#[allow(dead_code)]
pub const T0: u64 = 1_700_000_000_000;

/// Load a response fixture
#[allow(dead_code)]
pub fn load_response_fixture(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = Path::new(manifest_dir)
        .join("tests")
        .join("fixtures")
        .join("responses")
        .join(format!("{}.json", name));

    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to load response fixture '{}' from {:?}: {}",
            name, path, e
        )
    })
}

/// A runtime on a manual clock and a scripted transport
#[allow(dead_code)]
pub struct Harness {
    pub runtime: Runtime,
    pub clock: ManualClock,
    pub transport: ScriptedTransport,
}

/// Build a [`Harness`] with `config`, starting online.
#[allow(dead_code)]
pub fn harness(config: ClientConfig) -> Harness {
    let clock = ManualClock::starting_at(T0);
    let transport = ScriptedTransport::new();
    let runtime = Runtime::builder()
        .config(config)
        .clock(Arc::new(clock.clone()))
        .transport(Arc::new(transport.clone()))
        .build()
        .expect("Failed to build runtime");
    Harness {
        runtime,
        clock,
        transport,
    }
}

/// Yield until `done` holds or the budget runs out.
#[allow(dead_code)]
pub async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
}
