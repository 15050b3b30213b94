//! Mock construction helpers

use pulse_relay::backend::LinkSupervisor;
use pulse_relay::broadcast::{BroadcastHub, ObserverStream};
use pulse_relay::clock::ManualClock;
use pulse_relay::config::RelayConfig;
use pulse_relay::pipeline::IngestPipeline;
use pulse_relay::types::LinkState;
use std::sync::Arc;

/// Wall-clock start used by every test clock
pub const TEST_EPOCH_MS: i64 = 1_700_000_000_000;

/// Pipeline wired to a fresh hub and a manual clock
pub fn create_test_pipeline(
    config: &RelayConfig,
) -> (IngestPipeline, Arc<BroadcastHub>, Arc<ManualClock>) {
    let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
    let clock = Arc::new(ManualClock::new(TEST_EPOCH_MS));
    let pipeline = IngestPipeline::new(config, clock.clone(), hub.clone());
    (pipeline, hub, clock)
}

/// Supervisor wired to a fresh hub and a manual clock
pub fn create_test_supervisor(config: RelayConfig) -> (Arc<LinkSupervisor>, Arc<BroadcastHub>) {
    let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
    let clock = Arc::new(ManualClock::new(TEST_EPOCH_MS));
    let supervisor = Arc::new(LinkSupervisor::new(config, hub.clone(), clock));
    (supervisor, hub)
}

/// Wait until the supervisor reports `state`
pub async fn wait_for_state(supervisor: &LinkSupervisor, state: LinkState) {
    let mut rx = supervisor.subscribe();
    tokio::time::timeout(super::test_timeout(), rx.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", state))
        .expect("status channel closed");
}

/// Drain every queued payload as parsed JSON
pub fn drain_json(rx: &mut ObserverStream) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        out.push(serde_json::from_str(&payload).expect("payload is JSON"));
    }
    out
}
