//! Integration tests for the broadcast hub
//!
//! These tests validate fan-out behaviour with many observers:
//! - Every observer sees every frame in order
//! - Slow and departed observers never affect the others
//! - Concurrent publish and unregister stay consistent

mod common;

use pulse_relay::broadcast::{BroadcastHub, ObserverId};
use pulse_relay::config::HubSettings;
use pulse_relay::types::{Frame, ScalarReading};
use std::sync::Arc;
use std::thread;

fn reading(value: f64) -> Frame {
    Frame::Scalar(ScalarReading {
        device_timestamp: None,
        host_timestamp: common::mock_helpers::TEST_EPOCH_MS,
        value,
    })
}

#[test]
fn test_fan_out_preserves_order_per_observer() {
    let hub = BroadcastHub::default();
    let mut streams: Vec<_> = (0..5).map(|_| hub.subscribe().1).collect();

    for i in 0..50 {
        assert_eq!(hub.publish(&reading(i as f64)), 5);
    }

    for rx in streams.iter_mut() {
        let values: Vec<f64> = common::mock_helpers::drain_json(rx)
            .iter()
            .map(|m| m["value"].as_f64().unwrap())
            .collect();
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    let stats = hub.stats();
    assert_eq!(stats.published, 50);
    assert_eq!(stats.delivered, 250);
    assert_eq!(stats.lagged, 0);
}

#[test]
fn test_slow_observer_does_not_hold_back_others() {
    let hub = BroadcastHub::new(HubSettings { observer_queue: 4 });
    let (slow, _slow_rx) = hub.subscribe();
    let (_fast, mut fast_rx) = hub.subscribe();

    let mut fast_seen = 0;
    for i in 0..20 {
        hub.publish(&reading(i as f64));
        fast_seen += common::mock_helpers::drain_json(&mut fast_rx).len();
    }

    assert_eq!(fast_seen, 20);
    assert!(hub.contains(slow));
    assert_eq!(hub.stats().lagged, 16);
}

#[test]
fn test_departed_observer_is_removed_on_next_publish() {
    let hub = BroadcastHub::default();
    let (gone, gone_rx) = hub.subscribe();
    let (_stay, mut stay_rx) = hub.subscribe();
    drop(gone_rx);

    assert_eq!(hub.observer_count(), 2);
    hub.publish(&reading(1.0));
    assert_eq!(hub.observer_count(), 1);
    assert!(!hub.contains(gone));
    assert_eq!(common::mock_helpers::drain_json(&mut stay_rx).len(), 1);

    // unregistering after eviction is harmless
    assert!(!hub.unregister(gone));
}

#[test]
fn test_concurrent_publish_and_unregister() {
    let hub = Arc::new(BroadcastHub::default());
    let ids: Vec<(ObserverId, _)> = (0..8).map(|_| hub.subscribe()).collect();
    let (ids, streams): (Vec<_>, Vec<_>) = ids.into_iter().unzip();

    let publisher = {
        let hub = hub.clone();
        thread::spawn(move || {
            for i in 0..100 {
                hub.publish(&reading(i as f64));
            }
        })
    };
    let remover = {
        let hub = hub.clone();
        thread::spawn(move || {
            for id in ids.iter().step_by(2) {
                hub.unregister(*id);
                hub.unregister(*id);
            }
        })
    };

    publisher.join().unwrap();
    remover.join().unwrap();

    assert_eq!(hub.observer_count(), 4);
    assert_eq!(hub.stats().published, 100);
    drop(streams);
}
