//! BroadcastHub: owns the set of connected observers and fans frames out to them.
//!
//! Each frame is serialized once; the same payload is queued to every observer
//! with a non-blocking send. A slow observer loses frames instead of stalling
//! the pipeline, and a closed observer is removed on the spot.

use crate::broadcast::observer::{DeliveryError, Observer, ObserverId, ObserverStream, Payload};
use crate::broadcast::wire::encode_frame;
use crate::config::HubSettings;
use crate::types::{Frame, HubStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct HubInner {
    observers: HashMap<ObserverId, Observer>,
    stats: HubStats,
}

pub struct BroadcastHub {
    inner: Mutex<HubInner>,
    next_id: AtomicU64,
    settings: HubSettings,
}

impl BroadcastHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                observers: HashMap::new(),
                stats: HubStats::default(),
            }),
            next_id: AtomicU64::new(1),
            settings,
        }
    }

    /// Add an observer to the broadcast set.
    ///
    /// An observer whose stream is already closed is not added.
    pub fn register(&self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if observer.is_closed() {
            tracing::debug!("Observer {} closed before registration", id);
            return id;
        }

        let mut inner = self.inner.lock();
        inner.observers.insert(id, observer);
        tracing::info!("Observer {} registered ({} connected)", id, inner.observers.len());
        id
    }

    /// Create an observer queue with the configured depth and register it.
    pub fn subscribe(&self) -> (ObserverId, ObserverStream) {
        let (observer, stream) = Observer::channel(self.settings.observer_queue);
        (self.register(observer), stream)
    }

    /// Remove an observer. Unknown or already removed ids are ignored.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.observers.remove(&id).is_some();
        if removed {
            tracing::info!(
                "Observer {} unregistered ({} connected)",
                id,
                inner.observers.len()
            );
        }
        removed
    }

    /// Serialize `frame` once and deliver it to every observer.
    ///
    /// Returns how many observers accepted the frame.
    pub fn publish(&self, frame: &Frame) -> usize {
        match encode_frame(frame) {
            Ok(json) => self.publish_payload(Arc::from(json)),
            Err(e) => {
                tracing::error!("Failed to serialize {} frame: {}", frame.kind(), e);
                0
            }
        }
    }

    /// Deliver an already serialized payload to every observer.
    pub fn publish_payload(&self, payload: Payload) -> usize {
        let mut inner = self.inner.lock();
        let HubInner { observers, stats } = &mut *inner;
        stats.published += 1;

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, observer) in observers.iter() {
            match observer.deliver(&payload) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Lagging) => {
                    stats.lagged += 1;
                    tracing::debug!("Observer {} lagging; frame skipped", id);
                }
                Err(DeliveryError::Closed) => closed.push(*id),
            }
        }

        for id in closed {
            observers.remove(&id);
            stats.evicted += 1;
            tracing::info!("Observer {} dropped after send failure", id);
        }
        stats.delivered += delivered as u64;

        tracing::debug!(
            "Broadcast {} bytes to {}/{} observers",
            payload.len(),
            delivered,
            observers.len()
        );
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.inner.lock().observers.contains_key(&id)
    }

    pub fn stats(&self) -> HubStats {
        self.inner.lock().stats
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarReading;

    fn reading(value: f64) -> Frame {
        Frame::Scalar(ScalarReading {
            device_timestamp: None,
            host_timestamp: 1_700_000_000_000,
            value,
        })
    }

    #[test]
    fn test_publish_reaches_all_observers() {
        let hub = BroadcastHub::default();
        let (_a, mut rx_a) = hub.subscribe();
        let (_b, mut rx_b) = hub.subscribe();

        assert_eq!(hub.publish(&reading(97.0)), 2);

        let a = rx_a.try_recv().unwrap();
        let b = rx_b.try_recv().unwrap();
        assert_eq!(a, b);
        // one serialization shared by both
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let hub = BroadcastHub::default();
        let (a, _rx_a) = hub.subscribe();
        let (_b, mut rx_b) = hub.subscribe();

        assert!(hub.unregister(a));
        assert!(!hub.unregister(a));
        assert!(!hub.unregister(ObserverId(999)));
        assert_eq!(hub.observer_count(), 1);

        assert_eq!(hub.publish(&reading(1.0)), 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_closed_observer_is_evicted_without_affecting_others() {
        let hub = BroadcastHub::default();
        let (a, rx_a) = hub.subscribe();
        let (b, mut rx_b) = hub.subscribe();
        drop(rx_a);

        assert_eq!(hub.publish(&reading(1.0)), 1);
        assert!(!hub.contains(a));
        assert!(hub.contains(b));
        assert!(rx_b.try_recv().is_ok());
        assert_eq!(hub.stats().evicted, 1);
    }

    #[test]
    fn test_slow_observer_skips_frames_but_stays() {
        let hub = BroadcastHub::new(HubSettings { observer_queue: 1 });
        let (slow, mut rx_slow) = hub.subscribe();

        assert_eq!(hub.publish(&reading(1.0)), 1);
        assert_eq!(hub.publish(&reading(2.0)), 0);
        assert!(hub.contains(slow));
        assert_eq!(hub.stats().lagged, 1);

        // the queued frame is the first one
        assert!(rx_slow.try_recv().unwrap().contains("1.0"));
    }

    #[test]
    fn test_register_closed_observer_is_ignored() {
        let hub = BroadcastHub::default();
        let (observer, rx) = Observer::channel(4);
        drop(rx);
        hub.register(observer);
        assert_eq!(hub.observer_count(), 0);
    }

    #[test]
    fn test_per_observer_fifo() {
        let hub = BroadcastHub::default();
        let (_id, mut rx) = hub.subscribe();
        for i in 0..10 {
            hub.publish(&reading(i as f64));
        }
        for i in 0..10 {
            let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(msg["value"], serde_json::json!(i as f64));
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let hub = BroadcastHub::default();
        let (a, _ra) = hub.subscribe();
        hub.unregister(a);
        let (b, _rb) = hub.subscribe();
        assert_ne!(a, b);
    }
}
