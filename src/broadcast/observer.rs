//! Observer handles: the hub's end of one client's outbound frame queue.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// A serialized frame, shared between every observer it is delivered to.
pub type Payload = Arc<str>;

/// Receiving end of an observer's queue, owned by the connection's writer task.
pub type ObserverStream = mpsc::Receiver<Payload>;

/// Hub-assigned observer identity. Never reused within a hub.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why one delivery attempt failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The observer's queue is full; this frame is skipped for it
    #[error("observer queue full")]
    Lagging,
    /// The observer's connection is gone
    #[error("observer channel closed")]
    Closed,
}

/// Sending half of one observer's bounded outbound queue.
pub struct Observer {
    tx: mpsc::Sender<Payload>,
}

impl Observer {
    /// Create an observer and the stream its connection drains.
    pub fn channel(capacity: usize) -> (Self, ObserverStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a payload without waiting.
    pub fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.tx.try_send(payload.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_and_receive() {
        let (observer, mut rx) = Observer::channel(2);
        let payload: Payload = Arc::from("{}");
        observer.deliver(&payload).unwrap();
        assert_eq!(rx.try_recv().unwrap().as_ref(), "{}");
    }

    #[test]
    fn test_full_queue_is_lagging() {
        let (observer, _rx) = Observer::channel(1);
        let payload: Payload = Arc::from("a");
        observer.deliver(&payload).unwrap();
        assert_eq!(observer.deliver(&payload), Err(DeliveryError::Lagging));
    }

    #[test]
    fn test_dropped_stream_is_closed() {
        let (observer, rx) = Observer::channel(4);
        drop(rx);
        assert!(observer.is_closed());
        assert_eq!(
            observer.deliver(&Arc::from("a")),
            Err(DeliveryError::Closed)
        );
    }
}
