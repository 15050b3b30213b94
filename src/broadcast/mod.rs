//! Broadcast fan-out of decoded frames to connected observers.
//!
//! - [`BroadcastHub`] - Owns the observer set; serializes once, delivers to all
//! - [`Observer`] - The hub's sending half of one client's bounded queue
//! - [`wire`] - The JSON message format observers receive
//!
//! The connection-accepting layer (see [`crate::server`]) calls
//! [`BroadcastHub::subscribe`] for every accepted client, drains the returned
//! [`ObserverStream`] into the socket, and calls
//! [`BroadcastHub::unregister`] before the stream is dropped.

pub mod hub;
pub mod observer;
pub mod wire;

pub use hub::BroadcastHub;
pub use observer::{DeliveryError, Observer, ObserverId, ObserverStream, Payload};
pub use wire::encode_frame;
