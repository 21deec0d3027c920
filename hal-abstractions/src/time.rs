//! Network time source surface

use crate::net::EventSink;

/// Something that sets wall-clock time from the network
///
/// After subscribing, the source posts
/// [`NetworkEvent::TimeChanged`](crate::NetworkEvent::TimeChanged) each time
/// the clock is set. The first post is the one consumers wait for; later ones
/// are re-syncs.
pub trait TimeSource {
    fn subscribe(&mut self, sink: &'static dyn EventSink);
}
