//! Event queue between adapters and the connectivity manager

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use hal_abstractions::{EventSink, NetworkEvent};

/// Queue depth; producers post a handful of events at most per bring-up
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Bounded multi-producer queue of [`NetworkEvent`]s
///
/// Adapters and time sources hold it as `&'static dyn EventSink` and post
/// from any context. Only the connectivity manager drains it.
pub struct LinkEvents<M: RawMutex> {
    channel: Channel<M, NetworkEvent, EVENT_QUEUE_DEPTH>,
}

impl<M: RawMutex> LinkEvents<M> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Take the next delivered event without waiting
    pub fn try_next(&self) -> Option<NetworkEvent> {
        self.channel.try_receive().ok()
    }
}

impl<M: RawMutex> Default for LinkEvents<M> {
    fn default() -> Self {
        Self::new()
    }
}

// A full queue evicts its oldest entry so the newest link state always lands.
impl<M: RawMutex> EventSink for LinkEvents<M> {
    fn post(&self, event: NetworkEvent) {
        let mut event = event;
        while let Err(TrySendError::Full(rejected)) = self.channel.try_send(event) {
            if let Ok(stale) = self.channel.try_receive() {
                warn!("Event queue full, dropping {:?}", stale);
            }
            event = rejected;
        }
    }
}
