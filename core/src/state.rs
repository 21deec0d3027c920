//! Connection state owned by the connectivity manager

use hal_abstractions::wifi::MAX_SSID_LEN;
use hal_abstractions::{Ipv4Address, LinkInfo, NetworkEvent};
use heapless::String;

/// Link type chosen by the platform at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkMode {
    Wifi,
    Cellular,
}

/// Snapshot of the device's network status
///
/// Addresses and the connected flag live in a single `Option<LinkInfo>` so
/// they are always committed and cleared together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    mode: NetworkMode,
    ssid: Option<String<MAX_SSID_LEN>>,
    link: Option<LinkInfo>,
    time_synced: bool,
}

impl ConnectionState {
    pub const fn new(mode: NetworkMode) -> Self {
        Self {
            mode,
            ssid: None,
            link: None,
            time_synced: false,
        }
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    pub fn ssid(&self) -> Option<&str> {
        self.ssid.as_deref()
    }

    pub fn link(&self) -> Option<&LinkInfo> {
        self.link.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn ip_address(&self) -> Option<Ipv4Address> {
        self.link.map(|l| l.address)
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Address> {
        self.link.map(|l| l.subnet_mask)
    }

    pub fn gateway(&self) -> Option<Ipv4Address> {
        self.link.map(|l| l.gateway)
    }

    pub fn is_time_synced(&self) -> bool {
        self.time_synced
    }

    pub(crate) fn set_ssid(&mut self, ssid: &str) {
        let mut s = String::new();
        // Settings already bound the SSID to MAX_SSID_LEN
        let _ = s.push_str(ssid);
        self.ssid = Some(s);
    }

    /// Commit a link as one step
    pub(crate) fn connect(&mut self, link: LinkInfo) {
        self.link = Some(link);
    }

    /// Apply one event; returns true if the state changed
    pub fn apply(&mut self, event: NetworkEvent) -> bool {
        match event {
            NetworkEvent::Connected(link) => {
                if self.link == Some(link) {
                    return false;
                }
                info!(
                    "Connected: ip {} subnet {} gateway {}",
                    link.address, link.subnet_mask, link.gateway
                );
                self.link = Some(link);
                true
            }
            NetworkEvent::Disconnected => {
                if self.link.take().is_none() {
                    return false;
                }
                warn!("Link lost");
                true
            }
            NetworkEvent::TimeChanged { unix_secs } => {
                if self.time_synced {
                    trace!("Time updated again: {}", unix_secs);
                    return false;
                }
                info!("Network time received: {}", unix_secs);
                self.time_synced = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: LinkInfo = LinkInfo {
        address: Ipv4Address::new(192, 168, 1, 20),
        subnet_mask: Ipv4Address::new(255, 255, 255, 0),
        gateway: Ipv4Address::new(192, 168, 1, 1),
    };

    #[test]
    fn starts_disconnected_and_unsynced() {
        let state = ConnectionState::new(NetworkMode::Cellular);
        assert_eq!(state.mode(), NetworkMode::Cellular);
        assert!(!state.is_connected());
        assert!(!state.is_time_synced());
        assert_eq!(state.ip_address(), None);
        assert_eq!(state.ssid(), None);
    }

    #[test]
    fn connected_event_sets_all_fields_together() {
        let mut state = ConnectionState::new(NetworkMode::Wifi);
        assert!(state.apply(NetworkEvent::Connected(LINK)));
        assert!(state.is_connected());
        assert_eq!(state.ip_address(), Some(LINK.address));
        assert_eq!(state.subnet_mask(), Some(LINK.subnet_mask));
        assert_eq!(state.gateway(), Some(LINK.gateway));
        assert!(!state.apply(NetworkEvent::Connected(LINK)));
    }

    #[test]
    fn disconnect_clears_link() {
        let mut state = ConnectionState::new(NetworkMode::Wifi);
        state.apply(NetworkEvent::Connected(LINK));
        assert!(state.apply(NetworkEvent::Disconnected));
        assert!(!state.is_connected());
        assert_eq!(state.gateway(), None);
        assert!(!state.apply(NetworkEvent::Disconnected));
    }

    #[test]
    fn time_sync_is_monotonic() {
        let mut state = ConnectionState::new(NetworkMode::Wifi);
        assert!(state.apply(NetworkEvent::TimeChanged { unix_secs: 1 }));
        assert!(!state.apply(NetworkEvent::TimeChanged { unix_secs: 2 }));
        state.apply(NetworkEvent::Disconnected);
        assert!(state.is_time_synced());
    }
}
