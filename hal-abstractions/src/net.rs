//! Link-level data shared between adapters and the connectivity core

use core::fmt;

/// IPv4 address as reported by a network adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    /// `0.0.0.0`, used when an adapter has no value for a field
    pub const UNSPECIFIED: Self = Self([0, 0, 0, 0]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self([a, b, c, d])
    }

    /// Build a subnet mask from a CIDR prefix length (clamped to 32)
    pub const fn netmask(prefix_len: u8) -> Self {
        let bits = if prefix_len >= 32 {
            u32::MAX
        } else if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        };
        Self(bits.to_be_bytes())
    }

    pub const fn is_unspecified(&self) -> bool {
        matches!(self.0, [0, 0, 0, 0])
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Self(octets)
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Address {
    fn from(addr: core::net::Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ipv4Address {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d] = self.0;
        defmt::write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// Addresses handed out when a link comes up
///
/// Always delivered as one value so that a consumer never sees a partially
/// populated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkInfo {
    pub address: Ipv4Address,
    pub subnet_mask: Ipv4Address,
    pub gateway: Ipv4Address,
}

/// Notifications posted by adapters and time sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkEvent {
    /// Association completed and addresses were assigned
    Connected(LinkInfo),
    /// Link lost
    Disconnected,
    /// Wall-clock time was set from the network
    TimeChanged { unix_secs: u64 },
}

/// Destination for [`NetworkEvent`]s
///
/// Implementations must not block: `post` may be called from an interrupt
/// handler or another task while the consumer is suspended.
pub trait EventSink {
    fn post(&self, event: NetworkEvent);
}
