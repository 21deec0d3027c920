//! Wi-Fi adapter surface

use core::fmt;
use core::future::Future;

use embassy_time::Duration;
use heapless::{String, Vec};

use crate::net::EventSink;

/// Longest SSID allowed by 802.11
pub const MAX_SSID_LEN: usize = 32;

/// Upper bound on access points kept from one scan
pub const MAX_SCAN_RESULTS: usize = 16;

pub type ScanResults = Vec<AccessPoint, MAX_SCAN_RESULTS>;

/// Hardware address of an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bssid(pub [u8; 6]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Bssid {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d, e, g] = self.0;
        defmt::write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a,
            b,
            c,
            d,
            e,
            g
        )
    }
}

/// One entry of a scan report
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessPoint {
    pub ssid: String<MAX_SSID_LEN>,
    pub rssi_dbm: i16,
    pub bssid: Bssid,
    /// Channel centre frequency in MHz
    pub channel: u16,
}

/// Wi-Fi adapter failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiError {
    /// No association within the requested timeout
    Timeout,
    /// Access point rejected the credentials
    AuthenticationFailed,
    /// Requested SSID is not on the air
    NetworkNotFound,
    /// Radio/driver level failure
    Radio,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Association timeout"),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::NetworkNotFound => write!(f, "Network not found"),
            Self::Radio => write!(f, "Radio error"),
        }
    }
}

impl core::error::Error for WifiError {}

/// Station-mode Wi-Fi radio
///
/// `connect` returning `Ok` means the association succeeded; addresses arrive
/// later as a [`NetworkEvent::Connected`](crate::NetworkEvent::Connected)
/// posted to the subscribed sink.
pub trait WifiAdapter {
    /// Register a sink for connect/disconnect notifications
    ///
    /// The subscription outlives the call and stays active for the process
    /// lifetime.
    fn subscribe(&mut self, sink: &'static dyn EventSink);

    /// List visible access points, waiting at most `timeout`
    fn scan(&mut self, timeout: Duration) -> impl Future<Output = Result<ScanResults, WifiError>>;

    /// Associate with `ssid`, giving up after `timeout`
    fn connect(
        &mut self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), WifiError>>;
}
