//! Hardware abstraction traits for the linkcheck firmware
//!
//! This crate defines the surfaces the connectivity core consumes and that
//! each board implements: the radio/modem adapters, the time source, the RGB
//! status output and the HTTP transport. BSPs implement these traits; the
//! core never touches a peripheral directly.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod cellular;
pub mod http;
pub mod net;
pub mod rgb;
pub mod time;
pub mod wifi;

pub use cellular::CellularAdapter;
pub use http::{HttpClient, HttpError, HttpResponse, HttpUrl};
pub use net::{EventSink, Ipv4Address, LinkInfo, NetworkEvent};
pub use rgb::{Color, RgbOutput};
pub use time::TimeSource;
pub use wifi::{AccessPoint, Bssid, ScanResults, WifiAdapter, WifiError};

/// Stand-in for an adapter a board does not have.
///
/// Uninhabited, so a board without Wi-Fi can still name
/// `NetworkAdapter<Unsupported, MyModem>` and the Wi-Fi arm is statically dead.
#[derive(Debug)]
pub enum Unsupported {}

impl WifiAdapter for Unsupported {
    fn subscribe(&mut self, _sink: &'static dyn EventSink) {
        match *self {}
    }

    async fn scan(&mut self, _timeout: embassy_time::Duration) -> Result<ScanResults, WifiError> {
        match *self {}
    }

    async fn connect(
        &mut self,
        _ssid: &str,
        _password: &str,
        _timeout: embassy_time::Duration,
    ) -> Result<(), WifiError> {
        match *self {}
    }
}

impl CellularAdapter for Unsupported {
    fn is_connected(&self) -> bool {
        match *self {}
    }

    fn link_info(&self) -> Option<LinkInfo> {
        match *self {}
    }
}
