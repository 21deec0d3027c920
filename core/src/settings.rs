//! Application settings snapshot
//!
//! Parsed once at startup from the host's flat key/value store. Every field
//! has a default that is used whenever the key is absent, blank, too long
//! for the field, or not of the expected type. Parsing never fails.

use core::fmt;

use embassy_time::Duration;
use hal_abstractions::wifi::MAX_SSID_LEN;
use heapless::String;

pub const DEVICE_NAME_LEN: usize = 32;
/// WPA2 passphrases are at most 63 characters (64 for a raw PSK)
pub const WIFI_PASSWORD_LEN: usize = 64;
/// 3GPP TS 23.003 caps an APN at 100 octets
pub const APN_LEN: usize = 100;
pub const URL_LEN: usize = 128;

pub const DEFAULT_PROBE_URL: &str = "http://postman-echo.com/get?foo1=bar1&foo2=bar2";

/// Keys understood by [`Settings::from_source`]
pub mod keys {
    pub const DEVICE_NAME: &str = "TestApp.DeviceName";
    pub const WIFI_SSID: &str = "TestApp.WifiSsid";
    pub const WIFI_PASSWORD: &str = "TestApp.WifiPassword";
    pub const WIFI_WAKE_UP_DELAY_SECONDS: &str = "TestApp.WifiWakeUpDelaySeconds";
    pub const WIFI_MAX_RETRY_COUNT: &str = "TestApp.WifiMaxRetryCount";
    pub const WIFI_TIMEOUT_SECONDS: &str = "TestApp.WifiTimeoutSeconds";
    pub const CELL_APN_NAME: &str = "TestApp.CellApnName";
    pub const CELL_WAKE_UP_DELAY_SECONDS: &str = "TestApp.CellWakeUpDelaySeconds";
    pub const CELL_TIMEOUT_SECONDS: &str = "TestApp.CellTimeoutSeconds";
    pub const CELL_RETRY_DELAY_SECONDS: &str = "TestApp.CellRetryDelaySeconds";
    pub const CELL_MAX_RETRY_COUNT: &str = "TestApp.CellMaxRetryCount";
    pub const CELL_ENFORCE_TIMEOUT: &str = "TestApp.CellEnforceTimeout";
    pub const TIME_SYNC_TIMEOUT_SECONDS: &str = "TestApp.TimeSyncTimeoutSeconds";
    /// Target of the workload request; transports may refuse `https://`
    pub const PROBE_URL: &str = "TestApp.ProbeUrl";
    pub const PULSE_DURATION_MS: &str = "TestApp.PulseDurationMs";
}

/// Flat string-keyed configuration supplied by the host platform
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<&str>;
}

impl SettingsSource for [(&str, &str)] {
    fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

impl<const N: usize> SettingsSource for [(&str, &str); N] {
    fn get(&self, key: &str) -> Option<&str> {
        SettingsSource::get(self.as_slice(), key)
    }
}

/// Immutable configuration snapshot
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub device_name: String<DEVICE_NAME_LEN>,

    pub wifi_ssid: String<MAX_SSID_LEN>,
    pub wifi_password: String<WIFI_PASSWORD_LEN>,
    /// Read for completeness; association settles inside the adapter
    pub wifi_wake_up_delay_secs: u32,
    pub wifi_max_retry_count: u32,
    pub wifi_timeout_secs: u32,

    pub cell_apn_name: String<APN_LEN>,
    /// Settle time after the modem first reports an attached link
    pub cell_wake_up_delay_secs: u32,
    pub cell_timeout_secs: u32,
    /// Read for completeness; the host restart policy owns re-attach pacing
    pub cell_retry_delay_secs: u32,
    pub cell_max_retry_count: u32,
    /// Bound the modem wait by `cell_timeout_secs * cell_max_retry_count`
    pub cell_enforce_timeout: bool,

    /// Zero waits forever for the first time event
    pub time_sync_timeout_secs: u32,

    pub probe_url: String<URL_LEN>,
    pub pulse_duration_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: fit("MeadowTest"),
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_wake_up_delay_secs: 15,
            wifi_max_retry_count: 3,
            wifi_timeout_secs: 30,
            cell_apn_name: fit("TestApp.vzwentp"),
            cell_wake_up_delay_secs: 15,
            cell_timeout_secs: 60,
            cell_retry_delay_secs: 900,
            cell_max_retry_count: 3,
            cell_enforce_timeout: false,
            time_sync_timeout_secs: 0,
            probe_url: fit(DEFAULT_PROBE_URL),
            pulse_duration_ms: 1000,
        }
    }
}

impl Settings {
    /// Parse a snapshot, substituting the default for every unusable value
    pub fn from_source<S: SettingsSource + ?Sized>(source: &S) -> Self {
        let d = Self::default();
        Self {
            device_name: parse_string(source, keys::DEVICE_NAME, d.device_name),
            wifi_ssid: parse_string(source, keys::WIFI_SSID, d.wifi_ssid),
            wifi_password: parse_secret(source, keys::WIFI_PASSWORD, d.wifi_password),
            wifi_wake_up_delay_secs: parse_u32(
                source,
                keys::WIFI_WAKE_UP_DELAY_SECONDS,
                d.wifi_wake_up_delay_secs,
            ),
            wifi_max_retry_count: parse_u32(
                source,
                keys::WIFI_MAX_RETRY_COUNT,
                d.wifi_max_retry_count,
            ),
            wifi_timeout_secs: parse_u32(source, keys::WIFI_TIMEOUT_SECONDS, d.wifi_timeout_secs),
            cell_apn_name: parse_string(source, keys::CELL_APN_NAME, d.cell_apn_name),
            cell_wake_up_delay_secs: parse_u32(
                source,
                keys::CELL_WAKE_UP_DELAY_SECONDS,
                d.cell_wake_up_delay_secs,
            ),
            cell_timeout_secs: parse_u32(source, keys::CELL_TIMEOUT_SECONDS, d.cell_timeout_secs),
            cell_retry_delay_secs: parse_u32(
                source,
                keys::CELL_RETRY_DELAY_SECONDS,
                d.cell_retry_delay_secs,
            ),
            cell_max_retry_count: parse_u32(
                source,
                keys::CELL_MAX_RETRY_COUNT,
                d.cell_max_retry_count,
            ),
            cell_enforce_timeout: parse_bool(source, keys::CELL_ENFORCE_TIMEOUT),
            time_sync_timeout_secs: parse_u32(
                source,
                keys::TIME_SYNC_TIMEOUT_SECONDS,
                d.time_sync_timeout_secs,
            ),
            probe_url: parse_string(source, keys::PROBE_URL, d.probe_url),
            pulse_duration_ms: parse_u32(source, keys::PULSE_DURATION_MS, d.pulse_duration_ms),
        }
    }

    pub fn wifi_timeout(&self) -> Duration {
        Duration::from_secs(self.wifi_timeout_secs as u64)
    }

    pub fn cell_wake_up_delay(&self) -> Duration {
        Duration::from_secs(self.cell_wake_up_delay_secs as u64)
    }

    /// Deadline for the modem wait, `None` when it is unbounded
    pub fn cell_link_deadline(&self) -> Option<Duration> {
        self.cell_enforce_timeout.then(|| {
            Duration::from_secs(self.cell_timeout_secs as u64 * self.cell_max_retry_count as u64)
        })
    }

    /// Deadline for the time-sync gate, `None` when it is unbounded
    pub fn time_sync_deadline(&self) -> Option<Duration> {
        (self.time_sync_timeout_secs > 0)
            .then(|| Duration::from_secs(self.time_sync_timeout_secs as u64))
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms as u64)
    }
}

// Keeps the password out of logs and panic messages.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("device_name", &self.device_name)
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .field("wifi_wake_up_delay_secs", &self.wifi_wake_up_delay_secs)
            .field("wifi_max_retry_count", &self.wifi_max_retry_count)
            .field("wifi_timeout_secs", &self.wifi_timeout_secs)
            .field("cell_apn_name", &self.cell_apn_name)
            .field("cell_wake_up_delay_secs", &self.cell_wake_up_delay_secs)
            .field("cell_timeout_secs", &self.cell_timeout_secs)
            .field("cell_retry_delay_secs", &self.cell_retry_delay_secs)
            .field("cell_max_retry_count", &self.cell_max_retry_count)
            .field("cell_enforce_timeout", &self.cell_enforce_timeout)
            .field("time_sync_timeout_secs", &self.time_sync_timeout_secs)
            .field("probe_url", &self.probe_url)
            .field("pulse_duration_ms", &self.pulse_duration_ms)
            .finish()
    }
}

/// Copy a compile-time default into a bounded string; empty if it cannot fit
fn fit<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    // push_str is all-or-nothing, so an oversized value leaves `out` empty
    let _ = out.push_str(value);
    out
}

/// Raw value with `"` stripped; `None` if absent, blank or longer than `N`
fn raw_value<S: SettingsSource + ?Sized, const N: usize>(
    source: &S,
    key: &str,
) -> Option<String<N>> {
    let value = source.get(key)?;
    let mut out = String::<N>::new();
    for c in value.chars().filter(|c| *c != '"') {
        if out.push(c).is_err() {
            warn!("{} is longer than {} bytes, using default", key, N);
            return None;
        }
    }
    if out.trim().is_empty() {
        return None;
    }
    Some(out)
}

fn parse_string<S: SettingsSource + ?Sized, const N: usize>(
    source: &S,
    key: &str,
    default: String<N>,
) -> String<N> {
    match raw_value::<S, N>(source, key) {
        Some(value) => {
            trace!("{} = {}", key, value);
            value
        }
        None => {
            trace!("{} not set, default {}", key, default);
            default
        }
    }
}

fn parse_secret<S: SettingsSource + ?Sized, const N: usize>(
    source: &S,
    key: &str,
    default: String<N>,
) -> String<N> {
    match raw_value::<S, N>(source, key) {
        Some(value) => {
            trace!("{} = <redacted>", key);
            value
        }
        None => {
            trace!("{} not set", key);
            default
        }
    }
}

fn parse_u32<S: SettingsSource + ?Sized>(source: &S, key: &str, default: u32) -> u32 {
    let parsed = raw_value::<S, 16>(source, key).and_then(|v| v.trim().parse::<u32>().ok());
    match parsed {
        Some(value) => {
            trace!("{} = {}", key, value);
            value
        }
        None => {
            trace!("{} not set or not an integer, default {}", key, default);
            default
        }
    }
}

fn parse_bool<S: SettingsSource + ?Sized>(source: &S, key: &str) -> bool {
    let value = raw_value::<S, 8>(source, key).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    trace!("{} = {}", key, value);
    value
}
