//! Network bring-up, time-sync gate and connectivity probe
//!
//! [`ConnectivityManager`] is the only writer of [`ConnectionState`]. Adapters
//! report through the [`LinkEvents`] queue and the manager applies whatever
//! has been delivered each time it polls.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{
    CellularAdapter, HttpClient, HttpError, LinkInfo, ScanResults, TimeSource, WifiAdapter,
};

use crate::error::{ConnectError, Credential, ProbeError, TimeSyncError};
use crate::events::LinkEvents;
use crate::settings::Settings;
use crate::state::{ConnectionState, NetworkMode};

/// Interval between link/time polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Window given to the radio for an access-point scan
pub const SCAN_WINDOW: Duration = Duration::from_secs(60);
/// Client timeout for one probe request
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Sleep for `duration` on an injected delay
pub(crate) async fn sleep<D: DelayNs>(delay: &mut D, duration: Duration) {
    let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    delay.delay_ms(ms).await;
}

pub struct ConnectivityManager<'a, M: RawMutex + 'static, D> {
    settings: &'a Settings,
    events: &'static LinkEvents<M>,
    delay: D,
    state: ConnectionState,
    wifi_retries_left: u32,
    wifi_subscribed: bool,
}

impl<'a, M, D> ConnectivityManager<'a, M, D>
where
    M: RawMutex + 'static,
    D: DelayNs,
{
    pub fn new(
        settings: &'a Settings,
        mode: NetworkMode,
        events: &'static LinkEvents<M>,
        delay: D,
    ) -> Self {
        Self {
            settings,
            events,
            delay,
            state: ConnectionState::new(mode),
            wifi_retries_left: settings.wifi_max_retry_count.max(1),
            wifi_subscribed: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Wi-Fi attempts left before [`ConnectError::ConnectionExhausted`]
    pub fn wifi_retries_left(&self) -> u32 {
        self.wifi_retries_left
    }

    /// Point a time source at this manager's event queue
    pub fn attach_time_source<T: TimeSource>(&mut self, source: &mut T) {
        source.subscribe(self.events);
    }

    /// Apply every event delivered so far; returns how many were applied
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.events.try_next() {
            trace!("Event: {:?}", event);
            self.state.apply(event);
            applied += 1;
        }
        applied
    }

    /// Make one Wi-Fi association attempt
    ///
    /// Each failed attempt consumes one unit of the retry budget. Looping is
    /// left to the caller: [`ConnectError::AttemptFailed`] means another call
    /// may succeed, [`ConnectError::ConnectionExhausted`] means it will not.
    pub async fn initialize_wifi<W: WifiAdapter>(
        &mut self,
        wifi: &mut W,
    ) -> Result<(), ConnectError> {
        let settings = self.settings;
        let ssid = settings.wifi_ssid.as_str();
        let password = settings.wifi_password.as_str();

        if ssid.is_empty() {
            error!("Wi-Fi SSID is not configured");
            return Err(ConnectError::MissingCredential(Credential::Ssid));
        }
        if password.is_empty() {
            error!("Wi-Fi password is not configured");
            return Err(ConnectError::MissingCredential(Credential::Password));
        }
        if self.wifi_retries_left == 0 {
            return Err(ConnectError::ConnectionExhausted);
        }

        if !self.wifi_subscribed {
            wifi.subscribe(self.events);
            self.wifi_subscribed = true;
        }
        self.state.set_ssid(ssid);

        info!("Scanning for access points");
        match wifi.scan(SCAN_WINDOW).await {
            Ok(access_points) => report_scan(&access_points),
            Err(e) => warn!("Scan failed: {:?}", e),
        }

        info!("Connecting to {}", ssid);
        match wifi.connect(ssid, password, settings.wifi_timeout()).await {
            Ok(()) => {
                info!("Associated with {}", ssid);
                self.process_events();
                Ok(())
            }
            Err(e) => {
                self.wifi_retries_left = self.wifi_retries_left.saturating_sub(1);
                if self.wifi_retries_left == 0 {
                    error!("Cannot connect to {}: {:?}, no retries left", ssid, e);
                    Err(ConnectError::ConnectionExhausted)
                } else {
                    warn!(
                        "Cannot connect to {}: {:?}, {} retries left",
                        ssid, e, self.wifi_retries_left
                    );
                    Err(ConnectError::AttemptFailed {
                        remaining: self.wifi_retries_left,
                    })
                }
            }
        }
    }

    /// Wait for the modem to attach and commit its addresses
    ///
    /// With `deadline = None` this polls forever. Settling after the first
    /// attach is not counted against the deadline.
    pub async fn initialize_cellular<C: CellularAdapter>(
        &mut self,
        modem: &C,
        deadline: Option<Duration>,
    ) -> Result<(), ConnectError> {
        info!("Cellular APN: {}", self.settings.cell_apn_name);

        let mut waited = Duration::from_ticks(0);
        let mut settled = false;
        loop {
            self.process_events();

            if modem.is_connected() {
                if !settled {
                    info!(
                        "Modem attached, settling for {} s",
                        self.settings.cell_wake_up_delay_secs
                    );
                    sleep(&mut self.delay, self.settings.cell_wake_up_delay()).await;
                    settled = true;
                }
                if let Some(link) = assigned_link(modem) {
                    self.state.connect(link);
                    info!(
                        "Cellular link up: ip {} subnet {} gateway {}",
                        link.address, link.subnet_mask, link.gateway
                    );
                    return Ok(());
                }
                debug!("Modem attached without addresses");
            } else {
                debug!("Waiting for cellular link");
            }

            if deadline.is_some_and(|d| waited >= d) {
                error!("Cellular link not up after {} s", waited.as_secs());
                return Err(ConnectError::DeadlineExceeded);
            }
            sleep(&mut self.delay, POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }

    /// Block until network time has been applied at least once
    ///
    /// Returns without suspending when time is already synced.
    pub async fn wait_for_time_sync(
        &mut self,
        deadline: Option<Duration>,
    ) -> Result<(), TimeSyncError> {
        self.process_events();
        if self.state.is_time_synced() {
            return Ok(());
        }

        info!("Waiting for network time");
        let mut waited = Duration::from_ticks(0);
        loop {
            if deadline.is_some_and(|d| waited >= d) {
                error!("No network time after {} s", waited.as_secs());
                return Err(TimeSyncError::DeadlineExceeded);
            }
            sleep(&mut self.delay, POLL_INTERVAL).await;
            waited += POLL_INTERVAL;

            self.process_events();
            if self.state.is_time_synced() {
                info!("Network time synced");
                return Ok(());
            }
            trace!("Still waiting for network time");
        }
    }

    /// Fetch `url` once and return the body as text
    ///
    /// Every failure is logged here; callers are free to ignore the error.
    pub async fn probe<'b, H: HttpClient>(
        &self,
        client: &mut H,
        url: &str,
        body: &'b mut [u8],
    ) -> Result<&'b str, ProbeError> {
        info!("GET {}", url);
        let response = match client.get(url, PROBE_TIMEOUT, &mut *body).await {
            Ok(response) => response,
            Err(HttpError::Timeout) => {
                info!("Request timed out");
                return Err(ProbeError::Timeout);
            }
            Err(HttpError::Transport) => {
                info!("Request failed: transport error");
                return Err(ProbeError::Transport);
            }
        };

        if !response.is_success() {
            info!("Response status code: {}", response.status);
            return Err(ProbeError::Status(response.status));
        }

        let body: &'b [u8] = body;
        let len = response.body_len.min(body.len());
        match core::str::from_utf8(&body[..len]) {
            Ok(text) => {
                info!("Response: {}", text);
                Ok(text)
            }
            // Body was cut inside a multi-byte character at the buffer end.
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = core::str::from_utf8(&body[..valid])
                    .map_err(|_| ProbeError::InvalidBody)?;
                info!("Response (truncated to {} bytes): {}", valid, text);
                Ok(text)
            }
            Err(_) => {
                info!("Response body is not UTF-8 ({} bytes)", len);
                Err(ProbeError::InvalidBody)
            }
        }
    }
}

/// Link info from the modem, ignoring an address that is still `0.0.0.0`
fn assigned_link<C: CellularAdapter>(modem: &C) -> Option<LinkInfo> {
    modem.link_info().filter(|link| !link.address.is_unspecified())
}

fn report_scan(access_points: &ScanResults) {
    if access_points.is_empty() {
        info!("No access points detected");
        return;
    }
    info!("Access points ({}):", access_points.len());
    for ap in access_points {
        info!(
            "  {} | {} dBm | {} | {} MHz",
            ap.ssid, ap.rssi_dbm, ap.bssid, ap.channel
        );
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use hal_abstractions::{AccessPoint, Bssid, EventSink, NetworkEvent, WifiError};

    use super::*;
    use crate::settings::keys;
    use crate::testing::{
        leak_events, link, MockDelay, MockHttp, MockModem, MockWifi, TestEvents,
    };

    fn wifi_settings(retries: &str) -> Settings {
        Settings::from_source(&[
            (keys::WIFI_SSID, "Net1"),
            (keys::WIFI_PASSWORD, "secret"),
            (keys::WIFI_MAX_RETRY_COUNT, retries),
        ])
    }

    type TestManager<'a> = ConnectivityManager<'a, NoopRawMutex, MockDelay>;

    fn manager(
        settings: &Settings,
        mode: NetworkMode,
    ) -> (TestManager<'_>, &'static TestEvents, MockDelay) {
        let events = leak_events();
        let delay = MockDelay::new();
        (
            ConnectivityManager::new(settings, mode, events, delay.clone()),
            events,
            delay,
        )
    }

    #[test]
    fn missing_credentials_make_no_radio_calls() {
        let settings = Settings::from_source(&[(keys::WIFI_PASSWORD, "secret")]);
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([Ok(link(5))]);
        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::MissingCredential(Credential::Ssid))
        );

        let settings = Settings::from_source(&[(keys::WIFI_SSID, "Net1")]);
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::MissingCredential(Credential::Password))
        );

        let log = wifi.log.borrow();
        assert_eq!(log.subscribes, 0);
        assert_eq!(log.scans, 0);
        assert!(log.connects.is_empty());
    }

    #[test]
    fn succeeds_on_third_attempt() {
        let settings = wifi_settings("3");
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([
            Err(WifiError::Timeout),
            Err(WifiError::AuthenticationFailed),
            Ok(link(30)),
        ]);

        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::AttemptFailed { remaining: 2 })
        );
        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::AttemptFailed { remaining: 1 })
        );
        assert_eq!(block_on(mgr.initialize_wifi(&mut wifi)), Ok(()));

        let state = mgr.state();
        assert!(state.is_connected());
        assert_eq!(state.ip_address(), Some(link(30).address));
        assert_eq!(state.ssid(), Some("Net1"));

        let log = wifi.log.borrow();
        assert_eq!(log.subscribes, 1);
        assert_eq!(log.connects.len(), 3);
        assert_eq!(log.connects[0].0, "Net1");
        assert_eq!(log.connects[0].2, Duration::from_secs(30));
    }

    #[test]
    fn single_retry_exhausts_after_one_attempt() {
        let settings = wifi_settings("1");
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([]);

        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::ConnectionExhausted)
        );
        assert_eq!(
            block_on(mgr.initialize_wifi(&mut wifi)),
            Err(ConnectError::ConnectionExhausted)
        );
        assert_eq!(wifi.log.borrow().connects.len(), 1);
        assert!(!mgr.state().is_connected());
    }

    #[test]
    fn zero_retries_still_allows_one_attempt() {
        let settings = wifi_settings("0");
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        assert_eq!(mgr.wifi_retries_left(), 1);
        let mut wifi = MockWifi::new([Ok(link(8))]);
        assert_eq!(block_on(mgr.initialize_wifi(&mut wifi)), Ok(()));
    }

    #[test]
    fn scan_result_does_not_gate_connect() {
        let settings = wifi_settings("3");
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([Ok(link(9))]).with_scan(Err(WifiError::Radio));
        assert_eq!(block_on(mgr.initialize_wifi(&mut wifi)), Ok(()));
        assert_eq!(wifi.log.borrow().scans, 1);

        let mut ssid = heapless::String::new();
        ssid.push_str("Net1").unwrap();
        let mut aps = ScanResults::new();
        let _ = aps.push(AccessPoint {
            ssid,
            rssi_dbm: -61,
            bssid: Bssid([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
            channel: 2412,
        });
        let (mut mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([Ok(link(9))]).with_scan(Ok(aps));
        assert_eq!(block_on(mgr.initialize_wifi(&mut wifi)), Ok(()));
    }

    #[test]
    fn disconnect_event_clears_link() {
        let settings = wifi_settings("3");
        let (mut mgr, events, _) = manager(&settings, NetworkMode::Wifi);
        let mut wifi = MockWifi::new([Ok(link(12))]);
        block_on(mgr.initialize_wifi(&mut wifi)).unwrap();
        assert!(mgr.state().is_connected());

        events.post(NetworkEvent::Disconnected);
        assert_eq!(mgr.process_events(), 1);
        assert!(!mgr.state().is_connected());
        assert_eq!(mgr.state().gateway(), None);
    }

    #[test]
    fn cellular_settles_then_commits_link() {
        let settings = Settings::default();
        let (mut mgr, _, delay) = manager(&settings, NetworkMode::Cellular);
        let modem = MockModem::new(Some(2), Some(link(40)));

        assert_eq!(block_on(mgr.initialize_cellular(&modem, None)), Ok(()));
        assert_eq!(delay.calls(), vec![1000, 1000, 15_000]);
        assert_eq!(modem.polls.get(), 3);
        assert_eq!(mgr.state().link(), Some(&link(40)));
    }

    #[test]
    fn cellular_keeps_polling_without_addresses() {
        let settings = Settings::default();
        let (mut mgr, _, delay) = manager(&settings, NetworkMode::Cellular);
        let modem = MockModem::new(Some(0), None);

        assert_eq!(
            block_on(mgr.initialize_cellular(&modem, Some(Duration::from_secs(2)))),
            Err(ConnectError::DeadlineExceeded)
        );
        assert_eq!(delay.calls(), vec![15_000, 1000, 1000]);
        assert!(!mgr.state().is_connected());
    }

    #[test]
    fn cellular_deadline_bounds_the_wait() {
        let settings = Settings::default();
        let (mut mgr, _, delay) = manager(&settings, NetworkMode::Cellular);
        let modem = MockModem::new(None, None);

        assert_eq!(
            block_on(mgr.initialize_cellular(&modem, Some(Duration::from_secs(3)))),
            Err(ConnectError::DeadlineExceeded)
        );
        assert_eq!(delay.calls(), vec![1000, 1000, 1000]);
        assert_eq!(modem.polls.get(), 4);
    }

    #[test]
    fn time_sync_returns_at_once_when_synced() {
        let settings = Settings::default();
        let (mut mgr, events, delay) = manager(&settings, NetworkMode::Cellular);
        events.post(NetworkEvent::TimeChanged { unix_secs: 1_700_000_000 });

        assert_eq!(block_on(mgr.wait_for_time_sync(None)), Ok(()));
        assert!(delay.calls().is_empty());

        events.post(NetworkEvent::TimeChanged { unix_secs: 1_700_000_900 });
        assert_eq!(block_on(mgr.wait_for_time_sync(None)), Ok(()));
        assert!(delay.calls().is_empty());
        assert!(mgr.state().is_time_synced());
    }

    #[test]
    fn time_sync_waits_for_first_event() {
        let settings = Settings::default();
        let (mut mgr, events, delay) = manager(&settings, NetworkMode::Cellular);
        delay.schedule(events, 2500, NetworkEvent::TimeChanged { unix_secs: 42 });
        delay.schedule(events, 2500, NetworkEvent::TimeChanged { unix_secs: 43 });

        assert_eq!(block_on(mgr.wait_for_time_sync(None)), Ok(()));
        assert_eq!(delay.calls(), vec![1000, 1000, 1000]);
        assert!(mgr.state().is_time_synced());
    }

    #[test]
    fn time_sync_deadline() {
        let settings = Settings::default();
        let (mut mgr, _, delay) = manager(&settings, NetworkMode::Wifi);
        assert_eq!(
            block_on(mgr.wait_for_time_sync(Some(Duration::from_secs(2)))),
            Err(TimeSyncError::DeadlineExceeded)
        );
        assert_eq!(delay.elapsed_ms(), 2000);
    }

    #[test]
    fn probe_returns_body_on_success() {
        let settings = Settings::default();
        let (mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut http = MockHttp::new(Ok((200, &b"{\"args\":{}}"[..])));
        let mut body = [0u8; 64];

        let text = block_on(mgr.probe(&mut http, "http://echo.local/get", &mut body));
        assert_eq!(text, Ok("{\"args\":{}}"));
        let requests = http.requests.borrow();
        assert_eq!(requests[0].0, "http://echo.local/get");
        assert_eq!(requests[0].1, PROBE_TIMEOUT);
    }

    #[test]
    fn split_character_at_buffer_end_is_trimmed() {
        let settings = Settings::default();
        let (mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut http = MockHttp::new(Ok((200, "ok é".as_bytes())));
        let mut body = [0u8; 4];

        let text = block_on(mgr.probe(&mut http, "http://echo.local/", &mut body));
        assert_eq!(text, Ok("ok "));
    }

    #[test]
    fn probe_failures_become_errors() {
        let settings = Settings::default();
        let (mgr, _, _) = manager(&settings, NetworkMode::Wifi);
        let mut body = [0u8; 16];

        let cases = [
            (MockHttp::new(Err(HttpError::Timeout)), ProbeError::Timeout),
            (MockHttp::new(Err(HttpError::Transport)), ProbeError::Transport),
            (MockHttp::new(Ok((503, &b"busy"[..]))), ProbeError::Status(503)),
            (MockHttp::new(Ok((200, &[0xff_u8, 0xfe][..]))), ProbeError::InvalidBody),
        ];
        for (mut http, expected) in cases {
            assert_eq!(
                block_on(mgr.probe(&mut http, "http://echo.local/", &mut body)),
                Err(expected)
            );
        }
    }
}
