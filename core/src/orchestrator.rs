//! Boot sequence
//!
//! Settings, mode selection, link bring-up, time-sync wait, then steady state.
//! Every phase change is mirrored on the status indicator; a failure in any
//! phase shows [`IndicatorState::Error`] and is handed back to the board.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{CellularAdapter, HttpClient, RgbOutput, TimeSource, WifiAdapter};

use crate::connectivity::{sleep, ConnectivityManager};
use crate::error::{BootError, ConnectError};
use crate::events::LinkEvents;
use crate::indicator::{IndicatorState, StatusIndicator};
use crate::settings::Settings;
use crate::state::{ConnectionState, NetworkMode};
use crate::workload;

/// Pause between Wi-Fi association attempts
pub const WIFI_RETRY_BACKOFF: Duration = Duration::from_millis(2000);

/// The link the platform brings to the device; fixes the network mode
pub enum NetworkAdapter<W, C> {
    Wifi(W),
    Cellular(C),
}

impl<W, C> NetworkAdapter<W, C> {
    pub fn mode(&self) -> NetworkMode {
        match self {
            Self::Wifi(_) => NetworkMode::Wifi,
            Self::Cellular(_) => NetworkMode::Cellular,
        }
    }
}

pub struct Orchestrator<'a, M: RawMutex + 'static, W, C, O, D> {
    manager: ConnectivityManager<'a, M, D>,
    indicator: StatusIndicator<O, D>,
    adapter: NetworkAdapter<W, C>,
    delay: D,
    phase: IndicatorState,
}

impl<'a, M, W, C, O, D> Orchestrator<'a, M, W, C, O, D>
where
    M: RawMutex + 'static,
    W: WifiAdapter,
    C: CellularAdapter,
    O: RgbOutput,
    D: DelayNs + Clone,
{
    pub fn new(
        settings: &'a Settings,
        adapter: NetworkAdapter<W, C>,
        output: O,
        events: &'static LinkEvents<M>,
        delay: D,
    ) -> Self {
        let mode = adapter.mode();
        Self {
            manager: ConnectivityManager::new(settings, mode, events, delay.clone()),
            indicator: StatusIndicator::new(output, delay.clone()),
            adapter,
            delay,
            phase: IndicatorState::Boot,
        }
    }

    /// Last phase entered by [`boot`](Self::boot)
    pub fn phase(&self) -> IndicatorState {
        self.phase
    }

    pub fn state(&self) -> &ConnectionState {
        self.manager.state()
    }

    pub fn attach_time_source<T: TimeSource>(&mut self, source: &mut T) {
        self.manager.attach_time_source(source);
    }

    /// Bring the device from power-on to [`IndicatorState::Idle`]
    pub async fn boot(&mut self) -> Result<(), BootError> {
        let settings = self.manager.settings();
        info!(
            "{} booting, network mode {:?}",
            settings.device_name,
            self.adapter.mode()
        );
        transition(&mut self.indicator, &mut self.phase, IndicatorState::Boot);

        let result = self.bring_up().await;
        if let Err(e) = result {
            error!("Boot failed: {}", e);
            transition(&mut self.indicator, &mut self.phase, IndicatorState::Error);
        }
        result
    }

    async fn bring_up(&mut self) -> Result<(), BootError> {
        let settings = self.manager.settings();

        match &mut self.adapter {
            NetworkAdapter::Cellular(modem) => {
                transition(
                    &mut self.indicator,
                    &mut self.phase,
                    IndicatorState::AcquiringCellLink,
                );
                self.manager
                    .initialize_cellular(modem, settings.cell_link_deadline())
                    .await?;
            }
            NetworkAdapter::Wifi(wifi) => {
                transition(
                    &mut self.indicator,
                    &mut self.phase,
                    IndicatorState::AcquiringNetworkLink,
                );
                loop {
                    match self.manager.initialize_wifi(wifi).await {
                        Ok(()) => break,
                        Err(ConnectError::AttemptFailed { remaining }) => {
                            info!(
                                "Retrying Wi-Fi in {} ms ({} attempts left)",
                                WIFI_RETRY_BACKOFF.as_millis(),
                                remaining
                            );
                            sleep(&mut self.delay, WIFI_RETRY_BACKOFF).await;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        transition(
            &mut self.indicator,
            &mut self.phase,
            IndicatorState::AwaitingTimeSync,
        );
        self.manager
            .wait_for_time_sync(settings.time_sync_deadline())
            .await?;

        transition(&mut self.indicator, &mut self.phase, IndicatorState::Idle);
        info!("Boot complete");
        Ok(())
    }

    /// One steady-state cycle: probe, then the colour pulses
    pub async fn run_cycle<H: HttpClient>(&mut self, client: &mut H, body: &mut [u8]) {
        workload::run_cycle(&mut self.manager, &mut self.indicator, client, body).await;
    }

    /// Steady state after a successful [`boot`](Self::boot); never returns
    pub async fn run<H: HttpClient>(&mut self, client: &mut H, body: &mut [u8]) -> ! {
        info!("Entering workload loop");
        loop {
            self.run_cycle(client, body).await;
        }
    }
}

// Takes the fields separately so callers can hold other borrows of `self`.
fn transition<O: RgbOutput, D: DelayNs>(
    indicator: &mut StatusIndicator<O, D>,
    phase: &mut IndicatorState,
    next: IndicatorState,
) {
    if *phase != next {
        info!("Phase {:?} -> {:?}", *phase, next);
    }
    *phase = next;
    indicator.set_state(next);
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use hal_abstractions::{Color, EventSink, NetworkEvent, Unsupported, WifiError};

    use super::*;
    use crate::error::{Credential, TimeSyncError};
    use crate::settings::keys;
    use crate::testing::{
        leak_events, link, LedCall, MockDelay, MockModem, MockOutput, MockWifi,
    };

    type WifiBoot<'a> =
        Orchestrator<'a, NoopRawMutex, MockWifi, Unsupported, MockOutput, MockDelay>;
    type CellBoot<'a> =
        Orchestrator<'a, NoopRawMutex, Unsupported, MockModem, MockOutput, MockDelay>;

    fn wifi_settings(retries: &str) -> Settings {
        Settings::from_source(&[
            (keys::WIFI_SSID, "Net1"),
            (keys::WIFI_PASSWORD, "secret"),
            (keys::WIFI_MAX_RETRY_COUNT, retries),
        ])
    }

    /// The `set_color`/`start_blink` calls, without the interleaved stops
    fn shown(output: &MockOutput) -> Vec<LedCall> {
        output
            .calls()
            .into_iter()
            .filter(|c| *c != LedCall::Stop)
            .collect()
    }

    #[test]
    fn wifi_boot_retries_then_reaches_idle() {
        let settings = wifi_settings("3");
        let events = leak_events();
        let delay = MockDelay::new();
        let output = MockOutput::new();
        delay.schedule(events, 2500, NetworkEvent::TimeChanged { unix_secs: 7 });

        let wifi = MockWifi::new([Err(WifiError::Timeout), Ok(link(77))]);
        let log = wifi.log.clone();
        let mut orch: WifiBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Wifi(wifi),
            output.clone(),
            events,
            delay.clone(),
        );

        assert_eq!(block_on(orch.boot()), Ok(()));
        assert_eq!(orch.phase(), IndicatorState::Idle);
        assert_eq!(orch.state().mode(), NetworkMode::Wifi);
        assert_eq!(orch.state().ip_address(), Some(link(77).address));
        assert!(orch.state().is_time_synced());
        assert_eq!(log.borrow().connects.len(), 2);
        assert_eq!(delay.calls(), vec![2000, 1000]);

        let slow = Duration::from_millis(500);
        let fast = Duration::from_millis(100);
        assert_eq!(
            shown(&output),
            vec![
                LedCall::Set(Color::AMBER),
                LedCall::Blink(Color::BLUE, slow, slow),
                LedCall::Blink(Color::BLUE, fast, fast),
                LedCall::Set(IndicatorState::Idle.pattern().color()),
            ]
        );
    }

    #[test]
    fn cellular_boot_reaches_idle() {
        let settings = Settings::default();
        let events = leak_events();
        let delay = MockDelay::new();
        events.post(NetworkEvent::TimeChanged { unix_secs: 1 });

        let output = MockOutput::new();
        let mut orch: CellBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Cellular(MockModem::new(Some(1), Some(link(50)))),
            output.clone(),
            events,
            delay.clone(),
        );

        assert_eq!(block_on(orch.boot()), Ok(()));
        assert_eq!(orch.phase(), IndicatorState::Idle);
        assert_eq!(orch.state().mode(), NetworkMode::Cellular);
        assert_eq!(orch.state().link(), Some(&link(50)));
        assert_eq!(delay.calls(), vec![1000, 15_000]);

        let slow = Duration::from_millis(500);
        let fast = Duration::from_millis(100);
        assert_eq!(
            shown(&output),
            vec![
                LedCall::Set(Color::AMBER),
                LedCall::Blink(Color::BLUE, slow, slow),
                LedCall::Blink(Color::BLUE, fast, fast),
                LedCall::Set(IndicatorState::Idle.pattern().color()),
            ]
        );
    }

    #[test]
    fn cellular_deadline_shows_error() {
        let settings = Settings::from_source(&[
            (keys::CELL_ENFORCE_TIMEOUT, "true"),
            (keys::CELL_TIMEOUT_SECONDS, "2"),
            (keys::CELL_MAX_RETRY_COUNT, "1"),
        ]);
        let delay = MockDelay::new();
        let output = MockOutput::new();
        let mut orch: CellBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Cellular(MockModem::new(None, None)),
            output.clone(),
            leak_events(),
            delay.clone(),
        );

        assert_eq!(
            block_on(orch.boot()),
            Err(BootError::Connect(ConnectError::DeadlineExceeded))
        );
        assert_eq!(orch.phase(), IndicatorState::Error);
        assert!(!orch.state().is_connected());
        assert_eq!(delay.elapsed_ms(), 2000);
        assert_eq!(output.calls().last(), Some(&LedCall::Set(Color::RED)));
    }

    #[test]
    fn exhausted_wifi_shows_error() {
        let settings = wifi_settings("2");
        let delay = MockDelay::new();
        let output = MockOutput::new();
        let mut orch: WifiBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Wifi(MockWifi::new([])),
            output.clone(),
            leak_events(),
            delay.clone(),
        );

        assert_eq!(
            block_on(orch.boot()),
            Err(BootError::Connect(ConnectError::ConnectionExhausted))
        );
        assert_eq!(orch.phase(), IndicatorState::Error);
        assert_eq!(delay.calls(), vec![2000]);
        assert_eq!(output.calls().last(), Some(&LedCall::Set(Color::RED)));
    }

    #[test]
    fn missing_credentials_fail_without_retry() {
        let settings = Settings::default();
        let delay = MockDelay::new();
        let mut orch: WifiBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Wifi(MockWifi::new([])),
            MockOutput::new(),
            leak_events(),
            delay.clone(),
        );

        assert_eq!(
            block_on(orch.boot()),
            Err(BootError::Connect(ConnectError::MissingCredential(
                Credential::Ssid
            )))
        );
        assert!(delay.calls().is_empty());
        assert_eq!(orch.phase(), IndicatorState::Error);
    }

    #[test]
    fn time_sync_deadline_fails_boot() {
        let settings = Settings::from_source(&[(keys::TIME_SYNC_TIMEOUT_SECONDS, "2")]);
        let mut orch: CellBoot<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Cellular(MockModem::new(Some(0), Some(link(3)))),
            MockOutput::new(),
            leak_events(),
            MockDelay::new(),
        );

        assert_eq!(
            block_on(orch.boot()),
            Err(BootError::TimeSync(TimeSyncError::DeadlineExceeded))
        );
        assert_eq!(orch.phase(), IndicatorState::Error);
        assert!(orch.state().is_connected());
    }
}
