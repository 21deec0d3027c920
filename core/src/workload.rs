//! Steady-state connectivity check
//!
//! Each cycle fetches the configured URL once, then walks the LED through a
//! fixed colour sequence. Probe failures are already logged by the probe and
//! never stop the loop.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{Color, HttpClient, RgbOutput};

use crate::connectivity::ConnectivityManager;
use crate::indicator::StatusIndicator;

/// Colours pulsed after every probe, in order
pub const PULSE_CYCLE: [Color; 8] = [
    Color::BLUE,
    Color::CYAN,
    Color::GREEN,
    Color::GREEN_YELLOW,
    Color::YELLOW,
    Color::ORANGE,
    Color::ORANGE_RED,
    Color::RED,
];

pub async fn run_cycle<M, D, O, H>(
    manager: &mut ConnectivityManager<'_, M, D>,
    indicator: &mut StatusIndicator<O, D>,
    client: &mut H,
    body: &mut [u8],
) where
    M: RawMutex + 'static,
    D: DelayNs,
    O: RgbOutput,
    H: HttpClient,
{
    manager.process_events();
    if !manager.state().is_connected() {
        debug!("Probing without a link");
    }

    let settings = manager.settings();
    // Result is informational; the probe logged it
    let _ = manager.probe(client, &settings.probe_url, body).await;

    let duration = settings.pulse_duration();
    for color in PULSE_CYCLE {
        indicator.pulse(color, duration).await;
    }
}
