//! Build-time settings store for this board
//!
//! The board has no settings file, so the key/value pairs live in flash.
//! Keys left out here fall back to the core defaults.

use linkcheck_core::settings::keys;

pub const SETTINGS: &[(&str, &str)] = &[
    (keys::DEVICE_NAME, "feather-f405"),
    (keys::CELL_APN_NAME, "wired"),
    (keys::CELL_WAKE_UP_DELAY_SECONDS, "2"),
    (keys::CELL_TIMEOUT_SECONDS, "60"),
    (keys::CELL_MAX_RETRY_COUNT, "3"),
    (keys::CELL_ENFORCE_TIMEOUT, "true"),
    (keys::PROBE_URL, "http://postman-echo.com/get?foo1=bar1&foo2=bar2"),
    (keys::PULSE_DURATION_MS, "1000"),
];
