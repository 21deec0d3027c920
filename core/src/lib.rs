//! Platform-agnostic core logic for the linkcheck firmware
//!
//! This crate contains the connectivity bring-up state machine, the
//! time-sync gate, the status-indicator model and the steady-state probe
//! loop. It has NO hardware dependencies: boards hand it implementations of
//! the `hal-abstractions` traits and an `embedded-hal-async` delay.
//!
//! ## Boot sequence
//!
//! ```text
//! Boot ─┬─> AcquiringCellLink ────┬─> AwaitingTimeSync ─> Idle ─> workload
//!       └─> AcquiringNetworkLink ─┘
//!                 (any failure) ─> Error
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod connectivity;
pub mod error;
pub mod events;
pub mod indicator;
pub mod orchestrator;
pub mod settings;
pub mod state;
pub mod workload;

#[cfg(test)]
mod testing;

pub use connectivity::ConnectivityManager;
pub use error::{BootError, ConnectError, Credential, ProbeError, TimeSyncError};
pub use events::LinkEvents;
pub use indicator::{IndicatorState, Pattern, StatusIndicator};
pub use orchestrator::{NetworkAdapter, Orchestrator};
pub use settings::{Settings, SettingsSource};
pub use state::{ConnectionState, NetworkMode};
