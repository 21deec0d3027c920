//! Error types for bring-up, time sync and probing

use core::fmt;

/// Credential that was required but not configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Credential {
    Ssid,
    Password,
}

/// Network bring-up failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectError {
    /// Wi-Fi SSID or password not configured; no radio call was made
    MissingCredential(Credential),
    /// One Wi-Fi association attempt failed; the caller may try again
    AttemptFailed {
        /// Attempts left in the retry budget
        remaining: u32,
    },
    /// Wi-Fi retry budget consumed
    ConnectionExhausted,
    /// Caller-imposed deadline passed before the link came up
    DeadlineExceeded,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential(Credential::Ssid) => write!(f, "Wi-Fi SSID not configured"),
            Self::MissingCredential(Credential::Password) => {
                write!(f, "Wi-Fi password not configured")
            }
            Self::AttemptFailed { remaining } => {
                write!(f, "Connection attempt failed ({} left)", remaining)
            }
            Self::ConnectionExhausted => write!(f, "Cannot connect to network"),
            Self::DeadlineExceeded => write!(f, "Link did not come up before the deadline"),
        }
    }
}

impl core::error::Error for ConnectError {}

/// Time-sync gate failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSyncError {
    /// Caller-imposed deadline passed with no time event
    DeadlineExceeded,
}

impl fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "No network time event before the deadline"),
        }
    }
}

impl core::error::Error for TimeSyncError {}

/// Outcome of a failed probe
///
/// Informational only: the probe has already logged it and the workload
/// loop carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeError {
    /// Client-side timeout elapsed
    Timeout,
    /// Server answered with a non-2xx status
    Status(u16),
    /// DNS, socket or framing failure
    Transport,
    /// Body was not valid UTF-8
    InvalidBody,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Request time out"),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::Transport => write!(f, "Transport error"),
            Self::InvalidBody => write!(f, "Response body is not UTF-8"),
        }
    }
}

impl core::error::Error for ProbeError {}

/// Why the boot sequence stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    Connect(ConnectError),
    TimeSync(TimeSyncError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "Network bring-up failed: {}", e),
            Self::TimeSync(e) => write!(f, "Time sync failed: {}", e),
        }
    }
}

impl core::error::Error for BootError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            Self::TimeSync(e) => Some(e),
        }
    }
}

impl From<ConnectError> for BootError {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

impl From<TimeSyncError> for BootError {
    fn from(e: TimeSyncError) -> Self {
        Self::TimeSync(e)
    }
}
