//! Network client error types

use defmt::Format;
use hal_abstractions::HttpError;

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect/read/write error
    SocketError,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server error (e.g., invalid stratum for NTP)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// URL is malformed or uses a scheme this transport cannot speak
    UnsupportedUrl,
    /// Ethernet controller did not respond during initialization
    DeviceInit,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::UnsupportedUrl => write!(f, "Unsupported URL"),
            Self::DeviceInit => write!(f, "Ethernet controller initialization failed"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for NetworkError {}

impl From<NetworkError> for HttpError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::Timeout => HttpError::Timeout,
            _ => HttpError::Transport,
        }
    }
}
