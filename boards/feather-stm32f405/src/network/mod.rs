//! Network side of the board: configuration, errors, the SNTP time source
//! and the HTTP probe transport. All of it runs on the embassy-net stack
//! owned by the network task.

pub mod config;
pub mod error;
pub mod http;
pub mod sntp;

pub use config::NetworkConfig;
pub use error::NetworkError;
pub use http::HttpTransport;
pub use sntp::SntpTimeSource;
