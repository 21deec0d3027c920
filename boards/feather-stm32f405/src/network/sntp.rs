//! SNTP time source
//!
//! Queries the configured servers once the stack has an address, posts
//! `TimeChanged` for every successful sync and re-syncs on a fixed interval.

use defmt::{error, info, warn, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, Instant, Timer};
use hal_abstractions::{EventSink, NetworkEvent, TimeSource};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::Mono;

use super::config::SntpConfig;
use super::error::NetworkError;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Unix timestamp with microsecond precision
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Timestamp {
    pub unix_secs: u64,
    pub micros: u32,
}

impl Timestamp {
    /// Convert an NTP transmit timestamp (seconds + 2^-32 fraction)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        let micros = ((ntp_frac as u64 * 1_000_000) >> 32) as u32;
        Self { unix_secs, micros }
    }

    /// Shift forward by a round-trip correction, carrying into seconds
    fn corrected(mut self, micros: u64) -> Self {
        let total = self.micros as u64 + micros;
        self.unix_secs = self.unix_secs.saturating_add(total / 1_000_000);
        self.micros = (total % 1_000_000) as u32;
        self
    }
}

pub struct SntpTimeSource {
    config: SntpConfig,
    sink: Option<&'static dyn EventSink>,
}

impl SntpTimeSource {
    /// Create a time source with default configuration
    pub fn new() -> Self {
        Self::with_config(SntpConfig::default())
    }

    pub fn with_config(config: SntpConfig) -> Self {
        Self { config, sink: None }
    }

    /// Sync forever; the first success is what the boot sequence waits for
    pub async fn run(&mut self, stack: Stack<'static>) -> ! {
        stack.wait_config_up().await;
        loop {
            let pause = match self.sync(stack).await {
                Ok(ts) => {
                    if let Some(sink) = self.sink {
                        sink.post(NetworkEvent::TimeChanged {
                            unix_secs: ts.unix_secs,
                        });
                    }
                    self.config.resync_interval_secs
                }
                Err(e) => {
                    warn!("SNTP sync failed: {}", e);
                    self.config.failure_backoff_secs
                }
            };
            Mono::delay(pause.secs()).await;
            info!("SNTP resync triggered");
        }
    }

    async fn sync(&self, stack: Stack<'static>) -> Result<Timestamp, NetworkError> {
        info!("Starting SNTP synchronization");
        for server in self.config.servers {
            for attempt in 0..self.config.retry_count {
                info!(
                    "Attempting SNTP sync with {} (attempt {})",
                    server,
                    attempt + 1
                );
                match self.sntp_request(stack, server).await {
                    Ok(timestamp) => {
                        info!(
                            "SNTP sync successful: {}.{:06} UTC",
                            timestamp.unix_secs, timestamp.micros
                        );
                        return Ok(timestamp);
                    }
                    Err(e) => {
                        warn!("SNTP request failed: {:?}, retrying...", e);
                        Mono::delay(2000_u64.millis()).await;
                    }
                }
            }
        }
        error!("All SNTP sync attempts failed");
        Err(NetworkError::AllServersFailed)
    }

    async fn sntp_request(
        &self,
        stack: Stack<'static>,
        server: &str,
    ) -> Result<Timestamp, NetworkError> {
        let server_ip = stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::DnsError)?
            .first()
            .copied()
            .ok_or(NetworkError::DnsError)?;

        let server_endpoint = IpEndpoint::new(server_ip, 123);
        info!("Resolved {} to {}", server, Debug2Format(&server_endpoint));

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        // NTP request: LI=0, VN=3, Mode=3 (Client)
        let mut ntp_packet = [0u8; 48];
        ntp_packet[0] = 0x1B;
        let transmit_time = Instant::now();
        socket
            .send_to(&ntp_packet, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; 48];
        let timeout_future = Timer::after(Duration::from_millis(self.config.timeout_ms));
        let recv_future = socket.recv_from(&mut response);
        let (recv_len, from_addr) =
            match embassy_futures::select::select(timeout_future, recv_future).await {
                embassy_futures::select::Either::First(_) => return Err(NetworkError::Timeout),
                embassy_futures::select::Either::Second(result) => {
                    result.map_err(|_| NetworkError::SocketError)?
                }
            };
        let receive_time = Instant::now();

        if recv_len < 48 || from_addr.endpoint.addr != server_ip {
            return Err(NetworkError::InvalidResponse);
        }

        let stratum = response[1];
        if stratum == 0 || stratum > self.config.max_stratum {
            warn!(
                "Invalid stratum {} (max {})",
                stratum, self.config.max_stratum
            );
            return Err(NetworkError::ServerError);
        }

        let tx_timestamp_secs =
            u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
        let tx_timestamp_frac =
            u32::from_be_bytes([response[44], response[45], response[46], response[47]]);

        let rtt = receive_time.duration_since(transmit_time);
        let rtt_correction_micros = rtt.as_micros() / 2;
        let timestamp =
            Timestamp::from_ntp(tx_timestamp_secs, tx_timestamp_frac).corrected(rtt_correction_micros);

        info!(
            "NTP timestamp: {}.{:06} UTC (RTT correction: {} µs, stratum {})",
            timestamp.unix_secs, timestamp.micros, rtt_correction_micros, stratum
        );
        Ok(timestamp)
    }
}

impl Default for SntpTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SntpTimeSource {
    fn subscribe(&mut self, sink: &'static dyn EventSink) {
        self.sink = Some(sink);
    }
}
