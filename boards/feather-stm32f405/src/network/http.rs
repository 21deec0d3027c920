//! Plain-HTTP GET transport over an embassy-net TCP socket
//!
//! Speaks just enough HTTP/1.0 for the connectivity probe: one request per
//! connection, `Connection: close`, body read until the peer closes or the
//! caller's buffer is full. `https://` URLs are refused.

use core::fmt::Write as _;

use defmt::{debug, warn};
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use hal_abstractions::http::{head_len, parse_status_line, Scheme};
use hal_abstractions::{HttpClient, HttpError, HttpResponse, HttpUrl};
use heapless::String;

use super::config::HttpConfig;
use super::error::NetworkError;

const SOCKET_BUFFER_LEN: usize = 1024;
const HEAD_BUFFER_LEN: usize = 512;
const REQUEST_LEN: usize = 384;

pub struct HttpTransport {
    stack: Stack<'static>,
    config: HttpConfig,
    rx_buffer: [u8; SOCKET_BUFFER_LEN],
    tx_buffer: [u8; SOCKET_BUFFER_LEN],
}

impl HttpTransport {
    pub fn new(stack: Stack<'static>) -> Self {
        Self::with_config(stack, HttpConfig::default())
    }

    pub fn with_config(stack: Stack<'static>, config: HttpConfig) -> Self {
        Self {
            stack,
            config,
            rx_buffer: [0; SOCKET_BUFFER_LEN],
            tx_buffer: [0; SOCKET_BUFFER_LEN],
        }
    }

    async fn exchange(&mut self, url: &str, body: &mut [u8]) -> Result<HttpResponse, NetworkError> {
        let url = HttpUrl::parse(url).ok_or(NetworkError::UnsupportedUrl)?;
        if url.scheme == Scheme::Https {
            warn!("https is not supported by this transport");
            return Err(NetworkError::UnsupportedUrl);
        }

        let host_ip = self
            .stack
            .dns_query(url.host, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::DnsError)?
            .first()
            .copied()
            .ok_or(NetworkError::DnsError)?;

        let mut request: String<REQUEST_LEN> = String::new();
        write!(
            request,
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
            url.path, url.host, self.config.user_agent
        )
        .map_err(|_| NetworkError::UnsupportedUrl)?;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket
            .connect(IpEndpoint::new(host_ip, url.port))
            .await
            .map_err(|_| NetworkError::SocketError)?;
        debug!("Connected to {}:{}", url.host, url.port);

        socket
            .write_all(request.as_bytes())
            .await
            .map_err(|_| NetworkError::SocketError)?;
        socket.flush().await.map_err(|_| NetworkError::SocketError)?;

        let mut head = [0u8; HEAD_BUFFER_LEN];
        let mut filled = 0;
        let head_end = loop {
            if let Some(end) = head_len(&head[..filled]) {
                break end;
            }
            if filled == head.len() {
                return Err(NetworkError::InvalidResponse);
            }
            let n = socket
                .read(&mut head[filled..])
                .await
                .map_err(|_| NetworkError::SocketError)?;
            if n == 0 {
                return Err(NetworkError::InvalidResponse);
            }
            filled += n;
        };
        let status = parse_status_line(&head[..head_end]).ok_or(NetworkError::InvalidResponse)?;

        let early = &head[head_end..filled];
        let mut body_len = early.len().min(body.len());
        body[..body_len].copy_from_slice(&early[..body_len]);
        while body_len < body.len() {
            let n = socket
                .read(&mut body[body_len..])
                .await
                .map_err(|_| NetworkError::SocketError)?;
            if n == 0 {
                break;
            }
            body_len += n;
        }
        socket.close();

        Ok(HttpResponse { status, body_len })
    }
}

impl HttpClient for HttpTransport {
    async fn get(
        &mut self,
        url: &str,
        timeout: Duration,
        body: &mut [u8],
    ) -> Result<HttpResponse, HttpError> {
        match select(Timer::after(timeout), self.exchange(url, body)).await {
            Either::First(_) => Err(HttpError::Timeout),
            Either::Second(result) => result.map_err(|e| {
                debug!("HTTP exchange failed: {}", e);
                HttpError::from(e)
            }),
        }
    }
}
