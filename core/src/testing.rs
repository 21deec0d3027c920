//! Test doubles for the hal-abstractions traits
//!
//! Each double shares its call log through an `Rc` so a test can keep a
//! handle after moving the double into the component under test.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{
    CellularAdapter, Color, EventSink, HttpClient, HttpError, HttpResponse, Ipv4Address, LinkInfo,
    NetworkEvent, RgbOutput, ScanResults, WifiAdapter, WifiError,
};

use crate::events::LinkEvents;

pub type TestEvents = LinkEvents<NoopRawMutex>;

pub fn leak_events() -> &'static TestEvents {
    Box::leak(Box::new(LinkEvents::new()))
}

pub fn link(last_octet: u8) -> LinkInfo {
    LinkInfo {
        address: Ipv4Address::new(10, 0, 0, last_octet),
        subnet_mask: Ipv4Address::new(255, 255, 255, 0),
        gateway: Ipv4Address::new(10, 0, 0, 1),
    }
}

#[derive(Default)]
struct DelayInner {
    /// Every requested delay, in milliseconds
    calls: Vec<u64>,
    elapsed_ms: u64,
    /// Events to post once `elapsed_ms` reaches the given time
    scheduled: Vec<(u64, NetworkEvent)>,
    sink: Option<&'static TestEvents>,
}

/// Virtual clock: delays return at once and advance simulated time
#[derive(Clone, Default)]
pub struct MockDelay(Rc<RefCell<DelayInner>>);

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `event` into `sink` once `at_ms` of virtual time has elapsed
    pub fn schedule(&self, sink: &'static TestEvents, at_ms: u64, event: NetworkEvent) {
        let mut inner = self.0.borrow_mut();
        inner.sink = Some(sink);
        inner.scheduled.push((at_ms, event));
    }

    pub fn calls(&self) -> Vec<u64> {
        self.0.borrow().calls.clone()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.0.borrow().elapsed_ms
    }

    fn advance(&self, ms: u64) {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(ms);
        inner.elapsed_ms += ms;
        let now = inner.elapsed_ms;
        let sink = inner.sink;
        let (due, pending): (Vec<_>, Vec<_>) =
            inner.scheduled.drain(..).partition(|(at, _)| *at <= now);
        inner.scheduled = pending;
        drop(inner);
        if let Some(sink) = sink {
            for (_, event) in due {
                sink.post(event);
            }
        }
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as u64 / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.advance(us as u64 / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCall {
    Set(Color),
    Blink(Color, Duration, Duration),
    Pulse(Color, Duration),
    Stop,
}

#[derive(Clone, Default)]
pub struct MockOutput(Rc<RefCell<Vec<LedCall>>>);

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<LedCall> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl RgbOutput for MockOutput {
    fn set_color(&mut self, color: Color) {
        self.0.borrow_mut().push(LedCall::Set(color));
    }

    fn start_blink(&mut self, color: Color, on: Duration, off: Duration) {
        self.0.borrow_mut().push(LedCall::Blink(color, on, off));
    }

    async fn start_pulse(&mut self, color: Color, half_period: Duration) {
        self.0.borrow_mut().push(LedCall::Pulse(color, half_period));
    }

    fn stop_animation(&mut self) {
        self.0.borrow_mut().push(LedCall::Stop);
    }
}

#[derive(Default)]
pub struct WifiLog {
    pub subscribes: u32,
    pub scans: u32,
    pub connects: Vec<(String, String, Duration)>,
}

/// Radio that plays back a script of association outcomes
///
/// A successful association posts `Connected` to the subscribed sink, the
/// way a real driver reports the assigned addresses.
pub struct MockWifi {
    pub log: Rc<RefCell<WifiLog>>,
    script: VecDeque<Result<LinkInfo, WifiError>>,
    scan: Result<ScanResults, WifiError>,
    sink: Option<&'static dyn EventSink>,
}

impl MockWifi {
    pub fn new(script: impl IntoIterator<Item = Result<LinkInfo, WifiError>>) -> Self {
        Self {
            log: Rc::default(),
            script: script.into_iter().collect(),
            scan: Ok(ScanResults::new()),
            sink: None,
        }
    }

    pub fn with_scan(mut self, scan: Result<ScanResults, WifiError>) -> Self {
        self.scan = scan;
        self
    }
}

impl WifiAdapter for MockWifi {
    fn subscribe(&mut self, sink: &'static dyn EventSink) {
        self.log.borrow_mut().subscribes += 1;
        self.sink = Some(sink);
    }

    async fn scan(&mut self, _timeout: Duration) -> Result<ScanResults, WifiError> {
        self.log.borrow_mut().scans += 1;
        self.scan.clone()
    }

    async fn connect(
        &mut self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<(), WifiError> {
        self.log
            .borrow_mut()
            .connects
            .push((ssid.to_string(), password.to_string(), timeout));
        let link = self.script.pop_front().unwrap_or(Err(WifiError::Timeout))?;
        if let Some(sink) = self.sink {
            sink.post(NetworkEvent::Connected(link));
        }
        Ok(())
    }
}

/// Modem that reports attached after a number of polls
pub struct MockModem {
    pub polls: Rc<Cell<u32>>,
    connected_after: Option<u32>,
    link: Option<LinkInfo>,
}

impl MockModem {
    /// `connected_after = None` never attaches
    pub fn new(connected_after: Option<u32>, link: Option<LinkInfo>) -> Self {
        Self {
            polls: Rc::default(),
            connected_after,
            link,
        }
    }
}

impl CellularAdapter for MockModem {
    fn is_connected(&self) -> bool {
        let polls = self.polls.get() + 1;
        self.polls.set(polls);
        self.connected_after.is_some_and(|n| polls > n)
    }

    fn link_info(&self) -> Option<LinkInfo> {
        self.link
    }
}

pub struct MockHttp {
    pub requests: Rc<RefCell<Vec<(String, Duration)>>>,
    response: Result<(u16, &'static [u8]), HttpError>,
}

impl MockHttp {
    pub fn new(response: Result<(u16, &'static [u8]), HttpError>) -> Self {
        Self {
            requests: Rc::default(),
            response,
        }
    }
}

impl HttpClient for MockHttp {
    async fn get(
        &mut self,
        url: &str,
        timeout: Duration,
        body: &mut [u8],
    ) -> Result<HttpResponse, HttpError> {
        self.requests.borrow_mut().push((url.to_string(), timeout));
        let (status, bytes) = self.response?;
        let body_len = bytes.len().min(body.len());
        body[..body_len].copy_from_slice(&bytes[..body_len]);
        Ok(HttpResponse { status, body_len })
    }
}
