//! `DelayNs` on the RTIC monotonic

use embedded_hal_async::delay::DelayNs;
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::Mono;

/// Copyable handle so the core can hand one delay to each component
#[derive(Debug, Clone, Copy, Default)]
pub struct MonoDelay;

impl DelayNs for MonoDelay {
    async fn delay_ns(&mut self, ns: u32) {
        Mono::delay(u64::from(ns).nanos()).await;
    }

    async fn delay_us(&mut self, us: u32) {
        Mono::delay(u64::from(us).micros()).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Mono::delay(u64::from(ms).millis()).await;
    }
}
