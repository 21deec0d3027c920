//! Application status shown on the RGB LED

use embassy_futures::join::join;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{Color, RgbOutput};

use crate::connectivity::sleep;

/// Brightness applied to the idle colour
const IDLE_LEVEL: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorState {
    Boot,
    AcquiringCellLink,
    AcquiringNetworkLink,
    AwaitingTimeSync,
    Idle,
    Error,
}

/// What the LED shows for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pattern {
    Solid(Color),
    Blink {
        color: Color,
        on: Duration,
        off: Duration,
    },
}

impl Pattern {
    pub const fn color(self) -> Color {
        match self {
            Self::Solid(color) | Self::Blink { color, .. } => color,
        }
    }
}

impl IndicatorState {
    pub const fn pattern(self) -> Pattern {
        match self {
            Self::Boot => Pattern::Solid(Color::AMBER),
            Self::AcquiringCellLink | Self::AcquiringNetworkLink => Pattern::Blink {
                color: Color::BLUE,
                on: Duration::from_millis(500),
                off: Duration::from_millis(500),
            },
            Self::AwaitingTimeSync => Pattern::Blink {
                color: Color::BLUE,
                on: Duration::from_millis(100),
                off: Duration::from_millis(100),
            },
            Self::Idle => Pattern::Solid(Color::GREEN.scaled(IDLE_LEVEL)),
            Self::Error => Pattern::Solid(Color::RED),
        }
    }
}

/// Drives an [`RgbOutput`] from [`IndicatorState`]s and workload pulses
pub struct StatusIndicator<O, D> {
    output: O,
    delay: D,
    active: Option<IndicatorState>,
}

impl<O: RgbOutput, D: DelayNs> StatusIndicator<O, D> {
    pub fn new(output: O, delay: D) -> Self {
        Self {
            output,
            delay,
            active: None,
        }
    }

    /// State currently shown; `None` before the first state or after a pulse
    pub fn active(&self) -> Option<IndicatorState> {
        self.active
    }

    /// Show `state`, leaving the output alone if it is already showing
    pub fn set_state(&mut self, state: IndicatorState) {
        if self.active == Some(state) {
            return;
        }
        debug!("Indicator: {:?}", state);
        self.output.stop_animation();
        match state.pattern() {
            Pattern::Solid(color) => self.output.set_color(color),
            Pattern::Blink { color, on, off } => self.output.start_blink(color, on, off),
        }
        self.active = Some(state);
    }

    /// Pulse `color` once and hold the caller for the whole `duration`
    pub async fn pulse(&mut self, color: Color, duration: Duration) {
        self.output.stop_animation();
        self.active = None;
        let half_period = Duration::from_ticks(duration.as_ticks() / 2);
        join(
            self.output.start_pulse(color, half_period),
            sleep(&mut self.delay, duration),
        )
        .await;
    }
}
