//! RGB status LED
//!
//! The core talks to a [`LedHandle`], which forwards commands over an
//! `rtic-sync` channel to the LED task. The task owns the PWM channels and
//! runs blink and pulse animations until the next command arrives.

use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_time::Duration;
use embedded_hal::pwm::SetDutyCycle;
use hal_abstractions::{Color, RgbOutput};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;
use rtic_sync::channel::{Receiver, Sender};

use crate::Mono;

pub const LED_QUEUE_DEPTH: usize = 8;

/// Brightness steps per half of a pulse
const PULSE_STEPS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LedCommand {
    Solid(Color),
    Blink {
        color: Color,
        on: Duration,
        off: Duration,
    },
    Pulse {
        color: Color,
        half_period: Duration,
    },
    Stop,
}

/// [`RgbOutput`] that forwards to the LED task
pub struct LedHandle {
    commands: Sender<'static, LedCommand, LED_QUEUE_DEPTH>,
}

impl LedHandle {
    pub fn new(commands: Sender<'static, LedCommand, LED_QUEUE_DEPTH>) -> Self {
        Self { commands }
    }

    fn post(&mut self, command: LedCommand) {
        if self.commands.try_send(command).is_err() {
            warn!("LED command dropped: {:?}", command);
        }
    }
}

impl RgbOutput for LedHandle {
    fn set_color(&mut self, color: Color) {
        self.post(LedCommand::Solid(color));
    }

    fn start_blink(&mut self, color: Color, on: Duration, off: Duration) {
        self.post(LedCommand::Blink { color, on, off });
    }

    async fn start_pulse(&mut self, color: Color, half_period: Duration) {
        let command = LedCommand::Pulse { color, half_period };
        if self.commands.send(command).await.is_err() {
            warn!("LED task is gone, pulse dropped");
        }
    }

    fn stop_animation(&mut self) {
        self.post(LedCommand::Stop);
    }
}

/// Three PWM channels driving a common-cathode RGB LED
pub struct RgbLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
}

impl<R, G, B> RgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    pub fn new(red: R, green: G, blue: B) -> Self {
        let mut led = Self { red, green, blue };
        led.show(Color::BLACK);
        led
    }

    pub fn show(&mut self, color: Color) {
        // Duty-cycle errors are infallible on STM32 timers
        let _ = self.red.set_duty_cycle_fraction(color.r as u16, 255);
        let _ = self.green.set_duty_cycle_fraction(color.g as u16, 255);
        let _ = self.blue.set_duty_cycle_fraction(color.b as u16, 255);
    }

    async fn blink(&mut self, color: Color, on: Duration, off: Duration) -> ! {
        loop {
            self.show(color);
            Mono::delay(on.as_micros().micros()).await;
            self.show(Color::BLACK);
            Mono::delay(off.as_micros().micros()).await;
        }
    }

    async fn pulse(&mut self, color: Color, half_period: Duration) {
        let step = (half_period.as_micros() / PULSE_STEPS as u64).micros();
        let levels = (1..=PULSE_STEPS).chain((0..PULSE_STEPS).rev());
        for k in levels {
            self.show(color.scaled((k * 255 / PULSE_STEPS) as u8));
            Mono::delay(step).await;
        }
    }

    /// Run commands until every sender is gone
    pub async fn run(
        &mut self,
        mut commands: Receiver<'static, LedCommand, LED_QUEUE_DEPTH>,
    ) {
        info!("LED task started");
        let mut current = LedCommand::Stop;
        loop {
            let received = match current {
                LedCommand::Blink { color, on, off } => {
                    match select(commands.recv(), self.blink(color, on, off)).await {
                        Either::First(received) => received,
                        Either::Second(never) => match never {},
                    }
                }
                LedCommand::Pulse { color, half_period } => {
                    match select(commands.recv(), self.pulse(color, half_period)).await {
                        Either::First(received) => received,
                        Either::Second(()) => {
                            current = LedCommand::Stop;
                            continue;
                        }
                    }
                }
                LedCommand::Solid(_) | LedCommand::Stop => commands.recv().await,
            };

            let Ok(command) = received else {
                warn!("All LED senders dropped");
                return;
            };
            if let LedCommand::Solid(color) = command {
                self.show(color);
            }
            current = command;
        }
    }
}
