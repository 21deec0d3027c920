//! Tri-colour status output surface

use core::future::Future;

use embassy_time::Duration;

/// 24-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 128, 0);
    pub const DARK_GREEN: Self = Self::new(0, 100, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const CYAN: Self = Self::new(0, 255, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0);
    pub const AMBER: Self = Self::new(255, 191, 0);
    pub const GREEN_YELLOW: Self = Self::new(173, 255, 47);
    pub const ORANGE: Self = Self::new(255, 165, 0);
    pub const ORANGE_RED: Self = Self::new(255, 69, 0);

    /// Scale every channel by `level / 255`
    pub const fn scaled(self, level: u8) -> Self {
        const fn scale(c: u8, level: u8) -> u8 {
            ((c as u16 * level as u16) / 255) as u8
        }
        Self::new(
            scale(self.r, level),
            scale(self.g, level),
            scale(self.b, level),
        )
    }
}

/// RGB LED driver
///
/// Animations (blink, pulse) run inside the driver; starting any command
/// replaces whatever was running only if the caller stopped it first.
pub trait RgbOutput {
    /// Show a steady colour
    fn set_color(&mut self, color: Color);

    /// Alternate between `color` for `on` and dark for `off`, until stopped
    fn start_blink(&mut self, color: Color, on: Duration, off: Duration);

    /// Ramp up to `color` over `half_period` and back down over another
    ///
    /// The returned future may complete as soon as the pulse has been
    /// started; callers that need a fixed cadence must time it themselves.
    fn start_pulse(&mut self, color: Color, half_period: Duration) -> impl Future<Output = ()>;

    /// Stop any running animation; a no-op when nothing runs
    fn stop_animation(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_dims_each_channel() {
        assert_eq!(Color::WHITE.scaled(0), Color::BLACK);
        assert_eq!(Color::WHITE.scaled(255), Color::WHITE);
        assert_eq!(Color::ORANGE.scaled(128), Color::new(128, 82, 0));
    }
}
