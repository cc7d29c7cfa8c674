//! Seams between the screensaver controller and the desktop it runs on
//!
//! The controller never touches a display, an input device, or a clock
//! source directly. It asks a [`Platform`] to create layers, schedule
//! timers and register idle watches, and the platform reports back by
//! feeding [`Event`]s into `Controller::handle` on the same event loop.

use std::time::Duration;
use thiserror::Error;

use crate::config::SettingChange;
use crate::palette::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FadeId(pub u64);

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("idle monitor unavailable: {0}")]
    Unavailable(String),
}

/// Kinds of captured input that dismiss the screensaver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    KeyPress,
    ButtonPress,
    PointerMotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Overlay,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    EaseOutQuad,
    EaseInQuad,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInQuad => t * t,
        }
    }
}

/// Opacity ramp from the layer's current opacity to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub to: f32,
    pub duration: Duration,
    pub easing: Easing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub color: Rgb,
    pub font_size: u32,
    pub glow: bool,
}

/// Everything that can happen to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An idle watch reached its threshold
    IdleReached(WatchId),
    /// Captured input while the overlay is up
    Input(InputKind),
    /// A periodic timer fired
    Timer(TimerId),
    /// An opacity ramp finished
    FadeFinished(FadeId),
    /// A setting changed
    Setting(SettingChange),
}

pub trait IdleSensor {
    /// Fire `Event::IdleReached(id)` once input has been idle for `threshold`
    fn add_watch(&mut self, threshold: Duration) -> Result<WatchId, SensorError>;

    fn remove_watch(&mut self, id: WatchId);
}

/// Periodic timers on the event loop. A timer fires `Event::Timer(id)`
/// every `period` until cancelled.
pub trait Scheduler {
    fn start_timer(&mut self, period: Duration) -> TimerId;

    /// Cancel synchronously: no `Event::Timer(id)` is delivered afterwards
    fn cancel_timer(&mut self, id: TimerId);
}

/// Full-screen overlay plus a single text label
pub trait Surface {
    /// Primary display size in px
    fn display_size(&self) -> (f32, f32);

    fn create_overlay(&mut self);
    fn destroy_overlay(&mut self);

    fn create_label(&mut self, text: &str, style: &LabelStyle);
    fn destroy_label(&mut self);
    fn set_label_text(&mut self, text: &str);
    fn restyle_label(&mut self, style: &LabelStyle);
    fn move_label(&mut self, x: i32, y: i32);

    /// Measured label size, once a layout pass has happened
    fn label_size(&self) -> Option<(f32, f32)>;

    fn set_opacity(&mut self, layer: Layer, opacity: f32);

    /// Start an opacity ramp; `Event::FadeFinished` is delivered when done
    fn fade(&mut self, layer: Layer, fade: Fade) -> FadeId;

    /// Route all key/pointer input to the screensaver
    fn capture_input(&mut self);
    fn release_input(&mut self);
}

pub trait Platform: IdleSensor + Scheduler + Surface {}

impl<T: IdleSensor + Scheduler + Surface> Platform for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints() {
        for easing in [Easing::EaseInQuad, Easing::EaseOutQuad] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(2.0), 1.0);
        }
        assert!(Easing::EaseOutQuad.apply(0.5) > 0.5);
        assert!(Easing::EaseInQuad.apply(0.5) < 0.5);
    }
}
