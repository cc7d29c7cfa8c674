//! Screensaver lifecycle
//!
//! `Idle -> Showing -> Active -> Hiding -> Idle`. The controller owns the one
//! visible [`Session`] and drives it from [`Event`]s delivered by the host
//! event loop. Everything runs on that single loop, so there is no locking;
//! stale timer, watch and fade ids are ignored instead.

use chrono::NaiveTime;
use log::{debug, error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

use crate::clock;
use crate::config::{Config, DisplayConfig, DisplayMode, SettingChange};
use crate::motion::{self, BounceState, Bounds, Collision};
use crate::palette::{self, Palette};
use crate::platform::{
    Easing, Event, Fade, FadeId, InputKind, LabelStyle, Layer, Platform, Surface, TimerId,
    WatchId,
};

pub const ANIMATION_FPS: u32 = 60;
const FRAME_DT: f32 = 1.0 / ANIMATION_FPS as f32;
const CLOCK_PERIOD: Duration = Duration::from_secs(1);

const OVERLAY_FADE_IN: Duration = Duration::from_millis(500);
const LABEL_FADE_IN: Duration = Duration::from_millis(800);
const OVERLAY_FADE_OUT: Duration = Duration::from_millis(400);
const LABEL_FADE_OUT: Duration = Duration::from_millis(300);

pub fn animation_period() -> Duration {
    Duration::from_secs(1) / ANIMATION_FPS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Showing,
    Active,
    Hiding,
}

/// One visible screensaver, from idle-reached until the fade-out completes
#[derive(Debug)]
struct Session {
    /// `None` until the label has been measured and placed
    bounce: Option<BounceState>,
    palette: Palette,
    color_index: usize,
    text: String,
    animation: TimerId,
    clock: Option<TimerId>,
    fade_out: Option<FadeId>,
    capturing: bool,
}

pub struct Controller {
    config: Config,
    phase: Phase,
    session: Option<Session>,
    watch: Option<WatchId>,
    idle_enabled: bool,
    corner_hits: u64,
    rng: StdRng,
    now: fn() -> NaiveTime,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_rng(config: Config, rng: StdRng) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            session: None,
            watch: None,
            idle_enabled: true,
            corner_hits: 0,
            rng,
            now: clock::now,
        }
    }

    /// Never arm an idle watch; the screensaver only shows through [`Controller::activate`]
    pub fn without_idle(mut self) -> Self {
        self.idle_enabled = false;
        self
    }

    /// Replace the wall clock used for clock mode
    pub fn with_clock(mut self, now: fn() -> NaiveTime) -> Self {
        self.now = now;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Corner hits over the lifetime of this controller
    pub fn corner_hits(&self) -> u64 {
        self.corner_hits
    }

    pub fn idle_enabled(&self) -> bool {
        self.idle_enabled
    }

    #[cfg(test)]
    pub fn bounce_state(&self) -> Option<BounceState> {
        self.session.as_ref().and_then(|s| s.bounce)
    }

    #[cfg(test)]
    pub fn color_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.color_index)
    }

    /// Arm the idle watch
    pub fn enable<P: Platform>(&mut self, platform: &mut P) {
        self.rearm_idle_watch(platform);
    }

    /// Tear down any visible session immediately and drop the idle watch
    pub fn disable<P: Platform>(&mut self, platform: &mut P) {
        if let Some(session) = self.session.take() {
            teardown(session, platform);
            info!("Screensaver torn down");
        }
        self.phase = Phase::Idle;
        if let Some(id) = self.watch.take() {
            platform.remove_watch(id);
        }
    }

    pub fn handle<P: Platform>(&mut self, event: Event, platform: &mut P) {
        match event {
            Event::IdleReached(id) => {
                if self.watch == Some(id) {
                    self.activate(platform);
                } else {
                    debug!("Ignoring idle event from stale watch {:?}", id);
                }
            }
            Event::Input(kind) => self.on_input(kind, platform),
            Event::Timer(id) => self.on_timer(id, platform),
            Event::FadeFinished(id) => self.on_fade_finished(id, platform),
            Event::Setting(change) => self.on_setting(change, platform),
        }
    }

    /// Show the screensaver now. A no-op unless idle.
    pub fn activate<P: Platform>(&mut self, platform: &mut P) {
        if self.phase != Phase::Idle {
            debug!("Screensaver already {:?}, ignoring activation", self.phase);
            return;
        }

        info!("Showing screensaver");
        self.phase = Phase::Showing;

        let palette = Palette::new(self.config.bounce.color_scheme);
        let color_index = palette.random_index(&mut self.rng);

        platform.create_overlay();
        platform.set_opacity(Layer::Overlay, 0.0);

        let text = clock::label_text(&self.config.display, &(self.now)());
        platform.create_label(&text, &label_style(&self.config.display, &palette, color_index));
        platform.set_opacity(Layer::Label, 0.0);

        let animation = platform.start_timer(animation_period());
        let clock = start_clock(&self.config.display, platform);

        let mut session = Session {
            bounce: None,
            palette,
            color_index,
            text,
            animation,
            clock,
            fade_out: None,
            capturing: false,
        };
        place_label(&mut session, &mut self.rng, self.config.bounce.speed, platform);

        platform.capture_input();
        session.capturing = true;
        self.session = Some(session);
        self.phase = Phase::Active;

        platform.fade(Layer::Overlay, fade_to(1.0, OVERLAY_FADE_IN, Easing::EaseOutQuad));
        platform.fade(Layer::Label, fade_to(1.0, LABEL_FADE_IN, Easing::EaseOutQuad));
    }

    fn on_input<P: Platform>(&mut self, kind: InputKind, platform: &mut P) {
        if self.phase != Phase::Active {
            return;
        }
        debug!("{:?} dismisses screensaver", kind);
        self.dismiss(platform);
    }

    fn dismiss<P: Platform>(&mut self, platform: &mut P) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        info!("Hiding screensaver");
        self.phase = Phase::Hiding;

        // Input must stop being swallowed before the fade starts
        if session.capturing {
            platform.release_input();
            session.capturing = false;
        }

        let fade_out = platform.fade(Layer::Overlay, fade_to(0.0, OVERLAY_FADE_OUT, Easing::EaseInQuad));
        platform.fade(Layer::Label, fade_to(0.0, LABEL_FADE_OUT, Easing::EaseInQuad));
        session.fade_out = Some(fade_out);
    }

    fn on_fade_finished<P: Platform>(&mut self, id: FadeId, platform: &mut P) {
        let finished_hiding = self.phase == Phase::Hiding
            && self.session.as_ref().is_some_and(|s| s.fade_out == Some(id));
        if !finished_hiding {
            return;
        }

        if let Some(session) = self.session.take() {
            teardown(session, platform);
        }
        self.phase = Phase::Idle;
        info!("Screensaver hidden");

        self.rearm_idle_watch(platform);
    }

    fn on_timer<P: Platform>(&mut self, id: TimerId, platform: &mut P) {
        let Some((animation, clock)) = self.session.as_ref().map(|s| (s.animation, s.clock)) else {
            debug!("Timer {:?} fired with no session", id);
            return;
        };

        if id == animation {
            self.tick(platform);
        } else if clock == Some(id) {
            if self.config.display.mode == DisplayMode::Clock {
                self.refresh_text(platform);
            }
        } else {
            debug!("Ignoring stale timer {:?}", id);
        }
    }

    /// One animation frame
    fn tick<P: Platform>(&mut self, platform: &mut P) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(bounds) = measure(&*platform) else {
            // Not laid out yet; try again next frame
            return;
        };

        let Some(state) = session.bounce else {
            place_label(session, &mut self.rng, self.config.bounce.speed, platform);
            return;
        };

        let (next, collision) = motion::advance(state, FRAME_DT, &bounds);
        session.bounce = Some(next);

        if collision.is_hit() {
            session.color_index = palette::advance(session.color_index, session.palette.len());
            let style = label_style(&self.config.display, &session.palette, session.color_index);
            match collision {
                Collision::Corner => {
                    self.corner_hits += 1;
                    debug!("Corner hit! ({} total), color {}", self.corner_hits, style.color);
                }
                _ => debug!("Edge hit, color {}", style.color),
            }
            platform.restyle_label(&style);
        }

        move_to(platform, &next);
    }

    fn on_setting<P: Platform>(&mut self, change: SettingChange, platform: &mut P) {
        debug!("Setting {} changed: {:?}", change.key(), change);
        self.config.apply(&change);

        match change {
            SettingChange::IdleTime(_) => self.rearm_idle_watch(platform),
            SettingChange::DisplayMode(_) | SettingChange::DisplayText(_) => {
                self.rebuild_label(platform)
            }
            SettingChange::FontSize(_) | SettingChange::ShowGlow(_) => self.restyle(platform),
            SettingChange::BounceSpeed(speed) => {
                if let Some(state) = self.active_session().and_then(|s| s.bounce.as_mut()) {
                    state.velocity = motion::rescale_speed(state.velocity, speed as f32);
                }
            }
            SettingChange::ColorScheme(scheme) => {
                if self.phase == Phase::Active
                    && let Some(session) = self.session.as_mut()
                {
                    session.palette = Palette::new(scheme);
                    session.color_index = session.palette.random_index(&mut self.rng);
                }
                self.restyle(platform);
            }
            SettingChange::ClockFormat(_) | SettingChange::ShowSeconds(_) => {
                if self.config.display.mode == DisplayMode::Clock {
                    self.refresh_text(platform);
                }
            }
        }
    }

    fn active_session(&mut self) -> Option<&mut Session> {
        if self.phase == Phase::Active {
            self.session.as_mut()
        } else {
            None
        }
    }

    /// Replace the label, keeping position and velocity
    fn rebuild_label<P: Platform>(&mut self, platform: &mut P) {
        let text = clock::label_text(&self.config.display, &(self.now)());
        let display = self.config.display.clone();
        let Some(session) = self.active_session() else {
            return;
        };

        if let Some(id) = session.clock.take() {
            platform.cancel_timer(id);
        }
        platform.destroy_label();

        platform.create_label(&text, &label_style(&display, &session.palette, session.color_index));
        session.text = text;
        session.clock = start_clock(&display, platform);
        if let Some(state) = session.bounce {
            move_to(platform, &state);
        }
    }

    fn restyle<P: Platform>(&mut self, platform: &mut P) {
        let display = self.config.display.clone();
        if let Some(session) = self.active_session() {
            platform.restyle_label(&label_style(&display, &session.palette, session.color_index));
        }
    }

    fn refresh_text<P: Platform>(&mut self, platform: &mut P) {
        let text = clock::label_text(&self.config.display, &(self.now)());
        if let Some(session) = self.session.as_mut()
            && session.text != text
        {
            platform.set_label_text(&text);
            session.text = text;
        }
    }

    fn rearm_idle_watch<P: Platform>(&mut self, platform: &mut P) {
        if let Some(id) = self.watch.take() {
            platform.remove_watch(id);
        }
        if !self.idle_enabled {
            return;
        }

        let threshold = Duration::from_secs(self.config.general.idle_time);
        match platform.add_watch(threshold) {
            Ok(id) => {
                debug!("Idle watch {:?} armed for {}s", id, threshold.as_secs());
                self.watch = Some(id);
            }
            Err(e) => {
                error!("{}; idle activation disabled", e);
                self.idle_enabled = false;
            }
        }
    }

    #[cfg(test)]
    fn set_bounce(&mut self, state: BounceState) {
        if let Some(session) = self.session.as_mut() {
            session.bounce = Some(state);
        }
    }
}

/// Cancel timers, release input and destroy both layers
fn teardown<P: Platform>(session: Session, platform: &mut P) {
    platform.cancel_timer(session.animation);
    if let Some(id) = session.clock {
        platform.cancel_timer(id);
    }
    if session.capturing {
        platform.release_input();
    }
    platform.destroy_label();
    platform.destroy_overlay();
}

fn start_clock<P: Platform>(display: &DisplayConfig, platform: &mut P) -> Option<TimerId> {
    (display.mode == DisplayMode::Clock).then(|| platform.start_timer(CLOCK_PERIOD))
}

/// Pick a random start once the label size is known
fn place_label<P: Platform>(session: &mut Session, rng: &mut StdRng, speed: u32, platform: &mut P) {
    let Some(bounds) = measure(&*platform) else {
        debug!("Label not measured yet, deferring placement");
        return;
    };
    let state = motion::random_start(rng, &bounds, speed as f32);
    session.bounce = Some(state);
    move_to(platform, &state);
}

fn measure<S: Surface>(surface: &S) -> Option<Bounds> {
    let (width, height) = surface.display_size();
    let (label_width, label_height) = surface.label_size()?;
    if label_width < 0.0 || label_height < 0.0 {
        return None;
    }
    Some(Bounds {
        width,
        height,
        label_width,
        label_height,
    })
}

fn move_to<S: Surface>(surface: &mut S, state: &BounceState) {
    surface.move_label(state.position.x.floor() as i32, state.position.y.floor() as i32);
}

fn label_style(display: &DisplayConfig, palette: &Palette, color_index: usize) -> LabelStyle {
    LabelStyle {
        color: palette.color(color_index),
        font_size: display.font_size,
        glow: display.show_glow,
    }
}

fn fade_to(to: f32, duration: Duration, easing: Easing) -> Fade {
    Fade {
        to,
        duration,
        easing,
    }
}
