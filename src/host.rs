//! calloop host
//!
//! Owns the event loop and everything the controller talks to. Background
//! threads (idle sensor, terminal input reader) only ever send
//! [`HostEvent`]s over a calloop channel; all controller work happens on
//! the loop thread.

use calloop::channel::{self, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, RegistrationToken};
use crossterm::event::{self as term, KeyEventKind, MouseEventKind};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::config::{Config, SettingChange};
use crate::controller::{Controller, Phase};
use crate::idle::HyprIdleSensor;
use crate::platform::{
    Event, Fade, FadeId, IdleSensor, InputKind, LabelStyle, Layer, Scheduler, SensorError, Surface,
    TimerId, WatchId,
};
use crate::palette::ColorScheme;
use crate::renderer::TerminalRenderer;

const CONFIG_POLL: Duration = Duration::from_secs(2);
const INPUT_POLL: Duration = Duration::from_millis(50);
const FRAME: Duration = Duration::from_millis(16);

/// Messages from background threads to the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    IdleReached(WatchId),
    /// Cursor moved somewhere on the desktop
    Activity,
    /// Input read from the terminal while captured
    Input(InputKind),
}

/// Everything the controller can reach, living on the loop thread
pub struct TerminalHost {
    handle: LoopHandle<'static, App>,
    timers: HashMap<TimerId, RegistrationToken>,
    next_timer: u64,
    renderer: TerminalRenderer,
    sensor: Option<HyprIdleSensor>,
    sensor_error: Option<String>,
    capture: Arc<AtomicBool>,
}

pub struct App {
    pub controller: Controller,
    pub host: TerminalHost,
    config_path: String,
    source: ConfigSource,
    config_mtime: Option<SystemTime>,
    /// Preview runs exit once the screensaver has been dismissed
    preview: bool,
    pub exit: bool,
}

/// The config file as last read, plus the `--scheme` override on top of it
#[derive(Debug, Clone)]
struct ConfigSource {
    file: Config,
    scheme: Option<ColorScheme>,
}

impl ConfigSource {
    /// What the controller runs with
    fn effective(&self) -> Config {
        let mut config = self.file.clone();
        if let Some(scheme) = self.scheme {
            config.bounce.color_scheme = scheme;
        }
        config
    }

    /// Swap in a freshly read file and return the changes to fan out.
    /// Editing `color_scheme` in the file replaces the override.
    fn reload(&mut self, file: Config) -> Vec<SettingChange> {
        let changes = self.file.diff(&file);
        if changes.iter().any(|c| matches!(c, SettingChange::ColorScheme(_))) {
            self.scheme = None;
        }
        self.file = file;
        changes
    }
}

impl IdleSensor for TerminalHost {
    fn add_watch(&mut self, threshold: Duration) -> Result<WatchId, SensorError> {
        match self.sensor.as_mut() {
            Some(sensor) => sensor.add_watch(threshold),
            None => Err(SensorError::Unavailable(
                self.sensor_error.clone().unwrap_or_else(|| "no idle sensor".into()),
            )),
        }
    }

    fn remove_watch(&mut self, id: WatchId) {
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.remove_watch(id);
        }
    }
}

impl Scheduler for TerminalHost {
    fn start_timer(&mut self, period: Duration) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);

        let inserted = self
            .handle
            .insert_source(Timer::from_duration(period), move |_, _, app: &mut App| {
                app.controller.handle(Event::Timer(id), &mut app.host);
                TimeoutAction::ToDuration(period)
            });
        match inserted {
            Ok(token) => {
                self.timers.insert(id, token);
            }
            Err(e) => error!("Failed to start timer: {}", e.error),
        }
        id
    }

    fn cancel_timer(&mut self, id: TimerId) {
        if let Some(token) = self.timers.remove(&id) {
            self.handle.remove(token);
        }
    }
}

impl Surface for TerminalHost {
    fn display_size(&self) -> (f32, f32) {
        self.renderer.display_size()
    }

    fn create_overlay(&mut self) {
        self.renderer.create_overlay();
    }

    fn destroy_overlay(&mut self) {
        self.renderer.destroy_overlay();
    }

    fn create_label(&mut self, text: &str, style: &LabelStyle) {
        self.renderer.create_label(text, style);
    }

    fn destroy_label(&mut self) {
        self.renderer.destroy_label();
    }

    fn set_label_text(&mut self, text: &str) {
        self.renderer.set_label_text(text);
    }

    fn restyle_label(&mut self, style: &LabelStyle) {
        self.renderer.restyle_label(style);
    }

    fn move_label(&mut self, x: i32, y: i32) {
        self.renderer.move_label(x, y);
    }

    fn label_size(&self) -> Option<(f32, f32)> {
        self.renderer.label_size()
    }

    fn set_opacity(&mut self, layer: Layer, opacity: f32) {
        self.renderer.set_opacity(layer, opacity);
    }

    fn fade(&mut self, layer: Layer, fade: Fade) -> FadeId {
        self.renderer.fade(layer, fade)
    }

    fn capture_input(&mut self) {
        self.renderer.capture_input();
    }

    fn release_input(&mut self) {
        self.renderer.release_input();
    }
}

impl App {
    fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::IdleReached(id) => self.controller.handle(Event::IdleReached(id), &mut self.host),
            HostEvent::Activity => self.captured_input(InputKind::PointerMotion),
            HostEvent::Input(kind) => self.captured_input(kind),
        }
    }

    fn captured_input(&mut self, kind: InputKind) {
        if self.host.capture.load(Ordering::Acquire) {
            self.controller.handle(Event::Input(kind), &mut self.host);
        }
    }

    /// Re-read the config file if it changed and fan out the differences
    fn reload_config(&mut self) {
        let mtime = fs::metadata(&self.config_path).and_then(|m| m.modified()).ok();
        if mtime.is_none() || mtime == self.config_mtime {
            return;
        }
        self.config_mtime = mtime;

        let config = match Config::load(&self.config_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Ignoring invalid config {}: {}", self.config_path, e);
                return;
            }
        };

        if config.general.poll_interval != self.source.file.general.poll_interval {
            warn!("poll_interval changes take effect after a restart");
        }
        let changes = self.source.reload(config);
        info!("Config reloaded ({} change(s))", changes.len());
        for change in changes {
            self.controller.handle(Event::Setting(change), &mut self.host);
        }
    }

    /// Work done once per loop iteration, after dispatching sources
    fn frame(&mut self) {
        for id in self.host.renderer.advance_fades(Instant::now()) {
            self.controller.handle(Event::FadeFinished(id), &mut self.host);
        }
        if let Err(e) = self.host.renderer.present() {
            warn!("Render failed: {}", e);
        }
        if self.preview && self.controller.phase() == Phase::Idle {
            self.exit = true;
        }
    }
}

/// Run the daemon (or a one-shot preview) until asked to exit
pub fn run(
    config: Config,
    scheme: Option<ColorScheme>,
    config_path: String,
    preview: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut event_loop: EventLoop<'static, App> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    let (tx, rx) = channel::channel::<HostEvent>();
    handle
        .insert_source(rx, |event, _, app: &mut App| {
            if let channel::Event::Msg(msg) = event {
                app.on_host_event(msg);
            }
        })
        .map_err(|e| e.error)?;

    handle
        .insert_source(Timer::from_duration(CONFIG_POLL), |_, _, app: &mut App| {
            app.reload_config();
            TimeoutAction::ToDuration(CONFIG_POLL)
        })
        .map_err(|e| e.error)?;

    let capture = Arc::new(AtomicBool::new(false));
    spawn_input_reader(capture.clone(), tx.clone());

    let poll_interval = Duration::from_millis(config.general.poll_interval);
    let (sensor, sensor_error) = if preview {
        (None, Some("idle detection is off in preview mode".to_string()))
    } else {
        match HyprIdleSensor::spawn(poll_interval, tx) {
            Ok(s) => (Some(s), None),
            Err(e) => (None, Some(e.to_string())),
        }
    };

    let host = TerminalHost {
        handle,
        timers: HashMap::new(),
        next_timer: 0,
        renderer: TerminalRenderer::new(capture.clone()),
        sensor,
        sensor_error,
        capture,
    };

    let source = ConfigSource { file: config, scheme };
    let controller = if preview {
        Controller::new(source.effective()).without_idle()
    } else {
        Controller::new(source.effective())
    };

    let config_mtime = fs::metadata(&config_path).and_then(|m| m.modified()).ok();
    let mut app = App {
        controller,
        host,
        config_path,
        source,
        config_mtime,
        preview,
        exit: false,
    };

    if preview {
        app.controller.activate(&mut app.host);
    } else {
        app.controller.enable(&mut app.host);
        if app.controller.idle_enabled() {
            info!(
                "Waiting for {}s of inactivity",
                app.controller.config().general.idle_time
            );
        } else {
            warn!("Idle activation is disabled; only --preview will show the screensaver");
        }
    }

    loop {
        if let Err(e) = event_loop.dispatch(FRAME, &mut app) {
            error!("Event loop error: {}", e);
            break;
        }
        app.frame();
        if app.exit {
            break;
        }
    }

    app.controller.disable(&mut app.host);
    info!("{} corner hit(s) this run", app.controller.corner_hits());
    Ok(())
}

/// Forward terminal key/mouse input to the loop while capture is on.
/// Input queued before capture was installed belongs to no session and is dropped.
fn spawn_input_reader(capture: Arc<AtomicBool>, events: Sender<HostEvent>) {
    let spawned = std::thread::Builder::new()
        .name("input-reader".into())
        .spawn(move || {
            let mut capturing = false;
            loop {
                if !capture.load(Ordering::Acquire) {
                    capturing = false;
                    std::thread::sleep(INPUT_POLL);
                    continue;
                }
                if !capturing {
                    capturing = true;
                    match discard_pending(term::poll, term::read) {
                        Ok(0) => {}
                        Ok(n) => debug!("Dropped {} stale input event(s)", n),
                        Err(e) => warn!("Failed to flush terminal input: {}", e),
                    }
                }
                match term::poll(INPUT_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("Terminal input poll failed: {}", e);
                        std::thread::sleep(INPUT_POLL);
                        continue;
                    }
                }
                let kind = match term::read() {
                    Ok(ev) => classify(&ev),
                    Err(e) => {
                        warn!("Terminal input read failed: {}", e);
                        None
                    }
                };
                if let Some(kind) = kind
                    && events.send(HostEvent::Input(kind)).is_err()
                {
                    debug!("Event loop gone, input reader exiting");
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        error!("Failed to start input reader: {}", e);
    }
}

/// Read and throw away everything already queued, without blocking
fn discard_pending(
    mut poll: impl FnMut(Duration) -> io::Result<bool>,
    mut read: impl FnMut() -> io::Result<term::Event>,
) -> io::Result<usize> {
    let mut dropped = 0;
    while poll(Duration::ZERO)? {
        read()?;
        dropped += 1;
    }
    Ok(dropped)
}

fn classify(event: &term::Event) -> Option<InputKind> {
    match event {
        term::Event::Key(key) if key.kind == KeyEventKind::Press => Some(InputKind::KeyPress),
        term::Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(_) => Some(InputKind::ButtonPress),
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(InputKind::PointerMotion),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    fn mouse(kind: MouseEventKind) -> term::Event {
        term::Event::Mouse(MouseEvent {
            kind,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn key_presses_dismiss_but_releases_do_not() {
        let press = term::Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert_eq!(classify(&press), Some(InputKind::KeyPress));

        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(classify(&term::Event::Key(release)), None);
    }

    #[test]
    fn pointer_events_are_classified() {
        assert_eq!(
            classify(&mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(InputKind::ButtonPress)
        );
        assert_eq!(classify(&mouse(MouseEventKind::Moved)), Some(InputKind::PointerMotion));
        assert_eq!(classify(&mouse(MouseEventKind::ScrollUp)), None);
        assert_eq!(classify(&term::Event::FocusLost), None);
    }

    fn key(c: char) -> term::Event {
        term::Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn keys_queued_before_capture_are_discarded() {
        let queue = RefCell::new(VecDeque::from([key('a'), key('a'), mouse(MouseEventKind::Moved)]));
        let dropped = discard_pending(
            |timeout| {
                assert_eq!(timeout, Duration::ZERO);
                Ok(!queue.borrow().is_empty())
            },
            || Ok(queue.borrow_mut().pop_front().unwrap()),
        )
        .unwrap();

        assert_eq!(dropped, 3);
        assert!(queue.borrow().is_empty());
    }

    #[test]
    fn discard_stops_on_read_error() {
        let mut polls = 0;
        let result = discard_pending(
            |_| {
                polls += 1;
                Ok(true)
            },
            || Err(io::Error::other("tty gone")),
        );
        assert!(result.is_err());
        assert_eq!(polls, 1);
    }

    fn file_config() -> Config {
        Config::parse("[bounce]\ncolor_scheme = \"classic\"\n").unwrap()
    }

    #[test]
    fn scheme_override_survives_unrelated_edits() {
        let mut source = ConfigSource {
            file: file_config(),
            scheme: Some(ColorScheme::Neon),
        };
        assert_eq!(source.effective().bounce.color_scheme, ColorScheme::Neon);

        let mut edited = file_config();
        edited.general.idle_time = 60;
        assert_eq!(source.reload(edited), vec![SettingChange::IdleTime(60)]);
        assert_eq!(source.effective().bounce.color_scheme, ColorScheme::Neon);
        assert_eq!(source.effective().general.idle_time, 60);
    }

    #[test]
    fn editing_scheme_in_file_replaces_override() {
        let mut source = ConfigSource {
            file: file_config(),
            scheme: Some(ColorScheme::Neon),
        };

        let mut edited = file_config();
        edited.bounce.color_scheme = ColorScheme::Pastel;
        assert_eq!(
            source.reload(edited),
            vec![SettingChange::ColorScheme(ColorScheme::Pastel)]
        );
        assert_eq!(source.effective().bounce.color_scheme, ColorScheme::Pastel);
    }
}
