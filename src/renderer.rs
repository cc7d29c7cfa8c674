//! Terminal overlay surface
//!
//! Draws the screensaver on the controlling terminal:
//! - The overlay is the alternate screen, cleared to black, in raw mode
//! - The label is one line of bold truecolor text at a cell position
//! - Opacity is applied by scaling the label color toward black
//!
//! Positions coming from the controller are in px; one terminal cell is
//! treated as `CELL_WIDTH` x `CELL_HEIGHT` px so bounce speeds in px/sec
//! look the same as on a pixel display.

use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, event, execute, queue, terminal};
use log::{debug, warn};
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::palette::Rgb;
use crate::platform::{Fade, FadeId, LabelStyle, Layer};

pub const CELL_WIDTH: f32 = 10.0;
pub const CELL_HEIGHT: f32 = 20.0;

struct Label {
    text: String,
    style: LabelStyle,
    x: i32,
    y: i32,
    opacity: f32,
}

struct ActiveFade {
    id: FadeId,
    layer: Layer,
    from: f32,
    fade: Fade,
    started: Instant,
}

/// Cells last painted for the label, erased on the next frame
#[derive(Debug, Clone, Copy, PartialEq)]
struct Painted {
    col: u16,
    row: u16,
    width: u16,
}

pub struct TerminalRenderer {
    out: Stdout,
    overlay: Option<f32>,
    label: Option<Label>,
    fades: Vec<ActiveFade>,
    painted: Option<Painted>,
    next_fade: u64,
    dirty: bool,
    /// Shared with the input reader thread
    capture: Arc<AtomicBool>,
}

impl TerminalRenderer {
    pub fn new(capture: Arc<AtomicBool>) -> Self {
        Self {
            out: io::stdout(),
            overlay: None,
            label: None,
            fades: Vec::new(),
            painted: None,
            next_fade: 0,
            dirty: false,
            capture,
        }
    }

    pub fn display_size(&self) -> (f32, f32) {
        let (cols, rows) = terminal::size().unwrap_or((80, 24));
        (cols as f32 * CELL_WIDTH, rows as f32 * CELL_HEIGHT)
    }

    pub fn create_overlay(&mut self) {
        if let Err(e) = self.enter() {
            warn!("Failed to set up terminal overlay: {}", e);
        }
        self.overlay = Some(1.0);
        self.painted = None;
        self.dirty = true;
    }

    fn enter(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Color::Black),
            terminal::Clear(terminal::ClearType::All)
        )
    }

    pub fn destroy_overlay(&mut self) {
        if self.overlay.take().is_none() {
            return;
        }
        self.fades.retain(|f| f.layer != Layer::Overlay);
        if let Err(e) = self.leave() {
            warn!("Failed to restore terminal: {}", e);
        }
    }

    fn leave(&mut self) -> io::Result<()> {
        execute!(self.out, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn create_label(&mut self, text: &str, style: &LabelStyle) {
        self.label = Some(Label {
            text: text.to_string(),
            style: style.clone(),
            x: 0,
            y: 0,
            opacity: 1.0,
        });
        self.dirty = true;
    }

    pub fn destroy_label(&mut self) {
        self.label = None;
        self.fades.retain(|f| f.layer != Layer::Label);
        self.dirty = true;
    }

    pub fn set_label_text(&mut self, text: &str) {
        if let Some(label) = self.label.as_mut() {
            label.text = text.to_string();
            self.dirty = true;
        }
    }

    pub fn restyle_label(&mut self, style: &LabelStyle) {
        if let Some(label) = self.label.as_mut() {
            label.style = style.clone();
            self.dirty = true;
        }
    }

    pub fn move_label(&mut self, x: i32, y: i32) {
        if let Some(label) = self.label.as_mut() {
            label.x = x;
            label.y = y;
            self.dirty = true;
        }
    }

    /// Text is laid out synchronously, so the size is known immediately
    pub fn label_size(&self) -> Option<(f32, f32)> {
        self.label
            .as_ref()
            .map(|l| (l.text.chars().count() as f32 * CELL_WIDTH, CELL_HEIGHT))
    }

    pub fn set_opacity(&mut self, layer: Layer, opacity: f32) {
        self.fades.retain(|f| f.layer != layer);
        self.store_opacity(layer, opacity);
    }

    fn opacity(&self, layer: Layer) -> f32 {
        match layer {
            Layer::Overlay => self.overlay.unwrap_or(0.0),
            Layer::Label => self.label.as_ref().map_or(0.0, |l| l.opacity),
        }
    }

    fn store_opacity(&mut self, layer: Layer, opacity: f32) {
        match layer {
            Layer::Overlay => {
                if let Some(o) = self.overlay.as_mut() {
                    *o = opacity;
                }
            }
            Layer::Label => {
                if let Some(label) = self.label.as_mut() {
                    label.opacity = opacity;
                }
            }
        }
        self.dirty = true;
    }

    /// Start a ramp, replacing any ramp already running on `layer`
    pub fn fade(&mut self, layer: Layer, fade: Fade) -> FadeId {
        self.next_fade += 1;
        let id = FadeId(self.next_fade);
        let from = self.opacity(layer);
        self.fades.retain(|f| f.layer != layer);
        self.fades.push(ActiveFade {
            id,
            layer,
            from,
            fade,
            started: Instant::now(),
        });
        id
    }

    /// Step all ramps to `now` and return the ones that finished
    pub fn advance_fades(&mut self, now: Instant) -> Vec<FadeId> {
        let mut finished = Vec::new();
        let mut updates = Vec::new();

        self.fades.retain(|f| {
            let t = progress(now.saturating_duration_since(f.started), f.fade.duration);
            let value = f.from + (f.fade.to - f.from) * f.fade.easing.apply(t);
            updates.push((f.layer, value));
            if t >= 1.0 {
                finished.push(f.id);
                false
            } else {
                true
            }
        });

        for (layer, value) in updates {
            self.store_opacity(layer, value);
        }
        finished
    }

    pub fn capture_input(&mut self) {
        if let Err(e) = execute!(self.out, event::EnableMouseCapture) {
            warn!("Failed to enable mouse capture: {}", e);
        }
        self.capture.store(true, Ordering::Release);
        debug!("Input capture installed");
    }

    pub fn release_input(&mut self) {
        self.capture.store(false, Ordering::Release);
        if let Err(e) = execute!(self.out, event::DisableMouseCapture) {
            warn!("Failed to disable mouse capture: {}", e);
        }
        debug!("Input capture removed");
    }

    /// Repaint the label if anything changed since the last frame
    pub fn present(&mut self) -> io::Result<()> {
        if !self.dirty || self.overlay.is_none() {
            return Ok(());
        }
        self.dirty = false;

        if let Some(old) = self.painted.take() {
            queue!(
                self.out,
                cursor::MoveTo(old.col, old.row),
                SetBackgroundColor(Color::Black),
                Print(" ".repeat(old.width as usize))
            )?;
        }

        let overlay = self.overlay.unwrap_or(0.0);
        if let Some(label) = &self.label {
            let painted = Painted {
                col: (label.x as f32 / CELL_WIDTH).max(0.0) as u16,
                row: (label.y as f32 / CELL_HEIGHT).max(0.0) as u16,
                width: label.text.chars().count() as u16,
            };
            let color = dim(label.style.color, label.opacity * overlay);
            queue!(
                self.out,
                cursor::MoveTo(painted.col, painted.row),
                SetBackgroundColor(Color::Black),
                SetForegroundColor(color)
            )?;
            if label.style.glow {
                queue!(self.out, SetAttribute(Attribute::Bold))?;
            }
            queue!(self.out, Print(&label.text), SetAttribute(Attribute::Reset))?;
            self.painted = Some(painted);
        }

        self.out.flush()
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        if self.capture.load(Ordering::Acquire) {
            self.release_input();
        }
        self.destroy_overlay();
    }
}

fn progress(elapsed: Duration, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
}

fn dim(color: Rgb, opacity: f32) -> Color {
    let scale = |c: u8| (c as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
    Color::Rgb {
        r: scale(color.0),
        g: scale(color.1),
        b: scale(color.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Easing;

    fn style() -> LabelStyle {
        LabelStyle {
            color: Rgb(200, 100, 50),
            font_size: 72,
            glow: true,
        }
    }

    fn renderer() -> TerminalRenderer {
        TerminalRenderer::new(Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn label_size_is_cells_times_text_length() {
        let mut r = renderer();
        assert_eq!(r.label_size(), None);
        r.create_label("DVD", &style());
        assert_eq!(r.label_size(), Some((3.0 * CELL_WIDTH, CELL_HEIGHT)));
        r.set_label_text("12:00 AM");
        assert_eq!(r.label_size(), Some((8.0 * CELL_WIDTH, CELL_HEIGHT)));
    }

    #[test]
    fn fade_reports_completion_once() {
        let mut r = renderer();
        r.create_label("DVD", &style());
        r.set_opacity(Layer::Label, 0.0);
        let id = r.fade(
            Layer::Label,
            Fade {
                to: 1.0,
                duration: Duration::from_millis(100),
                easing: Easing::EaseOutQuad,
            },
        );

        let start = Instant::now();
        assert!(r.advance_fades(start).is_empty());
        let done = r.advance_fades(start + Duration::from_secs(1));
        assert_eq!(done, vec![id]);
        assert_eq!(r.opacity(Layer::Label), 1.0);
        assert!(r.advance_fades(start + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn new_fade_replaces_running_one() {
        let mut r = renderer();
        r.create_label("DVD", &style());
        let fade = Fade {
            to: 0.0,
            duration: Duration::from_millis(10),
            easing: Easing::EaseInQuad,
        };
        let first = r.fade(Layer::Label, fade);
        let second = r.fade(Layer::Label, fade);
        let done = r.advance_fades(Instant::now() + Duration::from_secs(1));
        assert_eq!(done, vec![second]);
        assert!(!done.contains(&first));
    }

    #[test]
    fn dim_scales_toward_black() {
        assert_eq!(dim(Rgb(200, 100, 50), 1.0), Color::Rgb { r: 200, g: 100, b: 50 });
        assert_eq!(dim(Rgb(200, 100, 50), 0.5), Color::Rgb { r: 100, g: 50, b: 25 });
        assert_eq!(dim(Rgb(200, 100, 50), 0.0), Color::Rgb { r: 0, g: 0, b: 0 });
    }
}
