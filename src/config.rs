use serde::Deserialize;
use std::fs;
use std::ops::RangeInclusive;
use thiserror::Error;

use crate::palette::ColorScheme;

pub const IDLE_TIME_RANGE: RangeInclusive<u64> = 10..=3600;
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 20..=200;
pub const BOUNCE_SPEED_RANGE: RangeInclusive<u32> = 50..=500;
const MIN_POLL_INTERVAL: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{key} = {value} is out of range ({min}..={max})")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Top-level configuration for HyprBounce
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub bounce: BounceConfig,
}

/// Idle detection settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GeneralConfig {
    /// Seconds without input before the screensaver shows (default: 300)
    #[serde(default = "default_idle_time")]
    pub idle_time: u64,

    /// How often to poll cursor position in milliseconds (default: 500)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

/// What the bouncing label shows and how it looks
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default)]
    pub mode: DisplayMode,

    /// Static text shown in `text` mode
    #[serde(default = "default_text")]
    pub text: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default = "default_true")]
    pub show_glow: bool,

    #[serde(default)]
    pub clock_format: ClockFormat,

    #[serde(default)]
    pub show_seconds: bool,
}

/// Motion and color cycling
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BounceConfig {
    /// Base speed in px/sec
    #[serde(default = "default_speed")]
    pub speed: u32,

    #[serde(default)]
    pub color_scheme: ColorScheme,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Text,
    Clock,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ClockFormat {
    #[default]
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "12h")]
    H12,
}

// Default value functions
fn default_idle_time() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    500
}
fn default_text() -> String {
    "DVD".to_string()
}
fn default_font_size() -> u32 {
    72
}
fn default_speed() -> u32 {
    150
}
fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            idle_time: default_idle_time(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            text: default_text(),
            font_size: default_font_size(),
            show_glow: true,
            clock_format: ClockFormat::default(),
            show_seconds: false,
        }
    }
}

impl Default for BounceConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            color_scheme: ColorScheme::default(),
        }
    }
}

/// A single changed setting carrying its new value.
///
/// Every change notification is funneled through this one type so the
/// controller can handle them in a single match, in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    IdleTime(u64),
    DisplayMode(DisplayMode),
    DisplayText(String),
    FontSize(u32),
    ShowGlow(bool),
    ClockFormat(ClockFormat),
    ShowSeconds(bool),
    BounceSpeed(u32),
    ColorScheme(ColorScheme),
}

impl SettingChange {
    /// Settings key name, as used in logs
    pub fn key(&self) -> &'static str {
        match self {
            SettingChange::IdleTime(_) => "idle-time",
            SettingChange::DisplayMode(_) => "display-mode",
            SettingChange::DisplayText(_) => "display-text",
            SettingChange::FontSize(_) => "font-size",
            SettingChange::ShowGlow(_) => "show-glow",
            SettingChange::ClockFormat(_) => "clock-format",
            SettingChange::ShowSeconds(_) => "show-seconds",
            SettingChange::BounceSpeed(_) => "bounce-speed",
            SettingChange::ColorScheme(_) => "color-scheme",
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("idle_time", self.general.idle_time, &IDLE_TIME_RANGE)?;
        check_range(
            "font_size",
            self.display.font_size.into(),
            &widen(&FONT_SIZE_RANGE),
        )?;
        check_range(
            "speed",
            self.bounce.speed.into(),
            &widen(&BOUNCE_SPEED_RANGE),
        )?;
        check_range(
            "poll_interval",
            self.general.poll_interval,
            &(MIN_POLL_INTERVAL..=u64::MAX),
        )?;
        Ok(())
    }

    /// Apply a single change to this snapshot
    pub fn apply(&mut self, change: &SettingChange) {
        match change {
            SettingChange::IdleTime(v) => self.general.idle_time = *v,
            SettingChange::DisplayMode(v) => self.display.mode = *v,
            SettingChange::DisplayText(v) => self.display.text = v.clone(),
            SettingChange::FontSize(v) => self.display.font_size = *v,
            SettingChange::ShowGlow(v) => self.display.show_glow = *v,
            SettingChange::ClockFormat(v) => self.display.clock_format = *v,
            SettingChange::ShowSeconds(v) => self.display.show_seconds = *v,
            SettingChange::BounceSpeed(v) => self.bounce.speed = *v,
            SettingChange::ColorScheme(v) => self.bounce.color_scheme = *v,
        }
    }

    /// Settings that differ between `self` and `newer`, in key order
    pub fn diff(&self, newer: &Config) -> Vec<SettingChange> {
        let (old, new) = (self, newer);
        let mut changes = Vec::new();

        if old.general.idle_time != new.general.idle_time {
            changes.push(SettingChange::IdleTime(new.general.idle_time));
        }
        if old.display.mode != new.display.mode {
            changes.push(SettingChange::DisplayMode(new.display.mode));
        }
        if old.display.text != new.display.text {
            changes.push(SettingChange::DisplayText(new.display.text.clone()));
        }
        if old.display.font_size != new.display.font_size {
            changes.push(SettingChange::FontSize(new.display.font_size));
        }
        if old.display.show_glow != new.display.show_glow {
            changes.push(SettingChange::ShowGlow(new.display.show_glow));
        }
        if old.display.clock_format != new.display.clock_format {
            changes.push(SettingChange::ClockFormat(new.display.clock_format));
        }
        if old.display.show_seconds != new.display.show_seconds {
            changes.push(SettingChange::ShowSeconds(new.display.show_seconds));
        }
        if old.bounce.speed != new.bounce.speed {
            changes.push(SettingChange::BounceSpeed(new.bounce.speed));
        }
        if old.bounce.color_scheme != new.bounce.color_scheme {
            changes.push(SettingChange::ColorScheme(new.bounce.color_scheme));
        }

        changes
    }
}

fn widen(range: &RangeInclusive<u32>) -> RangeInclusive<u64> {
    (*range.start()).into()..=(*range.end()).into()
}

fn check_range(key: &'static str, value: u64, range: &RangeInclusive<u64>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.general.idle_time, 300);
        assert_eq!(config.display.mode, DisplayMode::Text);
        assert_eq!(config.display.clock_format, ClockFormat::H24);
        assert_eq!(config.bounce.color_scheme, ColorScheme::Classic);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [general]
            idle_time = 60

            [display]
            mode = "clock"
            font_size = 120
            show_glow = false
            clock_format = "12h"
            show_seconds = true

            [bounce]
            speed = 400
            color_scheme = "neon"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.idle_time, 60);
        assert_eq!(config.display.mode, DisplayMode::Clock);
        assert_eq!(config.display.text, "DVD");
        assert_eq!(config.display.font_size, 120);
        assert!(!config.display.show_glow);
        assert_eq!(config.display.clock_format, ClockFormat::H12);
        assert!(config.display.show_seconds);
        assert_eq!(config.bounce.speed, 400);
        assert_eq!(config.bounce.color_scheme, ColorScheme::Neon);
    }

    #[test]
    fn unknown_color_scheme_is_rejected() {
        let err = Config::parse(
            r#"
            [bounce]
            color_scheme = "sepia"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = Config::parse("[general]\nidle_time = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "idle_time", .. }));

        let err = Config::parse("[display]\nfont_size = 201\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "font_size", .. }));

        let err = Config::parse("[bounce]\nspeed = 49\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "speed", .. }));
    }

    #[test]
    fn diff_lists_changes_in_key_order() {
        let old = Config::default();
        let mut new = old.clone();
        new.bounce.color_scheme = ColorScheme::Pastel;
        new.general.idle_time = 42;
        new.display.text = "hello".into();

        assert_eq!(
            old.diff(&new),
            vec![
                SettingChange::IdleTime(42),
                SettingChange::DisplayText("hello".into()),
                SettingChange::ColorScheme(ColorScheme::Pastel),
            ]
        );
        assert!(new.diff(&new).is_empty());
    }

    #[test]
    fn applying_diff_reproduces_newer_snapshot() {
        let old = Config::default();
        let mut new = old.clone();
        new.display.mode = DisplayMode::Clock;
        new.display.show_seconds = true;
        new.bounce.speed = 250;

        let mut patched = old.clone();
        for change in old.diff(&new) {
            patched.apply(&change);
        }
        assert_eq!(patched, new);
    }
}
