//! Label text: a fixed string, or the wall clock

use chrono::{Local, NaiveTime, Timelike};

use crate::config::{ClockFormat, DisplayConfig, DisplayMode};

/// Text for the label at time `now`
pub fn current_text<T: Timelike>(
    mode: DisplayMode,
    static_text: &str,
    format: ClockFormat,
    show_seconds: bool,
    now: &T,
) -> String {
    match mode {
        DisplayMode::Text => static_text.to_string(),
        DisplayMode::Clock => format_clock(format, show_seconds, now),
    }
}

/// Same as [`current_text`], reading every knob from the display settings
pub fn label_text<T: Timelike>(display: &DisplayConfig, now: &T) -> String {
    current_text(
        display.mode,
        &display.text,
        display.clock_format,
        display.show_seconds,
        now,
    )
}

/// Local wall-clock time
pub fn now() -> NaiveTime {
    Local::now().time()
}

fn format_clock<T: Timelike>(format: ClockFormat, show_seconds: bool, now: &T) -> String {
    let (hour, suffix) = match format {
        ClockFormat::H24 => (now.hour(), ""),
        ClockFormat::H12 => {
            let (pm, hour12) = now.hour12();
            (hour12, if pm { " PM" } else { " AM" })
        }
    };

    if show_seconds {
        format!("{:02}:{:02}:{:02}{}", hour, now.minute(), now.second(), suffix)
    } else {
        format!("{:02}:{:02}{}", hour, now.minute(), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn text_mode_is_verbatim() {
        let text = current_text(DisplayMode::Text, "  hi there ", ClockFormat::H12, true, &at(1, 2, 3));
        assert_eq!(text, "  hi there ");
    }

    #[test]
    fn midnight_in_12h_is_twelve_am() {
        let text = current_text(DisplayMode::Clock, "", ClockFormat::H12, false, &at(0, 0, 0));
        assert_eq!(text, "12:00 AM");
    }

    #[test]
    fn afternoon_in_24h_with_seconds() {
        let text = current_text(DisplayMode::Clock, "", ClockFormat::H24, true, &at(13, 5, 9));
        assert_eq!(text, "13:05:09");
    }

    #[test]
    fn last_second_of_day_in_12h() {
        let text = current_text(DisplayMode::Clock, "", ClockFormat::H12, true, &at(23, 59, 59));
        assert_eq!(text, "11:59:59 PM");
    }

    #[test]
    fn noon_is_pm_and_hours_are_padded() {
        assert_eq!(
            current_text(DisplayMode::Clock, "", ClockFormat::H12, false, &at(12, 30, 0)),
            "12:30 PM"
        );
        assert_eq!(
            current_text(DisplayMode::Clock, "", ClockFormat::H12, false, &at(9, 7, 0)),
            "09:07 AM"
        );
        assert_eq!(
            current_text(DisplayMode::Clock, "", ClockFormat::H24, false, &at(0, 7, 0)),
            "00:07"
        );
    }

    #[test]
    fn label_text_reads_display_settings() {
        let mut display = DisplayConfig::default();
        assert_eq!(label_text(&display, &at(8, 0, 0)), "DVD");
        display.mode = DisplayMode::Clock;
        display.show_seconds = true;
        assert_eq!(label_text(&display, &at(8, 0, 1)), "08:00:01");
    }
}
