use std::env;
use std::time::Duration;

use chrono::TimeDelta;
use chrono_tz::Tz;

use crate::surface::{Color, Palette};

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TRACK_WINDOW_HOURS: i64 = 24;
const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Longest poll period the runner accepts.
pub(crate) const MAX_POLL_INTERVAL: Duration = Duration::from_secs(MAX_POLL_INTERVAL_SECS);

/// Tracking layer configuration derived from the host environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub poll_interval: Duration,
    pub track_window: TimeDelta,
    pub http_timeout: Duration,
    pub timezone: Tz,
    pub palette: Palette,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("YARD_API_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| {
                tracing::trace!("YARD_API_URL not set, using default: {DEFAULT_API_URL}");
                DEFAULT_API_URL.to_string()
            });
        let poll_interval = Duration::from_secs(
            parse_or(&lookup, "POLL_INTERVAL_SECS", 8_u64).clamp(1, MAX_POLL_INTERVAL_SECS),
        );
        let track_window =
            TimeDelta::try_hours(parse_or(&lookup, "TRACK_WINDOW_HOURS", DEFAULT_TRACK_WINDOW_HOURS))
                .filter(|window| *window > TimeDelta::zero())
                .unwrap_or_else(|| {
                    tracing::trace!(
                        "TRACK_WINDOW_HOURS out of range, using default: {DEFAULT_TRACK_WINDOW_HOURS}"
                    );
                    TimeDelta::hours(DEFAULT_TRACK_WINDOW_HOURS)
                });
        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10_u64));
        let timezone = lookup("TIMEZONE")
            .and_then(|value| value.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::UTC);

        let defaults = Palette::default();
        let palette = Palette {
            accent: color_or(&lookup, "ACCENT_COLOR", defaults.accent),
            neutral: color_or(&lookup, "NEUTRAL_COLOR", defaults.neutral),
            track: color_or(&lookup, "TRACK_COLOR", defaults.track),
        };

        Self { api_url, poll_interval, track_window, http_timeout, timezone, palette }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T,
) -> T {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok()).unwrap_or(default)
}

fn color_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Color) -> Color {
    let Some(value) = lookup(key) else {
        return default;
    };
    let color = Color::from(value);
    if color.is_valid() {
        return color;
    }
    tracing::trace!("{key} is not a CSS colour, using default: {default}");
    default
}
