//! Display preferences shared by both surfaces
//!
//! Both surfaces resolve the raw preference keys through
//! [`DisplayPreferences::resolve`], so a given store state always looks the
//! same on either side.

use tracing::warn;

use crate::color::HexColor;
use crate::constants::appearance::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Background behind the timer text
    pub fn background(self) -> HexColor {
        match self {
            Theme::Light => HexColor::rgb(0xff, 0xff, 0xff),
            Theme::Dark => HexColor::rgb(0x11, 0x11, 0x11),
        }
    }
}

/// Clamp a font size into the supported range
pub fn clamp_font_size(size: f64) -> f64 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Resolved appearance, ready to apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPreferences {
    pub theme: Theme,
    pub color_normal: HexColor,
    pub color_overtime: HexColor,
    /// Percent of viewport width, always within [MIN_FONT_SIZE, MAX_FONT_SIZE]
    pub font_size: f64,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            color_normal: default_color(DEFAULT_COLOR_NORMAL),
            color_overtime: default_color(DEFAULT_COLOR_OVERTIME),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl DisplayPreferences {
    /// Build preferences from raw stored values, substituting defaults for
    /// anything absent or unparseable
    pub fn resolve(
        theme: Theme,
        color_normal: Option<String>,
        color_overtime: Option<String>,
        font_size: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            theme,
            color_normal: parse_or(color_normal, defaults.color_normal, "timerColorNormal"),
            color_overtime: parse_or(color_overtime, defaults.color_overtime, "timerColorOvertime"),
            // A stored 0 reads as unset
            font_size: font_size
                .filter(|size| size.is_finite() && *size != 0.0)
                .map(clamp_font_size)
                .unwrap_or(DEFAULT_FONT_SIZE),
        }
    }

    /// Text color for the given overtime state
    pub fn text_color(&self, overtime: bool) -> HexColor {
        if overtime {
            self.color_overtime
        } else {
            self.color_normal
        }
    }
}

fn parse_or(raw: Option<String>, fallback: HexColor, key: &str) -> HexColor {
    match raw {
        None => fallback,
        Some(raw) if raw.is_empty() => fallback,
        Some(raw) => HexColor::parse(&raw).unwrap_or_else(|| {
            warn!(key, value = %raw, "Invalid color, using default");
            fallback
        }),
    }
}

fn default_color(hex: &str) -> HexColor {
    HexColor::parse(hex).unwrap_or(HexColor::rgb(0, 0, 0))
}
