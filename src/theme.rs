//! Theme: light/dark palettes, optional btop-style `theme[key]="value"` overrides, hex → ratatui Color.

use crate::game::PowerUpKind;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Board and sidebar colours for one theme mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub dark: bool,
    /// Board background.
    pub bg: Color,
    /// Every other board cell, for a faint checkerboard.
    pub bg_alt: Color,
    /// Borders.
    pub div_line: Color,
    /// Score, labels.
    pub main_fg: Color,
    /// Titles, highlights.
    pub title: Color,
    pub inactive_fg: Color,
    pub snake_head: Color,
    pub snake_body: Color,
    pub food: Color,
    /// Per kind: slow motion, double points, shrink.
    pub power_up: [Color; 3],
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

impl Theme {
    /// Dark palette: One Dark values.
    pub fn dark() -> Self {
        Self {
            dark: true,
            bg: Color::Rgb(0x28, 0x2C, 0x34),
            bg_alt: Color::Rgb(0x2C, 0x31, 0x3A),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
            snake_head: Color::Rgb(0x98, 0xC3, 0x79),
            snake_body: Color::Rgb(0x56, 0x8A, 0x4A),
            food: Color::Rgb(0xE0, 0x6C, 0x75),
            power_up: [
                Color::Rgb(0x61, 0xAF, 0xEF),
                Color::Rgb(0xE5, 0xC0, 0x7B),
                Color::Rgb(0xC6, 0x78, 0xDD),
            ],
        }
    }

    /// Light palette: One Light values.
    pub fn light() -> Self {
        Self {
            dark: false,
            bg: Color::Rgb(0xFA, 0xFA, 0xFA),
            bg_alt: Color::Rgb(0xF0, 0xF0, 0xF1),
            div_line: Color::Rgb(0xA0, 0xA1, 0xA7),
            main_fg: Color::Rgb(0x38, 0x3A, 0x42),
            title: Color::Rgb(0x40, 0x78, 0xF2),
            inactive_fg: Color::Rgb(0xA0, 0xA1, 0xA7),
            snake_head: Color::Rgb(0x2E, 0x8B, 0x57),
            snake_body: Color::Rgb(0x50, 0xA1, 0x4F),
            food: Color::Rgb(0xE4, 0x56, 0x49),
            power_up: [
                Color::Rgb(0x01, 0x84, 0xBC),
                Color::Rgb(0xC1, 0x84, 0x01),
                Color::Rgb(0xA6, 0x26, 0xA4),
            ],
        }
    }

    pub fn for_mode(dark: bool) -> Self {
        if dark { Self::dark() } else { Self::light() }
    }

    /// Built-in palette for `dark`, with overrides from a btop-style file if given.
    /// Keys may be prefixed `dark.` / `light.` to target one mode; bare keys apply to both.
    pub fn load(path: Option<&Path>, dark: bool) -> Result<Self, ThemeError> {
        let mut theme = Self::for_mode(dark);
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(theme),
        };
        let s = std::fs::read_to_string(path)?;
        theme.apply_overrides(&parse_theme_file(&s));
        Ok(theme)
    }

    fn apply_overrides(&mut self, map: &HashMap<String, String>) {
        let prefix = if self.dark { "dark." } else { "light." };
        let get = |key: &str| {
            map.get(&format!("{prefix}{key}"))
                .or_else(|| map.get(key))
                .and_then(|v| parse_hex(v).ok())
        };
        let slots: [(&str, &mut Color); 9] = [
            ("bg", &mut self.bg),
            ("bg_alt", &mut self.bg_alt),
            ("div_line", &mut self.div_line),
            ("main_fg", &mut self.main_fg),
            ("title", &mut self.title),
            ("inactive_fg", &mut self.inactive_fg),
            ("snake_head", &mut self.snake_head),
            ("snake_body", &mut self.snake_body),
            ("food", &mut self.food),
        ];
        for (key, slot) in slots {
            if let Some(c) = get(key) {
                *slot = c;
            }
        }
        for (kind, key) in [
            (PowerUpKind::SlowMotion, "slow_motion"),
            (PowerUpKind::DoublePoints, "double_points"),
            (PowerUpKind::ShrinkSnake, "shrink_snake"),
        ] {
            if let Some(c) = get(key) {
                self.power_up[power_up_index(kind)] = c;
            }
        }
    }

    #[inline]
    pub fn power_up_color(&self, kind: PowerUpKind) -> Color {
        self.power_up[power_up_index(kind)]
    }
}

fn power_up_index(kind: PowerUpKind) -> usize {
    match kind {
        PowerUpKind::SlowMotion => 0,
        PowerUpKind::DoublePoints => 1,
        PowerUpKind::ShrinkSnake => 2,
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
                let key = stripped[..end].trim();
                let rest = stripped[end + 1..].trim();
                if let Some(eq) = rest.find('=') {
                    let value = rest[eq + 1..]
                        .trim()
                        .trim_matches('"')
                        .trim_matches('\'')
                        .to_string();
                    if !value.is_empty() {
                        map.insert(key.to_string(), value);
                    }
                }
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    if !s.is_ascii() {
        return Err(ThemeError::InvalidHex(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}
