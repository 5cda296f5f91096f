//! Input routing: keys and mouse drags to actions, with a short debounce.

use crate::game::Direction;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

/// Identical actions closer together than this are dropped.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// A drag shorter than this along its dominant axis is not a swipe.
pub const MIN_SWIPE_PX: f64 = 50.0;

/// Action from a key press or gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Turn(Direction),
    TogglePause,
    Start,
    Restart,
    ToggleTheme,
    CycleDifficulty,
    Quit,
    None,
}

/// Map key event to action. Arrows and vim-style hjkl both steer.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Up | KeyCode::Char('k') => Action::Turn(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') => Action::Turn(Direction::Down),
        KeyCode::Left | KeyCode::Char('h') => Action::Turn(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') => Action::Turn(Direction::Right),
        KeyCode::Char('p' | 'P' | ' ') => Action::TogglePause,
        KeyCode::Enter => Action::Start,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Char('t' | 'T') => Action::ToggleTheme,
        KeyCode::Char('d' | 'D') => Action::CycleDifficulty,
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

/// Drops an action if the same one was accepted less than `window` ago.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<(Action, Instant)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, action: Action, now: Instant) -> bool {
        if action == Action::None {
            return false;
        }
        if let Some((prev, at)) = self.last {
            if prev == action && now.saturating_duration_since(at) < self.window {
                return false;
            }
        }
        self.last = Some((action, now));
        true
    }
}

/// Classify a drag by its dominant axis; `None` below the distance threshold.
/// Screen coordinates: positive dy is downwards.
pub fn classify_swipe(dx: f64, dy: f64) -> Option<Direction> {
    if dx.abs() > dy.abs() {
        if dx.abs() > MIN_SWIPE_PX {
            return Some(if dx > 0.0 { Direction::Right } else { Direction::Left });
        }
    } else if dy.abs() > MIN_SWIPE_PX {
        return Some(if dy > 0.0 { Direction::Down } else { Direction::Up });
    }
    None
}

/// Tracks a press/release pair and turns it into a swipe direction.
#[derive(Debug, Clone, Default)]
pub struct SwipeTracker {
    start: Option<(f64, f64)>,
}

impl SwipeTracker {
    pub fn begin(&mut self, x: f64, y: f64) {
        self.start = Some((x, y));
    }

    /// Finish the gesture. A release without a press yields nothing.
    pub fn end(&mut self, x: f64, y: f64) -> Option<Direction> {
        let (sx, sy) = self.start.take()?;
        classify_swipe(x - sx, y - sy)
    }
}
