//! Movement and power-up expiry timers, armed while a game is live.

use crate::game::{GameState, Phase};
use std::time::{Duration, Instant};

/// Expiry sweep cadence, independent of the movement tick.
pub const SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Periodic deadline. Disarmed (cancelled) timers never fire.
#[derive(Debug, Clone)]
pub struct Periodic {
    period: Duration,
    next_due: Option<Instant>,
}

impl Periodic {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// Start counting a full period from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    #[cfg(test)]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// New period applies from the next firing on; a pending deadline is kept.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// True if the deadline has passed; re-arms one period from `now`.
    /// Missed periods are not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}

/// Which timers fired in one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub movement: bool,
    pub sweep: bool,
}

/// Owns both timers. The app calls `sync` after every transition so the timers
/// follow the game phase: movement only while Running, the sweep while a game
/// is live (Running or Paused), both cancelled on game over and restart.
#[derive(Debug, Clone)]
pub struct Scheduler {
    movement: Periodic,
    sweep: Periodic,
}

impl Scheduler {
    pub fn new(movement_period: Duration) -> Self {
        Self {
            movement: Periodic::new(movement_period),
            sweep: Periodic::new(SWEEP_PERIOD),
        }
    }

    pub fn sync(&mut self, state: &GameState, now: Instant) {
        self.movement.set_period(state.effective_tick_period());
        match state.phase() {
            Phase::Running => {
                if !self.movement.is_armed() {
                    self.movement.arm(now);
                }
                if !self.sweep.is_armed() {
                    self.sweep.arm(now);
                }
            }
            Phase::Paused => {
                self.movement.cancel();
                if !self.sweep.is_armed() {
                    self.sweep.arm(now);
                }
            }
            Phase::NotStarted | Phase::GameOver => self.cancel_all(),
        }
    }

    pub fn cancel_all(&mut self) {
        self.movement.cancel();
        self.sweep.cancel();
    }

    pub fn poll(&mut self, now: Instant) -> Due {
        Due {
            movement: self.movement.poll(now),
            sweep: self.sweep.poll(now),
        }
    }

    /// Earliest pending deadline, used to bound the input wait.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.movement.next_due(), self.sweep.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    #[cfg(test)]
    pub fn movement(&self) -> &Periodic {
        &self.movement
    }

    #[cfg(test)]
    pub fn sweep(&self) -> &Periodic {
        &self.sweep
    }
}
