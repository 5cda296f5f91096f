//! App: terminal init, main loop, timers and input routing. Sole owner of the game state.

use crate::GameConfig;
use crate::game::{GameState, TickOutcome};
use crate::input::{Action, Debouncer, SwipeTracker, key_to_action};
use crate::schedule::Scheduler;
use crate::store::{self, PreferenceStore};
use crate::theme::Theme;
use crate::ui::{self, Effects};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, info, warn};
use ratatui::DefaultTerminal;
use ratatui::layout::{Position, Rect};
use std::time::{Duration, Instant};

/// Render cadence while nothing is scheduled sooner.
const FRAME: Duration = Duration::from_millis(16);

/// Approximate pixel size of one terminal cell, for swipe distances.
const CELL_PX_W: f64 = 9.0;
const CELL_PX_H: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    state: GameState,
    store: Box<dyn PreferenceStore>,
    scheduler: Scheduler,
    debouncer: Debouncer,
    swipe: SwipeTracker,
    /// Pickup flash and game-over fade.
    effects: Effects,
    /// Terminal area of the last draw, for mapping mouse presses to the board.
    area: Rect,
}

impl App {
    pub fn new(config: GameConfig, mut store: Box<dyn PreferenceStore>) -> Self {
        let prefs = store::load_preferences(store.as_ref());
        let mut dark = prefs.dark_theme;
        if config.force_dark && !dark {
            dark = true;
            if let Err(e) = store.save_dark_theme(true) {
                warn!("could not save theme preference: {e}");
            }
        }
        let state = GameState::new(config.difficulty, prefs.high_score, dark, config.seed);
        info!(
            "session start: difficulty={:?} high_score={} dark={} seed={}",
            config.difficulty,
            prefs.high_score,
            dark,
            state.seed()
        );
        let theme = load_theme(&config, dark);
        let scheduler = Scheduler::new(state.effective_tick_period());
        Self {
            config,
            theme,
            state,
            store,
            scheduler,
            debouncer: Debouncer::default(),
            swipe: SwipeTracker::default(),
            effects: Effects::default(),
            area: Rect::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), DisableMouseCapture);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        info!(
            "session end: score={} high_score={}",
            self.state.score(),
            self.state.high_score()
        );

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                self.area = f.area();
                ui::draw(f, &self.state, &self.theme, self.area, &mut self.effects, now);
            })?;

            let timeout = self
                .scheduler
                .next_deadline()
                .map_or(FRAME, |due| due.saturating_duration_since(Instant::now()).min(FRAME));

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let action = match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => key_to_action(key),
                        Event::Mouse(mouse) => self.mouse_to_action(mouse),
                        _ => Action::None,
                    };
                    if !self.debouncer.accept(action, Instant::now()) {
                        continue;
                    }
                    if self.apply_action(action) == Flow::Quit {
                        return Ok(());
                    }
                }
            }

            let now = Instant::now();
            let due = self.scheduler.poll(now);
            if due.sweep {
                self.state.sweep(now);
            }
            if due.movement {
                let outcome = self.state.tick(now, self.store.as_mut());
                self.handle_outcome(outcome);
            }
            self.scheduler.sync(&self.state, now);
        }
    }

    /// Hand a tick's result to the presentation layer.
    fn handle_outcome(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::AteFood {
                points,
                new_high_score,
            } => {
                debug!("food +{points}, score {}", self.state.score());
                if new_high_score {
                    info!("new high score {}", self.state.high_score());
                }
            }
            TickOutcome::CollectedPowerUp(kind) => debug!("{} active", kind.label()),
            TickOutcome::Crashed(cause) => {
                info!("crashed ({cause:?}) with score {}", self.state.score());
            }
            TickOutcome::Idle | TickOutcome::Moved => {}
        }
        self.effects.on_outcome(outcome, &self.theme);
    }

    /// Each command is its own transition, applied immediately. Timers are
    /// re-synced right away so a start or resume arms them from this instant.
    fn apply_action(&mut self, action: Action) -> Flow {
        match action {
            Action::Quit => return Flow::Quit,
            Action::Turn(direction) => {
                self.state.turn(direction);
            }
            Action::TogglePause => {
                self.state.toggle_pause();
            }
            Action::Start => {
                self.state.start();
            }
            Action::Restart => {
                if self.state.is_game_over() {
                    self.state.restart();
                    self.scheduler.cancel_all();
                }
            }
            Action::ToggleTheme => {
                self.state.toggle_theme(self.store.as_mut());
                self.theme = load_theme(&self.config, self.state.dark_theme());
            }
            Action::CycleDifficulty => {
                let next = self.state.difficulty().next();
                self.state.set_difficulty(next);
            }
            Action::None => {}
        }
        self.scheduler.sync(&self.state, Instant::now());
        Flow::Continue
    }

    /// Left-button drag that starts on the board acts as a swipe; it may end anywhere.
    fn mouse_to_action(&mut self, mouse: MouseEvent) -> Action {
        let x = f64::from(mouse.column) * CELL_PX_W;
        let y = f64::from(mouse.row) * CELL_PX_H;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let (board, _) = ui::game_layout(self.area);
                if board.contains(Position::new(mouse.column, mouse.row)) {
                    self.swipe.begin(x, y);
                } else {
                    self.swipe = SwipeTracker::default();
                }
                Action::None
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.swipe.end(x, y).map_or(Action::None, Action::Turn)
            }
            _ => Action::None,
        }
    }
}

/// Built-in palette for the mode, with file overrides if configured; falls back on error.
fn load_theme(config: &GameConfig, dark: bool) -> Theme {
    Theme::load(config.theme_path.as_deref(), dark).unwrap_or_else(|e| {
        warn!("theme file unusable, using built-in palette: {e}");
        Theme::for_mode(dark)
    })
}
