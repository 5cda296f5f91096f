//! Game state: snake, food, power-ups, score and the tick/command transitions.

use crate::Difficulty;
use crate::store::PreferenceStore;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// Board is BOARD_SIZE x BOARD_SIZE cells.
pub const BOARD_SIZE: i32 = 20;

/// Snake at the start of every game, head first, heading right.
const INITIAL_SNAKE: [Cell; 3] = [Cell::new(10, 10), Cell::new(9, 10), Cell::new(8, 10)];

/// Points per food before multipliers.
const FOOD_POINTS: u32 = 10;

/// Tick period never drops below this, however high the score.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(80);

/// How long a collected power-up stays in force.
pub const POWER_UP_DURATION: Duration = Duration::from_millis(10_000);

/// Chance that eating food also drops a power-up somewhere on the board.
const POWER_UP_SPAWN_CHANCE: f64 = 0.2;

/// Snake length while ShrinkSnake is active (and after it expires).
pub const SHRUNK_LENGTH: usize = 3;

/// Random draws before placement falls back to a linear scan of the board.
const MAX_PLACEMENT_DRAWS: u32 = 4096;

/// Grid coordinate. Valid cells satisfy 0 <= x, y < BOARD_SIZE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    /// Neighbour one cell along `direction`; may be off the board.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// (dx, dy) with y growing downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Power-up kinds. Ordering only matters for stable iteration in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PowerUpKind {
    SlowMotion,
    DoublePoints,
    ShrinkSnake,
}

impl PowerUpKind {
    pub const ALL: [Self; 3] = [Self::SlowMotion, Self::DoublePoints, Self::ShrinkSnake];

    pub fn label(self) -> &'static str {
        match self {
            Self::SlowMotion => "Slow motion",
            Self::DoublePoints => "Double points",
            Self::ShrinkSnake => "Shrink",
        }
    }

    /// Two-column board glyph.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::SlowMotion => "◷ ",
            Self::DoublePoints => "◆ ",
            Self::ShrinkSnake => "◎ ",
        }
    }
}

/// Uncollected power-up lying on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerUp {
    pub id: u64,
    pub kind: PowerUpKind,
    pub cell: Cell,
    /// Effect length once picked up.
    pub duration: Duration,
}

/// Effects currently in force, keyed by kind, valued by absolute expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivePowerUps {
    expiry: BTreeMap<PowerUpKind, Instant>,
}

impl ActivePowerUps {
    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.expiry.contains_key(&kind)
    }

    /// Insert or overwrite: a second pickup of the same kind restarts its timer.
    pub fn activate(&mut self, kind: PowerUpKind, until: Instant) {
        self.expiry.insert(kind, until);
    }

    pub fn expires_at(&self, kind: PowerUpKind) -> Option<Instant> {
        self.expiry.get(&kind).copied()
    }

    /// Time left for `kind`, zero once it has run out but not yet been swept.
    pub fn remaining(&self, kind: PowerUpKind, now: Instant) -> Option<Duration> {
        self.expires_at(kind)
            .map(|until| until.saturating_duration_since(now))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PowerUpKind, Instant)> + '_ {
        self.expiry.iter().map(|(k, t)| (*k, *t))
    }

    pub fn is_empty(&self) -> bool {
        self.expiry.is_empty()
    }

    /// Remove and return every kind whose expiry is at or before `now`.
    fn take_expired(&mut self, now: Instant) -> Vec<PowerUpKind> {
        let expired: Vec<PowerUpKind> = self
            .expiry
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in &expired {
            self.expiry.remove(kind);
        }
        expired
    }
}

/// NotStarted -> Running <-> Paused, Running -> GameOver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Running,
    Paused,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverCause {
    Wall,
    SelfHit,
}

/// What a single movement tick did; the presentation layer reacts to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing changed.
    Idle,
    Moved,
    AteFood { points: u32, new_high_score: bool },
    CollectedPowerUp(PowerUpKind),
    Crashed(GameOverCause),
}

/// Authoritative game state. Only the transition methods below mutate it.
#[derive(Debug)]
pub struct GameState {
    snake: VecDeque<Cell>,
    food: Cell,
    /// Heading of the last movement; reversal checks compare against this.
    direction: Direction,
    /// Heading the next tick will use.
    queued_direction: Direction,
    power_ups: Vec<PowerUp>,
    active: ActivePowerUps,
    score: u32,
    high_score: u32,
    phase: Phase,
    game_over_cause: Option<GameOverCause>,
    difficulty: Difficulty,
    tick_period: Duration,
    dark_theme: bool,
    next_power_up_id: u64,
    rng: StdRng,
    seed: u64,
}

impl GameState {
    /// Fresh game. `seed` fixes food and power-up placement; `None` draws one from the OS.
    pub fn new(difficulty: Difficulty, high_score: u32, dark_theme: bool, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let mut state = Self {
            snake: INITIAL_SNAKE.into_iter().collect(),
            food: Cell::new(0, 0),
            direction: Direction::Right,
            queued_direction: Direction::Right,
            power_ups: Vec::new(),
            active: ActivePowerUps::default(),
            score: 0,
            high_score,
            phase: Phase::NotStarted,
            game_over_cause: None,
            difficulty,
            tick_period: difficulty.base_tick_period(),
            dark_theme,
            next_power_up_id: 1,
            rng: StdRng::seed_from_u64(seed),
            seed,
        };
        state.relocate_food();
        debug!("new game: difficulty={:?} seed={} food={:?}", difficulty, seed, state.food);
        state
    }

    /// Throw the current game away, keeping high score, difficulty and theme.
    /// The random stream continues so consecutive games differ.
    pub fn restart(&mut self) {
        self.snake = INITIAL_SNAKE.into_iter().collect();
        self.direction = Direction::Right;
        self.queued_direction = Direction::Right;
        self.power_ups.clear();
        self.active = ActivePowerUps::default();
        self.score = 0;
        self.phase = Phase::NotStarted;
        self.game_over_cause = None;
        self.tick_period = self.difficulty.base_tick_period();
        self.relocate_food();
        info!("restart: difficulty={:?} high_score={}", self.difficulty, self.high_score);
    }

    pub fn snake(&self) -> &VecDeque<Cell> {
        &self.snake
    }

    pub fn head(&self) -> Cell {
        self.snake[0]
    }

    pub fn food(&self) -> Cell {
        self.food
    }

    #[cfg(test)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn active_power_ups(&self) -> &ActivePowerUps {
        &self.active
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    #[cfg(test)]
    pub(crate) fn activate_power_up(&mut self, kind: PowerUpKind, until: Instant) {
        self.active.activate(kind, until);
    }

    /// Why the last game ended; `None` until a crash.
    pub fn game_over_cause(&self) -> Option<GameOverCause> {
        self.game_over_cause
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn dark_theme(&self) -> bool {
        self.dark_theme
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Movement period before power-up effects; shrinks as food is eaten.
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Period the movement scheduler should use right now.
    pub fn effective_tick_period(&self) -> Duration {
        if self.active.is_active(PowerUpKind::SlowMotion) {
            self.tick_period * 2
        } else {
            self.tick_period
        }
    }

    /// Explicit start (Enter). Also resumes a paused game.
    pub fn start(&mut self) -> bool {
        match self.phase {
            Phase::NotStarted | Phase::Paused => {
                info!("game running (was {:?})", self.phase);
                self.phase = Phase::Running;
                true
            }
            Phase::Running | Phase::GameOver => false,
        }
    }

    /// Pause key. Before the first move it starts the game instead.
    pub fn toggle_pause(&mut self) -> bool {
        self.phase = match self.phase {
            Phase::NotStarted | Phase::Paused => Phase::Running,
            Phase::Running => Phase::Paused,
            Phase::GameOver => return false,
        };
        info!("pause toggled: now {:?}", self.phase);
        true
    }

    /// Direction change. Rejected if it reverses the heading of the last move;
    /// several turns between two ticks are all checked against that same heading.
    /// The first turn of a game also starts it, even a reversing one, which then
    /// keeps the initial heading. Returns whether the state changed.
    pub fn turn(&mut self, direction: Direction) -> bool {
        match self.phase {
            Phase::NotStarted => {
                self.phase = Phase::Running;
                info!("game started by turn {:?}", direction);
                if direction != self.direction.opposite() {
                    self.queued_direction = direction;
                }
                true
            }
            Phase::Running => {
                if direction == self.direction.opposite() {
                    debug!("reversal to {:?} ignored", direction);
                    return false;
                }
                self.queued_direction = direction;
                true
            }
            Phase::Paused | Phase::GameOver => false,
        }
    }

    /// Difficulty can only change outside a game in progress; resets the speed.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> bool {
        match self.phase {
            Phase::NotStarted | Phase::GameOver => {
                self.difficulty = difficulty;
                self.tick_period = difficulty.base_tick_period();
                info!("difficulty set to {:?}", difficulty);
                true
            }
            Phase::Running | Phase::Paused => false,
        }
    }

    /// Flip the theme flag and persist it. A failed write is logged, not fatal.
    pub fn toggle_theme(&mut self, store: &mut dyn PreferenceStore) {
        self.dark_theme = !self.dark_theme;
        if let Err(e) = store.save_dark_theme(self.dark_theme) {
            warn!("could not save theme preference: {e}");
        }
    }

    /// Advance the snake one cell.
    pub fn tick(&mut self, now: Instant, store: &mut dyn PreferenceStore) -> TickOutcome {
        if self.phase != Phase::Running {
            return TickOutcome::Idle;
        }
        self.direction = self.queued_direction;
        let new_head = self.head().step(self.direction);

        if !new_head.in_bounds() {
            return self.crash(GameOverCause::Wall, new_head);
        }
        if self.snake.contains(&new_head) {
            return self.crash(GameOverCause::SelfHit, new_head);
        }

        self.snake.push_front(new_head);

        let outcome = if let Some(index) = self.power_ups.iter().position(|p| p.cell == new_head) {
            let power_up = self.power_ups.remove(index);
            self.active.activate(power_up.kind, now + power_up.duration);
            info!("collected {:?} (id {})", power_up.kind, power_up.id);
            TickOutcome::CollectedPowerUp(power_up.kind)
        } else if new_head == self.food {
            self.eat_food(store)
        } else {
            self.snake.pop_back();
            TickOutcome::Moved
        };

        self.clamp_if_shrunk();
        outcome
    }

    /// Expire power-ups whose time has run out. Runs on its own faster cadence.
    pub fn sweep(&mut self, now: Instant) -> Vec<PowerUpKind> {
        let expired = self.active.take_expired(now);
        for kind in &expired {
            match kind {
                PowerUpKind::ShrinkSnake => {
                    if self.snake.len() > SHRUNK_LENGTH {
                        self.snake.truncate(SHRUNK_LENGTH);
                    }
                }
                PowerUpKind::SlowMotion | PowerUpKind::DoublePoints => {}
            }
            info!("{:?} expired", kind);
        }
        expired
    }

    fn crash(&mut self, cause: GameOverCause, at: Cell) -> TickOutcome {
        self.phase = Phase::GameOver;
        self.game_over_cause = Some(cause);
        info!(
            "game over: {:?} at ({}, {}), score={} high_score={}",
            cause, at.x, at.y, self.score, self.high_score
        );
        TickOutcome::Crashed(cause)
    }

    fn eat_food(&mut self, store: &mut dyn PreferenceStore) -> TickOutcome {
        let multiplier = if self.active.is_active(PowerUpKind::DoublePoints) { 2 } else { 1 };
        let points = FOOD_POINTS * multiplier;
        self.score += points;

        let new_high_score = self.score > self.high_score;
        if new_high_score {
            self.high_score = self.score;
            if let Err(e) = store.save_high_score(self.high_score) {
                warn!("could not save high score {}: {e}", self.high_score);
            }
        }

        self.tick_period = self
            .tick_period
            .saturating_sub(self.difficulty.speedup())
            .max(MIN_TICK_PERIOD);

        self.relocate_food();
        if self.rng.random_bool(POWER_UP_SPAWN_CHANCE) {
            self.spawn_power_up();
        }
        debug!("ate food: +{} score={} period={:?}", points, self.score, self.tick_period);
        TickOutcome::AteFood { points, new_high_score }
    }

    /// While ShrinkSnake is active the snake never exceeds SHRUNK_LENGTH.
    fn clamp_if_shrunk(&mut self) {
        if self.active.is_active(PowerUpKind::ShrinkSnake) && self.snake.len() > SHRUNK_LENGTH {
            self.snake.truncate(SHRUNK_LENGTH);
        }
    }

    fn relocate_food(&mut self) {
        let (snake, power_ups) = (&self.snake, &self.power_ups);
        let blocked = |c: Cell| snake.contains(&c) || power_ups.iter().any(|p| p.cell == c);
        match sample_free_cell(&mut self.rng, blocked) {
            Some(cell) => self.food = cell,
            None => warn!("no free cell for food; board is full"),
        }
    }

    fn spawn_power_up(&mut self) {
        let (snake, power_ups, food) = (&self.snake, &self.power_ups, self.food);
        let blocked =
            |c: Cell| c == food || snake.contains(&c) || power_ups.iter().any(|p| p.cell == c);
        let Some(cell) = sample_free_cell(&mut self.rng, blocked) else {
            return;
        };
        let kind = PowerUpKind::ALL[self.rng.random_range(0..PowerUpKind::ALL.len())];
        let id = self.next_power_up_id;
        self.next_power_up_id += 1;
        info!("spawned {:?} (id {}) at ({}, {})", kind, id, cell.x, cell.y);
        self.power_ups.push(PowerUp {
            id,
            kind,
            cell,
            duration: POWER_UP_DURATION,
        });
    }
}

/// Rejection sampling over the board. Falls back to the first free cell in row
/// order after MAX_PLACEMENT_DRAWS misses; `None` only when every cell is blocked.
fn sample_free_cell(rng: &mut StdRng, blocked: impl Fn(Cell) -> bool) -> Option<Cell> {
    for _ in 0..MAX_PLACEMENT_DRAWS {
        let candidate = Cell::new(rng.random_range(0..BOARD_SIZE), rng.random_range(0..BOARD_SIZE));
        if !blocked(candidate) {
            return Some(candidate);
        }
    }
    (0..BOARD_SIZE)
        .flat_map(|y| (0..BOARD_SIZE).map(move |x| Cell::new(x, y)))
        .find(|c| !blocked(*c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    fn cells(list: &[(i32, i32)]) -> VecDeque<Cell> {
        list.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    /// Running game with the canonical start snake heading right and food at (11, 10).
    fn running(difficulty: Difficulty) -> GameState {
        let mut state = GameState::new(difficulty, 0, false, Some(7));
        state.food = Cell::new(11, 10);
        state.phase = Phase::Running;
        state
    }

    fn assert_invariants(state: &GameState) {
        let unique: HashSet<Cell> = state.snake.iter().copied().collect();
        assert_eq!(unique.len(), state.snake.len(), "duplicate snake cells");
        assert!(!state.snake.contains(&state.food), "food under snake");
        assert!(state.power_ups.iter().all(|p| p.cell != state.food), "food under power-up");
        assert!(state.food.in_bounds());
        assert!(state.snake.iter().all(|c| c.in_bounds()));
    }

    #[test]
    fn eating_food_grows_scores_and_speeds_up() {
        let mut state = running(Difficulty::Medium);
        let mut store = MemoryStore::default();
        let now = Instant::now();

        let outcome = state.tick(now, &mut store);

        assert_eq!(outcome, TickOutcome::AteFood { points: 10, new_high_score: true });
        assert_eq!(state.score(), 10);
        assert_eq!(state.snake, cells(&[(11, 10), (10, 10), (9, 10), (8, 10)]));
        assert_ne!(state.food(), Cell::new(11, 10));
        assert_eq!(state.tick_period(), Duration::from_millis(148));
        assert_eq!(state.high_score(), 10);
        assert_eq!(store.high_score, Some(10));
        assert_invariants(&state);
    }

    #[test]
    fn hard_speeds_up_by_three_and_floors_at_minimum() {
        let mut state = running(Difficulty::Hard);
        let mut store = MemoryStore::default();
        state.tick(Instant::now(), &mut store);
        assert_eq!(state.tick_period(), Duration::from_millis(97));

        let mut state = running(Difficulty::Hard);
        state.tick_period = Duration::from_millis(81);
        state.tick(Instant::now(), &mut store);
        assert_eq!(state.tick_period(), MIN_TICK_PERIOD);
    }

    #[test]
    fn plain_move_keeps_length() {
        let mut state = running(Difficulty::Easy);
        state.food = Cell::new(0, 0);
        let outcome = state.tick(Instant::now(), &mut MemoryStore::default());
        assert_eq!(outcome, TickOutcome::Moved);
        assert_eq!(state.snake, cells(&[(11, 10), (10, 10), (9, 10)]));
    }

    #[test]
    fn leaving_the_board_ends_the_game_without_moving() {
        let mut state = running(Difficulty::Medium);
        state.snake = cells(&[(0, 5), (1, 5), (2, 5)]);
        state.direction = Direction::Left;
        state.queued_direction = Direction::Left;
        let before = state.snake.clone();

        let outcome = state.tick(Instant::now(), &mut MemoryStore::default());

        assert_eq!(outcome, TickOutcome::Crashed(GameOverCause::Wall));
        assert!(state.is_game_over());
        assert_eq!(state.game_over_cause(), Some(GameOverCause::Wall));
        assert_eq!(state.snake, before);
        assert_eq!(state.tick(Instant::now(), &mut MemoryStore::default()), TickOutcome::Idle);
    }

    #[test]
    fn running_into_own_body_ends_the_game() {
        let mut state = running(Difficulty::Medium);
        state.snake = cells(&[(5, 5), (6, 5), (6, 4), (5, 4), (4, 4)]);
        state.direction = Direction::Left;
        state.queued_direction = Direction::Up;
        let outcome = state.tick(Instant::now(), &mut MemoryStore::default());
        assert_eq!(outcome, TickOutcome::Crashed(GameOverCause::SelfHit));
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.game_over_cause(), Some(GameOverCause::SelfHit));
    }

    #[test]
    fn double_points_doubles_food_score() {
        let mut state = running(Difficulty::Medium);
        let now = Instant::now();
        state.active.activate(PowerUpKind::DoublePoints, now + POWER_UP_DURATION);
        let outcome = state.tick(now, &mut MemoryStore::default());
        assert_eq!(outcome, TickOutcome::AteFood { points: 20, new_high_score: true });
        assert_eq!(state.score(), 20);
    }

    #[test]
    fn collecting_power_up_grows_snake_and_starts_timer() {
        let mut state = running(Difficulty::Medium);
        state.food = Cell::new(0, 0);
        state.power_ups.push(PowerUp {
            id: 42,
            kind: PowerUpKind::SlowMotion,
            cell: Cell::new(11, 10),
            duration: POWER_UP_DURATION,
        });
        let now = Instant::now();

        let outcome = state.tick(now, &mut MemoryStore::default());

        assert_eq!(outcome, TickOutcome::CollectedPowerUp(PowerUpKind::SlowMotion));
        assert_eq!(state.snake.len(), 4);
        assert!(state.power_ups().is_empty());
        assert_eq!(state.score(), 0);
        assert_eq!(
            state.active_power_ups().expires_at(PowerUpKind::SlowMotion),
            Some(now + POWER_UP_DURATION)
        );
        assert_eq!(state.effective_tick_period(), state.tick_period() * 2);
    }

    #[test]
    fn shrink_clamps_growth_while_active() {
        let mut state = running(Difficulty::Medium);
        let now = Instant::now();
        state.active.activate(PowerUpKind::ShrinkSnake, now + POWER_UP_DURATION);

        state.tick(now, &mut MemoryStore::default());

        assert_eq!(state.score(), 10);
        assert_eq!(state.snake, cells(&[(11, 10), (10, 10), (9, 10)]));
    }

    #[test]
    fn collecting_shrink_cuts_a_long_snake_immediately() {
        let mut state = running(Difficulty::Medium);
        state.snake = cells(&[(10, 10), (9, 10), (8, 10), (7, 10), (6, 10), (5, 10)]);
        state.food = Cell::new(0, 0);
        state.power_ups.push(PowerUp {
            id: 1,
            kind: PowerUpKind::ShrinkSnake,
            cell: Cell::new(11, 10),
            duration: POWER_UP_DURATION,
        });
        state.tick(Instant::now(), &mut MemoryStore::default());
        assert_eq!(state.snake, cells(&[(11, 10), (10, 10), (9, 10)]));
    }

    #[test]
    fn sweep_expires_shrink_and_truncates_snake() {
        let mut state = running(Difficulty::Medium);
        state.snake = cells(&[(10, 10), (9, 10), (8, 10), (7, 10), (6, 10), (5, 10)]);
        let now = Instant::now();
        state.active.activate(PowerUpKind::ShrinkSnake, now);
        state.active.activate(PowerUpKind::DoublePoints, now + POWER_UP_DURATION);

        let expired = state.sweep(now + Duration::from_millis(1));

        assert_eq!(expired, vec![PowerUpKind::ShrinkSnake]);
        assert_eq!(state.snake, cells(&[(10, 10), (9, 10), (8, 10)]));
        assert!(!state.active_power_ups().is_active(PowerUpKind::ShrinkSnake));
        assert!(state.active_power_ups().is_active(PowerUpKind::DoublePoints));
    }

    #[test]
    fn sweep_leaves_unexpired_effects_alone() {
        let mut state = running(Difficulty::Medium);
        let now = Instant::now();
        state.active.activate(PowerUpKind::SlowMotion, now + POWER_UP_DURATION);
        assert!(state.sweep(now).is_empty());
        assert!(state.active_power_ups().is_active(PowerUpKind::SlowMotion));
        assert_eq!(
            state.active_power_ups().remaining(PowerUpKind::SlowMotion, now),
            Some(POWER_UP_DURATION)
        );
    }

    #[test]
    fn reversal_is_rejected_against_last_heading() {
        let mut state = running(Difficulty::Medium);
        state.food = Cell::new(0, 0);
        assert!(!state.turn(Direction::Left));
        assert!(state.turn(Direction::Up));
        // Still heading right until the next tick, so Left stays a reversal.
        assert!(!state.turn(Direction::Left));
        state.tick(Instant::now(), &mut MemoryStore::default());
        assert_eq!(state.head(), Cell::new(10, 9));
        assert_eq!(state.direction(), Direction::Up);
        assert!(!state.turn(Direction::Down));
        assert!(state.turn(Direction::Left));
    }

    #[test]
    fn first_turn_starts_the_game() {
        let mut state = GameState::new(Difficulty::Easy, 0, false, Some(1));
        assert_eq!(state.phase(), Phase::NotStarted);
        assert!(state.turn(Direction::Down));
        assert_eq!(state.phase(), Phase::Running);

        // A reversing first turn still starts the game but keeps heading right.
        let mut state = GameState::new(Difficulty::Easy, 0, false, Some(1));
        state.food = Cell::new(0, 0);
        assert!(state.turn(Direction::Left));
        assert_eq!(state.phase(), Phase::Running);
        state.tick(Instant::now(), &mut MemoryStore::default());
        assert_eq!(state.head(), Cell::new(11, 10));
    }

    #[test]
    fn pause_toggles_and_blocks_ticks_and_turns() {
        let mut state = GameState::new(Difficulty::Medium, 0, false, Some(3));
        assert!(state.toggle_pause());
        assert_eq!(state.phase(), Phase::Running);
        assert!(state.toggle_pause());
        assert_eq!(state.phase(), Phase::Paused);
        assert!(!state.turn(Direction::Up));
        let head = state.head();
        assert_eq!(state.tick(Instant::now(), &mut MemoryStore::default()), TickOutcome::Idle);
        assert_eq!(state.head(), head);
        assert!(state.start());
        assert_eq!(state.phase(), Phase::Running);
        assert!(!state.start());
    }

    #[test]
    fn commands_after_game_over_are_ignored() {
        let mut state = running(Difficulty::Medium);
        state.phase = Phase::GameOver;
        assert!(!state.toggle_pause());
        assert!(!state.start());
        assert!(!state.turn(Direction::Up));
        assert_eq!(state.phase(), Phase::GameOver);
    }

    #[test]
    fn difficulty_only_changes_outside_a_game() {
        let mut state = GameState::new(Difficulty::Medium, 0, false, Some(3));
        assert!(state.set_difficulty(Difficulty::Hard));
        assert_eq!(state.tick_period(), Duration::from_millis(100));
        state.start();
        assert!(!state.set_difficulty(Difficulty::Easy));
        assert_eq!(state.difficulty(), Difficulty::Hard);
    }

    #[test]
    fn restart_keeps_high_score_difficulty_and_theme() {
        let mut state = running(Difficulty::Hard);
        let mut store = MemoryStore::default();
        state.toggle_theme(&mut store);
        state.tick(Instant::now(), &mut store);
        state.power_ups.push(PowerUp {
            id: 9,
            kind: PowerUpKind::DoublePoints,
            cell: Cell::new(1, 1),
            duration: POWER_UP_DURATION,
        });
        state.active.activate(PowerUpKind::SlowMotion, Instant::now() + POWER_UP_DURATION);
        state.phase = Phase::GameOver;

        state.restart();

        assert_eq!(state.phase(), Phase::NotStarted);
        assert_eq!(state.game_over_cause(), None);
        assert_eq!(state.score(), 0);
        assert_eq!(state.high_score(), 10);
        assert_eq!(state.difficulty(), Difficulty::Hard);
        assert!(state.dark_theme());
        assert_eq!(state.snake, INITIAL_SNAKE.into_iter().collect::<VecDeque<_>>());
        assert_eq!(state.direction(), Direction::Right);
        assert!(state.power_ups().is_empty());
        assert!(state.active_power_ups().is_empty());
        assert_eq!(state.tick_period(), Difficulty::Hard.base_tick_period());
        assert_invariants(&state);
    }

    #[test]
    fn high_score_only_saved_when_beaten() {
        let mut state = GameState::new(Difficulty::Medium, 50, false, Some(5));
        state.food = Cell::new(11, 10);
        state.phase = Phase::Running;
        let mut store = MemoryStore::default();
        let outcome = state.tick(Instant::now(), &mut store);
        assert_eq!(outcome, TickOutcome::AteFood { points: 10, new_high_score: false });
        assert_eq!(state.high_score(), 50);
        assert_eq!(store.high_score, None);
    }

    #[test]
    fn failed_saves_do_not_stop_the_game() {
        let mut state = running(Difficulty::Medium);
        let mut store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let outcome = state.tick(Instant::now(), &mut store);
        assert!(matches!(outcome, TickOutcome::AteFood { .. }));
        assert_eq!(state.high_score(), 10);
        state.toggle_theme(&mut store);
        assert!(state.dark_theme());
        assert_eq!(state.phase(), Phase::Running);
    }

    #[test]
    fn toggle_theme_persists_flag() {
        let mut state = GameState::new(Difficulty::Medium, 0, false, Some(5));
        let mut store = MemoryStore::default();
        state.toggle_theme(&mut store);
        assert_eq!(store.dark_theme, Some(true));
        state.toggle_theme(&mut store);
        assert_eq!(store.dark_theme, Some(false));
    }

    #[test]
    fn placement_falls_back_to_scan_and_reports_full_board() {
        let mut rng = StdRng::seed_from_u64(0);
        let only_free = Cell::new(19, 19);
        assert_eq!(sample_free_cell(&mut rng, |c| c != only_free), Some(only_free));
        assert_eq!(sample_free_cell(&mut rng, |_| true), None);
    }

    /// Greedy autopilot over many games: invariants hold in every reachable state.
    #[test]
    fn invariants_hold_over_long_play() {
        let mut state = GameState::new(Difficulty::Hard, 0, false, Some(2024));
        let mut store = MemoryStore::default();
        let start = Instant::now();
        let mut last_high = 0;

        for step in 0..5_000u64 {
            let now = start + Duration::from_millis(step * 100);
            if state.is_game_over() {
                state.restart();
            }
            let head = state.head();
            let food = state.food();
            let want = if food.x > head.x {
                Direction::Right
            } else if food.x < head.x {
                Direction::Left
            } else if food.y > head.y {
                Direction::Down
            } else {
                Direction::Up
            };
            let want = if want == state.direction().opposite() {
                if head.y < BOARD_SIZE / 2 { Direction::Down } else { Direction::Up }
            } else {
                want
            };
            state.turn(want);
            let len_before = state.snake.len();
            match state.tick(now, &mut store) {
                TickOutcome::Moved => assert_eq!(state.snake.len(), len_before),
                TickOutcome::AteFood { .. } | TickOutcome::CollectedPowerUp(_) => {
                    if !state.active.is_active(PowerUpKind::ShrinkSnake) {
                        assert_eq!(state.snake.len(), len_before + 1);
                    }
                }
                TickOutcome::Crashed(_) | TickOutcome::Idle => {}
            }
            state.sweep(now);
            if state.active.is_active(PowerUpKind::ShrinkSnake) {
                assert!(state.snake.len() <= SHRUNK_LENGTH);
            }
            assert!(state.high_score() >= last_high);
            last_high = state.high_score();
            assert_invariants(&state);
        }
        assert!(last_high > 0);
    }
}
