//! Snaketui: grid snake with power-ups, difficulty levels and a persisted high score, in the terminal.

mod app;
mod game;
mod input;
mod schedule;
mod store;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use simplelog::{Config, LevelFilter, WriteLogger};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_FILENAME: &str = "snaketui.log";

/// Options derived from CLI that affect game behaviour.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    /// Fixed RNG seed for food/power-up placement (None = random per session).
    pub seed: Option<u64>,
    /// Force the dark theme on at startup (and persist it).
    pub force_dark: bool,
    /// Optional palette override file.
    pub theme_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let data_dir = args.data_dir.clone().unwrap_or_else(store::default_data_dir);
    init_logging(args.log_file.as_deref(), &data_dir.join(LOG_FILENAME), args.log_level);

    let config = GameConfig {
        difficulty: args.difficulty,
        seed: args.seed,
        force_dark: args.dark,
        theme_path: args.theme,
    };
    let store = store::FileStore::new(data_dir);
    let mut app = App::new(config, Box::new(store));
    app.run()?;
    Ok(())
}

/// Logs go to a file: stdout belongs to the terminal UI. Failure to open it only disables logging.
fn init_logging(explicit: Option<&Path>, default_path: &Path, level: LogLevel) {
    let path = explicit.unwrap_or(default_path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match File::create(path) {
        Ok(file) => {
            if let Err(e) = WriteLogger::init(level.into(), Config::default(), file) {
                eprintln!("snaketui: logger init failed: {e}");
            }
        }
        Err(e) => eprintln!("snaketui: cannot open log file {}: {e}", path.display()),
    }
}

/// Classic snake on a 20x20 board, in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "snaketui",
    version,
    about = "Grid snake in the terminal: eat food, grab power-ups, avoid walls and yourself.",
    long_about = "Snaketui is a single-player snake game on a 20x20 board.\n\n\
        Eat food to grow and score 10 points; the snake speeds up as you eat. Food sometimes \
        drops a power-up that lasts 10 seconds: slow motion, double points, or shrink.\n\n\
        CONTROLS:\n  Arrows / hjkl   Turn     P / Space   Pause    Enter   Start\n  \
        D   Cycle difficulty (before a game)   T   Toggle theme\n  R   Restart after game over   Q / Esc   Quit\n\n\
        Dragging with the mouse across the board also turns the snake."
)]
pub struct Args {
    /// Difficulty: easy (200 ms ticks), medium (150 ms), hard (100 ms, speeds up faster).
    #[arg(short, long, default_value = "medium")]
    pub difficulty: Difficulty,

    /// Path to a palette file (`theme[key]="#RRGGBB"` lines) overriding the built-in colours.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Start with the dark theme (saved as your preference).
    #[arg(long)]
    pub dark: bool,

    /// Directory for the preference file and default log (default: XDG config dir / snaketui).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Seed for food and power-up placement; same seed, same board.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Log file (default: <data-dir>/snaketui.log).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Tick period at the start of a game.
    pub fn base_tick_period(self) -> Duration {
        Duration::from_millis(match self {
            Self::Easy => 200,
            Self::Medium => 150,
            Self::Hard => 100,
        })
    }

    /// How much faster the snake gets per food eaten.
    pub fn speedup(self) -> Duration {
        Duration::from_millis(match self {
            Self::Hard => 3,
            Self::Easy | Self::Medium => 2,
        })
    }

    /// Next difficulty in menu order, wrapping.
    pub fn next(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium => Self::Hard,
            Self::Hard => Self::Easy,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}
