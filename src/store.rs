//! Persist the high score and theme preference (XDG config or ~/.config/snaketui).

use log::warn;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

const FILENAME: &str = "preferences";
const HIGH_SCORE_KEY: &str = "high_score";
const DARK_THEME_KEY: &str = "dark_theme";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable key-value storage for the two preferences the game keeps across sessions.
/// Missing keys load as 0 / false; an `Err` is an actual I/O failure.
pub trait PreferenceStore {
    fn load_high_score(&self) -> Result<u32, StoreError>;
    fn save_high_score(&mut self, score: u32) -> Result<(), StoreError>;
    fn load_dark_theme(&self) -> Result<bool, StoreError>;
    fn save_dark_theme(&mut self, dark: bool) -> Result<(), StoreError>;
}

/// Values read once at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preferences {
    pub high_score: u32,
    pub dark_theme: bool,
}

/// Load both preferences, substituting defaults (and logging) on failure.
pub fn load_preferences(store: &dyn PreferenceStore) -> Preferences {
    let high_score = store.load_high_score().unwrap_or_else(|e| {
        warn!("could not load high score, using 0: {e}");
        0
    });
    let dark_theme = store.load_dark_theme().unwrap_or_else(|e| {
        warn!("could not load theme preference, using light: {e}");
        false
    });
    Preferences {
        high_score,
        dark_theme,
    }
}

/// Default data directory (config dir / snaketui).
pub fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    base.join("snaketui")
}

/// `key=value` text file; unknown keys are kept on rewrite, unparseable values read as absent.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(FILENAME),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_preferences(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Read-modify-write of a single key. Creates the directory if needed.
    fn write_key(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut f = fs::File::create(&self.path).map_err(|e| self.io_error(e))?;
        for (k, v) in &map {
            writeln!(f, "{k}={v}").map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PreferenceStore for FileStore {
    fn load_high_score(&self) -> Result<u32, StoreError> {
        Ok(self
            .read_map()?
            .get(HIGH_SCORE_KEY)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0))
    }

    fn save_high_score(&mut self, score: u32) -> Result<(), StoreError> {
        self.write_key(HIGH_SCORE_KEY, score.to_string())
    }

    fn load_dark_theme(&self) -> Result<bool, StoreError> {
        Ok(self
            .read_map()?
            .get(DARK_THEME_KEY)
            .is_some_and(|v| v == "true"))
    }

    fn save_dark_theme(&mut self, dark: bool) -> Result<(), StoreError> {
        self.write_key(DARK_THEME_KEY, dark.to_string())
    }
}

fn parse_preferences(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// In-memory store for tests; `fail_writes` simulates a broken disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub high_score: Option<u32>,
    pub dark_theme: Option<bool>,
    pub fail_writes: bool,
}

#[cfg(test)]
fn refused() -> StoreError {
    StoreError::Io {
        path: PathBuf::from("<memory>"),
        source: io::Error::other("write refused"),
    }
}

#[cfg(test)]
impl PreferenceStore for MemoryStore {
    fn load_high_score(&self) -> Result<u32, StoreError> {
        Ok(self.high_score.unwrap_or(0))
    }

    fn save_high_score(&mut self, score: u32) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(refused());
        }
        self.high_score = Some(score);
        Ok(())
    }

    fn load_dark_theme(&self) -> Result<bool, StoreError> {
        Ok(self.dark_theme.unwrap_or(false))
    }

    fn save_dark_theme(&mut self, dark: bool) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(refused());
        }
        self.dark_theme = Some(dark);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_dir() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("snaketui-store-{}-{n}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_loads_defaults() {
        let store = FileStore::new(scratch_dir());
        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn saves_both_keys_independently() {
        let dir = scratch_dir();
        let mut store = FileStore::new(dir.clone());
        store.save_high_score(120).unwrap();
        store.save_dark_theme(true).unwrap();
        store.save_high_score(130).unwrap();

        let reopened = FileStore::new(dir.clone());
        assert_eq!(reopened.load_high_score().unwrap(), 130);
        assert!(reopened.load_dark_theme().unwrap());
        let text = fs::read_to_string(dir.join(FILENAME)).unwrap();
        assert!(text.contains("dark_theme=true"));
        assert!(text.contains("high_score=130"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn garbage_values_read_as_absent() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(FILENAME), "high_score=lots\ndark_theme=yes\n").unwrap();
        let store = FileStore::new(dir.clone());
        assert_eq!(store.load_high_score().unwrap(), 0);
        assert!(!store.load_dark_theme().unwrap());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unreadable_path_is_an_error_but_preferences_default() {
        let dir = scratch_dir();
        // A directory where the file should be makes reads fail with something other than NotFound.
        fs::create_dir_all(dir.join(FILENAME)).unwrap();
        let mut store = FileStore::new(dir.clone());
        assert!(store.save_high_score(10).is_err());
        assert_eq!(load_preferences(&store), Preferences::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn parse_ignores_comments_and_blank_lines() {
        let map = parse_preferences("# prefs\n\n high_score = 40 \nnonsense\n");
        assert_eq!(map.get("high_score"), Some(&"40".to_string()));
        assert_eq!(map.len(), 1);
    }
}
