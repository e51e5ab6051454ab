//! Settings file: `settings.toml` in the platform config dir.

use crate::commit::DEFAULT_SETTLE;
use crate::paste::default_paste_command;
use crate::persist::{JsonFile, Persistence};
use crate::retention::RetentionPolicy;
use crate::store::{HistoryOptions, HistoryStore};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_ENV: &str = "CLIPSTACK_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub storage: Storage,
    pub history: History,
    pub retention: Retention,
    pub watch: Watch,
    pub paste: Paste,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum Storage {
    Json { path: Option<PathBuf> },
    Sqlite { path: Option<PathBuf> },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::Json { path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct History {
    pub max_items: Option<usize>,
    pub max_pins: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Retention {
    /// e.g. "3d"
    pub text_max_age: Option<String>,
    /// e.g. "10h"
    pub image_max_age: Option<String>,
    /// How often the daemon sweeps, e.g. "1h"
    pub every: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Watch {
    pub poll_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Paste {
    pub settle_ms: Option<u64>,
    /// Keystroke tool argv, e.g. ["wtype", "-M", "ctrl", "v"]
    pub command: Option<Vec<String>>,
}

pub fn config_dir() -> PathBuf {
    if let Some(bd) = directories::BaseDirs::new() {
        bd.config_dir().join("clipstack")
    } else {
        PathBuf::from("./.config/clipstack")
    }
}

pub fn data_dir() -> PathBuf {
    if let Some(bd) = directories::BaseDirs::new() {
        bd.data_dir().join("clipstack")
    } else {
        config_dir().join("data")
    }
}

/// Explicit path, then `CLIPSTACK_CONFIG`, then the config dir.
pub fn settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_dir().join("settings.toml"),
    }
}

/// Where the daemon advertises its port.
pub fn daemon_info_path() -> PathBuf {
    config_dir().join("clipd.json")
}

pub fn parse_settings(text: &str) -> Result<Settings> {
    toml::from_str(text).map_err(|e| CoreError::Config(e.to_string()))
}

/// Missing file gives defaults; an unreadable or invalid one is logged
/// and also gives defaults.
pub fn load_settings(explicit: Option<&Path>) -> Settings {
    let path = settings_path(explicit);
    match std::fs::read_to_string(&path) {
        Ok(s) => match parse_settings(&s) {
            Ok(settings) => {
                debug!(path = %path.display(), "loaded settings");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring invalid settings file");
                Settings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read settings file");
            Settings::default()
        }
    }
}

/// `<n><unit>` with unit one of s, m, h, d, w. Returns seconds.
pub fn parse_duration_secs(s: &str) -> Result<u64> {
    let s = s.trim();
    let bad = || CoreError::Config(format!("invalid duration {s:?}, expected e.g. 30s, 10h, 3d"));
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(bad)?;
    let (num, unit) = s.split_at(split);
    let n: u64 = num.parse().map_err(|_| bad())?;
    let mult = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return Err(bad()),
    };
    n.checked_mul(mult).ok_or_else(bad)
}

fn age_or(value: &Option<String>, default: time::Duration) -> Result<time::Duration> {
    match value {
        Some(s) => {
            let secs = parse_duration_secs(s)?;
            let secs = i64::try_from(secs)
                .map_err(|_| CoreError::Config(format!("duration {s:?} too large")))?;
            Ok(time::Duration::seconds(secs))
        }
        None => Ok(default),
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

impl Settings {
    pub fn retention_policy(&self) -> Result<RetentionPolicy> {
        let d = RetentionPolicy::default();
        Ok(RetentionPolicy {
            text_max_age: age_or(&self.retention.text_max_age, d.text_max_age)?,
            image_max_age: age_or(&self.retention.image_max_age, d.image_max_age)?,
        })
    }

    pub fn history_options(&self) -> Result<HistoryOptions> {
        let d = HistoryOptions::default();
        let max_items = self.history.max_items.unwrap_or(d.max_items);
        if max_items == 0 {
            return Err(CoreError::Config("history.max_items must be at least 1".into()));
        }
        // pins must leave at least one slot for new captures
        let max_pins = match self.history.max_pins {
            Some(n) if n >= max_items => {
                return Err(CoreError::Config(format!(
                    "history.max_pins ({n}) must be below history.max_items ({max_items})"
                )))
            }
            Some(n) => n,
            None => d.max_pins.min(max_items - 1),
        };
        Ok(HistoryOptions {
            max_items,
            max_pins,
            retention: self.retention_policy()?,
        })
    }

    pub fn retention_every(&self) -> Result<Duration> {
        match &self.retention.every {
            Some(s) => match parse_duration_secs(s)? {
                0 => Err(CoreError::Config("retention.every must be positive".into())),
                n => Ok(Duration::from_secs(n)),
            },
            None => Ok(Duration::from_secs(3_600)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_ms.unwrap_or(1_000).max(10))
    }

    /// Clamped by the committer.
    pub fn paste_settle(&self) -> Duration {
        self.paste
            .settle_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE)
    }

    pub fn paste_command(&self) -> Vec<String> {
        match &self.paste.command {
            Some(argv) if !argv.is_empty() => argv.clone(),
            _ => default_paste_command(),
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        match &self.storage {
            Storage::Json { path: Some(p) } | Storage::Sqlite { path: Some(p) } => expand(p),
            Storage::Json { path: None } => data_dir().join("history.json"),
            Storage::Sqlite { path: None } => data_dir().join("history.db"),
        }
    }

    pub fn open_persistence(&self) -> Result<Box<dyn Persistence>> {
        let path = self.storage_path();
        match &self.storage {
            Storage::Json { .. } => Ok(Box::new(JsonFile::new(path))),
            #[cfg(feature = "sqlite")]
            Storage::Sqlite { .. } => Ok(Box::new(crate::persist::SqliteFile::open(path)?)),
            #[cfg(not(feature = "sqlite"))]
            Storage::Sqlite { .. } => Err(CoreError::Config(
                "sqlite backend requested but this build lacks the `sqlite` feature".into(),
            )),
        }
    }

    pub fn open_store(&self) -> Result<HistoryStore> {
        let options = self.history_options()?;
        Ok(HistoryStore::open(self.open_persistence()?, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn durations() {
        assert_eq!(parse_duration_secs("0s").unwrap(), 0);
        assert_eq!(parse_duration_secs("90m").unwrap(), 5_400);
        assert_eq!(parse_duration_secs(" 3d ").unwrap(), 259_200);
        assert_eq!(parse_duration_secs("2w").unwrap(), 1_209_600);
        for bad in ["", "d", "10", "10y", "-1h", "1.5h"] {
            assert_matches!(parse_duration_secs(bad), Err(CoreError::Config(_)), "{bad}");
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let s = parse_settings("").unwrap();
        assert_eq!(s.storage, Storage::Json { path: None });
        assert_eq!(s.history_options().unwrap(), HistoryOptions::default());
        assert_eq!(s.poll_interval(), Duration::from_secs(1));
        assert_eq!(s.retention_every().unwrap(), Duration::from_secs(3_600));
        assert_eq!(s.paste_command()[0], "xdotool");
    }

    #[test]
    fn full_file_parses() {
        let s = parse_settings(
            r#"
            [storage]
            backend = "sqlite"
            path = "/tmp/clips.db"
            [history]
            max_items = 20
            max_pins = 3
            [retention]
            text_max_age = "1d"
            image_max_age = "30m"
            every = "5m"
            [watch]
            poll_ms = 250
            [paste]
            settle_ms = 120
            command = ["wtype", "-M", "ctrl", "v"]
            "#,
        )
        .unwrap();
        assert_eq!(s.storage_path(), PathBuf::from("/tmp/clips.db"));
        let opts = s.history_options().unwrap();
        assert_eq!((opts.max_items, opts.max_pins), (20, 3));
        assert_eq!(opts.retention.text_max_age, time::Duration::days(1));
        assert_eq!(opts.retention.image_max_age, time::Duration::minutes(30));
        assert_eq!(s.retention_every().unwrap(), Duration::from_secs(300));
        assert_eq!(s.poll_interval(), Duration::from_millis(250));
        assert_eq!(s.paste_settle(), Duration::from_millis(120));
        assert_eq!(s.paste_command()[0], "wtype");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let s = parse_settings("[history]\nmax_items = 0\n").unwrap();
        assert_matches!(s.history_options(), Err(CoreError::Config(_)));
        let s = parse_settings("[history]\nmax_items = 3\nmax_pins = 3\n").unwrap();
        assert_matches!(s.history_options(), Err(CoreError::Config(_)));
        let s = parse_settings("[retention]\ntext_max_age = \"soon\"\n").unwrap();
        assert_matches!(s.history_options(), Err(CoreError::Config(_)));
        assert_matches!(parse_settings("[storage]\nbackend = \"cloud\"\n"), Err(CoreError::Config(_)));
    }

    #[test]
    fn default_pin_cap_shrinks_with_small_history() {
        let s = parse_settings("[history]\nmax_items = 3\n").unwrap();
        assert_eq!(s.history_options().unwrap().max_pins, 2);
        let s = parse_settings("[history]\nmax_items = 1\n").unwrap();
        assert_eq!(s.history_options().unwrap().max_pins, 0);
    }

    #[test]
    fn load_tolerates_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        assert_eq!(load_settings(Some(missing.as_path())).storage, Storage::Json { path: None });
        let garbage = dir.path().join("bad.toml");
        std::fs::write(&garbage, "[[[").unwrap();
        assert_eq!(load_settings(Some(garbage.as_path())).history.max_items, None);
    }

    #[test]
    fn json_store_opens_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        let s = parse_settings(&format!(
            "[storage]\nbackend = \"json\"\npath = {:?}\n",
            path.to_string_lossy()
        ))
        .unwrap();
        let store = s.open_store().unwrap();
        store.record(crate::ClipKind::Text, b"saved");
        drop(store);
        assert_eq!(s.open_store().unwrap().len(), 1);
        assert!(path.exists());
    }
}
