//! User preferences: loaded once at startup, written back whenever a value
//! actually changes.

use edutrack_core::Role;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preferences file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown preference '{0}' (expected theme, server-url or role)")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: PreferenceKey, value: String },
}

/// Backing storage for preference values.
pub trait KeyValueStore {
    fn load(&self) -> Result<BTreeMap<String, String>, PreferencesError>;
    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferencesError>;
}

/// Preferences kept as a flat TOML table on disk.
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/edutrack/preferences.toml`, falling back to `~/.config`.
    pub fn default_path() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("edutrack")
            .join("preferences.toml")
    }
}

impl KeyValueStore for TomlFileStore {
    fn load(&self) -> Result<BTreeMap<String, String>, PreferencesError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(PreferencesError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|e| PreferencesError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferencesError> {
        let write_err = |source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let text = toml::to_string(values).map_err(|e| PreferencesError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, text).map_err(write_err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKey {
    Theme,
    ServerUrl,
    Role,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 3] = [Self::Theme, Self::ServerUrl, Self::Role];

    pub fn as_str(self) -> &'static str {
        match self {
            PreferenceKey::Theme => "theme",
            PreferenceKey::ServerUrl => "server-url",
            PreferenceKey::Role => "role",
        }
    }

    /// Normalise a value for this key, rejecting anything unusable.
    fn validate(self, value: &str) -> Result<String, PreferencesError> {
        let invalid = || PreferencesError::InvalidValue {
            key: self,
            value: value.to_string(),
        };
        match self {
            PreferenceKey::Theme => value.parse::<Theme>().map(|t| t.to_string()).map_err(|_| invalid()),
            PreferenceKey::Role => value.parse::<Role>().map(|r| r.to_string()).map_err(|_| invalid()),
            PreferenceKey::ServerUrl => {
                let url = value.trim().trim_end_matches('/');
                if url.starts_with("http://") || url.starts_with("https://") {
                    Ok(url.to_string())
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferenceKey {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "theme" => Ok(PreferenceKey::Theme),
            "server-url" => Ok(PreferenceKey::ServerUrl),
            "role" => Ok(PreferenceKey::Role),
            _ => Err(PreferencesError::UnknownKey(s.to_string())),
        }
    }
}

/// Loaded preference values plus the store they persist to.
pub struct Preferences<S: KeyValueStore> {
    store: S,
    values: BTreeMap<String, String>,
}

impl<S: KeyValueStore> Preferences<S> {
    pub fn load(store: S) -> Result<Self, PreferencesError> {
        let values = store.load()?;
        tracing::debug!(count = values.len(), "preferences loaded");
        Ok(Self { store, values })
    }

    pub fn get(&self, key: PreferenceKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    /// Stored theme; unknown stored values fall back to the default.
    pub fn theme(&self) -> Theme {
        self.get(PreferenceKey::Theme)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn server_url(&self) -> Option<&str> {
        self.get(PreferenceKey::ServerUrl)
    }

    pub fn role(&self) -> Option<Role> {
        self.get(PreferenceKey::Role).and_then(|v| v.parse().ok())
    }

    /// Set a value. Writes through to the store only when it changed;
    /// returns whether a write happened.
    pub fn set(&mut self, key: PreferenceKey, value: &str) -> Result<bool, PreferencesError> {
        let value = key.validate(value)?;
        if self.get(key) == Some(value.as_str()) {
            return Ok(false);
        }
        self.values.insert(key.as_str().to_string(), value);
        self.store.save(&self.values)?;
        tracing::info!(key = key.as_str(), "preference saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<BTreeMap<String, String>>,
        saves: AtomicUsize,
    }

    impl KeyValueStore for &MemoryStore {
        fn load(&self) -> Result<BTreeMap<String, String>, PreferencesError> {
            Ok(self.values.lock().unwrap().clone())
        }

        fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferencesError> {
            *self.values.lock().unwrap() = values.clone();
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::default();
        let prefs = Preferences::load(&store).unwrap();
        assert_eq!(prefs.theme(), Theme::System);
        assert_eq!(prefs.role(), None);
        assert_eq!(prefs.server_url(), None);
    }

    #[test]
    fn test_write_on_change_only() {
        let store = MemoryStore::default();
        let mut prefs = Preferences::load(&store).unwrap();

        assert!(prefs.set(PreferenceKey::Theme, "Dark").unwrap());
        assert!(!prefs.set(PreferenceKey::Theme, "dark").unwrap());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    #[test]
    fn test_values_survive_reload() {
        let store = MemoryStore::default();
        {
            let mut prefs = Preferences::load(&store).unwrap();
            prefs.set(PreferenceKey::Role, "admin").unwrap();
            prefs
                .set(PreferenceKey::ServerUrl, "http://10.0.0.5:5000/")
                .unwrap();
        }
        let prefs = Preferences::load(&store).unwrap();
        assert_eq!(prefs.role(), Some(Role::Admin));
        assert_eq!(prefs.server_url(), Some("http://10.0.0.5:5000"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let store = MemoryStore::default();
        let mut prefs = Preferences::load(&store).unwrap();
        assert!(matches!(
            prefs.set(PreferenceKey::Role, "janitor"),
            Err(PreferencesError::InvalidValue { key: PreferenceKey::Role, .. })
        ));
        assert!(prefs.set(PreferenceKey::ServerUrl, "ftp://x").is_err());
        assert!(prefs.set(PreferenceKey::Theme, "purple").is_err());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!("server_url".parse::<PreferenceKey>().unwrap(), PreferenceKey::ServerUrl);
        assert!(matches!(
            "volume".parse::<PreferenceKey>(),
            Err(PreferencesError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_toml_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("edutrack-prefs-{}", uuid::Uuid::new_v4()));
        let store = TomlFileStore::new(dir.join("preferences.toml"));
        assert!(store.load().unwrap().is_empty());

        let mut prefs = Preferences::load(store).unwrap();
        prefs.set(PreferenceKey::Theme, "light").unwrap();

        let text = std::fs::read_to_string(dir.join("preferences.toml")).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(text.contains("theme = \"light\""));
    }

    #[test]
    fn test_toml_file_store_rejects_garbage() {
        let dir = std::env::temp_dir().join(format!("edutrack-prefs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.toml");
        std::fs::write(&path, "theme = [").unwrap();
        let err = TomlFileStore::new(&path).load().unwrap_err();
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(err, PreferencesError::Parse { .. }));
    }
}
