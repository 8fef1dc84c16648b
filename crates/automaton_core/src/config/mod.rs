//! Process-wide JSON configuration store.
//!
//! # Responsibility
//! - Load the flat `key -> JSON value` document at startup and write it back
//!   at shutdown.
//! - Offer typed reads that fall back to caller-supplied defaults.
//!
//! # Invariants
//! - The document root is always a JSON object.
//! - A missing file is an empty store, not an error.
//! - Missing or malformed fields never fail a read; the default wins.
//! - Saves are atomic: write a sibling temp file, then rename.

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod network;

pub use network::NetworkSettings;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    /// Document root is valid JSON but not an object.
    NotAnObject,
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "config file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "config is not valid JSON: {err}"),
            Self::NotAnObject => write!(f, "config root must be a JSON object"),
            Self::Serialize { key, source } => {
                write!(f, "cannot store config key `{key}`: {source}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::NotAnObject => None,
            Self::Serialize { source, .. } => Some(source),
        }
    }
}

/// Flat JSON key/value configuration.
#[derive(Debug, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl ConfigStore {
    /// Store without a backing file; `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `path`, treating a missing or blank file as an empty store.
    ///
    /// # Errors
    /// - `Io` when the file exists but cannot be read.
    /// - `Parse` / `NotAnObject` when the content is not a JSON object.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => parse_document(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    "event=config_load module=config status=ok path={} detail=missing_file",
                    path.display()
                );
                Map::new()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        info!(
            "event=config_load module=config status=ok path={} keys={}",
            path.display(),
            values.len()
        );
        Ok(Self {
            path: Some(path),
            values: Mutex::new(values),
        })
    }

    /// Parses a document held in memory.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(Self {
            path: None,
            values: Mutex::new(parse_document(text)?),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the document back to its file.
    pub fn save(&self) -> ConfigResult<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Writes the document to `path` atomically.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let text = {
            let values = self.values.lock();
            serde_json::to_string_pretty(&*values).map_err(|source| ConfigError::Serialize {
                key: String::new(),
                source,
            })?
        };

        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, text).map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)?;

        info!(
            "event=config_save module=config status=ok path={}",
            path.display()
        );
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Decodes `key` into `T`; `None` when missing or malformed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(
                    "event=config_read module=config status=error key={} error={}",
                    key, err
                );
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get::<String>(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Reads an unsigned integer, also accepting its decimal string form.
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get_value(key) {
            Some(Value::Number(number)) => number.as_u64().unwrap_or(default),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> ConfigResult<()> {
        let value = serde_json::to_value(value).map_err(|source| ConfigError::Serialize {
            key: key.to_string(),
            source,
        })?;
        debug!("event=config_set module=config status=ok key={}", key);
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.lock().remove(key)
    }
}

fn parse_document(text: &str) -> ConfigResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).map_err(ConfigError::Parse)? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject),
    }
}
