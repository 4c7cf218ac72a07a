//! Configuration for Grasp.
//!
//! Loaded from `~/.grasp/config.toml` (or the path in `GRASP_CONFIG`). Every
//! section is optional; a missing file is not an error and yields defaults.
//!
//! ```toml
//! [queue]
//! capacity = 64
//!
//! [selections]
//! initial = 1
//! new_selection_on_draw = false
//!
//! [input]
//! primary_hand = "right"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use grasp_types::{Hand, MAX_SELECTIONS};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
const CONFIG_ENV_VAR: &str = "GRASP_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct GraspConfig {
    pub queue: Option<QueueConfig>,
    pub selections: Option<SelectionsConfig>,
    pub input: Option<InputConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueConfig {
    /// Pending commands held for the worker before the oldest coalescible
    /// one is dropped. Default: 64.
    pub capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectionsConfig {
    /// Selections created when a mesh session starts. Clamped to 1..=32.
    pub initial: Option<usize>,
    /// Start a new selection whenever a brush stroke begins on an active
    /// selection that already has vertices.
    #[serde(default)]
    pub new_selection_on_draw: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputConfig {
    pub primary_hand: Option<Hand>,
}

impl GraspConfig {
    /// Load from the default location. `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue
            .as_ref()
            .and_then(|q| q.capacity)
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn initial_selections(&self) -> usize {
        self.selections
            .as_ref()
            .and_then(|s| s.initial)
            .unwrap_or(1)
            .clamp(1, MAX_SELECTIONS)
    }

    #[must_use]
    pub fn new_selection_on_draw(&self) -> bool {
        self.selections
            .as_ref()
            .is_some_and(|s| s.new_selection_on_draw)
    }

    /// Handedness override. `None` leaves each frame's own primary hand.
    #[must_use]
    pub fn primary_hand(&self) -> Option<Hand> {
        self.input.as_ref().and_then(|i| i.primary_hand)
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".grasp").join("config.toml"))
}
