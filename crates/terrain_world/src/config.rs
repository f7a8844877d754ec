//! World streaming and editing settings.
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! load_radius = 1
//! resident_tile_limit = 25
//! autoheight_clearance = 50.0
//! ```

use std::error::Error;
use std::path::Path;
use std::{fmt, fs, io};

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
  /// Chebyshev radius, in tiles, kept loaded around the entered tile.
  pub load_radius: u32,
  /// Resident tiles allowed before least recently used tiles outside the
  /// load radius are evicted. `0` disables eviction.
  pub resident_tile_limit: usize,
  /// Height above the highest vertex the camera is placed at when entering
  /// a tile with autoheight.
  pub autoheight_clearance: f32,
}

impl Default for WorldConfig {
  fn default() -> Self {
    Self {
      load_radius: 1,
      resident_tile_limit: 25,
      autoheight_clearance: 50.0,
    }
  }
}

impl WorldConfig {
  /// Parses a TOML document.
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    toml::from_str(s).map_err(ConfigError::Parse)
  }

  /// Reads and parses a TOML file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let text = fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }
}

/// Error type for loading a [`WorldConfig`].
#[derive(Debug)]
pub enum ConfigError {
  Io(io::Error),
  Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "failed to read config: {e}"),
      Self::Parse(e) => write!(f, "invalid config: {e}"),
    }
  }
}

impl Error for ConfigError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Parse(e) => Some(e),
    }
  }
}

impl From<io::Error> for ConfigError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}
