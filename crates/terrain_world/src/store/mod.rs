//! Blob store abstraction over the game archive.
//!
//! The world core never touches the archive container directly. Every read
//! and write goes through [`TileStore`], keyed by archive path:
//! - `World\Maps\<map>\<map>.wdt` for the world descriptor
//! - `World\Maps\<map>\<map>_<x>_<z>.adt` for a terrain tile

mod memory;
#[cfg(feature = "native")]
mod native;

use std::error::Error;
use std::{fmt, io};

pub use memory::MemoryStore;
#[cfg(feature = "native")]
pub use native::{DirStore, default_store_dir};

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
  /// Standard I/O error.
  Io(io::Error),
  /// No blob stored under this path.
  NotFound(String),
  /// Other backend-specific error.
  Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "I/O error: {e}"),
      Self::NotFound(path) => write!(f, "not found: {path}"),
      Self::Other(e) => write!(f, "{e}"),
    }
  }
}

impl Error for StoreError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Other(e) => Some(&**e),
      Self::NotFound(_) => None,
    }
  }
}

impl From<io::Error> for StoreError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

/// Archive path of a world's descriptor.
pub fn descriptor_path(map: &str) -> String {
  format!("World\\Maps\\{map}\\{map}.wdt")
}

/// Archive path of one terrain tile.
pub fn tile_path(map: &str, x: i32, z: i32) -> String {
  format!("World\\Maps\\{map}\\{map}_{x}_{z}.adt")
}

/// Key-value blob store addressed by archive path.
///
/// All methods take `&self`; implementations synchronize internally.
/// `write` must replace a blob atomically: a reader never observes a
/// partially written tile.
pub trait TileStore: Send + Sync {
  /// Returns true if a blob exists under `path`.
  fn exists(&self, path: &str) -> Result<bool, StoreError>;

  /// Reads a whole blob.
  fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;

  /// Replaces the blob under `path`.
  fn write(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;

  /// Reads `len` bytes starting at `offset`.
  fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>, StoreError> {
    let data = self.read(path)?;
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    let end = start.checked_add(len).filter(|&end| end <= data.len());
    match end {
      Some(end) => Ok(data[start..end].to_vec()),
      None => Err(StoreError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("range {offset}+{len} past end of {path} ({} bytes)", data.len()),
      ))),
    }
  }

  /// Returns true if the tile blob exists.
  fn tile_exists(&self, map: &str, x: i32, z: i32) -> Result<bool, StoreError> {
    self.exists(&tile_path(map, x, z))
  }

  /// Reads a tile blob.
  fn read_tile(&self, map: &str, x: i32, z: i32) -> Result<Vec<u8>, StoreError> {
    self.read(&tile_path(map, x, z))
  }

  /// Replaces a tile blob.
  fn write_tile(&self, map: &str, x: i32, z: i32, data: &[u8]) -> Result<(), StoreError> {
    self.write(&tile_path(map, x, z), data)
  }

  /// Reads the world descriptor blob.
  fn read_descriptor(&self, map: &str) -> Result<Vec<u8>, StoreError> {
    self.read(&descriptor_path(map))
  }

  /// Replaces the world descriptor blob.
  fn write_descriptor(&self, map: &str, data: &[u8]) -> Result<(), StoreError> {
    self.write(&descriptor_path(map), data)
  }
}
