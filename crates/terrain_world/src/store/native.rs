//! Native filesystem store rooted at a base directory.
//!
//! Archive paths use `\` separators; each component becomes a directory
//! level below the base directory.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{StoreError, TileStore};

/// Returns the default store directory for the given app name.
///
/// Uses OS-standard data directories:
/// - Linux: `~/.local/share/<app_name>/archive/`
/// - Windows: `%APPDATA%/<app_name>/archive/`
/// - macOS: `~/Library/Application Support/<app_name>/archive/`
pub fn default_store_dir(app_name: &str) -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join(app_name)
    .join("archive")
}

/// Filesystem-backed blob store.
#[derive(Clone, Debug)]
pub struct DirStore {
  base_dir: PathBuf,
}

impl DirStore {
  /// Creates a store rooted at `base_dir`.
  ///
  /// Creates the directory if it doesn't exist.
  pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
    let base_dir = base_dir.into();
    fs::create_dir_all(&base_dir)?;
    Ok(Self { base_dir })
  }

  /// Returns the base directory.
  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  /// Maps an archive path to a file below the base directory.
  ///
  /// Empty, `.` and `..` components are dropped so a path can never escape
  /// the base directory.
  pub fn file_path(&self, path: &str) -> PathBuf {
    let mut out = self.base_dir.clone();
    for part in path.split(['\\', '/']) {
      if part.is_empty() || part == "." || part == ".." {
        continue;
      }
      out.push(part);
    }
    out
  }
}

impl TileStore for DirStore {
  fn exists(&self, path: &str) -> Result<bool, StoreError> {
    Ok(self.file_path(path).is_file())
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
    let file = self.file_path(path);
    if !file.is_file() {
      return Err(StoreError::NotFound(path.to_string()));
    }
    Ok(fs::read(file)?)
  }

  fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>, StoreError> {
    let file = self.file_path(path);
    if !file.is_file() {
      return Err(StoreError::NotFound(path.to_string()));
    }
    let mut file = fs::File::open(file)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
  }

  fn write(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
    let target = self.file_path(path);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }

    // Write next to the target, then rename over it
    let mut tmp_name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = target.with_file_name(tmp_name);

    fs::write(&tmp, data)?;
    if let Err(e) = fs::rename(&tmp, &target) {
      let _ = fs::remove_file(&tmp);
      return Err(e.into());
    }
    Ok(())
  }
}
