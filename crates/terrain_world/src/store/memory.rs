//! In-memory blob store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{StoreError, TileStore};

/// Blob store held entirely in memory.
///
/// Cloning yields another handle to the same blobs, so a caller can keep a
/// handle while the world owns a boxed clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
  blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored blobs.
  pub fn len(&self) -> usize {
    self.lock().map(|b| b.len()).unwrap_or(0)
  }

  /// Returns true if no blob is stored.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Removes a blob, returning its bytes.
  pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
    self.lock().ok()?.remove(path)
  }

  /// Lists all stored paths, sorted.
  pub fn paths(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .lock()
      .map(|b| b.keys().cloned().collect())
      .unwrap_or_default();
    names.sort();
    names
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
    self
      .blobs
      .lock()
      .map_err(|_| StoreError::Io(std::io::Error::other("lock poisoned")))
  }
}

impl TileStore for MemoryStore {
  fn exists(&self, path: &str) -> Result<bool, StoreError> {
    Ok(self.lock()?.contains_key(path))
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
    self
      .lock()?
      .get(path)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(path.to_string()))
  }

  fn write(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
    self.lock()?.insert(path.to_string(), data.to_vec());
    Ok(())
  }
}
