//! Error types surfaced by the world core.

use std::error::Error;
use std::fmt;

use crate::coords::TilePos;
use crate::format::FormatError;
use crate::store::StoreError;

/// Errors produced while opening, streaming, editing or saving a world.
#[derive(Debug)]
pub enum WorldError {
  /// The world descriptor could not be parsed.
  MalformedDescriptor(FormatError),
  /// A tile blob could not be parsed.
  MalformedTile { pos: TilePos, source: FormatError },
  /// A blob the descriptor promised is absent from the store.
  NotFound(String),
  /// A tile or chunk coordinate outside its grid.
  OutOfRange { what: &'static str, x: i64, z: i64 },
  /// The descriptor does not declare a tile at this position.
  NoTile(TilePos),
  /// One or more dirty tiles failed to persist. The listed tiles keep their
  /// dirty flag.
  PersistFailure(Vec<(TilePos, StoreError)>),
  /// Any other store failure.
  Store(StoreError),
}

impl WorldError {
  pub(crate) fn out_of_range(what: &'static str, x: impl Into<i64>, z: impl Into<i64>) -> Self {
    Self::OutOfRange {
      what,
      x: x.into(),
      z: z.into(),
    }
  }
}

impl fmt::Display for WorldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MalformedDescriptor(e) => write!(f, "malformed world descriptor: {e}"),
      Self::MalformedTile { pos, source } => write!(f, "malformed tile {pos}: {source}"),
      Self::NotFound(path) => write!(f, "not found: {path}"),
      Self::OutOfRange { what, x, z } => write!(f, "{what} ({x}, {z}) out of range"),
      Self::NoTile(pos) => write!(f, "world has no tile at {pos}"),
      Self::PersistFailure(failures) => {
        write!(f, "failed to save {} tile(s):", failures.len())?;
        for (pos, e) in failures {
          write!(f, " {pos}: {e};")?;
        }
        Ok(())
      }
      Self::Store(e) => write!(f, "store error: {e}"),
    }
  }
}

impl Error for WorldError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::MalformedDescriptor(e) => Some(e),
      Self::MalformedTile { source, .. } => Some(source),
      Self::Store(e) => Some(e),
      Self::PersistFailure(failures) => failures.first().map(|(_, e)| e as &(dyn Error + 'static)),
      Self::NotFound(_) | Self::OutOfRange { .. } | Self::NoTile(_) => None,
    }
  }
}

impl From<StoreError> for WorldError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::NotFound(path) => Self::NotFound(path),
      other => Self::Store(other),
    }
  }
}
