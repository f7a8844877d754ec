//! Editor state handed to operations that depend on the viewer.

use bevy_math::Vec3;

use crate::coords::TilePos;

/// What the user has selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
  /// A terrain chunk.
  Chunk {
    tile: TilePos,
    chunk_x: usize,
    chunk_z: usize,
  },
  /// A placed world object.
  ObjectInstance { unique_id: u32 },
  /// A placed model.
  ModelInstance { unique_id: u32 },
}

/// Camera, autoheight and selection state of one editor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditContext {
  pub camera: Vec3,
  /// Lift the camera above the terrain when entering a tile.
  pub autoheight: bool,
  pub selection: Option<Selection>,
}

impl EditContext {
  pub fn new(camera: Vec3) -> Self {
    Self {
      camera,
      ..Self::default()
    }
  }

  pub fn with_autoheight(mut self, autoheight: bool) -> Self {
    self.autoheight = autoheight;
    self
  }

  pub fn with_selection(mut self, selection: Selection) -> Self {
    self.selection = Some(selection);
    self
  }

  /// The selected chunk, if the selection is one.
  pub fn selected_chunk(&self) -> Option<(TilePos, usize, usize)> {
    match self.selection {
      Some(Selection::Chunk { tile, chunk_x, chunk_z }) => Some((tile, chunk_x, chunk_z)),
      _ => None,
    }
  }
}
