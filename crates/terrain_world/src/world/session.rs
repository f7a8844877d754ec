//! Edit sessions: brush strokes and tile tools over the loaded world.
//!
//! Height edits run in two passes. The first changes heights in every
//! chunk under the brush; the second recomputes normals of those chunks and
//! their immediate surroundings from the updated world surface, so normals
//! stay continuous across chunk and tile borders.

use log::{info, warn};

use super::World;
use super::context::EditContext;
use super::grid::write_back;
use crate::coords::{TILE_SIZE, TilePos, TileRange, UNIT_SIZE};
use crate::error::WorldError;
use crate::terrain::{BrushEdit, BrushOp, BrushType, Chunk, TextureId};

/// Mutable view of a world for one batch of edits.
///
/// Every operation reports whether it changed anything; tiles that changed
/// are marked dirty until [`EditSession::save`] writes them.
pub struct EditSession<'w> {
  world: &'w mut World,
}

impl<'w> EditSession<'w> {
  pub(crate) fn new(world: &'w mut World) -> Self {
    Self { world }
  }

  /// The world being edited.
  pub fn world(&self) -> &World {
    self.world
  }

  /// Applies one brush stroke to every loaded chunk it reaches.
  pub fn apply_brush(&mut self, edit: &BrushEdit) -> bool {
    let BrushEdit {
      x, z, radius, brush, ..
    } = *edit;

    match &edit.op {
      BrushOp::Raise { change } => {
        let change = *change;
        self.edit_heights(x, z, radius, |c| c.change_terrain(x, z, change, radius, brush))
      }
      BrushOp::Flatten { height, remain } => {
        let (height, remain) = (*height, *remain);
        self.edit_heights(x, z, radius, |c| c.flatten_terrain(x, z, height, remain, radius, brush))
      }
      BrushOp::Blur { remain } => self.blur(x, z, *remain, radius, brush),
      BrushOp::Paint {
        texture,
        strength,
        pressure,
      } => self.paint(x, z, radius, brush, *strength * *pressure, texture),
      BrushOp::AddHole => self.edit_point(x, z, |c| c.add_hole_at(x, z)),
      BrushOp::RemoveHole => self.edit_point(x, z, |c| c.remove_hole_at(x, z)),
    }
  }

  /// Calls `f` on every loaded chunk overlapping the brush square and marks
  /// changed tiles dirty.
  fn edit_chunks(&mut self, x: f32, z: f32, radius: f32, mut f: impl FnMut(&mut Chunk) -> bool) -> bool {
    let mut changed_any = false;
    for pos in TileRange::covering(x, z, radius).iter() {
      let Some(tile) = self.world.grid.tile_at_mut(pos) else {
        continue;
      };
      if !tile.intersects_square(x, z, radius) {
        continue;
      }
      let mut changed = false;
      for chunk in tile.chunks_mut() {
        if chunk.intersects_square(x, z, radius) {
          changed |= f(chunk);
        }
      }
      if changed {
        tile.mark_dirty();
        changed_any = true;
      }
    }
    changed_any
  }

  fn edit_heights(&mut self, x: f32, z: f32, radius: f32, f: impl FnMut(&mut Chunk) -> bool) -> bool {
    let changed = self.edit_chunks(x, z, radius, f);
    if changed {
      self.refresh_normals(x, z, radius + UNIT_SIZE);
    }
    changed
  }

  fn blur(&mut self, x: f32, z: f32, remain: f32, radius: f32, brush: BrushType) -> bool {
    // All targets are computed from the pre-edit surface before any write
    let grid = &self.world.grid;
    let mut updates = Vec::new();
    for pos in TileRange::covering(x, z, radius).iter() {
      let Some(tile) = grid.tile_at(pos) else {
        continue;
      };
      for (i, chunk) in tile.chunks().iter().enumerate() {
        let targets = chunk.blur_targets(x, z, remain, radius, brush, |sx, sz| grid.height_at(sx, sz));
        if !targets.is_empty() {
          updates.push((pos, i, targets));
        }
      }
    }

    let mut changed = false;
    for (pos, i, targets) in updates {
      if let Some(tile) = self.world.grid.tile_at_mut(pos)
        && tile.chunks_mut()[i].apply_heights(&targets)
      {
        tile.mark_dirty();
        changed = true;
      }
    }
    if changed {
      self.refresh_normals(x, z, radius + UNIT_SIZE);
    }
    changed
  }

  fn paint(&mut self, x: f32, z: f32, radius: f32, brush: BrushType, amount: f32, texture: &str) -> bool {
    let mut changed_any = false;
    for pos in TileRange::covering(x, z, radius).iter() {
      let Some(tile) = self.world.grid.tile_at_mut(pos) else {
        continue;
      };
      if !tile.intersects_square(x, z, radius) {
        continue;
      }
      let known = tile.texture_id(texture);
      let id = known.unwrap_or(TextureId(tile.textures().len() as u32));

      let mut changed = false;
      for chunk in tile.chunks_mut() {
        changed |= chunk.paint_texture(x, z, radius, brush, amount, 1.0, id);
      }
      if changed {
        if known.is_none() {
          tile.ensure_texture(texture);
        }
        tile.mark_dirty();
        changed_any = true;
      }
    }
    changed_any
  }

  /// Calls `f` on the loaded chunk containing a world point.
  fn edit_point(&mut self, x: f32, z: f32, f: impl FnOnce(&mut Chunk) -> bool) -> bool {
    let Some(tile) = self.world.grid.tile_at_mut(TilePos::from_world(x, z)) else {
      return false;
    };
    let changed = tile.chunk_at_world_mut(x, z).is_some_and(f);
    if changed {
      tile.mark_dirty();
    }
    changed
  }

  /// Calls `f` on every chunk of a loaded tile.
  fn edit_tile(&mut self, pos: TilePos, mut f: impl FnMut(&mut Chunk) -> bool) -> bool {
    let Some(tile) = self.world.grid.tile_at_mut(pos) else {
      return false;
    };
    let mut changed = false;
    for chunk in tile.chunks_mut() {
      changed |= f(chunk);
    }
    if changed {
      tile.mark_dirty();
    }
    changed
  }

  /// Recomputes normals of every loaded chunk overlapping the square.
  fn refresh_normals(&mut self, x: f32, z: f32, reach: f32) {
    let grid = &self.world.grid;
    let mut updates = Vec::new();
    for pos in TileRange::covering(x, z, reach).iter() {
      let Some(tile) = grid.tile_at(pos) else {
        continue;
      };
      for (i, chunk) in tile.chunks().iter().enumerate() {
        if chunk.intersects_square(x, z, reach) {
          updates.push((pos, i, chunk.compute_normals(|sx, sz| grid.height_at(sx, sz))));
        }
      }
    }

    for (pos, i, normals) in updates {
      if let Some(tile) = self.world.grid.tile_at_mut(pos) {
        tile.chunks_mut()[i].set_normals(&normals);
      }
    }
  }

  fn refresh_tile_normals(&mut self, pos: TilePos) {
    let (ox, oz) = pos.world_origin();
    let half = TILE_SIZE / 2.0;
    self.refresh_normals(ox + half, oz + half, half + UNIT_SIZE);
  }

  /// Writes every dirty tile back to the store.
  ///
  /// All dirty tiles are attempted. Returns the number written, or
  /// [`WorldError::PersistFailure`] listing the tiles that failed; those
  /// stay dirty.
  pub fn save(&mut self) -> Result<usize, WorldError> {
    let World { store, name, grid, .. } = &mut *self.world;
    let mut saved = 0;
    let mut failures = Vec::new();

    for tile in grid.iter_loaded_mut().filter(|t| t.is_dirty()) {
      match write_back(store.as_ref(), name, tile) {
        Ok(()) => saved += 1,
        Err(e) => {
          warn!("Failed to save tile {}: {}", tile.pos(), e);
          failures.push((tile.pos(), e));
        }
      }
    }

    if failures.is_empty() {
      info!("Saved {} tiles of {}", saved, name);
      Ok(saved)
    } else {
      info!("Saved {} tiles of {}, {} failed", saved, name, failures.len());
      Err(WorldError::PersistFailure(failures))
    }
  }

  /// Sets the area id of every chunk of a tile.
  pub fn set_area_id(&mut self, pos: TilePos, area_id: u32) -> bool {
    self.edit_tile(pos, |c| c.set_area_id(area_id))
  }

  /// Sets the area id of one chunk.
  pub fn set_chunk_area_id(&mut self, pos: TilePos, cx: usize, cz: usize, area_id: u32) -> Result<bool, WorldError> {
    let Some(tile) = self.world.grid.tile_at_mut(pos) else {
      return Ok(false);
    };
    let changed = tile.chunk_mut(cx, cz)?.set_area_id(area_id);
    if changed {
      tile.mark_dirty();
    }
    Ok(changed)
  }

  /// Flattens a whole tile to height zero.
  pub fn clear_height(&mut self, pos: TilePos) -> bool {
    let changed = self.edit_tile(pos, Chunk::clear_height);
    if changed {
      self.refresh_tile_normals(pos);
    }
    changed
  }

  /// Moves a whole tile so the selected chunk's base height meets the
  /// camera.
  ///
  /// Does nothing unless a loaded chunk is selected and the offset is
  /// noticeable.
  pub fn move_height(&mut self, pos: TilePos, context: &EditContext) -> bool {
    let Some((tile, cx, cz)) = context.selected_chunk() else {
      return false;
    };
    let Some(base) = self
      .world
      .grid
      .tile_at(tile)
      .and_then(|t| t.chunk(cx, cz).ok())
      .map(Chunk::base_height)
    else {
      return false;
    };

    let delta = context.camera.y - base;
    if delta * delta <= 0.1 {
      return false;
    }
    let changed = self.edit_tile(pos, |c| c.shift_height(delta));
    if changed {
      self.refresh_tile_normals(pos);
    }
    changed
  }

  /// Replaces every layer of every chunk of a tile with one base texture.
  pub fn set_base_texture(&mut self, pos: TilePos, texture: &str) -> bool {
    let Some(tile) = self.world.grid.tile_at_mut(pos) else {
      return false;
    };
    let id = tile.ensure_texture(texture);
    let mut changed = false;
    for chunk in tile.chunks_mut() {
      changed |= chunk.set_base_texture(id);
    }
    if changed {
      tile.mark_dirty();
    }
    changed
  }

  /// Removes all texture layers from the chunk at a world point.
  pub fn erase_textures(&mut self, x: f32, z: f32) -> bool {
    self.edit_point(x, z, Chunk::erase_textures)
  }

  /// Swaps `old` for `new` in the chunk at a world point.
  pub fn overwrite_texture(&mut self, x: f32, z: f32, old: &str, new: &str) -> bool {
    let Some(tile) = self.world.grid.tile_at_mut(TilePos::from_world(x, z)) else {
      return false;
    };
    let Some(old) = tile.texture_id(old) else {
      return false;
    };
    if !tile.chunk_at_world(x, z).is_some_and(|c| c.has_texture(old)) {
      return false;
    }
    let new = tile.ensure_texture(new);
    let changed = tile.chunk_at_world_mut(x, z).is_some_and(|c| c.switch_texture(old, new));
    if changed {
      tile.mark_dirty();
    }
    changed
  }

  /// Sets or clears the impassable flag of the chunk at a world point.
  pub fn set_impassable(&mut self, x: f32, z: f32, impassable: bool) -> bool {
    self.edit_point(x, z, |c| c.set_impassable(impassable))
  }
}
