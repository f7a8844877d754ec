//! Open worlds: descriptor, tile residency and editing.
//!
//! A [`World`] owns the parsed descriptor and the [`ChunkGrid`] of one map.
//! Streaming follows the viewer through [`World::enter_tile`]; edits go
//! through an [`EditSession`] borrowed from the world.

pub mod context;
pub mod grid;
pub mod session;

use std::sync::Arc;

use log::{debug, info, warn};

pub use context::{EditContext, Selection};
pub use grid::{ChunkGrid, EvictReport, LoadReport, TileSlot};
pub use session::EditSession;

use crate::config::WorldConfig;
use crate::coords::TilePos;
use crate::error::WorldError;
use crate::format::descriptor::WorldDescriptor;
use crate::store::TileStore;
use crate::terrain::Tile;

/// One open map.
pub struct World {
  pub(crate) store: Arc<dyn TileStore>,
  pub(crate) name: String,
  descriptor: WorldDescriptor,
  pub(crate) grid: ChunkGrid,
  config: WorldConfig,
}

impl World {
  /// Reads the descriptor of `map` and prepares an empty grid.
  pub fn open(store: Arc<dyn TileStore>, map: &str, config: WorldConfig) -> Result<Self, WorldError> {
    let bytes = store.read_descriptor(map)?;
    let descriptor = WorldDescriptor::parse(&bytes).map_err(WorldError::MalformedDescriptor)?;
    info!(
      "Opened world {}: {} tiles{}",
      map,
      descriptor.tile_count(),
      if descriptor.uses_extended_alpha() {
        ", extended alpha"
      } else {
        ""
      }
    );
    Ok(Self {
      store,
      name: map.to_string(),
      grid: ChunkGrid::new(&descriptor),
      descriptor,
      config,
    })
  }

  pub fn descriptor(&self) -> &WorldDescriptor {
    &self.descriptor
  }

  /// Map name used for store paths.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config(&self) -> &WorldConfig {
    &self.config
  }

  pub fn store(&self) -> &Arc<dyn TileStore> {
    &self.store
  }

  pub fn grid(&self) -> &ChunkGrid {
    &self.grid
  }

  /// Returns true if terrain of this world can be edited.
  pub fn is_editable(&self) -> bool {
    self.descriptor.is_editable()
  }

  /// Loads every declared tile within `radius` of `center`.
  pub fn ensure_loaded(&mut self, center: TilePos, radius: u32) -> LoadReport {
    self.grid.ensure_loaded(
      self.store.as_ref(),
      &self.name,
      self.descriptor.uses_extended_alpha(),
      center,
      radius,
    )
  }

  /// Moves the viewer onto a tile.
  ///
  /// Loads the configured neighbourhood, evicts beyond the resident limit
  /// and, with autoheight, lifts the camera clear of the tile's terrain.
  /// Autoheight is consumed by the first entry that places the camera.
  pub fn enter_tile(&mut self, pos: TilePos, context: &mut EditContext) -> Result<LoadReport, WorldError> {
    if !self.descriptor.has_tile(pos) {
      return Err(WorldError::NoTile(pos));
    }

    let radius = self.config.load_radius;
    let report = self.ensure_loaded(pos, radius);

    let limit = self.config.resident_tile_limit;
    if limit > 0 {
      let evicted = self.grid.evict(self.store.as_ref(), &self.name, pos, radius, limit);
      if !evicted.evicted.is_empty() {
        debug!("Evicted {} tiles entering {}", evicted.evicted.len(), pos);
      }
    }

    if context.autoheight
      && let Some(max) = self.max_height(pos)
    {
      context.camera.y = max.max(0.0) + self.config.autoheight_clearance;
      context.autoheight = false;
    }
    Ok(report)
  }

  pub fn tile_at(&self, pos: TilePos) -> Option<&Tile> {
    self.grid.tile_at(pos)
  }

  /// Mutable tile access. Changes made here must be flagged with
  /// [`Tile::mark_dirty`] to be saved.
  pub fn tile_at_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
    self.grid.tile_at_mut(pos)
  }

  /// Highest vertex of a loaded tile.
  pub fn max_height(&self, pos: TilePos) -> Option<f32> {
    self.tile_at(pos).map(Tile::max_height)
  }

  /// Area id of the chunk at a world point, 0 where nothing is loaded.
  pub fn area_id_at(&self, x: f32, z: f32) -> u32 {
    self
      .tile_at(TilePos::from_world(x, z))
      .and_then(|t| t.chunk_at_world(x, z))
      .map_or(0, |c| c.area_id())
  }

  /// Surface height at a world point.
  pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
    self.grid.height_at(x, z)
  }

  /// Positions of loaded tiles with unsaved edits, row-major.
  pub fn dirty_tiles(&self) -> Vec<TilePos> {
    self
      .grid
      .iter_loaded()
      .filter(|t| t.is_dirty())
      .map(Tile::pos)
      .collect()
  }

  /// Discards edits to a loaded tile and reads it again from the store.
  /// Tiles that are not loaded are left alone.
  pub fn reload_tile(&mut self, pos: TilePos) -> Result<(), WorldError> {
    if !self.descriptor.has_tile(pos) {
      return Err(WorldError::NoTile(pos));
    }
    if !self.grid.is_loaded(pos) {
      return Ok(());
    }
    let bytes = self.store.read_tile(&self.name, pos.x, pos.z)?;
    let tile = Tile::parse(pos, &bytes, self.descriptor.uses_extended_alpha())?;
    if self.grid.tile_at(pos).is_some_and(Tile::is_dirty) {
      warn!("Discarding unsaved edits to tile {}", pos);
    }
    self.grid.install(tile)
  }

  /// Writes one tile if it is dirty. Returns whether it was written.
  pub fn save_tile(&mut self, pos: TilePos) -> Result<bool, WorldError> {
    let store = Arc::clone(&self.store);
    let Some(tile) = self.grid.tile_at_mut(pos) else {
      return Ok(false);
    };
    if !tile.is_dirty() {
      return Ok(false);
    }
    grid::write_back(store.as_ref(), &self.name, tile).map_err(|e| WorldError::PersistFailure(vec![(pos, e)]))?;
    Ok(true)
  }

  /// Starts a batch of edits.
  pub fn edit(&mut self) -> EditSession<'_> {
    EditSession::new(self)
  }
}
