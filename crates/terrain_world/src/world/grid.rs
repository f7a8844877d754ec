//! Fixed 64×64 grid of tile slots.
//!
//! Every slot knows whether the world descriptor declares a tile there.
//! Tiles are only ever installed into declared slots, and only once fully
//! parsed.

use log::{debug, warn};

use crate::coords::{GRID_SIZE, TilePos, TileRange};
use crate::error::WorldError;
use crate::format::descriptor::WorldDescriptor;
use crate::store::{StoreError, TileStore};
use crate::terrain::Tile;

/// Writes a tile to the store and clears its dirty flag on success.
pub(crate) fn write_back(store: &dyn TileStore, map: &str, tile: &mut Tile) -> Result<(), StoreError> {
  let pos = tile.pos();
  let bytes = tile.serialize();
  store.write_tile(map, pos.x, pos.z, &bytes)?;
  debug!("Wrote tile {} ({} bytes)", pos, bytes.len());
  tile.mark_saved(bytes);
  Ok(())
}

/// One cell of the grid.
#[derive(Debug, Default)]
pub struct TileSlot {
  /// Whether the descriptor declares a tile here.
  pub present: bool,
  /// The tile, when loaded.
  pub tile: Option<Box<Tile>>,
  /// Grid tick of the last load or access through the streaming API.
  pub last_touched: u64,
}

/// Outcome of [`ChunkGrid::ensure_loaded`].
#[derive(Debug, Default)]
pub struct LoadReport {
  /// Tiles read and installed by this call.
  pub loaded: Vec<TilePos>,
  /// Declared tiles whose blob is absent from the store.
  pub missing: Vec<TilePos>,
  /// Tiles that could not be read or parsed.
  pub failed: Vec<(TilePos, WorldError)>,
}

impl LoadReport {
  /// Returns true if every declared tile in range is resident.
  pub fn is_complete(&self) -> bool {
    self.missing.is_empty() && self.failed.is_empty()
  }
}

/// Outcome of [`ChunkGrid::evict`].
#[derive(Debug, Default)]
pub struct EvictReport {
  /// Tiles dropped from memory.
  pub evicted: Vec<TilePos>,
  /// Dirty tiles written before eviction.
  pub saved: Vec<TilePos>,
  /// Dirty tiles whose write failed; they stay resident and dirty.
  pub failed: Vec<(TilePos, StoreError)>,
}

/// Tile residency for one world.
pub struct ChunkGrid {
  slots: Vec<TileSlot>,
  tick: u64,
}

impl ChunkGrid {
  /// Creates an empty grid shaped after the descriptor.
  pub fn new(descriptor: &WorldDescriptor) -> Self {
    let slots = (0..GRID_SIZE * GRID_SIZE)
      .map(|i| TileSlot {
        present: descriptor.has_tile(TilePos::new(i % GRID_SIZE, i / GRID_SIZE)),
        ..TileSlot::default()
      })
      .collect();
    Self { slots, tick: 0 }
  }

  fn slot(&self, pos: TilePos) -> Option<&TileSlot> {
    pos.in_bounds().then(|| &self.slots[pos.slot_index()])
  }

  fn slot_mut(&mut self, pos: TilePos) -> Option<&mut TileSlot> {
    pos.in_bounds().then(|| &mut self.slots[pos.slot_index()])
  }

  fn next_tick(&mut self) -> u64 {
    self.tick += 1;
    self.tick
  }

  /// Returns true if the descriptor declares a tile at `pos`.
  pub fn is_present(&self, pos: TilePos) -> bool {
    self.slot(pos).is_some_and(|s| s.present)
  }

  /// Loads every declared tile within Chebyshev distance `radius` of
  /// `center` that is not yet resident.
  ///
  /// Failures are collected per tile; the remaining tiles still load.
  /// Nothing outside the radius is unloaded.
  pub fn ensure_loaded(
    &mut self,
    store: &dyn TileStore,
    map: &str,
    extended_alpha: bool,
    center: TilePos,
    radius: u32,
  ) -> LoadReport {
    let mut report = LoadReport::default();

    for pos in TileRange::around(center, radius).iter() {
      let tick = self.next_tick();
      let slot = &mut self.slots[pos.slot_index()];
      if !slot.present {
        continue;
      }
      slot.last_touched = tick;
      if slot.tile.is_some() {
        continue;
      }

      let bytes = match store.read_tile(map, pos.x, pos.z) {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound(path)) => {
          warn!("Tile {} declared but missing from store: {}", pos, path);
          report.missing.push(pos);
          continue;
        }
        Err(e) => {
          warn!("Failed to read tile {}: {}", pos, e);
          report.failed.push((pos, WorldError::Store(e)));
          continue;
        }
      };

      match Tile::parse(pos, &bytes, extended_alpha) {
        Ok(tile) => {
          debug!("Loaded tile {} ({} bytes)", pos, bytes.len());
          slot.tile = Some(Box::new(tile));
          report.loaded.push(pos);
        }
        Err(e) => {
          warn!("{}", e);
          report.failed.push((pos, e));
        }
      }
    }

    report
  }

  /// Installs a tile, replacing any resident tile at its position.
  pub fn install(&mut self, tile: Tile) -> Result<(), WorldError> {
    let pos = tile.pos();
    let tick = self.next_tick();
    match self.slot_mut(pos) {
      Some(slot) if slot.present => {
        slot.tile = Some(Box::new(tile));
        slot.last_touched = tick;
        Ok(())
      }
      _ => Err(WorldError::out_of_range("tile", pos.x, pos.z)),
    }
  }

  /// Removes a tile from memory without saving it.
  pub fn unload(&mut self, pos: TilePos) -> Option<Box<Tile>> {
    self.slot_mut(pos).and_then(|s| s.tile.take())
  }

  /// Returns the loaded tile at `pos`.
  pub fn tile_at(&self, pos: TilePos) -> Option<&Tile> {
    self.slot(pos).and_then(|s| s.tile.as_deref())
  }

  pub fn tile_at_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
    self.slot_mut(pos).and_then(|s| s.tile.as_deref_mut())
  }

  pub fn is_loaded(&self, pos: TilePos) -> bool {
    self.tile_at(pos).is_some()
  }

  pub fn loaded_count(&self) -> usize {
    self.slots.iter().filter(|s| s.tile.is_some()).count()
  }

  /// Loaded tiles, row-major.
  pub fn iter_loaded(&self) -> impl Iterator<Item = &Tile> {
    self.slots.iter().filter_map(|s| s.tile.as_deref())
  }

  pub fn iter_loaded_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
    self.slots.iter_mut().filter_map(|s| s.tile.as_deref_mut())
  }

  /// Calls `f` for each loaded tile, row-major.
  pub fn for_each_loaded(&self, mut f: impl FnMut(&Tile)) {
    for tile in self.iter_loaded() {
      f(tile);
    }
  }

  /// Surface height at a world point, `None` where no tile is loaded.
  pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
    self.tile_at(TilePos::from_world(x, z))?.height_at(x, z)
  }

  /// Drops least recently touched tiles outside the active radius until at
  /// most `limit` tiles are resident.
  ///
  /// Dirty tiles are written first. A tile whose write fails stays
  /// resident. Tiles within `radius` of `center` are never evicted, so the
  /// grid may stay above `limit`.
  pub fn evict(&mut self, store: &dyn TileStore, map: &str, center: TilePos, radius: u32, limit: usize) -> EvictReport {
    let mut report = EvictReport::default();
    let resident = self.loaded_count();
    if resident <= limit {
      return report;
    }

    let active = TileRange::around(center, radius);
    let mut candidates: Vec<(u64, TilePos)> = self
      .slots
      .iter()
      .filter_map(|s| s.tile.as_deref().map(|t| (s.last_touched, t.pos())))
      .filter(|(_, pos)| !active.contains(*pos))
      .collect();
    candidates.sort();

    let mut excess = resident - limit;
    for (_, pos) in candidates {
      if excess == 0 {
        break;
      }
      let slot = &mut self.slots[pos.slot_index()];
      let Some(tile) = slot.tile.as_deref_mut() else {
        continue;
      };

      if tile.is_dirty() {
        if let Err(e) = write_back(store, map, tile) {
          warn!("Keeping tile {} resident, save failed: {}", pos, e);
          report.failed.push((pos, e));
          continue;
        }
        report.saved.push(pos);
      }

      slot.tile = None;
      debug!("Evicted tile {}", pos);
      report.evicted.push(pos);
      excess -= 1;
    }

    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::format::descriptor::DescriptorFlags;
  use crate::store::MemoryStore;

  const MAP: &str = "Test";

  fn world(tiles: &[(i32, i32)]) -> (WorldDescriptor, MemoryStore) {
    let store = MemoryStore::new();
    let mut desc = WorldDescriptor::new(DescriptorFlags::empty());
    for &(x, z) in tiles {
      let pos = TilePos::new(x, z);
      desc.set_present(pos, true);
      let tile = Tile::new_flat(pos, 0.0, None, false);
      store.write_tile(MAP, x, z, &tile.serialize()).unwrap();
    }
    (desc, store)
  }

  #[test]
  fn loads_only_declared_tiles_in_radius() {
    let (desc, store) = world(&[(3, 4), (6, 6)]);
    let mut grid = ChunkGrid::new(&desc);

    let report = grid.ensure_loaded(&store, MAP, false, TilePos::new(3, 4), 1);
    assert_eq!(report.loaded, vec![TilePos::new(3, 4)]);
    assert!(report.is_complete());
    assert!(grid.tile_at(TilePos::new(3, 4)).is_some());
    assert!(grid.tile_at(TilePos::new(6, 6)).is_none());
    assert!(grid.tile_at(TilePos::new(10, 10)).is_none());
    assert!(grid.tile_at(TilePos::new(-1, 70)).is_none());

    // second call is a no-op
    let report = grid.ensure_loaded(&store, MAP, false, TilePos::new(3, 4), 1);
    assert!(report.loaded.is_empty());
    assert_eq!(grid.loaded_count(), 1);
  }

  #[test]
  fn presence_follows_descriptor() {
    let (desc, _) = world(&[(3, 4), (63, 63)]);
    let grid = ChunkGrid::new(&desc);
    assert!(grid.is_present(TilePos::new(3, 4)));
    assert!(grid.is_present(TilePos::new(63, 63)));
    assert!(!grid.is_present(TilePos::new(4, 3)));
    assert!(!grid.is_present(TilePos::new(-1, 0)));
    assert!(!grid.is_present(TilePos::new(0, 64)));
    assert_eq!(grid.loaded_count(), 0);
  }

  #[test]
  fn missing_and_malformed_tiles_are_reported() {
    let (mut desc, store) = world(&[(0, 0)]);
    desc.set_present(TilePos::new(1, 0), true);
    desc.set_present(TilePos::new(0, 1), true);
    store.write_tile(MAP, 0, 1, b"not a tile").unwrap();

    let mut grid = ChunkGrid::new(&desc);
    let report = grid.ensure_loaded(&store, MAP, false, TilePos::new(0, 0), 1);

    assert_eq!(report.loaded, vec![TilePos::new(0, 0)]);
    assert_eq!(report.missing, vec![TilePos::new(1, 0)]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, WorldError::MalformedTile { .. }));
    assert!(!grid.is_loaded(TilePos::new(0, 1)));
  }

  #[test]
  fn install_requires_declared_slot() {
    let (desc, _) = world(&[(2, 2)]);
    let mut grid = ChunkGrid::new(&desc);

    assert!(grid.install(Tile::new_flat(TilePos::new(2, 2), 0.0, None, false)).is_ok());
    assert!(grid.install(Tile::new_flat(TilePos::new(2, 3), 0.0, None, false)).is_err());
    assert_eq!(grid.loaded_count(), 1);
    assert!(grid.unload(TilePos::new(2, 2)).is_some());
    assert_eq!(grid.loaded_count(), 0);
  }

  #[test]
  fn iteration_is_row_major() {
    let (desc, store) = world(&[(1, 0), (0, 1), (0, 0)]);
    let mut grid = ChunkGrid::new(&desc);
    grid.ensure_loaded(&store, MAP, false, TilePos::new(0, 0), 1);

    let mut seen = Vec::new();
    grid.for_each_loaded(|t| seen.push(t.pos()));
    assert_eq!(seen, vec![TilePos::new(0, 0), TilePos::new(1, 0), TilePos::new(0, 1)]);
  }

  #[test]
  fn evicts_oldest_outside_radius_and_saves_dirty() {
    let tiles: Vec<_> = (0..5).map(|x| (x * 3, 0)).collect();
    let (desc, store) = world(&tiles);
    let mut grid = ChunkGrid::new(&desc);
    for &(x, z) in &tiles {
      grid.ensure_loaded(&store, MAP, false, TilePos::new(x, z), 0);
    }
    assert_eq!(grid.loaded_count(), 5);

    let oldest = TilePos::new(0, 0);
    let tile = grid.tile_at_mut(oldest).unwrap();
    tile.chunk_mut(0, 0).unwrap().set_area_id(9);
    tile.mark_dirty();

    let report = grid.evict(&store, MAP, TilePos::new(12, 0), 0, 3);
    assert_eq!(report.evicted, vec![TilePos::new(0, 0), TilePos::new(3, 0)]);
    assert_eq!(report.saved, vec![oldest]);
    assert_eq!(grid.loaded_count(), 3);
    assert!(grid.is_loaded(TilePos::new(12, 0)));

    let saved = Tile::parse(oldest, &store.read_tile(MAP, 0, 0).unwrap(), false).unwrap();
    assert_eq!(saved.chunk(0, 0).unwrap().area_id(), 9);
  }

  #[test]
  fn active_radius_is_never_evicted() {
    let (desc, store) = world(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
    let mut grid = ChunkGrid::new(&desc);
    grid.ensure_loaded(&store, MAP, false, TilePos::new(0, 0), 1);

    let report = grid.evict(&store, MAP, TilePos::new(0, 0), 1, 1);
    assert!(report.evicted.is_empty());
    assert_eq!(grid.loaded_count(), 4);
  }
}
