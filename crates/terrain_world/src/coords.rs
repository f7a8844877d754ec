//! Coordinate types and spatial constants.
//!
//! Defines the coordinate system for the world:
//! - [`TilePos`]: Tile grid position (64×64 tiles per world)
//! - [`ChunkIndex`]: Chunk position within a tile (16×16 chunks per tile)
//! - [`TileRange`]: Clamped rectangle of tile positions
//!
//! World space is measured in the same units as terrain heights. Tile `(x, z)`
//! spans `[x * TILE_SIZE, (x + 1) * TILE_SIZE)` on both horizontal axes.

/// Number of tiles per world edge.
pub const GRID_SIZE: i32 = 64;

/// Number of chunks per tile edge.
pub const CHUNKS_PER_TILE: usize = 16;

/// Number of chunks in one tile.
pub const CHUNKS_PER_TILE_TOTAL: usize = CHUNKS_PER_TILE * CHUNKS_PER_TILE;

/// Edge length of a tile in world units.
pub const TILE_SIZE: f32 = 1600.0 / 3.0;

/// Edge length of a chunk in world units.
pub const CHUNK_SIZE: f32 = TILE_SIZE / CHUNKS_PER_TILE as f32;

/// Distance between two outer vertices of a chunk.
pub const UNIT_SIZE: f32 = CHUNK_SIZE / 8.0;

/// Edge length of a low-resolution hole sub-quad.
pub const MINI_CHUNK_SIZE: f32 = CHUNK_SIZE / 4.0;

/// Vertices per chunk: 9×9 outer plus 8×8 inner.
pub const VERTEX_COUNT: usize = 9 * 9 + 8 * 8;

/// Position in the tile grid.
///
/// Signed so that neighbourhood arithmetic at the world edge cannot wrap;
/// use [`TilePos::in_bounds`] before indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
  pub x: i32,
  pub z: i32,
}

impl TilePos {
  /// Creates a new tile position.
  pub const fn new(x: i32, z: i32) -> Self {
    Self { x, z }
  }

  /// Returns the tile containing a world-space point.
  pub fn from_world(x: f32, z: f32) -> Self {
    Self::new(
      (x / TILE_SIZE).floor() as i32,
      (z / TILE_SIZE).floor() as i32,
    )
  }

  /// Returns true if the position lies inside the 64×64 grid.
  pub const fn in_bounds(self) -> bool {
    self.x >= 0 && self.z >= 0 && self.x < GRID_SIZE && self.z < GRID_SIZE
  }

  /// Row-major slot index (z outer, x inner).
  ///
  /// Only meaningful for in-bounds positions.
  pub(crate) fn slot_index(self) -> usize {
    debug_assert!(self.in_bounds(), "tile {:?} outside grid", self);
    (self.z * GRID_SIZE + self.x) as usize
  }

  /// World-space origin (minimum x and z corner) of this tile.
  pub fn world_origin(self) -> (f32, f32) {
    (self.x as f32 * TILE_SIZE, self.z as f32 * TILE_SIZE)
  }

  /// Chebyshev distance to another tile.
  pub fn chebyshev(self, other: TilePos) -> u32 {
    (self.x - other.x)
      .unsigned_abs()
      .max((self.z - other.z).unsigned_abs())
  }
}

impl std::fmt::Display for TilePos {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "({}, {})", self.x, self.z)
  }
}

/// Position of a chunk inside its tile (0 to 15 on each axis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkIndex {
  pub x: usize,
  pub z: usize,
}

impl ChunkIndex {
  /// Creates a new chunk index.
  pub const fn new(x: usize, z: usize) -> Self {
    Self { x, z }
  }

  /// Returns true if both components are inside `[0, 16)`.
  pub const fn in_bounds(self) -> bool {
    self.x < CHUNKS_PER_TILE && self.z < CHUNKS_PER_TILE
  }

  /// Row-major index into a tile's chunk array (z outer, x inner).
  pub(crate) fn flat(self) -> usize {
    self.z * CHUNKS_PER_TILE + self.x
  }

  /// Inverse of [`ChunkIndex::flat`].
  pub(crate) fn from_flat(index: usize) -> Self {
    Self::new(index % CHUNKS_PER_TILE, index / CHUNKS_PER_TILE)
  }
}

/// Inclusive rectangle of tile positions, always clamped to the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRange {
  pub min: TilePos,
  pub max: TilePos,
}

impl TileRange {
  /// Tiles within Chebyshev distance `radius` of `center`, clamped to the
  /// grid. Returns an empty range when nothing of it lies inside the grid.
  pub fn around(center: TilePos, radius: u32) -> Self {
    let r = radius.min(GRID_SIZE as u32) as i32;
    Self::clamped(
      TilePos::new(center.x - r, center.z - r),
      TilePos::new(center.x + r, center.z + r),
    )
  }

  /// Tiles touched by a world-space square of half-width `radius`.
  pub fn covering(x: f32, z: f32, radius: f32) -> Self {
    Self::clamped(
      TilePos::from_world(x - radius, z - radius),
      TilePos::from_world(x + radius, z + radius),
    )
  }

  fn clamped(min: TilePos, max: TilePos) -> Self {
    let last = GRID_SIZE - 1;
    Self {
      min: TilePos::new(min.x.clamp(0, GRID_SIZE), min.z.clamp(0, GRID_SIZE)),
      max: TilePos::new(max.x.clamp(-1, last), max.z.clamp(-1, last)),
    }
  }

  /// Returns true if the range contains no tile.
  pub fn is_empty(&self) -> bool {
    self.min.x > self.max.x || self.min.z > self.max.z
  }

  /// Returns true if the range contains `pos`.
  pub fn contains(&self, pos: TilePos) -> bool {
    pos.x >= self.min.x && pos.x <= self.max.x && pos.z >= self.min.z && pos.z <= self.max.z
  }

  /// Iterates the range row-major (z outer, x inner).
  pub fn iter(self) -> impl Iterator<Item = TilePos> {
    let xs = self.min.x..=self.max.x;
    (self.min.z..=self.max.z).flat_map(move |z| xs.clone().map(move |x| TilePos::new(x, z)))
  }
}

/// Returns true if the squares `[ax, ax + size] × [az, az + size]` and
/// `[x - r, x + r] × [z - r, z + r]` overlap.
pub(crate) fn square_intersects(ax: f32, az: f32, size: f32, x: f32, z: f32, r: f32) -> bool {
  ax <= x + r && ax + size >= x - r && az <= z + r && az + size >= z - r
}
