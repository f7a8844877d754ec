//! A loaded terrain tile.

use log::debug;

use super::chunk::Chunk;
use super::layers::TextureId;
use crate::coords::{CHUNK_SIZE, CHUNKS_PER_TILE, CHUNKS_PER_TILE_TOTAL, ChunkIndex, TILE_SIZE, TilePos};
use crate::error::WorldError;
use crate::format::RawSection;
use crate::format::tile::{decode_tile, encode_tile};

/// One tile of the world: 16×16 chunks plus its texture table.
///
/// A tile tracks whether it was edited since it was loaded or last saved.
/// A clean tile serializes to exactly the bytes it was parsed from.
#[derive(Clone, Debug)]
pub struct Tile {
  pub(crate) pos: TilePos,
  pub(crate) chunks: Vec<Chunk>,
  pub(crate) textures: Vec<String>,
  /// Unknown sections ahead of the chunks.
  pub(crate) leading: Vec<RawSection>,
  /// How many of `leading` precede the texture table.
  pub(crate) mtex_index: usize,
  /// Unknown sections after the chunks.
  pub(crate) trailing: Vec<RawSection>,
  pub(crate) extended_alpha: bool,
  pub(crate) source: Option<Vec<u8>>,
  pub(crate) dirty: bool,
}

impl Tile {
  /// Parses a tile blob.
  pub fn parse(pos: TilePos, bytes: &[u8], extended_alpha: bool) -> Result<Self, WorldError> {
    decode_tile(pos, bytes, extended_alpha).map_err(|source| WorldError::MalformedTile { pos, source })
  }

  /// Builds a flat tile. The tile starts dirty since it has no stored form.
  pub fn new_flat(pos: TilePos, base_height: f32, base_texture: Option<&str>, extended_alpha: bool) -> Self {
    let textures: Vec<String> = base_texture.map(str::to_string).into_iter().collect();
    let base = base_texture.map(|_| TextureId(0));
    let chunks = (0..CHUNKS_PER_TILE_TOTAL)
      .map(|i| Chunk::new_flat(pos, ChunkIndex::from_flat(i), base_height, base))
      .collect();
    Self {
      pos,
      chunks,
      textures,
      leading: Vec::new(),
      mtex_index: 0,
      trailing: Vec::new(),
      extended_alpha,
      source: None,
      dirty: true,
    }
  }

  pub fn pos(&self) -> TilePos {
    self.pos
  }

  /// Returns the chunk at `(cx, cz)`.
  pub fn chunk(&self, cx: usize, cz: usize) -> Result<&Chunk, WorldError> {
    let index = ChunkIndex::new(cx, cz);
    if !index.in_bounds() {
      return Err(WorldError::out_of_range("chunk", cx as i64, cz as i64));
    }
    Ok(&self.chunks[index.flat()])
  }

  /// Mutable access to the chunk at `(cx, cz)`. Does not mark the tile
  /// dirty.
  pub fn chunk_mut(&mut self, cx: usize, cz: usize) -> Result<&mut Chunk, WorldError> {
    let index = ChunkIndex::new(cx, cz);
    if !index.in_bounds() {
      return Err(WorldError::out_of_range("chunk", cx as i64, cz as i64));
    }
    Ok(&mut self.chunks[index.flat()])
  }

  /// All chunks, row-major.
  pub fn chunks(&self) -> &[Chunk] {
    &self.chunks
  }

  pub fn chunks_mut(&mut self) -> &mut [Chunk] {
    &mut self.chunks
  }

  /// Highest vertex of the tile.
  pub fn max_height(&self) -> f32 {
    self
      .chunks
      .iter()
      .map(|c| c.vmax().y)
      .fold(f32::NEG_INFINITY, f32::max)
  }

  pub fn mark_dirty(&mut self) {
    self.dirty = true;
  }

  pub fn clear_dirty(&mut self) {
    self.dirty = false;
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  /// Returns true if alpha maps are stored at 8 bits per texel.
  pub fn uses_extended_alpha(&self) -> bool {
    self.extended_alpha
  }

  /// Blob for the store.
  pub fn serialize(&self) -> Vec<u8> {
    match &self.source {
      Some(bytes) if !self.dirty => bytes.clone(),
      _ => encode_tile(self),
    }
  }

  /// Records that `bytes` are now the stored form of this tile.
  pub(crate) fn mark_saved(&mut self, bytes: Vec<u8>) {
    self.source = Some(bytes);
    self.dirty = false;
  }

  /// Texture table entries.
  pub fn textures(&self) -> &[String] {
    &self.textures
  }

  /// Looks a texture path up in the table, ignoring case.
  pub fn texture_id(&self, name: &str) -> Option<TextureId> {
    self
      .textures
      .iter()
      .position(|t| t.eq_ignore_ascii_case(name))
      .map(|i| TextureId(i as u32))
  }

  pub fn texture_name(&self, id: TextureId) -> Option<&str> {
    self.textures.get(id.0 as usize).map(String::as_str)
  }

  /// Returns the id of `name`, appending it to the table if needed.
  pub fn ensure_texture(&mut self, name: &str) -> TextureId {
    if let Some(id) = self.texture_id(name) {
      return id;
    }
    debug!("Tile {}: adding texture {}", self.pos, name);
    self.textures.push(name.to_string());
    TextureId(self.textures.len() as u32 - 1)
  }

  /// Index of the chunk under a world point, if the point is on this tile.
  pub fn chunk_index_at(&self, x: f32, z: f32) -> Option<ChunkIndex> {
    if TilePos::from_world(x, z) != self.pos {
      return None;
    }
    let (ox, oz) = self.pos.world_origin();
    let cx = (((x - ox) / CHUNK_SIZE) as usize).min(CHUNKS_PER_TILE - 1);
    let cz = (((z - oz) / CHUNK_SIZE) as usize).min(CHUNKS_PER_TILE - 1);
    Some(ChunkIndex::new(cx, cz))
  }

  /// Chunk under a world point.
  pub fn chunk_at_world(&self, x: f32, z: f32) -> Option<&Chunk> {
    self.chunk_index_at(x, z).map(|i| &self.chunks[i.flat()])
  }

  pub fn chunk_at_world_mut(&mut self, x: f32, z: f32) -> Option<&mut Chunk> {
    self.chunk_index_at(x, z).map(|i| &mut self.chunks[i.flat()])
  }

  /// Surface height at a world point on this tile.
  pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
    self.chunk_at_world(x, z).map(|c| c.surface(x, z))
  }

  /// Returns true if the square of half-width `radius` around `(x, z)`
  /// overlaps the tile.
  pub fn intersects_square(&self, x: f32, z: f32, radius: f32) -> bool {
    let (ox, oz) = self.pos.world_origin();
    crate::coords::square_intersects(ox, oz, TILE_SIZE, x, z, radius)
  }
}
