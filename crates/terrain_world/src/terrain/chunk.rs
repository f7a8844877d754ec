//! A single terrain chunk and its edit operations.
//!
//! Heights are held in absolute world units. Vertices are laid out in 17
//! interleaved rows: even rows carry 9 outer vertices on the unit grid,
//! odd rows carry 8 inner vertices at the quad centers.
//!
//! Every edit returns whether anything changed. Height edits keep the
//! bounding box current; normals are left to the caller, since a correct
//! normal at the chunk edge needs heights from the neighbours.

use bevy_math::{Vec2, Vec3};
use bitflags::bitflags;

use super::brush::BrushType;
use super::holes::HoleMask;
use super::layers::{ALPHA_MAP_SIZE, ALPHA_TEXEL_SIZE, AlphaMap, LayerFlags, MAX_LAYERS, TextureId, TextureLayer};
use crate::coords::{
  CHUNK_SIZE, ChunkIndex, MINI_CHUNK_SIZE, TILE_SIZE, TilePos, UNIT_SIZE, VERTEX_COUNT, square_intersects,
};
use crate::format::RawSection;

/// Size of the fixed chunk header.
pub const CHUNK_HEADER_SIZE: usize = 128;

bitflags! {
  /// Chunk flags stored in the first header word.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct ChunkFlags: u32 {
    const HAS_SHADOW = 0x1;
    const IMPASSABLE = 0x2;
    const LIQUID_RIVER = 0x4;
    const LIQUID_OCEAN = 0x8;
    const LIQUID_MAGMA = 0x10;
    const LIQUID_SLIME = 0x20;
    const HAS_VERTEX_COLORS = 0x40;
    const DO_NOT_FIX_ALPHA = 0x8000;
    const HIGH_RES_HOLES = 0x10000;
  }
}

/// Order in which sub-sections are written back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SubSection {
  Heights,
  Normals,
  Layers,
  Alpha,
  /// Index into [`Chunk::extra`].
  Raw(usize),
}

/// One 16th × 16th of a tile.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
  pub(crate) index: ChunkIndex,
  pub(crate) xbase: f32,
  pub(crate) zbase: f32,
  pub(crate) base_height: f32,
  pub(crate) heights: [f32; VERTEX_COUNT],
  pub(crate) normals: [Vec3; VERTEX_COUNT],
  pub(crate) vmin: Vec3,
  pub(crate) vmax: Vec3,
  pub(crate) area_id: u32,
  pub(crate) flags: ChunkFlags,
  pub(crate) layers: Vec<TextureLayer>,
  pub(crate) holes: HoleMask,
  /// Raw header; fields this crate interprets are overwritten on encode.
  pub(crate) header: [u8; CHUNK_HEADER_SIZE],
  /// Trailing bytes of the normal sub-section.
  pub(crate) normal_padding: Vec<u8>,
  /// Sub-sections this crate does not interpret.
  pub(crate) extra: Vec<RawSection>,
  pub(crate) layout: Vec<SubSection>,
}

/// Column and row of vertex `i` in half-unit steps.
fn vertex_grid(i: usize) -> (f32, f32) {
  let row = i / 17;
  let col = i % 17;
  if col < 9 {
    (col as f32, row as f32)
  } else {
    ((col - 9) as f32 + 0.5, row as f32 + 0.5)
  }
}

fn outer(i: usize, j: usize) -> usize {
  j * 17 + i
}

fn inner(i: usize, j: usize) -> usize {
  j * 17 + 9 + i
}

/// Barycentric interpolation of `p` inside triangle `(a, b, c)`.
fn interpolate(p: Vec2, a: (Vec2, f32), b: (Vec2, f32), c: (Vec2, f32)) -> f32 {
  let v0 = b.0 - a.0;
  let v1 = c.0 - a.0;
  let v2 = p - a.0;
  let den = v0.perp_dot(v1);
  let v = v2.perp_dot(v1) / den;
  let w = v0.perp_dot(v2) / den;
  (1.0 - v - w) * a.1 + v * b.1 + w * c.1
}

impl Chunk {
  /// Creates a flat chunk at `base_height` inside tile `tile`.
  pub fn new_flat(tile: TilePos, index: ChunkIndex, base_height: f32, base_texture: Option<TextureId>) -> Self {
    let (xbase, zbase) = chunk_origin(tile, index);
    let mut chunk = Self {
      index,
      xbase,
      zbase,
      base_height,
      heights: [base_height; VERTEX_COUNT],
      normals: [Vec3::Y; VERTEX_COUNT],
      vmin: Vec3::ZERO,
      vmax: Vec3::ZERO,
      area_id: 0,
      flags: ChunkFlags::empty(),
      layers: base_texture.map(TextureLayer::base).into_iter().collect(),
      holes: HoleMask::low_res(0),
      header: [0; CHUNK_HEADER_SIZE],
      normal_padding: vec![0; 13],
      extra: Vec::new(),
      layout: vec![
        SubSection::Heights,
        SubSection::Normals,
        SubSection::Layers,
        SubSection::Alpha,
      ],
    };
    chunk.recalc_bounds();
    chunk
  }

  pub fn index(&self) -> ChunkIndex {
    self.index
  }

  /// World-space minimum corner on the horizontal plane.
  pub fn origin(&self) -> (f32, f32) {
    (self.xbase, self.zbase)
  }

  /// Reference height the on-disk heights are stored relative to.
  pub fn base_height(&self) -> f32 {
    self.base_height
  }

  /// Absolute vertex heights.
  pub fn heights(&self) -> &[f32; VERTEX_COUNT] {
    &self.heights
  }

  pub fn normals(&self) -> &[Vec3; VERTEX_COUNT] {
    &self.normals
  }

  pub fn vmin(&self) -> Vec3 {
    self.vmin
  }

  pub fn vmax(&self) -> Vec3 {
    self.vmax
  }

  pub fn area_id(&self) -> u32 {
    self.area_id
  }

  pub fn flags(&self) -> ChunkFlags {
    self.flags
  }

  pub fn layers(&self) -> &[TextureLayer] {
    &self.layers
  }

  pub fn holes(&self) -> HoleMask {
    self.holes
  }

  /// Returns true if any layer uses `texture`.
  pub fn has_texture(&self, texture: TextureId) -> bool {
    self.layers.iter().any(|l| l.texture == texture)
  }

  /// World position of vertex `i`.
  ///
  /// # Panics
  ///
  /// Panics if `i >= VERTEX_COUNT`.
  pub fn vertex_position(&self, i: usize) -> Vec3 {
    let (x, z) = self.vertex_xz(i);
    Vec3::new(x, self.heights[i], z)
  }

  fn vertex_xz(&self, i: usize) -> (f32, f32) {
    let (gx, gz) = vertex_grid(i);
    (self.xbase + gx * UNIT_SIZE, self.zbase + gz * UNIT_SIZE)
  }

  /// Returns true if the point lies on the chunk's horizontal footprint.
  pub fn contains(&self, x: f32, z: f32) -> bool {
    x >= self.xbase && x <= self.xbase + CHUNK_SIZE && z >= self.zbase && z <= self.zbase + CHUNK_SIZE
  }

  /// Returns true if the square of half-width `radius` around `(x, z)`
  /// overlaps the chunk.
  pub fn intersects_square(&self, x: f32, z: f32, radius: f32) -> bool {
    square_intersects(self.xbase, self.zbase, CHUNK_SIZE, x, z, radius)
  }

  /// Interpolated surface height at a world point, `None` off the chunk.
  pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
    self.contains(x, z).then(|| self.surface(x, z))
  }

  /// Surface height with the point clamped onto the chunk.
  pub(crate) fn surface(&self, x: f32, z: f32) -> f32 {
    let lx = ((x - self.xbase) / UNIT_SIZE).clamp(0.0, 8.0);
    let lz = ((z - self.zbase) / UNIT_SIZE).clamp(0.0, 8.0);
    let i = (lx.floor() as usize).min(7);
    let j = (lz.floor() as usize).min(7);
    let p = Vec2::new(lx - i as f32, lz - j as f32);

    let h = &self.heights;
    let c00 = (Vec2::new(0.0, 0.0), h[outer(i, j)]);
    let c10 = (Vec2::new(1.0, 0.0), h[outer(i + 1, j)]);
    let c01 = (Vec2::new(0.0, 1.0), h[outer(i, j + 1)]);
    let c11 = (Vec2::new(1.0, 1.0), h[outer(i + 1, j + 1)]);
    let mid = (Vec2::splat(0.5), h[inner(i, j)]);

    let d = p - Vec2::splat(0.5);
    if d.y.abs() >= d.x.abs() {
      if d.y < 0.0 {
        interpolate(p, c00, c10, mid)
      } else {
        interpolate(p, c01, c11, mid)
      }
    } else if d.x < 0.0 {
      interpolate(p, c00, c01, mid)
    } else {
      interpolate(p, c10, c11, mid)
    }
  }

  /// Rescans heights into `vmin`/`vmax`.
  pub fn recalc_bounds(&mut self) {
    let (lo, hi) = self
      .heights
      .iter()
      .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));
    self.vmin = Vec3::new(self.xbase, lo, self.zbase);
    self.vmax = Vec3::new(self.xbase + CHUNK_SIZE, hi, self.zbase + CHUNK_SIZE);
  }

  /// Raises every vertex under the brush by `change * weight`.
  pub fn change_terrain(&mut self, x: f32, z: f32, change: f32, radius: f32, brush: BrushType) -> bool {
    if !self.intersects_square(x, z, radius) {
      return false;
    }
    let mut changed = false;
    for i in 0..VERTEX_COUNT {
      let (vx, vz) = self.vertex_xz(i);
      if let Some(w) = brush.weight(vx - x, vz - z, radius) {
        let delta = change * w;
        if delta != 0.0 {
          self.heights[i] += delta;
          changed = true;
        }
      }
    }
    if changed {
      self.recalc_bounds();
    }
    changed
  }

  /// Pulls every vertex under the brush toward `height`.
  pub fn flatten_terrain(
    &mut self,
    x: f32,
    z: f32,
    height: f32,
    remain: f32,
    radius: f32,
    brush: BrushType,
  ) -> bool {
    if !self.intersects_square(x, z, radius) {
      return false;
    }
    let mut targets = Vec::new();
    for i in 0..VERTEX_COUNT {
      let (vx, vz) = self.vertex_xz(i);
      if let Some(keep) = brush.effective_remain(remain, vx - x, vz - z, radius) {
        targets.push((i, self.heights[i] * keep + height * (1.0 - keep)));
      }
    }
    self.apply_heights(&targets)
  }

  /// Computes blurred heights without touching the chunk.
  ///
  /// `sampler` returns the pre-edit world surface height at a point, or
  /// `None` where no terrain is loaded; such samples are left out of the
  /// average.
  pub fn blur_targets(
    &self,
    x: f32,
    z: f32,
    remain: f32,
    radius: f32,
    brush: BrushType,
    sampler: impl Fn(f32, f32) -> Option<f32>,
  ) -> Vec<(usize, f32)> {
    if !self.intersects_square(x, z, radius) {
      return Vec::new();
    }
    let mut targets = Vec::new();
    for i in 0..VERTEX_COUNT {
      let (vx, vz) = self.vertex_xz(i);
      let Some(keep) = brush.effective_remain(remain, vx - x, vz - z, radius) else {
        continue;
      };

      let mut sum = 0.0;
      let mut count = 0;
      for dz in [-UNIT_SIZE, 0.0, UNIT_SIZE] {
        for dx in [-UNIT_SIZE, 0.0, UNIT_SIZE] {
          let sample = if dx == 0.0 && dz == 0.0 {
            Some(self.heights[i])
          } else {
            sampler(vx + dx, vz + dz)
          };
          if let Some(h) = sample {
            sum += h;
            count += 1;
          }
        }
      }
      let average = sum / count as f32;
      targets.push((i, self.heights[i] * keep + average * (1.0 - keep)));
    }
    targets
  }

  /// Blurs using only this chunk's own surface.
  pub fn blur_terrain(&mut self, x: f32, z: f32, remain: f32, radius: f32, brush: BrushType) -> bool {
    let targets = self.blur_targets(x, z, remain, radius, brush, |sx, sz| self.height_at(sx, sz));
    self.apply_heights(&targets)
  }

  /// Writes `(vertex, height)` pairs. Returns true if any height changed.
  pub fn apply_heights(&mut self, targets: &[(usize, f32)]) -> bool {
    let mut changed = false;
    for &(i, h) in targets {
      if self.heights[i] != h {
        self.heights[i] = h;
        changed = true;
      }
    }
    if changed {
      self.recalc_bounds();
    }
    changed
  }

  /// Computes vertex normals from four samples around each vertex.
  ///
  /// Samples come from `sampler` so normals line up across chunk and tile
  /// borders; where it has no terrain, the chunk's own clamped surface is
  /// used.
  pub fn compute_normals(&self, sampler: impl Fn(f32, f32) -> Option<f32>) -> Vec<Vec3> {
    let half = UNIT_SIZE * 0.5;
    let sample = |x: f32, z: f32| Vec3::new(x, sampler(x, z).unwrap_or_else(|| self.surface(x, z)), z);

    (0..VERTEX_COUNT)
      .map(|i| {
        let p = self.vertex_position(i);
        let p1 = sample(p.x - half, p.z - half) - p;
        let p2 = sample(p.x + half, p.z - half) - p;
        let p3 = sample(p.x + half, p.z + half) - p;
        let p4 = sample(p.x - half, p.z + half) - p;
        let n = p2.cross(p1) + p3.cross(p2) + p4.cross(p3) + p1.cross(p4);
        n.try_normalize().unwrap_or(Vec3::Y)
      })
      .collect()
  }

  /// Replaces all normals. Ignores input of the wrong length.
  pub(crate) fn set_normals(&mut self, normals: &[Vec3]) {
    if normals.len() == VERTEX_COUNT {
      self.normals.copy_from_slice(normals);
    }
  }

  /// Recomputes normals, see [`Chunk::compute_normals`].
  pub fn recalc_normals(&mut self, sampler: impl Fn(f32, f32) -> Option<f32>) {
    let normals = self.compute_normals(sampler);
    self.set_normals(&normals);
  }

  /// Adds `strength * pressure * weight` to `texture`'s alpha under the
  /// brush.
  ///
  /// Painting the base texture fades every overlay instead. A texture the
  /// chunk does not carry gets a new transparent layer first; when the
  /// chunk is already at [`MAX_LAYERS`] nothing happens.
  #[allow(clippy::too_many_arguments)]
  pub fn paint_texture(
    &mut self,
    x: f32,
    z: f32,
    radius: f32,
    brush: BrushType,
    strength: f32,
    pressure: f32,
    texture: TextureId,
  ) -> bool {
    if !self.intersects_square(x, z, radius) {
      return false;
    }
    let amount = strength * pressure;

    let (layer, added) = match self.layers.iter().position(|l| l.texture == texture) {
      Some(layer) => (layer, false),
      None if self.layers.is_empty() => {
        self.layers.push(TextureLayer::base(texture));
        return true;
      }
      None if self.layers.len() >= MAX_LAYERS => return false,
      None => {
        self.layers.push(TextureLayer::overlay(texture));
        (self.layers.len() - 1, true)
      }
    };

    let mut changed = false;
    for tz in 0..ALPHA_MAP_SIZE {
      for tx in 0..ALPHA_MAP_SIZE {
        let px = self.xbase + (tx as f32 + 0.5) * ALPHA_TEXEL_SIZE;
        let pz = self.zbase + (tz as f32 + 0.5) * ALPHA_TEXEL_SIZE;
        let Some(w) = brush.weight(px - x, pz - z, radius) else {
          continue;
        };
        let delta = amount * w;
        if delta == 0.0 {
          continue;
        }
        let texel = tz * ALPHA_MAP_SIZE + tx;
        if layer == 0 {
          // Overlays without an alpha map are already transparent
          for alpha in self.layers.iter_mut().skip(1).filter_map(|l| l.alpha.as_mut()) {
            changed |= alpha.add(texel, -delta);
          }
        } else {
          changed |= overlay_alpha(&mut self.layers[layer]).add(texel, delta);
        }
      }
    }

    if added && !changed {
      self.layers.pop();
    }
    changed
  }

  /// Sets one hole sub-quad.
  pub fn add_hole(&mut self, sub_x: usize, sub_z: usize) -> bool {
    self.holes.set(sub_x, sub_z, true)
  }

  /// Clears one hole sub-quad.
  pub fn remove_hole(&mut self, sub_x: usize, sub_z: usize) -> bool {
    self.holes.set(sub_x, sub_z, false)
  }

  pub fn is_hole(&self, sub_x: usize, sub_z: usize) -> bool {
    self.holes.get(sub_x, sub_z)
  }

  fn sub_quad_at(&self, x: f32, z: f32) -> Option<(usize, usize)> {
    if !self.contains(x, z) {
      return None;
    }
    let res = self.holes.resolution();
    let size = if self.holes.is_high_res() {
      MINI_CHUNK_SIZE / 2.0
    } else {
      MINI_CHUNK_SIZE
    };
    let sx = (((x - self.xbase) / size) as usize).min(res - 1);
    let sz = (((z - self.zbase) / size) as usize).min(res - 1);
    Some((sx, sz))
  }

  /// Punches a hole into the sub-quad containing a world point.
  pub fn add_hole_at(&mut self, x: f32, z: f32) -> bool {
    self.sub_quad_at(x, z).is_some_and(|(sx, sz)| self.add_hole(sx, sz))
  }

  /// Fills the hole at a world point.
  pub fn remove_hole_at(&mut self, x: f32, z: f32) -> bool {
    self.sub_quad_at(x, z).is_some_and(|(sx, sz)| self.remove_hole(sx, sz))
  }

  pub fn set_area_id(&mut self, area_id: u32) -> bool {
    let changed = self.area_id != area_id;
    self.area_id = area_id;
    changed
  }

  /// Sets every height and the base height to zero.
  pub fn clear_height(&mut self) -> bool {
    let changed = self.base_height != 0.0 || self.heights.iter().any(|&h| h != 0.0);
    self.base_height = 0.0;
    self.heights = [0.0; VERTEX_COUNT];
    self.recalc_bounds();
    changed
  }

  /// Moves the whole chunk up or down by `delta`.
  pub fn shift_height(&mut self, delta: f32) -> bool {
    if delta == 0.0 {
      return false;
    }
    self.base_height += delta;
    for h in &mut self.heights {
      *h += delta;
    }
    self.recalc_bounds();
    true
  }

  /// Removes every texture layer.
  pub fn erase_textures(&mut self) -> bool {
    let changed = !self.layers.is_empty();
    self.layers.clear();
    changed
  }

  /// Replaces all layers with a single base layer.
  pub fn set_base_texture(&mut self, texture: TextureId) -> bool {
    let base = vec![TextureLayer::base(texture)];
    if self.layers == base {
      return false;
    }
    self.layers = base;
    true
  }

  /// Swaps `old` for `new` in every layer using it.
  pub fn switch_texture(&mut self, old: TextureId, new: TextureId) -> bool {
    let mut changed = false;
    for layer in &mut self.layers {
      if layer.texture == old && old != new {
        layer.texture = new;
        changed = true;
      }
    }
    changed
  }

  pub fn set_impassable(&mut self, impassable: bool) -> bool {
    let old = self.flags;
    self.flags.set(ChunkFlags::IMPASSABLE, impassable);
    old != self.flags
  }
}

/// Alpha map of an overlay, created empty if the layer had none.
fn overlay_alpha(layer: &mut TextureLayer) -> &mut AlphaMap {
  layer.flags.insert(LayerFlags::USE_ALPHA_MAP);
  layer.alpha.get_or_insert_with(AlphaMap::new)
}

/// World-space footprint of chunk `index` in tile `tile`.
pub(crate) fn chunk_origin(tile: TilePos, index: ChunkIndex) -> (f32, f32) {
  (
    tile.x as f32 * TILE_SIZE + index.x as f32 * CHUNK_SIZE,
    tile.z as f32 * TILE_SIZE + index.z as f32 * CHUNK_SIZE,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn flat(height: f32) -> Chunk {
    Chunk::new_flat(TilePos::new(0, 0), ChunkIndex::new(0, 0), height, Some(TextureId(0)))
  }

  fn center(chunk: &Chunk) -> (f32, f32) {
    (chunk.xbase + CHUNK_SIZE / 2.0, chunk.zbase + CHUNK_SIZE / 2.0)
  }

  fn assert_bounds(chunk: &Chunk) {
    for &h in chunk.heights() {
      assert!(chunk.vmin().y <= h && h <= chunk.vmax().y);
    }
  }

  #[test]
  fn vertex_layout_interleaves_rows() {
    let chunk = flat(0.0);
    assert_eq!(chunk.vertex_position(0), Vec3::new(0.0, 0.0, 0.0));
    assert_eq!(chunk.vertex_position(8).x, 8.0 * UNIT_SIZE);
    let first_inner = chunk.vertex_position(9);
    assert_eq!(first_inner.x, 0.5 * UNIT_SIZE);
    assert_eq!(first_inner.z, 0.5 * UNIT_SIZE);
    let last = chunk.vertex_position(VERTEX_COUNT - 1);
    assert!((last.x - CHUNK_SIZE).abs() < 1e-4);
    assert!((last.z - CHUNK_SIZE).abs() < 1e-4);
  }

  #[test]
  fn raise_then_lower_restores_heights() {
    let mut chunk = flat(10.0);
    let before = chunk.heights;
    let (x, z) = center(&chunk);

    assert!(chunk.change_terrain(x, z, 5.0, 12.0, BrushType::Quadratic));
    assert!(chunk.heights.iter().any(|&h| h > 10.0));
    assert_bounds(&chunk);

    chunk.change_terrain(x, z, -5.0, 12.0, BrushType::Quadratic);
    for (a, b) in before.iter().zip(chunk.heights.iter()) {
      assert!((a - b).abs() < 1e-4);
    }
  }

  #[test]
  fn raise_outside_chunk_changes_nothing() {
    let mut chunk = flat(0.0);
    assert!(!chunk.change_terrain(500.0, 500.0, 5.0, 10.0, BrushType::Flat));
  }

  #[test]
  fn flatten_extremes() {
    let mut chunk = flat(0.0);
    let (x, z) = center(&chunk);
    chunk.change_terrain(x, z, 20.0, 30.0, BrushType::Linear);
    let raised = chunk.heights;

    assert!(!chunk.flatten_terrain(x, z, 3.0, 1.0, 10.0, BrushType::Quadratic));
    assert_eq!(chunk.heights, raised);

    assert!(chunk.flatten_terrain(x, z, 3.0, 0.0, 10.0, BrushType::Quadratic));
    for i in 0..VERTEX_COUNT {
      let v = chunk.vertex_position(i);
      let d = ((v.x - x).powi(2) + (v.z - z).powi(2)).sqrt();
      if d <= 10.0 {
        assert_eq!(v.y, 3.0);
      } else {
        assert_eq!(v.y, raised[i]);
      }
    }
    assert_bounds(&chunk);
  }

  #[test]
  fn blur_smooths_a_spike() {
    let mut chunk = flat(0.0);
    let spike = outer(4, 4);
    chunk.heights[spike] = 10.0;
    chunk.recalc_bounds();
    let (x, z) = center(&chunk);

    assert!(chunk.blur_terrain(x, z, 0.0, 2.0, BrushType::Flat));
    assert!(chunk.heights[spike] < 10.0);
    assert!(chunk.heights[spike] > 0.0);
    assert_bounds(&chunk);
  }

  #[test]
  fn height_at_interpolates() {
    let mut chunk = flat(2.0);
    assert!((chunk.height_at(1.0, 1.0).unwrap() - 2.0).abs() < 1e-5);
    assert_eq!(chunk.height_at(-1.0, 1.0), None);

    // center vertex of quad (0, 0) raised: quad center reads it exactly
    chunk.heights[inner(0, 0)] = 6.0;
    let h = chunk.height_at(0.5 * UNIT_SIZE, 0.5 * UNIT_SIZE).unwrap();
    assert!((h - 6.0).abs() < 1e-4);
    // halfway from corner to center
    let h = chunk.height_at(0.25 * UNIT_SIZE, 0.25 * UNIT_SIZE).unwrap();
    assert!((h - 4.0).abs() < 1e-4);
  }

  #[test]
  fn flat_surface_normals_point_up() {
    let mut chunk = flat(7.0);
    chunk.normals = [Vec3::X; VERTEX_COUNT];
    chunk.recalc_normals(|_, _| None);
    for n in chunk.normals() {
      assert!((*n - Vec3::Y).length() < 1e-5);
    }
  }

  #[test]
  fn sloped_surface_normals_lean_downhill() {
    let mut chunk = flat(0.0);
    for i in 0..VERTEX_COUNT {
      let (x, _) = chunk.vertex_xz(i);
      chunk.heights[i] = x;
    }
    chunk.recalc_normals(|x, _| Some(x));
    let n = chunk.normals()[inner(3, 3)];
    assert!(n.x < 0.0);
    assert!(n.y > 0.0);
    assert!(n.z.abs() < 1e-5);
  }

  #[test]
  fn paint_adds_layer_and_accumulates() {
    let mut chunk = flat(0.0);
    let (x, z) = center(&chunk);

    assert!(chunk.paint_texture(x, z, 5.0, BrushType::Flat, 0.5, 1.0, TextureId(1)));
    assert_eq!(chunk.layers().len(), 2);
    let alpha = chunk.layers()[1].alpha.as_ref().unwrap();
    assert_eq!(alpha.get(32, 32), 0.5);
    assert_eq!(alpha.get(0, 0), 0.0);

    chunk.paint_texture(x, z, 5.0, BrushType::Flat, 0.75, 1.0, TextureId(1));
    assert_eq!(chunk.layers()[1].alpha.as_ref().unwrap().get(32, 32), 1.0);

    // base texture paints overlays away
    assert!(chunk.paint_texture(x, z, 5.0, BrushType::Flat, 1.0, 1.0, TextureId(0)));
    assert_eq!(chunk.layers()[1].alpha.as_ref().unwrap().get(32, 32), 0.0);
  }

  #[test]
  fn fifth_texture_is_rejected() {
    let mut chunk = flat(0.0);
    let (x, z) = center(&chunk);
    for id in 1..4 {
      assert!(chunk.paint_texture(x, z, 5.0, BrushType::Flat, 1.0, 1.0, TextureId(id)));
    }
    assert_eq!(chunk.layers().len(), MAX_LAYERS);
    let before = chunk.clone();

    assert!(!chunk.paint_texture(x, z, 5.0, BrushType::Flat, 1.0, 1.0, TextureId(9)));
    assert_eq!(chunk, before);
  }

  #[test]
  fn painting_base_leaves_bare_overlays_untouched() {
    let mut chunk = flat(0.0);
    chunk.layers.push(TextureLayer {
      texture: TextureId(4),
      flags: LayerFlags::empty(),
      effect_id: 0,
      alpha: None,
    });
    let before = chunk.clone();
    let (x, z) = center(&chunk);

    assert!(!chunk.paint_texture(x, z, 10.0, BrushType::Flat, 1.0, 1.0, TextureId(0)));
    assert_eq!(chunk, before);
    assert!(chunk.layers()[1].alpha.is_none());
    assert!(!chunk.layers()[1].flags.contains(LayerFlags::USE_ALPHA_MAP));
  }

  #[test]
  fn paint_missing_footprint_leaves_no_layer() {
    let mut chunk = flat(0.0);
    // touches the chunk's bounding square but no texel center
    assert!(!chunk.paint_texture(-0.5, -0.5, 0.6, BrushType::Flat, 1.0, 1.0, TextureId(3)));
    assert_eq!(chunk.layers().len(), 1);
  }

  #[test]
  fn holes_at_world_points() {
    let mut chunk = flat(0.0);
    let (x, z) = center(&chunk);
    assert!(chunk.add_hole_at(x + 1.0, z + 1.0));
    assert!(chunk.is_hole(2, 2));
    assert!(!chunk.add_hole_at(x + 1.0, z + 1.0));
    assert!(chunk.remove_hole_at(x + 1.0, z + 1.0));
    assert!(chunk.holes().is_empty());
    assert!(!chunk.add_hole_at(-5.0, 0.0));
  }

  #[test]
  fn hole_sub_quads_follow_resolution() {
    let mut chunk = flat(0.0);
    let (x, z) = (chunk.xbase + MINI_CHUNK_SIZE * 1.5, chunk.zbase + MINI_CHUNK_SIZE * 3.5);
    assert!(chunk.add_hole_at(x, z));
    assert!(chunk.is_hole(1, 3));

    // Far edge clamps into the last sub-quad
    assert!(chunk.add_hole_at(chunk.xbase + CHUNK_SIZE, chunk.zbase + CHUNK_SIZE));
    assert!(chunk.is_hole(3, 3));

    chunk.holes = HoleMask::high_res(0);
    assert!(chunk.add_hole_at(x, z));
    assert!(chunk.is_hole(3, 7));
    assert_eq!(chunk.holes().bits(), 1 << (7 * 8 + 3));
  }

  #[test]
  fn whole_chunk_tools() {
    let mut chunk = flat(4.0);
    assert!(chunk.shift_height(2.0));
    assert_eq!(chunk.vmax().y, 6.0);
    assert_eq!(chunk.base_height(), 6.0);

    assert!(chunk.clear_height());
    assert_eq!(chunk.vmax().y, 0.0);
    assert!(!chunk.clear_height());

    assert!(chunk.set_area_id(12));
    assert!(!chunk.set_area_id(12));

    assert!(chunk.set_impassable(true));
    assert!(chunk.flags().contains(ChunkFlags::IMPASSABLE));

    assert!(chunk.switch_texture(TextureId(0), TextureId(5)));
    assert!(chunk.has_texture(TextureId(5)));
    assert!(!chunk.set_base_texture(TextureId(5)));
    assert!(chunk.erase_textures());
    assert!(chunk.layers().is_empty());
  }

  #[test]
  fn chunk_origin_matches_new_flat() {
    let tile = TilePos::new(2, 3);
    let index = ChunkIndex::new(5, 7);
    let chunk = Chunk::new_flat(tile, index, 0.0, None);
    assert_eq!(chunk_origin(tile, index), chunk.origin());
  }
}
