//! Texture layers and their alpha maps.

use bitflags::bitflags;

use crate::coords::CHUNK_SIZE;
use crate::format::FormatError;

/// Hard limit of texture layers per chunk imposed by the tile format.
pub const MAX_LAYERS: usize = 4;

/// Texels per alpha map edge.
pub const ALPHA_MAP_SIZE: usize = 64;

/// Texels per alpha map.
pub const ALPHA_TEXELS: usize = ALPHA_MAP_SIZE * ALPHA_MAP_SIZE;

/// World-space edge length of one alpha texel.
pub const ALPHA_TEXEL_SIZE: f32 = CHUNK_SIZE / ALPHA_MAP_SIZE as f32;

/// Encoded size of an 8-bit alpha map.
pub const ALPHA_SIZE_EXTENDED: usize = ALPHA_TEXELS;

/// Encoded size of a 4-bit alpha map.
pub const ALPHA_SIZE_PACKED: usize = ALPHA_TEXELS / 2;

/// Index into a tile's texture name table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

bitflags! {
  /// Per-layer flags stored in `MCLY`.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct LayerFlags: u32 {
    const USE_ALPHA_MAP = 0x100;
    const ALPHA_COMPRESSED = 0x200;
  }
}

/// Opacity of one texture layer across a chunk, 64×64 texels in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AlphaMap {
  texels: Vec<f32>,
}

impl Default for AlphaMap {
  fn default() -> Self {
    Self::new()
  }
}

impl AlphaMap {
  /// Creates a fully transparent map.
  pub fn new() -> Self {
    Self {
      texels: vec![0.0; ALPHA_TEXELS],
    }
  }

  /// Creates a map with every texel set to `value`.
  pub fn filled(value: f32) -> Self {
    Self {
      texels: vec![value.clamp(0.0, 1.0); ALPHA_TEXELS],
    }
  }

  /// Returns the texel at column `x`, row `z`.
  pub fn get(&self, x: usize, z: usize) -> f32 {
    self.texels[z * ALPHA_MAP_SIZE + x]
  }

  /// Sets the texel at column `x`, row `z`, clamped to `[0, 1]`.
  pub fn set(&mut self, x: usize, z: usize, value: f32) {
    self.texels[z * ALPHA_MAP_SIZE + x] = value.clamp(0.0, 1.0);
  }

  /// All texels, row-major.
  pub fn texels(&self) -> &[f32] {
    &self.texels
  }

  /// Adds `delta` to a texel, clamping to `[0, 1]`. Returns true if the texel
  /// changed.
  pub(crate) fn add(&mut self, index: usize, delta: f32) -> bool {
    let old = self.texels[index];
    let new = (old + delta).clamp(0.0, 1.0);
    self.texels[index] = new;
    new != old
  }

  /// Decodes an uncompressed map, 8 bits per texel.
  pub fn decode_extended(data: &[u8]) -> Result<Self, FormatError> {
    let bytes = data.get(..ALPHA_SIZE_EXTENDED).ok_or(FormatError::UnexpectedEof {
      context: "alpha map",
      needed: ALPHA_SIZE_EXTENDED,
      remaining: data.len(),
    })?;
    Ok(Self {
      texels: bytes.iter().map(|&b| b as f32 / 255.0).collect(),
    })
  }

  /// Decodes an uncompressed map, 4 bits per texel, low nibble first.
  pub fn decode_packed(data: &[u8]) -> Result<Self, FormatError> {
    let bytes = data.get(..ALPHA_SIZE_PACKED).ok_or(FormatError::UnexpectedEof {
      context: "alpha map",
      needed: ALPHA_SIZE_PACKED,
      remaining: data.len(),
    })?;
    let mut texels = Vec::with_capacity(ALPHA_TEXELS);
    for &b in bytes {
      texels.push((b & 0x0F) as f32 / 15.0);
      texels.push((b >> 4) as f32 / 15.0);
    }
    Ok(Self { texels })
  }

  /// Decodes a run-length compressed 8-bit map.
  ///
  /// Each control byte holds a count in its low 7 bits. With bit 7 set the
  /// following byte is repeated `count` times, otherwise `count` literal
  /// bytes follow.
  pub fn decode_compressed(data: &[u8]) -> Result<Self, FormatError> {
    let mut texels = Vec::with_capacity(ALPHA_TEXELS);
    let mut pos = 0;
    let eof = |remaining| FormatError::UnexpectedEof {
      context: "compressed alpha map",
      needed: 1,
      remaining,
    };

    while texels.len() < ALPHA_TEXELS {
      let control = *data.get(pos).ok_or_else(|| eof(0))?;
      pos += 1;
      let count = (control & 0x7F) as usize;
      let count = count.min(ALPHA_TEXELS - texels.len());
      if control & 0x80 != 0 {
        let value = *data.get(pos).ok_or_else(|| eof(0))?;
        pos += 1;
        texels.extend(std::iter::repeat_n(value as f32 / 255.0, count));
      } else {
        let run = data.get(pos..pos + count).ok_or_else(|| eof(data.len() - pos))?;
        pos += count;
        texels.extend(run.iter().map(|&b| b as f32 / 255.0));
      }
    }

    Ok(Self { texels })
  }

  /// Encodes 8 bits per texel.
  pub fn encode_extended(&self) -> Vec<u8> {
    self
      .texels
      .iter()
      .map(|&v| (v * 255.0).round() as u8)
      .collect()
  }

  /// Encodes 4 bits per texel, low nibble first.
  pub fn encode_packed(&self) -> Vec<u8> {
    self
      .texels
      .chunks_exact(2)
      .map(|pair| {
        let lo = (pair[0] * 15.0).round() as u8;
        let hi = (pair[1] * 15.0).round() as u8;
        lo | (hi << 4)
      })
      .collect()
  }
}

/// One texture layer of a chunk.
///
/// The first layer of a chunk is the base layer and carries no alpha map;
/// every further layer blends over it using its own alpha map.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureLayer {
  pub texture: TextureId,
  pub flags: LayerFlags,
  pub effect_id: u32,
  pub alpha: Option<AlphaMap>,
}

impl TextureLayer {
  /// Creates a base layer.
  pub fn base(texture: TextureId) -> Self {
    Self {
      texture,
      flags: LayerFlags::empty(),
      effect_id: 0,
      alpha: None,
    }
  }

  /// Creates a transparent overlay layer.
  pub fn overlay(texture: TextureId) -> Self {
    Self {
      texture,
      flags: LayerFlags::USE_ALPHA_MAP,
      effect_id: 0,
      alpha: Some(AlphaMap::new()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extended_encoding_is_exact_for_byte_values() {
    let mut map = AlphaMap::new();
    map.set(3, 7, 128.0 / 255.0);
    map.set(63, 63, 1.0);

    let bytes = map.encode_extended();
    assert_eq!(bytes.len(), ALPHA_SIZE_EXTENDED);
    assert_eq!(bytes[7 * 64 + 3], 128);
    assert_eq!(AlphaMap::decode_extended(&bytes).unwrap(), map);
  }

  #[test]
  fn packed_encoding_uses_low_nibble_first() {
    let mut map = AlphaMap::new();
    map.set(0, 0, 1.0);
    map.set(1, 0, 5.0 / 15.0);

    let bytes = map.encode_packed();
    assert_eq!(bytes.len(), ALPHA_SIZE_PACKED);
    assert_eq!(bytes[0], 0x5F);

    let decoded = AlphaMap::decode_packed(&bytes).unwrap();
    assert_eq!(decoded.get(0, 0), 1.0);
    assert!((decoded.get(1, 0) - 5.0 / 15.0).abs() < 1e-6);
  }

  #[test]
  fn compressed_fill_and_copy_runs() {
    // 4095 texels of 255 via fills, then one literal texel of 7
    let mut data = Vec::new();
    let mut left = ALPHA_TEXELS - 1;
    while left > 0 {
      let n = left.min(127);
      data.push(0x80 | n as u8);
      data.push(255);
      left -= n;
    }
    data.push(1);
    data.push(7);

    let map = AlphaMap::decode_compressed(&data).unwrap();
    assert_eq!(map.get(0, 0), 1.0);
    assert_eq!(map.get(63, 63), 7.0 / 255.0);
  }

  #[test]
  fn truncated_maps_are_errors() {
    assert!(AlphaMap::decode_extended(&[0u8; 100]).is_err());
    assert!(AlphaMap::decode_packed(&[0u8; 100]).is_err());
    assert!(AlphaMap::decode_compressed(&[0x85, 1]).is_err());
  }

  #[test]
  fn add_clamps() {
    let mut map = AlphaMap::filled(0.9);
    assert!(map.add(0, 0.5));
    assert_eq!(map.texels()[0], 1.0);
    assert!(!map.add(0, 0.5));
  }
}
