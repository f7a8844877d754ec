//! Terrain tile codec.
//!
//! Layout:
//! - `MVER`: `u32` version (18)
//! - `MTEX`: NUL-terminated texture paths
//! - 256 × `MCNK`, row-major (z outer, x inner)
//!
//! Unknown top-level sections are kept verbatim with their position
//! relative to `MTEX` and to the chunk run. Each `MCNK` holds a 128-byte
//! header followed by sub-sections; those this crate does not interpret are
//! kept verbatim in order.
//!
//! Header offsets are recomputed on encode and point at the sub-section
//! tag, relative to the start of the `MCNK` section. The decoder walks
//! sub-sections sequentially and never trusts them.

use bevy_math::Vec3;

use super::{
  ByteReader, FormatError, RawSection, Section, Tag, check_version, put_f32, put_u16, put_u32, read_f32, read_u16,
  read_u32, version_payload, write_section,
};
use crate::coords::{CHUNKS_PER_TILE_TOTAL, ChunkIndex, TilePos, VERTEX_COUNT};
use crate::terrain::chunk::{CHUNK_HEADER_SIZE, Chunk, ChunkFlags, SubSection, chunk_origin};
use crate::terrain::holes::HoleMask;
use crate::terrain::layers::{AlphaMap, LayerFlags, MAX_LAYERS, TextureId, TextureLayer};
use crate::terrain::tile::Tile;

/// Bytes of packed normals before the padding.
const NORMALS_SIZE: usize = VERTEX_COUNT * 3;

/// Size of one `MCLY` entry.
const LAYER_ENTRY_SIZE: usize = 16;

mod field {
  pub const FLAGS: usize = 0;
  pub const INDEX_X: usize = 4;
  pub const INDEX_Y: usize = 8;
  pub const N_LAYERS: usize = 12;
  pub const OFS_HEIGHT: usize = 20;
  /// Overlays `OFS_HEIGHT` and `OFS_NORMAL` when high-res holes are on.
  pub const HIGH_RES_HOLES: usize = 20;
  pub const OFS_NORMAL: usize = 24;
  pub const OFS_LAYER: usize = 28;
  pub const OFS_ALPHA: usize = 36;
  pub const SIZE_ALPHA: usize = 40;
  pub const AREA_ID: usize = 52;
  pub const HOLES: usize = 60;
  pub const POSITION: usize = 104;
}

/// Header offset fields of preserved sub-sections.
const RAW_OFFSETS: [(Tag, usize); 4] = [
  (Tag::new(b"MCRF"), 32),
  (Tag::new(b"MCSH"), 44),
  (Tag::new(b"MCSE"), 88),
  (Tag::new(b"MCLQ"), 96),
];

/// Decodes a tile blob.
pub(crate) fn decode_tile(pos: TilePos, bytes: &[u8], extended_alpha: bool) -> Result<Tile, FormatError> {
  let mut reader = ByteReader::new(bytes);
  check_version(reader.expect_section(Tag::MVER)?)?;

  let mut textures = None;
  let mut leading = Vec::new();
  let mut mtex_index = 0;
  let mut trailing = Vec::new();
  let mut chunks = Vec::with_capacity(CHUNKS_PER_TILE_TOTAL);

  while !reader.is_empty() {
    let section = reader.section()?;
    match section.tag {
      Tag::MTEX if chunks.is_empty() && textures.is_none() => {
        mtex_index = leading.len();
        textures = Some(decode_textures(section.data));
      }
      Tag::MCNK => {
        if textures.is_none() {
          return Err(FormatError::MissingSection(Tag::MTEX));
        }
        if chunks.len() == CHUNKS_PER_TILE_TOTAL {
          return Err(FormatError::ChunkCount(chunks.len() + 1));
        }
        let index = ChunkIndex::from_flat(chunks.len());
        chunks.push(decode_chunk(pos, index, section.data, extended_alpha)?);
      }
      _ if chunks.is_empty() => leading.push(RawSection::from_section(section)),
      _ => trailing.push(RawSection::from_section(section)),
    }
  }

  let textures = textures.ok_or(FormatError::MissingSection(Tag::MTEX))?;
  if chunks.len() != CHUNKS_PER_TILE_TOTAL {
    return Err(FormatError::ChunkCount(chunks.len()));
  }

  Ok(Tile {
    pos,
    chunks,
    textures,
    leading,
    mtex_index,
    trailing,
    extended_alpha,
    source: Some(bytes.to_vec()),
    dirty: false,
  })
}

/// Encodes a tile from its current state.
pub(crate) fn encode_tile(tile: &Tile) -> Vec<u8> {
  let mut out = Vec::new();
  let split = tile.mtex_index.min(tile.leading.len());

  write_section(&mut out, Tag::MVER, &version_payload());
  for section in &tile.leading[..split] {
    section.write_to(&mut out);
  }
  write_section(&mut out, Tag::MTEX, &encode_textures(&tile.textures));
  for section in &tile.leading[split..] {
    section.write_to(&mut out);
  }
  for chunk in &tile.chunks {
    write_section(&mut out, Tag::MCNK, &encode_chunk(chunk, tile.extended_alpha));
  }
  for section in &tile.trailing {
    section.write_to(&mut out);
  }
  out
}

fn decode_textures(data: &[u8]) -> Vec<String> {
  let data = data.strip_suffix(&[0]).unwrap_or(data);
  if data.is_empty() {
    return Vec::new();
  }
  data
    .split(|&b| b == 0)
    .map(|name| String::from_utf8_lossy(name).into_owned())
    .collect()
}

fn encode_textures(textures: &[String]) -> Vec<u8> {
  let mut out = Vec::new();
  for name in textures {
    out.extend_from_slice(name.as_bytes());
    out.push(0);
  }
  out
}

struct LayerEntry {
  texture: u32,
  flags: u32,
  alpha_offset: usize,
  effect_id: u32,
}

fn decode_chunk(pos: TilePos, index: ChunkIndex, data: &[u8], extended_alpha: bool) -> Result<Chunk, FormatError> {
  let mut reader = ByteReader::new(data);
  let mut header = [0u8; CHUNK_HEADER_SIZE];
  header.copy_from_slice(reader.take(CHUNK_HEADER_SIZE, "chunk header")?);

  let flags = ChunkFlags::from_bits_retain(read_u32(&header, field::FLAGS));
  let holes = if flags.contains(ChunkFlags::HIGH_RES_HOLES) {
    let mut bits = [0u8; 8];
    bits.copy_from_slice(&header[field::HIGH_RES_HOLES..field::HIGH_RES_HOLES + 8]);
    HoleMask::high_res(u64::from_le_bytes(bits))
  } else {
    HoleMask::low_res(read_u16(&header, field::HOLES))
  };
  let base_height = read_f32(&header, field::POSITION + 4);

  let mut heights = None;
  let mut normals = None;
  let mut normal_padding = vec![0; 13];
  let mut entries = Vec::new();
  let mut alpha_data: &[u8] = &[];
  let mut extra = Vec::new();
  let mut layout = Vec::new();

  while !reader.is_empty() {
    let Section { tag, data } = reader.section()?;
    match tag {
      Tag::MCVT => {
        if data.len() != VERTEX_COUNT * 4 {
          return Err(FormatError::BadSize {
            tag,
            size: data.len(),
            expected: VERTEX_COUNT * 4,
          });
        }
        let mut h = [0.0; VERTEX_COUNT];
        for (i, v) in h.iter_mut().enumerate() {
          *v = base_height + read_f32(data, i * 4);
        }
        heights = Some(h);
        layout.push(SubSection::Heights);
      }
      Tag::MCNR => {
        if data.len() < NORMALS_SIZE {
          return Err(FormatError::BadSize {
            tag,
            size: data.len(),
            expected: NORMALS_SIZE + 13,
          });
        }
        let mut n = [Vec3::Y; VERTEX_COUNT];
        for (i, v) in n.iter_mut().enumerate() {
          let b = &data[i * 3..i * 3 + 3];
          let x = b[0] as i8 as f32 / 127.0;
          let z = b[1] as i8 as f32 / 127.0;
          let y = b[2] as i8 as f32 / 127.0;
          *v = Vec3::new(x, y, z);
        }
        normals = Some(n);
        normal_padding = data[NORMALS_SIZE..].to_vec();
        layout.push(SubSection::Normals);
      }
      Tag::MCLY => {
        if data.len() % LAYER_ENTRY_SIZE != 0 || data.len() / LAYER_ENTRY_SIZE > MAX_LAYERS {
          return Err(FormatError::BadSize {
            tag,
            size: data.len(),
            expected: MAX_LAYERS * LAYER_ENTRY_SIZE,
          });
        }
        entries = data
          .chunks_exact(LAYER_ENTRY_SIZE)
          .map(|e| LayerEntry {
            texture: read_u32(e, 0),
            flags: read_u32(e, 4),
            alpha_offset: read_u32(e, 8) as usize,
            effect_id: read_u32(e, 12),
          })
          .collect();
        layout.push(SubSection::Layers);
      }
      Tag::MCAL => {
        alpha_data = data;
        layout.push(SubSection::Alpha);
      }
      _ => {
        layout.push(SubSection::Raw(extra.len()));
        extra.push(RawSection { tag, data: data.to_vec() });
      }
    }
  }

  let heights = heights.ok_or(FormatError::MissingSection(Tag::MCVT))?;

  let mut layers = Vec::with_capacity(entries.len());
  for (i, entry) in entries.iter().enumerate() {
    let flags = LayerFlags::from_bits_retain(entry.flags);
    let alpha = if i > 0 && flags.contains(LayerFlags::USE_ALPHA_MAP) {
      let data = alpha_data.get(entry.alpha_offset..).unwrap_or(&[]);
      Some(if flags.contains(LayerFlags::ALPHA_COMPRESSED) {
        AlphaMap::decode_compressed(data)?
      } else if extended_alpha {
        AlphaMap::decode_extended(data)?
      } else {
        AlphaMap::decode_packed(data)?
      })
    } else {
      None
    };
    layers.push(TextureLayer {
      texture: TextureId(entry.texture),
      flags,
      effect_id: entry.effect_id,
      alpha,
    });
  }

  ensure_after(&mut layout, SubSection::Normals, SubSection::Heights);
  ensure_after(&mut layout, SubSection::Layers, SubSection::Normals);
  ensure_after(&mut layout, SubSection::Alpha, SubSection::Layers);

  let (xbase, zbase) = chunk_origin(pos, index);
  let mut chunk = Chunk {
    index,
    xbase,
    zbase,
    base_height,
    heights,
    normals: normals.unwrap_or([Vec3::Y; VERTEX_COUNT]),
    vmin: Vec3::ZERO,
    vmax: Vec3::ZERO,
    area_id: read_u32(&header, field::AREA_ID),
    flags,
    layers,
    holes,
    header,
    normal_padding,
    extra,
    layout,
  };
  chunk.recalc_bounds();
  if normals.is_none() {
    chunk.recalc_normals(|_, _| None);
  }
  Ok(chunk)
}

/// Inserts `item` right after `anchor` unless the layout already has it.
fn ensure_after(layout: &mut Vec<SubSection>, item: SubSection, anchor: SubSection) {
  if layout.contains(&item) {
    return;
  }
  let at = layout.iter().position(|s| *s == anchor).map_or(layout.len(), |i| i + 1);
  layout.insert(at, item);
}

fn quantize_normal(v: f32) -> u8 {
  (v * 127.0).round().clamp(-127.0, 127.0) as i8 as u8
}

fn encode_chunk(chunk: &Chunk, extended_alpha: bool) -> Vec<u8> {
  // Alpha maps first, so layer entries can point into them
  let mut alpha = Vec::new();
  let mut alpha_offsets = Vec::with_capacity(chunk.layers.len());
  for layer in &chunk.layers {
    match &layer.alpha {
      Some(map) => {
        alpha_offsets.push(Some(alpha.len()));
        if extended_alpha {
          alpha.extend_from_slice(&map.encode_extended());
        } else {
          alpha.extend_from_slice(&map.encode_packed());
        }
      }
      None => alpha_offsets.push(None),
    }
  }

  let mut header = chunk.header;
  let mut body = Vec::new();
  let prefix = 8 + CHUNK_HEADER_SIZE;

  for part in &chunk.layout {
    let offset = (prefix + body.len()) as u32;
      match *part {
      SubSection::Heights => {
        let mut data = Vec::with_capacity(VERTEX_COUNT * 4);
        for h in &chunk.heights {
          data.extend_from_slice(&(h - chunk.base_height).to_le_bytes());
        }
        if !chunk.flags.contains(ChunkFlags::HIGH_RES_HOLES) {
          put_u32(&mut header, field::OFS_HEIGHT, offset);
        }
        write_section(&mut body, Tag::MCVT, &data);
      }
      SubSection::Normals => {
        let mut data = Vec::with_capacity(NORMALS_SIZE + chunk.normal_padding.len());
        for n in &chunk.normals {
          data.extend_from_slice(&[quantize_normal(n.x), quantize_normal(n.z), quantize_normal(n.y)]);
        }
        data.extend_from_slice(&chunk.normal_padding);
        if !chunk.flags.contains(ChunkFlags::HIGH_RES_HOLES) {
          put_u32(&mut header, field::OFS_NORMAL, offset);
        }
        write_section(&mut body, Tag::MCNR, &data);
      }
      SubSection::Layers => {
        let mut data = Vec::with_capacity(chunk.layers.len() * LAYER_ENTRY_SIZE);
        for (layer, alpha_offset) in chunk.layers.iter().zip(&alpha_offsets) {
          let mut flags = layer.flags - LayerFlags::ALPHA_COMPRESSED;
          flags.set(LayerFlags::USE_ALPHA_MAP, alpha_offset.is_some());
          data.extend_from_slice(&layer.texture.0.to_le_bytes());
          data.extend_from_slice(&flags.bits().to_le_bytes());
          data.extend_from_slice(&(alpha_offset.unwrap_or(0) as u32).to_le_bytes());
          data.extend_from_slice(&layer.effect_id.to_le_bytes());
        }
        put_u32(&mut header, field::OFS_LAYER, offset);
        write_section(&mut body, Tag::MCLY, &data);
      }
      SubSection::Alpha => {
        put_u32(&mut header, field::OFS_ALPHA, offset);
        put_u32(&mut header, field::SIZE_ALPHA, (alpha.len() + 8) as u32);
        write_section(&mut body, Tag::MCAL, &alpha);
      }
      SubSection::Raw(i) => {
        let Some(section) = chunk.extra.get(i) else {
          continue;
        };
        if let Some((_, at)) = RAW_OFFSETS.iter().find(|(tag, _)| *tag == section.tag) {
          put_u32(&mut header, *at, offset);
        }
        section.write_to(&mut body);
      }
    }
  }

  put_u32(&mut header, field::FLAGS, chunk.flags.bits());
  put_u32(&mut header, field::INDEX_X, chunk.index.x as u32);
  put_u32(&mut header, field::INDEX_Y, chunk.index.z as u32);
  put_u32(&mut header, field::N_LAYERS, chunk.layers.len() as u32);
  put_u32(&mut header, field::AREA_ID, chunk.area_id);
  if chunk.holes.is_high_res() {
    header[field::HIGH_RES_HOLES..field::HIGH_RES_HOLES + 8].copy_from_slice(&chunk.holes.bits().to_le_bytes());
  } else {
    put_u16(&mut header, field::HOLES, chunk.holes.low_res_bits());
  }
  put_f32(&mut header, field::POSITION, chunk.xbase);
  put_f32(&mut header, field::POSITION + 4, chunk.base_height);
  put_f32(&mut header, field::POSITION + 8, chunk.zbase);

  let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + body.len());
  out.extend_from_slice(&header);
  out.extend_from_slice(&body);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::CHUNK_SIZE;
  use crate::terrain::brush::BrushType;

  fn sample_tile() -> Tile {
    let mut tile = Tile::new_flat(TilePos::new(2, 3), 10.0, Some("tileset\\grass.blp"), true);
    let rock = tile.ensure_texture("tileset\\rock.blp");
    let (x, z) = tile.chunks[17].origin();
    let chunk = &mut tile.chunks[17];
    chunk.change_terrain(x + 10.0, z + 10.0, 4.0, 15.0, BrushType::Quadratic);
    chunk.paint_texture(x + 10.0, z + 10.0, 8.0, BrushType::Linear, 1.0, 1.0, rock);
    chunk.add_hole(1, 2);
    chunk.set_area_id(42);
    tile
  }

  #[test]
  fn encoded_tile_decodes_to_same_state() {
    let tile = sample_tile();
    let bytes = encode_tile(&tile);
    let decoded = decode_tile(tile.pos, &bytes, true).unwrap();

    assert_eq!(decoded.textures, tile.textures);
    for (a, b) in tile.chunks.iter().zip(decoded.chunks.iter()) {
      assert_eq!(a.area_id, b.area_id);
      assert_eq!(a.holes, b.holes);
      assert_eq!(a.layers.len(), b.layers.len());
      for (ha, hb) in a.heights.iter().zip(b.heights.iter()) {
        assert!((ha - hb).abs() < 1e-4);
      }
      for (la, lb) in a.layers.iter().zip(b.layers.iter()) {
        assert_eq!(la.texture, lb.texture);
        if let (Some(ma), Some(mb)) = (&la.alpha, &lb.alpha) {
          for (ta, tb) in ma.texels().iter().zip(mb.texels()) {
            assert!((ta - tb).abs() <= 0.5 / 255.0 + 1e-6);
          }
        }
      }
    }
    assert_eq!(encode_tile(&decoded), bytes);
  }

  #[test]
  fn header_fields_are_written() {
    let tile = sample_tile();
    let bytes = encode_tile(&tile);
    let decoded = decode_tile(tile.pos, &bytes, true).unwrap();
    let header = &decoded.chunks[17].header;

    assert_eq!(read_u32(header, field::INDEX_X), 1);
    assert_eq!(read_u32(header, field::INDEX_Y), 1);
    assert_eq!(read_u32(header, field::N_LAYERS), 2);
    assert_eq!(read_u32(header, field::AREA_ID), 42);
    assert_eq!(read_u16(header, field::HOLES), 1 << 9);
    assert_eq!(read_f32(header, field::POSITION + 4), 10.0);
    let xbase = read_f32(header, field::POSITION);
    assert!((xbase - (2.0 * 16.0 + 1.0) * CHUNK_SIZE).abs() < 1e-3);

    // offsets point at the sub-section tags within the MCNK
    assert_eq!(read_u32(header, field::OFS_HEIGHT), (8 + CHUNK_HEADER_SIZE) as u32);
  }

  #[test]
  fn packed_alpha_is_half_size() {
    let mut tile = sample_tile();
    tile.extended_alpha = false;
    let small = encode_tile(&tile);
    tile.extended_alpha = true;
    let large = encode_tile(&tile);
    assert_eq!(large.len() - small.len(), 2048);
    assert!(decode_tile(tile.pos, &small, false).is_ok());
  }

  #[test]
  fn unknown_sections_keep_their_place() {
    let mut tile = sample_tile();
    tile.leading = vec![
      RawSection {
        tag: Tag::new(b"MHDR"),
        data: vec![1; 64],
      },
      RawSection {
        tag: Tag::new(b"MMDX"),
        data: b"model.m2\0".to_vec(),
      },
    ];
    tile.mtex_index = 1;
    tile.trailing = vec![RawSection {
      tag: Tag::new(b"MFBO"),
      data: vec![2; 36],
    }];
    tile.chunks[0].extra.push(RawSection {
      tag: Tag::new(b"MCSH"),
      data: vec![0xAA; 512],
    });
    tile.chunks[0].layout.push(SubSection::Raw(0));

    let bytes = encode_tile(&tile);
    assert_eq!(&bytes[12..16], b"RDHM");

    let decoded = decode_tile(tile.pos, &bytes, true).unwrap();
    assert_eq!(decoded.leading, tile.leading);
    assert_eq!(decoded.mtex_index, 1);
    assert_eq!(decoded.trailing, tile.trailing);
    assert_eq!(decoded.chunks[0].extra, tile.chunks[0].extra);
    assert_eq!(encode_tile(&decoded), bytes);
  }

  #[test]
  fn compressed_alpha_is_decoded() {
    let mut tile = sample_tile();
    let bytes = {
      // Rewrite chunk 0 as a two-layer chunk with a compressed alpha map
      let chunk = &mut tile.chunks[0];
      chunk.layers.push(TextureLayer::overlay(TextureId(0)));
      encode_tile(&tile)
    };
    let mut decoded = decode_tile(tile.pos, &bytes, true).unwrap();

    let mut compressed = Vec::new();
    for _ in 0..32 {
      compressed.extend_from_slice(&[0x80 | 127, 200, 0x80 | 1, 200]);
    }
    let chunk = &mut decoded.chunks[0];
    let alpha = AlphaMap::decode_compressed(&compressed).unwrap();
    assert_eq!(alpha.get(63, 63), 200.0 / 255.0);
    chunk.layers[1].alpha = Some(alpha);
    chunk.layers[1].flags |= LayerFlags::ALPHA_COMPRESSED;

    // Re-encoded uncompressed
    let bytes = encode_tile(&decoded);
    let again = decode_tile(tile.pos, &bytes, true).unwrap();
    assert!(!again.chunks[0].layers[1].flags.contains(LayerFlags::ALPHA_COMPRESSED));
    assert_eq!(again.chunks[0].layers[1].alpha.as_ref().unwrap().get(10, 10), 200.0 / 255.0);
  }

  #[test]
  fn high_res_holes_live_in_the_header() {
    let mut tile = sample_tile();
    let chunk = &mut tile.chunks[3];
    chunk.flags |= ChunkFlags::HIGH_RES_HOLES;
    chunk.holes = HoleMask::high_res(0);
    chunk.add_hole(7, 6);

    let decoded = decode_tile(tile.pos, &encode_tile(&tile), true).unwrap();
    assert!(decoded.chunks[3].holes.is_high_res());
    assert!(decoded.chunks[3].is_hole(7, 6));
    assert!(!decoded.chunks[3].is_hole(6, 7));
  }

  #[test]
  fn malformed_tiles_are_rejected() {
    let bytes = encode_tile(&sample_tile());

    // truncated
    assert!(decode_tile(TilePos::new(2, 3), &bytes[..bytes.len() - 10], true).is_err());

    // wrong chunk count: drop everything after the first chunk
    let mut reader = ByteReader::new(&bytes);
    let mut short = Vec::new();
    for _ in 0..3 {
      let section = reader.section().unwrap();
      write_section(&mut short, section.tag, section.data);
    }
    assert_eq!(
      decode_tile(TilePos::new(2, 3), &short, true).unwrap_err(),
      FormatError::ChunkCount(1)
    );

    // chunk without heights
    let mut no_heights = Vec::new();
    write_section(&mut no_heights, Tag::MVER, &version_payload());
    write_section(&mut no_heights, Tag::MTEX, b"");
    write_section(&mut no_heights, Tag::MCNK, &[0u8; CHUNK_HEADER_SIZE]);
    assert_eq!(
      decode_tile(TilePos::new(0, 0), &no_heights, true).unwrap_err(),
      FormatError::MissingSection(Tag::MCVT)
    );
  }

  #[test]
  fn texture_table_round_trip() {
    let names = vec!["a.blp".to_string(), "dir\\b.blp".to_string()];
    assert_eq!(decode_textures(&encode_textures(&names)), names);
    assert!(decode_textures(b"").is_empty());
  }
}
