//! World descriptor: which of the 64×64 tiles exist, plus global flags.
//!
//! Layout (sections must appear in this order):
//! - `MVER`: `u32` version (18)
//! - `MPHD`: `u32` flags followed by reserved words
//! - `MAIN`: 64×64 entries of `u32 flags, u32 reserved`, z outer, x inner
//!
//! Trailing sections (global object placement) are ignored.

use bitflags::bitflags;

use super::{ByteReader, FormatError, Tag, check_version, read_u32, version_payload, write_section};
use crate::coords::{GRID_SIZE, TilePos};

/// Size of one `MAIN` entry.
const MAIN_ENTRY_SIZE: usize = 8;

/// Size of the whole `MAIN` section payload.
const MAIN_SIZE: usize = (GRID_SIZE * GRID_SIZE) as usize * MAIN_ENTRY_SIZE;

/// Size of the `MPHD` payload written by [`WorldDescriptor::encode`].
const MPHD_SIZE: usize = 32;

/// `MAIN` entry flag marking a present tile.
const TILE_PRESENT: u32 = 0x1;

bitflags! {
  /// Global world flags stored in `MPHD`.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
  pub struct DescriptorFlags: u32 {
    /// The world is a single global object rather than terrain.
    const GLOBAL_OBJECT = 0x1;
    /// Alpha maps use 8 bits per texel instead of 4.
    const EXTENDED_ALPHA = 0x4;
  }
}

/// Parsed world descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldDescriptor {
  flags: DescriptorFlags,
  /// Raw `MPHD` flags, kept so unknown bits survive re-encoding.
  raw_flags: u32,
  presence: Vec<bool>,
}

impl WorldDescriptor {
  /// Creates a descriptor with no tiles.
  pub fn new(flags: DescriptorFlags) -> Self {
    Self {
      flags,
      raw_flags: flags.bits(),
      presence: vec![false; (GRID_SIZE * GRID_SIZE) as usize],
    }
  }

  /// Parses a descriptor blob.
  pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
    let mut reader = ByteReader::new(bytes);

    check_version(reader.expect_section(Tag::MVER)?)?;

    let mphd = reader.expect_section(Tag::MPHD)?;
    if mphd.data.len() < 4 {
      return Err(FormatError::BadSize {
        tag: Tag::MPHD,
        size: mphd.data.len(),
        expected: MPHD_SIZE,
      });
    }
    let raw_flags = read_u32(mphd.data, 0);

    let main = reader.expect_section(Tag::MAIN)?;
    if main.data.len() != MAIN_SIZE {
      return Err(FormatError::BadSize {
        tag: Tag::MAIN,
        size: main.data.len(),
        expected: MAIN_SIZE,
      });
    }
    let presence = main
      .data
      .chunks_exact(MAIN_ENTRY_SIZE)
      .map(|entry| read_u32(entry, 0) & TILE_PRESENT != 0)
      .collect();

    Ok(Self {
      flags: DescriptorFlags::from_bits_truncate(raw_flags),
      raw_flags,
      presence,
    })
  }

  /// Encodes the descriptor in the canonical layout.
  pub fn encode(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 * 3 + 4 + MPHD_SIZE + MAIN_SIZE);

    let mut mphd = [0u8; MPHD_SIZE];
    mphd[0..4].copy_from_slice(&self.raw_flags.to_le_bytes());

    let mut main = vec![0u8; MAIN_SIZE];
    for (i, present) in self.presence.iter().enumerate() {
      if *present {
        let at = i * MAIN_ENTRY_SIZE;
        main[at..at + 4].copy_from_slice(&TILE_PRESENT.to_le_bytes());
      }
    }

    write_section(&mut out, Tag::MVER, &version_payload());
    write_section(&mut out, Tag::MPHD, &mphd);
    write_section(&mut out, Tag::MAIN, &main);
    out
  }

  /// Marks a tile as present or absent. Out-of-grid positions are ignored.
  pub fn set_present(&mut self, pos: TilePos, present: bool) {
    if pos.in_bounds() {
      self.presence[pos.slot_index()] = present;
    }
  }

  /// Returns the global flags.
  pub fn flags(&self) -> DescriptorFlags {
    self.flags
  }

  /// Returns true if the world is a single global object.
  pub fn has_global_object(&self) -> bool {
    self.flags.contains(DescriptorFlags::GLOBAL_OBJECT)
  }

  /// Returns true if alpha maps use 8 bits per texel.
  pub fn uses_extended_alpha(&self) -> bool {
    self.flags.contains(DescriptorFlags::EXTENDED_ALPHA)
  }

  /// Returns true if the descriptor declares a tile at `pos`.
  pub fn has_tile(&self, pos: TilePos) -> bool {
    pos.in_bounds() && self.presence[pos.slot_index()]
  }

  /// Iterates declared tiles row-major (z outer, x inner).
  pub fn present_tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
    self
      .presence
      .iter()
      .enumerate()
      .filter(|(_, present)| **present)
      .map(|(i, _)| TilePos::new(i as i32 % GRID_SIZE, i as i32 / GRID_SIZE))
  }

  /// Number of declared tiles.
  pub fn tile_count(&self) -> usize {
    self.presence.iter().filter(|p| **p).count()
  }

  /// Returns true if the world has terrain that can be edited.
  pub fn is_editable(&self) -> bool {
    !self.has_global_object() && self.presence.iter().any(|p| *p)
  }
}
