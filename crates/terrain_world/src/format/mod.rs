//! Binary formats of the game archive.
//!
//! Both the world descriptor and terrain tiles are tagged-section
//! containers: every section is a 4-byte tag followed by a `u32` payload
//! size, all little-endian. Tags are four-character codes stored as a
//! little-endian `u32`, so `MVER` appears on disk as `REVM`.
//!
//! - [`descriptor`]: world descriptor (`MVER`, `MPHD`, `MAIN`)
//! - [`tile`]: terrain tile (`MVER`, `MTEX`, 256 × `MCNK`)

pub mod descriptor;
pub mod tile;

use std::fmt;

/// Format version written into every `MVER` section.
pub const FORMAT_VERSION: u32 = 18;

/// Four-character section tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u32);

impl Tag {
  pub const MVER: Tag = Tag::new(b"MVER");
  pub const MPHD: Tag = Tag::new(b"MPHD");
  pub const MAIN: Tag = Tag::new(b"MAIN");
  pub const MTEX: Tag = Tag::new(b"MTEX");
  pub const MCNK: Tag = Tag::new(b"MCNK");
  pub const MCVT: Tag = Tag::new(b"MCVT");
  pub const MCNR: Tag = Tag::new(b"MCNR");
  pub const MCLY: Tag = Tag::new(b"MCLY");
  pub const MCAL: Tag = Tag::new(b"MCAL");

  /// Builds a tag from its readable name.
  pub const fn new(name: &[u8; 4]) -> Self {
    Self(u32::from_be_bytes(*name))
  }

  /// Returns the readable name.
  pub fn name(self) -> [u8; 4] {
    self.0.to_be_bytes()
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in self.name() {
      let c = if b.is_ascii_graphic() { b as char } else { '?' };
      write!(f, "{c}")?;
    }
    Ok(())
  }
}

impl fmt::Debug for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Tag({self})")
  }
}

/// Decode errors shared by all formats.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
  /// Input ended before a field or section was complete.
  UnexpectedEof {
    context: &'static str,
    needed: usize,
    remaining: usize,
  },
  /// A section appeared where another one was required.
  UnexpectedTag { expected: Tag, found: Tag },
  /// A required section never appeared.
  MissingSection(Tag),
  /// A section has an impossible payload size.
  BadSize { tag: Tag, size: usize, expected: usize },
  /// The `MVER` section carries an unknown version.
  UnsupportedVersion(u32),
  /// A tile does not hold exactly 256 chunks.
  ChunkCount(usize),
  /// Any other structural problem.
  Invalid(&'static str),
}

impl fmt::Display for FormatError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::UnexpectedEof {
        context,
        needed,
        remaining,
      } => write!(
        f,
        "unexpected end of data reading {context}: needed {needed} bytes, {remaining} left"
      ),
      Self::UnexpectedTag { expected, found } => {
        write!(f, "expected section {expected}, found {found}")
      }
      Self::MissingSection(tag) => write!(f, "missing section {tag}"),
      Self::BadSize {
        tag,
        size,
        expected,
      } => write!(f, "section {tag} has size {size}, expected {expected}"),
      Self::UnsupportedVersion(v) => write!(f, "unsupported version: {v}"),
      Self::ChunkCount(n) => write!(f, "tile holds {n} chunks, expected 256"),
      Self::Invalid(msg) => write!(f, "{msg}"),
    }
  }
}

impl std::error::Error for FormatError {}

/// One tagged section borrowed from the input.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Section<'a> {
  pub tag: Tag,
  pub data: &'a [u8],
}

/// Section kept verbatim because this crate does not interpret it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSection {
  pub tag: Tag,
  pub data: Vec<u8>,
}

impl RawSection {
  pub(crate) fn from_section(section: Section<'_>) -> Self {
    Self {
      tag: section.tag,
      data: section.data.to_vec(),
    }
  }

  /// Appends the section with its tag and size prefix.
  pub fn write_to(&self, out: &mut Vec<u8>) {
    write_section(out, self.tag, &self.data);
  }

  /// Size on disk including the 8-byte prefix.
  pub fn encoded_len(&self) -> usize {
    8 + self.data.len()
  }
}

/// Little-endian cursor over a byte slice.
pub(crate) struct ByteReader<'a> {
  data: &'a [u8],
  pos: usize,
}

impl<'a> ByteReader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { data, pos: 0 }
  }

  pub fn remaining(&self) -> usize {
    self.data.len() - self.pos
  }

  pub fn is_empty(&self) -> bool {
    self.remaining() == 0
  }

  pub fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], FormatError> {
    if len > self.remaining() {
      return Err(FormatError::UnexpectedEof {
        context,
        needed: len,
        remaining: self.remaining(),
      });
    }
    let slice = &self.data[self.pos..self.pos + len];
    self.pos += len;
    Ok(slice)
  }

  pub fn u32(&mut self, context: &'static str) -> Result<u32, FormatError> {
    let b = self.take(4, context)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
  }

  /// Reads the next tagged section.
  pub fn section(&mut self) -> Result<Section<'a>, FormatError> {
    let tag = Tag(self.u32("section tag")?);
    let size = self.u32("section size")? as usize;
    let data = self.take(size, "section payload")?;
    Ok(Section { tag, data })
  }

  /// Reads the next section and requires it to carry `tag`.
  pub fn expect_section(&mut self, tag: Tag) -> Result<Section<'a>, FormatError> {
    if self.is_empty() {
      return Err(FormatError::MissingSection(tag));
    }
    let section = self.section()?;
    if section.tag != tag {
      return Err(FormatError::UnexpectedTag {
        expected: tag,
        found: section.tag,
      });
    }
    Ok(section)
  }
}

pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
  u16::from_le_bytes([data[at], data[at + 1]])
}

pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
  u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub(crate) fn read_f32(data: &[u8], at: usize) -> f32 {
  f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub(crate) fn put_u32(buf: &mut [u8], at: usize, value: u32) {
  buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u16(buf: &mut [u8], at: usize, value: u16) {
  buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_f32(buf: &mut [u8], at: usize, value: f32) {
  buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Appends a tagged section.
pub(crate) fn write_section(out: &mut Vec<u8>, tag: Tag, payload: &[u8]) {
  out.extend_from_slice(&tag.0.to_le_bytes());
  out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
  out.extend_from_slice(payload);
}

/// Payload of an `MVER` section.
pub(crate) fn version_payload() -> [u8; 4] {
  FORMAT_VERSION.to_le_bytes()
}

/// Validates an `MVER` section.
pub(crate) fn check_version(section: Section<'_>) -> Result<(), FormatError> {
  if section.data.len() != 4 {
    return Err(FormatError::BadSize {
      tag: Tag::MVER,
      size: section.data.len(),
      expected: 4,
    });
  }
  let version = read_u32(section.data, 0);
  if version != FORMAT_VERSION {
    return Err(FormatError::UnsupportedVersion(version));
  }
  Ok(())
}
