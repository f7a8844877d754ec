//! Per-chunk hole masks.
//!
//! A chunk is split into 4×4 sub-quads in low resolution mode, bit
//! `sub_z * 4 + sub_x` of a `u16`, or into 8×8 sub-quads in high
//! resolution mode, bit `sub_z * 8 + sub_x` of a `u64`.

/// Bitmask of holes punched into a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HoleMask {
  bits: u64,
  high_res: bool,
}

impl HoleMask {
  /// Low resolution mask from the `u16` header field.
  pub fn low_res(bits: u16) -> Self {
    Self {
      bits: bits as u64,
      high_res: false,
    }
  }

  /// High resolution mask from its 8 raw bytes.
  pub fn high_res(bits: u64) -> Self {
    Self {
      bits,
      high_res: true,
    }
  }

  /// Sub-quads per chunk edge: 4 or 8.
  pub fn resolution(&self) -> usize {
    if self.high_res { 8 } else { 4 }
  }

  pub fn is_high_res(&self) -> bool {
    self.high_res
  }

  pub fn bits(&self) -> u64 {
    self.bits
  }

  /// Returns true if no hole is set.
  pub fn is_empty(&self) -> bool {
    self.bits == 0
  }

  fn bit(&self, sub_x: usize, sub_z: usize) -> Option<u64> {
    let res = self.resolution();
    (sub_x < res && sub_z < res).then(|| 1u64 << (sub_z * res + sub_x))
  }

  /// Returns true if the sub-quad is a hole. Out-of-range sub-quads are
  /// never holes.
  pub fn get(&self, sub_x: usize, sub_z: usize) -> bool {
    self.bit(sub_x, sub_z).is_some_and(|b| self.bits & b != 0)
  }

  /// Sets or clears one sub-quad. Returns true if the mask changed.
  pub fn set(&mut self, sub_x: usize, sub_z: usize, hole: bool) -> bool {
    let Some(bit) = self.bit(sub_x, sub_z) else {
      return false;
    };
    let old = self.bits;
    if hole {
      self.bits |= bit;
    } else {
      self.bits &= !bit;
    }
    old != self.bits
  }

  /// Low resolution header value. Only meaningful when not high-res.
  pub(crate) fn low_res_bits(&self) -> u16 {
    self.bits as u16
  }
}
