//! Brush shapes and edit descriptions.

use serde::{Deserialize, Serialize};

/// Falloff shape of a brush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushType {
  /// Axis-aligned square of half-width `radius`, full strength everywhere.
  Flat,
  /// Round, strength falls off linearly with distance.
  Linear,
  /// Round, strength `1 - (d/r)²`.
  #[default]
  Quadratic,
}

impl BrushType {
  /// Strength in `[0, 1]` at offset `(dx, dz)` from the brush center.
  ///
  /// Returns `None` for points the brush does not reach.
  pub fn weight(self, dx: f32, dz: f32, radius: f32) -> Option<f32> {
    if radius <= 0.0 {
      return None;
    }
    match self {
      Self::Flat => (dx.abs() <= radius && dz.abs() <= radius).then_some(1.0),
      Self::Linear => {
        let t = (dx * dx + dz * dz).sqrt() / radius;
        (t <= 1.0).then(|| 1.0 - t)
      }
      Self::Quadratic => {
        let t2 = (dx * dx + dz * dz) / (radius * radius);
        (t2 <= 1.0).then(|| (1.0 - t2).max(0.0))
      }
    }
  }

  /// Fraction of the current height kept by flatten and blur at this offset.
  ///
  /// `1 - (1 - remain)^k` where `k` grows from 1 at the center toward the
  /// edge, so `remain == 0` always reaches the target exactly and
  /// `remain == 1` never moves anything.
  pub fn effective_remain(self, remain: f32, dx: f32, dz: f32, radius: f32) -> Option<f32> {
    let remain = remain.clamp(0.0, 1.0);
    let k = match self {
      Self::Flat => {
        self.weight(dx, dz, radius)?;
        1.0
      }
      Self::Linear => 2.0 - self.weight(dx, dz, radius)?,
      Self::Quadratic => 2.0 - self.weight(dx, dz, radius)?,
    };
    Some(1.0 - (1.0 - remain).powf(k))
  }
}

/// What a brush stroke does.
#[derive(Clone, Debug, PartialEq)]
pub enum BrushOp {
  /// Raises (or lowers, for negative `change`) the terrain.
  Raise { change: f32 },
  /// Pulls heights toward `height`, keeping `remain` of the current value.
  Flatten { height: f32, remain: f32 },
  /// Pulls heights toward their neighbourhood average.
  Blur { remain: f32 },
  /// Paints a texture, by archive path.
  Paint {
    texture: String,
    strength: f32,
    pressure: f32,
  },
  /// Punches a hole into the sub-quad under the brush center.
  AddHole,
  /// Fills the hole under the brush center.
  RemoveHole,
}

impl BrushOp {
  /// Returns true if the operation changes vertex heights.
  pub fn affects_heights(&self) -> bool {
    matches!(self, Self::Raise { .. } | Self::Flatten { .. } | Self::Blur { .. })
  }
}

/// A single brush application at a world-space point.
#[derive(Clone, Debug, PartialEq)]
pub struct BrushEdit {
  pub op: BrushOp,
  pub x: f32,
  pub z: f32,
  pub radius: f32,
  pub brush: BrushType,
}

impl BrushEdit {
  /// Creates an edit with the default (quadratic) brush.
  pub fn new(op: BrushOp, x: f32, z: f32, radius: f32) -> Self {
    Self {
      op,
      x,
      z,
      radius,
      brush: BrushType::default(),
    }
  }

  /// Sets the brush shape.
  pub fn with_brush(mut self, brush: BrushType) -> Self {
    self.brush = brush;
    self
  }

  /// Convenience constructor for a raise/lower stroke.
  pub fn raise(x: f32, z: f32, radius: f32, change: f32) -> Self {
    Self::new(BrushOp::Raise { change }, x, z, radius)
  }
}
