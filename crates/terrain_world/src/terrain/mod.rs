//! Terrain data model and edit operations.
//!
//! - [`Tile`]: 16×16 chunks plus the texture table, tracks its dirty state
//! - [`Chunk`]: heights, normals, texture layers and holes of one chunk
//! - [`BrushType`], [`BrushEdit`]: how an edit is shaped and what it does

pub mod brush;
pub mod chunk;
pub mod holes;
pub mod layers;
pub mod tile;

pub use brush::{BrushEdit, BrushOp, BrushType};
pub use chunk::{Chunk, ChunkFlags};
pub use holes::HoleMask;
pub use layers::{AlphaMap, LayerFlags, MAX_LAYERS, TextureId, TextureLayer};
pub use tile::Tile;
