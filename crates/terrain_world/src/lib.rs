//! Terrain World - tile streaming and terrain editing for 64×64 tiled
//! height-field worlds.
//!
//! A world is described by a descriptor blob listing which of its 64×64
//! tiles exist. Tiles are loaded on demand around the viewer from a
//! [`TileStore`], edited in memory with brushes and tile tools, and written
//! back when saved.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use terrain_world::{BrushEdit, DirStore, TilePos, World, WorldConfig};
//!
//! let store = Arc::new(DirStore::new("archive")?);
//! let mut world = World::open(store, "Azeroth", WorldConfig::default())?;
//! world.ensure_loaded(TilePos::new(32, 48), 1);
//!
//! let mut session = world.edit();
//! session.apply_brush(&BrushEdit::raise(17_200.0, 25_800.0, 20.0, 5.0));
//! session.save()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod coords;
pub mod error;
pub mod format;
pub mod store;
pub mod terrain;
pub mod world;

pub use config::{ConfigError, WorldConfig};
pub use coords::{CHUNK_SIZE, ChunkIndex, GRID_SIZE, TILE_SIZE, TilePos, TileRange, UNIT_SIZE};
pub use error::WorldError;
pub use format::FormatError;
pub use format::descriptor::{DescriptorFlags, WorldDescriptor};
#[cfg(feature = "native")]
pub use store::{DirStore, default_store_dir};
pub use store::{MemoryStore, StoreError, TileStore};
pub use terrain::{
  AlphaMap, BrushEdit, BrushOp, BrushType, Chunk, ChunkFlags, HoleMask, MAX_LAYERS, TextureId, TextureLayer, Tile,
};
pub use world::{ChunkGrid, EditContext, EditSession, EvictReport, LoadReport, Selection, World};
