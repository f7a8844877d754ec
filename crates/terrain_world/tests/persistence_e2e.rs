//! End-to-end tests for saving worlds and reading them back.
//!
//! This test:
//! 1. Creates a world in a temporary directory store
//! 2. Edits heights, textures and holes, then saves
//! 3. Reopens the world from disk and verifies the edits survived
//! 4. Checks clean tiles are written back byte for byte and failed writes
//!    leave tiles dirty

use std::sync::Arc;

use tempfile::TempDir;
use terrain_world::store::tile_path;
use terrain_world::{
  BrushEdit, BrushOp, BrushType, CHUNK_SIZE, DescriptorFlags, DirStore, MemoryStore, StoreError, Tile, TilePos,
  TileStore, World, WorldConfig, WorldDescriptor, WorldError,
};

const MAP: &str = "Northrend";

fn seed(store: &dyn TileStore, tiles: &[(i32, i32)], flags: DescriptorFlags) {
  let mut desc = WorldDescriptor::new(flags);
  for &(x, z) in tiles {
    let pos = TilePos::new(x, z);
    desc.set_present(pos, true);
    let extended = flags.contains(DescriptorFlags::EXTENDED_ALPHA);
    let tile = Tile::new_flat(pos, 10.0, Some("Tileset\\Snow.blp"), extended);
    store.write_tile(MAP, x, z, &tile.serialize()).expect("Failed to write tile");
  }
  store
    .write_descriptor(MAP, &desc.encode())
    .expect("Failed to write descriptor");
}

fn paint(texture: &str, x: f32, z: f32, radius: f32) -> BrushEdit {
  BrushEdit::new(
    BrushOp::Paint {
      texture: texture.to_string(),
      strength: 1.0,
      pressure: 1.0,
    },
    x,
    z,
    radius,
  )
  .with_brush(BrushType::Flat)
}

#[test]
fn test_edits_survive_save_and_reopen() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let pos = TilePos::new(7, 9);
  let (ox, oz) = pos.world_origin();
  let (x, z) = (ox + CHUNK_SIZE * 3.5, oz + CHUNK_SIZE * 3.5);

  // 1. Create and edit
  let heights_before_save = {
    let store = Arc::new(DirStore::new(temp_dir.path()).expect("Failed to create store"));
    seed(store.as_ref(), &[(7, 9)], DescriptorFlags::EXTENDED_ALPHA);

    let mut world = World::open(store, MAP, WorldConfig::default()).expect("Failed to open world");
    world.ensure_loaded(pos, 0);

    let mut session = world.edit();
    assert!(session.apply_brush(&BrushEdit::raise(x, z, 12.0, 7.5)));
    assert!(session.apply_brush(&paint("Tileset\\Rock.blp", x, z, 6.0)));
    assert!(session.apply_brush(&BrushEdit::new(BrushOp::AddHole, ox + 1.0, oz + 1.0, 1.0)));
    assert_eq!(session.save().expect("Failed to save"), 1);

    world.tile_at(pos).expect("loaded").chunk(3, 3).expect("chunk").heights().to_vec()
  };

  // 2. Reopen from disk
  let store = Arc::new(DirStore::new(temp_dir.path()).expect("Failed to create store"));
  let mut world = World::open(store, MAP, WorldConfig::default()).expect("Failed to reopen world");
  assert!(world.descriptor().uses_extended_alpha());
  let report = world.ensure_loaded(pos, 0);
  assert_eq!(report.loaded, vec![pos]);

  // 3. Verify
  let tile = world.tile_at(pos).expect("loaded");
  assert!(!tile.is_dirty());
  assert_eq!(tile.textures().len(), 2);

  let chunk = tile.chunk(3, 3).expect("chunk");
  for (i, (&a, &b)) in heights_before_save.iter().zip(chunk.heights()).enumerate() {
    assert!((a - b).abs() < 1e-3, "vertex {i}: {a} != {b}");
  }
  assert!(chunk.vmax().y > 17.0);

  let rock = tile.texture_id("Tileset\\Rock.blp").expect("rock texture");
  assert!(chunk.has_texture(rock));
  let alpha = chunk.layers()[1].alpha.as_ref().expect("overlay alpha");
  assert_eq!(alpha.get(32, 32), 1.0);
  assert_eq!(alpha.get(0, 0), 0.0);

  assert!(tile.chunk(0, 0).expect("chunk").is_hole(0, 0));
}

#[test]
fn test_clean_tile_keeps_stored_bytes_and_unknown_sections() {
  let store = MemoryStore::new();
  seed(&store, &[(0, 0)], DescriptorFlags::empty());

  // Splice an unknown section between the texture table and the chunks
  let mut bytes = store.read_tile(MAP, 0, 0).expect("stored");
  let mtex_size = u32::from_le_bytes(bytes[16..20].try_into().expect("size")) as usize;
  let at = 20 + mtex_size;
  let mut section = b"XDMM".to_vec();
  section.extend_from_slice(&6u32.to_le_bytes());
  section.extend_from_slice(b"a.m2\0\0");
  bytes.splice(at..at, section.iter().copied());
  store.write_tile(MAP, 0, 0, &bytes).expect("write");

  // 1. Load and serialize untouched
  let mut world = World::open(Arc::new(store.clone()), MAP, WorldConfig::default()).expect("open");
  world.ensure_loaded(TilePos::new(0, 0), 0);
  let tile = world.tile_at(TilePos::new(0, 0)).expect("loaded");
  assert_eq!(tile.serialize(), bytes);

  // 2. Edit and save
  assert!(world.edit().apply_brush(&BrushEdit::raise(100.0, 100.0, 8.0, 2.0)));
  world.edit().save().expect("save");

  // 3. The unknown section is still right after the texture table
  let saved = store.read_tile(MAP, 0, 0).expect("stored");
  assert_ne!(saved, bytes);
  assert_eq!(&saved[at..at + section.len()], &section[..]);

  let reparsed = Tile::parse(TilePos::new(0, 0), &saved, false).expect("parse");
  assert_eq!(reparsed.serialize(), saved);
}

/// Store that refuses writes to one tile.
struct FlakyStore {
  inner: MemoryStore,
  broken: String,
}

impl TileStore for FlakyStore {
  fn exists(&self, path: &str) -> Result<bool, StoreError> {
    self.inner.exists(path)
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
    self.inner.read(path)
  }

  fn write(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
    if path == self.broken {
      return Err(StoreError::Other("disk full".into()));
    }
    self.inner.write(path, data)
  }
}

#[test]
fn test_failed_write_keeps_tile_dirty() {
  let inner = MemoryStore::new();
  seed(&inner, &[(0, 0), (1, 0)], DescriptorFlags::empty());
  let store = FlakyStore {
    inner: inner.clone(),
    broken: tile_path(MAP, 1, 0),
  };

  let mut world = World::open(Arc::new(store), MAP, WorldConfig::default()).expect("open");
  world.ensure_loaded(TilePos::new(0, 0), 1);
  assert!(world.edit().set_area_id(TilePos::new(0, 0), 5));
  assert!(world.edit().set_area_id(TilePos::new(1, 0), 6));

  // 1. The healthy tile is written, the broken one reported
  match world.edit().save() {
    Err(WorldError::PersistFailure(failures)) => {
      assert_eq!(failures.len(), 1);
      assert_eq!(failures[0].0, TilePos::new(1, 0));
    }
    other => panic!("expected persist failure, got {other:?}"),
  }
  assert_eq!(world.dirty_tiles(), vec![TilePos::new(1, 0)]);

  let stored = inner.read_tile(MAP, 0, 0).expect("stored");
  let tile = Tile::parse(TilePos::new(0, 0), &stored, false).expect("parse");
  assert_eq!(tile.chunk(0, 0).expect("chunk").area_id(), 5);

  // 2. Single-tile saves report the same failure
  assert!(matches!(
    world.save_tile(TilePos::new(1, 0)),
    Err(WorldError::PersistFailure(_))
  ));
  assert!(world.tile_at(TilePos::new(1, 0)).expect("loaded").is_dirty());
}

#[test]
fn test_config_file_drives_streaming() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let config_path = temp_dir.path().join("world.toml");
  std::fs::write(&config_path, "load_radius = 0\n").expect("Failed to write config");
  let config = WorldConfig::load(&config_path).expect("Failed to load config");

  let store = MemoryStore::new();
  seed(&store, &[(4, 4), (5, 4)], DescriptorFlags::empty());
  let mut world = World::open(Arc::new(store), MAP, config).expect("open");

  let mut ctx = terrain_world::EditContext::default();
  world.enter_tile(TilePos::new(4, 4), &mut ctx).expect("enter");
  assert_eq!(world.grid().loaded_count(), 1);
  assert_eq!(world.config().resident_tile_limit, 25);
}
