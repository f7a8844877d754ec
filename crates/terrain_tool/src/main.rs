//! Command line editor for terrain archives.
//!
//! Opens a world from a directory store, applies one edit and saves.
//! Set `RUST_LOG=debug` to see per-tile streaming and save activity.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use terrain_world::{
  BrushEdit, BrushOp, BrushType, DescriptorFlags, DirStore, TILE_SIZE, Tile, TilePos, TileStore, World,
  WorldConfig, WorldDescriptor, default_store_dir,
};

#[derive(Parser)]
#[command(name = "terrain", version, about = "Edit terrain tiles in an archive directory")]
struct Cli {
  /// Archive root directory
  #[arg(long, global = true)]
  root: Option<PathBuf>,
  /// World config file (TOML)
  #[arg(long, global = true)]
  config: Option<PathBuf>,
  /// Map name
  #[arg(long, short, global = true, default_value = "Azeroth")]
  map: String,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print descriptor flags and declared tiles
  Info,
  /// Create a world of flat tiles
  New {
    /// Tiles to declare, as `x,z`
    #[arg(required = true, value_parser = parse_tile)]
    tiles: Vec<TilePos>,
    /// Height of every vertex
    #[arg(long, default_value_t = 0.0)]
    height: f32,
    /// Base texture of every chunk
    #[arg(long)]
    texture: Option<String>,
    /// Store alpha maps at 8 bits per texel
    #[arg(long)]
    extended_alpha: bool,
  },
  /// Raise (or lower, with a negative change) terrain
  Raise {
    #[command(flatten)]
    at: Stroke,
    #[arg(long, allow_hyphen_values = true)]
    change: f32,
  },
  /// Pull terrain toward a height
  Flatten {
    #[command(flatten)]
    at: Stroke,
    #[arg(long, allow_hyphen_values = true)]
    height: f32,
    /// Fraction of the current height kept at the center
    #[arg(long, default_value_t = 0.0)]
    remain: f32,
  },
  /// Smooth terrain toward its neighbourhood average
  Blur {
    #[command(flatten)]
    at: Stroke,
    #[arg(long, default_value_t = 0.5)]
    remain: f32,
  },
  /// Paint a texture
  Paint {
    #[command(flatten)]
    at: Stroke,
    /// Texture archive path
    #[arg(long)]
    texture: String,
    #[arg(long, default_value_t = 1.0)]
    strength: f32,
  },
  /// Punch or fill a hole
  Hole {
    #[command(flatten)]
    at: Stroke,
    /// Fill the hole instead
    #[arg(long)]
    remove: bool,
  },
}

/// Where a brush lands.
#[derive(Args)]
struct Stroke {
  #[arg(long, allow_hyphen_values = true)]
  x: f32,
  #[arg(long, allow_hyphen_values = true)]
  z: f32,
  #[arg(long, default_value_t = 10.0)]
  radius: f32,
  #[arg(long, value_enum, default_value_t = BrushArg::Quadratic)]
  brush: BrushArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum BrushArg {
  Flat,
  Linear,
  Quadratic,
}

impl From<BrushArg> for BrushType {
  fn from(arg: BrushArg) -> Self {
    match arg {
      BrushArg::Flat => BrushType::Flat,
      BrushArg::Linear => BrushType::Linear,
      BrushArg::Quadratic => BrushType::Quadratic,
    }
  }
}

fn parse_tile(s: &str) -> Result<TilePos, String> {
  let (x, z) = s.split_once(',').ok_or_else(|| format!("expected `x,z`, got `{s}`"))?;
  let x: i32 = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
  let z: i32 = z.trim().parse().map_err(|e| format!("bad z in `{s}`: {e}"))?;
  let pos = TilePos::new(x, z);
  if !pos.in_bounds() {
    return Err(format!("tile {pos} outside the 64x64 grid"));
  }
  Ok(pos)
}

fn main() -> Result<(), Box<dyn Error>> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let cli = Cli::parse();

  let root = cli.root.unwrap_or_else(|| default_store_dir("terrain_tool"));
  let config = match &cli.config {
    Some(path) => WorldConfig::load(path)?,
    None => WorldConfig::default(),
  };
  let store = Arc::new(DirStore::new(&root)?);

  match cli.command {
    Command::Info => info_command(store, &cli.map, config),
    Command::New {
      tiles,
      height,
      texture,
      extended_alpha,
    } => new_command(store.as_ref(), &cli.map, &tiles, height, texture.as_deref(), extended_alpha),
    Command::Raise { at, change } => apply_stroke(store, &cli.map, config, &at, BrushOp::Raise { change }),
    Command::Flatten { at, height, remain } => {
      apply_stroke(store, &cli.map, config, &at, BrushOp::Flatten { height, remain })
    }
    Command::Blur { at, remain } => apply_stroke(store, &cli.map, config, &at, BrushOp::Blur { remain }),
    Command::Paint { at, texture, strength } => apply_stroke(
      store,
      &cli.map,
      config,
      &at,
      BrushOp::Paint {
        texture,
        strength,
        pressure: 1.0,
      },
    ),
    Command::Hole { at, remove } => {
      let op = if remove {
        BrushOp::RemoveHole
      } else {
        BrushOp::AddHole
      };
      apply_stroke(store, &cli.map, config, &at, op)
    }
  }
}

fn info_command(store: Arc<DirStore>, map: &str, config: WorldConfig) -> Result<(), Box<dyn Error>> {
  let world = World::open(store.clone(), map, config)?;
  let desc = world.descriptor();
  println!("map:            {}", world.name());
  println!("flags:          {:?}", desc.flags());
  println!("editable:       {}", world.is_editable());
  println!("tiles:          {}", desc.tile_count());
  for pos in desc.present_tiles() {
    if store.tile_exists(map, pos.x, pos.z)? {
      println!("  {pos}");
    } else {
      println!("  {pos} (missing)");
    }
  }
  Ok(())
}

fn new_command(
  store: &dyn TileStore,
  map: &str,
  tiles: &[TilePos],
  height: f32,
  texture: Option<&str>,
  extended_alpha: bool,
) -> Result<(), Box<dyn Error>> {
  let mut flags = DescriptorFlags::empty();
  flags.set(DescriptorFlags::EXTENDED_ALPHA, extended_alpha);
  let mut desc = WorldDescriptor::new(flags);

  for &pos in tiles {
    desc.set_present(pos, true);
    let tile = Tile::new_flat(pos, height, texture, extended_alpha);
    store.write_tile(map, pos.x, pos.z, &tile.serialize())?;
  }
  store.write_descriptor(map, &desc.encode())?;
  info!("Created world {} with {} tiles", map, desc.tile_count());
  Ok(())
}

fn apply_stroke(
  store: Arc<DirStore>,
  map: &str,
  config: WorldConfig,
  at: &Stroke,
  op: BrushOp,
) -> Result<(), Box<dyn Error>> {
  let mut world = World::open(store, map, config)?;
  if !world.is_editable() {
    return Err(format!("world {map} has no editable terrain").into());
  }

  // Cover every tile the brush square can reach
  let center = TilePos::from_world(at.x, at.z);
  let reach = (at.radius / TILE_SIZE).ceil() as u32 + world.config().load_radius;
  let report = world.ensure_loaded(center, reach);
  for (pos, e) in &report.failed {
    warn!("Skipping tile {}: {}", pos, e);
  }

  let edit = BrushEdit::new(op, at.x, at.z, at.radius).with_brush(at.brush.into());
  let mut session = world.edit();
  if !session.apply_brush(&edit) {
    info!("Nothing changed at ({}, {})", at.x, at.z);
    return Ok(());
  }
  let saved = session.save()?;
  println!("saved {saved} tile(s)");
  Ok(())
}
