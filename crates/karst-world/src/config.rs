use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::CHUNK_HEIGHT;

#[derive(Clone, Debug, Deserialize)]
pub struct TerrainConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    /// Max height of the terrain's hills, before the base-height bias.
    #[serde(default = "default_terrain_height")]
    pub terrain_height: f32,
    /// View distance in world units; chunks further out are hidden.
    #[serde(default = "default_view_distance")]
    pub view_distance: f32,
    #[serde(default)]
    pub noise: Noise,
    #[serde(default)]
    pub caves: Caves,
    #[serde(default)]
    pub water: Water,
    #[serde(default)]
    pub threading: Threading,
    #[serde(default)]
    pub streaming: Streaming,
    #[serde(default)]
    pub height_map: HeightMap,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            terrain_height: default_terrain_height(),
            view_distance: default_view_distance(),
            noise: Noise::default(),
            caves: Caves::default(),
            water: Water::default(),
            threading: Threading::default(),
            streaming: Streaming::default(),
            height_map: HeightMap::default(),
        }
    }
}

fn default_seed() -> i32 {
    10
}
fn default_terrain_height() -> f32 {
    20.0
}
fn default_view_distance() -> f32 {
    50.0
}

#[derive(Clone, Debug, Deserialize)]
pub struct Noise {
    /// Larger values smooth the terrain. Clamped to a small positive
    /// minimum at sampling time.
    #[serde(default = "default_noise_scale")]
    pub scale: f32,
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default = "default_persistence")]
    pub persistence: f32,
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,
}
fn default_noise_scale() -> f32 {
    100.0
}
fn default_octaves() -> u32 {
    3
}
fn default_persistence() -> f32 {
    0.581
}
fn default_lacunarity() -> f32 {
    2.74
}
impl Default for Noise {
    fn default() -> Self {
        Self {
            scale: default_noise_scale(),
            octaves: default_octaves(),
            persistence: default_persistence(),
            lacunarity: default_lacunarity(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Caves {
    #[serde(default)]
    pub enable: bool,
    /// Depth of the carve below ground. Small values leave headroom-sized
    /// pockets, large values cut deep shafts.
    #[serde(default = "default_cave_depth")]
    pub depth: f32,
    /// Governs how much of the noise survives the carve threshold; low
    /// values produce rocky outcrops, higher values longer tunnels.
    #[serde(default = "default_burrow")]
    pub burrow_intensity: i32,
    /// Flip the carve into raised rocky areas instead of tunnels.
    #[serde(default)]
    pub reverse: bool,
}
fn default_cave_depth() -> f32 {
    8.0
}
fn default_burrow() -> i32 {
    5
}
impl Default for Caves {
    fn default() -> Self {
        Self {
            enable: false,
            depth: default_cave_depth(),
            burrow_intensity: default_burrow(),
            reverse: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Water {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_water_level")]
    pub level: usize,
}
fn default_water_level() -> usize {
    25
}
impl Default for Water {
    fn default() -> Self {
        Self {
            enable: false,
            level: default_water_level(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Threading {
    #[serde(default = "default_threading_enable")]
    pub enable: bool,
    /// Worker count override; defaults to available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
}
fn default_threading_enable() -> bool {
    true
}
impl Default for Threading {
    fn default() -> Self {
        Self {
            enable: true,
            workers: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Streaming {
    /// Ticks to wait between chunk-creation bursts, giving in-flight jobs
    /// time to finish before more are queued.
    #[serde(default = "default_creation_delay")]
    pub creation_tick_delay: u32,
    /// Starting viewer position in world units.
    #[serde(default = "default_start_coord")]
    pub start_x: i32,
    #[serde(default = "default_start_coord")]
    pub start_z: i32,
}
fn default_creation_delay() -> u32 {
    2
}
fn default_start_coord() -> i32 {
    256
}
impl Default for Streaming {
    fn default() -> Self {
        Self {
            creation_tick_delay: default_creation_delay(),
            start_x: default_start_coord(),
            start_z: default_start_coord(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct HeightMap {
    #[serde(default = "default_raster_size")]
    pub size: usize,
    #[serde(default = "default_raster_frequency")]
    pub frequency: f32,
    /// Height span the raster's `[0,1]` samples are scaled into.
    #[serde(default = "default_raster_amplitude")]
    pub amplitude: f32,
}
fn default_raster_size() -> usize {
    512
}
fn default_raster_frequency() -> f32 {
    0.004
}
fn default_raster_amplitude() -> f32 {
    12.0
}
impl Default for HeightMap {
    fn default() -> Self {
        Self {
            size: default_raster_size(),
            frequency: default_raster_frequency(),
            amplitude: default_raster_amplitude(),
        }
    }
}

/// Noise-layering parameters as consumed by the sampler's hot loop.
#[derive(Clone, Copy, Debug)]
pub struct NoiseParams {
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
}

/// Flattened snapshot of [`TerrainConfig`] used in tight loops.
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: i32,
    pub terrain_height: f32,
    pub view_distance: f32,
    pub noise: NoiseParams,
    pub caves_enable: bool,
    pub cave_depth: f32,
    pub burrow_intensity: i32,
    pub reverse_caves: bool,
    pub water_enable: bool,
    pub water_level: usize,
    pub threading_enable: bool,
    pub workers: Option<usize>,
    pub creation_tick_delay: u32,
    pub start_x: i32,
    pub start_z: i32,
    pub raster_size: usize,
    pub raster_frequency: f32,
    pub raster_amplitude: f32,
}

impl TerrainParams {
    pub fn from_config(cfg: &TerrainConfig) -> Self {
        Self {
            seed: cfg.seed,
            terrain_height: cfg.terrain_height,
            view_distance: cfg.view_distance.max(0.0),
            noise: NoiseParams {
                scale: cfg.noise.scale,
                octaves: cfg.noise.octaves.max(1),
                persistence: cfg.noise.persistence,
                lacunarity: cfg.noise.lacunarity,
            },
            caves_enable: cfg.caves.enable,
            cave_depth: cfg.caves.depth,
            burrow_intensity: cfg.caves.burrow_intensity,
            reverse_caves: cfg.caves.reverse,
            water_enable: cfg.water.enable,
            // The water plane scan indexes the grid directly, so the level
            // must stay inside the populated range.
            water_level: cfg.water.level.min(CHUNK_HEIGHT),
            threading_enable: cfg.threading.enable,
            workers: cfg.threading.workers,
            creation_tick_delay: cfg.streaming.creation_tick_delay,
            start_x: cfg.streaming.start_x,
            start_z: cfg.streaming.start_z,
            raster_size: cfg.height_map.size.max(1),
            raster_frequency: cfg.height_map.frequency,
            raster_amplitude: cfg.height_map.amplitude,
        }
    }
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self::from_config(&TerrainConfig::default())
    }
}

pub fn load_params_from_path(path: &Path) -> Result<TerrainParams, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: TerrainConfig = toml::from_str(&s)?;
    Ok(TerrainParams::from_config(&cfg))
}
