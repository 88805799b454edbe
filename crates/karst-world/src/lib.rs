//! World context: terrain configuration, the 3D density-noise sampler, and
//! the height-map collaborator seam.
#![forbid(unsafe_code)]

pub mod config;
pub mod heightmap;
pub mod noise;

pub use config::{NoiseParams, TerrainConfig, TerrainParams, load_params_from_path};
pub use heightmap::{ConstantHeight, HeightMapRaster, HeightSampler};
pub use noise::{NoiseField, NoiseVolume};

/// Horizontal chunk stride in world units; chunk positions are multiples of it.
pub const CHUNK_WIDTH: usize = 16;
/// Vertical extent of every chunk.
pub const CHUNK_HEIGHT: usize = 64;

/// World-space position of a chunk: `(x, 0, z)` with `x` and `z` aligned to
/// [`CHUNK_WIDTH`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk-grid coordinates `(cx, cz)` scaled up to world units.
    #[inline]
    pub const fn from_chunk_coords(cx: i32, cz: i32) -> Self {
        Self {
            x: cx * CHUNK_WIDTH as i32,
            z: cz * CHUNK_WIDTH as i32,
        }
    }

    /// The chunk containing an arbitrary world-space point. Uses euclidean
    /// division so negative coordinates land in the correct chunk instead of
    /// snapping toward zero.
    #[inline]
    pub fn containing(wx: i32, wz: i32) -> Self {
        let w = CHUNK_WIDTH as i32;
        Self {
            x: wx.div_euclid(w) * w,
            z: wz.div_euclid(w) * w,
        }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }
}

/// Shared, immutable world context handed to generation workers.
pub struct World {
    pub params: TerrainParams,
    height: Box<dyn HeightSampler + Send + Sync>,
}

impl World {
    pub fn new(params: TerrainParams, height: Box<dyn HeightSampler + Send + Sync>) -> Self {
        Self { params, height }
    }

    /// Fresh noise sampler for one chunk's density volume. Construction is
    /// cheap relative to the volume traversal, so workers build one per job.
    pub fn noise_field(&self) -> NoiseField {
        NoiseField::new(self.params.seed, &self.params.noise)
    }

    /// Base terrain height bias from the biome/height-map collaborator.
    #[inline]
    pub fn base_height(&self, wx: i32, wz: i32) -> f32 {
        self.height.base_height(wx, wz)
    }
}
