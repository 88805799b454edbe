//! Chunk state: the signed-density grid, terrain population, edits, and the
//! water/floor collaborator flags.
#![forbid(unsafe_code)]

use karst_geom::TerrainMesh;
use karst_world::{CHUNK_HEIGHT, CHUNK_WIDTH, ChunkPos, World};

/// Grid side length in samples. Density samples sit at cube corners, so the
/// grid is one wider than the chunk on each horizontal axis.
pub const GRID_WIDTH: usize = CHUNK_WIDTH + 1;
/// Grid height in samples.
pub const GRID_HEIGHT: usize = CHUNK_HEIGHT + 1;

/// Signed-density samples for one chunk. Negative or zero is inside the
/// terrain, positive is open air; the mesher interpolates the zero crossing.
#[derive(Clone, Debug)]
pub struct DensityGrid {
    pub sx: usize,
    pub sy: usize,
    data: Vec<f32>,
}

impl DensityGrid {
    pub fn new() -> Self {
        Self {
            sx: GRID_WIDTH,
            sy: GRID_HEIGHT,
            data: vec![0.0; GRID_WIDTH * GRID_WIDTH * GRID_HEIGHT],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sx + z) * self.sx + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.idx(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, v: f32) {
        let i = self.idx(x, y, z);
        self.data[i] = v;
    }

    /// Write with every axis clamped into the grid independently, so an edit
    /// that lands outside one border still affects the nearest in-bounds
    /// sample instead of being dropped or smeared onto another axis.
    pub fn set_clamped(&mut self, x: i32, y: i32, z: i32, v: f32) {
        let x = x.clamp(0, (self.sx - 1) as i32) as usize;
        let y = y.clamp(0, (self.sy - 1) as i32) as usize;
        let z = z.clamp(0, (self.sx - 1) as i32) as usize;
        self.set(x, y, z, v);
    }

    /// True if any sample on the horizontal plane at `y` is open air.
    pub fn any_air_at_plane(&self, y: usize) -> bool {
        for z in 0..self.sx {
            for x in 0..self.sx {
                if self.get(x, y, z) > 0.0 {
                    return true;
                }
            }
        }
        false
    }
}

impl Default for DensityGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// The eight horizontal neighbours of a chunk, used when an edit lands on or
/// near a border and the adjacent grids must be touched too.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Neighbor {
    pub const ALL: [Neighbor; 8] = [
        Neighbor::North,
        Neighbor::NorthEast,
        Neighbor::East,
        Neighbor::SouthEast,
        Neighbor::South,
        Neighbor::SouthWest,
        Neighbor::West,
        Neighbor::NorthWest,
    ];

    /// World-space offset to the neighbouring chunk's position.
    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        let w = CHUNK_WIDTH as i32;
        match self {
            Neighbor::North => (0, w),
            Neighbor::NorthEast => (w, w),
            Neighbor::East => (w, 0),
            Neighbor::SouthEast => (w, -w),
            Neighbor::South => (0, -w),
            Neighbor::SouthWest => (-w, -w),
            Neighbor::West => (-w, 0),
            Neighbor::NorthWest => (-w, w),
        }
    }
}

/// One terrain chunk: its position, density grid, per-column base heights,
/// collaborator flags, and the mesh last built for it.
///
/// Chunks are created once and retained for the life of the store; falling
/// out of view only toggles `visible`.
pub struct Chunk {
    pub pos: ChunkPos,
    pub grid: DensityGrid,
    base_height: Vec<f32>,
    pub needs_water_tile: bool,
    pub needs_floor_tile: bool,
    pub visible: bool,
    pub mesh: Option<TerrainMesh>,
}

impl Chunk {
    /// Create an unpopulated chunk. Base heights are baked here, once, from
    /// the world's height-map collaborator.
    pub fn new(pos: ChunkPos, world: &World) -> Self {
        let mut base_height = vec![0.0_f32; GRID_WIDTH * GRID_WIDTH];
        for z in 0..GRID_WIDTH {
            for x in 0..GRID_WIDTH {
                base_height[z * GRID_WIDTH + x] =
                    world.base_height(pos.x + x as i32, pos.z + z as i32);
            }
        }
        Self {
            pos,
            grid: DensityGrid::new(),
            base_height,
            needs_water_tile: false,
            needs_floor_tile: false,
            visible: true,
            mesh: None,
        }
    }

    #[inline]
    pub fn base_height_at(&self, x: usize, z: usize) -> f32 {
        self.base_height[z * GRID_WIDTH + x]
    }

    #[inline]
    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Positions of the eight surrounding chunks.
    pub fn neighbours(&self) -> [ChunkPos; 8] {
        let mut out = [self.pos; 8];
        for (slot, n) in out.iter_mut().zip(Neighbor::ALL) {
            let (dx, dz) = n.offset();
            *slot = self.pos.offset(dx, dz);
        }
        out
    }

    #[inline]
    pub fn neighbour(&self, n: Neighbor) -> ChunkPos {
        let (dx, dz) = n.offset();
        self.pos.offset(dx, dz)
    }

    /// Fill the density grid from layered noise plus the base-height bias,
    /// carving caves if enabled, then refresh the water/floor flags.
    pub fn populate(&mut self, world: &World) {
        let p = &world.params;
        let volume = world.noise_field().generate(GRID_WIDTH, GRID_HEIGHT, self.pos);

        self.needs_water_tile = false;
        self.needs_floor_tile = false;

        for x in 0..GRID_WIDTH {
            for y in 0..GRID_HEIGHT {
                for z in 0..GRID_WIDTH {
                    let noise = volume.get(x, y, z);
                    // The noise sample in [0,1] scaled into a hill height,
                    // biased by the column's base height. Positive is air.
                    let hill = p.terrain_height * (noise + noise) / 2.0 * 1.25;
                    let base = self.base_height_at(x, z);
                    let mut d = y as f32 - hill - base;

                    if p.caves_enable {
                        let cave = cave_density(&volume, x, y, z, p.terrain_height, p);
                        if p.reverse_caves {
                            d -= cave;
                        } else {
                            d += cave;
                        }
                    }

                    self.grid.set(x, y, z, d);
                }
            }
        }

        if p.water_enable && self.grid.any_air_at_plane(p.water_level) {
            self.needs_water_tile = true;
        }
        // Carving can open the bottom of the world; the floor collaborator
        // covers the hole. Raised-rock mode never pierces the floor.
        if p.caves_enable && !p.reverse_caves && self.grid.any_air_at_plane(0) {
            self.needs_floor_tile = true;
        }
    }

    /// Mark a world-space sample as inside the terrain, raising ground.
    /// Out-of-chunk coordinates clamp to the nearest border sample.
    pub fn place_terrain(&mut self, wx: i32, wy: i32, wz: i32) {
        self.grid
            .set_clamped(wx - self.pos.x, wy, wz - self.pos.z, 0.0);
    }

    /// Mark a world-space sample as open air, lowering ground.
    pub fn remove_terrain(&mut self, wx: i32, wy: i32, wz: i32) {
        self.grid
            .set_clamped(wx - self.pos.x, wy, wz - self.pos.z, 1.0);
    }

    #[inline]
    pub fn value_at(&self, x: usize, y: usize, z: usize) -> f32 {
        self.grid.get(x, y, z)
    }

    #[inline]
    pub fn set_value(&mut self, x: i32, y: i32, z: i32, v: f32) {
        self.grid.set_clamped(x, y, z, v);
    }

    /// Highest solid sample in the column, for placing the viewer on the
    /// surface. Returns 0 if the column is entirely air.
    pub fn surface_height(&self, x: usize, z: usize) -> usize {
        for y in (0..GRID_HEIGHT).rev() {
            if self.grid.get(x, y, z) <= 0.0 {
                return y;
            }
        }
        0
    }
}

/// Cave carve term for one sample: resample the noise volume shifted down by
/// the hill height, threshold it, and scale survivors by the configured
/// depth. Returns 0 where no carve applies.
fn cave_density(
    volume: &karst_world::NoiseVolume,
    x: usize,
    y: usize,
    z: usize,
    terrain_height: f32,
    p: &karst_world::TerrainParams,
) -> f32 {
    let shifted = (y as i32 - terrain_height as i32).max(0) as usize;
    let cave = volume.get(x, shifted.min(GRID_HEIGHT - 1), z) / 0.75;

    if (cave * 25.0).floor().abs() - (p.burrow_intensity + 10) as f32 > 0.0 {
        (cave * p.cave_depth).abs()
    } else {
        0.0
    }
}
