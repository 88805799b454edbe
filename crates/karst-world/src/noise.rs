use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::ChunkPos;
use crate::config::NoiseParams;

/// Fixed generator seed; world seeds vary the per-octave offsets instead,
/// which keeps one coherent gradient field shared by every world.
const GENERATOR_SEED: i32 = 10_000;

/// Floor applied to `scale` so the frequency divide can never blow up.
const MIN_SCALE: f32 = 1e-4;

/// One chunk's worth of layered-noise samples, normalized into `[0,1]`.
///
/// Layout matches the density grid: `(y * sx + z) * sx + x`, with
/// `sx` covering both horizontal axes.
pub struct NoiseVolume {
    pub sx: usize,
    pub sy: usize,
    pub data: Vec<f32>,
    /// Raw octave-sum extremes seen during the traversal. Normalization
    /// deliberately ignores these in favor of the theoretical amplitude
    /// bound so distant chunks agree on the mapping.
    pub observed_min: f32,
    pub observed_max: f32,
}

impl NoiseVolume {
    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sx + z) * self.sx + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.idx(x, y, z)]
    }
}

/// Deterministic layered-noise sampler for chunk density volumes.
///
/// For a fixed seed and parameter set, two independent instances produce
/// byte-identical volumes for the same chunk position.
pub struct NoiseField {
    noise: FastNoiseLite,
    octave_offsets: Vec<[f32; 3]>,
    scale: f32,
    persistence: f32,
    lacunarity: f32,
    max_amplitude: f32,
}

impl NoiseField {
    pub fn new(seed: i32, params: &NoiseParams) -> Self {
        let mut noise = FastNoiseLite::with_seed(GENERATOR_SEED);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(1.0));

        let mut rng = fastrand::Rng::with_seed(u64::from(seed as u32));
        let octaves = params.octaves.max(1);
        let mut octave_offsets = Vec::with_capacity(octaves as usize);
        let mut max_amplitude = 0.0_f32;
        let mut amplitude = 1.0_f32;
        for _ in 0..octaves {
            let ox = rng.i32(-100_000..100_000) as f32;
            let oy = rng.i32(-100_000..100_000) as f32;
            let oz = rng.i32(-100_000..100_000) as f32;
            octave_offsets.push([ox, oy, oz]);
            max_amplitude += amplitude;
            amplitude *= params.persistence;
        }

        Self {
            noise,
            octave_offsets,
            scale: params.scale.max(MIN_SCALE),
            persistence: params.persistence,
            lacunarity: params.lacunarity,
            max_amplitude,
        }
    }

    /// Sample a `map_width × map_height × map_width` volume for the chunk at
    /// `chunk`. `map_width`/`map_height` are the grid dimensions, i.e. chunk
    /// extent plus one (samples sit at cube corners).
    pub fn generate(&self, map_width: usize, map_height: usize, chunk: ChunkPos) -> NoiseVolume {
        let mut data = vec![0.0_f32; map_width * map_width * map_height];
        let half_width = map_width as f32 / 2.0;
        let half_height = map_height as f32 / 2.0;
        let mut observed_min = f32::MAX;
        let mut observed_max = f32::MIN;

        for x in 0..map_width {
            for z in 0..map_width {
                for y in 0..map_height {
                    let mut amplitude = 1.0_f32;
                    let mut frequency = 1.0_f32;
                    let mut sum = 0.0_f32;
                    for off in &self.octave_offsets {
                        let sx = (x as f32 + chunk.x as f32 - half_width + off[0]) / self.scale
                            * frequency;
                        let sy = (y as f32 - half_height + off[1]) / self.scale * frequency;
                        let sz = (z as f32 + chunk.z as f32 - half_width + off[2]) / self.scale
                            * frequency;
                        sum += self.noise.get_noise_3d(sx, sy, sz) * amplitude;
                        amplitude *= self.persistence;
                        frequency *= self.lacunarity;
                    }
                    observed_min = observed_min.min(sum);
                    observed_max = observed_max.max(sum);
                    data[(y * map_width + z) * map_width + x] = sum;
                }
            }
        }

        // Normalize against the theoretical amplitude bound, not the observed
        // extremes: the mapping must be identical for every chunk.
        for v in &mut data {
            *v = inverse_lerp(-self.max_amplitude, self.max_amplitude, *v);
        }

        NoiseVolume {
            sx: map_width,
            sy: map_height,
            data,
            observed_min,
            observed_max,
        }
    }
}

#[inline]
fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    (v - a) / (b - a)
}
