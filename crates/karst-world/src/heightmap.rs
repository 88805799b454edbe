//! Base-height collaborator seam.
//!
//! The density formula subtracts a per-column base height supplied by a
//! biome/height-map system that lives outside this crate. The default
//! implementation bakes a wrapping 2D noise raster once at startup so the
//! per-column lookup in the generation hot loop is a plain array read.

use fastnoise_lite::{FastNoiseLite, NoiseType};

/// Per-column terrain bias, sampled in world space.
pub trait HeightSampler {
    fn base_height(&self, wx: i32, wz: i32) -> f32;
}

/// Flat bias; useful in tests and for featureless worlds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantHeight(pub f32);

impl HeightSampler for ConstantHeight {
    #[inline]
    fn base_height(&self, _wx: i32, _wz: i32) -> f32 {
        self.0
    }
}

/// Pre-baked square raster of base heights, wrap-sampled so every world
/// coordinate maps onto it.
pub struct HeightMapRaster {
    size: usize,
    data: Vec<f32>,
}

impl HeightMapRaster {
    /// Bake a `size × size` raster from low-frequency 2D noise, scaled into
    /// `[0, amplitude]`.
    pub fn from_noise(seed: i32, size: usize, frequency: f32, amplitude: f32) -> Self {
        let size = size.max(1);
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(frequency));

        let mut data = vec![0.0_f32; size * size];
        for z in 0..size {
            for x in 0..size {
                let v = noise.get_noise_2d(x as f32, z as f32);
                data[z * size + x] = (v + 1.0) * 0.5 * amplitude;
            }
        }
        Self { size, data }
    }
}

impl HeightSampler for HeightMapRaster {
    #[inline]
    fn base_height(&self, wx: i32, wz: i32) -> f32 {
        let s = self.size as i32;
        let ix = wx.rem_euclid(s) as usize;
        let iz = wz.rem_euclid(s) as usize;
        self.data[iz * self.size + ix]
    }
}
