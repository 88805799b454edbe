//! Minimal geometry types for engine crates (no renderer dependency).
#![forbid(unsafe_code)]

use core::ops::{Add, Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Point on the segment `self -> other` at parameter `t`.
    #[inline]
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        self + (other - self) * t
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Hashable identity of a vertex position, compared by exact bit pattern.
///
/// Interpolated crossing points are deterministic per input grid, so two
/// cubes sharing a crossed edge compute the same bits and collapse to one
/// mesh vertex. No quantization is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexKey([u32; 3]);

impl From<Vec3> for VertexKey {
    #[inline]
    fn from(v: Vec3) -> Self {
        VertexKey([v.x.to_bits(), v.y.to_bits(), v.z.to_bits()])
    }
}

/// Triangle mesh produced by the marching-cubes mesher.
///
/// `indices` is always a multiple of 3 and every index is a valid slot in
/// `positions`. Positions are unique; triangles share vertices so normal
/// recalculation downstream stays consistent across cube boundaries.
#[derive(Clone, Debug, Default)]
pub struct TerrainMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
