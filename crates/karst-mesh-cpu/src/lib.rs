//! CPU marching-cubes mesher for chunk density grids.
#![forbid(unsafe_code)]

pub mod tables;

use hashbrown::HashMap;
use karst_geom::{TerrainMesh, Vec3, VertexKey};
use karst_chunk::DensityGrid;
use tables::{CORNER_OFFSETS, EDGE_CORNERS, TRI_TABLE};

/// Accumulates deduplicated vertices and triangle indices for one chunk.
struct MeshBuilder {
    lookup: HashMap<VertexKey, u32>,
    mesh: TerrainMesh,
}

impl MeshBuilder {
    fn new() -> Self {
        Self {
            lookup: HashMap::new(),
            mesh: TerrainMesh::default(),
        }
    }

    /// Index for a vertex position, inserting it on first sight. Crossing
    /// points are bit-identical across the cubes that share an edge, so the
    /// exact-bits key collapses them to one slot.
    fn index_for(&mut self, v: Vec3) -> u32 {
        let key: VertexKey = v.into();
        match self.lookup.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.mesh.positions.len() as u32;
                self.mesh.positions.push(v);
                self.lookup.insert(key, i);
                i
            }
        }
    }

    fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let ia = self.index_for(a);
        let ib = self.index_for(b);
        let ic = self.index_for(c);
        self.mesh.indices.push(ia);
        self.mesh.indices.push(ib);
        self.mesh.indices.push(ic);
    }
}

/// March every cube of the grid and return the chunk's surface mesh, in
/// chunk-local coordinates.
pub fn mesh_density_grid(grid: &DensityGrid) -> TerrainMesh {
    let mut builder = MeshBuilder::new();

    for x in 0..grid.sx - 1 {
        for y in 0..grid.sy - 1 {
            for z in 0..grid.sx - 1 {
                march_cube(grid, x, y, z, &mut builder);
            }
        }
    }

    let mesh = builder.mesh;
    log::trace!(
        "meshed grid: {} vertices, {} triangles",
        mesh.positions.len(),
        mesh.triangle_count()
    );
    mesh
}

fn march_cube(grid: &DensityGrid, x: usize, y: usize, z: usize, builder: &mut MeshBuilder) {
    let mut cube = [0.0_f32; 8];
    for (i, off) in CORNER_OFFSETS.iter().enumerate() {
        cube[i] = grid.get(x + off[0], y + off[1], z + off[2]);
    }

    // Bit i is set when corner i sits in open air; the surface crosses the
    // cube only for mixed configurations.
    let mut config = 0usize;
    for (i, &d) in cube.iter().enumerate() {
        if d > 0.0 {
            config |= 1 << i;
        }
    }
    if config == 0 || config == 255 {
        return;
    }

    let origin = Vec3::new(x as f32, y as f32, z as f32);
    let row = &TRI_TABLE[config];

    for tri in row.chunks_exact(3) {
        if tri[0] == -1 {
            break;
        }
        let mut verts = [Vec3::ZERO; 3];
        let mut degenerate = false;
        for (slot, &edge) in verts.iter_mut().zip(tri) {
            let [a, b] = EDGE_CORNERS[edge as usize];
            let da = cube[a];
            let db = cube[b];
            // Equal samples give no zero crossing to interpolate; the
            // triangle would collapse, so drop it whole.
            if da == db {
                degenerate = true;
                break;
            }
            let t = (0.0 - da) / (db - da);
            let ca = CORNER_OFFSETS[a];
            let cb = CORNER_OFFSETS[b];
            let va = origin + Vec3::new(ca[0] as f32, ca[1] as f32, ca[2] as f32);
            let vb = origin + Vec3::new(cb[0] as f32, cb[1] as f32, cb[2] as f32);
            *slot = va.lerp(vb, t);
        }
        if !degenerate {
            builder.push_triangle(verts[0], verts[1], verts[2]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_grids_produce_no_mesh() {
        let solid = DensityGrid::new();
        assert!(mesh_density_grid(&solid).is_empty());

        let mut air = DensityGrid::new();
        for y in 0..air.sy {
            for z in 0..air.sx {
                for x in 0..air.sx {
                    air.set(x, y, z, 1.0);
                }
            }
        }
        assert!(mesh_density_grid(&air).is_empty());
    }

    #[test]
    fn single_air_corner_yields_one_triangle() {
        // Exactly one corner of one cube above the surface: one triangle,
        // with each vertex at the midpoint of an incident edge.
        let mut grid = DensityGrid::new();
        for y in 0..grid.sy {
            for z in 0..grid.sx {
                for x in 0..grid.sx {
                    grid.set(x, y, z, -1.0);
                }
            }
        }
        grid.set(0, 0, 0, 1.0);
        let mesh = mesh_density_grid(&grid);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.positions.len(), 3);
        for v in &mesh.positions {
            // Crossing between -1 and 1 interpolates to the edge midpoint.
            let frac = |f: f32| f.fract().abs();
            assert!(frac(v.x) == 0.5 || frac(v.y) == 0.5 || frac(v.z) == 0.5);
        }
    }

    #[test]
    fn shared_edge_vertices_are_deduplicated() {
        // A flat surface between y=2 (solid) and y=3 (air) spans every cube
        // column; adjacent cubes must share crossing vertices.
        let mut grid = DensityGrid::new();
        for y in 0..grid.sy {
            let d = y as f32 - 2.5;
            for z in 0..grid.sx {
                for x in 0..grid.sx {
                    grid.set(x, y, z, d);
                }
            }
        }
        let mesh = mesh_density_grid(&grid);
        assert!(!mesh.is_empty());
        // One crossing vertex per grid column, not per cube corner visit.
        assert_eq!(mesh.positions.len(), grid.sx * grid.sx);
        for v in &mesh.positions {
            assert_eq!(v.y, 2.5);
        }
        for &i in &mesh.indices {
            assert!((i as usize) < mesh.positions.len());
        }
    }

    #[test]
    fn zero_valued_samples_count_as_solid() {
        // A fresh grid is all zeros, which sits on the solid side of the
        // surface; flipping samples to positive opens air and produces
        // geometry with finite, interpolable crossings.
        let mut grid = DensityGrid::new();
        assert!(mesh_density_grid(&grid).is_empty());

        grid.set(0, 0, 0, 1.0);
        grid.set(1, 0, 0, 1.0);
        let mesh = mesh_density_grid(&grid);
        assert!(!mesh.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        for v in &mesh.positions {
            assert!(v.x.is_finite() && v.y.is_finite() && v.z.is_finite());
        }
    }

    #[test]
    fn mesh_is_deterministic() {
        let mut grid = DensityGrid::new();
        for y in 0..grid.sy {
            for z in 0..grid.sx {
                for x in 0..grid.sx {
                    let d = y as f32 - 10.0 + ((x * 7 + z * 13) % 5) as f32 * 0.3;
                    grid.set(x, y, z, d);
                }
            }
        }
        let a = mesh_density_grid(&grid);
        let b = mesh_density_grid(&grid);
        assert_eq!(a.indices, b.indices);
        assert_eq!(a.positions.len(), b.positions.len());
        for (va, vb) in a.positions.iter().zip(&b.positions) {
            assert_eq!(va, vb);
        }
    }
}
