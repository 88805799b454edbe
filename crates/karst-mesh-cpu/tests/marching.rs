use karst_chunk::{Chunk, DensityGrid, GRID_HEIGHT, GRID_WIDTH};
use karst_mesh_cpu::mesh_density_grid;
use karst_world::{ChunkPos, ConstantHeight, TerrainParams, World};
use proptest::prelude::*;

#[test]
fn generated_chunk_produces_a_valid_surface() {
    let world = World::new(TerrainParams::default(), Box::new(ConstantHeight(20.0)));
    let mut chunk = Chunk::new(ChunkPos::new(0, 0), &world);
    chunk.populate(&world);

    let mesh = mesh_density_grid(&chunk.grid);
    assert!(!mesh.is_empty());
    assert_eq!(mesh.indices.len() % 3, 0);
    for &i in &mesh.indices {
        assert!((i as usize) < mesh.positions.len());
    }
    for v in &mesh.positions {
        assert!((0.0..=(GRID_WIDTH - 1) as f32).contains(&v.x));
        assert!((0.0..=(GRID_HEIGHT - 1) as f32).contains(&v.y));
        assert!((0.0..=(GRID_WIDTH - 1) as f32).contains(&v.z));
    }
}

#[test]
fn remeshing_after_an_edit_changes_the_surface() {
    let world = World::new(TerrainParams::default(), Box::new(ConstantHeight(20.0)));
    let mut chunk = Chunk::new(ChunkPos::new(0, 0), &world);
    chunk.populate(&world);

    let before = mesh_density_grid(&chunk.grid);
    let top = chunk.surface_height(8, 8);
    chunk.remove_terrain(8, top as i32, 8);
    let after = mesh_density_grid(&chunk.grid);
    let same = before.indices == after.indices
        && before.positions.len() == after.positions.len()
        && before.positions.iter().zip(&after.positions).all(|(a, b)| a == b);
    assert!(!same, "edit did not change the mesh");
}

#[test]
fn a_cube_never_yields_more_than_five_triangles() {
    // A checkerboard grid makes every cube surface-crossing, the worst case
    // for triangle output, so the total is tight against the per-cube cap.
    let mut grid = DensityGrid::new();
    for y in 0..GRID_HEIGHT {
        for z in 0..GRID_WIDTH {
            for x in 0..GRID_WIDTH {
                let v = if (x + y + z) % 2 == 0 { 1.0 } else { -1.0 };
                grid.set(x, y, z, v);
            }
        }
    }

    let mesh = mesh_density_grid(&grid);
    assert!(!mesh.is_empty());
    let cubes = (GRID_WIDTH - 1) * (GRID_WIDTH - 1) * (GRID_HEIGHT - 1);
    assert!(mesh.indices.len() / 3 <= 5 * cubes);
}

#[test]
fn adjacent_chunks_agree_on_generated_density_at_the_seam() {
    // The shared border column of two neighbouring chunks samples the same
    // world positions, so their generated grids must match along it.
    let world = World::new(TerrainParams::default(), Box::new(ConstantHeight(20.0)));
    let mut a = Chunk::new(ChunkPos::new(0, 0), &world);
    let mut b = Chunk::new(ChunkPos::new(16, 0), &world);
    a.populate(&world);
    b.populate(&world);

    for y in 0..GRID_HEIGHT {
        for z in 0..GRID_WIDTH {
            let va = a.grid.get(GRID_WIDTH - 1, y, z);
            let vb = b.grid.get(0, y, z);
            assert!(
                (va - vb).abs() < 1e-4,
                "seam mismatch at y={y} z={z}: {va} vs {vb}"
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_grids_always_yield_well_formed_meshes(
        seed in 0u64..1_000_000,
        threshold in 1usize..GRID_HEIGHT - 1,
    ) {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut grid = DensityGrid::new();
        for y in 0..GRID_HEIGHT {
            for z in 0..GRID_WIDTH {
                for x in 0..GRID_WIDTH {
                    let jitter = rng.f32() - 0.5;
                    grid.set(x, y, z, y as f32 - threshold as f32 + jitter);
                }
            }
        }
        let mesh = mesh_density_grid(&grid);
        prop_assert_eq!(mesh.indices.len() % 3, 0);
        for &i in &mesh.indices {
            prop_assert!((i as usize) < mesh.positions.len());
        }
        for v in &mesh.positions {
            prop_assert!(v.x.is_finite() && v.y.is_finite() && v.z.is_finite());
        }
    }
}
