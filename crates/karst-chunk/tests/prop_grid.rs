use karst_chunk::{Chunk, DensityGrid, GRID_HEIGHT, GRID_WIDTH};
use karst_world::{ChunkPos, ConstantHeight, TerrainParams, World};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_clamped_always_lands_in_bounds(
        x in -50i32..50,
        y in -100i32..150,
        z in -50i32..50,
        v in -2.0f32..2.0,
    ) {
        let mut g = DensityGrid::new();
        g.set_clamped(x, y, z, v);
        let cx = x.clamp(0, GRID_WIDTH as i32 - 1) as usize;
        let cy = y.clamp(0, GRID_HEIGHT as i32 - 1) as usize;
        let cz = z.clamp(0, GRID_WIDTH as i32 - 1) as usize;
        prop_assert_eq!(g.get(cx, cy, cz), v);
    }

    #[test]
    fn clamping_is_per_axis(
        x in 0i32..GRID_WIDTH as i32,
        y in 0i32..GRID_HEIGHT as i32,
        z in 20i32..200,
    ) {
        // An out-of-range z must not disturb the in-range axes.
        let mut g = DensityGrid::new();
        g.set_clamped(x, y, z, 0.5);
        prop_assert_eq!(g.get(x as usize, y as usize, GRID_WIDTH - 1), 0.5);
    }

    #[test]
    fn place_then_remove_round_trips_to_air(
        wx in 0i32..GRID_WIDTH as i32,
        wy in 0i32..GRID_HEIGHT as i32,
        wz in 0i32..GRID_WIDTH as i32,
    ) {
        let world = World::new(TerrainParams::default(), Box::new(ConstantHeight(10.0)));
        let mut c = Chunk::new(ChunkPos::new(0, 0), &world);
        c.place_terrain(wx, wy, wz);
        prop_assert_eq!(c.value_at(wx as usize, wy as usize, wz as usize), 0.0);
        c.remove_terrain(wx, wy, wz);
        prop_assert_eq!(c.value_at(wx as usize, wy as usize, wz as usize), 1.0);
    }

    #[test]
    fn neighbour_offsets_are_one_chunk_apart(cx in -16i32..16, cz in -16i32..16) {
        let world = World::new(TerrainParams::default(), Box::new(ConstantHeight(0.0)));
        let c = Chunk::new(ChunkPos::from_chunk_coords(cx, cz), &world);
        for n in c.neighbours() {
            let dx = (n.x - c.pos.x).abs();
            let dz = (n.z - c.pos.z).abs();
            prop_assert!(dx <= 16 && dz <= 16);
            prop_assert!(dx == 16 || dz == 16);
        }
    }
}
