use karst_geom::TerrainMesh;
use karst_world::ChunkPos;

/// Seam to the rendering/physics/decoration systems that consume finished
/// chunks. The engine core never owns their objects; it only announces what
/// each chunk needs.
pub trait CollaboratorSink {
    /// The chunk's mesh was installed or replaced.
    fn chunk_meshed(&mut self, pos: ChunkPos, mesh: &TerrainMesh);
    /// Terrain at this chunk sits below the water level somewhere.
    fn water_plane_needed(&mut self, pos: ChunkPos, level: usize);
    /// Carving opened the bottom of this chunk.
    fn floor_plane_needed(&mut self, pos: ChunkPos);
    /// Visibility toggled without any mesh change.
    fn visibility_changed(&mut self, pos: ChunkPos, visible: bool);
}

/// Logging sink used by the headless binary; stands in for the renderer.
#[derive(Default)]
pub struct LogSink {
    pub meshed: usize,
    pub water_planes: usize,
    pub floor_planes: usize,
    pub triangles: usize,
}

impl CollaboratorSink for LogSink {
    fn chunk_meshed(&mut self, pos: ChunkPos, mesh: &TerrainMesh) {
        self.meshed += 1;
        self.triangles += mesh.triangle_count();
        log::debug!(
            "chunk ({}, {}) meshed: {} verts {} tris",
            pos.x,
            pos.z,
            mesh.positions.len(),
            mesh.triangle_count()
        );
    }

    fn water_plane_needed(&mut self, pos: ChunkPos, level: usize) {
        self.water_planes += 1;
        log::debug!("chunk ({}, {}) needs a water tile at y={level}", pos.x, pos.z);
    }

    fn floor_plane_needed(&mut self, pos: ChunkPos) {
        self.floor_planes += 1;
        log::debug!("chunk ({}, {}) needs a floor tile", pos.x, pos.z);
    }

    fn visibility_changed(&mut self, pos: ChunkPos, visible: bool) {
        log::trace!("chunk ({}, {}) visible={visible}", pos.x, pos.z);
    }
}
