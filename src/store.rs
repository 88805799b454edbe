use hashbrown::HashMap;
use karst_chunk::Chunk;
use karst_geom::TerrainMesh;
use karst_world::ChunkPos;

/// Scheduling state of a chunk position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Created; grid generation (or an edit remesh) is in flight.
    PendingData,
    /// Worker output has arrived but the mesh handoff has not run yet.
    DataReady,
    /// Mesh installed and collaborators notified.
    Meshed,
}

/// Worker output parked on the entry until the main-thread handoff step.
pub struct ReadyData {
    pub grid: karst_chunk::DensityGrid,
    pub mesh: TerrainMesh,
    pub needs_water_tile: bool,
    pub needs_floor_tile: bool,
}

/// A terrain edit that arrived while the chunk's generated grid was still
/// in flight. Replayed onto the grid once it installs, then remeshed.
#[derive(Clone, Copy, Debug)]
pub struct DeferredEdit {
    pub wx: i32,
    pub wy: i32,
    pub wz: i32,
    pub value: f32,
}

pub struct ChunkEntry {
    pub chunk: Chunk,
    pub state: ChunkState,
    pub ready: Option<ReadyData>,
    pub deferred_edits: Vec<DeferredEdit>,
    /// Id of the newest job submitted for this position; stale results
    /// (an edit superseding an in-flight generation) are dropped.
    pub job_id: u64,
}

/// Owns every chunk ever created. Chunks are never removed; leaving the view
/// only hides them, so memory grows with the explored area.
#[derive(Default)]
pub struct ChunkStore {
    map: HashMap<ChunkPos, ChunkEntry>,
    /// Positions marked visible during the previous streaming pass.
    pub visible_last_pass: Vec<ChunkPos>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk, job_id: u64) {
        let pos = chunk.pos;
        self.map.insert(
            pos,
            ChunkEntry {
                chunk,
                state: ChunkState::PendingData,
                ready: None,
                deferred_edits: Vec::new(),
                job_id,
            },
        );
    }

    #[inline]
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.map.contains_key(&pos)
    }

    #[inline]
    pub fn get(&self, pos: ChunkPos) -> Option<&ChunkEntry> {
        self.map.get(&pos)
    }

    #[inline]
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut ChunkEntry> {
        self.map.get_mut(&pos)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkPos, &ChunkEntry)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkPos, &mut ChunkEntry)> {
        self.map.iter_mut()
    }

    /// Positions whose parked worker output is awaiting the handoff step.
    pub fn ready_positions(&self) -> Vec<ChunkPos> {
        self.map
            .iter()
            .filter(|(_, e)| e.state == ChunkState::DataReady)
            .map(|(p, _)| *p)
            .collect()
    }
}
