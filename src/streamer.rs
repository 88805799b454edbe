use std::sync::Arc;

use karst_chunk::{Chunk, GRID_WIDTH, Neighbor};
use karst_runtime::{GenJob, JobOut, Runtime};
use karst_world::{CHUNK_WIDTH, ChunkPos, World};

use crate::sink::CollaboratorSink;
use crate::store::{ChunkState, ChunkStore, DeferredEdit, ReadyData};

/// Drives chunk creation, meshing handoff, and visibility around a viewer.
///
/// Runs on the main simulation thread. Workers are never waited on: finished
/// jobs are polled out of the runtime at the top of every tick.
pub struct Streamer {
    world: Arc<World>,
    runtime: Runtime,
    pub store: ChunkStore,
    viewer: ChunkPos,
    startup_done: bool,
    ticks_since_creation: u32,
    next_job_id: u64,
}

impl Streamer {
    pub fn new(world: Arc<World>, runtime: Runtime) -> Self {
        let viewer = ChunkPos::containing(world.params.start_x, world.params.start_z);
        Self {
            world,
            runtime,
            store: ChunkStore::new(),
            viewer,
            startup_done: false,
            ticks_since_creation: 0,
            next_job_id: 0,
        }
    }

    #[inline]
    pub fn viewer(&self) -> ChunkPos {
        self.viewer
    }

    pub fn set_viewer_world_pos(&mut self, wx: i32, wz: i32) {
        self.viewer = ChunkPos::containing(wx, wz);
    }

    #[inline]
    pub fn startup_done(&self) -> bool {
        self.startup_done
    }

    /// Jobs queued or running across both lanes.
    pub fn queue_depth(&self) -> usize {
        self.runtime.queued_edit() + self.runtime.queued_bg() + self.runtime.inflight()
    }

    /// View half-width in whole chunks.
    fn view_span(&self) -> i32 {
        (self.world.params.view_distance / CHUNK_WIDTH as f32).ceil() as i32
    }

    /// One pass of the streaming state machine.
    pub fn tick(&mut self, sink: &mut dyn CollaboratorSink) {
        for out in self.runtime.drain_results() {
            self.park_result(out);
        }
        self.install_ready(sink);

        if self.startup_done {
            self.scan_view(sink);
            self.ticks_since_creation = self.ticks_since_creation.saturating_add(1);
        } else {
            self.run_startup_gate();
            if self.startup_done {
                // Steady-state throttling starts fresh on the first scan tick.
                self.ticks_since_creation = 0;
            } else {
                self.ticks_since_creation = self.ticks_since_creation.saturating_add(1);
            }
        }
    }

    /// Park a worker result on its entry; stale job ids are dropped (a later
    /// edit has already superseded this output).
    fn park_result(&mut self, out: JobOut) {
        let Some(entry) = self.store.get_mut(out.pos) else {
            log::warn!("result for unknown chunk ({}, {})", out.pos.x, out.pos.z);
            return;
        };
        if out.job_id != entry.job_id {
            log::trace!(
                "dropping stale job {} for ({}, {})",
                out.job_id,
                out.pos.x,
                out.pos.z
            );
            return;
        }
        log::debug!(
            "chunk ({}, {}) ready: gen {}ms mesh {}ms total {}ms",
            out.pos.x,
            out.pos.z,
            out.t_gen_ms,
            out.t_mesh_ms,
            out.t_total_ms
        );
        entry.ready = Some(ReadyData {
            grid: out.grid,
            mesh: out.mesh,
            needs_water_tile: out.needs_water_tile,
            needs_floor_tile: out.needs_floor_tile,
        });
        entry.state = ChunkState::DataReady;
    }

    /// Main-thread handoff: install parked grids and meshes, then notify the
    /// collaborators that place water/floor geometry. Edits that arrived
    /// while the grid was in flight are replayed here and remeshed.
    fn install_ready(&mut self, sink: &mut dyn CollaboratorSink) {
        let mut replayed = Vec::new();
        for pos in self.store.ready_positions() {
            let Some(entry) = self.store.get_mut(pos) else {
                continue;
            };
            let Some(ready) = entry.ready.take() else {
                continue;
            };
            let had_water = entry.chunk.needs_water_tile;
            let had_floor = entry.chunk.needs_floor_tile;

            entry.chunk.grid = ready.grid;
            entry.chunk.needs_water_tile = ready.needs_water_tile;
            entry.chunk.needs_floor_tile = ready.needs_floor_tile;
            entry.chunk.mesh = Some(ready.mesh);
            entry.chunk.visible = true;
            entry.state = ChunkState::Meshed;

            if !entry.deferred_edits.is_empty() {
                for e in std::mem::take(&mut entry.deferred_edits) {
                    entry.chunk.set_value(e.wx - pos.x, e.wy, e.wz - pos.z, e.value);
                }
                replayed.push(pos);
            }

            let needs_water = entry.chunk.needs_water_tile && !had_water;
            let needs_floor = entry.chunk.needs_floor_tile && !had_floor;
            // Reborrow immutably for the notification.
            let Some(entry) = self.store.get(pos) else {
                continue;
            };
            if let Some(mesh) = &entry.chunk.mesh {
                sink.chunk_meshed(pos, mesh);
            }
            if needs_water {
                sink.water_plane_needed(pos, self.world.params.water_level);
            }
            if needs_floor {
                sink.floor_plane_needed(pos);
            }
        }
        for pos in replayed {
            self.resubmit_edit(pos);
        }
    }

    /// Startup gate: build out the initial view area under the same per-tick
    /// creation budget and delay as steady-state streaming, then poll until
    /// every chunk in it is meshed before placing the viewer and enabling
    /// the view scan.
    fn run_startup_gate(&mut self) {
        let span = self.view_span();
        if self.store.is_empty() {
            let side = (2 * span + 1) as usize;
            log::info!(
                "startup: generating initial area of {} chunks around ({}, {})",
                side * side,
                self.viewer.x,
                self.viewer.z
            );
        }

        let budget = self.runtime.worker_count();
        let delay_ok = self.ticks_since_creation >= self.world.params.creation_tick_delay;
        let mut created = 0usize;
        let mut missing = false;

        for dz in -span..=span {
            for dx in -span..=span {
                let pos = self
                    .viewer
                    .offset(dx * CHUNK_WIDTH as i32, dz * CHUNK_WIDTH as i32);
                if self.store.contains(pos) {
                    continue;
                }
                if delay_ok && created < budget {
                    self.create_chunk(pos);
                    created += 1;
                } else {
                    missing = true;
                }
            }
        }
        if created > 0 {
            self.ticks_since_creation = 0;
        }
        if missing {
            return;
        }

        let all_meshed = self
            .store
            .iter()
            .all(|(_, e)| e.state == ChunkState::Meshed);
        if all_meshed {
            let mid = GRID_WIDTH / 2;
            let surface = self
                .store
                .get(self.viewer)
                .map(|e| e.chunk.surface_height(mid, mid))
                .unwrap_or(0);
            log::info!(
                "startup complete: viewer placed at ({}, {}, {})",
                self.viewer.x + mid as i32,
                surface + 1,
                self.viewer.z + mid as i32
            );
            self.startup_done = true;
        }
    }

    /// Square scan around the viewer: show existing chunks, create missing
    /// ones under the per-tick budget, hide everything outside the view.
    fn scan_view(&mut self, sink: &mut dyn CollaboratorSink) {
        let span = self.view_span();
        let budget = self.runtime.worker_count();
        let delay_ok = self.ticks_since_creation >= self.world.params.creation_tick_delay;
        let mut created = 0usize;
        let mut visible_pass = Vec::new();

        for dz in -span..=span {
            for dx in -span..=span {
                let pos = self
                    .viewer
                    .offset(dx * CHUNK_WIDTH as i32, dz * CHUNK_WIDTH as i32);
                if self.store.contains(pos) {
                    if let Some(entry) = self.store.get_mut(pos) {
                        if !entry.chunk.visible {
                            entry.chunk.visible = true;
                            sink.visibility_changed(pos, true);
                        }
                        visible_pass.push(pos);
                    }
                } else if delay_ok && created < budget {
                    self.create_chunk(pos);
                    created += 1;
                }
            }
        }

        if created > 0 {
            self.ticks_since_creation = 0;
        }

        // Hide, never destroy, chunks that fell out of view.
        let viewer = self.viewer;
        let world_span = span * CHUNK_WIDTH as i32;
        let mut hidden = Vec::new();
        for (pos, entry) in self.store.iter_mut() {
            let out = (pos.x - viewer.x).abs() > world_span || (pos.z - viewer.z).abs() > world_span;
            if entry.chunk.visible && out {
                entry.chunk.visible = false;
                hidden.push(*pos);
            }
        }
        for pos in hidden {
            sink.visibility_changed(pos, false);
        }

        self.store.visible_last_pass = visible_pass;
    }

    fn create_chunk(&mut self, pos: ChunkPos) {
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let chunk = Chunk::new(pos, &self.world);
        self.store.insert(chunk, job_id);
        self.runtime.submit_bg(GenJob {
            pos,
            job_id,
            prev_grid: None,
        });
    }

    /// Raise terrain at a world-space sample. Every loaded chunk whose grid
    /// covers the sample (border samples are shared) is edited and remeshed.
    pub fn place_terrain(&mut self, wx: i32, wy: i32, wz: i32) {
        self.edit(wx, wy, wz, 0.0);
    }

    /// Lower terrain at a world-space sample.
    pub fn remove_terrain(&mut self, wx: i32, wy: i32, wz: i32) {
        self.edit(wx, wy, wz, 1.0);
    }

    fn edit(&mut self, wx: i32, wy: i32, wz: i32, value: f32) {
        let center = ChunkPos::containing(wx, wz);
        let mut touched = Vec::new();

        let mut candidates = vec![center];
        for n in Neighbor::ALL {
            let (dx, dz) = n.offset();
            candidates.push(center.offset(dx, dz));
        }

        for pos in candidates {
            let Some(entry) = self.store.get_mut(pos) else {
                continue;
            };
            let lx = wx - pos.x;
            let lz = wz - pos.z;
            // Border samples exist in two grids; both must change.
            if !(0..GRID_WIDTH as i32).contains(&lx) || !(0..GRID_WIDTH as i32).contains(&lz) {
                continue;
            }
            if entry.state == ChunkState::Meshed {
                entry.chunk.set_value(lx, wy, lz, value);
                touched.push(pos);
            } else {
                // The real grid is still in flight; editing the placeholder
                // now would be overwritten (or, worse, submitted for meshing)
                // the moment the result lands. Replay once it installs.
                entry.deferred_edits.push(DeferredEdit { wx, wy, wz, value });
            }
        }

        for pos in touched {
            self.resubmit_edit(pos);
        }
    }

    fn resubmit_edit(&mut self, pos: ChunkPos) {
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let Some(entry) = self.store.get_mut(pos) else {
            return;
        };
        entry.job_id = job_id;
        entry.state = ChunkState::PendingData;
        let grid = entry.chunk.grid.clone();
        self.runtime.submit_edit(GenJob {
            pos,
            job_id,
            prev_grid: Some(grid),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::LogSink;
    use karst_chunk::GRID_HEIGHT;
    use karst_world::{ConstantHeight, TerrainConfig, TerrainParams};

    fn test_world(view_distance: f32, delay: u32) -> Arc<World> {
        let mut params = TerrainParams::from_config(&TerrainConfig::default());
        params.view_distance = view_distance;
        params.creation_tick_delay = delay;
        params.start_x = 0;
        params.start_z = 0;
        Arc::new(World::new(params, Box::new(ConstantHeight(20.0))))
    }

    fn run_until_started(streamer: &mut Streamer, sink: &mut LogSink) {
        for _ in 0..10_000 {
            streamer.tick(sink);
            if streamer.startup_done() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        panic!("startup never completed");
    }

    #[test]
    fn startup_gate_meshes_the_full_initial_area() {
        let world = test_world(32.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);
        // 32 units of view is a 2-chunk span: a 5x5 square.
        assert_eq!(streamer.store.len(), 25);
        assert!(
            streamer
                .store
                .iter()
                .all(|(_, e)| e.state == ChunkState::Meshed)
        );
        assert_eq!(sink.meshed, 25);
    }

    #[test]
    fn steady_state_creation_respects_the_worker_budget() {
        let world = test_world(32.0, 0);
        let runtime = Runtime::new(world.clone(), Some(2));
        let budget = runtime.worker_count();
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);
        let before = streamer.store.len();

        // Moving the viewer exposes a fresh column of missing positions,
        // more than the budget can create in one tick.
        streamer.set_viewer_world_pos(5 * 16, 0);
        streamer.tick(&mut sink);
        let created = streamer.store.len() - before;
        assert!(created <= budget, "created {created} > budget {budget}");
        assert!(created > 0);
    }

    #[test]
    fn creation_waits_out_the_tick_delay() {
        let world = test_world(32.0, 3);
        let runtime = Runtime::new(world.clone(), Some(2));
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);
        streamer.set_viewer_world_pos(5 * 16, 0);

        // First scan tick after startup has ticks_since_creation = 0,
        // so nothing may be created until the delay elapses.
        let before = streamer.store.len();
        streamer.tick(&mut sink);
        streamer.tick(&mut sink);
        streamer.tick(&mut sink);
        assert_eq!(streamer.store.len(), before);
        streamer.tick(&mut sink);
        assert!(streamer.store.len() > before);
    }

    #[test]
    fn out_of_view_chunks_are_hidden_not_destroyed() {
        let world = test_world(16.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);
        let count = streamer.store.len();

        streamer.set_viewer_world_pos(100 * 16, 0);
        streamer.tick(&mut sink);
        assert!(streamer.store.len() >= count);
        let origin = ChunkPos::new(0, 0);
        let entry = streamer.store.get(origin).unwrap();
        assert!(!entry.chunk.visible);
        assert!(entry.chunk.has_mesh());
    }

    #[test]
    fn edits_remesh_only_the_touched_chunks() {
        let world = test_world(32.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);

        // Interior edit: exactly one chunk goes back through the pipeline.
        streamer.remove_terrain(8, 20, 8);
        let pending = streamer
            .store
            .iter()
            .filter(|(_, e)| e.state == ChunkState::PendingData)
            .count();
        assert_eq!(pending, 1);

        streamer.tick(&mut sink);
        let entry = streamer.store.get(ChunkPos::new(0, 0)).unwrap();
        assert_eq!(entry.state, ChunkState::Meshed);
        assert_eq!(entry.chunk.grid.get(8, 20, 8), 1.0);
    }

    #[test]
    fn border_edits_touch_both_sharing_chunks() {
        let world = test_world(32.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);

        // x = 16 is the shared border column of chunks (0,0) and (16,0).
        streamer.place_terrain(16, 30, 8);
        streamer.tick(&mut sink);
        let a = streamer.store.get(ChunkPos::new(0, 0)).unwrap();
        let b = streamer.store.get(ChunkPos::new(16, 0)).unwrap();
        assert_eq!(a.chunk.grid.get(16, 30, 8), 0.0);
        assert_eq!(b.chunk.grid.get(0, 30, 8), 0.0);
    }

    #[test]
    fn back_to_back_edits_apply_in_order() {
        let world = test_world(16.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        run_until_started(&mut streamer, &mut sink);

        // The second edit lands while the first remesh is in flight, so it
        // is held back and replayed; the final grid reflects the last edit.
        streamer.remove_terrain(4, 30, 4);
        streamer.place_terrain(4, 30, 4);
        streamer.tick(&mut sink);
        streamer.tick(&mut sink);
        let entry = streamer.store.get(ChunkPos::new(0, 0)).unwrap();
        assert_eq!(entry.state, ChunkState::Meshed);
        assert_eq!(entry.chunk.grid.get(4, 30, 4), 0.0);
    }

    #[test]
    fn edits_before_first_install_are_replayed_after_generation() {
        let world = test_world(16.0, 0);
        let runtime = Runtime::new_inline(world.clone());
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        // Walk the startup gate until the origin chunk exists but its
        // generated grid has not installed yet.
        let origin = ChunkPos::new(0, 0);
        for _ in 0..100 {
            if streamer.store.get(origin).map(|e| e.state) == Some(ChunkState::PendingData) {
                break;
            }
            streamer.tick(&mut sink);
        }
        let entry = streamer.store.get(origin).unwrap();
        assert_eq!(entry.state, ChunkState::PendingData);
        let job_before = entry.job_id;

        streamer.remove_terrain(4, 20, 4);
        // The in-flight generation must not be superseded by the edit.
        assert_eq!(streamer.store.get(origin).unwrap().job_id, job_before);

        run_until_started(&mut streamer, &mut sink);
        let entry = streamer.store.get(origin).unwrap();
        // Generated terrain survived: over flat ground the top of the
        // column is open air, not the zeroed placeholder grid.
        assert!(entry.chunk.grid.get(8, GRID_HEIGHT - 1, 8) > 0.0);
        // And the edit landed once the grid installed.
        assert_eq!(entry.chunk.grid.get(4, 20, 4), 1.0);
    }

    #[test]
    fn startup_creation_respects_the_worker_budget() {
        let world = test_world(32.0, 0);
        let runtime = Runtime::new(world.clone(), Some(2));
        let budget = runtime.worker_count();
        let mut streamer = Streamer::new(world, runtime);
        let mut sink = LogSink::default();

        // The initial area is built under the same per-tick budget as
        // steady-state streaming, never in one burst.
        let mut prev = 0;
        for _ in 0..10_000 {
            streamer.tick(&mut sink);
            let len = streamer.store.len();
            assert!(len - prev <= budget, "created {} in one tick", len - prev);
            prev = len;
            if streamer.startup_done() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(streamer.startup_done());
        assert_eq!(streamer.store.len(), 25);
    }
}
