//! Generation job queues and worker orchestration.
//!
//! Chunk data is produced off the caller's thread and handed back over a
//! result channel; the caller polls with [`Runtime::drain_results`] each tick
//! and never blocks on a worker.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, select, unbounded};
use karst_chunk::{Chunk, DensityGrid};
use karst_geom::TerrainMesh;
use karst_mesh_cpu::mesh_density_grid;
use karst_world::{ChunkPos, World};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// A request to produce grid and mesh data for one chunk.
#[derive(Clone, Debug)]
pub struct GenJob {
    pub pos: ChunkPos,
    pub job_id: u64,
    /// An already-edited grid to remesh. When absent the worker generates
    /// the grid from the world's noise field.
    pub prev_grid: Option<DensityGrid>,
}

/// Which queue a job travelled through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Player-edit remesh; served ahead of background streaming work.
    Edit,
    /// Background chunk creation driven by the streamer.
    Bg,
}

/// Completed chunk data, delivered over the result channel.
pub struct JobOut {
    pub pos: ChunkPos,
    pub job_id: u64,
    pub kind: JobKind,
    pub grid: DensityGrid,
    pub mesh: TerrainMesh,
    pub needs_water_tile: bool,
    pub needs_floor_tile: bool,
    pub t_gen_ms: u32,
    pub t_mesh_ms: u32,
    pub t_total_ms: u32,
}

fn process_gen_job(job: GenJob, kind: JobKind, world: &World, tx: &Sender<JobOut>) {
    let GenJob {
        pos,
        job_id,
        prev_grid,
    } = job;

    let t_job_start = Instant::now();
    let mut t_gen_ms: u32 = 0;

    let grid = match prev_grid {
        Some(grid) => grid,
        None => {
            let t0 = Instant::now();
            let mut chunk = Chunk::new(pos, world);
            chunk.populate(world);
            t_gen_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
            chunk.grid
        }
    };

    // Flags are derived from the grid either way: an edit can flood a column
    // below the water level or pierce the floor just as generation can.
    let p = &world.params;
    let needs_water_tile = p.water_enable && grid.any_air_at_plane(p.water_level);
    let needs_floor_tile = p.caves_enable && !p.reverse_caves && grid.any_air_at_plane(0);

    let t0 = Instant::now();
    let mesh = mesh_density_grid(&grid);
    let t_mesh_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    let t_total_ms = t_job_start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    log::trace!(
        "job {job_id} ({kind:?}) at ({}, {}): gen {t_gen_ms}ms mesh {t_mesh_ms}ms",
        pos.x,
        pos.z
    );

    let _ = tx.send(JobOut {
        pos,
        job_id,
        kind,
        grid,
        mesh,
        needs_water_tile,
        needs_floor_tile,
        t_gen_ms,
        t_mesh_ms,
        t_total_ms,
    });
}

/// Owns the worker pool and the job/result channels.
pub struct Runtime {
    job_tx_edit: Sender<GenJob>,
    job_tx_bg: Sender<GenJob>,
    res_rx: Receiver<JobOut>,
    res_tx: Sender<JobOut>,
    pool: Option<Arc<ThreadPool>>,
    world: Arc<World>,
    q_edit: Arc<AtomicUsize>,
    q_bg: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    workers: usize,
}

impl Runtime {
    /// Spawn `workers` threads serving both queues, edits first. `None`
    /// falls back to the machine's available parallelism.
    pub fn new(world: Arc<World>, workers: Option<usize>) -> Self {
        let workers = workers
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1);

        let (job_tx_edit, job_rx_edit) = unbounded::<GenJob>();
        let (job_tx_bg, job_rx_bg) = unbounded::<GenJob>();
        let (res_tx, res_rx) = unbounded::<JobOut>();

        let q_edit = Arc::new(AtomicUsize::new(0));
        let q_bg = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("karst-gen-{i}"))
                .build()
                .expect("gen pool"),
        );

        for _ in 0..workers {
            let edit_rx = job_rx_edit.clone();
            let bg_rx = job_rx_bg.clone();
            let tx = res_tx.clone();
            let world = world.clone();
            let q_edit = q_edit.clone();
            let q_bg = q_bg.clone();
            let inflight = inflight.clone();
            pool.spawn(move || {
                loop {
                    // Edits preempt background streaming.
                    match edit_rx.try_recv() {
                        Ok(job) => {
                            q_edit.fetch_sub(1, Ordering::Relaxed);
                            inflight.fetch_add(1, Ordering::Relaxed);
                            process_gen_job(job, JobKind::Edit, world.as_ref(), &tx);
                            inflight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match bg_rx.try_recv() {
                        Ok(job) => {
                            q_bg.fetch_sub(1, Ordering::Relaxed);
                            inflight.fetch_add(1, Ordering::Relaxed);
                            process_gen_job(job, JobKind::Bg, world.as_ref(), &tx);
                            inflight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    select! {
                        recv(edit_rx) -> res => match res {
                            Ok(job) => {
                                q_edit.fetch_sub(1, Ordering::Relaxed);
                                inflight.fetch_add(1, Ordering::Relaxed);
                                process_gen_job(job, JobKind::Edit, world.as_ref(), &tx);
                                inflight.fetch_sub(1, Ordering::Relaxed);
                            }
                            Err(_) => break,
                        },
                        recv(bg_rx) -> res => match res {
                            Ok(job) => {
                                q_bg.fetch_sub(1, Ordering::Relaxed);
                                inflight.fetch_add(1, Ordering::Relaxed);
                                process_gen_job(job, JobKind::Bg, world.as_ref(), &tx);
                                inflight.fetch_sub(1, Ordering::Relaxed);
                            }
                            Err(_) => break,
                        },
                    }
                }
            });
        }

        Self {
            job_tx_edit,
            job_tx_bg,
            res_rx,
            res_tx,
            pool: Some(pool),
            world,
            q_edit,
            q_bg,
            inflight,
            workers,
        }
    }

    /// A runtime with no worker threads; every submit runs on the caller's
    /// thread before returning. Used when threading is disabled in config.
    pub fn new_inline(world: Arc<World>) -> Self {
        let (job_tx_edit, _) = unbounded::<GenJob>();
        let (job_tx_bg, _) = unbounded::<GenJob>();
        let (res_tx, res_rx) = unbounded::<JobOut>();
        Self {
            job_tx_edit,
            job_tx_bg,
            res_rx,
            res_tx,
            pool: None,
            world,
            q_edit: Arc::new(AtomicUsize::new(0)),
            q_bg: Arc::new(AtomicUsize::new(0)),
            inflight: Arc::new(AtomicUsize::new(0)),
            workers: 1,
        }
    }

    pub fn submit_edit(&self, job: GenJob) {
        if self.pool.is_some() {
            self.q_edit.fetch_add(1, Ordering::Relaxed);
            let _ = self.job_tx_edit.send(job);
        } else {
            process_gen_job(job, JobKind::Edit, self.world.as_ref(), &self.res_tx);
        }
    }

    pub fn submit_bg(&self, job: GenJob) {
        if self.pool.is_some() {
            self.q_bg.fetch_add(1, Ordering::Relaxed);
            let _ = self.job_tx_bg.send(job);
        } else {
            process_gen_job(job, JobKind::Bg, self.world.as_ref(), &self.res_tx);
        }
    }

    /// Collect every finished job without blocking.
    pub fn drain_results(&self) -> Vec<JobOut> {
        self.res_rx.try_iter().collect()
    }

    #[inline]
    pub fn queued_edit(&self) -> usize {
        self.q_edit.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queued_bg(&self) -> usize {
        self.q_bg.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Worker thread count; the streamer uses this as its per-tick chunk
    /// creation budget.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers
    }
}
