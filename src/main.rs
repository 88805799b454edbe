//! Headless terrain streaming driver: loads config, spins up the worker
//! runtime, and runs the streamer for a fixed number of ticks.
#![forbid(unsafe_code)]

mod sink;
mod store;
mod streamer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use karst_runtime::Runtime;
use karst_world::{HeightMapRaster, TerrainParams, World, load_params_from_path};

use crate::sink::LogSink;
use crate::streamer::Streamer;

/// Seed offset for the base-height raster so it never mirrors the 3D field.
const HEIGHT_MAP_SEED_OFFSET: i32 = 7919;

#[derive(Parser, Debug)]
#[command(name = "karst", about = "Chunked marching-cubes terrain engine")]
struct Args {
    /// Path to the terrain config file.
    #[arg(long, default_value = "config/terrain.toml")]
    config: PathBuf,
    /// Override the world seed.
    #[arg(long)]
    seed: Option<i32>,
    /// Override the view distance in world units.
    #[arg(long)]
    view_distance: Option<f32>,
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Run all generation on the main thread.
    #[arg(long)]
    no_threading: bool,
    /// World units the viewer walks east per tick, exercising streaming.
    #[arg(long, default_value_t = 1)]
    walk_speed: i32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut params = match load_params_from_path(&args.config) {
        Ok(p) => p,
        Err(e) => {
            log::warn!(
                "config {:?} not usable ({e}); falling back to defaults",
                args.config
            );
            TerrainParams::default()
        }
    };
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(vd) = args.view_distance {
        params.view_distance = vd.max(0.0);
    }
    if args.no_threading {
        params.threading_enable = false;
    }

    log::info!(
        "world seed {} scale {} octaves {} view {}",
        params.seed,
        params.noise.scale,
        params.noise.octaves,
        params.view_distance
    );

    let raster = HeightMapRaster::from_noise(
        params.seed.wrapping_add(HEIGHT_MAP_SEED_OFFSET),
        params.raster_size,
        params.raster_frequency,
        params.raster_amplitude,
    );
    let world = Arc::new(World::new(params, Box::new(raster)));

    let runtime = if world.params.threading_enable {
        Runtime::new(world.clone(), world.params.workers)
    } else {
        Runtime::new_inline(world.clone())
    };
    let workers = runtime.worker_count();
    log::info!(
        "runtime: {} worker(s), threading {}",
        workers,
        if world.params.threading_enable { "on" } else { "off" }
    );

    let mut streamer = Streamer::new(world.clone(), runtime);
    let mut sink = LogSink::default();

    let t_start = Instant::now();
    let mut viewer_x = world.params.start_x;
    let viewer_z = world.params.start_z;
    let mut demo_edit_done = false;
    for tick in 0..args.ticks {
        streamer.tick(&mut sink);
        if streamer.startup_done() && !demo_edit_done {
            // One round of terrain edits near the spawn chunk, standing in
            // for player digging and building.
            let v = streamer.viewer();
            for dz in -1..=1 {
                for dx in -1..=1 {
                    streamer.remove_terrain(v.x + 8 + dx, 20, v.z + 8 + dz);
                }
            }
            streamer.place_terrain(v.x + 4, 30, v.z + 4);
            demo_edit_done = true;
        }
        if streamer.startup_done() && args.walk_speed != 0 {
            viewer_x += args.walk_speed;
            streamer.set_viewer_world_pos(viewer_x, viewer_z);
        }
        if tick % 120 == 0 {
            log::debug!(
                "tick {tick}: {} chunks ({} visible), {} meshed, queue {}",
                streamer.store.len(),
                streamer.store.visible_last_pass.len(),
                sink.meshed,
                streamer.queue_depth()
            );
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    log::info!(
        "ran {} ticks in {:.1}s: {} chunks, {} meshes installed, {} triangles, {} water tiles, {} floor tiles",
        args.ticks,
        t_start.elapsed().as_secs_f32(),
        streamer.store.len(),
        sink.meshed,
        sink.triangles,
        sink.water_planes,
        sink.floor_planes
    );
}
