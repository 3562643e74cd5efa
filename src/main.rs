mod camera;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use raylib::prelude::*;
use veldt_render_raylib::{RaylibBackend, ShaderSet, conv};
use veldt_runtime::TerrainSession;
use veldt_world::{TerrainConfig, load_config_from_path};

use camera::FlyCamera;

const DEFAULT_CONFIG: &str = "terrain.toml";

#[derive(Parser, Debug)]
#[command(name = "veldt", about = "Streamed procedural terrain with instanced vegetation")]
struct Args {
    /// TOML terrain config; `terrain.toml` in the working directory is used when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<i32>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    view_radius: Option<i32>,
    #[arg(long)]
    load_radius: Option<i32>,
    /// Log filter, e.g. `debug` or `info,perf=debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
    #[arg(long, default_value_t = 1280)]
    width: i32,
    #[arg(long, default_value_t = 720)]
    height: i32,
}

fn load_config(args: &Args) -> Result<TerrainConfig, Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            load_config_from_path(Path::new(DEFAULT_CONFIG))?
        }
        None => TerrainConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.noise.seed = seed;
    }
    if let Some(w) = args.workers {
        cfg.streaming.worker_count = w;
    }
    if let Some(r) = args.view_radius {
        cfg.streaming.view_radius = r;
        // Keep the load ring outside the view unless it was set explicitly.
        if args.load_radius.is_none() && cfg.streaming.load_radius < r {
            cfg.streaming.load_radius = r + 2;
        }
    }
    if let Some(r) = args.load_radius {
        cfg.streaming.load_radius = r;
    }
    Ok(cfg)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = &args.log_level {
        logger.parse_filters(filter);
    }
    logger.init();

    let cfg = load_config(&args)?;
    log::info!(
        "seed={} view_radius={} load_radius={} workers={} chunk={}x{} @ {}",
        cfg.noise.seed,
        cfg.streaming.view_radius,
        cfg.streaming.load_radius,
        cfg.streaming.worker_count,
        cfg.chunk.points_per_side,
        cfg.chunk.points_per_side,
        cfg.chunk.world_size
    );
    let mut session = TerrainSession::new(cfg)?;

    let (mut rl, thread) = raylib::init()
        .size(args.width, args.height)
        .title("Veldt")
        .resizable()
        .msaa_4x()
        .build();
    rl.set_target_fps(60);
    rl.disable_cursor();

    let shaders = ShaderSet::load(&mut rl, &thread, Path::new("."));
    let mut backend = RaylibBackend::new(&mut rl, &thread, session.palette(), shaders);

    let half = (session.config().chunk.world_size * 0.5) as f32;
    let start_y = session.ground_height(half, half) + 12.0;
    let mut cam = FlyCamera::new(Vector3::new(half, start_y, half));
    session.warm_start(conv::vec3_from_rl(cam.position))?;

    let mut last_report = Instant::now();
    while !rl.window_should_close() {
        let dt = rl.get_frame_time();
        cam.update(&mut rl, dt, |x, z| session.ground_height(x, z));
        let t_frame = Instant::now();
        let report = session.frame(&mut backend, conv::vec3_from_rl(cam.position), dt)?;
        let frame_ms = t_frame.elapsed().as_millis();
        if report.uploaded > 0 || report.vegetation_created > 0 {
            log::debug!(
                target: "perf",
                "ms={} frame uploaded={} vegetation_created={} buckets_uploaded={}",
                frame_ms,
                report.uploaded,
                report.vegetation_created,
                report.buckets_uploaded
            );
        }
        let stats = session.stats();
        if last_report.elapsed().as_secs() >= 5 {
            log::info!(
                "chunks loaded={} ready={} loading={} failed={} queued={} in_flight={} instances={}",
                stats.states.loaded,
                stats.states.ready,
                stats.states.loading,
                stats.states.failed,
                stats.queued,
                stats.in_flight,
                session.gaia().total_instances()
            );
            last_report = Instant::now();
        }

        let mut d = rl.begin_drawing(&thread);
        let [r, g, b] = backend.sky_sample().horizon;
        d.clear_background(Color::new(
            (r * 255.0) as u8,
            (g * 255.0) as u8,
            (b * 255.0) as u8,
            255,
        ));
        let draw = {
            let mut d3 = d.begin_mode3D(cam.to_camera3d());
            backend.flush(&mut d3)
        };
        let hud = [
            format!(
                "chunk ({}, {})  pos {:.0} {:.0} {:.0}  speed {:.0}",
                report.update.viewer_chunk.cx,
                report.update.viewer_chunk.cz,
                cam.position.x,
                cam.position.y,
                cam.position.z,
                cam.move_speed
            ),
            format!(
                "visible {}  rendered {}  loading {}  queued {}  in flight {}  failed {}",
                stats.visible,
                stats.rendered,
                stats.states.loading,
                stats.queued,
                stats.in_flight,
                stats.states.failed
            ),
            format!(
                "vegetation {}  grass {}  draw calls {}  sun {:.1}h",
                session.gaia().total_instances(),
                session.gaia().grass_count(),
                draw.draw_calls,
                session.sky_sample().hours
            ),
        ];
        for (i, line) in hud.iter().enumerate() {
            d.draw_text(line, 12, 12 + 22 * i as i32, 18, Color::DARKGRAY);
        }
        d.draw_fps(12, 12 + 22 * hud.len() as i32);
    }
    Ok(())
}
