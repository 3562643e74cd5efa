use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashMap;
use veldt_chunk::{Chunk, ChunkState, ChunkStore};
use veldt_geom::{Mat4, Vec3};
use veldt_mesh_cpu::{
    ChunkGenerator, GraphicsBackend, MeshBuild, SkySample, SurfaceBand, TextureId, TexturePalette,
    build_dome,
};
use veldt_vegetation::Gaia;
use veldt_world::{ChunkCoord, HeightSource, NoiseField, TerrainConfig};

use crate::SessionError;
use crate::scheduler::{StreamStats, StreamUpdate, StreamingScheduler};
use crate::worker::WorkerPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub update: StreamUpdate,
    pub uploaded: usize,
    /// Uploads the backend refused this frame; those chunks are retried next frame.
    pub upload_failures: usize,
    pub vegetation_created: usize,
    pub vegetation_redrawn: bool,
    pub buckets_uploaded: usize,
    pub terrain_draws: usize,
    pub sky_drawn: bool,
}

/// One streamed world seen from one viewer. Owns the store, noise field,
/// vegetation, scheduler, and workers; GPU handles stay on the calling thread.
pub struct TerrainSession<H> {
    cfg: TerrainConfig,
    field: Arc<NoiseField>,
    palette: Arc<TexturePalette>,
    scheduler: StreamingScheduler,
    workers: WorkerPool,
    gaia: Gaia<H>,
    meshes: HashMap<ChunkCoord, (H, Mat4)>,
    pending: VecDeque<Arc<Chunk>>,
    terrain_textures: Vec<TextureId>,
    sky_mesh: Option<MeshBuild>,
    sky_handle: Option<H>,
    clock: f64,
}

impl<H: Copy> TerrainSession<H> {
    pub fn new(cfg: TerrainConfig) -> Result<Self, SessionError> {
        cfg.validate()?;
        let field = Arc::new(NoiseField::standard(&cfg.noise)?);
        let palette = Arc::new(TexturePalette::from_config(&cfg.palette));
        let generator = Arc::new(ChunkGenerator::new(&cfg));
        let heights: Arc<dyn HeightSource> = field.clone();
        let workers = WorkerPool::new(
            cfg.streaming.worker_count,
            cfg.streaming.queue_capacity,
            generator,
            heights,
            Arc::clone(&palette),
        )?;
        let store = Arc::new(ChunkStore::new());
        let scheduler = StreamingScheduler::new(
            store,
            &cfg.streaming,
            cfg.chunk.world_size,
            workers.sender(),
            workers.counters(),
        );
        let gaia = Gaia::new(&cfg.vegetation, cfg.chunk.step() as f32, &palette);
        let mut terrain_textures: Vec<TextureId> = SurfaceBand::DESCENDING
            .iter()
            .filter_map(|b| palette.id(b.texture_name()))
            .collect();
        terrain_textures.sort();
        terrain_textures.dedup();
        let sky_mesh = cfg
            .sky
            .enabled
            .then(|| build_dome(cfg.sky.radius, cfg.sky.segments));
        Ok(Self {
            cfg,
            field,
            palette,
            scheduler,
            workers,
            gaia,
            meshes: HashMap::new(),
            pending: VecDeque::new(),
            terrain_textures,
            sky_mesh,
            sky_handle: None,
            clock: 0.0,
        })
    }

    /// Request the chunks around the starting position before the first frame.
    pub fn warm_start(&mut self, viewer: Vec3) -> Result<StreamUpdate, SessionError> {
        let update = self
            .scheduler
            .update(f64::from(viewer.x), f64::from(viewer.z))?;
        log::info!(
            "warm start at chunk ({}, {}): {} builds queued",
            update.viewer_chunk.cx,
            update.viewer_chunk.cz,
            update.enqueued
        );
        Ok(update)
    }

    /// Advance one frame: stream, upload finished chunks, maintain vegetation,
    /// and queue every draw on `backend`.
    pub fn frame<B>(&mut self, backend: &mut B, viewer: Vec3, dt: f32) -> Result<FrameReport, SessionError>
    where
        B: GraphicsBackend<Handle = H>,
    {
        self.clock += f64::from(dt);
        let mut report = FrameReport {
            update: self
                .scheduler
                .update(f64::from(viewer.x), f64::from(viewer.z))?,
            ..FrameReport::default()
        };
        let viewer_chunk = report.update.viewer_chunk;

        let ready = self
            .scheduler
            .drain_ready(self.workers.drain_worker_results());
        self.pending.extend(ready);
        self.upload_pending(backend, &mut report);

        if report.update.chunk_changed {
            self.gaia
                .redraw_all_chunks(self.scheduler.render(), viewer_chunk);
            report.vegetation_redrawn = true;
        }
        for chunk in self.scheduler.render() {
            if chunk.archetypes().is_none() {
                report.vegetation_created += self.gaia.create_chunk_vegetation(chunk, viewer_chunk);
            }
        }
        report.buckets_uploaded = self.gaia.upload_dirty(backend)?;

        report.sky_drawn = self.draw_sky(backend, viewer);

        for chunk in self.scheduler.render() {
            if let Some((handle, model)) = self.meshes.get(&chunk.coord()) {
                backend.draw(*handle, model, &self.terrain_textures);
                report.terrain_draws += 1;
            }
        }
        self.gaia.draw(backend, self.clock);
        Ok(report)
    }

    /// Upload finished chunks in arrival order. A refused upload leaves the
    /// chunk ReadyForUpload at the front of the queue for the next frame.
    fn upload_pending<B>(&mut self, backend: &mut B, report: &mut FrameReport)
    where
        B: GraphicsBackend<Handle = H>,
    {
        while let Some(chunk) = self.pending.pop_front() {
            if chunk.state() != ChunkState::ReadyForUpload {
                continue;
            }
            let Some(data) = chunk.data() else {
                continue;
            };
            let handle = match backend.upload_mesh(&data.mesh) {
                Ok(handle) => handle,
                Err(err) => {
                    let coord = chunk.coord();
                    log::warn!("upload of chunk ({}, {}) failed: {}", coord.cx, coord.cz, err);
                    self.pending.push_front(chunk);
                    report.upload_failures += 1;
                    return;
                }
            };
            self.meshes
                .insert(chunk.coord(), (handle, data.model_transform()));
            self.scheduler.mark_loaded(chunk.coord());
            report.uploaded += 1;
        }
    }

    /// Dome centred on the viewer. The mesh uploads on first use; a refused
    /// upload is retried next frame.
    fn draw_sky<B>(&mut self, backend: &mut B, viewer: Vec3) -> bool
    where
        B: GraphicsBackend<Handle = H>,
    {
        let Some(mesh) = &self.sky_mesh else {
            return false;
        };
        if self.sky_handle.is_none() {
            match backend.upload_mesh(mesh) {
                Ok(handle) => self.sky_handle = Some(handle),
                Err(err) => {
                    log::warn!("sky dome upload failed: {err}");
                    return false;
                }
            }
        }
        let Some(handle) = self.sky_handle else {
            return false;
        };
        backend.draw_sky(handle, &Mat4::translation(viewer), &self.sky_sample());
        true
    }

    /// Sun and sky colours at the session clock.
    pub fn sky_sample(&self) -> SkySample {
        SkySample::at(self.clock, &self.cfg.sky)
    }

    /// Chunks built by the workers but not yet on the GPU.
    #[inline]
    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> StreamStats {
        self.scheduler.stats()
    }

    #[inline]
    pub fn config(&self) -> &TerrainConfig {
        &self.cfg
    }

    #[inline]
    pub fn store(&self) -> &Arc<ChunkStore> {
        self.scheduler.store()
    }

    #[inline]
    pub fn scheduler(&self) -> &StreamingScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn gaia(&self) -> &Gaia<H> {
        &self.gaia
    }

    #[inline]
    pub fn palette(&self) -> &TexturePalette {
        &self.palette
    }

    #[inline]
    pub fn noise(&self) -> &NoiseField {
        &self.field
    }

    /// Ground height under world `(x, z)` in render units.
    pub fn ground_height(&self, x: f32, z: f32) -> f32 {
        (self.field.evaluate(f64::from(x), f64::from(z)) * f64::from(self.cfg.chunk.vertical_scale))
            as f32
    }

    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.clock
    }
}
