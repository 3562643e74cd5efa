use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::{SendError, Sender, TrySendError};
use hashbrown::HashSet;
use veldt_chunk::{Chunk, ChunkState, ChunkStore, StateCounts};
use veldt_world::config::Streaming;
use veldt_world::{ChunkCoord, QueueFullPolicy, world_to_chunk};

use crate::SubmitError;
use crate::worker::{BuildJob, JobOut, QueueCounters};

/// Every chunk offset within Euclidean `radius` of `center`, inclusive.
/// Offsets that leave the `i32` grid are skipped.
pub fn spherical_chunk_coords(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
    if radius < 0 {
        return Vec::new();
    }
    let mut coords = Vec::new();
    let r_sq = i64::from(radius) * i64::from(radius);
    for dz in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = {
                let dx64 = i64::from(dx);
                let dz64 = i64::from(dz);
                dx64 * dx64 + dz64 * dz64
            };
            if dist_sq <= r_sq {
                coords.extend(center.checked_offset(dx, dz));
            }
        }
    }
    coords
}

/// Outcome of one `update` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamUpdate {
    pub viewer_chunk: ChunkCoord,
    pub chunk_changed: bool,
    pub recomputed: bool,
    pub enqueued: usize,
    pub deferred: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub states: StateCounts,
    pub queued: usize,
    pub in_flight: usize,
    pub visible: usize,
    pub rendered: usize,
    pub enqueued_total: u64,
    pub deferred_total: u64,
    pub failed_total: u64,
}

pub struct StreamingScheduler {
    store: Arc<ChunkStore>,
    world_size: f64,
    view_radius: i32,
    load_radius: i32,
    policy: QueueFullPolicy,
    job_tx: Sender<BuildJob>,
    counters: Arc<QueueCounters>,
    viewer_chunk: Option<ChunkCoord>,
    visible: Vec<Arc<Chunk>>,
    visible_set: HashSet<ChunkCoord>,
    render: Vec<Arc<Chunk>>,
    load_dirty: bool,
    next_job_id: u64,
    enqueued_total: u64,
    deferred_total: u64,
    failed_total: u64,
}

impl StreamingScheduler {
    pub fn new(
        store: Arc<ChunkStore>,
        streaming: &Streaming,
        world_size: f64,
        job_tx: Sender<BuildJob>,
        counters: Arc<QueueCounters>,
    ) -> Self {
        Self {
            store,
            world_size,
            view_radius: streaming.view_radius,
            load_radius: streaming.load_radius,
            policy: streaming.queue_full_policy,
            job_tx,
            counters,
            viewer_chunk: None,
            visible: Vec::new(),
            visible_set: HashSet::new(),
            render: Vec::new(),
            load_dirty: false,
            next_job_id: 0,
            enqueued_total: 0,
            deferred_total: 0,
            failed_total: 0,
        }
    }

    /// Chunks within `radius` of `center`, created as placeholders on first touch.
    pub fn visibility_list(&self, center: ChunkCoord, radius: i32) -> Vec<Arc<Chunk>> {
        spherical_chunk_coords(center, radius)
            .into_iter()
            .map(|c| self.store.get_or_create(c))
            .collect()
    }

    /// The part of the visibility list that still needs a build, nearest first.
    pub fn load_list(&self, center: ChunkCoord, radius: i32) -> Vec<Arc<Chunk>> {
        let mut out: Vec<Arc<Chunk>> = self
            .visibility_list(center, radius)
            .into_iter()
            .filter(|c| !matches!(c.state(), ChunkState::Loaded | ChunkState::Failed))
            .collect();
        out.sort_by_key(|c| c.coord().distance_sq(center));
        out
    }

    /// Loaded chunks of `visibility`.
    pub fn render_list(visibility: &[Arc<Chunk>]) -> Vec<Arc<Chunk>> {
        visibility
            .iter()
            .filter(|c| c.state() == ChunkState::Loaded)
            .cloned()
            .collect()
    }

    /// Hand `chunk` to the workers unless it was already requested.
    /// `Ok(true)` when a job was queued.
    pub fn enqueue(&mut self, chunk: &Arc<Chunk>) -> Result<bool, SubmitError> {
        if !chunk.try_begin_loading() {
            return Ok(false);
        }
        let job = BuildJob {
            chunk: Arc::clone(chunk),
            job_id: self.next_job_id,
        };
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        let sent = match self.policy {
            QueueFullPolicy::Block => self.job_tx.send(job).map_err(|SendError(_)| None),
            QueueFullPolicy::Defer => self.job_tx.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => Some(()),
                TrySendError::Disconnected(_) => None,
            }),
        };
        match sent {
            Ok(()) => {
                self.next_job_id += 1;
                self.enqueued_total += 1;
                Ok(true)
            }
            Err(full) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                chunk.defer();
                self.load_dirty = true;
                match full {
                    Some(()) => {
                        self.deferred_total += 1;
                        Ok(false)
                    }
                    None => Err(SubmitError::Disconnected),
                }
            }
        }
    }

    /// Recompute lists when the viewer crosses into another chunk or the load
    /// list changed since last time, then enqueue what is missing.
    pub fn update(&mut self, viewer_x: f64, viewer_z: f64) -> Result<StreamUpdate, SubmitError> {
        let center = world_to_chunk(viewer_x, viewer_z, self.world_size);
        let chunk_changed = self.viewer_chunk != Some(center);
        let mut out = StreamUpdate {
            viewer_chunk: center,
            chunk_changed,
            ..StreamUpdate::default()
        };
        if !chunk_changed && !self.load_dirty {
            return Ok(out);
        }
        if chunk_changed {
            log::debug!("viewer entered chunk ({}, {})", center.cx, center.cz);
        }
        self.viewer_chunk = Some(center);
        self.load_dirty = false;
        out.recomputed = true;

        self.visible = self.visibility_list(center, self.view_radius);
        self.visible_set = self.visible.iter().map(|c| c.coord()).collect();
        let load = self.load_list(center, self.load_radius);
        let deferred_before = self.deferred_total;
        for chunk in &load {
            if chunk.state() != ChunkState::Unrequested {
                continue;
            }
            if self.enqueue(chunk)? {
                out.enqueued += 1;
            }
        }
        out.deferred = (self.deferred_total - deferred_before) as usize;
        if out.deferred > 0 {
            log::warn!(
                "build queue full: deferred {} chunk requests around ({}, {})",
                out.deferred,
                center.cx,
                center.cz
            );
        }
        self.render = Self::render_list(&self.visible);
        Ok(out)
    }

    /// Chunks whose builds completed since the last call and now wait for upload.
    /// Failures are counted and dropped from future load lists.
    pub fn drain_ready(&mut self, results: impl IntoIterator<Item = JobOut>) -> Vec<Arc<Chunk>> {
        let mut ready = Vec::new();
        for out in results {
            if let Some(err) = &out.failure {
                self.failed_total += 1;
                self.load_dirty = true;
                log::debug!(
                    "chunk ({}, {}) marked failed: {}",
                    out.coord.cx,
                    out.coord.cz,
                    err
                );
                continue;
            }
            log::debug!(
                target: "perf",
                "ms build={} total={} chunk_job cx={} cz={} job={}",
                out.t_build_ms,
                out.t_total_ms,
                out.coord.cx,
                out.coord.cz,
                out.job_id
            );
            if let Some(chunk) = self.store.get(out.coord) {
                if chunk.state() == ChunkState::ReadyForUpload {
                    ready.push(chunk);
                }
            }
        }
        ready
    }

    /// Record that `coord`'s buffers are on the GPU. It joins the render list
    /// right away if it is in view.
    pub fn mark_loaded(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.store.get(coord) else {
            return false;
        };
        if !chunk.mark_loaded() {
            return false;
        }
        if self.visible_set.contains(&coord) {
            self.render.push(chunk);
        }
        true
    }

    #[inline]
    pub fn viewer_chunk(&self) -> Option<ChunkCoord> {
        self.viewer_chunk
    }

    #[inline]
    pub fn visible(&self) -> &[Arc<Chunk>] {
        &self.visible
    }

    #[inline]
    pub fn render(&self) -> &[Arc<Chunk>] {
        &self.render
    }

    #[inline]
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn stats(&self) -> StreamStats {
        let (queued, in_flight) = self.counters.snapshot();
        StreamStats {
            states: self.store.state_counts(),
            queued,
            in_flight,
            visible: self.visible.len(),
            rendered: self.render.len(),
            enqueued_total: self.enqueued_total,
            deferred_total: self.deferred_total,
            failed_total: self.failed_total,
        }
    }
}
