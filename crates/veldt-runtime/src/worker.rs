use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use veldt_chunk::Chunk;
use veldt_mesh_cpu::{ChunkGenerator, GenerationError, TexturePalette};
use veldt_world::{ChunkCoord, HeightSource};

#[derive(Clone, Debug)]
pub struct BuildJob {
    pub chunk: Arc<Chunk>,
    pub job_id: u64,
}

impl BuildJob {
    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.chunk.coord()
    }
}

/// Completion notice. The build itself is already published on the chunk.
#[derive(Debug)]
pub struct JobOut {
    pub coord: ChunkCoord,
    pub job_id: u64,
    pub failure: Option<GenerationError>,
    pub t_build_ms: u32,
    pub t_total_ms: u32,
}

/// Jobs waiting in the queue and jobs a worker is running.
#[derive(Debug, Default)]
pub struct QueueCounters {
    pub queued: AtomicUsize,
    pub in_flight: AtomicUsize,
}

impl QueueCounters {
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.queued.load(Ordering::Relaxed),
            self.in_flight.load(Ordering::Relaxed),
        )
    }
}

fn process_build_job(
    job: BuildJob,
    generator: &ChunkGenerator,
    field: &dyn HeightSource,
    palette: &TexturePalette,
    tx: &Sender<JobOut>,
) {
    let t_job_start = Instant::now();
    let coord = job.coord();
    let (failure, t_build_ms) = match generator.build(coord, field, palette) {
        Ok(out) => {
            let ms = out.build_ms;
            if !job.chunk.publish(out) {
                log::warn!(
                    "chunk ({}, {}) was not loading when its build finished",
                    coord.cx,
                    coord.cz
                );
            }
            (None, ms)
        }
        Err(e) => {
            log::warn!("chunk ({}, {}) generation failed: {}", coord.cx, coord.cz, e);
            job.chunk.fail(e.to_string());
            (Some(e), 0)
        }
    };
    let t_total_ms = t_job_start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    let _ = tx.send(JobOut {
        coord,
        job_id: job.job_id,
        failure,
        t_build_ms,
        t_total_ms,
    });
}

/// Fixed set of generation workers pulling from one bounded FIFO.
pub struct WorkerPool {
    job_tx: Sender<BuildJob>,
    res_rx: Receiver<JobOut>,
    _pool: Arc<ThreadPool>,
    counters: Arc<QueueCounters>,
    pub workers: usize,
    pub capacity: usize,
}

impl WorkerPool {
    pub fn new(
        workers: usize,
        capacity: usize,
        generator: Arc<ChunkGenerator>,
        field: Arc<dyn HeightSource>,
        palette: Arc<TexturePalette>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let (job_tx, job_rx) = bounded::<BuildJob>(capacity);
        let (res_tx, res_rx) = unbounded::<JobOut>();
        let counters = Arc::new(QueueCounters::default());
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("veldt-gen-{i}"))
                .build()?,
        );
        for i in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let generator = Arc::clone(&generator);
            let field = Arc::clone(&field);
            let palette = Arc::clone(&palette);
            let counters = Arc::clone(&counters);
            pool.spawn(move || {
                log::debug!("generation worker {i} started");
                while let Ok(job) = rx.recv() {
                    counters.queued.fetch_sub(1, Ordering::Relaxed);
                    counters.in_flight.fetch_add(1, Ordering::Relaxed);
                    process_build_job(job, &generator, field.as_ref(), &palette, &tx);
                    counters.in_flight.fetch_sub(1, Ordering::Relaxed);
                }
                log::debug!("generation worker {i} stopped");
            });
        }
        log::info!("worker pool started: workers={workers} queue_capacity={capacity}");
        Ok(Self {
            job_tx,
            res_rx,
            _pool: pool,
            counters,
            workers,
            capacity,
        })
    }

    pub fn sender(&self) -> Sender<BuildJob> {
        self.job_tx.clone()
    }

    pub fn counters(&self) -> Arc<QueueCounters> {
        Arc::clone(&self.counters)
    }

    pub fn drain_worker_results(&self) -> Vec<JobOut> {
        self.res_rx.try_iter().collect()
    }

    /// Block up to `timeout` for the next completion.
    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobOut> {
        self.res_rx.recv_timeout(timeout).ok()
    }
}
