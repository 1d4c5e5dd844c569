//! Concurrent frame rendering.
//!
//! The pool fans frame indices out across workers, each owning a private
//! engine instance (instances cannot be shared across threads), a raster
//! target, and a conversion scratch surface. Indices are assigned
//! round-robin up front; per-frame cost is roughly uniform, so the static
//! partition needs no runtime coordination between workers.
//!
//! In stream mode one writer thread reassembles out-of-order completions
//! into strict frame order; in file mode the zero-padded file names encode
//! order and no writer exists.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use anyhow::Context as _;
use tracing::{debug, warn};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{KinoraError, KinoraResult};
use crate::render::encode::{self, PngCompression};
use crate::render::engine::{AnimationInstance, EngineBuilder};
use crate::render::sink::{FrameMsg, FrameSink, SinkConfig, drain_ordered};
use crate::render::target::{RasterTarget, ScratchSurface};

/// Output frame rate used when neither the config nor the document supplies
/// one.
const DEFAULT_FPS: f64 = 30.0;

/// Options for a render run.
#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    /// Target output frame rate. `None` uses the animation's native rate.
    pub fps: Option<f64>,
    /// Worker count override. `None` uses available hardware concurrency.
    pub workers: Option<usize>,
    /// PNG compression-speed trade-off.
    pub compression: PngCompression,
    /// Completed frames per progress report, to limit cross-thread
    /// synchronization.
    pub progress_batch: u64,
    /// Bounded capacity of the worker-to-writer channel (stream mode).
    pub channel_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: None,
            workers: None,
            compression: PngCompression::default(),
            progress_batch: 10,
            channel_capacity: 8,
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> KinoraResult<()> {
        if let Some(fps) = self.fps
            && (!fps.is_finite() || fps <= 0.0)
        {
            return Err(KinoraError::validation("fps must be finite and > 0 when set"));
        }
        if self.workers == Some(0) {
            return Err(KinoraError::validation("workers must be >= 1 when set"));
        }
        Ok(())
    }
}

/// Where rendered frames go.
pub enum FrameOutput<'a> {
    /// One PNG file per frame; file names encode frame order.
    Directory(&'a Path),
    /// Encoded frames pushed into a sink in strict ascending order.
    Stream(&'a mut dyn FrameSink),
}

/// Outcome summary of a render run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames in the run.
    pub frames_total: u64,
    /// Frames rendered and delivered.
    pub frames_rendered: u64,
    /// Frames that failed to snapshot, convert, encode, or write. Failures
    /// are isolated per frame and never abort the run.
    pub frames_failed: u64,
}

struct WorkerContext {
    thread_id: usize,
    instance: Box<dyn AnimationInstance>,
    target: RasterTarget,
    scratch: ScratchSurface,
    frames: Vec<u64>,
}

struct WorkerShared<'a> {
    times: &'a [f64],
    frames_total: u64,
    compression: PngCompression,
    progress_batch: u64,
    completed: &'a AtomicU64,
    failed: &'a AtomicU64,
}

/// Render every frame of `document` through `builder`.
///
/// The document must already be processed (overrides resolved); it is
/// read-only from here on, and every worker builds its own engine instance
/// from it. Engine build and surface allocation failures are fatal;
/// per-frame failures are counted into the returned stats.
pub fn render_frames(
    builder: &dyn EngineBuilder,
    document: &str,
    config: &RenderConfig,
    output: FrameOutput<'_>,
) -> KinoraResult<RenderStats> {
    config.validate()?;

    let probe = builder
        .build(document)
        .ok_or_else(|| KinoraError::render("engine failed to build animation from document"))?;
    let (width, height) = probe.size();
    if width == 0 || height == 0 {
        return Err(KinoraError::render("animation has a zero-sized canvas"));
    }
    let duration = probe.duration_secs();
    let native_fps = probe.native_frame_rate();
    drop(probe);

    let fps = config
        .fps
        .or_else(|| (native_fps > 0.0).then_some(native_fps))
        .unwrap_or(DEFAULT_FPS);
    let frames_total = (duration * fps).ceil().max(0.0) as u64;
    debug!(width, height, duration, fps, frames_total, "starting frame render");

    let worker_count = config.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    });

    let times = sample_times(frames_total, duration);
    let partition = partition_frames(frames_total, worker_count);

    // One private engine instance per busy worker, built up front from the
    // same processed text. A build failure here is fatal: nothing has been
    // rendered yet.
    let mut contexts = Vec::new();
    for (thread_id, frames) in partition.into_iter().enumerate() {
        if frames.is_empty() {
            continue;
        }
        let instance = builder.build(document).ok_or_else(|| {
            KinoraError::render(format!(
                "engine failed to build animation instance for worker {thread_id}"
            ))
        })?;
        contexts.push(WorkerContext {
            thread_id,
            instance,
            target: RasterTarget::new(width, height)?,
            scratch: ScratchSurface::new(),
            frames,
        });
    }
    debug!(workers = contexts.len(), "worker contexts ready");

    let completed = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    let shared = WorkerShared {
        times: &times,
        frames_total,
        compression: config.compression,
        progress_batch: config.progress_batch.max(1),
        completed: &completed,
        failed: &failed,
    };

    let pool = build_thread_pool(contexts.len().max(1))?;

    match output {
        FrameOutput::Directory(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

            pool.scope(|scope| {
                for ctx in contexts {
                    let shared = &shared;
                    scope.spawn(move |_| {
                        run_worker(ctx, shared, |frame, bytes| {
                            let Some(bytes) = bytes else { return };
                            if let Err(e) = encode::write_frame_file(dir, FrameIndex(frame), &bytes)
                            {
                                warn!(frame, error = %e, "failed to write frame file");
                                shared.failed.fetch_add(1, Ordering::Relaxed);
                            }
                        });
                    });
                }
            });
        }
        FrameOutput::Stream(sink) => {
            let cfg = SinkConfig {
                width,
                height,
                fps,
                frames_total,
            };
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(config.channel_capacity.max(1));
            let failed_ref = &failed;

            std::thread::scope(|threads| -> KinoraResult<()> {
                let writer = threads.spawn(move || drain_ordered(&rx, sink, cfg, failed_ref));

                pool.scope(|scope| {
                    for ctx in contexts {
                        let shared = &shared;
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            run_worker(ctx, shared, |frame, bytes| {
                                // A send error means the writer is gone; its
                                // own error surfaces at join below.
                                let _ = tx.send(FrameMsg { index: frame, bytes });
                            });
                        });
                    }
                });
                drop(tx);

                writer
                    .join()
                    .map_err(|_| KinoraError::render("ordered writer thread panicked"))?
            })?;
        }
    }

    let frames_failed = failed.load(Ordering::Relaxed);
    let stats = RenderStats {
        frames_total,
        frames_rendered: frames_total.saturating_sub(frames_failed),
        frames_failed,
    };
    if stats.frames_failed > 0 {
        warn!(
            failed = stats.frames_failed,
            total = stats.frames_total,
            "some frames failed to render"
        );
    } else {
        debug!(total = stats.frames_total, "all frames rendered");
    }
    Ok(stats)
}

fn run_worker(
    mut ctx: WorkerContext,
    shared: &WorkerShared<'_>,
    mut deliver: impl FnMut(u64, Option<Vec<u8>>),
) {
    let frames = std::mem::take(&mut ctx.frames);
    let mut local_completed = 0u64;

    for frame in frames {
        let time = shared.times[frame as usize];
        match render_one(&mut ctx, time, shared.compression) {
            Ok(bytes) => {
                deliver(frame, Some(bytes));
                local_completed += 1;
                if local_completed.is_multiple_of(shared.progress_batch) {
                    let done = shared
                        .completed
                        .fetch_add(shared.progress_batch, Ordering::Relaxed)
                        + shared.progress_batch;
                    debug!(done, total = shared.frames_total, "rendered frames");
                }
            }
            Err(e) => {
                warn!(
                    frame,
                    thread = ctx.thread_id,
                    error = %e,
                    "frame failed; skipping"
                );
                shared.failed.fetch_add(1, Ordering::Relaxed);
                deliver(frame, None);
            }
        }
    }

    let remainder = local_completed % shared.progress_batch;
    if remainder > 0 {
        let done = shared.completed.fetch_add(remainder, Ordering::Relaxed) + remainder;
        if done == shared.frames_total {
            debug!(done, total = shared.frames_total, "rendered frames");
        }
    }
}

fn render_one(ctx: &mut WorkerContext, time: f64, compression: PngCompression) -> KinoraResult<Vec<u8>> {
    ctx.target.clear_transparent();
    ctx.instance.seek_to_time(time);
    ctx.instance.render_into(&mut ctx.target)?;

    let snapshot = ctx.target.snapshot();
    let rgba = ctx.scratch.to_canonical(&snapshot)?;
    encode::encode_png(snapshot.width, snapshot.height, rgba, compression)
}

/// Seek time for each output frame, spanning `[0, duration]` inclusive.
pub fn sample_times(frames_total: u64, duration_secs: f64) -> Vec<f64> {
    (0..frames_total)
        .map(|i| {
            if i + 1 == frames_total {
                duration_secs
            } else {
                (i as f64) / ((frames_total - 1) as f64) * duration_secs
            }
        })
        .collect()
}

/// Round-robin assignment of frame indices to workers: frame `i` belongs to
/// worker `i % workers`. Covers every index exactly once.
pub fn partition_frames(frames_total: u64, workers: usize) -> Vec<Vec<u64>> {
    let workers = workers.max(1);
    let mut parts = vec![Vec::new(); workers];
    for i in 0..frames_total {
        parts[(i % workers as u64) as usize].push(i);
    }
    parts
}

fn build_thread_pool(threads: usize) -> KinoraResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| KinoraError::render(format!("failed to build worker thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_round_robin_and_complete() {
        let parts = partition_frames(10, 4);
        assert_eq!(parts[0], vec![0, 4, 8]);
        assert_eq!(parts[1], vec![1, 5, 9]);
        assert_eq!(parts[2], vec![2, 6]);
        assert_eq!(parts[3], vec![3, 7]);

        let mut all: Vec<u64> = parts.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn partition_handles_more_workers_than_frames() {
        let parts = partition_frames(2, 8);
        assert_eq!(parts.iter().filter(|p| !p.is_empty()).count(), 2);
        assert_eq!(parts.iter().flatten().count(), 2);
    }

    #[test]
    fn sample_times_span_the_full_duration() {
        let times = sample_times(5, 2.0);
        assert_eq!(times.len(), 5);
        assert_eq!(times[0], 0.0);
        assert_eq!(times[4], 2.0);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_frame_samples_the_end() {
        assert_eq!(sample_times(1, 3.0), vec![3.0]);
        assert!(sample_times(0, 3.0).is_empty());
    }

    #[test]
    fn config_validation() {
        assert!(
            RenderConfig {
                fps: Some(0.0),
                ..RenderConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            RenderConfig {
                workers: Some(0),
                ..RenderConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(RenderConfig::default().validate().is_ok());
    }
}
