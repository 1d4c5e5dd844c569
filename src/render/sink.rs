//! Ordered frame sinks for stream-mode output.
//!
//! Workers complete frames in nondeterministic order; a sink must see them
//! in strict ascending frame order with no duplicates. The reassembly lives
//! in [`drain_ordered`], which a single writer thread runs against the
//! worker channel.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;

use tracing::warn;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{KinoraError, KinoraResult};

/// Parameters handed to a sink before the first frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SinkConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: f64,
    /// Total frames in the run. Failed frames are skipped, so fewer pushes
    /// may arrive.
    pub frames_total: u64,
}

/// Consumer of encoded frames in strictly ascending frame-index order.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> KinoraResult<()>;
    /// Push one encoded frame. Indices are strictly ascending; a failed
    /// frame's index is skipped entirely.
    fn push_frame(&mut self, index: FrameIndex, bytes: &[u8]) -> KinoraResult<()>;
    /// Called once after the last frame.
    fn end(&mut self) -> KinoraResult<()>;
}

/// Sink writing successive encoded frames into one byte stream.
///
/// Frames are concatenated with no delimiter; downstream demuxers rely on
/// the image format's own markers. Backpressure comes from the writer
/// blocking, which the single writer thread naturally respects.
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameSink for WriterSink<W> {
    fn begin(&mut self, _cfg: SinkConfig) -> KinoraResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, bytes: &[u8]) -> KinoraResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| KinoraError::render(format!("failed to write frame {index}: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| KinoraError::render(format!("failed to flush frame {index}: {e}")))?;
        Ok(())
    }

    fn end(&mut self) -> KinoraResult<()> {
        self.writer
            .flush()
            .map_err(|e| KinoraError::render(format!("failed to flush output stream: {e}")))
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, Vec<u8>)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in the order they were pushed.
    pub fn frames(&self) -> &[(FrameIndex, Vec<u8>)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> KinoraResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, bytes: &[u8]) -> KinoraResult<()> {
        self.frames.push((index, bytes.to_vec()));
        Ok(())
    }

    fn end(&mut self) -> KinoraResult<()> {
        Ok(())
    }
}

/// One completed (or failed) frame published by a worker.
#[derive(Debug)]
pub(crate) struct FrameMsg {
    pub(crate) index: u64,
    /// `None` marks a per-frame failure: the writer skips the index instead
    /// of waiting on it forever.
    pub(crate) bytes: Option<Vec<u8>>,
}

/// Consume worker messages and feed `sink` in strict ascending order.
///
/// Out-of-order completions park in a pending map until the next expected
/// index arrives. A disconnected channel with indices still missing means a
/// worker died without publishing; those frames are logged, counted as
/// failed, and skipped rather than blocked on.
pub(crate) fn drain_ordered(
    rx: &Receiver<FrameMsg>,
    sink: &mut dyn FrameSink,
    cfg: SinkConfig,
    failed_frames: &AtomicU64,
) -> KinoraResult<()> {
    sink.begin(cfg)?;

    let mut pending: HashMap<u64, Option<Vec<u8>>> = HashMap::new();
    let mut next: u64 = 0;
    let mut disconnected = false;

    while next < cfg.frames_total {
        if let Some(slot) = pending.remove(&next) {
            match slot {
                Some(bytes) => sink.push_frame(FrameIndex(next), &bytes)?,
                // Already counted by the worker that failed it.
                None => warn!(frame = next, "skipping failed frame in output stream"),
            }
            next += 1;
            continue;
        }

        if disconnected {
            warn!(frame = next, "frame was never produced; skipping");
            failed_frames.fetch_add(1, Ordering::Relaxed);
            next += 1;
            continue;
        }

        match rx.recv() {
            Ok(msg) => {
                pending.insert(msg.index, msg.bytes);
            }
            Err(_) => disconnected = true,
        }
    }

    sink.end()
}
