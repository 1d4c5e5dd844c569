//! External animation-engine contract.
//!
//! The engine that parses documents, interpolates the timeline, and
//! rasterizes layers is an external collaborator; the pipeline consumes it
//! through these traits.

use crate::foundation::error::KinoraResult;
use crate::render::target::RasterTarget;

/// One live animation built from a processed document.
///
/// Instances are not safe to share across concurrent callers: every render
/// worker builds its own from the same document text. The trait therefore
/// requires `Send` (an instance moves to its worker thread once) but never
/// `Sync`.
pub trait AnimationInstance: Send {
    /// Canvas size in pixels.
    fn size(&self) -> (u32, u32);

    /// Animation duration in seconds.
    fn duration_secs(&self) -> f64;

    /// Frame rate declared by the document.
    fn native_frame_rate(&self) -> f64;

    /// Seek the timeline to an absolute time in seconds.
    fn seek_to_time(&mut self, seconds: f64);

    /// Render the current timeline state into `target`.
    fn render_into(&mut self, target: &mut RasterTarget) -> KinoraResult<()>;
}

/// Builds [`AnimationInstance`]s from serialized document text.
///
/// `build` returning `None` means the document cannot be interpreted at all;
/// the pipeline treats that as fatal.
pub trait EngineBuilder: Sync {
    fn build(&self, document: &str) -> Option<Box<dyn AnimationInstance>>;
}
