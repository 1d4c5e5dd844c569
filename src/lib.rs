//! Kinora turns a layered, keyframed vector-animation document into a
//! deterministic sequence of rasterized PNG frames.
//!
//! The pipeline has two halves:
//!
//! - [`resolve`](crate::resolve::resolve) rewrites the animation document
//!   before any rendering happens: per-layer text substitution with
//!   auto-fit font sizing, and per-asset image path substitution.
//! - [`render_frames`](crate::render::pool::render_frames) fans rendering
//!   out across worker-owned engine instances and either writes one PNG file
//!   per frame or streams encoded frames, in strict frame order, into a
//!   [`FrameSink`](crate::render::sink::FrameSink).
//!
//! The animation engine itself is an external collaborator, consumed through
//! the [`EngineBuilder`](crate::render::engine::EngineBuilder) and
//! [`AnimationInstance`](crate::render::engine::AnimationInstance) traits.
#![forbid(unsafe_code)]

mod foundation;

pub mod document;
pub mod overrides;
pub mod render;
pub mod resolve;
pub mod text;

pub use crate::foundation::core::FrameIndex;
pub use crate::foundation::error::{KinoraError, KinoraResult};

pub use crate::document::AnimationDocument;
pub use crate::overrides::{ImageOverride, OverrideSet, TextOverride};
pub use crate::render::encode::PngCompression;
pub use crate::render::engine::{AnimationInstance, EngineBuilder};
pub use crate::render::pool::{FrameOutput, RenderConfig, RenderStats, render_frames};
pub use crate::render::sink::{FrameSink, InMemorySink, SinkConfig, WriterSink};
pub use crate::resolve::{ResolveOptions, resolve};
pub use crate::text::measure::{MeasureMode, TextMeasurer, WidthMeasurer};
