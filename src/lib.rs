//! Clip, framebuffer and matrix state management for a GL rendering context.
//!
//! The crate tracks what a fixed-function GL pipeline needs to know before
//! drawing and flushes it lazily:
//!
//! - A persistent, shareable [`ClipStack`] per framebuffer, flushed to the
//!   scissor box, user clip planes and the stencil buffer
//! - A framebuffer stack with onscreen and offscreen targets
//! - Modelview/projection [`MatrixStack`]s and a deferred quad journal
//!
//! All GL traffic goes through the [`GlDriver`] trait. [`RecordingDriver`]
//! implements it by logging calls and simulating the resulting state, which
//! is what the tests and the `cogl-trace` tool run against.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Clip stacks and per-framebuffer clip state.
pub mod clip;
/// The GL binding seam and a recording implementation.
pub mod driver;
/// Framebuffers, the journal and the rendering context.
pub mod render;
/// JSON draw scripts.
pub mod script;
/// Matrices and matrix stacks.
pub mod transform;

pub use crate::foundation::config::{ContextConfig, DEBUG_ENV, DebugFlags, Features};
pub use crate::foundation::core::{BezPath, Color, Point, Viewport, WindowRect};
pub use crate::foundation::error::{CoglError, CoglResult};

pub use crate::clip::stack::{ClipEntry, ClipStack};
pub use crate::clip::state::ClipState;
pub use crate::driver::recording::{GlCall, GlState, RecordingDriver};
pub use crate::driver::{
    Attachment, Capability, GlDriver, Quad, RenderbufferFormat, StencilFunc, StencilOp,
    TextureTarget,
};
pub use crate::render::context::Context;
pub use crate::render::framebuffer::{FlushFlags, Framebuffer, Texture};
pub use crate::render::journal::{Journal, JournalEntry};
pub use crate::script::{Op, Script, Trace, run_script};
pub use crate::transform::matrix::Matrix;
pub use crate::transform::stack::{MatrixMode, MatrixStack};
