//! Render targets, deferred drawing and the rendering context.

/// Rendering context: framebuffer stack, lazy state flushing and the
/// clip/matrix/path API.
pub mod context;
/// Onscreen and offscreen framebuffers.
pub mod framebuffer;
/// Deferred quad batches.
pub mod journal;
