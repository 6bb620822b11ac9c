//! Clip regions and their translation into GL state.

/// Save/restore frames of clip stacks.
pub mod state;
/// Persistent clip stack and its flush to scissor, clip planes and stencil.
pub mod stack;
