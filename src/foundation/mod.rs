//! Shared building blocks: errors, configuration and small value types.

/// Context configuration and runtime feature/debug flags.
pub mod config;
/// Plain value types shared by the clip and framebuffer code.
pub mod core;
/// Error taxonomy.
pub mod error;
