//! Context configuration: driver feature masks and `COGL_DEBUG` flags.

use crate::foundation::error::{CoglError, CoglResult};

/// Environment variable holding a list of debug keys.
pub const DEBUG_ENV: &str = "COGL_DEBUG";

bitflags::bitflags! {
    /// Optional driver capabilities the state code branches on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct Features: u32 {
        /// Four fixed-function user clip planes.
        const FOUR_CLIP_PLANES = 1 << 0;
        /// Framebuffer objects for offscreen rendering.
        const OFFSCREEN = 1 << 1;
        /// A stencil buffer on the window framebuffer.
        ///
        /// Informational only. Drivers report it, but clip flushing assumes a
        /// stencil buffer is always present and never reads this flag.
        const STENCIL_BUFFER = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Runtime debug switches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct DebugFlags: u32 {
        /// Log journal batch sizes.
        const BATCHING = 1 << 0;
        /// Log every quad as it enters the journal.
        const JOURNAL = 1 << 1;
        /// Flush the journal after every logged quad.
        const DISABLE_BATCHING = 1 << 2;
        /// Never turn transformed rectangles into window rectangles.
        const DISABLE_SOFTWARE_CLIP = 1 << 3;
    }
}

const DEBUG_KEYS: &[(&str, DebugFlags)] = &[
    ("batching", DebugFlags::BATCHING),
    ("journal", DebugFlags::JOURNAL),
    ("disable-batching", DebugFlags::DISABLE_BATCHING),
    ("disable-software-clip", DebugFlags::DISABLE_SOFTWARE_CLIP),
];

impl DebugFlags {
    /// Parse a `COGL_DEBUG` style list such as `"batching,disable-software-clip"`.
    ///
    /// Keys are case insensitive and may use `_` in place of `-`. The key
    /// `all` enables every flag. Unknown keys are skipped with a warning.
    pub fn parse(list: &str) -> Self {
        let mut flags = Self::empty();
        for raw in list
            .split([',', ' ', ':', ';'])
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            let key = raw.to_ascii_lowercase().replace('_', "-");
            if key == "all" {
                flags = Self::all();
                continue;
            }
            match DEBUG_KEYS.iter().find(|(name, _)| *name == key) {
                Some((_, f)) => flags |= *f,
                None => tracing::warn!(key = raw, "ignoring unknown COGL_DEBUG key"),
            }
        }
        flags
    }
}

/// Settings used to build a [`crate::Context`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Initial width of the onscreen window framebuffer.
    pub window_width: i32,
    /// Initial height of the onscreen window framebuffer.
    pub window_height: i32,
    /// Driver features to mask off even when the driver reports them.
    pub disabled_features: Features,
    /// Debug switches, usually merged from `COGL_DEBUG`.
    pub debug: DebugFlags,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_width: 640,
            window_height: 480,
            disabled_features: Features::empty(),
            debug: DebugFlags::empty(),
        }
    }
}

impl ContextConfig {
    /// Parse and validate a config from JSON text.
    pub fn from_json(text: &str) -> CoglResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| CoglError::config(format!("parse context config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Merge debug keys from the `COGL_DEBUG` environment variable.
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(DEBUG_ENV) {
            Ok(list) => self.with_debug_list(&list),
            Err(_) => self,
        }
    }

    /// Merge debug keys from a `COGL_DEBUG` style list.
    pub fn with_debug_list(mut self, list: &str) -> Self {
        self.debug |= DebugFlags::parse(list);
        self
    }

    /// Reject non-positive window sizes.
    pub fn validate(&self) -> CoglResult<()> {
        if self.window_width <= 0 || self.window_height <= 0 {
            return Err(CoglError::config(format!(
                "window size must be positive, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        Ok(())
    }

    /// Mask `reported` driver features with the configured disables.
    pub fn effective_features(&self, reported: Features) -> Features {
        reported - self.disabled_features
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
