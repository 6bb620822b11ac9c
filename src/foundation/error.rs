/// Convenience result type used across the crate.
pub type CoglResult<T> = Result<T, CoglError>;

/// Top-level error taxonomy for recoverable failures.
///
/// Programmer errors (popping an empty clip stack, popping the last
/// framebuffer, restoring past the initial clip frame) are not represented
/// here; they panic.
#[derive(thiserror::Error, Debug)]
pub enum CoglError {
    /// A call into the GL binding layer reported a failure.
    #[error("driver error: {0}")]
    Driver(String),

    /// A framebuffer could not be created or used.
    #[error("framebuffer error: {0}")]
    Framebuffer(String),

    /// The driver lacks a capability the request depends on.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid context configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A draw script could not be parsed or replayed.
    #[error("script error: {0}")]
    Script(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoglError {
    /// Build a [`CoglError::Driver`] value.
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Build a [`CoglError::Framebuffer`] value.
    pub fn framebuffer(msg: impl Into<String>) -> Self {
        Self::Framebuffer(msg.into())
    }

    /// Build a [`CoglError::Unsupported`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Build a [`CoglError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`CoglError::Script`] value.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
