//! Modelview/projection transforms.

/// 4x4 matrix with type classification and cached inverse.
pub mod matrix;
/// Matrix push/pop stack with GL flush caching.
pub mod stack;
