//! The GL binding seam.
//!
//! State code never talks to GL directly; it asks a [`GlDriver`] to set the
//! concrete pipeline state (scissor, stencil, clip planes, matrices, bound
//! framebuffer) and to rasterize the few primitives it needs. Every call is
//! fallible and the error is propagated to the caller.

use crate::foundation::config::Features;
use crate::foundation::core::{BezPath, Color};
use crate::foundation::error::CoglResult;
use crate::transform::stack::MatrixMode;

/// Call-recording driver that simulates the resulting GL state.
pub mod recording;

/// Server-side capabilities toggled with enable/disable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `GL_SCISSOR_TEST`.
    ScissorTest,
    /// `GL_STENCIL_TEST`.
    StencilTest,
    /// One of the four user clip planes, `0..4`.
    ClipPlane(u32),
}

/// Stencil test comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StencilFunc {
    /// Never passes.
    Never,
    /// Passes where the masked stencil value equals the reference.
    Equal,
    /// Always passes.
    Always,
}

/// Stencil update applied on stencil-fail, depth-fail and pass alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StencilOp {
    /// Leave the stored value.
    Keep,
    /// Store the reference value.
    Replace,
    /// Increment, clamped.
    Incr,
    /// Decrement, clamped.
    Decr,
}

/// Texture binding target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureTarget {
    /// `GL_TEXTURE_2D`.
    #[serde(rename = "texture_2d")]
    Texture2D,
    /// `GL_TEXTURE_RECTANGLE_ARB`.
    Rectangle,
    /// Cube maps can't back a framebuffer.
    CubeMap,
}

/// Storage format of a depth or stencil renderbuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderbufferFormat {
    /// Packed 24-bit depth and 8-bit stencil.
    DepthStencil,
    /// 16-bit depth.
    Depth16,
    /// 8-bit stencil.
    Stencil8,
}

/// Framebuffer attachment point for a renderbuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    /// Depth attachment.
    Depth,
    /// Stencil attachment.
    Stencil,
}

/// A screen-aligned quad already transformed into the current projection's
/// input space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Quad {
    /// Corners in order top-left, top-right, bottom-right, bottom-left.
    pub corners: [[f32; 2]; 4],
    /// Flat fill color.
    pub color: Color,
}

/// The GL calls the state code needs.
pub trait GlDriver {
    /// Capabilities reported by the underlying GL implementation.
    fn features(&self) -> Features;

    /// Enable a capability.
    fn enable(&mut self, cap: Capability) -> CoglResult<()>;

    /// Disable a capability.
    fn disable(&mut self, cap: Capability) -> CoglResult<()>;

    /// Scissor box in GL window coordinates (bottom-left origin).
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) -> CoglResult<()>;

    /// Viewport in GL window coordinates (bottom-left origin).
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> CoglResult<()>;

    /// Set the stencil clear value and clear the stencil buffer with it.
    fn clear_stencil(&mut self, value: i32) -> CoglResult<()>;

    /// Set the stencil test function, reference and mask.
    fn stencil_func(&mut self, func: StencilFunc, reference: i32, mask: u32) -> CoglResult<()>;

    /// Set the stencil update operation.
    fn stencil_op(&mut self, op: StencilOp) -> CoglResult<()>;

    /// Plane equation `a*x + b*y + c*z + d*w >= 0`, taken in eye space of
    /// the currently loaded modelview.
    fn clip_plane(&mut self, plane: u32, equation: [f64; 4]) -> CoglResult<()>;

    /// Load a column-major matrix into the given stack.
    fn load_matrix(&mut self, mode: MatrixMode, matrix: &[f32; 16]) -> CoglResult<()>;

    /// Load identity into the given stack.
    fn load_identity(&mut self, mode: MatrixMode) -> CoglResult<()>;

    /// Bind a framebuffer object, `0` being the window system framebuffer.
    fn bind_framebuffer(&mut self, fbo: u32) -> CoglResult<()>;

    /// Rasterize a rectangle into the stencil buffer only, using the
    /// current matrices and stencil function/operation.
    fn draw_stencil_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> CoglResult<()>;

    /// Rasterize a closed path into the stencil buffer with the current
    /// matrices. With `merge` set, the result is intersected with the
    /// existing stencil contents instead of replacing them. Leaves the
    /// stencil test enabled and passing where the stencil value is 1.
    fn add_path_to_stencil(&mut self, path: &BezPath, merge: bool) -> CoglResult<()>;

    /// Draw a batch of colored quads with the current state.
    fn draw_quads(&mut self, quads: &[Quad]) -> CoglResult<()>;

    /// Create and bind a framebuffer object.
    fn create_framebuffer(&mut self) -> CoglResult<u32>;

    /// Attach a texture as color attachment 0 of the bound framebuffer.
    fn framebuffer_texture_2d(&mut self, target: TextureTarget, texture: u32) -> CoglResult<()>;

    /// Create and bind a renderbuffer.
    fn create_renderbuffer(&mut self) -> CoglResult<u32>;

    /// Allocate storage for a renderbuffer.
    fn renderbuffer_storage(
        &mut self,
        renderbuffer: u32,
        format: RenderbufferFormat,
        width: i32,
        height: i32,
    ) -> CoglResult<()>;

    /// Attach a renderbuffer to the bound framebuffer.
    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: u32,
    ) -> CoglResult<()>;

    /// True when the bound framebuffer is complete.
    fn check_framebuffer_status(&mut self) -> CoglResult<bool>;

    /// Delete a framebuffer object.
    fn delete_framebuffer(&mut self, fbo: u32) -> CoglResult<()>;

    /// Delete a renderbuffer.
    fn delete_renderbuffer(&mut self, renderbuffer: u32) -> CoglResult<()>;
}
