use std::collections::{BTreeMap, BTreeSet};

use super::{
    Attachment, Capability, GlDriver, Quad, RenderbufferFormat, StencilFunc, StencilOp,
    TextureTarget,
};
use crate::foundation::config::Features;
use crate::foundation::core::BezPath;
use crate::foundation::error::{CoglError, CoglResult};
use crate::transform::matrix::IDENTITY;
use crate::transform::stack::MatrixMode;

/// One recorded driver call.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GlCall {
    /// [`GlDriver::enable`].
    Enable {
        /// Capability turned on.
        cap: Capability,
    },
    /// [`GlDriver::disable`].
    Disable {
        /// Capability turned off.
        cap: Capability,
    },
    /// [`GlDriver::scissor`].
    Scissor {
        /// Left edge, GL window coordinates.
        x: i32,
        /// Bottom edge, GL window coordinates.
        y: i32,
        /// Box width.
        width: i32,
        /// Box height.
        height: i32,
    },
    /// [`GlDriver::viewport`].
    Viewport {
        /// Left edge, GL window coordinates.
        x: i32,
        /// Bottom edge, GL window coordinates.
        y: i32,
        /// Viewport width.
        width: i32,
        /// Viewport height.
        height: i32,
    },
    /// [`GlDriver::clear_stencil`].
    ClearStencil {
        /// Clear value.
        value: i32,
    },
    /// [`GlDriver::stencil_func`].
    StencilFunc {
        /// Comparison.
        func: StencilFunc,
        /// Reference value.
        reference: i32,
        /// Mask applied to both sides of the comparison.
        mask: u32,
    },
    /// [`GlDriver::stencil_op`].
    StencilOp {
        /// Update operation.
        op: StencilOp,
    },
    /// [`GlDriver::clip_plane`].
    ClipPlane {
        /// Plane index, `0..4`.
        plane: u32,
        /// Plane equation in eye space.
        equation: [f64; 4],
    },
    /// [`GlDriver::load_matrix`].
    LoadMatrix {
        /// Target stack.
        mode: MatrixMode,
        /// Column-major matrix.
        matrix: [f32; 16],
    },
    /// [`GlDriver::load_identity`].
    LoadIdentity {
        /// Target stack.
        mode: MatrixMode,
    },
    /// [`GlDriver::bind_framebuffer`].
    BindFramebuffer {
        /// Framebuffer object, `0` for the window.
        fbo: u32,
    },
    /// [`GlDriver::draw_stencil_rectangle`].
    DrawStencilRectangle {
        /// First corner x.
        x1: f32,
        /// First corner y.
        y1: f32,
        /// Opposite corner x.
        x2: f32,
        /// Opposite corner y.
        y2: f32,
    },
    /// [`GlDriver::add_path_to_stencil`].
    AddPathToStencil {
        /// Number of path elements.
        elements: usize,
        /// Intersect with the existing stencil contents.
        merge: bool,
    },
    /// [`GlDriver::draw_quads`].
    DrawQuads {
        /// The batch, in draw order.
        quads: Vec<Quad>,
    },
    /// [`GlDriver::create_framebuffer`].
    CreateFramebuffer {
        /// Name handed out.
        fbo: u32,
    },
    /// [`GlDriver::framebuffer_texture_2d`].
    FramebufferTexture2d {
        /// Texture target.
        target: TextureTarget,
        /// Texture name.
        texture: u32,
    },
    /// [`GlDriver::create_renderbuffer`].
    CreateRenderbuffer {
        /// Name handed out.
        renderbuffer: u32,
    },
    /// [`GlDriver::renderbuffer_storage`].
    RenderbufferStorage {
        /// Renderbuffer name.
        renderbuffer: u32,
        /// Storage format.
        format: RenderbufferFormat,
        /// Storage width.
        width: i32,
        /// Storage height.
        height: i32,
    },
    /// [`GlDriver::framebuffer_renderbuffer`].
    FramebufferRenderbuffer {
        /// Attachment point.
        attachment: Attachment,
        /// Renderbuffer name.
        renderbuffer: u32,
    },
    /// [`GlDriver::check_framebuffer_status`].
    CheckFramebufferStatus {
        /// Reported completeness.
        complete: bool,
    },
    /// [`GlDriver::delete_framebuffer`].
    DeleteFramebuffer {
        /// Deleted name.
        fbo: u32,
    },
    /// [`GlDriver::delete_renderbuffer`].
    DeleteRenderbuffer {
        /// Deleted name.
        renderbuffer: u32,
    },
}

impl GlCall {
    /// Stable snake_case name of the call, matching its serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable { .. } => "enable",
            Self::Disable { .. } => "disable",
            Self::Scissor { .. } => "scissor",
            Self::Viewport { .. } => "viewport",
            Self::ClearStencil { .. } => "clear_stencil",
            Self::StencilFunc { .. } => "stencil_func",
            Self::StencilOp { .. } => "stencil_op",
            Self::ClipPlane { .. } => "clip_plane",
            Self::LoadMatrix { .. } => "load_matrix",
            Self::LoadIdentity { .. } => "load_identity",
            Self::BindFramebuffer { .. } => "bind_framebuffer",
            Self::DrawStencilRectangle { .. } => "draw_stencil_rectangle",
            Self::AddPathToStencil { .. } => "add_path_to_stencil",
            Self::DrawQuads { .. } => "draw_quads",
            Self::CreateFramebuffer { .. } => "create_framebuffer",
            Self::FramebufferTexture2d { .. } => "framebuffer_texture2d",
            Self::CreateRenderbuffer { .. } => "create_renderbuffer",
            Self::RenderbufferStorage { .. } => "renderbuffer_storage",
            Self::FramebufferRenderbuffer { .. } => "framebuffer_renderbuffer",
            Self::CheckFramebufferStatus { .. } => "check_framebuffer_status",
            Self::DeleteFramebuffer { .. } => "delete_framebuffer",
            Self::DeleteRenderbuffer { .. } => "delete_renderbuffer",
        }
    }
}

/// GL state as it would be after replaying the recorded calls.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct GlState {
    /// `GL_SCISSOR_TEST` enabled.
    pub scissor_test: bool,
    /// Last scissor box, `[x, y, width, height]`.
    pub scissor_box: [i32; 4],
    /// `GL_STENCIL_TEST` enabled.
    pub stencil_test: bool,
    /// Stencil function, reference and mask.
    pub stencil_func: (StencilFunc, i32, u32),
    /// Stencil update operation.
    pub stencil_op: StencilOp,
    /// Which user clip planes are enabled.
    pub clip_planes_enabled: [bool; 4],
    /// Equations of the user clip planes, in eye space.
    pub clip_planes: [[f64; 4]; 4],
    /// Viewport, `[x, y, width, height]` with a bottom-left origin.
    pub viewport: [i32; 4],
    /// Bound framebuffer object.
    pub bound_framebuffer: u32,
    /// Loaded modelview.
    pub modelview: [f32; 16],
    /// Loaded projection.
    pub projection: [f32; 16],
}

impl Default for GlState {
    fn default() -> Self {
        Self {
            scissor_test: false,
            scissor_box: [0; 4],
            stencil_test: false,
            stencil_func: (StencilFunc::Always, 0, u32::MAX),
            stencil_op: StencilOp::Keep,
            clip_planes_enabled: [false; 4],
            clip_planes: [[0.0; 4]; 4],
            viewport: [0; 4],
            bound_framebuffer: 0,
            modelview: IDENTITY,
            projection: IDENTITY,
        }
    }
}

/// A [`GlDriver`] that keeps a log of every call and simulates the state
/// they leave behind. Used by tests and by the `cogl-trace` tool.
#[derive(Debug)]
pub struct RecordingDriver {
    /// Every successful call, oldest first.
    pub calls: Vec<GlCall>,
    /// Simulated GL state.
    pub state: GlState,
    features: Features,
    next_name: u32,
    renderbuffer_formats: BTreeMap<u32, RenderbufferFormat>,
    attached: Vec<RenderbufferFormat>,
    unsupported_formats: Vec<RenderbufferFormat>,
    live_framebuffers: BTreeSet<u32>,
    live_renderbuffers: BTreeSet<u32>,
    fail_on: Option<&'static str>,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new(Features::all())
    }
}

impl RecordingDriver {
    /// A driver reporting `features`.
    pub fn new(features: Features) -> Self {
        Self {
            calls: Vec::new(),
            state: GlState::default(),
            features,
            next_name: 1,
            renderbuffer_formats: BTreeMap::new(),
            attached: Vec::new(),
            unsupported_formats: Vec::new(),
            live_framebuffers: BTreeSet::new(),
            live_renderbuffers: BTreeSet::new(),
            fail_on: None,
        }
    }

    /// Make framebuffers using `format` report as incomplete.
    pub fn reject_renderbuffer_format(&mut self, format: RenderbufferFormat) {
        self.unsupported_formats.push(format);
    }

    /// Make the named call fail with a driver error.
    pub fn fail_on(&mut self, call: &'static str) {
        self.fail_on = Some(call);
    }

    /// Drain the call log.
    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of logged calls named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| c.name() == name).count()
    }

    /// Framebuffer objects created and not yet deleted.
    pub fn live_framebuffers(&self) -> usize {
        self.live_framebuffers.len()
    }

    /// Renderbuffers created and not yet deleted.
    pub fn live_renderbuffers(&self) -> usize {
        self.live_renderbuffers.len()
    }

    fn record(&mut self, call: GlCall) -> CoglResult<()> {
        if self.fail_on == Some(call.name()) {
            return Err(CoglError::driver(format!("{} failed", call.name())));
        }
        self.calls.push(call);
        Ok(())
    }

    fn gen_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn set_cap(&mut self, cap: Capability, on: bool) -> CoglResult<()> {
        match cap {
            Capability::ScissorTest => self.state.scissor_test = on,
            Capability::StencilTest => self.state.stencil_test = on,
            Capability::ClipPlane(n) => {
                let slot = self
                    .state
                    .clip_planes_enabled
                    .get_mut(n as usize)
                    .ok_or_else(|| CoglError::driver(format!("clip plane {n} out of range")))?;
                *slot = on;
            }
        }
        Ok(())
    }

    fn matrix_slot(&mut self, mode: MatrixMode) -> &mut [f32; 16] {
        match mode {
            MatrixMode::Modelview => &mut self.state.modelview,
            MatrixMode::Projection => &mut self.state.projection,
        }
    }
}

impl GlDriver for RecordingDriver {
    fn features(&self) -> Features {
        self.features
    }

    fn enable(&mut self, cap: Capability) -> CoglResult<()> {
        self.record(GlCall::Enable { cap })?;
        self.set_cap(cap, true)
    }

    fn disable(&mut self, cap: Capability) -> CoglResult<()> {
        self.record(GlCall::Disable { cap })?;
        self.set_cap(cap, false)
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) -> CoglResult<()> {
        self.record(GlCall::Scissor {
            x,
            y,
            width,
            height,
        })?;
        self.state.scissor_box = [x, y, width, height];
        Ok(())
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> CoglResult<()> {
        self.record(GlCall::Viewport {
            x,
            y,
            width,
            height,
        })?;
        self.state.viewport = [x, y, width, height];
        Ok(())
    }

    fn clear_stencil(&mut self, value: i32) -> CoglResult<()> {
        self.record(GlCall::ClearStencil { value })
    }

    fn stencil_func(&mut self, func: StencilFunc, reference: i32, mask: u32) -> CoglResult<()> {
        self.record(GlCall::StencilFunc {
            func,
            reference,
            mask,
        })?;
        self.state.stencil_func = (func, reference, mask);
        Ok(())
    }

    fn stencil_op(&mut self, op: StencilOp) -> CoglResult<()> {
        self.record(GlCall::StencilOp { op })?;
        self.state.stencil_op = op;
        Ok(())
    }

    fn clip_plane(&mut self, plane: u32, equation: [f64; 4]) -> CoglResult<()> {
        if plane as usize >= self.state.clip_planes.len() {
            return Err(CoglError::driver(format!("clip plane {plane} out of range")));
        }
        self.record(GlCall::ClipPlane { plane, equation })?;
        self.state.clip_planes[plane as usize] = equation;
        Ok(())
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: &[f32; 16]) -> CoglResult<()> {
        self.record(GlCall::LoadMatrix {
            mode,
            matrix: *matrix,
        })?;
        *self.matrix_slot(mode) = *matrix;
        Ok(())
    }

    fn load_identity(&mut self, mode: MatrixMode) -> CoglResult<()> {
        self.record(GlCall::LoadIdentity { mode })?;
        *self.matrix_slot(mode) = IDENTITY;
        Ok(())
    }

    fn bind_framebuffer(&mut self, fbo: u32) -> CoglResult<()> {
        self.record(GlCall::BindFramebuffer { fbo })?;
        self.state.bound_framebuffer = fbo;
        Ok(())
    }

    fn draw_stencil_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> CoglResult<()> {
        self.record(GlCall::DrawStencilRectangle { x1, y1, x2, y2 })
    }

    fn add_path_to_stencil(&mut self, path: &BezPath, merge: bool) -> CoglResult<()> {
        self.record(GlCall::AddPathToStencil {
            elements: path.elements().len(),
            merge,
        })?;
        self.state.stencil_test = true;
        self.state.stencil_func = (StencilFunc::Equal, 1, 1);
        self.state.stencil_op = StencilOp::Keep;
        Ok(())
    }

    fn draw_quads(&mut self, quads: &[Quad]) -> CoglResult<()> {
        self.record(GlCall::DrawQuads {
            quads: quads.to_vec(),
        })
    }

    fn create_framebuffer(&mut self) -> CoglResult<u32> {
        let fbo = self.gen_name();
        self.record(GlCall::CreateFramebuffer { fbo })?;
        self.live_framebuffers.insert(fbo);
        self.attached.clear();
        Ok(fbo)
    }

    fn framebuffer_texture_2d(&mut self, target: TextureTarget, texture: u32) -> CoglResult<()> {
        self.record(GlCall::FramebufferTexture2d { target, texture })
    }

    fn create_renderbuffer(&mut self) -> CoglResult<u32> {
        let renderbuffer = self.gen_name();
        self.record(GlCall::CreateRenderbuffer { renderbuffer })?;
        self.live_renderbuffers.insert(renderbuffer);
        Ok(renderbuffer)
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: u32,
        format: RenderbufferFormat,
        width: i32,
        height: i32,
    ) -> CoglResult<()> {
        self.record(GlCall::RenderbufferStorage {
            renderbuffer,
            format,
            width,
            height,
        })?;
        self.renderbuffer_formats.insert(renderbuffer, format);
        Ok(())
    }

    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: u32,
    ) -> CoglResult<()> {
        self.record(GlCall::FramebufferRenderbuffer {
            attachment,
            renderbuffer,
        })?;
        if let Some(format) = self.renderbuffer_formats.get(&renderbuffer) {
            self.attached.push(*format);
        }
        Ok(())
    }

    fn check_framebuffer_status(&mut self) -> CoglResult<bool> {
        let complete = !self
            .attached
            .iter()
            .any(|f| self.unsupported_formats.contains(f));
        self.record(GlCall::CheckFramebufferStatus { complete })?;
        Ok(complete)
    }

    fn delete_framebuffer(&mut self, fbo: u32) -> CoglResult<()> {
        self.record(GlCall::DeleteFramebuffer { fbo })?;
        self.live_framebuffers.remove(&fbo);
        Ok(())
    }

    fn delete_renderbuffer(&mut self, renderbuffer: u32) -> CoglResult<()> {
        self.record(GlCall::DeleteRenderbuffer { renderbuffer })?;
        self.live_renderbuffers.remove(&renderbuffer);
        self.renderbuffer_formats.remove(&renderbuffer);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/driver/recording.rs"]
mod tests;
