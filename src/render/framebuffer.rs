use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::clip::state::ClipState;
use crate::driver::{Attachment, GlDriver, RenderbufferFormat, TextureTarget};
use crate::foundation::core::Viewport;
use crate::foundation::error::CoglResult;
use crate::transform::stack::MatrixStack;

bitflags::bitflags! {
    /// Parts of the framebuffer state a flush may leave alone.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FlushFlags: u32 {
        /// The caller loads its own modelview.
        const SKIP_MODELVIEW = 1 << 0;
        /// The caller flushes the clip state itself.
        const SKIP_CLIP_STATE = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Depth/stencil attachment sets tried when creating an FBO.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OffscreenFlags: u32 {
        /// One packed depth/stencil renderbuffer on both attachments.
        const DEPTH_STENCIL = 1 << 0;
        /// A 16-bit depth renderbuffer.
        const DEPTH = 1 << 1;
        /// An 8-bit stencil renderbuffer.
        const STENCIL = 1 << 2;
    }
}

impl OffscreenFlags {
    /// Fallback order after the last working set.
    pub const ATTEMPTS: [Self; 5] = [
        Self::DEPTH_STENCIL,
        Self::DEPTH.union(Self::STENCIL),
        Self::STENCIL,
        Self::DEPTH,
        Self::empty(),
    ];
}

/// A GL texture an offscreen framebuffer renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Texture {
    /// GL texture name.
    pub id: u32,
    /// Texture width.
    pub width: i32,
    /// Texture height.
    pub height: i32,
    /// Binding target.
    pub target: TextureTarget,
    /// Sliced textures are backed by several GL textures and can't be
    /// attached to a single FBO.
    #[serde(default)]
    pub sliced: bool,
}

/// What a framebuffer renders into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FramebufferKind {
    /// The window system framebuffer.
    Onscreen,
    /// A framebuffer object backed by a texture.
    Offscreen {
        /// Framebuffer object name, `0` once deleted.
        fbo: u32,
        /// Depth and stencil renderbuffers owned by the FBO.
        renderbuffers: Vec<u32>,
        /// Color attachment.
        texture: Texture,
    },
}

/// State owned by one render target.
#[derive(Debug)]
pub struct FramebufferState {
    /// Onscreen or offscreen.
    pub kind: FramebufferKind,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Viewport, top-left origin.
    pub viewport: Viewport,
    /// Modelview stack.
    pub modelview: MatrixStack,
    /// Projection stack.
    pub projection: MatrixStack,
    /// Clip stacks with their save frames.
    pub clip_state: ClipState,
}

impl FramebufferState {
    fn new(kind: FramebufferKind, width: i32, height: i32) -> Self {
        Self {
            kind,
            width,
            height,
            viewport: Viewport::new(0, 0, width, height),
            modelview: MatrixStack::new(),
            projection: MatrixStack::new(),
            clip_state: ClipState::new(),
        }
    }

    /// Whether this renders into a texture.
    pub fn is_offscreen(&self) -> bool {
        matches!(self.kind, FramebufferKind::Offscreen { .. })
    }

    /// Framebuffer object name, `0` for the window.
    pub fn fbo(&self) -> u32 {
        match &self.kind {
            FramebufferKind::Onscreen => 0,
            FramebufferKind::Offscreen { fbo, .. } => *fbo,
        }
    }

    /// Viewport y in GL's bottom-left origin. Offscreen targets are drawn
    /// upside down and need no flip.
    pub fn gl_viewport_y(&self) -> i32 {
        if self.is_offscreen() {
            self.viewport.y
        } else {
            self.height - (self.viewport.y + self.viewport.height)
        }
    }
}

/// Shared handle to a render target.
///
/// Clones refer to the same framebuffer; the context's framebuffer stack
/// holds one clone per entry.
#[derive(Clone, Debug)]
pub struct Framebuffer(Rc<RefCell<FramebufferState>>);

impl Framebuffer {
    pub(crate) fn onscreen(width: i32, height: i32) -> Self {
        Self::from_state(FramebufferState::new(
            FramebufferKind::Onscreen,
            width,
            height,
        ))
    }

    pub(crate) fn offscreen(texture: Texture, fbo: u32, renderbuffers: Vec<u32>) -> Self {
        Self::from_state(FramebufferState::new(
            FramebufferKind::Offscreen {
                fbo,
                renderbuffers,
                texture,
            },
            texture.width,
            texture.height,
        ))
    }

    fn from_state(state: FramebufferState) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    /// Whether both handles refer to the same framebuffer.
    pub fn ptr_eq(&self, other: &Framebuffer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the framebuffer state.
    pub fn state(&self) -> Ref<'_, FramebufferState> {
        self.0.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, FramebufferState> {
        self.0.borrow_mut()
    }

    /// Width in pixels.
    pub fn width(&self) -> i32 {
        self.state().width
    }

    /// Height in pixels.
    pub fn height(&self) -> i32 {
        self.state().height
    }

    /// Viewport, top-left origin.
    pub fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    /// Whether this renders into a texture.
    pub fn is_offscreen(&self) -> bool {
        self.state().is_offscreen()
    }

    /// Framebuffer object name, `0` for the window.
    pub fn fbo(&self) -> u32 {
        self.state().fbo()
    }
}

/// Build and validate one FBO for `texture` with the given depth/stencil
/// attachments.
///
/// Returns the framebuffer and renderbuffer names when the result is
/// complete. An incomplete FBO is deleted together with its renderbuffers
/// and `None` is returned.
pub(crate) fn try_creating_fbo<D: GlDriver + ?Sized>(
    driver: &mut D,
    texture: &Texture,
    flags: OffscreenFlags,
) -> CoglResult<Option<(u32, Vec<u32>)>> {
    let fbo = driver.create_framebuffer()?;
    driver.bind_framebuffer(fbo)?;
    driver.framebuffer_texture_2d(texture.target, texture.id)?;

    let mut renderbuffers = Vec::new();
    let wanted: [(OffscreenFlags, RenderbufferFormat, &[Attachment]); 3] = [
        (
            OffscreenFlags::DEPTH_STENCIL,
            RenderbufferFormat::DepthStencil,
            &[Attachment::Stencil, Attachment::Depth],
        ),
        (
            OffscreenFlags::DEPTH,
            RenderbufferFormat::Depth16,
            &[Attachment::Depth],
        ),
        (
            OffscreenFlags::STENCIL,
            RenderbufferFormat::Stencil8,
            &[Attachment::Stencil],
        ),
    ];
    for (flag, format, attachments) in wanted {
        if !flags.contains(flag) {
            continue;
        }
        let rb = driver.create_renderbuffer()?;
        renderbuffers.push(rb);
        driver.renderbuffer_storage(rb, format, texture.width, texture.height)?;
        for attachment in attachments {
            driver.framebuffer_renderbuffer(*attachment, rb)?;
        }
    }

    if driver.check_framebuffer_status()? {
        return Ok(Some((fbo, renderbuffers)));
    }

    driver.delete_framebuffer(fbo)?;
    for rb in renderbuffers {
        driver.delete_renderbuffer(rb)?;
    }
    Ok(None)
}

#[cfg(test)]
#[path = "../../tests/unit/render/framebuffer.rs"]
mod tests;
