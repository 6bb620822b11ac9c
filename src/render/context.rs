use crate::clip::stack::{ClipStack, FlushTarget};
use crate::driver::{GlDriver, Quad, TextureTarget};
use crate::foundation::config::{ContextConfig, DebugFlags, Features};
use crate::foundation::core::{BezPath, Color, Viewport, WindowRect};
use crate::foundation::error::{CoglError, CoglResult};
use crate::render::framebuffer::{
    FlushFlags, Framebuffer, FramebufferKind, OffscreenFlags, Texture, try_creating_fbo,
};
use crate::render::journal::{self, Journal};
use crate::transform::matrix::Matrix;
use crate::transform::stack::{MatrixMode, MatrixStack};

#[derive(Debug)]
struct FlushedClip {
    /// Held so the flushed entries can't be freed and their identity reused.
    stack: ClipStack,
    stencil_used: bool,
}

/// Explicit rendering context.
///
/// Owns the GL driver, the framebuffer stack and the journal, and tracks
/// which parts of the GL state are out of date. All clip, matrix and
/// framebuffer operations act on the framebuffer at the top of the stack.
pub struct Context<D: GlDriver> {
    driver: D,
    config: ContextConfig,
    features: Features,
    window: Framebuffer,
    framebuffers: Vec<Framebuffer>,
    dirty_bound_framebuffer: bool,
    dirty_gl_viewport: bool,
    flushed_clip: Option<FlushedClip>,
    journal: Journal,
    path: BezPath,
    source: Color,
    offscreen_flags: Option<OffscreenFlags>,
}

impl<D: GlDriver> Context<D> {
    /// Create a context drawing to a window of the configured size.
    pub fn new(driver: D, config: ContextConfig) -> CoglResult<Self> {
        config.validate()?;
        let features = config.effective_features(driver.features());
        tracing::debug!(?features, debug = ?config.debug, "creating context");

        let window = Framebuffer::onscreen(config.window_width, config.window_height);
        Ok(Self {
            driver,
            config,
            features,
            framebuffers: vec![window.clone()],
            window,
            dirty_bound_framebuffer: true,
            dirty_gl_viewport: true,
            flushed_clip: None,
            journal: Journal::new(),
            path: BezPath::new(),
            source: Color::WHITE,
            offscreen_flags: None,
        })
    }

    /// The GL driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the GL driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Consume the context and hand back its driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// The config the context was created with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Driver features minus the ones disabled in the config.
    pub fn features(&self) -> Features {
        self.features
    }

    /// Quads logged but not yet drawn.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The onscreen window framebuffer.
    pub fn window_framebuffer(&self) -> Framebuffer {
        self.window.clone()
    }

    /// The framebuffer at the top of the framebuffer stack.
    pub fn framebuffer(&self) -> Framebuffer {
        let last = self.framebuffers.len() - 1;
        self.framebuffers[last].clone()
    }

    /// Number of framebuffers on the stack, including the initial one.
    pub fn framebuffer_stack_depth(&self) -> usize {
        self.framebuffers.len()
    }

    /// Resize the window framebuffer. The viewport is left as is but its GL
    /// origin depends on the height and is recomputed.
    ///
    /// Logged quads are drawn first, against the old size.
    pub fn set_window_size(&mut self, width: i32, height: i32) -> CoglResult<()> {
        {
            let state = self.window.state();
            if state.width == width && state.height == height {
                return Ok(());
            }
        }
        self.flush()?;
        {
            let mut state = self.window.state_mut();
            state.width = width;
            state.height = height;
        }
        self.dirty_gl_viewport = true;
        // Scissor boxes of onscreen clips are flipped by the height.
        self.flushed_clip = None;
        Ok(())
    }

    /// Replace the top of the framebuffer stack.
    pub fn set_framebuffer(&mut self, framebuffer: &Framebuffer) -> CoglResult<()> {
        if self.framebuffer().ptr_eq(framebuffer) {
            return Ok(());
        }
        self.set_framebuffer_real(framebuffer.clone())
    }

    /// Make `framebuffer` current, keeping the previous one underneath.
    pub fn push_framebuffer(&mut self, framebuffer: &Framebuffer) -> CoglResult<()> {
        self.flush()?;
        self.framebuffers.push(framebuffer.clone());
        self.set_framebuffer_real(framebuffer.clone())
    }

    /// # Panics
    ///
    /// Panics when only the initial framebuffer is left.
    pub fn pop_framebuffer(&mut self) -> CoglResult<()> {
        assert!(
            self.framebuffers.len() > 1,
            "pop_framebuffer without a matching push"
        );
        self.flush()?;
        let popped = self.framebuffers.pop();
        let restored = self.framebuffer();
        if !popped.is_some_and(|p| p.ptr_eq(&restored)) {
            self.set_framebuffer_real(restored)?;
        }
        Ok(())
    }

    fn set_framebuffer_real(&mut self, framebuffer: Framebuffer) -> CoglResult<()> {
        self.flush()?;
        {
            // Its matrices and clip may not be what GL holds.
            let mut state = framebuffer.state_mut();
            state.modelview.dirty();
            state.projection.dirty();
        }
        let last = self.framebuffers.len() - 1;
        self.framebuffers[last] = framebuffer;
        self.dirty_bound_framebuffer = true;
        self.dirty_gl_viewport = true;
        self.flushed_clip = None;
        Ok(())
    }

    /// The current framebuffer's viewport.
    pub fn viewport(&self) -> Viewport {
        self.framebuffer().viewport()
    }

    /// Set the current framebuffer's viewport, top-left origin.
    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> CoglResult<()> {
        let viewport = Viewport::new(x, y, width, height);
        if self.framebuffer().viewport() == viewport {
            return Ok(());
        }
        // Logged geometry must not see the new viewport.
        self.flush()?;
        self.framebuffer().state_mut().viewport = viewport;
        self.dirty_gl_viewport = true;
        Ok(())
    }

    /// Create a framebuffer that renders into `texture`.
    #[tracing::instrument(skip(self, texture), fields(texture = texture.id))]
    pub fn offscreen_new_to_texture(&mut self, texture: Texture) -> CoglResult<Framebuffer> {
        if !self.features.contains(Features::OFFSCREEN) {
            return Err(CoglError::unsupported("offscreen framebuffers"));
        }
        if texture.sliced {
            return Err(CoglError::framebuffer(
                "sliced textures can't be render targets",
            ));
        }
        if !matches!(
            texture.target,
            TextureTarget::Texture2D | TextureTarget::Rectangle
        ) {
            return Err(CoglError::framebuffer(format!(
                "{:?} textures can't be render targets",
                texture.target
            )));
        }

        // Creating the FBO binds it.
        self.dirty_bound_framebuffer = true;

        let attempts = self
            .offscreen_flags
            .into_iter()
            .chain(OffscreenFlags::ATTEMPTS);
        for flags in attempts {
            if let Some((fbo, renderbuffers)) = try_creating_fbo(&mut self.driver, &texture, flags)?
            {
                tracing::debug!(fbo, ?flags, "offscreen framebuffer complete");
                self.offscreen_flags = Some(flags);
                return Ok(Framebuffer::offscreen(texture, fbo, renderbuffers));
            }
        }

        tracing::warn!(texture = texture.id, "failed to create an OpenGL framebuffer");
        Err(CoglError::framebuffer("failed to create an OpenGL framebuffer"))
    }

    /// Release the GL objects of an offscreen framebuffer.
    pub fn delete_offscreen(&mut self, framebuffer: &Framebuffer) -> CoglResult<()> {
        if self.framebuffers.iter().any(|f| f.ptr_eq(framebuffer)) {
            return Err(CoglError::framebuffer(
                "can't delete a framebuffer on the framebuffer stack",
            ));
        }
        let (fbo, renderbuffers) = match &mut framebuffer.state_mut().kind {
            FramebufferKind::Onscreen => {
                return Err(CoglError::framebuffer(
                    "the window framebuffer can't be deleted",
                ));
            }
            FramebufferKind::Offscreen { fbo: 0, .. } => {
                return Err(CoglError::framebuffer("offscreen framebuffer already deleted"));
            }
            FramebufferKind::Offscreen {
                fbo, renderbuffers, ..
            } => (std::mem::take(fbo), std::mem::take(renderbuffers)),
        };
        for rb in renderbuffers {
            self.driver.delete_renderbuffer(rb)?;
        }
        self.driver.delete_framebuffer(fbo)
    }

    /// Bring GL up to date with the current framebuffer before drawing.
    ///
    /// Only state that changed since the last flush is sent: the bound
    /// framebuffer, the viewport, the clip, then the modelview and
    /// projection. Clip flushing may overwrite the GL matrices so it runs
    /// first.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn flush_state(&mut self, flags: FlushFlags) -> CoglResult<()> {
        let framebuffer = self.framebuffer();

        if self.features.contains(Features::OFFSCREEN) && self.dirty_bound_framebuffer {
            self.driver.bind_framebuffer(framebuffer.fbo())?;
            self.dirty_bound_framebuffer = false;
        }

        if self.dirty_gl_viewport {
            let (viewport, gl_y) = {
                let state = framebuffer.state();
                (state.viewport, state.gl_viewport_y())
            };
            self.driver
                .viewport(viewport.x, gl_y, viewport.width, viewport.height)?;
            self.dirty_gl_viewport = false;
        }

        if !flags.contains(FlushFlags::SKIP_CLIP_STATE) {
            let clip = framebuffer.state().clip_state.current().clone();
            self.flush_clip(&framebuffer, &clip)?;
        }

        let mut state = framebuffer.state_mut();
        let state = &mut *state;
        if !flags.contains(FlushFlags::SKIP_MODELVIEW) {
            state
                .modelview
                .flush_to_gl(&mut self.driver, MatrixMode::Modelview)?;
        }
        state
            .projection
            .flush_to_gl(&mut self.driver, MatrixMode::Projection)
    }

    fn flush_clip(&mut self, framebuffer: &Framebuffer, clip: &ClipStack) -> CoglResult<bool> {
        if let Some(flushed) = &self.flushed_clip
            && flushed.stack.ptr_eq(clip)
        {
            return Ok(flushed.stencil_used);
        }
        self.flushed_clip = None;

        let mut state = framebuffer.state_mut();
        let offscreen = state.is_offscreen();
        let height = state.height;
        let state = &mut *state;
        let mut target = FlushTarget {
            driver: &mut self.driver,
            modelview: &mut state.modelview,
            projection: &mut state.projection,
            features: self.features,
            offscreen,
            height,
        };
        let stencil_used = clip.flush(&mut target)?;
        self.flushed_clip = Some(FlushedClip {
            stack: clip.clone(),
            stencil_used,
        });
        Ok(stencil_used)
    }

    /// Draw everything logged in the journal.
    ///
    /// Runs of quads sharing one clip stack are drawn with a single call.
    #[tracing::instrument(level = "debug", skip(self), fields(entries = self.journal.len()))]
    pub fn flush(&mut self) -> CoglResult<()> {
        if self.journal.is_empty() {
            return Ok(());
        }
        // Entries stay logged when the state can't be flushed.
        self.flush_state(FlushFlags::SKIP_MODELVIEW | FlushFlags::SKIP_CLIP_STATE)?;
        let entries = self.journal.take();

        let framebuffer = self.framebuffer();
        for (index, batch) in journal::batches(&entries).enumerate() {
            if self.config.debug.contains(DebugFlags::BATCHING) {
                tracing::debug!(batch = index, len = batch.len(), "journal batch");
            }
            self.flush_clip(&framebuffer, &batch[0].clip)?;

            let quads: Vec<Quad> = batch.iter().map(|e| e.quad).collect();
            let mut state = framebuffer.state_mut();
            let state = &mut *state;
            // Logged quads are already in eye space.
            state.modelview.push();
            state.modelview.load_identity();
            let drawn = state
                .modelview
                .flush_to_gl(&mut self.driver, MatrixMode::Modelview)
                .and_then(|()| {
                    state
                        .projection
                        .flush_to_gl(&mut self.driver, MatrixMode::Projection)
                })
                .and_then(|()| self.driver.draw_quads(&quads));
            state.modelview.pop();
            drawn?;
        }
        Ok(())
    }

    /// Color used for subsequently logged rectangles.
    pub fn set_source_color(&mut self, color: Color) {
        self.source = color;
    }

    /// The current source color.
    pub fn source_color(&self) -> Color {
        self.source
    }

    /// Log a rectangle with the current source color, modelview and clip.
    pub fn draw_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> CoglResult<()> {
        let framebuffer = self.framebuffer();
        let (quad, clip) = {
            let state = framebuffer.state();
            let modelview = state.modelview.get();
            let corners = [(x1, y1), (x2, y1), (x2, y2), (x1, y2)].map(|(x, y)| {
                let p = modelview.transform_point(x, y, 0.0, 1.0);
                [p[0], p[1]]
            });
            let quad = Quad {
                corners,
                color: self.source,
            };
            (quad, state.clip_state.current().clone())
        };
        if self.config.debug.contains(DebugFlags::JOURNAL) {
            tracing::debug!(?quad, "journal log");
        }
        self.journal.log(quad, clip);

        if self.config.debug.contains(DebugFlags::DISABLE_BATCHING) {
            self.flush()?;
        }
        Ok(())
    }

    fn with_modelview<R>(&mut self, f: impl FnOnce(&mut MatrixStack) -> R) -> R {
        let framebuffer = self.framebuffer();
        let mut state = framebuffer.state_mut();
        f(&mut state.modelview)
    }

    /// Run `f` on the projection stack after flushing the journal, since
    /// logged quads are not projected until they are drawn.
    fn with_projection<R>(&mut self, f: impl FnOnce(&mut MatrixStack) -> R) -> CoglResult<R> {
        self.flush()?;
        let framebuffer = self.framebuffer();
        let mut state = framebuffer.state_mut();
        Ok(f(&mut state.projection))
    }

    /// Save the current modelview.
    pub fn push_matrix(&mut self) {
        self.with_modelview(MatrixStack::push);
    }

    /// Restore the last saved modelview.
    pub fn pop_matrix(&mut self) {
        self.with_modelview(MatrixStack::pop);
    }

    /// Reset the modelview to identity.
    pub fn load_identity(&mut self) {
        self.with_modelview(MatrixStack::load_identity);
    }

    /// Translate the modelview.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.with_modelview(|s| s.translate(x, y, z));
    }

    /// Scale the modelview.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.with_modelview(|s| s.scale(x, y, z));
    }

    /// Rotate the modelview by `angle` degrees around `(x, y, z)`.
    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) {
        self.with_modelview(|s| s.rotate(angle, x, y, z));
    }

    /// Multiply the modelview by `matrix`.
    pub fn transform(&mut self, matrix: &Matrix) {
        self.with_modelview(|s| s.multiply(matrix));
    }

    /// Replace the modelview.
    pub fn set_modelview_matrix(&mut self, matrix: &Matrix) {
        self.with_modelview(|s| s.set(matrix));
    }

    /// The current modelview.
    pub fn modelview_matrix(&self) -> Matrix {
        self.framebuffer().state().modelview.get()
    }

    /// Inverse of the modelview, `None` when it is singular.
    pub fn modelview_inverse(&mut self) -> Option<Matrix> {
        self.with_modelview(MatrixStack::get_inverse)
    }

    /// Replace the projection with a perspective frustum.
    pub fn frustum(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> CoglResult<()> {
        self.with_projection(|s| {
            s.load_identity();
            s.frustum(left, right, bottom, top, near, far);
        })
    }

    /// Replace the projection with a symmetric perspective.
    pub fn perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) -> CoglResult<()> {
        self.with_projection(|s| {
            s.load_identity();
            s.perspective(fov_y, aspect, near, far);
        })
    }

    /// Replace the projection with an orthographic one.
    pub fn ortho(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> CoglResult<()> {
        self.with_projection(|s| {
            s.load_identity();
            s.ortho(left, right, bottom, top, near, far);
        })
    }

    /// Replace the projection.
    pub fn set_projection_matrix(&mut self, matrix: &Matrix) -> CoglResult<()> {
        self.with_projection(|s| s.set(matrix))
    }

    /// The current projection.
    pub fn projection_matrix(&self) -> Matrix {
        self.framebuffer().state().projection.get()
    }

    /// Clip to a rectangle in object space under the current modelview.
    ///
    /// When the current transform keeps the rectangle screen aligned it is
    /// stored as a window rectangle so it can be flushed as a scissor box.
    pub fn clip_push_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        if let Some(rect) = self.rect_as_window_rect(x1, y1, x2, y2) {
            tracing::trace!(?rect, "clip rectangle is screen aligned");
            self.with_clip(|c| {
                c.push_window_rectangle(rect.x0, rect.y0, rect.width(), rect.height())
            });
            return;
        }
        let modelview = self.modelview_matrix();
        self.with_clip(|c| c.push_rectangle(x1, y1, x2, y2, &modelview));
    }

    /// Clip to a rectangle in window coordinates, top-left origin.
    pub fn clip_push_window_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.with_clip(|c| c.push_window_rectangle(x, y, width, height));
    }

    /// Clip to the current path and start a new empty path.
    pub fn clip_push_from_path(&mut self) {
        self.clip_push_from_path_preserve();
        self.path_new();
    }

    /// Clip to the current path, keeping it for further use.
    pub fn clip_push_from_path_preserve(&mut self) {
        let modelview = self.modelview_matrix();
        let path = self.path.clone();
        self.with_clip(|c| c.push_from_path(&path, &modelview));
    }

    /// # Panics
    ///
    /// Panics when the current clip stack is empty.
    pub fn clip_pop(&mut self) {
        self.with_clip(ClipStack::pop);
    }

    /// Start a fresh empty clip stack, saving the current one.
    pub fn clip_stack_save(&mut self) {
        self.framebuffer().state_mut().clip_state.save();
    }

    /// # Panics
    ///
    /// Panics without a matching [`Context::clip_stack_save`].
    pub fn clip_stack_restore(&mut self) {
        self.framebuffer().state_mut().clip_state.restore();
    }

    /// Flush pending geometry and then the current clip right away.
    ///
    /// Returns whether the clip lives in the stencil buffer.
    pub fn clip_ensure(&mut self) -> CoglResult<bool> {
        self.flush()?;
        let framebuffer = self.framebuffer();
        let clip = framebuffer.state().clip_state.current().clone();
        self.flush_clip(&framebuffer, &clip)
    }

    /// A shared copy of the current clip stack.
    pub fn clip_stack(&self) -> ClipStack {
        self.framebuffer().state().clip_state.current().clone()
    }

    /// Replace the current clip stack.
    pub fn set_clip_stack(&mut self, stack: ClipStack) -> CoglResult<()> {
        self.flush()?;
        self.framebuffer().state_mut().clip_state.set_current(stack);
        Ok(())
    }

    fn with_clip(&mut self, f: impl FnOnce(&mut ClipStack)) {
        let framebuffer = self.framebuffer();
        let mut state = framebuffer.state_mut();
        f(state.clip_state.current_mut());
    }

    /// Map an object-space rectangle to window coordinates when the
    /// combined projection and modelview keep it axis aligned.
    fn rect_as_window_rect(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Option<WindowRect> {
        if self
            .config
            .debug
            .contains(DebugFlags::DISABLE_SOFTWARE_CLIP)
        {
            return None;
        }

        let framebuffer = self.framebuffer();
        let state = framebuffer.state();
        let modelview = state.modelview.get();
        let projection = state.projection.get();
        let combined = Matrix::multiply(&projection, &modelview);
        // No rotation or shear, and w independent of x and y.
        if combined.element(0, 1) != 0.0
            || combined.element(1, 0) != 0.0
            || combined.element(3, 0) != 0.0
            || combined.element(3, 1) != 0.0
        {
            return None;
        }

        let [vx, vy, vw, vh] = state.viewport.to_array();
        let to_window = |x: f32, y: f32| {
            let p = modelview.transform_point(x, y, 0.0, 1.0);
            let p = projection.transform_point(p[0], p[1], p[2], p[3]);
            let (nx, ny) = (p[0] / p[3], p[1] / p[3]);
            ((nx + 1.0) * (vw / 2.0) + vx, (-ny + 1.0) * (vh / 2.0) + vy)
        };
        let (ax, ay) = to_window(x1, y1);
        let (bx, by) = to_window(x2, y2);
        if ![ax, ay, bx, by].iter().all(|v| v.is_finite()) {
            return None;
        }

        // The transform may flip either axis.
        let (x0, x1) = if ax > bx { (bx, ax) } else { (ax, bx) };
        let (y0, y1) = if ay > by { (by, ay) } else { (ay, by) };
        // Origin and size are truncated separately.
        Some(WindowRect::from_xywh(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as i32,
            (y1 - y0) as i32,
        ))
    }

    /// The current path.
    pub fn path(&self) -> &BezPath {
        &self.path
    }

    /// Discard the current path.
    pub fn path_new(&mut self) {
        self.path = BezPath::new();
    }

    /// Start a new subpath at `(x, y)`.
    pub fn path_move_to(&mut self, x: f64, y: f64) {
        self.path.move_to((x, y));
    }

    /// Add a line from the current point; starts a subpath when the path
    /// is empty.
    pub fn path_line_to(&mut self, x: f64, y: f64) {
        if self.path.elements().is_empty() {
            self.path.move_to((x, y));
        } else {
            self.path.line_to((x, y));
        }
    }

    /// Close the current subpath.
    pub fn path_close(&mut self) {
        if !self.path.elements().is_empty() {
            self.path.close_path();
        }
    }

    /// Add a closed rectangle subpath.
    pub fn path_rectangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.path.move_to((x1, y1));
        self.path.line_to((x2, y1));
        self.path.line_to((x2, y2));
        self.path.line_to((x1, y2));
        self.path.close_path();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/context.rs"]
mod tests;
