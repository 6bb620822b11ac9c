use smallvec::SmallVec;

use crate::driver::GlDriver;
use crate::foundation::error::CoglResult;
use crate::transform::matrix::Matrix;

/// Which GL matrix a stack is flushed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixMode {
    /// `GL_MODELVIEW`.
    Modelview,
    /// `GL_PROJECTION`.
    Projection,
}

#[derive(Clone, Copy, Debug)]
struct MatrixState {
    matrix: Matrix,
    /// Set by `load_identity`, lets flushing use a cheaper identity load.
    is_identity: bool,
}

/// Push/pop stack of transforms with GL flush caching.
///
/// The stack remembers whether its top has been sent to GL since the last
/// change. Pushing copies the top and so leaves the GL copy valid.
#[derive(Clone, Debug)]
pub struct MatrixStack {
    states: SmallVec<[MatrixState; 4]>,
    flushed: bool,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixStack {
    /// A stack holding only the identity.
    pub fn new() -> Self {
        let mut states = SmallVec::new();
        states.push(MatrixState {
            matrix: Matrix::identity(),
            is_identity: true,
        });
        Self {
            states,
            flushed: false,
        }
    }

    fn top(&self) -> &MatrixState {
        let last = self.states.len() - 1;
        &self.states[last]
    }

    fn top_mut(&mut self) -> &mut MatrixState {
        self.flushed = false;
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    fn mutate(&mut self, f: impl FnOnce(&mut Matrix)) {
        let state = self.top_mut();
        state.is_identity = false;
        f(&mut state.matrix);
    }

    /// Number of entries, including the base.
    pub fn depth(&self) -> usize {
        self.states.len()
    }

    /// Save a copy of the current transform.
    pub fn push(&mut self) {
        let top = *self.top();
        self.states.push(top);
    }

    /// # Panics
    ///
    /// Panics when only the base entry is left.
    pub fn pop(&mut self) {
        assert!(self.states.len() > 1, "matrix stack underflow");
        self.states.pop();
        self.flushed = false;
    }

    /// Reset the current transform to the identity.
    pub fn load_identity(&mut self) {
        let state = self.top_mut();
        state.matrix.init_identity();
        state.is_identity = true;
    }

    /// Replace the current transform.
    pub fn set(&mut self, matrix: &Matrix) {
        self.mutate(|m| *m = *matrix);
    }

    /// Copy of the current transform.
    pub fn get(&self) -> Matrix {
        self.top().matrix
    }

    /// Inverse of the current transform, `None` when singular.
    pub fn get_inverse(&mut self) -> Option<Matrix> {
        let last = self.states.len() - 1;
        self.states[last].matrix.get_inverse()
    }

    /// Post-multiply by a translation.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.mutate(|m| m.translate(x, y, z));
    }

    /// Post-multiply by a scale.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.mutate(|m| m.scale(x, y, z));
    }

    /// Post-multiply by a rotation of `angle` degrees around `(x, y, z)`.
    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) {
        self.mutate(|m| m.rotate(angle, x, y, z));
    }

    /// Post-multiply by `matrix`.
    pub fn multiply(&mut self, matrix: &Matrix) {
        self.mutate(|m| *m = Matrix::multiply(m, matrix));
    }

    /// Post-multiply by a perspective frustum.
    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.mutate(|m| m.frustum(left, right, bottom, top, near, far));
    }

    /// Post-multiply by a symmetric perspective.
    pub fn perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.mutate(|m| m.perspective(fov_y, aspect, near, far));
    }

    /// Post-multiply by an orthographic projection.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.mutate(|m| m.ortho(left, right, bottom, top, near, far));
    }

    /// Forget that GL holds the current top, e.g. after another stack was
    /// flushed to the same GL matrix.
    pub fn dirty(&mut self) {
        self.flushed = false;
    }

    /// Whether GL holds the current transform.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Load the top into GL's `mode` matrix unless it is already there.
    pub fn flush_to_gl<D: GlDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        mode: MatrixMode,
    ) -> CoglResult<()> {
        if self.flushed {
            return Ok(());
        }
        let top = self.top();
        if top.is_identity {
            driver.load_identity(mode)?;
        } else {
            driver.load_matrix(mode, top.matrix.as_array())?;
        }
        self.flushed = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/stack.rs"]
mod tests;
