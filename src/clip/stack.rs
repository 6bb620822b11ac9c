use std::rc::Rc;

use crate::driver::{Capability, GlDriver, StencilFunc, StencilOp};
use crate::foundation::config::Features;
use crate::foundation::core::{BezPath, WindowRect};
use crate::foundation::error::CoglResult;
use crate::transform::matrix::Matrix;
use crate::transform::stack::{MatrixMode, MatrixStack};

/// One clip region as it was pushed.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipEntry {
    /// Object-space rectangle under the modelview that was current at push time.
    Rectangle {
        /// First corner x.
        x0: f32,
        /// First corner y.
        y0: f32,
        /// Opposite corner x.
        x1: f32,
        /// Opposite corner y.
        y1: f32,
        /// Modelview at push time.
        matrix: Matrix,
    },
    /// Window-space rectangle, top-left origin.
    WindowRectangle(WindowRect),
    /// Arbitrary closed path under the modelview that was current at push time.
    Path {
        /// Copy of the path at push time.
        path: BezPath,
        /// Modelview at push time.
        matrix: Matrix,
    },
}

#[derive(Debug)]
struct ClipNode {
    entry: ClipEntry,
    parent: Option<Rc<ClipNode>>,
}

/// Persistent stack of clip entries.
///
/// Entries are immutable and shared: cloning a stack is O(1) and only bumps
/// the reference count of its top, and pushing onto a clone links the new
/// entry to the shared tail without touching the other stack.
#[derive(Clone, Debug, Default)]
pub struct ClipStack {
    top: Option<Rc<ClipNode>>,
}

impl Drop for ClipStack {
    fn drop(&mut self) {
        // Unlink iteratively so long chains don't recurse in the node drops.
        let mut next = self.top.take();
        while let Some(node) = next {
            match Rc::try_unwrap(node) {
                Ok(mut node) => next = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// GL state a clip flush writes through.
pub struct FlushTarget<'a, D: GlDriver + ?Sized> {
    /// Driver receiving the GL calls.
    pub driver: &'a mut D,
    /// Modelview stack, temporarily replaced while drawing into the stencil.
    pub modelview: &'a mut MatrixStack,
    /// Projection stack, temporarily replaced while drawing into the stencil.
    pub projection: &'a mut MatrixStack,
    /// Features deciding between clip planes and the stencil buffer.
    pub features: Features,
    /// Offscreen targets are rendered upside down, so window rectangles
    /// need no origin flip.
    pub offscreen: bool,
    /// Target height, used to flip window rectangles onscreen.
    pub height: i32,
}

impl ClipStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Number of entries from the top down to the root.
    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// True when both stacks have the same top entry (or are both empty).
    pub fn ptr_eq(&self, other: &ClipStack) -> bool {
        match (&self.top, &other.top) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of holders of the top entry: stacks pointing at it plus
    /// entries that have it as their parent.
    pub fn top_ref_count(&self) -> usize {
        self.top.as_ref().map_or(0, Rc::strong_count)
    }

    /// Entries from the most recently pushed down to the root.
    pub fn iter(&self) -> impl Iterator<Item = &ClipEntry> {
        std::iter::successors(self.top.as_deref(), |node| node.parent.as_deref())
            .map(|node| &node.entry)
    }

    /// The most recently pushed entry.
    pub fn top(&self) -> Option<&ClipEntry> {
        self.top.as_deref().map(|node| &node.entry)
    }

    fn push_entry(&mut self, entry: ClipEntry) {
        let parent = self.top.take();
        self.top = Some(Rc::new(ClipNode { entry, parent }));
    }

    /// Push an object-space rectangle under `modelview`.
    pub fn push_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, modelview: &Matrix) {
        self.push_entry(ClipEntry::Rectangle {
            x0: x1,
            y0: y1,
            x1: x2,
            y1: y2,
            matrix: *modelview,
        });
    }

    /// Push a window-space rectangle given in top-left-origin coordinates.
    pub fn push_window_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.push_entry(ClipEntry::WindowRectangle(WindowRect::from_xywh(
            x, y, width, height,
        )));
    }

    /// Push a copy of `path`; later edits to the caller's path don't affect
    /// the clip.
    pub fn push_from_path(&mut self, path: &BezPath, modelview: &Matrix) {
        self.push_entry(ClipEntry::Path {
            path: path.clone(),
            matrix: *modelview,
        });
    }

    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn pop(&mut self) {
        let Some(node) = self.top.take() else {
            panic!("clip stack pop on an empty stack");
        };
        self.top = node.parent.clone();
    }

    /// Turn the stack into GL clip state.
    ///
    /// Always starts from a fully open clip. Window rectangles are
    /// intersected in software into one scissor box, the first rectangle
    /// entry may use the four clip planes, and every other rectangle or path
    /// goes to the stencil buffer. Returns whether the stencil buffer holds
    /// the clip.
    pub fn flush<D: GlDriver + ?Sized>(&self, target: &mut FlushTarget<'_, D>) -> CoglResult<bool> {
        let mut clip_planes_free = target.features.contains(Features::FOUR_CLIP_PLANES);
        let mut using_clip_planes = false;
        let mut using_stencil = false;
        let mut scissor = WindowRect::UNBOUNDED;

        for plane in (0..4).rev() {
            target.driver.disable(Capability::ClipPlane(plane))?;
        }
        target.driver.disable(Capability::StencilTest)?;
        target.driver.disable(Capability::ScissorTest)?;

        if self.is_empty() {
            return Ok(false);
        }

        // Order is irrelevant, every entry intersects with the rest.
        for entry in self.iter() {
            match entry {
                ClipEntry::Path { path, matrix } => {
                    target.modelview.push();
                    target.modelview.set(matrix);
                    let result = target
                        .flush_matrices()
                        .and_then(|()| target.driver.add_path_to_stencil(path, using_stencil));
                    target.modelview.pop();
                    result?;
                    using_stencil = true;
                }
                ClipEntry::Rectangle {
                    x0,
                    y0,
                    x1,
                    y1,
                    matrix,
                } => {
                    target.modelview.push();
                    target.modelview.set(matrix);
                    let result = if clip_planes_free {
                        tracing::trace!("clip rectangle via clip planes");
                        using_clip_planes = true;
                        clip_planes_free = false;
                        target.set_clip_planes(*x0, *y0, *x1, *y1)
                    } else {
                        let first = !using_stencil;
                        tracing::trace!(first, "clip rectangle via stencil");
                        using_stencil = true;
                        target.add_stencil_clip_rectangle(*x0, *y0, *x1, *y1, first)
                    };
                    target.modelview.pop();
                    result?;
                }
                ClipEntry::WindowRectangle(rect) => {
                    scissor = scissor.intersect(*rect);
                }
            }
        }

        // Enabled late so the planes don't clip the stencil drawing.
        if using_clip_planes {
            for plane in 0..4 {
                target.driver.enable(Capability::ClipPlane(plane))?;
            }
        }

        if !scissor.is_unbounded() {
            let (rect, y_start) = if scissor.is_empty() {
                (WindowRect::EMPTY, 0)
            } else if target.offscreen {
                (scissor, scissor.y0)
            } else {
                (scissor, target.height - scissor.y1)
            };
            tracing::trace!(?rect, y_start, "clip scissor");
            target.driver.enable(Capability::ScissorTest)?;
            target
                .driver
                .scissor(rect.x0, y_start, rect.width(), rect.height())?;
        }

        Ok(using_stencil)
    }
}

impl<D: GlDriver + ?Sized> FlushTarget<'_, D> {
    fn flush_matrices(&mut self) -> CoglResult<()> {
        self.modelview
            .flush_to_gl(&mut *self.driver, MatrixMode::Modelview)?;
        self.projection
            .flush_to_gl(&mut *self.driver, MatrixMode::Projection)
    }

    /// Project an object-space point to normalized device coordinates.
    fn project(&self, x: f32, y: f32) -> [f32; 4] {
        let v = self.modelview.get().transform_point(x, y, 0.0, 1.0);
        let v = self.projection.get().transform_point(v[0], v[1], v[2], v[3]);
        [v[0] / v[3], v[1] / v[3], v[2] / v[3], 1.0]
    }

    fn set_clip_planes(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> CoglResult<()> {
        let tl = self.project(x1, y1);
        let tr = self.project(x2, y1);
        let bl = self.project(x1, y2);
        let br = self.project(x2, y2);

        let signed_area = tl[0] * (tr[1] - bl[1])
            + tr[0] * (br[1] - tl[1])
            + br[0] * (bl[1] - tr[1])
            + bl[0] * (tl[1] - br[1]);

        // Keep the inside of the quad on the positive side of every plane.
        let edges = if signed_area > 0.0 {
            [(tl, bl), (bl, br), (br, tr), (tr, tl)]
        } else {
            [(tl, tr), (tr, br), (br, bl), (bl, tl)]
        };
        for (plane, (a, b)) in (0u32..).zip(edges) {
            self.set_clip_plane(plane, a, b)?;
        }
        Ok(())
    }

    fn set_clip_plane(&mut self, plane: u32, a: [f32; 4], b: [f32; 4]) -> CoglResult<()> {
        let inverse_projection = self.projection.get_inverse().unwrap_or_default();
        let angle = (b[1] - a[1]).atan2(b[0] - a[0]).to_degrees();

        // The plane is specified in screen space: undo the projection, then
        // rotate the x axis onto the edge around `a`.
        self.modelview.push();
        self.modelview.set(&inverse_projection);
        self.modelview.translate(a[0], a[1], a[2]);
        self.modelview.rotate(angle, 0.0, 0.0, 1.0);
        self.modelview.translate(-a[0], -a[1], -a[2]);
        let result = self
            .modelview
            .flush_to_gl(&mut *self.driver, MatrixMode::Modelview)
            .and_then(|()| {
                self.driver
                    .clip_plane(plane, [0.0, -1.0, 0.0, f64::from(a[1])])
            });
        self.modelview.pop();
        result
    }

    fn add_stencil_clip_rectangle(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        first: bool,
    ) -> CoglResult<()> {
        self.flush_matrices()?;

        if first {
            self.driver.enable(Capability::StencilTest)?;
            // Disallow everything, then punch out the rectangle.
            self.driver.clear_stencil(0)?;
            self.driver.stencil_func(StencilFunc::Never, 1, 1)?;
            self.driver.stencil_op(StencilOp::Replace)?;
            self.driver.draw_stencil_rectangle(x1, y1, x2, y2)?;
        } else {
            // Add one inside the rectangle, then subtract one everywhere so
            // only the intersection keeps the value 1.
            self.driver.stencil_func(StencilFunc::Never, 1, 3)?;
            self.driver.stencil_op(StencilOp::Incr)?;
            self.driver.draw_stencil_rectangle(x1, y1, x2, y2)?;
            self.driver.stencil_op(StencilOp::Decr)?;

            self.projection.push();
            self.projection.load_identity();
            self.modelview.push();
            self.modelview.load_identity();
            let drawn = self
                .flush_matrices()
                .and_then(|()| self.driver.draw_stencil_rectangle(-1.0, -1.0, 1.0, 1.0));
            self.modelview.pop();
            self.projection.pop();
            drawn?;
        }

        self.driver.stencil_func(StencilFunc::Equal, 1, 1)?;
        self.driver.stencil_op(StencilOp::Keep)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/stack.rs"]
mod tests;
