//! JSON draw scripts replayed against a recording context.
//!
//! A script lists context operations in order. Replaying it on a
//! [`RecordingDriver`] yields the GL calls the state code issued, which is
//! what the `cogl-trace` tool prints.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::clip::stack::ClipStack;
use crate::driver::RenderbufferFormat;
use crate::driver::recording::{GlCall, GlState, RecordingDriver};
use crate::foundation::config::{ContextConfig, Features};
use crate::foundation::core::Color;
use crate::foundation::error::{CoglError, CoglResult};
use crate::render::context::Context;
use crate::render::framebuffer::{FlushFlags, Framebuffer, Texture};

/// Name under which scripts refer to the window framebuffer.
pub const WINDOW: &str = "window";

/// A draw script: context settings plus the operations to replay.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Context settings. Defaults when absent.
    #[serde(default)]
    pub config: ContextConfig,
    /// Features the simulated driver reports. All of them when absent.
    #[serde(default)]
    pub features: Option<Features>,
    /// Renderbuffer formats the simulated driver can't attach.
    #[serde(default)]
    pub reject_formats: Vec<RenderbufferFormat>,
    /// Operations in replay order.
    pub ops: Vec<Op>,
}

fn one() -> f32 {
    1.0
}

/// One context operation. Serialized with an `op` tag holding the
/// snake_case variant name; fields mirror the arguments of the matching
/// [`Context`] method.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// [`Context::clip_push_rectangle`].
    ClipPushRectangle {
        /// First corner x.
        x1: f32,
        /// First corner y.
        y1: f32,
        /// Opposite corner x.
        x2: f32,
        /// Opposite corner y.
        y2: f32,
    },
    /// [`Context::clip_push_window_rectangle`].
    ClipPushWindowRectangle {
        /// Left edge.
        x: i32,
        /// Top edge.
        y: i32,
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
    },
    /// [`Context::clip_push_from_path`].
    ClipPushFromPath,
    /// [`Context::clip_push_from_path_preserve`].
    ClipPushFromPathPreserve,
    /// [`Context::clip_pop`]. Fails on an empty clip stack.
    ClipPop,
    /// [`Context::clip_stack_save`].
    ClipStackSave,
    /// [`Context::clip_stack_restore`]. Fails without a matching save.
    ClipStackRestore,
    /// [`Context::clip_ensure`].
    ClipEnsure,
    /// Remember the current clip stack under `name`.
    GetClipStack {
        /// Key for a later [`Op::SetClipStack`].
        name: String,
    },
    /// [`Context::set_clip_stack`] with a remembered stack.
    SetClipStack {
        /// Key given to an earlier [`Op::GetClipStack`].
        name: String,
    },

    /// [`Context::path_new`].
    PathNew,
    /// [`Context::path_move_to`].
    PathMoveTo {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
    },
    /// [`Context::path_line_to`].
    PathLineTo {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
    },
    /// [`Context::path_close`].
    PathClose,
    /// [`Context::path_rectangle`].
    PathRectangle {
        /// First corner x.
        x1: f64,
        /// First corner y.
        y1: f64,
        /// Opposite corner x.
        x2: f64,
        /// Opposite corner y.
        y2: f64,
    },

    /// [`Context::push_matrix`].
    PushMatrix,
    /// [`Context::pop_matrix`]. Fails without a matching push.
    PopMatrix,
    /// [`Context::load_identity`].
    LoadIdentity,
    /// [`Context::translate`].
    Translate {
        /// Offset along x.
        x: f32,
        /// Offset along y.
        y: f32,
        /// Offset along z, `0` when absent.
        #[serde(default)]
        z: f32,
    },
    /// [`Context::scale`].
    Scale {
        /// Factor along x.
        x: f32,
        /// Factor along y.
        y: f32,
        /// Factor along z, `1` when absent.
        #[serde(default = "one")]
        z: f32,
    },
    /// [`Context::rotate`]. The axis defaults to `(0, 0, 1)`.
    Rotate {
        /// Angle in degrees.
        angle: f32,
        /// Axis x.
        #[serde(default)]
        x: f32,
        /// Axis y.
        #[serde(default)]
        y: f32,
        /// Axis z.
        #[serde(default = "one")]
        z: f32,
    },
    /// [`Context::ortho`].
    Ortho {
        /// Left clipping plane.
        left: f32,
        /// Right clipping plane.
        right: f32,
        /// Bottom clipping plane.
        bottom: f32,
        /// Top clipping plane.
        top: f32,
        /// Near clipping plane.
        near: f32,
        /// Far clipping plane.
        far: f32,
    },
    /// [`Context::frustum`].
    Frustum {
        /// Left edge at the near plane.
        left: f32,
        /// Right edge at the near plane.
        right: f32,
        /// Bottom edge at the near plane.
        bottom: f32,
        /// Top edge at the near plane.
        top: f32,
        /// Near plane distance.
        near: f32,
        /// Far plane distance.
        far: f32,
    },
    /// [`Context::perspective`].
    Perspective {
        /// Vertical field of view in degrees.
        fov_y: f32,
        /// Width over height.
        aspect: f32,
        /// Near plane distance.
        near: f32,
        /// Far plane distance.
        far: f32,
    },

    /// [`Context::set_viewport`].
    SetViewport {
        /// Left edge.
        x: i32,
        /// Top edge.
        y: i32,
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
    },
    /// [`Context::set_window_size`].
    SetWindowSize {
        /// New window width.
        width: i32,
        /// New window height.
        height: i32,
    },
    /// [`Context::offscreen_new_to_texture`], naming the result.
    OffscreenNew {
        /// Name for later framebuffer ops. Must be unused.
        name: String,
        /// Texture to render into.
        texture: Texture,
    },
    /// [`Context::delete_offscreen`].
    DeleteOffscreen {
        /// Framebuffer name.
        name: String,
    },
    /// [`Context::set_framebuffer`].
    SetFramebuffer {
        /// Framebuffer name, or [`WINDOW`].
        name: String,
    },
    /// [`Context::push_framebuffer`].
    PushFramebuffer {
        /// Framebuffer name, or [`WINDOW`].
        name: String,
    },
    /// [`Context::pop_framebuffer`]. Fails when only one framebuffer is left.
    PopFramebuffer,

    /// [`Context::set_source_color`].
    SetSourceColor {
        /// Red.
        r: f32,
        /// Green.
        g: f32,
        /// Blue.
        b: f32,
        /// Alpha, `1` when absent.
        #[serde(default = "one")]
        a: f32,
    },
    /// [`Context::draw_rectangle`].
    DrawRectangle {
        /// First corner x.
        x1: f32,
        /// First corner y.
        y1: f32,
        /// Opposite corner x.
        x2: f32,
        /// Opposite corner y.
        y2: f32,
    },
    /// [`Context::flush`].
    Flush,
    /// [`Context::flush_state`] with no flags.
    FlushState,
}

impl Script {
    /// Parse and validate a script from JSON.
    pub fn from_reader<R: std::io::Read>(r: R) -> CoglResult<Self> {
        let script: Self = serde_json::from_reader(r)
            .map_err(|e| CoglError::script(format!("parse draw script JSON: {e}")))?;
        script.config.validate()?;
        Ok(script)
    }

    /// Read a script from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> CoglResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            CoglError::script(format!("open draw script '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }
}

/// Result of replaying a script.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Trace {
    /// Every GL call, oldest first.
    pub calls: Vec<GlCall>,
    /// GL state after the last call.
    pub state: GlState,
}

impl Trace {
    /// Number of calls per call name.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for call in &self.calls {
            *out.entry(call.name()).or_default() += 1;
        }
        out
    }
}

struct Replay {
    ctx: Context<RecordingDriver>,
    framebuffers: BTreeMap<String, Framebuffer>,
    clips: BTreeMap<String, ClipStack>,
}

impl Replay {
    fn framebuffer(&self, name: &str) -> CoglResult<Framebuffer> {
        if name == WINDOW {
            return Ok(self.ctx.window_framebuffer());
        }
        self.framebuffers
            .get(name)
            .cloned()
            .ok_or_else(|| CoglError::script(format!("unknown framebuffer '{name}'")))
    }

    fn apply(&mut self, op: &Op) -> CoglResult<()> {
        let ctx = &mut self.ctx;
        match op {
            Op::ClipPushRectangle { x1, y1, x2, y2 } => ctx.clip_push_rectangle(*x1, *y1, *x2, *y2),
            Op::ClipPushWindowRectangle {
                x,
                y,
                width,
                height,
            } => ctx.clip_push_window_rectangle(*x, *y, *width, *height),
            Op::ClipPushFromPath => ctx.clip_push_from_path(),
            Op::ClipPushFromPathPreserve => ctx.clip_push_from_path_preserve(),
            Op::ClipPop => {
                if ctx.clip_stack().is_empty() {
                    return Err(CoglError::script("clip_pop on an empty clip stack"));
                }
                ctx.clip_pop();
            }
            Op::ClipStackSave => ctx.clip_stack_save(),
            Op::ClipStackRestore => {
                if ctx.framebuffer().state().clip_state.depth() < 2 {
                    return Err(CoglError::script(
                        "clip_stack_restore without a matching save",
                    ));
                }
                ctx.clip_stack_restore();
            }
            Op::ClipEnsure => {
                ctx.clip_ensure()?;
            }
            Op::GetClipStack { name } => {
                self.clips.insert(name.clone(), ctx.clip_stack());
            }
            Op::SetClipStack { name } => {
                let stack = self
                    .clips
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CoglError::script(format!("unknown clip stack '{name}'")))?;
                ctx.set_clip_stack(stack)?;
            }

            Op::PathNew => ctx.path_new(),
            Op::PathMoveTo { x, y } => ctx.path_move_to(*x, *y),
            Op::PathLineTo { x, y } => ctx.path_line_to(*x, *y),
            Op::PathClose => ctx.path_close(),
            Op::PathRectangle { x1, y1, x2, y2 } => ctx.path_rectangle(*x1, *y1, *x2, *y2),

            Op::PushMatrix => ctx.push_matrix(),
            Op::PopMatrix => {
                if ctx.framebuffer().state().modelview.depth() < 2 {
                    return Err(CoglError::script("pop_matrix without a matching push"));
                }
                ctx.pop_matrix();
            }
            Op::LoadIdentity => ctx.load_identity(),
            Op::Translate { x, y, z } => ctx.translate(*x, *y, *z),
            Op::Scale { x, y, z } => ctx.scale(*x, *y, *z),
            Op::Rotate { angle, x, y, z } => ctx.rotate(*angle, *x, *y, *z),
            Op::Ortho {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => ctx.ortho(*left, *right, *bottom, *top, *near, *far)?,
            Op::Frustum {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => ctx.frustum(*left, *right, *bottom, *top, *near, *far)?,
            Op::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => ctx.perspective(*fov_y, *aspect, *near, *far)?,

            Op::SetViewport {
                x,
                y,
                width,
                height,
            } => ctx.set_viewport(*x, *y, *width, *height)?,
            Op::SetWindowSize { width, height } => ctx.set_window_size(*width, *height)?,
            Op::OffscreenNew { name, texture } => {
                if name == WINDOW || self.framebuffers.contains_key(name) {
                    return Err(CoglError::script(format!(
                        "framebuffer '{name}' already exists"
                    )));
                }
                let fb = ctx.offscreen_new_to_texture(*texture)?;
                self.framebuffers.insert(name.clone(), fb);
            }
            Op::DeleteOffscreen { name } => {
                let fb = self.framebuffer(name)?;
                self.ctx.delete_offscreen(&fb)?;
                self.framebuffers.remove(name);
            }
            Op::SetFramebuffer { name } => {
                let fb = self.framebuffer(name)?;
                self.ctx.set_framebuffer(&fb)?;
            }
            Op::PushFramebuffer { name } => {
                let fb = self.framebuffer(name)?;
                self.ctx.push_framebuffer(&fb)?;
            }
            Op::PopFramebuffer => {
                if ctx.framebuffer_stack_depth() < 2 {
                    return Err(CoglError::script(
                        "pop_framebuffer without a matching push",
                    ));
                }
                ctx.pop_framebuffer()?;
            }

            Op::SetSourceColor { r, g, b, a } => ctx.set_source_color(Color::rgba(*r, *g, *b, *a)),
            Op::DrawRectangle { x1, y1, x2, y2 } => ctx.draw_rectangle(*x1, *y1, *x2, *y2)?,
            Op::Flush => ctx.flush()?,
            Op::FlushState => ctx.flush_state(FlushFlags::empty())?,
        }
        Ok(())
    }
}

/// Replay `script` on a fresh recording context and return the GL trace.
///
/// Logged geometry still in the journal at the end is flushed. Operations
/// that would violate a stack precondition are reported as script errors.
#[tracing::instrument(skip(script), fields(ops = script.ops.len()))]
pub fn run_script(script: &Script) -> CoglResult<Trace> {
    let mut driver = RecordingDriver::new(script.features.unwrap_or(Features::all()));
    for format in &script.reject_formats {
        driver.reject_renderbuffer_format(*format);
    }

    let mut replay = Replay {
        ctx: Context::new(driver, script.config.clone())?,
        framebuffers: BTreeMap::new(),
        clips: BTreeMap::new(),
    };
    for (index, op) in script.ops.iter().enumerate() {
        replay.apply(op).map_err(|e| match e {
            CoglError::Script(msg) => CoglError::script(format!("op {index}: {msg}")),
            other => other,
        })?;
    }
    replay.ctx.flush()?;

    let driver = replay.ctx.into_driver();
    tracing::debug!(calls = driver.calls.len(), "script replayed");
    Ok(Trace {
        calls: driver.calls,
        state: driver.state,
    })
}

#[cfg(test)]
#[path = "../tests/unit/script.rs"]
mod tests;
