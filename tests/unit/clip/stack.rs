use super::*;
use crate::driver::recording::{GlCall, RecordingDriver};

struct Rig {
    driver: RecordingDriver,
    modelview: MatrixStack,
    projection: MatrixStack,
}

impl Rig {
    fn new(features: Features) -> Self {
        Self {
            driver: RecordingDriver::new(features),
            modelview: MatrixStack::new(),
            projection: MatrixStack::new(),
        }
    }

    fn flush(&mut self, stack: &ClipStack, offscreen: bool) -> CoglResult<bool> {
        let features = self.driver.features();
        let mut target = FlushTarget {
            driver: &mut self.driver,
            modelview: &mut self.modelview,
            projection: &mut self.projection,
            features,
            offscreen,
            height: 480,
        };
        stack.flush(&mut target)
    }

    fn scissors(&self) -> Vec<[i32; 4]> {
        self.driver
            .calls
            .iter()
            .filter_map(|c| match c {
                GlCall::Scissor {
                    x,
                    y,
                    width,
                    height,
                } => Some([*x, *y, *width, *height]),
                _ => None,
            })
            .collect()
    }
}

fn window_rects(stack: &ClipStack) -> Vec<WindowRect> {
    stack
        .iter()
        .filter_map(|e| match e {
            ClipEntry::WindowRectangle(r) => Some(*r),
            _ => None,
        })
        .collect()
}

#[test]
fn pushes_pop_in_reverse_order() {
    let mut stack = ClipStack::new();
    for i in 0..5 {
        stack.push_window_rectangle(i, i, 10, 10);
    }
    assert_eq!(stack.depth(), 5);

    for i in (0..5).rev() {
        assert_eq!(
            stack.top(),
            Some(&ClipEntry::WindowRectangle(WindowRect::from_xywh(i, i, 10, 10)))
        );
        stack.pop();
    }
    assert!(stack.is_empty());
    assert!(stack.top().is_none());
}

#[test]
#[should_panic(expected = "empty stack")]
fn popping_empty_stack_panics() {
    ClipStack::new().pop();
}

#[test]
fn copies_share_entries_and_diverge_independently() {
    let mut a = ClipStack::new();
    a.push_window_rectangle(0, 0, 100, 100);
    a.push_window_rectangle(10, 10, 50, 50);
    let root = Rc::downgrade(a.top.as_ref().unwrap().parent.as_ref().unwrap());

    let mut b = a.clone();
    assert!(a.ptr_eq(&b));
    assert_eq!(a.top_ref_count(), 2);

    b.push_window_rectangle(20, 20, 5, 5);
    assert!(!a.ptr_eq(&b));
    // `a` plus the new entry's parent link.
    assert_eq!(a.top_ref_count(), 2);
    assert_eq!(window_rects(&a).len(), 2);
    assert_eq!(window_rects(&b).len(), 3);

    a.pop();
    a.pop();
    assert!(a.is_empty());
    assert_eq!(window_rects(&b).len(), 3);
    assert!(root.upgrade().is_some());

    b.pop();
    b.pop();
    assert!(root.upgrade().is_some());
    b.pop();
    assert!(root.upgrade().is_none());
}

#[test]
fn dropping_last_holder_frees_whole_chain() {
    let mut a = ClipStack::new();
    a.push_window_rectangle(0, 0, 1, 1);
    let root = Rc::downgrade(a.top.as_ref().unwrap());
    a.push_window_rectangle(0, 0, 2, 2);
    let b = a.clone();
    drop(a);
    assert!(root.upgrade().is_some());
    drop(b);
    assert!(root.upgrade().is_none());
}

#[test]
fn deep_chains_drop_without_recursion() {
    let mut stack = ClipStack::new();
    for i in 0..200_000 {
        stack.push_window_rectangle(i, 0, 1, 1);
    }
    drop(stack);
}

#[test]
fn pushed_path_is_a_private_copy() {
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((10.0, 0.0));
    path.line_to((0.0, 10.0));
    path.close_path();

    let mut stack = ClipStack::new();
    stack.push_from_path(&path, &Matrix::identity());
    path.line_to((5.0, 5.0));

    match stack.top() {
        Some(ClipEntry::Path { path: clipped, .. }) => {
            assert_eq!(clipped.elements().len(), 4);
        }
        other => panic!("unexpected top: {other:?}"),
    }
}

#[test]
fn empty_stack_flush_opens_everything() {
    let mut rig = Rig::new(Features::all());
    let stencil = rig.flush(&ClipStack::new(), false).unwrap();
    assert!(!stencil);

    assert_eq!(
        rig.driver.calls,
        vec![
            GlCall::Disable {
                cap: Capability::ClipPlane(3)
            },
            GlCall::Disable {
                cap: Capability::ClipPlane(2)
            },
            GlCall::Disable {
                cap: Capability::ClipPlane(1)
            },
            GlCall::Disable {
                cap: Capability::ClipPlane(0)
            },
            GlCall::Disable {
                cap: Capability::StencilTest
            },
            GlCall::Disable {
                cap: Capability::ScissorTest
            },
        ]
    );
}

#[test]
fn window_rects_intersect_into_one_scissor() {
    let mut stack = ClipStack::new();
    stack.push_window_rectangle(0, 0, 100, 100);
    stack.push_window_rectangle(50, 50, 200, 200);

    let mut offscreen = Rig::new(Features::all());
    assert!(!offscreen.flush(&stack, true).unwrap());
    assert_eq!(offscreen.scissors(), vec![[50, 50, 50, 50]]);
    assert!(offscreen.driver.state.scissor_test);

    // Onscreen flips to GL's bottom-left origin.
    let mut onscreen = Rig::new(Features::all());
    onscreen.flush(&stack, false).unwrap();
    assert_eq!(onscreen.scissors(), vec![[50, 380, 50, 50]]);
}

#[test]
fn disjoint_window_rects_clip_everything() {
    let mut stack = ClipStack::new();
    stack.push_window_rectangle(0, 0, 10, 10);
    stack.push_window_rectangle(20, 20, 10, 10);

    let mut rig = Rig::new(Features::all());
    rig.flush(&stack, false).unwrap();
    assert_eq!(rig.scissors(), vec![[0, 0, 0, 0]]);
    assert!(rig.driver.state.scissor_test);
}

#[test]
fn window_rect_intersection_ignores_push_order() {
    let rects = [(0, 0, 100, 80), (30, 10, 100, 100), (5, 20, 60, 200)];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut results = Vec::new();
    for order in orders {
        let mut stack = ClipStack::new();
        for i in order {
            let (x, y, w, h) = rects[i];
            stack.push_window_rectangle(x, y, w, h);
        }
        let mut rig = Rig::new(Features::all());
        rig.flush(&stack, true).unwrap();
        results.push(rig.scissors());
    }
    // x: 30..65, y: 20..80
    for r in &results {
        assert_eq!(r, &vec![[30, 20, 35, 60]]);
    }
}

#[test]
fn first_rectangle_uses_clip_planes() {
    let mut stack = ClipStack::new();
    stack.push_rectangle(-0.5, -0.5, 0.5, 0.5, &Matrix::identity());

    let mut rig = Rig::new(Features::FOUR_CLIP_PLANES);
    let stencil = rig.flush(&stack, false).unwrap();
    assert!(!stencil);
    assert_eq!(rig.driver.count("clip_plane"), 4);
    assert_eq!(rig.driver.count("draw_stencil_rectangle"), 0);
    assert_eq!(rig.driver.state.clip_planes_enabled, [true; 4]);
    // Counter-clockwise in NDC: first edge runs from top-left to bottom-left.
    assert_eq!(rig.driver.state.clip_planes[0], [0.0, -1.0, 0.0, -0.5]);
    assert_eq!(rig.modelview.depth(), 1);
}

#[test]
fn clip_planes_are_used_once_per_flush() {
    let mut stack = ClipStack::new();
    stack.push_rectangle(0.0, 0.0, 10.0, 10.0, &Matrix::identity());
    stack.push_rectangle(2.0, 2.0, 8.0, 8.0, &Matrix::identity());

    let mut rig = Rig::new(Features::FOUR_CLIP_PLANES | Features::STENCIL_BUFFER);
    let stencil = rig.flush(&stack, false).unwrap();
    assert!(stencil);
    assert_eq!(rig.driver.count("clip_plane"), 4);
    assert_eq!(rig.driver.count("clear_stencil"), 1);
    assert_eq!(rig.driver.count("draw_stencil_rectangle"), 1);
    assert!(rig.driver.calls.contains(&GlCall::DrawStencilRectangle {
        x1: 0.0,
        y1: 0.0,
        x2: 10.0,
        y2: 10.0
    }));
}

#[test]
fn stencil_rectangles_intersect_by_increment_and_decrement() {
    let mut mv = Matrix::identity();
    mv.translate(3.0, 0.0, 0.0);
    let mut stack = ClipStack::new();
    stack.push_rectangle(0.0, 0.0, 10.0, 10.0, &mv);
    stack.push_rectangle(5.0, 5.0, 20.0, 20.0, &Matrix::identity());

    let mut rig = Rig::new(Features::STENCIL_BUFFER);
    assert!(rig.flush(&stack, false).unwrap());

    let ops: Vec<_> = rig
        .driver
        .calls
        .iter()
        .filter_map(|c| match c {
            GlCall::StencilOp { op } => Some(*op),
            _ => None,
        })
        .collect();
    assert_eq!(
        ops,
        [
            StencilOp::Replace,
            StencilOp::Keep,
            StencilOp::Incr,
            StencilOp::Decr,
            StencilOp::Keep
        ]
    );
    assert_eq!(rig.driver.count("draw_stencil_rectangle"), 3);
    assert!(rig.driver.calls.contains(&GlCall::DrawStencilRectangle {
        x1: -1.0,
        y1: -1.0,
        x2: 1.0,
        y2: 1.0
    }));
    assert!(rig.driver.state.stencil_test);
    assert_eq!(rig.driver.state.stencil_func, (StencilFunc::Equal, 1, 1));
    assert_eq!(rig.modelview.depth(), 1);
    assert_eq!(rig.projection.depth(), 1);
    // The second rectangle was drawn under its own modelview.
    assert!(rig.driver.calls.iter().any(|c| matches!(
        c,
        GlCall::LoadMatrix { mode: MatrixMode::Modelview, matrix } if matrix[12] == 3.0
    )));
}

#[test]
fn paths_merge_after_the_first_stencil_user() {
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((4.0, 0.0));
    path.line_to((0.0, 4.0));
    path.close_path();

    let mut stack = ClipStack::new();
    stack.push_from_path(&path, &Matrix::identity());
    stack.push_from_path(&path, &Matrix::identity());

    let mut rig = Rig::new(Features::STENCIL_BUFFER);
    assert!(rig.flush(&stack, false).unwrap());
    let merges: Vec<_> = rig
        .driver
        .calls
        .iter()
        .filter_map(|c| match c {
            GlCall::AddPathToStencil { merge, .. } => Some(*merge),
            _ => None,
        })
        .collect();
    assert_eq!(merges, [false, true]);
}

#[test]
fn driver_errors_leave_matrix_stacks_balanced() {
    let mut stack = ClipStack::new();
    stack.push_rectangle(0.0, 0.0, 1.0, 1.0, &Matrix::identity());

    let mut rig = Rig::new(Features::FOUR_CLIP_PLANES);
    rig.driver.fail_on("clip_plane");
    assert!(rig.flush(&stack, false).is_err());
    assert_eq!(rig.modelview.depth(), 1);
}

#[test]
fn stencil_buffer_feature_does_not_change_the_flush() {
    let mut stack = ClipStack::new();
    stack.push_rectangle(0.0, 0.0, 10.0, 10.0, &Matrix::identity());
    stack.push_rectangle(5.0, 5.0, 20.0, 20.0, &Matrix::identity());

    let mut with = Rig::new(Features::STENCIL_BUFFER);
    let mut without = Rig::new(Features::empty());
    assert!(with.flush(&stack, false).unwrap());
    assert!(without.flush(&stack, false).unwrap());
    assert_eq!(with.driver.calls, without.driver.calls);
}
