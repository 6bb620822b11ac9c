use super::*;
use crate::driver::Capability;

fn parse(json: &str) -> Script {
    Script::from_reader(json.as_bytes()).unwrap()
}

#[test]
fn parses_ops_with_defaults() {
    let script = parse(
        r#"{
            "ops": [
                { "op": "translate", "x": 1, "y": 2 },
                { "op": "scale", "x": 2, "y": 2 },
                { "op": "set_source_color", "r": 1, "g": 0, "b": 0 },
                { "op": "clip_pop" }
            ]
        }"#,
    );
    assert_eq!(script.config, ContextConfig::default());
    assert_eq!(script.features, None);
    assert_eq!(
        script.ops,
        vec![
            Op::Translate {
                x: 1.0,
                y: 2.0,
                z: 0.0
            },
            Op::Scale {
                x: 2.0,
                y: 2.0,
                z: 1.0
            },
            Op::SetSourceColor {
                r: 1.0,
                g: 0.0,
                b: 0.0,
                a: 1.0
            },
            Op::ClipPop,
        ]
    );
}

#[test]
fn rejects_bad_json_and_bad_config() {
    let err = Script::from_reader(&b"{ \"ops\": [ { \"op\": \"warp\" } ] }"[..]).unwrap_err();
    assert!(err.to_string().contains("parse draw script JSON"));

    let err = Script::from_reader(
        &br#"{ "config": { "window_width": 0 }, "ops": [] }"#[..],
    )
    .unwrap_err();
    assert!(matches!(err, CoglError::Config(_)));
}

#[test]
fn missing_file_names_the_path() {
    let err = Script::from_path("/nonexistent/clip.json").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/clip.json"));
}

#[test]
fn window_rectangle_ends_in_scissor_state() {
    let script = parse(
        r#"{ "ops": [
            { "op": "clip_push_window_rectangle", "x": 10, "y": 20, "width": 30, "height": 40 },
            { "op": "clip_ensure" }
        ] }"#,
    );
    let trace = run_script(&script).unwrap();
    assert!(trace.state.scissor_test);
    assert_eq!(trace.state.scissor_box, [10, 480 - 60, 30, 40]);
    assert!(trace.calls.contains(&GlCall::Enable {
        cap: Capability::ScissorTest
    }));
}

#[test]
fn drawing_is_flushed_at_the_end() {
    let script = parse(
        r#"{ "ops": [
            { "op": "draw_rectangle", "x1": 0, "y1": 0, "x2": 10, "y2": 10 }
        ] }"#,
    );
    let trace = run_script(&script).unwrap();
    assert_eq!(trace.summary().get("draw_quads"), Some(&1));
}

#[test]
fn offscreen_framebuffers_are_named() {
    let script = parse(
        r#"{ "ops": [
            { "op": "offscreen_new", "name": "fbo",
              "texture": { "id": 5, "width": 64, "height": 64, "target": "texture_2d" } },
            { "op": "push_framebuffer", "name": "fbo" },
            { "op": "flush_state" },
            { "op": "pop_framebuffer" },
            { "op": "flush_state" }
        ] }"#,
    );
    let trace = run_script(&script).unwrap();
    assert_eq!(trace.state.bound_framebuffer, 0);
    assert!(trace.summary()["bind_framebuffer"] >= 2);
}

#[test]
fn stack_misuse_is_a_script_error() {
    for op in ["clip_pop", "clip_stack_restore", "pop_matrix", "pop_framebuffer"] {
        let script = parse(&format!(r#"{{ "ops": [ {{ "op": "{op}" }} ] }}"#));
        let err = run_script(&script).unwrap_err();
        assert!(
            err.to_string().contains("op 0:"),
            "{op}: unexpected error {err}"
        );
    }
}

#[test]
fn unknown_names_are_script_errors() {
    let script = parse(r#"{ "ops": [ { "op": "set_framebuffer", "name": "nope" } ] }"#);
    assert!(matches!(run_script(&script), Err(CoglError::Script(_))));

    let script = parse(r#"{ "ops": [ { "op": "set_clip_stack", "name": "nope" } ] }"#);
    assert!(matches!(run_script(&script), Err(CoglError::Script(_))));
}

#[test]
fn saved_clip_stacks_can_be_reinstalled() {
    let script = parse(
        r#"{ "ops": [
            { "op": "clip_push_window_rectangle", "x": 0, "y": 0, "width": 8, "height": 8 },
            { "op": "get_clip_stack", "name": "a" },
            { "op": "clip_pop" },
            { "op": "set_clip_stack", "name": "a" },
            { "op": "clip_ensure" }
        ] }"#,
    );
    let trace = run_script(&script).unwrap();
    assert_eq!(trace.state.scissor_box, [0, 472, 8, 8]);
}

#[test]
fn missing_features_change_the_clip_strategy() {
    let script = parse(
        r#"{ "features": "STENCIL_BUFFER | OFFSCREEN", "ops": [
            { "op": "clip_push_rectangle", "x1": 0, "y1": 0, "x2": 10, "y2": 10 },
            { "op": "rotate", "angle": 45 },
            { "op": "clip_push_rectangle", "x1": 0, "y1": 0, "x2": 10, "y2": 10 },
            { "op": "clip_ensure" }
        ] }"#,
    );
    let trace = run_script(&script).unwrap();
    let summary = trace.summary();
    assert!(!summary.contains_key("clip_plane"));
    assert!(summary["draw_stencil_rectangle"] >= 1);
    assert!(trace.state.stencil_test);
}
