use super::*;

#[test]
fn calls_are_recorded_in_order_and_update_state() {
    let mut d = RecordingDriver::default();
    d.enable(Capability::ScissorTest).unwrap();
    d.scissor(1, 2, 3, 4).unwrap();
    d.enable(Capability::ClipPlane(2)).unwrap();
    d.disable(Capability::ClipPlane(2)).unwrap();

    let names: Vec<_> = d.calls.iter().map(GlCall::name).collect();
    assert_eq!(names, ["enable", "scissor", "enable", "disable"]);
    assert!(d.state.scissor_test);
    assert_eq!(d.state.scissor_box, [1, 2, 3, 4]);
    assert_eq!(d.state.clip_planes_enabled, [false; 4]);
}

#[test]
fn out_of_range_clip_plane_is_a_driver_error() {
    let mut d = RecordingDriver::default();
    assert!(matches!(
        d.enable(Capability::ClipPlane(4)),
        Err(CoglError::Driver(_))
    ));
    assert!(matches!(
        d.clip_plane(7, [0.0; 4]),
        Err(CoglError::Driver(_))
    ));
}

#[test]
fn fail_on_injects_errors_without_recording() {
    let mut d = RecordingDriver::default();
    d.fail_on("viewport");
    assert!(d.viewport(0, 0, 1, 1).is_err());
    assert_eq!(d.count("viewport"), 0);
    assert!(d.scissor(0, 0, 1, 1).is_ok());
}

#[test]
fn matrices_track_mode() {
    let mut d = RecordingDriver::default();
    let mut m = IDENTITY;
    m[12] = 5.0;
    d.load_matrix(MatrixMode::Modelview, &m).unwrap();
    d.load_identity(MatrixMode::Projection).unwrap();
    assert_eq!(d.state.modelview[12], 5.0);
    assert_eq!(d.state.projection, IDENTITY);
}

#[test]
fn rejected_formats_make_framebuffers_incomplete() {
    let mut d = RecordingDriver::default();
    d.reject_renderbuffer_format(RenderbufferFormat::DepthStencil);

    let fbo = d.create_framebuffer().unwrap();
    let rb = d.create_renderbuffer().unwrap();
    d.renderbuffer_storage(rb, RenderbufferFormat::DepthStencil, 8, 8)
        .unwrap();
    d.framebuffer_renderbuffer(Attachment::Stencil, rb).unwrap();
    assert!(!d.check_framebuffer_status().unwrap());
    d.delete_framebuffer(fbo).unwrap();
    d.delete_renderbuffer(rb).unwrap();
    assert_eq!(d.live_framebuffers(), 0);
    assert_eq!(d.live_renderbuffers(), 0);

    d.create_framebuffer().unwrap();
    let rb = d.create_renderbuffer().unwrap();
    d.renderbuffer_storage(rb, RenderbufferFormat::Stencil8, 8, 8)
        .unwrap();
    d.framebuffer_renderbuffer(Attachment::Stencil, rb).unwrap();
    assert!(d.check_framebuffer_status().unwrap());
}

#[test]
fn calls_serialize_with_snake_case_tags() {
    let mut d = RecordingDriver::default();
    d.stencil_func(StencilFunc::Equal, 1, 1).unwrap();
    let json = serde_json::to_value(&d.calls).unwrap();
    assert_eq!(json[0]["call"], "stencil_func");
    assert_eq!(json[0]["func"], "equal");
}
