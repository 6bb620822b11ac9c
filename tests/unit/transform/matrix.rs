use super::*;

fn assert_near_identity(m: &Matrix, tol: f32) {
    for (i, (got, want)) in m.as_array().iter().zip(IDENTITY.iter()).enumerate() {
        assert!(
            (got - want).abs() <= tol,
            "element {i}: got {got}, want {want}"
        );
    }
}

fn assert_point_near(got: [f32; 4], want: [f32; 4]) {
    for i in 0..4 {
        assert!(
            (got[i] - want[i]).abs() < 1e-4,
            "component {i}: got {got:?}, want {want:?}"
        );
    }
}

#[test]
fn identity_is_classified_and_inverts_to_itself() {
    let mut m = Matrix::identity();
    assert!(m.is_identity());
    let inv = m.get_inverse().unwrap();
    assert_eq!(inv, Matrix::identity());
}

#[test]
fn translate_then_rotate_round_trips_through_inverse() {
    let mut m = Matrix::identity();
    m.translate(5.0, 0.0, 0.0);
    m.rotate(90.0, 0.0, 0.0, 1.0);
    let inv = m.get_inverse().unwrap();
    assert_near_identity(&(m * inv), 1e-4);
    assert_near_identity(&(inv * m), 1e-4);
}

#[test]
fn composed_transforms_round_trip_through_inverse() {
    let mut m = Matrix::identity();
    m.translate(-3.0, 7.5, 2.0);
    m.rotate(33.0, 0.3, 1.0, -0.2);
    m.scale(2.0, 0.5, 1.5);
    m.rotate(-120.0, 1.0, 0.0, 0.0);
    m.translate(0.25, 0.0, -4.0);
    let inv = m.get_inverse().unwrap();
    assert_near_identity(&(m * inv), 1e-4);
}

#[test]
fn uniform_scale_rotation_uses_fast_path_and_still_inverts() {
    let mut m = Matrix::identity();
    m.scale(3.0, 3.0, 3.0);
    m.rotate(45.0, 0.0, 1.0, 0.0);
    m.translate(1.0, 2.0, 3.0);
    let inv = m.get_inverse().unwrap();
    assert_near_identity(&(m * inv), 1e-4);
}

#[test]
fn perspective_projection_round_trips() {
    let mut m = Matrix::identity();
    m.perspective(60.0, 4.0 / 3.0, 0.1, 100.0);
    m.translate(0.0, 0.0, -5.0);
    let inv = m.get_inverse().unwrap();
    assert_near_identity(&(m * inv), 1e-3);
}

#[test]
fn ortho_round_trips() {
    let mut m = Matrix::identity();
    m.ortho(0.0, 640.0, 480.0, 0.0, -1.0, 1.0);
    let inv = m.get_inverse().unwrap();
    assert_near_identity(&(m * inv), 1e-5);
}

#[test]
fn singular_matrix_reports_none_and_caches_identity() {
    let mut m = Matrix::identity();
    m.scale(0.0, 1.0, 1.0);
    assert!(m.get_inverse().is_none());
    assert!(!m.update_inverse());
    assert_eq!(m.inverse_or_identity(), Matrix::identity());

    let mut general = Matrix::from_array([0.0; 16]);
    assert!(general.get_inverse().is_none());
}

#[test]
fn tiny_rotation_axis_is_a_no_op() {
    let mut m = Matrix::identity();
    m.translate(1.0, 2.0, 3.0);
    let before = m;
    m.rotate(45.0, 1e-5, 1e-5, 0.0);
    assert_eq!(m, before);
}

#[test]
fn rotate_about_z_maps_x_axis_to_y_axis() {
    let mut m = Matrix::identity();
    m.rotate(90.0, 0.0, 0.0, 1.0);
    assert_point_near(m.transform_point(1.0, 0.0, 0.0, 1.0), [0.0, 1.0, 0.0, 1.0]);

    let mut neg = Matrix::identity();
    neg.rotate(90.0, 0.0, 0.0, -1.0);
    assert_point_near(neg.transform_point(1.0, 0.0, 0.0, 1.0), [0.0, -1.0, 0.0, 1.0]);
}

#[test]
fn single_axis_rotation_matches_general_axis_rotation() {
    let mut fast = Matrix::identity();
    fast.rotate(30.0, 0.0, 1.0, 0.0);
    let mut slow = Matrix::identity();
    slow.rotate(30.0, 0.0, 1.0, 1e-7);
    let p = [0.3, -0.7, 2.0];
    assert_point_near(
        fast.transform_point(p[0], p[1], p[2], 1.0),
        slow.transform_point(p[0], p[1], p[2], 1.0),
    );
}

#[test]
fn transform_point_applies_translation_through_w() {
    let mut m = Matrix::identity();
    m.translate(10.0, 20.0, 30.0);
    assert_eq!(m.transform_point(1.0, 2.0, 3.0, 1.0), [11.0, 22.0, 33.0, 1.0]);
    assert_eq!(m.transform_point(1.0, 2.0, 3.0, 0.0), [1.0, 2.0, 3.0, 0.0]);
}

#[test]
fn classification_follows_applied_operations() {
    let mut t = Matrix::identity();
    t.translate(1.0, 2.0, 0.0);
    assert_eq!(t.matrix_type(), MatrixType::TwoDNoRot);
    assert!(t.is_length_preserving());

    let mut s = Matrix::identity();
    s.scale(2.0, 3.0, 4.0);
    assert_eq!(s.matrix_type(), MatrixType::ThreeDNoRot);
    assert!(s.is_general_scale());

    let mut r = Matrix::identity();
    r.rotate(10.0, 0.0, 0.0, 1.0);
    assert_eq!(r.matrix_type(), MatrixType::TwoD);
    assert!(r.has_rotation());

    let mut p = Matrix::identity();
    p.frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 10.0);
    assert_eq!(p.matrix_type(), MatrixType::Perspective);
}

#[test]
fn classification_from_raw_array_is_recomputed() {
    let mut m = Matrix::from_array(IDENTITY);
    assert_eq!(m.matrix_type(), MatrixType::Identity);

    let mut t = Matrix::identity();
    t.translate(4.0, 5.0, 6.0);
    let mut raw = Matrix::from_array(*t.as_array());
    assert_eq!(raw.matrix_type(), MatrixType::ThreeDNoRot);
    assert!(raw.flags().contains(MatrixFlags::TRANSLATION));
    assert!(!raw.has_rotation());
}

#[test]
fn multiply_array_matches_matrix_multiply() {
    let mut a = Matrix::identity();
    a.translate(1.0, -2.0, 0.5);
    a.rotate(20.0, 1.0, 1.0, 0.0);
    let mut b = Matrix::identity();
    b.scale(2.0, 2.0, 1.0);

    let product = Matrix::multiply(&a, &b);
    let mut in_place = a;
    in_place.multiply_array(b.as_array());
    for (x, y) in product.as_array().iter().zip(in_place.as_array()) {
        assert!((x - y).abs() < 1e-6);
    }
}

#[test]
fn equality_ignores_cached_state() {
    let mut a = Matrix::identity();
    a.translate(1.0, 0.0, 0.0);
    let b = Matrix::from_array(*a.as_array());
    let _ = a.get_inverse();
    assert_eq!(a, b);
}

#[test]
fn transpose_swaps_rows_and_columns() {
    let mut m = Matrix::identity();
    m.translate(7.0, 8.0, 9.0);
    let t = m.transpose();
    assert_eq!(t[3], 7.0);
    assert_eq!(t[7], 8.0);
    assert_eq!(t[11], 9.0);
    assert_eq!(t[12], 0.0);
}

#[test]
fn view_2d_in_perspective_maps_corners_to_the_frustum_edges() {
    let (fov, aspect, near, z_2d) = (60.0f32, 2.0f32, 0.1f32, 10.0f32);
    let mut projection = Matrix::identity();
    projection.perspective(fov, aspect, near, 100.0);
    let mut view = Matrix::identity();
    view.view_2d_in_perspective(fov, aspect, near, z_2d, 200.0, 100.0);

    let ndc = |x: f32, y: f32| {
        let eye = view.transform_point(x, y, 0.0, 1.0);
        let clip = projection.transform_point(eye[0], eye[1], eye[2], eye[3]);
        [clip[0] / clip[3], clip[1] / clip[3]]
    };
    let tl = ndc(0.0, 0.0);
    let br = ndc(200.0, 100.0);
    assert!((tl[0] + 1.0).abs() < 1e-4 && (tl[1] - 1.0).abs() < 1e-4);
    assert!((br[0] - 1.0).abs() < 1e-4 && (br[1] + 1.0).abs() < 1e-4);
}
