use super::*;

#[test]
fn window_rect_intersection_is_the_overlap() {
    let a = WindowRect::from_xywh(0, 0, 100, 100);
    let b = WindowRect::from_xywh(50, 50, 200, 200);
    let r = a.intersect(b);
    assert_eq!(r, WindowRect::from_xywh(50, 50, 50, 50));
    assert_eq!(r.width(), 50);
    assert_eq!(r.height(), 50);
}

#[test]
fn unbounded_is_neutral_for_intersection() {
    let a = WindowRect::from_xywh(3, 4, 5, 6);
    assert_eq!(WindowRect::UNBOUNDED.intersect(a), a);
    assert!(WindowRect::UNBOUNDED.is_unbounded());
    assert!(!a.is_unbounded());
}

#[test]
fn disjoint_intersection_is_empty() {
    let a = WindowRect::from_xywh(0, 0, 10, 10);
    let b = WindowRect::from_xywh(20, 0, 10, 10);
    assert!(a.intersect(b).is_empty());
}

#[test]
fn from_xywh_saturates_at_the_integer_limit() {
    let r = WindowRect::from_xywh(i32::MAX - 1, 0, 10, 10);
    assert_eq!(r.x1, i32::MAX);
}

#[test]
fn color_from_rgba8_scales_to_unit_range() {
    let c = Color::from_rgba8(255, 0, 51, 255);
    assert_eq!(c.r, 1.0);
    assert_eq!(c.g, 0.0);
    assert!((c.b - 0.2).abs() < 1e-6);
    assert_eq!(Color::default(), Color::WHITE);
}

#[test]
fn viewport_array_matches_fields() {
    let v = Viewport::new(1, 2, 3, 4);
    assert_eq!(v.to_array(), [1.0, 2.0, 3.0, 4.0]);
}
