use super::*;

#[test]
fn starts_with_one_empty_frame() {
    let state = ClipState::new();
    assert_eq!(state.depth(), 1);
    assert!(state.current().is_empty());
}

#[test]
fn save_hides_outer_clips_until_restore() {
    let mut state = ClipState::new();
    state.current_mut().push_window_rectangle(0, 0, 10, 10);
    let before = state.current().clone();

    state.save();
    assert!(state.current().is_empty());
    state.current_mut().push_window_rectangle(1, 1, 2, 2);
    assert_eq!(state.current().depth(), 1);

    state.restore();
    assert!(state.current().ptr_eq(&before));
    assert_eq!(state.current().depth(), 1);
}

#[test]
#[should_panic(expected = "without a matching save")]
fn restoring_initial_frame_panics() {
    let mut state = ClipState::new();
    state.save();
    state.restore();
    state.restore();
}

#[test]
fn set_current_replaces_only_the_top_frame() {
    let mut state = ClipState::new();
    state.current_mut().push_window_rectangle(0, 0, 5, 5);
    state.save();

    let mut other = ClipStack::new();
    other.push_window_rectangle(3, 3, 3, 3);
    other.push_window_rectangle(4, 4, 4, 4);
    state.set_current(other.clone());
    assert!(state.current().ptr_eq(&other));
    assert_eq!(other.top_ref_count(), 2);

    state.restore();
    assert_eq!(other.top_ref_count(), 1);
    assert_eq!(state.current().depth(), 1);
}
