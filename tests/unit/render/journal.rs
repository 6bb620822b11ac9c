use super::*;
use crate::foundation::core::Color;

fn quad(x: f32) -> Quad {
    Quad {
        corners: [[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0]],
        color: Color::WHITE,
    }
}

#[test]
fn batches_follow_clip_identity() {
    let mut outer = ClipStack::new();
    outer.push_window_rectangle(0, 0, 10, 10);
    let mut inner = outer.clone();
    inner.push_window_rectangle(2, 2, 4, 4);

    let mut journal = Journal::new();
    journal.log(quad(0.0), outer.clone());
    journal.log(quad(1.0), outer.clone());
    journal.log(quad(2.0), inner.clone());
    journal.log(quad(3.0), outer.clone());
    assert_eq!(journal.len(), 4);

    let sizes: Vec<usize> = batches(journal.entries()).map(<[JournalEntry]>::len).collect();
    assert_eq!(sizes, [2, 1, 1]);
}

#[test]
fn equal_but_separate_stacks_do_not_batch() {
    let mut a = ClipStack::new();
    a.push_window_rectangle(0, 0, 10, 10);
    let mut b = ClipStack::new();
    b.push_window_rectangle(0, 0, 10, 10);

    let mut journal = Journal::new();
    journal.log(quad(0.0), a);
    journal.log(quad(1.0), b);
    assert_eq!(batches(journal.entries()).count(), 2);
}

#[test]
fn take_empties_and_releases_clip_references() {
    let mut clip = ClipStack::new();
    clip.push_window_rectangle(0, 0, 1, 1);

    let mut journal = Journal::new();
    journal.log(quad(0.0), clip.clone());
    assert_eq!(clip.top_ref_count(), 2);

    let entries = journal.take();
    assert!(journal.is_empty());
    drop(entries);
    assert_eq!(clip.top_ref_count(), 1);
}
