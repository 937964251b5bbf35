use map_areas::draw::memory::MemoryShape;
use map_areas::draw::shape::same_shape;
use map_areas::draw::{reduce, DrawAction, DrawResult, HistoryState, LatLng, ShapeKind, ShapeRef};
use std::rc::Rc;

fn path(points: &[(f64, f64)]) -> Vec<LatLng> {
    points.iter().map(|&(lat, lng)| LatLng::new(lat, lng)).collect()
}

fn add(shape: &ShapeRef) -> DrawAction {
    DrawAction::AddOverlay(DrawResult {
        kind: ShapeKind::Polygon,
        shape: Rc::clone(shape),
    })
}

struct Drawing {
    shape: Rc<MemoryShape>,
    handle: ShapeRef,
}

fn drawing(points: &[(f64, f64)]) -> Drawing {
    let shape = MemoryShape::polygon(path(points));
    let handle: ShapeRef = shape.clone();
    Drawing { shape, handle }
}

fn two_overlays() -> (HistoryState, Drawing, Drawing) {
    let a = drawing(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    let b = drawing(&[(5.0, 5.0), (6.0, 5.0), (6.0, 6.0)]);
    let state = reduce(reduce(HistoryState::default(), add(&a.handle)), add(&b.handle));
    (state, a, b)
}

#[test]
fn scenarios_add_refresh_undo_redo() {
    let a = drawing(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);

    let s1 = reduce(HistoryState::default(), add(&a.handle));
    assert_eq!(s1.paths(), vec![path(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])]);
    assert_eq!(s1.past, vec![Vec::new()]);
    assert!(s1.future.is_empty());

    a.shape.replace_path_silently(path(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)]));
    let s2 = reduce(s1.clone(), DrawAction::RefreshSnapshots);
    assert_eq!(s2.paths(), vec![path(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)])]);
    assert_eq!(s2.past, vec![Vec::new(), s1.now.clone()]);

    let s3 = reduce(s2.clone(), DrawAction::Undo);
    assert_eq!(s3.now, s1.now);
    assert_eq!(s3.past, vec![Vec::new()]);
    assert_eq!(s3.future, vec![s2.now.clone()]);

    let s4 = reduce(s3, DrawAction::Redo);
    assert_eq!(s4, s2);
}

#[test]
fn undo_on_fresh_state_is_identity() {
    let fresh = HistoryState::default();
    assert_eq!(reduce(fresh.clone(), DrawAction::Undo), fresh);
    assert_eq!(reduce(fresh.clone(), DrawAction::Redo), fresh);
}

#[test]
fn redo_on_empty_future_is_identity() {
    let (state, _, _) = two_overlays();
    assert_eq!(reduce(state.clone(), DrawAction::Redo), state);
}

#[test]
fn recording_actions_clear_future() {
    let (state, a, _) = two_overlays();
    let undone = reduce(state, DrawAction::Undo);
    assert!(undone.can_redo());

    a.shape.replace_path_silently(path(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0)]));
    let refreshed = reduce(undone.clone(), DrawAction::RefreshSnapshots);
    assert!(refreshed.future.is_empty());

    let c = drawing(&[(9.0, 9.0), (9.0, 8.0), (8.0, 8.0)]);
    let added = reduce(undone, add(&c.handle));
    assert!(added.future.is_empty());
}

#[test]
fn undo_reverses_add_and_refresh() {
    let (state, a, _) = two_overlays();

    let c = drawing(&[(2.0, 2.0), (3.0, 2.0), (3.0, 3.0)]);
    let added = reduce(state.clone(), add(&c.handle));
    assert_eq!(reduce(added, DrawAction::Undo).now, state.now);

    a.shape.replace_path_silently(path(&[(0.5, 0.5), (1.5, 0.5), (1.5, 1.5)]));
    let refreshed = reduce(state.clone(), DrawAction::RefreshSnapshots);
    let undone = reduce(refreshed, DrawAction::Undo);
    assert_eq!(undone.now, state.now);
    assert_eq!(undone.past, state.past);
}

#[test]
fn redo_reverses_undo() {
    let (state, _, _) = two_overlays();
    let round_trip = reduce(reduce(state.clone(), DrawAction::Undo), DrawAction::Redo);
    assert_eq!(round_trip, state);
}

#[test]
fn adding_after_undo_drops_the_redo_branch() {
    let (state, _, b) = two_overlays();
    let undone = reduce(state, DrawAction::Undo);
    let c = drawing(&[(7.0, 7.0), (8.0, 7.0), (8.0, 8.0)]);
    let branched = reduce(undone, add(&c.handle));

    let redone = reduce(branched.clone(), DrawAction::Redo);
    assert_eq!(redone, branched);
    assert!(!redone
        .now
        .iter()
        .any(|overlay| same_shape(&overlay.geometry, &b.handle)));
}

#[test]
fn history_entries_share_one_handle_per_overlay() {
    let (state, a, _) = two_overlays();
    a.shape.replace_path_silently(path(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0)]));
    let refreshed = reduce(state, DrawAction::RefreshSnapshots);

    let firsts: Vec<_> = refreshed
        .past
        .iter()
        .chain(std::iter::once(&refreshed.now))
        .filter_map(|entry| entry.first())
        .collect();
    assert_eq!(firsts.len(), 3);
    assert!(firsts
        .iter()
        .all(|overlay| same_shape(&overlay.geometry, &a.handle)));
    assert_ne!(refreshed.past[1][0].snapshot, refreshed.now[0].snapshot);
}
