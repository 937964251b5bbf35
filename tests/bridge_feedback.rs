use map_areas::draw::memory::{MemoryDrawingTool, MemoryShape};
use map_areas::draw::{
    ActionKind, DrawingStore, LatLng, MapHandle, OverlayEventBridge, ShapeEvent, ShapeKind,
    StateChange,
};
use std::cell::RefCell;
use std::rc::Rc;

struct Harness {
    store: DrawingStore,
    _bridge: OverlayEventBridge,
    tool: Rc<MemoryDrawingTool>,
    actions: Rc<RefCell<Vec<ActionKind>>>,
}

fn harness(refresh_events: &[ShapeEvent]) -> Harness {
    let store = DrawingStore::new(Some(MapHandle::new(7)), None);
    let mut bridge = OverlayEventBridge::new(&store, refresh_events);
    let tool = MemoryDrawingTool::new();
    bridge.connect(tool.clone());
    let actions = Rc::new(RefCell::new(Vec::new()));
    {
        let actions = Rc::clone(&actions);
        store.subscribe(move |change: &StateChange| actions.borrow_mut().push(change.action));
    }
    Harness {
        store,
        _bridge: bridge,
        tool,
        actions,
    }
}

fn triangle() -> Vec<LatLng> {
    vec![
        LatLng::new(0.0, 0.0),
        LatLng::new(1.0, 0.0),
        LatLng::new(1.0, 1.0),
    ]
}

fn refreshes(harness: &Harness) -> usize {
    harness
        .actions
        .borrow()
        .iter()
        .filter(|action| **action == ActionKind::RefreshSnapshots)
        .count()
}

#[test]
fn path_changes_during_drag_refresh_once_at_drag_end() {
    let h = harness(&[ShapeEvent::PathChanged, ShapeEvent::MouseUp]);
    let shape = MemoryShape::polygon(triangle());
    h.tool.complete(ShapeKind::Polygon, shape.clone());

    shape.emit(ShapeEvent::DragStart);
    for _ in 0..3 {
        shape.emit(ShapeEvent::Drag);
        shape.emit(ShapeEvent::PathChanged);
    }
    assert_eq!(refreshes(&h), 0);
    assert!(h.store.guard().is_dragging());

    shape.emit(ShapeEvent::DragEnd);
    assert_eq!(refreshes(&h), 1);
    assert!(h.store.guard().is_open());
}

#[test]
fn dragged_path_is_recorded_and_undoable() {
    let h = harness(&[ShapeEvent::PathChanged]);
    let shape = MemoryShape::polygon(triangle());
    h.tool.complete(ShapeKind::Polygon, shape.clone());

    shape.drag_by(1.0, 1.0, 5);
    let moved = shape.current_path();
    assert_eq!(h.store.state().paths(), vec![moved.clone()]);
    assert_eq!(h.store.undo_len(), 2);

    h.store.undo();
    assert_eq!(shape.current_path(), triangle());
    h.store.redo();
    assert_eq!(shape.current_path(), moved);
    assert_eq!(refreshes(&h), 1);
}

#[test]
fn programmatic_writes_never_dispatch() {
    let h = harness(&[ShapeEvent::PathChanged]);
    let a = MemoryShape::polygon(triangle());
    let b = MemoryShape::polyline(triangle());
    h.tool.complete(ShapeKind::Polygon, a.clone());
    h.tool.complete(ShapeKind::Polyline, b.clone());
    a.move_vertex(0, LatLng::new(-1.0, -1.0));

    for _ in 0..3 {
        h.store.undo();
    }
    for _ in 0..3 {
        h.store.redo();
    }

    assert_eq!(
        *h.actions.borrow(),
        vec![
            ActionKind::AddOverlay,
            ActionKind::AddOverlay,
            ActionKind::RefreshSnapshots,
            ActionKind::Undo,
            ActionKind::Undo,
            ActionKind::Undo,
            ActionKind::Redo,
            ActionKind::Redo,
            ActionKind::Redo,
        ]
    );
    assert_eq!(a.current_path()[0], LatLng::new(-1.0, -1.0));
}

#[test]
fn only_configured_events_trigger_refresh() {
    let h = harness(&[ShapeEvent::MouseUp]);
    let shape = MemoryShape::polygon(triangle());
    h.tool.complete(ShapeKind::Polygon, shape.clone());

    shape.move_vertex(1, LatLng::new(3.0, 3.0));
    assert_eq!(refreshes(&h), 0);

    shape.emit(ShapeEvent::MouseUp);
    assert_eq!(refreshes(&h), 1);
    assert_eq!(h.store.state().now[0].path()[1], LatLng::new(3.0, 3.0));
}
