//! The session's history store.
//!
//! Owns the [`HistoryState`], runs the reducer for every dispatched action,
//! projects the new `now` onto the live shapes and notifies observers. A
//! dispatch raised while another one is being applied (from a shape callback
//! or an observer) is queued and applied after it, in order.

use crate::draw::guard::DispatchGuard;
use crate::draw::history::{self, ActionKind, DrawAction};
use crate::draw::model::{HistoryState, Overlay};
use crate::draw::shape::{same_shape, MapHandle};
use crate::draw::sync::{OverlaySync, SyncWarning};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub action: ActionKind,
    pub previous: Vec<Overlay>,
    pub now: Vec<Overlay>,
    /// Indices of `now` whose shape or snapshot differ from `previous`.
    pub changed: Vec<usize>,
    pub undo_len: usize,
    pub redo_len: usize,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&StateChange)>;

struct StoreInner {
    state: RefCell<HistoryState>,
    sync: RefCell<OverlaySync>,
    guard: Rc<DispatchGuard>,
    pending: RefCell<VecDeque<DrawAction>>,
    draining: Cell<bool>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    next_observer: Cell<u64>,
    history_limit: Option<usize>,
}

#[derive(Clone)]
pub struct DrawingStore {
    inner: Rc<StoreInner>,
}

#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<DrawingStore> {
        self.inner.upgrade().map(|inner| DrawingStore { inner })
    }
}

struct DrainReset<'a>(&'a Cell<bool>);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl DrawingStore {
    pub fn new(map: Option<MapHandle>, history_limit: Option<usize>) -> Self {
        let guard = Rc::new(DispatchGuard::new());
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(HistoryState::default()),
                sync: RefCell::new(OverlaySync::new(map, Rc::clone(&guard))),
                guard,
                pending: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(0),
                history_limit,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn guard(&self) -> Rc<DispatchGuard> {
        Rc::clone(&self.inner.guard)
    }

    pub fn state(&self) -> HistoryState {
        self.inner.state.borrow().clone()
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&HistoryState) -> T) -> T {
        f(&*self.inner.state.borrow())
    }

    pub fn undo_len(&self) -> usize {
        self.with_state(HistoryState::undo_len)
    }

    pub fn redo_len(&self) -> usize {
        self.with_state(HistoryState::redo_len)
    }

    pub fn dispatch(&self, action: DrawAction) {
        self.inner.pending.borrow_mut().push_back(action);
        if self.inner.draining.replace(true) {
            return;
        }
        let _reset = DrainReset(&self.inner.draining);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(action) = next else {
                break;
            };
            self.apply(action);
        }
    }

    pub fn undo(&self) {
        self.dispatch(DrawAction::Undo);
    }

    pub fn redo(&self) {
        self.dispatch(DrawAction::Redo);
    }

    pub fn subscribe(&self, observer: impl FnMut(&StateChange) + 'static) -> ObserverId {
        let id = ObserverId(self.inner.next_observer.get());
        self.inner.next_observer.set(id.0 + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.inner
            .observers
            .borrow_mut()
            .retain(|(observer, _)| *observer != id);
    }

    /// Point the store at a (new) map and re-project the current `now` onto it.
    pub fn set_map(&self, map: Option<MapHandle>) -> Vec<SyncWarning> {
        let now = self.inner.state.borrow().now.clone();
        let mut sync = self.inner.sync.borrow_mut();
        sync.set_map(map);
        sync.project(&now)
    }

    pub fn attached_len(&self) -> usize {
        self.inner.sync.borrow().attached_len()
    }

    /// Detach every live shape from the map. History is kept.
    pub fn teardown(&self) {
        self.inner.sync.borrow_mut().teardown();
    }

    fn apply(&self, action: DrawAction) {
        let kind = action.kind();
        let (previous, now, undo_len, redo_len) = {
            let mut state = self.inner.state.borrow_mut();
            if !action.applies_to(&state) {
                tracing::debug!(?kind, "history action is a no-op");
                return;
            }
            let previous = state.now.clone();
            let mut next = history::reduce(std::mem::take(&mut *state), action);
            if let Some(limit) = self.inner.history_limit {
                next.trim_past(limit);
            }
            *state = next;
            (previous, state.now.clone(), state.undo_len(), state.redo_len())
        };

        let warnings = self.inner.sync.borrow_mut().project(&now);
        let changed = changed_indices(&previous, &now);
        tracing::debug!(
            ?kind,
            overlays = now.len(),
            changed = changed.len(),
            undo_len,
            redo_len,
            "history transition"
        );

        let change = StateChange {
            action: kind,
            previous,
            now,
            changed,
            undo_len,
            redo_len,
            warnings,
        };
        self.notify(&change);
    }

    fn notify(&self, change: &StateChange) {
        let mut observers = std::mem::take(&mut *self.inner.observers.borrow_mut());
        for (_, observer) in observers.iter_mut() {
            observer(change);
        }
        let mut slot = self.inner.observers.borrow_mut();
        observers.append(&mut slot);
        *slot = observers;
    }
}

fn changed_indices(previous: &[Overlay], now: &[Overlay]) -> Vec<usize> {
    now.iter()
        .enumerate()
        .filter(|(index, overlay)| match previous.get(*index) {
            Some(before) => {
                !same_shape(&before.geometry, &overlay.geometry)
                    || before.snapshot != overlay.snapshot
            }
            None => true,
        })
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::memory::MemoryShape;
    use crate::draw::model::{DrawResult, LatLng, ShapeKind};

    fn add(store: &DrawingStore, shape: &Rc<MemoryShape>) {
        store.dispatch(DrawAction::AddOverlay(DrawResult {
            kind: ShapeKind::Polygon,
            shape: shape.clone(),
        }));
    }

    #[test]
    fn observers_see_changed_indices() {
        let store = DrawingStore::new(Some(MapHandle::new(1)), None);
        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = Rc::clone(&changes);
            store.subscribe(move |change| changes.borrow_mut().push(change.changed.clone()));
        }
        let a = MemoryShape::polygon(vec![LatLng::new(0.0, 0.0)]);
        let b = MemoryShape::polygon(vec![LatLng::new(1.0, 1.0)]);
        add(&store, &a);
        add(&store, &b);
        b.replace_path_silently(vec![LatLng::new(2.0, 2.0)]);
        store.dispatch(DrawAction::RefreshSnapshots);

        assert_eq!(*changes.borrow(), vec![vec![0], vec![1], vec![1]]);
    }

    #[test]
    fn noop_undo_does_not_notify() {
        let store = DrawingStore::new(None, None);
        let calls = Rc::new(Cell::new(0));
        {
            let calls = Rc::clone(&calls);
            store.subscribe(move |_| calls.set(calls.get() + 1));
        }
        store.undo();
        store.redo();
        assert_eq!(calls.get(), 0);
        assert_eq!(store.state(), HistoryState::default());
    }

    #[test]
    fn undo_restores_snapshot_onto_live_shape() {
        let store = DrawingStore::new(Some(MapHandle::new(1)), None);
        let shape = MemoryShape::polygon(vec![LatLng::new(0.0, 0.0)]);
        add(&store, &shape);
        shape.replace_path_silently(vec![LatLng::new(8.0, 8.0)]);
        store.dispatch(DrawAction::RefreshSnapshots);

        store.undo();
        assert_eq!(shape.current_path(), vec![LatLng::new(0.0, 0.0)]);
        store.redo();
        assert_eq!(shape.current_path(), vec![LatLng::new(8.0, 8.0)]);
    }

    #[test]
    fn undoing_an_add_detaches_the_shape() {
        let store = DrawingStore::new(Some(MapHandle::new(1)), None);
        let shape = MemoryShape::polygon(vec![LatLng::new(0.0, 0.0)]);
        add(&store, &shape);
        assert_eq!(shape.attached_map(), Some(MapHandle::new(1)));

        store.undo();
        assert_eq!(shape.attached_map(), None);
        assert_eq!(store.attached_len(), 0);
    }

    #[test]
    fn dispatch_from_observer_is_queued() {
        let store = DrawingStore::new(None, None);
        let shape = MemoryShape::polygon(vec![LatLng::new(0.0, 0.0)]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let weak = store.downgrade();
            let seen = Rc::clone(&seen);
            store.subscribe(move |change| {
                seen.borrow_mut().push(change.action);
                if change.action == ActionKind::AddOverlay {
                    if let Some(store) = weak.upgrade() {
                        store.dispatch(DrawAction::Undo);
                    }
                }
            });
        }
        add(&store, &shape);

        assert_eq!(*seen.borrow(), vec![ActionKind::AddOverlay, ActionKind::Undo]);
        assert!(store.state().now.is_empty());
    }

    #[test]
    fn history_limit_bounds_undo_depth() {
        let store = DrawingStore::new(None, Some(2));
        for offset in 0..5 {
            let shape = MemoryShape::polygon(vec![LatLng::new(offset as f64, 0.0)]);
            add(&store, &shape);
        }
        assert_eq!(store.undo_len(), 2);
        assert_eq!(store.state().now.len(), 5);
    }

    #[test]
    fn set_map_attaches_overlays_drawn_before_the_map() {
        let store = DrawingStore::new(None, None);
        let shape = MemoryShape::polygon(vec![LatLng::new(0.0, 0.0)]);
        add(&store, &shape);
        assert_eq!(shape.attached_map(), None);

        assert!(store.set_map(Some(MapHandle::new(3))).is_empty());
        assert_eq!(shape.attached_map(), Some(MapHandle::new(3)));
    }
}
