use crate::draw::guard::DispatchGuard;
use crate::draw::history::DrawAction;
use crate::draw::model::DrawResult;
use crate::draw::shape::{same_shape, DrawingTool, ShapeEvent, ShapeRef, SubscriptionId};
use crate::draw::state::{self, EditOutcome, EditPhase};
use crate::draw::store::{DrawingStore, ObserverId, StateChange, WeakStore};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

pub const DEFAULT_REFRESH_EVENTS: &[ShapeEvent] = &[ShapeEvent::PathChanged, ShapeEvent::MouseUp];

struct TrackedShape {
    key: u64,
    shape: ShapeRef,
    phase: EditPhase,
    subscriptions: Vec<SubscriptionId>,
    /// Set once the shape has been seen in the history.
    recorded: bool,
}

struct BridgeShared {
    store: WeakStore,
    guard: Rc<DispatchGuard>,
    refresh_events: Vec<ShapeEvent>,
    tracked: RefCell<Vec<TrackedShape>>,
    next_key: Cell<u64>,
}

/// Turns drawing-tool and shape events into history actions.
///
/// Shape events raised while the store is writing to shapes are observed but
/// never dispatched. In-place edits are also held back while any tracked shape
/// is being dragged; a drag end is always recorded.
///
/// A shape is released once it has been recorded and no history entry
/// references it anymore, e.g. after its branch was dropped by a new edit.
pub struct OverlayEventBridge {
    shared: Rc<BridgeShared>,
    tool: Option<(Rc<dyn DrawingTool>, SubscriptionId)>,
    observer: Option<ObserverId>,
}

impl OverlayEventBridge {
    pub fn new(store: &DrawingStore, refresh_events: &[ShapeEvent]) -> Self {
        let shared = Rc::new(BridgeShared {
            store: store.downgrade(),
            guard: store.guard(),
            refresh_events: refresh_events.to_vec(),
            tracked: RefCell::new(Vec::new()),
            next_key: Cell::new(0),
        });
        let observer = {
            let shared = Rc::downgrade(&shared);
            store.subscribe(move |_: &StateChange| {
                if let Some(shared) = shared.upgrade() {
                    shared.prune();
                }
            })
        };
        Self {
            shared,
            tool: None,
            observer: Some(observer),
        }
    }

    /// Listen for completed shapes. Connecting again replaces the previous
    /// tool subscription.
    pub fn connect(&mut self, tool: Rc<dyn DrawingTool>) {
        if let Some((previous, subscription)) = self.tool.take() {
            previous.off(subscription);
        }
        let shared = Rc::downgrade(&self.shared);
        let subscription = tool.on_shape_completed(Box::new(move |result: DrawResult| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let Some(store) = shared.store.upgrade() else {
                return;
            };
            let shape = Rc::clone(&result.shape);
            tracing::debug!(kind = ?result.kind, "shape completed");
            store.dispatch(DrawAction::AddOverlay(result));
            BridgeShared::track(&shared, shape);
        }));
        self.tool = Some((tool, subscription));
    }

    /// Start listening to a shape that did not come from the drawing tool.
    /// It stays tracked until it has entered the history and left it again.
    pub fn track(&self, shape: ShapeRef) {
        BridgeShared::track(&self.shared, shape);
    }

    pub fn tracked_len(&self) -> usize {
        self.shared.tracked.borrow().len()
    }

    pub fn is_tracked(&self, shape: &ShapeRef) -> bool {
        self.shared
            .tracked
            .borrow()
            .iter()
            .any(|tracked| same_shape(&tracked.shape, shape))
    }

    /// Stop listening to `shape`. A drag it left open is closed.
    pub fn forget(&self, shape: &ShapeRef) {
        let removed = {
            let mut tracked = self.shared.tracked.borrow_mut();
            let Some(position) = tracked
                .iter()
                .position(|tracked| same_shape(&tracked.shape, shape))
            else {
                return;
            };
            tracked.remove(position)
        };
        self.shared.release(removed);
    }

    /// Drop every subscription this bridge holds.
    pub fn disconnect(&mut self) {
        if let Some((tool, subscription)) = self.tool.take() {
            tool.off(subscription);
        }
        let tracked = std::mem::take(&mut *self.shared.tracked.borrow_mut());
        for shape in tracked {
            self.shared.release(shape);
        }
    }
}

impl Drop for OverlayEventBridge {
    fn drop(&mut self) {
        self.disconnect();
        if let (Some(observer), Some(store)) = (self.observer.take(), self.shared.store.upgrade()) {
            store.unsubscribe(observer);
        }
    }
}

impl BridgeShared {
    fn track(this: &Rc<Self>, shape: ShapeRef) {
        if this
            .tracked
            .borrow()
            .iter()
            .any(|tracked| same_shape(&tracked.shape, &shape))
        {
            return;
        }

        let key = this.next_key.get();
        this.next_key.set(key + 1);
        let recorded = this.store.upgrade().is_some_and(|store| {
            store.with_state(|state| state.shapes().any(|live| same_shape(live, &shape)))
        });

        let mut events = vec![ShapeEvent::DragStart, ShapeEvent::DragEnd];
        for event in &this.refresh_events {
            if !events.contains(event) {
                events.push(*event);
            }
        }

        let subscriptions = events
            .into_iter()
            .map(|event| {
                let shared = Rc::downgrade(this);
                shape.on(event, Box::new(move || Self::on_shape_event(&shared, key, event)))
            })
            .collect();

        this.tracked.borrow_mut().push(TrackedShape {
            key,
            shape,
            phase: EditPhase::Idle,
            subscriptions,
            recorded,
        });
    }

    fn on_shape_event(shared: &Weak<Self>, key: u64, event: ShapeEvent) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.guard.is_writing() {
            tracing::trace!(?event, "ignoring shape event raised by a programmatic write");
            return;
        }

        let outcome = {
            let Ok(mut tracked) = shared.tracked.try_borrow_mut() else {
                return;
            };
            let Some(entry) = tracked.iter_mut().find(|tracked| tracked.key == key) else {
                return;
            };
            let (phase, outcome) = state::step(entry.phase, event, &shared.refresh_events);
            entry.phase = phase;
            outcome
        };

        match outcome {
            EditOutcome::Ignore => {}
            EditOutcome::BeginDrag => shared.guard.begin_drag(),
            EditOutcome::EndDrag => {
                shared.guard.end_drag();
                shared.record_edit();
            }
            EditOutcome::Refresh if event == ShapeEvent::DragEnd => shared.record_edit(),
            EditOutcome::Refresh => shared.refresh(event),
        }
    }

    fn refresh(&self, event: ShapeEvent) {
        if !self.guard.is_open() {
            tracing::trace!(?event, "shape edit suppressed while guard is closed");
            return;
        }
        self.record_edit();
    }

    fn record_edit(&self) {
        if let Some(store) = self.store.upgrade() {
            store.dispatch(DrawAction::RefreshSnapshots);
        }
    }

    /// Release recorded shapes that no history entry references anymore.
    fn prune(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let released = {
            let Ok(mut tracked) = self.tracked.try_borrow_mut() else {
                return;
            };
            let live: HashSet<*const ()> = store.with_state(|state| {
                state
                    .shapes()
                    .map(|shape| Rc::as_ptr(shape).cast::<()>())
                    .collect()
            });
            let mut released = Vec::new();
            let mut index = 0;
            while index < tracked.len() {
                let entry = &mut tracked[index];
                if live.contains(&Rc::as_ptr(&entry.shape).cast::<()>()) {
                    entry.recorded = true;
                    index += 1;
                } else if entry.recorded {
                    released.push(tracked.remove(index));
                } else {
                    index += 1;
                }
            }
            released
        };
        if !released.is_empty() {
            tracing::debug!(count = released.len(), "releasing shapes dropped from history");
        }
        for shape in released {
            self.release(shape);
        }
    }

    fn release(&self, tracked: TrackedShape) {
        for subscription in tracked.subscriptions {
            tracked.shape.off(subscription);
        }
        if tracked.phase.is_dragging() {
            self.guard.end_drag();
        }
    }
}
