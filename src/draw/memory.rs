//! In-process shapes and drawing tool for headless hosts and tests.
//!
//! `MemoryShape` behaves like a widget shape: writes through `set_path` emit
//! `PathChanged`, and user gestures are simulated with the drag and vertex
//! helpers.

use crate::draw::model::{DrawResult, LatLng, ShapeGeometry, ShapeKind};
use crate::draw::shape::{
    CompletionCallback, DrawingTool, MapHandle, ShapeCallback, ShapeError, ShapeEvent,
    ShapeHandle, ShapeRef, SubscriptionId,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Listener {
    id: SubscriptionId,
    event: ShapeEvent,
    callback: Rc<RefCell<ShapeCallback>>,
}

pub struct MemoryShape {
    geometry: RefCell<ShapeGeometry>,
    map: Cell<Option<MapHandle>>,
    listeners: RefCell<Vec<Listener>>,
    next_id: Cell<u64>,
    attach_count: Cell<usize>,
    refuse_attach: Cell<bool>,
}

impl MemoryShape {
    pub fn new(geometry: ShapeGeometry) -> Rc<Self> {
        Rc::new(Self {
            geometry: RefCell::new(geometry),
            map: Cell::new(None),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            attach_count: Cell::new(0),
            refuse_attach: Cell::new(false),
        })
    }

    pub fn polygon(path: Vec<LatLng>) -> Rc<Self> {
        Self::new(ShapeGeometry::Polygon(path))
    }

    pub fn polyline(path: Vec<LatLng>) -> Rc<Self> {
        Self::new(ShapeGeometry::Polyline(path))
    }

    pub fn marker(position: LatLng) -> Rc<Self> {
        Self::new(ShapeGeometry::Point(position))
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.borrow().kind()
    }

    pub fn current_path(&self) -> Vec<LatLng> {
        self.geometry
            .borrow()
            .path()
            .map(<[LatLng]>::to_vec)
            .unwrap_or_default()
    }

    pub fn attached_map(&self) -> Option<MapHandle> {
        self.map.get()
    }

    pub fn attach_count(&self) -> usize {
        self.attach_count.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn set_refuse_attach(&self, refuse: bool) {
        self.refuse_attach.set(refuse);
    }

    /// Replace the path without notifying anyone.
    pub fn replace_path_silently(&self, path: Vec<LatLng>) {
        let mut geometry = self.geometry.borrow_mut();
        match &mut *geometry {
            ShapeGeometry::Polygon(current) | ShapeGeometry::Polyline(current) => *current = path,
            ShapeGeometry::Point(_) => {}
        }
    }

    /// Simulate the operator moving one vertex.
    pub fn move_vertex(&self, index: usize, to: LatLng) {
        let moved = {
            let mut geometry = self.geometry.borrow_mut();
            match &mut *geometry {
                ShapeGeometry::Polygon(path) | ShapeGeometry::Polyline(path) => {
                    match path.get_mut(index) {
                        Some(vertex) => {
                            *vertex = to;
                            true
                        }
                        None => false,
                    }
                }
                ShapeGeometry::Point(position) => {
                    *position = to;
                    true
                }
            }
        };
        if moved {
            self.emit(ShapeEvent::PathChanged);
        }
    }

    /// Simulate dragging the whole shape by `(d_lat, d_lng)` over `ticks`
    /// intermediate moves, emitting the event sequence a widget would.
    pub fn drag_by(&self, d_lat: f64, d_lng: f64, ticks: usize) {
        let ticks = ticks.max(1);
        let (step_lat, step_lng) = (d_lat / ticks as f64, d_lng / ticks as f64);
        self.emit(ShapeEvent::DragStart);
        for _ in 0..ticks {
            self.translate(step_lat, step_lng);
            self.emit(ShapeEvent::Drag);
            self.emit(ShapeEvent::PathChanged);
        }
        self.emit(ShapeEvent::DragEnd);
    }

    fn translate(&self, d_lat: f64, d_lng: f64) {
        let mut geometry = self.geometry.borrow_mut();
        match &mut *geometry {
            ShapeGeometry::Polygon(path) | ShapeGeometry::Polyline(path) => {
                for vertex in path.iter_mut() {
                    *vertex = vertex.offset(d_lat, d_lng);
                }
            }
            ShapeGeometry::Point(position) => *position = position.offset(d_lat, d_lng),
        }
    }

    /// Deliver `event` to its listeners. Callbacks already running further up
    /// the stack are skipped rather than re-entered.
    pub fn emit(&self, event: ShapeEvent) {
        let callbacks: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.event == event)
            .map(|listener| Rc::clone(&listener.callback))
            .collect();
        for callback in callbacks {
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)();
            }
        }
    }
}

impl ShapeHandle for MemoryShape {
    fn attach(&self, map: &MapHandle) -> Result<(), ShapeError> {
        if self.refuse_attach.get() {
            return Err(ShapeError::MapNotReady(map.id()));
        }
        self.map.set(Some(*map));
        self.attach_count.set(self.attach_count.get() + 1);
        Ok(())
    }

    fn detach(&self) {
        self.map.set(None);
    }

    fn geometry(&self) -> ShapeGeometry {
        self.geometry.borrow().clone()
    }

    fn set_path(&self, path: &[LatLng]) {
        if self.kind().is_path_based() {
            self.replace_path_silently(path.to_vec());
            self.emit(ShapeEvent::PathChanged);
        }
    }

    fn on(&self, event: ShapeEvent, callback: ShapeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener {
            id,
            event,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    fn off(&self, subscription: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|listener| listener.id != subscription);
    }
}

#[derive(Default)]
pub struct MemoryDrawingTool {
    listeners: RefCell<Vec<(SubscriptionId, Rc<RefCell<CompletionCallback>>)>>,
    next_id: Cell<u64>,
}

impl MemoryDrawingTool {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Simulate the operator finishing a shape.
    pub fn complete(&self, kind: ShapeKind, shape: ShapeRef) {
        let callbacks: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)(DrawResult {
                    kind,
                    shape: Rc::clone(&shape),
                });
            }
        }
    }
}

impl DrawingTool for MemoryDrawingTool {
    fn on_shape_completed(&self, callback: CompletionCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(callback))));
        id
    }

    fn off(&self, subscription: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|(id, _)| *id != subscription);
    }
}
