//! Contracts for the objects owned by the map widget.
//!
//! The core never owns a shape. It keeps a shared reference per overlay, reads
//! and writes its path, attaches it to or detaches it from the map, and listens
//! to the mutation events it emits.

use crate::draw::model::{DrawResult, LatLng, ShapeGeometry};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub type ShapeRef = Rc<dyn ShapeHandle>;
pub type ShapeCallback = Box<dyn FnMut()>;
pub type CompletionCallback = Box<dyn FnMut(DrawResult)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeEvent {
    DragStart,
    Drag,
    DragEnd,
    PathChanged,
    MouseUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle {
    id: u64,
}

impl MapHandle {
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("map {0} is not ready to host shapes")]
    MapNotReady(u64),
    #[error("shape was disposed by the map widget")]
    Disposed,
}

pub trait ShapeHandle {
    fn attach(&self, map: &MapHandle) -> Result<(), ShapeError>;
    fn detach(&self);
    fn geometry(&self) -> ShapeGeometry;
    /// Replace the live path. Shapes without a path ignore this.
    fn set_path(&self, path: &[LatLng]);
    fn on(&self, event: ShapeEvent, callback: ShapeCallback) -> SubscriptionId;
    /// Unknown ids are ignored.
    fn off(&self, subscription: SubscriptionId);
}

pub trait DrawingTool {
    fn on_shape_completed(&self, callback: CompletionCallback) -> SubscriptionId;
    fn off(&self, subscription: SubscriptionId);
}

/// Identity comparison on the shape itself, ignoring vtable metadata.
pub fn same_shape(a: &ShapeRef, b: &ShapeRef) -> bool {
    std::ptr::eq(Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>())
}
