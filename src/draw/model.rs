use crate::draw::shape::{same_shape, ShapeHandle, ShapeRef};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Polygon,
    Polyline,
    Marker,
}

impl ShapeKind {
    pub fn is_path_based(self) -> bool {
        matches!(self, Self::Polygon | Self::Polyline)
    }
}

/// The renderable representation a shape handle reports, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    Polygon(Vec<LatLng>),
    Polyline(Vec<LatLng>),
    Point(LatLng),
}

impl ShapeGeometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::Polyline(_) => ShapeKind::Polyline,
            Self::Point(_) => ShapeKind::Marker,
        }
    }

    pub fn path(&self) -> Option<&[LatLng]> {
        match self {
            Self::Polygon(path) | Self::Polyline(path) => Some(path),
            Self::Point(_) => None,
        }
    }

    pub fn into_path(self) -> Option<Vec<LatLng>> {
        match self {
            Self::Polygon(path) | Self::Polyline(path) => Some(path),
            Self::Point(_) => None,
        }
    }
}

/// Whether the handle exposes a path (polygon, polyline) rather than a point.
pub fn has_path_geometry(shape: &dyn ShapeHandle) -> bool {
    shape.geometry().path().is_some()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub path: Option<Vec<LatLng>>,
}

impl Snapshot {
    pub fn capture(shape: &dyn ShapeHandle) -> Self {
        Self {
            path: shape.geometry().into_path(),
        }
    }
}

/// A drawn region: the live shape it is rendered with plus the coordinates it
/// had when this history entry was taken.
#[derive(Clone)]
pub struct Overlay {
    pub kind: ShapeKind,
    pub geometry: ShapeRef,
    pub snapshot: Snapshot,
}

impl Overlay {
    pub fn path(&self) -> &[LatLng] {
        self.snapshot.path.as_deref().unwrap_or(&[])
    }
}

impl PartialEq for Overlay {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && same_shape(&self.geometry, &other.geometry)
            && self.snapshot == other.snapshot
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("kind", &self.kind)
            .field("geometry", &std::rc::Rc::as_ptr(&self.geometry).cast::<()>())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

/// Payload of the drawing tool's completion event.
#[derive(Clone)]
pub struct DrawResult {
    pub kind: ShapeKind,
    pub shape: ShapeRef,
}

impl fmt::Debug for DrawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawResult")
            .field("kind", &self.kind)
            .field("shape", &std::rc::Rc::as_ptr(&self.shape).cast::<()>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryState {
    pub past: Vec<Vec<Overlay>>,
    pub now: Vec<Overlay>,
    pub future: Vec<Vec<Overlay>>,
}

impl HistoryState {
    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Drop the oldest undo entries until at most `limit` remain.
    pub fn trim_past(&mut self, limit: usize) {
        if self.past.len() > limit {
            let excess = self.past.len() - limit;
            self.past.drain(..excess);
        }
    }

    pub fn paths(&self) -> Vec<Vec<LatLng>> {
        self.now.iter().map(|overlay| overlay.path().to_vec()).collect()
    }

    /// Every shape referenced by `past`, `now` or `future`, with repeats.
    pub fn shapes(&self) -> impl Iterator<Item = &ShapeRef> {
        self.past
            .iter()
            .chain(std::iter::once(&self.now))
            .chain(self.future.iter())
            .flatten()
            .map(|overlay| &overlay.geometry)
    }
}
