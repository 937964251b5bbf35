pub mod bridge;
pub mod guard;
pub mod history;
pub mod memory;
pub mod model;
pub mod shape;
pub mod state;
pub mod store;
pub mod sync;

pub use bridge::OverlayEventBridge;
pub use guard::{DispatchGuard, WriteSession};
pub use history::{reduce, ActionKind, DrawAction};
pub use model::{DrawResult, HistoryState, LatLng, Overlay, ShapeGeometry, ShapeKind, Snapshot};
pub use shape::{DrawingTool, MapHandle, ShapeError, ShapeEvent, ShapeHandle, ShapeRef};
pub use store::{DrawingStore, StateChange};
pub use sync::{OverlaySync, SyncWarning};
