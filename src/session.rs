//! One editing session: a map, a drawing tool, the history store with its
//! event bridge, and the persistence that hangs off the store's changes.

use crate::draw::bridge::OverlayEventBridge;
use crate::draw::model::HistoryState;
use crate::draw::shape::{DrawingTool, MapHandle};
use crate::draw::store::{DrawingStore, ObserverId, StateChange};
use crate::draw::sync::SyncWarning;
use crate::persistence::areas::StoredArea;
use crate::persistence::{
    AreaCatalog, AreaMirror, FlushReport, MarkerBoard, PendingOps, PersistenceAdapter,
};
use crate::settings::Settings;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::rc::Rc;

pub struct Session {
    adapter: Rc<dyn PersistenceAdapter>,
    store: DrawingStore,
    bridge: OverlayEventBridge,
    observer: ObserverId,
    mirror: Rc<AreaMirror>,
    pending: Rc<RefCell<PendingOps>>,
    catalog: AreaCatalog,
    markers: MarkerBoard,
}

impl Session {
    /// Load the stored areas, follow the marker collection and start
    /// listening to `tool`.
    pub async fn open(
        adapter: Rc<dyn PersistenceAdapter>,
        tool: Rc<dyn DrawingTool>,
        map: Option<MapHandle>,
        settings: &Settings,
    ) -> Result<Self> {
        let catalog = AreaCatalog::load(&*adapter, &settings.areas_collection)
            .await
            .with_context(|| format!("load {} collection", settings.areas_collection))?;
        let markers = MarkerBoard::follow(&*adapter, &settings.markers_collection);

        let store = DrawingStore::new(map, settings.history_limit);
        let mirror = Rc::new(AreaMirror::new(settings.areas_collection.clone()));
        let pending = Rc::new(RefCell::new(PendingOps::default()));
        let observer = {
            let mirror = Rc::clone(&mirror);
            let pending = Rc::clone(&pending);
            store.subscribe(move |change: &StateChange| {
                for warning in &change.warnings {
                    tracing::warn!(?warning, "overlay could not be shown");
                }
                pending.borrow_mut().extend(mirror.plan(change));
            })
        };

        let mut bridge = OverlayEventBridge::new(&store, &settings.refresh_events);
        bridge.connect(tool);

        tracing::info!(
            map = ?map.map(|map| map.id()),
            stored_areas = catalog.areas().len(),
            markers = markers.len(),
            "session opened"
        );

        Ok(Self {
            adapter,
            store,
            bridge,
            observer,
            mirror,
            pending,
            catalog,
            markers,
        })
    }

    pub fn store(&self) -> &DrawingStore {
        &self.store
    }

    pub fn bridge(&self) -> &OverlayEventBridge {
        &self.bridge
    }

    pub fn state(&self) -> HistoryState {
        self.store.state()
    }

    pub fn undo(&self) {
        self.store.undo();
    }

    pub fn redo(&self) {
        self.store.redo();
    }

    pub fn set_map(&self, map: Option<MapHandle>) -> Vec<SyncWarning> {
        self.store.set_map(map)
    }

    /// Area writes queued since the last flush, at most one per area.
    pub fn pending_writes(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn mirror(&self) -> &AreaMirror {
        &self.mirror
    }

    pub fn catalog(&self) -> &AreaCatalog {
        &self.catalog
    }

    pub fn markers(&self) -> &MarkerBoard {
        &self.markers
    }

    /// Write the queued area changes to the store.
    pub async fn flush(&mut self) -> FlushReport {
        let ops = self.pending.borrow_mut().take();
        if ops.is_empty() {
            return FlushReport::default();
        }
        let report = self.mirror.apply(&*self.adapter, ops).await;
        if !report.is_clean() {
            tracing::warn!(
                skipped = report.skipped,
                failures = report.failures.len(),
                "area flush incomplete"
            );
        }
        report
    }

    /// Delete one of the areas that were stored before the session began.
    pub async fn delete_area(&mut self, index: usize) -> Option<StoredArea> {
        self.catalog.delete(&*self.adapter, index).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.store.unsubscribe(self.observer);
        self.bridge.disconnect();
        self.store.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::memory::{MemoryDrawingTool, MemoryShape};
    use crate::draw::model::{LatLng, ShapeKind};
    use crate::draw::shape::ShapeRef;
    use crate::persistence::{AreaRecord, InMemoryStore};
    use serde_json::json;

    fn square(origin: f64) -> Vec<LatLng> {
        vec![
            LatLng::new(origin, origin),
            LatLng::new(origin, origin + 1.0),
            LatLng::new(origin + 1.0, origin + 1.0),
        ]
    }

    async fn open(store: &InMemoryStore, tool: &Rc<MemoryDrawingTool>) -> Session {
        Session::open(
            Rc::new(store.clone()),
            tool.clone(),
            Some(MapHandle::new(1)),
            &Settings::default(),
        )
        .await
        .expect("open session")
    }

    #[tokio::test]
    async fn drawn_areas_are_created_then_removed_by_undo() {
        let store = InMemoryStore::new();
        let tool = MemoryDrawingTool::new();
        let mut session = open(&store, &tool).await;

        let shape: ShapeRef = MemoryShape::polygon(square(0.0));
        tool.complete(ShapeKind::Polygon, shape);
        assert_eq!(session.pending_writes(), 1);

        let report = session.flush().await;
        assert_eq!(report.created, 1);
        assert_eq!(store.len("areas"), 1);

        session.undo();
        let report = session.flush().await;
        assert_eq!(report.deleted, 1);
        assert_eq!(store.len("areas"), 0);
    }

    #[tokio::test]
    async fn unflushed_edits_queue_one_write_per_area() {
        let store = InMemoryStore::new();
        let tool = MemoryDrawingTool::new();
        let mut session = open(&store, &tool).await;
        let shape = MemoryShape::polygon(square(0.0));
        tool.complete(ShapeKind::Polygon, shape.clone());

        for step in 1..=20 {
            shape.move_vertex(0, LatLng::new(-(step as f64), 0.0));
        }
        assert_eq!(session.store().undo_len(), 21);
        assert_eq!(session.pending_writes(), 1);

        let report = session.flush().await;
        assert_eq!((report.created, report.updated), (1, 0));
        let stored = store.documents("areas");
        let record = AreaRecord::from_document(&stored[0]).expect("area record");
        assert_eq!(record.area, shape.current_path());
    }

    #[tokio::test]
    async fn stored_areas_and_markers_are_loaded() {
        let store = InMemoryStore::new();
        store.seed("areas", json!({ "area": square(5.0), "timestamp": 1 }));
        store.seed(
            "users",
            json!({ "name": "crew", "location": { "lat": 1.0, "lng": 1.0 } }),
        );
        let tool = MemoryDrawingTool::new();
        let mut session = open(&store, &tool).await;

        assert_eq!(session.catalog().areas().len(), 1);
        assert_eq!(session.markers().len(), 1);

        let removed = session.delete_area(0).await.expect("area removed");
        assert_eq!(removed.record.area, square(5.0));
        assert_eq!(store.len("areas"), 0);
    }

    #[tokio::test]
    async fn failed_catalog_load_is_an_error() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        let tool = MemoryDrawingTool::new();
        let result = Session::open(Rc::new(store), tool, None, &Settings::default()).await;
        let err = result.err().expect("offline load fails");
        assert!(format!("{err:#}").contains("areas"));
    }

    #[tokio::test]
    async fn dropping_the_session_releases_listeners() {
        let store = InMemoryStore::new();
        let tool = MemoryDrawingTool::new();
        let shape = MemoryShape::polygon(square(0.0));
        {
            let session = open(&store, &tool).await;
            tool.complete(ShapeKind::Polygon, shape.clone());
            assert!(session.store().attached_len() == 1);
            assert!(shape.listener_count() > 0);
        }
        assert_eq!(tool.listener_count(), 0);
        assert_eq!(shape.listener_count(), 0);
        assert_eq!(shape.attached_map(), None);
        assert_eq!(store.subscriber_count(), 0);
    }
}
