use crate::draw::model::LatLng;
use crate::draw::store::StateChange;
use crate::persistence::{Document, PersistenceAdapter, PersistenceError, RecordId};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub const DEFAULT_AREAS_COLLECTION: &str = "areas";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub area: Vec<LatLng>,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl AreaRecord {
    pub fn new(area: Vec<LatLng>) -> Self {
        Self {
            area,
            timestamp: None,
        }
    }

    pub fn stamped(area: Vec<LatLng>) -> Self {
        Self {
            area,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn from_document(document: &Document) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_value(document.data.clone())?)
    }
}

/// Stable key for one mirrored overlay, independent of its position in `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    Create { slot: SlotId, area: Vec<LatLng> },
    Update { slot: SlotId, area: Vec<LatLng> },
    Delete { slot: SlotId },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Operations dropped because their record was never stored.
    pub skipped: usize,
    pub failures: Vec<PersistenceError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failures.is_empty()
    }
}

impl PersistOp {
    pub fn slot(&self) -> SlotId {
        match self {
            Self::Create { slot, .. } | Self::Update { slot, .. } | Self::Delete { slot } => *slot,
        }
    }
}

/// Writes waiting for the next flush, merged per slot so the queue stays
/// bounded by the number of areas rather than the number of edits.
#[derive(Debug, Default)]
pub struct PendingOps {
    ops: Vec<PersistOp>,
}

impl PendingOps {
    pub fn push(&mut self, op: PersistOp) {
        match op {
            PersistOp::Create { .. } => self.ops.push(op),
            PersistOp::Update { slot, area } => {
                let queued = self.ops.iter().rposition(|op| {
                    op.slot() == slot && !matches!(op, PersistOp::Delete { .. })
                });
                match queued.and_then(|index| self.ops.get_mut(index)) {
                    Some(PersistOp::Create { area: queued, .. })
                    | Some(PersistOp::Update { area: queued, .. }) => *queued = area,
                    _ => self.ops.push(PersistOp::Update { slot, area }),
                }
            }
            PersistOp::Delete { slot } => {
                let never_stored = self
                    .ops
                    .iter()
                    .any(|op| op.slot() == slot && matches!(op, PersistOp::Create { .. }));
                self.ops.retain(|op| op.slot() != slot);
                if !never_stored {
                    self.ops.push(PersistOp::Delete { slot });
                }
            }
        }
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = PersistOp>) {
        for op in ops {
            self.push(op);
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn take(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.ops)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MirroredArea {
    slot: SlotId,
    area: Vec<LatLng>,
}

/// Mirrors the history's `now` into an area collection.
///
/// [`AreaMirror::plan`] is synchronous and runs from a store observer; the
/// returned operations are executed later by [`AreaMirror::apply`]. Both take
/// `&self` and never hold a borrow across an await, so planning may run while
/// a flush is in flight. Store failures are logged and reported but never
/// retried, and the history is not rolled back.
#[derive(Debug)]
pub struct AreaMirror {
    collection: String,
    mirrored: RefCell<Vec<MirroredArea>>,
    ids: RefCell<HashMap<SlotId, RecordId>>,
    next_slot: Cell<u64>,
}

impl AreaMirror {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            mirrored: RefCell::new(Vec::new()),
            ids: RefCell::new(HashMap::new()),
            next_slot: Cell::new(0),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn len(&self) -> usize {
        self.mirrored.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrored.borrow().is_empty()
    }

    pub fn record_id(&self, index: usize) -> Option<RecordId> {
        let slot = self.mirrored.borrow().get(index)?.slot;
        self.ids.borrow().get(&slot).cloned()
    }

    pub fn plan(&self, change: &StateChange) -> Vec<PersistOp> {
        let mut ops = Vec::new();
        let mut mirrored = self.mirrored.borrow_mut();

        while mirrored.len() > change.now.len() {
            if let Some(gone) = mirrored.pop() {
                ops.push(PersistOp::Delete { slot: gone.slot });
            }
        }

        for &index in &change.changed {
            let Some(overlay) = change.now.get(index) else {
                continue;
            };
            let area = overlay.path().to_vec();
            match mirrored.get_mut(index) {
                Some(existing) if existing.area == area => {}
                Some(existing) => {
                    existing.area = area.clone();
                    ops.push(PersistOp::Update {
                        slot: existing.slot,
                        area,
                    });
                }
                None => {
                    let slot = SlotId(self.next_slot.get());
                    self.next_slot.set(slot.0 + 1);
                    mirrored.push(MirroredArea {
                        slot,
                        area: area.clone(),
                    });
                    ops.push(PersistOp::Create { slot, area });
                }
            }
        }

        ops
    }

    pub async fn apply(
        &self,
        adapter: &dyn PersistenceAdapter,
        ops: Vec<PersistOp>,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        for op in ops {
            match op {
                PersistOp::Create { slot, area } => {
                    let record = AreaRecord::stamped(area);
                    let result = match serde_json::to_value(&record) {
                        Ok(data) => adapter.create(&self.collection, data).await,
                        Err(err) => Err(err.into()),
                    };
                    match result {
                        Ok(id) => {
                            tracing::debug!(%id, "area record created");
                            self.ids.borrow_mut().insert(slot, id);
                            report.created += 1;
                        }
                        Err(error) => {
                            tracing::error!(%error, "failed to create area record");
                            report.failures.push(error);
                        }
                    }
                }
                PersistOp::Update { slot, area } => {
                    let id = self.ids.borrow().get(&slot).cloned();
                    let Some(id) = id else {
                        tracing::warn!(?slot, "area has no stored record; update skipped");
                        report.skipped += 1;
                        continue;
                    };
                    let result = match serde_json::to_value(AreaRecord::new(area)) {
                        Ok(data) => adapter.update(&self.collection, &id, data).await,
                        Err(err) => Err(err.into()),
                    };
                    match result {
                        Ok(()) => {
                            tracing::debug!(%id, "area record updated");
                            report.updated += 1;
                        }
                        Err(error) => {
                            tracing::error!(%id, %error, "failed to update area record");
                            report.failures.push(error);
                        }
                    }
                }
                PersistOp::Delete { slot } => {
                    let id = self.ids.borrow_mut().remove(&slot);
                    let Some(id) = id else {
                        tracing::warn!(?slot, "area has no stored record; delete skipped");
                        report.skipped += 1;
                        continue;
                    };
                    match adapter.delete(&self.collection, &id).await {
                        Ok(()) => {
                            tracing::debug!(%id, "area record deleted");
                            report.deleted += 1;
                        }
                        Err(error) => {
                            tracing::error!(%id, %error, "failed to delete area record");
                            report.failures.push(error);
                        }
                    }
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredArea {
    pub id: RecordId,
    pub record: AreaRecord,
}

/// Areas that already existed in the store when the session started.
#[derive(Debug, Default)]
pub struct AreaCatalog {
    collection: String,
    areas: Vec<StoredArea>,
}

impl AreaCatalog {
    pub async fn load(
        adapter: &dyn PersistenceAdapter,
        collection: &str,
    ) -> Result<Self, PersistenceError> {
        let documents = adapter.list(collection).await?;
        let mut areas = Vec::with_capacity(documents.len());
        for document in &documents {
            match AreaRecord::from_document(document) {
                Ok(record) => areas.push(StoredArea {
                    id: document.id.clone(),
                    record,
                }),
                Err(error) => {
                    tracing::warn!(id = %document.id, %error, "skipping malformed area record")
                }
            }
        }
        tracing::info!(count = areas.len(), collection, "loaded stored areas");
        Ok(Self {
            collection: collection.to_string(),
            areas,
        })
    }

    pub fn areas(&self) -> &[StoredArea] {
        &self.areas
    }

    /// Remove the area locally, then delete its record. A failed delete is
    /// logged; the local removal stands.
    pub async fn delete(
        &mut self,
        adapter: &dyn PersistenceAdapter,
        index: usize,
    ) -> Option<StoredArea> {
        if index >= self.areas.len() {
            return None;
        }
        let removed = self.areas.remove(index);
        match adapter.delete(&self.collection, &removed.id).await {
            Ok(()) => tracing::info!(id = %removed.id, "area deleted"),
            Err(error) => tracing::error!(id = %removed.id, %error, "failed to delete area"),
        }
        Some(removed)
    }
}
