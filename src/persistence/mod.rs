//! Document store contract used by the application layer around the history
//! core. The core never calls it; [`areas::AreaMirror`] translates history
//! changes into store writes and [`markers::MarkerBoard`] follows a live
//! collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod areas;
pub mod markers;
pub mod memory;

pub use areas::{AreaCatalog, AreaMirror, AreaRecord, FlushReport, PendingOps, PersistOp};
pub use markers::{MarkerBoard, ToolMarker};
pub use memory::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record {id} not found in {collection}")]
    NotFound { collection: String, id: RecordId },
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: RecordId,
    pub data: serde_json::Value,
}

pub type SnapshotCallback = Box<dyn FnMut(&[Document])>;

/// Cancels a collection subscription when called or dropped.
#[must_use = "dropping the handle cancels the subscription"]
pub struct Unsubscribe(Option<Box<dyn FnOnce()>>);

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cancel)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

#[async_trait(?Send)]
pub trait PersistenceAdapter {
    async fn create(
        &self,
        collection: &str,
        data: serde_json::Value,
    ) -> Result<RecordId, PersistenceError>;

    /// Merge `data` into the record, creating it when missing.
    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        data: serde_json::Value,
    ) -> Result<(), PersistenceError>;

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), PersistenceError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, PersistenceError>;

    /// Deliver the collection's current documents now and after every change.
    fn subscribe_collection(&self, collection: &str, on_snapshot: SnapshotCallback)
        -> Unsubscribe;
}
