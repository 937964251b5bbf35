use crate::persistence::{
    Document, PersistenceAdapter, PersistenceError, RecordId, SnapshotCallback, Unsubscribe,
};
use async_trait::async_trait;
use hashlink::LinkedHashMap;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

struct Subscriber {
    id: u64,
    collection: String,
    callback: Rc<RefCell<SnapshotCallback>>,
}

#[derive(Default)]
struct MemoryInner {
    collections: RefCell<HashMap<String, LinkedHashMap<RecordId, serde_json::Value>>>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_record: Cell<u64>,
    next_subscriber: Cell<u64>,
    offline: Cell<bool>,
}

/// Collection store kept in process memory. Documents keep insertion order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Rc<MemoryInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every write and listing fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.set(offline);
    }

    /// Insert a document directly, bypassing the offline switch.
    pub fn seed(&self, collection: &str, data: serde_json::Value) -> RecordId {
        let id = self.next_id();
        self.inner
            .collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        self.notify(collection);
        id
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        snapshot(&self.inner, collection)
    }

    pub fn get(&self, collection: &str, id: &RecordId) -> Option<serde_json::Value> {
        self.inner
            .collections
            .borrow()
            .get(collection)
            .and_then(|records| records.get(id).cloned())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .borrow()
            .get(collection)
            .map_or(0, LinkedHashMap::len)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn next_id(&self) -> RecordId {
        let next = self.inner.next_record.get() + 1;
        self.inner.next_record.set(next);
        RecordId(format!("rec-{next:06}"))
    }

    fn ensure_online(&self, operation: &str) -> Result<(), PersistenceError> {
        if self.inner.offline.get() {
            return Err(PersistenceError::Unavailable(format!(
                "{operation} rejected while offline"
            )));
        }
        Ok(())
    }

    fn notify(&self, collection: &str) {
        notify(&self.inner, collection);
    }
}

fn notify(inner: &MemoryInner, collection: &str) {
    let callbacks: Vec<_> = inner
        .subscribers
        .borrow()
        .iter()
        .filter(|subscriber| subscriber.collection == collection)
        .map(|subscriber| Rc::clone(&subscriber.callback))
        .collect();
    if callbacks.is_empty() {
        return;
    }
    let documents = snapshot(inner, collection);
    for callback in callbacks {
        if let Ok(mut callback) = callback.try_borrow_mut() {
            (*callback)(&documents);
        }
    }
}

fn snapshot(inner: &MemoryInner, collection: &str) -> Vec<Document> {
    inner
        .collections
        .borrow()
        .get(collection)
        .map(|records| {
            records
                .iter()
                .map(|(id, data)| Document {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn merge(target: &mut serde_json::Value, data: serde_json::Value) {
    match (target, data) {
        (serde_json::Value::Object(existing), serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (target, data) => *target = data,
    }
}

#[async_trait(?Send)]
impl PersistenceAdapter for InMemoryStore {
    async fn create(
        &self,
        collection: &str,
        data: serde_json::Value,
    ) -> Result<RecordId, PersistenceError> {
        self.ensure_online("create")?;
        Ok(self.seed(collection, data))
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        data: serde_json::Value,
    ) -> Result<(), PersistenceError> {
        self.ensure_online("update")?;
        {
            let mut collections = self.inner.collections.borrow_mut();
            let records = collections.entry(collection.to_string()).or_default();
            match records.get_mut(id) {
                Some(existing) => merge(existing, data),
                None => {
                    records.insert(id.clone(), data);
                }
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), PersistenceError> {
        self.ensure_online("delete")?;
        let removed = self
            .inner
            .collections
            .borrow_mut()
            .get_mut(collection)
            .and_then(|records| records.remove(id));
        if removed.is_none() {
            return Err(PersistenceError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            });
        }
        self.notify(collection);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, PersistenceError> {
        self.ensure_online("list")?;
        Ok(self.documents(collection))
    }

    fn subscribe_collection(
        &self,
        collection: &str,
        on_snapshot: SnapshotCallback,
    ) -> Unsubscribe {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            collection: collection.to_string(),
            callback: Rc::new(RefCell::new(on_snapshot)),
        });
        self.notify(collection);

        let inner: Weak<MemoryInner> = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .subscribers
                    .borrow_mut()
                    .retain(|subscriber| subscriber.id != id);
            }
        })
    }
}
