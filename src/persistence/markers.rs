use crate::persistence::{Document, PersistenceAdapter, Unsubscribe};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

pub const DEFAULT_MARKERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerLocation {
    pub lat: f64,
    pub lng: f64,
    /// Epoch milliseconds of the last position report.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMarker {
    #[serde(default)]
    pub name: String,
    pub location: MarkerLocation,
}

impl ToolMarker {
    pub fn last_seen(&self) -> Option<DateTime<Local>> {
        let millis = self.location.timestamp?;
        Local.timestamp_millis_opt(millis).single()
    }

    pub fn last_seen_label(&self) -> Option<String> {
        self.last_seen()
            .map(|at| at.format("%a, %b %-d, %Y, %I:%M:%S %p").to_string())
    }
}

/// Live view of the marker collection. Dropping the board cancels the
/// subscription.
pub struct MarkerBoard {
    markers: Rc<RefCell<Vec<ToolMarker>>>,
    _subscription: Unsubscribe,
}

impl MarkerBoard {
    pub fn follow(adapter: &dyn PersistenceAdapter, collection: &str) -> Self {
        let markers = Rc::new(RefCell::new(Vec::new()));
        let subscription = {
            let markers = Rc::clone(&markers);
            adapter.subscribe_collection(
                collection,
                Box::new(move |documents: &[Document]| {
                    *markers.borrow_mut() = decode(documents);
                }),
            )
        };
        Self {
            markers,
            _subscription: subscription,
        }
    }

    pub fn markers(&self) -> Vec<ToolMarker> {
        self.markers.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.markers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.borrow().is_empty()
    }
}

fn decode(documents: &[Document]) -> Vec<ToolMarker> {
    documents
        .iter()
        .filter_map(
            |document| match serde_json::from_value(document.data.clone()) {
                Ok(marker) => Some(marker),
                Err(error) => {
                    tracing::warn!(id = %document.id, %error, "skipping malformed marker");
                    None
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use serde_json::json;

    #[test]
    fn board_tracks_collection_until_dropped() {
        let store = InMemoryStore::new();
        store.seed(
            "users",
            json!({ "name": "crew-1", "location": { "lat": 40.2, "lng": -74.8 } }),
        );
        let board = MarkerBoard::follow(&store, "users");
        assert_eq!(board.len(), 1);

        store.seed("users", json!({ "name": "broken" }));
        store.seed(
            "users",
            json!({ "name": "crew-2", "location": { "lat": 40.0, "lng": -74.0, "timestamp": 0 } }),
        );
        assert_eq!(board.len(), 2);
        assert_eq!(board.markers()[1].name, "crew-2");

        drop(board);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn last_seen_requires_a_timestamp() {
        let marker = ToolMarker {
            name: "crew".into(),
            location: MarkerLocation {
                lat: 0.0,
                lng: 0.0,
                timestamp: None,
            },
        };
        assert!(marker.last_seen_label().is_none());

        let stamped = ToolMarker {
            location: MarkerLocation {
                timestamp: Some(1_700_000_000_000),
                ..marker.location.clone()
            },
            ..marker
        };
        assert!(stamped.last_seen_label().is_some());
    }
}
