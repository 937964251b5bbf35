//! Scripted editing sessions against the in-process map.
//!
//! A script is a JSON document listing operator gestures. Replaying it drives
//! the same store, bridge and persistence paths a live map would, which makes
//! it handy for reproducing history bugs from a log.

use crate::draw::memory::{MemoryDrawingTool, MemoryShape};
use crate::draw::model::{LatLng, ShapeKind};
use crate::draw::shape::{same_shape, MapHandle, ShapeRef};
use crate::persistence::areas::AreaRecord;
use crate::persistence::{FlushReport, InMemoryStore, RecordId, ToolMarker};
use crate::session::Session;
use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Map the session starts on. `null` starts without a map.
    #[serde(default = "default_map")]
    pub map: Option<u64>,
    /// Markers present in the store before the session opens.
    #[serde(default)]
    pub markers: Vec<ToolMarker>,
    /// Areas present in the store before the session opens.
    #[serde(default)]
    pub stored_areas: Vec<Vec<LatLng>>,
    pub steps: Vec<Step>,
}

fn default_map() -> Option<u64> {
    Some(1)
}

fn default_ticks() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Finish a new shape with the drawing tool. A marker uses the first point.
    Draw { kind: ShapeKind, path: Vec<LatLng> },
    EditVertex {
        overlay: usize,
        vertex: usize,
        to: LatLng,
    },
    Drag {
        overlay: usize,
        d_lat: f64,
        d_lng: f64,
        #[serde(default = "default_ticks")]
        ticks: usize,
    },
    Undo,
    Redo,
    Flush,
    SetMap { map: Option<u64> },
    DeleteArea { index: usize },
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parse script {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

impl From<&FlushReport> for FlushSummary {
    fn from(report: &FlushReport) -> Self {
        Self {
            created: report.created,
            updated: report.updated,
            deleted: report.deleted,
            skipped: report.skipped,
            failures: report.failures.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: AreaRecord,
}

/// Final state of a replayed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub overlays: Vec<Vec<LatLng>>,
    pub undo_len: usize,
    pub redo_len: usize,
    pub records: Vec<StoredRecord>,
    pub markers: Vec<ToolMarker>,
    pub flushes: Vec<FlushSummary>,
}

pub struct Replayer {
    session: Session,
    store: InMemoryStore,
    tool: Rc<MemoryDrawingTool>,
    shapes: Vec<Rc<MemoryShape>>,
    flushes: Vec<FlushSummary>,
    areas_collection: String,
}

impl Replayer {
    pub async fn open(script: &Script, store: InMemoryStore, settings: &Settings) -> Result<Self> {
        for marker in &script.markers {
            store.seed(
                &settings.markers_collection,
                serde_json::to_value(marker).context("encode marker")?,
            );
        }
        for area in &script.stored_areas {
            let record = AreaRecord::stamped(area.clone());
            store.seed(
                &settings.areas_collection,
                serde_json::to_value(&record).context("encode area")?,
            );
        }

        let tool = MemoryDrawingTool::new();
        let session = Session::open(
            Rc::new(store.clone()),
            tool.clone(),
            script.map.map(MapHandle::new),
            settings,
        )
        .await?;

        Ok(Self {
            session,
            store,
            tool,
            shapes: Vec::new(),
            flushes: Vec::new(),
            areas_collection: settings.areas_collection.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn step(&mut self, step: &Step) -> Result<()> {
        tracing::debug!(?step, "replaying step");
        match step {
            Step::Draw { kind, path } => self.draw(*kind, path)?,
            Step::EditVertex {
                overlay,
                vertex,
                to,
            } => {
                let shape = self.shape_at(*overlay)?;
                if shape.kind().is_path_based() && *vertex >= shape.current_path().len() {
                    bail!("overlay {overlay} has no vertex {vertex}");
                }
                shape.move_vertex(*vertex, *to);
            }
            Step::Drag {
                overlay,
                d_lat,
                d_lng,
                ticks,
            } => self.shape_at(*overlay)?.drag_by(*d_lat, *d_lng, *ticks),
            Step::Undo => self.session.undo(),
            Step::Redo => self.session.redo(),
            Step::Flush => {
                let report = self.session.flush().await;
                self.flushes.push(FlushSummary::from(&report));
            }
            Step::SetMap { map } => {
                for warning in self.session.set_map(map.map(MapHandle::new)) {
                    tracing::warn!(?warning, "overlay could not be shown");
                }
            }
            Step::DeleteArea { index } => {
                if self.session.delete_area(*index).await.is_none() {
                    tracing::warn!(index, "no stored area at index");
                }
            }
        }
        Ok(())
    }

    /// Run every step, then flush whatever is still pending.
    pub async fn run(mut self, steps: &[Step]) -> Result<ReplaySummary> {
        for (position, step) in steps.iter().enumerate() {
            self.step(step)
                .await
                .with_context(|| format!("step {position}"))?;
        }
        if self.session.pending_writes() > 0 {
            let report = self.session.flush().await;
            self.flushes.push(FlushSummary::from(&report));
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> ReplaySummary {
        let state = self.session.state();
        let records = self
            .store
            .documents(&self.areas_collection)
            .iter()
            .filter_map(|document| {
                AreaRecord::from_document(document)
                    .ok()
                    .map(|record| StoredRecord {
                        id: document.id.clone(),
                        record,
                    })
            })
            .collect();
        ReplaySummary {
            overlays: state.paths(),
            undo_len: state.undo_len(),
            redo_len: state.redo_len(),
            records,
            markers: self.session.markers().markers(),
            flushes: self.flushes.clone(),
        }
    }

    fn draw(&mut self, kind: ShapeKind, path: &[LatLng]) -> Result<()> {
        let shape = match kind {
            ShapeKind::Polygon => MemoryShape::polygon(path.to_vec()),
            ShapeKind::Polyline => MemoryShape::polyline(path.to_vec()),
            ShapeKind::Marker => {
                let position = path.first().copied().context("marker needs a position")?;
                MemoryShape::marker(position)
            }
        };
        self.shapes.push(Rc::clone(&shape));
        self.tool.complete(kind, shape);
        Ok(())
    }

    fn shape_at(&self, index: usize) -> Result<Rc<MemoryShape>> {
        let state = self.session.state();
        let overlay = state
            .now
            .get(index)
            .with_context(|| format!("no overlay at index {index}"))?;
        self.shapes
            .iter()
            .find(|shape| {
                let handle: ShapeRef = Rc::<MemoryShape>::clone(shape);
                same_shape(&handle, &overlay.geometry)
            })
            .cloned()
            .with_context(|| format!("overlay {index} was not drawn by this script"))
    }
}

/// Replay `script` against a fresh in-memory store.
pub async fn replay(script: &Script, settings: &Settings) -> Result<ReplaySummary> {
    let replayer = Replayer::open(script, InMemoryStore::new(), settings).await?;
    replayer.run(&script.steps).await
}
