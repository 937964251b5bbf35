use crate::draw::bridge::DEFAULT_REFRESH_EVENTS;
use crate::draw::shape::ShapeEvent;
use crate::persistence::areas::DEFAULT_AREAS_COLLECTION;
use crate::persistence::markers::DEFAULT_MARKERS_COLLECTION;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    /// Directory for a daily rolling log file. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Maximum number of undo steps kept. Unbounded when unset.
    #[serde(default)]
    pub history_limit: Option<usize>,
    /// Shape events, besides a drag end, that record an in-place edit.
    #[serde(default = "default_refresh_events")]
    pub refresh_events: Vec<ShapeEvent>,
    #[serde(default = "default_areas_collection")]
    pub areas_collection: String,
    #[serde(default = "default_markers_collection")]
    pub markers_collection: String,
}

fn default_refresh_events() -> Vec<ShapeEvent> {
    DEFAULT_REFRESH_EVENTS.to_vec()
}

fn default_areas_collection() -> String {
    DEFAULT_AREAS_COLLECTION.to_string()
}

fn default_markers_collection() -> String {
    DEFAULT_MARKERS_COLLECTION.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_dir: None,
            history_limit: None,
            refresh_events: default_refresh_events(),
            areas_collection: default_areas_collection(),
            markers_collection: default_markers_collection(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing or empty file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("deserialize settings file {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("write settings file {}", path.display()))
    }

    fn sanitize(&mut self) {
        // Drag events are handled by the bridge itself.
        self.refresh_events
            .retain(|event| !matches!(event, ShapeEvent::DragStart | ShapeEvent::Drag));
        self.refresh_events.dedup();
        if self.history_limit == Some(0) {
            tracing::warn!("history_limit of 0 would disable undo; ignoring it");
            self.history_limit = None;
        }
    }
}
