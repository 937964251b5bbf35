use crate::draw::guard::DispatchGuard;
use crate::draw::model::{has_path_geometry, Overlay};
use crate::draw::shape::{same_shape, MapHandle, ShapeError, ShapeRef};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// No map is available yet; shapes stay detached until one is set.
    MapNotReady,
    AttachFailed { index: usize, error: ShapeError },
}

/// Projects the current `now` onto the live shapes.
///
/// Every write happens inside a [`crate::draw::WriteSession`], so the path
/// change notifications it causes are never mistaken for user edits.
pub struct OverlaySync {
    map: Option<MapHandle>,
    guard: Rc<DispatchGuard>,
    attached: Vec<ShapeRef>,
}

impl OverlaySync {
    pub fn new(map: Option<MapHandle>, guard: Rc<DispatchGuard>) -> Self {
        Self {
            map,
            guard,
            attached: Vec::new(),
        }
    }

    pub fn map(&self) -> Option<MapHandle> {
        self.map
    }

    pub fn attached_len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_attached(&self, shape: &ShapeRef) -> bool {
        self.attached.iter().any(|attached| same_shape(attached, shape))
    }

    /// Swap the target map. Shapes attached to the previous map are detached;
    /// the caller re-projects to attach them to the new one.
    pub fn set_map(&mut self, map: Option<MapHandle>) {
        if self.map == map {
            return;
        }
        self.detach_all();
        self.map = map;
    }

    pub fn project(&mut self, now: &[Overlay]) -> Vec<SyncWarning> {
        let mut warnings = Vec::new();

        let (kept, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.attached)
            .into_iter()
            .partition(|shape| now.iter().any(|overlay| same_shape(&overlay.geometry, shape)));
        self.attached = kept;
        for shape in gone {
            let _session = self.guard.write_session();
            shape.detach();
        }

        if self.map.is_none() && !now.is_empty() {
            tracing::warn!(overlays = now.len(), "map not ready; overlays stay detached");
            warnings.push(SyncWarning::MapNotReady);
        }

        for (index, overlay) in now.iter().enumerate() {
            let _session = self.guard.write_session();
            if let Some(map) = self.map.as_ref() {
                if !self.is_attached(&overlay.geometry) {
                    match overlay.geometry.attach(map) {
                        Ok(()) => self.attached.push(Rc::clone(&overlay.geometry)),
                        Err(error) => {
                            tracing::warn!(index, %error, "failed to attach overlay to map");
                            warnings.push(SyncWarning::AttachFailed { index, error });
                        }
                    }
                }
            }
            if has_path_geometry(overlay.geometry.as_ref()) {
                overlay.geometry.set_path(overlay.path());
            }
        }

        warnings
    }

    pub fn teardown(&mut self) {
        self.detach_all();
    }

    fn detach_all(&mut self) {
        for shape in self.attached.drain(..) {
            let _session = self.guard.write_session();
            shape.detach();
        }
    }
}

impl Drop for OverlaySync {
    fn drop(&mut self) {
        self.detach_all();
    }
}
