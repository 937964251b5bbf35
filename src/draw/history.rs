use crate::draw::model::{DrawResult, HistoryState, Overlay, Snapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum DrawAction {
    /// A shape was completed with the drawing tool.
    AddOverlay(DrawResult),
    /// An existing shape was edited in place.
    RefreshSnapshots,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddOverlay,
    RefreshSnapshots,
    Undo,
    Redo,
}

impl DrawAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AddOverlay(_) => ActionKind::AddOverlay,
            Self::RefreshSnapshots => ActionKind::RefreshSnapshots,
            Self::Undo => ActionKind::Undo,
            Self::Redo => ActionKind::Redo,
        }
    }

    /// Whether applying this action to `state` changes anything.
    pub fn applies_to(&self, state: &HistoryState) -> bool {
        match self {
            Self::Undo => state.can_undo(),
            Self::Redo => state.can_redo(),
            Self::AddOverlay(_) | Self::RefreshSnapshots => true,
        }
    }
}

pub fn reduce(state: HistoryState, action: DrawAction) -> HistoryState {
    match action {
        DrawAction::AddOverlay(result) => add_overlay(state, result),
        DrawAction::RefreshSnapshots => refresh_snapshots(state),
        DrawAction::Undo => undo(state),
        DrawAction::Redo => redo(state),
    }
}

fn add_overlay(state: HistoryState, result: DrawResult) -> HistoryState {
    let HistoryState { mut past, now, .. } = state;
    let mut next = now.clone();
    next.push(Overlay {
        kind: result.kind,
        snapshot: Snapshot::capture(result.shape.as_ref()),
        geometry: result.shape,
    });
    past.push(now);
    HistoryState {
        past,
        now: next,
        future: Vec::new(),
    }
}

fn refresh_snapshots(state: HistoryState) -> HistoryState {
    let HistoryState { mut past, now, .. } = state;
    let next = now
        .iter()
        .map(|overlay| Overlay {
            snapshot: Snapshot::capture(overlay.geometry.as_ref()),
            ..overlay.clone()
        })
        .collect();
    past.push(now);
    HistoryState {
        past,
        now: next,
        future: Vec::new(),
    }
}

fn undo(mut state: HistoryState) -> HistoryState {
    let Some(previous) = state.past.pop() else {
        return state;
    };
    let current = std::mem::replace(&mut state.now, previous);
    state.future.push(current);
    state
}

fn redo(mut state: HistoryState) -> HistoryState {
    let Some(next) = state.future.pop() else {
        return state;
    };
    let current = std::mem::replace(&mut state.now, next);
    state.past.push(current);
    state
}
