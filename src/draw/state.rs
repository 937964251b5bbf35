use crate::draw::shape::ShapeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Idle,
    Dragging,
}

impl EditPhase {
    pub fn is_dragging(self) -> bool {
        matches!(self, Self::Dragging)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Ignore,
    BeginDrag,
    EndDrag,
    Refresh,
}

/// Advance one shape's edit phase for an incoming event.
///
/// `refresh_events` lists the non-drag events that count as an in-place edit.
/// A drag end always refreshes, even when its drag start was never observed.
pub fn step(
    phase: EditPhase,
    event: ShapeEvent,
    refresh_events: &[ShapeEvent],
) -> (EditPhase, EditOutcome) {
    match (phase, event) {
        (EditPhase::Idle, ShapeEvent::DragStart) => (EditPhase::Dragging, EditOutcome::BeginDrag),
        (EditPhase::Dragging, ShapeEvent::DragStart) => (phase, EditOutcome::Ignore),
        (EditPhase::Dragging, ShapeEvent::DragEnd) => (EditPhase::Idle, EditOutcome::EndDrag),
        (EditPhase::Idle, ShapeEvent::DragEnd) => (EditPhase::Idle, EditOutcome::Refresh),
        (_, ShapeEvent::Drag) => (phase, EditOutcome::Ignore),
        (EditPhase::Dragging, _) => (phase, EditOutcome::Ignore),
        (EditPhase::Idle, event) if refresh_events.contains(&event) => {
            (phase, EditOutcome::Refresh)
        }
        (EditPhase::Idle, _) => (phase, EditOutcome::Ignore),
    }
}
