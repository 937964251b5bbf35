use std::cell::Cell;

/// Shared suppression state deciding whether shape events may reach the store.
///
/// Two independent sources close the guard: programmatic writes to live shapes
/// (scoped by [`WriteSession`]) and drags in progress. Shape events are only
/// dispatched while neither is active.
#[derive(Debug, Default)]
pub struct DispatchGuard {
    sessions: Cell<usize>,
    drags: Cell<usize>,
}

impl DispatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.sessions.get() == 0 && self.drags.get() == 0
    }

    pub fn is_writing(&self) -> bool {
        self.sessions.get() > 0
    }

    pub fn is_dragging(&self) -> bool {
        self.drags.get() > 0
    }

    /// Opens a write session. Events observed until the session is dropped are
    /// treated as echoes of our own writes.
    pub fn write_session(&self) -> WriteSession<'_> {
        self.sessions.set(self.sessions.get() + 1);
        WriteSession { guard: self }
    }

    pub fn begin_drag(&self) {
        self.drags.set(self.drags.get() + 1);
    }

    pub fn end_drag(&self) {
        self.drags.set(self.drags.get().saturating_sub(1));
    }
}

#[must_use = "the guard reopens as soon as the session is dropped"]
pub struct WriteSession<'a> {
    guard: &'a DispatchGuard,
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        let sessions = &self.guard.sessions;
        sessions.set(sessions.get().saturating_sub(1));
    }
}
