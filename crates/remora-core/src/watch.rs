//! Debounced mutation watching.
//!
//! The embedder reports element insertions; the watcher answers whether an immediate
//! subtree check should run and keeps a single debounced full-document re-scan pending.
//! However many insertions land inside one debounce window, at most one full re-scan
//! fires for it.

#[derive(Debug)]
pub struct MutationWatcher {
    debounce_ms: u64,
    deadline: Option<u64>,
    active: bool,
}

impl MutationWatcher {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            deadline: None,
            active: true,
        }
    }

    /// Notes a batch of insertions at `now`. Arms the debounce deadline if none is
    /// pending; an already-armed deadline is left alone so a mutation storm cannot starve
    /// the re-scan forever.
    pub fn note_insertions(&mut self, now: u64) {
        if !self.active {
            return;
        }
        if self.deadline.is_none() {
            self.deadline = Some(now + self.debounce_ms);
        }
    }

    /// Consumes a due deadline. Returns `true` exactly once per armed window.
    pub fn take_due(&mut self, now: u64) -> bool {
        if !self.active {
            return false;
        }
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        if self.active { self.deadline } else { None }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stops observation permanently (page unload). There is no re-arm.
    pub fn teardown(&mut self) {
        self.active = false;
        self.deadline = None;
    }
}
