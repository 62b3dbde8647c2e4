//! Undo log for multi-step changes against non-transactional resources.
//!
//! # Usage
//! ```text
//! let mut reverter = Reverter::new();
//! step_one()?;            reverter.add(|| undo_one());
//! step_two()?;            reverter.add(|| undo_two());
//! reverter.success();     // commit: nothing is undone
//! ```
//!
//! Any early return drops the reverter, which runs the registered actions
//! newest first. After `success()` the drop is a no-op.

/// A LIFO list of undo actions.
///
/// Actions are best-effort: they must report their own failures (usually via
/// `tracing`) and never abort the unwind.
#[derive(Default)]
pub struct Reverter<'a> {
    actions: Vec<Box<dyn FnOnce() + 'a>>,
}

impl<'a> Reverter<'a> {
    /// Create an empty reverter.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Register an undo action for a step that has just been applied.
    pub fn add<F>(&mut self, action: F)
    where
        F: FnOnce() + 'a,
    {
        self.actions.push(Box::new(action));
    }

    /// Run every registered action in reverse registration order, then clear.
    pub fn fail(&mut self) {
        if !self.actions.is_empty() {
            tracing::debug!(actions = self.actions.len(), "Reverting partial changes");
        }

        while let Some(action) = self.actions.pop() {
            action();
        }
    }

    /// Commit: drop every registered action without running it.
    pub fn success(&mut self) {
        self.actions.clear();
    }

    /// Number of pending undo actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Drop for Reverter<'_> {
    fn drop(&mut self) {
        self.fail();
    }
}

impl std::fmt::Debug for Reverter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reverter")
            .field("pending", &self.actions.len())
            .finish()
    }
}
