use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Normal,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTransition {
    Entered,
    Left,
}

/// NORMAL/EDIT state. The current mode is mirrored into a shared flag so
/// widgets can consult it through their host without reaching the workspace.
#[derive(Debug, Clone, Default)]
pub struct EditModeMachine {
    mode: EditMode,
    flag: Arc<AtomicBool>,
}

impl EditModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == EditMode::Edit
    }

    /// Shared read-only view of the mode for widget hosts.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Move to `mode`. Setting the current mode again is a no-op.
    pub fn set(&mut self, mode: EditMode) -> Option<EditTransition> {
        if self.mode == mode {
            return None;
        }
        Some(self.apply(mode))
    }

    pub fn toggle(&mut self) -> EditTransition {
        let next = match self.mode {
            EditMode::Normal => EditMode::Edit,
            EditMode::Edit => EditMode::Normal,
        };
        self.apply(next)
    }

    fn apply(&mut self, mode: EditMode) -> EditTransition {
        self.mode = mode;
        self.flag.store(mode == EditMode::Edit, Ordering::SeqCst);
        tracing::debug!(?mode, "edit mode changed");
        match mode {
            EditMode::Edit => EditTransition::Entered,
            EditMode::Normal => EditTransition::Left,
        }
    }
}
