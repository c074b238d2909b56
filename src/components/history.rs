//! Undo/redo subsystems.
//!
//! The primary mechanism is the snapshot-based [`HistoryStore`]: bounded
//! undo/redo stacks of deep-cloned layer sets, captured once per completed
//! gesture. A legacy execute/undo [`Command`] pattern ([`CommandManager`])
//! coexists with it for discrete edits driven by the host UI.
//!
//! Every snapshot that enters or leaves the store is an independent deep
//! clone of every layer's pixel buffer. Callers mutate layer buffers in
//! place, so any aliasing here would silently corrupt history — this is the
//! most safety-critical invariant of the engine.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canvas::{CanvasState, Layer};

/// Both stacks are trimmed to this many entries.
pub const MAX_HISTORY_SIZE: usize = 50;

// ============================================================================
// SNAPSHOT HISTORY — deep-cloned editor states
// ============================================================================

/// Immutable capture of the document's layers and layer selection.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub layers: Vec<Layer>,
    pub selected_layer_id: String,
    /// Milliseconds since the Unix epoch at capture time.
    pub timestamp: u64,
}

impl Snapshot {
    fn capture(layers: &[Layer], selected_layer_id: &str) -> Self {
        Self {
            layers: layers.to_vec(),
            selected_layer_id: selected_layer_id.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// True when this snapshot represents the same document state (layer
    /// structure, pixels, and selection).
    fn same_state(&self, layers: &[Layer], selected_layer_id: &str) -> bool {
        self.selected_layer_id == selected_layer_id && self.layers == layers
    }
}

/// Snapshot-based undo/redo store.
///
/// The undo stack runs oldest → newest with the last entry being the
/// *current* state; index 0 is the baseline, so undo needs at least two
/// entries. The redo stack is popped newest-first.
#[derive(Default)]
pub struct HistoryStore {
    undo_stack: Vec<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
}

impl HistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current document state.
    ///
    /// A state identical to the top of the undo stack (layers and selected
    /// layer) is discarded so no-op gestures don't bloat history. Otherwise
    /// the state is deep-cloned, the stack trimmed to the most recent
    /// [`MAX_HISTORY_SIZE`] entries, and the redo stack invalidated.
    pub fn push(&mut self, layers: &[Layer], selected_layer_id: &str) {
        if let Some(top) = self.undo_stack.last()
            && top.same_state(layers, selected_layer_id)
        {
            return;
        }

        self.undo_stack
            .push(Snapshot::capture(layers, selected_layer_id));
        if self.undo_stack.len() > MAX_HISTORY_SIZE {
            let excess = self.undo_stack.len() - MAX_HISTORY_SIZE;
            self.undo_stack.drain(..excess);
        }
        self.redo_stack.clear();
    }

    /// Step back one state. Returns a deep clone of the state to restore,
    /// or `None` when only the baseline remains (routine condition, not an
    /// error).
    pub fn undo(&mut self) -> Option<Snapshot> {
        if self.undo_stack.len() <= 1 {
            return None;
        }
        let current = self.undo_stack.pop()?;
        self.redo_stack.push_front(current);
        self.redo_stack.truncate(MAX_HISTORY_SIZE);
        self.undo_stack.last().cloned()
    }

    /// Step forward one previously undone state. Returns a deep clone of
    /// the state to restore, or `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Snapshot> {
        let snapshot = self.redo_stack.pop_front()?;
        self.undo_stack.push(snapshot.clone());
        if self.undo_stack.len() > MAX_HISTORY_SIZE {
            let excess = self.undo_stack.len() - MAX_HISTORY_SIZE;
            self.undo_stack.drain(..excess);
        }
        Some(snapshot)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Approximate heap usage of all stored snapshots.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|s| s.layers.iter())
            .map(|l| l.pixels.mem_size())
            .sum()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ============================================================================
// COMMAND MANAGER — legacy execute/undo pattern for discrete edits
// ============================================================================

/// An undoable discrete edit.
pub trait Command {
    fn execute(&self, canvas: &mut CanvasState);
    fn undo(&self, canvas: &mut CanvasState);
    fn description(&self) -> String;
}

/// Execute/undo/redo stack over boxed [`Command`]s. Pushing a new command
/// clears the redo stack.
#[derive(Default)]
pub struct CommandManager {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
}

impl CommandManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, command: Box<dyn Command>, canvas: &mut CanvasState) {
        command.execute(canvas);
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        let command = self.undo_stack.pop()?;
        command.undo(canvas);
        let description = command.description();
        self.redo_stack.push(command);
        Some(description)
    }

    pub fn redo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        let command = self.redo_stack.pop()?;
        command.execute(canvas);
        let description = command.description();
        self.undo_stack.push(command);
        Some(description)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Toggle a layer's visibility flag.
pub struct ToggleVisibilityCommand {
    pub layer_id: String,
}

impl Command for ToggleVisibilityCommand {
    fn execute(&self, canvas: &mut CanvasState) {
        if let Some(layer) = canvas.layer_mut(&self.layer_id) {
            layer.visible = !layer.visible;
        }
    }

    fn undo(&self, canvas: &mut CanvasState) {
        self.execute(canvas);
    }

    fn description(&self) -> String {
        format!("Toggle Visibility: {}", self.layer_id)
    }
}

/// Rename a layer.
pub struct RenameLayerCommand {
    pub layer_id: String,
    pub old_name: String,
    pub new_name: String,
}

impl Command for RenameLayerCommand {
    fn execute(&self, canvas: &mut CanvasState) {
        if let Some(layer) = canvas.layer_mut(&self.layer_id) {
            layer.name = self.new_name.clone();
        }
    }

    fn undo(&self, canvas: &mut CanvasState) {
        if let Some(layer) = canvas.layer_mut(&self.layer_id) {
            layer.name = self.old_name.clone();
        }
    }

    fn description(&self) -> String {
        format!("Rename Layer: {} → {}", self.old_name, self.new_name)
    }
}
