//! The editor session: one explicitly constructed object owning the whole
//! editing core — document, viewport, selection, tools, history, palette,
//! and brush settings — wired together so a host UI only feeds it events
//! and renders the composite.
//!
//! The session's lifetime is the document's lifetime; there is no global
//! state anywhere in the engine.

use image::{Rgba, RgbaImage};

use crate::canvas::{CanvasState, SelectionState};
use crate::components::colors::{format_css_color, parse_css_color};
use crate::components::history::{CommandManager, HistoryStore, Snapshot};
use crate::components::tools::{self, PointerEvent, ToolContext, ToolKind, ToolSet};
use crate::geometry::Point;
use crate::log_info;
use crate::ops::canvas_ops::{self, ResizeAnchor};
use crate::viewport::{DisplayBounds, Viewport};

/// Pointer gesture phase, used by the internal dispatcher.
#[derive(Clone, Copy)]
enum Phase {
    Down,
    Move,
    Up,
}

/// Keyboard input the engine reacts to directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorKey {
    /// Clears the selection.
    Escape,
    /// Deletes the selection's source pixels.
    Delete,
}

/// The complete editing core for one document.
pub struct EditorSession {
    pub canvas: CanvasState,
    pub viewport: Viewport,
    pub selection: SelectionState,
    pub tools: ToolSet,
    pub history: HistoryStore,
    /// Legacy execute/undo path for discrete host-driven edits.
    pub commands: CommandManager,
    pub display_bounds: DisplayBounds,
    pub primary_color: Rgba<u8>,
    pub secondary_color: Rgba<u8>,
    pub custom_colors: Vec<String>,
    pub brush_size: u32,
    pub bucket_tolerance: u8,
    pub show_grid: bool,
}

impl EditorSession {
    /// New session over a blank document. The initial state becomes the
    /// history baseline.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_canvas(CanvasState::new(width, height))
    }

    /// New session over an existing document (loaded project, imported
    /// image).
    #[must_use]
    pub fn from_canvas(canvas: CanvasState) -> Self {
        let mut session = Self {
            canvas,
            viewport: Viewport::default(),
            selection: SelectionState::default(),
            tools: ToolSet::new(),
            history: HistoryStore::new(),
            commands: CommandManager::new(),
            display_bounds: DisplayBounds::default(),
            primary_color: Rgba([0, 0, 0, 255]),
            secondary_color: Rgba([255, 255, 255, 255]),
            custom_colors: Vec::new(),
            brush_size: 1,
            bucket_tolerance: 1,
            show_grid: true,
        };
        session.push_history();
        session
    }

    // --- Tool + settings -----------------------------------------------------

    /// Switch the active tool. Leaving the select tool discards any live
    /// selection, and the outgoing tool's gesture state is dropped.
    pub fn set_tool(&mut self, kind: ToolKind) {
        let previous = self.tools.set_active(kind);
        if previous == ToolKind::Select && kind != ToolKind::Select {
            self.selection.clear();
        }
    }

    /// Set the primary (left-button) color from a CSS color string.
    /// Unparseable input is ignored.
    pub fn set_primary_color(&mut self, css: &str) {
        if let Some(color) = parse_css_color(css) {
            self.primary_color = color;
        }
    }

    /// Set the secondary (right-button) color from a CSS color string.
    pub fn set_secondary_color(&mut self, css: &str) {
        if let Some(color) = parse_css_color(css) {
            self.secondary_color = color;
        }
    }

    /// Swap primary and secondary colors.
    pub fn swap_colors(&mut self) {
        std::mem::swap(&mut self.primary_color, &mut self.secondary_color);
    }

    /// Remember a color in the session palette (deduplicated).
    pub fn add_custom_color(&mut self, css: &str) {
        if !self.custom_colors.iter().any(|c| c == css) {
            self.custom_colors.push(css.to_string());
        }
    }

    // --- Pointer + keyboard routing ------------------------------------------

    pub fn handle_pointer_down(&mut self, ev: &PointerEvent) {
        self.dispatch(ev, Phase::Down);
    }

    pub fn handle_pointer_move(&mut self, ev: &PointerEvent) {
        self.dispatch(ev, Phase::Move);
    }

    /// Finalize a gesture. Pointer-up anywhere counts — including outside
    /// the canvas element — so the state machine can never get stuck
    /// active. A history snapshot is captured here; duplicate suppression
    /// makes read-only gestures free.
    pub fn handle_pointer_up(&mut self, ev: &PointerEvent) {
        self.dispatch(ev, Phase::Up);
        self.push_history();
    }

    /// Zoom toward the cursor (cursor in the same screen space as pointer
    /// events).
    pub fn handle_wheel(&mut self, delta_y: f32, cursor_x: f32, cursor_y: f32) {
        let local_x = (cursor_x - self.display_bounds.left) * self.display_bounds.pixel_ratio;
        let local_y = (cursor_y - self.display_bounds.top) * self.display_bounds.pixel_ratio;
        self.viewport.zoom(delta_y, local_x, local_y);
    }

    pub fn handle_key(&mut self, key: EditorKey) {
        match key {
            EditorKey::Escape => self.clear_selection(),
            EditorKey::Delete => {
                self.delete_selection();
            }
        }
    }

    /// Update the display-element placement pointer events are measured
    /// against, and refit the drawing into it.
    pub fn handle_container_resize(&mut self, bounds: DisplayBounds) {
        self.display_bounds = bounds;
        self.viewport.fit_to_container(
            bounds.width * bounds.pixel_ratio,
            bounds.height * bounds.pixel_ratio,
            self.canvas.width,
            self.canvas.height,
        );
    }

    fn dispatch(&mut self, ev: &PointerEvent, phase: Phase) {
        let mut picked: Option<(String, bool)> = None;
        {
            let mut on_pick = |color: String, right: bool| picked = Some((color, right));
            let mut ctx = ToolContext {
                canvas: &mut self.canvas,
                viewport: &mut self.viewport,
                selection: &mut self.selection,
                bounds: self.display_bounds,
                primary_color: self.primary_color,
                secondary_color: self.secondary_color,
                brush_size: self.brush_size,
                bucket_tolerance: self.bucket_tolerance,
                on_color_pick: &mut on_pick,
            };
            match phase {
                Phase::Down => self.tools.pointer_down(ev, &mut ctx),
                Phase::Move => self.tools.pointer_move(ev, &mut ctx),
                Phase::Up => self.tools.pointer_up(ev, &mut ctx),
            }
        }
        if let Some((color, right)) = picked {
            if right {
                self.set_secondary_color(&color);
            } else {
                self.set_primary_color(&color);
            }
        }
    }

    // --- History -------------------------------------------------------------

    /// Capture the current document state (no-op when unchanged).
    pub fn push_history(&mut self) {
        self.history
            .push(&self.canvas.layers, &self.canvas.selected_layer_id);
    }

    /// Restore the previous snapshot. Returns false when only the baseline
    /// remains.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Restore the next redo snapshot. Returns false when there is none.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.canvas = CanvasState::from_layers(snapshot.layers, snapshot.selected_layer_id);
        // A restored document invalidates any in-flight selection.
        self.selection.clear();
    }

    // --- Layer + canvas operations (each its own undo step) ------------------

    /// Add a layer and select it. Returns the new layer's id.
    pub fn add_layer(&mut self) -> String {
        let id = canvas_ops::add_layer(&mut self.canvas);
        self.push_history();
        id
    }

    /// Delete a layer; false when it is the last one.
    pub fn delete_layer(&mut self, id: &str) -> bool {
        let deleted = canvas_ops::delete_layer(&mut self.canvas, id);
        if deleted {
            self.push_history();
        }
        deleted
    }

    pub fn reorder_layer(&mut self, from_index: usize, to_index: usize) -> bool {
        let moved = canvas_ops::reorder_layer(&mut self.canvas, from_index, to_index);
        if moved {
            self.push_history();
        }
        moved
    }

    pub fn toggle_layer_visibility(&mut self, id: &str) -> bool {
        let toggled = canvas_ops::toggle_layer_visibility(&mut self.canvas, id);
        if toggled {
            self.push_history();
        }
        toggled
    }

    pub fn rename_layer(&mut self, id: &str, name: &str) -> bool {
        let renamed = canvas_ops::rename_layer(&mut self.canvas, id, name);
        if renamed {
            self.push_history();
        }
        renamed
    }

    pub fn select_layer(&mut self, id: &str) -> bool {
        if self.canvas.layer_index(id).is_none() {
            return false;
        }
        self.canvas.selected_layer_id = id.to_string();
        self.push_history();
        true
    }

    /// Resize the canvas around an anchor, as one undo step.
    pub fn resize_canvas(&mut self, width: u32, height: u32, anchor: ResizeAnchor) {
        if width == 0 || height == 0 {
            return;
        }
        log_info!(
            "Resize canvas {}x{} -> {}x{}",
            self.canvas.width,
            self.canvas.height,
            width,
            height
        );
        self.selection.clear();
        canvas_ops::resize_canvas(&mut self.canvas, width, height, anchor);
        self.push_history();
    }

    /// Reset to a blank document (single empty layer), as one undo step.
    pub fn clear_canvas(&mut self) {
        self.selection.clear();
        canvas_ops::clear_canvas(&mut self.canvas);
        self.push_history();
    }

    // --- Selection -----------------------------------------------------------

    /// Discard the selection without touching pixels.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Clear the lifted region's source pixels and drop the selection, as
    /// one undo step.
    pub fn delete_selection(&mut self) -> bool {
        let deleted = tools::delete_selection(&mut self.canvas, &mut self.selection);
        if deleted {
            self.push_history();
        }
        deleted
    }

    /// Write the lifted region into the layer at its current anchor and
    /// drop the selection, as one undo step.
    pub fn stamp_selection(&mut self) -> bool {
        let stamped = tools::stamp_selection(&mut self.canvas, &self.selection);
        if stamped {
            self.selection.clear();
            self.push_history();
        }
        stamped
    }

    // --- Rendering helpers ---------------------------------------------------

    /// Flattened composite of all visible layers.
    #[must_use]
    pub fn composite(&self) -> RgbaImage {
        self.canvas.composite()
    }

    /// Uncommitted shape preview of the active tool.
    #[must_use]
    pub fn preview_points(&self) -> &[Point] {
        self.tools.preview_points()
    }

    /// Composed color under a canvas pixel, as the eyedropper would report
    /// it.
    #[must_use]
    pub fn color_at(&self, x: i32, y: i32) -> Option<String> {
        self.canvas.get_pixel(x, y)
    }

    /// The primary color as a CSS string (what the picker displays).
    #[must_use]
    pub fn primary_color_css(&self) -> String {
        format_css_color(self.primary_color)
    }
}
