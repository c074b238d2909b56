// ============================================================================
// CANVAS-LEVEL OPERATIONS — layer structure edits + anchored resize
// ============================================================================

use crate::canvas::{CanvasState, Layer, PixelBuffer};

/// Horizontal edge that stays fixed when the canvas is resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WidthAnchor {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical edge that stays fixed when the canvas is resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HeightAnchor {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Where existing content lands on the resized canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResizeAnchor {
    pub width: WidthAnchor,
    pub height: HeightAnchor,
}

/// Append a new empty layer on top and select it. Returns the new layer's
/// id.
pub fn add_layer(state: &mut CanvasState) -> String {
    let id = state.next_layer_id();
    let name = format!("Layer {}", state.layers.len() + 1);
    let layer = Layer::new(id.clone(), name, state.width, state.height);
    state.layers.push(layer);
    state.selected_layer_id = id.clone();
    id
}

/// Remove a layer. A document always keeps at least one layer, so deleting
/// the last one (or an unknown id) is a no-op returning false.
///
/// Remaining layers are re-indexed to sequential ids/names. The selection
/// follows the same surviving layer across the re-index; when the deleted
/// layer *was* selected, selection falls back to `layer_0`.
pub fn delete_layer(state: &mut CanvasState, id: &str) -> bool {
    if state.layers.len() <= 1 {
        return false;
    }
    let Some(index) = state.layer_index(id) else {
        return false;
    };
    let selected_index = state.layer_index(&state.selected_layer_id.clone());

    state.layers.remove(index);
    state.reindex_layers();

    state.selected_layer_id = match selected_index {
        Some(sel) if sel != index => {
            let surviving = if sel > index { sel - 1 } else { sel };
            state.layers[surviving].id.clone()
        }
        _ => "layer_0".to_string(),
    };
    true
}

/// Move a layer from one position to another, re-indexing ids/names.
/// Returns false for out-of-range indices.
pub fn reorder_layer(state: &mut CanvasState, from_index: usize, to_index: usize) -> bool {
    let len = state.layers.len();
    if from_index >= len || to_index >= len {
        return false;
    }
    if from_index != to_index {
        let layer = state.layers.remove(from_index);
        state.layers.insert(to_index, layer);
        state.reindex_layers();
    }
    true
}

/// Flip a layer's visibility. Hidden layers are skipped by compositing,
/// picking, and thumbnails, and suppress drawing while selected.
pub fn toggle_layer_visibility(state: &mut CanvasState, id: &str) -> bool {
    match state.layer_mut(id) {
        Some(layer) => {
            layer.visible = !layer.visible;
            true
        }
        None => false,
    }
}

/// Set a layer's display name.
pub fn rename_layer(state: &mut CanvasState, id: &str, name: &str) -> bool {
    match state.layer_mut(id) {
        Some(layer) => {
            layer.name = name.to_string();
            true
        }
        None => false,
    }
}

/// Reset the document to a single blank base layer, selected.
pub fn clear_canvas(state: &mut CanvasState) {
    *state = CanvasState::new(state.width, state.height);
}

/// Resize every layer to the new dimensions. Old content is drawn onto the
/// new buffer at the anchor offset; everything outside the old bounds is
/// transparent. Destructive — callers snapshot history around it.
pub fn resize_canvas(state: &mut CanvasState, new_width: u32, new_height: u32, anchor: ResizeAnchor) {
    let old_width = state.width as i64;
    let old_height = state.height as i64;

    // Floor division so center offsets match for shrink and grow.
    let offset_x = match anchor.width {
        WidthAnchor::Left => 0,
        WidthAnchor::Center => (new_width as i64 - old_width).div_euclid(2),
        WidthAnchor::Right => new_width as i64 - old_width,
    } as i32;
    let offset_y = match anchor.height {
        HeightAnchor::Top => 0,
        HeightAnchor::Center => (new_height as i64 - old_height).div_euclid(2),
        HeightAnchor::Bottom => new_height as i64 - old_height,
    } as i32;

    for layer in &mut state.layers {
        let mut resized = PixelBuffer::new(new_width, new_height);
        resized.blit(&layer.pixels, offset_x, offset_y);
        layer.pixels = resized;
    }
    state.width = new_width;
    state.height = new_height;
}
