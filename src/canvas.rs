//! Layered raster document model.
//!
//! `PixelBuffer` is a packed RGBA buffer with an "empty" (fully transparent)
//! sentinel that is materialized lazily on first write. `CanvasState` owns
//! the ordered layer stack and is the single source of truth for drawable
//! content; tools receive controlled mutable access through it for the
//! duration of a gesture only. Cloning any of these types is a full deep
//! copy — the history engine depends on that.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::colors::format_css_color;

/// A pixel with zero alpha.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// PIXEL BUFFER — fixed-size RGBA raster with a lazy "empty" sentinel
// ============================================================================

/// A `width × height` RGBA buffer, or the sentinel "empty" meaning fully
/// transparent. The backing image is only allocated on the first write, so a
/// freshly added layer costs nothing until it is painted on.
///
/// `Clone` performs a full pixel copy — there is no sharing between clones.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Option<RgbaImage>,
}

impl PixelBuffer {
    /// Create an empty (fully transparent) buffer.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: None,
        }
    }

    /// Wrap an existing image as a materialized buffer.
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: Some(image),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// True while the buffer has never been written to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// The backing image, if materialized.
    #[must_use]
    pub fn raw_image(&self) -> Option<&RgbaImage> {
        self.data.as_ref()
    }

    /// Read a pixel. Out-of-range coordinates and empty buffers read as
    /// fully transparent.
    #[must_use]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        match &self.data {
            Some(img) => *img.get_pixel(x, y),
            None => TRANSPARENT,
        }
    }

    /// Write a pixel, materializing the buffer on first use. Out-of-range
    /// coordinates are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.materialize().put_pixel(x, y, pixel);
    }

    /// Set every pixel in the given rect to fully transparent, clipping to
    /// the buffer bounds. A no-op on an empty buffer.
    pub fn clear_rect(&mut self, x: i32, y: i32, w: u32, h: u32) {
        if self.data.is_none() {
            return;
        }
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(w as i32)).clamp(0, self.width as i32) as u32;
        let y1 = (y.saturating_add(h as i32)).clamp(0, self.height as i32) as u32;
        if let Some(img) = &mut self.data {
            for py in y0..y1 {
                for px in x0..x1 {
                    img.put_pixel(px, py, TRANSPARENT);
                }
            }
        }
    }

    /// Copy a `w × h` region starting at (x, y) into a new buffer. Areas
    /// outside this buffer read as transparent.
    #[must_use]
    pub fn region(&self, x: i32, y: i32, w: u32, h: u32) -> PixelBuffer {
        let mut out = PixelBuffer::new(w, h);
        if self.data.is_none() || w == 0 || h == 0 {
            return out;
        }
        for oy in 0..h {
            for ox in 0..w {
                let sx = x + ox as i32;
                let sy = y + oy as i32;
                if sx < 0 || sy < 0 {
                    continue;
                }
                let px = self.get_pixel(sx as u32, sy as u32);
                if px[3] > 0 {
                    out.put_pixel(ox, oy, px);
                }
            }
        }
        out
    }

    /// Write `src` into this buffer with its top-left corner at (x, y),
    /// clipping per pixel. Fully transparent source pixels are skipped so
    /// the destination shows through.
    pub fn blit(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        let Some(src_img) = src.raw_image() else {
            return;
        };
        for (sx, sy, px) in src_img.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            let dx = x + sx as i32;
            let dy = y + sy as i32;
            if dx < 0 || dy < 0 {
                continue;
            }
            self.put_pixel(dx as u32, dy as u32, *px);
        }
    }

    /// A materialized copy of the buffer contents.
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        match &self.data {
            Some(img) => img.clone(),
            None => RgbaImage::new(self.width, self.height),
        }
    }

    /// Approximate heap usage in bytes.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        match &self.data {
            Some(img) => img.as_raw().len(),
            None => 0,
        }
    }

    fn materialize(&mut self) -> &mut RgbaImage {
        if self.data.is_none() {
            self.data = Some(RgbaImage::new(self.width, self.height));
        }
        self.data.as_mut().unwrap()
    }
}

impl PartialEq for PixelBuffer {
    /// Value equality: an empty buffer equals an all-transparent
    /// materialized buffer of the same size.
    fn eq(&self, other: &Self) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        match (&self.data, &other.data) {
            (None, None) => true,
            (Some(a), Some(b)) => a.as_raw() == b.as_raw(),
            (Some(img), None) | (None, Some(img)) => img.as_raw().iter().all(|&b| b == 0),
        }
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// A single named raster layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Opaque id, unique within the document (`layer_<serial>`).
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub pixels: PixelBuffer,
}

impl Layer {
    #[must_use]
    pub fn new(id: String, name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            name,
            visible: true,
            pixels: PixelBuffer::new(width, height),
        }
    }
}

// ============================================================================
// SELECTION — rectangular marquee, lifted region, live move
// ============================================================================

/// Transient selection state. At most one selection exists per document.
///
/// Exactly one of four phases holds at any time: idle, marquee in progress
/// (`is_selecting`), lifted (`floating` populated), or moving (`is_moving`,
/// which implies lifted). `floating` being present is the discriminator
/// between "has a lifted region" and not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    /// Marquee drag in progress.
    pub is_selecting: bool,
    /// Anchor corner (marquee) or region top-left (lifted/moving).
    pub start_x: i32,
    pub start_y: i32,
    /// Cursor corner (marquee) or region bottom-right (lifted/moving).
    pub end_x: i32,
    pub end_y: i32,
    /// Lifted region being dragged.
    pub is_moving: bool,
    /// Canvas position where the current move gesture started.
    pub move_start_x: i32,
    pub move_start_y: i32,
    /// Detached copy of the selected pixel region.
    pub floating: Option<PixelBuffer>,
    /// Where the region was lifted from (used by delete).
    pub original_x: i32,
    pub original_y: i32,
}

impl SelectionState {
    /// Back to idle, discarding any lifted pixels. Never touches the layer.
    pub fn clear(&mut self) {
        *self = SelectionState::default();
    }

    /// True when no marquee is active and nothing is lifted.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.is_selecting && !self.is_moving && self.floating.is_none()
    }

    /// Normalized marquee rectangle as (min_x, min_y, width, height).
    #[must_use]
    pub fn bounds(&self) -> (i32, i32, u32, u32) {
        let min_x = self.start_x.min(self.end_x);
        let min_y = self.start_y.min(self.end_y);
        let w = (self.end_x - self.start_x).unsigned_abs();
        let h = (self.end_y - self.start_y).unsigned_abs();
        (min_x, min_y, w, h)
    }

    /// True when (x, y) falls inside the lifted region at its current
    /// anchor (inclusive edges).
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let Some(floating) = &self.floating else {
            return false;
        };
        x >= self.start_x
            && x <= self.start_x + floating.width() as i32
            && y >= self.start_y
            && y <= self.start_y + floating.height() as i32
    }
}

// ============================================================================
// CANVAS STATE — the document: size + ordered layer stack
// ============================================================================

/// The editable document: canvas dimensions plus the ordered layer stack
/// (index 0 is the bottom-most layer). A document always has at least one
/// layer.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    pub selected_layer_id: String,
    /// Monotonic id source. Re-indexing (delete/reorder) renames layers to
    /// `layer_0…layer_{n-1}`, so the serial is bumped past the layer count
    /// afterwards to keep fresh ids collision-free.
    layer_serial: u64,
}

impl CanvasState {
    /// New document with a single blank layer, selected.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let base = Layer::new("layer_0".to_string(), "Layer 1".to_string(), width, height);
        let selected = base.id.clone();
        Self {
            width,
            height,
            layers: vec![base],
            selected_layer_id: selected,
            layer_serial: 1,
        }
    }

    /// Rebuild a document from pre-existing layers (deserialization,
    /// snapshot restore). Falls back to a blank document when `layers` is
    /// empty. Canvas dimensions are taken from the first layer.
    #[must_use]
    pub fn from_layers(layers: Vec<Layer>, selected_layer_id: String) -> Self {
        let Some(first) = layers.first() else {
            return CanvasState::new(1, 1);
        };
        let width = first.pixels.width();
        let height = first.pixels.height();
        let selected = if layers.iter().any(|l| l.id == selected_layer_id) {
            selected_layer_id
        } else {
            layers[0].id.clone()
        };
        let mut state = Self {
            width,
            height,
            layers,
            selected_layer_id: selected,
            layer_serial: 0,
        };
        state.layer_serial = state.next_serial_floor().max(state.layers.len() as u64);
        state
    }

    /// Mint a fresh unique layer id.
    pub fn next_layer_id(&mut self) -> String {
        let id = format!("layer_{}", self.layer_serial);
        self.layer_serial += 1;
        id
    }

    /// Rename every layer to its positional id/name (`layer_0` / `Layer 1`
    /// upward). This deliberately trades persistent identity for
    /// predictable names; callers re-point the selection themselves.
    pub fn reindex_layers(&mut self) {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.id = format!("layer_{}", index);
            layer.name = format!("Layer {}", index + 1);
        }
        self.layer_serial = self.layer_serial.max(self.layers.len() as u64);
    }

    fn next_serial_floor(&self) -> u64 {
        // One past the largest numeric suffix currently in use.
        self.layers
            .iter()
            .filter_map(|l| l.id.strip_prefix("layer_"))
            .filter_map(|s| s.parse::<u64>().ok())
            .map(|n| n + 1)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    #[must_use]
    pub fn layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    #[must_use]
    pub fn selected_layer(&self) -> Option<&Layer> {
        self.layer(self.selected_layer_id.as_str())
    }

    /// Mutable access to the selected layer *if it can be drawn on* (exists
    /// and is visible). Tools route every mutation through this accessor;
    /// `None` means the gesture is a silent no-op.
    #[must_use]
    pub fn drawable_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.selected_layer_id.clone();
        self.layers.iter_mut().find(|l| l.id == id && l.visible)
    }

    /// Composed color at (x, y): topmost visible layer with a
    /// non-transparent pixel wins. Returns an uppercase `#RRGGBB` for fully
    /// opaque pixels, `rgba(r, g, b, a)` for partial alpha, `None` when no
    /// visible layer covers the point. Alpha-0 pixels are absent, not a
    /// color.
    #[must_use]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<String> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        for layer in self.layers.iter().rev() {
            if !layer.visible {
                continue;
            }
            let px = layer.pixels.get_pixel(x as u32, y as u32);
            if px[3] == 0 {
                continue;
            }
            return Some(format_css_color(px));
        }
        None
    }

    /// Flatten all visible layers bottom-up with source-over blending.
    /// Rows are composited in parallel.
    #[must_use]
    pub fn composite(&self) -> RgbaImage {
        let w = self.width;
        let h = self.height;
        let stride = w as usize * 4;
        let mut out = vec![0u8; stride * h as usize];
        if w == 0 || h == 0 {
            return RgbaImage::new(w, h);
        }

        let visible: Vec<&RgbaImage> = self
            .layers
            .iter()
            .filter(|l| l.visible)
            .filter_map(|l| l.pixels.raw_image())
            .collect();

        out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            for img in &visible {
                let src = &img.as_raw()[y * stride..(y + 1) * stride];
                for x in 0..w as usize {
                    let i = x * 4;
                    let sa = src[i + 3] as u32;
                    if sa == 0 {
                        continue;
                    }
                    if sa == 255 {
                        row[i..i + 4].copy_from_slice(&src[i..i + 4]);
                        continue;
                    }
                    let da = row[i + 3] as u32;
                    let out_a = sa + da * (255 - sa) / 255;
                    if out_a == 0 {
                        continue;
                    }
                    for c in 0..3 {
                        let sc = src[i + c] as u32;
                        let dc = row[i + c] as u32;
                        row[i + c] = ((sc * sa + dc * da * (255 - sa) / 255) / out_a) as u8;
                    }
                    row[i + 3] = out_a as u8;
                }
            }
        });

        RgbaImage::from_raw(w, h, out).unwrap()
    }

    /// Downscaled preview of a single layer for the layer list. `None` for
    /// unknown or hidden layers — hidden layers get no thumbnail.
    #[must_use]
    pub fn layer_thumbnail(&self, id: &str, max_edge: u32) -> Option<RgbaImage> {
        let layer = self.layer(id)?;
        if !layer.visible {
            return None;
        }
        let flat = layer.pixels.to_rgba_image();
        let longest = flat.width().max(flat.height()).max(1);
        if longest <= max_edge {
            return Some(flat);
        }
        let scale = max_edge as f32 / longest as f32;
        let nw = ((flat.width() as f32 * scale).round() as u32).max(1);
        let nh = ((flat.height() as f32 * scale).round() as u32).max(1);
        Some(image::imageops::resize(
            &flat,
            nw,
            nh,
            image::imageops::FilterType::Nearest,
        ))
    }

    /// Approximate heap usage of all layer buffers.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.layers.iter().map(|l| l.pixels.mem_size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_reads_transparent_and_allocates_nothing() {
        let buf = PixelBuffer::new(8, 8);
        assert!(buf.is_empty());
        assert_eq!(buf.get_pixel(3, 3), TRANSPARENT);
        assert_eq!(buf.mem_size(), 0);
    }

    #[test]
    fn put_pixel_materializes_lazily() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.put_pixel(1, 2, Rgba([255, 0, 0, 255]));
        assert!(!buf.is_empty());
        assert_eq!(buf.get_pixel(1, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(buf.get_pixel(0, 0), TRANSPARENT);
    }

    #[test]
    fn out_of_range_writes_are_ignored() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.put_pixel(2, 0, Rgba([1, 2, 3, 255]));
        buf.put_pixel(0, 9, Rgba([1, 2, 3, 255]));
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_equals_all_transparent() {
        let empty = PixelBuffer::new(3, 3);
        let mut touched = PixelBuffer::new(3, 3);
        touched.put_pixel(0, 0, Rgba([9, 9, 9, 200]));
        touched.put_pixel(0, 0, TRANSPARENT);
        assert_eq!(empty, touched);
        assert_ne!(empty, PixelBuffer::new(3, 4));
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut a = PixelBuffer::new(4, 4);
        a.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        let b = a.clone();
        a.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        assert_eq!(b.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn region_pads_outside_with_transparency() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        let region = buf.region(-1, -1, 3, 3);
        assert_eq!(region.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(region.get_pixel(1, 1), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn clear_rect_clips_to_bounds() {
        let mut buf = PixelBuffer::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                buf.put_pixel(x, y, Rgba([5, 5, 5, 255]));
            }
        }
        buf.clear_rect(-1, -1, 3, 3);
        assert_eq!(buf.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(buf.get_pixel(1, 1), TRANSPARENT);
        assert_eq!(buf.get_pixel(2, 2), Rgba([5, 5, 5, 255]));
    }

    #[test]
    fn new_document_has_one_selected_base_layer() {
        let state = CanvasState::new(16, 16);
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.layers[0].id, "layer_0");
        assert_eq!(state.layers[0].name, "Layer 1");
        assert_eq!(state.selected_layer_id, "layer_0");
    }

    #[test]
    fn get_pixel_composes_topmost_visible_first() {
        let mut state = CanvasState::new(4, 4);
        state.layers[0]
            .pixels
            .put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let id = state.next_layer_id();
        let mut top = Layer::new(id, "Layer 2".to_string(), 4, 4);
        top.pixels.put_pixel(1, 1, Rgba([0, 0, 255, 255]));
        state.layers.push(top);

        assert_eq!(state.get_pixel(1, 1).as_deref(), Some("#0000FF"));

        state.layers[1].visible = false;
        assert_eq!(state.get_pixel(1, 1).as_deref(), Some("#FF0000"));
        assert_eq!(state.get_pixel(0, 0), None);
        assert_eq!(state.get_pixel(-1, 0), None);
    }

    #[test]
    fn get_pixel_reports_partial_alpha_as_rgba() {
        let mut state = CanvasState::new(2, 2);
        state.layers[0]
            .pixels
            .put_pixel(0, 0, Rgba([255, 128, 0, 128]));
        assert_eq!(
            state.get_pixel(0, 0).as_deref(),
            Some("rgba(255, 128, 0, 0.50)")
        );
    }

    #[test]
    fn get_pixel_treats_opaque_black_as_a_color() {
        let mut state = CanvasState::new(2, 2);
        state.layers[0].pixels.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(state.get_pixel(0, 0).as_deref(), Some("#000000"));
    }

    #[test]
    fn composite_blends_partial_alpha_over_opaque() {
        let mut state = CanvasState::new(1, 1);
        state.layers[0]
            .pixels
            .put_pixel(0, 0, Rgba([0, 0, 255, 255]));
        let id = state.next_layer_id();
        let mut top = Layer::new(id, "Layer 2".to_string(), 1, 1);
        top.pixels.put_pixel(0, 0, Rgba([255, 0, 0, 128]));
        state.layers.push(top);

        let flat = state.composite();
        let px = flat.get_pixel(0, 0);
        assert_eq!(px[3], 255);
        assert!(px[0] > 100 && px[0] < 160, "red ≈ half: {:?}", px);
        assert!(px[2] > 100 && px[2] < 160, "blue ≈ half: {:?}", px);
    }

    #[test]
    fn hidden_layers_are_excluded_from_composite_and_thumbnails() {
        let mut state = CanvasState::new(2, 2);
        state.layers[0]
            .pixels
            .put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        state.layers[0].visible = false;
        let flat = state.composite();
        assert_eq!(flat.get_pixel(0, 0)[3], 0);
        assert!(state.layer_thumbnail("layer_0", 64).is_none());
    }

    #[test]
    fn reindex_bumps_serial_past_layer_count() {
        let mut state = CanvasState::new(4, 4);
        let id = state.next_layer_id();
        state
            .layers
            .push(Layer::new(id, "Layer 2".to_string(), 4, 4));
        state.reindex_layers();
        assert_eq!(state.layers[1].id, "layer_1");
        let fresh = state.next_layer_id();
        assert!(
            !state.layers.iter().any(|l| l.id == fresh),
            "fresh id collides: {}",
            fresh
        );
    }

    #[test]
    fn selection_contains_tracks_anchor() {
        let mut sel = SelectionState::default();
        assert!(sel.is_idle());
        sel.floating = Some(PixelBuffer::new(4, 4));
        sel.start_x = 10;
        sel.start_y = 10;
        assert!(sel.contains(12, 12));
        assert!(!sel.contains(15, 9));
        sel.clear();
        assert!(sel.is_idle());
        assert!(sel.floating.is_none());
    }
}
