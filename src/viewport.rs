//! Viewport transform: screen offset + uniform zoom from canvas pixel space
//! to screen space. Purely presentational — never part of document state or
//! history snapshots.

pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 32.0;

/// Zoom change per wheel step (±10%).
const ZOOM_STEP: f32 = 0.1;

/// Margin factor applied by fit-to-container so the canvas doesn't touch
/// the container edges.
const FIT_MARGIN: f32 = 0.8;

/// Screen-space placement of the canvas: offset in pixels plus a uniform
/// scale factor clamped to `[MIN_SCALE, MAX_SCALE]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 4.0,
        }
    }
}

impl Viewport {
    /// Translate by a screen-space delta. The scale is untouched.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Zoom by one wheel step toward the cursor. The canvas point under
    /// (cursor_x, cursor_y) stays under the cursor after the scale change.
    /// A positive `delta_y` (wheel down) zooms out.
    pub fn zoom(&mut self, delta_y: f32, cursor_x: f32, cursor_y: f32) {
        let direction = if delta_y > 0.0 { -1.0 } else { 1.0 };
        let new_scale = (self.scale * (1.0 + ZOOM_STEP * direction)).clamp(MIN_SCALE, MAX_SCALE);

        let world_x = (cursor_x - self.x) / self.scale;
        let world_y = (cursor_y - self.y) / self.scale;

        self.x = cursor_x - world_x * new_scale;
        self.y = cursor_y - world_y * new_scale;
        self.scale = new_scale;
    }

    /// Scale the canvas to fit the container (with a margin) and center it.
    /// Call again whenever the container is resized to keep the drawing
    /// centered.
    pub fn fit_to_container(
        &mut self,
        container_w: f32,
        container_h: f32,
        canvas_w: u32,
        canvas_h: u32,
    ) {
        if canvas_w == 0 || canvas_h == 0 {
            return;
        }
        let scale_x = container_w / canvas_w as f32;
        let scale_y = container_h / canvas_h as f32;
        let scale = (scale_x.min(scale_y) * FIT_MARGIN).clamp(MIN_SCALE, MAX_SCALE);

        self.scale = scale;
        self.x = (container_w - canvas_w as f32 * scale) / 2.0;
        self.y = (container_h - canvas_h as f32 * scale) / 2.0;
    }

    /// Canvas pixel coordinates to screen coordinates (top-left corner of
    /// the pixel).
    #[must_use]
    pub fn canvas_to_screen(&self, canvas_x: f32, canvas_y: f32) -> (f32, f32) {
        (
            canvas_x * self.scale + self.x,
            canvas_y * self.scale + self.y,
        )
    }
}

/// Placement of the display element that pointer events are measured
/// against, plus the device-pixel-ratio between event coordinates and the
/// element's backing store.
#[derive(Clone, Copy, Debug)]
pub struct DisplayBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Default for DisplayBounds {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            pixel_ratio: 1.0,
        }
    }
}

/// Invert the display-element offset, the device-pixel-ratio scale, and the
/// viewport transform, flooring to integer canvas pixel coordinates.
///
/// Out-of-range results are permitted — callers clip per pixel.
#[must_use]
pub fn canvas_coordinates(
    screen_x: f32,
    screen_y: f32,
    bounds: &DisplayBounds,
    viewport: &Viewport,
) -> (i32, i32) {
    let local_x = (screen_x - bounds.left) * bounds.pixel_ratio;
    let local_y = (screen_y - bounds.top) * bounds.pixel_ratio;
    (
        ((local_x - viewport.x) / viewport.scale).floor() as i32,
        ((local_y - viewport.y) / viewport.scale).floor() as i32,
    )
}
