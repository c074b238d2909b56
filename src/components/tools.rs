//! Tool dispatch: the pointer-driven state machine that turns input events
//! into pixel mutations.
//!
//! Every tool implements the same optional `on_pointer_down` /
//! `on_pointer_move` / `on_pointer_up` protocol against a [`ToolContext`]
//! that bundles controlled mutable access to the document, viewport, and
//! selection for the duration of one gesture. A [`ToolSet`] owns one value
//! per tool and dispatches to the active kind — no globals, no aliased
//! layer references.
//!
//! Failure policy: a hidden or missing selected layer makes every mutating
//! gesture a silent no-op, and all pixel writes clip per pixel. The hot
//! pointer-move path never reports errors.

use image::Rgba;

use crate::canvas::{CanvasState, SelectionState, TRANSPARENT};
use crate::geometry::{self, Point};
use crate::viewport::{DisplayBounds, Viewport, canvas_coordinates};

// ============================================================================
// TOOL IDENTITY, POINTER EVENTS, CONTEXT
// ============================================================================

/// Which tool is active. Only one tool is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
    Bucket,
    Eyedropper,
    Select,
    Pan,
    Line,
    Square,
    Circle,
}

impl ToolKind {
    /// Keyboard shortcut, as shown in the toolbar.
    #[must_use]
    pub fn shortcut(&self) -> char {
        match self {
            ToolKind::Pencil => 'B',
            ToolKind::Eraser => 'E',
            ToolKind::Bucket => 'G',
            ToolKind::Eyedropper => 'I',
            ToolKind::Select => 'M',
            ToolKind::Pan => 'H',
            ToolKind::Line => 'L',
            ToolKind::Square => 'S',
            ToolKind::Circle => 'C',
        }
    }
}

/// The pointer button that triggered a down/up transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

/// One pointer event in screen coordinates (relative to the page, like the
/// DOM events the engine was designed around).
#[derive(Clone, Copy, Debug)]
pub struct PointerEvent {
    pub screen_x: f32,
    pub screen_y: f32,
    /// Button that changed state; `Left` for pure move events.
    pub button: PointerButton,
    /// Buttons currently held.
    pub left_down: bool,
    pub right_down: bool,
}

impl PointerEvent {
    #[must_use]
    pub fn any_down(&self) -> bool {
        self.left_down || self.right_down
    }

    /// True when the gesture should use the secondary color.
    #[must_use]
    fn uses_secondary(&self) -> bool {
        self.button == PointerButton::Right || self.right_down
    }
}

/// Everything a tool may touch during a gesture. Borrowed fresh per event —
/// tools never hold references across events, only plain gesture state
/// (anchor points, preview point sets).
pub struct ToolContext<'a> {
    pub canvas: &'a mut CanvasState,
    pub viewport: &'a mut Viewport,
    pub selection: &'a mut SelectionState,
    pub bounds: DisplayBounds,
    pub primary_color: Rgba<u8>,
    pub secondary_color: Rgba<u8>,
    pub brush_size: u32,
    /// Per-channel flood-fill tolerance.
    pub bucket_tolerance: u8,
    /// Receives eyedropper picks: (css color, came from right button).
    pub on_color_pick: &'a mut dyn FnMut(String, bool),
}

impl ToolContext<'_> {
    /// Canvas pixel under the pointer (may be out of range).
    fn cursor(&self, ev: &PointerEvent) -> Point {
        let (x, y) = canvas_coordinates(ev.screen_x, ev.screen_y, &self.bounds, self.viewport);
        Point::new(x, y)
    }

    fn stroke_color(&self, ev: &PointerEvent) -> Rgba<u8> {
        if ev.uses_secondary() {
            self.secondary_color
        } else {
            self.primary_color
        }
    }
}

// ============================================================================
// SHARED DRAWING HELPERS
// ============================================================================

/// Stamp a brush-sized square centered on (x, y) into the selected layer.
/// `None` erases. Silent no-op when the selected layer is hidden or
/// missing; every pixel write bounds-checks independently.
fn draw_brush(canvas: &mut CanvasState, x: i32, y: i32, size: u32, color: Option<Rgba<u8>>) {
    let (w, h) = (canvas.width as i32, canvas.height as i32);
    let Some(layer) = canvas.drawable_layer_mut() else {
        return;
    };
    let size = size.max(1) as i32;
    let half = size / 2;
    let pixel = color.unwrap_or(TRANSPARENT);
    for oy in 0..size {
        for ox in 0..size {
            let px = x - half + ox;
            let py = y - half + oy;
            if px < 0 || px >= w || py < 0 || py >= h {
                continue;
            }
            layer.pixels.put_pixel(px as u32, py as u32, pixel);
        }
    }
}

/// Write a precomputed point set into the selected layer in one batched
/// pass. Same no-op/clipping policy as [`draw_brush`].
fn commit_points(canvas: &mut CanvasState, points: &[Point], color: Rgba<u8>) {
    let (w, h) = (canvas.width as i32, canvas.height as i32);
    let Some(layer) = canvas.drawable_layer_mut() else {
        return;
    };
    for p in points {
        if p.x < 0 || p.x >= w || p.y < 0 || p.y >= h {
            continue;
        }
        layer.pixels.put_pixel(p.x as u32, p.y as u32, color);
    }
}

/// Shape-tool point expansion: brush size 1 leaves the set untouched,
/// anything larger dilates by the four direct neighbors.
fn expand_for_brush(points: Vec<Point>, brush_size: u32) -> Vec<Point> {
    if brush_size > 1 {
        geometry::dilate4(&points)
    } else {
        points
    }
}

/// Circle parameters from a drag: center at the midpoint, radius from the
/// larger axis extent.
fn circle_from_drag(from: Point, to: Point) -> (Point, i32) {
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let center = Point::new(
        ((from.x + to.x) as f32 / 2.0).round() as i32,
        ((from.y + to.y) as f32 / 2.0).round() as i32,
    );
    (center, ((dx.max(dy)) as f32 / 2.0).round() as i32)
}

// ============================================================================
// TOOL TRAIT + DISPATCH
// ============================================================================

/// The pointer protocol every tool implements. All handlers are optional;
/// the default is to ignore the event.
pub trait Tool {
    fn on_pointer_down(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {}
    fn on_pointer_move(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {}
    fn on_pointer_up(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {}

    /// Uncommitted preview coverage (shape tools during a drag).
    fn preview_points(&self) -> &[Point] {
        &[]
    }

    /// Drop any in-gesture state. Called when the tool is deactivated.
    fn reset(&mut self) {}
}

/// Owns one instance of every tool and routes events to the active one.
/// Switching tools mid-gesture resets the outgoing tool's state.
pub struct ToolSet {
    active: ToolKind,
    pencil: PencilTool,
    eraser: EraserTool,
    bucket: BucketTool,
    eyedropper: EyedropperTool,
    select: SelectTool,
    pan: PanTool,
    line: LineTool,
    square: SquareTool,
    circle: CircleTool,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: ToolKind::default(),
            pencil: PencilTool::default(),
            eraser: EraserTool::default(),
            bucket: BucketTool,
            eyedropper: EyedropperTool,
            select: SelectTool,
            pan: PanTool::default(),
            line: LineTool::default(),
            square: SquareTool::default(),
            circle: CircleTool::default(),
        }
    }

    #[must_use]
    pub fn active(&self) -> ToolKind {
        self.active
    }

    /// Activate a tool, resetting the outgoing tool's gesture state.
    /// Returns the previously active kind.
    pub fn set_active(&mut self, kind: ToolKind) -> ToolKind {
        let previous = self.active;
        if previous != kind {
            self.tool_mut(previous).reset();
            self.active = kind;
        }
        previous
    }

    /// Filled/unfilled mode for the square tool.
    pub fn set_square_filled(&mut self, filled: bool) {
        self.square.filled = filled;
    }

    /// Filled/unfilled mode for the circle tool.
    pub fn set_circle_filled(&mut self, filled: bool) {
        self.circle.filled = filled;
    }

    pub fn pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        self.tool_mut(self.active).on_pointer_down(ev, ctx);
    }

    pub fn pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        self.tool_mut(self.active).on_pointer_move(ev, ctx);
    }

    pub fn pointer_up(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        self.tool_mut(self.active).on_pointer_up(ev, ctx);
    }

    /// Preview coverage of the active tool, for the renderer.
    #[must_use]
    pub fn preview_points(&self) -> &[Point] {
        self.tool(self.active).preview_points()
    }

    fn tool(&self, kind: ToolKind) -> &dyn Tool {
        match kind {
            ToolKind::Pencil => &self.pencil,
            ToolKind::Eraser => &self.eraser,
            ToolKind::Bucket => &self.bucket,
            ToolKind::Eyedropper => &self.eyedropper,
            ToolKind::Select => &self.select,
            ToolKind::Pan => &self.pan,
            ToolKind::Line => &self.line,
            ToolKind::Square => &self.square,
            ToolKind::Circle => &self.circle,
        }
    }

    fn tool_mut(&mut self, kind: ToolKind) -> &mut dyn Tool {
        match kind {
            ToolKind::Pencil => &mut self.pencil,
            ToolKind::Eraser => &mut self.eraser,
            ToolKind::Bucket => &mut self.bucket,
            ToolKind::Eyedropper => &mut self.eyedropper,
            ToolKind::Select => &mut self.select,
            ToolKind::Pan => &mut self.pan,
            ToolKind::Line => &mut self.line,
            ToolKind::Square => &mut self.square,
            ToolKind::Circle => &mut self.circle,
        }
    }
}

// ============================================================================
// PENCIL / ERASER — freehand strokes with gap-free interpolation
// ============================================================================

/// Freehand pencil. Left button draws the primary color, right button the
/// secondary. Fast pointer movement is bridged with Bresenham interpolation
/// so strokes never gap.
#[derive(Default)]
pub struct PencilTool {
    last_point: Option<Point>,
}

impl Tool for PencilTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        self.last_point = Some(p);
        let color = ctx.stroke_color(ev);
        draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, Some(color));
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        if !ev.any_down() {
            self.last_point = None;
            return;
        }
        let current = ctx.cursor(ev);
        if let Some(last) = self.last_point {
            let color = ctx.stroke_color(ev);
            for p in geometry::line_points(last.x, last.y, current.x, current.y) {
                draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, Some(color));
            }
        }
        self.last_point = Some(current);
    }

    fn on_pointer_up(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {
        self.last_point = None;
    }

    fn reset(&mut self) {
        self.last_point = None;
    }
}

/// Freehand eraser — a pencil that writes full transparency.
#[derive(Default)]
pub struct EraserTool {
    last_point: Option<Point>,
}

impl Tool for EraserTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        self.last_point = Some(p);
        draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, None);
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        if !ev.any_down() {
            self.last_point = None;
            return;
        }
        let current = ctx.cursor(ev);
        if let Some(last) = self.last_point {
            for p in geometry::line_points(last.x, last.y, current.x, current.y) {
                draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, None);
            }
        }
        self.last_point = Some(current);
    }

    fn on_pointer_up(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {
        self.last_point = None;
    }

    fn reset(&mut self) {
        self.last_point = None;
    }
}

// ============================================================================
// BUCKET — tolerance flood fill
// ============================================================================

/// Flood fill from the clicked pixel: 4-connected, stack-based (no
/// recursion), with a per-channel tolerance compared against the *original*
/// clicked color. Filling with the exact color already present is a no-op.
pub struct BucketTool;

impl Tool for BucketTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        let fill = ctx.stroke_color(ev);
        flood_fill(ctx.canvas, p.x, p.y, fill, ctx.bucket_tolerance);
    }
}

fn within_tolerance(candidate: Rgba<u8>, target: Rgba<u8>, tolerance: u8) -> bool {
    candidate
        .0
        .iter()
        .zip(target.0.iter())
        .all(|(&c, &t)| c.abs_diff(t) <= tolerance)
}

/// The bucket-fill core, exposed for the editor's programmatic fill.
pub fn flood_fill(canvas: &mut CanvasState, x: i32, y: i32, fill: Rgba<u8>, tolerance: u8) {
    let (w, h) = (canvas.width as usize, canvas.height as usize);
    if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
        return;
    }
    let Some(layer) = canvas.drawable_layer_mut() else {
        return;
    };

    let target = layer.pixels.get_pixel(x as u32, y as u32);
    if target == fill {
        return;
    }

    // The mask doubles as the visited set; the stack holds packed flat
    // indices to keep it dense.
    let mut visited = vec![false; w * h];
    let mut stack: Vec<u32> = Vec::with_capacity(1024);
    let seed = y as usize * w + x as usize;
    visited[seed] = true;
    stack.push(seed as u32);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let px = (idx % w) as u32;
        let py = (idx / w) as u32;

        if !within_tolerance(layer.pixels.get_pixel(px, py), target, tolerance) {
            continue;
        }
        layer.pixels.put_pixel(px, py, fill);

        if px > 0 && !visited[idx - 1] {
            visited[idx - 1] = true;
            stack.push((idx - 1) as u32);
        }
        if (px as usize) + 1 < w && !visited[idx + 1] {
            visited[idx + 1] = true;
            stack.push((idx + 1) as u32);
        }
        if py > 0 && !visited[idx - w] {
            visited[idx - w] = true;
            stack.push((idx - w) as u32);
        }
        if (py as usize) + 1 < h && !visited[idx + w] {
            visited[idx + w] = true;
            stack.push((idx + w) as u32);
        }
    }
}

// ============================================================================
// EYEDROPPER — composed color pick, no mutation
// ============================================================================

/// Reads the composed color under the cursor and routes it through the
/// color-pick callback: left click targets the primary slot, right click
/// the secondary.
pub struct EyedropperTool;

impl Tool for EyedropperTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        if let Some(color) = ctx.canvas.get_pixel(p.x, p.y) {
            (ctx.on_color_pick)(color, ev.button == PointerButton::Right);
        }
    }
}

// ============================================================================
// SELECT — marquee, lift, move
// ============================================================================

/// Rectangular marquee selection. All gesture state lives in the shared
/// [`SelectionState`] so the host can render and clear it.
///
/// Down inside an existing lifted region starts a move; down anywhere else
/// starts a fresh marquee. Release of a marquee lifts the covered region
/// out of the selected layer without clearing it (clearing happens only on
/// explicit delete); release of a move finalizes the region's new anchor.
pub struct SelectTool;

impl Tool for SelectTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);

        if ctx.selection.contains(p.x, p.y) {
            ctx.selection.is_moving = true;
            ctx.selection.move_start_x = p.x;
            ctx.selection.move_start_y = p.y;
            ctx.selection.original_x = ctx.selection.start_x;
            ctx.selection.original_y = ctx.selection.start_y;
            return;
        }

        ctx.selection.clear();
        ctx.selection.is_selecting = true;
        ctx.selection.start_x = p.x;
        ctx.selection.start_y = p.y;
        ctx.selection.end_x = p.x;
        ctx.selection.end_y = p.y;
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);

        if ctx.selection.is_moving {
            let Some(floating) = &ctx.selection.floating else {
                return;
            };
            let (fw, fh) = (floating.width() as i32, floating.height() as i32);
            let dx = p.x - ctx.selection.move_start_x;
            let dy = p.y - ctx.selection.move_start_y;
            ctx.selection.start_x = ctx.selection.original_x + dx;
            ctx.selection.start_y = ctx.selection.original_y + dy;
            ctx.selection.end_x = ctx.selection.start_x + fw;
            ctx.selection.end_y = ctx.selection.start_y + fh;
        } else if ctx.selection.is_selecting {
            ctx.selection.end_x = p.x;
            ctx.selection.end_y = p.y;
        }
    }

    fn on_pointer_up(&mut self, _ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        if ctx.selection.is_moving {
            // The new anchor is final; the lifted pixels stay detached.
            ctx.selection.is_moving = false;
            return;
        }
        if !ctx.selection.is_selecting {
            return;
        }
        ctx.selection.is_selecting = false;

        let (min_x, min_y, w, h) = ctx.selection.bounds();
        if w == 0 || h == 0 {
            return;
        }

        // Lift (copy, don't cut) the covered region out of the selected
        // layer. Hidden/missing layer: the marquee simply dissolves.
        let selected = ctx.canvas.selected_layer_id.clone();
        let Some(layer) = ctx.canvas.layer(&selected) else {
            return;
        };
        if !layer.visible {
            return;
        }
        let floating = layer.pixels.region(min_x, min_y, w, h);

        ctx.selection.floating = Some(floating);
        ctx.selection.start_x = min_x;
        ctx.selection.start_y = min_y;
        ctx.selection.end_x = min_x + w as i32;
        ctx.selection.end_y = min_y + h as i32;
        ctx.selection.original_x = min_x;
        ctx.selection.original_y = min_y;
    }
}

/// Clear the lifted region's source rect from the selected layer and
/// discard the selection. Returns true when pixels were cleared.
pub fn delete_selection(canvas: &mut CanvasState, selection: &mut SelectionState) -> bool {
    let Some(floating) = &selection.floating else {
        return false;
    };
    let (w, h) = (floating.width(), floating.height());
    let (ox, oy) = (selection.original_x, selection.original_y);
    let Some(layer) = canvas.drawable_layer_mut() else {
        return false;
    };
    layer.pixels.clear_rect(ox, oy, w, h);
    selection.clear();
    true
}

/// Write the lifted region into the selected layer at its current anchor
/// (used when a host commits a completed move). Fully transparent pixels
/// are skipped. Returns true when pixels were written.
pub fn stamp_selection(canvas: &mut CanvasState, selection: &SelectionState) -> bool {
    let Some(floating) = &selection.floating else {
        return false;
    };
    let (x, y) = (selection.start_x, selection.start_y);
    let Some(layer) = canvas.drawable_layer_mut() else {
        return false;
    };
    layer.pixels.blit(floating, x, y);
    true
}

// ============================================================================
// PAN — viewport drag
// ============================================================================

/// Drags the viewport while the primary button is held. Never draws.
#[derive(Default)]
pub struct PanTool {
    last_screen: Option<(f32, f32)>,
}

impl Tool for PanTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {
        self.last_screen = Some((ev.screen_x, ev.screen_y));
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        if !ev.left_down {
            self.last_screen = None;
            return;
        }
        if let Some((lx, ly)) = self.last_screen {
            ctx.viewport.pan(ev.screen_x - lx, ev.screen_y - ly);
        }
        self.last_screen = Some((ev.screen_x, ev.screen_y));
    }

    fn on_pointer_up(&mut self, _ev: &PointerEvent, _ctx: &mut ToolContext<'_>) {
        self.last_screen = None;
    }

    fn reset(&mut self) {
        self.last_screen = None;
    }
}

// ============================================================================
// SHAPE TOOLS — preview on move, commit on release
// ============================================================================

/// Straight line from the anchor to the cursor.
#[derive(Default)]
pub struct LineTool {
    start: Option<Point>,
    preview: Vec<Point>,
}

impl Tool for LineTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        self.start = Some(p);
        self.preview.clear();
        let color = ctx.stroke_color(ev);
        draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, Some(color));
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        if !ev.any_down() {
            return;
        }
        let current = ctx.cursor(ev);
        // Preview only — the committed layer buffer is untouched until
        // release.
        self.preview = expand_for_brush(
            geometry::line_points(start.x, start.y, current.x, current.y),
            ctx.brush_size,
        );
    }

    fn on_pointer_up(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        let current = ctx.cursor(ev);
        let points = expand_for_brush(
            geometry::line_points(start.x, start.y, current.x, current.y),
            ctx.brush_size,
        );
        commit_points(ctx.canvas, &points, ctx.stroke_color(ev));
        self.start = None;
        self.preview.clear();
    }

    fn preview_points(&self) -> &[Point] {
        &self.preview
    }

    fn reset(&mut self) {
        self.start = None;
        self.preview.clear();
    }
}

/// Axis-aligned rectangle between the anchor and the cursor, outline or
/// filled.
#[derive(Default)]
pub struct SquareTool {
    start: Option<Point>,
    preview: Vec<Point>,
    pub filled: bool,
}

impl Tool for SquareTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        self.start = Some(p);
        self.preview.clear();
        let color = ctx.stroke_color(ev);
        draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, Some(color));
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        if !ev.any_down() {
            return;
        }
        let current = ctx.cursor(ev);
        // Preview draws the perimeter even in filled mode — cheap enough
        // for every pointer-move event.
        self.preview = expand_for_brush(
            geometry::rect_points(start.x, start.y, current.x, current.y, false),
            ctx.brush_size,
        );
    }

    fn on_pointer_up(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        let current = ctx.cursor(ev);
        let points = expand_for_brush(
            geometry::rect_points(start.x, start.y, current.x, current.y, self.filled),
            ctx.brush_size,
        );
        commit_points(ctx.canvas, &points, ctx.stroke_color(ev));
        self.start = None;
        self.preview.clear();
    }

    fn preview_points(&self) -> &[Point] {
        &self.preview
    }

    fn reset(&mut self) {
        self.start = None;
        self.preview.clear();
    }
}

/// Circle centered on the drag midpoint, outline or filled.
#[derive(Default)]
pub struct CircleTool {
    start: Option<Point>,
    preview: Vec<Point>,
    pub filled: bool,
}

impl Tool for CircleTool {
    fn on_pointer_down(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let p = ctx.cursor(ev);
        self.start = Some(p);
        self.preview.clear();
        let color = ctx.stroke_color(ev);
        draw_brush(ctx.canvas, p.x, p.y, ctx.brush_size, Some(color));
    }

    fn on_pointer_move(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        if !ev.any_down() {
            return;
        }
        let current = ctx.cursor(ev);
        let (center, radius) = circle_from_drag(start, current);
        self.preview = expand_for_brush(
            geometry::circle_points(center.x, center.y, radius, self.filled),
            ctx.brush_size,
        );
    }

    fn on_pointer_up(&mut self, ev: &PointerEvent, ctx: &mut ToolContext<'_>) {
        let Some(start) = self.start else {
            return;
        };
        let current = ctx.cursor(ev);
        let (center, radius) = circle_from_drag(start, current);
        let points = expand_for_brush(
            geometry::circle_points(center.x, center.y, radius, self.filled),
            ctx.brush_size,
        );
        commit_points(ctx.canvas, &points, ctx.stroke_color(ev));
        self.start = None;
        self.preview.clear();
    }

    fn preview_points(&self) -> &[Point] {
        &self.preview
    }

    fn reset(&mut self) {
        self.start = None;
        self.preview.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// Test rig: canvas plus everything a ToolContext borrows. The display
    /// maps screen coordinates 1:1 onto canvas pixels (offset 0, scale 1).
    struct Rig {
        canvas: CanvasState,
        viewport: Viewport,
        selection: SelectionState,
        tools: ToolSet,
        picked: Vec<(String, bool)>,
    }

    impl Rig {
        fn new(w: u32, h: u32) -> Self {
            Self {
                canvas: CanvasState::new(w, h),
                viewport: Viewport {
                    x: 0.0,
                    y: 0.0,
                    scale: 1.0,
                },
                selection: SelectionState::default(),
                tools: ToolSet::new(),
                picked: Vec::new(),
            }
        }

        fn event(x: i32, y: i32, button: PointerButton, held: bool) -> PointerEvent {
            PointerEvent {
                screen_x: x as f32 + 0.5,
                screen_y: y as f32 + 0.5,
                button,
                left_down: held && button == PointerButton::Left,
                right_down: held && button == PointerButton::Right,
            }
        }

        fn dispatch(&mut self, phase: &str, ev: PointerEvent) {
            let picked = &mut self.picked;
            let mut on_pick = |color: String, right: bool| picked.push((color, right));
            let mut ctx = ToolContext {
                canvas: &mut self.canvas,
                viewport: &mut self.viewport,
                selection: &mut self.selection,
                bounds: DisplayBounds::default(),
                primary_color: RED,
                secondary_color: GREEN,
                brush_size: 1,
                bucket_tolerance: 0,
                on_color_pick: &mut on_pick,
            };
            match phase {
                "down" => self.tools.pointer_down(&ev, &mut ctx),
                "move" => self.tools.pointer_move(&ev, &mut ctx),
                "up" => self.tools.pointer_up(&ev, &mut ctx),
                other => panic!("unknown phase {}", other),
            }
        }

        fn down(&mut self, x: i32, y: i32) {
            self.dispatch("down", Self::event(x, y, PointerButton::Left, true));
        }

        fn drag(&mut self, x: i32, y: i32) {
            self.dispatch("move", Self::event(x, y, PointerButton::Left, true));
        }

        fn up(&mut self, x: i32, y: i32) {
            self.dispatch("up", Self::event(x, y, PointerButton::Left, false));
        }

        fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
            self.canvas.layers[0].pixels.get_pixel(x, y)
        }
    }

    #[test]
    fn pencil_stroke_paints_exactly_the_line() {
        let mut rig = Rig::new(4, 4);
        rig.down(0, 0);
        rig.drag(2, 0);
        rig.up(2, 0);

        for x in 0..3 {
            assert_eq!(rig.pixel(x, 0), RED, "pixel ({}, 0)", x);
        }
        for y in 0..4 {
            for x in 0..4 {
                if y != 0 || x > 2 {
                    assert_eq!(rig.pixel(x, y), TRANSPARENT, "pixel ({}, {})", x, y);
                }
            }
        }
    }

    #[test]
    fn pencil_interpolates_fast_moves() {
        let mut rig = Rig::new(8, 8);
        rig.down(0, 0);
        rig.drag(7, 7); // one jump; interpolation must fill the diagonal
        rig.up(7, 7);
        for i in 0..8 {
            assert_eq!(rig.pixel(i, i), RED);
        }
    }

    #[test]
    fn right_button_draws_secondary_color() {
        let mut rig = Rig::new(4, 4);
        rig.dispatch("down", Rig::event(1, 1, PointerButton::Right, true));
        assert_eq!(rig.pixel(1, 1), GREEN);
    }

    #[test]
    fn brush_size_two_stamps_a_square() {
        let mut rig = Rig::new(4, 4);
        let picked = &mut rig.picked;
        let mut on_pick = |c: String, r: bool| picked.push((c, r));
        let mut ctx = ToolContext {
            canvas: &mut rig.canvas,
            viewport: &mut rig.viewport,
            selection: &mut rig.selection,
            bounds: DisplayBounds::default(),
            primary_color: RED,
            secondary_color: GREEN,
            brush_size: 2,
            bucket_tolerance: 0,
            on_color_pick: &mut on_pick,
        };
        let ev = Rig::event(1, 1, PointerButton::Left, true);
        rig.tools.pointer_down(&ev, &mut ctx);

        // Side 2, centered with floor(2/2)=1 offset: covers (0,0)-(1,1).
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(rig.canvas.layers[0].pixels.get_pixel(x, y), RED);
        }
        assert_eq!(rig.canvas.layers[0].pixels.get_pixel(2, 1), TRANSPARENT);
    }

    #[test]
    fn hidden_layer_suppresses_drawing() {
        let mut rig = Rig::new(4, 4);
        rig.canvas.layers[0].visible = false;
        rig.down(1, 1);
        rig.up(1, 1);
        assert!(rig.canvas.layers[0].pixels.is_empty());
    }

    #[test]
    fn eraser_clears_pixels_with_interpolation() {
        let mut rig = Rig::new(4, 4);
        for x in 0..4 {
            rig.canvas.layers[0].pixels.put_pixel(x, 1, WHITE);
        }
        rig.tools.set_active(ToolKind::Eraser);
        rig.down(0, 1);
        rig.drag(3, 1);
        rig.up(3, 1);
        for x in 0..4 {
            assert_eq!(rig.pixel(x, 1), TRANSPARENT);
        }
    }

    #[test]
    fn bucket_fills_connected_region_only() {
        // 3×3 all black except a white center: filling from the corner
        // turns the 8-connected border green, center stays white
        // (4-connectivity keeps it disconnected from nothing — it simply
        // doesn't match the target color).
        let mut rig = Rig::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                rig.canvas.layers[0].pixels.put_pixel(x, y, BLACK);
            }
        }
        rig.canvas.layers[0].pixels.put_pixel(1, 1, WHITE);

        rig.tools.set_active(ToolKind::Bucket);
        rig.dispatch("down", Rig::event(0, 0, PointerButton::Right, true));

        for y in 0..3 {
            for x in 0..3 {
                let expected = if x == 1 && y == 1 { WHITE } else { GREEN };
                assert_eq!(rig.pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn bucket_fill_rectangle_containment() {
        // Uniform white rectangle inside a red frame: tolerance-0 fill from
        // inside covers exactly the rectangle.
        let mut rig = Rig::new(6, 6);
        for y in 0..6 {
            for x in 0..6 {
                rig.canvas.layers[0].pixels.put_pixel(x, y, RED);
            }
        }
        for y in 1..4 {
            for x in 1..5 {
                rig.canvas.layers[0].pixels.put_pixel(x, y, WHITE);
            }
        }

        rig.tools.set_active(ToolKind::Bucket);
        rig.dispatch("down", Rig::event(2, 2, PointerButton::Right, true));

        for y in 0..6 {
            for x in 0..6 {
                let inside = (1..5).contains(&x) && (1..4).contains(&y);
                let expected = if inside { GREEN } else { RED };
                assert_eq!(rig.pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn bucket_is_idempotent_on_matching_color() {
        let mut rig = Rig::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                rig.canvas.layers[0].pixels.put_pixel(x, y, RED);
            }
        }
        let before = rig.canvas.layers[0].pixels.clone();
        rig.tools.set_active(ToolKind::Bucket);
        rig.down(1, 1); // primary color is already RED
        assert_eq!(rig.canvas.layers[0].pixels, before);
    }

    #[test]
    fn bucket_fills_transparent_region() {
        let mut rig = Rig::new(3, 3);
        rig.canvas.layers[0].pixels.put_pixel(2, 2, WHITE);
        rig.tools.set_active(ToolKind::Bucket);
        rig.down(0, 0);
        for y in 0..3 {
            for x in 0..3 {
                let expected = if x == 2 && y == 2 { WHITE } else { RED };
                assert_eq!(rig.pixel(x, y), expected);
            }
        }
    }

    #[test]
    fn bucket_tolerance_crosses_near_colors() {
        let mut rig = Rig::new(2, 1);
        rig.canvas.layers[0].pixels.put_pixel(0, 0, BLACK);
        rig.canvas
            .layers
            .first_mut()
            .unwrap()
            .pixels
            .put_pixel(1, 0, Rgba([10, 10, 10, 255]));

        // Tolerance 0: only the seed pixel matches.
        rig.tools.set_active(ToolKind::Bucket);
        rig.down(0, 0);
        assert_eq!(rig.pixel(0, 0), RED);
        assert_eq!(rig.pixel(1, 0), Rgba([10, 10, 10, 255]));

        // Tolerance 10 against the original clicked color reaches both.
        let mut canvas = CanvasState::new(2, 1);
        canvas.layers[0].pixels.put_pixel(0, 0, BLACK);
        canvas.layers[0].pixels.put_pixel(1, 0, Rgba([10, 10, 10, 255]));
        flood_fill(&mut canvas, 0, 0, RED, 10);
        assert_eq!(canvas.layers[0].pixels.get_pixel(0, 0), RED);
        assert_eq!(canvas.layers[0].pixels.get_pixel(1, 0), RED);
    }

    #[test]
    fn eyedropper_routes_picks_by_button() {
        let mut rig = Rig::new(2, 2);
        rig.canvas.layers[0].pixels.put_pixel(0, 0, RED);
        rig.tools.set_active(ToolKind::Eyedropper);

        rig.down(0, 0);
        rig.dispatch("down", Rig::event(0, 0, PointerButton::Right, true));
        rig.down(1, 1); // empty pixel: no pick

        assert_eq!(
            rig.picked,
            vec![
                ("#FF0000".to_string(), false),
                ("#FF0000".to_string(), true)
            ]
        );
        assert!(rig.canvas.layers[0].pixels.get_pixel(1, 1) == TRANSPARENT);
    }

    #[test]
    fn line_tool_previews_then_commits_once() {
        let mut rig = Rig::new(8, 8);
        rig.tools.set_active(ToolKind::Line);
        rig.down(1, 1);
        rig.drag(5, 1);

        assert!(!rig.tools.preview_points().is_empty());
        // Preview must not touch committed pixels beyond the anchor stamp.
        assert_eq!(rig.pixel(3, 1), TRANSPARENT);

        rig.up(5, 1);
        for x in 1..=5 {
            assert_eq!(rig.pixel(x, 1), RED);
        }
        assert!(rig.tools.preview_points().is_empty());
    }

    #[test]
    fn square_tool_outline_and_filled() {
        let mut rig = Rig::new(8, 8);
        rig.tools.set_active(ToolKind::Square);
        rig.down(1, 1);
        rig.up(4, 3);

        // Outline only.
        assert_eq!(rig.pixel(1, 1), RED);
        assert_eq!(rig.pixel(4, 3), RED);
        assert_eq!(rig.pixel(2, 2), TRANSPARENT);

        rig.tools.set_square_filled(true);
        rig.down(1, 1);
        rig.up(4, 3);
        assert_eq!(rig.pixel(2, 2), RED);
    }

    #[test]
    fn circle_tool_commits_centered_circle() {
        let mut rig = Rig::new(16, 16);
        rig.tools.set_active(ToolKind::Circle);
        rig.down(2, 8);
        rig.up(12, 8);

        // Center (7, 8), radius 5.
        assert_eq!(rig.pixel(2, 8), RED);
        assert_eq!(rig.pixel(12, 8), RED);
        assert_eq!(rig.pixel(7, 3), RED);
        assert_eq!(rig.pixel(7, 13), RED);
        assert_eq!(rig.pixel(7, 8), TRANSPARENT, "outline mode leaves center");
    }

    #[test]
    fn shape_commit_clips_out_of_range_points() {
        let mut rig = Rig::new(4, 4);
        rig.tools.set_active(ToolKind::Line);
        rig.down(2, 2);
        rig.up(9, 2); // runs off the right edge
        assert_eq!(rig.pixel(2, 2), RED);
        assert_eq!(rig.pixel(3, 2), RED);
    }

    #[test]
    fn select_lifts_region_non_destructively() {
        let mut rig = Rig::new(6, 6);
        rig.canvas.layers[0].pixels.put_pixel(2, 2, RED);
        rig.tools.set_active(ToolKind::Select);

        rig.down(1, 1);
        rig.drag(4, 4);
        rig.up(4, 4);

        let floating = rig.selection.floating.as_ref().expect("region lifted");
        assert_eq!((floating.width(), floating.height()), (3, 3));
        assert_eq!(floating.get_pixel(1, 1), RED);
        // Source pixels are untouched by the lift.
        assert_eq!(rig.pixel(2, 2), RED);
        assert!(!rig.selection.is_selecting);
    }

    #[test]
    fn select_move_translates_anchor_and_finalizes() {
        let mut rig = Rig::new(8, 8);
        rig.canvas.layers[0].pixels.put_pixel(1, 1, RED);
        rig.tools.set_active(ToolKind::Select);
        rig.down(0, 0);
        rig.drag(3, 3);
        rig.up(3, 3);

        // Grab inside the lifted region and drag it by (2, 1).
        rig.down(1, 1);
        assert!(rig.selection.is_moving);
        rig.drag(3, 2);
        assert_eq!((rig.selection.start_x, rig.selection.start_y), (2, 1));
        rig.up(3, 2);
        assert!(!rig.selection.is_moving);
        assert_eq!((rig.selection.start_x, rig.selection.start_y), (2, 1));
        assert!(rig.selection.floating.is_some(), "still lifted after move");

        // Stamping writes the region at its new anchor.
        assert!(stamp_selection(&mut rig.canvas, &rig.selection));
        assert_eq!(rig.pixel(3, 2), RED);
    }

    #[test]
    fn select_click_outside_lifted_region_starts_new_marquee() {
        let mut rig = Rig::new(8, 8);
        rig.tools.set_active(ToolKind::Select);
        rig.down(0, 0);
        rig.drag(2, 2);
        rig.up(2, 2);
        assert!(rig.selection.floating.is_some());

        rig.down(6, 6);
        assert!(rig.selection.is_selecting);
        assert!(rig.selection.floating.is_none(), "old lift discarded");
    }

    #[test]
    fn degenerate_marquee_creates_no_selection() {
        let mut rig = Rig::new(4, 4);
        rig.tools.set_active(ToolKind::Select);
        rig.down(2, 2);
        rig.up(2, 2);
        assert!(rig.selection.floating.is_none());
        assert!(rig.selection.is_idle());
    }

    #[test]
    fn delete_selection_clears_source_rect() {
        let mut rig = Rig::new(6, 6);
        for y in 1..3 {
            for x in 1..3 {
                rig.canvas.layers[0].pixels.put_pixel(x, y, RED);
            }
        }
        rig.tools.set_active(ToolKind::Select);
        rig.down(1, 1);
        rig.drag(3, 3);
        rig.up(3, 3);

        assert!(delete_selection(&mut rig.canvas, &mut rig.selection));
        for y in 1..3 {
            for x in 1..3 {
                assert_eq!(rig.pixel(x, y), TRANSPARENT);
            }
        }
        assert!(rig.selection.is_idle());
        assert!(!delete_selection(&mut rig.canvas, &mut rig.selection));
    }

    #[test]
    fn pan_tool_translates_viewport_without_drawing() {
        let mut rig = Rig::new(4, 4);
        rig.tools.set_active(ToolKind::Pan);
        rig.down(10, 10);
        rig.drag(15, 12);
        rig.up(15, 12);

        assert_eq!((rig.viewport.x, rig.viewport.y), (5.0, 2.0));
        assert!(rig.canvas.layers[0].pixels.is_empty());
    }

    #[test]
    fn switching_tools_resets_gesture_state() {
        let mut rig = Rig::new(8, 8);
        rig.tools.set_active(ToolKind::Line);
        rig.down(0, 0);
        rig.drag(4, 0);
        assert!(!rig.tools.preview_points().is_empty());

        rig.tools.set_active(ToolKind::Pencil);
        rig.tools.set_active(ToolKind::Line);
        assert!(rig.tools.preview_points().is_empty());
    }
}
