//! Interactive tools — translate pointer gestures into selection drafts,
//! crop rectangles and layer moves against an [`Editor`].
//!
//! Tools own only gesture state; document state lives in the editor.  A
//! draft never touches history: only commits, crops and completed moves
//! mutate the document.

use crate::editor::{Editor, TransformPatch};
use crate::geometry::{Bounds, Point};
use crate::selection::{SelectionMode, SelectionShape};

/// Rect/ellipse drags smaller than this on both axes are discarded as
/// accidental clicks.
const MIN_RECT_SIZE: f64 = 2.0;
const MIN_ELLIPSE_RADIUS: f64 = 1.0;

/// Crop edge grab tolerance, scene pixels.
const EDGE_TOLERANCE: f64 = 8.0;
const MIN_CROP_SIZE: f64 = 2.0;

// ============================================================================
// EVENTS AND THE TOOL TRAIT
// ============================================================================

/// One pointer event in scene coordinates, with the modifier state the
/// selection tools care about.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
    pub shift: bool,
    pub alt: bool,
    pub double_click: bool,
}

impl PointerEvent {
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, ..Self::default() }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Per-gesture combine-mode override: shift forces add, alt forces
/// subtract, neither defers to the engine's ambient mode.  Shift wins when
/// both are held.
fn gesture_override(event: &PointerEvent) -> Option<SelectionMode> {
    if event.shift {
        Some(SelectionMode::Add)
    } else if event.alt {
        Some(SelectionMode::Subtract)
    } else {
        None
    }
}

pub trait Tool {
    fn on_enter(&mut self, _editor: &mut Editor) {}
    fn on_exit(&mut self, _editor: &mut Editor) {}
    fn on_pointer_down(&mut self, _editor: &mut Editor, _event: &PointerEvent) {}
    fn on_pointer_move(&mut self, _editor: &mut Editor, _event: &PointerEvent) {}
    fn on_pointer_up(&mut self, _editor: &mut Editor, _event: &PointerEvent) {}
    /// Enter / double-action confirmation.
    fn on_confirm(&mut self, _editor: &mut Editor) {}
    /// Escape.  Discards in-progress gesture state, never committed state.
    fn on_cancel(&mut self, _editor: &mut Editor) {}
}

// ============================================================================
// SELECTION TOOL
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionSubTool {
    Rect,
    Ellipse,
    Polygon,
    Lasso,
}

enum Gesture {
    Idle,
    /// Rect/ellipse rubber-band from an anchor corner.
    DragShape { anchor: Point },
    /// Pointer landed inside the committed shape: drag moves the selection.
    DragSelection { last: Point },
    /// Freehand path accumulating while the button is held.
    LassoDraw { points: Vec<Point> },
}

/// The unified selection tool: one gesture machine, four draft shapes.
/// Polygon vertex state survives across clicks until the outline is closed
/// or cancelled; everything else is per-drag.
pub struct SelectionTool {
    subtool: SelectionSubTool,
    gesture: Gesture,
    polygon: Vec<Point>,
}

impl SelectionTool {
    pub fn new(subtool: SelectionSubTool) -> Self {
        Self { subtool, gesture: Gesture::Idle, polygon: Vec::new() }
    }

    pub fn subtool(&self) -> SelectionSubTool {
        self.subtool
    }

    /// Switching sub-tools abandons any in-progress draft.
    pub fn set_subtool(&mut self, editor: &mut Editor, subtool: SelectionSubTool) {
        if self.subtool == subtool {
            return;
        }
        self.subtool = subtool;
        self.gesture = Gesture::Idle;
        self.polygon.clear();
        editor.selection.set_draft(None);
        editor.notify_change();
    }

    fn rect_from(anchor: Point, cursor: Point) -> SelectionShape {
        SelectionShape::Rect {
            x: anchor.x.min(cursor.x),
            y: anchor.y.min(cursor.y),
            width: (cursor.x - anchor.x).abs(),
            height: (cursor.y - anchor.y).abs(),
        }
    }

    fn ellipse_from(anchor: Point, cursor: Point) -> SelectionShape {
        SelectionShape::Ellipse {
            cx: (anchor.x + cursor.x) / 2.0,
            cy: (anchor.y + cursor.y) / 2.0,
            rx: (cursor.x - anchor.x).abs() / 2.0,
            ry: (cursor.y - anchor.y).abs() / 2.0,
        }
    }

    fn drag_shape(&self, anchor: Point, cursor: Point) -> SelectionShape {
        match self.subtool {
            SelectionSubTool::Ellipse => Self::ellipse_from(anchor, cursor),
            _ => Self::rect_from(anchor, cursor),
        }
    }

    /// Too small to be an intentional selection?
    fn below_minimum(shape: &SelectionShape) -> bool {
        match shape {
            SelectionShape::Rect { width, height, .. } => {
                *width < MIN_RECT_SIZE && *height < MIN_RECT_SIZE
            }
            SelectionShape::Ellipse { rx, ry, .. } => {
                *rx < MIN_ELLIPSE_RADIUS && *ry < MIN_ELLIPSE_RADIUS
            }
            _ => false,
        }
    }

    /// Close the polygon outline and commit it.  A single-vertex outline is
    /// discarded; a 2-vertex one commits and is simply zero-area downstream,
    /// like a degenerate lasso.
    fn finalize_polygon(&mut self, editor: &mut Editor, event: &PointerEvent) {
        let points = std::mem::take(&mut self.polygon);
        if points.len() < 2 {
            editor.selection.set_draft(None);
            editor.notify_change();
            return;
        }
        editor.selection.set_draft(Some(SelectionShape::Polygon { points }));
        editor.selection.commit(gesture_override(event));
        editor.notify_change();
    }
}

impl Tool for SelectionTool {
    fn on_pointer_down(&mut self, editor: &mut Editor, event: &PointerEvent) {
        let p = event.point();

        if self.subtool == SelectionSubTool::Polygon {
            if event.double_click {
                self.finalize_polygon(editor, event);
                return;
            }
            self.polygon.push(p);
            editor.selection.set_draft(Some(SelectionShape::Polygon {
                points: self.polygon.clone(),
            }));
            editor.notify_change();
            return;
        }

        // A plain press inside the committed shape drags the selection
        // instead of starting a new draft; modifiers always draft.
        if gesture_override(event).is_none() && editor.selection.is_point_inside(p.x, p.y) {
            self.gesture = Gesture::DragSelection { last: p };
            return;
        }

        match self.subtool {
            SelectionSubTool::Lasso => {
                self.gesture = Gesture::LassoDraw { points: vec![p] };
                editor.selection.set_draft(Some(SelectionShape::Lasso { points: vec![p] }));
            }
            _ => {
                self.gesture = Gesture::DragShape { anchor: p };
                editor.selection.set_draft(Some(self.drag_shape(p, p)));
            }
        }
        editor.notify_change();
    }

    fn on_pointer_move(&mut self, editor: &mut Editor, event: &PointerEvent) {
        let p = event.point();
        match &mut self.gesture {
            Gesture::Idle => {
                // Polygon rubber-band: outline plus the hovering cursor.
                if self.subtool == SelectionSubTool::Polygon && !self.polygon.is_empty() {
                    let mut points = self.polygon.clone();
                    points.push(p);
                    editor.selection.set_draft(Some(SelectionShape::Polygon { points }));
                    editor.notify_change();
                }
            }
            Gesture::DragShape { anchor } => {
                let anchor = *anchor;
                let shape = self.drag_shape(anchor, p);
                editor.selection.set_draft(Some(shape));
                editor.notify_change();
            }
            Gesture::DragSelection { last } => {
                let (dx, dy) = (p.x - last.x, p.y - last.y);
                *last = p;
                editor.selection.translate(dx, dy);
                editor.notify_change();
            }
            Gesture::LassoDraw { points } => {
                points.push(p);
                editor.selection.set_draft(Some(SelectionShape::Lasso {
                    points: points.clone(),
                }));
                editor.notify_change();
            }
        }
    }

    fn on_pointer_up(&mut self, editor: &mut Editor, event: &PointerEvent) {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle | Gesture::DragSelection { .. } => {}
            Gesture::DragShape { anchor } => {
                let shape = self.drag_shape(anchor, event.point());
                if Self::below_minimum(&shape) {
                    editor.selection.set_draft(None);
                } else {
                    editor.selection.set_draft(Some(shape));
                    editor.selection.commit(gesture_override(event));
                }
                editor.notify_change();
            }
            Gesture::LassoDraw { mut points } => {
                points.push(event.point());
                // Even a 2-point path commits; a degenerate result simply
                // rasterizes to nothing.
                editor.selection.set_draft(Some(SelectionShape::Lasso { points }));
                editor.selection.commit(gesture_override(event));
                editor.notify_change();
            }
        }
    }

    fn on_cancel(&mut self, editor: &mut Editor) {
        self.gesture = Gesture::Idle;
        self.polygon.clear();
        editor.selection.set_draft(None);
        editor.notify_change();
    }

    fn on_exit(&mut self, editor: &mut Editor) {
        self.on_cancel(editor);
    }
}

// ============================================================================
// CROP TOOL
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CropDrag {
    Move,
    Left,
    Right,
    Top,
    Bottom,
}

/// Rectangle crop over the active layer.  Edges drag individually; the
/// interior drags the whole rectangle.  Confirming with a live selection
/// extracts the selection to a new layer instead of rectangle-cropping.
pub struct CropTool {
    rect: Option<Bounds>,
    drag: Option<(CropDrag, Point)>,
    /// Keep the source layer and stack the cropped region above it.
    pub to_new_layer: bool,
}

impl CropTool {
    pub fn new(to_new_layer: bool) -> Self {
        Self { rect: None, drag: None, to_new_layer }
    }

    pub fn rect(&self) -> Option<Bounds> {
        self.rect
    }

    fn reset_rect(&mut self, editor: &Editor) {
        self.rect = editor
            .active_layer_transform()
            .map(|t| Bounds::new(t.x, t.y, t.width, t.height))
            .or_else(|| {
                editor
                    .workspace_size()
                    .map(|(w, h)| Bounds::new(0.0, 0.0, w as f64, h as f64))
            });
    }

    fn hit(rect: &Bounds, p: Point) -> Option<CropDrag> {
        let near = |edge: f64, v: f64| (v - edge).abs() <= EDGE_TOLERANCE;
        let in_x = p.x >= rect.x - EDGE_TOLERANCE && p.x <= rect.x + rect.width + EDGE_TOLERANCE;
        let in_y = p.y >= rect.y - EDGE_TOLERANCE && p.y <= rect.y + rect.height + EDGE_TOLERANCE;

        if in_y && near(rect.x, p.x) {
            return Some(CropDrag::Left);
        }
        if in_y && near(rect.x + rect.width, p.x) {
            return Some(CropDrag::Right);
        }
        if in_x && near(rect.y, p.y) {
            return Some(CropDrag::Top);
        }
        if in_x && near(rect.y + rect.height, p.y) {
            return Some(CropDrag::Bottom);
        }
        if p.x > rect.x && p.x < rect.x + rect.width && p.y > rect.y && p.y < rect.y + rect.height {
            return Some(CropDrag::Move);
        }
        None
    }
}

impl Tool for CropTool {
    fn on_enter(&mut self, editor: &mut Editor) {
        self.reset_rect(editor);
        self.drag = None;
    }

    fn on_pointer_down(&mut self, _editor: &mut Editor, event: &PointerEvent) {
        let Some(rect) = &self.rect else { return };
        if let Some(kind) = Self::hit(rect, event.point()) {
            self.drag = Some((kind, event.point()));
        }
    }

    fn on_pointer_move(&mut self, _editor: &mut Editor, event: &PointerEvent) {
        let Some((kind, last)) = &mut self.drag else { return };
        let Some(rect) = &mut self.rect else { return };
        let p = event.point();
        let (dx, dy) = (p.x - last.x, p.y - last.y);
        *last = p;

        match kind {
            CropDrag::Move => {
                rect.x += dx;
                rect.y += dy;
            }
            CropDrag::Left => {
                let new_x = (rect.x + dx).min(rect.x + rect.width - MIN_CROP_SIZE);
                rect.width += rect.x - new_x;
                rect.x = new_x;
            }
            CropDrag::Right => {
                rect.width = (rect.width + dx).max(MIN_CROP_SIZE);
            }
            CropDrag::Top => {
                let new_y = (rect.y + dy).min(rect.y + rect.height - MIN_CROP_SIZE);
                rect.height += rect.y - new_y;
                rect.y = new_y;
            }
            CropDrag::Bottom => {
                rect.height = (rect.height + dy).max(MIN_CROP_SIZE);
            }
        }
    }

    fn on_pointer_up(&mut self, _editor: &mut Editor, _event: &PointerEvent) {
        self.drag = None;
    }

    fn on_confirm(&mut self, editor: &mut Editor) {
        if editor.selection.has_selection() {
            editor.extract_selection_to_layer();
            editor.selection.clear();
            return;
        }
        if let Some(rect) = self.rect {
            editor.crop_active_layer(rect, self.to_new_layer);
            self.reset_rect(editor);
        }
    }

    fn on_cancel(&mut self, editor: &mut Editor) {
        self.reset_rect(editor);
        self.drag = None;
    }
}

// ============================================================================
// MOVE TOOL
// ============================================================================

/// Drags the active layer.  The position patch is applied once, on pointer
/// up, so a whole drag costs exactly one history entry.
pub struct MoveTool {
    drag: Option<MoveDrag>,
}

struct MoveDrag {
    start_pointer: Point,
    start_x: f64,
    start_y: f64,
    current: Point,
}

impl MoveTool {
    pub fn new() -> Self {
        Self { drag: None }
    }

    /// Live position during a drag, for preview rendering.
    pub fn preview_position(&self) -> Option<(f64, f64)> {
        self.drag.as_ref().map(|d| {
            (
                d.start_x + (d.current.x - d.start_pointer.x),
                d.start_y + (d.current.y - d.start_pointer.y),
            )
        })
    }
}

impl Default for MoveTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for MoveTool {
    fn on_pointer_down(&mut self, editor: &mut Editor, event: &PointerEvent) {
        let Some(transform) = editor.active_layer_transform() else { return };
        self.drag = Some(MoveDrag {
            start_pointer: event.point(),
            start_x: transform.x,
            start_y: transform.y,
            current: event.point(),
        });
    }

    fn on_pointer_move(&mut self, _editor: &mut Editor, event: &PointerEvent) {
        if let Some(drag) = &mut self.drag {
            drag.current = event.point();
        }
    }

    fn on_pointer_up(&mut self, editor: &mut Editor, event: &PointerEvent) {
        let Some(mut drag) = self.drag.take() else { return };
        drag.current = event.point();
        let dx = drag.current.x - drag.start_pointer.x;
        let dy = drag.current.y - drag.start_pointer.y;
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        editor.set_active_layer_transform(TransformPatch {
            x: Some(drag.start_x + dx),
            y: Some(drag.start_y + dy),
            ..Default::default()
        });
    }

    fn on_cancel(&mut self, _editor: &mut Editor) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;
    use image::{Rgba, RgbaImage};

    fn editor_with_layer() -> Editor {
        let mut ed = Editor::new();
        ed.add_layer(
            SceneNode::new(RgbaImage::from_pixel(200, 200, Rgba([50, 50, 50, 255]))),
            Some("base".into()),
            None,
        );
        ed
    }

    fn drag(tool: &mut SelectionTool, ed: &mut Editor, from: (f64, f64), to: (f64, f64)) {
        tool.on_pointer_down(ed, &PointerEvent::at(from.0, from.1));
        tool.on_pointer_move(ed, &PointerEvent::at(to.0, to.1));
        tool.on_pointer_up(ed, &PointerEvent::at(to.0, to.1));
    }

    #[test]
    fn rect_drag_commits_normalized_rect() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        // Drag up-left: anchor below/right of the release point.
        drag(&mut tool, &mut ed, (80.0, 90.0), (20.0, 30.0));
        assert_eq!(
            ed.selection.shape(),
            Some(&SelectionShape::Rect { x: 20.0, y: 30.0, width: 60.0, height: 60.0 })
        );
        assert!(ed.selection.draft().is_none());
    }

    #[test]
    fn tiny_rect_drag_is_rejected() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut tool, &mut ed, (10.0, 10.0), (11.0, 11.0));
        assert!(!ed.selection.has_selection());
        assert!(ed.selection.draft().is_none());
    }

    #[test]
    fn tiny_ellipse_drag_is_rejected() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Ellipse);
        drag(&mut tool, &mut ed, (10.0, 10.0), (11.5, 11.5));
        assert!(!ed.selection.has_selection());
    }

    #[test]
    fn shift_drag_adds_without_touching_ambient_mode() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut tool, &mut ed, (0.0, 0.0), (40.0, 40.0));

        let shifted = PointerEvent { shift: true, ..PointerEvent::at(100.0, 100.0) };
        tool.on_pointer_down(&mut ed, &PointerEvent { shift: true, ..PointerEvent::at(60.0, 60.0) });
        tool.on_pointer_move(&mut ed, &shifted);
        tool.on_pointer_up(&mut ed, &shifted);

        let bounds = ed.selection.bounds().unwrap();
        assert_eq!((bounds.width, bounds.height), (100.0, 100.0));
        assert_eq!(ed.selection.mode(), SelectionMode::Replace);
    }

    #[test]
    fn alt_drag_subtracts() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut tool, &mut ed, (0.0, 0.0), (100.0, 100.0));

        let alt = |x, y| PointerEvent { alt: true, ..PointerEvent::at(x, y) };
        tool.on_pointer_down(&mut ed, &alt(40.0, 40.0));
        tool.on_pointer_move(&mut ed, &alt(60.0, 60.0));
        tool.on_pointer_up(&mut ed, &alt(60.0, 60.0));

        assert!(!ed.selection.is_point_inside(50.0, 50.0));
        assert!(ed.selection.is_point_inside(10.0, 10.0));
    }

    #[test]
    fn plain_drag_inside_selection_translates_it() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut tool, &mut ed, (10.0, 10.0), (50.0, 50.0));

        tool.on_pointer_down(&mut ed, &PointerEvent::at(30.0, 30.0));
        tool.on_pointer_move(&mut ed, &PointerEvent::at(55.0, 40.0));
        tool.on_pointer_up(&mut ed, &PointerEvent::at(55.0, 40.0));

        let bounds = ed.selection.bounds().unwrap();
        assert_eq!((bounds.x, bounds.y), (35.0, 20.0));
        assert_eq!((bounds.width, bounds.height), (40.0, 40.0));
    }

    #[test]
    fn polygon_closes_on_double_click() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Polygon);
        for (x, y) in [(10.0, 10.0), (90.0, 10.0), (50.0, 80.0)] {
            tool.on_pointer_down(&mut ed, &PointerEvent::at(x, y));
            tool.on_pointer_up(&mut ed, &PointerEvent::at(x, y));
        }
        assert!(ed.selection.draft().is_some(), "outline drafts while open");
        assert!(!ed.selection.has_selection());

        tool.on_pointer_down(
            &mut ed,
            &PointerEvent { double_click: true, ..PointerEvent::at(50.0, 80.0) },
        );
        assert!(ed.selection.has_selection());
        assert!(ed.selection.is_point_inside(50.0, 30.0));
    }

    #[test]
    fn single_point_polygon_discards_on_double_click() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Polygon);
        tool.on_pointer_down(&mut ed, &PointerEvent::at(10.0, 10.0));
        tool.on_pointer_down(
            &mut ed,
            &PointerEvent { double_click: true, ..PointerEvent::at(10.0, 10.0) },
        );
        assert!(!ed.selection.has_selection());
        assert!(ed.selection.draft().is_none());
    }

    #[test]
    fn two_point_polygon_commits_as_zero_area() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Polygon);
        tool.on_pointer_down(&mut ed, &PointerEvent::at(10.0, 10.0));
        tool.on_pointer_down(&mut ed, &PointerEvent::at(60.0, 10.0));
        tool.on_pointer_down(
            &mut ed,
            &PointerEvent { double_click: true, ..PointerEvent::at(60.0, 10.0) },
        );
        assert!(ed.selection.has_selection());
        assert!(!ed.selection.is_point_inside(35.0, 10.0));
    }

    #[test]
    fn lasso_commits_freehand_path() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Lasso);
        tool.on_pointer_down(&mut ed, &PointerEvent::at(10.0, 10.0));
        for (x, y) in [(80.0, 10.0), (80.0, 80.0), (10.0, 80.0)] {
            tool.on_pointer_move(&mut ed, &PointerEvent::at(x, y));
        }
        tool.on_pointer_up(&mut ed, &PointerEvent::at(10.0, 80.0));

        assert!(ed.selection.has_selection());
        assert!(ed.selection.is_point_inside(45.0, 45.0));
    }

    #[test]
    fn subtool_switch_clears_draft_but_keeps_committed_shape() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut tool, &mut ed, (0.0, 0.0), (30.0, 30.0));

        // Open polygon outline, then switch away.
        tool.set_subtool(&mut ed, SelectionSubTool::Polygon);
        tool.on_pointer_down(&mut ed, &PointerEvent::at(50.0, 50.0));
        assert!(ed.selection.draft().is_some());
        tool.set_subtool(&mut ed, SelectionSubTool::Lasso);
        assert!(ed.selection.draft().is_none());
        assert!(ed.selection.has_selection());
    }

    #[test]
    fn cancel_discards_open_polygon() {
        let mut ed = editor_with_layer();
        let mut tool = SelectionTool::new(SelectionSubTool::Polygon);
        tool.on_pointer_down(&mut ed, &PointerEvent::at(10.0, 10.0));
        tool.on_pointer_down(&mut ed, &PointerEvent::at(50.0, 10.0));
        tool.on_cancel(&mut ed);
        assert!(ed.selection.draft().is_none());

        // A later double-click must not resurrect the discarded vertices.
        tool.on_pointer_down(
            &mut ed,
            &PointerEvent { double_click: true, ..PointerEvent::at(30.0, 30.0) },
        );
        assert!(!ed.selection.has_selection());
    }

    #[test]
    fn crop_tool_seeds_rect_from_active_layer() {
        let mut ed = editor_with_layer();
        let mut tool = CropTool::new(false);
        tool.on_enter(&mut ed);
        assert_eq!(tool.rect(), Some(Bounds::new(0.0, 0.0, 200.0, 200.0)));
    }

    #[test]
    fn crop_edge_drag_respects_minimum_size() {
        let mut ed = editor_with_layer();
        let mut tool = CropTool::new(false);
        tool.on_enter(&mut ed);

        // Grab the right edge and shove it far past the left edge.
        tool.on_pointer_down(&mut ed, &PointerEvent::at(200.0, 100.0));
        tool.on_pointer_move(&mut ed, &PointerEvent::at(-500.0, 100.0));
        tool.on_pointer_up(&mut ed, &PointerEvent::at(-500.0, 100.0));

        let rect = tool.rect().unwrap();
        assert_eq!(rect.width, MIN_CROP_SIZE);
        assert_eq!(rect.height, 200.0);
    }

    #[test]
    fn crop_confirm_replace_shrinks_active_layer() {
        let mut ed = editor_with_layer();
        let mut tool = CropTool::new(false);
        tool.on_enter(&mut ed);

        tool.on_pointer_down(&mut ed, &PointerEvent::at(200.0, 100.0));
        tool.on_pointer_move(&mut ed, &PointerEvent::at(100.0, 100.0));
        tool.on_pointer_up(&mut ed, &PointerEvent::at(100.0, 100.0));
        tool.on_confirm(&mut ed);

        let t = ed.active_layer_transform().unwrap();
        assert_eq!((t.width, t.height), (100.0, 200.0));
        assert_eq!(ed.layers.len(), 1);
    }

    #[test]
    fn crop_confirm_with_selection_extracts_layer() {
        let mut ed = editor_with_layer();
        let mut sel = SelectionTool::new(SelectionSubTool::Rect);
        drag(&mut sel, &mut ed, (20.0, 20.0), (60.0, 60.0));

        let mut tool = CropTool::new(true);
        tool.on_enter(&mut ed);
        tool.on_confirm(&mut ed);

        assert_eq!(ed.layers.len(), 2);
        assert_eq!(ed.layers.layers()[1].name, "base crop");
        assert!(!ed.selection.has_selection());
    }

    #[test]
    fn move_tool_applies_one_history_entry_per_drag() {
        let mut ed = editor_with_layer();
        let mut tool = MoveTool::new();
        let before = ed.history_len();

        tool.on_pointer_down(&mut ed, &PointerEvent::at(10.0, 10.0));
        tool.on_pointer_move(&mut ed, &PointerEvent::at(40.0, 25.0));
        assert_eq!(tool.preview_position(), Some((30.0, 15.0)));
        tool.on_pointer_up(&mut ed, &PointerEvent::at(40.0, 25.0));

        let t = ed.active_layer_transform().unwrap();
        assert_eq!((t.x, t.y), (30.0, 15.0));
        assert_eq!(ed.history_len(), before + 1);

        ed.undo();
        let t = ed.active_layer_transform().unwrap();
        assert_eq!((t.x, t.y), (0.0, 0.0));
    }

    #[test]
    fn move_tool_without_layer_is_inert() {
        let mut ed = Editor::new();
        let mut tool = MoveTool::new();
        tool.on_pointer_down(&mut ed, &PointerEvent::at(5.0, 5.0));
        tool.on_pointer_up(&mut ed, &PointerEvent::at(50.0, 50.0));
        assert!(ed.active_layer_transform().is_none());
    }
}
