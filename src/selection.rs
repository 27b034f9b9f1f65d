//! Selection system — the shape sum type and the engine that owns the
//! committed shape, the in-progress draft, and the ambient combine mode.

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Bounds, Point, PolygonRings};

// ============================================================================
// SHAPES
// ============================================================================

/// How a committed draft interacts with the existing selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Drop any existing selection, then set the new shape.
    #[default]
    Replace,
    /// Union — add to the existing selection.
    Add,
    /// Difference — subtract from the existing selection.
    Subtract,
}

/// A geometric selection.  `Lasso` behaves exactly like `Polygon`; the tag
/// records which tool drew it.  `Compound` is produced only by Boolean
/// combination, never directly by a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectionShape {
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
    Polygon { points: Vec<Point> },
    Lasso { points: Vec<Point> },
    Compound { polygons: Vec<PolygonRings> },
}

impl SelectionShape {
    /// Axis-aligned bounds.  `None` for shapes with no vertices at all.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            SelectionShape::Rect { x, y, width, height } => {
                Some(Bounds::new(*x, *y, *width, *height))
            }
            SelectionShape::Ellipse { cx, cy, rx, ry } => {
                Some(Bounds::new(cx - rx, cy - ry, rx * 2.0, ry * 2.0))
            }
            SelectionShape::Polygon { points } | SelectionShape::Lasso { points } => {
                geometry::points_bounds(points)
            }
            SelectionShape::Compound { polygons } => {
                let all: Vec<Point> =
                    polygons.iter().flatten().flatten().copied().collect();
                geometry::points_bounds(&all)
            }
        }
    }

    /// Point-in-shape test.  Single shapes use their natural containment;
    /// `Compound` uses even-odd across all rings, matching the mask
    /// renderer's compound fill rule so hit testing and rasterization agree.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            SelectionShape::Rect { x: rx, y: ry, width, height } => {
                x >= *rx && x <= rx + width && y >= *ry && y <= ry + height
            }
            SelectionShape::Ellipse { cx, cy, rx, ry } => {
                if *rx <= 0.0 || *ry <= 0.0 {
                    return false;
                }
                let nx = (x - cx) / rx;
                let ny = (y - cy) / ry;
                nx * nx + ny * ny <= 1.0
            }
            SelectionShape::Polygon { points } | SelectionShape::Lasso { points } => {
                geometry::point_in_ring(x, y, points)
            }
            SelectionShape::Compound { polygons } => {
                let mut inside = false;
                for rings in polygons {
                    for ring in rings {
                        if geometry::point_in_ring(x, y, ring) {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }

    /// Rigid shift of every coordinate.
    pub fn translated(&self, dx: f64, dy: f64) -> SelectionShape {
        let shift = |p: &Point| Point::new(p.x + dx, p.y + dy);
        match self {
            SelectionShape::Rect { x, y, width, height } => SelectionShape::Rect {
                x: x + dx,
                y: y + dy,
                width: *width,
                height: *height,
            },
            SelectionShape::Ellipse { cx, cy, rx, ry } => SelectionShape::Ellipse {
                cx: cx + dx,
                cy: cy + dy,
                rx: *rx,
                ry: *ry,
            },
            SelectionShape::Polygon { points } => SelectionShape::Polygon {
                points: points.iter().map(shift).collect(),
            },
            SelectionShape::Lasso { points } => SelectionShape::Lasso {
                points: points.iter().map(shift).collect(),
            },
            SelectionShape::Compound { polygons } => SelectionShape::Compound {
                polygons: polygons
                    .iter()
                    .map(|rings| rings.iter().map(|r| r.iter().map(shift).collect()).collect())
                    .collect(),
            },
        }
    }
}

// ============================================================================
// SELECTION ENGINE
// ============================================================================

/// Owns the committed shape, the in-progress draft, and the ambient mode.
/// No side effects: history and change notification are the orchestrator's
/// business, never this engine's.
#[derive(Default)]
pub struct SelectionEngine {
    shape: Option<SelectionShape>,
    draft: Option<SelectionShape>,
    mode: SelectionMode,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_selection(&self) -> bool {
        self.shape.is_some()
    }

    pub fn shape(&self) -> Option<&SelectionShape> {
        self.shape.as_ref()
    }

    pub fn draft(&self) -> Option<&SelectionShape> {
        self.draft.as_ref()
    }

    pub fn set_draft(&mut self, shape: Option<SelectionShape>) {
        self.draft = shape;
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    /// Drop everything, draft included.
    pub fn clear(&mut self) {
        self.shape = None;
        self.draft = None;
    }

    /// Drop the committed shape but keep any in-progress draft.
    pub fn clear_shape(&mut self) {
        self.shape = None;
    }

    /// Commit the draft against the existing shape.
    ///
    /// `override_mode` is the per-gesture modifier override (shift=add,
    /// alt=subtract); it applies to this commit only and leaves the ambient
    /// mode untouched.  With no existing shape, or under `Replace`, the
    /// draft becomes the shape verbatim and the clipper is never invoked.
    /// A Boolean result that comes back empty clears the selection.
    pub fn commit(&mut self, override_mode: Option<SelectionMode>) {
        let Some(draft) = self.draft.take() else {
            return;
        };
        let effective = override_mode.unwrap_or(self.mode);

        match &self.shape {
            None => self.shape = Some(draft),
            Some(_) if effective == SelectionMode::Replace => self.shape = Some(draft),
            Some(existing) => {
                self.shape = geometry::combine(existing, &draft, effective);
            }
        }
    }

    /// Invert the committed shape against a bounding rectangle: the new
    /// selection is `bounds − shape`.  No-op without a shape or with
    /// degenerate bounds.  Resets the ambient mode to `Replace`.
    pub fn invert(&mut self, bounds: Bounds) {
        let Some(shape) = &self.shape else { return };
        if bounds.is_degenerate() {
            return;
        }

        let full = SelectionShape::Rect {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        };
        self.shape = geometry::combine(&full, shape, SelectionMode::Subtract);
        self.draft = None;
        self.mode = SelectionMode::Replace;
    }

    /// Bounds of the committed shape.
    pub fn bounds(&self) -> Option<Bounds> {
        self.shape.as_ref().and_then(|s| s.bounds())
    }

    /// Hit test against the committed shape, used to decide whether a
    /// pointer-down drags the existing selection instead of drafting a new
    /// one.
    pub fn is_point_inside(&self, x: f64, y: f64) -> bool {
        self.shape.as_ref().is_some_and(|s| s.contains(x, y))
    }

    /// Rigid shift of the committed shape only (drag-to-move).
    pub fn translate(&mut self, dx: f64, dy: f64) {
        if let Some(shape) = &self.shape {
            self.shape = Some(shape.translated(dx, dy));
        }
    }
}
