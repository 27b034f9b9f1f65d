//! Geometry kernel — converts selection shapes to multi-polygons-with-holes
//! and computes their Boolean combinations.
//!
//! Clipping itself is delegated to `geo`'s `BooleanOps` (robust float
//! Martinez-style clipping over multi-polygon inputs with holes).  Even-odd
//! logic lives only in the point-containment helpers used for hit testing
//! and compound fill rules.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon as GeoPolygon};
use serde::{Deserialize, Serialize};

use crate::selection::{SelectionMode, SelectionShape};

/// Number of segments used to approximate an ellipse as a closed ring.
pub const ELLIPSE_SEGMENTS: usize = 64;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// A point in scene or layer-local coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A closed or open sequence of vertices.  Rings are force-closed before any
/// geometry is derived from them.
pub type Ring = Vec<Point>;

/// A polygon-with-holes: ring 0 is the outer boundary, the rest are holes.
pub type PolygonRings = Vec<Ring>;

/// Axis-aligned bounding rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Zero-area bounds cannot host a selection.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Tight bounds of a vertex sequence; `None` when the slice is empty.
pub fn points_bounds(points: &[Point]) -> Option<Bounds> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Append the first vertex when the ring is not already closed.
pub fn close_ring(points: &[Point]) -> Ring {
    let mut ring: Ring = points.to_vec();
    if let (Some(&first), Some(&last)) = (ring.first(), ring.last())
        && (first.x != last.x || first.y != last.y)
    {
        ring.push(first);
    }
    ring
}

/// Shoelace area of a closed ring (absolute value).
pub fn ring_area(ring: &[Point]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area.abs() / 2.0
}

/// Even-odd (ray casting) point-in-ring test.  Rings with fewer than three
/// vertices are zero-area and contain nothing.
pub fn point_in_ring(x: f64, y: f64, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].x, ring[i].y);
        let (xj, yj) = (ring[j].x, ring[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi + f64::EPSILON) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Signed winding number of a ring around a point.  Doubly-wound regions of
/// a self-intersecting path count twice instead of cancelling out.
pub fn winding_number(x: f64, y: f64, ring: &[Point]) -> i32 {
    if ring.len() < 3 {
        return 0;
    }
    // Which side of edge a→b the point falls on.
    let side = |a: Point, b: Point| (b.x - a.x) * (y - a.y) - (x - a.x) * (b.y - a.y);
    let mut wn = 0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[j], ring[i]);
        if a.y <= y {
            if b.y > y && side(a, b) > 0.0 {
                wn += 1;
            }
        } else if b.y <= y && side(a, b) < 0.0 {
            wn -= 1;
        }
        j = i;
    }
    wn
}

/// Nonzero-rule point-in-ring test, the fill rule single shapes rasterize
/// under.
pub fn point_in_ring_nonzero(x: f64, y: f64, ring: &[Point]) -> bool {
    winding_number(x, y, ring) != 0
}

// ============================================================================
// SHAPE → MULTI-POLYGON
// ============================================================================

/// A ring is only clippable when it still encloses area after closing.
/// Degenerate rings (a 2-point lasso, a repeated click, collinear vertices)
/// are dropped here so downstream Boolean ops see them as empty, never as
/// input that could trip the clipper.
fn ring_to_line_string(points: &[Point]) -> Option<LineString<f64>> {
    let ring = close_ring(points);
    if ring.len() < 4 || ring_area(&ring) <= f64::EPSILON {
        return None;
    }
    Some(LineString::from(
        ring.iter().map(|p| Coord::from((p.x, p.y))).collect::<Vec<_>>(),
    ))
}

fn rect_ring(x: f64, y: f64, width: f64, height: f64) -> Ring {
    vec![
        Point::new(x, y),
        Point::new(x + width, y),
        Point::new(x + width, y + height),
        Point::new(x, y + height),
        Point::new(x, y),
    ]
}

/// 64-segment closed approximation of an ellipse.
pub fn ellipse_ring(cx: f64, cy: f64, rx: f64, ry: f64) -> Ring {
    let mut ring = Vec::with_capacity(ELLIPSE_SEGMENTS + 2);
    for i in 0..=ELLIPSE_SEGMENTS {
        let t = (i as f64 / ELLIPSE_SEGMENTS as f64) * std::f64::consts::TAU;
        ring.push(Point::new(cx + t.cos() * rx, cy + t.sin() * ry));
    }
    ring.push(ring[0]);
    ring
}

/// Convert any selection shape to a normalized multi-polygon.  Degenerate
/// shapes yield an empty multi-polygon, not an error.
pub fn to_multi_polygon(shape: &SelectionShape) -> MultiPolygon<f64> {
    let polygons = match shape {
        SelectionShape::Rect { x, y, width, height } => {
            single_ring_polygon(&rect_ring(*x, *y, *width, *height))
        }
        SelectionShape::Ellipse { cx, cy, rx, ry } => {
            single_ring_polygon(&ellipse_ring(*cx, *cy, *rx, *ry))
        }
        SelectionShape::Polygon { points } | SelectionShape::Lasso { points } => {
            single_ring_polygon(points)
        }
        SelectionShape::Compound { polygons } => polygons
            .iter()
            .filter_map(|rings| {
                let mut it = rings.iter();
                let exterior = ring_to_line_string(it.next()?)?;
                let holes = it.filter_map(|r| ring_to_line_string(r)).collect();
                Some(GeoPolygon::new(exterior, holes))
            })
            .collect(),
    };
    MultiPolygon::new(polygons)
}

fn single_ring_polygon(points: &[Point]) -> Vec<GeoPolygon<f64>> {
    match ring_to_line_string(points) {
        Some(ls) => vec![GeoPolygon::new(ls, vec![])],
        None => vec![],
    }
}

// ============================================================================
// MULTI-POLYGON → SHAPE
// ============================================================================

/// Collapse a multi-polygon back into a selection shape.  A single polygon
/// with a single ring becomes `Polygon`; anything with holes or multiple
/// disjoint pieces becomes `Compound`.  An empty multi-polygon is `None`.
pub fn from_multi_polygon(multi: &MultiPolygon<f64>) -> Option<SelectionShape> {
    let polygons: Vec<PolygonRings> = multi
        .0
        .iter()
        .map(|poly| {
            let mut rings: PolygonRings = Vec::with_capacity(1 + poly.interiors().len());
            rings.push(line_string_points(poly.exterior()));
            for hole in poly.interiors() {
                rings.push(line_string_points(hole));
            }
            rings
        })
        .filter(|rings| rings.iter().any(|r| !r.is_empty()))
        .collect();

    match polygons.len() {
        0 => None,
        1 if polygons[0].len() == 1 => polygons
            .into_iter()
            .next()
            .and_then(|rings| rings.into_iter().next())
            .map(|points| SelectionShape::Polygon { points }),
        _ => Some(SelectionShape::Compound { polygons }),
    }
}

fn line_string_points(ls: &LineString<f64>) -> Ring {
    ls.coords().map(|c| Point::new(c.x, c.y)).collect()
}

// ============================================================================
// BOOLEAN COMBINATION
// ============================================================================

/// Combine two shapes under the given mode.  `Replace` never invokes the
/// clipper; `Add`/`Subtract` run a polygon union/difference.  `None` means
/// the result is empty (selection cleared).
pub fn combine(
    a: &SelectionShape,
    b: &SelectionShape,
    mode: SelectionMode,
) -> Option<SelectionShape> {
    if mode == SelectionMode::Replace {
        return Some(b.clone());
    }

    let pa = to_multi_polygon(a);
    let pb = to_multi_polygon(b);

    let result = match mode {
        SelectionMode::Add => pa.union(&pb),
        SelectionMode::Subtract => pa.difference(&pb),
        SelectionMode::Replace => unreachable!(),
    };

    if result.0.is_empty() {
        return None;
    }
    from_multi_polygon(&result)
}
