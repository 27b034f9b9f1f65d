//! Mask renderer — rasterizes a selection shape (already in a layer's local
//! pixel space) against that layer's bitmap.
//!
//! Single shapes fill under the nonzero winding rule; `Compound` fills
//! even-odd across all rings, agreeing with the compound hit test.  Both
//! operations are pure functions of (shape, source); nothing here touches
//! shared state, so callers may run them for different layers concurrently.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::{Bounds, Point, close_ring, point_in_ring_nonzero};
use crate::selection::SelectionShape;

/// Integer-pixel bounding rect for canvas allocation.  Width/height round to
/// the nearest pixel and clamp at zero.
pub fn bounding_rect(shape: &SelectionShape) -> Bounds {
    shape.bounds().unwrap_or_default()
}

fn rounded_size(bounds: &Bounds) -> (u32, u32) {
    let w = bounds.width.round().max(0.0) as u32;
    let h = bounds.height.round().max(0.0) as u32;
    (w, h)
}

/// Pixel-center containment under the shape's fill rule.  For
/// `Polygon`/`Lasso` the ring is force-closed and tested by winding number,
/// so a self-intersecting freehand path keeps its doubly-wound interior; a
/// degenerate ring contains nothing.
fn covers(shape: &SelectionShape, x: f64, y: f64) -> bool {
    match shape {
        SelectionShape::Polygon { points } | SelectionShape::Lasso { points } => {
            point_in_ring_nonzero(x, y, &close_ring(points))
        }
        // Rect/Ellipse analytic containment and compound even-odd both live
        // on the shape itself.
        _ => shape.contains(x, y),
    }
}

/// Extract the selected pixels into a tightly cropped bitmap: allocate at
/// `bounding_rect` size, translate the origin by `(-x, -y)`, and copy the
/// source through the shape.  Everything outside the shape is transparent.
pub fn render_mask(shape: &SelectionShape, source: &RgbaImage) -> RgbaImage {
    let bounds = bounding_rect(shape);
    let (w, h) = rounded_size(&bounds);
    if w == 0 || h == 0 {
        return RgbaImage::new(w, h);
    }

    let src_w = source.width() as i64;
    let src_h = source.height() as i64;
    let ox = bounds.x.floor() as i64;
    let oy = bounds.y.floor() as i64;

    let mut buf = vec![0u8; (w as usize) * (h as usize) * 4];
    buf.par_chunks_exact_mut(w as usize * 4)
        .enumerate()
        .for_each(|(my, row)| {
            let sy = oy + my as i64;
            for mx in 0..w as i64 {
                let sx = ox + mx;
                if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                    continue;
                }
                let cx = bounds.x + mx as f64 + 0.5;
                let cy = bounds.y + my as f64 + 0.5;
                if covers(shape, cx, cy) {
                    let px = source.get_pixel(sx as u32, sy as u32).0;
                    let at = mx as usize * 4;
                    row[at..at + 4].copy_from_slice(&px);
                }
            }
        });

    // Allocation cannot fail here: buf length is exactly w*h*4.
    RgbaImage::from_raw(w, h, buf).unwrap_or_else(|| RgbaImage::new(w, h))
}

/// Produce the source with the selected region knocked out (destination-out):
/// same dimensions as the source, selected pixels fully transparent.
pub fn erase_mask(shape: &SelectionShape, source: &RgbaImage) -> RgbaImage {
    let (w, h) = (source.width(), source.height());
    let mut out = source.clone();
    if w == 0 || h == 0 {
        return out;
    }

    out.par_chunks_exact_mut(w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let cy = y as f64 + 0.5;
            for x in 0..w as usize {
                let cx = x as f64 + 0.5;
                if covers(shape, cx, cy) {
                    let at = x * 4;
                    row[at..at + 4].copy_from_slice(&[0, 0, 0, 0]);
                }
            }
        });

    out
}

/// Map a scene-space selection into a layer's local (unscaled) pixel space:
/// `local = (scene − top_left) / scale` per axis.  Rotation is intentionally
/// not inverted here — selection-driven pixel operations are refused on
/// rotated layers upstream.
pub fn to_local_space(
    shape: &SelectionShape,
    left: f64,
    top: f64,
    scale_x: f64,
    scale_y: f64,
) -> SelectionShape {
    let norm = |p: &Point| Point::new((p.x - left) / scale_x, (p.y - top) / scale_y);
    match shape {
        SelectionShape::Rect { x, y, width, height } => SelectionShape::Rect {
            x: (x - left) / scale_x,
            y: (y - top) / scale_y,
            width: width / scale_x,
            height: height / scale_y,
        },
        SelectionShape::Ellipse { cx, cy, rx, ry } => SelectionShape::Ellipse {
            cx: (cx - left) / scale_x,
            cy: (cy - top) / scale_y,
            rx: rx / scale_x,
            ry: ry / scale_y,
        },
        SelectionShape::Polygon { points } => SelectionShape::Polygon {
            points: points.iter().map(norm).collect(),
        },
        SelectionShape::Lasso { points } => SelectionShape::Lasso {
            points: points.iter().map(norm).collect(),
        },
        SelectionShape::Compound { polygons } => SelectionShape::Compound {
            polygons: polygons
                .iter()
                .map(|rings| rings.iter().map(|r| r.iter().map(norm).collect()).collect())
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;
    use crate::selection::SelectionMode;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn render_mask_dimensions_match_rounded_bounds() {
        let src = solid(200, 200, [10, 20, 30, 255]);
        let shape = SelectionShape::Ellipse { cx: 50.0, cy: 50.0, rx: 10.4, ry: 7.6 };
        let mask = render_mask(&shape, &src);
        let b = bounding_rect(&shape);
        assert_eq!(mask.width(), b.width.round() as u32);
        assert_eq!(mask.height(), b.height.round() as u32);
    }

    #[test]
    fn render_mask_copies_inside_and_clears_outside() {
        let src = solid(100, 100, [200, 0, 0, 255]);
        let shape = SelectionShape::Ellipse { cx: 50.0, cy: 50.0, rx: 20.0, ry: 20.0 };
        let mask = render_mask(&shape, &src);
        assert_eq!(mask.get_pixel(20, 20).0, [200, 0, 0, 255]); // center
        assert_eq!(mask.get_pixel(0, 0).0, [0, 0, 0, 0]); // corner, outside ellipse
    }

    #[test]
    fn erase_mask_keeps_source_dimensions() {
        let src = solid(64, 48, [0, 0, 255, 255]);
        let shape = SelectionShape::Rect { x: 10.0, y: 10.0, width: 20.0, height: 20.0 };
        let erased = erase_mask(&shape, &src);
        assert_eq!((erased.width(), erased.height()), (64, 48));
        assert_eq!(erased.get_pixel(15, 15).0, [0, 0, 0, 0]);
        assert_eq!(erased.get_pixel(5, 5).0, [0, 0, 255, 255]);
    }

    #[test]
    fn compound_hole_is_not_rendered() {
        let outer = SelectionShape::Rect { x: 0.0, y: 0.0, width: 60.0, height: 60.0 };
        let inner = SelectionShape::Rect { x: 20.0, y: 20.0, width: 20.0, height: 20.0 };
        let ringed = geometry::combine(&outer, &inner, SelectionMode::Subtract).unwrap();

        let src = solid(60, 60, [1, 2, 3, 255]);
        let mask = render_mask(&ringed, &src);
        assert_eq!(mask.get_pixel(5, 5).0, [1, 2, 3, 255]); // band
        assert_eq!(mask.get_pixel(30, 30).0, [0, 0, 0, 0]); // hole

        let erased = erase_mask(&ringed, &src);
        assert_eq!(erased.get_pixel(5, 5).0, [0, 0, 0, 0]); // band knocked out
        assert_eq!(erased.get_pixel(30, 30).0, [1, 2, 3, 255]); // hole untouched
    }

    #[test]
    fn self_intersecting_lasso_keeps_core_under_nonzero_fill() {
        let src = solid(100, 100, [9, 9, 9, 255]);
        let points: Vec<Point> = [0, 2, 4, 1, 3]
            .iter()
            .map(|&k| {
                let t = -std::f64::consts::FRAC_PI_2 + k as f64 * std::f64::consts::TAU / 5.0;
                Point::new(50.0 + 40.0 * t.cos(), 50.0 + 40.0 * t.sin())
            })
            .collect();
        let star = SelectionShape::Lasso { points };

        // The pentagram core is wound twice; nonzero keeps it selected.
        let erased = erase_mask(&star, &src);
        assert_eq!(erased.get_pixel(50, 50).0, [0, 0, 0, 0]);
        assert_eq!(erased.get_pixel(2, 2).0, [9, 9, 9, 255]);

        let mask = render_mask(&star, &src);
        let b = bounding_rect(&star);
        let (cx, cy) = ((50.0 - b.x) as u32, (50.0 - b.y) as u32);
        assert_eq!(mask.get_pixel(cx, cy).0, [9, 9, 9, 255]);
    }

    #[test]
    fn degenerate_lasso_yields_empty_mask_without_panicking() {
        let src = solid(32, 32, [9, 9, 9, 255]);
        let lasso = SelectionShape::Lasso {
            points: vec![Point::new(0.0, 0.0), Point::new(30.0, 30.0)],
        };
        let mask = render_mask(&lasso, &src);
        assert!(mask.pixels().all(|p| p.0[3] == 0));
        let erased = erase_mask(&lasso, &src);
        assert!(erased.pixels().all(|p| p.0 == [9, 9, 9, 255]));
    }

    #[test]
    fn local_space_mapping_undoes_position_and_scale() {
        let shape = SelectionShape::Rect { x: 110.0, y: 60.0, width: 40.0, height: 20.0 };
        let local = to_local_space(&shape, 100.0, 50.0, 2.0, 2.0);
        assert_eq!(
            local,
            SelectionShape::Rect { x: 5.0, y: 5.0, width: 20.0, height: 10.0 }
        );
    }
}
