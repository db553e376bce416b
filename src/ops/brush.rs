// ============================================================================
// BRUSH — round erase/restore stamps and connected stroke segments
// ============================================================================
//
// A stroke is a chain of capsules (segment + round caps) between successive
// pointer positions, so fast motion never leaves gaps between stamps.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{MaskStore, PixelRect};
use crate::viewport::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushMode {
    /// Subtract: covered alpha goes to 0.
    Erase,
    /// Opaque over: covered alpha goes to 255.
    Restore,
}

/// Stamp shape. `size` is the brush diameter in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushStamp {
    pub size: f32,
    /// 1.0 = hard edge, 0.0 = widest soft edge.
    pub hardness: f32,
    pub mode: BrushMode,
}

impl BrushStamp {
    pub fn radius(&self) -> f32 {
        (self.size / 2.0).max(0.0)
    }

    /// Width of the soft falloff band around the stamp edge.
    pub fn blur(&self, max_soft_edge_blur: f32) -> f32 {
        (1.0 - self.hardness.clamp(0.0, 1.0)) * max_soft_edge_blur.max(0.0)
    }
}

#[inline]
fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Stamp strength (0..1) at distance `d` from the stroke spine.
#[inline]
fn coverage(d: f32, radius: f32, blur: f32) -> f32 {
    if blur <= 0.0 {
        return if d <= radius { 1.0 } else { 0.0 };
    }
    1.0 - smoothstep(radius - blur / 2.0, radius + blur / 2.0, d)
}

/// Distance from `p` to the segment `a..b`.
#[inline]
fn segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let ap = p - a;
    let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + ab.x * t, a.y + ab.y * t))
}

/// Paint one stroke segment into the mask. Returns the touched region, or
/// `None` when the segment lies entirely outside the image.
pub fn paint_segment(
    mask: &mut MaskStore,
    from: Point,
    to: Point,
    stamp: &BrushStamp,
    max_soft_edge_blur: f32,
) -> Option<PixelRect> {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let radius = stamp.radius();
    let blur = stamp.blur(max_soft_edge_blur);
    let reach = radius + blur / 2.0 + 1.0;

    let x0 = (from.x.min(to.x) - reach).floor().max(0.0);
    let y0 = (from.y.min(to.y) - reach).floor().max(0.0);
    let x1 = (from.x.max(to.x) + reach).ceil().min(w as f32);
    let y1 = (from.y.max(to.y) + reach).ceil().min(h as f32);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);

    let mode = stamp.mode;
    let stride = w as usize * 4;
    mask.pixels_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            for x in x0..x1 {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let s = coverage(segment_distance(center, from, to), radius, blur);
                if s <= 0.0 {
                    continue;
                }
                let i = x * 4 + 3;
                let a = row[i] as f32;
                let out = match mode {
                    BrushMode::Erase => a * (1.0 - s),
                    BrushMode::Restore => a + (255.0 - a) * s,
                };
                row[i] = out.round().clamp(0.0, 255.0) as u8;
            }
        });

    Some(PixelRect::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

/// Single round stamp (pointer-down without motion).
pub fn paint_stamp(
    mask: &mut MaskStore,
    at: Point,
    stamp: &BrushStamp,
    max_soft_edge_blur: f32,
) -> Option<PixelRect> {
    paint_segment(mask, at, at, stamp, max_soft_edge_blur)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hard(size: f32, mode: BrushMode) -> BrushStamp {
        BrushStamp {
            size,
            hardness: 1.0,
            mode,
        }
    }

    #[test]
    fn hard_erase_clears_disk_only() {
        let mut mask = MaskStore::opaque(32, 32);
        paint_stamp(&mut mask, Point::new(16.0, 16.0), &hard(10.0, BrushMode::Erase), 20.0);
        assert_eq!(mask.alpha(15, 15), 0);
        assert_eq!(mask.alpha(16, 19), 0);
        assert_eq!(mask.alpha(16, 22), 255);
        assert_eq!(mask.alpha(0, 0), 255);
    }

    #[test]
    fn soft_edge_produces_partial_alpha() {
        let mut mask = MaskStore::opaque(64, 64);
        let stamp = BrushStamp {
            size: 20.0,
            hardness: 0.0,
            mode: BrushMode::Erase,
        };
        paint_stamp(&mut mask, Point::new(32.0, 32.0), &stamp, 20.0);
        assert!(mask.alpha(31, 31) < 5);
        let edge = mask.alpha(32, 32 + 10);
        assert!(edge > 0 && edge < 255, "edge alpha {}", edge);
        assert_eq!(mask.alpha(32, 63), 255);
    }

    #[test]
    fn segment_leaves_no_gaps() {
        let mut mask = MaskStore::opaque(100, 20);
        paint_segment(
            &mut mask,
            Point::new(5.0, 10.0),
            Point::new(95.0, 10.0),
            &hard(4.0, BrushMode::Erase),
            20.0,
        );
        for x in 5..95 {
            assert_eq!(mask.alpha(x, 9), 0, "gap at x={}", x);
        }
    }

    #[test]
    fn restore_over_opaque_is_unchanged() {
        let mut mask = MaskStore::opaque(16, 16);
        let before = mask.snapshot();
        let soft = BrushStamp {
            size: 8.0,
            hardness: 0.3,
            mode: BrushMode::Restore,
        };
        paint_stamp(&mut mask, Point::new(8.0, 8.0), &soft, 20.0);
        assert_eq!(mask.snapshot(), before);
    }

    #[test]
    fn offscreen_segment_touches_nothing() {
        let mut mask = MaskStore::opaque(8, 8);
        let dirty = paint_stamp(&mut mask, Point::new(-50.0, -50.0), &hard(4.0, BrushMode::Erase), 20.0);
        assert!(dirty.is_none());
        assert_eq!(mask.removed_count(), 0);
    }
}
