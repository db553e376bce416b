// ============================================================================
// FLOOD FILL (MAGIC WAND) — erase a contiguous colour region from the mask
// ============================================================================
//
// Membership is decided on the *source* pixels; the result is written into
// the mask. Iterative DFS over packed flat indices, 4-connected.

use log::debug;

use crate::canvas::{MaskStore, PixelRect, SourceImage};
use crate::error::{Result, StickerError};
use crate::pool::BufferPool;

/// Outcome of one magic-wand click.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FloodFillReport {
    /// Pixels in the filled region.
    pub filled: usize,
    /// Pixels whose mask alpha changed to 0.
    pub erased: usize,
    pub bounds: Option<PixelRect>,
}

impl FloodFillReport {
    pub fn is_noop(&self) -> bool {
        self.filled == 0
    }
}

/// Squared RGBA distance threshold for a tolerance on the 0–100 scale.
pub fn tolerance_threshold(tolerance: f32) -> f64 {
    let t = (tolerance.clamp(0.0, 100.0) / 100.0) as f64;
    t * 255.0 * 255.0 * 4.0
}

#[inline(always)]
fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
    let o = idx * 4;
    [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
}

#[inline(always)]
fn distance_sq(a: [u8; 4], b: [u8; 4]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = p as i32 - q as i32;
            (d * d) as u32
        })
        .sum()
}

/// Flood-fill from `(seed_x, seed_y)`, clearing mask alpha for every pixel
/// whose source colour is within `tolerance` of the seed colour.
///
/// Seeds outside the image, or on a pixel the mask already removed, are a
/// no-op. Fails with `CrossOriginBlocked` when the source cannot be read.
pub fn flood_fill(
    source: &SourceImage,
    mask: &mut MaskStore,
    seed_x: i64,
    seed_y: i64,
    tolerance: f32,
    pool: &mut BufferPool,
) -> Result<FloodFillReport> {
    let pixels = source.pixels()?;
    if mask.dimensions() != source.dimensions() {
        return Err(StickerError::DimensionMismatch {
            expected: source.dimensions(),
            actual: mask.dimensions(),
        });
    }

    let (w, h) = source.dimensions();
    if seed_x < 0 || seed_y < 0 || seed_x >= w as i64 || seed_y >= h as i64 {
        return Ok(FloodFillReport::default());
    }
    let (sx, sy) = (seed_x as u32, seed_y as u32);
    if mask.alpha(sx, sy) == 0 {
        return Ok(FloodFillReport::default());
    }

    let wu = w as usize;
    let hu = h as usize;
    let flat = pixels.as_raw();
    let threshold = tolerance_threshold(tolerance);
    let seed_idx = sy as usize * wu + sx as usize;
    let seed = pix(flat, seed_idx);

    let mut visited = pool.acquire(wu * hu);
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    let mut report = FloodFillReport::default();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);

    let mask_px = mask.pixels_mut();
    visited[seed_idx] = 1;
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        report.filled += 1;
        let a = &mut mask_px[idx * 4 + 3];
        if *a != 0 {
            *a = 0;
            report.erased += 1;
        }

        let mut visit = |n: usize| {
            if visited[n] == 0 && (distance_sq(pix(flat, n), seed) as f64) <= threshold {
                visited[n] = 1;
                stack.push(n as u32);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - wu);
        }
        if y + 1 < h {
            visit(idx + wu);
        }
    }

    pool.release(visited);
    report.bounds = Some(PixelRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1));
    debug!(
        "flood fill at ({}, {}) tol {:.1}: {} px filled, {} erased",
        sx, sy, tolerance, report.filled, report.erased
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Origin;
    use image::{Rgba, RgbaImage};

    fn halves() -> SourceImage {
        SourceImage::from_rgba(RgbaImage::from_fn(10, 4, |x, _| {
            if x < 5 {
                Rgba([200, 0, 0, 255])
            } else {
                Rgba([0, 0, 200, 255])
            }
        }))
    }

    #[test]
    fn threshold_scales_with_tolerance() {
        assert_eq!(tolerance_threshold(0.0), 0.0);
        assert_eq!(tolerance_threshold(100.0), 260100.0);
        assert_eq!(tolerance_threshold(250.0), 260100.0);
    }

    #[test]
    fn fill_stops_at_colour_boundary() {
        let src = halves();
        let mut mask = MaskStore::opaque(10, 4);
        let mut pool = BufferPool::new();
        let report = flood_fill(&src, &mut mask, 2, 1, 0.0, &mut pool).unwrap();
        assert_eq!(report.filled, 20);
        assert_eq!(report.erased, 20);
        assert_eq!(report.bounds, Some(PixelRect::new(0, 0, 5, 4)));
        assert_eq!(mask.alpha(4, 3), 0);
        assert_eq!(mask.alpha(5, 0), 255);
        assert_eq!(pool.pooled_count(), 1);
    }

    #[test]
    fn removed_seed_is_noop() {
        let src = halves();
        let mut mask = MaskStore::opaque(10, 4);
        mask.set_alpha(7, 2, 0);
        let report = flood_fill(&src, &mut mask, 7, 2, 100.0, &mut BufferPool::new()).unwrap();
        assert!(report.is_noop());
        assert_eq!(mask.removed_count(), 1);
    }

    #[test]
    fn out_of_bounds_seed_is_noop() {
        let src = halves();
        let mut mask = MaskStore::opaque(10, 4);
        let report = flood_fill(&src, &mut mask, -1, 2, 50.0, &mut BufferPool::new()).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn full_tolerance_takes_everything() {
        let src = halves();
        let mut mask = MaskStore::opaque(10, 4);
        let report = flood_fill(&src, &mut mask, 0, 0, 100.0, &mut BufferPool::new()).unwrap();
        assert_eq!(report.erased, 40);
    }

    #[test]
    fn cross_origin_source_is_rejected() {
        let src = halves().with_origin(Origin::CrossOrigin);
        let mut mask = MaskStore::opaque(10, 4);
        let err = flood_fill(&src, &mut mask, 0, 0, 10.0, &mut BufferPool::new()).unwrap_err();
        assert!(err.is_cross_origin());
        assert_eq!(mask.removed_count(), 0);
    }
}
