// ============================================================================
// MASK POST-PROCESSING — edge grow/shrink, hole protection, AI thresholding
// ============================================================================
//
// Every transform here works on a copy derived from the pristine AI mask so
// settings can be re-applied any number of times without drift.

use serde::{Deserialize, Serialize};

use crate::canvas::MaskStore;
use crate::pool::BufferPool;
use crate::settings::Settings;

/// User-facing post-processing controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcessSettings {
    /// Edge tolerance in [-10, 10]. Positive grows, negative shrinks.
    pub edge_tolerance: f32,
    pub protect_holes: bool,
}

/// Curve constants for [`edge_tolerance`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeCurve {
    pub grow_divisor: f32,
    pub shrink_divisor: f32,
    pub hard_cut_below: f32,
    pub hard_cut_alpha: f32,
}

impl Default for EdgeCurve {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl EdgeCurve {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            grow_divisor: settings.edge_grow_divisor,
            shrink_divisor: settings.edge_shrink_divisor,
            hard_cut_below: settings.edge_hard_cut_below,
            hard_cut_alpha: settings.edge_hard_cut_alpha,
        }
    }

    fn exponent(&self, t: f32) -> f32 {
        if t >= 0.0 {
            1.0 - t / self.grow_divisor
        } else {
            1.0 + t.abs() / self.shrink_divisor
        }
    }
}

/// Power-curve every non-zero alpha. Fully removed pixels stay removed.
pub fn edge_tolerance(mask: &mut MaskStore, tolerance: f32, curve: &EdgeCurve) {
    let t = tolerance.clamp(-10.0, 10.0);
    if t == 0.0 {
        return;
    }
    let exponent = curve.exponent(t);
    let hard_cut = t < curve.hard_cut_below;

    // 256-entry LUT; the curve only depends on the input alpha.
    let mut lut = [0u8; 256];
    for (a, out) in lut.iter_mut().enumerate().skip(1) {
        let mut v = (a as f32 / 255.0).powf(exponent);
        if hard_cut && v < curve.hard_cut_alpha {
            v = 0.0;
        }
        *out = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    for px in mask.pixels_mut().chunks_exact_mut(4) {
        if px[3] > 0 {
            px[3] = lut[px[3] as usize];
        }
    }
}

/// Fill enclosed transparent regions.
///
/// Flood from the four corners through pixels with alpha below `threshold`;
/// anything the flood does not reach is not exterior background and is
/// forced to 255. Corners that are themselves opaque do not seed the flood.
/// Returns the number of pixels raised.
pub fn protect_holes(mask: &mut MaskStore, threshold: u8, pool: &mut BufferPool) -> usize {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return 0;
    }
    let wu = w as usize;
    let hu = h as usize;
    let px = mask.pixels_mut();
    let is_background = |px: &[u8], idx: usize| px[idx * 4 + 3] < threshold;

    let mut exterior = pool.acquire(wu * hu);
    let mut stack: Vec<u32> = Vec::with_capacity(1024);
    for (cx, cy) in [(0, 0), (wu - 1, 0), (0, hu - 1), (wu - 1, hu - 1)] {
        let idx = cy * wu + cx;
        if exterior[idx] == 0 && is_background(&*px, idx) {
            exterior[idx] = 1;
            stack.push(idx as u32);
        }
    }

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let x = idx % wu;
        let y = idx / wu;
        let mut visit = |n: usize| {
            if exterior[n] == 0 && is_background(&*px, n) {
                exterior[n] = 1;
                stack.push(n as u32);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < wu {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - wu);
        }
        if y + 1 < hu {
            visit(idx + wu);
        }
    }

    let mut raised = 0;
    for (i, pixel) in px.chunks_exact_mut(4).enumerate() {
        if exterior[i] == 0 && pixel[3] != 255 {
            pixel[3] = 255;
            raised += 1;
        }
    }
    pool.release(exterior);
    raised
}

/// Derive the working mask from the pristine AI mask.
pub fn apply_post_process(
    pristine: &MaskStore,
    post: &PostProcessSettings,
    settings: &Settings,
    pool: &mut BufferPool,
) -> MaskStore {
    let mut mask = pristine.clone();
    edge_tolerance(&mut mask, post.edge_tolerance, &EdgeCurve::from_settings(settings));
    if post.protect_holes {
        protect_holes(&mut mask, settings.hole_alpha_threshold, pool);
    }
    mask
}

/// Zero alphas whose foreground probability falls below `threshold` (0..1).
/// Alphas at or above it keep their soft value.
pub fn threshold_ai_mask(mask: &mut MaskStore, threshold: f32) {
    let cut = (threshold.clamp(0.0, 1.0) * 255.0).round() as u16;
    for px in mask.pixels_mut().chunks_exact_mut(4) {
        if (px[3] as u16) < cut {
            px[3] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> MaskStore {
        let alpha: Vec<u8> = (0..=255u16).map(|a| a as u8).collect();
        MaskStore::from_alpha(256, 1, &alpha).unwrap()
    }

    #[test]
    fn grow_raises_soft_pixels_and_keeps_zeros() {
        let mut mask = ramp();
        edge_tolerance(&mut mask, 10.0, &EdgeCurve::default());
        assert_eq!(mask.alpha(0, 0), 0);
        assert!(mask.alpha(64, 0) > 64);
        assert_eq!(mask.alpha(255, 0), 255);
    }

    #[test]
    fn strong_shrink_hard_cuts_low_alpha() {
        let mut mask = ramp();
        edge_tolerance(&mut mask, -10.0, &EdgeCurve::default());
        // (a/255)^3 < 0.2 below a ~= 149.
        assert_eq!(mask.alpha(140, 0), 0);
        assert!(mask.alpha(200, 0) > 0 && mask.alpha(200, 0) < 200);
        assert_eq!(mask.alpha(255, 0), 255);
    }

    #[test]
    fn mild_shrink_has_no_hard_cut() {
        let mut mask = ramp();
        edge_tolerance(&mut mask, -3.0, &EdgeCurve::default());
        assert!(mask.alpha(60, 0) > 0);
        assert!(mask.alpha(60, 0) < 60);
    }

    #[test]
    fn tolerance_is_clamped() {
        let mut a = ramp();
        let mut b = ramp();
        edge_tolerance(&mut a, 40.0, &EdgeCurve::default());
        edge_tolerance(&mut b, 10.0, &EdgeCurve::default());
        assert_eq!(a, b);
    }

    #[test]
    fn ring_hole_is_filled() {
        // 9x9 opaque ring with a transparent centre, transparent border.
        let mut alpha = vec![0u8; 81];
        for y in 2..7 {
            for x in 2..7 {
                alpha[y * 9 + x] = if x == 4 && y == 4 { 0 } else { 255 };
            }
        }
        let mut mask = MaskStore::from_alpha(9, 9, &alpha).unwrap();
        let mut pool = BufferPool::new();
        let raised = protect_holes(&mut mask, 50, &mut pool);
        assert_eq!(raised, 1);
        assert_eq!(mask.alpha(4, 4), 255);
        assert_eq!(mask.alpha(0, 0), 0);
        assert_eq!(mask.alpha(8, 1), 0);
    }

    #[test]
    fn fully_opaque_corners_fill_nothing_exterior() {
        let mut mask = MaskStore::opaque(4, 4);
        mask.set_alpha(1, 1, 0);
        protect_holes(&mut mask, 50, &mut BufferPool::new());
        assert_eq!(mask.removed_count(), 0);
    }

    #[test]
    fn post_process_leaves_pristine_alone() {
        let pristine = ramp();
        let post = PostProcessSettings {
            edge_tolerance: 5.0,
            protect_holes: false,
        };
        let out = apply_post_process(&pristine, &post, &Settings::default(), &mut BufferPool::new());
        assert_eq!(pristine, ramp());
        assert_ne!(out, pristine);
    }

    #[test]
    fn threshold_drops_low_probability() {
        let mut mask = ramp();
        threshold_ai_mask(&mut mask, 0.5);
        assert_eq!(mask.alpha(127, 0), 0);
        assert_eq!(mask.alpha(128, 0), 128);
    }
}
