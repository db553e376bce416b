// ============================================================================
// FILTERS — separable Gaussian blur over single-channel planes
// ============================================================================

use rayon::prelude::*;

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Blur a `width * height` plane. Samples outside the plane read as zero so
/// content fades out at the border instead of smearing the edge pixels.
pub fn gaussian_blur_plane(src: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if width == 0 || height == 0 || sigma <= 0.0 || src.len() != width * height {
        return src.to_vec();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    // Horizontal pass (parallel by row).
    let mut horiz = vec![0.0f32; width * height];
    horiz
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src[y * width..(y + 1) * width];
            for (x, out) in row_out.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = x as isize + ki as isize - radius;
                    if sx >= 0 && (sx as usize) < width {
                        acc += row_in[sx as usize] * kv;
                    }
                }
                *out = acc;
            }
        });

    // Vertical pass (parallel by row).
    let mut vert = vec![0.0f32; width * height];
    vert.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row_out)| {
            for (x, out) in row_out.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = y as isize + ki as isize - radius;
                    if sy >= 0 && (sy as usize) < height {
                        acc += horiz[sy as usize * width + x] * kv;
                    }
                }
                *out = acc;
            }
        });

    vert
}

/// Convenience wrapper for 8-bit alpha planes.
pub fn gaussian_blur_alpha(src: &[u8], width: usize, height: usize, sigma: f32) -> Vec<u8> {
    let plane: Vec<f32> = src.iter().map(|&a| a as f32).collect();
    gaussian_blur_plane(&plane, width, height, sigma)
        .into_iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalised() {
        let k = build_gaussian_kernel(2.5);
        assert_eq!(k.len() % 2, 1);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(build_gaussian_kernel(0.0), vec![1.0]);
    }

    #[test]
    fn blur_spreads_a_single_dot() {
        let (w, h) = (9, 9);
        let mut plane = vec![0u8; w * h];
        plane[4 * w + 4] = 255;
        let out = gaussian_blur_alpha(&plane, w, h, 1.0);
        assert!(out[4 * w + 4] < 255);
        assert!(out[4 * w + 5] > 0);
        assert!(out[4 * w + 3] == out[4 * w + 5]);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let plane = vec![1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(gaussian_blur_plane(&plane, 2, 2, 0.0), plane);
    }
}
