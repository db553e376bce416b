// ============================================================================
// COMPOSITOR — cutout, stroke outline, drop shadow, crop and split
// ============================================================================
//
// Pipeline order matters: the shadow is cast by the stroke + cutout union,
// so the stroke is finished before the shadow is rasterised. The surface is
// padded by the stroke and shadow reach, so nothing is clipped at the border.

use image::{Rgba, RgbaImage, imageops};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{MaskStore, PixelRect, Raster, SourceImage};
use crate::error::{Result, StickerError};
use crate::ops::crop::{CropLayout, CropRect};
use crate::ops::filters::gaussian_blur_plane;

/// Fewest angular samples an outline is drawn with.
pub const MIN_STROKE_SAMPLES: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeConfig {
    pub enabled: bool,
    /// Outline width in image pixels.
    pub thickness: f32,
    pub color: [u8; 4],
    /// Angular offsets unioned to build the outline (12 for preview, 36 for export).
    pub samples: u32,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thickness: 8.0,
            color: [255, 255, 255, 255],
            samples: 36,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Blur radius in pixels.
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Alpha is the shadow opacity.
    pub color: [u8; 4],
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            blur: 8.0,
            offset_x: 4.0,
            offset_y: 4.0,
            color: [0, 0, 0, 128],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComposeOptions {
    pub stroke: Option<StrokeConfig>,
    pub shadow: Option<ShadowConfig>,
    pub crop: Option<CropRect>,
    /// Split the composed image into the layout's grid cells.
    pub split: Option<CropLayout>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportCell {
    pub row: usize,
    pub col: usize,
    /// Grid cell in source coordinates. Where it touches the image border the
    /// cell image also covers the outline margin beyond it.
    pub rect: PixelRect,
    pub image: RgbaImage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub image: RgbaImage,
    pub cells: Vec<ExportCell>,
    /// Source coordinates of the image's top-left pixel. Negative when the
    /// outline margin extends past the source.
    pub origin: (i64, i64),
}

impl Composition {
    /// Opaque bounds in source coordinates as `(left, top, right, bottom)`,
    /// right and bottom exclusive.
    pub fn source_bounds(&self) -> Option<(i64, i64, i64, i64)> {
        let (ox, oy) = self.origin;
        content_bounds(&self.image).map(|r| {
            (
                ox + r.x as i64,
                oy + r.y as i64,
                ox + r.right() as i64,
                oy + r.bottom() as i64,
            )
        })
    }
}

// ============================================================================
// STAGES
// ============================================================================

/// Source pixels with alpha multiplied by the mask ("destination-in").
pub fn cutout(source: &SourceImage, mask: &MaskStore) -> Result<RgbaImage> {
    let src = source.pixels()?;
    if mask.dimensions() != source.dimensions() {
        return Err(StickerError::DimensionMismatch {
            expected: source.dimensions(),
            actual: mask.dimensions(),
        });
    }
    let mut out = src.clone();
    let mask_raw = mask.raster().read();
    out.par_chunks_mut(4)
        .zip(mask_raw.par_chunks(4))
        .for_each(|(px, m)| {
            px[3] = ((px[3] as u16 * m[3] as u16 + 127) / 255) as u8;
        });
    Ok(out)
}

/// Alpha plane of the cutout, used by guide auto-detection.
pub fn cutout_alpha(source: &SourceImage, mask: &MaskStore) -> Result<Vec<u8>> {
    Ok(cutout(source, mask)?
        .as_raw()
        .chunks_exact(4)
        .map(|p| p[3])
        .collect())
}

/// Integer offsets of the outline samples around a circle of `radius`.
fn stroke_offsets(radius: f32, samples: u32) -> Vec<(i32, i32)> {
    let n = samples.max(MIN_STROKE_SAMPLES);
    let mut offsets: Vec<(i32, i32)> = (0..n)
        .map(|k| {
            let theta = std::f32::consts::TAU * k as f32 / n as f32;
            (
                (radius * theta.cos()).round() as i32,
                (radius * theta.sin()).round() as i32,
            )
        })
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

/// Draw the outline under `cutout`: union of the cutout alpha at every
/// angular offset, recoloured to the stroke colour ("source-in").
pub fn apply_stroke(cutout: &RgbaImage, stroke: &StrokeConfig) -> RgbaImage {
    if !stroke.enabled || stroke.thickness <= 0.0 {
        return cutout.clone();
    }
    let (w, h) = cutout.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let stride = w as usize * 4;
    let src = cutout.as_raw();
    let offsets = stroke_offsets(stroke.thickness, stroke.samples);
    let color = stroke.color;

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let y = y as i32;
            for x in 0..wi {
                let mut union = 0u8;
                for &(dx, dy) in &offsets {
                    let sx = x - dx;
                    let sy = y - dy;
                    if sx >= 0 && sx < wi && sy >= 0 && sy < hi {
                        union = union.max(src[sy as usize * stride + sx as usize * 4 + 3]);
                    }
                }
                let pi = x as usize * 4;
                let si = y as usize * stride + pi;
                let stroke_a = union as f32 / 255.0 * color[3] as f32 / 255.0;
                let src_a = src[si + 3] as f32 / 255.0;
                let out_a = src_a + stroke_a * (1.0 - src_a);
                if out_a <= 0.0 {
                    continue;
                }
                for c in 0..3 {
                    let v = (src[si + c] as f32 * src_a
                        + color[c] as f32 * stroke_a * (1.0 - src_a))
                        / out_a;
                    row_out[pi + c] = v.round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });

    RgbaImage::from_raw(w, h, out).unwrap_or_else(|| cutout.clone())
}

/// Cast a blurred, offset shadow of `shape` underneath it.
pub fn apply_shadow(shape: &RgbaImage, shadow: &ShadowConfig) -> RgbaImage {
    let (w, h) = shape.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let stride = wu * 4;
    let src = shape.as_raw();
    let dx = shadow.offset_x.round() as i64;
    let dy = shadow.offset_y.round() as i64;

    // 1. Offset alpha.
    let mut alpha = vec![0.0f32; wu * hu];
    for y in 0..hu as i64 {
        for x in 0..wu as i64 {
            let sx = x - dx;
            let sy = y - dy;
            if sx >= 0 && sx < wu as i64 && sy >= 0 && sy < hu as i64 {
                alpha[y as usize * wu + x as usize] = src[sy as usize * stride + sx as usize * 4 + 3] as f32;
            }
        }
    }

    // 2. Blur. A canvas shadowBlur of `b` is a Gaussian with sigma b/2.
    let sigma = shadow.blur.max(0.0) / 2.0;
    let blurred = if sigma > 0.25 {
        gaussian_blur_plane(&alpha, wu, hu, sigma)
    } else {
        alpha
    };

    // 3. Shadow first, shape on top.
    let color = shadow.color;
    let opacity = color[3] as f32 / 255.0;
    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..wu {
                let pi = x * 4;
                let si = y * stride + pi;
                let shadow_a = (blurred[y * wu + x] / 255.0).clamp(0.0, 1.0) * opacity;
                let src_a = src[si + 3] as f32 / 255.0;
                let out_a = src_a + shadow_a * (1.0 - src_a);
                if out_a <= 0.0 {
                    continue;
                }
                for c in 0..3 {
                    let v = (src[si + c] as f32 * src_a
                        + color[c] as f32 * shadow_a * (1.0 - src_a))
                        / out_a;
                    row_out[pi + c] = v.round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });

    RgbaImage::from_raw(w, h, out).unwrap_or_else(|| shape.clone())
}

fn copy_region(image: &RgbaImage, rect: PixelRect) -> RgbaImage {
    imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Pixels the stroke and shadow can reach beyond the cutout.
fn effect_margin(stroke: Option<&StrokeConfig>, shadow: Option<&ShadowConfig>) -> u32 {
    let stroke_reach = stroke.map_or(0.0, |s| s.thickness.ceil());
    let shadow_reach = shadow.map_or(0.0, |s| {
        // Blur kernel radius is 3 sigma, sigma = blur / 2.
        let blur = (s.blur.max(0.0) * 1.5).ceil();
        blur + s.offset_x.abs().max(s.offset_y.abs()).round()
    });
    // Saturating cast; an absurd reach fails the surface check below.
    (stroke_reach + shadow_reach) as u32
}

/// Map a source-space rect onto the padded surface. Edges lying on the
/// image border grow into the margin, interior edges stay where they are.
fn into_padded(rect: PixelRect, (w, h): (u32, u32), margin: u32) -> PixelRect {
    let x0 = if rect.x == 0 { 0 } else { rect.x + margin };
    let y0 = if rect.y == 0 { 0 } else { rect.y + margin };
    let x1 = if rect.right() >= w {
        w + 2 * margin
    } else {
        rect.right() + margin
    };
    let y1 = if rect.bottom() >= h {
        h + 2 * margin
    } else {
        rect.bottom() + margin
    };
    PixelRect::new(x0, y0, x1 - x0, y1 - y0)
}

// ============================================================================
// COMPOSE
// ============================================================================

/// Run the full pipeline. The mask is only read.
///
/// Fails with `CrossOriginBlocked` for tainted sources and with
/// `RenderContextUnavailable` when the output surface cannot be allocated.
pub fn compose(
    source: &SourceImage,
    mask: &MaskStore,
    options: &ComposeOptions,
    max_canvas_pixels: u64,
) -> Result<Composition> {
    let (w, h) = source.dimensions();
    let stroke = options.stroke.as_ref().filter(|s| s.enabled && s.thickness > 0.0);
    let shadow = options.shadow.as_ref().filter(|s| s.color[3] > 0);

    let margin = effect_margin(stroke, shadow);
    let padded_w = w as u64 + 2 * margin as u64;
    let padded_h = h as u64 + 2 * margin as u64;
    if padded_w > u32::MAX as u64 || padded_h > u32::MAX as u64 {
        return Err(StickerError::surface(w, h, format!("outline margin of {} pixels", margin)));
    }
    let (pw, ph) = (padded_w as u32, padded_h as u32);
    Raster::ensure_surface(pw, ph, max_canvas_pixels)?;

    let cut = cutout(source, mask)?;
    let mut image = if margin == 0 {
        cut
    } else {
        let mut padded = RgbaImage::new(pw, ph);
        imageops::replace(&mut padded, &cut, margin as i64, margin as i64);
        padded
    };
    if let Some(stroke) = stroke {
        image = apply_stroke(&image, stroke);
        debug!("stroke {:.1}px x {} samples", stroke.thickness, stroke.samples);
    }
    if let Some(shadow) = shadow {
        image = apply_shadow(&image, shadow);
        debug!(
            "shadow blur {:.1} offset ({:.1}, {:.1})",
            shadow.blur, shadow.offset_x, shadow.offset_y
        );
    }

    let cells: Vec<ExportCell> = match &options.split {
        Some(layout) => layout
            .cells()
            .into_iter()
            .filter(|c| !c.rect.is_empty())
            .map(|c| ExportCell {
                row: c.row,
                col: c.col,
                rect: c.rect,
                image: copy_region(&image, into_padded(c.rect, (w, h), margin)),
            })
            .collect(),
        None => Vec::new(),
    };

    let mut origin = (-(margin as i64), -(margin as i64));
    if let Some(crop) = &options.crop {
        let rect = crop.to_pixel_rect(w, h);
        if rect.is_empty() {
            return Err(StickerError::surface(rect.width, rect.height, "empty crop rectangle"));
        }
        let region = into_padded(rect, (w, h), margin);
        origin = (region.x as i64 + origin.0, region.y as i64 + origin.1);
        image = copy_region(&image, region);
    }

    info!(
        "composed {}x{} image, {} cell(s)",
        image.width(),
        image.height(),
        cells.len()
    );
    Ok(Composition { image, cells, origin })
}

/// Opaque-pixel bounding box of a composed image.
pub fn content_bounds(image: &RgbaImage) -> Option<PixelRect> {
    Raster::from_image(image.clone())
        .opaque_bounds()
        .map(|(x0, y0, x1, y1)| PixelRect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Uniform colour raster.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}
