// ============================================================================
// CANVAS — raster buffers, the immutable source image and the mutable mask
// ============================================================================

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::error::{Result, StickerError};

/// Mask pixels are white; only alpha carries meaning.
pub const MASK_KEPT: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ============================================================================
// RASTER — flat RGBA8 buffer with raw read/write access
// ============================================================================

/// A flat RGBA8 pixel buffer. `read()` / `write()` expose the raw bytes in
/// row-major RGBA order, the same layout `getImageData` hands out.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pixels: RgbaImage,
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, color),
        }
    }

    /// Allocate a transparent surface, refusing zero-sized or oversized ones.
    pub fn try_new(width: u32, height: u32, max_pixels: u64) -> Result<Self> {
        Self::ensure_surface(width, height, max_pixels)?;
        Ok(Self::new(width, height))
    }

    /// Check that a `width x height` surface may be created.
    pub fn ensure_surface(width: u32, height: u32, max_pixels: u64) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(StickerError::surface(width, height, "zero-sized surface"));
        }
        let total = width as u64 * height as u64;
        if total > max_pixels {
            return Err(StickerError::surface(
                width,
                height,
                format!("{} pixels exceeds the {} pixel limit", total, max_pixels),
            ));
        }
        Ok(())
    }

    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn read(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn write(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    #[inline]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y)[3]
    }

    /// Copy of the alpha channel as a `width * height` plane.
    pub fn alpha_plane(&self) -> Vec<u8> {
        self.pixels.as_raw().chunks_exact(4).map(|p| p[3]).collect()
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of pixels with alpha > 0.
    pub fn opaque_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = self.dimensions();
        let raw = self.pixels.as_raw();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..h {
            let row = &raw[(y * w * 4) as usize..((y + 1) * w * 4) as usize];
            for x in 0..w {
                if row[x as usize * 4 + 3] == 0 {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }
}

/// Integer pixel rectangle, `[x, x + width) x [y, y + height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelRect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

// ============================================================================
// SOURCE IMAGE — decoded once per session, never mutated
// ============================================================================

/// Where the source pixels came from. Cross-origin images can be displayed
/// but their pixels cannot be read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    SameOrigin,
    CrossOrigin,
}

#[derive(Clone, Debug)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
    origin: Origin,
}

impl SourceImage {
    /// Decode encoded bytes (PNG, JPEG, WebP, BMP) into a same-origin source.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).map_err(StickerError::Decode)?;
        Ok(Self::from_rgba(decoded.into_rgba8()))
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            origin: Origin::SameOrigin,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Pixel readback. Fails for cross-origin sources.
    pub fn pixels(&self) -> Result<&RgbaImage> {
        match self.origin {
            Origin::SameOrigin => Ok(self.pixels.as_ref()),
            Origin::CrossOrigin => Err(StickerError::CrossOriginBlocked),
        }
    }
}

// ============================================================================
// MASK STORE — per-session alpha raster
// ============================================================================

/// Alpha mask over the source image: 0 = removed, 255 = kept, anything in
/// between is a soft edge. Dimensions never change after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskStore {
    raster: Raster,
}

impl MaskStore {
    /// Blank mask: every pixel kept.
    pub fn opaque(width: u32, height: u32) -> Self {
        Self {
            raster: Raster::filled(width, height, MASK_KEPT),
        }
    }

    /// Build from an alpha plane of `width * height` bytes.
    pub fn from_alpha(width: u32, height: u32, alpha: &[u8]) -> Result<Self> {
        if alpha.len() != (width as usize) * (height as usize) {
            return Err(StickerError::DimensionMismatch {
                expected: (width, height),
                actual: (width, alpha.len() as u32 / width.max(1)),
            });
        }
        let mut raster = Raster::filled(width, height, MASK_KEPT);
        for (px, &a) in raster.write().chunks_exact_mut(4).zip(alpha) {
            px[3] = a;
        }
        Ok(Self { raster })
    }

    /// Build from an arbitrary RGBA image, keeping only its alpha.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let mut raster = Raster::filled(image.width(), image.height(), MASK_KEPT);
        for (dst, src) in raster.write().chunks_exact_mut(4).zip(image.as_raw().chunks_exact(4)) {
            dst[3] = src[3];
        }
        Self { raster }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.raster.alpha_at(x, y)
    }

    #[inline]
    pub fn set_alpha(&mut self, x: u32, y: u32, alpha: u8) {
        let w = self.raster.width();
        let i = (y * w + x) as usize * 4 + 3;
        self.raster.write()[i] = alpha;
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Raw RGBA bytes for in-place edits.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.raster.write()
    }

    pub fn alpha_plane(&self) -> Vec<u8> {
        self.raster.alpha_plane()
    }

    /// Alpha-only copy for the history. Colour channels carry nothing.
    pub fn snapshot(&self) -> Vec<u8> {
        self.alpha_plane()
    }

    /// Restore from a snapshot taken on a mask of the same size.
    pub fn restore(&mut self, snapshot: &[u8]) -> Result<()> {
        let (w, h) = self.dimensions();
        if snapshot.len() != w as usize * h as usize {
            return Err(StickerError::DimensionMismatch {
                expected: (w, h),
                actual: (w, snapshot.len() as u32 / w.max(1)),
            });
        }
        for (px, &a) in self.raster.write().chunks_exact_mut(4).zip(snapshot) {
            px[3] = a;
        }
        Ok(())
    }

    /// Swap in a new mask of identical dimensions.
    pub fn replace(&mut self, other: MaskStore) -> Result<()> {
        if other.dimensions() != self.dimensions() {
            return Err(StickerError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        *self = other;
        Ok(())
    }

    pub fn fill(&mut self, alpha: u8) {
        for px in self.raster.write().chunks_exact_mut(4) {
            px[3] = alpha;
        }
    }

    /// Number of pixels with alpha 0.
    pub fn removed_count(&self) -> usize {
        self.raster.read().chunks_exact(4).filter(|p| p[3] == 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_from_alpha_round_trips_plane() {
        let alpha: Vec<u8> = (0..12).map(|i| (i * 20) as u8).collect();
        let mask = MaskStore::from_alpha(4, 3, &alpha).unwrap();
        assert_eq!(mask.alpha_plane(), alpha);
        assert_eq!(mask.alpha(1, 2), alpha[9]);
    }

    #[test]
    fn mask_from_alpha_rejects_wrong_length() {
        let err = MaskStore::from_alpha(4, 3, &[0u8; 5]).unwrap_err();
        assert!(matches!(err, StickerError::DimensionMismatch { .. }));
    }

    #[test]
    fn restore_rejects_other_size() {
        let mut mask = MaskStore::opaque(4, 4);
        let other = MaskStore::opaque(2, 2).snapshot();
        assert!(mask.restore(&other).is_err());
        assert_eq!(mask.removed_count(), 0);
    }

    #[test]
    fn replace_keeps_dimensions_invariant() {
        let mut mask = MaskStore::opaque(4, 4);
        assert!(mask.replace(MaskStore::opaque(5, 4)).is_err());
        let mut cleared = MaskStore::opaque(4, 4);
        cleared.fill(0);
        mask.replace(cleared).unwrap();
        assert_eq!(mask.removed_count(), 16);
    }

    #[test]
    fn cross_origin_source_blocks_readback() {
        let src = SourceImage::from_rgba(RgbaImage::new(2, 2)).with_origin(Origin::CrossOrigin);
        assert!(matches!(src.pixels(), Err(StickerError::CrossOriginBlocked)));
        assert_eq!(src.dimensions(), (2, 2));
    }

    #[test]
    fn try_new_refuses_degenerate_surfaces() {
        assert!(Raster::try_new(0, 5, 100).is_err());
        assert!(Raster::try_new(20, 20, 100).is_err());
        assert!(Raster::try_new(10, 10, 100).is_ok());
    }

    #[test]
    fn pixel_rect_union_covers_both() {
        let a = PixelRect::new(2, 2, 3, 3);
        let b = PixelRect::new(4, 0, 4, 2);
        assert_eq!(a.union(&b), PixelRect::new(2, 0, 6, 5));
        assert_eq!(PixelRect::default().union(&a), a);
        assert!(a.contains(4, 4) && !a.contains(5, 4));
    }

    #[test]
    fn opaque_bounds_finds_content() {
        let mut raster = Raster::new(8, 8);
        raster.write()[(3 * 8 + 2) * 4 + 3] = 10;
        raster.write()[(5 * 8 + 6) * 4 + 3] = 255;
        assert_eq!(raster.opaque_bounds(), Some((2, 3, 6, 5)));
        assert_eq!(Raster::new(3, 3).opaque_bounds(), None);
    }
}
