// ============================================================================
// BACKGROUND REMOVAL — seam for the external AI segmentation model
// ============================================================================
//
// The engine only needs "source image in, RGBA image whose alpha is the
// foreground estimate out". The model itself lives behind this trait.

use futures::FutureExt;
use futures::future::BoxFuture;
use image::RgbaImage;

use crate::canvas::SourceImage;
use crate::error::Result;

/// Options forwarded with each removal call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemovalOptions {
    /// Foreground probability threshold (0.0–1.0). `None` uses the session
    /// setting.
    pub threshold: Option<f32>,
    /// Opaque model selector passed through to the implementation.
    pub model: Option<String>,
}

pub trait BackgroundRemover: Send + Sync {
    /// Resolve to an image of the source's size whose alpha channel is the
    /// foreground mask. Failures should use `StickerError::Removal`.
    fn remove_background(&self, source: &SourceImage, options: &RemovalOptions) -> BoxFuture<'static, Result<RgbaImage>>;
}

/// Uses the source image's own alpha as the foreground estimate. Useful for
/// images that were cut out elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlphaChannelRemover;

impl BackgroundRemover for AlphaChannelRemover {
    fn remove_background(&self, source: &SourceImage, _options: &RemovalOptions) -> BoxFuture<'static, Result<RgbaImage>> {
        let result = source.pixels().map(|p| p.clone());
        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Origin;
    use image::Rgba;

    #[test]
    fn alpha_remover_returns_source_alpha() {
        let src = SourceImage::from_rgba(RgbaImage::from_fn(3, 1, |x, _| Rgba([9, 9, 9, (x * 100) as u8])));
        let out = pollster::block_on(AlphaChannelRemover.remove_background(&src, &RemovalOptions::default())).unwrap();
        assert_eq!(out.get_pixel(2, 0)[3], 200);
    }

    #[test]
    fn alpha_remover_cannot_read_tainted_source() {
        let src = SourceImage::from_rgba(RgbaImage::new(2, 2)).with_origin(Origin::CrossOrigin);
        let err = pollster::block_on(AlphaChannelRemover.remove_background(&src, &RemovalOptions::default())).unwrap_err();
        assert!(err.is_cross_origin());
    }
}
