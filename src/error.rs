// ============================================================================
// ERRORS — one enum for every failure the engine surfaces to the UI layer
// ============================================================================

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StickerError>;

#[derive(Debug, Error)]
pub enum StickerError {
    /// The image bytes could not be decoded. No session state was created.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// A raster surface could not be created for a compose/export call.
    #[error("rendering surface unavailable for {width}x{height}: {reason}")]
    RenderContextUnavailable {
        width: u32,
        height: u32,
        reason: String,
    },

    /// Pixel readback refused because the source image is not same-origin.
    #[error(
        "export blocked by cross-origin data: the source image was loaded from another origin; \
         load it from the same origin (or re-import the file) and try again"
    )]
    CrossOriginBlocked,

    #[error("background removal failed: {0}")]
    Removal(String),

    #[error("raster is {actual:?} but the session image is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("record store error: {0}")]
    Storage(String),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl StickerError {
    /// True when the failure comes from data flow (image origin) rather than
    /// from the engine itself. The UI shows a different message for these.
    pub fn is_cross_origin(&self) -> bool {
        matches!(self, StickerError::CrossOriginBlocked)
    }

    pub(crate) fn surface(width: u32, height: u32, reason: impl Into<String>) -> Self {
        StickerError::RenderContextUnavailable {
            width,
            height,
            reason: reason.into(),
        }
    }
}
