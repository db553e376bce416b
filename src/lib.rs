//! Mask editing and compositing engine for sticker cut-outs.
//!
//! An [`EditSession`] owns one source image and the mask painted over it.
//! Every mask or crop change goes through [`EditSession::apply`], which is
//! also where undo history is committed. The compositor renders the masked
//! cut-out with an optional outline and drop shadow, then crops and splits
//! it into grid cells for export.

pub mod background;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod pool;
pub mod project;
pub mod settings;
pub mod storage;
pub mod viewport;

pub use background::{AlphaChannelRemover, BackgroundRemover, RemovalOptions};
pub use canvas::{MaskStore, Origin, PixelRect, Raster, SourceImage};
pub use error::{Result, StickerError};
pub use project::{Applied, CropAdjustCommand, EditCommand, EditSession, FloodFillCommand, PaintCommand, PostProcessCommand};
pub use settings::Settings;
pub use storage::{MemoryStore, RecordStore, StickerRecord};
pub use viewport::{ContainerRect, CoordinateMapper, Point, Viewport};
