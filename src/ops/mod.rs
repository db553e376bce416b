// ============================================================================
// OPS MODULE — pixel operations over the mask and the source image
// ============================================================================
//
// Architecture:
//   brush.rs       — round erase/restore stamps and stroke segments
//   flood_fill.rs  — magic wand: source-colour flood fill into the mask
//   mask_post.rs   — edge grow/shrink, hole protection, AI mask threshold
//   filters.rs     — separable Gaussian blur (shadow)
//   crop.rs        — crop rectangle, guides, split grid
//   compositor.rs  — cutout, stroke, shadow, crop, split
// ============================================================================

pub mod brush;
pub mod compositor;
pub mod crop;
pub mod filters;
pub mod flood_fill;
pub mod mask_post;

pub use brush::{BrushMode, BrushStamp};
pub use compositor::{ComposeOptions, Composition, ExportCell, ShadowConfig, StrokeConfig};
pub use crop::{CropHit, CropLayout, CropRect, Corner, Guide, GuideAxis};
pub use flood_fill::FloodFillReport;
pub use mask_post::PostProcessSettings;
