use std::path::Path;

use image::RgbaImage;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::background::{BackgroundRemover, RemovalOptions};
use crate::canvas::{MaskStore, PixelRect, SourceImage};
use crate::components::history::{HistoryEntry, HistoryManager};
use crate::components::tools::{PointerEvent, StrokeState, Tool, ToolAction, ToolContext, ToolSettings, behavior_for};
use crate::error::{Result, StickerError};
use crate::ops::brush::{self, BrushStamp};
use crate::ops::compositor::{self, ComposeOptions, Composition, ShadowConfig, StrokeConfig};
use crate::ops::crop::{Corner, CropLayout, CropRect, GuideAxis};
use crate::ops::flood_fill::flood_fill;
use crate::ops::mask_post::{PostProcessSettings, apply_post_process, threshold_ai_mask};
use crate::pool::BufferPool;
use crate::settings::Settings;
use crate::storage::StickerRecord;
use crate::viewport::{ContainerRect, Point, Viewport};

// ============================================================================
// EDIT COMMANDS — the only way the mask or the crop layout changes
// ============================================================================

/// One stroke segment (a single stamp when `from == to`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintCommand {
    pub from: Point,
    pub to: Point,
    pub stamp: BrushStamp,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloodFillCommand {
    pub x: i64,
    pub y: i64,
    /// 0..100
    pub tolerance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CropAdjustCommand {
    SetRect(CropRect),
    DragCorner { corner: Corner, to: Point },
    DragGuide { index: usize, to: Point },
    AddGuide { axis: GuideAxis, position: f32 },
    RegularGrid { rows: usize, cols: usize },
    AutoDetect,
    ClearGuides,
}

impl CropAdjustCommand {
    /// Drags are committed by the `EndInteraction` that follows them.
    fn is_drag(&self) -> bool {
        matches!(
            self,
            CropAdjustCommand::DragCorner { .. } | CropAdjustCommand::DragGuide { .. }
        )
    }

    fn description(&self) -> &'static str {
        match self {
            CropAdjustCommand::SetRect(_) => "Set crop",
            CropAdjustCommand::DragCorner { .. } => "Resize crop",
            CropAdjustCommand::DragGuide { .. } => "Move guide",
            CropAdjustCommand::AddGuide { .. } => "Add guide",
            CropAdjustCommand::RegularGrid { .. } => "Grid guides",
            CropAdjustCommand::AutoDetect => "Detect guides",
            CropAdjustCommand::ClearGuides => "Clear guides",
        }
    }
}

/// Re-derive the working mask from the pristine AI mask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostProcessCommand {
    pub settings: PostProcessSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditCommand {
    Paint(PaintCommand),
    FloodFill(FloodFillCommand),
    CropAdjust(CropAdjustCommand),
    PostProcess(PostProcessCommand),
    /// Every pixel back to fully kept.
    ResetMask,
    /// Pointer released: commit whatever the gesture changed.
    EndInteraction { description: String },
}

impl EditCommand {
    /// Whether applying this command ends an interaction (and may commit).
    pub fn is_boundary(&self) -> bool {
        match self {
            EditCommand::Paint(_) => false,
            EditCommand::CropAdjust(c) => !c.is_drag(),
            EditCommand::FloodFill(_)
            | EditCommand::PostProcess(_)
            | EditCommand::ResetMask
            | EditCommand::EndInteraction { .. } => true,
        }
    }
}

/// Result of applying one command.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Applied {
    /// Mask region that changed, for partial preview refresh.
    pub dirty: Option<PixelRect>,
    /// A history entry was pushed.
    pub committed: bool,
}

impl Applied {
    fn merge(self, other: Applied) -> Applied {
        let dirty = match (self.dirty, other.dirty) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        Applied {
            dirty,
            committed: self.committed || other.committed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PointerPhase {
    Down,
    Move,
    Up,
}

// ============================================================================
// EDIT SESSION — one loaded image and everything edited on top of it
// ============================================================================

pub struct EditSession {
    pub id: Uuid,
    /// Display name (file stem or "Untitled").
    pub name: String,
    source: SourceImage,
    mask: MaskStore,
    /// Unprocessed AI mask; post-processing always starts from here.
    pristine_mask: Option<MaskStore>,
    post: PostProcessSettings,
    layout: CropLayout,
    history: HistoryManager,
    pub viewport: Viewport,
    tool: Tool,
    pub tool_settings: ToolSettings,
    pub stroke: Option<StrokeConfig>,
    pub shadow: Option<ShadowConfig>,
    gesture: StrokeState,
    pool: BufferPool,
    settings: Settings,
    /// Changes applied since the last history commit.
    pending: bool,
}

impl EditSession {
    /// Start a session with a fully kept mask. The initial state is the
    /// first history entry.
    pub fn new(source: SourceImage, settings: Settings) -> Self {
        let settings = settings.sanitized();
        let (w, h) = source.dimensions();
        let mut session = Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            mask: MaskStore::opaque(w, h),
            pristine_mask: None,
            post: PostProcessSettings::default(),
            layout: CropLayout::new(w, h),
            history: HistoryManager::from_settings(&settings),
            viewport: Viewport::from_settings(&settings),
            tool: Tool::default(),
            tool_settings: ToolSettings::default(),
            stroke: None,
            shadow: None,
            gesture: StrokeState::default(),
            pool: BufferPool::new(),
            settings,
            pending: false,
            source,
        };
        session.commit("Open image");
        info!("session {} opened {}x{}", session.id, w, h);
        session
    }

    /// Decode `bytes` and start a session. Nothing is created on failure.
    pub fn open(bytes: &[u8], settings: Settings) -> Result<Self> {
        let source = SourceImage::decode(bytes)?;
        Ok(Self::new(source, settings))
    }

    pub fn open_file(path: &Path, settings: Settings) -> Result<Self> {
        let source = crate::io::load_source(path)?;
        let mut session = Self::new(source, settings);
        if let Some(stem) = path.file_stem() {
            session.name = stem.to_string_lossy().to_string();
        }
        Ok(session)
    }

    // --- accessors -------------------------------------------------------

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn mask(&self) -> &MaskStore {
        &self.mask
    }

    pub fn pristine_mask(&self) -> Option<&MaskStore> {
        self.pristine_mask.as_ref()
    }

    pub fn layout(&self) -> &CropLayout {
        &self.layout
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn post_process(&self) -> PostProcessSettings {
        self.post
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending
    }

    // --- history ---------------------------------------------------------

    fn commit(&mut self, description: &str) {
        self.history
            .commit(HistoryEntry::capture(description, &self.mask, &self.layout));
        self.pending = false;
    }

    /// Commit a gesture that never saw its pointer-up.
    fn flush_pending(&mut self) {
        if self.pending {
            self.commit("Edit");
        }
    }

    /// Step back one entry. Returns `false` when already at the oldest.
    pub fn undo(&mut self) -> Result<bool> {
        self.flush_pending();
        let Some(entry) = self.history.undo() else {
            return Ok(false);
        };
        info!("undo: {}", entry.description());
        entry.restore_into(&mut self.mask, &mut self.layout)?;
        Ok(true)
    }

    /// Step forward one entry. Returns `false` when already at the newest.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.redo() else {
            return Ok(false);
        };
        info!("redo: {}", entry.description());
        entry.restore_into(&mut self.mask, &mut self.layout)?;
        Ok(true)
    }

    // --- the single mutation entry point ----------------------------------

    pub fn apply(&mut self, command: EditCommand) -> Result<Applied> {
        match command {
            EditCommand::Paint(p) => {
                let dirty = brush::paint_segment(
                    &mut self.mask,
                    p.from,
                    p.to,
                    &p.stamp,
                    self.settings.max_soft_edge_blur,
                );
                self.pending |= dirty.is_some();
                Ok(Applied {
                    dirty,
                    committed: false,
                })
            }
            EditCommand::FloodFill(f) => {
                let report = flood_fill(
                    &self.source,
                    &mut self.mask,
                    f.x,
                    f.y,
                    f.tolerance,
                    &mut self.pool,
                )?;
                if report.erased == 0 {
                    return Ok(Applied::default());
                }
                self.commit("Magic wand");
                Ok(Applied {
                    dirty: report.bounds,
                    committed: true,
                })
            }
            EditCommand::CropAdjust(c) => self.adjust_crop(c),
            EditCommand::PostProcess(p) => {
                self.post = p.settings;
                let pristine = self
                    .pristine_mask
                    .get_or_insert_with(|| self.mask.clone());
                let processed = apply_post_process(pristine, &self.post, &self.settings, &mut self.pool);
                self.mask.replace(processed)?;
                self.commit("Adjust edges");
                Ok(self.full_dirty(true))
            }
            EditCommand::ResetMask => {
                self.mask.fill(255);
                self.commit("Reset mask");
                Ok(self.full_dirty(true))
            }
            EditCommand::EndInteraction { description } => {
                if !self.pending {
                    return Ok(Applied::default());
                }
                self.commit(&description);
                Ok(Applied {
                    dirty: None,
                    committed: true,
                })
            }
        }
    }

    fn full_dirty(&self, committed: bool) -> Applied {
        let (w, h) = self.mask.dimensions();
        Applied {
            dirty: Some(PixelRect::new(0, 0, w, h)),
            committed,
        }
    }

    fn adjust_crop(&mut self, command: CropAdjustCommand) -> Result<Applied> {
        let min = self.settings.min_crop_size;
        let before = self.layout.clone();
        match &command {
            CropAdjustCommand::SetRect(rect) => self.layout.set_rect(*rect, min),
            CropAdjustCommand::DragCorner { corner, to } => self.layout.drag_corner(*corner, *to, min),
            CropAdjustCommand::DragGuide { index, to } => self.layout.drag_guide(*index, *to),
            CropAdjustCommand::AddGuide { axis, position } => {
                self.layout.add_guide(*axis, *position);
            }
            CropAdjustCommand::RegularGrid { rows, cols } => self.layout.regular_grid(*rows, *cols),
            CropAdjustCommand::AutoDetect => {
                let alpha = compositor::cutout_alpha(&self.source, &self.mask)?;
                let (w, h) = self.source.dimensions();
                let found = self.layout.auto_detect(&alpha, w, h);
                debug!("auto-detect placed {} guide(s)", found);
            }
            CropAdjustCommand::ClearGuides => self.layout.clear_guides(),
        }

        if self.layout == before {
            return Ok(Applied::default());
        }
        if command.is_drag() {
            self.pending = true;
            return Ok(Applied::default());
        }
        self.commit(command.description());
        Ok(Applied {
            dirty: None,
            committed: true,
        })
    }

    // --- pointer input ---------------------------------------------------

    /// Switch tools. An unfinished gesture is closed and committed first.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        self.gesture = StrokeState::default();
        self.flush_pending();
        self.tool = tool;
    }

    pub fn pointer_down(&mut self, client: Point, container: ContainerRect) -> Result<Applied> {
        self.dispatch(PointerPhase::Down, client, container)
    }

    pub fn pointer_move(&mut self, client: Point, container: ContainerRect) -> Result<Applied> {
        self.dispatch(PointerPhase::Move, client, container)
    }

    pub fn pointer_up(&mut self, client: Point, container: ContainerRect) -> Result<Applied> {
        self.dispatch(PointerPhase::Up, client, container)
    }

    fn dispatch(&mut self, phase: PointerPhase, client: Point, container: ContainerRect) -> Result<Applied> {
        let (w, h) = self.source.dimensions();
        let mapper = self.viewport.mapper(container, w, h);
        let event = PointerEvent {
            client,
            image: mapper.to_image(client),
        };
        let ctx = ToolContext {
            settings: &self.tool_settings,
            layout: &self.layout,
            corner_radius: mapper.screen_len_to_image(self.settings.corner_hit_radius_px),
            guide_margin: self.settings.guide_hit_margin,
        };
        let behavior = behavior_for(self.tool);
        let actions = match phase {
            PointerPhase::Down => behavior.pointer_down(&mut self.gesture, event, &ctx),
            PointerPhase::Move => behavior.pointer_move(&mut self.gesture, event, &ctx),
            PointerPhase::Up => behavior.pointer_up(&mut self.gesture, event, &ctx),
        };

        let mut applied = Applied::default();
        for action in actions {
            match action {
                ToolAction::Edit(command) => applied = applied.merge(self.apply(command)?),
                ToolAction::Pan(delta) => self.viewport.pan_by(delta),
            }
        }
        Ok(applied)
    }

    // --- viewport --------------------------------------------------------

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_by(self.settings.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_by(1.0 / self.settings.zoom_step);
    }

    /// Wheel zoom keeping the point under the cursor fixed.
    pub fn zoom_at(&mut self, steps: f32, anchor: Point, container: ContainerRect) {
        let factor = self.settings.zoom_step.powf(steps);
        self.viewport.zoom_around(factor, anchor, container);
    }

    pub fn fit_to(&mut self, container: ContainerRect) {
        let (w, h) = self.source.dimensions();
        self.viewport.fit_to(container, w, h);
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
    }

    // --- mask sources ----------------------------------------------------

    /// Ask the removal model for a mask. On failure the current mask and
    /// history are left exactly as they were.
    pub async fn run_background_removal(
        &mut self,
        remover: &dyn BackgroundRemover,
        options: &RemovalOptions,
    ) -> Result<()> {
        let result = remover.remove_background(&self.source, options).await;
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                warn!("background removal failed: {}", e);
                return Err(e);
            }
        };
        if image.dimensions() != self.source.dimensions() {
            warn!("background removal returned {:?}", image.dimensions());
            return Err(StickerError::DimensionMismatch {
                expected: self.source.dimensions(),
                actual: image.dimensions(),
            });
        }
        let threshold = options.threshold.unwrap_or(self.settings.ai_mask_threshold);
        let mut ai_mask = MaskStore::from_rgba(&image);
        threshold_ai_mask(&mut ai_mask, threshold);
        self.install_pristine(ai_mask, "Remove background")
    }

    /// Use an externally produced mask as the pristine mask.
    pub fn load_mask(&mut self, mask: MaskStore) -> Result<()> {
        self.install_pristine(mask, "Load mask")
    }

    fn install_pristine(&mut self, pristine: MaskStore, description: &str) -> Result<()> {
        if pristine.dimensions() != self.source.dimensions() {
            return Err(StickerError::DimensionMismatch {
                expected: self.source.dimensions(),
                actual: pristine.dimensions(),
            });
        }
        let processed = apply_post_process(&pristine, &self.post, &self.settings, &mut self.pool);
        self.mask.replace(processed)?;
        self.pristine_mask = Some(pristine);
        self.commit(description);
        Ok(())
    }

    // --- output ----------------------------------------------------------

    fn stroke_with_samples(&self, samples: u32) -> Option<StrokeConfig> {
        self.stroke.map(|s| StrokeConfig { samples, ..s })
    }

    /// On-screen preview: full image, preview-quality stroke.
    pub fn preview(&self) -> Result<RgbaImage> {
        let options = ComposeOptions {
            stroke: self.stroke_with_samples(self.settings.preview_stroke_samples),
            shadow: self.shadow,
            crop: None,
            split: None,
        };
        compositor::compose(&self.source, &self.mask, &options, self.settings.max_canvas_pixels)
            .map(|c| c.image)
    }

    /// Export-quality composition cropped to the layout, optionally split
    /// into its grid cells. The mask is never touched, even on failure.
    pub fn export(&self, split: bool) -> Result<Composition> {
        let options = ComposeOptions {
            stroke: self.stroke_with_samples(self.settings.export_stroke_samples),
            shadow: self.shadow,
            crop: Some(self.layout.rect),
            split: split.then(|| self.layout.clone()),
        };
        compositor::compose(&self.source, &self.mask, &options, self.settings.max_canvas_pixels)
    }

    /// Export the cropped sticker as a record for the persistence layer.
    pub fn to_record(&self, label: impl Into<String>) -> Result<StickerRecord> {
        let composition = self.export(false)?;
        let png = crate::io::encode_png(&composition.image)?;
        Ok(StickerRecord::new(png, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::brush::BrushMode;
    use image::Rgba;

    fn session() -> EditSession {
        let img = RgbaImage::from_pixel(20, 20, Rgba([10, 200, 10, 255]));
        EditSession::new(SourceImage::from_rgba(img), Settings::default())
    }

    fn erase(at: Point) -> EditCommand {
        EditCommand::Paint(PaintCommand {
            from: at,
            to: at,
            stamp: BrushStamp {
                size: 6.0,
                hardness: 1.0,
                mode: BrushMode::Erase,
            },
        })
    }

    #[test]
    fn opening_commits_initial_state() {
        let s = session();
        assert_eq!(s.history().len(), 1);
        assert!(!s.history().can_undo());
    }

    #[test]
    fn paint_commits_only_on_end_interaction() {
        let mut s = session();
        s.apply(erase(Point::new(5.0, 5.0))).unwrap();
        s.apply(erase(Point::new(8.0, 5.0))).unwrap();
        assert_eq!(s.history().len(), 1);
        assert!(s.has_pending_changes());
        let applied = s
            .apply(EditCommand::EndInteraction {
                description: "Erase stroke".into(),
            })
            .unwrap();
        assert!(applied.committed);
        assert_eq!(s.history().len(), 2);
        // A second release with nothing new is not a new entry.
        s.apply(EditCommand::EndInteraction {
            description: "Erase stroke".into(),
        })
        .unwrap();
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn undo_flushes_an_unfinished_stroke() {
        let mut s = session();
        s.apply(erase(Point::new(5.0, 5.0))).unwrap();
        assert!(s.undo().unwrap());
        assert_eq!(s.mask().removed_count(), 0);
        assert!(s.redo().unwrap());
        assert!(s.mask().removed_count() > 0);
    }

    #[test]
    fn crop_drag_commits_on_release_and_undoes_layout() {
        let mut s = session();
        s.apply(EditCommand::CropAdjust(CropAdjustCommand::DragCorner {
            corner: Corner::TopLeft,
            to: Point::new(5.0, 5.0),
        }))
        .unwrap();
        assert_eq!(s.history().len(), 1);
        s.apply(EditCommand::EndInteraction {
            description: "Resize crop".into(),
        })
        .unwrap();
        assert_eq!(s.layout().rect, CropRect::new(5.0, 5.0, 15.0, 15.0));
        s.undo().unwrap();
        assert_eq!(s.layout().rect, CropRect::full(20, 20));
    }

    #[test]
    fn noop_flood_fill_does_not_commit() {
        let mut s = session();
        s.apply(EditCommand::FloodFill(FloodFillCommand {
            x: 3,
            y: 3,
            tolerance: 0.0,
        }))
        .unwrap();
        assert_eq!(s.history().len(), 2);
        let again = s
            .apply(EditCommand::FloodFill(FloodFillCommand {
                x: 3,
                y: 3,
                tolerance: 0.0,
            }))
            .unwrap();
        assert!(!again.committed);
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn pointer_gesture_runs_through_active_tool() {
        let mut s = session();
        let container = ContainerRect::new(0.0, 0.0, 20.0, 20.0);
        s.pointer_down(Point::new(10.0, 10.0), container).unwrap();
        s.pointer_move(Point::new(14.0, 10.0), container).unwrap();
        let up = s.pointer_up(Point::new(14.0, 10.0), container).unwrap();
        assert!(up.committed);
        assert_eq!(s.mask().alpha(12, 10), 0);

        s.set_tool(Tool::Move);
        s.pointer_down(Point::new(0.0, 0.0), container).unwrap();
        s.pointer_move(Point::new(3.0, 4.0), container).unwrap();
        assert_eq!(s.viewport.pan, Point::new(3.0, 4.0));
    }
}
