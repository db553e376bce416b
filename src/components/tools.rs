use serde::{Deserialize, Serialize};

use crate::ops::brush::{BrushMode, BrushStamp};
use crate::ops::crop::{CropHit, CropLayout};
use crate::project::{CropAdjustCommand, EditCommand, FloodFillCommand, PaintCommand};
use crate::viewport::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    Erase,
    Restore,
    MagicWand,
    Move,
    Crop,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Tool::Erase, Tool::Restore, Tool::MagicWand, Tool::Move, Tool::Crop];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Erase => "Erase",
            Tool::Restore => "Restore",
            Tool::MagicWand => "Magic Wand",
            Tool::Move => "Move",
            Tool::Crop => "Crop",
        }
    }

    /// Pointer-down on this tool starts a pan instead of an edit.
    pub fn pans(&self) -> bool {
        matches!(self, Tool::Move)
    }
}

/// Transient tool state. Not part of the undo history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Brush diameter in image pixels.
    pub brush_size: f32,
    /// 0..1, 1 = hard edge.
    pub hardness: f32,
    /// Magic-wand tolerance, 0..100.
    pub tolerance: f32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            brush_size: 30.0,
            hardness: 0.75,
            tolerance: 30.0,
        }
    }
}

impl ToolSettings {
    pub fn stamp(&self, mode: BrushMode) -> BrushStamp {
        BrushStamp {
            size: self.brush_size.max(1.0),
            hardness: self.hardness.clamp(0.0, 1.0),
            mode,
        }
    }
}

/// A pointer position in both coordinate spaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub client: Point,
    pub image: Point,
}

/// Read-only state a tool may consult.
pub struct ToolContext<'a> {
    pub settings: &'a ToolSettings,
    pub layout: &'a CropLayout,
    /// Corner handle radius already converted to image pixels.
    pub corner_radius: f32,
    pub guide_margin: f32,
}

/// What a pointer event asks the session to do.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolAction {
    Edit(EditCommand),
    Pan(Point),
}

/// Per-gesture scratch state, reset on pointer-down.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StrokeState {
    pub active: bool,
    pub last_image: Option<Point>,
    pub last_client: Option<Point>,
    pub grab: Option<CropHit>,
}

impl StrokeState {
    fn begin(&mut self, event: PointerEvent) {
        *self = StrokeState {
            active: true,
            last_image: Some(event.image),
            last_client: Some(event.client),
            grab: None,
        };
    }

    fn end(&mut self) -> bool {
        let was_active = self.active;
        *self = StrokeState::default();
        was_active
    }
}

// ============================================================================
// TOOL BEHAVIOURS
// ============================================================================

pub trait ToolBehavior: Send + Sync {
    fn pointer_down(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction>;
    fn pointer_move(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction>;
    fn pointer_up(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction>;
}

/// Erase / restore brush. Each move paints the segment from the previous
/// position so the stroke stays connected.
pub struct BrushTool(pub BrushMode);

impl BrushTool {
    fn description(&self) -> &'static str {
        match self.0 {
            BrushMode::Erase => "Erase stroke",
            BrushMode::Restore => "Restore stroke",
        }
    }
}

impl ToolBehavior for BrushTool {
    fn pointer_down(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction> {
        state.begin(event);
        vec![ToolAction::Edit(EditCommand::Paint(PaintCommand {
            from: event.image,
            to: event.image,
            stamp: ctx.settings.stamp(self.0),
        }))]
    }

    fn pointer_move(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction> {
        if !state.active {
            return Vec::new();
        }
        let from = state.last_image.unwrap_or(event.image);
        state.last_image = Some(event.image);
        vec![ToolAction::Edit(EditCommand::Paint(PaintCommand {
            from,
            to: event.image,
            stamp: ctx.settings.stamp(self.0),
        }))]
    }

    fn pointer_up(&self, state: &mut StrokeState, _event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        if !state.end() {
            return Vec::new();
        }
        vec![ToolAction::Edit(EditCommand::EndInteraction {
            description: self.description().to_string(),
        })]
    }
}

/// Magic wand: one click, one atomic flood fill.
pub struct MagicWandTool;

impl ToolBehavior for MagicWandTool {
    fn pointer_down(&self, _state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction> {
        vec![ToolAction::Edit(EditCommand::FloodFill(FloodFillCommand {
            x: event.image.x.floor() as i64,
            y: event.image.y.floor() as i64,
            tolerance: ctx.settings.tolerance,
        }))]
    }

    fn pointer_move(&self, _state: &mut StrokeState, _event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        Vec::new()
    }

    fn pointer_up(&self, _state: &mut StrokeState, _event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        Vec::new()
    }
}

/// Pan the viewport by the screen-space pointer delta.
pub struct MoveTool;

impl ToolBehavior for MoveTool {
    fn pointer_down(&self, state: &mut StrokeState, event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        state.begin(event);
        Vec::new()
    }

    fn pointer_move(&self, state: &mut StrokeState, event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        if !state.active {
            return Vec::new();
        }
        let last = state.last_client.unwrap_or(event.client);
        state.last_client = Some(event.client);
        vec![ToolAction::Pan(event.client - last)]
    }

    fn pointer_up(&self, state: &mut StrokeState, _event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        state.end();
        Vec::new()
    }
}

/// Crop overlay: corners are hit-tested before guides; whatever was grabbed
/// follows the pointer until release.
pub struct CropTool;

impl CropTool {
    fn drag(grab: CropHit, to: Point) -> EditCommand {
        EditCommand::CropAdjust(match grab {
            CropHit::Corner(corner) => CropAdjustCommand::DragCorner { corner, to },
            CropHit::Guide(index) => CropAdjustCommand::DragGuide { index, to },
        })
    }
}

impl ToolBehavior for CropTool {
    fn pointer_down(&self, state: &mut StrokeState, event: PointerEvent, ctx: &ToolContext) -> Vec<ToolAction> {
        state.begin(event);
        state.grab = ctx.layout.hit_test(event.image, ctx.corner_radius, ctx.guide_margin);
        if state.grab.is_none() {
            state.active = false;
        }
        Vec::new()
    }

    fn pointer_move(&self, state: &mut StrokeState, event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        match (state.active, state.grab) {
            (true, Some(grab)) => vec![ToolAction::Edit(Self::drag(grab, event.image))],
            _ => Vec::new(),
        }
    }

    fn pointer_up(&self, state: &mut StrokeState, _event: PointerEvent, _ctx: &ToolContext) -> Vec<ToolAction> {
        let description = match state.grab {
            Some(CropHit::Corner(_)) => "Resize crop",
            Some(CropHit::Guide(_)) => "Move guide",
            None => return Vec::new(),
        };
        if !state.end() {
            return Vec::new();
        }
        vec![ToolAction::Edit(EditCommand::EndInteraction {
            description: description.to_string(),
        })]
    }
}

static ERASE: BrushTool = BrushTool(BrushMode::Erase);
static RESTORE: BrushTool = BrushTool(BrushMode::Restore);
static MAGIC_WAND: MagicWandTool = MagicWandTool;
static MOVE: MoveTool = MoveTool;
static CROP: CropTool = CropTool;

/// Capability dispatch table.
pub fn behavior_for(tool: Tool) -> &'static dyn ToolBehavior {
    match tool {
        Tool::Erase => &ERASE,
        Tool::Restore => &RESTORE,
        Tool::MagicWand => &MAGIC_WAND,
        Tool::Move => &MOVE,
        Tool::Crop => &CROP,
    }
}
