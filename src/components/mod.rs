// ============================================================================
// COMPONENTS — editor state machines: undo history and pointer tools
// ============================================================================

pub mod history;
pub mod tools;

pub use history::{HistoryEntry, HistoryManager};
pub use tools::{Tool, ToolBehavior, ToolSettings};
