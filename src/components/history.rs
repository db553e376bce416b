use std::collections::VecDeque;

use log::debug;

use crate::canvas::MaskStore;
use crate::error::Result;
use crate::ops::crop::CropLayout;
use crate::settings::Settings;

// ============================================================================
// HISTORY ENTRY — mask alpha snapshot plus the crop layout at that moment
// ============================================================================

/// Immutable snapshot taken at an interaction boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    description: String,
    /// One alpha byte per pixel.
    mask: Vec<u8>,
    layout: CropLayout,
}

impl HistoryEntry {
    pub fn capture(description: impl Into<String>, mask: &MaskStore, layout: &CropLayout) -> Self {
        Self {
            description: description.into(),
            mask: mask.snapshot(),
            layout: layout.clone(),
        }
    }

    /// Write this snapshot back. The mask must have the snapshot's size.
    pub fn restore_into(&self, mask: &mut MaskStore, layout: &mut CropLayout) -> Result<()> {
        mask.restore(&self.mask)?;
        *layout = self.layout.clone();
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mask_bytes(&self) -> &[u8] {
        &self.mask
    }

    pub fn layout(&self) -> &CropLayout {
        &self.layout
    }

    pub fn memory_size(&self) -> usize {
        self.mask.len() + self.layout.guides.len() * std::mem::size_of::<crate::ops::crop::Guide>()
    }
}

// ============================================================================
// HISTORY MANAGER - linear history with a cursor, bounded by count and memory
// ============================================================================

/// Undo/redo over full snapshots.
///
/// `entries[cursor]` is always the state currently shown. Committing after an
/// undo discards everything past the cursor.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across all entries.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(25)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
            max_memory_bytes: None,
            total_memory: 0,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut history = Self::new(settings.history_capacity);
        history.max_memory_bytes = Some(settings.history_memory_limit_bytes);
        history
    }

    pub fn with_memory_limit(mut self, bytes: Option<usize>) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn commit(&mut self, entry: HistoryEntry) {
        // Drop the redo branch.
        if !self.entries.is_empty() {
            for dropped in self.entries.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
            }
        }

        debug!("history commit: {}", entry.description());
        self.total_memory += entry.memory_size();
        self.entries.push_back(entry);
        self.cursor = self.entries.len() - 1;

        self.prune();
    }

    /// Step back. Returns the entry to restore, or `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward. Returns the entry to restore, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo().then(|| self.entries[self.cursor].description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor + 1).map(|e| e.description())
    }

    /// Descriptions from the current state back to the oldest.
    pub fn undo_history(&self) -> Vec<&str> {
        self.entries
            .iter()
            .take(self.cursor + 1)
            .rev()
            .map(|e| e.description())
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.max_history_size
    }

    fn evict_oldest(&mut self) {
        if let Some(removed) = self.entries.pop_front() {
            self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    /// Evict oldest entries to stay within limits.
    fn prune(&mut self) {
        while self.entries.len() > self.max_history_size {
            self.evict_oldest();
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.entries.len() > 1 {
                self.evict_oldest();
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }
}
