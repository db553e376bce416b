// ============================================================================
// SETTINGS — engine tunables, persisted as JSON
// ============================================================================

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Every tunable the engine exposes. Missing keys in a settings file fall
/// back to the defaults below, so old files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of history entries kept for undo/redo.
    pub history_capacity: usize,
    /// Soft cap on the bytes held by history entries.
    pub history_memory_limit_bytes: usize,

    pub zoom_min: f32,
    pub zoom_max: f32,
    /// Multiplier applied per zoom-in / zoom-out step.
    pub zoom_step: f32,

    /// Smallest allowed crop width/height in image pixels.
    pub min_crop_size: f32,
    /// Corner handle hit radius in screen pixels (divided by zoom).
    pub corner_hit_radius_px: f32,
    /// Guide hit margin in image pixels.
    pub guide_hit_margin: f32,

    /// Alpha below which a pixel counts as background for hole protection.
    pub hole_alpha_threshold: u8,
    pub edge_grow_divisor: f32,
    pub edge_shrink_divisor: f32,
    /// Edge tolerance below which low alphas are cut to zero.
    pub edge_hard_cut_below: f32,
    pub edge_hard_cut_alpha: f32,

    /// Blur radius reached at hardness 0.
    pub max_soft_edge_blur: f32,

    pub preview_stroke_samples: u32,
    pub export_stroke_samples: u32,

    /// Foreground probability below which the AI mask is treated as background.
    pub ai_mask_threshold: f32,

    /// Largest raster (in pixels) a compose call may allocate.
    pub max_canvas_pixels: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_capacity: 25,
            history_memory_limit_bytes: 256 * 1024 * 1024,
            zoom_min: 0.1,
            zoom_max: 8.0,
            zoom_step: 1.2,
            min_crop_size: 10.0,
            corner_hit_radius_px: 20.0,
            guide_hit_margin: 10.0,
            hole_alpha_threshold: 50,
            edge_grow_divisor: 15.0,
            edge_shrink_divisor: 5.0,
            edge_hard_cut_below: -5.0,
            edge_hard_cut_alpha: 0.2,
            max_soft_edge_blur: 20.0,
            preview_stroke_samples: 12,
            export_stroke_samples: 36,
            ai_mask_threshold: 0.5,
            max_canvas_pixels: 256_000_000,
        }
    }
}

impl Settings {
    /// Platform settings path.
    /// Linux: `$XDG_CONFIG_HOME/stickercut/settings.json`,
    /// Windows: `%APPDATA%\stickercut\settings.json`,
    /// macOS: `~/Library/Application Support/stickercut/settings.json`.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("stickercut").join("settings.json"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("stickercut")
                    .join("settings.json"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("stickercut").join("settings.json"))
        }
    }

    /// Load from the platform path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        Ok(settings.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp every value into a range the engine can work with.
    pub fn sanitized(mut self) -> Self {
        self.history_capacity = self.history_capacity.max(1);
        self.zoom_min = self.zoom_min.max(0.01);
        self.zoom_max = self.zoom_max.max(self.zoom_min);
        self.zoom_step = self.zoom_step.max(1.01);
        self.min_crop_size = self.min_crop_size.max(1.0);
        self.corner_hit_radius_px = self.corner_hit_radius_px.max(1.0);
        self.guide_hit_margin = self.guide_hit_margin.max(0.0);
        self.hole_alpha_threshold = self.hole_alpha_threshold.max(1);
        self.edge_grow_divisor = self.edge_grow_divisor.max(10.5);
        self.edge_shrink_divisor = self.edge_shrink_divisor.max(0.1);
        self.edge_hard_cut_alpha = self.edge_hard_cut_alpha.clamp(0.0, 1.0);
        self.max_soft_edge_blur = self.max_soft_edge_blur.max(0.0);
        self.preview_stroke_samples = self.preview_stroke_samples.max(12);
        self.export_stroke_samples = self.export_stroke_samples.max(self.preview_stroke_samples);
        self.ai_mask_threshold = self.ai_mask_threshold.clamp(0.0, 1.0);
        self.max_canvas_pixels = self.max_canvas_pixels.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "history_capacity": 7 }"#).unwrap();
        assert_eq!(settings.history_capacity, 7);
        assert_eq!(settings.hole_alpha_threshold, 50);
        assert_eq!(settings.export_stroke_samples, 36);
    }

    #[test]
    fn sanitize_clamps_nonsense() {
        let settings = Settings::from_json(
            r#"{ "history_capacity": 0, "zoom_min": 2.0, "zoom_max": 1.0, "preview_stroke_samples": 3 }"#,
        )
        .unwrap();
        assert_eq!(settings.history_capacity, 1);
        assert!(settings.zoom_max >= settings.zoom_min);
        assert_eq!(settings.preview_stroke_samples, 12);
    }

    #[test]
    fn zero_hole_threshold_is_raised() {
        let settings = Settings {
            hole_alpha_threshold: 0,
            max_soft_edge_blur: f32::NAN,
            min_crop_size: -4.0,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.hole_alpha_threshold, 1);
        assert_eq!(settings.max_soft_edge_blur, 0.0);
        assert_eq!(settings.min_crop_size, 1.0);
    }

    #[test]
    fn malformed_json_is_a_settings_error() {
        let err = Settings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::StickerError::Settings(_)));
    }

    #[test]
    fn save_and_reload() {
        let dir = std::env::temp_dir().join(format!("stickercut-settings-{}", uuid::Uuid::new_v4()));
        let path = dir.join("settings.json");
        let mut settings = Settings::default();
        settings.zoom_max = 4.0;
        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        let _ = std::fs::remove_dir_all(dir);
    }
}
