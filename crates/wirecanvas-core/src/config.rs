//! Canvas configuration.

use crate::link_geometry::{LinkRenderMode, FLOATING_LINK_ALPHA};
use crate::measure::GRID_SIZE;
use crate::viewport::{MAX_SCALE, MIN_SCALE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the primary button behaves on empty canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// Drag pans; Ctrl+drag draws a selection rectangle.
    #[default]
    Legacy,
    /// Drag draws a selection rectangle; Space or middle button pans.
    Standard,
}

/// Behavioural and presentation switches for a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub link_render_mode: LinkRenderMode,
    /// Draw a marker at the centre of each link segment.
    pub render_link_markers: bool,
    pub connections_width: f64,
    /// Only panning and zooming are allowed.
    pub read_only: bool,
    /// Additive selection without holding a modifier.
    pub multi_select: bool,
    pub allow_dragcanvas: bool,
    pub allow_dragnodes: bool,
    /// Alt+drag on a node drags a clone.
    pub alt_drag_clones: bool,
    /// Snap dragged items on release.
    pub snap_to_grid: bool,
    pub grid_size: f64,
    /// Snap even without holding shift.
    pub always_snap_to_grid: bool,
    pub navigation_mode: NavigationMode,
    /// Multiplier per wheel notch.
    pub zoom_speed: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Frame rate cap; 0 follows the display refresh.
    pub maximum_fps: u32,
    /// Ctrl+Shift+V reconnects pasted inputs to outputs that were not copied.
    pub connect_unselected_outputs: bool,
    /// Delete with bypass: also reroute inputs without a same-index output.
    pub keep_all_links_on_bypass: bool,
    /// Highlight links attached to selected nodes.
    pub highlight_selected_links: bool,
    pub floating_link_alpha: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            link_render_mode: LinkRenderMode::Spline,
            render_link_markers: true,
            connections_width: 3.0,
            read_only: false,
            multi_select: false,
            allow_dragcanvas: true,
            allow_dragnodes: true,
            alt_drag_clones: true,
            snap_to_grid: false,
            grid_size: GRID_SIZE,
            always_snap_to_grid: false,
            navigation_mode: NavigationMode::Legacy,
            zoom_speed: 1.1,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            maximum_fps: 0,
            connect_unselected_outputs: true,
            keep_all_links_on_bypass: false,
            highlight_selected_links: true,
            floating_link_alpha: FLOATING_LINK_ALPHA,
        }
    }
}

impl CanvasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded canvas config from {}", path.display());
        Ok(config)
    }

    /// Grid size to snap to, if snapping applies.
    pub fn snap_size(&self, shift_held: bool) -> Option<f64> {
        let enabled = self.always_snap_to_grid || (self.snap_to_grid && shift_held);
        (enabled && self.grid_size > 0.0).then_some(self.grid_size)
    }

    /// Minimum gap between frames in milliseconds, if capped.
    pub fn frame_interval_ms(&self) -> Option<f64> {
        (self.maximum_fps > 0).then(|| 1000.0 / self.maximum_fps as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CanvasConfig::from_json(r#"{ "read_only": true, "link_render_mode": "linear" }"#).unwrap();
        assert!(config.read_only);
        assert_eq!(config.link_render_mode, LinkRenderMode::Linear);
        assert!(config.allow_dragnodes);
        assert!(config.connect_unselected_outputs);
        assert!((config.floating_link_alpha - 0.33).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(CanvasConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.json");
        std::fs::write(&path, r#"{ "maximum_fps": 30 }"#).unwrap();
        let config = CanvasConfig::load(&path).unwrap();
        assert_eq!(config.maximum_fps, 30);
        assert!(CanvasConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_snap_size() {
        let mut config = CanvasConfig::default();
        assert_eq!(config.snap_size(true), None);
        config.snap_to_grid = true;
        assert_eq!(config.snap_size(false), None);
        assert_eq!(config.snap_size(true), Some(GRID_SIZE));
        config.always_snap_to_grid = true;
        assert_eq!(config.snap_size(false), Some(GRID_SIZE));
    }

    #[test]
    fn test_frame_interval() {
        let mut config = CanvasConfig::default();
        assert_eq!(config.frame_interval_ms(), None);
        config.maximum_fps = 50;
        assert_eq!(config.frame_interval_ms(), Some(20.0));
    }
}
