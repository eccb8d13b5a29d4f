//! Renderer trait abstraction.

use std::collections::HashMap;

use kurbo::{Affine, BezPath, Point, Rect, Size};
use peniko::Color;
use thiserror::Error;
use wirecanvas_core::CanvasState;

use crate::painter::Layer;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Invalid colour: {0}")]
    InvalidColor(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// Plain background.
    None,
    /// Full grid lines.
    #[default]
    Lines,
    /// Only intersection dots.
    Dots,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::None => GridStyle::Lines,
            GridStyle::Lines => GridStyle::Dots,
            GridStyle::Dots => GridStyle::None,
        }
    }

    /// Get display name for this grid style.
    pub fn name(self) -> &'static str {
        match self {
            GridStyle::None => "None",
            GridStyle::Lines => "Lines",
            GridStyle::Dots => "Dots",
        }
    }
}

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    match hex.len() {
        3 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        4 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The canvas to render.
    pub canvas: &'a CanvasState,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    pub background_color: Color,
    pub grid_style: GridStyle,
    /// Outline for selected items and the selection rectangle.
    pub selection_color: Color,
    /// Link colour per slot type name.
    pub link_type_colors: HashMap<String, Color>,
    /// Link colour when neither the link nor its type has one.
    pub default_link_color: Color,
    pub node_color: Color,
    pub node_bgcolor: Color,
    pub title_text_color: Color,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(canvas: &'a CanvasState, viewport_size: Size) -> Self {
        Self {
            canvas,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(34, 34, 34, 255),
            grid_style: GridStyle::Lines,
            selection_color: Color::from_rgba8(255, 255, 255, 255),
            link_type_colors: HashMap::new(),
            default_link_color: Color::from_rgba8(153, 170, 153, 255),
            node_color: Color::from_rgba8(51, 51, 51, 255),
            node_bgcolor: Color::from_rgba8(53, 53, 53, 255),
            title_text_color: Color::from_rgba8(153, 153, 153, 255),
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the grid style.
    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }

    /// Colour links carrying `type_name`.
    pub fn with_link_color(mut self, type_name: impl Into<String>, color: Color) -> Self {
        self.link_type_colors.insert(type_name.into(), color);
        self
    }

    /// Like `with_link_color`, from a hex string.
    pub fn with_link_hex(self, type_name: impl Into<String>, hex: &str) -> RenderResult<Self> {
        let color = parse_color(hex).ok_or_else(|| RendererError::InvalidColor(hex.to_string()))?;
        Ok(self.with_link_color(type_name, color))
    }

    /// Resolve a link colour: its own colour, then its type's, then the default.
    pub fn link_color(&self, type_name: &str, explicit: Option<&str>) -> Color {
        explicit
            .and_then(parse_color)
            .or_else(|| self.link_type_colors.get(type_name).copied())
            .unwrap_or(self.default_link_color)
    }

    /// Transform from graph space to physical pixels.
    pub fn view_transform(&self) -> Affine {
        Affine::scale(self.scale_factor) * self.canvas.viewport.transform()
    }
}

/// Drawing primitives a backend provides to `FramePainter`.
///
/// Coordinates are in the space set by the innermost `push_transform`.
pub trait Painter {
    fn fill_rect(&mut self, rect: Rect, radius: f64, color: Color);
    fn stroke_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Color);
    fn fill_circle(&mut self, centre: Point, radius: f64, color: Color);
    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color);
    fn fill_path(&mut self, path: &BezPath, color: Color);
    /// Draw `text` with its top-left corner at `pos`.
    fn text(&mut self, pos: Point, text: &str, size: f64, color: Color);
    fn push_transform(&mut self, transform: Affine);
    fn pop_transform(&mut self);
    /// Called as each layer begins.
    fn begin_layer(&mut self, _layer: Layer) {}
}

/// Renderer trait that all rendering backends must implement.
pub trait Renderer: Send + Sync {
    /// Build the scene for the current frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color.
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecanvas_core::CanvasConfig;

    fn rgba(color: Color) -> (u8, u8, u8, u8) {
        let c = color.to_rgba8();
        (c.r, c.g, c.b, c.a)
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(rgba(parse_color("#353").unwrap()), (0x33, 0x55, 0x33, 255));
        assert_eq!(rgba(parse_color("#12ab34").unwrap()), (0x12, 0xab, 0x34, 255));
        assert_eq!(rgba(parse_color("#ffffff80").unwrap()).3, 0x80);
        assert!(parse_color("353").is_none());
        assert!(parse_color("#12345").is_none());
        assert!(parse_color("#+f+f+f").is_none());
        assert!(parse_color("#ggg").is_none());
    }

    #[test]
    fn test_link_color_precedence() {
        let canvas = CanvasState::new(CanvasConfig::default());
        let number = Color::from_rgba8(170, 170, 170, 255);
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0)).with_link_color("number", number);

        assert_eq!(rgba(ctx.link_color("number", Some("#f00"))), (255, 0, 0, 255));
        assert_eq!(rgba(ctx.link_color("number", None)), rgba(number));
        assert_eq!(rgba(ctx.link_color("number", Some("bogus"))), rgba(number));
        assert_eq!(rgba(ctx.link_color("image", None)), rgba(ctx.default_link_color));
    }

    #[test]
    fn test_link_hex_rejects_garbage() {
        let canvas = CanvasState::new(CanvasConfig::default());
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        assert!(matches!(
            ctx.with_link_hex("number", "blue"),
            Err(RendererError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_grid_style_cycle() {
        let mut style = GridStyle::default();
        for _ in 0..3 {
            style = style.next();
        }
        assert_eq!(style, GridStyle::Lines);
        assert_eq!(GridStyle::Dots.name(), "Dots");
    }
}
