//! Vello-based renderer implementation.

use std::sync::Arc;

use kurbo::{Affine, BezPath, Circle, Point, Rect, RoundedRect, Stroke};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{Brush, Color, Fill};
use vello::Scene;

use crate::painter::{FramePainter, FrameStats};
use crate::renderer::{Painter, RenderContext, Renderer};

/// Vello-based renderer for GPU-accelerated 2D graphics.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Font context for titles (fonts are registered once).
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
    /// Active transforms, innermost last.
    transforms: Vec<Affine>,
    last_stats: FrameStats,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    /// Create a new Vello renderer with no fonts registered.
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            transforms: Vec::new(),
            last_stats: FrameStats::default(),
        }
    }

    /// Register font data (TTF/OTF) used for titles and labels.
    pub fn register_font(&mut self, data: Vec<u8>) {
        let families = self
            .font_cx
            .collection
            .register_fonts(vello::peniko::Blob::new(Arc::new(data)), None);
        log::debug!("registered {} font families", families.len());
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    fn transform(&self) -> Affine {
        self.transforms.last().copied().unwrap_or(Affine::IDENTITY)
    }
}

impl Painter for VelloRenderer {
    fn fill_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        let transform = self.transform();
        let shape = RoundedRect::from_rect(rect, radius);
        self.scene.fill(Fill::NonZero, transform, color, None, &shape);
    }

    fn stroke_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Color) {
        let transform = self.transform();
        let shape = RoundedRect::from_rect(rect, radius);
        self.scene
            .stroke(&Stroke::new(width), transform, color, None, &shape);
    }

    fn fill_circle(&mut self, centre: Point, radius: f64, color: Color) {
        let transform = self.transform();
        self.scene
            .fill(Fill::NonZero, transform, color, None, &Circle::new(centre, radius));
    }

    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color) {
        let transform = self.transform();
        self.scene
            .stroke(&Stroke::new(width), transform, color, None, path);
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        let transform = self.transform();
        self.scene.fill(Fill::NonZero, transform, color, None, path);
    }

    fn text(&mut self, pos: Point, text: &str, size: f64, color: Color) {
        if text.is_empty() {
            return;
        }
        let brush = Brush::Solid(color);
        let mut builder = self
            .layout_cx
            .ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(size as f32));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

        // Layout y=0 is the top of the first line.
        let text_transform = self.transform() * Affine::translate(pos.to_vec2());
        let mut glyph_count = 0;

        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let glyph_xform = run
                    .synthesis()
                    .skew()
                    .map(|angle| Affine::skew(angle.to_radians().tan() as f64, 0.0));

                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        let gy = y - glyph.y;
                        x += glyph.advance;
                        vello::Glyph { id: glyph.id, x: gx, y: gy }
                    })
                    .collect();
                glyph_count += glyphs.len();

                if !glyphs.is_empty() {
                    self.scene
                        .draw_glyphs(run.font())
                        .brush(&brush)
                        .hint(true)
                        .transform(text_transform)
                        .glyph_transform(glyph_xform)
                        .font_size(run.font_size())
                        .normalized_coords(run.normalized_coords())
                        .draw(Fill::NonZero, glyphs.into_iter());
                }
            }
        }

        // No font registered: mark where the text would go.
        if glyph_count == 0 {
            let width = (text.chars().count() as f64 * size * 0.6).max(size);
            let rect = Rect::new(pos.x, pos.y, pos.x + width, pos.y + size * 1.2);
            let transform = self.transform();
            self.scene
                .fill(Fill::NonZero, transform, color.multiply_alpha(0.25), None, &rect);
        }
    }

    fn push_transform(&mut self, transform: Affine) {
        let combined = self.transform() * transform;
        self.transforms.push(combined);
    }

    fn pop_transform(&mut self) {
        self.transforms.pop();
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();
        self.transforms.clear();
        self.last_stats = FramePainter::new(ctx).paint(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;
    use wirecanvas_core::graph::Node;
    use wirecanvas_core::{Canvas, CanvasConfig, Graph};

    #[test]
    fn test_renderer_creation() {
        let renderer = VelloRenderer::new();
        assert!(renderer.transforms.is_empty());
    }

    #[test]
    fn test_build_empty_scene() {
        let canvas = Canvas::new(CanvasConfig::default());
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut renderer = VelloRenderer::new();
        renderer.build_scene(&ctx);
        assert_eq!(renderer.last_stats(), FrameStats::default());
    }

    #[test]
    fn test_build_scene_balances_transforms() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("n").with_title("Node").with_pos(10.0, 40.0));
        let mut canvas = Canvas::new(CanvasConfig::default()).with_graph(graph);
        canvas.prepare_frame(Size::new(800.0, 600.0));
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut renderer = VelloRenderer::new();
        renderer.build_scene(&ctx);
        assert!(renderer.transforms.is_empty());
        assert_eq!(renderer.last_stats().nodes, 1);
    }
}
