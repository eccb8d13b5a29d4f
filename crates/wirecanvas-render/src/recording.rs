//! Headless backend that records draw calls instead of rasterising them.

use kurbo::{Affine, BezPath, Point, Rect};
use peniko::Color;

use crate::painter::{FramePainter, FrameStats, Layer};
use crate::renderer::{Painter, RenderContext, Renderer};

/// One recorded draw call.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    FillRect { rect: Rect, radius: f64, color: Color },
    StrokeRect { rect: Rect, radius: f64, width: f64, color: Color },
    FillCircle { centre: Point, radius: f64, color: Color },
    StrokePath { path: BezPath, width: f64, color: Color },
    FillPath { path: BezPath, color: Color },
    Text { pos: Point, text: String, size: f64, color: Color },
    PushTransform(Affine),
    PopTransform,
}

/// `Painter` that appends every call to a list, tagged with its layer.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    commands: Vec<(Layer, DrawCommand)>,
    layer: Option<Layer>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[(Layer, DrawCommand)] {
        &self.commands
    }

    /// Commands recorded while `layer` was current.
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(move |(l, _)| *l == layer)
            .map(|(_, c)| c)
    }

    /// Text strings drawn, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|(_, c)| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.layer = None;
    }

    fn push(&mut self, command: DrawCommand) {
        self.commands
            .push((self.layer.unwrap_or(Layer::Background), command));
    }
}

impl Painter for RecordingPainter {
    fn fill_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        self.push(DrawCommand::FillRect { rect, radius, color });
    }

    fn stroke_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Color) {
        self.push(DrawCommand::StrokeRect { rect, radius, width, color });
    }

    fn fill_circle(&mut self, centre: Point, radius: f64, color: Color) {
        self.push(DrawCommand::FillCircle { centre, radius, color });
    }

    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color) {
        self.push(DrawCommand::StrokePath { path: path.clone(), width, color });
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        self.push(DrawCommand::FillPath { path: path.clone(), color });
    }

    fn text(&mut self, pos: Point, text: &str, size: f64, color: Color) {
        self.push(DrawCommand::Text { pos, text: text.to_string(), size, color });
    }

    fn push_transform(&mut self, transform: Affine) {
        self.push(DrawCommand::PushTransform(transform));
    }

    fn pop_transform(&mut self) {
        self.push(DrawCommand::PopTransform);
    }

    fn begin_layer(&mut self, layer: Layer) {
        self.layer = Some(layer);
    }
}

/// `Renderer` over a `RecordingPainter`. Each `build_scene` replaces the
/// previous recording.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    painter: RecordingPainter,
    last_stats: FrameStats,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn painter(&self) -> &RecordingPainter {
        &self.painter
    }

    pub fn commands(&self) -> &[(Layer, DrawCommand)] {
        self.painter.commands()
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }
}

impl Renderer for RecordingRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.painter.clear();
        self.last_stats = FramePainter::new(ctx).paint(&mut self.painter);
        log::debug!(
            "recorded {} commands ({:?})",
            self.painter.commands().len(),
            self.last_stats
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;
    use wirecanvas_core::graph::{Group, Node};
    use wirecanvas_core::{Canvas, CanvasConfig, Graph, ItemId};

    fn sample_canvas() -> Canvas {
        let mut graph = Graph::new();
        let a = graph.add_node(
            Node::new("source")
                .with_title("Source")
                .with_pos(100.0, 100.0)
                .with_size(140.0, 60.0)
                .with_output("value", "number"),
        );
        let b = graph.add_node(
            Node::new("sink")
                .with_title("Sink")
                .with_pos(400.0, 120.0)
                .with_size(140.0, 60.0)
                .with_input("value", "number"),
        );
        graph.connect(a, 0, b, 0, None).unwrap();
        graph.add_group(Group::new("Stage", Rect::new(50.0, 20.0, 600.0, 300.0)));
        let mut canvas = Canvas::new(CanvasConfig::default()).with_graph(graph);
        canvas.select(ItemId::Node(a)).unwrap();
        canvas.prepare_frame(Size::new(800.0, 600.0));
        canvas
    }

    #[test]
    fn test_layers_in_order() {
        let canvas = sample_canvas();
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut renderer = RecordingRenderer::new();
        renderer.build_scene(&ctx);

        let layers: Vec<Layer> = renderer.commands().iter().map(|(l, _)| *l).collect();
        assert!(layers.windows(2).all(|w| w[0] <= w[1]));
        for layer in [Layer::Background, Layer::Groups, Layer::Links, Layer::Nodes, Layer::Overlay] {
            assert!(layers.contains(&layer), "missing {layer:?}");
        }
        let stats = renderer.last_stats();
        assert_eq!((stats.groups, stats.links, stats.nodes), (1, 1, 2));
    }

    #[test]
    fn test_group_title_before_node_titles() {
        let canvas = sample_canvas();
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut renderer = RecordingRenderer::new();
        renderer.build_scene(&ctx);
        let texts = renderer.painter().texts();
        let stage = texts.iter().position(|t| *t == "Stage").unwrap();
        let source = texts.iter().position(|t| *t == "Source").unwrap();
        assert!(stage < source);
        assert!(texts.contains(&"Sink"));
    }

    #[test]
    fn test_selected_node_is_outlined() {
        let canvas = sample_canvas();
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut renderer = RecordingRenderer::new();
        renderer.build_scene(&ctx);
        let outlines = renderer
            .painter()
            .layer(Layer::Nodes)
            .filter(|c| matches!(c, DrawCommand::StrokeRect { .. }))
            .count();
        assert_eq!(outlines, 1);
    }

    #[test]
    fn test_transforms_balanced() {
        let canvas = sample_canvas();
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0)).with_scale_factor(2.0);
        let mut renderer = RecordingRenderer::new();
        renderer.build_scene(&ctx);
        renderer.build_scene(&ctx);
        let pushes = renderer
            .commands()
            .iter()
            .filter(|(_, c)| matches!(c, DrawCommand::PushTransform(_)))
            .count();
        let pops = renderer
            .commands()
            .iter()
            .filter(|(_, c)| matches!(c, DrawCommand::PopTransform))
            .count();
        assert_eq!((pushes, pops), (1, 1));
    }
}
