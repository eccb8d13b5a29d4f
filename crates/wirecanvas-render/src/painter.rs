//! Frame composition: walks the active graph and emits draw calls in layer order.

use std::collections::BTreeSet;

use kurbo::{BezPath, Circle, Point, Rect, Shape, Size};
use peniko::Color;
use wirecanvas_core::graph::{
    Graph, Group, IoKind, Node, GROUP_DEFAULT_COLOR, GROUP_RESIZE_LENGTH, NODE_TITLE_HEIGHT,
    REROUTE_RADIUS,
};
use wirecanvas_core::link_connector::{RenderLink, SlotKind};
use wirecanvas_core::link_geometry::{build_segment, SegmentEnds};
use wirecanvas_core::measure::overlap_bounding;
use wirecanvas_core::selection::highlighted_links;
use wirecanvas_core::{LinkDirection, LinkId};

use crate::renderer::{parse_color, GridStyle, Painter, RenderContext};

/// Draw layers, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Background,
    Groups,
    Links,
    Reroutes,
    Nodes,
    Overlay,
}

/// Grid cells smaller than this on screen are merged.
const MIN_GRID_PIXELS: f64 = 8.0;
/// Upper bound on grid lines per axis.
const MAX_GRID_LINES: f64 = 400.0;
const SLOT_RADIUS: f64 = 4.0;
const LINK_MARKER_RADIUS: f64 = 5.0;
const NODE_CORNER_RADIUS: f64 = 8.0;
const TITLE_FONT_SIZE: f64 = 14.0;
const SLOT_FONT_SIZE: f64 = 12.0;
const SELECTION_OUTLINE: f64 = 2.0;

/// What a frame drew after culling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub groups: usize,
    pub links: usize,
    pub reroutes: usize,
    pub nodes: usize,
}

/// Paints one frame of a canvas onto a `Painter`.
pub struct FramePainter<'a, 'c> {
    ctx: &'a RenderContext<'c>,
    /// Culling area in graph space.
    margin: Rect,
    scale: f64,
}

impl<'a, 'c> FramePainter<'a, 'c> {
    pub fn new(ctx: &'a RenderContext<'c>) -> Self {
        let scale_factor = ctx.scale_factor.max(f64::EPSILON);
        let logical = Size::new(
            ctx.viewport_size.width / scale_factor,
            ctx.viewport_size.height / scale_factor,
        );
        Self {
            ctx,
            margin: ctx.canvas.viewport.margin_area(logical),
            scale: ctx.canvas.viewport.scale,
        }
    }

    /// Draw every layer. Nothing but the background is drawn without an
    /// active graph.
    pub fn paint<P: Painter + ?Sized>(&self, painter: &mut P) -> FrameStats {
        let mut stats = FrameStats::default();
        painter.begin_layer(Layer::Background);
        let screen = Rect::from_origin_size(Point::ZERO, self.ctx.viewport_size);
        painter.fill_rect(screen, 0.0, self.ctx.background_color);

        let Some(graph) = self.ctx.canvas.graph() else {
            log::trace!("no active graph, background only");
            return stats;
        };

        painter.push_transform(self.ctx.view_transform());
        self.paint_grid(painter);

        painter.begin_layer(Layer::Groups);
        for group in graph.groups() {
            if overlap_bounding(group.bounding, self.margin) {
                self.paint_group(painter, group);
                stats.groups += 1;
            }
        }

        painter.begin_layer(Layer::Links);
        stats.links = self.paint_links(painter, graph);

        painter.begin_layer(Layer::Reroutes);
        stats.reroutes = self.paint_reroutes(painter, graph);

        painter.begin_layer(Layer::Nodes);
        self.paint_io_nodes(painter, graph);
        for node in graph.nodes() {
            if overlap_bounding(node.bounding(), self.margin) {
                self.paint_node(painter, node);
                stats.nodes += 1;
            }
        }

        painter.begin_layer(Layer::Overlay);
        self.paint_connector(painter, graph);
        if let Some(rect) = self.ctx.canvas.selection_rect {
            painter.fill_rect(rect, 0.0, self.ctx.selection_color.multiply_alpha(0.1));
            painter.stroke_rect(rect, 0.0, 1.0 / self.scale, self.ctx.selection_color);
        }

        painter.pop_transform();
        stats
    }

    fn paint_grid<P: Painter + ?Sized>(&self, painter: &mut P) {
        if self.ctx.grid_style == GridStyle::None {
            return;
        }
        let mut spacing = self.ctx.canvas.config.grid_size.max(1.0);
        while spacing * self.scale < MIN_GRID_PIXELS {
            spacing *= 2.0;
        }
        let area = self.margin;
        if area.width() / spacing > MAX_GRID_LINES || area.height() / spacing > MAX_GRID_LINES {
            return;
        }
        let color = Color::from_rgba8(255, 255, 255, 12);
        let start_x = (area.x0 / spacing).floor() * spacing;
        let start_y = (area.y0 / spacing).floor() * spacing;

        match self.ctx.grid_style {
            GridStyle::Lines => {
                let mut path = BezPath::new();
                let mut x = start_x;
                while x <= area.x1 {
                    path.move_to((x, area.y0));
                    path.line_to((x, area.y1));
                    x += spacing;
                }
                let mut y = start_y;
                while y <= area.y1 {
                    path.move_to((area.x0, y));
                    path.line_to((area.x1, y));
                    y += spacing;
                }
                painter.stroke_path(&path, 1.0 / self.scale, color);
            }
            GridStyle::Dots => {
                let mut path = BezPath::new();
                let radius = 1.0 / self.scale;
                let mut x = start_x;
                while x <= area.x1 {
                    let mut y = start_y;
                    while y <= area.y1 {
                        path.extend(Circle::new((x, y), radius).path_elements(0.1));
                        y += spacing;
                    }
                    x += spacing;
                }
                painter.fill_path(&path, Color::from_rgba8(255, 255, 255, 40));
            }
            GridStyle::None => {}
        }
    }

    fn paint_group<P: Painter + ?Sized>(&self, painter: &mut P, group: &Group) {
        let color = group
            .color
            .as_deref()
            .and_then(parse_color)
            .or_else(|| parse_color(GROUP_DEFAULT_COLOR))
            .unwrap_or(self.ctx.node_color);
        let rect = group.bounding;
        painter.fill_rect(rect, 4.0, color.multiply_alpha(0.25));

        let title = Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + group.title_height());
        painter.fill_rect(title, 4.0, color.multiply_alpha(0.6));
        let inset = (group.title_height() - group.font_size) * 0.5;
        painter.text(
            Point::new(rect.x0 + inset, rect.y0 + inset),
            &group.title,
            group.font_size,
            self.ctx.title_text_color,
        );

        let mut handle = BezPath::new();
        handle.move_to((rect.x1, rect.y1));
        handle.line_to((rect.x1 - GROUP_RESIZE_LENGTH, rect.y1));
        handle.line_to((rect.x1, rect.y1 - GROUP_RESIZE_LENGTH));
        handle.close_path();
        painter.fill_path(&handle, color);

        if group.selected {
            painter.stroke_rect(rect, 4.0, SELECTION_OUTLINE / self.scale, self.ctx.selection_color);
        }
    }

    fn paint_links<P: Painter + ?Sized>(&self, painter: &mut P, graph: &Graph) -> usize {
        let config = &self.ctx.canvas.config;
        let highlighted: BTreeSet<LinkId> = if config.highlight_selected_links {
            highlighted_links(graph, &self.ctx.canvas.selection)
        } else {
            BTreeSet::new()
        };
        let segments = self.ctx.canvas.layout.segments();
        for segment in segments {
            let mut color = self.ctx.link_color(&segment.type_name, segment.color.as_deref());
            if segment.alpha < 1.0 {
                color = color.multiply_alpha(segment.alpha as f32);
            }
            let width = config.connections_width;
            let border = if highlighted.contains(&segment.link) {
                self.ctx.selection_color
            } else {
                Color::from_rgba8(0, 0, 0, 128)
            };
            painter.stroke_path(&segment.path, width + 2.0, border.multiply_alpha(segment.alpha as f32));
            painter.stroke_path(&segment.path, width, color);

            if config.render_link_markers && !segment.floating {
                let radius = if self.ctx.canvas.over_link_center == Some(segment.key) {
                    LINK_MARKER_RADIUS * 1.4
                } else {
                    LINK_MARKER_RADIUS
                };
                painter.fill_circle(segment.centre, radius, color);
            }
        }
        segments.len()
    }

    fn paint_reroutes<P: Painter + ?Sized>(&self, painter: &mut P, graph: &Graph) -> usize {
        let mut drawn = 0;
        for &id in self.ctx.canvas.layout.visible_reroutes() {
            let Some(reroute) = graph.reroute(id) else { continue };
            let link = reroute.link_ids.iter().find_map(|&l| graph.link(l));
            let color = link
                .map(|l| self.ctx.link_color(&l.type_name, l.color.as_deref()))
                .unwrap_or(self.ctx.default_link_color);
            painter.fill_circle(reroute.pos, REROUTE_RADIUS, color);
            painter.fill_circle(reroute.pos, REROUTE_RADIUS * 0.5, Color::from_rgba8(0, 0, 0, 96));
            if reroute.selected {
                let ring = Circle::new(reroute.pos, REROUTE_RADIUS + 2.0).to_path(0.1);
                painter.stroke_path(&ring, SELECTION_OUTLINE / self.scale, self.ctx.selection_color);
            }
            drawn += 1;
        }
        drawn
    }

    fn paint_io_nodes<P: Painter + ?Sized>(&self, painter: &mut P, graph: &Graph) {
        let Some(io) = &graph.io else { return };
        for kind in [IoKind::Input, IoKind::Output] {
            let node = io.get(kind);
            let rect = node.bounding();
            if !overlap_bounding(rect, self.margin) {
                continue;
            }
            painter.fill_rect(rect, NODE_CORNER_RADIUS, self.ctx.node_color.multiply_alpha(0.5));
            for (i, slot) in node.slots.iter().enumerate() {
                let color = self.ctx.link_color(&slot.type_name, None);
                painter.fill_circle(node.slot_pos(i), SLOT_RADIUS, color);
            }
            if node.selected {
                painter.stroke_rect(rect, NODE_CORNER_RADIUS, SELECTION_OUTLINE / self.scale, self.ctx.selection_color);
            }
        }
    }

    fn paint_node<P: Painter + ?Sized>(&self, painter: &mut P, node: &Node) {
        let color = node.color.as_deref().and_then(parse_color).unwrap_or(self.ctx.node_color);
        let bgcolor = node.bgcolor.as_deref().and_then(parse_color).unwrap_or(self.ctx.node_bgcolor);
        let bounding = node.bounding();
        let title_inset = (NODE_TITLE_HEIGHT - TITLE_FONT_SIZE) * 0.5;

        if node.is_collapsed() {
            painter.fill_rect(bounding, NODE_CORNER_RADIUS, color);
            painter.text(
                Point::new(bounding.x0 + NODE_TITLE_HEIGHT, bounding.y0 + title_inset),
                &node.title,
                TITLE_FONT_SIZE,
                self.ctx.title_text_color,
            );
            if node.inputs.iter().any(|s| s.link.is_some()) {
                painter.fill_circle(node.input_pos(0), SLOT_RADIUS, self.ctx.default_link_color);
            }
            if node.outputs.iter().any(|s| !s.links.is_empty()) {
                painter.fill_circle(node.output_pos(0), SLOT_RADIUS, self.ctx.default_link_color);
            }
        } else {
            painter.fill_rect(bounding, NODE_CORNER_RADIUS, bgcolor);
            let title = node.title_bar();
            painter.fill_rect(title, NODE_CORNER_RADIUS, color);
            painter.fill_circle(node.collapse_box().center(), SLOT_RADIUS, self.ctx.title_text_color);
            painter.text(
                Point::new(title.x0 + NODE_TITLE_HEIGHT, title.y0 + title_inset),
                &node.title,
                TITLE_FONT_SIZE,
                self.ctx.title_text_color,
            );
            self.paint_slots(painter, node);

            for widget in &node.widgets {
                let rect = Rect::new(
                    node.pos.x + 6.0,
                    node.pos.y + widget.y,
                    node.pos.x + node.size.width - 6.0,
                    node.pos.y + widget.y + widget.height,
                );
                let alpha = if widget.disabled { 0.4 } else { 1.0 };
                painter.stroke_rect(rect, widget.height * 0.5, 1.0, self.ctx.title_text_color.multiply_alpha(alpha));
                painter.text(
                    Point::new(rect.x0 + 10.0, rect.y0 + (widget.height - SLOT_FONT_SIZE) * 0.5),
                    &widget.name,
                    SLOT_FONT_SIZE,
                    self.ctx.title_text_color.multiply_alpha(alpha),
                );
            }
        }

        if node.selected {
            painter.stroke_rect(
                bounding.inflate(2.0, 2.0),
                NODE_CORNER_RADIUS + 2.0,
                SELECTION_OUTLINE / self.scale,
                self.ctx.selection_color,
            );
        }
    }

    fn paint_slots<P: Painter + ?Sized>(&self, painter: &mut P, node: &Node) {
        let highlighted = self.ctx.canvas.highlighted_slot;
        let label_color = self.ctx.title_text_color;
        for (i, input) in node.inputs.iter().enumerate() {
            let pos = node.input_pos(i);
            let color = self.ctx.link_color(&input.type_name, None);
            let radius = slot_radius(highlighted == Some((node.id, SlotKind::Input, i)));
            let color = if input.link.is_some() { color } else { color.multiply_alpha(0.5) };
            painter.fill_circle(pos, radius, color);
            painter.text(
                Point::new(pos.x + 2.0 * SLOT_RADIUS, pos.y - SLOT_FONT_SIZE * 0.5),
                &input.name,
                SLOT_FONT_SIZE,
                label_color,
            );
        }
        for (i, output) in node.outputs.iter().enumerate() {
            let pos = node.output_pos(i);
            let color = self.ctx.link_color(&output.type_name, None);
            let radius = slot_radius(highlighted == Some((node.id, SlotKind::Output, i)));
            let color = if output.links.is_empty() { color.multiply_alpha(0.5) } else { color };
            painter.fill_circle(pos, radius, color);
            // Right-aligned using an average glyph width.
            let width = output.name.chars().count() as f64 * SLOT_FONT_SIZE * 0.55;
            painter.text(
                Point::new(pos.x - 2.0 * SLOT_RADIUS - width, pos.y - SLOT_FONT_SIZE * 0.5),
                &output.name,
                SLOT_FONT_SIZE,
                label_color,
            );
        }
    }

    /// Candidate links following the pointer while a connector drag is live.
    fn paint_connector<P: Painter + ?Sized>(&self, painter: &mut P, graph: &Graph) {
        let connector = &self.ctx.canvas.connector;
        if !connector.is_connecting() {
            return;
        }
        let Some(loose) = connector.loose_end() else { return };
        let mode = self.ctx.canvas.config.link_render_mode;
        for link in &connector.render_links {
            let Some(ends) = connector_ends(link, graph, loose) else { continue };
            let Some(shape) = build_segment(mode, &ends) else { continue };
            let color = self.ctx.link_color(&link.type_name, None);
            painter.stroke_path(&shape.path, self.ctx.canvas.config.connections_width, color);
        }
        painter.fill_circle(loose, SLOT_RADIUS, self.ctx.default_link_color);
    }
}

fn slot_radius(highlighted: bool) -> f64 {
    if highlighted { SLOT_RADIUS * 1.5 } else { SLOT_RADIUS }
}

/// Ends of a candidate link, always drawn output to input.
fn connector_ends(link: &RenderLink, graph: &Graph, loose: Point) -> Option<SegmentEnds> {
    let fixed = link.fixed_pos(graph)?;
    Some(match link.to {
        SlotKind::Input => SegmentEnds::new(fixed, loose, link.from_direction, LinkDirection::Center),
        SlotKind::Output => SegmentEnds::new(loose, fixed, LinkDirection::Center, link.from_direction),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingPainter;
    use wirecanvas_core::{Canvas, CanvasConfig, LinkConnector};

    fn canvas_with(nodes: &[(f64, f64)]) -> Canvas {
        let mut graph = Graph::new();
        for &(x, y) in nodes {
            graph.add_node(Node::new("test").with_pos(x, y).with_size(100.0, 60.0));
        }
        let mut canvas = Canvas::new(CanvasConfig::default()).with_graph(graph);
        canvas.prepare_frame(Size::new(800.0, 600.0));
        canvas
    }

    #[test]
    fn test_offscreen_nodes_are_culled() {
        let canvas = canvas_with(&[(100.0, 100.0), (5000.0, 5000.0), (-3000.0, 200.0)]);
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut painter = RecordingPainter::new();
        let stats = FramePainter::new(&ctx).paint(&mut painter);
        assert_eq!(stats.nodes, 1);
    }

    #[test]
    fn test_background_only_without_graph() {
        let canvas = Canvas::new(CanvasConfig::default());
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let mut painter = RecordingPainter::new();
        let stats = FramePainter::new(&ctx).paint(&mut painter);
        assert_eq!(stats, FrameStats::default());
        assert_eq!(painter.commands().len(), 1);
    }

    #[test]
    fn test_grid_skipped_when_disabled() {
        let canvas = canvas_with(&[]);
        let with_grid = RenderContext::new(&canvas, Size::new(800.0, 600.0));
        let without_grid = RenderContext::new(&canvas, Size::new(800.0, 600.0)).with_grid(GridStyle::None);

        let mut a = RecordingPainter::new();
        FramePainter::new(&with_grid).paint(&mut a);
        let mut b = RecordingPainter::new();
        FramePainter::new(&without_grid).paint(&mut b);
        assert_eq!(a.commands().len(), b.commands().len() + 1);
    }

    #[test]
    fn test_connector_ends_run_output_to_input() {
        let mut graph = Graph::new();
        let id = graph.add_node(Node::new("a").with_pos(0.0, 0.0).with_output("out", "number"));
        let mut connector = LinkConnector::new();
        connector.drag_new_from_output(&graph, id, 0).unwrap();
        let link = &connector.render_links[0];
        let loose = Point::new(300.0, 40.0);
        let ends = connector_ends(link, &graph, loose).unwrap();
        assert_eq!(ends.end, loose);
        assert_eq!(Some(ends.start), graph.node(id).map(|n| n.output_pos(0)));
    }
}
