//! Link and reroute geometry.
//!
//! Every frame the canvas rebuilds a [`LinkLayout`]: one [`RenderedSegment`]
//! per drawn piece of every visible link. The layout is what the renderer
//! strokes and what link hit tests query until the next frame.

use crate::graph::{
    FloatingEnd, Graph, Link, LinkId, RerouteId, SegmentId, REROUTE_MAX_SPLINE_OFFSET,
};
use crate::measure::{distance, is_point_in_rect, overlap_bounding, LinkDirection};
use kurbo::{
    BezPath, CubicBez, ParamCurve, ParamCurveNearest, Point, Rect, Vec2,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Stub length of linear links.
pub const LINEAR_STUB: f64 = 15.0;
/// Stub length of straight (elbow) links.
pub const STRAIGHT_STUB: f64 = 10.0;
/// Spline control offset as a fraction of segment length.
pub const SPLINE_FACTOR: f64 = 0.25;
/// Opacity of floating links.
pub const FLOATING_LINK_ALPHA: f64 = 0.33;
/// Side of the square hit box around a link's centre marker.
pub const LINK_CENTRE_HIT_SIZE: f64 = 8.0;

/// How links are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRenderMode {
    Straight,
    Linear,
    #[default]
    Spline,
    /// Links are not drawn and cannot be hit.
    Hidden,
}

/// Endpoints and bend hints for one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentEnds {
    pub start: Point,
    pub end: Point,
    pub start_dir: LinkDirection,
    pub end_dir: LinkDirection,
    /// Explicit control offset from `start`, overriding `start_dir`.
    pub start_control: Option<Vec2>,
    /// Explicit control offset from `end`, overriding `end_dir`.
    pub end_control: Option<Vec2>,
}

impl SegmentEnds {
    pub fn new(start: Point, end: Point, start_dir: LinkDirection, end_dir: LinkDirection) -> Self {
        Self {
            start,
            end,
            start_dir,
            end_dir,
            start_control: None,
            end_control: None,
        }
    }
}

/// Path, centre and centre angle of a segment.
#[derive(Debug, Clone)]
pub struct SegmentShape {
    pub path: BezPath,
    pub centre: Point,
    pub centre_angle: f64,
}

/// Build the path for one segment in the given mode. Returns `None` for
/// [`LinkRenderMode::Hidden`].
pub fn build_segment(mode: LinkRenderMode, ends: &SegmentEnds) -> Option<SegmentShape> {
    let a = ends.start;
    let b = ends.end;
    let mut path = BezPath::new();

    match mode {
        LinkRenderMode::Hidden => None,
        LinkRenderMode::Spline => {
            let dist = if ends.start_control.is_none() || ends.end_control.is_none() {
                distance(a, b)
            } else {
                0.0
            };
            let inner_a = match ends.start_control {
                Some(control) => a + control,
                None => a + ends.start_dir.offset(dist * SPLINE_FACTOR),
            };
            let inner_b = match ends.end_control {
                Some(control) => b + control,
                None => b + ends.end_dir.offset(dist * SPLINE_FACTOR),
            };
            let curve = CubicBez::new(a, inner_a, inner_b, b);
            path.move_to(a);
            path.curve_to(inner_a, inner_b, b);

            let centre = curve.eval(0.5);
            let past = curve.eval(0.51);
            Some(SegmentShape {
                path,
                centre,
                centre_angle: (past.y - centre.y).atan2(past.x - centre.x),
            })
        }
        LinkRenderMode::Linear | LinkRenderMode::Straight => {
            let stub = if mode == LinkRenderMode::Linear { LINEAR_STUB } else { STRAIGHT_STUB };
            let inner_a = a + ends.start_dir.offset(stub);
            let inner_b = b + ends.end_dir.offset(stub);

            if mode == LinkRenderMode::Linear {
                path.move_to(a);
                path.line_to(inner_a);
                path.line_to(inner_b);
                path.line_to(b);
                Some(SegmentShape {
                    path,
                    centre: inner_a.midpoint(inner_b),
                    centre_angle: (inner_b.y - inner_a.y).atan2(inner_b.x - inner_a.x),
                })
            } else {
                let mid_x = (inner_a.x + inner_b.x) * 0.5;
                path.move_to(a);
                path.line_to(inner_a);
                path.line_to((mid_x, inner_a.y));
                path.line_to((mid_x, inner_b.y));
                path.line_to(inner_b);
                path.line_to(b);

                let diff = inner_b.y - inner_a.y;
                let centre_angle = if diff.abs() < 4.0 {
                    0.0
                } else if diff > 0.0 {
                    std::f64::consts::FRAC_PI_2
                } else {
                    -std::f64::consts::FRAC_PI_2
                };
                Some(SegmentShape {
                    path,
                    centre: Point::new(mid_x, (inner_a.y + inner_b.y) * 0.5),
                    centre_angle,
                })
            }
        }
    }
}

/// Point at `t` along the default spline between `a` and `b`.
pub fn compute_connection_point(
    a: Point,
    b: Point,
    t: f64,
    start_dir: LinkDirection,
    end_dir: LinkDirection,
) -> Point {
    let dist = distance(a, b);
    let pa = a + start_dir.offset(dist * SPLINE_FACTOR);
    let pb = b + end_dir.offset(dist * SPLINE_FACTOR);
    CubicBez::new(a, pa, pb, b).eval(t)
}

/// One drawn piece of a link.
#[derive(Debug, Clone)]
pub struct RenderedSegment {
    pub key: SegmentId,
    /// Link this segment was first rendered for.
    pub link: LinkId,
    pub type_name: String,
    pub color: Option<String>,
    pub path: BezPath,
    pub start: Point,
    pub end: Point,
    pub centre: Point,
    pub centre_angle: f64,
    pub alpha: f64,
    pub floating: bool,
}

impl RenderedSegment {
    /// Whether `point` lies within `tolerance` of the stroked path.
    pub fn stroke_contains(&self, point: Point, tolerance: f64) -> bool {
        let limit = tolerance * tolerance;
        self.path
            .segments()
            .any(|seg| seg.nearest(point, 0.1).distance_sq <= limit)
    }

    /// Whether `point` is on the centre marker.
    pub fn centre_contains(&self, point: Point) -> bool {
        let half = LINK_CENTRE_HIT_SIZE * 0.5;
        is_point_in_rect(
            point,
            Rect::new(
                self.centre.x - half,
                self.centre.y - half,
                self.centre.x + half,
                self.centre.y + half,
            ),
        )
    }
}

/// Inputs to a layout pass.
#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    pub mode: LinkRenderMode,
    /// Culling rectangle in graph space.
    pub margin: Rect,
    pub floating_alpha: f64,
    /// Links whose final segment is being dragged by the connector.
    pub dragging_links: BTreeSet<LinkId>,
    /// Reroutes whose arriving segment is being dragged.
    pub dragging_reroutes: BTreeSet<RerouteId>,
}

/// Per-frame cache of every drawn link segment.
#[derive(Debug, Clone, Default)]
pub struct LinkLayout {
    segments: Vec<RenderedSegment>,
    /// Reroutes reached by at least one visible link.
    visible_reroutes: Vec<RerouteId>,
}

impl LinkLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.visible_reroutes.clear();
    }

    pub fn segments(&self) -> &[RenderedSegment] {
        &self.segments
    }

    pub fn visible_reroutes(&self) -> &[RerouteId] {
        &self.visible_reroutes
    }

    pub fn get(&self, key: SegmentId) -> Option<&RenderedSegment> {
        self.segments.iter().find(|s| s.key == key)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Topmost segment whose stroke passes within `tolerance` of `point`.
    pub fn segment_at(&self, point: Point, tolerance: f64) -> Option<&RenderedSegment> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.stroke_contains(point, tolerance))
    }

    /// Topmost segment whose centre marker contains `point`.
    pub fn centre_at(&self, point: Point) -> Option<&RenderedSegment> {
        self.segments.iter().rev().find(|s| s.centre_contains(point))
    }

    /// Rebuild the layout for `graph`.
    pub fn rebuild(&mut self, graph: &Graph, options: &LayoutOptions) {
        self.clear();
        if options.mode == LinkRenderMode::Hidden {
            return;
        }
        let mut rendered: HashSet<SegmentId> = HashSet::new();

        for link in graph.links() {
            self.layout_link(graph, link, options, &mut rendered);
        }
        for floating in graph.floating_links() {
            self.layout_floating(graph, floating.id, options, &mut rendered);
        }
    }

    fn layout_link(
        &mut self,
        graph: &Graph,
        link: &Link,
        options: &LayoutOptions,
        rendered: &mut HashSet<SegmentId>,
    ) {
        let Some((start, start_dir)) = graph.output_anchor(link.origin_id, link.origin_slot) else {
            return;
        };
        let Some((end, end_dir)) = graph.input_anchor(link.target_id, link.target_slot) else {
            return;
        };
        let reroutes = graph.link_reroutes(link.id);
        let waypoints: Vec<Point> = std::iter::once(start)
            .chain(reroutes.iter().filter_map(|r| graph.reroute(*r).map(|r| r.pos)))
            .chain(std::iter::once(end))
            .collect();
        if !overlap_bounding(bounds_of(&waypoints), options.margin) {
            return;
        }

        let start_dir = non_none(start_dir, LinkDirection::Right);
        let end_dir = non_none(end_dir, LinkDirection::Left);
        let ctx = SegmentStyle {
            link: link.id,
            type_name: &link.type_name,
            color: link.color.as_deref(),
            alpha: 1.0,
            floating: false,
        };

        let last = self.layout_chain(graph, &reroutes, start, start_dir, Some(end), options, rendered, &ctx);

        if options.dragging_links.contains(&link.id) {
            return;
        }
        let (segment_start, start_control) = last;
        let mut ends = SegmentEnds::new(
            segment_start,
            end,
            if reroutes.is_empty() { start_dir } else { LinkDirection::Center },
            end_dir,
        );
        ends.start_control = start_control;
        self.push(SegmentId::Link(link.id), &ends, options.mode, &ctx);
        rendered.insert(SegmentId::Link(link.id));
    }

    fn layout_floating(
        &mut self,
        graph: &Graph,
        id: LinkId,
        options: &LayoutOptions,
        rendered: &mut HashSet<SegmentId>,
    ) {
        let Some(floating) = graph.floating_link(id) else {
            return;
        };
        let reroutes = floating
            .parent_id
            .and_then(|p| graph.reroute_chain(p))
            .unwrap_or_default();
        let Some(first) = reroutes.first().and_then(|r| graph.reroute(*r)) else {
            return;
        };
        let ctx = SegmentStyle {
            link: id,
            type_name: &floating.type_name,
            color: None,
            alpha: options.floating_alpha,
            floating: true,
        };

        match floating.end {
            FloatingEnd::Output { node, slot } => {
                let Some((start, dir)) = graph.output_anchor(node, slot) else {
                    return;
                };
                let mut points = vec![start];
                points.extend(reroutes.iter().filter_map(|r| graph.reroute(*r).map(|r| r.pos)));
                if !overlap_bounding(bounds_of(&points), options.margin) {
                    return;
                }
                let dir = non_none(dir, LinkDirection::Right);
                self.layout_chain(graph, &reroutes, start, dir, None, options, rendered, &ctx);
            }
            FloatingEnd::Input { node, slot } => {
                let Some((end, dir)) = graph.input_anchor(node, slot) else {
                    return;
                };
                let mut points: Vec<Point> =
                    reroutes.iter().filter_map(|r| graph.reroute(*r).map(|r| r.pos)).collect();
                points.push(end);
                if !overlap_bounding(bounds_of(&points), options.margin) {
                    return;
                }
                let Some(last) = reroutes.last().and_then(|r| graph.reroute(*r)) else {
                    return;
                };
                // Reroute to reroute segments, then the last reroute to the input
                let mut prev = first.pos;
                for reroute_id in reroutes.iter().skip(1) {
                    let Some(reroute) = graph.reroute(*reroute_id) else { continue };
                    let key = SegmentId::Reroute(*reroute_id);
                    if rendered.insert(key) {
                        let ends = SegmentEnds::new(prev, reroute.pos, LinkDirection::Center, LinkDirection::Center);
                        self.push(key, &ends, options.mode, &ctx);
                    }
                    prev = reroute.pos;
                }
                let ends = SegmentEnds::new(last.pos, end, LinkDirection::Center, non_none(dir, LinkDirection::Left));
                self.push(SegmentId::Floating(id), &ends, options.mode, &ctx);
                for reroute_id in &reroutes {
                    if !self.visible_reroutes.contains(reroute_id) {
                        self.visible_reroutes.push(*reroute_id);
                    }
                }
            }
        }
    }

    /// Lay out the segments arriving at each reroute in `chain`. Returns the
    /// start point and control offset for the segment after the chain.
    #[allow(clippy::too_many_arguments)]
    fn layout_chain(
        &mut self,
        graph: &Graph,
        chain: &[RerouteId],
        start: Point,
        start_dir: LinkDirection,
        end: Option<Point>,
        options: &LayoutOptions,
        rendered: &mut HashSet<SegmentId>,
        style: &SegmentStyle<'_>,
    ) -> (Point, Option<Vec2>) {
        let mut start_control: Option<Vec2> = None;
        let mut prev_pos = start;

        for (index, reroute_id) in chain.iter().enumerate() {
            let Some(reroute) = graph.reroute(*reroute_id) else {
                continue;
            };
            let key = SegmentId::Reroute(*reroute_id);
            if rendered.insert(key) {
                if !self.visible_reroutes.contains(reroute_id) {
                    self.visible_reroutes.push(*reroute_id);
                }
                if !options.dragging_reroutes.contains(reroute_id) {
                    let mut ends = SegmentEnds::new(
                        prev_pos,
                        reroute.pos,
                        if start_control.is_none() { start_dir } else { LinkDirection::Center },
                        LinkDirection::Center,
                    );
                    ends.start_control = start_control;
                    ends.end_control = Some(reroute.control_point);
                    self.push(key, &ends, options.mode, style);
                }
            }

            let next_pos = chain
                .get(index + 1)
                .and_then(|r| graph.reroute(*r))
                .map(|r| r.pos)
                .or(end);
            start_control = Some(match next_pos {
                Some(next) => {
                    let dist = REROUTE_MAX_SPLINE_OFFSET.min(distance(reroute.pos, next) * SPLINE_FACTOR);
                    Vec2::new(dist * reroute.cos, dist * reroute.sin)
                }
                None => Vec2::ZERO,
            });
            prev_pos = reroute.pos;
        }
        (prev_pos, start_control)
    }

    fn push(&mut self, key: SegmentId, ends: &SegmentEnds, mode: LinkRenderMode, style: &SegmentStyle<'_>) {
        let Some(shape) = build_segment(mode, ends) else {
            return;
        };
        self.segments.push(RenderedSegment {
            key,
            link: style.link,
            type_name: style.type_name.to_owned(),
            color: style.color.map(str::to_owned),
            path: shape.path,
            start: ends.start,
            end: ends.end,
            centre: shape.centre,
            centre_angle: shape.centre_angle,
            alpha: style.alpha,
            floating: style.floating,
        });
    }
}

struct SegmentStyle<'a> {
    link: LinkId,
    type_name: &'a str,
    color: Option<&'a str>,
    alpha: f64,
    floating: bool,
}

fn non_none(dir: LinkDirection, fallback: LinkDirection) -> LinkDirection {
    if dir == LinkDirection::None { fallback } else { dir }
}

fn bounds_of(points: &[Point]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    iter.fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
}

/// Recompute every reroute's averaged direction from the links passing
/// through it.
pub fn update_reroute_directions(graph: &mut Graph) {
    let ids: Vec<RerouteId> = graph.reroutes().map(|r| r.id).collect();
    for id in ids {
        let Some(reroute) = graph.reroute(id) else { continue };

        let mut outgoing = Vec::new();
        let mut arriving_from = None;
        for link_id in &reroute.link_ids {
            let Some(link) = graph.link(*link_id) else { continue };
            if let Some(next) = graph.next_pos_after(link, id) {
                outgoing.push(next);
            }
            if arriving_from.is_none() {
                arriving_from = graph.output_anchor(link.origin_id, link.origin_slot).map(|(p, _)| p);
            }
        }
        for link_id in &reroute.floating_link_ids {
            let Some(floating) = graph.floating_link(*link_id) else { continue };
            let chain = floating
                .parent_id
                .and_then(|p| graph.reroute_chain(p))
                .unwrap_or_default();
            let Some(index) = chain.iter().position(|r| *r == id) else { continue };
            let next = match chain.get(index + 1) {
                Some(next) => graph.reroute(*next).map(|r| r.pos),
                None => match floating.end {
                    FloatingEnd::Input { node, slot } => graph.input_anchor(node, slot).map(|(p, _)| p),
                    FloatingEnd::Output { .. } => None,
                },
            };
            outgoing.extend(next);
            if arriving_from.is_none() {
                if let FloatingEnd::Output { node, slot } = floating.end {
                    arriving_from = graph.output_anchor(node, slot).map(|(p, _)| p);
                }
            }
        }

        let from = reroute
            .parent_id
            .and_then(|p| graph.reroute(p))
            .map(|p| p.pos)
            .or(arriving_from)
            .unwrap_or(reroute.pos);
        if let Some(reroute) = graph.reroute_mut(id) {
            reroute.update_direction(&outgoing, from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn wide_margin() -> LayoutOptions {
        LayoutOptions {
            mode: LinkRenderMode::Spline,
            margin: Rect::new(-10_000.0, -10_000.0, 10_000.0, 10_000.0),
            floating_alpha: FLOATING_LINK_ALPHA,
            ..Default::default()
        }
    }

    fn two_nodes() -> (Graph, LinkId) {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_pos(0.0, 0.0).with_output("out", "number"));
        let b = graph.add_node(Node::new("b").with_pos(400.0, 0.0).with_input("in", "number"));
        let link = graph.connect(a, 0, b, 0, None).unwrap();
        (graph, link)
    }

    #[test]
    fn test_spline_midpoint() {
        let ends = SegmentEnds::new(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            LinkDirection::Right,
            LinkDirection::Left,
        );
        let shape = build_segment(LinkRenderMode::Spline, &ends).unwrap();
        assert!((shape.centre.x - 50.0).abs() < 1e-9);
        assert!(shape.centre.y.abs() < 1e-9);
        assert!(shape.centre_angle.abs() < 1e-6);
    }

    #[test]
    fn test_linear_centre_and_angle() {
        let ends = SegmentEnds::new(
            Point::new(0.0, 0.0),
            Point::new(100.0, 100.0),
            LinkDirection::Right,
            LinkDirection::Left,
        );
        let shape = build_segment(LinkRenderMode::Linear, &ends).unwrap();
        assert_eq!(shape.centre, Point::new(50.0, 50.0));
        let expected = (100.0_f64).atan2(100.0 - 30.0);
        assert!((shape.centre_angle - expected).abs() < 1e-9);
    }

    #[test]
    fn test_straight_angle_buckets() {
        let flat = SegmentEnds::new(Point::ZERO, Point::new(100.0, 2.0), LinkDirection::Right, LinkDirection::Left);
        let down = SegmentEnds::new(Point::ZERO, Point::new(100.0, 50.0), LinkDirection::Right, LinkDirection::Left);
        let up = SegmentEnds::new(Point::ZERO, Point::new(100.0, -50.0), LinkDirection::Right, LinkDirection::Left);
        assert_eq!(build_segment(LinkRenderMode::Straight, &flat).unwrap().centre_angle, 0.0);
        assert_eq!(
            build_segment(LinkRenderMode::Straight, &down).unwrap().centre_angle,
            std::f64::consts::FRAC_PI_2
        );
        assert_eq!(
            build_segment(LinkRenderMode::Straight, &up).unwrap().centre_angle,
            -std::f64::consts::FRAC_PI_2
        );
        let shape = build_segment(LinkRenderMode::Straight, &down).unwrap();
        assert_eq!(shape.centre, Point::new(50.0, 25.0));
    }

    #[test]
    fn test_hidden_mode_builds_nothing() {
        let ends = SegmentEnds::new(Point::ZERO, Point::new(1.0, 1.0), LinkDirection::Right, LinkDirection::Left);
        assert!(build_segment(LinkRenderMode::Hidden, &ends).is_none());
    }

    #[test]
    fn test_connection_point_endpoints() {
        let a = Point::new(10.0, 10.0);
        let b = Point::new(200.0, 80.0);
        let p0 = compute_connection_point(a, b, 0.0, LinkDirection::Right, LinkDirection::Left);
        let p1 = compute_connection_point(a, b, 1.0, LinkDirection::Right, LinkDirection::Left);
        assert!((p0 - a).hypot() < 1e-9);
        assert!((p1 - b).hypot() < 1e-9);
    }

    #[test]
    fn test_layout_single_link_and_hit() {
        let (graph, link) = two_nodes();
        let mut layout = LinkLayout::new();
        layout.rebuild(&graph, &wide_margin());
        assert_eq!(layout.len(), 1);
        let segment = layout.get(SegmentId::Link(link)).unwrap();
        assert!(!segment.floating);
        assert!(layout.segment_at(segment.centre, 2.0).is_some());
        assert!(layout.segment_at(segment.centre + Vec2::new(0.0, 50.0), 2.0).is_none());
        assert!(layout.centre_at(segment.centre + Vec2::new(3.0, -3.0)).is_some());
    }

    #[test]
    fn test_layout_culls_off_screen_links() {
        let (graph, _) = two_nodes();
        let mut layout = LinkLayout::new();
        let options = LayoutOptions {
            margin: Rect::new(5_000.0, 5_000.0, 6_000.0, 6_000.0),
            ..wide_margin()
        };
        layout.rebuild(&graph, &options);
        assert!(layout.is_empty());
    }

    #[test]
    fn test_layout_through_reroutes() {
        let (mut graph, link) = two_nodes();
        let r1 = graph.insert_reroute(Point::new(150.0, 100.0), SegmentId::Link(link)).unwrap();
        let r2 = graph.insert_reroute(Point::new(250.0, 100.0), SegmentId::Link(link)).unwrap();
        assert_eq!(graph.link_reroutes(link), vec![r1, r2]);

        update_reroute_directions(&mut graph);
        let mut layout = LinkLayout::new();
        layout.rebuild(&graph, &wide_margin());
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.visible_reroutes(), &[r1, r2]);

        let first = layout.get(SegmentId::Reroute(r1)).unwrap();
        assert_eq!(first.end, Point::new(150.0, 100.0));
        let last = layout.get(SegmentId::Link(link)).unwrap();
        assert_eq!(last.start, Point::new(250.0, 100.0));
    }

    #[test]
    fn test_dragging_link_skips_final_segment() {
        let (graph, link) = two_nodes();
        let mut options = wide_margin();
        options.dragging_links.insert(link);
        let mut layout = LinkLayout::new();
        layout.rebuild(&graph, &options);
        assert!(layout.is_empty());
    }

    #[test]
    fn test_floating_link_alpha() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_output("out", "number"));
        let r = graph.create_reroute(Point::new(300.0, 50.0), None);
        let id = graph.add_floating_link(FloatingEnd::Output { node: a, slot: 0 }, "number", Some(r));
        assert!(graph.reroute(r).unwrap().floating_link_ids.contains(&id));

        let mut layout = LinkLayout::new();
        layout.rebuild(&graph, &wide_margin());
        let segment = layout.get(SegmentId::Reroute(r)).unwrap();
        assert!(segment.floating);
        assert!((segment.alpha - FLOATING_LINK_ALPHA).abs() < f64::EPSILON);
    }
}
