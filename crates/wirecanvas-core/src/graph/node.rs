//! Graph nodes and their slot geometry.

use super::{LinkId, NodeId, Positionable};
use crate::measure::{find_containing_corner, is_point_in_rect, CompassCorner, LinkDirection};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Height of the title bar drawn above a node's position.
pub const NODE_TITLE_HEIGHT: f64 = 30.0;
/// Vertical spacing between slots.
pub const NODE_SLOT_HEIGHT: f64 = 20.0;
/// Default widget row height.
pub const NODE_WIDGET_HEIGHT: f64 = 20.0;
pub const NODE_MIN_WIDTH: f64 = 50.0;
pub const NODE_COLLAPSED_WIDTH: f64 = 80.0;
/// Size of the square corner areas that start a resize.
pub const RESIZE_HANDLE_SIZE: f64 = 15.0;
/// Slot hit box, centred on the slot anchor.
pub const SLOT_HIT_SIZE: Size = Size::new(30.0, 20.0);

/// An input slot. Accepts at most one link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    /// Data type name; `*` or empty accepts anything.
    #[serde(rename = "type")]
    pub type_name: String,
    pub link: Option<LinkId>,
    /// Direction links approach this slot from. Defaults to the left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<LinkDirection>,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            link: None,
            dir: None,
        }
    }
}

/// An output slot. May feed any number of links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub links: Vec<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<LinkDirection>,
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            links: Vec::new(),
            dir: None,
        }
    }
}

/// A widget row inside the node body. Values and behaviour belong to the
/// node implementation; the canvas only needs the layout for hit testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub name: String,
    /// Offset of the row from the node position.
    pub y: f64,
    pub height: f64,
    #[serde(default)]
    pub disabled: bool,
}

impl Widget {
    pub fn new(name: impl Into<String>, y: f64) -> Self {
        Self {
            name: name.into(),
            y,
            height: NODE_WIDGET_HEIGHT,
            disabled: false,
        }
    }
}

/// Persistent node flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub pinned: bool,
}

fn default_true() -> bool {
    true
}

/// A node on the canvas.
///
/// `pos` is the top-left of the body; the title bar sits above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Registered type name, or the id of a subgraph definition.
    #[serde(rename = "type")]
    pub type_name: String,
    pub title: String,
    pub pos: Point,
    pub size: Size,
    #[serde(default)]
    pub flags: NodeFlags,
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(default = "default_true")]
    pub clonable: bool,
    #[serde(default)]
    pub block_delete: bool,
    #[serde(default = "default_true")]
    pub resizable: bool,
    #[serde(skip)]
    pub selected: bool,
}

impl Node {
    /// Create a node with the given type. The id is assigned when the node is
    /// added to a graph.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            id: NodeId(0),
            title: type_name.clone(),
            type_name,
            pos: Point::ZERO,
            size: Size::new(140.0, 60.0),
            flags: NodeFlags::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            color: None,
            bgcolor: None,
            clonable: true,
            block_delete: false,
            resizable: true,
            selected: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_pos(mut self, x: f64, y: f64) -> Self {
        self.pos = Point::new(x, y);
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Size::new(width, height);
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.inputs.push(InputSlot::new(name, type_name));
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.outputs.push(OutputSlot::new(name, type_name));
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.flags.collapsed
    }

    pub fn is_pinned(&self) -> bool {
        self.flags.pinned
    }

    /// Bounding rectangle including the title bar.
    pub fn bounding(&self) -> Rect {
        if self.flags.collapsed {
            let width = self.size.width.min(NODE_COLLAPSED_WIDTH).max(NODE_TITLE_HEIGHT);
            Rect::new(
                self.pos.x,
                self.pos.y - NODE_TITLE_HEIGHT,
                self.pos.x + width,
                self.pos.y,
            )
        } else {
            Rect::new(
                self.pos.x,
                self.pos.y - NODE_TITLE_HEIGHT,
                self.pos.x + self.size.width,
                self.pos.y + self.size.height,
            )
        }
    }

    /// Title bar rectangle.
    pub fn title_bar(&self) -> Rect {
        let b = self.bounding();
        Rect::new(b.x0, b.y0, b.x1, b.y0 + NODE_TITLE_HEIGHT)
    }

    /// Whether a graph-space point is inside the node.
    pub fn contains(&self, point: Point) -> bool {
        is_point_in_rect(point, self.bounding())
    }

    /// Collapse toggle area at the left of the title bar.
    pub fn collapse_box(&self) -> Rect {
        Rect::new(
            self.pos.x,
            self.pos.y - NODE_TITLE_HEIGHT,
            self.pos.x + NODE_TITLE_HEIGHT,
            self.pos.y,
        )
    }

    /// Anchor of input slot `slot`, where links attach.
    pub fn input_pos(&self, slot: usize) -> Point {
        if self.flags.collapsed {
            return Point::new(self.pos.x, self.pos.y - NODE_TITLE_HEIGHT * 0.5);
        }
        Point::new(
            self.pos.x + NODE_SLOT_HEIGHT * 0.5,
            self.pos.y + (slot as f64 + 0.7) * NODE_SLOT_HEIGHT,
        )
    }

    /// Anchor of output slot `slot`.
    pub fn output_pos(&self, slot: usize) -> Point {
        if self.flags.collapsed {
            let width = self.bounding().width();
            return Point::new(self.pos.x + width, self.pos.y - NODE_TITLE_HEIGHT * 0.5);
        }
        Point::new(
            self.pos.x + self.size.width + 1.0 - NODE_SLOT_HEIGHT * 0.5,
            self.pos.y + (slot as f64 + 0.7) * NODE_SLOT_HEIGHT,
        )
    }

    pub fn input_dir(&self, slot: usize) -> LinkDirection {
        self.inputs
            .get(slot)
            .and_then(|s| s.dir)
            .unwrap_or(LinkDirection::Left)
    }

    pub fn output_dir(&self, slot: usize) -> LinkDirection {
        self.outputs
            .get(slot)
            .and_then(|s| s.dir)
            .unwrap_or(LinkDirection::Right)
    }

    fn slot_box(anchor: Point) -> Rect {
        Rect::from_center_size(anchor, SLOT_HIT_SIZE)
    }

    /// Index of the output slot whose hit box contains `point`.
    pub fn output_slot_at(&self, point: Point) -> Option<usize> {
        if self.flags.collapsed {
            return None;
        }
        (0..self.outputs.len()).find(|&i| is_point_in_rect(point, Self::slot_box(self.output_pos(i))))
    }

    /// Index of the input slot whose hit box contains `point`.
    pub fn input_slot_at(&self, point: Point) -> Option<usize> {
        if self.flags.collapsed {
            return None;
        }
        (0..self.inputs.len()).find(|&i| is_point_in_rect(point, Self::slot_box(self.input_pos(i))))
    }

    /// Index of the enabled widget under `point`.
    pub fn widget_at(&self, point: Point) -> Option<usize> {
        if self.flags.collapsed {
            return None;
        }
        let local = point - self.pos.to_vec2();
        self.widgets.iter().position(|w| {
            !w.disabled
                && is_point_in_rect(
                    local,
                    Rect::new(6.0, w.y, self.size.width - 6.0, w.y + w.height),
                )
        })
    }

    /// Resize corner under `point`, if the node can be resized.
    pub fn find_resize_direction(&self, point: Point) -> Option<CompassCorner> {
        if !self.resizable || self.flags.collapsed || self.flags.pinned {
            return None;
        }
        let bounds = self.bounding();
        if !is_point_in_rect(point, bounds) {
            return None;
        }
        find_containing_corner(bounds, point, RESIZE_HANDLE_SIZE)
    }

    /// Smallest body size that fits all slots and widgets.
    pub fn compute_min_size(&self) -> Size {
        let rows = self.inputs.len().max(self.outputs.len()).max(1) as f64;
        let width = if self.widgets.is_empty() {
            NODE_MIN_WIDTH
        } else {
            NODE_MIN_WIDTH * 1.5
        };
        let mut height = rows * NODE_SLOT_HEIGHT;
        if !self.widgets.is_empty() {
            let widgets_bottom = self
                .widgets
                .iter()
                .map(|w| w.y + w.height + 4.0)
                .fold(0.0, f64::max);
            height = height.max(widgets_bottom + 8.0);
        }
        Size::new(width, height)
    }

    /// Clone for copy/paste: keeps the id for remapping but drops links.
    pub fn clone_detached(&self) -> Node {
        let mut node = self.clone();
        node.selected = false;
        for input in &mut node.inputs {
            input.link = None;
        }
        for output in &mut node.outputs {
            output.links.clear();
        }
        node
    }
}

impl Positionable for Node {
    fn bounding(&self) -> Rect {
        Node::bounding(self)
    }

    fn move_by(&mut self, delta: Vec2) {
        if !self.flags.pinned {
            self.pos += delta;
        }
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// Asymmetric resize from `corner` by `delta`, clamped to `min`.
///
/// Returns the new position and size. When the clamp engages while dragging
/// a west or north edge, the opposite edge stays where it was.
pub fn resize_from_corner(
    start_pos: Point,
    start_size: Size,
    corner: CompassCorner,
    delta: Vec2,
    min: Size,
) -> (Point, Size) {
    let mut pos = start_pos;
    let mut width = start_size.width;
    let mut height = start_size.height;

    if corner.moves_left() {
        width -= delta.x;
        pos.x += delta.x;
    } else {
        width += delta.x;
    }
    if corner.moves_top() {
        height -= delta.y;
        pos.y += delta.y;
    } else {
        height += delta.y;
    }

    if width < min.width {
        if corner.moves_left() {
            pos.x = start_pos.x + start_size.width - min.width;
        }
        width = min.width;
    }
    if height < min.height {
        if corner.moves_top() {
            pos.y = start_pos.y + start_size.height - min.height;
        }
        height = min.height;
    }

    (pos, Size::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::new("math/add")
            .with_pos(100.0, 100.0)
            .with_size(140.0, 60.0)
            .with_input("a", "number")
            .with_input("b", "number")
            .with_output("sum", "number")
    }

    #[test]
    fn test_bounding_includes_title() {
        let node = sample();
        assert_eq!(node.bounding(), Rect::new(100.0, 70.0, 240.0, 160.0));
        assert!(node.contains(Point::new(120.0, 75.0)));
    }

    #[test]
    fn test_collapsed_bounding() {
        let mut node = sample();
        node.flags.collapsed = true;
        let b = node.bounding();
        assert!((b.height() - NODE_TITLE_HEIGHT).abs() < f64::EPSILON);
        assert!((b.width() - NODE_COLLAPSED_WIDTH).abs() < f64::EPSILON);
        assert_eq!(node.input_pos(1), Point::new(100.0, 85.0));
        assert_eq!(node.output_pos(0), Point::new(180.0, 85.0));
    }

    #[test]
    fn test_slot_positions() {
        let node = sample();
        assert_eq!(node.input_pos(0), Point::new(110.0, 114.0));
        assert_eq!(node.input_pos(1), Point::new(110.0, 134.0));
        assert_eq!(node.output_pos(0), Point::new(231.0, 114.0));
    }

    #[test]
    fn test_slot_hit_boxes() {
        let node = sample();
        assert_eq!(node.output_slot_at(Point::new(240.0, 110.0)), Some(0));
        assert_eq!(node.output_slot_at(Point::new(200.0, 110.0)), None);
        assert_eq!(node.input_slot_at(Point::new(105.0, 136.0)), Some(1));
    }

    #[test]
    fn test_resize_direction() {
        let node = sample();
        assert_eq!(node.find_resize_direction(Point::new(235.0, 155.0)), Some(CompassCorner::SE));
        assert_eq!(node.find_resize_direction(Point::new(160.0, 120.0)), None);
        let mut pinned = sample();
        pinned.flags.pinned = true;
        assert_eq!(pinned.find_resize_direction(Point::new(235.0, 155.0)), None);
    }

    #[test]
    fn test_widget_hit() {
        let node = sample().with_widget(Widget::new("value", 45.0));
        assert_eq!(node.widget_at(Point::new(150.0, 150.0)), Some(0));
        assert_eq!(node.widget_at(Point::new(102.0, 150.0)), None);
    }

    #[test]
    fn test_resize_from_west_keeps_east_edge_when_clamped() {
        let (pos, size) = resize_from_corner(
            Point::new(0.0, 0.0),
            Size::new(100.0, 100.0),
            CompassCorner::NW,
            Vec2::new(90.0, 10.0),
            Size::new(50.0, 40.0),
        );
        assert!((size.width - 50.0).abs() < f64::EPSILON);
        assert!((pos.x - 50.0).abs() < f64::EPSILON);
        assert!((pos.x + size.width - 100.0).abs() < f64::EPSILON);
        assert!((size.height - 90.0).abs() < f64::EPSILON);
        assert!((pos.y - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_from_south_east() {
        let (pos, size) = resize_from_corner(
            Point::new(0.0, 0.0),
            Size::new(100.0, 100.0),
            CompassCorner::SE,
            Vec2::new(20.0, -80.0),
            Size::new(50.0, 40.0),
        );
        assert_eq!(pos, Point::ZERO);
        assert!((size.width - 120.0).abs() < f64::EPSILON);
        assert!((size.height - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_size_accounts_for_slots() {
        let node = sample();
        let min = node.compute_min_size();
        assert!((min.height - 40.0).abs() < f64::EPSILON);
        assert!((min.width - NODE_MIN_WIDTH).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clone_detached_drops_links() {
        let mut node = sample();
        node.inputs[0].link = Some(LinkId(3));
        node.outputs[0].links.push(LinkId(4));
        node.selected = true;
        let copy = node.clone_detached();
        assert_eq!(copy.id, node.id);
        assert!(copy.inputs[0].link.is_none());
        assert!(copy.outputs[0].links.is_empty());
        assert!(!copy.selected);
    }
}
