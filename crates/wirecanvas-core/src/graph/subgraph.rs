//! Subgraph definitions and their boundary pseudo-nodes.

use super::{Graph, LinkId, Positionable, SubgraphId};
use crate::measure::{is_point_in_rect, LinkDirection};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

const IO_NODE_WIDTH: f64 = 80.0;
const IO_SLOT_SPACING: f64 = 20.0;
const IO_HEADER: f64 = 10.0;

/// Which side of the subgraph interface a boundary node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IoKind {
    /// Exposes the subgraph's inputs as outputs to the inner graph.
    Input,
    /// Collects the inner graph's results into the subgraph's outputs.
    Output,
}

/// One slot on the subgraph interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoSlot {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub links: Vec<LinkId>,
}

impl IoSlot {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            links: Vec::new(),
        }
    }
}

/// Boundary pseudo-node shown while viewing inside a subgraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoNode {
    pub kind: IoKind,
    pub pos: Point,
    pub slots: Vec<IoSlot>,
    #[serde(skip)]
    pub selected: bool,
}

impl IoNode {
    pub fn new(kind: IoKind, pos: Point) -> Self {
        Self {
            kind,
            pos,
            slots: Vec::new(),
            selected: false,
        }
    }

    pub fn bounding(&self) -> Rect {
        let height = IO_HEADER * 2.0 + self.slots.len().max(1) as f64 * IO_SLOT_SPACING;
        Rect::from_origin_size(self.pos, Size::new(IO_NODE_WIDTH, height))
    }

    /// Anchor of slot `index`. Input boundary slots sit on the right edge,
    /// output boundary slots on the left.
    pub fn slot_pos(&self, index: usize) -> Point {
        let b = self.bounding();
        let y = b.y0 + IO_HEADER + (index as f64 + 0.5) * IO_SLOT_SPACING;
        match self.kind {
            IoKind::Input => Point::new(b.x1 - 10.0, y),
            IoKind::Output => Point::new(b.x0 + 10.0, y),
        }
    }

    /// Direction links leave or arrive at the boundary slots.
    pub fn slot_dir(&self) -> LinkDirection {
        match self.kind {
            IoKind::Input => LinkDirection::Right,
            IoKind::Output => LinkDirection::Left,
        }
    }

    pub fn slot_at(&self, point: Point) -> Option<usize> {
        (0..self.slots.len()).find(|&i| {
            is_point_in_rect(point, Rect::from_center_size(self.slot_pos(i), (30.0, IO_SLOT_SPACING)))
        })
    }

    pub fn contains(&self, point: Point) -> bool {
        is_point_in_rect(point, self.bounding())
    }
}

impl Positionable for IoNode {
    fn bounding(&self) -> Rect {
        IoNode::bounding(self)
    }

    fn move_by(&mut self, delta: Vec2) {
        self.pos += delta;
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// Pair of boundary nodes for a graph that is a subgraph's contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphIo {
    pub input: IoNode,
    pub output: IoNode,
}

impl SubgraphIo {
    pub fn new(input_pos: Point, output_pos: Point) -> Self {
        Self {
            input: IoNode::new(IoKind::Input, input_pos),
            output: IoNode::new(IoKind::Output, output_pos),
        }
    }

    pub fn get(&self, kind: IoKind) -> &IoNode {
        match kind {
            IoKind::Input => &self.input,
            IoKind::Output => &self.output,
        }
    }

    pub fn get_mut(&mut self, kind: IoKind) -> &mut IoNode {
        match kind {
            IoKind::Input => &mut self.input,
            IoKind::Output => &mut self.output,
        }
    }
}

/// A reusable graph definition. Nodes whose type name equals the
/// definition id instantiate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgraph {
    pub id: SubgraphId,
    pub name: String,
    pub graph: Graph,
}

impl Subgraph {
    /// Create an empty definition with boundary nodes on either side.
    pub fn new(id: SubgraphId, name: impl Into<String>) -> Self {
        let mut graph = Graph::new();
        graph.io = Some(SubgraphIo::new(Point::new(-200.0, 0.0), Point::new(400.0, 0.0)));
        Self {
            id,
            name: name.into(),
            graph,
        }
    }

    /// Type name nodes use to instantiate this definition.
    pub fn type_name(&self) -> String {
        self.id.to_string()
    }

    pub fn add_input(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        if let Some(io) = self.graph.io.as_mut() {
            io.input.slots.push(IoSlot::new(name, type_name));
        }
    }

    pub fn add_output(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        if let Some(io) = self.graph.io.as_mut() {
            io.output.slots.push(IoSlot::new(name, type_name));
        }
    }

    /// Ids of subgraph definitions instantiated directly by this one's nodes.
    pub fn referenced_subgraphs<'a>(&'a self, known: &'a [SubgraphId]) -> impl Iterator<Item = SubgraphId> + 'a {
        self.graph.nodes().filter_map(move |node| {
            known.iter().copied().find(|id| node.type_name == id.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_io_node_slots() {
        let mut node = IoNode::new(IoKind::Input, Point::new(0.0, 0.0));
        node.slots.push(IoSlot::new("a", "number"));
        node.slots.push(IoSlot::new("b", "number"));
        assert_eq!(node.slot_pos(0), Point::new(70.0, 20.0));
        assert_eq!(node.slot_at(Point::new(72.0, 41.0)), Some(1));
        assert_eq!(node.slot_dir(), LinkDirection::Right);
        assert!(node.contains(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_new_subgraph_has_boundary() {
        let mut sg = Subgraph::new(Uuid::new_v4(), "inner");
        sg.add_input("x", "number");
        sg.add_output("y", "number");
        let io = sg.graph.io.as_ref().unwrap();
        assert_eq!(io.input.slots.len(), 1);
        assert_eq!(io.output.slots.len(), 1);
        assert_eq!(sg.type_name(), sg.id.to_string());
    }
}
