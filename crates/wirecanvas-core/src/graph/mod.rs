//! Graph model the canvas edits.
//!
//! This is a deliberately small model: nodes with typed slots, links,
//! floating links, reroutes, groups and subgraph definitions, plus the
//! connect/disconnect and add/remove operations the canvas needs. Node
//! behaviour and the type registry contents are supplied by the host.

mod group;
mod link;
mod node;
mod reroute;
mod subgraph;

pub use group::{
    Group, GROUP_DEFAULT_COLOR, GROUP_DEFAULT_FONT_SIZE, GROUP_MIN_HEIGHT, GROUP_MIN_WIDTH,
    GROUP_PADDING, GROUP_RESIZE_LENGTH,
};
pub use link::{is_type_compatible, FloatingEnd, FloatingLink, Link};
pub use node::{
    resize_from_corner, InputSlot, Node, NodeFlags, OutputSlot, Widget, NODE_COLLAPSED_WIDTH,
    NODE_MIN_WIDTH, NODE_SLOT_HEIGHT, NODE_TITLE_HEIGHT, NODE_WIDGET_HEIGHT, RESIZE_HANDLE_SIZE,
    SLOT_HIT_SIZE,
};
pub use reroute::{
    FloatingSlotKind, Reroute, REROUTE_MAX_SPLINE_OFFSET, REROUTE_RADIUS, REROUTE_SLOT_RADIUS,
};
pub use subgraph::{IoKind, IoNode, IoSlot, Subgraph, SubgraphIo};

use crate::measure::{contains_centre, contains_rect, is_point_in_rect, LinkDirection};
use indexmap::IndexMap;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Unique identifier for a node within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Pseudo-node id for the subgraph input boundary.
    pub const SUBGRAPH_INPUT: NodeId = NodeId(u32::MAX - 1);
    /// Pseudo-node id for the subgraph output boundary.
    pub const SUBGRAPH_OUTPUT: NodeId = NodeId(u32::MAX);
}

/// Unique identifier for a link (real or floating) within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RerouteId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Identifier of a subgraph definition.
pub type SubgraphId = Uuid;

/// Anything that can be selected and dragged on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemId {
    Node(NodeId),
    Group(GroupId),
    Reroute(RerouteId),
    IoNode(IoKind),
}

/// One drawn piece of a link: either the final segment arriving at the
/// link's target, or the segment arriving at a reroute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentId {
    Link(LinkId),
    Reroute(RerouteId),
    Floating(LinkId),
}

/// Common capability of selectable, draggable canvas items.
pub trait Positionable {
    /// Bounding rectangle in graph coordinates.
    fn bounding(&self) -> Rect;
    /// Translate by `delta`. Pinned items ignore this.
    fn move_by(&mut self, delta: Vec2);
    fn is_selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);
}

/// Names of node types the host knows how to instantiate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTypeRegistry {
    types: BTreeSet<String>,
    /// Accept any type name.
    #[serde(default)]
    pub allow_unregistered: bool,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that accepts every type.
    pub fn permissive() -> Self {
        Self {
            types: BTreeSet::new(),
            allow_unregistered: true,
        }
    }

    pub fn register(&mut self, type_name: impl Into<String>) {
        self.types.insert(type_name.into());
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.register(type_name);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.allow_unregistered || self.types.contains(type_name)
    }
}

/// The graph: nodes in z-order, links, reroutes, groups and subgraph
/// definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    /// Nodes in draw order, back to front.
    nodes: IndexMap<NodeId, Node>,
    links: BTreeMap<LinkId, Link>,
    #[serde(default)]
    floating_links: BTreeMap<LinkId, FloatingLink>,
    #[serde(default)]
    reroutes: BTreeMap<RerouteId, Reroute>,
    #[serde(default)]
    groups: Vec<Group>,
    /// Subgraph definitions. Only populated on the root graph.
    #[serde(default)]
    pub subgraphs: BTreeMap<SubgraphId, Subgraph>,
    /// Boundary nodes, present when this graph is a subgraph's contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<SubgraphIo>,
    #[serde(default)]
    last_node_id: u32,
    #[serde(default)]
    last_link_id: u32,
    #[serde(default)]
    last_reroute_id: u32,
    #[serde(default)]
    last_group_id: u32,
    /// Bumped at the end of every outermost change transaction.
    #[serde(skip)]
    version: u64,
    #[serde(skip)]
    change_depth: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a graph from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the graph to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    // --- transactions -------------------------------------------------

    /// Start of an edit. Called by the canvas once per outermost transaction.
    pub fn before_change(&mut self) {
        self.change_depth += 1;
    }

    /// End of an edit.
    pub fn after_change(&mut self) {
        self.change_depth = self.change_depth.saturating_sub(1);
        self.version += 1;
    }

    /// Number of completed change transactions.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether a change transaction is open.
    pub fn in_change(&self) -> bool {
        self.change_depth > 0
    }

    // --- nodes --------------------------------------------------------

    /// Add a node, assigning it a fresh id. The node is placed on top.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        self.last_node_id += 1;
        let id = NodeId(self.last_node_id);
        node.id = id;
        node.selected = false;
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes back to front.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Move a node to the top of the draw order.
    pub fn bring_to_front(&mut self, id: NodeId) {
        if let Some(index) = self.nodes.get_index_of(&id) {
            let last = self.nodes.len() - 1;
            self.nodes.move_index(index, last);
        }
    }

    /// Topmost node containing `point`.
    pub fn node_at(&self, point: Point) -> Option<&Node> {
        self.nodes.values().rev().find(|n| n.contains(point))
    }

    /// Remove a node after disconnecting all of its links.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&id)?;
        let mut link_ids: Vec<LinkId> = node.inputs.iter().filter_map(|i| i.link).collect();
        for output in &node.outputs {
            link_ids.extend(output.links.iter().copied());
        }
        for link_id in link_ids {
            self.remove_link(link_id);
        }

        let floating: Vec<LinkId> = self
            .floating_links
            .values()
            .filter(|f| match f.end {
                FloatingEnd::Output { node, .. } | FloatingEnd::Input { node, .. } => node == id,
            })
            .map(|f| f.id)
            .collect();
        for link_id in floating {
            self.remove_floating_link(link_id);
        }

        for group in &mut self.groups {
            group.children.remove(&ItemId::Node(id));
        }
        self.nodes.shift_remove(&id)
    }

    /// Bounding box of all nodes.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .values()
            .map(|n| n.bounding())
            .reduce(|acc, r| acc.union(r))
    }

    // --- slots ----------------------------------------------------------

    /// Anchor point and facing direction of an output slot. Resolves the
    /// subgraph input boundary for [`NodeId::SUBGRAPH_INPUT`].
    pub fn output_anchor(&self, node: NodeId, slot: usize) -> Option<(Point, LinkDirection)> {
        if node == NodeId::SUBGRAPH_INPUT {
            let io = &self.io.as_ref()?.input;
            return (slot < io.slots.len()).then(|| (io.slot_pos(slot), io.slot_dir()));
        }
        let n = self.nodes.get(&node)?;
        (slot < n.outputs.len()).then(|| (n.output_pos(slot), n.output_dir(slot)))
    }

    /// Anchor point and facing direction of an input slot.
    pub fn input_anchor(&self, node: NodeId, slot: usize) -> Option<(Point, LinkDirection)> {
        if node == NodeId::SUBGRAPH_OUTPUT {
            let io = &self.io.as_ref()?.output;
            return (slot < io.slots.len()).then(|| (io.slot_pos(slot), io.slot_dir()));
        }
        let n = self.nodes.get(&node)?;
        (slot < n.inputs.len()).then(|| (n.input_pos(slot), n.input_dir(slot)))
    }

    pub fn output_type(&self, node: NodeId, slot: usize) -> Option<&str> {
        if node == NodeId::SUBGRAPH_INPUT {
            return self.io.as_ref()?.input.slots.get(slot).map(|s| s.type_name.as_str());
        }
        self.nodes
            .get(&node)?
            .outputs
            .get(slot)
            .map(|s| s.type_name.as_str())
    }

    pub fn input_type(&self, node: NodeId, slot: usize) -> Option<&str> {
        if node == NodeId::SUBGRAPH_OUTPUT {
            return self.io.as_ref()?.output.slots.get(slot).map(|s| s.type_name.as_str());
        }
        self.nodes
            .get(&node)?
            .inputs
            .get(slot)
            .map(|s| s.type_name.as_str())
    }

    /// Link currently feeding an input slot.
    pub fn input_link(&self, node: NodeId, slot: usize) -> Option<LinkId> {
        if node == NodeId::SUBGRAPH_OUTPUT {
            return self.io.as_ref()?.output.slots.get(slot)?.links.first().copied();
        }
        self.nodes.get(&node)?.inputs.get(slot)?.link
    }

    /// Links leaving an output slot.
    pub fn output_links(&self, node: NodeId, slot: usize) -> Vec<LinkId> {
        if node == NodeId::SUBGRAPH_INPUT {
            return self
                .io
                .as_ref()
                .and_then(|io| io.input.slots.get(slot))
                .map(|s| s.links.clone())
                .unwrap_or_default();
        }
        self.nodes
            .get(&node)
            .and_then(|n| n.outputs.get(slot))
            .map(|s| s.links.clone())
            .unwrap_or_default()
    }

    // --- links ----------------------------------------------------------

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn floating_link(&self, id: LinkId) -> Option<&FloatingLink> {
        self.floating_links.get(&id)
    }

    pub fn floating_links(&self) -> impl Iterator<Item = &FloatingLink> {
        self.floating_links.values()
    }

    /// Connect an output to an input, optionally routed through an existing
    /// reroute chain ending at `after_reroute`.
    ///
    /// Any link already feeding the input is replaced. Returns `None` if a
    /// slot is missing or the types are incompatible.
    pub fn connect(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
        after_reroute: Option<RerouteId>,
    ) -> Option<LinkId> {
        if origin == target {
            log::warn!("refusing to connect node {:?} to itself", origin);
            return None;
        }
        let Some(out_type) = self.output_type(origin, origin_slot).map(str::to_owned) else {
            log::warn!("connect: output {:?}[{}] does not exist", origin, origin_slot);
            return None;
        };
        let Some(in_type) = self.input_type(target, target_slot).map(str::to_owned) else {
            log::warn!("connect: input {:?}[{}] does not exist", target, target_slot);
            return None;
        };
        if !is_type_compatible(&out_type, &in_type) {
            log::warn!(
                "connect: type mismatch {:?}[{}] ({}) -> {:?}[{}] ({})",
                origin, origin_slot, out_type, target, target_slot, in_type
            );
            return None;
        }

        if let Some(existing) = self.input_link(target, target_slot) {
            self.remove_link(existing);
        }

        self.last_link_id += 1;
        let id = LinkId(self.last_link_id);
        let type_name = if out_type == "*" || out_type.is_empty() { in_type } else { out_type };
        let parent_id = after_reroute.filter(|r| self.reroutes.contains_key(r));

        if let Some(parent) = parent_id {
            for reroute_id in self.reroute_chain(parent).unwrap_or_default() {
                if let Some(reroute) = self.reroutes.get_mut(&reroute_id) {
                    reroute.link_ids.insert(id);
                    reroute.floating = None;
                }
            }
        }

        self.attach_output(origin, origin_slot, id);
        self.attach_input(target, target_slot, id);
        self.links.insert(
            id,
            Link {
                id,
                origin_id: origin,
                origin_slot,
                target_id: target,
                target_slot,
                type_name,
                parent_id,
                color: None,
            },
        );
        Some(id)
    }

    fn attach_output(&mut self, node: NodeId, slot: usize, link: LinkId) {
        if node == NodeId::SUBGRAPH_INPUT {
            if let Some(s) = self.io.as_mut().and_then(|io| io.input.slots.get_mut(slot)) {
                s.links.push(link);
            }
        } else if let Some(s) = self.nodes.get_mut(&node).and_then(|n| n.outputs.get_mut(slot)) {
            s.links.push(link);
        }
    }

    fn attach_input(&mut self, node: NodeId, slot: usize, link: LinkId) {
        if node == NodeId::SUBGRAPH_OUTPUT {
            if let Some(s) = self.io.as_mut().and_then(|io| io.output.slots.get_mut(slot)) {
                s.links = vec![link];
            }
        } else if let Some(s) = self.nodes.get_mut(&node).and_then(|n| n.inputs.get_mut(slot)) {
            s.link = Some(link);
        }
    }

    /// Remove a link and detach it from its slots and reroutes.
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.remove(&id)?;

        if link.origin_id == NodeId::SUBGRAPH_INPUT {
            if let Some(s) = self.io.as_mut().and_then(|io| io.input.slots.get_mut(link.origin_slot)) {
                s.links.retain(|l| *l != id);
            }
        } else if let Some(s) = self
            .nodes
            .get_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            s.links.retain(|l| *l != id);
        }

        if link.target_id == NodeId::SUBGRAPH_OUTPUT {
            if let Some(s) = self.io.as_mut().and_then(|io| io.output.slots.get_mut(link.target_slot)) {
                s.links.retain(|l| *l != id);
            }
        } else if let Some(s) = self
            .nodes
            .get_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if s.link == Some(id) {
                s.link = None;
            }
        }

        for reroute in self.reroutes.values_mut() {
            reroute.link_ids.remove(&id);
        }
        Some(link)
    }

    /// Disconnect whatever feeds an input. Returns true if a link was removed.
    pub fn disconnect_input(&mut self, node: NodeId, slot: usize) -> bool {
        match self.input_link(node, slot) {
            Some(link) => self.remove_link(link).is_some(),
            None => false,
        }
    }

    /// Remove one link leaving an output. Returns true if it was removed.
    pub fn disconnect_output_link(&mut self, node: NodeId, slot: usize, link: LinkId) -> bool {
        if !self.output_links(node, slot).contains(&link) {
            return false;
        }
        self.remove_link(link).is_some()
    }

    /// Add a floating link hanging off a reroute chain.
    pub fn add_floating_link(&mut self, end: FloatingEnd, type_name: impl Into<String>, parent_id: Option<RerouteId>) -> LinkId {
        self.last_link_id += 1;
        let id = LinkId(self.last_link_id);
        if let Some(parent) = parent_id {
            for reroute_id in self.reroute_chain(parent).unwrap_or_default() {
                if let Some(reroute) = self.reroutes.get_mut(&reroute_id) {
                    reroute.floating_link_ids.insert(id);
                }
            }
        }
        self.floating_links.insert(
            id,
            FloatingLink {
                id,
                end,
                type_name: type_name.into(),
                parent_id,
            },
        );
        id
    }

    pub fn remove_floating_link(&mut self, id: LinkId) -> Option<FloatingLink> {
        let link = self.floating_links.remove(&id)?;
        for reroute in self.reroutes.values_mut() {
            reroute.floating_link_ids.remove(&id);
        }
        Some(link)
    }

    /// Remove links whose endpoints no longer resolve to existing slots.
    pub fn prune_dangling_links(&mut self) -> usize {
        let dangling: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| {
                self.output_anchor(l.origin_id, l.origin_slot).is_none()
                    || self.input_anchor(l.target_id, l.target_slot).is_none()
            })
            .map(|l| l.id)
            .collect();
        for id in &dangling {
            log::warn!("pruning dangling link {:?}", id);
            self.remove_link(*id);
        }
        dangling.len()
    }

    /// Rewire a node's inputs straight to the targets of its outputs, so a
    /// chain A -> X -> B becomes A -> B once X is removed.
    ///
    /// The first pass pairs input `i` with output `i` when their types are
    /// compatible. With `keep_all_links`, remaining inputs are paired with
    /// the first compatible output. Returns true if any link was made.
    pub fn connect_input_to_output(&mut self, node_id: NodeId, keep_all_links: bool) -> bool {
        let Some(node) = self.nodes.get(&node_id) else {
            return false;
        };
        let inputs: Vec<(usize, Option<LinkId>, String)> = node
            .inputs
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.link, s.type_name.clone()))
            .collect();
        let output_types: Vec<String> = node.outputs.iter().map(|s| s.type_name.clone()).collect();

        let mut made_any = false;

        for (index, link, input_type) in &inputs {
            let Some(link_id) = link else { continue };
            let Some(output_type) = output_types.get(*index) else { continue };
            if !is_type_compatible(input_type, output_type) {
                continue;
            }
            made_any |= self.bypass_output(node_id, *index, *link_id);
        }

        if !keep_all_links {
            return made_any;
        }

        for (_, link, input_type) in &inputs {
            let Some(link_id) = link else { continue };
            if !self.links.contains_key(link_id) {
                continue;
            }
            if let Some(out_index) = output_types.iter().position(|t| is_type_compatible(input_type, t)) {
                made_any |= self.bypass_output(node_id, out_index, *link_id);
            }
        }
        made_any
    }

    /// Reconnect the origin of `in_link` to every target of `node`'s output.
    fn bypass_output(&mut self, node: NodeId, output: usize, in_link: LinkId) -> bool {
        let Some(in_link) = self.links.get(&in_link).cloned() else {
            return false;
        };
        let out_links: Vec<Link> = self
            .output_links(node, output)
            .iter()
            .filter_map(|id| self.links.get(id).cloned())
            .collect();

        let mut made_any = false;
        for out_link in out_links {
            let result = self.connect(
                in_link.origin_id,
                in_link.origin_slot,
                out_link.target_id,
                out_link.target_slot,
                in_link.parent_id,
            );
            if result.is_none() {
                log::warn!(
                    "bypass of {:?} could not reconnect to {:?}[{}]",
                    node, out_link.target_id, out_link.target_slot
                );
            }
            made_any |= result.is_some();
        }
        made_any
    }

    // --- reroutes -------------------------------------------------------

    pub fn reroute(&self, id: RerouteId) -> Option<&Reroute> {
        self.reroutes.get(&id)
    }

    pub fn reroute_mut(&mut self, id: RerouteId) -> Option<&mut Reroute> {
        self.reroutes.get_mut(&id)
    }

    pub fn reroutes(&self) -> impl Iterator<Item = &Reroute> {
        self.reroutes.values()
    }

    pub fn reroutes_mut(&mut self) -> impl Iterator<Item = &mut Reroute> {
        self.reroutes.values_mut()
    }

    pub fn reroute_at(&self, point: Point) -> Option<&Reroute> {
        self.reroutes.values().rev().find(|r| r.contains_point(point))
    }

    /// Add a reroute at `pos`. The parent is dropped if it does not exist.
    pub fn create_reroute(&mut self, pos: Point, parent: Option<RerouteId>) -> RerouteId {
        self.last_reroute_id += 1;
        let id = RerouteId(self.last_reroute_id);
        let mut reroute = Reroute::new(id, pos);
        reroute.set_parent(parent.filter(|p| self.reroutes.contains_key(p)));
        self.reroutes.insert(id, reroute);
        id
    }

    /// Insert a new reroute into an existing link segment.
    ///
    /// Everything that previously followed the segment's start now follows
    /// the new reroute instead.
    pub fn insert_reroute(&mut self, pos: Point, segment: SegmentId) -> Option<RerouteId> {
        let (before_parent, link_ids, floating_ids) = match segment {
            SegmentId::Link(link_id) => {
                let link = self.links.get(&link_id)?;
                (link.parent_id, vec![link_id], Vec::new())
            }
            SegmentId::Floating(link_id) => {
                let link = self.floating_links.get(&link_id)?;
                (link.parent_id, Vec::new(), vec![link_id])
            }
            SegmentId::Reroute(reroute_id) => {
                let reroute = self.reroutes.get(&reroute_id)?;
                (
                    reroute.parent_id,
                    reroute.link_ids.iter().copied().collect(),
                    reroute.floating_link_ids.iter().copied().collect(),
                )
            }
        };

        let id = self.create_reroute(pos, before_parent);
        let mut affected_reroutes = Vec::new();

        for link_id in &link_ids {
            if let Some(link) = self.links.get_mut(link_id) {
                if link.parent_id == before_parent {
                    link.parent_id = Some(id);
                }
            }
            let chain = self.link_reroutes(*link_id);
            affected_reroutes.extend(chain);
        }
        for link_id in &floating_ids {
            if let Some(link) = self.floating_links.get_mut(link_id) {
                if link.parent_id == before_parent {
                    link.parent_id = Some(id);
                }
            }
            if let Some(parent) = self.floating_links.get(link_id).and_then(|l| l.parent_id) {
                affected_reroutes.extend(self.reroute_chain(parent).unwrap_or_default());
            }
        }
        for reroute_id in affected_reroutes {
            if reroute_id == id {
                continue;
            }
            if let Some(r) = self.reroutes.get_mut(&reroute_id) {
                if r.parent_id == before_parent {
                    r.parent_id = Some(id);
                }
            }
        }

        if let Some(reroute) = self.reroutes.get_mut(&id) {
            reroute.link_ids = link_ids.into_iter().collect();
            reroute.floating_link_ids = floating_ids.into_iter().collect();
        }
        Some(id)
    }

    /// Remove a reroute, splicing its children and links onto its parent.
    pub fn remove_reroute(&mut self, id: RerouteId) -> Option<Reroute> {
        let reroute = self.reroutes.remove(&id)?;
        let parent = reroute.parent_id;
        for other in self.reroutes.values_mut() {
            if other.parent_id == Some(id) {
                other.parent_id = parent;
            }
        }
        for link in self.links.values_mut() {
            if link.parent_id == Some(id) {
                link.parent_id = parent;
            }
        }
        let mut orphaned = Vec::new();
        for link in self.floating_links.values_mut() {
            if link.parent_id == Some(id) {
                link.parent_id = parent;
                if parent.is_none() {
                    orphaned.push(link.id);
                }
            }
        }
        for link_id in orphaned {
            self.remove_floating_link(link_id);
        }
        for group in &mut self.groups {
            group.children.remove(&ItemId::Reroute(id));
        }
        Some(reroute)
    }

    /// Reroutes from the root of the chain down to `id`.
    ///
    /// Returns `None` if the chain loops. A parent that no longer exists ends
    /// the chain.
    pub fn reroute_chain(&self, id: RerouteId) -> Option<Vec<RerouteId>> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if !visited.insert(cid) {
                log::warn!("reroute chain loops at {:?}", cid);
                return None;
            }
            let Some(reroute) = self.reroutes.get(&cid) else {
                break;
            };
            chain.push(cid);
            current = reroute.parent_id;
        }
        chain.reverse();
        Some(chain)
    }

    /// Reroutes a link passes through, origin side first. Empty when the
    /// chain is broken by a loop.
    pub fn link_reroutes(&self, link: LinkId) -> Vec<RerouteId> {
        self.links
            .get(&link)
            .and_then(|l| l.parent_id)
            .and_then(|parent| self.reroute_chain(parent))
            .unwrap_or_default()
    }

    /// Drop link ids that no longer pass through the reroute. Returns true
    /// if any real or floating link remains.
    pub fn validate_reroute(&mut self, id: RerouteId) -> bool {
        let Some(reroute) = self.reroutes.get(&id) else {
            return false;
        };
        let valid_links: BTreeSet<LinkId> = reroute
            .link_ids
            .iter()
            .copied()
            .filter(|l| self.links.contains_key(l) && self.link_reroutes(*l).contains(&id))
            .collect();
        let valid_floating: BTreeSet<LinkId> = reroute
            .floating_link_ids
            .iter()
            .copied()
            .filter(|l| self.floating_links.contains_key(l))
            .collect();
        let valid = !valid_links.is_empty() || !valid_floating.is_empty();
        if let Some(reroute) = self.reroutes.get_mut(&id) {
            reroute.link_ids = valid_links;
            reroute.floating_link_ids = valid_floating;
        }
        valid
    }

    /// Output feeding the links that pass through a reroute.
    pub fn reroute_source_output(&self, id: RerouteId) -> Option<(NodeId, usize)> {
        let reroute = self.reroutes.get(&id)?;
        if let Some(link) = reroute.link_ids.iter().find_map(|l| self.links.get(l)) {
            return Some((link.origin_id, link.origin_slot));
        }
        reroute
            .floating_link_ids
            .iter()
            .filter_map(|l| self.floating_links.get(l))
            .find_map(|f| match f.end {
                FloatingEnd::Output { node, slot } => Some((node, slot)),
                FloatingEnd::Input { .. } => None,
            })
    }

    /// Inputs reached by the links passing through a reroute.
    pub fn reroute_target_inputs(&self, id: RerouteId) -> Vec<(NodeId, usize)> {
        let Some(reroute) = self.reroutes.get(&id) else {
            return Vec::new();
        };
        reroute
            .link_ids
            .iter()
            .filter_map(|l| self.links.get(l))
            .map(|l| (l.target_id, l.target_slot))
            .collect()
    }

    /// Position a link heads to after leaving reroute `id`: the next reroute
    /// in its chain, or its target slot.
    pub fn next_pos_after(&self, link: &Link, id: RerouteId) -> Option<Point> {
        let chain = self.link_reroutes(link.id);
        let index = chain.iter().position(|r| *r == id)?;
        match chain.get(index + 1) {
            Some(next) => self.reroutes.get(next).map(|r| r.pos),
            None => self.input_anchor(link.target_id, link.target_slot).map(|(p, _)| p),
        }
    }

    // --- groups ---------------------------------------------------------

    pub fn add_group(&mut self, mut group: Group) -> GroupId {
        self.last_group_id += 1;
        let id = GroupId(self.last_group_id);
        group.id = id;
        group.selected = false;
        self.groups.push(group);
        id
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn groups(&self) -> impl DoubleEndedIterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let index = self.groups.iter().position(|g| g.id == id)?;
        let group = self.groups.remove(index);
        for other in &mut self.groups {
            other.children.remove(&ItemId::Group(id));
        }
        Some(group)
    }

    /// Topmost group containing `point`.
    pub fn group_at(&self, point: Point) -> Option<&Group> {
        self.groups.iter().rev().find(|g| g.contains(point))
    }

    /// Recompute which nodes, reroutes and groups are inside a group.
    pub fn recompute_group_children(&mut self, id: GroupId) {
        let Some(bounding) = self.group(id).map(|g| g.bounding) else {
            return;
        };
        let mut children = BTreeSet::new();
        for node in self.nodes.values() {
            if contains_centre(bounding, node.bounding()) {
                children.insert(ItemId::Node(node.id));
            }
        }
        for reroute in self.reroutes.values() {
            if is_point_in_rect(reroute.pos, bounding) {
                children.insert(ItemId::Reroute(reroute.id));
            }
        }
        for group in &self.groups {
            if group.id != id && contains_rect(bounding, group.bounding) {
                children.insert(ItemId::Group(group.id));
            }
        }
        if let Some(group) = self.group_mut(id) {
            group.children = children;
        }
    }

    // --- positionables ----------------------------------------------------

    pub fn item(&self, id: ItemId) -> Option<&dyn Positionable> {
        match id {
            ItemId::Node(n) => self.nodes.get(&n).map(|x| x as &dyn Positionable),
            ItemId::Group(g) => self.group(g).map(|x| x as &dyn Positionable),
            ItemId::Reroute(r) => self.reroutes.get(&r).map(|x| x as &dyn Positionable),
            ItemId::IoNode(kind) => self.io.as_ref().map(|io| io.get(kind) as &dyn Positionable),
        }
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut dyn Positionable> {
        match id {
            ItemId::Node(n) => self.nodes.get_mut(&n).map(|x| x as &mut dyn Positionable),
            ItemId::Group(g) => self.group_mut(g).map(|x| x as &mut dyn Positionable),
            ItemId::Reroute(r) => self.reroutes.get_mut(&r).map(|x| x as &mut dyn Positionable),
            ItemId::IoNode(kind) => self.io.as_mut().map(|io| io.get_mut(kind) as &mut dyn Positionable),
        }
    }

    pub fn contains_item(&self, id: ItemId) -> bool {
        self.item(id).is_some()
    }

    /// Every item id in the graph, in draw order per category.
    pub fn all_items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self.groups.iter().map(|g| ItemId::Group(g.id)).collect();
        items.extend(self.nodes.keys().map(|id| ItemId::Node(*id)));
        items.extend(self.reroutes.keys().map(|id| ItemId::Reroute(*id)));
        if self.io.is_some() {
            items.push(ItemId::IoNode(IoKind::Input));
            items.push(ItemId::IoNode(IoKind::Output));
        }
        items
    }

    /// `items` plus everything nested inside any selected group.
    pub fn expand_group_children(&self, items: &BTreeSet<ItemId>) -> BTreeSet<ItemId> {
        let mut result = items.clone();
        let mut pending: Vec<ItemId> = items.iter().copied().collect();
        while let Some(item) = pending.pop() {
            if let ItemId::Group(gid) = item {
                if let Some(group) = self.group(gid) {
                    for child in &group.children {
                        if result.insert(*child) {
                            pending.push(*child);
                        }
                    }
                }
            }
        }
        result
    }

    /// Move an item by `delta`.
    pub fn move_item(&mut self, id: ItemId, delta: Vec2) {
        if let Some(item) = self.item_mut(id) {
            item.move_by(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f64, y: f64) -> Node {
        Node::new("test/pass")
            .with_pos(x, y)
            .with_input("in", "number")
            .with_output("out", "number")
    }

    fn chain() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.add_node(node(0.0, 0.0));
        let x = graph.add_node(node(200.0, 0.0));
        let b = graph.add_node(node(400.0, 0.0));
        graph.connect(a, 0, x, 0, None).unwrap();
        graph.connect(x, 0, b, 0, None).unwrap();
        (graph, a, x, b)
    }

    #[test]
    fn test_connect_sets_slots() {
        let (graph, a, x, _) = chain();
        let link_id = graph.input_link(x, 0).unwrap();
        let link = graph.link(link_id).unwrap();
        assert!(link.originates(a, 0));
        assert_eq!(graph.output_links(a, 0), vec![link_id]);
    }

    #[test]
    fn test_connect_rejects_type_mismatch() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_output("img", "image"));
        let b = graph.add_node(Node::new("b").with_input("n", "number"));
        assert!(graph.connect(a, 0, b, 0, None).is_none());
        assert!(graph.connect(a, 5, b, 0, None).is_none());
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_connect_replaces_existing_input_link() {
        let (mut graph, a, _, b) = chain();
        let old = graph.input_link(b, 0).unwrap();
        let new = graph.connect(a, 0, b, 0, None).unwrap();
        assert!(graph.link(old).is_none());
        assert_eq!(graph.input_link(b, 0), Some(new));
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn test_pass_through_delete() {
        let (mut graph, a, x, b) = chain();
        assert!(graph.connect_input_to_output(x, false));
        graph.remove_node(x);
        assert_eq!(graph.link_count(), 1);
        let link = graph.links().next().unwrap();
        assert!(link.originates(a, 0));
        assert!(link.targets(b, 0));
        assert_eq!(graph.input_link(b, 0), Some(link.id));
    }

    #[test]
    fn test_remove_node_clears_links() {
        let (mut graph, a, x, b) = chain();
        graph.remove_node(x);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.output_links(a, 0).is_empty());
        assert!(graph.input_link(b, 0).is_none());
    }

    #[test]
    fn test_bring_to_front() {
        let (mut graph, a, _, _) = chain();
        graph.bring_to_front(a);
        assert_eq!(graph.nodes().last().map(|n| n.id), Some(a));
    }

    #[test]
    fn test_reroute_chain_and_loop() {
        let mut graph = Graph::new();
        let r1 = graph.create_reroute(Point::new(0.0, 0.0), None);
        let r2 = graph.create_reroute(Point::new(10.0, 0.0), Some(r1));
        let r3 = graph.create_reroute(Point::new(20.0, 0.0), Some(r2));
        assert_eq!(graph.reroute_chain(r3), Some(vec![r1, r2, r3]));

        graph.reroute_mut(r1).unwrap().parent_id = Some(r3);
        assert_eq!(graph.reroute_chain(r3), None);
    }

    #[test]
    fn test_missing_parent_ends_chain() {
        let mut graph = Graph::new();
        let r1 = graph.create_reroute(Point::ZERO, None);
        graph.reroute_mut(r1).unwrap().parent_id = Some(RerouteId(99));
        assert_eq!(graph.reroute_chain(r1), Some(vec![r1]));
    }

    #[test]
    fn test_insert_reroute_on_link() {
        let (mut graph, _, x, _) = chain();
        let link_id = graph.input_link(x, 0).unwrap();
        let r1 = graph.insert_reroute(Point::new(100.0, 50.0), SegmentId::Link(link_id)).unwrap();
        assert_eq!(graph.link(link_id).unwrap().parent_id, Some(r1));
        assert!(graph.reroute(r1).unwrap().link_ids.contains(&link_id));

        // Splitting the segment arriving at r1 puts r2 before it
        let r2 = graph.insert_reroute(Point::new(50.0, 50.0), SegmentId::Reroute(r1)).unwrap();
        assert_eq!(graph.reroute(r1).unwrap().parent_id, Some(r2));
        assert_eq!(graph.link_reroutes(link_id), vec![r2, r1]);
        assert!(graph.validate_reroute(r2));
    }

    #[test]
    fn test_remove_reroute_splices_chain() {
        let (mut graph, _, x, _) = chain();
        let link_id = graph.input_link(x, 0).unwrap();
        let r1 = graph.insert_reroute(Point::new(100.0, 50.0), SegmentId::Link(link_id)).unwrap();
        let r2 = graph.insert_reroute(Point::new(50.0, 50.0), SegmentId::Reroute(r1)).unwrap();
        graph.remove_reroute(r1);
        assert_eq!(graph.link(link_id).unwrap().parent_id, Some(r2));
        assert_eq!(graph.link_reroutes(link_id), vec![r2]);
    }

    #[test]
    fn test_connect_through_reroute_registers_link() {
        let mut graph = Graph::new();
        let a = graph.add_node(node(0.0, 0.0));
        let b = graph.add_node(node(400.0, 0.0));
        let r = graph.create_reroute(Point::new(200.0, 100.0), None);
        let link = graph.connect(a, 0, b, 0, Some(r)).unwrap();
        assert!(graph.reroute(r).unwrap().link_ids.contains(&link));
        assert_eq!(graph.reroute_source_output(r), Some((a, 0)));
        assert_eq!(graph.reroute_target_inputs(r), vec![(b, 0)]);
        let target = graph.input_anchor(b, 0).unwrap().0;
        assert_eq!(graph.next_pos_after(graph.link(link).unwrap(), r), Some(target));
    }

    #[test]
    fn test_validate_reroute_drops_stale_links() {
        let mut graph = Graph::new();
        let r = graph.create_reroute(Point::ZERO, None);
        graph.reroute_mut(r).unwrap().link_ids.insert(LinkId(42));
        assert!(!graph.validate_reroute(r));
        assert!(graph.reroute(r).unwrap().link_ids.is_empty());
    }

    #[test]
    fn test_prune_dangling_links() {
        let (mut graph, _, x, _) = chain();
        graph.node_mut(x).unwrap().outputs.clear();
        assert_eq!(graph.prune_dangling_links(), 1);
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn test_group_children() {
        let mut graph = Graph::new();
        let inside = graph.add_node(node(20.0, 60.0).with_size(40.0, 40.0));
        let outside = graph.add_node(node(500.0, 500.0));
        let r = graph.create_reroute(Point::new(150.0, 150.0), None);
        let g = graph.add_group(Group::new("g", Rect::new(0.0, 0.0, 300.0, 300.0)));
        let inner = graph.add_group(Group::new("inner", Rect::new(10.0, 200.0, 200.0, 290.0)));
        graph.recompute_group_children(g);
        let children = &graph.group(g).unwrap().children;
        assert!(children.contains(&ItemId::Node(inside)));
        assert!(!children.contains(&ItemId::Node(outside)));
        assert!(children.contains(&ItemId::Reroute(r)));
        assert!(children.contains(&ItemId::Group(inner)));

        let expanded = graph.expand_group_children(&[ItemId::Group(g)].into_iter().collect());
        assert!(expanded.contains(&ItemId::Node(inside)));
    }

    #[test]
    fn test_json_roundtrip_keeps_links() {
        let (graph, a, x, _) = chain();
        let json = graph.to_json().unwrap();
        let restored = Graph::from_json(&json).unwrap();
        assert_eq!(restored.node_count(), 3);
        let link = restored.link(restored.input_link(x, 0).unwrap()).unwrap();
        assert!(link.originates(a, 0));
    }

    #[test]
    fn test_registry() {
        let registry = NodeTypeRegistry::new().with_type("math/add");
        assert!(registry.contains("math/add"));
        assert!(!registry.contains("math/sub"));
        assert!(NodeTypeRegistry::permissive().contains("anything"));
    }
}
