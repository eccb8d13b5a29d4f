//! Link connector: creating, moving and dropping links.
//!
//! A connection gesture starts from a slot, a reroute or a link segment and
//! produces one or more [`RenderLink`]s, each with a fixed end and a loose
//! end that follows the pointer. Dropping resolves the loose end against
//! whatever is under the pointer.

use crate::canvas::{CanvasError, CanvasResult};
use crate::graph::{
    is_type_compatible, FloatingEnd, Graph, IoKind, LinkId, NodeId, RerouteId, SegmentId,
};
use crate::measure::LinkDirection;
use kurbo::Point;
use std::collections::BTreeSet;

/// Which kind of slot the loose end is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Input,
    Output,
}

/// A link being dragged.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLink {
    /// Slot kind the loose end connects to.
    pub to: SlotKind,
    /// Node of the fixed end. For links heading to an input this is an
    /// output's node, and vice versa.
    pub node: NodeId,
    pub slot: usize,
    pub type_name: String,
    /// Reroute the loose end leaves from, if any.
    pub from_reroute: Option<RerouteId>,
    pub from_direction: LinkDirection,
    /// Existing link being moved.
    pub moving: Option<LinkId>,
    /// Existing floating link being moved.
    pub moving_floating: Option<LinkId>,
}

impl RenderLink {
    fn to_input(node: NodeId, slot: usize, type_name: String, from_reroute: Option<RerouteId>) -> Self {
        Self {
            to: SlotKind::Input,
            node,
            slot,
            type_name,
            from_reroute,
            from_direction: LinkDirection::Right,
            moving: None,
            moving_floating: None,
        }
    }

    fn to_output(node: NodeId, slot: usize, type_name: String, from_reroute: Option<RerouteId>) -> Self {
        Self {
            to: SlotKind::Output,
            node,
            slot,
            type_name,
            from_reroute,
            from_direction: LinkDirection::Left,
            moving: None,
            moving_floating: None,
        }
    }

    /// Graph position the candidate link is drawn from.
    pub fn fixed_pos(&self, graph: &Graph) -> Option<Point> {
        if let Some(reroute) = self.from_reroute.and_then(|r| graph.reroute(r)) {
            return Some(reroute.pos);
        }
        match self.to {
            SlotKind::Input => graph.output_anchor(self.node, self.slot).map(|(p, _)| p),
            SlotKind::Output => graph.input_anchor(self.node, self.slot).map(|(p, _)| p),
        }
    }

    /// Whether this link may be connected to `node`'s input `slot`.
    pub fn can_connect_to_input(&self, graph: &Graph, node: NodeId, slot: usize) -> bool {
        if self.to != SlotKind::Input || self.node == node {
            return false;
        }
        if let Some(link) = self.moving.and_then(|l| graph.link(l)) {
            if link.targets(node, slot) {
                return false;
            }
        }
        graph
            .input_type(node, slot)
            .is_some_and(|t| is_type_compatible(&self.type_name, t))
    }

    /// Whether this link may be connected to `node`'s output `slot`.
    pub fn can_connect_to_output(&self, graph: &Graph, node: NodeId, slot: usize) -> bool {
        if self.to != SlotKind::Output || self.node == node {
            return false;
        }
        if let Some(link) = self.moving.and_then(|l| graph.link(l)) {
            if link.originates(node, slot) {
                return false;
            }
        }
        graph
            .output_type(node, slot)
            .is_some_and(|t| is_type_compatible(t, &self.type_name))
    }
}

/// Connection state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorState {
    pub connecting_to: Option<SlotKind>,
    /// More than one link is being moved.
    pub multi: bool,
    pub dragging_existing_links: bool,
    /// Slot position the loose end snaps to while hovering a valid target.
    pub snap_links_pos: Option<Point>,
}

/// What was under the pointer at drop time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropTarget {
    IoNode { kind: IoKind, slot: Option<usize> },
    Node(NodeId),
    Reroute(RerouteId),
    Nothing,
}

/// Finds drop targets by position.
pub trait ItemLocator {
    fn locate(&self, pos: Point) -> DropTarget;
}

impl ItemLocator for Graph {
    fn locate(&self, pos: Point) -> DropTarget {
        if let Some(io) = self.io.as_ref() {
            for kind in [IoKind::Input, IoKind::Output] {
                let io_node = io.get(kind);
                if io_node.contains(pos) || io_node.slot_at(pos).is_some() {
                    return DropTarget::IoNode {
                        kind,
                        slot: io_node.slot_at(pos),
                    };
                }
            }
        }
        if let Some(node) = self.node_at(pos) {
            return DropTarget::Node(node.id);
        }
        if let Some(reroute) = self.reroute_at(pos) {
            return DropTarget::Reroute(reroute.id);
        }
        DropTarget::Nothing
    }
}

/// Outcome of a drop.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorDrop {
    /// Links created by the drop.
    Connected(Vec<LinkId>),
    /// Moved links were dropped on empty canvas and removed.
    Disconnected(usize),
    /// A new link was released over empty canvas. The host may offer to
    /// create a node here.
    OnCanvas { from: RenderLink, pos: Point },
    /// Nothing happened.
    Ignored,
}

/// Creates and moves links.
#[derive(Debug, Clone, Default)]
pub struct LinkConnector {
    pub state: ConnectorState,
    pub render_links: Vec<RenderLink>,
    /// Existing links being moved to a new input.
    pub input_links: Vec<LinkId>,
    /// Existing links being moved to a new output.
    pub output_links: Vec<LinkId>,
    /// Floating links being moved.
    pub floating_links: Vec<LinkId>,
    pub hidden_reroutes: BTreeSet<RerouteId>,
    /// Latest pointer position in graph space.
    pub pointer_pos: Option<Point>,
}

impl LinkConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.connecting_to.is_some()
    }

    fn ensure_idle(&self) -> CanvasResult<()> {
        if self.is_connecting() {
            return Err(CanvasError::ConnectorBusy);
        }
        Ok(())
    }

    /// Drag a new link out of an output.
    pub fn drag_new_from_output(&mut self, graph: &Graph, node: NodeId, slot: usize) -> CanvasResult<()> {
        self.ensure_idle()?;
        let Some(type_name) = graph.output_type(node, slot) else {
            return Err(CanvasError::NodeNotFound(node));
        };
        self.render_links
            .push(RenderLink::to_input(node, slot, type_name.to_owned(), None));
        self.state.connecting_to = Some(SlotKind::Input);
        log::debug!("connecting from output {:?}[{}]", node, slot);
        Ok(())
    }

    /// Drag a new link out of an input.
    pub fn drag_new_from_input(&mut self, graph: &Graph, node: NodeId, slot: usize) -> CanvasResult<()> {
        self.ensure_idle()?;
        let Some(type_name) = graph.input_type(node, slot) else {
            return Err(CanvasError::NodeNotFound(node));
        };
        self.render_links
            .push(RenderLink::to_output(node, slot, type_name.to_owned(), None));
        self.state.connecting_to = Some(SlotKind::Output);
        log::debug!("connecting from input {:?}[{}]", node, slot);
        Ok(())
    }

    /// Pick up the link feeding an input so it can be dropped on another input.
    pub fn move_input_link(&mut self, graph: &Graph, node: NodeId, slot: usize) -> CanvasResult<()> {
        self.ensure_idle()?;

        match graph.input_link(node, slot).and_then(|id| graph.link(id)) {
            Some(link) => {
                let mut render = RenderLink::to_input(
                    link.origin_id,
                    link.origin_slot,
                    link.type_name.clone(),
                    link.parent_id,
                );
                render.moving = Some(link.id);
                if link.parent_id.is_some() {
                    render.from_direction = LinkDirection::Center;
                }
                self.render_links.push(render);
                self.input_links.push(link.id);
            }
            None => {
                let floating = graph.floating_links().find(|f| {
                    f.end == FloatingEnd::Input { node, slot } && f.parent_id.is_some()
                });
                let Some(floating) = floating else {
                    return Ok(());
                };
                let Some((origin, origin_slot)) =
                    floating.parent_id.and_then(|r| graph.reroute_source_output(r))
                else {
                    log::warn!("floating link {:?} has no source output", floating.id);
                    return Ok(());
                };
                let mut render = RenderLink::to_input(
                    origin,
                    origin_slot,
                    floating.type_name.clone(),
                    floating.parent_id,
                );
                render.moving_floating = Some(floating.id);
                self.render_links.push(render);
                self.floating_links.push(floating.id);
            }
        }

        self.state.connecting_to = Some(SlotKind::Input);
        self.state.dragging_existing_links = true;
        Ok(())
    }

    /// Pick up every link leaving an output so they can be dropped on
    /// another output.
    pub fn move_output_link(&mut self, graph: &Graph, node: NodeId, slot: usize) -> CanvasResult<()> {
        self.ensure_idle()?;

        for link_id in graph.output_links(node, slot) {
            let Some(link) = graph.link(link_id) else { continue };
            let first_reroute = graph.link_reroutes(link_id).first().copied();
            if let Some(reroute) = first_reroute {
                self.hidden_reroutes.insert(reroute);
            }
            self.output_links.push(link_id);
            let mut render = RenderLink::to_output(
                link.target_id,
                link.target_slot,
                link.type_name.clone(),
                first_reroute,
            );
            render.moving = Some(link_id);
            self.render_links.push(render);
        }

        if self.render_links.is_empty() {
            return Ok(());
        }
        self.state.connecting_to = Some(SlotKind::Output);
        self.state.dragging_existing_links = true;
        self.state.multi = self.render_links.len() > 1;
        Ok(())
    }

    /// Drag a new link from a reroute towards an input. The new link shares
    /// the reroute's upstream chain.
    pub fn drag_from_reroute(&mut self, graph: &Graph, reroute: RerouteId) -> CanvasResult<()> {
        self.ensure_idle()?;
        let Some((node, slot)) = graph.reroute_source_output(reroute) else {
            log::warn!("reroute {:?} has no source output", reroute);
            return Ok(());
        };
        let Some(type_name) = graph.output_type(node, slot) else {
            return Err(CanvasError::NodeNotFound(node));
        };
        let mut render = RenderLink::to_input(node, slot, type_name.to_owned(), Some(reroute));
        render.from_direction = LinkDirection::None;
        self.render_links.push(render);
        self.state.connecting_to = Some(SlotKind::Input);
        Ok(())
    }

    /// Drag a new link starting where an existing segment starts.
    pub fn drag_from_link_segment(&mut self, graph: &Graph, segment: SegmentId) -> CanvasResult<()> {
        self.ensure_idle()?;
        let (origin, parent) = match segment {
            SegmentId::Link(id) => match graph.link(id) {
                Some(link) => ((link.origin_id, link.origin_slot), link.parent_id),
                None => return Ok(()),
            },
            SegmentId::Reroute(id) => {
                let Some(reroute) = graph.reroute(id) else {
                    return Ok(());
                };
                let Some(origin) = graph.reroute_source_output(id) else {
                    return Ok(());
                };
                (origin, reroute.parent_id)
            }
            SegmentId::Floating(_) => return Ok(()),
        };
        let Some(type_name) = graph.output_type(origin.0, origin.1) else {
            return Ok(());
        };
        let mut render = RenderLink::to_input(origin.0, origin.1, type_name.to_owned(), parent);
        render.from_direction = LinkDirection::None;
        self.render_links.push(render);
        self.state.connecting_to = Some(SlotKind::Input);
        Ok(())
    }

    /// Track the pointer. `snap` is a slot position to attach the loose end to.
    pub fn update_pointer(&mut self, pos: Point, snap: Option<Point>) {
        self.pointer_pos = Some(pos);
        self.state.snap_links_pos = snap;
    }

    /// Where the loose end is drawn.
    pub fn loose_end(&self) -> Option<Point> {
        self.state.snap_links_pos.or(self.pointer_pos)
    }

    /// Links whose final segment should not be drawn while dragging.
    pub fn dragging_links(&self) -> BTreeSet<LinkId> {
        let mut links: BTreeSet<LinkId> = self.input_links.iter().copied().collect();
        for link in &self.output_links {
            if !self.render_links.iter().any(|r| r.moving == Some(*link) && r.from_reroute.is_some()) {
                links.insert(*link);
            }
        }
        links
    }

    pub fn is_input_valid_drop(&self, graph: &Graph, node: NodeId, slot: usize) -> bool {
        self.render_links
            .iter()
            .any(|link| link.can_connect_to_input(graph, node, slot))
    }

    pub fn is_output_valid_drop(&self, graph: &Graph, node: NodeId, slot: usize) -> bool {
        self.render_links
            .iter()
            .any(|link| link.can_connect_to_output(graph, node, slot))
    }

    /// Whether any slot on `node` accepts one of the dragged links.
    pub fn is_node_valid_drop(&self, graph: &Graph, node: NodeId) -> bool {
        let Some(n) = graph.node(node) else {
            return false;
        };
        match self.state.connecting_to {
            Some(SlotKind::Output) => (0..n.outputs.len()).any(|s| self.is_output_valid_drop(graph, node, s)),
            Some(SlotKind::Input) => (0..n.inputs.len()).any(|s| self.is_input_valid_drop(graph, node, s)),
            None => false,
        }
    }

    /// Whether dropping on `reroute` would connect anything without creating
    /// a reroute cycle.
    pub fn is_reroute_valid_drop(&self, graph: &Graph, reroute: RerouteId) -> bool {
        match self.state.connecting_to {
            Some(SlotKind::Input) => {
                let targets = graph.reroute_target_inputs(reroute);
                self.render_links.iter().any(|link| {
                    !creates_reroute_cycle(graph, link.from_reroute, reroute)
                        && targets
                            .iter()
                            .any(|(node, slot)| link.can_connect_to_input(graph, *node, *slot))
                })
            }
            Some(SlotKind::Output) => {
                let Some((node, slot)) = graph.reroute_source_output(reroute) else {
                    return false;
                };
                self.render_links
                    .iter()
                    .any(|link| link.can_connect_to_output(graph, node, slot))
            }
            None => false,
        }
    }

    /// Resolve the drop at `pos` (graph space), connect what can be
    /// connected, and reset.
    pub fn drop_links(&mut self, graph: &mut Graph, pos: Point) -> ConnectorDrop {
        if !self.is_connecting() {
            return ConnectorDrop::Ignored;
        }
        let target = graph.locate(pos);
        log::debug!("dropping {} link(s) on {:?}", self.render_links.len(), target);

        let result = match target {
            DropTarget::IoNode { kind, slot } => self.drop_on_io_node(graph, kind, slot, pos),
            DropTarget::Node(node) => self.drop_on_node(graph, node, pos),
            DropTarget::Reroute(reroute) if self.is_reroute_valid_drop(graph, reroute) => {
                self.drop_on_reroute(graph, reroute)
            }
            DropTarget::Reroute(_) | DropTarget::Nothing => self.drop_on_nothing(graph, pos),
        };
        self.reset();
        result
    }

    fn drop_on_io_node(&mut self, graph: &mut Graph, kind: IoKind, slot: Option<usize>, pos: Point) -> ConnectorDrop {
        let Some(slot) = slot else {
            return self.drop_on_nothing(graph, pos);
        };
        let mut created = Vec::new();
        match (self.state.connecting_to, kind) {
            (Some(SlotKind::Input), IoKind::Output) => {
                for link in self.render_links.clone() {
                    if link.can_connect_to_input(graph, NodeId::SUBGRAPH_OUTPUT, slot) {
                        created.extend(self.connect_render_link(graph, &link, NodeId::SUBGRAPH_OUTPUT, slot));
                    }
                }
            }
            (Some(SlotKind::Output), IoKind::Input) => {
                for link in self.render_links.clone() {
                    if link.can_connect_to_output(graph, NodeId::SUBGRAPH_INPUT, slot) {
                        created.extend(self.connect_render_link(graph, &link, NodeId::SUBGRAPH_INPUT, slot));
                    } else {
                        log::warn!("invalid connection type {} on subgraph input {}", link.type_name, slot);
                    }
                }
            }
            (connecting, kind) => {
                log::error!("invalid drop: connecting to {:?} on {:?} boundary", connecting, kind);
            }
        }
        ConnectorDrop::Connected(created)
    }

    fn drop_on_node(&mut self, graph: &mut Graph, node: NodeId, pos: Point) -> ConnectorDrop {
        if self.render_links.iter().all(|l| l.node == node) {
            return ConnectorDrop::Ignored;
        }
        let Some(n) = graph.node(node) else {
            return ConnectorDrop::Ignored;
        };
        let Some(first) = self.render_links.first() else {
            return ConnectorDrop::Ignored;
        };

        let slot = match self.state.connecting_to {
            Some(SlotKind::Output) => n.output_slot_at(pos).or_else(|| {
                n.outputs
                    .iter()
                    .position(|o| is_type_compatible(&o.type_name, &first.type_name))
            }),
            Some(SlotKind::Input) => n.input_slot_at(pos).or_else(|| {
                n.inputs
                    .iter()
                    .position(|i| is_type_compatible(&first.type_name, &i.type_name))
            }),
            None => None,
        };
        let Some(slot) = slot else {
            log::warn!("could not find slot for link type [{}] on {:?}", first.type_name, node);
            return ConnectorDrop::Ignored;
        };

        let mut created = Vec::new();
        for link in self.render_links.clone() {
            let valid = match link.to {
                SlotKind::Input => link.can_connect_to_input(graph, node, slot),
                SlotKind::Output => link.can_connect_to_output(graph, node, slot),
            };
            if valid {
                created.extend(self.connect_render_link(graph, &link, node, slot));
            }
        }
        ConnectorDrop::Connected(created)
    }

    fn drop_on_reroute(&mut self, graph: &mut Graph, reroute: RerouteId) -> ConnectorDrop {
        let mut created = Vec::new();
        match self.state.connecting_to {
            Some(SlotKind::Input) => {
                let [link] = self.render_links.as_slice() else {
                    log::error!("attempted to connect {} input links to a reroute", self.render_links.len());
                    return ConnectorDrop::Ignored;
                };
                let link = link.clone();
                let upstream = graph.reroute_chain(reroute).unwrap_or_default();

                let targets: Vec<(NodeId, usize, Option<RerouteId>)> = graph
                    .reroute(reroute)
                    .map(|r| r.link_ids.iter().copied().collect::<Vec<_>>())
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|id| graph.link(id))
                    .filter(|l| link.can_connect_to_input(graph, l.target_id, l.target_slot))
                    .map(|l| (l.target_id, l.target_slot, l.parent_id))
                    .collect();
                if targets.is_empty() {
                    return ConnectorDrop::Ignored;
                }

                if let Some(r) = graph.reroute_mut(reroute) {
                    r.set_parent(link.from_reroute);
                }
                for (target, slot, parent) in targets {
                    match graph.connect(link.node, link.slot, target, slot, parent) {
                        Some(id) => created.push(id),
                        None => log::warn!("failed to reconnect {:?}[{}] through reroute {:?}", target, slot, reroute),
                    }
                }
                // Reroutes that used to feed this one may now be empty
                for old in upstream.into_iter().filter(|r| *r != reroute) {
                    if !graph.validate_reroute(old) {
                        graph.remove_reroute(old);
                    }
                }
            }
            Some(SlotKind::Output) => {
                let Some((node, slot)) = graph.reroute_source_output(reroute) else {
                    return ConnectorDrop::Ignored;
                };
                for link in self.render_links.clone() {
                    if !link.can_connect_to_output(graph, node, slot) {
                        continue;
                    }
                    match graph.connect(node, slot, link.node, link.slot, Some(reroute)) {
                        Some(id) => created.push(id),
                        None => log::warn!("failed to connect {:?}[{}] to reroute {:?}", link.node, link.slot, reroute),
                    }
                }
            }
            None => {}
        }
        ConnectorDrop::Connected(created)
    }

    fn drop_on_nothing(&mut self, graph: &mut Graph, pos: Point) -> ConnectorDrop {
        if self.state.dragging_existing_links {
            return ConnectorDrop::Disconnected(self.disconnect_links(graph));
        }
        match self.render_links.first() {
            Some(from) => ConnectorDrop::OnCanvas {
                from: from.clone(),
                pos,
            },
            None => ConnectorDrop::Ignored,
        }
    }

    /// Remove every link being moved. Returns how many were removed.
    pub fn disconnect_links(&mut self, graph: &mut Graph) -> usize {
        let mut removed = 0;
        for link in &self.render_links {
            if let Some(id) = link.moving {
                removed += usize::from(graph.remove_link(id).is_some());
            }
            if let Some(id) = link.moving_floating {
                removed += usize::from(graph.remove_floating_link(id).is_some());
            }
        }
        removed
    }

    /// Connect one render link's loose end to `node`'s `slot`.
    fn connect_render_link(&self, graph: &mut Graph, link: &RenderLink, node: NodeId, slot: usize) -> Option<LinkId> {
        let created = match link.to {
            SlotKind::Input => graph.connect(link.node, link.slot, node, slot, link.from_reroute),
            SlotKind::Output => {
                let parent = link.moving.and_then(|l| graph.link(l)).and_then(|l| l.parent_id);
                graph.connect(node, slot, link.node, link.slot, parent)
            }
        };
        let Some(created) = created else {
            log::warn!("failed to connect {:?}[{}] to {:?}[{}]", link.node, link.slot, node, slot);
            return None;
        };
        // A moved input link leaves its old input
        if link.to == SlotKind::Input {
            if let Some(old) = link.moving {
                graph.remove_link(old);
            }
            if let Some(old) = link.moving_floating {
                graph.remove_floating_link(old);
            }
        }
        Some(created)
    }

    /// Abandon the current connection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether making `parent` the parent of `reroute` would loop the chain.
fn creates_reroute_cycle(graph: &Graph, parent: Option<RerouteId>, reroute: RerouteId) -> bool {
    let Some(parent) = parent else {
        return false;
    };
    match graph.reroute_chain(parent) {
        Some(chain) => chain.contains(&reroute),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn setup() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_pos(0.0, 0.0).with_output("out", "number"));
        let b = graph.add_node(Node::new("b").with_pos(300.0, 0.0).with_input("in", "number"));
        let c = graph.add_node(
            Node::new("c")
                .with_pos(300.0, 200.0)
                .with_input("img", "image")
                .with_input("in", "number"),
        );
        (graph, a, b, c)
    }

    #[test]
    fn test_new_link_from_output_to_input_slot() {
        let (mut graph, a, b, _) = setup();
        let mut connector = LinkConnector::new();
        connector.drag_new_from_output(&graph, a, 0).unwrap();
        assert!(connector.is_connecting());
        assert!(matches!(
            connector.drag_new_from_output(&graph, a, 0),
            Err(CanvasError::ConnectorBusy)
        ));

        let target = graph.node(b).unwrap().input_pos(0);
        let ConnectorDrop::Connected(links) = connector.drop_links(&mut graph, target) else {
            panic!("expected a connection");
        };
        assert_eq!(links.len(), 1);
        assert_eq!(graph.input_link(b, 0), Some(links[0]));
        assert!(!connector.is_connecting());
    }

    #[test]
    fn test_drop_on_node_body_picks_compatible_slot() {
        let (mut graph, a, _, c) = setup();
        let mut connector = LinkConnector::new();
        connector.drag_new_from_output(&graph, a, 0).unwrap();
        assert!(connector.is_node_valid_drop(&graph, c));
        let body = Point::new(370.0, 250.0);
        connector.drop_links(&mut graph, body);
        assert!(graph.input_link(c, 0).is_none());
        assert!(graph.input_link(c, 1).is_some());
    }

    #[test]
    fn test_new_link_on_canvas_reports_release() {
        let (mut graph, a, _, _) = setup();
        let mut connector = LinkConnector::new();
        connector.drag_new_from_output(&graph, a, 0).unwrap();
        let result = connector.drop_links(&mut graph, Point::new(1000.0, 1000.0));
        assert!(matches!(result, ConnectorDrop::OnCanvas { .. }));
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_move_input_link() {
        let (mut graph, a, b, c) = setup();
        let old = graph.connect(a, 0, b, 0, None).unwrap();
        let mut connector = LinkConnector::new();
        connector.move_input_link(&graph, b, 0).unwrap();
        assert!(connector.state.dragging_existing_links);
        assert!(connector.dragging_links().contains(&old));

        // Dropping back on the same input is not a valid drop
        assert!(!connector.is_input_valid_drop(&graph, b, 0));
        assert!(connector.is_input_valid_drop(&graph, c, 1));

        let target = graph.node(c).unwrap().input_pos(1);
        connector.drop_links(&mut graph, target);
        assert!(graph.link(old).is_none());
        assert!(graph.input_link(b, 0).is_none());
        let moved = graph.link(graph.input_link(c, 1).unwrap()).unwrap();
        assert!(moved.originates(a, 0));
    }

    #[test]
    fn test_moved_link_dropped_on_canvas_disconnects() {
        let (mut graph, a, b, _) = setup();
        graph.connect(a, 0, b, 0, None).unwrap();
        let mut connector = LinkConnector::new();
        connector.move_input_link(&graph, b, 0).unwrap();
        let result = connector.drop_links(&mut graph, Point::new(-500.0, -500.0));
        assert_eq!(result, ConnectorDrop::Disconnected(1));
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_move_output_links() {
        let (mut graph, a, b, c) = setup();
        graph.connect(a, 0, b, 0, None).unwrap();
        graph.connect(a, 0, c, 1, None).unwrap();
        let d = graph.add_node(Node::new("d").with_pos(0.0, 300.0).with_output("out", "number"));

        let mut connector = LinkConnector::new();
        connector.move_output_link(&graph, a, 0).unwrap();
        assert!(connector.state.multi);
        assert_eq!(connector.state.connecting_to, Some(SlotKind::Output));

        let target = graph.node(d).unwrap().output_pos(0);
        connector.drop_links(&mut graph, target);
        assert!(graph.output_links(a, 0).is_empty());
        assert_eq!(graph.output_links(d, 0).len(), 2);
    }

    #[test]
    fn test_drag_new_from_input_to_output() {
        let (mut graph, a, b, _) = setup();
        let mut connector = LinkConnector::new();
        connector.drag_new_from_input(&graph, b, 0).unwrap();
        let target = graph.node(a).unwrap().output_pos(0);
        connector.drop_links(&mut graph, target);
        assert!(graph.link(graph.input_link(b, 0).unwrap()).unwrap().originates(a, 0));
    }

    #[test]
    fn test_drag_from_reroute() {
        let (mut graph, a, b, c) = setup();
        let link = graph.connect(a, 0, b, 0, None).unwrap();
        let r = graph.insert_reroute(Point::new(150.0, 100.0), SegmentId::Link(link)).unwrap();

        let mut connector = LinkConnector::new();
        connector.drag_from_reroute(&graph, r).unwrap();
        let target = graph.node(c).unwrap().input_pos(1);
        connector.drop_links(&mut graph, target);

        let new_link = graph.input_link(c, 1).unwrap();
        assert_eq!(graph.link(new_link).unwrap().parent_id, Some(r));
        assert!(graph.reroute(r).unwrap().link_ids.contains(&new_link));
        assert!(graph.reroute(r).unwrap().link_ids.contains(&link));
    }

    #[test]
    fn test_reroute_cycle_is_invalid_drop() {
        let (mut graph, a, b, _) = setup();
        let link = graph.connect(a, 0, b, 0, None).unwrap();
        let r1 = graph.insert_reroute(Point::new(100.0, 100.0), SegmentId::Link(link)).unwrap();
        let r2 = graph.insert_reroute(Point::new(200.0, 100.0), SegmentId::Link(link)).unwrap();
        assert_eq!(graph.link_reroutes(link), vec![r1, r2]);

        let mut connector = LinkConnector::new();
        connector.drag_from_reroute(&graph, r2).unwrap();
        // r1 is upstream of r2; parenting r1 to r2 would loop
        assert!(!connector.is_reroute_valid_drop(&graph, r1));
    }

    #[test]
    fn test_drag_from_link_segment() {
        let (mut graph, a, b, c) = setup();
        let link = graph.connect(a, 0, b, 0, None).unwrap();
        let mut connector = LinkConnector::new();
        connector.drag_from_link_segment(&graph, SegmentId::Link(link)).unwrap();
        assert_eq!(connector.render_links[0].node, a);
        let target = graph.node(c).unwrap().input_pos(1);
        connector.drop_links(&mut graph, target);
        assert_eq!(graph.output_links(a, 0).len(), 2);
    }
}
