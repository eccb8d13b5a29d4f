//! Pointer gestures: what a press starts, and what click, drag and release
//! do for each kind of target.

use super::{active_graph, active_graph_mut, CanvasEvent, CanvasResult, CanvasState};
use crate::config::NavigationMode;
use crate::graph::{Graph, GroupId, IoKind, ItemId, NodeId, RerouteId, SegmentId};
use crate::hit_test::{hit_test, resize_node, HitTarget};
use crate::input::{Modifiers, PointerButton, PointerEvent};
use crate::measure::{snap_to_grid, CompassCorner};
use crate::pointer::GestureHandler;
use kurbo::{Point, Rect, Size, Vec2};
use std::collections::BTreeSet;

/// Offset of an alt-drag clone from its source node.
const CLONE_OFFSET: Vec2 = Vec2::new(5.0, 5.0);

/// What a double-click on the pressed target means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleClick {
    Node(NodeId),
    Group(GroupId),
    Empty,
}

/// The gesture started by a pointer press.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Move the selection. The clicked item joins it on drag start.
    DragItems {
        clicked: ItemId,
        modifiers: Modifiers,
        /// Items being moved, filled on drag start.
        items: BTreeSet<ItemId>,
        last: Point,
        double_click: Option<DoubleClick>,
    },
    /// Pan the view. `last` is in screen space.
    DragCanvas {
        last: Point,
        modifiers: Modifiers,
        /// A click without dragging clears the selection.
        select_on_click: bool,
        double_click: Option<DoubleClick>,
    },
    /// Drag a copy of `source`, created when the drag starts.
    CloneNode {
        source: NodeId,
        clone: Option<NodeId>,
        last: Point,
    },
    ResizeNode {
        node: NodeId,
        corner: CompassCorner,
        start_pos: Point,
        start_size: Size,
        origin: Point,
    },
    /// Resize a group from its bottom-right corner. `offset` is from the
    /// pointer to that corner.
    ResizeGroup { group: GroupId, offset: Vec2 },
    /// The link connector is dragging links.
    ConnectLink { from: Option<NodeId> },
    /// Move a reroute, usually one just inserted on a link.
    DragRerouteNew { reroute: RerouteId, last: Point },
    SelectionRectangle {
        start: Point,
        modifiers: Modifiers,
        double_click: Option<DoubleClick>,
    },
    /// Click-only selection, used when items cannot be dragged.
    SelectItem { item: ItemId, modifiers: Modifiers },
    CollapseToggle(NodeId),
    WidgetClick { node: NodeId, widget: usize },
    /// Click opens the link menu; drag pans.
    LinkMenu { segment: SegmentId, last: Point },
    EmptyClick {
        modifiers: Modifiers,
        double_click: Option<DoubleClick>,
    },
}

impl Interaction {
    pub fn double_click(&self) -> Option<DoubleClick> {
        match self {
            Interaction::DragItems { double_click, .. }
            | Interaction::DragCanvas { double_click, .. }
            | Interaction::SelectionRectangle { double_click, .. }
            | Interaction::EmptyClick { double_click, .. } => *double_click,
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interaction::DragItems { .. } => "drag items",
            Interaction::DragCanvas { .. } => "drag canvas",
            Interaction::CloneNode { .. } => "clone node",
            Interaction::ResizeNode { .. } => "resize node",
            Interaction::ResizeGroup { .. } => "resize group",
            Interaction::ConnectLink { .. } => "connect link",
            Interaction::DragRerouteNew { .. } => "drag reroute",
            Interaction::SelectionRectangle { .. } => "selection rectangle",
            Interaction::SelectItem { .. } => "select item",
            Interaction::CollapseToggle(_) => "collapse toggle",
            Interaction::WidgetClick { .. } => "widget click",
            Interaction::LinkMenu { .. } => "link menu",
            Interaction::EmptyClick { .. } => "empty click",
        }
    }

    fn drag_canvas(event: &PointerEvent, select_on_click: bool, double_click: Option<DoubleClick>) -> Self {
        Interaction::DragCanvas {
            last: event.position,
            modifiers: event.modifiers,
            select_on_click,
            double_click,
        }
    }

    fn drag_items(clicked: ItemId, event: &PointerEvent, double_click: Option<DoubleClick>) -> Self {
        Interaction::DragItems {
            clicked,
            modifiers: event.modifiers,
            items: BTreeSet::new(),
            last: event.graph_position,
            double_click,
        }
    }
}

fn report(action: &str, result: CanvasResult<()>) {
    if let Err(e) = result {
        log::error!("{} failed: {}", action, e);
    }
}

fn snap_item(graph: &mut Graph, item: ItemId, grid: f64) {
    match item {
        ItemId::Node(id) => {
            if let Some(node) = graph.node_mut(id).filter(|n| !n.is_pinned()) {
                node.pos = snap_to_grid(node.pos, grid);
            }
        }
        ItemId::Reroute(id) => {
            if let Some(reroute) = graph.reroute_mut(id) {
                reroute.snap_to_grid(grid);
            }
        }
        ItemId::Group(_) | ItemId::IoNode(_) => {
            if let Some(positionable) = graph.item_mut(item) {
                let origin = positionable.bounding().origin();
                positionable.move_by(snap_to_grid(origin, grid) - origin);
            }
        }
    }
}

impl CanvasState {
    /// Decide what a press starts. Presses that act immediately (secondary
    /// button, alt-click delete) return `None`.
    pub(crate) fn interaction_for(&mut self, event: &PointerEvent) -> Option<Interaction> {
        let pos = event.graph_position;
        let modifiers = event.modifiers;
        let target = {
            let graph = active_graph(&self.root, &self.subgraph_stack)?;
            hit_test(graph, &self.layout, pos, modifiers, &self.config)
        };
        log::trace!("press on {:?}", target);

        match event.button {
            PointerButton::Primary => {}
            PointerButton::Middle => return Some(Interaction::drag_canvas(event, false, None)),
            PointerButton::Secondary => {
                self.secondary_press(target, pos, modifiers);
                return None;
            }
            PointerButton::Back | PointerButton::Forward => return None,
        }

        if target == HitTarget::SelectionRectangle {
            return Some(Interaction::SelectionRectangle {
                start: pos,
                modifiers,
                double_click: None,
            });
        }
        if self.space_held || self.config.read_only {
            return Some(Interaction::drag_canvas(event, false, None));
        }

        let interaction = match target {
            HitTarget::SelectionRectangle => return None,
            HitTarget::CloneNode(source) => Interaction::CloneNode {
                source,
                clone: None,
                last: pos,
            },
            HitTarget::CollapseBox(node) => Interaction::CollapseToggle(node),
            HitTarget::Widget { node, widget } => Interaction::WidgetClick { node, widget },
            HitTarget::OutputSlot { node, slot } => {
                let graph = active_graph(&self.root, &self.subgraph_stack)?;
                let result = if modifiers.shift && !graph.output_links(node, slot).is_empty() {
                    self.connector.move_output_link(graph, node, slot)
                } else {
                    self.connector.drag_new_from_output(graph, node, slot)
                };
                return self.connect_gesture(result, Some(node));
            }
            HitTarget::InputSlot { node, slot } => {
                let graph = active_graph(&self.root, &self.subgraph_stack)?;
                let mut result = self.connector.move_input_link(graph, node, slot);
                if result.is_ok() && !self.connector.is_connecting() {
                    result = self.connector.drag_new_from_input(graph, node, slot);
                }
                return self.connect_gesture(result, Some(node));
            }
            HitTarget::IoSlot { kind, slot } => {
                let graph = active_graph(&self.root, &self.subgraph_stack)?;
                let result = match kind {
                    IoKind::Input => self
                        .connector
                        .drag_new_from_output(graph, NodeId::SUBGRAPH_INPUT, slot),
                    IoKind::Output => self
                        .connector
                        .drag_new_from_input(graph, NodeId::SUBGRAPH_OUTPUT, slot),
                };
                return self.connect_gesture(result, None);
            }
            HitTarget::NodeResize { node, corner } => {
                let graph = active_graph(&self.root, &self.subgraph_stack)?;
                let n = graph.node(node)?;
                Interaction::ResizeNode {
                    node,
                    corner,
                    start_pos: n.pos,
                    start_size: n.size,
                    origin: pos,
                }
            }
            HitTarget::NodeTitle(node) | HitTarget::NodeBody(node) => {
                if !self.config.allow_dragnodes {
                    return Some(Interaction::SelectItem {
                        item: ItemId::Node(node),
                        modifiers,
                    });
                }
                let graph = active_graph_mut(&mut self.root, &self.subgraph_stack)?;
                if graph.node(node).is_some_and(|n| !n.is_pinned()) {
                    graph.bring_to_front(node);
                }
                Interaction::drag_items(ItemId::Node(node), event, Some(DoubleClick::Node(node)))
            }
            HitTarget::IoNode(kind) => Interaction::drag_items(ItemId::IoNode(kind), event, None),
            HitTarget::Reroute(reroute) => {
                if modifiers.alt {
                    report("delete reroute", self.delete_reroute(reroute));
                    return None;
                }
                if modifiers.shift {
                    let graph = active_graph(&self.root, &self.subgraph_stack)?;
                    let result = self.connector.drag_from_reroute(graph, reroute);
                    return self.connect_gesture(result, None);
                }
                Interaction::drag_items(ItemId::Reroute(reroute), event, None)
            }
            HitTarget::LinkSegment(segment) => {
                if modifiers.shift {
                    let graph = active_graph(&self.root, &self.subgraph_stack)?;
                    let result = self.connector.drag_from_link_segment(graph, segment);
                    return self.connect_gesture(result, None);
                }
                return self.insert_reroute_gesture(segment, pos);
            }
            HitTarget::LinkCentre(segment) => Interaction::LinkMenu {
                segment,
                last: event.position,
            },
            HitTarget::GroupResize(group) => {
                let graph = active_graph(&self.root, &self.subgraph_stack)?;
                let bounds = graph.group(group)?.bounding;
                Interaction::ResizeGroup {
                    group,
                    offset: Point::new(bounds.x1, bounds.y1) - pos,
                }
            }
            HitTarget::GroupTitle(group) => {
                Interaction::drag_items(ItemId::Group(group), event, Some(DoubleClick::Group(group)))
            }
            HitTarget::GroupBody(group) => self.empty_interaction(event, DoubleClick::Group(group)),
            HitTarget::Empty => self.empty_interaction(event, DoubleClick::Empty),
        };
        Some(interaction)
    }

    fn empty_interaction(&self, event: &PointerEvent, double_click: DoubleClick) -> Interaction {
        let double_click = Some(double_click);
        match self.config.navigation_mode {
            NavigationMode::Standard => Interaction::SelectionRectangle {
                start: event.graph_position,
                modifiers: event.modifiers,
                double_click,
            },
            NavigationMode::Legacy if self.config.allow_dragcanvas => {
                Interaction::drag_canvas(event, true, double_click)
            }
            NavigationMode::Legacy => Interaction::EmptyClick {
                modifiers: event.modifiers,
                double_click,
            },
        }
    }

    fn connect_gesture(&mut self, result: CanvasResult<()>, from: Option<NodeId>) -> Option<Interaction> {
        if let Err(e) = result {
            log::warn!("Could not start link drag: {}", e);
            self.connector.reset();
            return None;
        }
        if !self.connector.is_connecting() {
            return None;
        }
        self.connector.update_pointer(self.graph_mouse, None);
        self.frame.set_dirty(true, false);
        Some(Interaction::ConnectLink { from })
    }

    /// Alt-click on a link: drop a reroute there and drag it.
    fn insert_reroute_gesture(&mut self, segment: SegmentId, pos: Point) -> Option<Interaction> {
        self.begin_gesture_change();
        let inserted = active_graph_mut(&mut self.root, &self.subgraph_stack)
            .and_then(|graph| graph.insert_reroute(pos, segment));
        let Some(reroute) = inserted else {
            self.end_gesture_change();
            return None;
        };
        report("select reroute", self.select_items([ItemId::Reroute(reroute)]));
        Some(Interaction::DragRerouteNew { reroute, last: pos })
    }

    fn delete_reroute(&mut self, reroute: RerouteId) -> CanvasResult<()> {
        self.emit_before_change();
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            graph.remove_reroute(reroute);
            self.selection.retain_existing(graph);
        }
        self.emit_after_change();
        Ok(())
    }

    fn secondary_press(&mut self, target: HitTarget, pos: Point, modifiers: Modifiers) {
        if let HitTarget::Reroute(reroute) = target {
            if modifiers.alt && !self.config.read_only {
                report("delete reroute", self.delete_reroute(reroute));
                return;
            }
        }
        if let Some(item) = self.positionable_at(pos) {
            report("select", self.process_select(Some(item), modifiers, true));
        }
    }

    fn drag_set(&mut self, modifiers: Modifiers) -> BTreeSet<ItemId> {
        let selected = self.selection.items().clone();
        let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) else {
            return selected;
        };
        for item in &selected {
            if let ItemId::Group(group) = item {
                graph.recompute_group_children(*group);
            }
        }
        if modifiers.ctrl {
            selected
        } else {
            graph.expand_group_children(&selected)
        }
    }

    fn move_items<'a>(&mut self, items: impl IntoIterator<Item = &'a ItemId>, delta: Vec2) {
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            for item in items {
                graph.move_item(*item, delta);
            }
        }
        self.frame.mark_dirty();
    }

    /// Snap dropped items and refresh group membership.
    fn settle_items<'a>(&mut self, items: impl IntoIterator<Item = &'a ItemId>, shift: bool) {
        let grid = self.config.snap_size(shift);
        let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) else {
            return;
        };
        if let Some(grid) = grid {
            for item in items {
                snap_item(graph, *item, grid);
            }
        }
        let groups: Vec<GroupId> = graph.groups().map(|g| g.id).collect();
        for group in groups {
            graph.recompute_group_children(group);
        }
    }

    fn clone_node(&mut self, source: NodeId) -> CanvasResult<NodeId> {
        let graph = self.graph_mut()?;
        let mut node = graph
            .node(source)
            .ok_or(super::CanvasError::NodeNotFound(source))?
            .clone_detached();
        node.pos += CLONE_OFFSET;
        let id = graph.add_node(node);
        self.select_items([ItemId::Node(id)])?;
        log::debug!("cloned {:?} as {:?}", source, id);
        Ok(id)
    }

    fn toggle_collapse(&mut self, node: NodeId) -> CanvasResult<()> {
        self.emit_before_change();
        let result = self.graph_mut().and_then(|graph| {
            let n = graph
                .node_mut(node)
                .ok_or(super::CanvasError::NodeNotFound(node))?;
            n.flags.collapsed = !n.flags.collapsed;
            Ok(())
        });
        self.emit_after_change();
        result
    }
}

impl GestureHandler<CanvasState> for Interaction {
    fn on_click(&mut self, ctx: &mut CanvasState, event: &PointerEvent) {
        let result = match self {
            Interaction::DragItems {
                clicked, modifiers, ..
            } => ctx.process_select(Some(*clicked), *modifiers, false),
            Interaction::DragCanvas {
                select_on_click,
                modifiers,
                ..
            } => {
                if *select_on_click {
                    ctx.process_select(None, *modifiers, false)
                } else {
                    Ok(())
                }
            }
            Interaction::CloneNode { source, .. } => {
                ctx.process_select(Some(ItemId::Node(*source)), event.modifiers, false)
            }
            Interaction::ResizeNode { node, .. } => {
                ctx.process_select(Some(ItemId::Node(*node)), event.modifiers, false)
            }
            Interaction::ResizeGroup { group, .. } => {
                ctx.process_select(Some(ItemId::Group(*group)), event.modifiers, false)
            }
            Interaction::ConnectLink { from } => match from {
                Some(node) => ctx.process_select(Some(ItemId::Node(*node)), event.modifiers, false),
                None => Ok(()),
            },
            Interaction::DragRerouteNew { reroute, .. } => {
                ctx.process_select(Some(ItemId::Reroute(*reroute)), event.modifiers, false)
            }
            Interaction::SelectionRectangle { modifiers, .. } => {
                let item = ctx.positionable_at(event.graph_position);
                ctx.process_select(item, *modifiers, false)
            }
            Interaction::SelectItem { item, modifiers } => ctx.process_select(Some(*item), *modifiers, false),
            Interaction::CollapseToggle(node) => ctx.toggle_collapse(*node),
            Interaction::WidgetClick { node, widget } => {
                ctx.emit(CanvasEvent::WidgetClicked {
                    node: *node,
                    widget: *widget,
                });
                ctx.process_select(Some(ItemId::Node(*node)), event.modifiers, false)
            }
            Interaction::LinkMenu { segment, .. } => {
                ctx.emit(CanvasEvent::LinkMenuRequested {
                    segment: *segment,
                    pos: event.graph_position,
                });
                Ok(())
            }
            Interaction::EmptyClick { modifiers, .. } => ctx.process_select(None, *modifiers, false),
        };
        report(self.name(), result);
    }

    fn handles_double_click(&self) -> bool {
        self.double_click().is_some()
    }

    fn on_double_click(&mut self, ctx: &mut CanvasState, event: &PointerEvent) {
        match self.double_click() {
            Some(DoubleClick::Node(node)) => report("node double-click", ctx.node_double_clicked(node)),
            Some(DoubleClick::Group(group)) => {
                ctx.emit(CanvasEvent::GroupDoubleClick { group });
            }
            Some(DoubleClick::Empty) => {
                ctx.emit(CanvasEvent::EmptyDoubleClick {
                    pos: event.graph_position,
                });
            }
            None => {}
        }
    }

    fn on_drag_start(&mut self, ctx: &mut CanvasState, _event: Option<&PointerEvent>) {
        match self {
            Interaction::DragItems {
                clicked,
                modifiers,
                items,
                ..
            } => {
                if !ctx.selection.contains(*clicked) {
                    report("select", ctx.process_select(Some(*clicked), *modifiers, false));
                }
                *items = ctx.drag_set(*modifiers);
                ctx.begin_gesture_change();
            }
            Interaction::CloneNode { source, clone, .. } => {
                ctx.begin_gesture_change();
                match ctx.clone_node(*source) {
                    Ok(id) => *clone = Some(id),
                    Err(e) => log::error!("Clone failed: {}", e),
                }
            }
            Interaction::ResizeNode { .. } | Interaction::ResizeGroup { .. } | Interaction::DragRerouteNew { .. } => {
                ctx.begin_gesture_change();
            }
            Interaction::SelectionRectangle { start, .. } => {
                ctx.selection_rect = Some(Rect::from_points(*start, *start));
            }
            _ => {}
        }
    }

    fn on_drag(&mut self, ctx: &mut CanvasState, event: &PointerEvent) {
        let pos = event.graph_position;
        match self {
            Interaction::DragItems { items, last, .. } => {
                let delta = pos - *last;
                *last = pos;
                ctx.move_items(items.iter(), delta);
            }
            Interaction::DragCanvas { last, .. } | Interaction::LinkMenu { last, .. } => {
                let delta = event.position - *last;
                *last = event.position;
                ctx.viewport.pan(delta);
                ctx.frame.mark_dirty();
            }
            Interaction::CloneNode {
                clone: Some(id),
                last,
                ..
            } => {
                let delta = pos - *last;
                *last = pos;
                ctx.move_items([ItemId::Node(*id)].iter(), delta);
            }
            Interaction::DragRerouteNew { reroute, last } => {
                let delta = pos - *last;
                *last = pos;
                ctx.move_items([ItemId::Reroute(*reroute)].iter(), delta);
            }
            Interaction::ResizeNode {
                node,
                corner,
                start_pos,
                start_size,
                origin,
            } => {
                if let Ok(graph) = ctx.graph_mut() {
                    if let Some(n) = graph.node_mut(*node) {
                        let min = n.compute_min_size();
                        let (new_pos, new_size) = resize_node(*start_pos, *start_size, *corner, pos - *origin, min);
                        n.pos = new_pos;
                        n.size = new_size;
                    }
                }
                ctx.frame.mark_dirty();
            }
            Interaction::ResizeGroup { group, offset } => {
                let grid = ctx.config.snap_size(event.modifiers.shift);
                if let Ok(graph) = ctx.graph_mut() {
                    if let Some(g) = graph.group_mut(*group) {
                        let mut corner = pos + *offset;
                        if let Some(grid) = grid {
                            corner = snap_to_grid(corner, grid);
                        }
                        let origin = g.bounding.origin();
                        g.resize(corner.x - origin.x, corner.y - origin.y);
                    }
                }
                ctx.frame.mark_dirty();
            }
            Interaction::ConnectLink { .. } => {
                let snap = ctx.valid_drop_slot(pos);
                ctx.connector.update_pointer(pos, snap);
                ctx.frame.set_dirty(true, false);
            }
            Interaction::SelectionRectangle { start, .. } => {
                ctx.selection_rect = Some(Rect::from_points(*start, pos));
                ctx.frame.set_dirty(true, false);
            }
            _ => {}
        }
    }

    fn on_drag_end(&mut self, ctx: &mut CanvasState, event: &PointerEvent) {
        let pos = event.graph_position;
        let shift = event.modifiers.shift;
        match self {
            Interaction::DragItems { items, .. } => {
                ctx.settle_items(items.iter(), shift);
                ctx.end_gesture_change();
            }
            Interaction::CloneNode { clone, .. } => {
                if let Some(id) = clone {
                    ctx.settle_items([ItemId::Node(*id)].iter(), shift);
                }
                ctx.end_gesture_change();
            }
            Interaction::DragRerouteNew { reroute, .. } => {
                ctx.settle_items([ItemId::Reroute(*reroute)].iter(), shift);
                ctx.end_gesture_change();
            }
            Interaction::ResizeNode { .. } | Interaction::ResizeGroup { .. } => {
                ctx.settle_items(std::iter::empty::<&ItemId>(), shift);
                ctx.end_gesture_change();
            }
            Interaction::ConnectLink { .. } => {
                report("drop links", ctx.drop_links(pos).map(|_| ()));
            }
            Interaction::SelectionRectangle { start, modifiers, .. } => {
                ctx.selection_rect = None;
                let rect = Rect::from_points(*start, pos);
                report("selection rectangle", ctx.handle_multi_select(rect, *modifiers));
            }
            _ => {}
        }
    }

    fn finally(&mut self, ctx: &mut CanvasState) {
        ctx.end_gesture_change();
        ctx.selection_rect = None;
        ctx.highlighted_slot = None;
        ctx.connector.reset();
        ctx.frame.mark_dirty();
    }
}
