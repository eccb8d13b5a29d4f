//! The canvas: one graph view with its pointer, selection, connector and
//! viewport.
//!
//! [`Canvas`] owns the gesture dispatcher and a [`CanvasState`] that the
//! gesture handlers mutate. Input enters through [`Canvas::process_pointer_down`],
//! [`Canvas::process_pointer_move`], [`Canvas::process_pointer_up`], [`Canvas::process_wheel`] and
//! [`Canvas::process_key`]; everything else is an imperative operation on the state.

mod events;
mod frame;
mod interaction;

pub use events::{CanvasEvent, CanvasListener};
pub use frame::FrameScheduler;
pub use interaction::{DoubleClick, Interaction};

use crate::clipboard::{copy_items, paste_items, ClipboardError, ClipboardItems, ClipboardStore, MemoryClipboard, PasteOptions};
use crate::config::CanvasConfig;
use crate::graph::{Graph, IoKind, ItemId, NodeId, NodeTypeRegistry, SegmentId, SubgraphId};
use crate::hit_test::{hover_target, HitTarget};
use crate::input::{Key, KeyEvent, PointerEvent, WheelEvent};
use crate::link_connector::{ConnectorDrop, LinkConnector, SlotKind};
use crate::link_geometry::{update_reroute_directions, LayoutOptions, LinkLayout};
use crate::pointer::CanvasPointer;
use crate::selection::Selection;
use crate::viewport::{AnimationOptions, Viewport};
use kurbo::{Point, Rect, Size};
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Errors from canvas operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("No graph is attached to the canvas")]
    NoActiveGraph,
    #[error("A link drag is already in progress")]
    ConnectorBusy,
    #[error("Subgraph not found: {0}")]
    SubgraphNotFound(SubgraphId),
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),
}

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

fn active_graph<'a>(root: &'a Option<Graph>, stack: &[SubgraphId]) -> Option<&'a Graph> {
    let root = root.as_ref()?;
    match stack.last() {
        None => Some(root),
        Some(id) => root.subgraphs.get(id).map(|s| &s.graph),
    }
}

fn active_graph_mut<'a>(root: &'a mut Option<Graph>, stack: &[SubgraphId]) -> Option<&'a mut Graph> {
    let root = root.as_mut()?;
    match stack.last() {
        None => Some(root),
        Some(id) => root.subgraphs.get_mut(id).map(|s| &mut s.graph),
    }
}

/// Everything the gesture handlers work on.
pub struct CanvasState {
    root: Option<Graph>,
    /// Open subgraphs, outermost first. Empty while the root is shown.
    subgraph_stack: Vec<SubgraphId>,
    pub viewport: Viewport,
    /// Size of the drawing surface in screen pixels.
    pub viewport_size: Size,
    pub connector: LinkConnector,
    pub selection: Selection,
    /// Link segments from the last [`CanvasState::prepare_frame`].
    pub layout: LinkLayout,
    pub config: CanvasConfig,
    pub registry: NodeTypeRegistry,
    pub frame: FrameScheduler,
    clipboard: Box<dyn ClipboardStore>,
    listeners: Vec<Box<dyn CanvasListener>>,
    events: Vec<CanvasEvent>,
    change_depth: u32,
    gesture_change_open: bool,
    space_held: bool,
    /// Last pointer position in graph space.
    pub graph_mouse: Point,
    pub node_over: Option<NodeId>,
    pub over_link_center: Option<SegmentId>,
    /// Slot the loose end of a dragged link is snapped to.
    pub highlighted_slot: Option<(NodeId, SlotKind, usize)>,
    /// Selection rectangle being drawn, in graph space.
    pub selection_rect: Option<Rect>,
    pub cursor: &'static str,
}

impl CanvasState {
    pub fn new(config: CanvasConfig) -> Self {
        let mut viewport = Viewport::new();
        viewport.min_scale = config.min_scale;
        viewport.max_scale = config.max_scale;
        Self {
            root: None,
            subgraph_stack: Vec::new(),
            viewport,
            viewport_size: Size::new(800.0, 600.0),
            connector: LinkConnector::new(),
            selection: Selection::new(),
            layout: LinkLayout::new(),
            frame: FrameScheduler::new(config.frame_interval_ms()),
            registry: NodeTypeRegistry::permissive(),
            config,
            clipboard: Box::new(MemoryClipboard::new()),
            listeners: Vec::new(),
            events: Vec::new(),
            change_depth: 0,
            gesture_change_open: false,
            space_held: false,
            graph_mouse: Point::ZERO,
            node_over: None,
            over_link_center: None,
            highlighted_slot: None,
            selection_rect: None,
            cursor: "default",
        }
    }

    // --- graph ------------------------------------------------------------

    /// Attach `graph` as the root and show it.
    pub fn set_graph(&mut self, mut graph: Graph) {
        self.subgraph_stack.clear();
        self.selection = Selection::new();
        self.selection.deselect_all(&mut graph, None);
        self.connector.reset();
        self.root = Some(graph);
        log::info!("Graph attached");
        self.emit(CanvasEvent::GraphSwitched { subgraph: None });
        self.frame.mark_dirty();
    }

    /// Detach and return the root graph.
    pub fn detach_graph(&mut self) -> Option<Graph> {
        self.subgraph_stack.clear();
        self.selection = Selection::new();
        self.connector.reset();
        self.layout.clear();
        self.frame.mark_dirty();
        self.root.take()
    }

    pub fn root_graph(&self) -> Option<&Graph> {
        self.root.as_ref()
    }

    /// The graph being shown: the root or the innermost open subgraph.
    pub fn graph(&self) -> Option<&Graph> {
        active_graph(&self.root, &self.subgraph_stack)
    }

    pub fn graph_mut(&mut self) -> CanvasResult<&mut Graph> {
        active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)
    }

    pub fn subgraph_stack(&self) -> &[SubgraphId] {
        &self.subgraph_stack
    }

    pub fn current_subgraph(&self) -> Option<SubgraphId> {
        self.subgraph_stack.last().copied()
    }

    // --- events -----------------------------------------------------------

    pub fn add_listener(&mut self, listener: impl CanvasListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the clipboard backend.
    pub fn set_clipboard(&mut self, clipboard: Box<dyn ClipboardStore>) {
        self.clipboard = clipboard;
    }

    /// Notify listeners and queue the event. Returns false when a listener
    /// cancelled a cancelable event.
    pub fn emit(&mut self, event: CanvasEvent) -> bool {
        let mut allowed = true;
        for listener in &mut self.listeners {
            allowed &= listener.on_event(&event);
        }
        let cancelled = event.is_cancelable() && !allowed;
        if cancelled {
            log::debug!("{:?} cancelled by listener", event);
        }
        self.events.push(event);
        !cancelled
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    // --- transactions -----------------------------------------------------

    /// Open an edit transaction. Nested calls are counted; only the
    /// outermost pair reaches the graph and listeners.
    pub fn emit_before_change(&mut self) {
        self.change_depth += 1;
        if self.change_depth > 1 {
            return;
        }
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            graph.before_change();
        }
        self.emit(CanvasEvent::BeforeChange);
    }

    pub fn emit_after_change(&mut self) {
        if self.change_depth == 0 {
            log::warn!("emit_after_change without matching emit_before_change");
            return;
        }
        self.change_depth -= 1;
        if self.change_depth > 0 {
            return;
        }
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            graph.after_change();
        }
        self.emit(CanvasEvent::AfterChange);
        self.frame.mark_dirty();
    }

    /// Current transaction nesting depth.
    pub fn change_depth(&self) -> u32 {
        self.change_depth
    }

    /// Open the transaction for the current gesture, once.
    pub(crate) fn begin_gesture_change(&mut self) {
        if !self.gesture_change_open {
            self.gesture_change_open = true;
            self.emit_before_change();
        }
    }

    pub(crate) fn end_gesture_change(&mut self) {
        if self.gesture_change_open {
            self.gesture_change_open = false;
            self.emit_after_change();
        }
    }

    // --- selection --------------------------------------------------------

    /// Click selection on `item`, or on empty canvas when `None`.
    pub fn process_select(&mut self, item: Option<ItemId>, modifiers: crate::input::Modifiers, sticky: bool) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection
            .process_select(graph, item, modifiers, sticky, self.config.multi_select);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn select(&mut self, item: ItemId) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.select(graph, item);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn deselect(&mut self, item: ItemId) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.deselect(graph, item);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn select_items(&mut self, items: impl IntoIterator<Item = ItemId>) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.select_items(graph, items);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn select_all(&mut self) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.select_all(graph);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn deselect_all(&mut self) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.deselect_all(graph, None);
        self.frame.mark_dirty();
        Ok(())
    }

    /// Apply a finished selection rectangle.
    pub fn handle_multi_select(&mut self, rect: Rect, modifiers: crate::input::Modifiers) -> CanvasResult<()> {
        let graph = active_graph_mut(&mut self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        self.selection.handle_multi_select(graph, rect, modifiers);
        self.frame.mark_dirty();
        Ok(())
    }

    /// Delete the selection. With nothing selected, emits
    /// [`CanvasEvent::NoItemsSelected`] instead.
    pub fn delete_selected(&mut self) -> CanvasResult<usize> {
        if self.graph().is_none() {
            return Err(CanvasError::NoActiveGraph);
        }
        if self.selection.is_empty() {
            self.emit(CanvasEvent::NoItemsSelected);
            return Ok(0);
        }
        self.emit_before_change();
        let keep_all = self.config.keep_all_links_on_bypass;
        let removed = match active_graph_mut(&mut self.root, &self.subgraph_stack) {
            Some(graph) => self.selection.delete_selected(graph, keep_all),
            None => 0,
        };
        self.emit_after_change();
        Ok(removed)
    }

    /// Topmost selectable item at `pos` (graph space).
    pub fn positionable_at(&self, pos: Point) -> Option<ItemId> {
        let graph = self.graph()?;
        if let Some(node) = graph.node_at(pos) {
            return Some(ItemId::Node(node.id));
        }
        if let Some(io) = graph.io.as_ref() {
            for kind in [IoKind::Input, IoKind::Output] {
                if io.get(kind).contains(pos) {
                    return Some(ItemId::IoNode(kind));
                }
            }
        }
        if let Some(reroute) = graph.reroute_at(pos) {
            return Some(ItemId::Reroute(reroute.id));
        }
        graph.group_at(pos).map(|g| ItemId::Group(g.id))
    }

    // --- links ------------------------------------------------------------

    /// Slot position under `pos` that accepts the dragged links, if any.
    /// Updates the highlighted slot as a side effect.
    pub(crate) fn valid_drop_slot(&mut self, pos: Point) -> Option<Point> {
        self.highlighted_slot = None;
        let kind = self.connector.state.connecting_to?;
        let graph = active_graph(&self.root, &self.subgraph_stack)?;
        let node = graph.node_at(pos)?;
        let (slot, anchor) = match kind {
            SlotKind::Input => {
                let slot = node.input_slot_at(pos)?;
                if !self.connector.is_input_valid_drop(graph, node.id, slot) {
                    return None;
                }
                (slot, graph.input_anchor(node.id, slot)?.0)
            }
            SlotKind::Output => {
                let slot = node.output_slot_at(pos)?;
                if !self.connector.is_output_valid_drop(graph, node.id, slot) {
                    return None;
                }
                (slot, graph.output_anchor(node.id, slot)?.0)
            }
        };
        self.highlighted_slot = Some((node.id, kind, slot));
        Some(anchor)
    }

    /// Finish a link drag at `pos`.
    pub fn drop_links(&mut self, pos: Point) -> CanvasResult<ConnectorDrop> {
        if !self.connector.is_connecting() {
            return Ok(ConnectorDrop::Ignored);
        }
        self.emit_before_change();
        let result = match active_graph_mut(&mut self.root, &self.subgraph_stack) {
            Some(graph) => self.connector.drop_links(graph, pos),
            None => {
                self.connector.reset();
                ConnectorDrop::Ignored
            }
        };
        self.emit_after_change();
        if let ConnectorDrop::OnCanvas { from, pos } = &result {
            self.emit(CanvasEvent::EmptyRelease {
                pos: *pos,
                from: from.clone(),
            });
        }
        Ok(result)
    }

    // --- subgraphs --------------------------------------------------------

    /// Enter subgraph `id`. `node` is the instance that was opened, if any.
    /// Returns false when a listener cancelled the navigation.
    pub fn open_subgraph(&mut self, id: SubgraphId, node: Option<NodeId>) -> CanvasResult<bool> {
        let root = self.root.as_ref().ok_or(CanvasError::NoActiveGraph)?;
        if !root.subgraphs.contains_key(&id) {
            return Err(CanvasError::SubgraphNotFound(id));
        }
        if !self.emit(CanvasEvent::SubgraphOpening { subgraph: id, node }) {
            return Ok(false);
        }

        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            self.selection.deselect_all(graph, None);
        }
        self.connector.reset();
        self.subgraph_stack.push(id);
        log::info!("Opened subgraph {}", id);

        self.emit(CanvasEvent::GraphSwitched { subgraph: Some(id) });
        self.emit(CanvasEvent::SubgraphOpened { subgraph: id });
        self.frame.mark_dirty();
        Ok(true)
    }

    /// Leave the innermost subgraph. Returns false at the root.
    pub fn close_subgraph(&mut self) -> bool {
        if self.subgraph_stack.is_empty() {
            return false;
        }
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            self.selection.deselect_all(graph, None);
        }
        self.connector.reset();
        self.subgraph_stack.pop();
        self.emit(CanvasEvent::GraphSwitched {
            subgraph: self.current_subgraph(),
        });
        self.frame.mark_dirty();
        true
    }

    /// Double-click on a node: notify, and enter it if it instantiates a
    /// subgraph.
    pub(crate) fn node_double_clicked(&mut self, node: NodeId) -> CanvasResult<()> {
        self.emit(CanvasEvent::NodeDoubleClick { node });
        let root = self.root.as_ref().ok_or(CanvasError::NoActiveGraph)?;
        let graph = self.graph().ok_or(CanvasError::NoActiveGraph)?;
        let type_name = &graph.node(node).ok_or(CanvasError::NodeNotFound(node))?.type_name;
        let subgraph = root
            .subgraphs
            .values()
            .find(|s| s.type_name() == *type_name)
            .map(|s| s.id);
        if let Some(id) = subgraph {
            self.open_subgraph(id, Some(node))?;
        }
        Ok(())
    }

    // --- clipboard --------------------------------------------------------

    /// Copy the selection. Returns false when nothing was selected.
    pub fn copy_to_clipboard(&mut self) -> CanvasResult<bool> {
        if self.selection.is_empty() {
            return Ok(false);
        }
        let root = self.root.as_ref().ok_or(CanvasError::NoActiveGraph)?;
        let graph = active_graph(&self.root, &self.subgraph_stack).ok_or(CanvasError::NoActiveGraph)?;
        let items = copy_items(graph, &root.subgraphs, self.selection.items().iter().copied());
        items.store(self.clipboard.as_ref())?;
        log::debug!("copied {} node(s)", items.nodes.len());
        Ok(true)
    }

    /// Paste the clipboard with its top-left at `position` and select the
    /// result.
    pub fn paste_from_clipboard(&mut self, position: Point, connect_unselected_outputs: bool) -> CanvasResult<Vec<ItemId>> {
        let items = match ClipboardItems::load(self.clipboard.as_ref()) {
            Ok(items) => items,
            Err(ClipboardError::Empty) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let known: BTreeSet<SubgraphId> = self
            .root
            .as_ref()
            .ok_or(CanvasError::NoActiveGraph)?
            .subgraphs
            .keys()
            .copied()
            .collect();
        let options = PasteOptions {
            position,
            connect_unselected_outputs,
        };

        self.emit_before_change();
        let result = match active_graph_mut(&mut self.root, &self.subgraph_stack) {
            Some(graph) => paste_items(graph, items, &self.registry, &known, &options),
            None => Default::default(),
        };
        if let Some(root) = self.root.as_mut() {
            root.subgraphs.extend(result.subgraphs.into_values().map(|s| (s.id, s)));
        }
        if let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) {
            self.selection.select_items(graph, result.created.iter().copied());
        }
        self.emit_after_change();

        log::debug!("pasted {} item(s)", result.created.len());
        Ok(result.created)
    }

    // --- view -------------------------------------------------------------

    pub fn set_dirty(&mut self, foreground: bool, background: bool) {
        self.frame.set_dirty(foreground, background);
    }

    pub fn mark_dirty(&mut self) {
        self.frame.mark_dirty();
    }

    /// Start drawing frames. Returns false if already running.
    pub fn start_rendering(&mut self) -> bool {
        let started = self.frame.start();
        if started {
            log::info!("Rendering started");
        }
        started
    }

    pub fn stop_rendering(&mut self) {
        self.frame.stop();
    }

    pub fn pause_rendering(&mut self, paused: bool) {
        self.frame.pause(paused);
    }

    pub fn is_space_held(&self) -> bool {
        self.space_held
    }

    /// Rebuild per-frame caches before drawing.
    pub fn prepare_frame(&mut self, viewport_size: Size) {
        self.viewport_size = viewport_size;
        let margin = self.viewport.margin_area(self.viewport_size);
        let Some(graph) = active_graph_mut(&mut self.root, &self.subgraph_stack) else {
            self.layout.clear();
            return;
        };
        update_reroute_directions(graph);
        let options = LayoutOptions {
            mode: self.config.link_render_mode,
            margin,
            floating_alpha: self.config.floating_link_alpha,
            dragging_links: self.connector.dragging_links(),
            dragging_reroutes: self.connector.hidden_reroutes.clone(),
        };
        self.layout.rebuild(graph, &options);
    }

    /// Advance animations. Returns true when a frame should be drawn.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if self.viewport.tick_animation(now_ms) {
            self.frame.mark_dirty();
        }
        self.frame.should_draw(now_ms)
    }

    pub fn center_on_node(&mut self, node: NodeId) -> CanvasResult<()> {
        let graph = self.graph().ok_or(CanvasError::NoActiveGraph)?;
        let bounds = graph.node(node).ok_or(CanvasError::NodeNotFound(node))?.bounding();
        self.viewport.center_on(bounds, self.viewport_size);
        self.frame.mark_dirty();
        Ok(())
    }

    pub fn animate_to_bounds(&mut self, bounds: Rect, options: AnimationOptions, now_ms: f64) {
        self.viewport
            .animate_to_bounds(bounds, self.viewport_size, options, now_ms);
        self.frame.mark_dirty();
    }

    /// Animate to the selection, or to the whole graph when nothing is
    /// selected.
    pub fn fit_view_to_selection(&mut self, options: AnimationOptions, now_ms: f64) -> CanvasResult<()> {
        let graph = self.graph().ok_or(CanvasError::NoActiveGraph)?;
        let bounds = self
            .selection
            .items()
            .iter()
            .filter_map(|id| graph.item(*id).map(|i| i.bounding()))
            .reduce(|a, b| a.union(b))
            .or_else(|| graph.bounds());
        if let Some(bounds) = bounds {
            self.animate_to_bounds(bounds, options, now_ms);
        }
        Ok(())
    }

    /// Hover feedback while no gesture is active.
    fn update_hover(&mut self, pos: Point) -> Option<crate::measure::CompassCorner> {
        let target = match self.graph() {
            Some(graph) => hover_target(graph, &self.layout, pos, &self.config),
            None => HitTarget::Empty,
        };
        let node_over = target.node();
        let over_link_center = match target {
            HitTarget::LinkCentre(segment) => Some(segment),
            _ => None,
        };
        if node_over != self.node_over || over_link_center != self.over_link_center {
            self.frame.set_dirty(true, false);
        }
        self.node_over = node_over;
        self.over_link_center = over_link_center;
        self.cursor = if self.space_held { "grab" } else { target.cursor() };
        match target {
            HitTarget::NodeResize { corner, .. } => Some(corner),
            _ => None,
        }
    }
}

/// A node-graph canvas.
pub struct Canvas {
    pointer: CanvasPointer<Interaction>,
    state: CanvasState,
}

impl Deref for Canvas {
    type Target = CanvasState;

    fn deref(&self) -> &CanvasState {
        &self.state
    }
}

impl DerefMut for Canvas {
    fn deref_mut(&mut self) -> &mut CanvasState {
        &mut self.state
    }
}

impl Canvas {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            pointer: CanvasPointer::new(),
            state: CanvasState::new(config),
        }
    }

    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.state.set_graph(graph);
        self
    }

    pub fn pointer(&self) -> &CanvasPointer<Interaction> {
        &self.pointer
    }

    /// Abort the current gesture and any link drag.
    pub fn process_pointer_cancel(&mut self) {
        self.pointer.cancel(&mut self.state);
        self.state.connector.reset();
        self.state.frame.mark_dirty();
    }

    /// Enter a subgraph, abandoning any gesture in progress.
    pub fn open_subgraph(&mut self, id: SubgraphId, node: Option<NodeId>) -> CanvasResult<bool> {
        self.pointer.cancel(&mut self.state);
        self.state.open_subgraph(id, node)
    }

    pub fn close_subgraph(&mut self) -> bool {
        self.pointer.cancel(&mut self.state);
        self.state.close_subgraph()
    }

    fn locate(&mut self, event: &mut PointerEvent) {
        event.graph_position = self.state.viewport.to_graph(event.position);
        self.state.graph_mouse = event.graph_position;
    }

    pub fn process_pointer_down(&mut self, mut event: PointerEvent) {
        self.locate(&mut event);
        if !event.is_primary {
            return;
        }
        // A stale gesture must not tear down what the new press sets up
        self.pointer.reset(&mut self.state);
        if let Some(interaction) = self.state.interaction_for(&event) {
            log::debug!("pointer down: {}", interaction.name());
            self.pointer.down(event, interaction, &mut self.state);
        }
    }

    pub fn process_pointer_move(&mut self, mut event: PointerEvent) {
        self.locate(&mut event);
        if self.pointer.is_down() {
            self.pointer.move_to(&event, &mut self.state);
        } else {
            self.pointer.resize_direction = self.state.update_hover(event.graph_position);
        }
    }

    /// Returns true when the gesture ended as a click.
    pub fn process_pointer_up(&mut self, mut event: PointerEvent) -> bool {
        self.locate(&mut event);
        self.pointer.up(&event, &mut self.state)
    }

    pub fn process_wheel(&mut self, event: &WheelEvent) {
        let trackpad = self.pointer.is_trackpad_gesture(event);
        let state = &mut self.state;
        if trackpad && !event.modifiers.ctrl {
            state.viewport.pan(-event.delta);
        } else if event.delta.y != 0.0 {
            let factor = if event.delta.y < 0.0 {
                state.config.zoom_speed
            } else {
                1.0 / state.config.zoom_speed
            };
            state.viewport.change_delta_scale(factor, event.position);
        }
        state.frame.mark_dirty();
    }

    pub fn process_key(&mut self, event: &KeyEvent) {
        if event.key == Key::Space {
            self.state.space_held = event.pressed;
            self.state.cursor = if event.pressed { "grab" } else { "default" };
            return;
        }
        if !event.pressed {
            return;
        }

        let command = event.modifiers.command();
        let read_only = self.state.config.read_only;
        let result = match event.key {
            Key::Escape => {
                self.process_pointer_cancel();
                Ok(())
            }
            Key::Character(c) if command && c.eq_ignore_ascii_case(&'a') => self.state.select_all(),
            Key::Character(c) if command && c.eq_ignore_ascii_case(&'c') => self.state.copy_to_clipboard().map(|_| ()),
            Key::Character(c) if command && !read_only && c.eq_ignore_ascii_case(&'v') => {
                let connect = event.modifiers.shift && self.state.config.connect_unselected_outputs;
                let position = self.state.graph_mouse;
                self.state.paste_from_clipboard(position, connect).map(|_| ())
            }
            Key::Delete | Key::Backspace if !read_only => self.state.delete_selected().map(|_| ()),
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::error!("Key {:?} failed: {}", event.key, e);
        }
    }
}
