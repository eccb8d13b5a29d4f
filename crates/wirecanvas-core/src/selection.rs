//! Selection model.
//!
//! The canonical set of selected items lives here; each item also carries a
//! `selected` flag for drawing. Every mutating method updates both so that
//! `item.selected == selection.contains(item)` holds afterwards.

use crate::graph::{Graph, ItemId, LinkId, NodeId};
use crate::input::Modifiers;
use crate::measure::{contains_rect, is_point_in_rect, overlap_bounding};
use kurbo::Rect;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: BTreeSet<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &BTreeSet<ItemId> {
        &self.items
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Selected nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().filter_map(|item| match item {
            ItemId::Node(id) => Some(*id),
            _ => None,
        })
    }

    /// Select one item. Items missing from the graph are ignored.
    pub fn select(&mut self, graph: &mut Graph, item: ItemId) {
        let Some(positionable) = graph.item_mut(item) else {
            log::warn!("select: {:?} is not in the graph", item);
            return;
        };
        positionable.set_selected(true);
        self.items.insert(item);
    }

    pub fn deselect(&mut self, graph: &mut Graph, item: ItemId) {
        if let Some(positionable) = graph.item_mut(item) {
            positionable.set_selected(false);
        }
        self.items.remove(&item);
    }

    /// Check the selection invariant against every item in the graph.
    pub fn is_consistent(&self, graph: &Graph) -> bool {
        let flags_match = graph.all_items().into_iter().all(|id| {
            graph
                .item(id)
                .is_some_and(|item| item.is_selected() == self.items.contains(&id))
        });
        flags_match && self.items.iter().all(|id| graph.contains_item(*id))
    }

    /// Click-selection.
    ///
    /// Shift adds, Ctrl/Meta toggles, and `multi_select` behaves as if a
    /// modifier were always held. `sticky` keeps an existing selection intact
    /// when the clicked item is already part of it.
    pub fn process_select(
        &mut self,
        graph: &mut Graph,
        item: Option<ItemId>,
        modifiers: Modifiers,
        sticky: bool,
        multi_select: bool,
    ) {
        let either_modifier = modifiers.shift || modifiers.command();
        let modify_selection = either_modifier || multi_select;

        let Some(item) = item else {
            if !either_modifier || multi_select {
                self.deselect_all(graph, None);
            }
            return;
        };

        let selected = graph.item(item).is_some_and(|i| i.is_selected());
        if !selected || !self.items.contains(&item) {
            if !modify_selection {
                self.deselect_all(graph, Some(item));
            }
            self.select(graph, item);
        } else if sticky {
            // Keep the existing selection
        } else if modify_selection {
            self.deselect(graph, item);
        } else {
            self.deselect_all(graph, Some(item));
        }
    }

    /// Replace the selection with `items`.
    pub fn select_items(&mut self, graph: &mut Graph, items: impl IntoIterator<Item = ItemId>) {
        self.deselect_all(graph, None);
        for item in items {
            self.select(graph, item);
        }
    }

    pub fn select_all(&mut self, graph: &mut Graph) {
        let items = graph.all_items();
        self.select_items(graph, items);
    }

    /// Deselect everything except `keep`.
    pub fn deselect_all(&mut self, graph: &mut Graph, keep: Option<ItemId>) {
        let items: Vec<ItemId> = self.items.iter().copied().filter(|i| Some(*i) != keep).collect();
        for item in items {
            self.deselect(graph, item);
        }
        // Stray flags left by direct graph edits
        for id in graph.all_items() {
            if Some(id) == keep || self.items.contains(&id) {
                continue;
            }
            if let Some(item) = graph.item_mut(id) {
                item.set_selected(false);
            }
        }
    }

    /// Drop items that are no longer in the graph.
    pub fn retain_existing(&mut self, graph: &Graph) {
        self.items.retain(|id| graph.contains_item(*id));
    }

    /// Apply a finished selection rectangle (graph space, any orientation).
    ///
    /// Nodes and subgraph boundary nodes are picked when they overlap, groups
    /// only when fully contained, reroutes when their centre is inside.
    pub fn handle_multi_select(&mut self, graph: &mut Graph, rect: Rect, modifiers: Modifiers) {
        let rect = rect.abs();
        let mut picked = BTreeSet::new();

        for node in graph.nodes() {
            if overlap_bounding(rect, node.bounding()) {
                picked.insert(ItemId::Node(node.id));
            }
        }
        let groups: Vec<_> = graph
            .groups()
            .filter(|g| contains_rect(rect, g.bounding))
            .map(|g| g.id)
            .collect();
        for group in groups {
            graph.recompute_group_children(group);
            picked.insert(ItemId::Group(group));
        }
        for reroute in graph.reroutes() {
            if is_point_in_rect(reroute.pos, rect) {
                picked.insert(ItemId::Reroute(reroute.id));
            }
        }
        if let Some(io) = graph.io.as_ref() {
            for kind in [crate::graph::IoKind::Input, crate::graph::IoKind::Output] {
                if overlap_bounding(rect, io.get(kind).bounding()) {
                    picked.insert(ItemId::IoNode(kind));
                }
            }
        }

        log::debug!("selection rectangle picked {} item(s)", picked.len());

        if modifiers.shift {
            for item in picked {
                self.select(graph, item);
            }
        } else if modifiers.alt {
            for item in picked {
                self.deselect(graph, item);
            }
        } else {
            let stale: Vec<ItemId> = self.items.difference(&picked).copied().collect();
            for item in stale {
                self.deselect(graph, item);
            }
            for item in picked {
                self.select(graph, item);
            }
        }
    }

    /// Delete every selected item and clear the selection.
    ///
    /// Nodes are bypassed first so a chain through them stays connected.
    /// Nodes with `block_delete` survive and stay selected. Returns the
    /// number of items removed.
    pub fn delete_selected(&mut self, graph: &mut Graph, keep_all_links: bool) -> usize {
        let mut removed = 0;
        let mut kept = BTreeSet::new();
        let items: Vec<ItemId> = self.items.iter().copied().collect();

        for item in items {
            match item {
                ItemId::Node(id) => {
                    if graph.node(id).is_some_and(|n| n.block_delete) {
                        kept.insert(item);
                        continue;
                    }
                    graph.connect_input_to_output(id, keep_all_links);
                    removed += usize::from(graph.remove_node(id).is_some());
                }
                ItemId::Reroute(id) => {
                    removed += usize::from(graph.remove_reroute(id).is_some());
                }
                ItemId::Group(id) => {
                    removed += usize::from(graph.remove_group(id).is_some());
                }
                // Subgraph boundaries cannot be deleted
                ItemId::IoNode(_) => {
                    if let Some(io) = graph.item_mut(item) {
                        io.set_selected(false);
                    }
                }
            }
        }

        self.items = kept;
        log::debug!("deleted {} item(s)", removed);
        removed
    }
}

/// Links attached to any selected node.
pub fn highlighted_links(graph: &Graph, selection: &Selection) -> BTreeSet<LinkId> {
    let mut links = BTreeSet::new();
    for id in selection.nodes() {
        let Some(node) = graph.node(id) else { continue };
        links.extend(node.inputs.iter().filter_map(|s| s.link));
        for output in &node.outputs {
            links.extend(output.links.iter().copied());
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Group, Node};
    use kurbo::Point;

    fn graph() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_pos(0.0, 0.0).with_output("out", "number"));
        let b = graph.add_node(
            Node::new("b")
                .with_pos(200.0, 0.0)
                .with_input("in", "number")
                .with_output("out", "number"),
        );
        let c = graph.add_node(Node::new("c").with_pos(400.0, 0.0).with_input("in", "number"));
        (graph, a, b, c)
    }

    #[test]
    fn test_invariant_holds_after_operations() {
        let (mut graph, a, b, _) = graph();
        let mut selection = Selection::new();
        selection.select(&mut graph, ItemId::Node(a));
        assert!(selection.is_consistent(&graph));
        selection.process_select(&mut graph, Some(ItemId::Node(b)), Modifiers::SHIFT, false, false);
        assert!(selection.is_consistent(&graph));
        assert_eq!(selection.len(), 2);
        selection.deselect_all(&mut graph, Some(ItemId::Node(b)));
        assert!(selection.is_consistent(&graph));
        assert!(selection.contains(ItemId::Node(b)));
        selection.select_all(&mut graph);
        assert!(selection.is_consistent(&graph));
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_flag_without_membership_is_inconsistent() {
        let (mut graph, a, _, _) = graph();
        let selection = Selection::new();
        graph.node_mut(a).unwrap().selected = true;
        assert!(!selection.is_consistent(&graph));
    }

    #[test]
    fn test_process_select() {
        let (mut graph, a, b, _) = graph();
        let mut selection = Selection::new();
        let (na, nb) = (ItemId::Node(a), ItemId::Node(b));

        selection.process_select(&mut graph, Some(na), Modifiers::NONE, false, false);
        selection.process_select(&mut graph, Some(nb), Modifiers::NONE, false, false);
        assert_eq!(selection.items().iter().copied().collect::<Vec<_>>(), vec![nb]);

        selection.process_select(&mut graph, Some(na), Modifiers::SHIFT, false, false);
        assert_eq!(selection.len(), 2);

        // Sticky keeps the multi-selection
        selection.process_select(&mut graph, Some(na), Modifiers::NONE, true, false);
        assert_eq!(selection.len(), 2);

        // Ctrl toggles off
        selection.process_select(&mut graph, Some(na), Modifiers::CTRL, false, false);
        assert!(!selection.contains(na));

        // Plain click on a selected item collapses to it
        selection.process_select(&mut graph, Some(na), Modifiers::SHIFT, false, false);
        selection.process_select(&mut graph, Some(nb), Modifiers::NONE, false, false);
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(nb));

        // Empty click with shift keeps, without clears
        selection.process_select(&mut graph, None, Modifiers::SHIFT, false, false);
        assert_eq!(selection.len(), 1);
        selection.process_select(&mut graph, None, Modifiers::NONE, false, false);
        assert!(selection.is_empty());
        assert!(selection.is_consistent(&graph));
    }

    #[test]
    fn test_multi_select_mode_adds() {
        let (mut graph, a, b, _) = graph();
        let mut selection = Selection::new();
        selection.process_select(&mut graph, Some(ItemId::Node(a)), Modifiers::NONE, false, true);
        selection.process_select(&mut graph, Some(ItemId::Node(b)), Modifiers::NONE, false, true);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_rectangle_selects_overlapping_nodes() {
        let (mut graph, a, b, c) = graph();
        let mut selection = Selection::new();
        // Drawn right-to-left, clipping only the edge of b
        let rect = Rect::new(250.0, 50.0, 160.0, 10.0);
        selection.handle_multi_select(&mut graph, rect, Modifiers::NONE);
        assert!(!selection.contains(ItemId::Node(a)));
        assert!(selection.contains(ItemId::Node(b)));
        assert!(!selection.contains(ItemId::Node(c)));
        assert!(selection.is_consistent(&graph));
    }

    #[test]
    fn test_rectangle_requires_full_group_containment() {
        let (mut graph, _, _, _) = graph();
        let group = graph.add_group(Group::new("g", Rect::new(-20.0, -80.0, 180.0, 100.0)));
        let mut selection = Selection::new();

        selection.handle_multi_select(&mut graph, Rect::new(0.0, -100.0, 200.0, 120.0), Modifiers::NONE);
        assert!(!selection.contains(ItemId::Group(group)));

        selection.handle_multi_select(&mut graph, Rect::new(-30.0, -100.0, 200.0, 120.0), Modifiers::NONE);
        assert!(selection.contains(ItemId::Group(group)));
    }

    #[test]
    fn test_rectangle_modifiers() {
        let (mut graph, a, b, _) = graph();
        let mut selection = Selection::new();
        selection.select(&mut graph, ItemId::Node(a));

        let around_b = Rect::new(190.0, -40.0, 350.0, 70.0);
        selection.handle_multi_select(&mut graph, around_b, Modifiers::SHIFT);
        assert_eq!(selection.len(), 2);

        selection.handle_multi_select(&mut graph, around_b, Modifiers::ALT);
        assert_eq!(selection.items().iter().copied().collect::<Vec<_>>(), vec![ItemId::Node(a)]);

        selection.handle_multi_select(&mut graph, around_b, Modifiers::NONE);
        assert_eq!(selection.items().iter().copied().collect::<Vec<_>>(), vec![ItemId::Node(b)]);
        assert!(selection.is_consistent(&graph));
    }

    #[test]
    fn test_rectangle_selects_reroute_by_centre() {
        let (mut graph, _, _, _) = graph();
        let reroute = graph.create_reroute(Point::new(150.0, 300.0), None);
        let mut selection = Selection::new();
        selection.handle_multi_select(&mut graph, Rect::new(145.0, 295.0, 200.0, 400.0), Modifiers::NONE);
        assert!(selection.contains(ItemId::Reroute(reroute)));
        selection.handle_multi_select(&mut graph, Rect::new(152.0, 295.0, 200.0, 400.0), Modifiers::NONE);
        assert!(!selection.contains(ItemId::Reroute(reroute)));
    }

    #[test]
    fn test_delete_selected_bypasses_node() {
        let (mut graph, a, b, c) = graph();
        graph.connect(a, 0, b, 0, None).unwrap();
        graph.connect(b, 0, c, 0, None).unwrap();
        let mut selection = Selection::new();
        selection.select(&mut graph, ItemId::Node(b));

        assert_eq!(selection.delete_selected(&mut graph, false), 1);
        assert!(graph.node(b).is_none());
        let link = graph.link(graph.input_link(c, 0).unwrap()).unwrap();
        assert!(link.originates(a, 0));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_delete_skips_blocked_nodes() {
        let (mut graph, a, b, _) = graph();
        graph.node_mut(a).unwrap().block_delete = true;
        let reroute = graph.create_reroute(Point::new(0.0, 300.0), None);
        let mut selection = Selection::new();
        selection.select_items(&mut graph, [ItemId::Node(a), ItemId::Node(b), ItemId::Reroute(reroute)]);

        assert_eq!(selection.delete_selected(&mut graph, false), 2);
        assert!(graph.node(a).is_some());
        assert!(graph.reroute(reroute).is_none());
        assert!(selection.is_consistent(&graph));
    }

    #[test]
    fn test_highlighted_links() {
        let (mut graph, a, b, c) = graph();
        let ab = graph.connect(a, 0, b, 0, None).unwrap();
        let bc = graph.connect(b, 0, c, 0, None).unwrap();
        let mut selection = Selection::new();
        selection.select(&mut graph, ItemId::Node(a));
        assert_eq!(highlighted_links(&graph, &selection), BTreeSet::from([ab]));
        selection.select(&mut graph, ItemId::Node(b));
        assert_eq!(highlighted_links(&graph, &selection), BTreeSet::from([ab, bc]));
    }
}
