//! Recreating clipboard contents with fresh ids.

use super::ClipboardItems;
use crate::graph::{
    Graph, GroupId, ItemId, LinkId, NodeId, NodeTypeRegistry, RerouteId, Subgraph, SubgraphId,
};
use kurbo::{Point, Vec2};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Where and how to paste.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasteOptions {
    /// Graph position the top-left of the copied items lands on.
    pub position: Point,
    /// Reconnect links whose origin was not copied to the original, live
    /// origin node.
    pub connect_unselected_outputs: bool,
}

/// Everything a paste created, keyed by the copied (original) ids.
#[derive(Debug, Clone, Default)]
pub struct PasteResult {
    pub created: Vec<ItemId>,
    pub nodes: BTreeMap<NodeId, NodeId>,
    pub groups: BTreeMap<GroupId, GroupId>,
    pub reroutes: BTreeMap<RerouteId, RerouteId>,
    pub links: BTreeMap<LinkId, LinkId>,
    /// New subgraph definitions, keyed by the original definition id. The
    /// caller registers them on the root graph.
    pub subgraphs: BTreeMap<SubgraphId, Subgraph>,
}

impl PasteResult {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

/// Remap a type name that points at a pasted subgraph definition.
fn remap_type(type_name: &mut String, ids: &BTreeMap<SubgraphId, SubgraphId>) {
    if let Some(new_id) = Uuid::parse_str(type_name).ok().and_then(|id| ids.get(&id)) {
        *type_name = new_id.to_string();
    }
}

/// Top-left over the copied nodes, reroutes and groups.
fn top_left(items: &ClipboardItems) -> Option<Point> {
    let points = items
        .nodes
        .iter()
        .map(|n| n.pos)
        .chain(items.reroutes.iter().map(|r| r.pos))
        .chain(items.groups.iter().map(|g| g.bounding.origin()));
    points.fold(None, |acc: Option<Point>, p| {
        Some(match acc {
            Some(a) => Point::new(a.x.min(p.x), a.y.min(p.y)),
            None => p,
        })
    })
}

/// Recreate `items` in `graph`.
///
/// Node types must be registered in `registry`, or name a subgraph in
/// `known_subgraphs` or among the pasted definitions. Unknown nodes are
/// skipped with a warning, along with any link to them.
pub fn paste_items(
    graph: &mut Graph,
    items: ClipboardItems,
    registry: &NodeTypeRegistry,
    known_subgraphs: &BTreeSet<SubgraphId>,
    options: &PasteOptions,
) -> PasteResult {
    let mut result = PasteResult::default();
    let Some(origin) = top_left(&items) else {
        return result;
    };
    let ClipboardItems {
        mut nodes,
        groups,
        reroutes,
        links,
        subgraphs,
    } = items;

    // Subgraph definitions get fresh ids; references to them follow,
    // including those nested inside other pasted definitions.
    let subgraph_ids: BTreeMap<SubgraphId, SubgraphId> =
        subgraphs.iter().map(|s| (s.id, Uuid::new_v4())).collect();
    for mut subgraph in subgraphs {
        let original = subgraph.id;
        let Some(&new_id) = subgraph_ids.get(&original) else { continue };
        subgraph.id = new_id;
        for node in subgraph.graph.nodes_mut() {
            remap_type(&mut node.type_name, &subgraph_ids);
        }
        result.subgraphs.insert(original, subgraph);
    }
    for node in &mut nodes {
        remap_type(&mut node.type_name, &subgraph_ids);
    }
    let is_known = |type_name: &str| {
        registry.contains(type_name)
            || Uuid::parse_str(type_name)
                .is_ok_and(|id| known_subgraphs.contains(&id) || subgraph_ids.values().any(|v| *v == id))
    };

    for mut group in groups {
        let original = group.id;
        group.selected = false;
        group.children.clear();
        let id = graph.add_group(group);
        result.groups.insert(original, id);
        result.created.push(ItemId::Group(id));
    }

    for mut node in nodes {
        if !is_known(&node.type_name) {
            log::warn!("paste: skipping node of unknown type '{}'", node.type_name);
            continue;
        }
        let original = node.id;
        node.selected = false;
        let id = graph.add_node(node);
        result.nodes.insert(original, id);
        result.created.push(ItemId::Node(id));
    }

    for reroute in &reroutes {
        let id = graph.create_reroute(reroute.pos, None);
        if let Some(created) = graph.reroute_mut(id) {
            created.floating = reroute.floating;
        }
        result.reroutes.insert(reroute.id, id);
        result.created.push(ItemId::Reroute(id));
    }
    for reroute in &reroutes {
        let Some(parent) = reroute.parent_id else { continue };
        let new_parent = match result.reroutes.get(&parent) {
            Some(mapped) => Some(*mapped),
            None => graph.reroute(parent).map(|r| r.id),
        };
        let Some(&id) = result.reroutes.get(&reroute.id) else { continue };
        if let Some(created) = graph.reroute_mut(id) {
            created.set_parent(new_parent);
        }
    }

    for link in &links {
        let Some(target) = result.nodes.get(&link.target_id).copied() else {
            continue;
        };
        let mut origin = result.nodes.get(&link.origin_id).copied();
        let mut after = link.parent_id.and_then(|p| result.reroutes.get(&p).copied());
        if options.connect_unselected_outputs {
            origin = origin.or_else(|| graph.node(link.origin_id).map(|n| n.id));
            after = after.or(link.parent_id);
        }
        let Some(origin) = origin else { continue };

        match graph.connect(origin, link.origin_slot, target, link.target_slot, after) {
            Some(id) => {
                result.links.insert(link.id, id);
            }
            None => log::warn!("paste: could not recreate link {:?}", link.id),
        }
    }

    // Carry copied link ids over to the new reroutes, then drop reroutes
    // that ended up without a valid link.
    for reroute in &reroutes {
        let Some(&id) = result.reroutes.get(&reroute.id) else { continue };
        let remapped: Vec<LinkId> = reroute
            .link_ids
            .iter()
            .map(|l| result.links.get(l).copied().unwrap_or(*l))
            .collect();
        if let Some(created) = graph.reroute_mut(id) {
            created.link_ids.extend(remapped);
        }
        if !graph.validate_reroute(id) {
            log::debug!("paste: dropping reroute {:?} without links", reroute.id);
            graph.remove_reroute(id);
            result.reroutes.remove(&reroute.id);
            result.created.retain(|item| *item != ItemId::Reroute(id));
        }
    }

    let delta: Vec2 = options.position - origin;
    for item in &result.created {
        match *item {
            ItemId::Node(id) => {
                if let Some(node) = graph.node_mut(id) {
                    node.pos += delta;
                }
            }
            ItemId::Group(id) => {
                if let Some(group) = graph.group_mut(id) {
                    group.bounding = group.bounding + delta;
                }
            }
            ItemId::Reroute(id) => {
                if let Some(reroute) = graph.reroute_mut(id) {
                    reroute.pos += delta;
                }
            }
            ItemId::IoNode(_) => {}
        }
    }
    for id in result.groups.values() {
        graph.recompute_group_children(*id);
    }

    log::info!(
        "pasted {} item(s), {} link(s), {} subgraph(s)",
        result.created.len(),
        result.links.len(),
        result.subgraphs.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::copy_items;
    use crate::graph::{Group, Node, SegmentId};
    use kurbo::Rect;

    fn chain() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_pos(100.0, 100.0).with_output("out", "number"));
        let b = graph.add_node(
            Node::new("b")
                .with_pos(300.0, 150.0)
                .with_input("in", "number")
                .with_output("out", "number"),
        );
        graph.connect(a, 0, b, 0, None).unwrap();
        (graph, a, b)
    }

    fn paste(graph: &mut Graph, items: ClipboardItems, options: PasteOptions) -> PasteResult {
        paste_items(graph, items, &NodeTypeRegistry::permissive(), &BTreeSet::new(), &options)
    }

    #[test]
    fn test_paste_places_top_left_at_position() {
        let (mut graph, a, b) = chain();
        let items = copy_items(&graph, &BTreeMap::new(), [ItemId::Node(a), ItemId::Node(b)]);
        let options = PasteOptions {
            position: Point::new(500.0, 500.0),
            ..Default::default()
        };
        let result = paste(&mut graph, items, options);

        assert_eq!(result.created.len(), 2);
        assert_eq!(graph.node(result.nodes[&a]).unwrap().pos, Point::new(500.0, 500.0));
        assert_eq!(graph.node(result.nodes[&b]).unwrap().pos, Point::new(700.0, 550.0));
        // The internal link is recreated between the copies
        let new_b = result.nodes[&b];
        let link = graph.link(graph.input_link(new_b, 0).unwrap()).unwrap();
        assert!(link.originates(result.nodes[&a], 0));
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn test_paste_external_connect() {
        let (mut graph, a, b) = chain();
        let items = copy_items(&graph, &BTreeMap::new(), [ItemId::Node(b)]);

        let plain = paste(&mut graph, items.clone(), PasteOptions::default());
        assert!(graph.input_link(plain.nodes[&b], 0).is_none());

        let options = PasteOptions {
            connect_unselected_outputs: true,
            ..Default::default()
        };
        let connected = paste(&mut graph, items, options);
        let new_b = connected.nodes[&b];
        let link = graph.link(graph.input_link(new_b, 0).unwrap()).unwrap();
        assert!(link.originates(a, 0));
        // The original connection is untouched
        assert!(graph.input_link(b, 0).is_some());
        assert_eq!(graph.output_links(a, 0).len(), 2);
    }

    #[test]
    fn test_unknown_types_are_skipped() {
        let (mut graph, a, b) = chain();
        let items = copy_items(&graph, &BTreeMap::new(), [ItemId::Node(a), ItemId::Node(b)]);
        let registry = NodeTypeRegistry::new().with_type("b");
        let result = paste_items(&mut graph, items, &registry, &BTreeSet::new(), &PasteOptions::default());
        assert_eq!(result.nodes.len(), 1);
        assert!(result.links.is_empty());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_nested_subgraph_ids_are_remapped() {
        let inner = Subgraph::new(Uuid::new_v4(), "inner");
        let mut outer = Subgraph::new(Uuid::new_v4(), "outer");
        outer.graph.add_node(Node::new(inner.type_name()));
        let (inner_id, outer_id) = (inner.id, outer.id);
        let definitions = BTreeMap::from([(inner.id, inner), (outer.id, outer)]);

        let mut graph = Graph::new();
        let node = graph.add_node(Node::new(outer_id.to_string()));
        let items = copy_items(&graph, &definitions, [ItemId::Node(node)]);

        let registry = NodeTypeRegistry::new();
        let result = paste_items(&mut graph, items, &registry, &BTreeSet::new(), &PasteOptions::default());

        let new_outer = &result.subgraphs[&outer_id];
        let new_inner = &result.subgraphs[&inner_id];
        assert_ne!(new_outer.id, outer_id);
        assert_ne!(new_inner.id, inner_id);
        assert_eq!(graph.node(result.nodes[&node]).unwrap().type_name, new_outer.type_name());
        let nested = new_outer.graph.nodes().next().unwrap();
        assert_eq!(nested.type_name, new_inner.type_name());
    }

    #[test]
    fn test_reroutes_follow_pasted_links() {
        let (mut graph, a, b) = chain();
        let link = graph.input_link(b, 0).unwrap();
        let reroute = graph.insert_reroute(Point::new(200.0, 50.0), SegmentId::Link(link)).unwrap();
        let items = copy_items(
            &graph,
            &BTreeMap::new(),
            [ItemId::Node(a), ItemId::Node(b), ItemId::Reroute(reroute)],
        );
        let result = paste(&mut graph, items, PasteOptions::default());

        let new_reroute = result.reroutes[&reroute];
        let new_link = graph.input_link(result.nodes[&b], 0).unwrap();
        assert_eq!(graph.link(new_link).unwrap().parent_id, Some(new_reroute));
        assert!(graph.reroute(new_reroute).unwrap().link_ids.contains(&new_link));
        assert!(!graph.reroute(new_reroute).unwrap().link_ids.contains(&link));
        // Position translated with the rest: top-left was (100, 50)
        assert_eq!(graph.reroute(new_reroute).unwrap().pos, Point::new(100.0, 0.0));
    }

    #[test]
    fn test_orphan_reroute_is_dropped() {
        let (mut graph, _, b) = chain();
        let link = graph.input_link(b, 0).unwrap();
        let reroute = graph.insert_reroute(Point::new(200.0, 50.0), SegmentId::Link(link)).unwrap();
        let items = copy_items(&graph, &BTreeMap::new(), [ItemId::Reroute(reroute)]);
        let result = paste(&mut graph, items, PasteOptions::default());
        assert!(result.reroutes.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn test_groups_are_pasted() {
        let mut graph = Graph::new();
        let group = graph.add_group(Group::new("g", Rect::new(0.0, 0.0, 200.0, 100.0)));
        let items = copy_items(&graph, &BTreeMap::new(), [ItemId::Group(group)]);
        let options = PasteOptions {
            position: Point::new(50.0, 60.0),
            ..Default::default()
        };
        let result = paste(&mut graph, items, options);
        let new_group = graph.group(result.groups[&group]).unwrap();
        assert_eq!(new_group.bounding, Rect::new(50.0, 60.0, 250.0, 160.0));
        assert_eq!(graph.groups().count(), 2);
    }

    #[test]
    fn test_empty_clipboard_pastes_nothing() {
        let mut graph = Graph::new();
        let result = paste(&mut graph, ClipboardItems::default(), PasteOptions::default());
        assert!(result.is_empty());
    }
}
