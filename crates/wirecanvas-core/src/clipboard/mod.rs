//! Copy and paste of canvas items.
//!
//! A copy serialises the selected nodes, groups and reroutes, the links
//! feeding the copied nodes and every subgraph definition they instantiate
//! into one JSON blob. The blob goes through a [`ClipboardStore`] so that
//! separate canvases (or browser tabs) can share it.

mod memory;
mod paste;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local_storage;

pub use memory::MemoryClipboard;
pub use paste::{paste_items, PasteOptions, PasteResult};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileClipboard;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageClipboard;

use crate::graph::{Graph, Group, ItemId, Link, Node, Reroute, Subgraph, SubgraphId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

/// Storage key of the clipboard blob.
pub const CLIPBOARD_KEY: &str = "litegrapheditor_clipboard";

/// Clipboard errors.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard is empty")]
    Empty,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Clipboard error: {0}")]
    Other(String),
}

/// Result type for clipboard operations.
pub type ClipboardResult<T> = Result<T, ClipboardError>;

/// Backing store for the clipboard blob.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait ClipboardStore: Send + Sync {
    /// Replace the value stored under `key`.
    fn write(&self, key: &str, data: &str) -> ClipboardResult<()>;

    /// Read the value under `key`. Missing values are [`ClipboardError::Empty`].
    fn read(&self, key: &str) -> ClipboardResult<String>;
}

/// Backing store for the clipboard blob (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait ClipboardStore {
    /// Replace the value stored under `key`.
    fn write(&self, key: &str, data: &str) -> ClipboardResult<()>;

    /// Read the value under `key`. Missing values are [`ClipboardError::Empty`].
    fn read(&self, key: &str) -> ClipboardResult<String>;
}

/// Serialised clipboard contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipboardItems {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub reroutes: Vec<Reroute>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub subgraphs: Vec<Subgraph>,
}

impl ClipboardItems {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.groups.is_empty() && self.reroutes.is_empty()
    }

    pub fn to_json(&self) -> ClipboardResult<String> {
        serde_json::to_string(self).map_err(|e| ClipboardError::Serialization(e.to_string()))
    }

    /// Parse a clipboard blob. Entries that fail to decode are logged and
    /// skipped; only a blob that is not a clipboard object is an error.
    pub fn from_json(json: &str) -> ClipboardResult<Self> {
        let raw: RawItems =
            serde_json::from_str(json).map_err(|e| ClipboardError::Serialization(e.to_string()))?;
        Ok(Self {
            nodes: decode_entries("node", raw.nodes),
            groups: decode_entries("group", raw.groups),
            reroutes: decode_entries("reroute", raw.reroutes),
            links: decode_entries("link", raw.links),
            subgraphs: decode_entries("subgraph", raw.subgraphs),
        })
    }

    /// Write to `store` under [`CLIPBOARD_KEY`].
    pub fn store(&self, store: &dyn ClipboardStore) -> ClipboardResult<()> {
        store.write(CLIPBOARD_KEY, &self.to_json()?)
    }

    /// Read from `store`.
    pub fn load(store: &dyn ClipboardStore) -> ClipboardResult<Self> {
        Self::from_json(&store.read(CLIPBOARD_KEY)?)
    }
}

/// Clipboard blob with undecoded entries.
#[derive(Deserialize)]
struct RawItems {
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    groups: Vec<Value>,
    #[serde(default)]
    reroutes: Vec<Value>,
    #[serde(default)]
    links: Vec<Value>,
    #[serde(default)]
    subgraphs: Vec<Value>,
}

fn decode_entries<T: DeserializeOwned>(kind: &str, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("paste: skipping malformed {} #{}: {}", kind, index, e);
                None
            }
        })
        .collect()
}

/// Subgraph definition a node instantiates, if any.
fn subgraph_of(node: &Node, definitions: &BTreeMap<SubgraphId, Subgraph>) -> Option<SubgraphId> {
    Uuid::parse_str(&node.type_name)
        .ok()
        .filter(|id| definitions.contains_key(id))
}

/// Serialise `items` from `graph`.
///
/// `definitions` holds the subgraph definitions (the root graph's). Nodes
/// keep their ids so the paste can remap links; non-clonable nodes are
/// skipped.
pub fn copy_items(
    graph: &Graph,
    definitions: &BTreeMap<SubgraphId, Subgraph>,
    items: impl IntoIterator<Item = ItemId>,
) -> ClipboardItems {
    let mut copied = ClipboardItems::default();
    let mut pending: Vec<SubgraphId> = Vec::new();

    for item in items {
        match item {
            ItemId::Node(id) => {
                let Some(node) = graph.node(id) else { continue };
                if !node.clonable {
                    log::debug!("skipping non-clonable node {:?}", id);
                    continue;
                }
                copied.nodes.push(node.clone_detached());
                for input in &node.inputs {
                    if let Some(link) = input.link.and_then(|l| graph.link(l)) {
                        copied.links.push(link.clone());
                    }
                }
                if let Some(subgraph) = subgraph_of(node, definitions) {
                    pending.push(subgraph);
                }
            }
            ItemId::Group(id) => {
                if let Some(group) = graph.group(id) {
                    let mut group = group.clone();
                    group.selected = false;
                    copied.groups.push(group);
                }
            }
            ItemId::Reroute(id) => {
                if let Some(reroute) = graph.reroute(id) {
                    let mut reroute = reroute.clone();
                    reroute.selected = false;
                    copied.reroutes.push(reroute);
                }
            }
            ItemId::IoNode(_) => {}
        }
    }

    // Nested definitions are discovered while walking
    let mut seen = BTreeSet::new();
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(subgraph) = definitions.get(&id) else { continue };
        pending.extend(subgraph.graph.nodes().filter_map(|n| subgraph_of(n, definitions)));
        copied.subgraphs.push(subgraph.clone());
    }

    log::debug!(
        "copied {} node(s), {} link(s), {} subgraph(s)",
        copied.nodes.len(),
        copied.links.len(),
        copied.subgraphs.len()
    );
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    fn definitions() -> (BTreeMap<SubgraphId, Subgraph>, SubgraphId, SubgraphId) {
        let inner = Subgraph::new(Uuid::new_v4(), "inner");
        let mut outer = Subgraph::new(Uuid::new_v4(), "outer");
        outer.graph.add_node(Node::new(inner.type_name()));
        let (inner_id, outer_id) = (inner.id, outer.id);
        let mut defs = BTreeMap::new();
        defs.insert(inner.id, inner);
        defs.insert(outer.id, outer);
        (defs, inner_id, outer_id)
    }

    #[test]
    fn test_copy_collects_input_links_and_nested_subgraphs() {
        let (defs, inner, outer) = definitions();
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new("a").with_output("out", "number"));
        let b = graph.add_node(Node::new(outer.to_string()).with_input("in", "number"));
        graph.connect(a, 0, b, 0, None).unwrap();

        let copied = copy_items(&graph, &defs, [ItemId::Node(b)]);
        assert_eq!(copied.nodes.len(), 1);
        assert_eq!(copied.nodes[0].id, b);
        assert!(copied.nodes[0].inputs[0].link.is_none());
        assert_eq!(copied.links.len(), 1);
        let ids: BTreeSet<SubgraphId> = copied.subgraphs.iter().map(|s| s.id).collect();
        assert_eq!(ids, BTreeSet::from([inner, outer]));
    }

    #[test]
    fn test_copy_skips_non_clonable() {
        let mut graph = Graph::new();
        let mut node = Node::new("fixed");
        node.clonable = false;
        let id = graph.add_node(node);
        let copied = copy_items(&graph, &BTreeMap::new(), [ItemId::Node(id), ItemId::Node(NodeId(99))]);
        assert!(copied.is_empty());
    }

    #[test]
    fn test_store_and_load() {
        let store = MemoryClipboard::new();
        assert!(matches!(ClipboardItems::load(&store), Err(ClipboardError::Empty)));

        let mut graph = Graph::new();
        let id = graph.add_node(Node::new("a"));
        let copied = copy_items(&graph, &BTreeMap::new(), [ItemId::Node(id)]);
        copied.store(&store).unwrap();
        let loaded = ClipboardItems::load(&store).unwrap();
        assert_eq!(loaded.nodes.len(), 1);
        assert_eq!(loaded.nodes[0].type_name, "a");
    }

    #[test]
    fn test_missing_fields_default() {
        let items = ClipboardItems::from_json(r#"{ "nodes": [] }"#).unwrap();
        assert!(items.is_empty());
        assert!(ClipboardItems::from_json("not json").is_err());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let node = serde_json::to_value(Node::new("a").with_title("kept")).unwrap();
        let json = serde_json::json!({
            "nodes": [{ "bogus": true }, node, 42],
            "links": [{ "id": "not a link" }],
        })
        .to_string();
        let items = ClipboardItems::from_json(&json).unwrap();
        assert_eq!(items.nodes.len(), 1);
        assert_eq!(items.nodes[0].title, "kept");
        assert!(items.links.is_empty());

        assert!(ClipboardItems::from_json(r#"{ "nodes": 3 }"#).is_err());
    }
}
