//! Links between node slots.

use super::{LinkId, NodeId, RerouteId};
use serde::{Deserialize, Serialize};

/// A connection from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub origin_id: NodeId,
    pub origin_slot: usize,
    pub target_id: NodeId,
    pub target_slot: usize,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Last reroute the link passes through before reaching its target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RerouteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Link {
    /// Whether this link feeds `node`'s input `slot`.
    pub fn targets(&self, node: NodeId, slot: usize) -> bool {
        self.target_id == node && self.target_slot == slot
    }

    /// Whether this link leaves `node`'s output `slot`.
    pub fn originates(&self, node: NodeId, slot: usize) -> bool {
        self.origin_id == node && self.origin_slot == slot
    }
}

/// Which end of a floating link is still attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatingEnd {
    /// Attached to an output; the target end is loose.
    Output { node: NodeId, slot: usize },
    /// Attached to an input; the origin end is loose.
    Input { node: NodeId, slot: usize },
}

/// A link connected at only one end, usually ending on a reroute.
///
/// Floating links are drawn at reduced opacity and never take part in
/// connectivity queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingLink {
    pub id: LinkId,
    pub end: FloatingEnd,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RerouteId>,
}

/// Whether two slot types may be connected.
///
/// Empty and `*` accept anything; otherwise types match case-insensitively,
/// and comma-separated lists match if any entry matches.
pub fn is_type_compatible(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() || a == "*" || b == "*" {
        return true;
    }
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    if !a.contains(',') && !b.contains(',') {
        return false;
    }
    a.split(',').any(|ta| {
        let ta = ta.trim();
        b.split(',').any(|tb| ta.eq_ignore_ascii_case(tb.trim()))
    })
}
