//! Reroutes: user-placed waypoints that links pass through.

use super::{LinkId, Positionable, RerouteId};
use crate::measure::{distance, snap_to_grid};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Radius of the reroute dot, also its hit radius.
pub const REROUTE_RADIUS: f64 = 10.0;
/// Upper bound of the spline control offset leaving a reroute.
pub const REROUTE_MAX_SPLINE_OFFSET: f64 = 80.0;
/// Radius of the connection dot drawn on hovered reroutes.
pub const REROUTE_SLOT_RADIUS: f64 = 5.0;

/// Which kind of slot a floating reroute's loose end is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatingSlotKind {
    Input,
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reroute {
    pub id: RerouteId,
    pub pos: Point,
    /// Previous reroute in the chain, towards the link origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RerouteId>,
    #[serde(default)]
    pub link_ids: BTreeSet<LinkId>,
    #[serde(default)]
    pub floating_link_ids: BTreeSet<LinkId>,
    /// Set when only one end of the chain is connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating: Option<FloatingSlotKind>,
    #[serde(skip)]
    pub selected: bool,
    /// Averaged direction of the links leaving this reroute, recomputed
    /// each frame.
    #[serde(skip)]
    pub cos: f64,
    #[serde(skip)]
    pub sin: f64,
    /// Control point offset for the segment arriving at this reroute.
    #[serde(skip)]
    pub control_point: Vec2,
}

impl Reroute {
    pub fn new(id: RerouteId, pos: Point) -> Self {
        Self {
            id,
            pos,
            parent_id: None,
            link_ids: BTreeSet::new(),
            floating_link_ids: BTreeSet::new(),
            floating: None,
            selected: false,
            cos: 0.0,
            sin: 0.0,
            control_point: Vec2::ZERO,
        }
    }

    /// Set the parent, ignoring attempts to parent a reroute to itself.
    pub fn set_parent(&mut self, parent: Option<RerouteId>) {
        if parent == Some(self.id) {
            log::warn!("ignoring self-parent on reroute {:?}", self.id);
            return;
        }
        self.parent_id = parent;
    }

    /// Circular hit test.
    pub fn contains_point(&self, point: Point) -> bool {
        distance(self.pos, point) <= REROUTE_RADIUS
    }

    pub fn snap_to_grid(&mut self, grid_size: f64) -> bool {
        if grid_size <= 0.0 {
            return false;
        }
        self.pos = snap_to_grid(self.pos, grid_size);
        true
    }

    /// Total number of links (real and floating) passing through.
    pub fn total_links(&self) -> usize {
        self.link_ids.len() + self.floating_link_ids.len()
    }

    /// Clear the per-frame direction.
    pub fn clear_direction(&mut self) {
        self.cos = 0.0;
        self.sin = 0.0;
        self.control_point = Vec2::ZERO;
    }

    /// Update the cached direction from the angles of the outgoing links and
    /// the position the chain arrives from.
    pub fn update_direction(&mut self, outgoing: &[Point], arriving_from: Point) {
        if outgoing.is_empty() {
            self.clear_direction();
            return;
        }

        let sum: f64 = outgoing
            .iter()
            .map(|next| (next.y - self.pos.y).atan2(next.x - self.pos.x))
            .sum();
        let average = sum / outgoing.len() as f64;

        let origin_to_reroute = (self.pos.y - arriving_from.y).atan2(self.pos.x - arriving_from.x);
        let mut diff = (origin_to_reroute - average) * 0.5;
        if diff.abs() > std::f64::consts::FRAC_PI_2 {
            diff += std::f64::consts::PI;
        }
        let dist = REROUTE_MAX_SPLINE_OFFSET.min(distance(arriving_from, self.pos) * 0.25);

        let angle = origin_to_reroute - diff;
        self.cos = angle.cos();
        self.sin = angle.sin();
        self.control_point = Vec2::new(dist * -self.cos, dist * -self.sin);
    }
}

impl Positionable for Reroute {
    fn bounding(&self) -> Rect {
        Rect::from_center_size(self.pos, (REROUTE_RADIUS * 2.0, REROUTE_RADIUS * 2.0))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_parent_is_ignored() {
        let mut reroute = Reroute::new(RerouteId(1), Point::ZERO);
        reroute.set_parent(Some(RerouteId(1)));
        assert_eq!(reroute.parent_id, None);
        reroute.set_parent(Some(RerouteId(2)));
        assert_eq!(reroute.parent_id, Some(RerouteId(2)));
    }

    #[test]
    fn test_contains_point() {
        let reroute = Reroute::new(RerouteId(1), Point::new(50.0, 50.0));
        assert!(reroute.contains_point(Point::new(56.0, 58.0)));
        assert!(!reroute.contains_point(Point::new(60.0, 60.0)));
    }

    #[test]
    fn test_direction_along_straight_line() {
        let mut reroute = Reroute::new(RerouteId(1), Point::new(100.0, 0.0));
        reroute.update_direction(&[Point::new(200.0, 0.0)], Point::new(0.0, 0.0));
        assert!((reroute.cos - 1.0).abs() < 1e-9);
        assert!(reroute.sin.abs() < 1e-9);
        // Control point points back towards the origin, capped at 25 units
        assert!((reroute.control_point.x + 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_direction_cleared_without_links() {
        let mut reroute = Reroute::new(RerouteId(1), Point::new(100.0, 0.0));
        reroute.update_direction(&[Point::new(200.0, 0.0)], Point::ZERO);
        reroute.update_direction(&[], Point::ZERO);
        assert_eq!(reroute.control_point, Vec2::ZERO);
    }
}
