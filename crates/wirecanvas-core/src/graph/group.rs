//! Groups: titled rectangles that visually gather nodes.

use super::{GroupId, ItemId, Positionable};
use crate::measure::is_point_in_rect;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GROUP_MIN_WIDTH: f64 = 140.0;
pub const GROUP_MIN_HEIGHT: f64 = 80.0;
/// Leg length of the resize triangle in the bottom-right corner.
pub const GROUP_RESIZE_LENGTH: f64 = 10.0;
pub const GROUP_PADDING: f64 = 4.0;
pub const GROUP_DEFAULT_FONT_SIZE: f64 = 24.0;
pub const GROUP_DEFAULT_COLOR: &str = "#335";

fn default_font_size() -> f64 {
    GROUP_DEFAULT_FONT_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub bounding: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(skip)]
    pub selected: bool,
    /// Items spatially inside the group. Recomputed on move/resize and never
    /// persisted.
    #[serde(skip)]
    pub children: BTreeSet<ItemId>,
}

impl Group {
    pub fn new(title: impl Into<String>, bounding: Rect) -> Self {
        Self {
            id: GroupId(0),
            title: title.into(),
            bounding,
            color: None,
            font_size: GROUP_DEFAULT_FONT_SIZE,
            pinned: false,
            selected: false,
            children: BTreeSet::new(),
        }
    }

    pub fn title_height(&self) -> f64 {
        self.font_size * 1.4
    }

    pub fn pos(&self) -> Point {
        self.bounding.origin()
    }

    pub fn contains(&self, point: Point) -> bool {
        is_point_in_rect(point, self.bounding)
    }

    pub fn is_point_in_title_bar(&self, point: Point) -> bool {
        let b = self.bounding;
        is_point_in_rect(point, Rect::new(b.x0, b.y0, b.x1, b.y0 + self.title_height()))
    }

    /// Whether `point` is in the triangular resize area at the bottom-right.
    pub fn is_in_resize(&self, point: Point) -> bool {
        let right = self.bounding.x1;
        let bottom = self.bounding.y1;
        point.x < right && point.y < bottom && (point.x - right) + (point.y - bottom) > -GROUP_RESIZE_LENGTH
    }

    /// Resize keeping the top-left fixed. Returns false when pinned.
    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        if self.pinned {
            return false;
        }
        let origin = self.bounding.origin();
        self.bounding = Rect::from_origin_size(
            origin,
            (width.max(GROUP_MIN_WIDTH), height.max(GROUP_MIN_HEIGHT)),
        );
        true
    }

    /// Fit the group around `rects` with `padding`, leaving room for the title.
    pub fn resize_to(&mut self, rects: &[Rect], padding: f64) {
        let Some(first) = rects.first() else {
            return;
        };
        let bounds = rects.iter().fold(*first, |acc, r| acc.union(*r));
        self.bounding = Rect::new(
            bounds.x0 - padding,
            bounds.y0 - padding - self.title_height(),
            bounds.x1 + padding,
            bounds.y1 + padding,
        );
    }
}

impl Positionable for Group {
    fn bounding(&self) -> Rect {
        self.bounding
    }

    /// Moves only the group rectangle; the graph moves children.
    fn move_by(&mut self, delta: Vec2) {
        if !self.pinned {
            self.bounding = self.bounding + delta;
        }
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
    fn test_resize_clamps_to_minimum() {
        let mut group = Group::new("g", Rect::new(0.0, 0.0, 300.0, 200.0));
        assert!(group.resize(10.0, 10.0));
        assert!((group.bounding.width() - GROUP_MIN_WIDTH).abs() < f64::EPSILON);
        assert!((group.bounding.height() - GROUP_MIN_HEIGHT).abs() < f64::EPSILON);
        group.pinned = true;
        assert!(!group.resize(500.0, 500.0));
    }

    #[test]
    fn test_title_bar_and_resize_zones() {
        let group = Group::new("g", Rect::new(0.0, 0.0, 300.0, 200.0));
        assert!(group.is_point_in_title_bar(Point::new(50.0, 20.0)));
        assert!(!group.is_point_in_title_bar(Point::new(50.0, 40.0)));
        assert!(group.is_in_resize(Point::new(297.0, 197.0)));
        assert!(!group.is_in_resize(Point::new(290.0, 190.0)));
    }

    #[test]
    fn test_resize_to_items() {
        let mut group = Group::new("g", Rect::ZERO);
        group.resize_to(&[Rect::new(10.0, 50.0, 60.0, 80.0), Rect::new(100.0, 60.0, 150.0, 120.0)], 10.0);
        assert!((group.bounding.x0 - 0.0).abs() < f64::EPSILON);
        assert!((group.bounding.y0 - (40.0 - group.title_height())).abs() < 1e-9);
        assert!((group.bounding.x1 - 160.0).abs() < f64::EPSILON);
    }
}
