//! Geometry helpers shared by hit testing, culling and selection.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Default grid size used when snapping dragged items.
pub const GRID_SIZE: f64 = 10.0;

/// Direction a slot or reroute faces. Used to bend link curves away from
/// their endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkDirection {
    None,
    Up,
    Down,
    Left,
    #[default]
    Right,
    Center,
}

impl LinkDirection {
    /// Offset vector of length `dist` pointing along this direction.
    pub fn offset(self, dist: f64) -> Vec2 {
        match self {
            LinkDirection::Left => Vec2::new(-dist, 0.0),
            LinkDirection::Right => Vec2::new(dist, 0.0),
            LinkDirection::Up => Vec2::new(0.0, -dist),
            LinkDirection::Down => Vec2::new(0.0, dist),
            LinkDirection::None | LinkDirection::Center => Vec2::ZERO,
        }
    }

    /// Unit vector for this direction, zero for `None`/`Center`.
    pub fn unit(self) -> Vec2 {
        self.offset(1.0)
    }
}

/// One of the four corners of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassCorner {
    NW,
    NE,
    SW,
    SE,
}

impl CompassCorner {
    /// Cursor glyph name to show while hovering or resizing this corner.
    pub fn cursor(self) -> &'static str {
        match self {
            CompassCorner::NW | CompassCorner::SE => "nwse-resize",
            CompassCorner::NE | CompassCorner::SW => "nesw-resize",
        }
    }

    /// Whether resizing from this corner moves the left edge.
    pub fn moves_left(self) -> bool {
        matches!(self, CompassCorner::NW | CompassCorner::SW)
    }

    /// Whether resizing from this corner moves the top edge.
    pub fn moves_top(self) -> bool {
        matches!(self, CompassCorner::NW | CompassCorner::NE)
    }
}

/// Half-open point-in-rectangle test (`x0 <= x < x1`).
pub fn is_point_in_rect(point: Point, rect: Rect) -> bool {
    point.x >= rect.x0 && point.x < rect.x1 && point.y >= rect.y0 && point.y < rect.y1
}

/// Whether two rectangles overlap. Touching edges count as overlapping.
pub fn overlap_bounding(a: Rect, b: Rect) -> bool {
    !(a.x0 > b.x1 || a.y0 > b.y1 || a.x1 < b.x0 || a.y1 < b.y0)
}

/// Whether `outer` wholly contains `inner`. An identical rectangle is not
/// considered contained.
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    let identical = outer == inner;
    !identical
        && outer.x0 <= inner.x0
        && outer.y0 <= inner.y0
        && outer.x1 >= inner.x1
        && outer.y1 >= inner.y1
}

/// Whether the centre of `inner` lies inside `outer`.
pub fn contains_centre(outer: Rect, inner: Rect) -> bool {
    is_point_in_rect(inner.center(), outer)
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// Minimum distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

/// Returns which corner box of `rect` (each `size`×`size`) contains the point.
///
/// Corners are checked NW, NE, SW, SE; the first hit wins.
pub fn find_containing_corner(rect: Rect, point: Point, size: f64) -> Option<CompassCorner> {
    let corner_box = |x: f64, y: f64| Rect::new(x, y, x + size, y + size);
    if is_point_in_rect(point, corner_box(rect.x0, rect.y0)) {
        Some(CompassCorner::NW)
    } else if is_point_in_rect(point, corner_box(rect.x1 - size, rect.y0)) {
        Some(CompassCorner::NE)
    } else if is_point_in_rect(point, corner_box(rect.x0, rect.y1 - size)) {
        Some(CompassCorner::SW)
    } else if is_point_in_rect(point, corner_box(rect.x1 - size, rect.y1 - size)) {
        Some(CompassCorner::SE)
    } else {
        None
    }
}

/// Rectangle from an origin and a size, normalised so a negative size
/// (e.g. a drag towards the top-left) still yields `x0 <= x1`.
pub fn rect_from_origin_size(origin: Point, size: Vec2) -> Rect {
    Rect::from_points(origin, origin + size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(overlap_bounding(a, b));
        let c = Rect::new(10.1, 0.0, 20.0, 10.0);
        assert!(!overlap_bounding(a, c));
    }

    #[test]
    fn test_contains_rect_excludes_identical() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(!contains_rect(outer, outer));
        assert!(contains_rect(outer, Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!contains_rect(outer, Rect::new(90.0, 90.0, 110.0, 110.0)));
    }

    #[test]
    fn test_point_in_rect_is_half_open() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(is_point_in_rect(Point::new(0.0, 0.0), rect));
        assert!(!is_point_in_rect(Point::new(10.0, 5.0), rect));
    }

    #[test]
    fn test_segment_distance() {
        let d = point_to_segment_dist(
            Point::new(5.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 3.0).abs() < f64::EPSILON);
        let end = point_to_segment_dist(
            Point::new(13.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((end - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_snap_to_grid() {
        let p = snap_to_grid(Point::new(14.0, 26.0), 10.0);
        assert_eq!(p, Point::new(10.0, 30.0));
        assert_eq!(snap_to_grid(Point::new(3.3, 4.4), 0.0), Point::new(3.3, 4.4));
    }

    #[test]
    fn test_find_containing_corner() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(find_containing_corner(rect, Point::new(2.0, 2.0), 15.0), Some(CompassCorner::NW));
        assert_eq!(find_containing_corner(rect, Point::new(95.0, 2.0), 15.0), Some(CompassCorner::NE));
        assert_eq!(find_containing_corner(rect, Point::new(2.0, 45.0), 15.0), Some(CompassCorner::SW));
        assert_eq!(find_containing_corner(rect, Point::new(95.0, 45.0), 15.0), Some(CompassCorner::SE));
        assert_eq!(find_containing_corner(rect, Point::new(50.0, 25.0), 15.0), None);
    }

    #[test]
    fn test_direction_offsets() {
        assert_eq!(LinkDirection::Left.offset(4.0), Vec2::new(-4.0, 0.0));
        assert_eq!(LinkDirection::Down.offset(4.0), Vec2::new(0.0, 4.0));
        assert_eq!(LinkDirection::Center.offset(4.0), Vec2::ZERO);
    }
}
