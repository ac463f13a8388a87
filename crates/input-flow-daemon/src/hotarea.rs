//! Screen-edge trigger geometry and pointer location tracking.
//!
//! A crossing fires only when the pointer sits on a display edge, outside
//! the corner margins, and is still moving outward. The hot band is wider
//! than the edge itself so listeners can pre-warm before the crossing.

use std::sync::Mutex;

/// Width of the band along each edge considered "hot".
pub const HOT_AREA_WIDTH: i32 = 100;

/// Corner margin inside which edge events are suppressed.
pub const HOT_AREA_MARGIN: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// Edge-trigger geometry for one display.
pub struct HotArea {
    width: i32,
    height: i32,
}

impl HotArea {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// The hot band the pointer currently sits in, if any. Corners belong
    /// to no band.
    pub fn in_hot_area(&self, x: i32, y: i32) -> Option<EdgeSide> {
        let horizontal_ok = x > HOT_AREA_MARGIN && x < self.width - HOT_AREA_MARGIN;
        let vertical_ok = y > HOT_AREA_MARGIN && y < self.height - HOT_AREA_MARGIN;

        if x < HOT_AREA_WIDTH && vertical_ok {
            Some(EdgeSide::Left)
        } else if x >= self.width - HOT_AREA_WIDTH && vertical_ok {
            Some(EdgeSide::Right)
        } else if y < HOT_AREA_WIDTH && horizontal_ok {
            Some(EdgeSide::Top)
        } else if y >= self.height - HOT_AREA_WIDTH && horizontal_ok {
            Some(EdgeSide::Bottom)
        } else {
            None
        }
    }

    /// An edge crossing: pointer at the display edge, in a hot band, and
    /// moving outward.
    pub fn edge_event(&self, x: i32, y: i32, dx: i32, dy: i32) -> Option<EdgeSide> {
        match self.in_hot_area(x, y)? {
            EdgeSide::Left if x <= 0 && dx < 0 => Some(EdgeSide::Left),
            EdgeSide::Right if x >= self.width - 1 && dx > 0 => Some(EdgeSide::Right),
            EdgeSide::Top if y <= 0 && dy < 0 => Some(EdgeSide::Top),
            EdgeSide::Bottom if y >= self.height - 1 && dy > 0 => Some(EdgeSide::Bottom),
            _ => None,
        }
    }
}

/// Tracks the absolute pointer position and exposes it normalized to
/// percentages of the display, as carried in start results.
pub struct MouseLocationTracker {
    width: i32,
    height: i32,
    position: Mutex<(i32, i32)>,
}

impl MouseLocationTracker {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            position: Mutex::new((width / 2, height / 2)),
        }
    }

    pub fn update(&self, x: i32, y: i32) {
        let mut position = self.position.lock().unwrap();
        *position = (x.clamp(0, self.width - 1), y.clamp(0, self.height - 1));
    }

    /// Current position as percentages, each in 0..=100.
    pub fn percent(&self) -> (i32, i32) {
        let (x, y) = *self.position.lock().unwrap();
        (x * 100 / self.width, y * 100 / self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> HotArea {
        HotArea::new(1920, 1080)
    }

    #[test]
    fn left_band_detected() {
        assert_eq!(area().in_hot_area(50, 540), Some(EdgeSide::Left));
        assert_eq!(area().in_hot_area(150, 540), None);
    }

    #[test]
    fn corners_are_suppressed() {
        assert_eq!(area().in_hot_area(50, 100), None);
        assert_eq!(area().in_hot_area(1900, 1000), None);
    }

    #[test]
    fn crossing_requires_outward_motion() {
        let a = area();
        assert_eq!(a.edge_event(0, 540, -5, 0), Some(EdgeSide::Left));
        assert_eq!(a.edge_event(0, 540, 5, 0), None);
        assert_eq!(a.edge_event(30, 540, -5, 0), None);
        assert_eq!(a.edge_event(1919, 540, 3, 0), Some(EdgeSide::Right));
        assert_eq!(a.edge_event(960, 1079, 0, 2), Some(EdgeSide::Bottom));
    }

    #[test]
    fn tracker_normalizes_to_percent() {
        let tracker = MouseLocationTracker::new(2000, 1000);
        tracker.update(1960, 400);
        assert_eq!(tracker.percent(), (98, 40));
        tracker.update(-50, 5000);
        assert_eq!(tracker.percent(), (0, 99));
    }
}
