use crate::workspace::grid::{Point, Rect};

/// Fixed region that deletes the dragged tile when a drag ends inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrashTarget {
    region: Rect,
    visible: bool,
    highlighted: bool,
}

impl TrashTarget {
    pub fn new(region: Rect) -> Self {
        Self {
            region,
            visible: false,
            highlighted: false,
        }
    }

    /// Hit test. A hidden trash target never matches.
    pub fn contains(&self, p: Point) -> bool {
        self.visible && self.region.contains(p)
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.highlighted = false;
    }

    pub fn set_highlighted(&mut self, on: bool) {
        self.highlighted = on && self.visible;
    }

    pub fn set_region(&mut self, region: Rect) {
        self.region = region;
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }
}
