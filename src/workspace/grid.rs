use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Column/row of a grid cell. Every tile occupies exactly one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: u32,
    pub y: u32,
}

impl GridPosition {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }
}

/// Pixel dimensions of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetrics {
    pub cell_width: f32,
    pub cell_height: f32,
    pub gap: f32,
    pub padding: f32,
}

impl GridMetrics {
    fn pitch(&self) -> (f32, f32) {
        (self.cell_width + self.gap, self.cell_height + self.gap)
    }

    /// Screen rectangle of `pos` relative to the workspace origin.
    pub fn cell_rect(&self, origin: Point, pos: GridPosition) -> Rect {
        let (pitch_x, pitch_y) = self.pitch();
        Rect::new(
            origin.x + self.padding + pos.x as f32 * pitch_x,
            origin.y + self.padding + pos.y as f32 * pitch_y,
            self.cell_width,
            self.cell_height,
        )
    }

    /// Number of whole rows fitting in `height`, never less than one.
    pub fn rows_in(&self, height: f32) -> u32 {
        let (_, pitch_y) = self.pitch();
        if pitch_y <= 0.0 {
            return 1;
        }
        (((height - self.padding * 2.0 + self.gap) / pitch_y).floor() as i64).max(1) as u32
    }
}

/// Extent candidates are resolved against. `extra_rows` lets a drag grow the
/// workspace downward past the last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub cols: u32,
    pub rows: u32,
    pub extra_rows: u32,
}

/// Map a pointer to the cell under it.
///
/// Returns `None` above or to either side of the workspace and more than
/// `bounds.extra_rows` below the last row.
pub fn compute_candidate(
    pointer: Point,
    origin: Point,
    metrics: &GridMetrics,
    bounds: GridBounds,
) -> Option<GridPosition> {
    let (pitch_x, pitch_y) = metrics.pitch();
    if pitch_x <= 0.0 || pitch_y <= 0.0 || bounds.cols == 0 {
        return None;
    }
    let local_x = pointer.x - origin.x - metrics.padding;
    let local_y = pointer.y - origin.y - metrics.padding;
    if local_x < 0.0 || local_y < 0.0 || !local_x.is_finite() || !local_y.is_finite() {
        return None;
    }
    let col = (local_x / pitch_x).floor() as u64;
    let row = (local_y / pitch_y).floor() as u64;
    if col >= bounds.cols as u64 {
        return None;
    }
    if row >= bounds.rows as u64 + bounds.extra_rows as u64 {
        return None;
    }
    Some(GridPosition::new(col as u32, row as u32))
}

/// Cells held by tiles. Derived from the tile list on demand, never stored
/// alongside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    cells: HashSet<GridPosition>,
}

impl Occupancy {
    pub fn from_positions(positions: impl IntoIterator<Item = GridPosition>) -> Self {
        Self {
            cells: positions.into_iter().collect(),
        }
    }

    pub fn is_free(&self, pos: GridPosition) -> bool {
        !self.cells.contains(&pos)
    }

    /// First unoccupied cell scanning rows top to bottom and columns left to
    /// right. Rows are unbounded.
    pub fn next_free(&self, max_cols: u32) -> GridPosition {
        let cols = max_cols.max(1);
        let mut y = 0u32;
        loop {
            for x in 0..cols {
                let pos = GridPosition::new(x, y);
                if self.is_free(pos) {
                    return pos;
                }
            }
            y += 1;
        }
    }

    /// Rows spanned by occupied cells (highest row + 1).
    pub fn row_count(&self) -> u32 {
        self.cells.iter().map(|p| p.y + 1).max().unwrap_or(0)
    }

    pub fn insert(&mut self, pos: GridPosition) -> bool {
        self.cells.insert(pos)
    }

    pub fn remove(&mut self, pos: GridPosition) -> bool {
        self.cells.remove(&pos)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridPosition> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> GridMetrics {
        GridMetrics {
            cell_width: 100.0,
            cell_height: 80.0,
            gap: 10.0,
            padding: 5.0,
        }
    }

    fn bounds() -> GridBounds {
        GridBounds {
            cols: 4,
            rows: 2,
            extra_rows: 1,
        }
    }

    #[test]
    fn next_free_scans_row_major() {
        let occ = Occupancy::from_positions([
            GridPosition::new(0, 0),
            GridPosition::new(1, 0),
            GridPosition::new(0, 1),
        ]);
        assert_eq!(occ.next_free(2), GridPosition::new(1, 1));
        assert_eq!(occ.next_free(3), GridPosition::new(2, 0));
    }

    #[test]
    fn next_free_grows_past_full_rows() {
        let occ = Occupancy::from_positions((0..3).map(|x| GridPosition::new(x, 0)));
        assert_eq!(occ.next_free(3), GridPosition::new(0, 1));
        assert_eq!(Occupancy::default().next_free(0), GridPosition::new(0, 0));
    }

    #[test]
    fn candidate_uses_integer_division() {
        let origin = Point::new(20.0, 40.0);
        let p = Point::new(20.0 + 5.0 + 110.0 * 2.0 + 50.0, 40.0 + 5.0 + 90.0 + 1.0);
        assert_eq!(
            compute_candidate(p, origin, &metrics(), bounds()),
            Some(GridPosition::new(2, 1))
        );
    }

    #[test]
    fn candidate_rejects_above_and_sides() {
        let origin = Point::new(0.0, 0.0);
        assert_eq!(
            compute_candidate(Point::new(50.0, 2.0), origin, &metrics(), bounds()),
            None
        );
        assert_eq!(
            compute_candidate(Point::new(-1.0, 50.0), origin, &metrics(), bounds()),
            None
        );
        assert_eq!(
            compute_candidate(Point::new(5.0 + 440.0, 50.0), origin, &metrics(), bounds()),
            None
        );
    }

    #[test]
    fn candidate_tolerates_extra_rows_below() {
        let origin = Point::new(0.0, 0.0);
        let below_last = Point::new(10.0, 5.0 + 90.0 * 2.0 + 1.0);
        assert_eq!(
            compute_candidate(below_last, origin, &metrics(), bounds()),
            Some(GridPosition::new(0, 2))
        );
        let too_far = Point::new(10.0, 5.0 + 90.0 * 3.0 + 1.0);
        assert_eq!(compute_candidate(too_far, origin, &metrics(), bounds()), None);
    }

    #[test]
    fn rows_in_viewport() {
        assert_eq!(metrics().rows_in(10.0), 1);
        assert_eq!(metrics().rows_in(5.0 * 2.0 + 80.0 * 3.0 + 10.0 * 2.0), 3);
    }
}
