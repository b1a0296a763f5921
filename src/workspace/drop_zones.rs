use crate::workspace::grid::{GridPosition, Occupancy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropZone {
    pub position: GridPosition,
    pub highlighted: bool,
}

/// Overlay of empty cells that accept a drop or an add-tile click.
///
/// The set is always rebuilt from scratch so no overlay can outlive the
/// occupancy it was derived from.
#[derive(Debug, Clone, Default)]
pub struct DropZoneSet {
    zones: Vec<DropZone>,
    visible: bool,
    rebuilds: u64,
}

impl DropZoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize one zone per free cell in `cols` x `rows`.
    pub fn rebuild(&mut self, occupancy: &Occupancy, cols: u32, rows: u32) {
        self.zones.clear();
        for y in 0..rows {
            for x in 0..cols {
                let position = GridPosition::new(x, y);
                if occupancy.is_free(position) {
                    self.zones.push(DropZone {
                        position,
                        highlighted: false,
                    });
                }
            }
        }
        self.visible = true;
        self.rebuilds += 1;
        tracing::debug!(zones = self.zones.len(), cols, rows, "drop zones rebuilt");
    }

    pub fn hide(&mut self) {
        self.zones.clear();
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Highlight exactly the zone at `target`, clearing every other one.
    /// Returns whether a zone was highlighted.
    pub fn highlight(&mut self, target: Option<GridPosition>) -> bool {
        let mut hit = false;
        for zone in &mut self.zones {
            zone.highlighted = Some(zone.position) == target;
            hit |= zone.highlighted;
        }
        hit
    }

    pub fn clear_highlight(&mut self) {
        self.highlight(None);
    }

    pub fn highlighted(&self) -> Option<GridPosition> {
        self.zones
            .iter()
            .find(|z| z.highlighted)
            .map(|z| z.position)
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        self.zones.iter().any(|z| z.position == pos)
    }

    pub fn zones(&self) -> &[DropZone] {
        &self.zones
    }

    pub fn positions(&self) -> Vec<GridPosition> {
        self.zones.iter().map(|z| z.position).collect()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}
