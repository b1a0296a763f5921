use crate::clock::{SharedClock, TickReport};
use crate::mark_sync::SyncBus;
use crate::time::TimeSource;
use crate::workspace::config::WorkspaceSettings;
use crate::workspace::drag::{
    DragCommit, DragController, DragOutcome, DragPhase, DragSession, DropTarget, HitTarget,
};
use crate::workspace::drop_zones::DropZoneSet;
use crate::workspace::edit_mode::{EditMode, EditModeMachine, EditTransition};
use crate::workspace::generate_tile_id;
use crate::workspace::grid::{
    compute_candidate, GridBounds, GridMetrics, GridPosition, Occupancy, Point, Rect,
};
use crate::workspace::input::{DefaultAction, InputAdapter, RawInput};
use crate::workspace::persistence::Persistence;
use crate::workspace::tile::{Tile, TilePayload};
use crate::workspace::trash::TrashTarget;
use crate::workspace::widgets::{
    BuiltinWidgets, QueuedHost, Widget, WidgetFactory, WidgetServices,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Notifications for the host, drained with [`Workspace::take_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    EditModeChanged {
        editing: bool,
    },
    /// An empty drop zone was clicked outside a drag.
    AddTileRequested {
        position: GridPosition,
    },
    TileAdded {
        id: String,
        position: GridPosition,
    },
    TileMoved {
        id: String,
        from: GridPosition,
        to: GridPosition,
    },
    TileRemoved {
        id: String,
    },
    TileTapped {
        id: String,
    },
}

/// Services owned by the application root and shared by every widget.
#[derive(Clone)]
pub struct SharedServices {
    pub clock: Arc<SharedClock>,
    pub sync: Arc<SyncBus>,
    pub time: Arc<dyn TimeSource>,
}

impl SharedServices {
    pub fn new(time: Arc<dyn TimeSource>, align_buffer_ms: i64) -> Self {
        Self {
            clock: Arc::new(SharedClock::with_align_buffer(time.clone(), align_buffer_ms)),
            sync: Arc::new(SyncBus::new(time.clone())),
            time,
        }
    }
}

/// What the host must do after an input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputResponse {
    pub outcome: DragOutcome,
    pub default_action: DefaultAction,
}

/// Observable interaction state; used to check that repeated mode changes
/// leave nothing behind.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSnapshot {
    pub mode: EditMode,
    pub drag_phase: DragPhase,
    pub drop_zones: Vec<GridPosition>,
    pub drop_zones_visible: bool,
    pub highlighted_zone: Option<GridPosition>,
    pub trash_visible: bool,
    pub trash_highlighted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Viewport {
    origin: Point,
    width: f32,
    height: f32,
}

/// Everything needed to map a pointer to a drop target, detached from the
/// workspace so the drag controller can be borrowed mutably alongside it.
struct DropResolver {
    trash: Rect,
    origin: Point,
    metrics: GridMetrics,
    bounds: GridBounds,
    occupancy: Occupancy,
}

impl DropResolver {
    fn resolve(&self, pointer: Point, session: &DragSession) -> DropTarget {
        if self.trash.contains(pointer) {
            return DropTarget::Trash;
        }
        match compute_candidate(pointer, self.origin, &self.metrics, self.bounds) {
            Some(pos) if pos == session.source_position || self.occupancy.is_free(pos) => {
                DropTarget::Cell(pos)
            }
            _ => DropTarget::Nowhere,
        }
    }
}

/// Coordinates tiles, their widgets and the edit-mode drag interaction.
pub struct Workspace {
    settings: WorkspaceSettings,
    tiles: Vec<Tile>,
    widgets: HashMap<String, Box<dyn Widget>>,
    factory: Box<dyn WidgetFactory>,
    shared: SharedServices,
    host: Arc<QueuedHost>,
    widget_services: WidgetServices,
    persistence: Arc<dyn Persistence>,
    edit: EditModeMachine,
    drag: DragController,
    drop_zones: DropZoneSet,
    trash: TrashTarget,
    viewport: Viewport,
    events: Vec<WorkspaceEvent>,
}

impl Workspace {
    pub fn new(
        settings: WorkspaceSettings,
        shared: SharedServices,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self::with_factory(settings, shared, persistence, Box::new(BuiltinWidgets))
    }

    pub fn with_factory(
        settings: WorkspaceSettings,
        shared: SharedServices,
        persistence: Arc<dyn Persistence>,
        factory: Box<dyn WidgetFactory>,
    ) -> Self {
        let edit = EditModeMachine::new();
        let host = Arc::new(QueuedHost::new(edit.flag()));
        let widget_services = WidgetServices {
            clock: shared.clock.clone(),
            sync: shared.sync.clone(),
            time: shared.time.clone(),
            host: host.clone(),
        };
        let drag = DragController::new(settings.interaction.drag());
        let trash = TrashTarget::new(settings.interaction.trash);
        Self {
            settings,
            tiles: Vec::new(),
            widgets: HashMap::new(),
            factory,
            shared,
            host,
            widget_services,
            persistence,
            edit,
            drag,
            drop_zones: DropZoneSet::new(),
            trash,
            viewport: Viewport::default(),
            events: Vec::new(),
        }
    }

    /// Replace every tile, e.g. after loading the workspace file. Widgets of
    /// the previous tiles are destroyed. Nothing is persisted.
    pub fn load_tiles(&mut self, tiles: Vec<Tile>) {
        self.destroy_widgets();
        self.tiles.clear();
        let cols = self.cols();
        let mut occupancy = Occupancy::default();
        for mut tile in tiles {
            if tile.position.x >= cols || !occupancy.is_free(tile.position) {
                let to = occupancy.next_free(cols);
                tracing::warn!(tile = %tile.id, from = %tile.position, %to, "relocating tile on load");
                tile.position = to;
            }
            if tile.id.is_empty() || self.tile(&tile.id).is_some() {
                tile.id = generate_tile_id(|c| self.tiles.iter().any(|t| t.id == c));
            }
            occupancy.insert(tile.position);
            let widget = self.factory.create(&tile, &self.widget_services);
            self.widgets.insert(tile.id.clone(), widget);
            self.tiles.push(tile);
        }
        tracing::info!(tiles = self.tiles.len(), "workspace loaded");
        self.refresh_drop_zones();
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub fn shared(&self) -> &SharedServices {
        &self.shared
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: &str) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn tile_at(&self, pos: GridPosition) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.position == pos)
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut (dyn Widget + 'static)> {
        self.widgets.get_mut(id).map(|w| &mut **w)
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy::from_positions(self.tiles.iter().map(|t| t.position))
    }

    fn occupancy_without(&self, id: &str) -> Occupancy {
        Occupancy::from_positions(
            self.tiles
                .iter()
                .filter(|t| t.id != id)
                .map(|t| t.position),
        )
    }

    fn cols(&self) -> u32 {
        self.settings.grid.cols.max(1)
    }

    pub fn metrics(&self) -> GridMetrics {
        self.settings.grid.metrics()
    }

    /// Rows the workspace shows: the viewport height or the occupied rows,
    /// whichever is larger.
    pub fn visible_rows(&self) -> u32 {
        let in_view = self.metrics().rows_in(self.viewport.height);
        in_view.max(self.occupancy().row_count())
    }

    pub fn cell_rect(&self, pos: GridPosition) -> Rect {
        self.metrics().cell_rect(self.viewport.origin, pos)
    }

    // --- tile lifecycle -------------------------------------------------

    /// Add a tile at `at`, or the next free cell when `at` is missing,
    /// outside the grid or taken. Returns the new tile id.
    pub fn add_tile(&mut self, payload: TilePayload, at: Option<GridPosition>) -> String {
        let cols = self.cols();
        let occupancy = self.occupancy();
        let position = at
            .filter(|p| p.x < cols && occupancy.is_free(*p))
            .unwrap_or_else(|| occupancy.next_free(cols));
        let id = generate_tile_id(|c| self.tiles.iter().any(|t| t.id == c));
        let tile = Tile::new(id.clone(), position, payload);
        let widget = self.factory.create(&tile, &self.widget_services);
        tracing::info!(tile = %id, kind = tile.kind().as_str(), %position, "tile added");
        self.widgets.insert(id.clone(), widget);
        self.tiles.push(tile);
        self.events.push(WorkspaceEvent::TileAdded {
            id: id.clone(),
            position,
        });
        self.refresh_drop_zones();
        self.persist();
        id
    }

    pub fn remove_tile(&mut self, id: &str) -> bool {
        let Some(index) = self.tiles.iter().position(|t| t.id == id) else {
            return false;
        };
        let tile = self.tiles.remove(index);
        if let Some(mut widget) = self.widgets.remove(id) {
            widget.destroy();
        }
        tracing::info!(tile = %id, position = %tile.position, "tile removed");
        self.events
            .push(WorkspaceEvent::TileRemoved { id: id.to_string() });
        self.refresh_drop_zones();
        self.persist();
        true
    }

    /// Move a tile to `to`. Rejected when `to` is outside the grid or held by
    /// another tile. Returns whether the tile moved.
    pub fn move_tile(&mut self, id: &str, to: GridPosition) -> bool {
        let cols = self.cols();
        let occupancy = self.occupancy_without(id);
        let Some(tile) = self.tiles.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        let from = tile.position;
        if from == to {
            return false;
        }
        if to.x >= cols || !occupancy.is_free(to) {
            tracing::debug!(tile = %id, %to, "move rejected; cell unavailable");
            return false;
        }
        tile.position = to;
        tracing::info!(tile = %id, %from, %to, "tile moved");
        self.events.push(WorkspaceEvent::TileMoved {
            id: id.to_string(),
            from,
            to,
        });
        self.refresh_drop_zones();
        self.persist();
        true
    }

    /// Replace a tile's data from outside its widget. The widget is
    /// re-synchronized. A payload of another kind is rejected.
    pub fn update_tile_data(&mut self, id: &str, payload: TilePayload) -> bool {
        if !self.store_payload(id, payload.clone()) {
            return false;
        }
        if let Some(widget) = self.widgets.get_mut(id) {
            widget.update_data(&payload);
        }
        self.persist();
        true
    }

    /// Tiles are always one cell; resizing is accepted and ignored.
    pub fn resize_tile(&mut self, id: &str, cols: u32, rows: u32) -> bool {
        let known = self.tile(id).is_some();
        if known {
            tracing::debug!(tile = %id, cols, rows, "resize ignored; tiles occupy one cell");
        }
        known
    }

    /// Apply data changes queued by widgets. Persists once if anything
    /// changed. Returns the number of applied updates.
    pub fn apply_widget_updates(&mut self) -> usize {
        let mut applied = 0;
        for (id, payload) in self.host.take_pending() {
            if self.store_payload(&id, payload) {
                applied += 1;
            }
        }
        if applied > 0 {
            self.persist();
        }
        applied
    }

    fn store_payload(&mut self, id: &str, payload: TilePayload) -> bool {
        let Some(tile) = self.tiles.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(tile = %id, "data update for unknown tile dropped");
            return false;
        };
        if tile.kind() != payload.kind() {
            tracing::warn!(
                tile = %id,
                expected = tile.kind().as_str(),
                got = payload.kind().as_str(),
                "data update of wrong kind rejected"
            );
            return false;
        }
        tile.payload = payload;
        true
    }

    fn persist(&self) {
        if let Err(err) = self.persistence.persist(&self.tiles) {
            tracing::warn!(error = %format!("{err:#}"), "persisting workspace failed");
        }
    }

    // --- edit mode ------------------------------------------------------

    pub fn edit_mode(&self) -> EditMode {
        self.edit.mode()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_editing()
    }

    /// Idempotent. Returns whether the mode changed.
    pub fn set_edit_mode(&mut self, mode: EditMode) -> bool {
        match self.edit.set(mode) {
            Some(transition) => {
                self.on_edit_transition(transition);
                true
            }
            None => false,
        }
    }

    pub fn toggle_edit_mode(&mut self) -> EditMode {
        let transition = self.edit.toggle();
        self.on_edit_transition(transition);
        self.edit.mode()
    }

    fn on_edit_transition(&mut self, transition: EditTransition) {
        let editing = transition == EditTransition::Entered;
        match transition {
            EditTransition::Entered => self.rebuild_drop_zones(None),
            EditTransition::Left => {
                self.drag.reset();
                self.drop_zones.hide();
                self.trash.hide();
            }
        }
        for widget in self.widgets.values_mut() {
            widget.on_edit_mode_changed(editing);
        }
        tracing::info!(editing, "edit mode changed");
        self.events.push(WorkspaceEvent::EditModeChanged { editing });
    }

    // --- viewport and overlays -------------------------------------------

    /// Position and size of the workspace area. The trash region is anchored
    /// to its bottom-right corner.
    pub fn set_viewport(&mut self, origin: Point, width: f32, height: f32) {
        let next = Viewport {
            origin,
            width,
            height,
        };
        if next == self.viewport {
            return;
        }
        let rows_before = self.metrics().rows_in(self.viewport.height);
        self.viewport = next;
        let margins = self.settings.interaction.trash;
        self.trash.set_region(Rect::new(
            origin.x + width - margins.x - margins.width,
            origin.y + height - margins.y - margins.height,
            margins.width,
            margins.height,
        ));
        if rows_before != self.metrics().rows_in(height) {
            self.refresh_drop_zones();
        }
    }

    fn bounds(&self) -> GridBounds {
        GridBounds {
            cols: self.cols(),
            rows: self.visible_rows(),
            extra_rows: self.settings.grid.extra_rows,
        }
    }

    fn rebuild_drop_zones(&mut self, exclude: Option<&str>) {
        let occupancy = match exclude {
            Some(id) => self.occupancy_without(id),
            None => self.occupancy(),
        };
        let bounds = self.bounds();
        self.drop_zones
            .rebuild(&occupancy, bounds.cols, bounds.rows + bounds.extra_rows);
    }

    /// Rebuild visible drop zones after occupancy or viewport changes.
    fn refresh_drop_zones(&mut self) {
        if !self.drop_zones.is_visible() {
            return;
        }
        let source = self.drag.session().map(|s| s.source_tile_id.clone());
        match source {
            Some(id) if self.drag.is_dragging() => self.rebuild_drop_zones(Some(&id)),
            _ => self.rebuild_drop_zones(None),
        }
    }

    pub fn drop_zones(&self) -> &DropZoneSet {
        &self.drop_zones
    }

    pub fn trash(&self) -> &TrashTarget {
        &self.trash
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Id of the tile currently lifted by a drag.
    pub fn lifted_tile(&self) -> Option<&str> {
        self.drag
            .session()
            .filter(|_| self.drag.is_dragging())
            .map(|s| s.source_tile_id.as_str())
    }

    pub fn interaction_state(&self) -> InteractionSnapshot {
        InteractionSnapshot {
            mode: self.edit.mode(),
            drag_phase: self.drag.phase(),
            drop_zones: self.drop_zones.positions(),
            drop_zones_visible: self.drop_zones.is_visible(),
            highlighted_zone: self.drop_zones.highlighted(),
            trash_visible: self.trash.is_visible(),
            trash_highlighted: self.trash.is_highlighted(),
        }
    }

    // --- input ----------------------------------------------------------

    /// What lies under `pointer`. Tiles win over drop zones; the trash wins
    /// over everything while visible.
    pub fn hit_test(&self, pointer: Point) -> HitTarget {
        if self.trash.contains(pointer) {
            return HitTarget::Trash;
        }
        let metrics = self.metrics();
        if let Some(tile) = self
            .tiles
            .iter()
            .find(|t| metrics.cell_rect(self.viewport.origin, t.position).contains(pointer))
        {
            return HitTarget::Tile {
                id: tile.id.clone(),
                position: tile.position,
                control: None,
            };
        }
        if self.drop_zones.is_visible() {
            let hit = self
                .drop_zones
                .zones()
                .iter()
                .find(|z| metrics.cell_rect(self.viewport.origin, z.position).contains(pointer));
            if let Some(zone) = hit {
                return HitTarget::DropZone(zone.position);
            }
        }
        HitTarget::Background
    }

    fn resolver(&self) -> DropResolver {
        DropResolver {
            trash: self.trash.region(),
            origin: self.viewport.origin,
            metrics: self.metrics(),
            bounds: self.bounds(),
            occupancy: self.occupancy(),
        }
    }

    /// Feed one raw input event. `target` is what the pointer was over when
    /// the event happened (see [`Workspace::hit_test`]).
    pub fn handle_input(&mut self, raw: &RawInput, target: &HitTarget, at_ms: u64) -> InputResponse {
        let was_dragging = self.drag.is_dragging();
        let Some(event) = InputAdapter::normalize(raw) else {
            let outcome = match raw {
                RawInput::Escape => self.drag.cancel(at_ms),
                _ => DragOutcome::Ignored,
            };
            self.apply_outcome(&outcome);
            return InputResponse {
                outcome,
                default_action: DefaultAction::Allow,
            };
        };
        let resolver = self.resolver();
        let editing = self.edit.is_editing();
        let outcome = self
            .drag
            .handle(event, target, editing, at_ms, |p, s| resolver.resolve(p, s));
        self.apply_outcome(&outcome);
        let dragging = was_dragging || self.drag.is_dragging();
        InputResponse {
            default_action: event.adapter.suppression(event.phase, dragging),
            outcome,
        }
    }

    fn apply_outcome(&mut self, outcome: &DragOutcome) {
        match outcome {
            DragOutcome::Ignored | DragOutcome::Armed { .. } => {}
            DragOutcome::Lifted { tile_id, target } => {
                self.rebuild_drop_zones(Some(tile_id));
                self.trash.show();
                self.show_target(*target);
            }
            DragOutcome::Hovering { target, .. } => self.show_target(*target),
            DragOutcome::Committed(commit) => {
                self.end_drag_feedback();
                match commit {
                    DragCommit::Remove { tile_id } => {
                        self.remove_tile(tile_id);
                    }
                    DragCommit::Move { tile_id, to } => {
                        self.move_tile(tile_id, *to);
                    }
                    DragCommit::Unchanged { .. } => {}
                }
            }
            DragOutcome::Tapped { tile_id } => self.deliver_tap(tile_id),
            DragOutcome::Cancelled { .. } => self.end_drag_feedback(),
        }
    }

    /// Exactly one of trash and drop zones is highlighted, or neither.
    fn show_target(&mut self, target: DropTarget) {
        match target {
            DropTarget::Trash => {
                self.drop_zones.clear_highlight();
                self.trash.set_highlighted(true);
            }
            DropTarget::Cell(pos) => {
                self.trash.set_highlighted(false);
                self.drop_zones.highlight(Some(pos));
            }
            DropTarget::Nowhere => {
                self.trash.set_highlighted(false);
                self.drop_zones.clear_highlight();
            }
        }
    }

    fn end_drag_feedback(&mut self) {
        self.trash.hide();
        if self.edit.is_editing() {
            self.rebuild_drop_zones(None);
        } else {
            self.drop_zones.hide();
        }
    }

    /// A click on a tile body outside a drag. In edit mode taps arrive
    /// through [`Workspace::handle_input`] instead.
    pub fn tap_tile(&mut self, id: &str, at_ms: u64) -> bool {
        if self.edit.is_editing() || self.drag.should_suppress_click(at_ms) {
            return false;
        }
        if self.tile(id).is_none() {
            return false;
        }
        self.deliver_tap(id);
        true
    }

    fn deliver_tap(&mut self, id: &str) {
        if let Some(widget) = self.widgets.get_mut(id) {
            widget.on_tap();
            self.events
                .push(WorkspaceEvent::TileTapped { id: id.to_string() });
        }
    }

    /// Click on an empty drop zone. Emits an add request unless the click is
    /// the tail of a drag.
    pub fn click_empty_cell(&mut self, pos: GridPosition, at_ms: u64) -> bool {
        if self.drag.should_suppress_click(at_ms) || !self.drop_zones.contains(pos) {
            return false;
        }
        tracing::debug!(%pos, "add tile requested");
        self.events
            .push(WorkspaceEvent::AddTileRequested { position: pos });
        true
    }

    // --- lifecycle ------------------------------------------------------

    /// Drive the shared clock and apply the widget updates it caused.
    pub fn tick(&mut self) -> Option<TickReport> {
        let report = self.shared.clock.poll();
        self.apply_widget_updates();
        report
    }

    pub fn take_events(&mut self) -> Vec<WorkspaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn destroy_widgets(&mut self) {
        for (_, mut widget) in self.widgets.drain() {
            widget.destroy();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.destroy_widgets();
    }
}
