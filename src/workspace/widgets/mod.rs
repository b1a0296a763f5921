use crate::clock::SharedClock;
use crate::mark_sync::SyncBus;
use crate::time::TimeSource;
use crate::workspace::tile::{Tile, TilePayload};
use eframe::egui;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

mod calendar;
mod clock;
mod id_generator;
mod map;
mod notes;

pub use calendar::CalendarWidget;
pub use clock::{ClockState, ClockWidget};
pub use id_generator::IdGeneratorWidget;
pub use map::MapWidget;
pub use notes::NotesWidget;

/// Collaborator handed to every widget at construction. Widgets never reach
/// the workspace any other way.
pub trait WidgetHost: Send + Sync {
    fn is_edit_mode(&self) -> bool;
    /// Ask the workspace to store new data for `tile_id`.
    fn persist(&self, tile_id: &str, payload: TilePayload);
}

/// Host backed by the workspace's shared edit flag and an update queue the
/// workspace drains on its own turn.
#[derive(Debug, Default)]
pub struct QueuedHost {
    edit_mode: Arc<AtomicBool>,
    pending: Mutex<Vec<(String, TilePayload)>>,
}

impl QueuedHost {
    pub fn new(edit_mode: Arc<AtomicBool>) -> Self {
        Self {
            edit_mode,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn take_pending(&self) -> Vec<(String, TilePayload)> {
        self.pending
            .lock()
            .map(|mut p| std::mem::take(&mut *p))
            .unwrap_or_default()
    }
}

impl WidgetHost for QueuedHost {
    fn is_edit_mode(&self) -> bool {
        self.edit_mode.load(Ordering::SeqCst)
    }

    fn persist(&self, tile_id: &str, payload: TilePayload) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push((tile_id.to_string(), payload)),
            Err(_) => tracing::error!(tile = %tile_id, "widget update queue poisoned"),
        }
    }
}

/// Services injected into widgets.
#[derive(Clone)]
pub struct WidgetServices {
    pub clock: Arc<SharedClock>,
    pub sync: Arc<SyncBus>,
    pub time: Arc<dyn TimeSource>,
    pub host: Arc<dyn WidgetHost>,
}

/// Contract implemented by every tile's content.
pub trait Widget: Send {
    /// Re-synchronize with data changed outside the widget.
    fn update_data(&mut self, payload: &TilePayload);

    /// Release clock and bus subscriptions. Calling it again is a no-op.
    fn destroy(&mut self);

    /// Workspace-wide edit mode notification.
    fn on_edit_mode_changed(&mut self, _editing: bool) {}

    /// A plain tap on the tile body.
    fn on_tap(&mut self) {}

    fn ui(&mut self, ui: &mut egui::Ui);
}

/// Builds the widget for a tile.
pub trait WidgetFactory: Send {
    fn create(&self, tile: &Tile, services: &WidgetServices) -> Box<dyn Widget>;
}

/// Factory for the built-in tile kinds.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinWidgets;

impl WidgetFactory for BuiltinWidgets {
    fn create(&self, tile: &Tile, services: &WidgetServices) -> Box<dyn Widget> {
        let id = tile.id.clone();
        match &tile.payload {
            TilePayload::Clock(p) => Box::new(ClockWidget::new(id, p.clone(), services.clone())),
            TilePayload::Calendar(p) => {
                Box::new(CalendarWidget::new(id, p.clone(), services.clone()))
            }
            TilePayload::Notes(p) => Box::new(NotesWidget::new(id, p.clone(), services.clone())),
            TilePayload::Map(p) => Box::new(MapWidget::new(id, p.clone(), services.clone())),
            TilePayload::IdGenerator(p) => {
                Box::new(IdGeneratorWidget::new(id, p.clone(), services.clone()))
            }
        }
    }
}
