use super::{Widget, WidgetServices};
use crate::clock::ClockSubscriber;
use crate::mark_sync::{Mark, MarkTarget};
use crate::time::ClockZone;
use crate::workspace::tile::{ClockPayload, TilePayload};
use chrono::{DateTime, Utc};
use eframe::egui;
use std::sync::{Arc, Mutex};

const DISPLAY_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Default)]
struct ClockInner {
    zone: ClockZone,
    marks: Vec<Mark>,
    display: String,
    scroll_offset: f32,
    /// Offset pushed by another clock, applied on the next frame.
    pending_scroll: Option<f32>,
    ticks: u64,
}

/// Shared state of a clock tile. Registered with both the shared clock and
/// the mark bus, so it is the identity both use.
pub struct ClockState {
    tile_id: String,
    services: WidgetServices,
    inner: Mutex<ClockInner>,
}

impl ClockState {
    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, ClockInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("clock {} state poisoned", self.tile_id))
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.lock().map(|i| i.marks.clone()).unwrap_or_default()
    }

    pub fn display(&self) -> String {
        self.lock().map(|i| i.display.clone()).unwrap_or_default()
    }

    pub fn ticks(&self) -> u64 {
        self.lock().map(|i| i.ticks).unwrap_or(0)
    }

    pub fn scroll_offset(&self) -> f32 {
        self.lock().map(|i| i.scroll_offset).unwrap_or(0.0)
    }

    fn payload(inner: &ClockInner) -> TilePayload {
        TilePayload::Clock(ClockPayload {
            zone: inner.zone,
            marks: inner.marks.clone(),
        })
    }

    fn store(&self, inner: &ClockInner) {
        self.services.host.persist(&self.tile_id, Self::payload(inner));
    }
}

impl ClockSubscriber for ClockState {
    fn on_tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.display = inner.zone.format(now, DISPLAY_FORMAT);
        inner.ticks += 1;
        Ok(())
    }
}

impl MarkTarget for ClockState {
    fn timezone(&self) -> ClockZone {
        self.lock().map(|i| i.zone).unwrap_or_default()
    }

    fn add_mark(&self, mark: Mark) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.marks.push(mark);
        self.store(&inner);
        Ok(())
    }

    fn remove_mark(&self, index: usize) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        anyhow::ensure!(
            index < inner.marks.len(),
            "clock {} has no mark {index}",
            self.tile_id
        );
        inner.marks.remove(index);
        self.store(&inner);
        Ok(())
    }

    fn clear_marks(&self) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.marks.clear();
        self.store(&inner);
        Ok(())
    }

    fn scroll_to(&self, offset: f32) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.scroll_offset = offset;
        inner.pending_scroll = Some(offset);
        Ok(())
    }
}

/// Clock tile: shows the time in its zone and records marks shared with all
/// other clocks.
pub struct ClockWidget {
    state: Arc<ClockState>,
    subscribed: bool,
}

impl ClockWidget {
    pub fn new(tile_id: String, payload: ClockPayload, services: WidgetServices) -> Self {
        let now = services.time.now();
        let state = Arc::new(ClockState {
            tile_id,
            services: services.clone(),
            inner: Mutex::new(ClockInner {
                display: payload.zone.format(now, DISPLAY_FORMAT),
                zone: payload.zone,
                marks: payload.marks,
                ..Default::default()
            }),
        });
        services.clock.subscribe(state.clone());
        services.sync.register(state.clone());
        Self {
            state,
            subscribed: true,
        }
    }

    pub fn state(&self) -> &Arc<ClockState> {
        &self.state
    }

    /// Mark the current instant on every clock. Ignored in edit mode.
    pub fn mark_now(&self) -> bool {
        if self.state.services.host.is_edit_mode() {
            return false;
        }
        self.state.services.sync.broadcast_mark();
        true
    }
}

impl Widget for ClockWidget {
    fn update_data(&mut self, payload: &TilePayload) {
        let TilePayload::Clock(p) = payload else {
            tracing::warn!(tile = %self.state.tile_id, "clock received foreign payload");
            return;
        };
        let now = self.state.services.time.now();
        if let Ok(mut inner) = self.state.lock() {
            inner.zone = p.zone;
            inner.marks = p.marks.clone();
            inner.display = p.zone.format(now, DISPLAY_FORMAT);
        }
    }

    fn destroy(&mut self) {
        if !self.subscribed {
            return;
        }
        self.subscribed = false;
        let services = &self.state.services;
        let as_sub: Arc<dyn ClockSubscriber> = self.state.clone();
        let as_target: Arc<dyn MarkTarget> = self.state.clone();
        services.clock.unsubscribe(&as_sub);
        services.sync.unregister(&as_target);
    }

    fn on_tap(&mut self) {
        self.mark_now();
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let editing = self.state.services.host.is_edit_mode();
        let (display, zone, marks, pending) = match self.state.lock() {
            Ok(mut inner) => (
                inner.display.clone(),
                inner.zone,
                inner.marks.clone(),
                inner.pending_scroll.take(),
            ),
            Err(_) => return,
        };
        ui.horizontal(|ui| {
            ui.heading(display);
            ui.label(zone.label());
        });
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!editing, egui::Button::new("Mark"))
                .clicked()
            {
                self.mark_now();
            }
            if ui
                .add_enabled(!editing && !marks.is_empty(), egui::Button::new("Clear"))
                .clicked()
            {
                self.state.services.sync.broadcast_clear_marks();
            }
        });
        let mut area = egui::ScrollArea::vertical()
            .id_source(("clock-marks", self.state.tile_id.as_str()))
            .max_height(ui.available_height());
        if let Some(offset) = pending {
            area = area.vertical_scroll_offset(offset);
        }
        let mut remove = None;
        let output = area.show(ui, |ui| {
            for (i, mark) in marks.iter().enumerate() {
                ui.horizontal(|ui| {
                    ui.label(&mark.display_time);
                    if ui.add_enabled(!editing, egui::Button::new("x")).clicked() {
                        remove = Some(i);
                    }
                });
            }
        });
        if let Some(i) = remove {
            self.state.services.sync.broadcast_remove_mark(i);
        }
        let offset = output.state.offset.y;
        let moved = match self.state.lock() {
            Ok(mut inner) if (inner.scroll_offset - offset).abs() > f32::EPSILON => {
                inner.scroll_offset = offset;
                pending.is_none()
            }
            _ => false,
        };
        if moved {
            self.state
                .services
                .sync
                .broadcast_scroll(&*self.state, offset);
        }
    }
}
