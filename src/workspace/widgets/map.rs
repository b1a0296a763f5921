use super::{Widget, WidgetServices};
use crate::workspace::tile::{MapPayload, TilePayload};
use eframe::egui;

const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 19;

/// Map tile. Panning and zooming are switched off while the workspace is in
/// edit mode so a drag moves the tile instead of the map.
pub struct MapWidget {
    tile_id: String,
    data: MapPayload,
    services: WidgetServices,
    interactive: bool,
}

impl MapWidget {
    pub fn new(tile_id: String, data: MapPayload, services: WidgetServices) -> Self {
        let interactive = !services.host.is_edit_mode();
        Self {
            tile_id,
            data,
            services,
            interactive,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn center(&self) -> (f64, f64) {
        (self.data.lat, self.data.lon)
    }

    pub fn zoom(&self) -> u8 {
        self.data.zoom
    }

    /// Move the map centre by a delta in screen pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if !self.interactive || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        let degrees_per_px = 360.0 / (256.0 * 2f64.powi(self.data.zoom as i32));
        self.data.lon = wrap_lon(self.data.lon - dx as f64 * degrees_per_px);
        self.data.lat = (self.data.lat + dy as f64 * degrees_per_px).clamp(-85.0, 85.0);
        self.store();
        true
    }

    pub fn zoom_by(&mut self, steps: i32) -> bool {
        if !self.interactive {
            return false;
        }
        let zoom = (self.data.zoom as i32 + steps).clamp(MIN_ZOOM as i32, MAX_ZOOM as i32) as u8;
        if zoom == self.data.zoom {
            return false;
        }
        self.data.zoom = zoom;
        self.store();
        true
    }

    fn store(&self) {
        self.services
            .host
            .persist(&self.tile_id, TilePayload::Map(self.data.clone()));
    }
}

fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

impl Widget for MapWidget {
    fn update_data(&mut self, payload: &TilePayload) {
        if let TilePayload::Map(p) = payload {
            self.data = p.clone();
        }
    }

    fn destroy(&mut self) {
        self.interactive = false;
    }

    fn on_edit_mode_changed(&mut self, editing: bool) {
        self.interactive = !editing;
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        ui.label(format!(
            "{:.4}, {:.4}  z{}",
            self.data.lat, self.data.lon, self.data.zoom
        ));
        let sense = if self.interactive {
            egui::Sense::drag()
        } else {
            egui::Sense::hover()
        };
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), sense);
        ui.painter()
            .rect_filled(rect, 4.0, ui.visuals().extreme_bg_color);
        ui.painter().circle_filled(
            rect.center(),
            3.0,
            ui.visuals().selection.bg_fill,
        );
        if response.dragged() {
            let delta = response.drag_delta();
            self.pan(delta.x, delta.y);
        }
        if response.hovered() && self.interactive {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll > 0.0 {
                self.zoom_by(1);
            } else if scroll < 0.0 {
                self.zoom_by(-1);
            }
        }
    }
}
