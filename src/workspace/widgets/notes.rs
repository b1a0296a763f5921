use super::{Widget, WidgetServices};
use crate::workspace::tile::{NotesPayload, TilePayload};
use eframe::egui;

pub struct NotesWidget {
    tile_id: String,
    data: NotesPayload,
    services: WidgetServices,
}

impl NotesWidget {
    pub fn new(tile_id: String, data: NotesPayload, services: WidgetServices) -> Self {
        Self {
            tile_id,
            data,
            services,
        }
    }

    pub fn text(&self) -> &str {
        &self.data.text
    }

    /// Replace the note text. Returns whether anything changed.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.data.text {
            return false;
        }
        self.data.text = text;
        self.services
            .host
            .persist(&self.tile_id, TilePayload::Notes(self.data.clone()));
        true
    }
}

impl Widget for NotesWidget {
    fn update_data(&mut self, payload: &TilePayload) {
        if let TilePayload::Notes(p) = payload {
            self.data = p.clone();
        }
    }

    fn destroy(&mut self) {}

    fn ui(&mut self, ui: &mut egui::Ui) {
        let mut text = self.data.text.clone();
        // Text input stays live in edit mode but is read-only.
        let editing = self.services.host.is_edit_mode();
        let response = ui.add_sized(
            ui.available_size(),
            egui::TextEdit::multiline(&mut text).interactive(!editing),
        );
        if response.changed() {
            self.set_text(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::services;
    use super::*;

    #[test]
    fn persists_only_real_changes() {
        let (services, host, _) = services();
        let mut notes = NotesWidget::new("n".into(), NotesPayload::default(), services);
        assert!(notes.set_text("milk"));
        assert!(!notes.set_text("milk"));
        let pending = host.take_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0],
            (
                "n".to_string(),
                TilePayload::Notes(NotesPayload {
                    text: "milk".into()
                })
            )
        );
    }

    #[test]
    fn update_data_replaces_text() {
        let (services, host, _) = services();
        let mut notes = NotesWidget::new("n".into(), NotesPayload::default(), services);
        notes.update_data(&TilePayload::Notes(NotesPayload { text: "x".into() }));
        assert_eq!(notes.text(), "x");
        assert!(host.take_pending().is_empty());
    }
}
