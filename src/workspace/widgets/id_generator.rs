use super::{Widget, WidgetServices};
use crate::workspace::tile::{IdFormat, IdGeneratorPayload, TilePayload};
use eframe::egui;
use rand::Rng;

pub struct IdGeneratorWidget {
    tile_id: String,
    data: IdGeneratorPayload,
    services: WidgetServices,
}

impl IdGeneratorWidget {
    pub fn new(tile_id: String, data: IdGeneratorPayload, services: WidgetServices) -> Self {
        Self {
            tile_id,
            data,
            services,
        }
    }

    pub fn history(&self) -> &[String] {
        &self.data.generated
    }

    /// Generate a new id and push it to the front of the history.
    pub fn generate(&mut self) -> Option<String> {
        if self.services.host.is_edit_mode() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let id = match self.data.format {
            IdFormat::Hex64 => format!("{:016x}", rng.gen::<u64>()),
            IdFormat::Numeric => rng.gen_range(0..1_000_000_000u64).to_string(),
        };
        self.data.generated.insert(0, id.clone());
        self.data.generated.truncate(self.data.history.max(1));
        self.services
            .host
            .persist(&self.tile_id, TilePayload::IdGenerator(self.data.clone()));
        Some(id)
    }
}

impl Widget for IdGeneratorWidget {
    fn update_data(&mut self, payload: &TilePayload) {
        if let TilePayload::IdGenerator(p) = payload {
            self.data = p.clone();
        }
    }

    fn destroy(&mut self) {}

    fn on_tap(&mut self) {
        self.generate();
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let editing = self.services.host.is_edit_mode();
        if ui
            .add_enabled(!editing, egui::Button::new("Generate"))
            .clicked()
        {
            self.generate();
        }
        for id in &self.data.generated {
            if ui.add_enabled(!editing, egui::Label::new(id.as_str()).sense(egui::Sense::click()))
                .on_hover_text("Click to copy")
                .clicked()
            {
                ui.output_mut(|o| o.copied_text = id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::services;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn history_is_bounded_and_newest_first() {
        let (services, host, _) = services();
        let mut gen = IdGeneratorWidget::new(
            "g".into(),
            IdGeneratorPayload {
                history: 2,
                ..IdGeneratorPayload::default()
            },
            services,
        );
        let _ = gen.generate().unwrap();
        let _ = gen.generate().unwrap();
        let last = gen.generate().unwrap();
        assert_eq!(gen.history().len(), 2);
        assert_eq!(gen.history()[0], last);
        assert_eq!(last.len(), 16);
        assert_eq!(host.take_pending().len(), 3);
    }

    #[test]
    fn numeric_ids_and_edit_mode() {
        let (services, _, flag) = services();
        let mut gen = IdGeneratorWidget::new(
            "g".into(),
            IdGeneratorPayload {
                format: IdFormat::Numeric,
                ..IdGeneratorPayload::default()
            },
            services,
        );
        let id = gen.generate().unwrap();
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        flag.store(true, Ordering::SeqCst);
        assert!(gen.generate().is_none());
        assert_eq!(gen.history().len(), 1);
    }
}
