use super::{Widget, WidgetServices};
use crate::clock::ClockSubscriber;
use crate::workspace::tile::{CalendarPayload, TilePayload};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc, Weekday};
use eframe::egui;
use std::sync::{Arc, Mutex};

/// Tracks today's date so the month view rolls over at midnight.
struct Today {
    date: Mutex<NaiveDate>,
}

impl ClockSubscriber for Today {
    fn on_tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let today = now.with_timezone(&Local).date_naive();
        let mut date = self
            .date
            .lock()
            .map_err(|_| anyhow::anyhow!("calendar date poisoned"))?;
        *date = today;
        Ok(())
    }
}

pub struct CalendarWidget {
    tile_id: String,
    data: CalendarPayload,
    today: Arc<Today>,
    services: WidgetServices,
    subscribed: bool,
}

impl CalendarWidget {
    pub fn new(tile_id: String, data: CalendarPayload, services: WidgetServices) -> Self {
        let today = Arc::new(Today {
            date: Mutex::new(services.time.now().with_timezone(&Local).date_naive()),
        });
        services.clock.subscribe(today.clone());
        Self {
            tile_id,
            data,
            today,
            services,
            subscribed: true,
        }
    }

    pub fn selected(&self) -> Option<NaiveDate> {
        self.data.selected
    }

    pub fn today(&self) -> NaiveDate {
        self.today
            .date
            .lock()
            .map(|d| *d)
            .unwrap_or_else(|_| Local::now().date_naive())
    }

    /// Select `day`. Day cells are inert in edit mode so a drag is never read
    /// as a selection.
    pub fn click_day(&mut self, day: NaiveDate) -> bool {
        if self.services.host.is_edit_mode() {
            return false;
        }
        self.data.selected = if self.data.selected == Some(day) {
            None
        } else {
            Some(day)
        };
        self.services
            .host
            .persist(&self.tile_id, TilePayload::Calendar(self.data.clone()));
        true
    }

    fn month_days(&self, today: NaiveDate) -> Vec<Option<NaiveDate>> {
        let Some(first) = today.with_day(1) else {
            return Vec::new();
        };
        let start = if self.data.week_starts_monday {
            Weekday::Mon
        } else {
            Weekday::Sun
        };
        let lead = (7 + first.weekday().num_days_from_monday() as i64
            - start.num_days_from_monday() as i64)
            % 7;
        let mut cells: Vec<Option<NaiveDate>> = (0..lead).map(|_| None).collect();
        let mut day = first;
        while day.month() == first.month() {
            cells.push(Some(day));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        cells
    }
}

impl Widget for CalendarWidget {
    fn update_data(&mut self, payload: &TilePayload) {
        if let TilePayload::Calendar(p) = payload {
            self.data = p.clone();
        }
    }

    fn destroy(&mut self) {
        if !self.subscribed {
            return;
        }
        self.subscribed = false;
        let sub: Arc<dyn ClockSubscriber> = self.today.clone();
        self.services.clock.unsubscribe(&sub);
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let today = self.today();
        ui.label(today.format("%B %Y").to_string());
        let cells = self.month_days(today);
        let mut clicked = None;
        egui::Grid::new(("calendar", self.tile_id.as_str()))
            .num_columns(7)
            .show(ui, |ui| {
                for (i, cell) in cells.iter().enumerate() {
                    match cell {
                        Some(day) => {
                            let text = day.day().to_string();
                            let selected = self.data.selected == Some(*day);
                            let mut label = egui::RichText::new(text);
                            if *day == today {
                                label = label.strong();
                            }
                            if ui.selectable_label(selected, label).clicked() {
                                clicked = Some(*day);
                            }
                        }
                        None => {
                            ui.label("");
                        }
                    }
                    if i % 7 == 6 {
                        ui.end_row();
                    }
                }
            });
        if let Some(day) = clicked {
            self.click_day(day);
        }
    }
}
