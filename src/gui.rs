use crate::workspace::drag::{HitTarget, InteractiveControl};
use crate::workspace::grid::{GridPosition, Point, Rect};
use crate::workspace::input::{
    MouseButton, MouseInput, MousePhase, RawInput, TouchInput, TouchPhase, TouchPoint,
};
use crate::workspace::tile::TileKind;
use crate::workspace::{EditMode, Workspace, WorkspaceEvent};
use eframe::egui;
use std::time::Instant;

const DELETE_BUTTON_SIZE: f32 = 20.0;

fn to_point(pos: egui::Pos2) -> Point {
    Point::new(pos.x, pos.y)
}

fn to_rect(rect: Rect) -> egui::Rect {
    egui::Rect::from_min_size(
        egui::pos2(rect.x, rect.y),
        egui::vec2(rect.width, rect.height),
    )
}

fn delete_button_rect(cell: egui::Rect) -> egui::Rect {
    egui::Rect::from_min_size(
        cell.right_top() + egui::vec2(-DELETE_BUTTON_SIZE - 4.0, 4.0),
        egui::vec2(DELETE_BUTTON_SIZE, DELETE_BUTTON_SIZE),
    )
}

fn kind_label(kind: TileKind) -> &'static str {
    match kind {
        TileKind::Clock => "Clock",
        TileKind::Calendar => "Calendar",
        TileKind::Notes => "Notes",
        TileKind::Map => "Map",
        TileKind::IdGenerator => "ID generator",
    }
}

/// Translate an egui event into workspace input. Keyboard events other than
/// Escape are left to egui.
fn raw_input(event: &egui::Event) -> Option<RawInput> {
    match event {
        egui::Event::PointerButton {
            pos,
            button,
            pressed,
            ..
        } => Some(RawInput::Mouse(MouseInput {
            phase: if *pressed {
                MousePhase::Down
            } else {
                MousePhase::Up
            },
            position: to_point(*pos),
            button: match button {
                egui::PointerButton::Primary => MouseButton::Primary,
                egui::PointerButton::Middle => MouseButton::Middle,
                _ => MouseButton::Secondary,
            },
        })),
        egui::Event::PointerMoved(pos) => Some(RawInput::Mouse(MouseInput {
            phase: MousePhase::Move,
            position: to_point(*pos),
            button: MouseButton::Primary,
        })),
        egui::Event::Touch { id, phase, pos, .. } => Some(RawInput::Touch(TouchInput {
            phase: match phase {
                egui::TouchPhase::Start => TouchPhase::Start,
                egui::TouchPhase::Move => TouchPhase::Move,
                egui::TouchPhase::End => TouchPhase::End,
                egui::TouchPhase::Cancel => TouchPhase::Cancel,
            },
            touches: vec![TouchPoint {
                id: id.0,
                position: to_point(*pos),
            }],
        })),
        egui::Event::Key {
            key: egui::Key::Escape,
            pressed: true,
            ..
        } => Some(RawInput::Escape),
        _ => None,
    }
}

/// Desktop host for a [`Workspace`].
pub struct TileDeskApp {
    workspace: Workspace,
    started: Instant,
    add_at: Option<GridPosition>,
}

impl TileDeskApp {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            started: Instant::now(),
            add_at: None,
        }
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn hit_target(&self, raw: &RawInput) -> HitTarget {
        let position = match raw {
            RawInput::Mouse(m) => Some(m.position),
            RawInput::Touch(t) => t.touches.first().map(|t| t.position),
            RawInput::DragDrop(d) => d.position,
            RawInput::Escape => None,
        };
        let Some(p) = position else {
            return HitTarget::Background;
        };
        let target = self.workspace.hit_test(p);
        if let HitTarget::Tile { position, .. } = &target {
            let cell = to_rect(self.workspace.cell_rect(*position));
            if self.workspace.is_editing()
                && delete_button_rect(cell).contains(egui::pos2(p.x, p.y))
            {
                return target.with_control(Some(InteractiveControl::Button));
            }
        }
        target
    }

    fn process_input(&mut self, ctx: &egui::Context) {
        let events = ctx.input(|i| i.events.clone());
        for event in &events {
            let Some(raw) = raw_input(event) else {
                continue;
            };
            let target = self.hit_target(&raw);
            let at = self.now_ms();
            let response = self.workspace.handle_input(&raw, &target, at);
            tracing::trace!(?response, "input handled");
        }
    }

    fn handle_events(&mut self) {
        for event in self.workspace.take_events() {
            match event {
                WorkspaceEvent::AddTileRequested { position } => self.add_at = Some(position),
                WorkspaceEvent::EditModeChanged { editing: false } => self.add_at = None,
                other => tracing::trace!(?other, "workspace event"),
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let editing = self.workspace.is_editing();
            let label = if editing { "Done" } else { "Edit" };
            if ui.button(label).clicked() {
                self.workspace.toggle_edit_mode();
            }
            if editing {
                ui.label("Drag tiles to rearrange. Click an empty cell to add a tile.");
            }
        });
    }

    fn grid(&mut self, ui: &mut egui::Ui) {
        let area = ui.available_rect_before_wrap();
        self.workspace
            .set_viewport(to_point(area.min), area.width(), area.height());
        let editing = self.workspace.is_editing();
        let painter = ui.painter().clone();
        let visuals = ui.visuals().clone();

        for zone in self.workspace.drop_zones().zones().to_vec() {
            let rect = to_rect(self.workspace.cell_rect(zone.position));
            let fill = if zone.highlighted {
                visuals.selection.bg_fill.gamma_multiply(0.4)
            } else {
                egui::Color32::TRANSPARENT
            };
            painter.rect(
                rect,
                6.0,
                fill,
                egui::Stroke::new(1.0, visuals.widgets.noninteractive.bg_stroke.color),
            );
            let id = ui.id().with(("zone", zone.position.x, zone.position.y));
            if ui.interact(rect, id, egui::Sense::click()).clicked() {
                let at = self.now_ms();
                self.workspace.click_empty_cell(zone.position, at);
            }
        }

        let lifted = self.workspace.lifted_tile().map(str::to_string);
        let offset = self
            .workspace
            .drag()
            .session()
            .filter(|_| lifted.is_some())
            .map(|s| {
                egui::vec2(
                    s.last_pointer.x - s.pointer_origin.x,
                    s.last_pointer.y - s.pointer_origin.y,
                )
            })
            .unwrap_or(egui::Vec2::ZERO);

        let tiles: Vec<_> = self
            .workspace
            .tiles()
            .iter()
            .map(|t| (t.id.clone(), t.position, t.kind()))
            .collect();
        let mut remove = None;
        let mut tapped = None;
        for (id, position, kind) in tiles {
            let mut rect = to_rect(self.workspace.cell_rect(position));
            let is_lifted = lifted.as_deref() == Some(id.as_str());
            if is_lifted {
                rect = rect.translate(offset);
            }
            let body = ui.interact(rect, ui.id().with(("tile", &id)), egui::Sense::click());
            if body.clicked() && !editing {
                tapped = Some(id.clone());
            }
            let stroke = if is_lifted {
                visuals.selection.stroke
            } else {
                visuals.widgets.noninteractive.bg_stroke
            };
            painter.rect(rect, 6.0, visuals.panel_fill, stroke);

            let mut child = ui.child_ui(rect.shrink(8.0), egui::Layout::top_down(egui::Align::Min));
            child.set_clip_rect(rect);
            child.label(egui::RichText::new(kind_label(kind)).small().weak());
            if editing {
                child.set_enabled(false);
            }
            if let Some(widget) = self.workspace.widget_mut(&id) {
                widget.ui(&mut child);
            }

            if editing && !is_lifted {
                let del = delete_button_rect(rect);
                if ui.put(del, egui::Button::new("×").small()).clicked() {
                    remove = Some(id.clone());
                }
            }
        }
        if let Some(id) = tapped {
            let at = self.now_ms();
            self.workspace.tap_tile(&id, at);
        }
        if let Some(id) = remove {
            self.workspace.remove_tile(&id);
        }

        let trash = self.workspace.trash();
        if trash.is_visible() {
            let rect = to_rect(trash.region());
            let fill = if trash.is_highlighted() {
                visuals.error_fg_color.gamma_multiply(0.5)
            } else {
                visuals.faint_bg_color
            };
            painter.rect(rect, 8.0, fill, egui::Stroke::new(1.5, visuals.error_fg_color));
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Remove",
                egui::FontId::proportional(14.0),
                visuals.text_color(),
            );
        }
    }

    fn add_tile_window(&mut self, ctx: &egui::Context) {
        let Some(position) = self.add_at else {
            return;
        };
        let mut open = true;
        let mut chosen = None;
        egui::Window::new("Add tile")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!("Cell {position}"));
                for kind in TileKind::ALL {
                    if ui.button(kind_label(kind)).clicked() {
                        chosen = Some(kind);
                    }
                }
            });
        if let Some(kind) = chosen {
            self.workspace
                .add_tile(kind.default_payload(), Some(position));
            open = false;
        }
        if !open {
            self.add_at = None;
        }
    }
}

impl eframe::App for TileDeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.workspace.tick();
        if self.add_at.is_none() {
            self.process_input(ctx);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.grid(ui));
        self.add_tile_window(ctx);

        self.workspace.apply_widget_updates();
        self.handle_events();

        if self.workspace.drag().is_dragging() {
            ctx.request_repaint();
        } else if let Some(wait) = self.workspace.shared().clock.time_until_next_tick() {
            ctx.request_repaint_after(wait);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.workspace.set_edit_mode(EditMode::Normal);
        tracing::info!(tiles = self.workspace.tiles().len(), "tile desk closing");
    }
}
