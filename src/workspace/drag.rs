use crate::workspace::grid::{GridPosition, Point};
use crate::workspace::input::{InputAdapter, PointerEvent, PointerPhase};

pub const DEFAULT_DRAG_THRESHOLD: f32 = 10.0;
pub const DEFAULT_CLICK_COOLDOWN_MS: u64 = 250;

/// Interactive element inside a tile. A press on one of these never arms a
/// drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveControl {
    Button,
    Input,
    Select,
    Link,
    CalendarDay,
}

/// What the pointer was over when a gesture started.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    Tile {
        id: String,
        position: GridPosition,
        control: Option<InteractiveControl>,
    },
    DropZone(GridPosition),
    Trash,
    Background,
}

impl HitTarget {
    pub fn with_control(self, control: Option<InteractiveControl>) -> Self {
        match self {
            HitTarget::Tile { id, position, .. } => HitTarget::Tile {
                id,
                position,
                control,
            },
            other => other,
        }
    }
}

/// Where a drag would land if released now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Trash,
    Cell(GridPosition),
    Nowhere,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub source_tile_id: String,
    pub source_position: GridPosition,
    pub adapter: InputAdapter,
    pub pointer_origin: Point,
    pub last_pointer: Point,
    pub distance_threshold_crossed: bool,
    pub current_candidate_cell: Option<GridPosition>,
    pub over_trash: bool,
}

impl DragSession {
    fn apply_target(&mut self, target: DropTarget) {
        self.over_trash = target == DropTarget::Trash;
        self.current_candidate_cell = match target {
            DropTarget::Cell(pos) => Some(pos),
            _ => None,
        };
    }

    fn target(&self) -> DropTarget {
        if self.over_trash {
            DropTarget::Trash
        } else if let Some(pos) = self.current_candidate_cell {
            DropTarget::Cell(pos)
        } else {
            DropTarget::Nowhere
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Armed,
    Dragging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragCommit {
    Remove { tile_id: String },
    Move { tile_id: String, to: GridPosition },
    Unchanged { tile_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// The event did not concern a drag.
    Ignored,
    Armed { tile_id: String },
    /// The threshold was crossed; the tile is lifted and hovering `target`.
    Lifted { tile_id: String, target: DropTarget },
    Hovering { tile_id: String, target: DropTarget },
    Committed(DragCommit),
    /// Released before the threshold; the press is a plain tap on the tile.
    Tapped { tile_id: String },
    Cancelled { tile_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    pub threshold: f32,
    pub click_cooldown_ms: u64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DRAG_THRESHOLD,
            click_cooldown_ms: DEFAULT_CLICK_COOLDOWN_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Armed(DragSession),
    Dragging(DragSession),
}

/// Shared drag state machine for every input modality:
/// idle -> armed -> dragging -> committed | cancelled -> idle.
#[derive(Debug)]
pub struct DragController {
    config: DragConfig,
    state: State,
    suppress_clicks_until_ms: Option<u64>,
}

impl DragController {
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            suppress_clicks_until_ms: None,
        }
    }

    pub fn config(&self) -> DragConfig {
        self.config
    }

    pub fn set_config(&mut self, config: DragConfig) {
        self.config = config;
    }

    pub fn phase(&self) -> DragPhase {
        match self.state {
            State::Idle => DragPhase::Idle,
            State::Armed(_) => DragPhase::Armed,
            State::Dragging(_) => DragPhase::Dragging,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, State::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            State::Idle => None,
            State::Armed(s) | State::Dragging(s) => Some(s),
        }
    }

    /// Feed one normalized event. `editing` gates arming; `resolve` maps a
    /// pointer to the drop target under it.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        target: &HitTarget,
        editing: bool,
        at_ms: u64,
        resolve: impl Fn(Point, &DragSession) -> DropTarget,
    ) -> DragOutcome {
        match event.phase {
            PointerPhase::Start => match event.position {
                Some(p) => self.press(target, event.adapter, p, editing),
                None => DragOutcome::Ignored,
            },
            PointerPhase::Move => match event.position {
                Some(p) => self.motion(event.adapter, p, resolve),
                None => DragOutcome::Ignored,
            },
            PointerPhase::End => self.release(event.adapter, event.position, at_ms, resolve),
            PointerPhase::Cancel => self.cancel_from(Some(event.adapter), at_ms),
        }
    }

    pub fn press(
        &mut self,
        target: &HitTarget,
        adapter: InputAdapter,
        pointer: Point,
        editing: bool,
    ) -> DragOutcome {
        if !matches!(self.state, State::Idle) || !editing {
            return DragOutcome::Ignored;
        }
        let HitTarget::Tile {
            id,
            position,
            control,
        } = target
        else {
            return DragOutcome::Ignored;
        };
        if control.is_some() {
            tracing::trace!(tile = %id, ?control, "press on interactive control; not arming");
            return DragOutcome::Ignored;
        }
        tracing::debug!(tile = %id, ?adapter, "drag armed");
        self.state = State::Armed(DragSession {
            source_tile_id: id.clone(),
            source_position: *position,
            adapter,
            pointer_origin: pointer,
            last_pointer: pointer,
            distance_threshold_crossed: false,
            current_candidate_cell: None,
            over_trash: false,
        });
        DragOutcome::Armed {
            tile_id: id.clone(),
        }
    }

    pub fn motion(
        &mut self,
        adapter: InputAdapter,
        pointer: Point,
        resolve: impl Fn(Point, &DragSession) -> DropTarget,
    ) -> DragOutcome {
        let threshold = self.config.threshold;
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => DragOutcome::Ignored,
            State::Armed(mut session) => {
                if session.adapter != adapter {
                    self.state = State::Armed(session);
                    return DragOutcome::Ignored;
                }
                session.last_pointer = pointer;
                let dx = pointer.x - session.pointer_origin.x;
                let dy = pointer.y - session.pointer_origin.y;
                if dx.abs() < threshold && dy.abs() < threshold {
                    self.state = State::Armed(session);
                    return DragOutcome::Ignored;
                }
                session.distance_threshold_crossed = true;
                let target = resolve(pointer, &session);
                session.apply_target(target);
                let tile_id = session.source_tile_id.clone();
                tracing::debug!(tile = %tile_id, ?adapter, "drag started");
                self.state = State::Dragging(session);
                DragOutcome::Lifted { tile_id, target }
            }
            State::Dragging(mut session) => {
                if session.adapter != adapter {
                    self.state = State::Dragging(session);
                    return DragOutcome::Ignored;
                }
                session.last_pointer = pointer;
                let target = resolve(pointer, &session);
                session.apply_target(target);
                let tile_id = session.source_tile_id.clone();
                self.state = State::Dragging(session);
                DragOutcome::Hovering { tile_id, target }
            }
        }
    }

    pub fn release(
        &mut self,
        adapter: InputAdapter,
        pointer: Option<Point>,
        at_ms: u64,
        resolve: impl Fn(Point, &DragSession) -> DropTarget,
    ) -> DragOutcome {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => DragOutcome::Ignored,
            State::Armed(session) => {
                if session.adapter != adapter {
                    self.state = State::Armed(session);
                    return DragOutcome::Ignored;
                }
                if self.should_suppress_click(at_ms) {
                    tracing::debug!(tile = %session.source_tile_id, "tap swallowed after drag");
                    return DragOutcome::Ignored;
                }
                DragOutcome::Tapped {
                    tile_id: session.source_tile_id,
                }
            }
            State::Dragging(mut session) => {
                if session.adapter != adapter {
                    self.state = State::Dragging(session);
                    return DragOutcome::Ignored;
                }
                if let Some(p) = pointer {
                    session.last_pointer = p;
                    let target = resolve(p, &session);
                    session.apply_target(target);
                }
                self.start_cooldown(at_ms);
                let tile_id = session.source_tile_id.clone();
                let commit = match session.target() {
                    DropTarget::Trash => DragCommit::Remove { tile_id },
                    DropTarget::Cell(to) if to != session.source_position => {
                        DragCommit::Move { tile_id, to }
                    }
                    DropTarget::Cell(_) | DropTarget::Nowhere => DragCommit::Unchanged { tile_id },
                };
                tracing::debug!(?commit, "drag committed");
                DragOutcome::Committed(commit)
            }
        }
    }

    /// Abort any gesture in flight. The tile stays where it was.
    pub fn cancel(&mut self, at_ms: u64) -> DragOutcome {
        self.cancel_from(None, at_ms)
    }

    fn cancel_from(&mut self, adapter: Option<InputAdapter>, at_ms: u64) -> DragOutcome {
        let belongs = |s: &DragSession| adapter.map_or(true, |a| a == s.adapter);
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => DragOutcome::Ignored,
            State::Armed(session) => {
                if !belongs(&session) {
                    self.state = State::Armed(session);
                    return DragOutcome::Ignored;
                }
                DragOutcome::Cancelled {
                    tile_id: session.source_tile_id,
                }
            }
            State::Dragging(session) => {
                if !belongs(&session) {
                    self.state = State::Dragging(session);
                    return DragOutcome::Ignored;
                }
                self.start_cooldown(at_ms);
                tracing::debug!(tile = %session.source_tile_id, "drag cancelled");
                DragOutcome::Cancelled {
                    tile_id: session.source_tile_id,
                }
            }
        }
    }

    /// Drop any session without emitting an outcome. Used when edit mode is
    /// left mid-gesture.
    pub fn reset(&mut self) {
        if let Some(session) = self.session() {
            tracing::debug!(tile = %session.source_tile_id, "drag session reset");
        }
        self.state = State::Idle;
    }

    /// Whether a click arriving at `at_ms` is the tail of a drag gesture.
    pub fn should_suppress_click(&self, at_ms: u64) -> bool {
        self.is_dragging()
            || self
                .suppress_clicks_until_ms
                .map_or(false, |until| at_ms < until)
    }

    fn start_cooldown(&mut self, at_ms: u64) {
        self.suppress_clicks_until_ms = Some(at_ms.saturating_add(self.config.click_cooldown_ms));
    }
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DragConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: &str, x: u32, y: u32) -> HitTarget {
        HitTarget::Tile {
            id: id.into(),
            position: GridPosition::new(x, y),
            control: None,
        }
    }

    fn to_cell(x: u32, y: u32) -> impl Fn(Point, &DragSession) -> DropTarget {
        move |_, _| DropTarget::Cell(GridPosition::new(x, y))
    }

    fn armed() -> DragController {
        let mut ctl = DragController::default();
        let out = ctl.press(&tile("a", 0, 0), InputAdapter::Pointer, Point::new(0.0, 0.0), true);
        assert_eq!(out, DragOutcome::Armed { tile_id: "a".into() });
        ctl
    }

    #[test]
    fn press_outside_edit_mode_is_ignored() {
        let mut ctl = DragController::default();
        let out = ctl.press(&tile("a", 0, 0), InputAdapter::Pointer, Point::default(), false);
        assert_eq!(out, DragOutcome::Ignored);
        assert_eq!(ctl.phase(), DragPhase::Idle);
    }

    #[test]
    fn press_on_control_never_arms() {
        let mut ctl = DragController::default();
        let target = tile("a", 0, 0).with_control(Some(InteractiveControl::CalendarDay));
        let out = ctl.press(&target, InputAdapter::Touch, Point::default(), true);
        assert_eq!(out, DragOutcome::Ignored);
        assert_eq!(ctl.phase(), DragPhase::Idle);
        let bg = ctl.press(&HitTarget::Background, InputAdapter::Touch, Point::default(), true);
        assert_eq!(bg, DragOutcome::Ignored);
    }

    #[test]
    fn movement_below_threshold_stays_armed() {
        let mut ctl = armed();
        let out = ctl.motion(InputAdapter::Pointer, Point::new(9.9, -9.9), to_cell(1, 0));
        assert_eq!(out, DragOutcome::Ignored);
        assert_eq!(ctl.phase(), DragPhase::Armed);
    }

    #[test]
    fn movement_at_threshold_starts_drag() {
        let mut ctl = armed();
        let out = ctl.motion(InputAdapter::Pointer, Point::new(0.0, 10.0), to_cell(1, 0));
        assert_eq!(
            out,
            DragOutcome::Lifted {
                tile_id: "a".into(),
                target: DropTarget::Cell(GridPosition::new(1, 0)),
            }
        );
        assert!(ctl.session().unwrap().distance_threshold_crossed);
    }

    #[test]
    fn release_before_threshold_is_a_tap() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(3.0, 3.0), to_cell(1, 0));
        let out = ctl.release(InputAdapter::Pointer, Some(Point::new(3.0, 3.0)), 100, to_cell(1, 0));
        assert_eq!(out, DragOutcome::Tapped { tile_id: "a".into() });
        assert!(!ctl.should_suppress_click(100));
    }

    #[test]
    fn release_commits_move_and_starts_cooldown() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), to_cell(1, 0));
        let out = ctl.release(InputAdapter::Pointer, Some(Point::new(60.0, 0.0)), 1_000, to_cell(2, 0));
        assert_eq!(
            out,
            DragOutcome::Committed(DragCommit::Move {
                tile_id: "a".into(),
                to: GridPosition::new(2, 0),
            })
        );
        assert_eq!(ctl.phase(), DragPhase::Idle);
        assert!(ctl.should_suppress_click(1_100));
        assert!(!ctl.should_suppress_click(1_000 + DEFAULT_CLICK_COOLDOWN_MS));
    }

    #[test]
    fn release_over_trash_removes() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), |_, _| DropTarget::Trash);
        let out = ctl.release(InputAdapter::Pointer, None, 0, to_cell(3, 3));
        assert_eq!(
            out,
            DragOutcome::Committed(DragCommit::Remove { tile_id: "a".into() })
        );
    }

    #[test]
    fn release_nowhere_or_on_origin_is_unchanged() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), to_cell(1, 0));
        let out = ctl.release(InputAdapter::Pointer, Some(Point::new(-5.0, 0.0)), 0, |_, _| {
            DropTarget::Nowhere
        });
        assert_eq!(
            out,
            DragOutcome::Committed(DragCommit::Unchanged { tile_id: "a".into() })
        );

        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), to_cell(0, 0));
        let out = ctl.release(InputAdapter::Pointer, None, 0, to_cell(0, 0));
        assert_eq!(
            out,
            DragOutcome::Committed(DragCommit::Unchanged { tile_id: "a".into() })
        );
    }

    #[test]
    fn other_modality_cannot_hijack_session() {
        let mut ctl = armed();
        let out = ctl.motion(InputAdapter::Touch, Point::new(100.0, 0.0), to_cell(1, 0));
        assert_eq!(out, DragOutcome::Ignored);
        assert_eq!(ctl.phase(), DragPhase::Armed);
    }

    #[test]
    fn tap_inside_cooldown_is_swallowed() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), to_cell(1, 0));
        ctl.release(InputAdapter::Pointer, None, 1_000, to_cell(1, 0));

        let out = ctl.press(&tile("a", 1, 0), InputAdapter::Pointer, Point::new(0.0, 0.0), true);
        assert_eq!(out, DragOutcome::Armed { tile_id: "a".into() });
        let out = ctl.release(InputAdapter::Pointer, None, 1_010, to_cell(1, 0));
        assert_eq!(out, DragOutcome::Ignored);
        assert_eq!(ctl.phase(), DragPhase::Idle);

        ctl.press(&tile("a", 1, 0), InputAdapter::Pointer, Point::new(0.0, 0.0), true);
        let later = 1_000 + DEFAULT_CLICK_COOLDOWN_MS;
        let out = ctl.release(InputAdapter::Pointer, None, later, to_cell(1, 0));
        assert_eq!(out, DragOutcome::Tapped { tile_id: "a".into() });
    }

    #[test]
    fn reset_returns_to_idle_mid_drag() {
        let mut ctl = armed();
        ctl.motion(InputAdapter::Pointer, Point::new(50.0, 0.0), to_cell(1, 0));
        assert!(ctl.is_dragging());
        ctl.reset();
        assert_eq!(ctl.phase(), DragPhase::Idle);
        let out = ctl.release(InputAdapter::Pointer, None, 0, to_cell(1, 0));
        assert_eq!(out, DragOutcome::Ignored);
    }
}
