use chrono::{TimeZone, Utc};
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tile_desk::time::ManualTimeSource;
use tile_desk::workspace::drag::{DragCommit, DragOutcome, HitTarget};
use tile_desk::workspace::input::{
    DragDropInput, DragDropPhase, MouseButton, MouseInput, MousePhase, RawInput, TouchInput,
    TouchPhase, TouchPoint,
};
use tile_desk::workspace::tile::NotesPayload;
use tile_desk::workspace::{
    EditMode, GridPosition, MemoryPersistence, Point, SharedServices, Tile, TilePayload,
    Workspace, WorkspaceSettings,
};

fn notes(text: &str) -> TilePayload {
    TilePayload::Notes(NotesPayload { text: text.into() })
}

fn workspace(tiles: Vec<Tile>) -> (Workspace, Arc<MemoryPersistence>) {
    let time = Arc::new(ManualTimeSource::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryPersistence::default());
    let mut ws = Workspace::new(
        WorkspaceSettings::default(),
        SharedServices::new(time, 20),
        store.clone(),
    );
    ws.set_viewport(Point::new(0.0, 0.0), 1000.0, 800.0);
    ws.load_tiles(tiles);
    (ws, store)
}

fn center(ws: &Workspace, x: u32, y: u32) -> Point {
    let r = ws.cell_rect(GridPosition::new(x, y));
    Point::new(r.x + r.width / 2.0, r.y + r.height / 2.0)
}

fn mouse(phase: MousePhase, p: Point) -> RawInput {
    RawInput::Mouse(MouseInput {
        phase,
        position: p,
        button: MouseButton::Primary,
    })
}

fn native(phase: DragDropPhase, p: Option<Point>) -> RawInput {
    RawInput::DragDrop(DragDropInput { phase, position: p })
}

fn touch(phase: TouchPhase, p: Option<Point>) -> RawInput {
    RawInput::Touch(TouchInput {
        phase,
        touches: p
            .map(|position| vec![TouchPoint { id: 1, position }])
            .unwrap_or_default(),
    })
}

/// Press on `from`, move through `path`, release at the last point.
fn mouse_drag(ws: &mut Workspace, from: Point, path: &[Point]) -> DragOutcome {
    let hit = ws.hit_test(from);
    ws.handle_input(&mouse(MousePhase::Down, from), &hit, 0);
    let mut t = 0;
    for p in path {
        t += 16;
        ws.handle_input(&mouse(MousePhase::Move, *p), &HitTarget::Background, t);
    }
    let end = path.last().copied().unwrap_or(from);
    ws.handle_input(&mouse(MousePhase::Up, end), &HitTarget::Background, t + 16)
        .outcome
}

fn assert_no_overlap(ws: &Workspace) {
    assert_eq!(ws.occupancy().len(), ws.tiles().len(), "tiles overlap");
}

#[test]
fn dragging_to_trash_removes_tile_and_persists_once() {
    let (mut ws, store) = workspace(vec![
        Tile::new("a", GridPosition::new(0, 0), notes("a")),
        Tile::new("b", GridPosition::new(1, 0), notes("b")),
    ]);
    ws.set_edit_mode(EditMode::Edit);
    let trash = ws.trash().region();
    let over_trash = Point::new(trash.x + trash.width / 2.0, trash.y + trash.height / 2.0);
    let start = center(&ws, 0, 0);

    let outcome = mouse_drag(&mut ws, start, &[Point::new(start.x + 40.0, start.y), over_trash]);
    assert_eq!(
        outcome,
        DragOutcome::Committed(DragCommit::Remove { tile_id: "a".into() })
    );
    assert_eq!(ws.tiles().len(), 1);
    assert_eq!(ws.tiles()[0].position, GridPosition::new(1, 0));
    assert_eq!(store.calls(), 1);
    let persisted = store.last().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, "b");
}

#[test]
fn touch_and_mouse_drags_agree() {
    let tiles = vec![
        Tile::new("a", GridPosition::new(2, 3), notes("a")),
        Tile::new("b", GridPosition::new(1, 0), notes("b")),
    ];

    let (mut by_mouse, mouse_store) = workspace(tiles.clone());
    by_mouse.set_edit_mode(EditMode::Edit);
    let from = center(&by_mouse, 2, 3);
    let to = center(&by_mouse, 0, 0);
    let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
    mouse_drag(&mut by_mouse, from, &[mid, to]);

    let (mut by_touch, touch_store) = workspace(tiles.clone());
    by_touch.set_edit_mode(EditMode::Edit);
    let hit = by_touch.hit_test(from);
    by_touch.handle_input(&touch(TouchPhase::Start, Some(from)), &hit, 0);
    by_touch.handle_input(&touch(TouchPhase::Move, Some(mid)), &HitTarget::Background, 16);
    by_touch.handle_input(&touch(TouchPhase::Move, Some(to)), &HitTarget::Background, 32);
    let end = by_touch.handle_input(&touch(TouchPhase::End, None), &HitTarget::Background, 48);
    assert_eq!(
        end.outcome,
        DragOutcome::Committed(DragCommit::Move {
            tile_id: "a".into(),
            to: GridPosition::new(0, 0),
        })
    );

    let (mut by_native, native_store) = workspace(tiles);
    by_native.set_edit_mode(EditMode::Edit);
    let hit = by_native.hit_test(from);
    by_native.handle_input(&native(DragDropPhase::DragStart, Some(from)), &hit, 0);
    by_native.handle_input(&native(DragDropPhase::DragOver, Some(mid)), &HitTarget::Background, 16);
    by_native.handle_input(&native(DragDropPhase::DragOver, Some(to)), &HitTarget::Background, 32);
    let dropped =
        by_native.handle_input(&native(DragDropPhase::Drop, Some(to)), &HitTarget::Background, 48);
    assert_eq!(dropped.outcome, end.outcome);
    let trailing =
        by_native.handle_input(&native(DragDropPhase::DragEnd, None), &HitTarget::Background, 50);
    assert_eq!(trailing.outcome, DragOutcome::Ignored);

    assert_eq!(by_mouse.tiles(), by_touch.tiles());
    assert_eq!(by_native.tiles(), by_touch.tiles());
    assert_eq!(by_touch.tile("a").unwrap().position, GridPosition::new(0, 0));
    assert_eq!(mouse_store.snapshots(), touch_store.snapshots());
    assert_eq!(native_store.snapshots(), touch_store.snapshots());
    assert_eq!(touch_store.calls(), 1);
}

#[test]
fn tap_replayed_after_touch_drag_is_swallowed() {
    let (mut ws, _) = workspace(vec![Tile::new("a", GridPosition::new(2, 3), notes("a"))]);
    ws.set_edit_mode(EditMode::Edit);
    let from = center(&ws, 2, 3);
    let to = center(&ws, 0, 0);
    let hit = ws.hit_test(from);
    ws.handle_input(&touch(TouchPhase::Start, Some(from)), &hit, 0);
    ws.handle_input(&touch(TouchPhase::Move, Some(to)), &HitTarget::Background, 16);
    ws.handle_input(&touch(TouchPhase::End, None), &HitTarget::Background, 32);
    assert_eq!(ws.tile("a").unwrap().position, GridPosition::new(0, 0));
    ws.take_events();

    let hit = ws.hit_test(to);
    ws.handle_input(&mouse(MousePhase::Down, to), &hit, 40);
    let up = ws.handle_input(&mouse(MousePhase::Up, to), &hit, 41);
    assert_eq!(up.outcome, DragOutcome::Ignored);
    assert!(ws.take_events().is_empty());
}

#[test]
fn movement_below_threshold_is_a_tap_not_a_drag() {
    let (mut ws, store) = workspace(vec![Tile::new("a", GridPosition::new(0, 0), notes("a"))]);
    ws.set_edit_mode(EditMode::Edit);
    let start = center(&ws, 0, 0);
    let outcome = mouse_drag(&mut ws, start, &[Point::new(start.x + 9.5, start.y - 9.5)]);
    assert_eq!(outcome, DragOutcome::Tapped { tile_id: "a".into() });

    let outcome = mouse_drag(&mut ws, start, &[Point::new(start.x, start.y + 10.0)]);
    assert_eq!(
        outcome,
        DragOutcome::Committed(DragCommit::Unchanged { tile_id: "a".into() })
    );
    assert_eq!(store.calls(), 0);
}

#[test]
fn drop_on_occupied_cell_is_a_no_op() {
    let (mut ws, store) = workspace(vec![
        Tile::new("a", GridPosition::new(0, 0), notes("a")),
        Tile::new("b", GridPosition::new(1, 0), notes("b")),
    ]);
    ws.set_edit_mode(EditMode::Edit);
    let (from, onto_b) = (center(&ws, 0, 0), center(&ws, 1, 0));
    let outcome = mouse_drag(&mut ws, from, &[onto_b]);
    assert_eq!(
        outcome,
        DragOutcome::Committed(DragCommit::Unchanged { tile_id: "a".into() })
    );
    assert_eq!(store.calls(), 0);
    assert_no_overlap(&ws);
}

#[test]
fn dragging_is_disabled_in_normal_mode() {
    let (mut ws, store) = workspace(vec![Tile::new("a", GridPosition::new(0, 0), notes("a"))]);
    let (from, to) = (center(&ws, 0, 0), center(&ws, 2, 0));
    let outcome = mouse_drag(&mut ws, from, &[to]);
    assert_eq!(outcome, DragOutcome::Ignored);
    assert_eq!(ws.tile("a").unwrap().position, GridPosition::new(0, 0));
    assert_eq!(store.calls(), 0);
}

#[test]
fn setting_edit_mode_twice_changes_nothing() {
    let (mut ws, _) = workspace(vec![Tile::new("a", GridPosition::new(1, 1), notes("a"))]);
    assert!(ws.set_edit_mode(EditMode::Edit));
    ws.take_events();
    let once = ws.interaction_state();
    let rebuilds = ws.drop_zones().rebuild_count();
    assert!(!ws.set_edit_mode(EditMode::Edit));
    assert_eq!(ws.interaction_state(), once);
    assert_eq!(ws.drop_zones().rebuild_count(), rebuilds);
    assert!(ws.take_events().is_empty());
    assert!(!once.drop_zones.contains(&GridPosition::new(1, 1)));

    assert!(ws.set_edit_mode(EditMode::Normal));
    assert!(!ws.set_edit_mode(EditMode::Normal));
    assert!(!ws.interaction_state().drop_zones_visible);
}

#[test]
fn random_drags_never_overlap_tiles() {
    let tiles = (0..6)
        .map(|i| Tile::new(format!("t{i}"), GridPosition::new(i % 4, i / 4), notes("x")))
        .collect();
    let (mut ws, store) = workspace(tiles);
    ws.set_edit_mode(EditMode::Edit);
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut moves = 0;
    for _ in 0..200 {
        let index = rng.gen_range(0..ws.tiles().len());
        let from = ws.tiles()[index].position;
        let to = GridPosition::new(rng.gen_range(0..4), rng.gen_range(0..5));
        let target_free = ws.tile_at(to).is_none();
        let (start, end) = (center(&ws, from.x, from.y), center(&ws, to.x, to.y));
        let outcome = mouse_drag(&mut ws, start, &[end]);
        if let DragOutcome::Committed(DragCommit::Move { .. }) = outcome {
            assert!(target_free);
            moves += 1;
        }
        assert_no_overlap(&ws);
    }
    assert!(moves > 0);
    assert_eq!(store.calls(), moves);
}
