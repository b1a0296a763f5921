use crate::workspace::grid::{GridPosition, Occupancy};
use crate::workspace::tile::{Tile, TileKind, TilePayload};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives the full tile list after every committed mutation.
pub trait Persistence: Send + Sync {
    fn persist(&self, tiles: &[Tile]) -> anyhow::Result<()>;
}

/// Persistence that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn persist(&self, _tiles: &[Tile]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps every persisted snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    snapshots: Mutex<Vec<Vec<Tile>>>,
}

impl MemoryPersistence {
    pub fn snapshots(&self) -> Vec<Vec<Tile>> {
        self.snapshots.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last(&self) -> Option<Vec<Tile>> {
        self.snapshots.lock().ok()?.last().cloned()
    }
}

impl Persistence for MemoryPersistence {
    fn persist(&self, tiles: &[Tile]) -> anyhow::Result<()> {
        self.snapshots
            .lock()
            .map_err(|_| anyhow::anyhow!("memory persistence lock poisoned"))?
            .push(tiles.to_vec());
        Ok(())
    }
}

fn default_version() -> u32 {
    1
}

/// On-disk workspace document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tiles: Vec<Tile>,
}

/// Writes the workspace as pretty JSON.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and normalize the workspace file. A missing or empty file is an
    /// empty workspace.
    pub fn load(&self, max_cols: u32) -> anyhow::Result<(Vec<Tile>, Vec<String>)> {
        let content = std::fs::read_to_string(&self.path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let raw: RawWorkspaceFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing workspace {}", self.path.display()))?;
        let (tiles, warnings) = normalize_tiles(raw.tiles, max_cols);
        for w in &warnings {
            tracing::warn!("{w}");
        }
        Ok((tiles, warnings))
    }
}

impl Persistence for JsonFilePersistence {
    fn persist(&self, tiles: &[Tile]) -> anyhow::Result<()> {
        let file = WorkspaceFile {
            version: default_version(),
            tiles: tiles.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing workspace {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawWorkspaceFile {
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPosition {
    #[serde(default)]
    x: i64,
    #[serde(default)]
    y: i64,
}

/// Tile as found on disk, including fields of older layouts. Legacy wide
/// tiles carried `span`/`width`; they are read and discarded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default, alias = "width")]
    span: Option<u32>,
}

impl RawTile {
    pub fn new(id: Option<&str>, x: i64, y: i64, kind: &str, data: Value) -> Self {
        Self {
            id: id.map(str::to_string),
            position: Some(RawPosition { x, y }),
            kind: kind.to_string(),
            data,
            span: None,
        }
    }

    pub fn with_span(mut self, span: u32) -> Self {
        self.span = Some(span);
        self
    }
}

fn parse_payload(kind: TileKind, data: &Value) -> Result<TilePayload, serde_json::Error> {
    let data = if data.is_null() { json!({}) } else { data.clone() };
    serde_json::from_value(json!({ "kind": kind.as_str(), "data": data }))
}

/// Turn raw tiles into a collision-free single-cell layout.
///
/// Unknown kinds are dropped, bad payloads fall back to the kind's default,
/// multi-cell spans collapse to one cell, and tiles whose position is
/// negative, missing or already taken move to the next free cell.
pub fn normalize_tiles(raw: Vec<RawTile>, max_cols: u32) -> (Vec<Tile>, Vec<String>) {
    let cols = max_cols.max(1);
    let mut warnings = Vec::new();
    let mut occupancy = Occupancy::default();
    let mut used_ids = std::collections::HashSet::new();
    let mut placed: Vec<(RawTile, TilePayload, Option<GridPosition>)> = Vec::new();

    for tile in raw {
        let Some(kind) = TileKind::parse(&tile.kind) else {
            warnings.push(format!("dropping tile of unknown kind '{}'", tile.kind));
            continue;
        };
        let payload = match parse_payload(kind, &tile.data) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(format!(
                    "tile {:?} has invalid {} data ({e}); using defaults",
                    tile.id.as_deref().unwrap_or("?"),
                    kind.as_str()
                ));
                kind.default_payload()
            }
        };
        if tile.span.map_or(false, |s| s > 1) {
            warnings.push(format!(
                "tile {:?} spanned multiple cells; normalized to one cell",
                tile.id.as_deref().unwrap_or("?")
            ));
        }
        let wanted = tile.position.as_ref().and_then(|p| {
            if p.x < 0 || p.y < 0 || p.x >= cols as i64 || p.y > u32::MAX as i64 {
                None
            } else {
                Some(GridPosition::new(p.x as u32, p.y as u32))
            }
        });
        let claimed = wanted.filter(|pos| occupancy.insert(*pos));
        placed.push((tile, payload, claimed));
    }

    // Displaced tiles are placed after every valid position is claimed so
    // they never steal a cell from a later, correctly placed tile.
    let mut tiles = Vec::with_capacity(placed.len());
    for (raw, payload, claimed) in placed {
        let position = match claimed {
            Some(pos) => pos,
            None => {
                let pos = occupancy.next_free(cols);
                occupancy.insert(pos);
                warnings.push(format!(
                    "tile {:?} had an invalid or taken position; moved to {pos}",
                    raw.id.as_deref().unwrap_or("?")
                ));
                pos
            }
        };
        let id = match raw.id.filter(|id| !id.is_empty() && !used_ids.contains(id)) {
            Some(id) => id,
            None => {
                let id = crate::workspace::generate_tile_id(|c| used_ids.contains(c));
                warnings.push(format!("tile at {position} was given a new id '{id}'"));
                id
            }
        };
        used_ids.insert(id.clone());
        tiles.push(Tile::new(id, position, payload));
    }
    (tiles, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::tile::NotesPayload;

    fn notes(id: &str, x: i64, y: i64) -> RawTile {
        RawTile::new(Some(id), x, y, "notes", json!({"text": id}))
    }

    #[test]
    fn collapses_wide_tiles() {
        let (tiles, warnings) = normalize_tiles(vec![notes("a", 0, 0).with_span(3)], 4);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].position, GridPosition::new(0, 0));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn relocates_overlap_to_next_free() {
        let (tiles, warnings) =
            normalize_tiles(vec![notes("a", 0, 0), notes("b", 0, 0), notes("c", 1, 0)], 2);
        let positions: Vec<_> = tiles.iter().map(|t| (t.id.as_str(), t.position)).collect();
        assert_eq!(
            positions,
            vec![
                ("a", GridPosition::new(0, 0)),
                ("b", GridPosition::new(0, 1)),
                ("c", GridPosition::new(1, 0)),
            ]
        );
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn negative_and_out_of_grid_positions_move() {
        let (tiles, warnings) = normalize_tiles(vec![notes("a", -1, 0), notes("b", 9, 0)], 2);
        assert_eq!(tiles[0].position, GridPosition::new(0, 0));
        assert_eq!(tiles[1].position, GridPosition::new(1, 0));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn unknown_kinds_dropped_and_bad_data_defaulted() {
        let raw = vec![
            RawTile::new(Some("w"), 0, 0, "weather", json!({})),
            RawTile::new(Some("n"), 0, 0, "notes", json!({"text": 5})),
        ];
        let (tiles, warnings) = normalize_tiles(raw, 3);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].payload, TilePayload::Notes(NotesPayload::default()));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn duplicate_ids_are_replaced() {
        let (tiles, _) = normalize_tiles(vec![notes("a", 0, 0), notes("a", 1, 0)], 3);
        assert_eq!(tiles[0].id, "a");
        assert_ne!(tiles[1].id, "a");
    }

    #[test]
    fn file_round_trip_normalizes_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        std::fs::write(
            &path,
            r#"{"tiles": [
                {"id": "c", "position": {"x": 0, "y": 0}, "kind": "clock", "data": {"zone": {"zone": "utc"}}, "span": 2},
                {"id": "m", "position": {"x": 0, "y": 0}, "kind": "map"}
            ]}"#,
        )
        .unwrap();
        let store = JsonFilePersistence::new(&path);
        let (tiles, warnings) = store.load(4).unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1].position, GridPosition::new(1, 0));
        assert_eq!(warnings.len(), 2);

        store.persist(&tiles).unwrap();
        let (reloaded, warnings) = store.load(4).unwrap();
        assert_eq!(reloaded, tiles);
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_file_is_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePersistence::new(dir.path().join("none.json"));
        let (tiles, warnings) = store.load(4).unwrap();
        assert!(tiles.is_empty());
        assert!(warnings.is_empty());
    }
}
