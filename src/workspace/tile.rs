use crate::mark_sync::Mark;
use crate::time::ClockZone;
use crate::workspace::grid::GridPosition;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Clock,
    Calendar,
    Notes,
    Map,
    IdGenerator,
}

impl TileKind {
    pub const ALL: [TileKind; 5] = [
        TileKind::Clock,
        TileKind::Calendar,
        TileKind::Notes,
        TileKind::Map,
        TileKind::IdGenerator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TileKind::Clock => "clock",
            TileKind::Calendar => "calendar",
            TileKind::Notes => "notes",
            TileKind::Map => "map",
            TileKind::IdGenerator => "id_generator",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn default_payload(&self) -> TilePayload {
        match self {
            TileKind::Clock => TilePayload::Clock(ClockPayload::default()),
            TileKind::Calendar => TilePayload::Calendar(CalendarPayload::default()),
            TileKind::Notes => TilePayload::Notes(NotesPayload::default()),
            TileKind::Map => TilePayload::Map(MapPayload::default()),
            TileKind::IdGenerator => TilePayload::IdGenerator(IdGeneratorPayload::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClockPayload {
    #[serde(default)]
    pub zone: ClockZone,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalendarPayload {
    #[serde(default)]
    pub selected: Option<NaiveDate>,
    #[serde(default)]
    pub week_starts_monday: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotesPayload {
    #[serde(default)]
    pub text: String,
}

fn default_zoom() -> u8 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPayload {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl Default for MapPayload {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            zoom: default_zoom(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    #[default]
    Hex64,
    Numeric,
}

fn default_history() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdGeneratorPayload {
    #[serde(default)]
    pub format: IdFormat,
    #[serde(default = "default_history")]
    pub history: usize,
    #[serde(default)]
    pub generated: Vec<String>,
}

impl Default for IdGeneratorPayload {
    fn default() -> Self {
        Self {
            format: IdFormat::default(),
            history: default_history(),
            generated: Vec::new(),
        }
    }
}

/// Widget data, one strongly typed variant per tile kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TilePayload {
    Clock(ClockPayload),
    Calendar(CalendarPayload),
    Notes(NotesPayload),
    Map(MapPayload),
    IdGenerator(IdGeneratorPayload),
}

impl TilePayload {
    pub fn kind(&self) -> TileKind {
        match self {
            TilePayload::Clock(_) => TileKind::Clock,
            TilePayload::Calendar(_) => TileKind::Calendar,
            TilePayload::Notes(_) => TileKind::Notes,
            TilePayload::Map(_) => TileKind::Map,
            TilePayload::IdGenerator(_) => TileKind::IdGenerator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: String,
    pub position: GridPosition,
    #[serde(flatten)]
    pub payload: TilePayload,
}

impl Tile {
    pub fn new(id: impl Into<String>, position: GridPosition, payload: TilePayload) -> Self {
        Self {
            id: id.into(),
            position,
            payload,
        }
    }

    pub fn kind(&self) -> TileKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tile_serializes_kind_tag_next_to_position() {
        let tile = Tile::new(
            "t1",
            GridPosition::new(1, 2),
            TilePayload::Notes(NotesPayload {
                text: "hi".into(),
            }),
        );
        let value = serde_json::to_value(&tile).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "t1",
                "position": {"x": 1, "y": 2},
                "kind": "notes",
                "data": {"text": "hi"}
            })
        );
        let back: Tile = serde_json::from_value(value).unwrap();
        assert_eq!(back, tile);
    }

    #[test]
    fn kind_names_parse() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::parse(kind.as_str()), Some(kind));
            assert_eq!(kind.default_payload().kind(), kind);
        }
        assert_eq!(TileKind::parse("weather"), None);
    }
}
