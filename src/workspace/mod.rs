pub mod config;
pub mod drag;
pub mod drop_zones;
pub mod edit_mode;
pub mod grid;
pub mod input;
pub mod persistence;
pub mod tile;
pub mod trash;
pub mod widgets;
#[allow(clippy::module_inception)]
pub mod workspace;

use rand::Rng;

pub use config::WorkspaceSettings;
pub use edit_mode::EditMode;
pub use grid::{GridPosition, Point};
pub use persistence::{JsonFilePersistence, MemoryPersistence, NoPersistence, Persistence};
pub use tile::{Tile, TileKind, TilePayload};
pub use workspace::{
    InputResponse, InteractionSnapshot, SharedServices, Workspace, WorkspaceEvent,
};

/// Random tile id not accepted by `taken`.
pub fn generate_tile_id(taken: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id = format!("tile-{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff);
        if !taken(&id) {
            return id;
        }
    }
}
