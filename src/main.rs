use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use tile_desk::gui::TileDeskApp;
use tile_desk::logging;
use tile_desk::time::SystemTimeSource;
use tile_desk::workspace::{JsonFilePersistence, SharedServices, Workspace, WorkspaceSettings};

fn main() -> anyhow::Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(WorkspaceSettings::default_dir);
    std::fs::create_dir_all(&dir)?;
    let settings_path = WorkspaceSettings::path_for(&dir.to_string_lossy());
    let settings = WorkspaceSettings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    tracing::info!(path = %settings_path.display(), "settings loaded");

    let store = Arc::new(JsonFilePersistence::new(settings.workspace_path(&dir)));
    let (tiles, _warnings) = store.load(settings.grid.cols)?;

    let shared = SharedServices::new(Arc::new(SystemTimeSource), settings.clock_align_buffer_ms);
    let mut workspace = Workspace::new(settings, shared, store);
    workspace.load_tiles(tiles);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 760.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Tile Desk",
        native_options,
        Box::new(move |_cc| Box::new(TileDeskApp::new(workspace))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
