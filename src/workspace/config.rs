use crate::workspace::drag::{DragConfig, DEFAULT_CLICK_COOLDOWN_MS, DEFAULT_DRAG_THRESHOLD};
use crate::workspace::grid::{GridMetrics, Rect};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_version() -> u32 {
    1
}

fn default_cols() -> u32 {
    4
}

fn default_cell_width() -> f32 {
    220.0
}

fn default_cell_height() -> f32 {
    160.0
}

fn default_gap() -> f32 {
    12.0
}

fn default_padding() -> f32 {
    16.0
}

fn default_extra_rows() -> u32 {
    2
}

fn default_drag_threshold() -> f32 {
    DEFAULT_DRAG_THRESHOLD
}

fn default_click_cooldown_ms() -> u64 {
    DEFAULT_CLICK_COOLDOWN_MS
}

fn default_align_buffer_ms() -> i64 {
    crate::clock::DEFAULT_ALIGN_BUFFER_MS
}

fn default_trash() -> Rect {
    Rect::new(16.0, 16.0, 120.0, 64.0)
}

fn default_workspace_file() -> String {
    "workspace.json".into()
}

/// Grid geometry of the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_cols")]
    pub cols: u32,
    #[serde(default = "default_cell_width")]
    pub cell_width: f32,
    #[serde(default = "default_cell_height")]
    pub cell_height: f32,
    #[serde(default = "default_gap")]
    pub gap: f32,
    #[serde(default = "default_padding")]
    pub padding: f32,
    /// Rows a drag may reach below the last occupied/visible row.
    #[serde(default = "default_extra_rows")]
    pub extra_rows: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
            gap: default_gap(),
            padding: default_padding(),
            extra_rows: default_extra_rows(),
        }
    }
}

impl GridConfig {
    pub fn metrics(&self) -> GridMetrics {
        GridMetrics {
            cell_width: self.cell_width,
            cell_height: self.cell_height,
            gap: self.gap,
            padding: self.padding,
        }
    }
}

/// Pointer interaction tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionConfig {
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold: f32,
    #[serde(default = "default_click_cooldown_ms")]
    pub click_cooldown_ms: u64,
    /// Trash region relative to the bottom-right corner of the viewport.
    #[serde(default = "default_trash")]
    pub trash: Rect,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: default_drag_threshold(),
            click_cooldown_ms: default_click_cooldown_ms(),
            trash: default_trash(),
        }
    }
}

impl InteractionConfig {
    pub fn drag(&self) -> DragConfig {
        DragConfig {
            threshold: self.drag_threshold.max(0.0),
            click_cooldown_ms: self.click_cooldown_ms,
        }
    }
}

/// Primary settings file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default = "default_align_buffer_ms")]
    pub clock_align_buffer_ms: i64,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Workspace file, relative to the settings directory unless absolute.
    #[serde(default = "default_workspace_file")]
    pub workspace_file: String,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            grid: GridConfig::default(),
            interaction: InteractionConfig::default(),
            clock_align_buffer_ms: default_align_buffer_ms(),
            debug_logging: false,
            log_file: None,
            workspace_file: default_workspace_file(),
        }
    }
}

impl WorkspaceSettings {
    /// Load settings from disk. A missing or empty file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: WorkspaceSettings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        for w in settings.sanitize() {
            tracing::warn!("{w}");
        }
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp values that would make the grid unusable.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.grid.cols == 0 {
            warnings.push("grid.cols must be at least 1; using 1".to_string());
            self.grid.cols = 1;
        }
        if self.grid.cell_width <= 0.0 || self.grid.cell_height <= 0.0 {
            warnings.push("cell size must be positive; using defaults".to_string());
            self.grid.cell_width = default_cell_width();
            self.grid.cell_height = default_cell_height();
        }
        if self.grid.gap < 0.0 {
            warnings.push("grid.gap must not be negative; using 0".to_string());
            self.grid.gap = 0.0;
        }
        if self.interaction.drag_threshold < 0.0 {
            warnings.push("drag_threshold must not be negative; using default".to_string());
            self.interaction.drag_threshold = default_drag_threshold();
        }
        warnings
    }

    /// Resolve a settings directory to the settings file inside it.
    pub fn path_for(base: &str) -> PathBuf {
        let base = Path::new(base);
        if base.is_dir() {
            base.join("settings.json")
        } else {
            PathBuf::from(base)
        }
    }

    /// Default settings location under the user's config directory.
    pub fn default_dir() -> PathBuf {
        dirs_next::config_dir()
            .map(|d| d.join("tile_desk"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn workspace_path(&self, settings_dir: &Path) -> PathBuf {
        let file = Path::new(&self.workspace_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            settings_dir.join(file)
        }
    }
}
