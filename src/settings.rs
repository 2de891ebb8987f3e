use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const RC_FILE: &str = ".importrc";
const DEFAULT_SECRET: &str = "secret";

/// Options that shape one import run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory searched for images before downloading them.
    pub image_path: Option<PathBuf>,
    /// Remove previously generated documents before writing new ones.
    pub do_cleanup: bool,
    /// Route unpublished records to hidden preview pages.
    pub published_only: bool,
    /// Token appended to preview filenames so they cannot be guessed.
    pub preview_secret: String,
    /// Upper bound on records processed at once; unbounded when `None`.
    pub max_concurrency: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            do_cleanup: true,
            published_only: false,
            preview_secret: DEFAULT_SECRET.to_string(),
            max_concurrency: None,
        }
    }
}

/// Persistent settings: `.importrc` overlaid with `IMPORT_*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spreadsheet_id: Option<String>,
    pub api_key: Option<String>,
    pub content_root: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub preview_secret: Option<String>,
    pub production: bool,
    pub max_concurrency: Option<usize>,
}

impl Settings {
    pub fn load(dir: &Path) -> Result<Self> {
        let rc = dir.join(RC_FILE);
        Config::builder()
            .add_source(File::from(rc.as_path()).format(FileFormat::Json).required(false))
            .add_source(Environment::with_prefix("IMPORT").try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| format!("Failed to load settings ({})", rc.display()))
    }

    pub fn content_root(&self) -> PathBuf {
        self.content_root.clone().unwrap_or_else(|| PathBuf::from("contents"))
    }

    /// Production mode from settings or `NODE_ENV=production`.
    pub fn production(&self) -> bool {
        self.production || std::env::var("NODE_ENV").is_ok_and(|v| v == "production")
    }

    pub fn preview_secret(&self) -> String {
        self.preview_secret
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET.to_string())
    }
}

/// Remember the spreadsheet id for later runs when no rc file exists yet.
/// Returns whether a file was written.
pub fn save_spreadsheet_id(dir: &Path, spreadsheet_id: &str) -> Result<bool> {
    let rc = dir.join(RC_FILE);
    if rc.exists() {
        return Ok(false);
    }
    let body = serde_json::to_string_pretty(&serde_json::json!({ "spreadsheet_id": spreadsheet_id }))?;
    std::fs::write(&rc, body).with_context(|| format!("Failed to write {}", rc.display()))?;
    Ok(true)
}

// ── Tests ──
