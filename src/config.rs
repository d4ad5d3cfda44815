use log::debug;
use std::env;
use std::path::{Path, PathBuf};

pub const API_KEY_VAR: &str = "ENTSOE_API_KEY";

/// Load `.env` from the working directory, then `~/.env`. Variables that are
/// already set are left alone, so the first file wins.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }
    if let Some(home) = env::var_os("HOME") {
        let path = Path::new(&home).join(".env");
        if dotenvy::from_path(&path).is_ok() {
            debug!("Loaded environment from {}", path.display());
        }
    }
}

/// Where the report stage writes its artifacts.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub root: PathBuf,
    pub workbook: PathBuf,
    pub html: PathBuf,
    pub summary: PathBuf,
    pub charts_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            workbook: root.join("lithuania_bess_analysis.xlsx"),
            html: root.join("lithuania_bess_report.html"),
            summary: root.join("revenue_summary.json"),
            charts_dir: root.join("charts"),
            root,
        }
    }

    pub fn statistics_dir(&self) -> PathBuf {
        self.root.join("statistics")
    }
}
