//! Where the client keeps its local state.

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{ClientError, Result};

/// Default server URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3003";

/// Drafts file in the platform data directory:
/// - Linux:   `~/.local/share/walog/drafts.json`
/// - macOS:   `~/Library/Application Support/org.walog.walog/drafts.json`
/// - Windows: `{FOLDERID_RoamingAppData}\walog\walog\data\drafts.json`
pub fn default_drafts_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("org", "walog", "walog").ok_or(ClientError::NoDataDir)?;
    Ok(project_dirs.data_dir().join("drafts.json"))
}
