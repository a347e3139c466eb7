use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, warn};

/// File name of the intermediate dump, placed in the user's home directory.
pub const BACKUP_FILE_NAME: &str = "replicator_backup.dump";

/// Environment variable that relocates the dump/restore binaries.
pub const TOOL_DIR_VAR: &str = "PG_BIN";

pub const DEFAULT_TOOL_DIR: &str = "/usr/bin";

/// `<home>/<BACKUP_FILE_NAME>`, or `None` when there is no home directory.
pub fn backup_path(home: Option<OsString>) -> Option<PathBuf> {
    home.filter(|h| !h.is_empty())
        .map(|h| PathBuf::from(h).join(BACKUP_FILE_NAME))
}

pub fn backup_path_from_env() -> Option<PathBuf> {
    backup_path(std::env::var_os("HOME"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDirSource {
    Override,
    Default,
}

/// The single directory the external tools are searched in. An empty
/// override counts as unset.
pub fn tool_dir(override_dir: Option<OsString>) -> (PathBuf, ToolDirSource) {
    match override_dir.filter(|d| !d.is_empty()) {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            debug!(dir = %dir.display(), "Using tool directory from ${}", TOOL_DIR_VAR);
            (dir, ToolDirSource::Override)
        }
        None => {
            warn!(
                dir = DEFAULT_TOOL_DIR,
                "${} is not set; using default tool directory", TOOL_DIR_VAR
            );
            (PathBuf::from(DEFAULT_TOOL_DIR), ToolDirSource::Default)
        }
    }
}

pub fn tool_dir_from_env() -> PathBuf {
    tool_dir(std::env::var_os(TOOL_DIR_VAR)).0
}
