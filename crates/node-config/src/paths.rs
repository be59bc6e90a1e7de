//! Location of the credential store on disk.

use std::path::PathBuf;

/// Environment variable overriding the store directory.
pub const HOME_ENV: &str = "HYPERION_NODE_HOME";

const STORE_DIR: &str = ".hyperion_node";
const STORE_FILE: &str = "config.toml";

/// Returns the default store path: `~/.hyperion_node/config.toml`.
///
/// `HYPERION_NODE_HOME` replaces the `~/.hyperion_node` directory when set.
pub fn default_store_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join(STORE_FILE));
    }
    home_dir().map(|h| h.join(STORE_DIR).join(STORE_FILE))
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}
