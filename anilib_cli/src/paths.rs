//! Centralized path management for the anilib CLI
//!
//! Data (the queue database, downloaded documents and images) lives in the
//! platform data directory; configuration lives in the config directory.

use std::path::PathBuf;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "anilib";

/// The name of the command queue database file
const DATABASE_FILE: &str = "queue.db";

const DOCUMENTS_SUBDIR: &str = "documents";

const IMAGES_SUBDIR: &str = "images";

/// Returns the base data directory for the application
///
/// `~/.local/share/anilib` on Linux, the platform data directory elsewhere.
/// Falls back to `.anilib` in the current directory.
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".anilib"))
}

/// Returns the path to the command queue database
pub fn get_database_path() -> PathBuf {
    get_data_dir().join(DATABASE_FILE)
}

/// Where fetched registry documents are written
pub fn get_documents_dir() -> PathBuf {
    get_data_dir().join(DOCUMENTS_SUBDIR)
}

pub fn get_images_dir() -> PathBuf {
    get_data_dir().join(IMAGES_SUBDIR)
}

/// Returns the path to the configuration file
///
/// `XDG_CONFIG_HOME` wins on Unix-like systems.
pub fn get_config_path() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config).join(APP_DIR).join("config.toml");
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".anilib"))
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_share_base_dir() {
        let base = get_data_dir();
        assert!(get_database_path().starts_with(&base));
        assert!(get_documents_dir().starts_with(&base));
        assert!(get_images_dir().starts_with(&base));
        assert!(get_database_path().ends_with("queue.db"));
    }

    #[test]
    fn test_config_path_is_toml() {
        let path = get_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
        assert!(path.parent().unwrap().ends_with(APP_DIR));
    }
}
