//! XDG Base Directory paths for murmur.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the murmur config directory.
///
/// Returns `$XDG_CONFIG_HOME/murmur` if set, otherwise `~/.config/murmur`.
/// This is where the instance config, plugins, and registries are stored.
///
/// # Examples
///
/// ```
/// use murmur_paths::config_dir;
///
/// let config = config_dir();
/// let plugin_dir = config.join("plugins");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("murmur")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/murmur")
    } else {
        PathBuf::from(".config/murmur")
    }
}

/// Get the murmur data directory.
///
/// Returns `$XDG_DATA_HOME/murmur` if set, otherwise `~/.local/share/murmur`.
/// Downloaded plugin resources land here.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("murmur")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/murmur")
    } else {
        PathBuf::from(".local/share/murmur")
    }
}

/// Get the murmur cache directory.
///
/// Returns `$XDG_CACHE_HOME/murmur` if set, otherwise `~/.cache/murmur`.
/// Per-plugin content-hash files are kept here.
pub fn cache_dir() -> PathBuf {
    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg_cache).join("murmur")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cache/murmur")
    } else {
        PathBuf::from(".cache/murmur")
    }
}

/// Get the murmur log directory.
///
/// Session log files are written here, one per session start.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_murmur() {
        let path = config_dir();
        assert!(
            path.ends_with("murmur"),
            "config_dir should end with 'murmur'"
        );
    }

    #[test]
    fn test_data_dir_ends_with_murmur() {
        let path = data_dir();
        assert!(path.ends_with("murmur"), "data_dir should end with 'murmur'");
    }

    #[test]
    fn test_cache_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", "/tmp/test-cache");
        }
        let path = cache_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-cache/murmur"));
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
    }

    #[test]
    fn test_log_dir_is_under_data_dir() {
        assert!(log_dir().starts_with(data_dir()));
    }
}
