//! Default paths for pomodorod components
//!
//! Everything lives in per-user locations, no root required:
//! - Socket: `$XDG_RUNTIME_DIR/pomodorod/pomodorod.sock` or `/tmp/pomodorod-$USER/pomodorod.sock`
//! - Data: `$XDG_DATA_HOME/pomodorod` or `~/.local/share/pomodorod`
//! - Config: `$XDG_CONFIG_HOME/pomodorod/config.toml` or `~/.config/pomodorod/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const POMODOROD_SOCKET_ENV: &str = "POMODOROD_SOCKET";

/// Environment variable for overriding the data directory
pub const POMODOROD_DATA_DIR_ENV: &str = "POMODOROD_DATA_DIR";

const SOCKET_FILENAME: &str = "pomodorod.sock";
const CONFIG_FILENAME: &str = "config.toml";
const DATABASE_FILENAME: &str = "pomodorod.db";
const APP_DIR: &str = "pomodorod";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$POMODOROD_SOCKET`
/// 2. `$XDG_RUNTIME_DIR/pomodorod/pomodorod.sock`
/// 3. `/tmp/pomodorod-$USER/pomodorod.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(POMODOROD_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path ignoring `$POMODOROD_SOCKET`, for places where clap reads the
/// variable itself.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$POMODOROD_DATA_DIR`
/// 2. `$XDG_DATA_HOME/pomodorod`
/// 3. `~/.local/share/pomodorod`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(POMODOROD_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default config file path.
///
/// `$XDG_CONFIG_HOME/pomodorod/config.toml`, falling back to
/// `~/.config/pomodorod/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Database file inside a data directory
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_names_the_daemon() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("pomodorod"));
        assert_eq!(path.extension().unwrap(), "sock");
    }

    #[test]
    fn data_dir_names_the_daemon() {
        assert!(data_dir_without_env().to_string_lossy().contains("pomodorod"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.ends_with("pomodorod/config.toml"));
    }

    #[test]
    fn database_lives_in_data_dir() {
        let dir = PathBuf::from("/var/lib/pomo");
        assert_eq!(database_path(&dir), PathBuf::from("/var/lib/pomo/pomodorod.db"));
    }
}
