//! Centralized application directory paths.
//!
//! Uses the [`dirs`](::dirs) crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `INK_ECHO_DATA_DIR`: overrides [`data_dir`]
//! - `INK_ECHO_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory (session file, logs).
///
/// Resolves to `dirs::data_dir()/ink-echo/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("INK_ECHO_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    ::dirs::data_dir()
        .map(|d| d.join("ink-echo"))
        .unwrap_or_else(|| PathBuf::from("/tmp/ink-echo-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/ink-echo/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("INK_ECHO_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    ::dirs::config_dir()
        .map(|d| d.join("ink-echo"))
        .unwrap_or_else(|| PathBuf::from("/tmp/ink-echo-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Directory holding the persisted session slot (`data_dir()/sessions/`).
#[must_use]
pub fn sessions_dir() -> PathBuf {
    data_dir().join("sessions")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
