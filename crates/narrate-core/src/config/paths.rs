//! Standard locations of narrate configuration files

use std::path::PathBuf;

/// File name of the audio pane configuration
pub const CONFIG_FILE_NAME: &str = "waveform.yaml";

/// Returns: `<platform config dir>/narrate`
///
/// Falls back to the working directory when the platform reports no
/// config location (headless CI containers).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("narrate")
}

/// Returns: `<platform config dir>/narrate/waveform.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
