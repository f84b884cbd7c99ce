//! Default locations for the mixer configuration

use std::path::PathBuf;

/// Configuration file name inside [`default_config_dir`]
const CONFIG_FILE: &str = "mixer.yaml";

/// Per-user configuration directory
///
/// Returns: `<config dir>/spdif-mixer` (e.g. `~/.config/spdif-mixer` on Linux),
/// or `./spdif-mixer` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spdif-mixer")
}

/// Returns: `<config dir>/spdif-mixer/mixer.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE)
}
