//! Widget configuration loader.
//!
//! Reads `widget.toml` from the data directory (`~/.crm-widget/` by default)
//! and deserializes it into [`WidgetConfig`]. Falls back to defaults when the
//! file is missing or malformed; callers still run
//! [`WidgetConfig::validate`] before mounting.

use std::path::{Path, PathBuf};

use crm_widget_types::config::WidgetConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CRM_WIDGET_DATA_DIR";

/// Name of the config file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "widget.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CRM_WIDGET_DATA_DIR` environment variable
/// 2. `~/.crm-widget`
/// 3. `.crm-widget` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".crm-widget");
    }

    PathBuf::from(".crm-widget")
}

/// Load widget configuration from `{data_dir}/widget.toml`.
///
/// - Missing file: returns [`WidgetConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_widget_config(data_dir: &Path) -> WidgetConfig {
    let config_path = data_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return WidgetConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return WidgetConfig::default();
        }
    };

    match toml::from_str::<WidgetConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            WidgetConfig::default()
        }
    }
}
