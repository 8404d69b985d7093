use crate::config::{ExportSettings, PosecamConfig};
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<PosecamConfig>> = Arc::new(RwLock::new(PosecamConfig::load_or_default()));
}

/// Snapshot of the active configuration for other commands
pub(crate) fn current_config() -> Result<PosecamConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<PosecamConfig, String> {
    current_config()
}

/// Update configuration
#[command]
pub async fn update_config(new_config: PosecamConfig) -> Result<(), String> {
    new_config.validate().map_err(|e| e.to_string())?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    new_config
        .save_to_file(PosecamConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(())
}

/// Get export configuration
#[command]
pub async fn get_export_config() -> Result<ExportSettings, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.export.clone())
}
