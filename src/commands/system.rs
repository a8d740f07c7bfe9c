//! System information commands

use super::AppState;
use crate::capture::traits::DisplayInfo;
use crate::container::{probe, AviInfo};
use crate::utils::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
}

pub fn get_system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Displays attached to the machine
pub fn get_displays(state: &AppState) -> Vec<DisplayInfo> {
    state.capture.displays()
}

/// Read back the headers and index of a recording
pub async fn probe_recording(path: &Path) -> AppResult<AviInfo> {
    let path = path.to_path_buf();
    let info = tokio::task::spawn_blocking(move || probe(&path))
        .await
        .map_err(|e| crate::utils::AppError::Task(e.to_string()))??;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AppError;

    #[tokio::test]
    async fn test_probe_missing_file_fails() {
        let err = probe_recording(Path::new("/nonexistent/recording.avi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Container(_)));
    }

    #[test]
    fn test_system_info() {
        let info = get_system_info();
        assert!(!info.os.is_empty());
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }
}
