//! Dock window commands

use super::AppState;
use crate::capture::traits::WindowHandle;
use crate::registry::{ActivationReport, RefreshSummary, WindowEntry};
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Re-enumerate windows now instead of waiting for the next poll
pub async fn refresh_windows(state: &AppState) -> AppResult<RefreshSummary> {
    let registry = state.registry.clone();
    tokio::task::spawn_blocking(move || registry.lock().refresh())
        .await
        .map_err(|e| AppError::Task(e.to_string()))
}

/// Windows currently in the dock, in display order
pub fn list_windows(state: &AppState) -> Vec<WindowEntry> {
    state
        .registry
        .lock()
        .windows()
        .iter()
        .map(WindowEntry::from)
        .collect()
}

/// Bring a docked window to the foreground
pub async fn activate_window(state: &AppState, handle: WindowHandle) -> AppResult<ActivationReport> {
    if state.registry.lock().get(handle).is_none() {
        return Err(AppError::UnknownWindow(handle.0));
    }

    let registry = state.registry.clone();
    let report = tokio::task::spawn_blocking(move || registry.lock().activate(handle))
        .await
        .map_err(|e| AppError::Task(e.to_string()))?;

    tracing::info!(
        "Activated {} (restored: {}, shown: {}, {} failed steps)",
        handle,
        report.restored,
        report.force_shown,
        report.failures.len()
    );
    Ok(report)
}

/// Where a dock icon was written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconFile {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Write a docked window's icon to `path` as PNG
pub fn save_window_icon(state: &AppState, handle: WindowHandle, path: &Path) -> AppResult<IconFile> {
    let icon = state
        .registry
        .lock()
        .get(handle)
        .map(|w| w.icon.clone())
        .ok_or(AppError::UnknownWindow(handle.0))?;

    let png = icon
        .encode_png()
        .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, &png)?;

    Ok(IconFile {
        path: path.to_path_buf(),
        width: icon.width,
        height: icon.height,
        bytes: png.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DockConfig;
    use crate::testing::{FakeCapture, FakeSurface};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn state(surface: Arc<FakeSurface>) -> AppState {
        AppState::new(DockConfig::default(), surface, Arc::new(FakeCapture::new(8, 8)))
    }

    #[tokio::test]
    async fn test_refresh_then_list() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![
            FakeSurface::window(1, "notepad.exe", "Untitled - Notepad"),
            FakeSurface::window(2, "SearchHost.exe", "Search"),
        ]);
        let state = state(surface);

        let summary = refresh_windows(&state).await.unwrap();
        assert_eq!(summary.added, 1);

        let windows = list_windows(&state);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].process_name, "notepad.exe");
    }

    #[tokio::test]
    async fn test_activate_unknown_window_rejected() {
        let surface = Arc::new(FakeSurface::new());
        let state = state(surface.clone());

        let err = activate_window(&state, WindowHandle(42)).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownWindow(42)));
        assert!(surface.calls().is_empty());
    }

    #[tokio::test]
    async fn test_activate_docked_window() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(7, "code.exe", "main.rs")]);
        surface.set_minimized(WindowHandle(7), true);
        let state = state(surface.clone());
        refresh_windows(&state).await.unwrap();

        let report = activate_window(&state, WindowHandle(7)).await.unwrap();
        assert!(report.restored);
        assert_eq!(surface.calls()[0], "restore 7");
    }

    #[tokio::test]
    async fn test_save_icon_writes_png() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(3, "app.exe", "App")]);
        let state = state(surface);
        refresh_windows(&state).await.unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("icon.png");
        let file = save_window_icon(&state, WindowHandle(3), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), file.bytes);
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
