//! Command handlers
//!
//! Each UI action maps to one async function over [`AppState`]. The console
//! front end parses lines into these calls and prints their results as JSON.

pub mod console;
pub mod recording;
pub mod system;
pub mod windows;

use crate::capture::{CaptureBackend, PlatformCapture, WindowSurface};
use crate::config::DockConfig;
use crate::recorder::RecordingCoordinator;
use crate::registry::{ProcessFilter, WindowRegistry};
use std::sync::Arc;

/// Shared state behind every command
pub struct AppState {
    pub config: DockConfig,
    pub registry: Arc<parking_lot::Mutex<WindowRegistry>>,
    pub coordinator: Arc<tokio::sync::Mutex<RecordingCoordinator>>,
    pub capture: Arc<dyn CaptureBackend>,
}

impl AppState {
    pub fn new(
        config: DockConfig,
        surface: Arc<dyn WindowSurface>,
        capture: Arc<dyn CaptureBackend>,
    ) -> Self {
        let filter = ProcessFilter::from(&config.filter);
        Self {
            registry: Arc::new(parking_lot::Mutex::new(WindowRegistry::new(surface, filter))),
            coordinator: Arc::new(tokio::sync::Mutex::new(RecordingCoordinator::new())),
            capture,
            config,
        }
    }

    /// State wired to the real OS surfaces
    pub fn platform(config: DockConfig) -> Self {
        Self::new(
            config,
            crate::capture::window_surface(),
            Arc::new(PlatformCapture),
        )
    }
}
