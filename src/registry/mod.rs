//! Window registry
//!
//! Keeps the dock's icon set in step with the running applications:
//! - `refresh()` diffs the OS window list against the displayed set
//! - `activate()` brings a docked window to the foreground

pub mod filter;

use crate::capture::traits::{CaptureError, IconBitmap, WindowHandle, WindowInfo, WindowSurface};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub use filter::ProcessFilter;

/// A window shown in the dock
#[derive(Debug, Clone)]
pub struct TrackedWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub process_name: String,
    pub icon: IconBitmap,
}

/// Serializable view of a docked window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowEntry {
    pub handle: WindowHandle,
    pub title: String,
    pub process_name: String,
}

impl From<&TrackedWindow> for WindowEntry {
    fn from(window: &TrackedWindow) -> Self {
        Self {
            handle: window.handle,
            title: window.title.clone(),
            process_name: window.process_name.clone(),
        }
    }
}

/// Outcome of one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// What happened during an activation attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationReport {
    pub restored: bool,
    pub force_shown: bool,
    /// OS calls that failed; activation carries on regardless
    pub failures: Vec<String>,
}

/// The set of windows displayed in the dock, in first-seen order
pub struct WindowRegistry {
    surface: Arc<dyn WindowSurface>,
    filter: ProcessFilter,
    windows: Vec<TrackedWindow>,
}

impl WindowRegistry {
    pub fn new(surface: Arc<dyn WindowSurface>, filter: ProcessFilter) -> Self {
        tracing::debug!("Window registry using {:?}", filter);
        Self {
            surface,
            filter,
            windows: Vec::new(),
        }
    }

    /// Replace the system-process filter; takes effect on the next refresh
    pub fn set_filter(&mut self, filter: ProcessFilter) {
        self.filter = filter;
    }

    pub fn windows(&self) -> &[TrackedWindow] {
        &self.windows
    }

    pub fn get(&self, handle: WindowHandle) -> Option<&TrackedWindow> {
        self.windows.iter().find(|w| w.handle == handle)
    }

    fn is_candidate(&self, window: &WindowInfo) -> bool {
        !window.title.is_empty() && !window.handle.is_null() && !self.filter.is_system(window)
    }

    /// Re-enumerate OS windows and update the displayed set.
    ///
    /// Never fails: enumeration errors leave the set untouched and per-window
    /// problems fall back to the generic icon.
    pub fn refresh(&mut self) -> RefreshSummary {
        let live = match self.surface.enumerate() {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!("Window enumeration failed, keeping current dock: {}", e);
                return RefreshSummary {
                    total: self.windows.len(),
                    ..Default::default()
                };
            }
        };

        let eligible: Vec<&WindowInfo> = live.iter().filter(|w| self.is_candidate(w)).collect();
        let mut candidates: HashSet<WindowHandle> = HashSet::new();
        let mut added = 0;

        for window in eligible {
            if !candidates.insert(window.handle) {
                continue;
            }

            if let Some(existing) = self.windows.iter_mut().find(|w| w.handle == window.handle) {
                if existing.title != window.title {
                    tracing::trace!("Window {} retitled to {:?}", window.handle, window.title);
                    existing.title = window.title.clone();
                }
                continue;
            }

            let icon = self.surface.icon(window).unwrap_or_else(|| {
                tracing::debug!(
                    "No icon for {} ({}), using generic icon",
                    window.process_name,
                    window.handle
                );
                IconBitmap::generic()
            });

            tracing::debug!("Docking {} \"{}\"", window.handle, window.title);
            self.windows.push(TrackedWindow {
                handle: window.handle,
                title: window.title.clone(),
                process_name: window.process_name.clone(),
                icon,
            });
            added += 1;
        }

        let before = self.windows.len();
        self.windows.retain(|w| {
            let keep = candidates.contains(&w.handle);
            if !keep {
                tracing::debug!("Undocking {} \"{}\"", w.handle, w.title);
            }
            keep
        });
        let removed = before - self.windows.len();

        let summary = RefreshSummary {
            added,
            removed,
            total: self.windows.len(),
        };
        if added > 0 || removed > 0 {
            tracing::info!(
                "Dock refreshed: +{} -{} ({} windows)",
                summary.added,
                summary.removed,
                summary.total
            );
        }
        summary
    }

    /// Bring a window to the foreground.
    ///
    /// Best effort: every step runs even if an earlier one fails.
    pub fn activate(&self, handle: WindowHandle) -> ActivationReport {
        if self.get(handle).is_none() {
            tracing::warn!("Activating {} which is not in the dock", handle);
        }
        activate_window(self.surface.as_ref(), handle)
    }
}

/// Restore, raise, focus, and if still hidden, show a window
pub fn activate_window(surface: &dyn WindowSurface, handle: WindowHandle) -> ActivationReport {
    let mut failures = Vec::new();
    let mut note = |step: &str, result: Result<(), CaptureError>| {
        if let Err(e) = result {
            tracing::warn!("Activation of {}: {} failed: {}", handle, step, e);
            failures.push(format!("{}: {}", step, e));
        }
    };

    let restored = surface.is_minimized(handle);
    if restored {
        note("restore", surface.restore(handle));
    }
    note("bring to top", surface.bring_to_top(handle));
    note("set foreground", surface.set_foreground(handle));

    let force_shown = !surface.is_visible(handle);
    if force_shown {
        note("show", surface.show(handle));
    }

    tracing::debug!("Activated {}", handle);
    ActivationReport {
        restored,
        force_shown,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSurface;

    fn registry(surface: &Arc<FakeSurface>) -> WindowRegistry {
        WindowRegistry::new(surface.clone(), ProcessFilter::default())
    }

    fn handles(registry: &WindowRegistry) -> Vec<isize> {
        registry.windows().iter().map(|w| w.handle.0).collect()
    }

    #[test]
    fn test_refresh_matches_candidate_set() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![
            FakeSurface::window(1, "notepad.exe", "Notes"),
            FakeSurface::window(2, "SearchHost.exe", "Search"),
            FakeSurface::window(0, "daemon.exe", "Background"),
            FakeSurface::window(3, "svc.exe", ""),
            FakeSurface::window(4, "code.exe", "Editor"),
        ]);
        let mut registry = registry(&surface);

        let summary = registry.refresh();
        assert_eq!(handles(&registry), vec![1, 4]);
        assert_eq!(summary, RefreshSummary { added: 2, removed: 0, total: 2 });
    }

    #[test]
    fn test_refresh_is_stable_and_removes_stale() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![
            FakeSurface::window(1, "a.exe", "A"),
            FakeSurface::window(2, "b.exe", "B"),
        ]);
        let mut registry = registry(&surface);
        registry.refresh();

        let again = registry.refresh();
        assert_eq!(again, RefreshSummary { added: 0, removed: 0, total: 2 });

        surface.set_windows(vec![
            FakeSurface::window(2, "b.exe", "B"),
            FakeSurface::window(5, "c.exe", "C"),
        ]);
        let summary = registry.refresh();
        assert_eq!(handles(&registry), vec![2, 5]);
        assert_eq!(summary, RefreshSummary { added: 1, removed: 1, total: 2 });
    }

    #[test]
    fn test_duplicate_handles_docked_once() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![
            FakeSurface::window(7, "a.exe", "A"),
            FakeSurface::window(7, "a.exe", "A"),
        ]);
        let mut registry = registry(&surface);
        registry.refresh();
        assert_eq!(handles(&registry), vec![7]);
    }

    #[test]
    fn test_window_with_emptied_title_is_removed() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(9, "app.exe", "Document")]);
        let mut registry = registry(&surface);
        registry.refresh();
        assert_eq!(handles(&registry), vec![9]);

        // Same handle, still alive, but its title is now empty
        surface.set_windows(vec![FakeSurface::window(9, "app.exe", "")]);
        registry.refresh();
        assert!(registry.windows().is_empty());
    }

    #[test]
    fn test_icon_failure_uses_generic_icon() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(3, "noicon.exe", "No Icon")]);
        surface.fail_icons(true);
        let mut registry = registry(&surface);
        registry.refresh();
        assert_eq!(registry.windows()[0].icon, IconBitmap::generic());
    }

    #[test]
    fn test_enumeration_error_keeps_dock() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(1, "a.exe", "A")]);
        let mut registry = registry(&surface);
        registry.refresh();

        surface.fail_enumeration(true);
        let summary = registry.refresh();
        assert_eq!(summary.total, 1);
        assert_eq!(handles(&registry), vec![1]);
    }

    #[test]
    fn test_title_change_updates_entry() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![FakeSurface::window(1, "a.exe", "Old")]);
        let mut registry = registry(&surface);
        registry.refresh();
        surface.set_windows(vec![FakeSurface::window(1, "a.exe", "New")]);
        registry.refresh();
        assert_eq!(registry.get(WindowHandle(1)).unwrap().title, "New");
    }

    #[test]
    fn test_injected_filter() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_windows(vec![
            FakeSurface::window(1, "SearchHost.exe", "Search"),
            FakeSurface::window(2, "game.exe", "Game"),
        ]);
        let mut registry = WindowRegistry::new(
            surface.clone(),
            ProcessFilter::custom(|w| w.process_name == "game.exe"),
        );
        registry.refresh();
        assert_eq!(handles(&registry), vec![1]);
    }

    #[test]
    fn test_activate_minimized_window() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_minimized(WindowHandle(1), true);
        let report = activate_window(surface.as_ref(), WindowHandle(1));
        assert!(report.restored);
        assert!(!report.force_shown);
        assert_eq!(
            surface.calls(),
            vec!["restore 1", "bring_to_top 1", "set_foreground 1"]
        );
    }

    #[test]
    fn test_activate_hidden_window_continues_after_failures() {
        let surface = Arc::new(FakeSurface::new());
        surface.set_hidden(WindowHandle(2), true);
        surface.fail_activation(true);
        let report = activate_window(surface.as_ref(), WindowHandle(2));
        assert!(report.force_shown);
        assert_eq!(report.failures.len(), 3);
        assert_eq!(
            surface.calls(),
            vec!["bring_to_top 2", "set_foreground 2", "show 2"]
        );
    }
}
