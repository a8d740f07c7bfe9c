//! System-process filter
//!
//! Decides which windows are shell or system chrome that the dock hides.

use crate::capture::traits::WindowInfo;
use crate::config::FilterConfig;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&WindowInfo) -> bool + Send + Sync;

/// Predicate returning `true` for windows that must not be shown
#[derive(Clone)]
pub struct ProcessFilter {
    is_system: Arc<Predicate>,
    description: String,
}

impl ProcessFilter {
    /// Pattern filter: a window is a system window when its process name or
    /// title contains any `deny` pattern (case-insensitive), unless the
    /// process name matches an `allow` entry.
    pub fn from_patterns(deny: &[String], allow: &[String]) -> Self {
        let deny: Vec<String> = deny
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.to_lowercase())
            .collect();
        let allow: Vec<String> = allow.iter().map(|p| normalize_process_name(p)).collect();
        let description = format!("{} deny / {} allow patterns", deny.len(), allow.len());

        let is_system = move |window: &WindowInfo| {
            let process = normalize_process_name(&window.process_name);
            if allow.iter().any(|a| *a == process) {
                return false;
            }
            let title = window.title.to_lowercase();
            deny.iter()
                .any(|pattern| process.contains(pattern.as_str()) || title.contains(pattern.as_str()))
        };

        Self {
            is_system: Arc::new(is_system),
            description,
        }
    }

    /// Wrap an arbitrary predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&WindowInfo) -> bool + Send + Sync + 'static,
    {
        Self {
            is_system: Arc::new(predicate),
            description: "custom predicate".to_string(),
        }
    }

    /// Filter that hides nothing
    pub fn allow_all() -> Self {
        Self::custom(|_| false)
    }

    pub fn is_system(&self, window: &WindowInfo) -> bool {
        (self.is_system)(window)
    }
}

impl From<&FilterConfig> for ProcessFilter {
    fn from(config: &FilterConfig) -> Self {
        Self::from_patterns(&config.deny, &config.allow)
    }
}

impl Default for ProcessFilter {
    fn default() -> Self {
        Self::from(&FilterConfig::default())
    }
}

impl fmt::Debug for ProcessFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessFilter")
            .field("description", &self.description)
            .finish()
    }
}

/// Lowercase with any trailing ".exe" removed
fn normalize_process_name(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}
