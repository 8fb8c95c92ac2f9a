//! Navigation sink
//!
//! The bootstrapper never renders anything; it only tells the host where to go.

use std::sync::Mutex;
use tracing::info;

/// Receives navigation requests
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Logs every navigation request
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        info!("Navigate to {}", path);
    }
}

/// Collects navigation requests in order
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path requested so far
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Most recent path
    pub fn last(&self) -> Option<String> {
        self.paths.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.to_string());
        }
    }
}
