//! Navigation capability used by the gateway to send the user to the login view.

use std::sync::Mutex;

pub const LOGIN_PATH: &str = "/login";

pub trait Navigator: Send + Sync {
    /// Path of the view currently shown, or `None` when there is no
    /// interactive view to navigate (background jobs, tests, scripts).
    fn current_path(&self) -> Option<String>;

    fn redirect(&self, path: &str);
}

/// Non-interactive context: nothing to redirect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> Option<String> {
        None
    }

    fn redirect(&self, path: &str) {
        tracing::debug!(path, "Redirect ignored in non-interactive context");
    }
}

/// Interactive navigator that only remembers where it was sent.
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(path.into()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Every path passed to [`Navigator::redirect`], oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> Option<String> {
        self.current.lock().ok().map(|p| p.clone())
    }

    fn redirect(&self, path: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = path.to_string();
        }
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(path.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_navigator_tracks_redirects() {
        let nav = MemoryNavigator::new("/chat");
        assert_eq!(nav.current_path().as_deref(), Some("/chat"));

        nav.redirect(LOGIN_PATH);
        assert_eq!(nav.current_path().as_deref(), Some("/login"));
        assert_eq!(nav.redirects(), vec!["/login".to_string()]);
    }

    #[test]
    fn noop_navigator_is_not_interactive() {
        assert!(NoopNavigator.current_path().is_none());
    }
}
