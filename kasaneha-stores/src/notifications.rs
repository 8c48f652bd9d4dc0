//! Transient user-facing notifications with timed expiry.
//!
//! Each notification with a positive duration gets an expiry task. The task is
//! tracked by id and aborted when the notification is removed or the list is
//! cleared, and it only holds a weak reference to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
    /// Effective lifetime; always positive.
    pub duration: Duration,
}

/// A notification before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub message: String,
    /// `None` or zero picks the store's default duration.
    pub duration: Option<Duration>,
}

#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<Vec<Notification>>,
    timers: Mutex<HashMap<NotificationId, AbortHandle>>,
    next_id: AtomicU64,
    default_duration: Duration,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<NotificationId, AbortHandle>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_entry(&self, id: NotificationId) -> bool {
        self.state.send_if_modified(|list| {
            let before = list.len();
            list.retain(|n| n.id != id);
            list.len() != before
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, timer) in self.timers().drain() {
            timer.abort();
        }
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_NOTIFICATION_DURATION)
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                state,
                timers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                default_duration,
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.state.subscribe()
    }

    /// Append a notification and return its id. A missing or zero duration
    /// falls back to the store default. Removal is scheduled after the
    /// duration; scheduling needs a tokio runtime and is skipped without one.
    pub fn add(&self, notification: NewNotification) -> NotificationId {
        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let duration = notification
            .duration
            .filter(|d| !d.is_zero())
            .unwrap_or(self.inner.default_duration);

        let entry = Notification {
            id,
            kind: notification.kind,
            message: notification.message,
            duration,
        };
        self.inner.state.send_modify(|list| list.push(entry));

        if !duration.is_zero() {
            self.schedule_expiry(id, duration);
        }
        id
    }

    fn schedule_expiry(&self, id: NotificationId, duration: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%id, "No runtime available, notification will not expire");
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        // Holding the lock across spawn keeps the expiry task from running its
        // cleanup before its handle is registered.
        let mut timers = self.inner.timers();
        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                inner.timers().remove(&id);
                if inner.remove_entry(id) {
                    tracing::debug!(%id, "Notification expired");
                }
            }
        });
        timers.insert(id, task.abort_handle());
    }

    /// Remove a notification and cancel its expiry. Unknown ids are ignored.
    pub fn remove(&self, id: NotificationId) {
        if let Some(timer) = self.inner.timers().remove(&id) {
            timer.abort();
        }
        self.inner.remove_entry(id);
    }

    pub fn clear(&self) {
        for (_, timer) in self.inner.timers().drain() {
            timer.abort();
        }
        self.inner.state.send_modify(|list| list.clear());
    }

    pub fn success(&self, message: impl Into<String>, duration: Option<Duration>) -> NotificationId {
        self.push(NotificationKind::Success, message, duration)
    }

    pub fn error(&self, message: impl Into<String>, duration: Option<Duration>) -> NotificationId {
        self.push(NotificationKind::Error, message, duration)
    }

    pub fn warning(&self, message: impl Into<String>, duration: Option<Duration>) -> NotificationId {
        self.push(NotificationKind::Warning, message, duration)
    }

    pub fn info(&self, message: impl Into<String>, duration: Option<Duration>) -> NotificationId {
        self.push(NotificationKind::Info, message, duration)
    }

    fn push(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> NotificationId {
        self.add(NewNotification {
            kind,
            message: message.into(),
            duration,
        })
    }

    #[cfg(test)]
    fn scheduled(&self) -> usize {
        self.inner.timers().len()
    }
}
