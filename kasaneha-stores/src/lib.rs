//! Observable client state for the Kasaneha diary.
//!
//! Each store owns its state and publishes snapshots through a
//! `tokio::sync::watch` channel. Handles are cheap to clone; create each store
//! once at start-up and share the handle.

pub mod auth;
pub mod chat;
mod guard;
pub mod notifications;

pub use auth::{AuthState, AuthStore};
pub use chat::{ChatState, ChatStore};
pub use notifications::{
    NewNotification, Notification, NotificationId, NotificationKind, NotificationStore,
    DEFAULT_NOTIFICATION_DURATION,
};
