//! Authentication state: the signed-in user and the auth lifecycle flags.

use std::sync::Arc;

use kasaneha_core::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use kasaneha_core::{ApiClient, ApiError};
use tokio::sync::watch;

use crate::guard::OnDrop;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set once the start-up user check has finished, whatever its outcome.
    /// `user` is `None` while that check is still pending, so gate on this.
    pub is_initialized: bool,
}

impl AuthState {
    /// Derived from `user`; there is no separate flag to keep in sync.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Clone)]
pub struct AuthStore {
    api: Arc<ApiClient>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthStore {
    /// Store with no start-up check. Use [`AuthStore::start`] in interactive
    /// front ends.
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            state: Arc::new(state),
        }
    }

    /// Create the store and spawn the one start-up [`AuthStore::load_current_user`].
    /// Must be called inside a tokio runtime.
    pub fn start(api: Arc<ApiClient>) -> Self {
        let store = Self::new(api);
        let bootstrap = store.clone();
        tokio::spawn(async move {
            bootstrap.load_current_user().await;
        });
        store
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_initialized
    }

    /// Wait until the start-up user check has completed.
    pub async fn wait_initialized(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|s| s.is_initialized).await;
    }

    fn begin_loading(&self) -> OnDrop<impl FnOnce()> {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let state = self.state.clone();
        OnDrop::new(move || state.send_modify(|s| s.is_loading = false))
    }

    fn record_error(&self, err: &ApiError) {
        let message = err.to_string();
        self.state.send_modify(|s| s.error = Some(message));
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        tracing::info!(username, "Login started");
        let _loading = self.begin_loading();

        let credentials = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&credentials).await {
            Ok(response) => {
                tracing::info!(user_id = %response.user.id, "Login succeeded");
                let user = response.user.clone();
                self.state.send_modify(|s| s.user = Some(user));
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<AuthResponse, ApiError> {
        let _loading = self.begin_loading();

        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.map(str::to_owned),
        };
        match self.api.register(&request).await {
            Ok(response) => {
                tracing::info!(user_id = %response.user.id, "Registration succeeded");
                let user = response.user.clone();
                self.state.send_modify(|s| s.user = Some(user));
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Resolve the stored token into a user. Without a token this makes no
    /// request. A failed lookup signs out and records the error instead of
    /// returning it.
    ///
    /// `is_initialized` becomes true in the same update that clears
    /// `is_loading` and fills in `user` or `error`, so a caller woken by
    /// [`AuthStore::wait_initialized`] always sees the final state.
    pub async fn load_current_user(&self) -> Option<User> {
        if !self.api.is_authenticated() {
            tracing::debug!("No token found, skipping user load");
            self.state.send_modify(|s| s.is_initialized = true);
            return None;
        }

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        // A no-op unless the future is dropped before an outcome is published.
        let state = self.state.clone();
        let _cancelled = OnDrop::new(move || {
            state.send_if_modified(|s| {
                let changed = s.is_loading || !s.is_initialized;
                s.is_loading = false;
                s.is_initialized = true;
                changed
            });
        });

        match self.api.get_current_user().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Current user loaded");
                let loaded = user.clone();
                self.state.send_modify(|s| {
                    s.user = Some(loaded);
                    s.is_loading = false;
                    s.is_initialized = true;
                });
                Some(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load current user");
                self.clear_token();
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.user = None;
                    s.error = Some(message);
                    s.is_loading = false;
                    s.is_initialized = true;
                });
                None
            }
        }
    }

    /// Safe to call in any state.
    pub fn logout(&self) {
        tracing::info!("Logout");
        self.clear_token();
        self.state.send_modify(|s| {
            s.user = None;
            s.error = None;
            s.is_initialized = true;
        });
    }

    fn clear_token(&self) {
        if let Err(e) = self.api.logout() {
            tracing::error!(error = %e, "Failed to clear stored token");
        }
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }
}
