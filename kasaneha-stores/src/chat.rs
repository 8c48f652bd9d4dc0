//! Chat state: the current diary session and its messages.
//!
//! Messages are kept in server order. Optimistic messages carry a
//! [`MessageId::Pending`](kasaneha_core::models::MessageId::Pending) id until a
//! send succeeds, at which point every pending message is dropped and the two
//! confirmed messages from the server are appended.

use std::sync::Arc;

use kasaneha_core::models::{
    ChatSession, CompleteSessionResponse, Message, SendMessageRequest, SendMessageResponse,
    SessionMessagesResponse, TodaySessionResponse,
};
use kasaneha_core::{ApiClient, ApiError};
use tokio::sync::watch;

use crate::guard::OnDrop;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub current_session: Option<ChatSession>,
    pub messages: Vec<Message>,
    pub is_sending: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct ChatStore {
    api: Arc<ApiClient>,
    state: Arc<watch::Sender<ChatState>>,
}

impl ChatStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            api,
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn current_session(&self) -> Option<ChatSession> {
        self.state.borrow().current_session.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.state.borrow().is_sending
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    fn begin_loading(&self) -> OnDrop<impl FnOnce()> {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let state = self.state.clone();
        OnDrop::new(move || state.send_modify(|s| s.is_loading = false))
    }

    fn begin_sending(&self) -> OnDrop<impl FnOnce()> {
        self.state.send_modify(|s| {
            s.is_sending = true;
            s.error = None;
        });
        let state = self.state.clone();
        OnDrop::new(move || state.send_modify(|s| s.is_sending = false))
    }

    fn record_error<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            let message = e.to_string();
            self.state.send_modify(|s| s.error = Some(message));
        }
        result
    }

    // ------------------------------------------------------------------
    // Network actions
    // ------------------------------------------------------------------

    /// Fetch (or have the server create) today's session, then its messages.
    ///
    /// When the server hands back an opening message the list becomes exactly
    /// that message. Otherwise the history is fetched with a second request,
    /// which is only issued after the session response has arrived because it
    /// needs the session id.
    pub async fn load_today_session(&self) -> Result<TodaySessionResponse, ApiError> {
        let _loading = self.begin_loading();
        let result = self.fetch_today_session().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to load today session");
        }
        self.record_error(result)
    }

    async fn fetch_today_session(&self) -> Result<TodaySessionResponse, ApiError> {
        let response = self.api.get_today_session().await?;
        tracing::info!(session_id = %response.session.id, "Session loaded");

        let session = response.session.clone();
        self.state.send_modify(|s| s.current_session = Some(session));

        match &response.initial_message {
            Some(initial) => {
                tracing::debug!("Using initial message from session creation");
                let initial = initial.clone();
                self.state.send_modify(|s| s.messages = vec![initial]);
            }
            None => {
                let history = self.api.get_session_messages(&response.session.id).await?;
                tracing::debug!(count = history.messages.len(), "Loaded session history");
                self.state.send_modify(|s| s.messages = history.messages);
            }
        }

        Ok(response)
    }

    /// Load any session by id. One request returns both the session and its messages.
    pub async fn load_session_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionMessagesResponse, ApiError> {
        let _loading = self.begin_loading();

        let result = self.api.get_session_messages(session_id).await;
        match &result {
            Ok(response) => {
                tracing::info!(
                    session_id = %response.session.id,
                    count = response.messages.len(),
                    "Session messages loaded"
                );
                let session = response.session.clone();
                let messages = response.messages.clone();
                self.state.send_modify(|s| {
                    s.current_session = Some(session);
                    s.messages = messages;
                });
            }
            Err(e) => tracing::error!(session_id, error = %e, "Failed to load session messages"),
        }
        self.record_error(result)
    }

    /// Send `content` in the current session. Fails with
    /// [`ApiError::NoActiveSession`] before any request if no session is loaded.
    pub async fn send_message(&self, content: &str) -> Result<SendMessageResponse, ApiError> {
        let session_id = self
            .state
            .borrow()
            .current_session
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(ApiError::NoActiveSession)?;

        let _sending = self.begin_sending();

        let request = SendMessageRequest {
            content: content.to_string(),
        };
        let result = self.api.send_message(&session_id, &request).await;
        if let Ok(response) = &result {
            let user_message = response.user_message.clone();
            let ai_response = response.ai_response.clone();
            self.state.send_modify(|s| {
                s.messages.retain(|m| !m.is_pending());
                s.messages.push(user_message);
                s.messages.push(ai_response);
            });
        }
        self.record_error(result)
    }

    /// Mark the current session completed. Only `status` and `completed_at`
    /// change locally; nothing else is refetched.
    pub async fn complete_session(&self) -> Result<CompleteSessionResponse, ApiError> {
        let session = self.current_session().ok_or(ApiError::NoActiveSession)?;

        let _loading = self.begin_loading();

        let result = self.api.complete_session(&session.id).await;
        if let Ok(response) = &result {
            tracing::info!(session_id = %session.id, "Session completed");
            let completed = session.completed(response.completed_at);
            self.state.send_modify(|s| s.current_session = Some(completed));
        }
        self.record_error(result)
    }

    // ------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------

    pub fn clear_session(&self) {
        self.state.send_modify(|s| {
            s.current_session = None;
            s.messages.clear();
            s.error = None;
        });
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    /// Append a message, typically a pending one shown before the server replies.
    pub fn add_message(&self, message: Message) {
        self.state.send_modify(|s| s.messages.push(message));
    }

    /// Replace the final message. No-op on an empty list.
    pub fn replace_last_message(&self, message: Message) {
        self.state.send_if_modified(|s| match s.messages.last_mut() {
            Some(last) => {
                *last = message;
                true
            }
            None => false,
        });
    }

    /// Drop every pending message, keeping the rest in order.
    pub fn remove_temp_messages(&self) {
        self.state.send_if_modified(|s| {
            let before = s.messages.len();
            s.messages.retain(|m| !m.is_pending());
            s.messages.len() != before
        });
    }
}
