//! HTTP gateway for the Kasaneha diary API
//!
//! `ApiClient` is the only component that talks to the remote API and the only
//! owner of the bearer token. The token lives in memory and in a durable
//! [`TokenStorage`] under [`TOKEN_KEY`]; both copies are updated together.
//!
//! Every authenticated call goes through [`ApiClient::request`]:
//! - `401` clears the token, redirects an interactive view to `/login`, then
//!   returns [`ApiError::Unauthorized`]
//! - other failures are decoded from `{"error": {"code", "message", "details"}}`
//! - nothing is retried

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::{ApiError, StorageError, FALLBACK_ERROR_MESSAGE};
use crate::models::{
    AnalysisHistoryResponse, AnalysisInsightsResponse, AnalysisResponse, AuthResponse,
    CalendarResponse, CompleteSessionResponse, CreateSessionRequest, CreateSessionResponse,
    ErrorResponse, LoginRequest, RegisterRequest, SendMessageRequest, SendMessageResponse,
    SessionListQuery, SessionMessagesResponse, SessionStats, SessionsResponse,
    TensionScoresResponse, TodaySessionResponse, User,
};
use crate::navigation::{Navigator, LOGIN_PATH};
use crate::storage::TokenStorage;

/// Durable storage key holding the bearer token.
pub const TOKEN_KEY: &str = "kasaneha_token";

/// Versioned path prefix appended to the base URL.
pub const API_PREFIX: &str = "/api/v1";

pub const DEFAULT_SCORE_DAYS: u32 = 30;
pub const DEFAULT_INSIGHT_DAYS: u32 = 7;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
    storage: Arc<dyn TokenStorage>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.is_authenticated())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        storage: Arc<dyn TokenStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::build(config.base_url(), config.timeout(), storage, navigator)
    }

    /// Create a client for an explicit base URL (for testing / scripting)
    pub fn with_base_url(
        base_url: impl Into<String>,
        storage: Arc<dyn TokenStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::build(&base_url.into(), DEFAULT_TIMEOUT, storage, navigator)
    }

    fn build(
        base_url: &str,
        timeout: Duration,
        storage: Arc<dyn TokenStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        let token = match storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored token, starting signed out");
                None
            }
        };

        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::debug!(base_url = %base_url, has_token = token.is_some(), "API client initialized");

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(token),
            storage,
            navigator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------
    // Token
    // ------------------------------------------------------------------

    /// Replace (or with `None`, clear) the token in memory and in durable
    /// storage. An empty token counts as `None`. Durable storage is written
    /// first; if that fails the in-memory token is left as it was.
    pub fn set_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        let token = token.filter(|t| !t.is_empty());
        let mut current = self.token.write().unwrap_or_else(|e| e.into_inner());
        match token {
            Some(t) => self.storage.set(TOKEN_KEY, t)?,
            None => self.storage.remove(TOKEN_KEY)?,
        }
        *current = token.map(str::to_owned);
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True while a token is held. The token is not validated.
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn logout(&self) -> Result<(), StorageError> {
        self.set_token(None)
    }

    // ------------------------------------------------------------------
    // Core request path
    // ------------------------------------------------------------------

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, endpoint)
    }

    /// Issue an authenticated JSON request against `{base_url}/api/v1{endpoint}`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_request(method, endpoint, &[], body).await
    }

    async fn send_request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        tracing::debug!(method = %method, url = %url, "API request");

        let mut builder = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = self.token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        self.execute(builder, &url).await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, endpoint, None).await
    }

    async fn get_with_query<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.send_request::<T, ()>(Method::GET, endpoint, query, None)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %url, "Unauthorized response, clearing token");
            if let Err(e) = self.set_token(None) {
                tracing::error!(error = %e, "Failed to clear stored token after 401");
            }
            self.redirect_to_login();

            let body = response.text().await.unwrap_or_default();
            let (_, message, _) = parse_error_body(&body);
            return Err(ApiError::Unauthorized { message });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message, details) = parse_error_body(&body);

            tracing::error!(
                status = status.as_u16(),
                code = code.as_deref().unwrap_or("-"),
                message = %message,
                "API error"
            );

            return Err(ApiError::Api {
                status: status.as_u16(),
                code,
                message,
                details,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn redirect_to_login(&self) {
        if let Some(path) = self.navigator.current_path() {
            if !path.contains(LOGIN_PATH) {
                tracing::info!(from = %path, "Redirecting to login");
                self.navigator.redirect(LOGIN_PATH);
            }
        }
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// `GET /health`. Plain text, sent without credentials.
    pub async fn health(&self) -> Result<String, ApiError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                code: None,
                message: if body.is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    body
                },
                details: None,
            });
        }
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self
            .request(Method::POST, "/auth/login", Some(credentials))
            .await?;
        self.set_token(Some(&response.token))?;
        Ok(response)
    }

    pub async fn register(&self, user: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self
            .request(Method::POST, "/auth/register", Some(user))
            .await?;
        self.set_token(Some(&response.token))?;
        Ok(response)
    }

    pub async fn get_current_user(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Today's session, created server-side on the first call of the day.
    pub async fn get_today_session(&self) -> Result<TodaySessionResponse, ApiError> {
        let result: TodaySessionResponse = self.get("/sessions/today").await?;
        tracing::debug!(
            session_id = %result.session.id,
            has_initial_message = result.initial_message.is_some(),
            "Today session fetched"
        );
        Ok(result)
    }

    pub async fn create_session(&self, date: NaiveDate) -> Result<CreateSessionResponse, ApiError> {
        self.request(Method::POST, "/sessions", Some(&CreateSessionRequest { date }))
            .await
    }

    pub async fn get_user_sessions(
        &self,
        query: &SessionListQuery,
    ) -> Result<SessionsResponse, ApiError> {
        self.get_with_query("/sessions", &query.to_query_pairs())
            .await
    }

    pub async fn get_session_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionMessagesResponse, ApiError> {
        let result: SessionMessagesResponse =
            self.get(&format!("/sessions/{}/messages", session_id)).await?;
        tracing::debug!(
            session_id,
            count = result.messages.len(),
            "Session messages fetched"
        );
        Ok(result)
    }

    pub async fn send_message(
        &self,
        session_id: &str,
        message: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError> {
        self.request(
            Method::POST,
            &format!("/sessions/{}/messages", session_id),
            Some(message),
        )
        .await
    }

    pub async fn complete_session(
        &self,
        session_id: &str,
    ) -> Result<CompleteSessionResponse, ApiError> {
        self.request::<_, ()>(
            Method::PUT,
            &format!("/sessions/{}/complete", session_id),
            None,
        )
        .await
    }

    pub async fn get_session_stats(&self, session_id: &str) -> Result<SessionStats, ApiError> {
        self.get(&format!("/sessions/{}/stats", session_id)).await
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    pub async fn get_session_analysis(
        &self,
        session_id: &str,
    ) -> Result<AnalysisResponse, ApiError> {
        self.get(&format!("/sessions/{}/analysis", session_id)).await
    }

    pub async fn trigger_session_analysis(
        &self,
        session_id: &str,
    ) -> Result<AnalysisResponse, ApiError> {
        self.request::<_, ()>(
            Method::POST,
            &format!("/sessions/{}/analysis", session_id),
            None,
        )
        .await
    }

    pub async fn get_tension_scores(&self, days: u32) -> Result<TensionScoresResponse, ApiError> {
        self.get_with_query("/analysis/scores", &[("days", days.to_string())])
            .await
    }

    pub async fn get_analysis_insights(
        &self,
        days: u32,
    ) -> Result<AnalysisInsightsResponse, ApiError> {
        self.get_with_query("/analysis/insights", &[("days", days.to_string())])
            .await
    }

    pub async fn get_analysis_history(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<AnalysisHistoryResponse, ApiError> {
        let mut pairs = Vec::new();
        if let Some(limit) = limit.filter(|v| *v > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset.filter(|v| *v > 0) {
            pairs.push(("offset", offset.to_string()));
        }
        self.get_with_query("/analysis/history", &pairs).await
    }

    // ------------------------------------------------------------------
    // Calendar
    // ------------------------------------------------------------------

    pub async fn get_calendar_data(
        &self,
        year: i32,
        month: u32,
    ) -> Result<CalendarResponse, ApiError> {
        self.get(&format!("/calendar/{}/{}", year, month)).await
    }
}

/// Pull `(code, message, details)` out of an error body, falling back to
/// [`FALLBACK_ERROR_MESSAGE`] when the body is absent or not the expected shape.
fn parse_error_body(body: &str) -> (Option<String>, String, Option<serde_json::Value>) {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) => {
            let code = Some(error.code).filter(|c| !c.is_empty());
            let message = if error.message.is_empty() {
                FALLBACK_ERROR_MESSAGE.to_string()
            } else {
                error.message
            };
            (code, message, error.details)
        }
        Err(_) => (None, FALLBACK_ERROR_MESSAGE.to_string(), None),
    }
}

// ============================================================================
// TESTS
// ============================================================================
