pub mod analysis;
pub mod auth;
pub mod calendar;
pub mod message;
pub mod session;
pub mod user;

pub use analysis::{
    Analysis, AnalysisHistoryResponse, AnalysisInsight, AnalysisInsightsResponse,
    AnalysisResponse, EmotionalState, TensionScoreData, TensionScoresResponse,
    TensionStatistics, TensionTrend,
};
pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use calendar::{CalendarDay, CalendarMonthData, CalendarResponse};
pub use message::{
    Message, MessageId, Sender, SendMessageRequest, SendMessageResponse,
};
pub use session::{
    ChatSession, CompleteSessionResponse, CreateSessionRequest, CreateSessionResponse,
    Pagination, SessionListQuery, SessionMessagesResponse, SessionStats, SessionStatus,
    SessionSummary, SessionsResponse, TodaySessionResponse,
};
pub use user::User;

use serde::{Deserialize, Serialize};

/// Error body returned by the API on any non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
