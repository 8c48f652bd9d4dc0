use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One day's diary conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub session_date: DateTime<Utc>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Copy of this session marked completed at `completed_at`. Every other
    /// field is carried over unchanged.
    pub fn completed(&self, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: SessionStatus::Completed,
            completed_at: Some(completed_at),
            ..self.clone()
        }
    }
}

/// `GET /sessions/today`. The server creates the session on first call of the
/// day and then also returns the AI's opening message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodaySessionResponse {
    pub session: ChatSession,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<Message>,
}

/// `GET /sessions/:id/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessagesResponse {
    pub session: ChatSession,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    #[serde(with = "date_format")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session: ChatSession,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<Message>,
}

/// `PUT /sessions/:id/complete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSessionResponse {
    pub message: String,
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
}

/// `GET /sessions/:id/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub message_count: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub date: String,
    pub status: SessionStatus,
    pub message_count: u32,
    pub has_analysis: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
}

/// `GET /sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
    pub pagination: Pagination,
}

/// Filters for `GET /sessions`. Zero/unset values are left off the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl SessionListQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit.filter(|v| *v > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|v| *v > 0) {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(year) = self.year.filter(|v| *v > 0) {
            pairs.push(("year", year.to_string()));
        }
        if let Some(month) = self.month.filter(|v| *v > 0) {
            pairs.push(("month", month.to_string()));
        }
        pairs
    }
}

mod date_format {
    use chrono::NaiveDate;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }
}
