use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub has_session: bool,
    #[serde(default)]
    pub tension_score: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarMonthData {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

/// `GET /calendar/:year/:month`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarResponse {
    pub month_data: CalendarMonthData,
}
