use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalState {
    pub primary_emotion: String,
    #[serde(default)]
    pub emotions: HashMap<String, f64>,
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// AI analysis of one completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub session_id: String,
    pub summary: String,
    pub emotional_state: EmotionalState,
    /// Free-form pattern/progression/recommendation data.
    #[serde(default)]
    pub behavioral_insights: serde_json::Value,
    pub tension_score: i32,
    #[serde(default)]
    pub relative_score: Option<i32>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub raw_analysis_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: Analysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensionScoreData {
    pub date: String,
    pub tension_score: i32,
    pub relative_score: i32,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionTrend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensionStatistics {
    pub average: f64,
    pub min: i32,
    pub max: i32,
    pub trend: TensionTrend,
}

/// `GET /analysis/scores?days=N`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensionScoresResponse {
    pub scores: Vec<TensionScoreData>,
    pub statistics: TensionStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInsight {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub message: String,
    /// Either a number or a string depending on the insight.
    pub value: serde_json::Value,
}

/// `GET /analysis/insights?days=N`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInsightsResponse {
    pub insights: Vec<AnalysisInsight>,
    pub timeframe: u32,
    pub statistics: TensionStatistics,
}

/// `GET /analysis/history`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisHistoryResponse {
    pub message: String,
    pub limit: u32,
    pub offset: u32,
}
