//! Discrete user activity events feeding the engagement window.

use serde::{Deserialize, Serialize};

/// Kind of a recorded activity event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Comment,
    Upload,
    SurveyAnswer,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Comment => "comment",
            ActivityKind::Upload => "upload",
            ActivityKind::SurveyAnswer => "survey_answer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "comment" => Some(ActivityKind::Comment),
            "upload" => Some(ActivityKind::Upload),
            "survey_answer" => Some(ActivityKind::SurveyAnswer),
            _ => None,
        }
    }
}

/// One activity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub created_at: String,
}
