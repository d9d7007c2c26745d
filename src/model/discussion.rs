use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: i32,
    pub content: String,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub course_id: i32,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    /// Newest first
    pub replies: Vec<Reply>,
}
