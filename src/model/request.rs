use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::model::{
    assignment::{AssignmentUpdate, Grading},
    course::CourseUpdate,
    role::Role,
};

const NAIVE_DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Reads an RFC 3339 timestamp, a zone-less `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) or a bare
/// `YYYY-MM-DD` (midnight UTC)
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// An empty string counts as an absent date
fn deserialize_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if text.trim().is_empty() {
        return Ok(None);
    }

    parse_date(&text)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid date: {text:?}")))
}

/// The body of every JSON request. Handlers destructure the fields they require and reject the
/// request when one is missing.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientRequest {
    // Accounts
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,

    // Courses, materials, discussions, assignments
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "deserialize_date")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_date")]
    pub end_date: Option<DateTime<Utc>>,
    pub course: Option<i32>,
    pub content: Option<String>,

    // Assignments
    #[serde(deserialize_with = "deserialize_date")]
    pub due_date: Option<DateTime<Utc>>,
    pub total_points: Option<i32>,

    // Submissions and materials
    pub file_url: Option<String>,
    pub file_type: Option<String>,

    // Grading
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
}

impl ClientRequest {
    /// Returns (email, password)
    pub fn login(&self) -> Option<(String, String)> {
        if let (Some(email), Some(password)) = (self.email.clone(), self.password.clone()) {
            Some((email, password))
        } else {
            None
        }
    }

    pub fn assignment_update(&self) -> AssignmentUpdate {
        AssignmentUpdate {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            total_points: self.total_points,
        }
    }

    pub fn course_update(&self) -> CourseUpdate {
        CourseUpdate {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// `None` when no grade was given
    pub fn grading(&self) -> Option<Grading> {
        Some(Grading {
            grade: self.grade?,
            feedback: self.feedback.clone().unwrap_or_default(),
            rating: self.rating,
        })
    }
}
