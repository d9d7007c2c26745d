use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: i32,
    pub enrollment_date: DateTime<Utc>,
    /// Percentage in 0..=100
    pub progress: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub instructor_id: i32,
    pub created_at: DateTime<Utc>,
    pub enrolled_students: Vec<Enrollment>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Course {
    pub fn is_instructor(&self, user_id: i32) -> bool {
        self.instructor_id == user_id
    }

    pub fn is_enrolled(&self, student_id: i32) -> bool {
        self.enrolled_students
            .iter()
            .any(|e| e.student_id == student_id)
    }

    pub fn enroll(&mut self, student_id: i32, now: DateTime<Utc>) -> Result<&Enrollment, ApiError> {
        if self.is_enrolled(student_id) {
            return Err(ApiError::validation("Already enrolled in this course"));
        }

        self.enrolled_students.push(Enrollment {
            student_id,
            enrollment_date: now,
            progress: 0,
        });

        // Just pushed, so the list is non-empty
        let last = self.enrolled_students.len() - 1;
        Ok(&self.enrolled_students[last])
    }

    pub fn unenroll(&mut self, student_id: i32) -> Result<Enrollment, ApiError> {
        let Some(index) = self
            .enrolled_students
            .iter()
            .position(|e| e.student_id == student_id)
        else {
            return Err(ApiError::validation("Not enrolled in this course"));
        };

        Ok(self.enrolled_students.remove(index))
    }

    pub fn apply(&mut self, update: CourseUpdate) {
        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            self.title = title;
        }
        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            self.description = description;
        }
        if let Some(category) = update.category.filter(|c| !c.is_empty()) {
            self.category = category;
        }
        if let Some(start_date) = update.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            self.end_date = end_date;
        }
    }
}
