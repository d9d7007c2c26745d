use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};

use crate::{
    database::decode,
    error::ApiError,
    model::assignment::{Assignment, Submission, SubmissionStatus},
};

pub mod operations;

const ASSIGNMENT_COLUMNS: &str =
    "a.id, a.title, a.description, a.course_id, a.due_date, a.total_points, a.created_at";

fn assignment_from_row(row: &PgRow) -> Result<Assignment, ApiError> {
    Ok(Assignment {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        course_id: row.try_get("course_id")?,
        due_date: row.try_get("due_date")?,
        total_points: row.try_get("total_points")?,
        created_at: row.try_get("created_at")?,
        submissions: HashMap::new(),
    })
}

/// Returns the id of the assignment the submission belongs to, alongside the submission
fn submission_from_row(row: &PgRow) -> Result<(i32, Submission), ApiError> {
    let assignment_id: i32 = row.try_get("assignment_id")?;
    let submission_date: DateTime<Utc> = row.try_get("submission_date")?;
    let status: String = row.try_get("status")?;

    let submission = Submission {
        student_id: row.try_get("student_id")?,
        submission_date,
        file_url: row.try_get("file_url")?,
        grade: row.try_get("grade")?,
        feedback: row.try_get("feedback")?,
        rating: row.try_get("rating")?,
        status: decode::<SubmissionStatus>(&status)?,
    };

    Ok((assignment_id, submission))
}
