use chrono::{DateTime, Utc};

use crate::{
    authz::AssignmentScope,
    database::{
        assignment::{ASSIGNMENT_COLUMNS, assignment_from_row, submission_from_row},
        pool,
    },
    error::ApiError,
    model::assignment::{Assignment, Submission},
};

/// Loads the submissions of every given assignment with one query
async fn attach_submissions(assignments: &mut [Assignment]) -> Result<(), ApiError> {
    if assignments.is_empty() {
        return Ok(());
    }

    let ids = assignments.iter().map(|a| a.id).collect::<Vec<i32>>();
    let rows = sqlx::query(
        "SELECT assignment_id, student_id, submission_date, file_url, grade, feedback, rating, status
        FROM submissions
        WHERE assignment_id = ANY($1);",
    )
    .bind(ids)
    .fetch_all(pool()?)
    .await?;

    for row in &rows {
        let (assignment_id, submission) = submission_from_row(row)?;
        if let Some(assignment) = assignments.iter_mut().find(|a| a.id == assignment_id) {
            assignment
                .submissions
                .insert(submission.student_id, submission);
        }
    }

    Ok(())
}

pub async fn get_assignment(assignment_id: i32) -> Result<Option<Assignment>, ApiError> {
    let row = sqlx::query(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a WHERE a.id = $1;"
    ))
    .bind(assignment_id)
    .fetch_optional(pool()?)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut assignments = [assignment_from_row(&row)?];
    attach_submissions(&mut assignments).await?;
    let [assignment] = assignments;
    Ok(Some(assignment))
}

/// Lists the assignments visible under `scope`, optionally narrowed to one course, soonest due
/// first
pub async fn list_assignments(
    scope: AssignmentScope,
    course_id: Option<i32>,
) -> Result<Vec<Assignment>, ApiError> {
    let (join, user_id) = match scope {
        AssignmentScope::All => ("", None),
        AssignmentScope::EnrolledBy(student_id) => (
            "JOIN enrollments e ON e.course_id = a.course_id AND e.student_id = $2",
            Some(student_id),
        ),
        AssignmentScope::TaughtBy(instructor_id) => (
            "JOIN courses c ON c.id = a.course_id AND c.instructor_id = $2",
            Some(instructor_id),
        ),
    };

    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS}
        FROM assignments a
        {join}
        WHERE ($1::INTEGER IS NULL OR a.course_id = $1)
        ORDER BY a.due_date ASC, a.id ASC;"
    );

    let mut query = sqlx::query(&sql).bind(course_id);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }

    let rows = query.fetch_all(pool()?).await?;

    let mut assignments = rows
        .iter()
        .map(assignment_from_row)
        .collect::<Result<Vec<Assignment>, ApiError>>()?;
    attach_submissions(&mut assignments).await?;
    Ok(assignments)
}

pub async fn create_assignment(
    title: String,
    description: String,
    course_id: i32,
    due_date: DateTime<Utc>,
    total_points: i32,
) -> Result<Assignment, ApiError> {
    let row = sqlx::query(&format!(
        "INSERT INTO assignments AS a (title, description, course_id, due_date, total_points)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ASSIGNMENT_COLUMNS};"
    ))
    .bind(title)
    .bind(description)
    .bind(course_id)
    .bind(due_date)
    .bind(total_points)
    .fetch_one(pool()?)
    .await?;

    assignment_from_row(&row)
}

/// Writes back the assignment's own fields. Submissions are written with [`submit`] and
/// [`record_grade`]. The write is refused when a grade stored in the meantime exceeds the new
/// `total_points`.
pub async fn save_assignment(assignment: &Assignment) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE assignments
        SET title = $2, description = $3, due_date = $4, total_points = $5
        WHERE id = $1
            AND NOT EXISTS (
                SELECT 1 FROM submissions WHERE assignment_id = $1 AND grade > $5
            );",
    )
    .bind(assignment.id)
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(assignment.due_date)
    .bind(assignment.total_points)
    .execute(pool()?)
    .await?;

    written_or(
        result.rows_affected(),
        "totalPoints cannot be lower than an awarded grade",
    )
}

pub async fn delete_assignment(assignment_id: i32) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = $1;")
        .bind(assignment_id)
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Maps an update that matched no row onto a validation failure
fn written_or(rows_affected: u64, message: &str) -> Result<(), ApiError> {
    if rows_affected == 0 {
        Err(ApiError::validation(message))
    } else {
        Ok(())
    }
}

const SUBMIT_UPSERT: &str = "INSERT INTO submissions
        (assignment_id, student_id, submission_date, file_url, grade, feedback, rating, status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (assignment_id, student_id) DO UPDATE
    SET submission_date = EXCLUDED.submission_date,
        file_url = EXCLUDED.file_url,
        grade = EXCLUDED.grade,
        feedback = EXCLUDED.feedback,
        rating = EXCLUDED.rating,
        status = EXCLUDED.status
    WHERE submissions.status <> 'graded';";

/// Upserts the student's submission. Concurrent submits for the same student race and the last
/// one wins, but a submission graded in the meantime is left alone and the write is refused.
pub async fn submit(assignment_id: i32, submission: &Submission) -> Result<(), ApiError> {
    let result = sqlx::query(SUBMIT_UPSERT)
        .bind(assignment_id)
        .bind(submission.student_id)
        .bind(submission.submission_date)
        .bind(&submission.file_url)
        .bind(submission.grade)
        .bind(&submission.feedback)
        .bind(submission.rating)
        .bind(submission.status.as_str())
        .execute(pool()?)
        .await?;

    written_or(result.rows_affected(), "Submission already graded")
}

/// Stores the grading fields of an existing submission. The grade is checked again against the
/// stored `total_points`, which may have changed since the assignment was loaded.
pub async fn record_grade(assignment_id: i32, submission: &Submission) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE submissions s
        SET grade = $3, feedback = $4, rating = $5, status = $6
        FROM assignments a
        WHERE s.assignment_id = $1
            AND s.student_id = $2
            AND a.id = s.assignment_id
            AND $3 <= a.total_points;",
    )
    .bind(assignment_id)
    .bind(submission.student_id)
    .bind(submission.grade)
    .bind(&submission.feedback)
    .bind(submission.rating)
    .bind(submission.status.as_str())
    .execute(pool()?)
    .await?;

    written_or(
        result.rows_affected(),
        "Submission no longer exists or grade exceeds totalPoints",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_writes_are_validation_errors() {
        assert!(written_or(1, "unused").is_ok());

        let err = written_or(0, "Submission already graded").unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Submission already graded"));
    }

    #[test]
    fn submit_upsert_never_touches_graded_rows() {
        let (_, update) = SUBMIT_UPSERT.split_once("DO UPDATE").unwrap();
        assert!(update.trim_end().ends_with("WHERE submissions.status <> 'graded';"));
    }
}
