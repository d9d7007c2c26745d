use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};

use crate::{
    database::pool,
    error::ApiError,
    model::course::{Course, Enrollment},
};

const COURSE_COLUMNS: &str =
    "id, title, description, category, start_date, end_date, instructor_id, created_at";

fn course_from_row(row: &PgRow) -> Result<Course, ApiError> {
    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        instructor_id: row.try_get("instructor_id")?,
        created_at: row.try_get("created_at")?,
        enrolled_students: vec![],
    })
}

/// Fills in the enrollment lists of the given courses with a single query
async fn attach_enrollments(courses: &mut [Course]) -> Result<(), ApiError> {
    if courses.is_empty() {
        return Ok(());
    }

    let ids = courses.iter().map(|c| c.id).collect::<Vec<i32>>();
    let rows = sqlx::query(
        "SELECT course_id, student_id, enrollment_date, progress
        FROM enrollments
        WHERE course_id = ANY($1)
        ORDER BY enrollment_date ASC, student_id ASC;",
    )
    .bind(ids)
    .fetch_all(pool()?)
    .await?;

    let mut by_course: HashMap<i32, Vec<Enrollment>> = HashMap::new();
    for row in rows {
        let course_id: i32 = row.try_get("course_id")?;
        let enrollment_date: DateTime<Utc> = row.try_get("enrollment_date")?;
        by_course.entry(course_id).or_default().push(Enrollment {
            student_id: row.try_get("student_id")?,
            enrollment_date,
            progress: row.try_get("progress")?,
        });
    }

    for course in courses.iter_mut() {
        course.enrolled_students = by_course.remove(&course.id).unwrap_or_default();
    }

    Ok(())
}

pub async fn get_course(course_id: i32) -> Result<Option<Course>, ApiError> {
    let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1;"))
        .bind(course_id)
        .fetch_optional(pool()?)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut courses = [course_from_row(&row)?];
    attach_enrollments(&mut courses).await?;
    let [course] = courses;
    Ok(Some(course))
}

pub async fn list_courses() -> Result<Vec<Course>, ApiError> {
    let rows = sqlx::query(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC, id DESC;"
    ))
    .fetch_all(pool()?)
    .await?;

    let mut courses = rows
        .iter()
        .map(course_from_row)
        .collect::<Result<Vec<Course>, ApiError>>()?;
    attach_enrollments(&mut courses).await?;
    Ok(courses)
}

pub async fn courses_by_instructor(instructor_id: i32) -> Result<Vec<Course>, ApiError> {
    let rows = sqlx::query(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses
        WHERE instructor_id = $1
        ORDER BY created_at DESC, id DESC;"
    ))
    .bind(instructor_id)
    .fetch_all(pool()?)
    .await?;

    let mut courses = rows
        .iter()
        .map(course_from_row)
        .collect::<Result<Vec<Course>, ApiError>>()?;
    attach_enrollments(&mut courses).await?;
    Ok(courses)
}

pub async fn create_course(
    title: String,
    description: String,
    category: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    instructor_id: i32,
) -> Result<Course, ApiError> {
    let row = sqlx::query(&format!(
        "INSERT INTO courses (title, description, category, start_date, end_date, instructor_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COURSE_COLUMNS};"
    ))
    .bind(title)
    .bind(description)
    .bind(category)
    .bind(start_date)
    .bind(end_date)
    .bind(instructor_id)
    .fetch_one(pool()?)
    .await?;

    course_from_row(&row)
}

/// Writes back the course's own fields. Enrollments are written separately.
pub async fn save_course(course: &Course) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE courses
        SET title = $2, description = $3, category = $4, start_date = $5, end_date = $6
        WHERE id = $1;",
    )
    .bind(course.id)
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.category)
    .bind(course.start_date)
    .bind(course.end_date)
    .execute(pool()?)
    .await?;

    Ok(())
}

pub async fn delete_course(course_id: i32) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1;")
        .bind(course_id)
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_enrollment(course_id: i32, enrollment: &Enrollment) -> Result<(), ApiError> {
    let result = sqlx::query(
        "INSERT INTO enrollments (course_id, student_id, enrollment_date, progress)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (course_id, student_id) DO NOTHING;",
    )
    .bind(course_id)
    .bind(enrollment.student_id)
    .bind(enrollment.enrollment_date)
    .bind(enrollment.progress)
    .execute(pool()?)
    .await?;

    // A concurrent request got there first
    if result.rows_affected() == 0 {
        return Err(ApiError::validation("Already enrolled in this course"));
    }

    Ok(())
}

pub async fn remove_enrollment(course_id: i32, student_id: i32) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM enrollments WHERE course_id = $1 AND student_id = $2;")
        .bind(course_id)
        .bind(student_id)
        .execute(pool()?)
        .await?;

    Ok(())
}
