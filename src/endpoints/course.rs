use axum::{
    Extension,
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    authz::{self, Operation},
    database,
    endpoints::{JsonBody, json_response, ok_response, parse_id, required},
    error::ApiError,
    model::{course::Course, request::ClientRequest, user::Actor},
};

/// Reply to course creation. Every user is told about a new course.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCreated {
    pub course: Course,
    pub message: &'static str,
    pub notified_users: i64,
}

async fn load_course(path_params: &[String]) -> Result<Course, ApiError> {
    let course_id = parse_id(path_params, 0, "Course")?;
    database::course::get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

/// Lists the courses taught by one instructor, newest first
pub async fn instructor_courses(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let instructor_id = parse_id(&path_params, 0, "Instructor")?;

    authz::require(&actor, Operation::ListInstructorCourses { instructor_id })?;

    let courses = database::course::courses_by_instructor(instructor_id).await?;
    json_response(StatusCode::OK, &courses)
}

/// Creates a course taught by the caller
pub async fn create_course(
    Extension(actor): Extension<Actor>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    authz::require(&actor, Operation::CreateCourse)?;

    let ClientRequest {
        title,
        description,
        category,
        start_date: Some(start_date),
        end_date: Some(end_date),
        ..
    } = client_req
    else {
        return Err(ApiError::validation("startDate and endDate are required"));
    };

    let title = required(title, "title")?;
    let description = required(description, "description")?;
    let category = required(category, "category")?;

    let course = database::course::create_course(
        title,
        description,
        category,
        start_date,
        end_date,
        actor.id,
    )
    .await?;

    let notified_users = database::user::count_users().await?;

    tracing::info!("Course {} created by {}", course.id, actor.id);
    json_response(
        StatusCode::OK,
        &CourseCreated {
            course,
            message: "Course created successfully and all users have been notified",
            notified_users,
        },
    )
}

pub async fn update_course(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let mut course = load_course(&path_params).await?;

    authz::require(&actor, Operation::ManageCourse { course: &course })?;

    course.apply(client_req.course_update());
    database::course::save_course(&course).await?;

    json_response(StatusCode::OK, &course)
}

pub async fn delete_course(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let course = load_course(&path_params).await?;

    authz::require(&actor, Operation::ManageCourse { course: &course })?;

    if !database::course::delete_course(course.id).await? {
        return Err(ApiError::not_found("Course not found"));
    }

    tracing::info!("Course {} removed", course.id);
    ok_response()
}

/// Enrolls the calling student
pub async fn enroll(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let now = Utc::now();
    let mut course = load_course(&path_params).await?;

    authz::require(&actor, Operation::Enroll)?;

    let course_id = course.id;
    let enrollment = course.enroll(actor.id, now)?;
    database::course::add_enrollment(course_id, enrollment).await?;

    tracing::info!("Student {} enrolled in course {}", actor.id, course.id);
    json_response(StatusCode::OK, &course)
}

/// Drops the calling student from the course
pub async fn unenroll(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let mut course = load_course(&path_params).await?;

    authz::require(&actor, Operation::Enroll)?;

    course.unenroll(actor.id)?;
    database::course::remove_enrollment(course.id, actor.id).await?;

    tracing::info!("Student {} left course {}", actor.id, course.id);
    json_response(StatusCode::OK, &course)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn creation_reply_wraps_the_course() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let reply = CourseCreated {
            course: Course {
                id: 4,
                title: "Algebra".into(),
                description: "Groups and rings".into(),
                category: "Maths".into(),
                start_date: start,
                end_date: start,
                instructor_id: 2,
                created_at: start,
                enrolled_students: vec![],
            },
            message: "Course created successfully and all users have been notified",
            notified_users: 12,
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["course"]["id"], 4);
        assert_eq!(json["course"]["instructorId"], 2);
        assert_eq!(json["notifiedUsers"], 12);
        assert!(json["message"].as_str().unwrap().starts_with("Course created"));
    }
}
