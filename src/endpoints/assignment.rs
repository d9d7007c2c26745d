use axum::{
    Extension,
    body::Body,
    extract::{Path, Query},
    http::{Response, StatusCode},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    authz::{self, AssignmentScope, Operation},
    database::{self, assignment::operations},
    endpoints::{JsonBody, json_response, ok_response, parse_id, required},
    error::ApiError,
    model::{
        assignment::{Assignment, validate_total_points},
        course::Course,
        request::ClientRequest,
        role::Role,
        user::Actor,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub course: Option<i32>,
}

async fn load_assignment(assignment_id: i32) -> Result<Assignment, ApiError> {
    operations::get_assignment(assignment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment not found"))
}

async fn load_course(course_id: i32) -> Result<Course, ApiError> {
    database::course::get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

/// Students only ever see their own submission
fn visible_to(actor: &Actor, mut assignment: Assignment) -> Assignment {
    if actor.role == Role::Student {
        assignment.submissions.retain(|student_id, _| *student_id == actor.id);
    }
    assignment
}

/// Lists the assignments of the courses the caller takes part in, soonest due first
pub async fn list_assignments(
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Response<Body>, ApiError> {
    let assignments =
        operations::list_assignments(AssignmentScope::for_actor(&actor), query.course).await?;

    let assignments = assignments
        .into_iter()
        .map(|a| visible_to(&actor, a))
        .collect::<Vec<Assignment>>();

    json_response(StatusCode::OK, &assignments)
}

pub async fn get_assignment(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let assignment_id = parse_id(&path_params, 0, "Assignment")?;
    let assignment = load_assignment(assignment_id).await?;
    let course = load_course(assignment.course_id).await?;

    authz::require(&actor, Operation::ReadAssignment { course: &course })?;

    json_response(StatusCode::OK, &visible_to(&actor, assignment))
}

pub async fn create_assignment(
    Extension(actor): Extension<Actor>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let ClientRequest {
        title,
        description,
        course: Some(course_id),
        due_date: Some(due_date),
        total_points: Some(total_points),
        ..
    } = client_req
    else {
        return Err(ApiError::validation(
            "course, dueDate and totalPoints are required",
        ));
    };

    let title = required(title, "title")?;
    let description = required(description, "description")?;
    validate_total_points(total_points)?;

    let course = load_course(course_id).await?;
    authz::require(&actor, Operation::ManageAssignment { course: &course })?;

    let assignment =
        operations::create_assignment(title, description, course.id, due_date, total_points)
            .await?;

    tracing::info!("Assignment {} created in course {}", assignment.id, course.id);
    json_response(StatusCode::OK, &assignment)
}

/// Applies the provided fields. Absent or empty fields are left alone.
pub async fn update_assignment(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let assignment_id = parse_id(&path_params, 0, "Assignment")?;
    let mut assignment = load_assignment(assignment_id).await?;
    let course = load_course(assignment.course_id).await?;

    authz::require(&actor, Operation::ManageAssignment { course: &course })?;

    assignment.apply(client_req.assignment_update())?;
    operations::save_assignment(&assignment).await?;

    json_response(StatusCode::OK, &assignment)
}

pub async fn delete_assignment(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let assignment_id = parse_id(&path_params, 0, "Assignment")?;
    let assignment = load_assignment(assignment_id).await?;
    let course = load_course(assignment.course_id).await?;

    authz::require(&actor, Operation::ManageAssignment { course: &course })?;

    if !operations::delete_assignment(assignment.id).await? {
        return Err(ApiError::not_found("Assignment not found"));
    }

    tracing::info!("Assignment {} removed", assignment.id);
    ok_response()
}

/// Records the caller's submission. Lateness is judged against the time the request arrived.
pub async fn submit_assignment(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let now = Utc::now();

    let assignment_id = parse_id(&path_params, 0, "Assignment")?;
    let mut assignment = load_assignment(assignment_id).await?;
    let course = load_course(assignment.course_id).await?;

    authz::require(&actor, Operation::SubmitAssignment { course: &course })?;

    let file_url = client_req.file_url.unwrap_or_default();
    let submission = assignment.submit(actor.id, file_url, now)?;
    operations::submit(assignment_id, submission).await?;

    tracing::info!(
        "Student {} submitted assignment {assignment_id} ({})",
        actor.id,
        submission.status
    );

    json_response(StatusCode::OK, &visible_to(&actor, assignment))
}

pub async fn grade_submission(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let assignment_id = parse_id(&path_params, 0, "Assignment")?;
    let student_id = parse_id(&path_params, 1, "Submission")?;
    let mut assignment = load_assignment(assignment_id).await?;
    let course = load_course(assignment.course_id).await?;

    authz::require(&actor, Operation::GradeSubmission { course: &course })?;

    let Some(grading) = client_req.grading() else {
        return Err(ApiError::validation("grade is required"));
    };

    let submission = assignment.grade(student_id, grading)?;
    operations::record_grade(assignment_id, submission).await?;

    tracing::info!(
        "Submission of student {student_id} for assignment {assignment_id} graded by {}",
        actor.id
    );

    json_response(StatusCode::OK, &assignment)
}
