use axum::{
    Extension,
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
};

use crate::{
    authz::{self, Operation},
    database,
    endpoints::{JsonBody, json_response, ok_response, parse_id, required},
    error::ApiError,
    model::{discussion::Discussion, request::ClientRequest, user::Actor},
};

async fn load_discussion(discussion_id: i32) -> Result<Discussion, ApiError> {
    database::discussion::get_discussion(discussion_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Discussion not found"))
}

/// Lists a course's threads, newest first
pub async fn course_discussions(
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let course_id = parse_id(&path_params, 0, "Course")?;
    let discussions = database::discussion::discussions_for_course(course_id).await?;
    json_response(StatusCode::OK, &discussions)
}

pub async fn get_discussion(
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let discussion_id = parse_id(&path_params, 0, "Discussion")?;
    let discussion = load_discussion(discussion_id).await?;
    json_response(StatusCode::OK, &discussion)
}

pub async fn create_discussion(
    Extension(actor): Extension<Actor>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let ClientRequest {
        title,
        content,
        course: Some(course_id),
        ..
    } = client_req
    else {
        return Err(ApiError::validation("course is required"));
    };

    let title = required(title, "title")?;
    let content = required(content, "content")?;

    if database::course::get_course(course_id).await?.is_none() {
        return Err(ApiError::not_found("Course not found"));
    }

    let discussion =
        database::discussion::create_discussion(title, content, course_id, actor.id).await?;

    json_response(StatusCode::OK, &discussion)
}

/// Adds a reply and returns the thread with the new reply first
pub async fn reply(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let discussion_id = parse_id(&path_params, 0, "Discussion")?;
    let content = required(client_req.content, "content")?;

    // A missing thread is a 404, not a foreign key violation
    load_discussion(discussion_id).await?;

    database::discussion::add_reply(discussion_id, content, actor.id).await?;

    let discussion = load_discussion(discussion_id).await?;
    json_response(StatusCode::OK, &discussion)
}

pub async fn delete_discussion(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let discussion_id = parse_id(&path_params, 0, "Discussion")?;
    let discussion = load_discussion(discussion_id).await?;

    authz::require(&actor, Operation::DeleteDiscussion { discussion: &discussion })?;

    if !database::discussion::delete_discussion(discussion.id).await? {
        return Err(ApiError::not_found("Discussion not found"));
    }

    tracing::info!("Discussion {} removed by {}", discussion.id, actor.id);
    ok_response()
}
