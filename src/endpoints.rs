//! Contains all endpoint-associated functions, grouped by the resource they act on.
//!
//! The account endpoints and the public course catalogue are here. Every other resource has its
//! own submodule. Handlers load what they need, ask [`crate::authz`] whether the caller may go
//! ahead, then mutate and persist.

use axum::{
    Extension,
    body::Body,
    extract::{FromRequest, Path},
    http::{Response, StatusCode, header::CONTENT_TYPE},
};
use serde::Serialize;

use crate::{
    database,
    error::ApiError,
    model::{request::ClientRequest, role::Role, user::Actor},
};

pub mod admin;
pub mod assignment;
pub mod course;
pub mod discussion;
pub mod material;
pub mod user;

/// `axum::Json`, with rejections reported through [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

pub(crate) const OK_JSON: &str = r#"{ "message": "OK" }"#;

/// Serializes `value` into a JSON response with the given status
pub(crate) fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Body>, ApiError> {
    let body = serde_json::to_string(value)
        .map_err(|e| ApiError::Server(format!("Could not serialize response: {e}")))?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .map_err(|e| ApiError::Server(format!("Could not build response: {e}")))
}

pub(crate) fn ok_response() -> Result<Response<Body>, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(OK_JSON.into())
        .map_err(|e| ApiError::Server(format!("Could not build response: {e}")))
}

/// Reads the path parameter at `index` as an entity id. A malformed or missing id can never name
/// an existing entity, so it is reported as `NotFound`.
pub(crate) fn parse_id(path_params: &[String], index: usize, entity: &str) -> Result<i32, ApiError> {
    path_params
        .get(index)
        .and_then(|p| p.parse::<i32>().ok())
        .ok_or_else(|| ApiError::not_found(format!("{entity} not found")))
}

/// Returns the value of a required, non-empty text field
pub(crate) fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::validation(format!("{name} is required"))),
    }
}

/// Signs up a new user with the provided credentials
///
/// Returns a session token to be used for subsequent operations. Accounts default to the student
/// role; admin accounts cannot be self-registered.
pub async fn register(
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let ClientRequest {
        name,
        email,
        password,
        role,
        ..
    } = client_req;

    let name = required(name, "name")?;
    let email = required(email, "email")?;
    let password = required(password, "password")?;

    let role = role.unwrap_or_default();
    if role == Role::Admin {
        return Err(ApiError::validation("Cannot register as admin"));
    }

    let session = database::user::register_user(name, email, password, role).await?;
    json_response(StatusCode::OK, &session)
}

/// Logs in a user provided their email and password
///
/// Returns a session token to be used for subsequent operations. The token expires after the
/// configured number of hours.
pub async fn login(
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let Some((email, password)) = client_req.login() else {
        return Err(ApiError::validation("email and password are required"));
    };

    let session = database::user::login_user(email, password).await?;
    json_response(StatusCode::OK, &session)
}

/// Returns the account behind the session
pub async fn current_user(Extension(actor): Extension<Actor>) -> Result<Response<Body>, ApiError> {
    let Some(user) = database::user::get_user(actor.id).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    json_response(StatusCode::OK, &user)
}

/// Updates the caller's own name and email
pub async fn update_profile(
    Extension(actor): Extension<Actor>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let ClientRequest { name, email, .. } = client_req;

    let Some(user) = database::user::update_user(actor.id, name, email, None).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    json_response(StatusCode::OK, &user)
}

/// Lists every course. Public.
pub async fn list_courses() -> Result<Response<Body>, ApiError> {
    let courses = database::course::list_courses().await?;
    json_response(StatusCode::OK, &courses)
}

/// Gets a single course with its enrollments. Public.
pub async fn get_course(Path(path_params): Path<Vec<String>>) -> Result<Response<Body>, ApiError> {
    let course_id = parse_id(&path_params, 0, "Course")?;

    let Some(course) = database::course::get_course(course_id).await? else {
        return Err(ApiError::not_found("Course not found"));
    };

    json_response(StatusCode::OK, &course)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_are_not_found() {
        let params = vec!["12".to_owned(), "abc".to_owned()];
        assert_eq!(parse_id(&params, 0, "Assignment").unwrap(), 12);

        let err = parse_id(&params, 1, "Student").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Student not found"));
        assert!(matches!(parse_id(&params, 2, "Course"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        assert_eq!(required(Some("x".into()), "title").unwrap(), "x");
        assert!(matches!(required(Some("  ".into()), "title"), Err(ApiError::Validation(_))));
        assert!(matches!(required(None, "title"), Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn registering_as_admin_is_refused() {
        let req = ClientRequest {
            name: Some("Root".into()),
            email: Some("root@example.com".into()),
            password: Some("secret".into()),
            role: Some(Role::Admin),
            ..Default::default()
        };

        let err = register(JsonBody(req)).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn login_needs_both_fields() {
        let req = ClientRequest {
            email: Some("a@example.com".into()),
            ..Default::default()
        };

        let err = login(JsonBody(req)).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
