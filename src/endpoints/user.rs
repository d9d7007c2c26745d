use axum::{
    Extension,
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
};

use crate::{
    authz::{self, Operation},
    database,
    endpoints::{JsonBody, json_response, parse_id},
    error::ApiError,
    model::{request::ClientRequest, user::Actor},
};

pub async fn list_users() -> Result<Response<Body>, ApiError> {
    let users = database::user::list_users().await?;
    json_response(StatusCode::OK, &users)
}

pub async fn get_user(Path(path_params): Path<Vec<String>>) -> Result<Response<Body>, ApiError> {
    let user_id = parse_id(&path_params, 0, "User")?;

    let Some(user) = database::user::get_user(user_id).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    json_response(StatusCode::OK, &user)
}

/// Updates name, email and (for admins) role
pub async fn update_user(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let user_id = parse_id(&path_params, 0, "User")?;
    let ClientRequest {
        name, email, role, ..
    } = client_req;

    authz::require(
        &actor,
        Operation::UpdateUser {
            user_id,
            changes_role: role.is_some(),
        },
    )?;

    let Some(user) = database::user::update_user(user_id, name, email, role).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    tracing::info!("User {} updated by {}", user.id, actor.id);
    json_response(StatusCode::OK, &user)
}
