use axum::{
    Extension,
    body::Body,
    extract::Path,
    http::Response,
};

use crate::{
    authz::{self, Operation},
    database,
    endpoints::{ok_response, parse_id},
    error::ApiError,
    model::user::Actor,
};

/// Removes a user account along with everything that references it
pub async fn delete_user(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let user_id = parse_id(&path_params, 0, "User")?;

    authz::require(&actor, Operation::DeleteUser)?;

    if !database::user::delete_user(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("User {user_id} removed by admin {}", actor.id);
    ok_response()
}
