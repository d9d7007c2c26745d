//! Contains the middleware security functions. Each layer checks for a different level of security, as denoted by the function
//!
//! Finer-grained decisions (is this teacher the course's instructor, is this student enrolled)
//! are left to the handlers, which consult [`crate::authz`] once the resource is loaded.

use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    database::auth::{session::token_from_header, session_actor},
    error::ApiError,
    model::user::Actor,
};

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "kind": "unauthenticated", "message": "Not Authorized." })),
    )
        .into_response()
}

/// Checks to see if the user is authenticated.
///
/// On success the caller's [`Actor`] is attached to the request for the handlers to extract.
pub async fn handle_basic_auth(mut request: Request<Body>, next: Next) -> Response {
    let token = request
        .headers()
        .get(&AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(token_from_header)
        .map(str::to_owned);

    let Some(token) = token else {
        return not_authenticated();
    };

    match session_actor(&token).await {
        Ok(Some(actor)) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Ok(None) => not_authenticated(),
        Err(e) => e.into_response(),
    }
}

/// Check if the user is authorized as an admin. Must sit inside [`handle_basic_auth`].
pub async fn handle_admin_auth(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<Actor>() {
        Some(actor) if actor.is_admin() => next.run(request).await,
        Some(_) => ApiError::unauthorized("Admin access required").into_response(),
        None => not_authenticated(),
    }
}
