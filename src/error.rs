//! The error taxonomy shared by every operation. Each variant maps onto one HTTP status, and
//! server-side failures are logged here rather than echoed back to the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The referenced entity does not exist, or its id is malformed
    #[error("{0}")]
    NotFound(String),

    /// The actor is authenticated but may not perform the operation
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Server(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Validation(_) => "validation",
            ApiError::Database(_) | ApiError::Server(_) => "server",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A body that is not valid JSON, or does not fit the request shape, is a validation failure
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Database(_) | ApiError::Server(_) => {
                tracing::error!("{self}");
                "Internal Server Error.".to_owned()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            kind: self.kind(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_carries_kind_and_message() {
        let resp = ApiError::not_found("Assignment not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let json = body_json(resp).await;
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["message"], "Assignment not found");
    }

    #[tokio::test]
    async fn database_errors_are_not_echoed() {
        let resp = ApiError::from(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        assert_eq!(json["kind"], "server");
        assert_eq!(json["message"], "Internal Server Error.");
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::unauthorized("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Server("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
