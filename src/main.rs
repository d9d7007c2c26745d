use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::from_fn;
use axum::routing::{delete, get, post, put};
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use crate::config::{CONFIG_FILE, Config};

mod authz;
mod config;
mod database;
mod endpoints;
mod error;
mod model;
mod security;

/// How often expired sessions are swept from the database
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Builds the application router
pub fn app() -> Router {
    // Create the CORS layer, which essentially sets a guideline that requests must follow
    // Allow GET, POST, PUT, DELETE, and OPTIONS methods
    // Allow Auth and content-type headers
    // Allow requests from any origin
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(AllowOrigin::any())
        .expose_headers([CONTENT_TYPE]);

    // Create application
    // Each layer acts as a layer of an onion, with the ones added first
    // acting as the centre of the onion, and the ones added last acting
    // as the outer layers
    let app: Router = Router::new();

    // Add admin layer
    // Sits inside the authenticated layer, which resolves the caller first
    let app = app
        .route("/api/users/{id}", delete(endpoints::admin::delete_user))
        .layer(from_fn(security::handle_admin_auth));

    // The authenticated layer
    // These endpoints are accessible by all users with a live session. Per-resource
    // permissions are checked by the handlers themselves.
    let app = app
        .route("/api/auth/user", get(endpoints::current_user))
        .route("/api/auth/profile", put(endpoints::update_profile))
        .route("/api/users", get(endpoints::user::list_users))
        .route(
            "/api/users/{id}",
            get(endpoints::user::get_user).put(endpoints::user::update_user),
        )
        .route(
            "/api/assignments",
            get(endpoints::assignment::list_assignments)
                .post(endpoints::assignment::create_assignment),
        )
        .route(
            "/api/assignments/{id}",
            get(endpoints::assignment::get_assignment)
                .put(endpoints::assignment::update_assignment)
                .delete(endpoints::assignment::delete_assignment),
        )
        .route(
            "/api/assignments/{id}/submit",
            post(endpoints::assignment::submit_assignment),
        )
        .route(
            "/api/assignments/{id}/grade/{student_id}",
            put(endpoints::assignment::grade_submission),
        )
        .route("/api/courses", post(endpoints::course::create_course))
        .route(
            "/api/courses/instructor/{instructor_id}",
            get(endpoints::course::instructor_courses),
        )
        .route(
            "/api/courses/{id}",
            put(endpoints::course::update_course).delete(endpoints::course::delete_course),
        )
        .route("/api/courses/{id}/enroll", put(endpoints::course::enroll))
        .route("/api/courses/{id}/unenroll", put(endpoints::course::unenroll))
        .route("/api/materials", post(endpoints::material::create_material))
        .route(
            "/api/materials/course/{course_id}",
            get(endpoints::material::course_materials),
        )
        .route(
            "/api/materials/{id}",
            get(endpoints::material::get_material)
                .put(endpoints::material::update_material)
                .delete(endpoints::material::delete_material),
        )
        .route(
            "/api/discussions",
            post(endpoints::discussion::create_discussion),
        )
        .route(
            "/api/discussions/course/{course_id}",
            get(endpoints::discussion::course_discussions),
        )
        .route(
            "/api/discussions/{id}",
            get(endpoints::discussion::get_discussion)
                .delete(endpoints::discussion::delete_discussion),
        )
        .route(
            "/api/discussions/{id}/reply",
            post(endpoints::discussion::reply),
        )
        .layer(from_fn(security::handle_basic_auth));

    // The CORS layer
    // These endpoints are public
    app.route("/api/auth/register", post(endpoints::register))
        .route("/api/auth/login", post(endpoints::login))
        .route("/api/courses", get(endpoints::list_courses))
        .route("/api/courses/{id}", get(endpoints::get_course))
        .layer(cors)
}

#[tokio::main]
async fn main() {
    let config = match Config::load(CONFIG_FILE) {
        Ok(config) => config::install(config),
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let level = match config.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    // Begin logging
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install the log subscriber: {e}");
        return;
    }

    // Only the first installed provider counts
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let addr = match config.bind.parse::<SocketAddr>() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {}: {e}", config.bind);
            return;
        }
    };

    // Initialize the database, aborting start-up if an error occurs
    if let Err(e) = database::init_database(config).await {
        tracing::error!("{}", e);
        return;
    };

    info!("Database initialized");

    // Spawn the session sweeper
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match database::auth::purge_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => info!("Purged {n} expired sessions"),
                Err(e) => tracing::error!("Could not purge sessions: {e}"),
            }
        }
    });

    let app = app();

    let served = match &config.tls {
        Some(tls) => {
            // Load the certificate for HTTPS
            let rustls_config =
                match RustlsConfig::from_pem_file(&tls.certificate, &tls.private_key).await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Could not load the TLS certificate: {e}");
                        return;
                    }
                };

            info!("Serving HTTPS on {addr}");
            axum_server::bind_rustls(addr, rustls_config)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Serving HTTP on {addr}");
            axum_server::bind(addr).serve(app.into_make_service()).await
        }
    };

    if let Err(e) = served {
        tracing::error!("Server stopped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/api/assignments")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_tokens_are_rejected_before_the_database() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/assignments/1/submit")
                    .header(AUTHORIZATION, "Bearer not-a-token")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{ "fileUrl": "/uploads/a.zip" }"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_sit_behind_authentication() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/users/3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_without_password_is_a_validation_error() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{ "email": "a@example.com" }"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "validation");
    }

    #[tokio::test]
    async fn undeserializable_bodies_use_the_error_body() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/register")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{ "name": "Eve", "email": "e@example.com", "password": "pw", "role": "superuser" }"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "validation");
        assert!(json["message"].as_str().unwrap().contains("role"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{ "email": "#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_course_lookup_with_bad_id_is_not_found() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/api/courses/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
