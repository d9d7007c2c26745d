use std::{str::FromStr, sync::OnceLock};

use sqlx::{Executor, Pool, Postgres, postgres::PgPoolOptions};

use crate::{config::Config, error::ApiError};

pub mod assignment;
pub mod auth;
pub mod course;
pub mod discussion;
pub mod material;
pub mod user;

static POSTGRES: OnceLock<Pool<Postgres>> = OnceLock::new();

/// Tables in creation order. Later tables reference earlier ones.
const TABLES: [(&str, &str); 10] = [
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'admin')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );",
    ),
    (
        "user_auth",
        "CREATE TABLE IF NOT EXISTS user_auth (
            user_id INTEGER PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
            salt BYTEA NOT NULL,
            hash BYTEA NOT NULL
        );",
    ),
    (
        "user_session",
        "CREATE TABLE IF NOT EXISTS user_session (
            session_hash BYTEA PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            expiration TIMESTAMPTZ NOT NULL
        );",
    ),
    (
        "courses",
        "CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            start_date TIMESTAMPTZ NOT NULL,
            end_date TIMESTAMPTZ NOT NULL,
            instructor_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );",
    ),
    (
        "enrollments",
        "CREATE TABLE IF NOT EXISTS enrollments (
            course_id INTEGER REFERENCES courses (id) ON DELETE CASCADE,
            student_id INTEGER REFERENCES users (id) ON DELETE CASCADE,
            enrollment_date TIMESTAMPTZ NOT NULL,
            progress SMALLINT NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            CONSTRAINT enrollments_pkey PRIMARY KEY (course_id, student_id)
        );",
    ),
    (
        "assignments",
        "CREATE TABLE IF NOT EXISTS assignments (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            course_id INTEGER NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
            due_date TIMESTAMPTZ NOT NULL,
            total_points INTEGER NOT NULL CHECK (total_points > 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );",
    ),
    (
        "submissions",
        "CREATE TABLE IF NOT EXISTS submissions (
            assignment_id INTEGER REFERENCES assignments (id) ON DELETE CASCADE,
            student_id INTEGER REFERENCES users (id) ON DELETE CASCADE,
            submission_date TIMESTAMPTZ NOT NULL,
            file_url TEXT NOT NULL,
            grade DOUBLE PRECISION,
            feedback TEXT NOT NULL DEFAULT '',
            rating SMALLINT CHECK (rating BETWEEN 1 AND 5),
            status TEXT NOT NULL CHECK (status IN ('submitted', 'graded', 'late')),
            CONSTRAINT submissions_pkey PRIMARY KEY (assignment_id, student_id)
        );",
    ),
    (
        "materials",
        "CREATE TABLE IF NOT EXISTS materials (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            course_id INTEGER NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
            file_url TEXT NOT NULL,
            file_type TEXT NOT NULL,
            upload_date TIMESTAMPTZ NOT NULL DEFAULT now(),
            created_by INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE
        );",
    ),
    (
        "discussions",
        "CREATE TABLE IF NOT EXISTS discussions (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            course_id INTEGER NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
            author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );",
    ),
    (
        "discussion_replies",
        "CREATE TABLE IF NOT EXISTS discussion_replies (
            id INTEGER PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
            discussion_id INTEGER NOT NULL REFERENCES discussions (id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );",
    ),
];

pub async fn init_database(config: &Config) -> Result<(), String> {
    let url = config.database_url().map_err(|e| e.to_string())?;

    let pool = match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET search_path TO lms;").await?;
                Ok(())
            })
        })
        .connect(url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            return Err(format!("Could not connect to the database: {e}"));
        }
    };

    let mut transaction = pool
        .begin()
        .await
        .map_err(|e| format!("Could not begin schema transaction: {e}"))?;

    if let Err(e) = sqlx::query("CREATE SCHEMA IF NOT EXISTS lms;")
        .execute(&mut *transaction)
        .await
    {
        return Err(format!("Could not create schema 'lms': {e}"));
    }

    for (name, statement) in TABLES {
        if let Err(e) = sqlx::query(statement).execute(&mut *transaction).await {
            return Err(format!("Could not create table {name}: {e}"));
        }
    }

    if let Err(e) = transaction.commit().await {
        return Err(format!("Could not commit table-creation transaction: {e}"));
    }

    if POSTGRES.set(pool).is_err() {
        tracing::warn!("Database was already initialized");
    }

    Ok(())
}

pub(crate) fn pool() -> Result<&'static Pool<Postgres>, ApiError> {
    POSTGRES
        .get()
        .ok_or_else(|| ApiError::Server("Database not initialized".into()))
}

/// Reports a unique-constraint violation (Postgres `23505`) as a validation failure with
/// `message`. Any other error passes through unchanged.
pub(crate) fn unique_violation(e: sqlx::Error, message: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::validation(message),
        _ => ApiError::from(e),
    }
}

/// Parses an enum stored as text
pub(crate) fn decode<T: FromStr<Err = String>>(value: &str) -> Result<T, ApiError> {
    value
        .parse::<T>()
        .map_err(|e| ApiError::Server(format!("Invalid data found in database: {e}")))
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct DuplicateKey;

    impl fmt::Display for DuplicateKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("duplicate key value violates unique constraint \"users_email_key\"")
        }
    }

    impl StdError for DuplicateKey {}

    impl DatabaseError for DuplicateKey {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn duplicate_keys_are_validation_errors() {
        let err = unique_violation(
            sqlx::Error::Database(Box::new(DuplicateKey)),
            "Email already in use",
        );
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Email already in use"));
    }

    #[test]
    fn other_database_errors_stay_server_errors() {
        let err = unique_violation(sqlx::Error::PoolTimedOut, "Email already in use");
        assert!(matches!(err, ApiError::Database(_)));
    }
}
