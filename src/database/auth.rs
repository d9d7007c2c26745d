//! Session storage. Clients hold a random token; the database only ever sees its SHA-512 digest.

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha512};
use sqlx::{Postgres, Row, Transaction};

use crate::{
    config,
    database::{decode, pool},
    error::ApiError,
    model::{role::Role, user::Actor},
};

pub mod session;

pub use session::Session;

use session::TOKEN_LEN;

fn session_hash(session_id: &[u8]) -> Vec<u8> {
    Sha512::digest(session_id).to_vec()
}

/// Starts a fresh session for the user, clearing any earlier ones, inside the caller's transaction
pub async fn start_session(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: i32,
) -> Result<Session, ApiError> {
    let mut session_id = [0u8; TOKEN_LEN];
    rand::fill(&mut session_id);

    let expiration = Utc::now() + TimeDelta::hours(config::get().session_hours);

    sqlx::query("DELETE FROM user_session WHERE user_id = $1;")
        .bind(user_id)
        .execute(&mut **transaction)
        .await?;

    sqlx::query("INSERT INTO user_session (session_hash, user_id, expiration) VALUES ($1, $2, $3);")
        .bind(session_hash(&session_id))
        .bind(user_id)
        .bind(expiration)
        .execute(&mut **transaction)
        .await?;

    Ok(Session::new(session_id))
}

/// Resolves a client token to the actor it belongs to. Unknown, malformed and expired tokens all
/// resolve to `None`.
pub async fn session_actor(token: &str) -> Result<Option<Actor>, ApiError> {
    let Some(session_id) = session::decode_token(token) else {
        return Ok(None);
    };

    let row = sqlx::query(
        "SELECT s.user_id, s.expiration, u.role
        FROM user_session s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_hash = $1;",
    )
    .bind(session_hash(&session_id))
    .fetch_optional(pool()?)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let expiration: DateTime<Utc> = row.try_get("expiration")?;
    if Utc::now() > expiration {
        return Ok(None);
    }

    let user_id: i32 = row.try_get("user_id")?;
    let role: String = row.try_get("role")?;

    Ok(Some(Actor::new(user_id, decode::<Role>(&role)?)))
}

/// Drops expired sessions. Returns how many were removed.
pub async fn purge_expired_sessions() -> Result<u64, ApiError> {
    let result = sqlx::query("DELETE FROM user_session WHERE expiration < $1;")
        .bind(Utc::now())
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected())
}
