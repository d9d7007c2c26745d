use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use sqlx::{Row, postgres::PgRow};

use crate::{
    database::{auth, decode, pool, unique_violation},
    error::ApiError,
    model::{role::Role, user::User},
};

const SALT_LEN: usize = 16;

fn create_hash(salt: &[u8], pass: impl AsRef<[u8]>) -> Vec<u8> {
    let salted = [salt, pass.as_ref()].concat();
    Sha512::digest(salted).to_vec()
}

fn user_from_row(row: &PgRow) -> Result<User, ApiError> {
    let role: String = row.try_get("role")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: decode::<Role>(&role)?,
        created_at,
    })
}

/// Creates the account and logs it in
pub async fn register_user(
    name: String,
    email: String,
    pass: String,
    role: Role,
) -> Result<auth::Session, ApiError> {
    let mut salt = [0u8; SALT_LEN];
    rand::fill(&mut salt);
    let hash = create_hash(&salt, &pass);

    let mut transaction = pool()?.begin().await?;

    let existing = sqlx::query("SELECT id FROM users WHERE email = $1;")
        .bind(&email)
        .fetch_optional(&mut *transaction)
        .await?;
    if existing.is_some() {
        return Err(ApiError::validation("User already exists"));
    }

    let id: i32 = sqlx::query(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING id;",
    )
    .bind(name)
    .bind(email)
    .bind(role.as_str())
    .fetch_one(&mut *transaction)
    .await
    .map_err(|e| unique_violation(e, "User already exists"))?
    .try_get("id")?;

    sqlx::query("INSERT INTO user_auth (user_id, salt, hash) VALUES ($1, $2, $3);")
        .bind(id)
        .bind(salt.to_vec())
        .bind(hash)
        .execute(&mut *transaction)
        .await?;

    let session = auth::start_session(&mut transaction, id).await?;
    transaction.commit().await?;

    tracing::info!("User {id} created as {role}");
    Ok(session)
}

pub async fn login_user(email: String, pass: String) -> Result<auth::Session, ApiError> {
    let mut transaction = pool()?.begin().await?;

    let Some(row) = sqlx::query(
        "SELECT a.user_id, a.salt, a.hash
        FROM user_auth a
        JOIN users u ON u.id = a.user_id
        WHERE u.email = $1;",
    )
    .bind(&email)
    .fetch_optional(&mut *transaction)
    .await?
    else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let id: i32 = row.try_get("user_id")?;
    let salt: Vec<u8> = row.try_get("salt")?;
    let hash: Vec<u8> = row.try_get("hash")?;

    if create_hash(&salt, &pass) != hash {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let session = auth::start_session(&mut transaction, id).await?;
    transaction.commit().await?;

    tracing::info!("Logged in user {}", id);
    Ok(session)
}

pub async fn get_user(user_id: i32) -> Result<Option<User>, ApiError> {
    let row = sqlx::query("SELECT id, name, email, role, created_at FROM users WHERE id = $1;")
        .bind(user_id)
        .fetch_optional(pool()?)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn list_users() -> Result<Vec<User>, ApiError> {
    let rows = sqlx::query("SELECT id, name, email, role, created_at FROM users ORDER BY id ASC;")
        .fetch_all(pool()?)
        .await?;

    rows.iter().map(user_from_row).collect()
}

pub async fn count_users() -> Result<i64, ApiError> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM users;")
        .fetch_one(pool()?)
        .await?
        .try_get("total")?;

    Ok(count)
}

/// Applies whichever of the fields are present. Returns the updated user, or `None` if it does
/// not exist.
pub async fn update_user(
    user_id: i32,
    name: Option<String>,
    email: Option<String>,
    role: Option<Role>,
) -> Result<Option<User>, ApiError> {
    let row = sqlx::query(
        "UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            role = COALESCE($4, role)
        WHERE id = $1
        RETURNING id, name, email, role, created_at;",
    )
    .bind(user_id)
    .bind(name.filter(|n| !n.is_empty()))
    .bind(email.filter(|e| !e.is_empty()))
    .bind(role.map(|r| r.as_str()))
    .fetch_optional(pool()?)
    .await
    .map_err(|e| unique_violation(e, "Email already in use"))?;

    row.as_ref().map(user_from_row).transpose()
}

/// Returns whether a user was removed
pub async fn delete_user(user_id: i32) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1;")
        .bind(user_id)
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_salt_and_password() {
        let a = create_hash(b"salt-one", "hunter2");
        assert_eq!(a, create_hash(b"salt-one", "hunter2"));
        assert_ne!(a, create_hash(b"salt-two", "hunter2"));
        assert_ne!(a, create_hash(b"salt-one", "hunter3"));
        assert_eq!(a.len(), 64);
    }
}
