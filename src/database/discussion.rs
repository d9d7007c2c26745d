use sqlx::{Row, postgres::PgRow};

use crate::{
    database::pool,
    error::ApiError,
    model::discussion::{Discussion, Reply},
};

const DISCUSSION_COLUMNS: &str = "id, title, content, course_id, author_id, created_at";

fn discussion_from_row(row: &PgRow) -> Result<Discussion, ApiError> {
    Ok(Discussion {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        course_id: row.try_get("course_id")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        replies: vec![],
    })
}

async fn attach_replies(discussions: &mut [Discussion]) -> Result<(), ApiError> {
    if discussions.is_empty() {
        return Ok(());
    }

    let ids = discussions.iter().map(|d| d.id).collect::<Vec<i32>>();
    let rows = sqlx::query(
        "SELECT id, discussion_id, content, author_id, created_at
        FROM discussion_replies
        WHERE discussion_id = ANY($1)
        ORDER BY created_at DESC, id DESC;",
    )
    .bind(ids)
    .fetch_all(pool()?)
    .await?;

    for row in &rows {
        let discussion_id: i32 = row.try_get("discussion_id")?;
        let reply = Reply {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            author_id: row.try_get("author_id")?,
            created_at: row.try_get("created_at")?,
        };

        if let Some(discussion) = discussions.iter_mut().find(|d| d.id == discussion_id) {
            discussion.replies.push(reply);
        }
    }

    Ok(())
}

pub async fn discussions_for_course(course_id: i32) -> Result<Vec<Discussion>, ApiError> {
    let rows = sqlx::query(&format!(
        "SELECT {DISCUSSION_COLUMNS} FROM discussions WHERE course_id = $1 ORDER BY created_at DESC, id DESC;"
    ))
    .bind(course_id)
    .fetch_all(pool()?)
    .await?;

    let mut discussions = rows
        .iter()
        .map(discussion_from_row)
        .collect::<Result<Vec<Discussion>, ApiError>>()?;
    attach_replies(&mut discussions).await?;
    Ok(discussions)
}

pub async fn get_discussion(discussion_id: i32) -> Result<Option<Discussion>, ApiError> {
    let row = sqlx::query(&format!(
        "SELECT {DISCUSSION_COLUMNS} FROM discussions WHERE id = $1;"
    ))
    .bind(discussion_id)
    .fetch_optional(pool()?)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut discussions = [discussion_from_row(&row)?];
    attach_replies(&mut discussions).await?;
    let [discussion] = discussions;
    Ok(Some(discussion))
}

pub async fn create_discussion(
    title: String,
    content: String,
    course_id: i32,
    author_id: i32,
) -> Result<Discussion, ApiError> {
    let row = sqlx::query(&format!(
        "INSERT INTO discussions (title, content, course_id, author_id)
        VALUES ($1, $2, $3, $4)
        RETURNING {DISCUSSION_COLUMNS};"
    ))
    .bind(title)
    .bind(content)
    .bind(course_id)
    .bind(author_id)
    .fetch_one(pool()?)
    .await?;

    discussion_from_row(&row)
}

pub async fn add_reply(
    discussion_id: i32,
    content: String,
    author_id: i32,
) -> Result<(), ApiError> {
    sqlx::query(
        "INSERT INTO discussion_replies (discussion_id, content, author_id) VALUES ($1, $2, $3);",
    )
    .bind(discussion_id)
    .bind(content)
    .bind(author_id)
    .execute(pool()?)
    .await?;

    Ok(())
}

pub async fn delete_discussion(discussion_id: i32) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM discussions WHERE id = $1;")
        .bind(discussion_id)
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected() > 0)
}
