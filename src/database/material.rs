use sqlx::{Row, postgres::PgRow};

use crate::{
    database::{decode, pool},
    error::ApiError,
    model::material::{FileType, Material},
};

const MATERIAL_COLUMNS: &str =
    "id, title, description, course_id, file_url, file_type, upload_date, created_by";

fn material_from_row(row: &PgRow) -> Result<Material, ApiError> {
    let file_type: String = row.try_get("file_type")?;

    Ok(Material {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        course_id: row.try_get("course_id")?,
        file_url: row.try_get("file_url")?,
        file_type: decode::<FileType>(&file_type)?,
        upload_date: row.try_get("upload_date")?,
        created_by: row.try_get("created_by")?,
    })
}

pub async fn materials_for_course(course_id: i32) -> Result<Vec<Material>, ApiError> {
    let rows = sqlx::query(&format!(
        "SELECT {MATERIAL_COLUMNS} FROM materials WHERE course_id = $1 ORDER BY upload_date ASC, id ASC;"
    ))
    .bind(course_id)
    .fetch_all(pool()?)
    .await?;

    rows.iter().map(material_from_row).collect()
}

pub async fn get_material(material_id: i32) -> Result<Option<Material>, ApiError> {
    let row = sqlx::query(&format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1;"))
        .bind(material_id)
        .fetch_optional(pool()?)
        .await?;

    row.as_ref().map(material_from_row).transpose()
}

pub async fn create_material(
    title: String,
    description: String,
    course_id: i32,
    file_url: String,
    file_type: FileType,
    created_by: i32,
) -> Result<Material, ApiError> {
    let row = sqlx::query(&format!(
        "INSERT INTO materials (title, description, course_id, file_url, file_type, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {MATERIAL_COLUMNS};"
    ))
    .bind(title)
    .bind(description)
    .bind(course_id)
    .bind(file_url)
    .bind(file_type.as_str())
    .bind(created_by)
    .fetch_one(pool()?)
    .await?;

    material_from_row(&row)
}

pub async fn save_material(material: &Material) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE materials
        SET title = $2, description = $3, file_url = $4, file_type = $5
        WHERE id = $1;",
    )
    .bind(material.id)
    .bind(&material.title)
    .bind(&material.description)
    .bind(&material.file_url)
    .bind(material.file_type.as_str())
    .execute(pool()?)
    .await?;

    Ok(())
}

pub async fn delete_material(material_id: i32) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM materials WHERE id = $1;")
        .bind(material_id)
        .execute(pool()?)
        .await?;

    Ok(result.rows_affected() > 0)
}
