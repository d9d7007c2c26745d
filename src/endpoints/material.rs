use axum::{
    Extension,
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
};

use crate::{
    authz::{self, Operation},
    database,
    endpoints::{JsonBody, json_response, ok_response, parse_id, required},
    error::ApiError,
    model::{
        material::{FileType, Material},
        request::ClientRequest,
        user::Actor,
    },
};

/// Uses the declared file type when there is one, otherwise judges by the url's extension
fn resolve_file_type(file_type: Option<&str>, file_url: &str) -> Result<FileType, ApiError> {
    match file_type.filter(|t| !t.is_empty()) {
        Some(file_type) => file_type.parse::<FileType>().map_err(ApiError::Validation),
        None => Ok(FileType::from_url(file_url)),
    }
}

async fn load_material(path_params: &[String]) -> Result<Material, ApiError> {
    let material_id = parse_id(path_params, 0, "Material")?;
    database::material::get_material(material_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Material not found"))
}

pub async fn course_materials(
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let course_id = parse_id(&path_params, 0, "Course")?;
    let materials = database::material::materials_for_course(course_id).await?;
    json_response(StatusCode::OK, &materials)
}

pub async fn get_material(Path(path_params): Path<Vec<String>>) -> Result<Response<Body>, ApiError> {
    let material = load_material(&path_params).await?;
    json_response(StatusCode::OK, &material)
}

pub async fn create_material(
    Extension(actor): Extension<Actor>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let ClientRequest {
        title,
        description,
        course: Some(course_id),
        file_url,
        file_type,
        ..
    } = client_req
    else {
        return Err(ApiError::validation("course is required"));
    };

    let title = required(title, "title")?;
    let file_url = required(file_url, "fileUrl")?;
    let file_type = resolve_file_type(file_type.as_deref(), &file_url)?;

    let Some(course) = database::course::get_course(course_id).await? else {
        return Err(ApiError::not_found("Course not found"));
    };

    authz::require(&actor, Operation::CreateMaterial { course: &course })?;

    let material = database::material::create_material(
        title,
        description.unwrap_or_default(),
        course.id,
        file_url,
        file_type,
        actor.id,
    )
    .await?;

    tracing::info!("Material {} added to course {}", material.id, course.id);
    json_response(StatusCode::OK, &material)
}

pub async fn update_material(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
    JsonBody(client_req): JsonBody<ClientRequest>,
) -> Result<Response<Body>, ApiError> {
    let mut material = load_material(&path_params).await?;

    authz::require(&actor, Operation::ManageMaterial { material: &material })?;

    let ClientRequest {
        title,
        description,
        file_url,
        file_type,
        ..
    } = client_req;

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        material.title = title;
    }
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        material.description = description;
    }

    let url_changed = file_url.as_ref().is_some_and(|u| !u.is_empty());
    if let Some(file_url) = file_url.filter(|u| !u.is_empty()) {
        material.file_url = file_url;
    }
    if url_changed || file_type.as_ref().is_some_and(|t| !t.is_empty()) {
        material.file_type = resolve_file_type(file_type.as_deref(), &material.file_url)?;
    }

    database::material::save_material(&material).await?;

    json_response(StatusCode::OK, &material)
}

pub async fn delete_material(
    Extension(actor): Extension<Actor>,
    Path(path_params): Path<Vec<String>>,
) -> Result<Response<Body>, ApiError> {
    let material = load_material(&path_params).await?;

    authz::require(&actor, Operation::ManageMaterial { material: &material })?;

    if !database::material::delete_material(material.id).await? {
        return Err(ApiError::not_found("Material not found"));
    }

    tracing::info!("Material {} removed", material.id);
    ok_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins_over_extension() {
        let file_type = resolve_file_type(Some("video"), "/uploads/notes.pdf").unwrap();
        assert_eq!(file_type, FileType::Video);
    }

    #[test]
    fn missing_type_is_derived() {
        assert_eq!(resolve_file_type(None, "/uploads/notes.pdf").unwrap(), FileType::Pdf);
        assert_eq!(resolve_file_type(Some(""), "clip.mp4").unwrap(), FileType::Video);
    }

    #[test]
    fn unknown_declared_type_is_invalid() {
        let err = resolve_file_type(Some("spreadsheet"), "a.xls").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
