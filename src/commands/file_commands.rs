use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AppError};
use crate::models::file_entry::{Breadcrumb, FileEntry};
use crate::scope_path::RelativePath;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileEntry>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Serialize)]
pub struct StatResponse {
    pub file: FileEntry,
}

#[derive(Debug, Deserialize)]
pub struct CreateDirectoryRequest {
    #[serde(default)]
    pub path: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateDirectoryResponse {
    pub success: bool,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    const CONTEXT: &str = "Failed to list files";
    let relative = RelativePath::parse(&query.path).map_err(|e| e.respond(CONTEXT))?;
    let breadcrumbs = relative.breadcrumbs();
    let files = state
        .with_store(move |store| store.list(&relative))
        .await
        .map_err(|e| e.respond(CONTEXT))?;
    Ok(Json(ListResponse { files, breadcrumbs }))
}

pub async fn stat_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<StatResponse>, ApiError> {
    const CONTEXT: &str = "Failed to get file info";
    let relative = RelativePath::parse(&query.path).map_err(|e| e.respond(CONTEXT))?;
    let file = state
        .with_store(move |store| store.stat(&relative))
        .await
        .map_err(|e| e.respond(CONTEXT))?;
    Ok(Json(StatResponse { file }))
}

pub async fn create_directory(
    State(state): State<AppState>,
    payload: Result<Json<CreateDirectoryRequest>, JsonRejection>,
) -> Result<Json<CreateDirectoryResponse>, ApiError> {
    const CONTEXT: &str = "Failed to create directory";
    let request = json_body(payload).map_err(|e| e.respond(CONTEXT))?;
    let name = request
        .name
        .ok_or_else(|| AppError::BadRequest("Name is required".to_string()))
        .map_err(|e| e.respond(CONTEXT))?;

    let target = RelativePath::parse(&request.path)
        .and_then(|parent| parent.join(&name))
        .map_err(|e| e.respond(CONTEXT))?;

    let created = target.to_string();
    state
        .with_store(move |store| store.create_directory(&target))
        .await
        .map_err(|e| e.respond(CONTEXT))?;

    Ok(Json(CreateDirectoryResponse {
        success: true,
        path: created,
    }))
}

pub async fn delete_item(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    const CONTEXT: &str = "Failed to delete item";
    let request = json_body(payload).map_err(|e| e.respond(CONTEXT))?;
    let path = request
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Path is required".to_string()))
        .map_err(|e| e.respond(CONTEXT))?;

    let relative = RelativePath::parse(&path).map_err(|e| e.respond(CONTEXT))?;
    state
        .with_store(move |store| store.delete(&relative))
        .await
        .map_err(|e| e.respond(CONTEXT))?;

    Ok(Json(SuccessResponse { success: true }))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Failed to download file";
    let relative = RelativePath::parse(&path).map_err(|e| e.respond(CONTEXT))?;
    let download = state
        .with_store(move |store| store.read_file(&relative))
        .await
        .map_err(|e| e.respond(CONTEXT))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        quoted_file_name(&download.file_name)
    );
    Ok((
        [
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        ],
        download.bytes,
    )
        .into_response())
}

fn quoted_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_file_name_strips_header_breakers() {
        assert_eq!(quoted_file_name("report.pdf"), "report.pdf");
        assert_eq!(quoted_file_name("a\"b\\c\r\n.txt"), "a_b_c__.txt");
        assert_eq!(quoted_file_name("résumé.txt"), "résumé.txt");
    }
}
