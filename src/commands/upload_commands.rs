use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{ApiError, AppError};
use crate::scope_path::RelativePath;
use crate::services::upload_service::{self, UploadItem};
use crate::state::AppState;

const CONTEXT: &str = "Failed to upload file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleUploadResponse {
    pub success: bool,
    pub file_name: String,
}

/// Parts collected from an upload form. Fields may arrive in any order, so
/// the whole form is read before anything is written.
#[derive(Debug, Default)]
struct UploadForm {
    path: String,
    file: Option<UploadItem>,
    files: Vec<UploadItem>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid upload body: {}", err.body_text()))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "path" => form.path = field.text().await.map_err(multipart_error)?,
            "file" | "files" => {
                let client_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                let item = UploadItem { client_name, bytes };
                if field_name == "file" {
                    form.file = Some(item);
                } else {
                    form.files.push(item);
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }
    Ok(form)
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        AppError::BadRequest(format!("Invalid upload body: {}", rejection.body_text()))
            .respond(CONTEXT)
    })?;
    let form = read_form(multipart).await.map_err(|e| e.respond(CONTEXT))?;
    // clients send the target directory with spaces still encoded
    let base = RelativePath::parse(&form.path.replace("%20", " "))
        .map_err(|e| e.respond(CONTEXT))?;

    if !form.files.is_empty() {
        let mut items = form.files;
        items.extend(form.file);
        let report = upload_service::upload_batch(Arc::clone(&state.store), base, items).await;
        return Ok(Json(report).into_response());
    }

    let item = form
        .file
        .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))
        .map_err(|e| e.respond(CONTEXT))?;
    let file_name = item.client_name.clone();
    state
        .with_store(move |store| upload_service::upload_single(store, &base, &item))
        .await
        .map_err(|e| e.respond(CONTEXT))?;

    Ok(Json(SingleUploadResponse {
        success: true,
        file_name,
    })
    .into_response())
}
