use crate::error::AppError;
use crate::models::upload::{BatchUploadReport, UploadResult};
use crate::scope_path::RelativePath;
use crate::services::file_service::DirectoryStore;
use axum::body::Bytes;
use std::sync::Arc;
use tokio::task::JoinSet;

/// One file carried by an upload request. `client_name` is the name the
/// client declared, which for folder uploads may include a `/`-separated
/// sub-path below the upload directory.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub client_name: String,
    pub bytes: Bytes,
}

/// Resolves where a batch item lands. The declared sub-path is normalized on
/// its own, so it can never climb above `base`.
pub fn batch_target(base: &RelativePath, client_name: &str) -> Result<RelativePath, AppError> {
    let sub_path = RelativePath::parse(client_name)?;
    if sub_path.is_root() {
        return Err(AppError::InvalidName("file name is empty".to_string()));
    }
    Ok(base.join_relative(&sub_path))
}

pub fn upload_single(
    store: &DirectoryStore,
    base: &RelativePath,
    item: &UploadItem,
) -> Result<RelativePath, AppError> {
    let target = base.join(&item.client_name)?;
    store.write_file(&target, &item.bytes)?;
    tracing::info!(path = %target, size = item.bytes.len(), "uploaded file");
    Ok(target)
}

/// Writes every item concurrently and reports each outcome in request order.
/// A failing item never stops its siblings.
pub async fn upload_batch(
    store: Arc<DirectoryStore>,
    base: RelativePath,
    items: Vec<UploadItem>,
) -> BatchUploadReport {
    let mut results: Vec<Option<UploadResult>> = vec![None; items.len()];
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let store = Arc::clone(&store);
        let base = base.clone();
        tasks.spawn_blocking(move || {
            let size = item.bytes.len() as u64;
            let outcome = batch_target(&base, &item.client_name).and_then(|target| {
                store.write_file(&target, &item.bytes)?;
                Ok(target)
            });
            (index, item.client_name, size, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, client_name, size, outcome) = match joined {
            Ok(done) => done,
            Err(err) => {
                tracing::error!(error = %err, "upload task failed");
                continue;
            }
        };
        results[index] = Some(describe(&base, client_name, size, outcome));
    }

    let results = results
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| UploadResult {
                name: String::new(),
                path: String::new(),
                size: 0,
                success: false,
                error: Some("upload task failed".to_string()),
            })
        })
        .collect();

    let report = BatchUploadReport::from_results(results);
    tracing::info!(
        base = %base,
        uploaded = report.total_uploaded,
        failed = report.total_failed,
        "batch upload finished"
    );
    report
}

fn describe(
    base: &RelativePath,
    client_name: String,
    size: u64,
    outcome: Result<RelativePath, AppError>,
) -> UploadResult {
    match outcome {
        Ok(target) => UploadResult {
            name: target.file_name().unwrap_or_default().to_string(),
            path: target.to_string(),
            size,
            success: true,
            error: None,
        },
        Err(err) => {
            tracing::warn!(base = %base, name = %client_name, error = %err, "upload item failed");
            let name = client_name
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string();
            UploadResult {
                name,
                path: client_name,
                size,
                success: false,
                error: Some(err.public_message().to_string()),
            }
        }
    }
}
