use serde::{Deserialize, Serialize};

/// Outcome of writing one file from an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadReport {
    pub success: bool,
    pub results: Vec<UploadResult>,
    pub total_uploaded: usize,
    pub total_failed: usize,
}

impl BatchUploadReport {
    pub fn from_results(results: Vec<UploadResult>) -> Self {
        let total_uploaded = results.iter().filter(|r| r.success).count();
        let total_failed = results.len() - total_uploaded;
        Self {
            success: true,
            results,
            total_uploaded,
            total_failed,
        }
    }
}
