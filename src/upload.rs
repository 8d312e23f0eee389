//! Staged uploads: push local files into the store's file catalog.
//!
//! Each file goes through three steps: `stagedUploadsCreate` reserves an
//! upload target, the bytes are posted to that target as a multipart form,
//! and `fileCreate` registers the uploaded resource with the store.

use crate::error::{ExportError, GraphqlError};
use crate::graphql::AdminClient;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const STAGED_UPLOADS_CREATE: &str = r#"
mutation stagedUploadsCreate($input: [StagedUploadInput!]!) {
  stagedUploadsCreate(input: $input) {
    stagedTargets {
      url
      resourceUrl
      parameters {
        name
        value
      }
    }
    userErrors {
      field
      message
    }
  }
}
"#;

const FILE_CREATE: &str = r#"
mutation fileCreate($files: [FileCreateInput!]!) {
  fileCreate(files: $files) {
    files {
      id
      fileStatus
    }
    userErrors {
      field
      message
    }
  }
}
"#;

#[derive(Deserialize, Debug, Clone)]
struct UserError {
    message: String,
}

#[derive(Deserialize, Debug, Clone)]
struct StagedParameter {
    name: String,
    value: String,
}

/// Where and how to post one file's bytes.
#[derive(Deserialize, Debug, Clone)]
struct StagedTarget {
    url: String,
    #[serde(rename = "resourceUrl")]
    resource_url: String,
    parameters: Vec<StagedParameter>,
}

#[derive(Deserialize, Debug)]
struct StagedUploadsPayload {
    #[serde(rename = "stagedTargets")]
    staged_targets: Vec<StagedTarget>,
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize, Debug)]
struct StagedUploadsData {
    #[serde(rename = "stagedUploadsCreate")]
    staged_uploads_create: StagedUploadsPayload,
}

#[derive(Deserialize, Debug)]
struct CreatedFile {
    id: String,
}

#[derive(Deserialize, Debug)]
struct FileCreatePayload {
    #[serde(default)]
    files: Vec<CreatedFile>,
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize, Debug)]
struct FileCreateData {
    #[serde(rename = "fileCreate")]
    file_create: FileCreatePayload,
}

/// A file that made it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Local path it was read from.
    pub path: PathBuf,
    /// Staged resource URL the bytes were posted to.
    pub resource_url: String,
    /// Id of the created catalog file.
    pub file_id: String,
}

/// Outcome of an upload run.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Files registered with the store, in input order.
    pub uploaded: Vec<UploadedFile>,
    /// Files that failed, with their error.
    pub failed: Vec<ExportError>,
}

/// Guesses a MIME type from a file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "glb" => "model/gltf-binary",
        "usdz" => "model/vnd.usdz+zip",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// `contentType` for `fileCreate`, also valid as a staged upload `resource`.
fn file_content_type(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        "IMAGE"
    } else if mime_type.starts_with("video/") {
        "VIDEO"
    } else if mime_type.starts_with("model/") {
        "MODEL_3D"
    } else {
        "FILE"
    }
}

/// Uploads local files to a store through staged uploads.
#[derive(Debug, Clone)]
pub struct Uploader {
    admin: AdminClient,
    mime_override: Option<String>,
}

impl Uploader {
    /// Creates an uploader that talks to the store behind `admin`.
    pub fn new(admin: AdminClient) -> Self {
        Self {
            admin,
            mime_override: None,
        }
    }

    /// Uses `mime_type` for every file instead of guessing from extensions.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_override = Some(mime_type.into());
        self
    }

    /// Uploads `paths` one after another.
    ///
    /// A failing file is recorded in the report and the remaining files are
    /// still attempted.
    pub async fn upload_all(&self, paths: &[PathBuf]) -> UploadReport {
        let mut report = UploadReport::default();

        for path in paths {
            match self.upload_file(path).await {
                Ok(uploaded) => {
                    info!("✅ Uploaded {} as {}", path.display(), uploaded.file_id);
                    report.uploaded.push(uploaded);
                }
                Err(e) => {
                    warn!("Failed to upload {}: {}", path.display(), e);
                    report.failed.push(e);
                }
            }
        }

        report
    }

    /// Stages, posts and registers a single file.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ExportError> {
        let upload_error = |reason: String| ExportError::Upload {
            file: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| upload_error("path has no usable file name".to_string()))?
            .to_string();
        let mime_type = self
            .mime_override
            .clone()
            .unwrap_or_else(|| mime_type_for(path).to_string());

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| upload_error(format!("cannot read file: {}", e)))?;
        info!(
            "⬆️  Uploading {} ({}, {} bytes)",
            file_name,
            mime_type,
            bytes.len()
        );

        let target = self
            .stage(&file_name, &mime_type, bytes.len() as u64)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        self.post_to_target(&target, &file_name, &mime_type, bytes)
            .await
            .map_err(upload_error)?;

        let file_id = self
            .register(&target.resource_url, &mime_type)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        Ok(UploadedFile {
            path: path.to_path_buf(),
            resource_url: target.resource_url,
            file_id,
        })
    }

    async fn stage(
        &self,
        file_name: &str,
        mime_type: &str,
        size: u64,
    ) -> Result<StagedTarget, GraphqlError> {
        let variables = json!({
            "input": [{
                "resource": file_content_type(mime_type),
                "filename": file_name,
                "mimeType": mime_type,
                "fileSize": size.to_string(),
                "httpMethod": "POST",
            }]
        });

        let data: StagedUploadsData = self.admin.execute(STAGED_UPLOADS_CREATE, variables).await?;
        let payload = data.staged_uploads_create;
        if !payload.user_errors.is_empty() {
            return Err(GraphqlError::Errors(
                payload.user_errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        payload
            .staged_targets
            .into_iter()
            .next()
            .ok_or_else(|| GraphqlError::Malformed("no staged target returned".to_string()))
    }

    async fn post_to_target(
        &self,
        target: &StagedTarget,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let mut form = reqwest::multipart::Form::new();
        for parameter in &target.parameters {
            form = form.text(parameter.name.clone(), parameter.value.clone());
        }

        // The target expects the file part after every signed parameter.
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| format!("invalid MIME type {}: {}", mime_type, e))?;
        form = form.part("file", part);

        let response = self
            .admin
            .http()
            .post(&target.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("staged target returned HTTP {}", status));
        }
        Ok(())
    }

    async fn register(&self, resource_url: &str, mime_type: &str) -> Result<String, GraphqlError> {
        let variables = json!({
            "files": [{
                "originalSource": resource_url,
                "contentType": file_content_type(mime_type),
            }]
        });

        let data: FileCreateData = self.admin.execute(FILE_CREATE, variables).await?;
        let payload = data.file_create;
        if !payload.user_errors.is_empty() {
            return Err(GraphqlError::Errors(
                payload.user_errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        payload
            .files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| GraphqlError::Malformed("fileCreate returned no file".to_string()))
    }
}
