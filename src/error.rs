//! Error types for export and upload operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the Admin GraphQL API.
#[derive(Error, Debug)]
pub enum GraphqlError {
    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status} from {endpoint}")]
    Status {
        /// Endpoint that was queried.
        endpoint: String,
        /// Status code returned.
        status: reqwest::StatusCode,
    },

    /// The request could not be sent or the body could not be read.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body was not a GraphQL response of the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The response carried a top-level `errors` array.
    #[error("GraphQL errors: {}", .0.join("; "))]
    Errors(Vec<String>),
}

/// Errors that can occur during export and upload operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A catalog page could not be fetched or decoded. The whole fetch aborts.
    #[error("Catalog fetch failed: {0}")]
    CatalogFetch(#[source] GraphqlError),

    /// A single asset could not be downloaded.
    #[error("Asset fetch failed for {url}: {reason}")]
    AssetFetch {
        /// Source URL of the asset.
        url: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The archive could not be written or finalised.
    #[error("Archive serialization failed: {0}")]
    ArchiveSerialization(String),

    /// A local file could not be uploaded to the store.
    #[error("Upload failed for {}: {reason}", file.display())]
    Upload {
        /// Local path of the file.
        file: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl From<zip::result::ZipError> for ExportError {
    fn from(e: zip::result::ZipError) -> Self {
        ExportError::ArchiveSerialization(e.to_string())
    }
}
