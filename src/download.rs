//! Asset byte fetching.

use crate::error::ExportError;
use futures_util::StreamExt;
use tracing::debug;

/// Upper bound on what a `Content-Length` header may preallocate.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Downloads the bytes behind `url` into memory.
///
/// No auth headers are attached; catalog URLs are public CDN links.
///
/// # Arguments
///
/// * `client` - HTTP client to send the request with
/// * `url` - The URL to download from
///
/// # Returns
///
/// The response body, or [`ExportError::AssetFetch`] on a network error or
/// non-success status.
pub(crate) async fn fetch_asset(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, ExportError> {
    let asset_error = |reason: String| ExportError::AssetFetch {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| asset_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(asset_error(format!("HTTP {}", status)));
    }

    let capacity = response
        .content_length()
        .map_or(0, |len| len.min(MAX_PREALLOCATION) as usize);
    let mut bytes = Vec::with_capacity(capacity);

    let mut byte_stream = response.bytes_stream();
    while let Some(piece) = byte_stream.next().await {
        let chunk = piece.map_err(|e| asset_error(e.to_string()))?;
        bytes.extend_from_slice(&chunk);
    }

    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
