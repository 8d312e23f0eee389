//! Archive building: classify, fetch concurrently, pack.

use crate::archive::ArchiveWriter;
use crate::download::fetch_asset;
use crate::error::ExportError;
use crate::naming::{classify_all, sanitize_component};
use crate::types::{
    AssetFailure, BuildReport, BuildState, BuildStatus, CatalogEntry, ExportConfig,
    FailurePolicy, ShopContext,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Suggested download name for a shop's archive.
pub fn archive_file_name(shop_name: &str) -> String {
    format!("{}-media.zip", sanitize_component(shop_name))
}

/// Turns a fetched catalog into a zip archive.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    client: reqwest::Client,
    root_folder_suffix: String,
    max_concurrent_downloads: Option<usize>,
    failure_policy: FailurePolicy,
}

impl ArchiveBuilder {
    /// Creates a builder using the archive and fetch settings of `config`.
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            root_folder_suffix: config.root_folder_suffix.clone(),
            max_concurrent_downloads: config.max_concurrent_downloads,
            failure_policy: config.failure_policy,
        }
    }

    /// Replaces the HTTP client used for asset fetches.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Downloads every entry and packs the results into one archive.
    ///
    /// All fetches start together (or up to `max_concurrent_downloads` at a
    /// time). This call is the only owner of the archive and the counters:
    /// fetch results are merged here as they complete. `on_progress` is
    /// called after every settled fetch and once more when the build reaches
    /// a terminal status.
    ///
    /// Under [`FailurePolicy::Isolate`] a failed fetch is recorded in the
    /// report and the archive holds the rest. Under [`FailurePolicy::Abort`]
    /// the first failure is returned and no archive is produced.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use filemaster::{ArchiveBuilder, CatalogEntry, ExportConfig, ShopContext};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let shop = ShopContext {
    ///     id: "gid://shopify/Shop/1".to_string(),
    ///     name: "Acme".to_string(),
    ///     email: None,
    ///     myshopify_domain: "acme.myshopify.com".to_string(),
    /// };
    /// let entries = vec![CatalogEntry::Image {
    ///     id: "gid://shopify/MediaImage/1".to_string(),
    ///     url: Some("https://cdn.shopify.com/a.jpg".to_string()),
    ///     alt: None,
    /// }];
    ///
    /// let builder = ArchiveBuilder::new(&ExportConfig::default());
    /// let report = builder
    ///     .build(&shop, &entries, |state| println!("{}%", state.percent()))
    ///     .await?;
    /// assert_eq!(report.archive.file_name, "Acme-media.zip");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build<F>(
        &self,
        shop: &ShopContext,
        entries: &[CatalogEntry],
        mut on_progress: F,
    ) -> Result<BuildReport, ExportError>
    where
        F: FnMut(&BuildState),
    {
        let shop_name = sanitize_component(&shop.name);
        let (tasks, gaps) = classify_all(&shop_name, entries);
        for gap in &gaps {
            warn!(
                "Skipping catalog entry {} ({}): {}",
                gap.index,
                gap.id.as_deref().unwrap_or("no id"),
                gap.reason
            );
        }

        let mut state = BuildState::new(tasks.len());
        let mut archive = ArchiveWriter::new(format!("{}{}", shop_name, self.root_folder_suffix))?;

        info!(
            "📦 Downloading {} file(s) for {} ({} skipped)",
            tasks.len(),
            shop.name,
            gaps.len()
        );
        state.status = BuildStatus::Fetching;

        let semaphore = self
            .max_concurrent_downloads
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut abort_handles = Vec::with_capacity(tasks.len());
        let mut in_flight = FuturesUnordered::new();

        for task in tasks {
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let url = task.source_url.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                fetch_asset(&client, &url).await
            });
            abort_handles.push(handle.abort_handle());

            in_flight.push(async move {
                let outcome = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(ExportError::AssetFetch {
                        url: task.source_url.clone(),
                        reason: format!("Task failed: {}", e),
                    }),
                };
                (task, outcome)
            });
        }

        let mut failures = Vec::new();

        while let Some((task, outcome)) = in_flight.next().await {
            let bytes = match outcome {
                Ok(bytes) => bytes,
                Err(e) => {
                    state.failed += 1;
                    warn!("Failed to download {}: {}", task.source_url, e);

                    if self.failure_policy == FailurePolicy::Abort {
                        error!("Aborting export after a failed download");
                        abort_handles.iter().for_each(|h| h.abort());
                        state.status = BuildStatus::Failed;
                        on_progress(&state);
                        return Err(e);
                    }

                    failures.push(AssetFailure {
                        task,
                        reason: e.to_string(),
                    });
                    on_progress(&state);
                    continue;
                }
            };

            match archive.add(task.bucket, &task.file_name, &bytes) {
                Ok(path) => {
                    state.completed += 1;
                    debug!("Archived {} ({} bytes)", path, bytes.len());
                    on_progress(&state);
                }
                Err(e) => {
                    error!("Failed to write {} into the archive: {}", task.file_name, e);
                    abort_handles.iter().for_each(|h| h.abort());
                    state.status = BuildStatus::Failed;
                    on_progress(&state);
                    return Err(e);
                }
            }
        }

        let entries_written = archive.entries().to_vec();
        let blob = match archive.finish(archive_file_name(&shop.name)) {
            Ok(blob) => blob,
            Err(e) => {
                state.status = BuildStatus::Failed;
                on_progress(&state);
                return Err(e);
            }
        };

        state.status = BuildStatus::Succeeded;
        on_progress(&state);

        if failures.is_empty() {
            info!(
                "✅ Archived {} file(s) into {} ({} bytes)",
                state.completed,
                blob.file_name,
                blob.bytes.len()
            );
        } else {
            warn!(
                "Archived {} of {} file(s) into {}; {} download(s) failed",
                state.completed,
                state.total,
                blob.file_name,
                failures.len()
            );
        }

        Ok(BuildReport {
            archive: blob,
            entries: entries_written,
            failures,
            gaps,
            state,
        })
    }
}
