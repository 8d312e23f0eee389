//! Top-level export flow: fetch the catalog, then build the archive.

use crate::builder::ArchiveBuilder;
use crate::catalog::CatalogClient;
use crate::error::ExportError;
use crate::graphql::AdminClient;
use crate::naming::{classify_all, sanitize_component};
use crate::types::{
    BuildReport, BuildState, ClassificationGap, DownloadTask, ExportConfig, ShopContext,
};
use tracing::info;

/// Catalog classification without any download.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// The shop the catalog belongs to.
    pub shop: ShopContext,
    /// One task per downloadable entry, in catalog order.
    pub tasks: Vec<DownloadTask>,
    /// Entries that would be skipped.
    pub gaps: Vec<ClassificationGap>,
}

/// Exports every file of the configured shop into one zip archive.
///
/// This is the main entry point. It performs the following steps:
///
/// 1. Validates the configuration
/// 2. Pages through the whole file catalog
/// 3. Downloads every entry concurrently and packs the archive
///
/// # Arguments
///
/// * `config` - Shop, credentials and export settings
/// * `on_progress` - Called with the build counters as downloads settle
///
/// # Returns
///
/// The shop and the build report. Writing the archive to disk is left to
/// the caller (see [`crate::ArchiveBlob::save`]).
///
/// # Example
///
/// ```no_run
/// use filemaster::{export_shop, ExportConfig};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExportConfig {
///     shop: "my-shop.myshopify.com".to_string(),
///     access_token: "shpat_xxx".to_string(),
///     ..ExportConfig::default()
/// };
/// let (_shop, report) = export_shop(&config, |_| {}).await?;
/// report.archive.save(Path::new(".")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn export_shop<F>(
    config: &ExportConfig,
    on_progress: F,
) -> Result<(ShopContext, BuildReport), ExportError>
where
    F: FnMut(&BuildState),
{
    config.validate()?;

    let admin = AdminClient::new(config)?;
    let http = admin.http().clone();
    let catalog = CatalogClient::new(admin, config.page_size)?;
    let (shop, entries) = catalog.fetch_all_entries().await?;

    let builder = ArchiveBuilder::new(config).with_client(http);
    let report = builder.build(&shop, &entries, on_progress).await?;

    Ok((shop, report))
}

/// Fetches the catalog and classifies it without downloading anything.
pub async fn plan_export(config: &ExportConfig) -> Result<ExportPlan, ExportError> {
    config.validate()?;

    let catalog = CatalogClient::new(AdminClient::new(config)?, config.page_size)?;
    let (shop, entries) = catalog.fetch_all_entries().await?;

    let (tasks, gaps) = classify_all(&sanitize_component(&shop.name), &entries);
    info!(
        "Planned {} download(s), {} catalog entries skipped",
        tasks.len(),
        gaps.len()
    );

    Ok(ExportPlan { shop, tasks, gaps })
}
