//! FileMaster - Export a Shopify store's media files into one zip archive
//!
//! This library pages through a store's file catalog over the Admin GraphQL
//! API, downloads every file concurrently and packs them into a zip laid out
//! as `<shop>_File-Master/{images,videos,files}/<name>`.
//!
//! # Features
//!
//! - **Full Catalog Paging**: Follows `pageInfo` cursors until the last page
//! - **Concurrent Downloads**: Every file is fetched at once, optionally capped
//! - **Failure Isolation**: A failed download is reported, not fatal (configurable)
//! - **Progress Tracking**: Callback with completion counters and percentage
//! - **Staged Uploads**: Push local files back into the store's catalog
//!
//! # Example
//!
//! ```no_run
//! use filemaster::{export_shop, ExportConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig {
//!     shop: "my-shop.myshopify.com".to_string(),
//!     access_token: std::env::var("SHOPIFY_ACCESS_TOKEN")?,
//!     ..ExportConfig::default()
//! };
//!
//! let (shop, report) = export_shop(&config, |state| {
//!     println!("{}%", state.percent());
//! })
//! .await?;
//! report.archive.save(Path::new(".")).await?;
//! println!("Exported {} files for {}", report.state.completed, shop.name);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod builder;
pub mod catalog;
mod download;
pub mod error;
pub mod graphql;
pub mod naming;
pub mod orchestrator;
pub mod types;
pub mod upload;

pub use archive::ArchiveWriter;
pub use builder::{archive_file_name, ArchiveBuilder};
pub use catalog::CatalogClient;
pub use error::{ExportError, GraphqlError};
pub use graphql::AdminClient;
pub use orchestrator::{export_shop, plan_export, ExportPlan};
pub use types::{
    ArchiveBlob, AssetFailure, Bucket, BuildReport, BuildState, BuildStatus, CatalogEntry,
    ClassificationGap, DownloadTask, ExportConfig, FailurePolicy, PageCursor, ShopContext,
};
pub use upload::{UploadReport, UploadedFile, Uploader};
