//! Data structures for export operations.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Admin API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-10";

/// Page size used by the catalog fetcher when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size the Admin API accepts for `files`.
pub const MAX_PAGE_SIZE: u32 = 250;

/// The merchant store an export belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShopContext {
    /// Opaque shop id (`gid://shopify/Shop/...`).
    pub id: String,
    /// Display name, used to name the archive and its root folder.
    pub name: String,
    /// Contact email of the shop.
    pub email: Option<String>,
    /// The `*.myshopify.com` domain.
    #[serde(rename = "myshopifyDomain")]
    pub myshopify_domain: String,
}

/// One record of the store's file catalog.
///
/// Each known media type gets its own case. A known case whose source URL is
/// missing (e.g. a file still processing) cannot be downloaded either; see
/// [`crate::naming::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    /// `MediaImage`
    Image {
        id: String,
        url: Option<String>,
        alt: Option<String>,
    },
    /// `Video`, hosted by Shopify.
    Video {
        id: String,
        url: Option<String>,
        alt: Option<String>,
    },
    /// `ExternalVideo` (YouTube, Vimeo, ...).
    ExternalVideo {
        id: String,
        embed_url: Option<String>,
        alt: Option<String>,
    },
    /// `Model3d`; only its preview image is exported.
    Model {
        id: String,
        preview_url: Option<String>,
        alt: Option<String>,
    },
    /// `GenericFile`
    GenericFile {
        id: String,
        url: Option<String>,
        alt: Option<String>,
        mime_type: Option<String>,
    },
    /// Any node type the catalog query has no fragment for.
    Unsupported,
}

impl CatalogEntry {
    /// Catalog-assigned id, if the entry carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            CatalogEntry::Image { id, .. }
            | CatalogEntry::Video { id, .. }
            | CatalogEntry::ExternalVideo { id, .. }
            | CatalogEntry::Model { id, .. }
            | CatalogEntry::GenericFile { id, .. } => Some(id),
            CatalogEntry::Unsupported => None,
        }
    }

    /// Short name of the entry's kind, for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogEntry::Image { .. } => "image",
            CatalogEntry::Video { .. } => "video",
            CatalogEntry::ExternalVideo { .. } => "external video",
            CatalogEntry::Model { .. } => "3d model",
            CatalogEntry::GenericFile { .. } => "file",
            CatalogEntry::Unsupported => "unsupported",
        }
    }
}

/// Continuation state between two catalog pages.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Cursor of the last entry on the page.
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
    /// Whether another page follows.
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}

/// Archive subfolder an entry is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Images,
    Videos,
    Files,
}

impl Bucket {
    /// Folder name inside the archive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Images => "images",
            Bucket::Videos => "videos",
            Bucket::Files => "files",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One byte fetch derived from a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Position of the entry in the catalog list.
    pub index: usize,
    /// URL the bytes are fetched from.
    pub source_url: String,
    /// Target folder.
    pub bucket: Bucket,
    /// Target file name inside the bucket.
    pub file_name: String,
}

/// An entry that produced no download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationGap {
    /// Position of the entry in the catalog list.
    pub index: usize,
    /// Catalog id, when known.
    pub id: Option<String>,
    /// Why no task was produced.
    pub reason: String,
}

/// A task whose bytes could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    /// The task that failed.
    pub task: DownloadTask,
    /// Human-readable cause.
    pub reason: String,
}

/// What a build does when one asset fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep going, archive the successful subset and report the failures.
    #[default]
    Isolate,
    /// Stop at the first failure and produce no archive.
    Abort,
}

/// Lifecycle of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

/// Counters of one build, handed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildState {
    /// Number of download tasks; fixed once classification is done.
    pub total: usize,
    /// Tasks whose bytes were archived.
    pub completed: usize,
    /// Tasks whose fetch failed.
    pub failed: usize,
    /// Current lifecycle stage.
    pub status: BuildStatus,
}

impl BuildState {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            status: BuildStatus::Idle,
        }
    }

    /// Tasks that have settled, successfully or not.
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    /// Settled tasks as a whole percentage (0..=100).
    ///
    /// An empty build is complete by definition.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.settled() as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// A finished zip archive held in memory.
#[derive(Debug, Clone)]
pub struct ArchiveBlob {
    /// Suggested file name, `<shopName>-media.zip`.
    pub file_name: String,
    /// Serialized zip bytes.
    pub bytes: Vec<u8>,
}

/// Result of a build under [`FailurePolicy::Isolate`].
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The archive with every successfully fetched file.
    pub archive: ArchiveBlob,
    /// Archive paths written, in write order.
    pub entries: Vec<String>,
    /// Tasks whose fetch failed.
    pub failures: Vec<AssetFailure>,
    /// Catalog entries that produced no task.
    pub gaps: Vec<ClassificationGap>,
    /// Final counters.
    pub state: BuildState,
}

impl BuildReport {
    /// Whether every classified entry made it into the archive.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Configuration for talking to a store and exporting its files.
///
/// # Example
///
/// ```
/// use filemaster::{ExportConfig, FailurePolicy};
///
/// let config = ExportConfig {
///     shop: "my-shop.myshopify.com".to_string(),
///     access_token: "shpat_xxx".to_string(),
///     max_concurrent_downloads: Some(8),
///     failure_policy: FailurePolicy::Abort,
///     ..ExportConfig::default()
/// };
/// assert_eq!(config.page_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Shop domain (`my-shop.myshopify.com`) or an `http(s)://` base URL.
    pub shop: String,
    /// Admin API access token, sent as `X-Shopify-Access-Token`.
    pub access_token: String,
    /// Admin API version (e.g. `"2024-10"`).
    pub api_version: String,
    /// Entries requested per catalog page, `1..=250`.
    pub page_size: u32,
    /// Appended to the shop name to form the archive's root folder.
    pub root_folder_suffix: String,
    /// Cap on in-flight asset fetches. `None` starts every fetch at once.
    pub max_concurrent_downloads: Option<usize>,
    /// What to do when an asset fetch fails.
    pub failure_policy: FailurePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            shop: String::new(),
            access_token: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            root_folder_suffix: "_File-Master".to_string(),
            max_concurrent_downloads: None,
            failure_policy: FailurePolicy::Isolate,
        }
    }
}

impl ExportConfig {
    /// Checks values that would otherwise only fail once requests are in flight.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.shop.trim().is_empty() {
            return Err(ExportError::Config("shop must not be empty".to_string()));
        }
        if self.access_token.is_empty() {
            return Err(ExportError::Config(
                "access token must not be empty".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ExportError::Config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.max_concurrent_downloads == Some(0) {
            return Err(ExportError::Config(
                "max concurrent downloads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// URL of the Admin GraphQL endpoint for the configured shop.
    pub fn graphql_endpoint(&self) -> Result<Url, ExportError> {
        let shop = self.shop.trim().trim_end_matches('/');
        let base = if shop.starts_with("http://") || shop.starts_with("https://") {
            shop.to_string()
        } else {
            format!("https://{}", shop)
        };
        let endpoint = format!("{}/admin/api/{}/graphql.json", base, self.api_version);
        Url::parse(&endpoint)
            .map_err(|e| ExportError::Config(format!("invalid shop '{}': {}", self.shop, e)))
    }
}
