//! Catalog fetching: pages through the store's `files` connection.

use crate::error::{ExportError, GraphqlError};
use crate::graphql::AdminClient;
use crate::types::{CatalogEntry, PageCursor, ShopContext, MAX_PAGE_SIZE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// One query serves every page; shop metadata is only requested on the first.
const FILE_CATALOG_QUERY: &str = r#"
query FileCatalog($first: Int!, $after: String, $withShop: Boolean!) {
  shop @include(if: $withShop) {
    id
    name
    email
    myshopifyDomain
  }
  files(first: $first, after: $after) {
    edges {
      node {
        __typename
        ... on MediaImage {
          id
          alt
          image {
            url
          }
        }
        ... on Video {
          id
          alt
          originalSource {
            url
          }
        }
        ... on ExternalVideo {
          id
          alt
          embedUrl
        }
        ... on Model3d {
          id
          alt
          preview {
            image {
              originalSrc
            }
          }
        }
        ... on GenericFile {
          id
          alt
          url
          mimeType
        }
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}
"#;

#[derive(Deserialize, Debug)]
struct CatalogPage {
    shop: Option<ShopContext>,
    files: FileConnection,
}

#[derive(Deserialize, Debug)]
struct FileConnection {
    edges: Vec<FileEdge>,
    #[serde(rename = "pageInfo")]
    page_info: PageCursor,
}

#[derive(Deserialize, Debug)]
struct FileEdge {
    node: FileNode,
}

#[derive(Deserialize, Debug)]
struct UrlField {
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PreviewImage {
    #[serde(rename = "originalSrc")]
    original_src: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ModelPreview {
    image: Option<PreviewImage>,
}

/// A `files` node as the API returns it.
#[derive(Deserialize, Debug)]
#[serde(tag = "__typename")]
enum FileNode {
    MediaImage {
        id: String,
        alt: Option<String>,
        image: Option<UrlField>,
    },
    Video {
        id: String,
        alt: Option<String>,
        #[serde(rename = "originalSource")]
        original_source: Option<UrlField>,
    },
    ExternalVideo {
        id: String,
        alt: Option<String>,
        #[serde(rename = "embedUrl")]
        embed_url: Option<String>,
    },
    Model3d {
        id: String,
        alt: Option<String>,
        preview: Option<ModelPreview>,
    },
    GenericFile {
        id: String,
        alt: Option<String>,
        url: Option<String>,
        #[serde(rename = "mimeType")]
        mime_type: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl From<FileNode> for CatalogEntry {
    fn from(node: FileNode) -> Self {
        match node {
            FileNode::MediaImage { id, alt, image } => CatalogEntry::Image {
                id,
                url: image.and_then(|i| i.url),
                alt,
            },
            FileNode::Video {
                id,
                alt,
                original_source,
            } => CatalogEntry::Video {
                id,
                url: original_source.and_then(|s| s.url),
                alt,
            },
            FileNode::ExternalVideo { id, alt, embed_url } => {
                CatalogEntry::ExternalVideo { id, embed_url, alt }
            }
            FileNode::Model3d { id, alt, preview } => CatalogEntry::Model {
                id,
                preview_url: preview
                    .and_then(|p| p.image)
                    .and_then(|i| i.original_src),
                alt,
            },
            FileNode::GenericFile {
                id,
                alt,
                url,
                mime_type,
            } => CatalogEntry::GenericFile {
                id,
                url,
                alt,
                mime_type,
            },
            FileNode::Other => CatalogEntry::Unsupported,
        }
    }
}

/// Reads a shop's whole file catalog, one page at a time.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    admin: AdminClient,
    page_size: u32,
}

impl CatalogClient {
    /// Creates a fetcher requesting `page_size` entries per page (`1..=250`).
    pub fn new(admin: AdminClient, page_size: u32) -> Result<Self, ExportError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ExportError::Config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        Ok(Self { admin, page_size })
    }

    /// Fetches the shop metadata and every catalog entry, in API order.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use filemaster::{AdminClient, CatalogClient, ExportConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ExportConfig {
    ///     shop: "my-shop.myshopify.com".to_string(),
    ///     access_token: "shpat_xxx".to_string(),
    ///     ..ExportConfig::default()
    /// };
    /// let catalog = CatalogClient::new(AdminClient::new(&config)?, config.page_size)?;
    /// let (shop, entries) = catalog.fetch_all_entries().await?;
    /// println!("{} has {} files", shop.name, entries.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch_all_entries(
        &self,
    ) -> Result<(ShopContext, Vec<CatalogEntry>), ExportError> {
        self.fetch_all_entries_from(None).await
    }

    /// Like [`fetch_all_entries`](Self::fetch_all_entries), starting after `start_cursor`.
    ///
    /// Any failing page aborts the whole fetch; nothing partial is returned.
    pub async fn fetch_all_entries_from(
        &self,
        start_cursor: Option<String>,
    ) -> Result<(ShopContext, Vec<CatalogEntry>), ExportError> {
        info!("Retrieving file catalog from {}", self.admin.endpoint());

        let first = self.fetch_page(start_cursor.as_deref(), true).await?;
        let shop = first.shop.ok_or_else(|| {
            ExportError::CatalogFetch(GraphqlError::Malformed(
                "response has no shop".to_string(),
            ))
        })?;

        let mut entries: Vec<CatalogEntry> = first
            .files
            .edges
            .into_iter()
            .map(|edge| edge.node.into())
            .collect();
        let mut cursor = first.files.page_info;
        let mut pages = 1;

        while cursor.has_next_page {
            let after = cursor.end_cursor.ok_or_else(|| {
                ExportError::CatalogFetch(GraphqlError::Malformed(
                    "hasNextPage is true but endCursor is missing".to_string(),
                ))
            })?;

            let page = self.fetch_page(Some(&after), false).await?;
            pages += 1;
            debug!(
                "Page {} returned {} entries (after {})",
                pages,
                page.files.edges.len(),
                after
            );

            entries.extend(page.files.edges.into_iter().map(|edge| edge.node.into()));
            cursor = page.files.page_info;
        }

        info!(
            "Fetched {} catalog entries in {} page(s) for {}",
            entries.len(),
            pages,
            shop.name
        );
        Ok((shop, entries))
    }

    async fn fetch_page(
        &self,
        after: Option<&str>,
        with_shop: bool,
    ) -> Result<CatalogPage, ExportError> {
        let variables = json!({
            "first": self.page_size,
            "after": after,
            "withShop": with_shop,
        });

        self.admin
            .execute(FILE_CATALOG_QUERY, variables)
            .await
            .map_err(ExportError::CatalogFetch)
    }
}
