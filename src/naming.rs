//! Entry classification and archive file naming.

use crate::types::{Bucket, CatalogEntry, ClassificationGap, DownloadTask};
use url::Url;

/// Name used when no file name can be derived from a URL.
pub const UNKNOWN_FILE_NAME: &str = "unknown_file";

/// Derives a file name from the last path segment of a URL.
///
/// Query strings and fragments are dropped and percent-encoding is decoded.
/// An encoded `?` or `#` belongs to the name and is kept.
/// Anything that does not parse as an absolute URL, or has no usable final
/// segment, yields [`UNKNOWN_FILE_NAME`].
///
/// # Example
///
/// ```
/// use filemaster::naming::extract_file_name;
///
/// assert_eq!(extract_file_name("https://cdn.shopify.com/s/files/a.jpg?v=17"), "a.jpg");
/// assert_eq!(extract_file_name("not a url"), "unknown_file");
/// ```
pub fn extract_file_name(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return UNKNOWN_FILE_NAME.to_string(),
    };

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let name = decoded.replace(['/', '\\'], "_");

    if name.is_empty() || name == "." || name == ".." {
        UNKNOWN_FILE_NAME.to_string()
    } else {
        name
    }
}

/// Makes a shop name usable as a folder or file name.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "shop".to_string()
    } else {
        cleaned
    }
}

/// Turns one catalog entry into a download task.
///
/// `shop_name` is used for external video names, `index` is the entry's
/// position in the catalog list. Entries without anything to download are
/// returned as a [`ClassificationGap`].
pub fn classify(
    shop_name: &str,
    index: usize,
    entry: &CatalogEntry,
) -> Result<DownloadTask, ClassificationGap> {
    let (bucket, source, fixed_name) = match entry {
        CatalogEntry::Image { url, .. } => (Bucket::Images, url, None),
        CatalogEntry::Video { url, .. } => (Bucket::Videos, url, None),
        CatalogEntry::ExternalVideo { embed_url, .. } => (
            Bucket::Files,
            embed_url,
            Some(format!("{}_external_{}.url", shop_name, index)),
        ),
        CatalogEntry::Model { preview_url, .. } => (Bucket::Images, preview_url, None),
        CatalogEntry::GenericFile { url, .. } => (Bucket::Files, url, None),
        CatalogEntry::Unsupported => {
            return Err(ClassificationGap {
                index,
                id: None,
                reason: "node type is not covered by the catalog query".to_string(),
            })
        }
    };

    let source_url = match source.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url.to_string(),
        None => {
            return Err(ClassificationGap {
                index,
                id: entry.id().map(str::to_string),
                reason: format!("{} has no source URL", entry.kind()),
            })
        }
    };

    let file_name = fixed_name.unwrap_or_else(|| extract_file_name(&source_url));

    Ok(DownloadTask {
        index,
        source_url,
        bucket,
        file_name,
    })
}

/// Classifies every entry, keeping catalog order in both outputs.
pub fn classify_all(
    shop_name: &str,
    entries: &[CatalogEntry],
) -> (Vec<DownloadTask>, Vec<ClassificationGap>) {
    let mut tasks = Vec::with_capacity(entries.len());
    let mut gaps = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match classify(shop_name, index, entry) {
            Ok(task) => tasks.push(task),
            Err(gap) => gaps.push(gap),
        }
    }

    (tasks, gaps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str) -> CatalogEntry {
        CatalogEntry::Image {
            id: "gid://shopify/MediaImage/1".to_string(),
            url: Some(url.to_string()),
            alt: None,
        }
    }

    #[test]
    fn test_extract_strips_query_and_fragment() {
        assert_eq!(
            extract_file_name("https://cdn.shopify.com/s/files/1/0001/files/a.jpg?v=1712"),
            "a.jpg"
        );
        assert_eq!(extract_file_name("https://x.test/dir/doc.pdf#page=2"), "doc.pdf");
        assert_eq!(extract_file_name("https://x.test/dir/clip.mp4?a=1#t=3"), "clip.mp4");
    }

    #[test]
    fn test_extract_decodes_segment() {
        assert_eq!(
            extract_file_name("https://x.test/files/summer%20sale.png"),
            "summer sale.png"
        );
        assert_eq!(extract_file_name("https://x.test/files/a%2Fb.png"), "a_b.png");
        assert_eq!(extract_file_name("https://x.test/files/what%3Fv=1"), "what?v=1");
    }

    #[test]
    fn test_extract_keeps_encoded_query_marks() {
        let names: Vec<String> = [
            "https://cdn.test/files/report%3Fv1.pdf",
            "https://cdn.test/files/report%3Fv2.pdf?width=10",
            "https://cdn.test/files/track%231.mp3#t=5",
        ]
        .iter()
        .map(|url| extract_file_name(url))
        .collect();
        assert_eq!(names, ["report?v1.pdf", "report?v2.pdf", "track#1.mp3"]);
    }

    #[test]
    fn test_extract_falls_back_to_placeholder() {
        assert_eq!(extract_file_name("not a url"), UNKNOWN_FILE_NAME);
        assert_eq!(extract_file_name("/relative/a.jpg"), UNKNOWN_FILE_NAME);
        assert_eq!(extract_file_name(""), UNKNOWN_FILE_NAME);
        assert_eq!(extract_file_name("https://x.test/"), UNKNOWN_FILE_NAME);
        assert_eq!(extract_file_name("mailto:someone@x.test"), UNKNOWN_FILE_NAME);
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("My Shop"), "My Shop");
        assert_eq!(sanitize_component("A/B\\C"), "A_B_C");
        assert_eq!(sanitize_component("  "), "shop");
        assert_eq!(sanitize_component(".."), "shop");
    }

    #[test]
    fn test_classify_known_variants() {
        let entries = vec![
            image("https://x.test/a.jpg"),
            CatalogEntry::Video {
                id: "v".to_string(),
                url: Some("https://x.test/v/clip.mp4".to_string()),
                alt: None,
            },
            CatalogEntry::ExternalVideo {
                id: "e".to_string(),
                embed_url: Some("https://youtube.test/embed/xyz".to_string()),
                alt: None,
            },
            CatalogEntry::Model {
                id: "m".to_string(),
                preview_url: Some("https://x.test/p/chair.png".to_string()),
                alt: None,
            },
            CatalogEntry::GenericFile {
                id: "g".to_string(),
                url: Some("https://x.test/f/doc.pdf".to_string()),
                alt: None,
                mime_type: Some("application/pdf".to_string()),
            },
        ];

        let (tasks, gaps) = classify_all("Shop", &entries);
        assert!(gaps.is_empty());

        let got: Vec<(Bucket, &str)> = tasks
            .iter()
            .map(|t| (t.bucket, t.file_name.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (Bucket::Images, "a.jpg"),
                (Bucket::Videos, "clip.mp4"),
                (Bucket::Files, "Shop_external_2.url"),
                (Bucket::Images, "chair.png"),
                (Bucket::Files, "doc.pdf"),
            ]
        );
        assert_eq!(tasks[2].source_url, "https://youtube.test/embed/xyz");
    }

    #[test]
    fn test_classify_is_deterministic() {
        let entry = image("https://x.test/a.jpg?v=2");
        assert_eq!(classify("S", 4, &entry), classify("S", 4, &entry));
    }

    #[test]
    fn test_classify_gaps() {
        let entries = vec![
            CatalogEntry::Unsupported,
            CatalogEntry::Image {
                id: "gid://shopify/MediaImage/9".to_string(),
                url: None,
                alt: None,
            },
            CatalogEntry::GenericFile {
                id: "g".to_string(),
                url: Some("   ".to_string()),
                alt: None,
                mime_type: None,
            },
            image("https://x.test/ok.jpg"),
        ];

        let (tasks, gaps) = classify_all("S", &entries);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].index, 3);

        assert_eq!(gaps.len(), 3);
        assert_eq!(gaps[0].index, 0);
        assert_eq!(gaps[0].id, None);
        assert_eq!(gaps[1].id.as_deref(), Some("gid://shopify/MediaImage/9"));
        assert_eq!(gaps[2].index, 2);
    }
}
