//! Zip archive assembly.

use crate::error::ExportError;
use crate::types::{ArchiveBlob, Bucket};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds the export zip in memory.
///
/// Layout is `<root>/{images,videos,files}/<file name>`. The three bucket
/// folders always exist, even when empty.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    root: String,
    used_paths: HashSet<String>,
    written: Vec<String>,
}

impl ArchiveWriter {
    /// Starts an archive whose single top-level folder is `root`.
    pub fn new(root: impl Into<String>) -> Result<Self, ExportError> {
        let root = root.into();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        zip.add_directory(format!("{}/", root), options)?;
        for bucket in [Bucket::Images, Bucket::Videos, Bucket::Files] {
            zip.add_directory(format!("{}/{}/", root, bucket), options)?;
        }

        Ok(Self {
            zip,
            root,
            used_paths: HashSet::new(),
            written: Vec::new(),
        })
    }

    /// Paths written so far, in write order.
    pub fn entries(&self) -> &[String] {
        &self.written
    }

    /// Writes one file into `bucket` and returns the path it landed on.
    ///
    /// A name already present in the bucket gets a ` (n)` suffix before its
    /// extension.
    pub fn add(
        &mut self,
        bucket: Bucket,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ExportError> {
        let path = self.unique_path(bucket, file_name);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(bytes.len() as u64 >= u32::MAX as u64);

        self.zip.start_file(path.clone(), options)?;
        self.write_bytes(bytes)?;

        self.used_paths.insert(path.clone());
        self.written.push(path.clone());
        Ok(path)
    }

    /// Finalises the zip and hands back its bytes under `file_name`.
    pub fn finish(mut self, file_name: impl Into<String>) -> Result<ArchiveBlob, ExportError> {
        let cursor = self.zip.finish()?;
        Ok(ArchiveBlob {
            file_name: file_name.into(),
            bytes: cursor.into_inner(),
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ExportError> {
        self.zip
            .write_all(bytes)
            .map_err(|e| ExportError::ArchiveSerialization(e.to_string()))
    }

    fn unique_path(&self, bucket: Bucket, file_name: &str) -> String {
        let candidate = format!("{}/{}/{}", self.root, bucket, file_name);
        if !self.used_paths.contains(&candidate) {
            return candidate;
        }

        let (stem, extension) = match file_name.rfind('.') {
            Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
            _ => (file_name, ""),
        };

        let mut n = 1;
        loop {
            let candidate = format!("{}/{}/{} ({}){}", self.root, bucket, stem, n, extension);
            if !self.used_paths.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl ArchiveBlob {
    /// Writes the archive into `dir` under its suggested file name.
    ///
    /// # Returns
    ///
    /// The full path of the written file.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);

        let mut file = BufWriter::new(tokio::fs::File::create(&path).await?);
        file.write_all(&self.bytes).await?;
        file.flush().await?;

        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}
