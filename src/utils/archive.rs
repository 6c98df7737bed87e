//! Download archive: an append-only record of finished items

use crate::utils::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

/// Archive line for an item: `"<extractor key lowercased> <id>"`
pub fn archive_key(extractor_key: &str, id: &str) -> String {
    format!("{} {}", extractor_key.to_lowercase(), id)
}

/// One line per completed item, read fully into memory at open
#[derive(Debug, Clone)]
pub struct DownloadArchive {
    file_path: PathBuf,
    entries: HashSet<String>,
    writer: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl DownloadArchive {
    /// Load the archive. A missing file is an empty archive and is created on
    /// the first record.
    pub async fn open(path: &Path) -> Result<Self> {
        let mut entries = HashSet::new();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        entries.insert(line.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!("Loaded {} archive entries from {}", entries.len(), path.display());

        Ok(Self {
            file_path: path.to_path_buf(),
            entries,
            writer: Arc::new(Mutex::new(None)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `key` to the file and the in-memory set
    pub async fn record(&mut self, key: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.file_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)
                .await?;
            *guard = Some(BufWriter::new(file));
        }
        if let Some(writer) = guard.as_mut() {
            writer.write_all(key.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        self.entries.insert(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_key_lowercases_extractor() {
        assert_eq!(archive_key("Youtube", "BaW_jenozKc"), "youtube BaW_jenozKc");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let archive = DownloadArchive::open(&dir.path().join("archive.txt"))
            .await
            .unwrap();
        assert!(archive.is_empty());
        assert!(!archive.contains("youtube abc"));
    }

    #[tokio::test]
    async fn test_record_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("archive.txt");
        let mut archive = DownloadArchive::open(&path).await.unwrap();
        archive.record("youtube abc").await.unwrap();
        archive.record("vimeo 42").await.unwrap();
        assert!(archive.contains("youtube abc"));

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "youtube abc\nvimeo 42\n");

        let reopened = DownloadArchive::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("vimeo 42"));
    }

    #[tokio::test]
    async fn test_lines_are_trimmed_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.txt");
        tokio::fs::write(&path, "youtube abc  \r\n\n  vimeo 42\n").await.unwrap();
        let archive = DownloadArchive::open(&path).await.unwrap();
        assert!(archive.contains("youtube abc"));
        assert!(archive.contains("vimeo 42"));
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_recorded_key_is_not_duplicated_in_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.txt");
        let archive = tokio_test::block_on(async {
            let mut archive = DownloadArchive::open(&path).await.unwrap();
            archive.record("mock v1").await.unwrap();
            archive.record("mock v1").await.unwrap();
            archive
        });
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.path(), path.as_path());
    }
}
