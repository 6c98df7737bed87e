use crate::extractor::models::{Format, RawDict, VideoInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Transfers the bytes of one chosen format to disk
#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(false)` reports a transfer that ended without the file
    async fn download(&self, path: &Path, info: &VideoInfo, format: &Format) -> Result<bool>;
}

/// One step of the post-processing chain
///
/// Receives the item as a flat record with `filepath` set. Returns the files
/// that may be deleted afterwards together with the updated record.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, info: RawDict) -> Result<(Vec<PathBuf>, RawDict)>;
}
