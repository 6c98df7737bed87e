//! Post-processing chain and the ffmpeg merger

use crate::downloader::traits::PostProcessor;
use crate::extractor::models::RawDict;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

/// Key carrying the downloaded parts of a merged selection
pub const FILES_TO_MERGE: &str = "__files_to_merge";

/// Location of an ffmpeg binary on `PATH`
pub fn find_ffmpeg() -> Option<PathBuf> {
    which::which("ffmpeg").ok()
}

/// Whether separately downloaded video and audio can be muxed afterwards
pub fn merger_available() -> bool {
    find_ffmpeg().is_some()
}

/// Video and audio extensions that share a container family
pub fn compatible_merge_exts(video_ext: &str, audio_ext: &str) -> bool {
    const MP4_FAMILY: &[&str] = &[
        "mp3", "mp4", "m4a", "m4p", "m4b", "m4r", "m4v", "ismv", "isma",
    ];
    (MP4_FAMILY.contains(&video_ext) && MP4_FAMILY.contains(&audio_ext))
        || (video_ext == "webm" && audio_ext == "webm")
}

/// Muxes the parts listed under [`FILES_TO_MERGE`] into `filepath` with
/// stream copy
pub struct FfmpegMerger {
    ffmpeg: PathBuf,
}

impl FfmpegMerger {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// Merger using the ffmpeg found on `PATH`
    pub fn detect() -> Option<Self> {
        find_ffmpeg().map(Self::new)
    }
}

#[async_trait]
impl PostProcessor for FfmpegMerger {
    fn name(&self) -> &'static str {
        "Merger"
    }

    async fn run(&self, info: RawDict) -> Result<(Vec<PathBuf>, RawDict)> {
        let parts: Vec<PathBuf> = match info.get(FILES_TO_MERGE) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect(),
            _ => return Ok((Vec::new(), info)),
        };
        let target = info
            .get("filepath")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .context("merger needs a filepath")?;

        let temp = target.with_file_name(format!(
            "{}.temp",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        info!("[ffmpeg] Merging formats into \"{}\"", target.display());

        let mut cmd = AsyncCommand::new(&self.ffmpeg);
        cmd.arg("-y").arg("-loglevel").arg("error");
        for part in &parts {
            cmd.arg("-i").arg(part);
        }
        cmd.arg("-c").arg("copy");
        for index in 0..parts.len() {
            cmd.arg("-map").arg(format!("{}:{}:0", index, if index == 0 { "v" } else { "a" }));
        }
        cmd.arg("-f")
            .arg(container_for(&target))
            .arg(&temp)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Running {:?}", cmd);
        let output = cmd.output().await.context("failed to run ffmpeg")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        tokio::fs::rename(&temp, &target).await?;
        Ok((parts, info))
    }
}

/// ffmpeg muxer name for the output extension
fn container_for(target: &Path) -> String {
    match target.extension().and_then(|e| e.to_str()) {
        Some("mkv") => "matroska".to_string(),
        Some("m4a") | Some("m4v") => "mp4".to_string(),
        Some(ext) => ext.to_string(),
        None => "matroska".to_string(),
    }
}

/// Run every processor over the finished file in order
///
/// A failing processor is reported and the chain continues with the record
/// it had. Files a processor hands back are deleted unless `keepvideo`.
pub async fn run_chain(
    chain: &[Arc<dyn PostProcessor>],
    filename: &Path,
    mut info: RawDict,
    keepvideo: bool,
) -> RawDict {
    info.insert(
        "filepath".to_string(),
        Value::from(filename.to_string_lossy().into_owned()),
    );

    for pp in chain {
        let files_to_delete = match pp.run(info.clone()).await {
            Ok((files, updated)) => {
                info = updated;
                files
            }
            Err(e) => {
                error!("postprocessing: [{}] {:#}", pp.name(), e);
                Vec::new()
            }
        };

        if keepvideo {
            continue;
        }
        for old in files_to_delete {
            info!(
                "Deleting original file {} (pass -k to keep)",
                old.display()
            );
            if let Err(e) = tokio::fs::remove_file(&old).await {
                warn!("Unable to remove downloaded original file {}: {}", old.display(), e);
            }
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Rename(&'static str);

    #[async_trait]
    impl PostProcessor for Rename {
        fn name(&self) -> &'static str {
            "Rename"
        }

        async fn run(&self, mut info: RawDict) -> Result<(Vec<PathBuf>, RawDict)> {
            let old = PathBuf::from(info["filepath"].as_str().unwrap());
            let new = old.with_extension(self.0);
            tokio::fs::copy(&old, &new).await?;
            info.insert("filepath".into(), Value::from(new.to_string_lossy().into_owned()));
            Ok((vec![old], info))
        }
    }

    struct Broken;

    #[async_trait]
    impl PostProcessor for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        async fn run(&self, _info: RawDict) -> Result<(Vec<PathBuf>, RawDict)> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[test]
    fn test_compatible_merge_exts() {
        assert!(compatible_merge_exts("mp4", "m4a"));
        assert!(compatible_merge_exts("webm", "webm"));
        assert!(!compatible_merge_exts("webm", "m4a"));
        assert!(!compatible_merge_exts("flv", "mp3"));
    }

    #[tokio::test]
    async fn test_chain_deletes_originals_unless_kept() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("clip.mp4");
        std::fs::write(&original, b"data").unwrap();

        let chain: Vec<Arc<dyn PostProcessor>> = vec![Arc::new(Broken), Arc::new(Rename("mkv"))];
        let info = run_chain(&chain, &original, RawDict::new(), false).await;
        assert!(!original.exists());
        assert!(dir.path().join("clip.mkv").exists());
        assert!(info["filepath"].as_str().unwrap().ends_with("clip.mkv"));
    }

    #[tokio::test]
    async fn test_chain_keepvideo() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("clip.mp4");
        std::fs::write(&original, b"data").unwrap();

        let chain: Vec<Arc<dyn PostProcessor>> = vec![Arc::new(Rename("webm"))];
        run_chain(&chain, &original, RawDict::new(), true).await;
        assert!(original.exists());
    }

    #[tokio::test]
    async fn test_merger_ignores_single_files() {
        let merger = FfmpegMerger::new(PathBuf::from("ffmpeg"));
        let (delete, _) = merger.run(RawDict::new()).await.unwrap();
        assert!(delete.is_empty());
    }
}
