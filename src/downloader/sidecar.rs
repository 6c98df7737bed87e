//! Files written next to the media file: description, info JSON, subtitles
//! and thumbnail

use crate::downloader::postprocess::FILES_TO_MERGE;
use crate::extractor::models::{Format, RawDict, SubtitleTrack, Thumbnail, VideoInfo};
use crate::resolver::sanitize::determine_ext;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Keys describing the selection itself rather than the item
const NOT_IN_INFO_JSON: &[&str] = &["requested_formats", "requested_subtitles", FILES_TO_MERGE];

/// `video.mp4` becomes `video.info.json`
pub fn info_json_path(filename: &Path) -> PathBuf {
    filename.with_extension("info.json")
}

pub fn description_path(filename: &Path) -> PathBuf {
    filename.with_extension("description")
}

/// `video.mp4` becomes `video.en.vtt`
pub fn subtitles_path(filename: &Path, lang: &str, ext: &str) -> PathBuf {
    filename.with_extension(format!("{}.{}", lang, ext))
}

/// Thumbnail file named after the media file, extension from the image URL
pub fn thumbnail_path(filename: &Path, url: &str) -> PathBuf {
    let ext = determine_ext(url).unwrap_or_else(|| "jpg".to_string());
    filename.with_extension(ext)
}

/// The thumbnail to fetch: the best ranked one, else the bare `thumbnail` URL
pub fn best_thumbnail(info: &VideoInfo) -> Option<String> {
    info.thumbnails
        .last()
        .map(|t: &Thumbnail| t.url.clone())
        .filter(|url| !url.is_empty())
        .or_else(|| info.thumbnail.clone())
}

/// Download request for a subtitle track or thumbnail, carrying the item's
/// request headers
pub fn side_request(id: String, url: &str, ext: &str, info: &VideoInfo) -> Format {
    Format {
        format_id: id,
        url: url.to_string(),
        ext: ext.to_string(),
        http_headers: info.http_headers.clone(),
        ..Default::default()
    }
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

pub async fn write_description(filename: &Path, description: &str) -> Result<PathBuf> {
    let path = description_path(filename);
    info!("[info] Writing video description to: {}", path.display());
    write_text(&path, description).await?;
    Ok(path)
}

/// Item fields as JSON, without the per-download selection state
pub async fn write_info_json(filename: &Path, fields: &RawDict) -> Result<PathBuf> {
    let path = info_json_path(filename);
    info!("[info] Writing video metadata as JSON to: {}", path.display());
    let filtered: RawDict = fields
        .iter()
        .filter(|(key, _)| !NOT_IN_INFO_JSON.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let json = serde_json::to_string_pretty(&filtered)?;
    write_text(&path, &json).await?;
    Ok(path)
}

/// Write a track whose payload came inline with the extractor result.
/// Returns `false` when the track has to be fetched from its URL instead.
pub async fn write_inline_subtitles(path: &Path, track: &SubtitleTrack) -> Result<bool> {
    match &track.data {
        Some(data) => {
            info!("[info] Writing video subtitles to: {}", path.display());
            write_text(path, data).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
