use crate::extractor::models::{RawDict, RawResult};
use crate::extractor::traits::Extractor;
use crate::utils::config::Params;
use crate::utils::error::GrabError;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "m4a", "webm", "mkv", "flv", "3gp", "mov", "mp3", "ogg", "oga", "ogv", "aac",
    "wav", "flac", "opus",
];

/// Plain links to a media file
pub struct DirectUrlExtractor;

impl DirectUrlExtractor {
    /// File stem and extension of the last path segment, when it is media
    fn media_file(url: &str) -> Option<(String, String)> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let name = parsed.path_segments()?.last()?.to_string();
        let (stem, ext) = name.rsplit_once('.')?;
        let ext = ext.to_lowercase();
        if stem.is_empty() || !MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            return None;
        }
        Some((stem.to_string(), ext))
    }
}

#[async_trait]
impl Extractor for DirectUrlExtractor {
    fn ie_key(&self) -> &'static str {
        "Generic"
    }

    fn ie_name(&self) -> &'static str {
        "generic"
    }

    fn suitable(&self, url: &str) -> bool {
        Self::media_file(url).is_some()
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        Self::media_file(url).map(|(stem, _)| stem)
    }

    async fn extract(&self, url: &str, _params: &Params) -> Result<RawResult> {
        let (stem, ext) = Self::media_file(url)
            .ok_or_else(|| GrabError::expected(format!("{} is not a direct media link", url)))?;

        let mut fields = RawDict::new();
        fields.insert("id".into(), Value::from(stem.clone()));
        fields.insert("title".into(), Value::from(stem));
        fields.insert("url".into(), Value::from(url));
        fields.insert("ext".into(), Value::from(ext));
        fields.insert("direct".into(), Value::Bool(true));
        Ok(RawResult::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suitable_only_for_media_paths() {
        let ie = DirectUrlExtractor;
        assert!(ie.suitable("https://cdn.test/media/clip.MP4?token=1"));
        assert!(!ie.suitable("https://cdn.test/watch?v=1"));
        assert!(!ie.suitable("https://cdn.test/page.html"));
        assert!(!ie.suitable("ftp://cdn.test/clip.mp4"));
        assert_eq!(ie.extract_id("https://cdn.test/a/clip.webm").as_deref(), Some("clip"));
    }

    #[tokio::test]
    async fn test_extract_yields_single_video() {
        let raw = DirectUrlExtractor
            .extract("https://cdn.test/clip.mp4", &Params::default())
            .await
            .unwrap();
        assert_eq!(raw.get_str("id"), Some("clip"));
        assert_eq!(raw.get_str("ext"), Some("mp4"));
        assert_eq!(raw.get_str("url"), Some("https://cdn.test/clip.mp4"));
        assert!(raw.entries.is_none());
    }
}
