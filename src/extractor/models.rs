//! Data structures for extractor results and resolved media items

use crate::utils::error::{GrabError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Untyped record as produced by an extractor
pub type RawDict = serde_json::Map<String, Value>;

/// The `_type` discriminator of an extractor result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Video,
    Url,
    UrlTransparent,
    Playlist,
    MultiVideo,
    CompatList,
}

impl ResultType {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "video" => Ok(ResultType::Video),
            "url" => Ok(ResultType::Url),
            "url_transparent" => Ok(ResultType::UrlTransparent),
            "playlist" => Ok(ResultType::Playlist),
            "multi_video" => Ok(ResultType::MultiVideo),
            "compat_list" => Ok(ResultType::CompatList),
            other => Err(GrabError::InvalidResultType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Video => "video",
            ResultType::Url => "url",
            ResultType::UrlTransparent => "url_transparent",
            ResultType::Playlist => "playlist",
            ResultType::MultiVideo => "multi_video",
            ResultType::CompatList => "compat_list",
        }
    }
}

/// Random-access collection of playlist entries that is fetched page by page
pub trait PagedList: Send + Sync {
    /// Entries in `[start, end)`; `end = None` means up to the last entry
    fn slice(&self, start: usize, end: Option<usize>) -> Vec<RawResult>;
}

/// Entries of a playlist-like result
pub enum Entries {
    List(Vec<RawResult>),
    Paged(Box<dyn PagedList>),
    /// Single-pass iterator; only the prefix that is needed gets pulled
    Lazy(Box<dyn Iterator<Item = RawResult> + Send>),
}

impl fmt::Debug for Entries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entries::List(list) => f.debug_tuple("List").field(list).finish(),
            Entries::Paged(_) => f.write_str("Paged(..)"),
            Entries::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Raw extractor result: a loosely typed record plus, for playlists, its entries
#[derive(Debug, Default)]
pub struct RawResult {
    pub fields: RawDict,
    pub entries: Option<Entries>,
}

impl RawResult {
    pub fn new(fields: RawDict) -> Self {
        Self {
            fields,
            entries: None,
        }
    }

    /// A result pointing at another URL, optionally naming the extractor to use
    pub fn url(url: &str, ie_key: Option<&str>) -> Self {
        let mut fields = RawDict::new();
        fields.insert("_type".into(), Value::from("url"));
        fields.insert("url".into(), Value::from(url));
        if let Some(key) = ie_key {
            fields.insert("ie_key".into(), Value::from(key));
        }
        Self::new(fields)
    }

    /// A playlist result with the given entries
    pub fn playlist(entries: Entries, id: Option<&str>, title: Option<&str>) -> Self {
        let mut fields = RawDict::new();
        fields.insert("_type".into(), Value::from("playlist"));
        if let Some(id) = id {
            fields.insert("id".into(), Value::from(id));
        }
        if let Some(title) = title {
            fields.insert("title".into(), Value::from(title));
        }
        Self {
            fields,
            entries: Some(entries),
        }
    }

    /// Legacy shape: a bare list of results
    pub fn compat_list(entries: Vec<RawResult>) -> Self {
        let mut fields = RawDict::new();
        fields.insert("_type".into(), Value::from("compat_list"));
        Self {
            fields,
            entries: Some(Entries::List(entries)),
        }
    }

    /// Build from decoded JSON. Nested `entries` arrays become `Entries::List`,
    /// a top-level array becomes a `compat_list`.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(mut fields) => {
                let entries = match fields.remove("entries") {
                    Some(Value::Array(items)) => Some(Entries::List(
                        items
                            .into_iter()
                            .map(RawResult::from_json)
                            .collect::<Result<Vec<_>>>()?,
                    )),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(GrabError::unexpected(format!(
                            "\"entries\" must be a list, got {}",
                            other
                        )))
                    }
                };
                Ok(Self { fields, entries })
            }
            Value::Array(items) => Ok(Self::compat_list(
                items
                    .into_iter()
                    .map(RawResult::from_json)
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Err(GrabError::unexpected(format!(
                "extractor result must be an object, got {}",
                other
            ))),
        }
    }

    /// `_type` of this result; absent means a plain video
    pub fn result_type(&self) -> Result<ResultType> {
        match self.fields.get("_type") {
            None | Some(Value::Null) => Ok(ResultType::Video),
            Some(Value::String(kind)) => ResultType::parse(kind),
            Some(other) => Err(GrabError::InvalidResultType(other.to_string())),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set `key` only when it is missing
    pub fn set_default(&mut self, key: &str, value: Value) {
        add_extra_info(&mut self.fields, std::iter::once((key.to_string(), value)));
    }
}

/// Copy every `(key, value)` onto `fields` unless `fields` already has the key
pub fn add_extra_info<I>(fields: &mut RawDict, extra: I)
where
    I: IntoIterator<Item = (String, Value)>,
{
    for (key, value) in extra {
        fields.entry(key).or_insert(value);
    }
}

/// Cookies that were attached to a format, bound to the host they were issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedCookies {
    pub domain: String,
    pub value: String,
}

/// One fetchable stream of a media item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ext: String,
    /// Human readable description, e.g. `"22 - 1280x720 (hd)"`
    pub format: Option<String>,
    pub format_note: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub container: Option<String>,
    pub protocol: Option<String>,
    pub language: Option<String>,
    pub resolution: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub filesize: Option<i64>,
    pub filesize_approx: Option<i64>,
    pub tbr: Option<f64>,
    pub vbr: Option<f64>,
    pub abr: Option<f64>,
    pub asr: Option<f64>,
    pub fps: Option<f64>,
    /// Pixel aspect ratio correction for anamorphic streams
    pub stretched_ratio: Option<f64>,
    pub preference: Option<i64>,
    pub quality: Option<f64>,
    pub manifest_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub http_headers: BTreeMap<String, String>,
    pub cookies: Option<ScopedCookies>,
}

impl Format {
    /// `vcodec == "none"` marks an audio-only stream
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    /// `acodec == "none"` marks a video-only stream
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    pub fn numeric_field(&self, key: &str) -> Option<f64> {
        match key {
            "width" => self.width.map(|v| v as f64),
            "height" => self.height.map(|v| v as f64),
            "tbr" => self.tbr,
            "abr" => self.abr,
            "vbr" => self.vbr,
            "asr" => self.asr,
            "filesize" => self.filesize.map(|v| v as f64),
            "filesize_approx" => self.filesize_approx.map(|v| v as f64),
            "fps" => self.fps,
            _ => None,
        }
    }

    pub fn string_field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "ext" => Some(self.ext.as_str()),
            "format_id" => Some(self.format_id.as_str()),
            "acodec" => self.acodec.as_deref(),
            "vcodec" => self.vcodec.as_deref(),
            "container" => self.container.as_deref(),
            "protocol" => self.protocol.as_deref(),
            "language" => self.language.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }

    /// Resolution as shown in format listings
    pub fn display_resolution(&self) -> String {
        if !self.has_video() {
            return "audio only".to_string();
        }
        if let Some(resolution) = &self.resolution {
            return resolution.clone();
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            (None, Some(h)) => format!("{}p", h),
            (Some(w), None) => format!("{}x?", w),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Cookie header value to send with a request to `url`, only when `url`
    /// points at the host the cookies were bound to
    pub fn cookie_header_for(&self, url: &str) -> Option<&str> {
        let cookies = self.cookies.as_ref()?;
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        if host.eq_ignore_ascii_case(&cookies.domain) {
            Some(cookies.value.as_str())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
    pub id: Option<String>,
    pub preference: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub name: Option<String>,
    /// Inline subtitle payload, for sites that embed it in the page
    pub data: Option<String>,
}

/// Fields stamped on entries by the playlist that contained them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistProvenance {
    pub playlist: Option<String>,
    pub playlist_id: Option<String>,
    pub playlist_title: Option<String>,
    pub playlist_uploader: Option<String>,
    pub playlist_uploader_id: Option<String>,
    pub playlist_index: Option<i64>,
    pub n_entries: Option<i64>,
}

/// A media item after normalisation, ready for format selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub display_id: Option<String>,
    pub extractor: Option<String>,
    pub extractor_key: Option<String>,
    pub webpage_url: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub age_limit: Option<i64>,
    pub timestamp: Option<i64>,
    pub release_timestamp: Option<i64>,
    pub upload_date: Option<String>,
    pub release_date: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
    pub is_live: Option<bool>,
    pub chapter: Option<String>,
    pub chapter_number: Option<i64>,
    pub season: Option<String>,
    pub season_number: Option<i64>,
    pub episode: Option<String>,
    pub episode_number: Option<i64>,
    #[serde(default)]
    pub formats: Vec<Format>,
    /// The extractor gave no format list; `formats` holds a copy of the
    /// item's own stream fields
    #[serde(default, skip_deserializing)]
    pub single_format: bool,
    #[serde(default)]
    pub subtitles: BTreeMap<String, Vec<SubtitleTrack>>,
    #[serde(default)]
    pub automatic_captions: BTreeMap<String, Vec<SubtitleTrack>>,
    pub requested_subtitles: Option<BTreeMap<String, SubtitleTrack>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub http_headers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub playlist: PlaylistProvenance,
    /// Everything the extractor returned that has no dedicated field
    #[serde(flatten)]
    pub extra: RawDict,
}

impl VideoInfo {
    /// All fields as a flat record, nulls dropped
    pub fn to_dict(&self) -> RawDict {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            _ => RawDict::new(),
        }
    }
}
