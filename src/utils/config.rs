//! Resolution and download options

use crate::utils::date::DateRange;
use crate::utils::error::{GrabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Every option the resolver, selector and download stage read by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Format expression; `None` picks a default based on merge support
    pub format: Option<String>,
    pub merge_output_format: Option<String>,

    /// 1-based first playlist entry
    pub playliststart: usize,
    /// 1-based last playlist entry, `-1` or `None` for no bound
    pub playlistend: Option<i64>,
    /// e.g. `"1-3,7,-2"`; overrides start/end when set
    pub playlist_items: Option<String>,
    pub playlistreverse: bool,
    pub playlistrandom: bool,
    /// Only take the video when a URL names both a video and a playlist
    pub noplaylist: bool,

    pub matchtitle: Option<String>,
    pub rejecttitle: Option<String>,
    /// Single day, `YYYYMMDD` or relative
    pub date: Option<String>,
    pub dateafter: Option<String>,
    pub datebefore: Option<String>,
    pub min_views: Option<i64>,
    pub max_views: Option<i64>,
    pub age_limit: Option<i64>,
    /// Expression in the `like_count > 100 & !is_live` syntax
    pub match_filter: Option<String>,
    pub download_archive: Option<PathBuf>,

    pub ignoreerrors: bool,
    pub max_downloads: Option<usize>,
    pub simulate: bool,
    pub skip_download: bool,
    pub outtmpl: String,
    pub keepvideo: bool,
    pub retries: usize,
    pub http_headers: BTreeMap<String, String>,

    /// Print the format table instead of downloading
    pub listformats: bool,
    pub forcetitle: bool,
    pub forceid: bool,
    pub forceurl: bool,
    pub forcethumbnail: bool,
    pub forcedescription: bool,
    pub forcefilename: bool,
    pub forceformat: bool,

    pub writedescription: bool,
    pub writeinfojson: bool,
    pub writethumbnail: bool,
    pub writesubtitles: bool,
    pub writeautomaticsub: bool,
    pub allsubtitles: bool,
    pub subtitleslangs: Vec<String>,
    /// `/`-separated preference list, `best` meaning the last offered track
    pub subtitlesformat: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            format: None,
            merge_output_format: None,
            playliststart: 1,
            playlistend: None,
            playlist_items: None,
            playlistreverse: false,
            playlistrandom: false,
            noplaylist: false,
            matchtitle: None,
            rejecttitle: None,
            date: None,
            dateafter: None,
            datebefore: None,
            min_views: None,
            max_views: None,
            age_limit: None,
            match_filter: None,
            download_archive: None,
            ignoreerrors: false,
            max_downloads: None,
            simulate: false,
            skip_download: false,
            outtmpl: "%(title)s-%(id)s.%(ext)s".to_string(),
            keepvideo: false,
            retries: 10,
            http_headers: BTreeMap::new(),
            listformats: false,
            forcetitle: false,
            forceid: false,
            forceurl: false,
            forcethumbnail: false,
            forcedescription: false,
            forcefilename: false,
            forceformat: false,
            writedescription: false,
            writeinfojson: false,
            writethumbnail: false,
            writesubtitles: false,
            writeautomaticsub: false,
            allsubtitles: false,
            subtitleslangs: Vec::new(),
            subtitlesformat: "best".to_string(),
        }
    }
}

impl Params {
    /// `<config dir>/rustgrab/config.json`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rustgrab").join("config.json"))
    }

    /// Read options from a JSON file; keys that are absent keep their defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let params: Params = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    /// Any of the `force*` options that print item fields to stdout
    pub fn forced_printing(&self) -> bool {
        self.forcetitle
            || self.forceid
            || self.forceurl
            || self.forcethumbnail
            || self.forcedescription
            || self.forcefilename
            || self.forceformat
    }

    pub fn validate(&self) -> Result<()> {
        if self.playliststart == 0 {
            return Err(GrabError::InvalidConfig(
                "playliststart must be 1 or greater".to_string(),
            ));
        }
        if let Some(end) = self.playlist_end() {
            if end < self.playliststart {
                return Err(GrabError::InvalidConfig(
                    "playlist end must be greater than playlist start".to_string(),
                ));
            }
        }
        if self.outtmpl.is_empty() {
            return Err(GrabError::InvalidConfig("empty output template".to_string()));
        }
        self.date_range()?;
        Ok(())
    }

    /// Upper playlist bound with the `-1` convention folded into `None`
    pub fn playlist_end(&self) -> Option<usize> {
        match self.playlistend {
            Some(end) if end >= 0 => Some(end as usize),
            _ => None,
        }
    }

    /// The configured upload-date window, if any
    pub fn date_range(&self) -> Result<Option<DateRange>> {
        if let Some(day) = &self.date {
            return DateRange::day(day).map(Some);
        }
        if self.dateafter.is_none() && self.datebefore.is_none() {
            return Ok(None);
        }
        DateRange::new(self.dateafter.as_deref(), self.datebefore.as_deref()).map(Some)
    }
}
