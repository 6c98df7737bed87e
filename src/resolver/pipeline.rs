//! Recursive resolution of extractor results into selected, downloadable items

use super::admission::{AdmissionPolicy, MatchFilterFn};
use super::context::ResolutionContext;
use super::entries::{select_entries, PlaylistItems, SelectedEntry};
use super::sanitize::sanitize_info;
use crate::downloader::filename::{merged_part_name, prepare_filename, replace_extension};
use crate::downloader::http::HttpDownloader;
use crate::downloader::postprocess::{compatible_merge_exts, run_chain, FfmpegMerger, FILES_TO_MERGE};
use crate::downloader::sidecar::{
    best_thumbnail, side_request, subtitles_path, thumbnail_path, write_description,
    write_info_json, write_inline_subtitles,
};
use crate::downloader::traits::{Downloader, PostProcessor};
use crate::extractor::models::{add_extra_info, Entries, Format, RawDict, RawResult, ResultType, VideoInfo};
use crate::extractor::registry::ExtractorRegistry;
use crate::format::{default_format_spec, format_table, FormatSelector, Selection};
use crate::utils::archive::{archive_key, DownloadArchive};
use crate::utils::config::Params;
use crate::utils::error::{GrabError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fields of a `url_transparent` result that never override the inner result
const TRANSPARENT_RESERVED: &[&str] = &["_type", "url", "id", "extractor", "extractor_key", "ie_key"];

/// Receives the lines printed by `listformats` and the `force*` options
pub type ScreenFn = Arc<dyn Fn(&str) + Send + Sync>;

/// One selected stream of a resolved media item
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub info: VideoInfo,
    pub selection: Selection,
    /// Item fields with the chosen format applied, as handed to
    /// post-processors
    pub fields: RawDict,
    /// Output path; only computed when downloading
    pub filename: Option<PathBuf>,
    pub downloaded: bool,
}

/// Outcome of resolving one URL or raw result
#[derive(Debug, Clone)]
pub enum Resolution {
    Video(Vec<ResolvedItem>),
    /// Filtered out before or after extraction; carries the reason
    Skipped(String),
    /// One slot per attempted entry; `None` marks an entry that failed while
    /// errors are being ignored
    Playlist {
        id: Option<String>,
        title: Option<String>,
        entries: Vec<Option<Resolution>>,
    },
}

impl Resolution {
    /// Every item, depth first, in playlist order
    pub fn into_items(self) -> Vec<ResolvedItem> {
        match self {
            Resolution::Video(items) => items,
            Resolution::Skipped(_) => Vec::new(),
            Resolution::Playlist { entries, .. } => entries
                .into_iter()
                .flatten()
                .flat_map(Resolution::into_items)
                .collect(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Resolution::Skipped(_))
    }
}

enum Extracted {
    Raw(RawResult),
    Skipped(String),
}

enum ItemOutcome {
    Ready(Box<ResolvedItem>),
    Skipped(String),
}

fn str_field(fields: &RawDict, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let name = parsed.path().trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Drives extraction, admission, format selection and the download stage
pub struct Resolver {
    params: Params,
    registry: ExtractorRegistry,
    archive: Option<DownloadArchive>,
    admission: AdmissionPolicy,
    playlist_items: Option<PlaylistItems>,
    selectors: HashMap<String, Arc<FormatSelector>>,
    downloader: Arc<dyn Downloader>,
    merger: Option<Arc<dyn PostProcessor>>,
    postprocessors: Vec<Arc<dyn PostProcessor>>,
    screen: ScreenFn,
    num_downloads: usize,
}

impl Resolver {
    /// Validates `params`, opens the download archive and detects ffmpeg
    pub async fn new(params: Params, registry: ExtractorRegistry) -> Result<Self> {
        params.validate()?;
        let archive = match &params.download_archive {
            Some(path) => Some(DownloadArchive::open(path).await?),
            None => None,
        };
        let admission = AdmissionPolicy::from_params(&params)?;
        let playlist_items = params
            .playlist_items
            .as_deref()
            .map(PlaylistItems::parse)
            .transpose()?;
        let downloader: Arc<dyn Downloader> = Arc::new(HttpDownloader::new(&params)?);
        let merger = FfmpegMerger::detect().map(|m| Arc::new(m) as Arc<dyn PostProcessor>);
        if merger.is_none() {
            debug!("ffmpeg not found, separate video and audio streams cannot be merged");
        }

        Ok(Self {
            params,
            registry,
            archive,
            admission,
            playlist_items,
            selectors: HashMap::new(),
            downloader,
            merger,
            postprocessors: Vec::new(),
            screen: Arc::new(|line: &str| println!("{}", line)),
            num_downloads: 0,
        })
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    /// Replace the merger; `None` disables merging
    pub fn with_merger(mut self, merger: Option<Arc<dyn PostProcessor>>) -> Self {
        self.merger = merger;
        self
    }

    /// Send printed output somewhere other than stdout
    pub fn with_screen(mut self, screen: ScreenFn) -> Self {
        self.screen = screen;
        self
    }

    /// Append a processor to the chain run after every download
    pub fn add_post_processor(&mut self, pp: Arc<dyn PostProcessor>) {
        self.postprocessors.push(pp);
    }

    pub fn with_match_filter(mut self, filter: MatchFilterFn) -> Self {
        self.admission = self.admission.with_match_filter(filter);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn can_merge(&self) -> bool {
        self.merger.is_some()
    }

    pub fn num_downloads(&self) -> usize {
        self.num_downloads
    }

    pub fn archive(&self) -> Option<&DownloadArchive> {
        self.archive.as_ref()
    }

    /// Resolve `url` completely; with `download` the selected formats are
    /// fetched and post-processed
    pub async fn extract_info(&mut self, url: &str, download: bool) -> Result<Resolution> {
        let mut ctx = ResolutionContext::new();
        self.extract_and_process(url.to_string(), None, RawDict::new(), download, &mut ctx)
            .await
    }

    /// Resolve an already extracted result
    pub async fn process_result(&mut self, raw: RawResult, download: bool) -> Result<Resolution> {
        let mut ctx = ResolutionContext::new();
        self.process_ie_result(raw, download, RawDict::new(), &mut ctx).await
    }

    /// Every media item reachable from `url` paired with its chosen stream
    pub async fn resolve_and_select(&mut self, url: &str) -> Result<Vec<(VideoInfo, Selection)>> {
        let resolution = self.extract_info(url, false).await?;
        Ok(pairs(resolution))
    }

    /// [`resolve_and_select`](Self::resolve_and_select) for a raw result
    pub async fn resolve_and_select_raw(&mut self, raw: RawResult) -> Result<Vec<(VideoInfo, Selection)>> {
        let resolution = self.process_result(raw, false).await?;
        Ok(pairs(resolution))
    }

    /// Download every URL in turn
    ///
    /// With `ignoreerrors` a failing URL is reported and the batch goes on;
    /// reaching `max_downloads` always stops it.
    pub async fn download(&mut self, urls: &[String]) -> Result<Vec<Resolution>> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            match self.extract_info(url, true).await {
                Ok(resolution) => results.push(resolution),
                Err(GrabError::MaxDownloadsReached) => {
                    info!("[info] Maximum number of downloaded files reached.");
                    return Err(GrabError::MaxDownloadsReached);
                }
                Err(e) if self.params.ignoreerrors && !e.is_fatal() => {
                    error!("{}: {}", url, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Feed a saved raw result through the pipeline, falling back to its
    /// `webpage_url` when the saved data no longer downloads
    pub async fn download_with_info_file(&mut self, path: &Path, download: bool) -> Result<Resolution> {
        let content = tokio::fs::read_to_string(path).await?;
        let raw = RawResult::from_json(serde_json::from_str(&content)?)?;
        let webpage_url = raw.get_str("webpage_url").map(str::to_string);
        match self.process_result(raw, download).await {
            Err(e) if !e.is_fatal() => match webpage_url {
                Some(url) => {
                    warn!(
                        "The info failed to download ({}), trying with \"{}\"",
                        e, url
                    );
                    self.extract_info(&url, download).await
                }
                None => Err(e),
            },
            other => other,
        }
    }

    /// Archive line for an item, if an id and an extractor key can be found
    fn archive_key_for(&self, fields: &RawDict) -> Option<String> {
        let id = str_field(fields, "id").filter(|id| !id.is_empty())?;
        let extractor = str_field(fields, "extractor_key")
            .or_else(|| str_field(fields, "ie_key"))
            .or_else(|| {
                let url = str_field(fields, "url")?;
                self.registry.find(&url).map(|ie| ie.ie_key().to_string())
            })?;
        Some(archive_key(&extractor, &id))
    }

    fn in_archive(&self, fields: &RawDict) -> bool {
        match &self.archive {
            Some(archive) => self
                .archive_key_for(fields)
                .map_or(false, |key| archive.contains(&key)),
            None => false,
        }
    }

    /// `None` admits the item, otherwise the reason it is skipped
    pub fn match_entry(&self, fields: &RawDict, incomplete: bool) -> Option<String> {
        self.admission
            .check(fields, incomplete, self.in_archive(fields))
    }

    async fn extract_raw(&self, url: &str, ie_key: Option<&str>) -> Result<Extracted> {
        let candidates: Vec<Arc<dyn crate::extractor::Extractor>> =
            self.registry.candidates(ie_key).into_iter().cloned().collect();

        for ie in candidates {
            if !ie.suitable(url) {
                continue;
            }
            if !ie.working() {
                warn!(
                    "The program functionality for {} has been marked as broken, and will probably not work.",
                    ie.ie_name()
                );
            }
            if let (Some(archive), Some(id)) = (&self.archive, ie.extract_id(url)) {
                if archive.contains(&archive_key(ie.ie_key(), &id)) {
                    let reason = format!("{} has already been recorded in archive", id);
                    info!("[download] {}", reason);
                    return Ok(Extracted::Skipped(reason));
                }
            }

            debug!("[{}] Extracting URL: {}", ie.ie_name(), url);
            let mut raw = ie
                .extract(url, &self.params)
                .await
                .map_err(GrabError::from_collaborator)?;
            raw.set_default("extractor", Value::from(ie.ie_name()));
            raw.set_default("webpage_url", Value::from(url));
            if let Some(basename) = url_basename(url) {
                raw.set_default("webpage_url_basename", Value::from(basename));
            }
            raw.set_default("extractor_key", Value::from(ie.ie_key()));
            return Ok(Extracted::Raw(raw));
        }

        Err(GrabError::NoSuitableExtractor(url.to_string()))
    }

    async fn extract_and_process(
        &mut self,
        url: String,
        ie_key: Option<String>,
        extra: RawDict,
        download: bool,
        ctx: &mut ResolutionContext,
    ) -> Result<Resolution> {
        match self.extract_raw(&url, ie_key.as_deref()).await? {
            Extracted::Skipped(reason) => Ok(Resolution::Skipped(reason)),
            Extracted::Raw(raw) => self.process_ie_result(raw, download, extra, ctx).await,
        }
    }

    /// Dispatch on the result type. `extra` is defaulted onto the video
    /// that eventually comes out of this result.
    fn process_ie_result<'a>(
        &'a mut self,
        raw: RawResult,
        download: bool,
        extra: RawDict,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, Result<Resolution>> {
        self.dispatch_ie_result(raw, download, extra, ctx).boxed()
    }

    async fn dispatch_ie_result(
        &mut self,
        mut raw: RawResult,
        download: bool,
        extra: RawDict,
        ctx: &mut ResolutionContext,
    ) -> Result<Resolution> {
        match raw.result_type()? {
            ResultType::Video => {
                add_extra_info(&mut raw.fields, extra);
                self.process_video_result(raw.fields, download).await
            }
            ResultType::Url => {
                let url = raw
                    .get_str("url")
                    .ok_or_else(|| GrabError::unexpected("url result without \"url\" field"))?
                    .to_string();
                let ie_key = raw.get_str("ie_key").map(str::to_string);
                self.extract_and_process(url, ie_key, extra, download, ctx).await
            }
            ResultType::UrlTransparent => {
                let url = raw
                    .get_str("url")
                    .ok_or_else(|| {
                        GrabError::unexpected("url_transparent result without \"url\" field")
                    })?
                    .to_string();
                let ie_key = raw.get_str("ie_key").map(str::to_string);
                let mut inner = match self.extract_raw(&url, ie_key.as_deref()).await? {
                    Extracted::Skipped(reason) => return Ok(Resolution::Skipped(reason)),
                    Extracted::Raw(inner) => inner,
                };
                for (key, value) in raw.fields {
                    if value.is_null() || TRANSPARENT_RESERVED.contains(&key.as_str()) {
                        continue;
                    }
                    inner.fields.insert(key, value);
                }
                if inner.result_type()? == ResultType::Url {
                    inner
                        .fields
                        .insert("_type".to_string(), Value::from("url_transparent"));
                }
                self.process_ie_result(inner, download, extra, ctx).await
            }
            ResultType::Playlist | ResultType::MultiVideo => {
                let webpage_url = raw.get_str("webpage_url").map(str::to_string);
                if let Some(url) = &webpage_url {
                    if ctx.is_in_progress(url) {
                        let name = raw
                            .get_str("title")
                            .or_else(|| raw.get_str("id"))
                            .unwrap_or(url)
                            .to_string();
                        let reason = format!("Skipping already downloaded playlist: {}", name);
                        info!("[download] {}", reason);
                        return Ok(Resolution::Skipped(reason));
                    }
                }
                ctx.enter_playlist(webpage_url.as_deref());
                let result = self.process_playlist(raw, download, ctx).await;
                ctx.leave_playlist();
                result
            }
            ResultType::CompatList => {
                warn!(
                    "Extractor {} returned a compat_list result. It needs to be updated.",
                    raw.get_str("extractor").unwrap_or("unknown")
                );
                let entries = match raw.entries.take() {
                    Some(Entries::List(list)) => list,
                    Some(Entries::Paged(paged)) => paged.slice(0, None),
                    Some(Entries::Lazy(iter)) => iter.collect(),
                    None => Vec::new(),
                };
                let inherited: Vec<(String, Value)> = ["extractor", "webpage_url", "extractor_key"]
                    .iter()
                    .filter_map(|&key| raw.fields.get(key).map(|v| (key.to_string(), v.clone())))
                    .collect();

                let mut results = Vec::with_capacity(entries.len());
                for mut entry in entries {
                    add_extra_info(&mut entry.fields, inherited.iter().cloned());
                    let resolution = self
                        .process_ie_result(entry, download, extra.clone(), ctx)
                        .await?;
                    results.push(Some(resolution));
                }
                Ok(Resolution::Playlist {
                    id: None,
                    title: None,
                    entries: results,
                })
            }
        }
    }

    async fn process_playlist(
        &mut self,
        mut raw: RawResult,
        download: bool,
        ctx: &mut ResolutionContext,
    ) -> Result<Resolution> {
        let id = raw.get_str("id").map(str::to_string);
        let title = raw.get_str("title").map(str::to_string);
        let playlist = title.clone().or_else(|| id.clone());
        info!(
            "[download] Downloading playlist: {}",
            playlist.as_deref().unwrap_or("NA")
        );

        let entries = raw.entries.take().unwrap_or(Entries::List(Vec::new()));
        let selected = select_entries(
            entries,
            self.params.playliststart,
            self.params.playlist_end(),
            self.playlist_items.as_ref(),
        );
        let n_entries = selected.entries.len();
        match selected.n_all_entries {
            Some(n_all) if n_all != n_entries => info!(
                "[{}] playlist {}: Collected {} video ids (downloading {} of them)",
                raw.get_str("extractor").unwrap_or("generic"),
                playlist.as_deref().unwrap_or("NA"),
                n_all,
                n_entries
            ),
            _ => info!(
                "[{}] playlist {}: Downloading {} videos",
                raw.get_str("extractor").unwrap_or("generic"),
                playlist.as_deref().unwrap_or("NA"),
                n_entries
            ),
        }

        let mut entries: Vec<SelectedEntry> = selected.entries;
        if self.params.playlistreverse {
            entries.reverse();
        }
        if self.params.playlistrandom {
            entries.shuffle(&mut rand::thread_rng());
        }

        let mut overlay = RawDict::new();
        overlay.insert("n_entries".to_string(), Value::from(n_entries));
        for (key, value) in [
            ("playlist", playlist.clone()),
            ("playlist_id", id.clone()),
            ("playlist_title", title.clone()),
            ("playlist_uploader", raw.get_str("uploader").map(str::to_string)),
            ("playlist_uploader_id", raw.get_str("uploader_id").map(str::to_string)),
        ] {
            overlay.insert(key.to_string(), value.map_or(Value::Null, Value::from));
        }
        for key in ["extractor", "webpage_url", "webpage_url_basename", "extractor_key"] {
            if let Some(value) = raw.fields.get(key) {
                overlay.insert(key.to_string(), value.clone());
            }
        }

        let mut results = Vec::with_capacity(n_entries);
        for (i, SelectedEntry { index, entry }) in entries.into_iter().enumerate() {
            info!("[download] Downloading video {} of {}", i + 1, n_entries);

            if let Some(reason) = self.match_entry(&entry.fields, true) {
                info!("[download] {}", reason);
                continue;
            }

            let mut extra = overlay.clone();
            extra.insert("playlist_index".to_string(), Value::from(index));
            match self.process_ie_result(entry, download, extra, ctx).await {
                Ok(resolution) => results.push(Some(resolution)),
                Err(e) if self.params.ignoreerrors && !e.is_fatal() => {
                    error!("{}", e);
                    results.push(None);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "[download] Finished downloading playlist: {}",
            playlist.as_deref().unwrap_or("NA")
        );
        Ok(Resolution::Playlist {
            id,
            title,
            entries: results,
        })
    }

    fn selector_for(&mut self, spec: &str) -> Result<Arc<FormatSelector>> {
        if let Some(selector) = self.selectors.get(spec) {
            return Ok(selector.clone());
        }
        let selector = Arc::new(FormatSelector::compile(spec)?);
        self.selectors.insert(spec.to_string(), selector.clone());
        Ok(selector)
    }

    fn format_spec_for(&self, info: &VideoInfo, download: bool) -> String {
        if let Some(spec) = &self.params.format {
            return spec.clone();
        }
        if self.params.simulate || !download {
            return default_format_spec(true, false, false).to_string();
        }
        default_format_spec(
            self.can_merge(),
            info.is_live.unwrap_or(false),
            self.params.outtmpl == "-",
        )
        .to_string()
    }

    async fn process_video_result(&mut self, fields: RawDict, download: bool) -> Result<Resolution> {
        let info = sanitize_info(fields, &self.params)?;
        if self.params.listformats {
            (self.screen)(&format_table(&info));
            return Ok(Resolution::Video(Vec::new()));
        }
        let spec = self.format_spec_for(&info, download);
        debug!("{}: format expression {:?}", info.id, spec);
        let selector = self.selector_for(&spec)?;
        let selections = selector.select(&info.formats, self.params.merge_output_format.as_deref())?;

        if download {
            let ids: Vec<&str> = selections.iter().map(|s| s.format.format_id.as_str()).collect();
            info!("[info] {}: downloading format(s) {}", info.id, ids.join(", "));
        }

        let mut items = Vec::with_capacity(selections.len());
        let mut reasons = Vec::new();
        for selection in selections {
            match self.process_info(&info, selection, download).await? {
                ItemOutcome::Ready(item) => items.push(*item),
                ItemOutcome::Skipped(reason) => reasons.push(reason),
            }
        }
        if items.is_empty() {
            if let Some(reason) = reasons.into_iter().next() {
                return Ok(Resolution::Skipped(reason));
            }
        }
        Ok(Resolution::Video(items))
    }

    /// Item fields with the chosen format laid over the media item
    fn item_fields(info: &VideoInfo, selection: &Selection) -> RawDict {
        let mut fields = info.to_dict();
        if let Ok(Value::Object(format)) = serde_json::to_value(&selection.format) {
            for (key, value) in format {
                if !value.is_null() {
                    fields.insert(key, value);
                }
            }
        }
        if selection.is_merged() {
            if let Ok(requested) = serde_json::to_value(&selection.requested_formats) {
                fields.insert("requested_formats".to_string(), requested);
            }
        }
        fields.insert("fulltitle".to_string(), Value::from(info.title.clone()));
        fields
    }

    async fn process_info(
        &mut self,
        info: &VideoInfo,
        selection: Selection,
        download: bool,
    ) -> Result<ItemOutcome> {
        if download {
            if let Some(max) = self.params.max_downloads {
                if self.num_downloads >= max {
                    return Err(GrabError::MaxDownloadsReached);
                }
            }
        }

        let mut fields = Self::item_fields(info, &selection);
        if let Some(reason) = self.match_entry(&fields, false) {
            info!("[download] {}", reason);
            return Ok(ItemOutcome::Skipped(reason));
        }

        let mut item = ResolvedItem {
            info: info.clone(),
            selection,
            fields: RawDict::new(),
            filename: None,
            downloaded: false,
        };
        if !download {
            item.fields = fields;
            return Ok(ItemOutcome::Ready(Box::new(item)));
        }

        self.num_downloads += 1;
        let mut filename = prepare_filename(&self.params.outtmpl, &fields);
        self.print_forced(info, &item.selection, &filename);
        if !self.params.simulate {
            self.write_side_files(info, &fields, &filename).await?;
        }
        if self.params.simulate || self.params.skip_download {
            item.filename = Some(filename);
            item.fields = fields;
            return Ok(ItemOutcome::Ready(Box::new(item)));
        }

        let mut chain: Vec<Arc<dyn PostProcessor>> = Vec::new();
        let success = if item.selection.is_merged() {
            let requested = &item.selection.requested_formats;
            let compatible = match requested.as_slice() {
                [video, audio] => compatible_merge_exts(&video.ext, &audio.ext),
                _ => true,
            };
            if self.params.merge_output_format.is_none() && !compatible {
                warn!(
                    "Requested formats are incompatible for merge and will be merged into mkv."
                );
                filename = replace_extension(&filename, "mkv");
                fields.insert("ext".to_string(), Value::from("mkv"));
            }

            match &self.merger {
                Some(merger) => chain.push(merger.clone()),
                None => warn!(
                    "You have requested multiple formats but ffmpeg is not installed. The formats won't be merged."
                ),
            }

            if tokio::fs::try_exists(&filename).await.unwrap_or(false) {
                info!(
                    "[download] {} has already been downloaded and merged",
                    filename.display()
                );
                true
            } else {
                let mut parts = Vec::with_capacity(requested.len());
                let mut success = true;
                for format in requested {
                    let part = merged_part_name(&filename, &format.format_id, &format.ext);
                    info!("[download] Destination: {}", part.display());
                    success &= self.fetch(&part, info, format).await?;
                    parts.push(Value::from(part.to_string_lossy().into_owned()));
                }
                fields.insert(FILES_TO_MERGE.to_string(), Value::Array(parts));
                success
            }
        } else {
            info!("[download] Destination: {}", filename.display());
            self.fetch(&filename, info, &item.selection.format).await?
        };

        if success {
            chain.extend(self.postprocessors.iter().cloned());
            fields = run_chain(&chain, &filename, fields, self.params.keepvideo).await;
            if let Some(key) = self.archive_key_for(&fields) {
                if let Some(archive) = self.archive.as_mut() {
                    archive.record(&key).await?;
                }
            }
        }

        item.filename = Some(filename);
        item.downloaded = success;
        item.fields = fields;
        Ok(ItemOutcome::Ready(Box::new(item)))
    }

    fn print_forced(&self, info: &VideoInfo, selection: &Selection, filename: &Path) {
        let params = &self.params;
        let screen = &self.screen;
        if params.forcetitle {
            screen(&info.title);
        }
        if params.forceid {
            screen(&info.id);
        }
        if params.forceurl {
            if selection.is_merged() {
                for format in &selection.requested_formats {
                    screen(&format.url);
                }
            } else {
                screen(&selection.format.url);
            }
        }
        if params.forcethumbnail {
            if let Some(url) = best_thumbnail(info) {
                screen(&url);
            }
        }
        if params.forcedescription {
            if let Some(description) = &info.description {
                screen(description);
            }
        }
        if params.forcefilename {
            screen(&filename.display().to_string());
        }
        if params.forceformat {
            screen(
                selection
                    .format
                    .format
                    .as_deref()
                    .unwrap_or(&selection.format.format_id),
            );
        }
    }

    /// Description, subtitles, info JSON and thumbnail next to `filename`.
    ///
    /// Write failures abort the item; a subtitle or thumbnail that cannot be
    /// fetched is only reported.
    async fn write_side_files(&self, info: &VideoInfo, fields: &RawDict, filename: &Path) -> Result<()> {
        if self.params.writedescription {
            match &info.description {
                Some(description) => {
                    write_description(filename, description).await?;
                }
                None => warn!("There's no description to write."),
            }
        }

        if self.params.writesubtitles || self.params.writeautomaticsub {
            for (lang, track) in info.requested_subtitles.iter().flatten() {
                let ext = track.ext.as_deref().unwrap_or("unknown");
                let path = subtitles_path(filename, lang, ext);
                if write_inline_subtitles(&path, track).await? {
                    continue;
                }
                let Some(url) = &track.url else {
                    warn!("{} subtitles for {} have neither data nor a URL", lang, info.id);
                    continue;
                };
                info!("[info] Writing video subtitles to: {}", path.display());
                let request = side_request(format!("sub-{}", lang), url, ext, info);
                match self.fetch(&path, info, &request).await {
                    Ok(true) => {}
                    Ok(false) => warn!("Unable to download subtitle for \"{}\"", lang),
                    Err(e) => warn!("Unable to download subtitle for \"{}\": {}", lang, e),
                }
            }
        }

        if self.params.writeinfojson {
            write_info_json(filename, fields).await?;
        }

        if self.params.writethumbnail {
            if let Some(url) = best_thumbnail(info) {
                let path = thumbnail_path(filename, &url);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    info!("[info] Thumbnail is already present: {}", path.display());
                } else {
                    info!(
                        "[{}] {}: Downloading thumbnail ...",
                        info.extractor.as_deref().unwrap_or("generic"),
                        info.id
                    );
                    let ext = path
                        .extension()
                        .map(|e| e.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let request = side_request("thumbnail".to_string(), &url, &ext, info);
                    match self.fetch(&path, info, &request).await {
                        Ok(true) => info!("[info] Writing thumbnail to: {}", path.display()),
                        Ok(false) => warn!("Unable to download thumbnail \"{}\"", url),
                        Err(e) => warn!("Unable to download thumbnail \"{}\": {}", url, e),
                    }
                }
            }
        }
        Ok(())
    }

    async fn fetch(&self, path: &Path, info: &VideoInfo, format: &Format) -> Result<bool> {
        self.downloader
            .download(path, info, format)
            .await
            .map_err(|err| match err.downcast::<GrabError>() {
                Ok(grab) => grab,
                Err(other) => GrabError::Download(format!("{:#}", other)),
            })
    }
}

fn pairs(resolution: Resolution) -> Vec<(VideoInfo, Selection)> {
    resolution
        .into_items()
        .into_iter()
        .map(|item| (item.info, item.selection))
        .collect()
}
