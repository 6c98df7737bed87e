//! Normalisation of raw extractor output into a [`VideoInfo`]
//!
//! This is the only place where loosely typed fields are accepted. Numbers
//! that arrive as strings are coerced, missing derived fields are filled in
//! and the format catalogue is made well formed before any selection runs.

use crate::extractor::models::{Format, RawDict, ScopedCookies, SubtitleTrack, Thumbnail, VideoInfo};
use crate::utils::config::Params;
use crate::utils::date::timestamp_to_date;
use crate::utils::error::{GrabError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

/// Headers sent with every request unless overridden
pub const STD_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Linux x86_64; rv:10.0) Gecko/20150101 Firefox/47.0 (Chrome)",
    ),
    ("Accept-Charset", "ISO-8859-1,utf-8;q=0.7,*;q=0.7"),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-us,en;q=0.5"),
];

const INTEGER_FIELDS: &[&str] = &[
    "width",
    "height",
    "filesize",
    "filesize_approx",
    "timestamp",
    "release_timestamp",
    "upload_year",
    "upload_month",
    "upload_day",
    "view_count",
    "like_count",
    "dislike_count",
    "repost_count",
    "comment_count",
    "age_limit",
    "chapter_number",
    "season_number",
    "episode_number",
    "track_number",
    "disc_number",
    "release_year",
    "playlist_index",
];

const FLOAT_FIELDS: &[&str] = &[
    "tbr",
    "abr",
    "asr",
    "vbr",
    "fps",
    "duration",
    "average_rating",
    "start_time",
    "end_time",
];

const DEFAULT_EXT: &str = "unknown_video";

/// Lowercased extension of the last path component of `url`, if it looks
/// like one
pub fn determine_ext(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    let (_, guess) = name.rsplit_once('.')?;
    if !guess.is_empty() && guess.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(guess.to_ascii_lowercase())
    } else {
        None
    }
}

/// Repair common extractor mistakes in URLs
pub fn sanitize_url(url: &str) -> String {
    if url.starts_with("//") {
        return format!("http:{}", url);
    }
    if let Some(rest) = url.strip_prefix("httpss://") {
        return format!("https://{}", rest);
    }
    static RMTP: OnceLock<Regex> = OnceLock::new();
    let rmtp = RMTP.get_or_init(|| Regex::new(r"^rmtp([es]?)://").expect("rmtp regex"));
    rmtp.replace(url, "rtmp${1}://").into_owned()
}

/// Transport inferred from the URL when the extractor gave none
pub fn determine_protocol(format: &Format) -> Option<String> {
    if let Some(protocol) = &format.protocol {
        return Some(protocol.clone());
    }
    let url = format.url.as_str();
    for scheme in ["rtmp", "mms", "rtsp"] {
        if url.starts_with(scheme) {
            return Some(scheme.to_string());
        }
    }
    match determine_ext(url).as_deref() {
        Some("m3u8") => return Some("m3u8".to_string()),
        Some("f4m") => return Some("f4m".to_string()),
        _ => {}
    }
    Url::parse(url).ok().map(|u| u.scheme().to_string())
}

fn require_field(dict: &RawDict, key: &str) -> Result<()> {
    match dict.get(key) {
        Some(Value::Null) | None => Err(GrabError::unexpected(format!(
            "Missing \"{}\" field in extractor result",
            key
        ))),
        Some(_) => Ok(()),
    }
}

/// Force a string-typed identifier into a string
fn stringify_field(dict: &mut RawDict, key: &str) {
    let replacement = match dict.get(key) {
        Some(Value::String(_)) | Some(Value::Null) | None => return,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    };
    warn!(
        "\"{}\" field is not a string - forcing string conversion, there is an error in extractor",
        key
    );
    dict.insert(key.to_string(), Value::from(replacement));
}

fn coerce_number(value: &Value, integer: bool) -> Option<Value> {
    match value {
        Value::Number(n) if integer && n.as_i64().is_none() => {
            n.as_f64().map(|f| Value::from(f.trunc() as i64))
        }
        Value::Number(_) => Some(value.clone()),
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        Value::String(s) if integer => s.trim().parse::<i64>().ok().map(Value::from),
        Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
        _ => None,
    }
}

/// Coerce declared numeric fields in place
///
/// Non-numbers are converted with a warning; anything that does not parse
/// becomes absent.
pub fn coerce_numeric_fields(dict: &mut RawDict) {
    for (fields, integer) in [(INTEGER_FIELDS, true), (FLOAT_FIELDS, false)] {
        for &key in fields {
            let Some(value) = dict.get(key) else { continue };
            if value.is_null() {
                continue;
            }
            if !matches!(value, Value::Number(_) | Value::Bool(_)) {
                warn!(
                    "\"{}\" field is not numeric - forcing {} conversion, there is an error in extractor",
                    key,
                    if integer { "int" } else { "float" }
                );
            }
            match coerce_number(value, integer) {
                Some(coerced) => {
                    dict.insert(key.to_string(), coerced);
                }
                None => {
                    dict.remove(key);
                }
            }
        }
    }
    if let Some(Value::Number(n)) = dict.get("preference") {
        if n.as_i64().is_none() {
            let truncated = n.as_f64().map(|f| f.trunc() as i64);
            dict.insert("preference".to_string(), truncated.map_or(Value::Null, Value::from));
        }
    }
}

fn as_object(value: Value, what: &str) -> Result<RawDict> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GrabError::unexpected(format!(
            "{} must be an object, got {}",
            what, other
        ))),
    }
}

fn malformed(id: &str, err: serde_json::Error) -> GrabError {
    GrabError::unexpected(format!("malformed extractor result for {}: {}", id, err))
}

fn normalize_thumbnails(dict: &mut RawDict, id: &str) -> Result<Vec<Thumbnail>> {
    let raw = match dict.remove("thumbnails") {
        Some(Value::Array(list)) => list,
        Some(Value::Null) | None => match dict.get("thumbnail") {
            Some(Value::String(url)) => vec![serde_json::json!({ "url": url })],
            _ => Vec::new(),
        },
        Some(other) => {
            return Err(GrabError::unexpected(format!(
                "\"thumbnails\" must be a list, got {}",
                other
            )))
        }
    };

    let mut thumbnails = Vec::with_capacity(raw.len());
    for value in raw {
        let mut entry = as_object(value, "thumbnail")?;
        coerce_numeric_fields(&mut entry);
        stringify_field(&mut entry, "id");
        let thumbnail: Thumbnail =
            serde_json::from_value(Value::Object(entry)).map_err(|e| malformed(id, e))?;
        thumbnails.push(thumbnail);
    }

    thumbnails.sort_by(|a, b| {
        let key = |t: &Thumbnail| {
            (
                t.preference.unwrap_or(-1),
                t.width.unwrap_or(-1),
                t.height.unwrap_or(-1),
                t.id.clone().unwrap_or_default(),
                t.url.clone(),
            )
        };
        key(a).cmp(&key(b))
    });
    for (i, thumbnail) in thumbnails.iter_mut().enumerate() {
        thumbnail.url = sanitize_url(&thumbnail.url);
        if let (Some(w), Some(h)) = (thumbnail.width, thumbnail.height) {
            thumbnail.resolution = Some(format!("{}x{}", w, h));
        }
        if thumbnail.id.is_none() {
            thumbnail.id = Some(i.to_string());
        }
    }
    Ok(thumbnails)
}

fn normalize_subtitle_tracks(tracks: &mut BTreeMap<String, Vec<SubtitleTrack>>) {
    for track in tracks.values_mut().flatten() {
        if let Some(url) = &track.url {
            let url = sanitize_url(url);
            if track.ext.is_none() {
                track.ext = determine_ext(&url);
            }
            track.url = Some(url);
        }
    }
}

/// The subtitle track to fetch per language, or `None` when no subtitles
/// were asked for
pub fn process_subtitles(
    video_id: &str,
    subtitles: &BTreeMap<String, Vec<SubtitleTrack>>,
    automatic_captions: &BTreeMap<String, Vec<SubtitleTrack>>,
    params: &Params,
) -> Option<BTreeMap<String, SubtitleTrack>> {
    let mut available: BTreeMap<&str, &Vec<SubtitleTrack>> = BTreeMap::new();
    if params.writesubtitles {
        available.extend(subtitles.iter().map(|(lang, tracks)| (lang.as_str(), tracks)));
    }
    if params.writeautomaticsub {
        for (lang, tracks) in automatic_captions {
            available.entry(lang.as_str()).or_insert(tracks);
        }
    }
    if available.is_empty() {
        return None;
    }

    let requested: Vec<String> = if params.allsubtitles {
        available.keys().map(|lang| lang.to_string()).collect()
    } else if !params.subtitleslangs.is_empty() {
        params.subtitleslangs.clone()
    } else if available.contains_key("en") {
        vec!["en".to_string()]
    } else {
        available.keys().take(1).map(|lang| lang.to_string()).collect()
    };

    let preferences: Vec<&str> = if params.subtitlesformat.is_empty() {
        Vec::new()
    } else {
        params.subtitlesformat.split('/').collect()
    };

    let mut chosen = BTreeMap::new();
    for lang in requested {
        let Some(tracks) = available.get(lang.as_str()) else {
            warn!("{} subtitles not available for {}", lang, video_id);
            continue;
        };
        let Some(last) = tracks.last() else {
            warn!("{} subtitles not available for {}", lang, video_id);
            continue;
        };
        let preferred = preferences.iter().find_map(|&ext| {
            if ext == "best" {
                Some(last)
            } else {
                tracks.iter().rev().find(|t| t.ext.as_deref() == Some(ext))
            }
        });
        let track = match preferred {
            Some(track) => track,
            None => {
                warn!(
                    "No subtitle format found matching \"{}\" for language {}, using {}",
                    params.subtitlesformat,
                    lang,
                    last.ext.as_deref().unwrap_or("unknown")
                );
                last
            }
        };
        chosen.insert(lang, track.clone());
    }
    Some(chosen)
}

fn format_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s,/+\[\]()]").expect("format id regex"))
}

/// Merge header maps, later maps winning, keys compared case-insensitively
fn merge_headers<'a, I>(layers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = Vec<(&'a str, &'a str)>>,
{
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
            merged.insert(key.to_string(), value.to_string());
        }
    }
    merged
}

fn header_pairs(headers: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

/// Pull a `Cookie` header out of `format.http_headers` and bind it to the
/// host of the format's own URL
fn scope_cookies(format: &mut Format) {
    let Some(key) = format
        .http_headers
        .keys()
        .find(|k| k.eq_ignore_ascii_case("cookie"))
        .cloned()
    else {
        return;
    };
    let Some(value) = format.http_headers.remove(&key) else {
        return;
    };
    let host = Url::parse(&format.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    match host {
        Some(domain) => {
            warn!(
                "Cookie header of format {} is only sent to {}; extractors should not pass cookies in http_headers",
                format.format_id, domain
            );
            format.cookies = Some(ScopedCookies { domain, value });
        }
        None => warn!(
            "Dropping cookie header of format {}: its URL has no host",
            format.format_id
        ),
    }
}

fn normalize_formats(
    raw: Vec<Value>,
    info_headers: &BTreeMap<String, String>,
    params: &Params,
    video_id: &str,
) -> Result<Vec<Format>> {
    let mut dicts = Vec::with_capacity(raw.len());
    for value in raw {
        let mut dict = as_object(value, "format")?;
        match dict.get("url") {
            Some(Value::String(url)) if !url.is_empty() => {}
            _ => {
                warn!(
                    "\"url\" field is missing or empty - skipping format, there is an error in extractor"
                );
                continue;
            }
        }
        coerce_numeric_fields(&mut dict);
        stringify_field(&mut dict, "format_id");
        dicts.push(dict);
    }
    if dicts.is_empty() {
        return Err(GrabError::expected("No video formats found!"));
    }

    let mut formats = Vec::with_capacity(dicts.len());
    for (i, dict) in dicts.into_iter().enumerate() {
        let mut format: Format =
            serde_json::from_value(Value::Object(dict)).map_err(|e| malformed(video_id, e))?;
        format.format_id = if format.format_id.is_empty() {
            i.to_string()
        } else {
            format_id_re().replace_all(&format.format_id, "_").into_owned()
        };
        formats.push(format);
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for format in &formats {
        *counts.entry(format.format_id.clone()).or_default() += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    for format in &mut formats {
        if counts.get(&format.format_id).copied().unwrap_or(0) > 1 {
            let n = seen.entry(format.format_id.clone()).or_default();
            format.format_id = format!("{}-{}", format.format_id, n);
            *n += 1;
        }
    }

    let std_headers: Vec<(&str, &str)> = STD_HEADERS.to_vec();
    for format in &mut formats {
        format.url = sanitize_url(&format.url);
        if format.format.is_none() {
            let note = format
                .format_note
                .as_ref()
                .map(|note| format!(" ({})", note))
                .unwrap_or_default();
            format.format = Some(format!(
                "{} - {}{}",
                format.format_id,
                format.display_resolution(),
                note
            ));
        }
        if format.ext.is_empty() {
            format.ext = determine_ext(&format.url).unwrap_or_else(|| DEFAULT_EXT.to_string());
        }
        format.protocol = determine_protocol(format);
        let own_headers = std::mem::take(&mut format.http_headers);
        format.http_headers = merge_headers([
            std_headers.clone(),
            header_pairs(&params.http_headers),
            header_pairs(info_headers),
            header_pairs(&own_headers),
        ]);
        scope_cookies(format);
    }
    Ok(formats)
}

/// Validate and coerce one `video` result into a typed record
pub fn sanitize_info(mut dict: RawDict, params: &Params) -> Result<VideoInfo> {
    require_field(&dict, "id")?;
    require_field(&dict, "title")?;
    stringify_field(&mut dict, "id");
    let id = dict
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    coerce_numeric_fields(&mut dict);
    let thumbnails = normalize_thumbnails(&mut dict, &id)?;

    let (raw_formats, single_format) = match dict.remove("formats") {
        Some(Value::Array(list)) => (list, false),
        Some(Value::Null) | None => (vec![Value::Object(dict.clone())], true),
        Some(other) => {
            return Err(GrabError::unexpected(format!(
                "\"formats\" must be a list, got {}",
                other
            )))
        }
    };

    let mut info: VideoInfo =
        serde_json::from_value(Value::Object(dict)).map_err(|e| malformed(&id, e))?;
    info.single_format = single_format;
    info.thumbnails = thumbnails;

    if info.thumbnail.is_none() {
        info.thumbnail = info.thumbnails.last().map(|t| t.url.clone());
    }
    if info.display_id.is_none() {
        info.display_id = Some(info.id.clone());
    }
    if info.upload_date.is_none() {
        info.upload_date = info.timestamp.and_then(timestamp_to_date);
    }
    if info.release_date.is_none() {
        info.release_date = info.release_timestamp.and_then(timestamp_to_date);
    }
    for (label, number, title) in [
        ("Chapter", info.chapter_number, &mut info.chapter),
        ("Season", info.season_number, &mut info.season),
        ("Episode", info.episode_number, &mut info.episode),
    ] {
        if let Some(n) = number {
            if title.as_deref().map_or(true, str::is_empty) {
                *title = Some(format!("{} {}", label, n));
            }
        }
    }

    normalize_subtitle_tracks(&mut info.subtitles);
    normalize_subtitle_tracks(&mut info.automatic_captions);
    if params.writesubtitles || params.writeautomaticsub {
        info.requested_subtitles =
            process_subtitles(&info.id, &info.subtitles, &info.automatic_captions, params);
    }

    info.formats = normalize_formats(raw_formats, &info.http_headers, params, &info.id)?;
    Ok(info)
}
