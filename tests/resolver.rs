//! End-to-end resolution through mock extractors and a mock downloader, no network.

use async_trait::async_trait;
use rustgrab::downloader::Downloader;
use rustgrab::extractor::{Extractor, ExtractorRegistry, Format, RawResult, VideoInfo};
use rustgrab::resolver::{Resolution, Resolver};
use rustgrab::utils::{GrabError, Params};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serves canned results for `mock:<page>` URLs
#[derive(Default)]
struct MockSite {
    pages: HashMap<String, Value>,
    failing: HashSet<String>,
    ids_from_url: bool,
    calls: Arc<AtomicUsize>,
}

impl MockSite {
    fn page(mut self, url: &str, result: Value) -> Self {
        self.pages.insert(url.to_string(), result);
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn with_videos(mut self, n: usize) -> Self {
        for i in 1..=n {
            self.pages.insert(format!("mock:v{}", i), video(i));
        }
        self
    }
}

#[async_trait]
impl Extractor for MockSite {
    fn ie_key(&self) -> &'static str {
        "Mock"
    }

    fn suitable(&self, url: &str) -> bool {
        url.starts_with("mock:")
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        if self.ids_from_url {
            url.strip_prefix("mock:").map(str::to_string)
        } else {
            None
        }
    }

    async fn extract(&self, url: &str, _params: &Params) -> anyhow::Result<RawResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url) {
            return Err(GrabError::expected("This video is unavailable").into());
        }
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page for {}", url))?;
        Ok(RawResult::from_json(page)?)
    }
}

/// Writes a marker file instead of transferring anything
#[derive(Default)]
struct MockDownloader {
    calls: AtomicUsize,
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn download(&self, path: &Path, _info: &VideoInfo, format: &Format) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(path, format.url.as_bytes()).await?;
        Ok(true)
    }
}

fn video(i: usize) -> Value {
    json!({
        "id": format!("v{}", i),
        "title": format!("Video {}", i),
        "url": format!("https://media.test/v{}.mp4", i),
        "view_count": i * 10,
    })
}

fn playlist_of(urls: &[&str]) -> Value {
    let entries: Vec<Value> = urls
        .iter()
        .map(|u| json!({"_type": "url", "url": u}))
        .collect();
    json!({"_type": "playlist", "id": "pl", "title": "List", "entries": entries})
}

async fn resolver(site: MockSite, params: Params) -> Resolver {
    let site: Arc<dyn Extractor> = Arc::new(site);
    let registry = ExtractorRegistry::new(vec![site]);
    Resolver::new(params, registry)
        .await
        .expect("resolver")
        .with_merger(None)
}

fn ids(items: &[(VideoInfo, rustgrab::format::Selection)]) -> Vec<String> {
    items.iter().map(|(info, _)| info.id.clone()).collect()
}

#[tokio::test]
async fn playlist_items_pick_entries_and_keep_indices() {
    let site = MockSite::default()
        .with_videos(5)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3", "mock:v4", "mock:v5"]));
    let params = Params {
        playlist_items: Some("2,-1,2".into()),
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    let items = resolver.resolve_and_select("mock:pl").await.unwrap();
    assert_eq!(ids(&items), vec!["v2", "v5"]);
    let (first, _) = &items[0];
    assert_eq!(first.playlist.playlist_index, Some(2));
    assert_eq!(first.playlist.playlist_title.as_deref(), Some("List"));
    assert_eq!(first.playlist.n_entries, Some(2));
    assert_eq!(items[1].0.playlist.playlist_index, Some(5));
}

#[tokio::test]
async fn reversed_window_keeps_original_indices() {
    let site = MockSite::default()
        .with_videos(5)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3", "mock:v4", "mock:v5"]));
    let params = Params {
        playliststart: 2,
        playlistend: Some(4),
        playlistreverse: true,
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    let items = resolver.resolve_and_select("mock:pl").await.unwrap();
    assert_eq!(ids(&items), vec!["v4", "v3", "v2"]);
    let indices: Vec<Option<i64>> = items.iter().map(|(i, _)| i.playlist.playlist_index).collect();
    assert_eq!(indices, vec![Some(4), Some(3), Some(2)]);
}

#[tokio::test]
async fn url_transparent_overrides_inner_fields() {
    let site = MockSite::default().with_videos(1).page(
        "mock:wrapper",
        json!({
            "_type": "url_transparent",
            "url": "mock:v1",
            "id": "outer-id",
            "title": "Outer title",
            "description": null,
        }),
    );
    let mut resolver = resolver(site, Params::default()).await;

    let items = resolver.resolve_and_select("mock:wrapper").await.unwrap();
    assert_eq!(items.len(), 1);
    let (info, _) = &items[0];
    assert_eq!(info.id, "v1");
    assert_eq!(info.title, "Outer title");
    // non-reserved outer fields win, including the page the user asked for
    assert_eq!(info.webpage_url.as_deref(), Some("mock:wrapper"));
}

#[tokio::test]
async fn playlist_containing_itself_is_expanded_once() {
    let site = MockSite::default().with_videos(1).page(
        "mock:loop",
        json!({
            "_type": "playlist",
            "id": "loop",
            "title": "Loop",
            "entries": [
                {"_type": "url", "url": "mock:v1"},
                {"_type": "url", "url": "mock:loop"},
            ],
        }),
    );
    let mut resolver = resolver(site, Params::default()).await;

    match resolver.extract_info("mock:loop", false).await.unwrap() {
        Resolution::Playlist { entries, .. } => {
            assert_eq!(entries.len(), 2);
            assert!(matches!(&entries[0], Some(Resolution::Video(items)) if items.len() == 1));
            match &entries[1] {
                Some(Resolution::Skipped(reason)) => {
                    assert_eq!(reason, "Skipping already downloaded playlist: Loop")
                }
                other => panic!("expected a skipped slot, got {:?}", other),
            }
        }
        other => panic!("expected a playlist, got {:?}", other),
    }

    // the guard is per top-level call
    assert!(resolver.extract_info("mock:loop", false).await.is_ok());
}

#[tokio::test]
async fn failing_entry_leaves_empty_slot_when_ignoring_errors() {
    let site = || {
        MockSite::default()
            .with_videos(3)
            .failing("mock:bad")
            .page("mock:pl", playlist_of(&["mock:v1", "mock:bad", "mock:v3"]))
    };

    let params = Params {
        ignoreerrors: true,
        ..Default::default()
    };
    let mut lenient = resolver(site(), params).await;
    match lenient.extract_info("mock:pl", false).await.unwrap() {
        Resolution::Playlist { entries, .. } => {
            assert_eq!(entries.len(), 3);
            assert!(entries[0].is_some());
            assert!(entries[1].is_none());
            assert!(entries[2].is_some());
        }
        other => panic!("expected a playlist, got {:?}", other),
    }

    let mut strict = resolver(site(), Params::default()).await;
    match strict.extract_info("mock:pl", false).await {
        Err(GrabError::Extractor { expected, message }) => {
            assert!(expected);
            assert_eq!(message, "This video is unavailable");
        }
        other => panic!("expected an extractor error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn incomplete_check_skips_entries_before_extraction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = MockSite {
        calls: calls.clone(),
        ..MockSite::default()
    }
    .with_videos(2)
    .page(
        "mock:pl",
        json!({
            "_type": "playlist",
            "id": "pl",
            "entries": [
                {"_type": "url", "url": "mock:v1", "title": "Trailer"},
                {"_type": "url", "url": "mock:v2", "title": "Episode"},
            ],
        }),
    );
    let params = Params {
        rejecttitle: Some("trailer".into()),
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    let items = resolver.resolve_and_select("mock:pl").await.unwrap();
    assert_eq!(ids(&items), vec!["v2"]);
    // the playlist and the second entry only
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn view_count_bounds_apply_after_extraction() {
    let site = MockSite::default()
        .with_videos(3)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3"]));
    let params = Params {
        min_views: Some(15),
        max_views: Some(25),
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    let items = resolver.resolve_and_select("mock:pl").await.unwrap();
    assert_eq!(ids(&items), vec!["v2"]);
}

#[tokio::test]
async fn archive_makes_downloads_idempotent() {
    let dir = TempDir::new().expect("temp dir");
    let archive = dir.path().join("archive.txt");
    let params = Params {
        download_archive: Some(archive.clone()),
        outtmpl: format!("{}/%(id)s.%(ext)s", dir.path().display()),
        ..Default::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let site = || {
        MockSite {
            ids_from_url: true,
            calls: calls.clone(),
            ..MockSite::default()
        }
        .with_videos(1)
    };
    let downloader = Arc::new(MockDownloader::default());

    let mut first = resolver(site(), params.clone())
        .await
        .with_downloader(downloader.clone());
    let results = first.download(&["mock:v1".to_string()]).await.unwrap();
    let items = results.into_iter().flat_map(Resolution::into_items).collect::<Vec<_>>();
    assert_eq!(items.len(), 1);
    assert!(items[0].downloaded);
    assert_eq!(items[0].filename.as_deref(), Some(dir.path().join("v1.mp4").as_path()));
    assert!(dir.path().join("v1.mp4").exists());

    let content = tokio::fs::read_to_string(&archive).await.unwrap();
    assert_eq!(content, "mock v1\n");

    let mut second = resolver(site(), params).await.with_downloader(downloader.clone());
    let results = second.download(&["mock:v1".to_string()]).await.unwrap();
    assert!(results[0].is_skipped());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn max_downloads_unwinds_the_batch() {
    let dir = TempDir::new().expect("temp dir");
    let site = MockSite::default()
        .with_videos(3)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3"]));
    let params = Params {
        max_downloads: Some(1),
        ignoreerrors: true,
        outtmpl: format!("{}/%(id)s.%(ext)s", dir.path().display()),
        ..Default::default()
    };
    let downloader = Arc::new(MockDownloader::default());
    let mut resolver = resolver(site, params).await.with_downloader(downloader.clone());

    let result = resolver.download(&["mock:pl".to_string()]).await;
    assert!(matches!(result, Err(GrabError::MaxDownloadsReached)));
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.num_downloads(), 1);
}

#[tokio::test]
async fn skip_download_names_files_without_fetching() {
    let site = MockSite::default()
        .with_videos(3)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3"]));
    let params = Params {
        skip_download: true,
        outtmpl: "%(playlist_index)s-%(title)s.%(ext)s".into(),
        ..Default::default()
    };
    let downloader = Arc::new(MockDownloader::default());
    let mut resolver = resolver(site, params).await.with_downloader(downloader.clone());

    let results = resolver.download(&["mock:pl".to_string()]).await.unwrap();
    let names: Vec<String> = results
        .into_iter()
        .flat_map(Resolution::into_items)
        .filter_map(|item| item.filename)
        .map(|p| p.display().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["00001-Video 1.mp4", "00002-Video 2.mp4", "00003-Video 3.mp4"]
    );
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cookie_header_is_scoped_to_the_format_host() {
    let site = MockSite::default().page(
        "mock:c",
        json!({
            "id": "c",
            "title": "Cookies",
            "http_headers": {"Cookie": "sid=secret"},
            "formats": [{"format_id": "a", "url": "https://cdn.test/a.mp4"}],
        }),
    );
    let mut resolver = resolver(site, Params::default()).await;

    let items = resolver.resolve_and_select("mock:c").await.unwrap();
    let format = &items[0].1.format;
    assert!(format
        .http_headers
        .keys()
        .all(|k| !k.eq_ignore_ascii_case("cookie")));
    assert_eq!(format.cookie_header_for("https://cdn.test/other.mp4"), Some("sid=secret"));
    assert_eq!(format.cookie_header_for("https://evil.test/a.mp4"), None);
}

#[tokio::test]
async fn load_info_json_replays_a_saved_result() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("saved.info.json");
    let saved = json!({
        "id": "saved",
        "title": "Saved",
        "extractor_key": "Mock",
        "formats": [
            {"format_id": "sd", "url": "https://media.test/sd.mp4", "height": 480},
            {"format_id": "hd", "url": "https://media.test/hd.mp4", "height": 1080},
        ],
    });
    tokio::fs::write(&path, saved.to_string()).await.unwrap();

    let params = Params {
        format: Some("worst".into()),
        ..Default::default()
    };
    let mut resolver = resolver(MockSite::default(), params).await;
    let items = resolver
        .download_with_info_file(&path, false)
        .await
        .unwrap()
        .into_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].selection.format.format_id, "sd");
}

/// Collects every line the resolver prints
fn screen() -> (rustgrab::resolver::ScreenFn, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let screen: rustgrab::resolver::ScreenFn =
        Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));
    (screen, lines)
}

/// Log output shared with the test while the guard is held
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn split_streams(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Split {}", id),
        "formats": [
            {"format_id": "a", "url": "https://media.test/a.m4a", "ext": "m4a", "vcodec": "none", "acodec": "mp4a"},
            {"format_id": "v", "url": "https://media.test/v.mp4", "ext": "mp4", "vcodec": "avc1", "acodec": "none"},
        ],
    })
}

#[tokio::test]
async fn merge_errors_abort_even_when_ignoring_errors() {
    let site = MockSite::default()
        .page("mock:split", split_streams("split"))
        .page("mock:pl", playlist_of(&["mock:split"]));
    let params = Params {
        ignoreerrors: true,
        format: Some("a+v".into()),
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    match resolver.extract_info("mock:pl", false).await {
        Err(GrabError::MergeIncompatible(message)) => {
            assert!(message.contains("\"-f v+a\""), "{}", message)
        }
        other => panic!("expected a merge error, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        resolver.download(&["mock:pl".to_string()]).await,
        Err(GrabError::MergeIncompatible(_))
    ));
}

#[tokio::test]
async fn compat_list_entries_inherit_outer_fields() {
    let site = MockSite::default().page(
        "mock:compat",
        json!({
            "_type": "compat_list",
            "entries": [
                {"id": "c1", "title": "One", "url": "https://media.test/c1.mp4"},
                {"id": "c2", "title": "Two", "url": "https://media.test/c2.mp4", "webpage_url": "mock:own"},
            ],
        }),
    );
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut resolver = resolver(site, Params::default()).await;
    let items = resolver.resolve_and_select("mock:compat").await.unwrap();

    assert_eq!(ids(&items), vec!["c1", "c2"]);
    assert_eq!(items[0].0.extractor_key.as_deref(), Some("Mock"));
    assert_eq!(items[0].0.webpage_url.as_deref(), Some("mock:compat"));
    // fields the entry carries itself are kept
    assert_eq!(items[1].0.webpage_url.as_deref(), Some("mock:own"));
    assert!(logs
        .contents()
        .contains("returned a compat_list result. It needs to be updated."));
}

#[tokio::test]
async fn reverse_then_shuffle_keeps_every_entry() {
    let site = MockSite::default()
        .with_videos(5)
        .page("mock:pl", playlist_of(&["mock:v1", "mock:v2", "mock:v3", "mock:v4", "mock:v5"]));
    let params = Params {
        playlistreverse: true,
        playlistrandom: true,
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    let items = resolver.resolve_and_select("mock:pl").await.unwrap();
    let mut seen = ids(&items);
    seen.sort();
    assert_eq!(seen, vec!["v1", "v2", "v3", "v4", "v5"]);
    for (info, _) in &items {
        let expected = info.id.trim_start_matches('v').parse::<i64>().unwrap();
        assert_eq!(info.playlist.playlist_index, Some(expected));
        assert_eq!(info.playlist.n_entries, Some(5));
    }
}

#[tokio::test]
async fn forced_printing_reports_fields_without_downloading() {
    let site = MockSite::default().with_videos(1);
    let params = Params {
        simulate: true,
        forcetitle: true,
        forceid: true,
        forceurl: true,
        forcefilename: true,
        outtmpl: "%(id)s.%(ext)s".into(),
        ..Default::default()
    };
    let (screen, lines) = screen();
    let downloader = Arc::new(MockDownloader::default());
    let mut resolver = resolver(site, params)
        .await
        .with_downloader(downloader.clone())
        .with_screen(screen);

    resolver.download(&["mock:v1".to_string()]).await.unwrap();
    assert_eq!(
        *lines.lock().unwrap(),
        vec!["Video 1", "v1", "https://media.test/v1.mp4", "v1.mp4"]
    );
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_formats_prints_table_instead_of_selecting() {
    let site = MockSite::default().page("mock:split", split_streams("split"));
    let params = Params {
        listformats: true,
        ..Default::default()
    };
    let (screen, lines) = screen();
    let mut resolver = resolver(site, params).await.with_screen(screen);

    let items = resolver.resolve_and_select("mock:split").await.unwrap();
    assert!(items.is_empty());
    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[info] Available formats for split:\nformat code"));
    assert!(lines[0].contains("(worst)"));
    assert!(lines[0].ends_with("(best)"));
}

#[tokio::test]
async fn side_files_are_written_next_to_the_media() {
    let dir = TempDir::new().expect("temp dir");
    let site = MockSite::default().page(
        "mock:rich",
        json!({
            "id": "rich",
            "title": "Rich",
            "url": "https://media.test/rich.mp4",
            "description": "About this clip",
            "thumbnail": "https://img.test/rich.webp",
            "subtitles": {
                "en": [{"ext": "vtt", "data": "WEBVTT\n"}],
                "fr": [{"url": "https://subs.test/fr.srt"}],
            },
        }),
    );
    let params = Params {
        outtmpl: format!("{}/%(id)s.%(ext)s", dir.path().display()),
        writesubtitles: true,
        allsubtitles: true,
        writedescription: true,
        writeinfojson: true,
        writethumbnail: true,
        ..Default::default()
    };
    let downloader = Arc::new(MockDownloader::default());
    let mut resolver = resolver(site, params).await.with_downloader(downloader.clone());

    resolver.download(&["mock:rich".to_string()]).await.unwrap();
    let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
    assert_eq!(read("rich.mp4"), "https://media.test/rich.mp4");
    assert_eq!(read("rich.description"), "About this clip");
    assert_eq!(read("rich.en.vtt"), "WEBVTT\n");
    assert_eq!(read("rich.fr.srt"), "https://subs.test/fr.srt");
    assert_eq!(read("rich.webp"), "https://img.test/rich.webp");

    let info: Value = serde_json::from_str(&read("rich.info.json")).unwrap();
    assert_eq!(info["id"], "rich");
    assert_eq!(info["title"], "Rich");
    assert!(info.get("requested_subtitles").is_none());
    // subtitles, thumbnail and the media itself
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn side_files_are_skipped_when_simulating() {
    let dir = TempDir::new().expect("temp dir");
    let site = MockSite::default().with_videos(1);
    let params = Params {
        simulate: true,
        writeinfojson: true,
        writedescription: true,
        outtmpl: format!("{}/%(id)s.%(ext)s", dir.path().display()),
        ..Default::default()
    };
    let mut resolver = resolver(site, params).await;

    resolver.download(&["mock:v1".to_string()]).await.unwrap();
    assert!(!dir.path().join("v1.info.json").exists());
}
