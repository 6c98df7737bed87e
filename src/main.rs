//! rustgrab - media URL resolver and downloader
//!
//! Resolves each URL through the registered extractors, picks streams with
//! the format expression and downloads them, or only prints the selection
//! with `--simulate`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rustgrab::extractor::ExtractorRegistry;
use rustgrab::resolver::{Resolution, Resolver};
use rustgrab::swf::{SwfInterpreter, Value};
use rustgrab::utils::Params;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(
    name = "rustgrab",
    version,
    about = "Resolve and download media URLs",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// URLs to resolve
    urls: Vec<String>,

    /// Print debugging information
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON options file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process a saved extractor result instead of a URL
    #[arg(long, value_name = "FILE")]
    load_info_json: Option<PathBuf>,

    #[command(flatten)]
    options: Overrides,
}

/// Command-line values layered over the options file
#[derive(Args)]
struct Overrides {
    /// Format expression, e.g. "bestvideo[height<=720]+bestaudio/best"
    #[arg(short, long)]
    format: Option<String>,

    /// Container used when merging separate video and audio
    #[arg(long)]
    merge_output_format: Option<String>,

    /// Output filename template
    #[arg(short, long)]
    output: Option<String>,

    /// Do not download, only print what would be selected
    #[arg(short, long)]
    simulate: bool,

    #[arg(long)]
    skip_download: bool,

    #[arg(long, value_name = "N")]
    playlist_start: Option<usize>,

    #[arg(long, value_name = "N")]
    playlist_end: Option<i64>,

    /// Entries to take, e.g. "1-3,7,-2"
    #[arg(long, value_name = "SPEC")]
    playlist_items: Option<String>,

    #[arg(long)]
    playlist_reverse: bool,

    #[arg(long)]
    playlist_random: bool,

    /// Only take the video when a URL names both a video and a playlist
    #[arg(long)]
    no_playlist: bool,

    #[arg(long, value_name = "REGEX")]
    match_title: Option<String>,

    #[arg(long, value_name = "REGEX")]
    reject_title: Option<String>,

    /// Only items uploaded on this date
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    dateafter: Option<String>,

    #[arg(long)]
    datebefore: Option<String>,

    #[arg(long)]
    min_views: Option<i64>,

    #[arg(long)]
    max_views: Option<i64>,

    #[arg(long)]
    age_limit: Option<i64>,

    /// e.g. "like_count > 100 & !is_live"
    #[arg(long, value_name = "FILTER")]
    match_filter: Option<String>,

    /// Record finished items and skip the ones already recorded
    #[arg(long, value_name = "FILE")]
    download_archive: Option<PathBuf>,

    #[arg(long)]
    max_downloads: Option<usize>,

    /// Keep going when an entry fails
    #[arg(short, long)]
    ignore_errors: bool,

    /// Keep the separate streams after merging
    #[arg(short, long)]
    keep_video: bool,

    /// List the available formats of each item instead of downloading
    #[arg(short = 'F', long)]
    list_formats: bool,

    /// Print the title (implies --simulate)
    #[arg(short = 'e', long)]
    get_title: bool,

    #[arg(long)]
    get_id: bool,

    /// Print the media URL (implies --simulate)
    #[arg(short = 'g', long)]
    get_url: bool,

    #[arg(long)]
    get_thumbnail: bool,

    #[arg(long)]
    get_description: bool,

    #[arg(long)]
    get_filename: bool,

    #[arg(long)]
    get_format: bool,

    /// Write the description to a .description file
    #[arg(long)]
    write_description: bool,

    /// Write the item metadata to a .info.json file
    #[arg(long)]
    write_info_json: bool,

    #[arg(long)]
    write_thumbnail: bool,

    #[arg(long)]
    write_sub: bool,

    #[arg(long)]
    write_auto_sub: bool,

    #[arg(long)]
    all_subs: bool,

    /// Comma separated language codes
    #[arg(long, value_name = "LANGS", value_delimiter = ',')]
    sub_lang: Vec<String>,

    #[arg(long, value_name = "FORMAT")]
    sub_format: Option<String>,

    #[arg(short = 'R', long)]
    retries: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Call a method of a compressed SWF file and print the result
    Swf {
        file: PathBuf,
        class: String,
        method: String,
        /// Integers are passed as numbers, anything else as strings
        args: Vec<String>,
    },
}

impl Overrides {
    fn apply(self, params: &mut Params) {
        if self.format.is_some() {
            params.format = self.format;
        }
        if self.merge_output_format.is_some() {
            params.merge_output_format = self.merge_output_format;
        }
        if let Some(output) = self.output {
            params.outtmpl = output;
        }
        params.simulate |= self.simulate;
        params.skip_download |= self.skip_download;
        if let Some(start) = self.playlist_start {
            params.playliststart = start;
        }
        if self.playlist_end.is_some() {
            params.playlistend = self.playlist_end;
        }
        if self.playlist_items.is_some() {
            params.playlist_items = self.playlist_items;
        }
        params.playlistreverse |= self.playlist_reverse;
        params.playlistrandom |= self.playlist_random;
        params.noplaylist |= self.no_playlist;
        if self.match_title.is_some() {
            params.matchtitle = self.match_title;
        }
        if self.reject_title.is_some() {
            params.rejecttitle = self.reject_title;
        }
        if self.date.is_some() {
            params.date = self.date;
        }
        if self.dateafter.is_some() {
            params.dateafter = self.dateafter;
        }
        if self.datebefore.is_some() {
            params.datebefore = self.datebefore;
        }
        if self.min_views.is_some() {
            params.min_views = self.min_views;
        }
        if self.max_views.is_some() {
            params.max_views = self.max_views;
        }
        if self.age_limit.is_some() {
            params.age_limit = self.age_limit;
        }
        if self.match_filter.is_some() {
            params.match_filter = self.match_filter;
        }
        if self.download_archive.is_some() {
            params.download_archive = self.download_archive;
        }
        if self.max_downloads.is_some() {
            params.max_downloads = self.max_downloads;
        }
        params.ignoreerrors |= self.ignore_errors;
        params.keepvideo |= self.keep_video;
        let any_printing = self.get_title
            || self.get_id
            || self.get_url
            || self.get_thumbnail
            || self.get_description
            || self.get_filename
            || self.get_format;
        params.listformats |= self.list_formats;
        params.forcetitle |= self.get_title;
        params.forceid |= self.get_id;
        params.forceurl |= self.get_url;
        params.forcethumbnail |= self.get_thumbnail;
        params.forcedescription |= self.get_description;
        params.forcefilename |= self.get_filename;
        params.forceformat |= self.get_format;
        params.simulate |= any_printing;
        params.writedescription |= self.write_description;
        params.writeinfojson |= self.write_info_json;
        params.writethumbnail |= self.write_thumbnail;
        params.writesubtitles |= self.write_sub;
        params.writeautomaticsub |= self.write_auto_sub;
        params.allsubtitles |= self.all_subs;
        if !self.sub_lang.is_empty() {
            params.subtitleslangs = self.sub_lang;
        }
        if let Some(format) = self.sub_format {
            params.subtitlesformat = format;
        }
        if let Some(retries) = self.retries {
            params.retries = retries;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Some(Command::Swf {
        file,
        class,
        method,
        args,
    }) = cli.command
    {
        return run_swf(file, &class, &method, &args).await;
    }

    let params = load_params(cli.config.as_deref(), cli.options).await?;
    let simulate = params.simulate;
    let quiet = params.forced_printing() || params.listformats;
    let mut resolver = Resolver::new(params, ExtractorRegistry::with_defaults()).await?;

    if let Some(path) = cli.load_info_json {
        let resolution = resolver
            .download_with_info_file(&path, !simulate)
            .await
            .with_context(|| format!("processing {}", path.display()))?;
        report(&resolution);
        return Ok(());
    }

    if cli.urls.is_empty() {
        anyhow::bail!("You must provide at least one URL");
    }

    if simulate {
        for resolution in resolver.download(&cli.urls).await? {
            if quiet {
                continue;
            }
            for item in resolution.into_items() {
                let format = &item.selection.format;
                println!(
                    "{} [{}]: {}",
                    item.info.id,
                    item.info.title,
                    format.format.as_deref().unwrap_or(&format.format_id)
                );
            }
        }
        return Ok(());
    }

    for resolution in resolver.download(&cli.urls).await? {
        report(&resolution);
    }
    info!("{} file(s) downloaded", resolver.num_downloads());
    Ok(())
}

async fn load_params(path: Option<&std::path::Path>, overrides: Overrides) -> Result<Params> {
    let default_path = Params::default_config_path();
    let mut params = match path.map(PathBuf::from).or(default_path) {
        Some(path) if path.exists() => Params::load(&path)
            .await
            .with_context(|| format!("loading options from {}", path.display()))?,
        _ => Params::default(),
    };
    overrides.apply(&mut params);
    params.validate()?;
    Ok(params)
}

fn report(resolution: &Resolution) {
    match resolution {
        Resolution::Video(items) => {
            for item in items {
                match &item.filename {
                    Some(path) if item.downloaded => info!("[download] {}", path.display()),
                    Some(path) => info!("[download] {} (not downloaded)", path.display()),
                    None => info!("{}: {}", item.info.id, item.selection.format.format_id),
                }
            }
        }
        Resolution::Skipped(reason) => info!("{}", reason),
        Resolution::Playlist { title, entries, .. } => {
            info!(
                "[download] Finished playlist {}: {} entries",
                title.as_deref().unwrap_or("NA"),
                entries.len()
            );
            for entry in entries.iter().flatten() {
                report(entry);
            }
        }
    }
}

async fn run_swf(file: PathBuf, class: &str, method: &str, args: &[String]) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let interp = SwfInterpreter::new(&bytes)?;
    let func = interp.extract_function(class, method)?;
    let args: Vec<Value> = args
        .iter()
        .map(|a| match a.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::str(a.as_str()),
        })
        .collect();
    println!("{}", func.call(&args)?);
    Ok(())
}
