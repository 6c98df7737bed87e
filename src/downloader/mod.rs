//! Download stage: byte transfer, output naming and post-processing

pub mod filename;
pub mod http;
pub mod postprocess;
pub mod sidecar;
pub mod traits;

// Re-export for convenience
pub use filename::{merged_part_name, prepare_filename, sanitize_filename};
pub use http::HttpDownloader;
pub use postprocess::{
    compatible_merge_exts, merger_available, run_chain, FfmpegMerger, FILES_TO_MERGE,
};
pub use traits::{Downloader, PostProcessor};
