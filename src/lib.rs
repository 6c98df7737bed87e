//! rustgrab library
//!
//! Resolves media URLs into concrete, downloadable streams: extractor
//! results are normalised, filtered, expanded through playlists and matched
//! against a format-selection expression before the download stage runs.

pub mod downloader;
pub mod extractor;
pub mod format;
pub mod resolver;
pub mod swf;
pub mod utils;

// Re-export main types for easier use
pub use extractor::{Extractor, ExtractorRegistry, Format, RawResult, VideoInfo};
pub use format::{FormatSelector, Selection};
pub use resolver::{Resolution, ResolvedItem, Resolver};
pub use swf::SwfInterpreter;
pub use utils::{GrabError, Params};
