pub mod direct;
pub mod models;
pub mod registry;
pub mod traits;

pub use direct::DirectUrlExtractor;
pub use models::{
    add_extra_info, Entries, Format, PagedList, PlaylistProvenance, RawDict, RawResult,
    ResultType, ScopedCookies, SubtitleTrack, Thumbnail, VideoInfo,
};
pub use registry::ExtractorRegistry;
pub use traits::Extractor;
