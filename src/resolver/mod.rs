//! Result resolution: turns raw extractor output into selected media items

pub mod admission;
pub mod context;
pub mod entries;
pub mod pipeline;
pub mod sanitize;

pub use admission::{match_filter_from_str, AdmissionPolicy, MatchFilter, MatchFilterFn};
pub use context::ResolutionContext;
pub use entries::{select_entries, PlaylistItems};
pub use pipeline::{ResolvedItem, Resolution, Resolver, ScreenFn};
pub use sanitize::sanitize_info;
