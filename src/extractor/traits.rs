use crate::extractor::models::RawResult;
use crate::utils::config::Params;
use anyhow::Result;
use async_trait::async_trait;

/// Core trait for all site extractors
///
/// An extractor knows one site (or family of sites). It turns a URL into a
/// raw result: a single video, a pointer to another URL, or a playlist.
/// Errors should be `GrabError::Extractor` wrapped in `anyhow` so the
/// resolver can tell expected failures from bugs.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stable key, e.g. `"Youtube"`; also the prefix of archive lines
    fn ie_key(&self) -> &'static str;

    /// Human readable name shown in messages
    fn ie_name(&self) -> &'static str {
        self.ie_key()
    }

    /// Whether this extractor claims the URL
    fn suitable(&self, url: &str) -> bool;

    /// `false` for extractors known to be broken; they still run, with a warning
    fn working(&self) -> bool {
        true
    }

    /// Video id computable from the URL alone, without network access
    fn extract_id(&self, _url: &str) -> Option<String> {
        None
    }

    async fn extract(&self, url: &str, params: &Params) -> Result<RawResult>;
}
