use crate::extractor::direct::DirectUrlExtractor;
use crate::extractor::traits::Extractor;
use std::sync::Arc;
use tracing::debug;

/// Ordered list of extractors
///
/// URLs are routed to the first extractor whose `suitable(url)` holds, so
/// more specific extractors must be registered before generic ones.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Registry holding only the built-in extractors
    pub fn with_defaults() -> Self {
        Self::new(vec![Arc::new(DirectUrlExtractor)])
    }

    /// Register ahead of everything already present
    pub fn register_first(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(0, extractor);
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// First extractor claiming the URL
    pub fn find(&self, url: &str) -> Option<&Arc<dyn Extractor>> {
        let found = self.extractors.iter().find(|ie| ie.suitable(url));
        if let Some(ie) = found {
            debug!("Routing {} to extractor: {}", url, ie.ie_key());
        }
        found
    }

    /// Extractor registered under `ie_key`
    pub fn get(&self, ie_key: &str) -> Option<&Arc<dyn Extractor>> {
        self.extractors.iter().find(|ie| ie.ie_key() == ie_key)
    }

    /// Extractors to try for a URL: only the hinted one when a key is given
    pub fn candidates(&self, ie_key: Option<&str>) -> Vec<&Arc<dyn Extractor>> {
        match ie_key {
            Some(key) => self.get(key).into_iter().collect(),
            None => self.extractors.iter().collect(),
        }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|ie| ie.ie_key()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::models::RawResult;
    use crate::utils::config::Params;
    use async_trait::async_trait;

    struct Prefix(&'static str, &'static str);

    #[async_trait]
    impl Extractor for Prefix {
        fn ie_key(&self) -> &'static str {
            self.0
        }

        fn suitable(&self, url: &str) -> bool {
            url.starts_with(self.1)
        }

        async fn extract(&self, url: &str, _params: &Params) -> anyhow::Result<RawResult> {
            Ok(RawResult::url(url, None))
        }
    }

    #[test]
    fn test_first_suitable_wins() {
        let mut registry = ExtractorRegistry::new(vec![
            Arc::new(Prefix("Broad", "https://")),
            Arc::new(Prefix("Narrow", "https://site.test/")),
        ]);
        assert_eq!(
            registry.find("https://site.test/v/1").map(|ie| ie.ie_key()),
            Some("Broad")
        );
        registry.register_first(Arc::new(Prefix("Narrower", "https://site.test/v/")));
        assert_eq!(
            registry.find("https://site.test/v/1").map(|ie| ie.ie_key()),
            Some("Narrower")
        );
        assert!(registry.find("ftp://x").is_none());
    }

    #[test]
    fn test_key_hint_restricts_candidates() {
        let registry = ExtractorRegistry::new(vec![
            Arc::new(Prefix("A", "a:")),
            Arc::new(Prefix("B", "b:")),
        ]);
        let hinted: Vec<_> = registry
            .candidates(Some("B"))
            .iter()
            .map(|ie| ie.ie_key())
            .collect();
        assert_eq!(hinted, vec!["B"]);
        assert!(registry.candidates(Some("C")).is_empty());
        assert_eq!(registry.candidates(None).len(), 2);
    }

    #[test]
    fn test_defaults_include_direct_links() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.keys(), vec!["Generic"]);
        assert!(registry.find("https://cdn.test/clip.mp4").is_some());
    }
}
