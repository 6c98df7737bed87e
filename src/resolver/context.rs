use std::collections::HashSet;

/// State shared by one top-level resolution and everything it recurses into
///
/// Tracks the playlists currently being expanded so that a playlist which
/// (directly or through its descendants) contains itself is not expanded
/// again. The set empties when the outermost playlist finishes.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    in_progress: HashSet<String>,
    depth: usize,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self, webpage_url: &str) -> bool {
        self.in_progress.contains(webpage_url)
    }

    /// Start expanding a playlist. Every call must be paired with
    /// [`leave_playlist`](Self::leave_playlist).
    pub fn enter_playlist(&mut self, webpage_url: Option<&str>) {
        self.depth += 1;
        if let Some(url) = webpage_url {
            self.in_progress.insert(url.to_string());
        }
    }

    pub fn leave_playlist(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.in_progress.clear();
        }
    }

    /// Number of playlists currently being expanded
    pub fn depth(&self) -> usize {
        self.depth
    }
}
