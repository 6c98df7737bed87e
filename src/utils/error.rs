//! Error handling for rustgrab

use crate::swf::SwfError;
use thiserror::Error;

/// Result alias used across the resolution core
pub type Result<T> = std::result::Result<T, GrabError>;

/// Main error type for rustgrab
#[derive(Debug, Error)]
pub enum GrabError {
    /// A format expression could not be parsed. `position` is the character
    /// offset the caret points at.
    #[error("Invalid format specification: {note}\n\t{spec}\n\t{}^", caret_padding(.position))]
    FormatSyntax {
        note: String,
        spec: String,
        position: usize,
    },

    #[error("Invalid filter specification {0:?}")]
    InvalidFilter(String),

    #[error("requested format not available")]
    FormatNotAvailable,

    #[error("{0}")]
    MergeIncompatible(String),

    #[error("{message}")]
    Extractor {
        message: String,
        /// Known limitation rather than a possible bug
        expected: bool,
    },

    #[error("no suitable extractor for URL {0}")]
    NoSuitableExtractor(String),

    #[error("Maximum number of downloaded files reached")]
    MaxDownloadsReached,

    #[error("Invalid result type: {0}")]
    InvalidResultType(String),

    #[error("Invalid playlist items specification: {0}")]
    InvalidPlaylistItems(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bytecode error: {0}")]
    Swf(#[from] SwfError),
}

fn caret_padding(position: &usize) -> String {
    " ".repeat(*position)
}

impl GrabError {
    /// An extractor error for a condition the extractor knows about
    pub fn expected(message: impl Into<String>) -> Self {
        GrabError::Extractor {
            message: message.into(),
            expected: true,
        }
    }

    /// An extractor error that may indicate a bug
    pub fn unexpected(message: impl Into<String>) -> Self {
        GrabError::Extractor {
            message: message.into(),
            expected: false,
        }
    }

    /// Errors that must unwind the whole batch regardless of `ignoreerrors`
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GrabError::MaxDownloadsReached
                | GrabError::InvalidResultType(_)
                | GrabError::FormatSyntax { .. }
                | GrabError::InvalidFilter(_)
                | GrabError::MergeIncompatible(_)
        )
    }

    /// Recover a typed error from an `anyhow` error returned by a collaborator.
    ///
    /// Anything that is not already a `GrabError` is treated as an
    /// unexpected extractor failure.
    pub fn from_collaborator(err: anyhow::Error) -> Self {
        match err.downcast::<GrabError>() {
            Ok(grab) => grab,
            Err(other) => GrabError::unexpected(format!("{:#}", other)),
        }
    }
}
