//! Utility modules for error handling, configuration, dates and the archive

pub mod archive;
pub mod config;
pub mod date;
pub mod error;

// Re-export for convenience
pub use archive::{archive_key, DownloadArchive};
pub use config::Params;
pub use date::{date_from_str, timestamp_to_date, DateRange};
pub use error::{GrabError, Result};
