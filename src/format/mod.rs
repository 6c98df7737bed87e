//! Format selection: the expression language used to pick streams

pub mod filter;
pub mod listing;
pub mod parser;
pub mod selector;
pub mod tokenizer;

pub use filter::{parse_filesize, FormatFilter};
pub use listing::format_table;
pub use parser::{parse, Selector, SelectorKind};
pub use selector::{incomplete_formats, FormatSelector, Selection};

/// Expression used when the user gave none.
///
/// Separate video and audio streams are only preferred when they can be
/// merged into the output afterwards.
pub fn default_format_spec(can_merge: bool, is_live: bool, to_stdout: bool) -> &'static str {
    if can_merge && !is_live && !to_stdout {
        "bestvideo+bestaudio/best"
    } else {
        "best/bestvideo+bestaudio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_spec() {
        assert_eq!(default_format_spec(true, false, false), "bestvideo+bestaudio/best");
        assert_eq!(default_format_spec(false, false, false), "best/bestvideo+bestaudio");
        assert_eq!(default_format_spec(true, true, false), "best/bestvideo+bestaudio");
        assert_eq!(default_format_spec(true, false, true), "best/bestvideo+bestaudio");
    }
}
