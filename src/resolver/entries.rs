//! Playlist entry selection: `playlist_items` and start/end slicing

use crate::extractor::models::{Entries, RawResult};
use crate::utils::error::{GrabError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Parsed `playlist_items` value such as `"1-3,7,-1"`
///
/// Indices are 1-based; negative ones count from the end of the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItems {
    /// Inclusive `(start, end)` ranges in the order given
    segments: Vec<(i64, i64)>,
}

impl PlaylistItems {
    pub fn parse(spec: &str) -> Result<Self> {
        static SEGMENT: OnceLock<Regex> = OnceLock::new();
        let segment_re = SEGMENT.get_or_init(|| {
            Regex::new(r"^\s*(-?\d+)\s*(?:-\s*(-?\d+)\s*)?$").expect("playlist items regex")
        });

        let mut segments = Vec::new();
        for part in spec.split(',') {
            let caps = segment_re
                .captures(part)
                .ok_or_else(|| GrabError::InvalidPlaylistItems(spec.to_string()))?;
            let parse = |s: &str| {
                s.parse::<i64>()
                    .map_err(|_| GrabError::InvalidPlaylistItems(spec.to_string()))
            };
            let start = parse(&caps[1])?;
            let end = match caps.get(2) {
                Some(m) => parse(m.as_str())?,
                None => start,
            };
            segments.push((start, end));
        }
        Ok(Self { segments })
    }

    /// Largest index that can be reached without knowing the playlist length
    pub fn max_index(&self) -> Option<usize> {
        self.segments
            .iter()
            .flat_map(|&(s, e)| [s, e])
            .filter(|&i| i > 0)
            .max()
            .map(|i| i as usize)
    }

    pub fn has_negative(&self) -> bool {
        self.segments.iter().any(|&(s, e)| s < 0 || e < 0)
    }

    /// 1-based positions inside a playlist of `count` entries, first
    /// occurrence order, duplicates and out-of-range indices dropped
    pub fn resolve(&self, count: usize) -> Vec<usize> {
        let count_i = i64::try_from(count).unwrap_or(i64::MAX);
        let mut seen = HashSet::new();
        let mut positions = Vec::new();
        for &(start, end) in &self.segments {
            for i in start..=end {
                // Past the end of a known-length list nothing further can match
                if i > count_i {
                    break;
                }
                let position = if i < 0 { count_i + i + 1 } else { i };
                if position >= 1 && position <= count_i && seen.insert(position) {
                    positions.push(position as usize);
                }
            }
        }
        positions
    }
}

/// An entry kept for processing with the playlist index it is reported under
#[derive(Debug)]
pub struct SelectedEntry {
    pub index: usize,
    pub entry: RawResult,
}

/// Outcome of entry selection
#[derive(Debug)]
pub struct Selected {
    pub entries: Vec<SelectedEntry>,
    /// Length of the whole playlist, known only for plain lists
    pub n_all_entries: Option<usize>,
}

fn pick_positions(list: Vec<RawResult>, positions: &[usize]) -> Vec<SelectedEntry> {
    let mut slots: Vec<Option<RawResult>> = list.into_iter().map(Some).collect();
    positions
        .iter()
        .filter_map(|&p| {
            slots
                .get_mut(p - 1)
                .and_then(Option::take)
                .map(|entry| SelectedEntry { index: p, entry })
        })
        .collect()
}

fn number_from(start: usize, list: Vec<RawResult>) -> Vec<SelectedEntry> {
    list.into_iter()
        .enumerate()
        .map(|(i, entry)| SelectedEntry {
            index: start + i,
            entry,
        })
        .collect()
}

/// Apply `playlist_items`, or else the 1-based inclusive `[start, end]`
/// window, pulling from lazy sources only as far as needed
pub fn select_entries(
    entries: Entries,
    start: usize,
    end: Option<usize>,
    items: Option<&PlaylistItems>,
) -> Selected {
    let offset = start.saturating_sub(1);

    match entries {
        Entries::List(list) => {
            let n_all_entries = Some(list.len());
            let entries = match items {
                Some(items) => {
                    let positions = items.resolve(list.len());
                    pick_positions(list, &positions)
                }
                None => {
                    let stop = end.unwrap_or(list.len()).min(list.len());
                    let window: Vec<RawResult> = list
                        .into_iter()
                        .skip(offset)
                        .take(stop.saturating_sub(offset))
                        .collect();
                    number_from(offset + 1, window)
                }
            };
            Selected {
                entries,
                n_all_entries,
            }
        }
        Entries::Paged(paged) => {
            let entries = match items {
                Some(items) if items.has_negative() => {
                    let all = paged.slice(0, None);
                    let positions = items.resolve(all.len());
                    pick_positions(all, &positions)
                }
                Some(items) => items
                    .resolve(usize::MAX)
                    .into_iter()
                    .filter_map(|p| {
                        paged
                            .slice(p - 1, Some(p))
                            .into_iter()
                            .next()
                            .map(|entry| SelectedEntry { index: p, entry })
                    })
                    .collect(),
                None => number_from(offset + 1, paged.slice(offset, end)),
            };
            Selected {
                entries,
                n_all_entries: None,
            }
        }
        Entries::Lazy(iter) => {
            let entries = match items {
                Some(items) => {
                    let prefix: Vec<RawResult> = if items.has_negative() {
                        iter.collect()
                    } else {
                        iter.take(items.max_index().unwrap_or(0)).collect()
                    };
                    let positions = items.resolve(prefix.len());
                    pick_positions(prefix, &positions)
                }
                None => {
                    let window: Vec<RawResult> = match end {
                        Some(end) => iter.skip(offset).take(end.saturating_sub(offset)).collect(),
                        None => iter.skip(offset).collect(),
                    };
                    number_from(offset + 1, window)
                }
            };
            Selected {
                entries,
                n_all_entries: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::models::PagedList;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(i: usize) -> RawResult {
        RawResult::from_json(json!({"id": i.to_string(), "title": format!("v{}", i)})).unwrap()
    }

    fn list(n: usize) -> Entries {
        Entries::List((1..=n).map(entry).collect())
    }

    fn summary(selected: &Selected) -> Vec<(usize, String)> {
        selected
            .entries
            .iter()
            .map(|e| (e.index, e.entry.get_str("id").unwrap().to_string()))
            .collect()
    }

    #[test]
    fn test_parse_playlist_items() {
        let items = PlaylistItems::parse("1-3, 7,-1").unwrap();
        assert_eq!(items.max_index(), Some(7));
        assert!(items.has_negative());
        assert!(PlaylistItems::parse("1,,2").is_err());
        assert!(PlaylistItems::parse("a-b").is_err());
        assert!(PlaylistItems::parse("").is_err());
    }

    #[test]
    fn test_overlapping_ranges_are_idempotent() {
        let items = PlaylistItems::parse("2-4,3-4,3").unwrap();
        assert_eq!(items.resolve(4), vec![2, 3, 4]);
        let selected = select_entries(list(4), 1, None, Some(&items));
        assert_eq!(
            summary(&selected),
            vec![(2, "2".into()), (3, "3".into()), (4, "4".into())]
        );
    }

    #[test]
    fn test_negative_indices_wrap() {
        let items = PlaylistItems::parse("-1,1,5,0,-9").unwrap();
        assert_eq!(items.resolve(5), vec![5, 1]);
        let items = PlaylistItems::parse("-3--2").unwrap();
        assert_eq!(items.resolve(5), vec![3, 4]);
    }

    #[test]
    fn test_start_end_window() {
        let selected = select_entries(list(5), 2, Some(4), None);
        assert_eq!(
            summary(&selected),
            vec![(2, "2".into()), (3, "3".into()), (4, "4".into())]
        );
        assert_eq!(selected.n_all_entries, Some(5));

        let selected = select_entries(list(3), 5, None, None);
        assert!(selected.entries.is_empty());
    }

    struct Pages {
        calls: Arc<AtomicUsize>,
        len: usize,
    }

    impl PagedList for Pages {
        fn slice(&self, start: usize, end: Option<usize>) -> Vec<RawResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let end = end.unwrap_or(self.len).min(self.len);
            (start..end).map(|i| entry(i + 1)).collect()
        }
    }

    #[test]
    fn test_paged_items_fetch_single_slices() {
        let calls = Arc::new(AtomicUsize::new(0));
        let paged = Entries::Paged(Box::new(Pages {
            calls: calls.clone(),
            len: 10,
        }));
        let items = PlaylistItems::parse("3,12,9").unwrap();
        let selected = select_entries(paged, 1, None, Some(&items));
        assert_eq!(summary(&selected), vec![(3, "3".into()), (9, "9".into())]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_lazy_source_is_pulled_only_as_needed() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = (1..).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            entry(i)
        });
        let items = PlaylistItems::parse("2,4").unwrap();
        let selected = select_entries(Entries::Lazy(Box::new(source)), 1, None, Some(&items));
        assert_eq!(summary(&selected), vec![(2, "2".into()), (4, "4".into())]);
        assert_eq!(pulled.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_lazy_window() {
        let source = (1..).map(entry);
        let selected = select_entries(Entries::Lazy(Box::new(source)), 3, Some(4), None);
        assert_eq!(summary(&selected), vec![(3, "3".into()), (4, "4".into())]);
    }
}
