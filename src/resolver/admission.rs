//! Entry admission: title, date, view, age, archive and user filters

use crate::format::parse_filesize;
use crate::extractor::models::RawDict;
use crate::utils::config::Params;
use crate::utils::date::DateRange;
use crate::utils::error::{GrabError, Result};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// User predicate over a fully resolved item; `Some(reason)` rejects it
pub type MatchFilterFn = Arc<dyn Fn(&RawDict) -> Option<String> + Send + Sync>;

/// Title used in messages: `title`, else `id`, else `"video"`
pub fn display_title(info: &RawDict) -> String {
    match info.get("title").or_else(|| info.get("id")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "video".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Integer view of a loosely typed field
fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether content rated `content_limit` is off limits for a viewer limit of
/// `age_limit`
pub fn age_restricted(content_limit: Option<i64>, age_limit: Option<i64>) -> bool {
    match (content_limit, age_limit) {
        (Some(content), Some(limit)) => limit < content,
        _ => false,
    }
}

/// Policy checks applied to playlist entries and to resolved items
#[derive(Clone, Default)]
pub struct AdmissionPolicy {
    matchtitle: Option<Regex>,
    rejecttitle: Option<Regex>,
    date_range: Option<DateRange>,
    min_views: Option<i64>,
    max_views: Option<i64>,
    age_limit: Option<i64>,
    match_filter: Option<MatchFilterFn>,
}

impl fmt::Debug for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPolicy")
            .field("matchtitle", &self.matchtitle.as_ref().map(Regex::as_str))
            .field("rejecttitle", &self.rejecttitle.as_ref().map(Regex::as_str))
            .field("date_range", &self.date_range)
            .field("min_views", &self.min_views)
            .field("max_views", &self.max_views)
            .field("age_limit", &self.age_limit)
            .field("match_filter", &self.match_filter.is_some())
            .finish()
    }
}

fn title_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| GrabError::InvalidConfig(format!("invalid title pattern {:?}: {}", pattern, e)))
}

impl AdmissionPolicy {
    pub fn from_params(params: &Params) -> Result<Self> {
        let match_filter = match &params.match_filter {
            Some(expr) => Some(match_filter_from_str(expr)?),
            None => None,
        };
        Ok(Self {
            matchtitle: params.matchtitle.as_deref().map(title_regex).transpose()?,
            rejecttitle: params.rejecttitle.as_deref().map(title_regex).transpose()?,
            date_range: params.date_range()?,
            min_views: params.min_views,
            max_views: params.max_views,
            age_limit: params.age_limit,
            match_filter,
        })
    }

    /// Replace the user predicate
    pub fn with_match_filter(mut self, filter: MatchFilterFn) -> Self {
        self.match_filter = Some(filter);
        self
    }

    /// `None` admits the item, otherwise the reason it is skipped.
    ///
    /// `incomplete` marks a playlist entry that has not been resolved yet;
    /// the user predicate only runs on complete items. `in_archive` is the
    /// caller's archive lookup for this item.
    pub fn check(&self, info: &RawDict, incomplete: bool, in_archive: bool) -> Option<String> {
        let video_title = display_title(info);

        if let Some(Value::String(title)) = info.get("title") {
            if let Some(re) = &self.matchtitle {
                if !re.is_match(title) {
                    return Some(format!(
                        "\"{}\" title did not match pattern \"{}\"",
                        title,
                        re.as_str()
                    ));
                }
            }
            if let Some(re) = &self.rejecttitle {
                if re.is_match(title) {
                    return Some(format!(
                        "\"{}\" title matched reject pattern \"{}\"",
                        title,
                        re.as_str()
                    ));
                }
            }
        }

        if let (Some(range), Some(Value::String(date))) = (&self.date_range, info.get("upload_date")) {
            match range.contains_str(date) {
                Ok(true) => {}
                Ok(false) => {
                    return Some(format!(
                        "{} upload date is not in range {}",
                        date, range
                    ))
                }
                Err(_) => warn!("{}: unparsable upload date {:?}, not filtering on it", video_title, date),
            }
        }

        if let Some(views) = as_int(info.get("view_count")) {
            if let Some(min) = self.min_views {
                if views < min {
                    return Some(format!(
                        "Skipping {}, because it has not reached minimum view count ({}/{})",
                        video_title, views, min
                    ));
                }
            }
            if let Some(max) = self.max_views {
                if views > max {
                    return Some(format!(
                        "Skipping {}, because it has exceeded the maximum view count ({}/{})",
                        video_title, views, max
                    ));
                }
            }
        }

        if age_restricted(as_int(info.get("age_limit")), self.age_limit) {
            return Some(format!("Skipping \"{}\" because it is age restricted", video_title));
        }

        if in_archive {
            return Some(format!("{} has already been recorded in archive", video_title));
        }

        if !incomplete {
            if let Some(filter) = &self.match_filter {
                if let Some(reason) = filter(info) {
                    return Some(reason);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            "=" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            _ => return None,
        })
    }

    fn is_equality(&self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    fn compare(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Lt => ordering == Less,
            CmpOp::Le => ordering != Greater,
            CmpOp::Gt => ordering == Greater,
            CmpOp::Ge => ordering != Less,
            CmpOp::Eq => ordering == Equal,
            CmpOp::Ne => ordering != Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    /// Numeric literal; `raw` is kept for comparing against string fields
    Number { raw: String, value: f64 },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Compare {
        key: String,
        op: CmpOp,
        none_inclusive: bool,
        literal: Literal,
    },
    Presence {
        key: String,
        negated: bool,
    },
}

impl Clause {
    fn parse(part: &str) -> Result<Self> {
        static COMPARISON: OnceLock<Regex> = OnceLock::new();
        static UNARY: OnceLock<Regex> = OnceLock::new();
        let comparison = COMPARISON.get_or_init(|| {
            Regex::new(
                r#"^\s*(?P<key>[a-z_]+)\s*(?P<op><=|>=|!=|<|>|=)(?P<none_inclusive>\s*\?)?\s*(?:(?P<intval>[0-9.]+(?:[kKmMgGtTpPeEzZyY]i?[Bb]?)?)|"(?P<dq>(?:\\.|[^"\\])+)"|'(?P<sq>(?:\\.|[^'\\])+)'|(?P<strval>[a-zA-Z][a-zA-Z0-9]*))\s*$"#,
            )
            .expect("match filter regex")
        });
        let unary = UNARY.get_or_init(|| {
            Regex::new(r"^\s*(?P<op>!?)\s*(?P<key>[a-z_]+)\s*$").expect("unary filter regex")
        });

        let invalid = || GrabError::InvalidFilter(part.trim().to_string());

        if let Some(caps) = comparison.captures(part) {
            let op = CmpOp::parse(&caps["op"]).ok_or_else(invalid)?;
            let literal = if let Some(raw) = caps.name("intval") {
                let raw = raw.as_str();
                let value = raw
                    .parse::<i64>()
                    .ok()
                    .map(|v| v as f64)
                    .or_else(|| parse_filesize(raw))
                    .or_else(|| parse_filesize(&format!("{}B", raw)))
                    .ok_or_else(invalid)?;
                Literal::Number {
                    raw: raw.to_string(),
                    value,
                }
            } else if let Some(quoted) = caps.name("dq") {
                Literal::Text(quoted.as_str().replace("\\\"", "\""))
            } else if let Some(quoted) = caps.name("sq") {
                Literal::Text(quoted.as_str().replace("\\'", "'"))
            } else {
                Literal::Text(caps["strval"].to_string())
            };
            if matches!(literal, Literal::Text(_)) && !op.is_equality() {
                return Err(GrabError::InvalidFilter(format!(
                    "Operator {} does not support string values: {}",
                    &caps["op"],
                    part.trim()
                )));
            }
            return Ok(Clause::Compare {
                key: caps["key"].to_string(),
                op,
                none_inclusive: caps.name("none_inclusive").is_some(),
                literal,
            });
        }

        if let Some(caps) = unary.captures(part) {
            return Ok(Clause::Presence {
                key: caps["key"].to_string(),
                negated: &caps["op"] == "!",
            });
        }
        Err(invalid())
    }

    fn matches(&self, info: &RawDict) -> bool {
        match self {
            Clause::Presence { key, negated } => {
                let present = match info.get(key) {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::Null) | None => false,
                    Some(_) => true,
                };
                present != *negated
            }
            Clause::Compare {
                key,
                op,
                none_inclusive,
                literal,
            } => {
                let actual = match info.get(key) {
                    Some(Value::Null) | None => return *none_inclusive,
                    Some(value) => value,
                };
                match (literal, actual) {
                    (Literal::Text(expected), _) | (Literal::Number { raw: expected, .. }, Value::String(_)) => {
                        if !op.is_equality() {
                            return false;
                        }
                        let equal = actual.as_str() == Some(expected.as_str());
                        equal == (*op == CmpOp::Eq)
                    }
                    (Literal::Number { value, .. }, actual) => {
                        let actual = match actual {
                            Value::Number(n) => n.as_f64(),
                            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                            _ => None,
                        };
                        match actual.and_then(|a| a.partial_cmp(value)) {
                            Some(ordering) => op.compare(ordering),
                            None => false,
                        }
                    }
                }
            }
        }
    }
}

/// Compiled `&`-separated filter expression, e.g.
/// `like_count > 100 & dislike_count <? 50 & !is_live`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFilter {
    expr: String,
    clauses: Vec<Clause>,
}

/// Split on `&` unless escaped as `\&`
fn split_clauses(expr: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'&') => {
                chars.next();
                if let Some(last) = parts.last_mut() {
                    last.push('&');
                }
            }
            '&' => parts.push(String::new()),
            c => {
                if let Some(last) = parts.last_mut() {
                    last.push(c);
                }
            }
        }
    }
    parts
}

impl MatchFilter {
    pub fn parse(expr: &str) -> Result<Self> {
        let clauses = split_clauses(expr)
            .iter()
            .map(|part| Clause::parse(part))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            expr: expr.to_string(),
            clauses,
        })
    }

    pub fn matches(&self, info: &RawDict) -> bool {
        self.clauses.iter().all(|c| c.matches(info))
    }

    /// `None` when the item passes, else the skip message
    pub fn check(&self, info: &RawDict) -> Option<String> {
        if self.matches(info) {
            None
        } else {
            Some(format!(
                "{} does not pass filter {}, skipping ..",
                display_title(info),
                self.expr
            ))
        }
    }
}

/// Predicate built from a textual filter expression
pub fn match_filter_from_str(expr: &str) -> Result<MatchFilterFn> {
    let filter = MatchFilter::parse(expr)?;
    Ok(Arc::new(move |info: &RawDict| filter.check(info)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dict(value: Value) -> RawDict {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_title_patterns_are_case_insensitive_searches() {
        let policy = AdmissionPolicy::from_params(&Params {
            matchtitle: Some("cat".into()),
            rejecttitle: Some("^bad".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(policy.check(&dict(json!({"title": "Funny CATS"})), true, false), None);
        assert!(policy
            .check(&dict(json!({"title": "dogs"})), true, false)
            .unwrap()
            .contains("did not match pattern"));
        assert!(policy
            .check(&dict(json!({"title": "Bad cat"})), true, false)
            .unwrap()
            .contains("matched reject pattern"));
    }

    #[test]
    fn test_check_order_and_messages() {
        let policy = AdmissionPolicy::from_params(&Params {
            dateafter: Some("20200101".into()),
            datebefore: Some("20201231".into()),
            min_views: Some(10),
            max_views: Some(100),
            age_limit: Some(13),
            ..Default::default()
        })
        .unwrap();

        let old = dict(json!({"title": "t", "upload_date": "20191231", "view_count": 1}));
        assert_eq!(
            policy.check(&old, true, false).unwrap(),
            "20191231 upload date is not in range 20200101 - 20201231"
        );

        let unpopular = dict(json!({"title": "t", "view_count": 1}));
        assert!(policy.check(&unpopular, true, false).unwrap().contains("(1/10)"));

        let viral = dict(json!({"title": "t", "view_count": "1000"}));
        assert!(policy.check(&viral, true, false).unwrap().contains("(1000/100)"));

        let bad_date = dict(json!({"title": "t", "upload_date": "someday"}));
        assert_eq!(policy.check(&bad_date, true, false), None);

        let unknown_views = dict(json!({"title": "t"}));
        assert_eq!(policy.check(&unknown_views, true, false), None);

        let adult = dict(json!({"title": "t", "age_limit": 18}));
        assert!(policy.check(&adult, true, false).unwrap().contains("age restricted"));

        let archived = dict(json!({"title": "t", "age_limit": 13}));
        assert_eq!(
            policy.check(&archived, true, true).unwrap(),
            "t has already been recorded in archive"
        );
    }

    #[test]
    fn test_user_filter_only_on_complete_check() {
        let policy = AdmissionPolicy::default()
            .with_match_filter(Arc::new(|_: &RawDict| Some("nope".to_string())));
        let info = dict(json!({"id": "x"}));
        assert_eq!(policy.check(&info, true, false), None);
        assert_eq!(policy.check(&info, false, false).as_deref(), Some("nope"));
    }

    #[test]
    fn test_age_restricted() {
        assert!(age_restricted(Some(18), Some(13)));
        assert!(!age_restricted(Some(13), Some(13)));
        assert!(!age_restricted(None, Some(0)));
        assert!(!age_restricted(Some(18), None));
    }

    #[test]
    fn test_match_filter_expressions() {
        let filter = MatchFilter::parse("like_count > 100 & dislike_count <? 50 & !is_live").unwrap();
        assert!(filter.matches(&dict(json!({"like_count": 190, "dislike_count": 10}))));
        assert!(filter.matches(&dict(json!({"like_count": 190, "is_live": false}))));
        assert!(!filter.matches(&dict(json!({"like_count": 190, "is_live": true}))));
        assert!(!filter.matches(&dict(json!({"like_count": 90, "dislike_count": 10}))));
        assert!(!filter.matches(&dict(json!({"dislike_count": 10}))));

        let filter = MatchFilter::parse("filesize > 1M & uploader = 'John \\'J\\' Doe'").unwrap();
        assert!(filter.matches(&dict(json!({"filesize": 2_000_000, "uploader": "John 'J' Doe"}))));
        assert!(!filter.matches(&dict(json!({"filesize": 2_000_000, "uploader": "Jane"}))));

        let filter = MatchFilter::parse("id = 123 & description").unwrap();
        assert!(filter.matches(&dict(json!({"id": "123", "description": "d"}))));
        assert!(!filter.matches(&dict(json!({"id": "123"}))));
    }

    #[test]
    fn test_match_filter_message_and_errors() {
        let check = match_filter_from_str("duration < 30").unwrap();
        assert_eq!(
            check(&dict(json!({"title": "Long", "duration": 60}))).unwrap(),
            "Long does not pass filter duration < 30, skipping .."
        );
        assert!(matches!(
            MatchFilter::parse("title > abc"),
            Err(GrabError::InvalidFilter(_))
        ));
        assert!(MatchFilter::parse("like_count >> 3").is_err());
    }
}
