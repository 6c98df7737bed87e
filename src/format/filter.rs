//! Bracketed format filters such as `[height<=720]` or `[format_id!^=dash?]`

use crate::extractor::Format;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl NumericOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "<" => NumericOp::Lt,
            "<=" => NumericOp::Le,
            ">" => NumericOp::Gt,
            ">=" => NumericOp::Ge,
            "=" => NumericOp::Eq,
            "!=" => NumericOp::Ne,
            _ => return None,
        })
    }

    pub fn apply(&self, actual: f64, expected: f64) -> bool {
        match self {
            NumericOp::Lt => actual < expected,
            NumericOp::Le => actual <= expected,
            NumericOp::Gt => actual > expected,
            NumericOp::Ge => actual >= expected,
            NumericOp::Eq => actual == expected,
            NumericOp::Ne => actual != expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
}

impl StrOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "=" => StrOp::Equals,
            "^=" => StrOp::StartsWith,
            "$=" => StrOp::EndsWith,
            "*=" => StrOp::Contains,
            _ => return None,
        })
    }

    pub fn apply(&self, actual: &str, expected: &str) -> bool {
        match self {
            StrOp::Equals => actual == expected,
            StrOp::StartsWith => actual.starts_with(expected),
            StrOp::EndsWith => actual.ends_with(expected),
            StrOp::Contains => actual.contains(expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Numeric(NumericOp, f64),
    Text {
        op: StrOp,
        negated: bool,
        value: String,
    },
}

/// A compiled `[key op value]` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FormatFilter {
    pub key: String,
    pub comparison: Comparison,
    /// `?` suffix: a format lacking the field passes instead of being excluded
    pub none_inclusive: bool,
}

fn numeric_filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<key>width|height|tbr|abr|vbr|asr|filesize|filesize_approx|fps)\s*(?P<op><=|>=|!=|<|>|=)(?P<none_inclusive>\s*\?)?\s*(?P<value>[0-9.]+(?:[kKmMgGtTpPeEzZyY]i?[Bb]?)?)\s*$",
        )
        .expect("numeric filter regex")
    })
}

fn string_filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<key>ext|acodec|vcodec|container|protocol|format_id|language)\s*(?P<negation>!\s*)?(?P<op>\^=|\$=|\*=|=)(?P<none_inclusive>\s*\?)?\s*(?P<value>[a-zA-Z0-9._-]+)\s*$",
        )
        .expect("string filter regex")
    })
}

impl FormatFilter {
    /// Parse the text between the brackets. The error is a short note for the
    /// caller's syntax error message.
    pub fn parse(spec: &str) -> Result<Self, String> {
        if let Some(caps) = numeric_filter_re().captures(spec) {
            let raw = &caps["value"];
            let value = parse_comparison_number(raw)
                .ok_or_else(|| format!("Invalid value {:?} in filter {:?}", raw, spec))?;
            let op = NumericOp::parse(&caps["op"])
                .ok_or_else(|| format!("Operator not recognized in filter {:?}", spec))?;
            return Ok(Self {
                key: caps["key"].to_string(),
                comparison: Comparison::Numeric(op, value),
                none_inclusive: caps.name("none_inclusive").is_some(),
            });
        }

        if let Some(caps) = string_filter_re().captures(spec) {
            let op = StrOp::parse(&caps["op"])
                .ok_or_else(|| format!("Operator not recognized in filter {:?}", spec))?;
            return Ok(Self {
                key: caps["key"].to_string(),
                comparison: Comparison::Text {
                    op,
                    negated: caps.name("negation").is_some(),
                    value: caps["value"].to_string(),
                },
                none_inclusive: caps.name("none_inclusive").is_some(),
            });
        }

        Err(format!("Invalid filter specification {:?}", spec))
    }

    pub fn matches(&self, format: &Format) -> bool {
        match &self.comparison {
            Comparison::Numeric(op, expected) => match format.numeric_field(&self.key) {
                Some(actual) => op.apply(actual, *expected),
                None => self.none_inclusive,
            },
            Comparison::Text { op, negated, value } => match format.string_field(&self.key) {
                Some(actual) => op.apply(actual, value) != *negated,
                None => self.none_inclusive,
            },
        }
    }
}

/// Plain integers first, then a size with a unit (`500k` reads as `500kB`)
fn parse_comparison_number(raw: &str) -> Option<f64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v as f64);
    }
    parse_filesize(raw).or_else(|| parse_filesize(&format!("{}B", raw)))
}

/// Multiplier for a size unit. Lower-case prefixes with `B` are the
/// unofficial binary forms (`kB` = 1024) still seen in the wild.
fn unit_multiplier(unit: &str) -> Option<f64> {
    const PREFIXES: &[(&str, i32)] = &[
        ("k", 1),
        ("m", 2),
        ("g", 3),
        ("t", 4),
        ("p", 5),
        ("e", 6),
        ("z", 7),
        ("y", 8),
    ];
    const WORDS: &[(&str, &str)] = &[
        ("kilo", "kibi"),
        ("mega", "mebi"),
        ("giga", "gibi"),
        ("tera", "tebi"),
        ("peta", "pebi"),
        ("exa", "exbi"),
        ("zetta", "zebi"),
        ("yotta", "yobi"),
    ];

    if matches!(unit, "B" | "b" | "bytes") {
        return Some(1.0);
    }
    for (exp, (decimal, binary)) in WORDS.iter().enumerate() {
        let exp = exp as i32 + 1;
        if unit == format!("{}bytes", decimal) {
            return Some(1000f64.powi(exp));
        }
        if unit == format!("{}bytes", binary) {
            return Some(1024f64.powi(exp));
        }
    }

    let mut chars = unit.chars();
    let prefix = chars.next()?;
    let rest: String = chars.collect();
    let exp = PREFIXES
        .iter()
        .find(|(p, _)| p.eq_ignore_ascii_case(&prefix.to_string()))
        .map(|(_, e)| *e)?;
    let upper = prefix.is_ascii_uppercase();
    match rest.as_str() {
        "iB" => Some(1024f64.powi(exp)),
        "B" if upper => Some(1000f64.powi(exp)),
        "B" => Some(1024f64.powi(exp)),
        "b" => Some(1000f64.powi(exp)),
        _ => None,
    }
}

/// Parse strings like `1.5MiB`, `700 kB` or `2,5GB` into a byte count
pub fn parse_filesize(s: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<num>[0-9]+(?:[,.][0-9]*)?)\s*(?P<unit>[A-Za-z]+)\s*$")
            .expect("filesize regex")
    });
    let caps = re.captures(s)?;
    let num: f64 = caps["num"].replace(',', ".").parse().ok()?;
    let mult = unit_multiplier(&caps["unit"])?;
    Some((num * mult).trunc())
}
