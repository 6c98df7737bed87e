//! Output template expansion

use crate::extractor::models::RawDict;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MISSING: &str = "NA";

/// Replace characters that are unsafe in file names
///
/// Ids keep their exact shape; other values also get runs of `_` collapsed
/// and leading dashes and dots neutralised.
pub fn sanitize_filename(s: &str, is_id: bool) -> String {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    let timestamp =
        TIMESTAMP.get_or_init(|| Regex::new(r"[0-9]+(?::[0-9]+)+").expect("timestamp regex"));
    let s = timestamp.replace_all(s, |caps: &Captures| caps[0].replace(':', "_"));

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '?' => {}
            c if (c as u32) < 32 || c as u32 == 127 => {}
            '"' => result.push('\''),
            ':' => result.push_str(" -"),
            '\\' | '/' | '|' | '*' | '<' | '>' => result.push('_'),
            c => result.push(c),
        }
    }

    if is_id {
        return result;
    }
    while result.contains("__") {
        result = result.replace("__", "_");
    }
    let mut result = result.trim_matches('_').to_string();
    if let Some(rest) = result.strip_prefix('-') {
        result = format!("_{}", rest);
    }
    let result = result.trim_start_matches('.').to_string();
    if result.is_empty() {
        "_".to_string()
    } else {
        result
    }
}

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%%|%\((?P<key>[^)]+)\)(?P<flags>[-0 #+]*)(?P<width>\d*)(?:\.(?P<prec>\d+))?(?P<conv>[sdif])")
            .expect("output template regex")
    })
}

fn render_value(key: &str, value: Option<&Value>, caps: &Captures) -> String {
    let flags = caps.name("flags").map_or("", |m| m.as_str());
    let width: usize = caps
        .name("width")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let conv = caps.name("conv").map_or("s", |m| m.as_str());

    let pad = |text: String, zero: bool| -> String {
        if text.len() >= width {
            text
        } else if flags.contains('-') {
            format!("{:<width$}", text, width = width)
        } else if zero {
            let (sign, digits) = match text.strip_prefix('-') {
                Some(rest) => ("-", rest.to_string()),
                None => ("", text.clone()),
            };
            format!("{}{:0>width$}", sign, digits, width = width - sign.len())
        } else {
            format!("{:>width$}", text, width = width)
        }
    };

    match value {
        Some(Value::Number(n)) if conv == "d" || conv == "i" => {
            let int = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .unwrap_or_default();
            pad(int.to_string(), flags.contains('0'))
        }
        Some(Value::Number(n)) if conv == "f" => {
            let precision: usize = caps
                .name("prec")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(6);
            let f = n.as_f64().unwrap_or_default();
            pad(format!("{:.*}", precision, f), flags.contains('0'))
        }
        Some(Value::Number(n)) => pad(n.to_string(), false),
        Some(Value::String(s)) => {
            let is_id = key == "id" || key.ends_with("_id");
            pad(sanitize_filename(s, is_id), false)
        }
        Some(Value::Bool(b)) => pad(if *b { "True" } else { "False" }.to_string(), false),
        _ => pad(MISSING.to_string(), false),
    }
}

/// Expand `%(field)s`, `%(field)d`, `%(field)05d`, ... over the item's fields
///
/// Missing fields and lists or records render as `NA`. A bare
/// `%(playlist_index)s` is zero padded to five digits.
pub fn prepare_filename(template: &str, fields: &RawDict) -> PathBuf {
    let expanded = template_re().replace_all(template, |caps: &Captures| {
        let Some(key) = caps.name("key").map(|m| m.as_str()) else {
            return "%".to_string();
        };
        let value = fields
            .get(key)
            .filter(|v| !matches!(v, Value::Null | Value::Array(_) | Value::Object(_)));

        if key == "playlist_index" && &caps["conv"] == "s" {
            if let Some(Value::Number(n)) = value {
                if let Some(index) = n.as_i64() {
                    return format!("{:05}", index);
                }
            }
        }
        render_value(key, value, caps)
    });
    PathBuf::from(expanded.into_owned())
}

/// Name for one half of a merged selection: `<name>.f<format_id>.<ext>`
pub fn merged_part_name(filename: &Path, format_id: &str, ext: &str) -> PathBuf {
    let stem = filename.with_extension("");
    let mut name = stem.into_os_string();
    name.push(format!(".f{}.{}", format_id, ext));
    PathBuf::from(name)
}

/// `filename` with its extension swapped for `ext`
pub fn replace_extension(filename: &Path, ext: &str) -> PathBuf {
    filename.with_extension(ext)
}
