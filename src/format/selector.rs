//! Evaluation of compiled format expressions against a stream catalogue

use super::parser::{parse, Selector, SelectorKind};
use crate::extractor::Format;
use crate::utils::error::{GrabError, Result};
use tracing::debug;

/// Tokens naming a container rather than a format id
const EXTENSIONS: &[&str] = &["mp4", "flv", "webm", "3gp", "m4a", "mp3", "ogg", "aac", "wav"];

/// One chosen stream. For merges `format` is the synthesized descriptor and
/// `requested_formats` holds the video and audio halves in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub format: Format,
    pub requested_formats: Vec<Format>,
}

impl Selection {
    fn single(format: &Format) -> Self {
        Self {
            format: format.clone(),
            requested_formats: Vec::new(),
        }
    }

    pub fn is_merged(&self) -> bool {
        !self.requested_formats.is_empty()
    }
}

/// True when the catalogue never offers a muxed stream: everything is video
/// only, or everything is audio only
pub fn incomplete_formats(formats: &[Format]) -> bool {
    formats.iter().all(|f| f.has_video() && !f.has_audio())
        || formats.iter().all(|f| !f.has_video() && f.has_audio())
}

struct EvalContext<'a> {
    incomplete: bool,
    merge_output_format: Option<&'a str>,
}

/// A compiled format expression, reusable across any number of catalogues
#[derive(Debug, Clone)]
pub struct FormatSelector {
    spec: String,
    selectors: Vec<Selector>,
}

impl FormatSelector {
    pub fn compile(spec: &str) -> Result<Self> {
        let selectors = parse(spec)?;
        debug!("Compiled format expression {:?}", spec);
        Ok(Self {
            spec: spec.to_string(),
            selectors,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Every selection the expression produces, possibly none
    pub fn evaluate(
        &self,
        formats: &[Format],
        merge_output_format: Option<&str>,
    ) -> Result<Vec<Selection>> {
        let ctx = EvalContext {
            incomplete: incomplete_formats(formats),
            merge_output_format,
        };
        evaluate_list(&self.selectors, formats, &ctx)
    }

    /// Like [`evaluate`](Self::evaluate) but an empty outcome is
    /// `FormatNotAvailable`
    pub fn select(
        &self,
        formats: &[Format],
        merge_output_format: Option<&str>,
    ) -> Result<Vec<Selection>> {
        let chosen = self.evaluate(formats, merge_output_format)?;
        if chosen.is_empty() {
            return Err(GrabError::FormatNotAvailable);
        }
        Ok(chosen)
    }
}

fn evaluate_list(
    selectors: &[Selector],
    formats: &[Format],
    ctx: &EvalContext<'_>,
) -> Result<Vec<Selection>> {
    let mut out = Vec::new();
    for selector in selectors {
        out.extend(evaluate(selector, formats, ctx)?);
    }
    Ok(out)
}

fn evaluate(selector: &Selector, formats: &[Format], ctx: &EvalContext<'_>) -> Result<Vec<Selection>> {
    let narrowed: Vec<Format>;
    let visible: &[Format] = if selector.filters.is_empty() {
        formats
    } else {
        narrowed = formats
            .iter()
            .filter(|f| selector.filters.iter().all(|filter| filter.matches(f)))
            .cloned()
            .collect();
        &narrowed
    };

    match &selector.kind {
        SelectorKind::Single(token) => Ok(pick_single(token, visible, ctx)),
        SelectorKind::PickFirst(left, right) => {
            let first = evaluate(left, visible, ctx)?;
            if !first.is_empty() {
                return Ok(first);
            }
            evaluate(right, visible, ctx)
        }
        SelectorKind::Group(inner) => evaluate_list(inner, visible, ctx),
        SelectorKind::Merge(video, audio) => {
            let videos = evaluate(video, visible, ctx)?;
            let audios = evaluate(audio, visible, ctx)?;
            let mut out = Vec::with_capacity(videos.len() * audios.len());
            for v in &videos {
                for a in &audios {
                    out.push(merge(v, a, ctx.merge_output_format)?);
                }
            }
            Ok(out)
        }
    }
}

fn pick_single(token: &str, formats: &[Format], ctx: &EvalContext<'_>) -> Vec<Selection> {
    let extreme = |candidates: Vec<&Format>, best: bool| -> Vec<Selection> {
        let chosen = if best {
            candidates.last()
        } else {
            candidates.first()
        };
        chosen.map(|f| vec![Selection::single(f)]).unwrap_or_default()
    };

    match token {
        "best" | "worst" => {
            let best = token == "best";
            let complete: Vec<&Format> = formats
                .iter()
                .filter(|f| f.has_video() && f.has_audio())
                .collect();
            if !complete.is_empty() {
                extreme(complete, best)
            } else if ctx.incomplete {
                extreme(formats.iter().collect(), best)
            } else {
                Vec::new()
            }
        }
        "bestaudio" | "worstaudio" => extreme(
            formats.iter().filter(|f| !f.has_video()).collect(),
            token == "bestaudio",
        ),
        "bestvideo" | "worstvideo" => extreme(
            formats.iter().filter(|f| !f.has_audio()).collect(),
            token == "bestvideo",
        ),
        "all" => formats.iter().map(Selection::single).collect(),
        ext if EXTENSIONS.contains(&ext) => extreme(
            formats.iter().filter(|f| f.ext == ext).collect(),
            true,
        ),
        format_id => extreme(
            formats.iter().filter(|f| f.format_id == format_id).collect(),
            true,
        ),
    }
}

fn merge(video: &Selection, audio: &Selection, merge_output_format: Option<&str>) -> Result<Selection> {
    if video.is_merged() || audio.is_merged() {
        return Err(GrabError::MergeIncompatible(format!(
            "Cannot merge the already merged selection {}",
            if video.is_merged() {
                &video.format.format_id
            } else {
                &audio.format.format_id
            }
        )));
    }
    let v = &video.format;
    let a = &audio.format;
    if !v.has_video() {
        return Err(GrabError::MergeIncompatible(format!(
            "The first format must contain the video, try using \"-f {}+{}\"",
            a.format_id, v.format_id
        )));
    }
    if !v.has_audio() && !a.has_audio() {
        return Err(GrabError::MergeIncompatible(format!(
            "Both formats {} and {} are video-only, you must specify \"-f video+audio\"",
            v.format_id, a.format_id
        )));
    }

    let describe = |f: &Format| f.format.clone().unwrap_or_else(|| f.format_id.clone());
    let merged = Format {
        format_id: format!("{}+{}", v.format_id, a.format_id),
        format: Some(format!("{}+{}", describe(v), describe(a))),
        ext: merge_output_format
            .map(str::to_string)
            .unwrap_or_else(|| v.ext.clone()),
        width: v.width,
        height: v.height,
        resolution: v.resolution.clone(),
        fps: v.fps,
        stretched_ratio: v.stretched_ratio,
        vcodec: v.vcodec.clone(),
        vbr: v.vbr,
        acodec: a.acodec.clone(),
        abr: a.abr,
        ..Default::default()
    };
    Ok(Selection {
        format: merged,
        requested_formats: vec![v.clone(), a.clone()],
    })
}
