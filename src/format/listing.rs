use crate::extractor::models::VideoInfo;

fn row(id: &str, ext: &str, resolution: &str, note: &str) -> String {
    format!("{:<20}{:<10}{:<12}{}", id, ext, resolution, note)
        .trim_end()
        .to_string()
}

/// Table of the item's formats, worst first, as printed for `listformats`
pub fn format_table(info: &VideoInfo) -> String {
    let mut lines = vec![
        format!("[info] Available formats for {}:", info.id),
        row("format code", "extension", "resolution", "note"),
    ];
    let last = info.formats.len().saturating_sub(1);
    for (i, f) in info.formats.iter().enumerate() {
        let mut note = f.format_note.clone().unwrap_or_default();
        if last > 0 && (i == 0 || i == last) {
            if !note.is_empty() {
                note.push(' ');
            }
            note.push_str(if i == 0 { "(worst)" } else { "(best)" });
        }
        lines.push(row(&f.format_id, &f.ext, &f.display_resolution(), &note));
    }
    lines.join("\n")
}
