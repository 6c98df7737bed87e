use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustgrab::downloader::sanitize_filename;
use rustgrab::format::FormatSelector;
use rustgrab::Format;

fn catalogue() -> Vec<Format> {
    let mut formats = Vec::new();
    for (i, height) in [144, 240, 360, 480, 720, 1080, 1440, 2160].into_iter().enumerate() {
        formats.push(Format {
            format_id: format!("v{}", height),
            url: format!("http://media.example/v{}", height),
            ext: if i % 2 == 0 { "mp4" } else { "webm" }.into(),
            vcodec: Some("avc1".into()),
            acodec: Some("none".into()),
            height: Some(height),
            filesize: Some(height * 10_000),
            ..Default::default()
        });
    }
    for abr in [48.0, 128.0, 160.0] {
        formats.push(Format {
            format_id: format!("a{}", abr),
            url: format!("http://media.example/a{}", abr),
            ext: "m4a".into(),
            vcodec: Some("none".into()),
            acodec: Some("mp4a".into()),
            abr: Some(abr),
            ..Default::default()
        });
    }
    formats.push(Format {
        format_id: "18".into(),
        url: "http://media.example/18".into(),
        ext: "mp4".into(),
        height: Some(360),
        ..Default::default()
    });
    formats
}

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "best"),
    ("fallback", "137/22/18/best"),
    ("merge", "bestvideo[height<=720]+bestaudio/best"),
    (
        "nested",
        "(bestvideo[ext=mp4][filesize<10M]/bestvideo)+(bestaudio[acodec^=mp4a]/bestaudio),worst",
    ),
];

fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("Format Expression Compilation");
    for (name, spec) in EXPRESSIONS {
        group.bench_function(*name, |b| {
            b.iter(|| FormatSelector::compile(black_box(spec)))
        });
    }
    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Format Selection");
    let formats = catalogue();
    for (name, spec) in EXPRESSIONS {
        let Ok(selector) = FormatSelector::compile(spec) else {
            continue;
        };
        group.bench_function(*name, |b| {
            b.iter(|| selector.evaluate(black_box(&formats), None))
        });
    }
    group.finish();
}

fn benchmark_sanitize_filename(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filename Sanitization");

    group.bench_function("simple", |b| {
        b.iter(|| sanitize_filename(black_box("video.mp4"), false))
    });

    group.bench_function("complex", |b| {
        b.iter(|| sanitize_filename(black_box("My Video: Best Quality | 1080p?"), false))
    });

    let long_name = "a/".repeat(250) + ".mp4";
    group.bench_function("long", |b| {
        b.iter(|| sanitize_filename(black_box(&long_name), false))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_compile,
    benchmark_evaluate,
    benchmark_sanitize_filename
);
criterion_main!(benches);
