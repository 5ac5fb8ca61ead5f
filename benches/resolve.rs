use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use eml2pdf::body::resolve_body;
use eml2pdf::model::diagnostics::Diagnostics;
use eml2pdf::parser::mime::parse_message;

fn bench_parse_message(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("html_with_report.eml");
    let raw = std::fs::read(&fixture_path).unwrap();

    c.bench_function("parse_html_with_report", |b| {
        b.iter(|| parse_message(&raw).unwrap().len())
    });
}

fn bench_resolve_inline_images(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("inline_cid.eml");
    let raw = std::fs::read(&fixture_path).unwrap();
    let msg = parse_message(&raw).unwrap();

    c.bench_function("resolve_inline_cid_body", |b| {
        b.iter(|| {
            let mut diagnostics = Diagnostics::new();
            resolve_body(&msg, true, &mut diagnostics).unwrap().consumed.len()
        })
    });
}

criterion_group!(benches, bench_parse_message, bench_resolve_inline_images);
criterion_main!(benches);
