use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use scour::{Policy, Sanitizer, Scanner};

fn fixtures() -> Vec<(&'static str, String)> {
    vec![
        (
            "plain",
            "<p>Hello <b>world</b>, this is <i>fine</i>.</p>".repeat(50),
        ),
        (
            "hostile",
            concat!(
                r#"<p onclick="x()">a<script>alert(1)</script>"#,
                r#"<a href="javascript:alert(1)">b</a><img src=x onerror=alert(1)>"#,
                r#"<div style="width: expression(alert(1)); color: red">c</div></p>"#,
            )
            .repeat(25),
        ),
        (
            "styled",
            concat!(
                "<style>p.note, h1 { color: #336699; margin: 0 auto } li:hover { color: red }</style>",
                r#"<p class="note" style="font-size: 12px; text-align: center">x</p>"#,
            )
            .repeat(20),
        ),
    ]
}

fn bench_scan(c: &mut Criterion) {
    let policy = Policy::builtin();

    let mut group = c.benchmark_group("scan");
    for (name, input) in fixtures() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_function(name, |b| {
            b.iter_batched(
                || input.as_str(),
                |markup| {
                    let _result = Scanner::new(policy).scan(markup).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_style_sheet(c: &mut Criterion) {
    let sanitizer = Sanitizer::default();
    let css = "body { margin: 0; padding: 0 } .a > .b { color: rgb(10, 20, 30) } ".repeat(40);

    c.bench_function("style_sheet", |b| {
        b.iter(|| sanitizer.sanitize_style_sheet(&css).unwrap())
    });
}

criterion_group!(benches, bench_scan, bench_style_sheet);
criterion_main!(benches);
