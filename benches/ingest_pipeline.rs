use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rask_ingest::domain::Batch;
use rask_ingest::parser::{parse, parse_line};
use rask_ingest::pipeline::index_publisher::bulk_body;

const LEVELS: [&str; 4] = ["INFO", "WARNING", "ERROR", "DEBUG"];

fn make_payload(n_lines: usize) -> String {
    (0..n_lines)
        .map(|i| {
            format!(
                "2025-03-15 01:{:02}:{:02},{:03} - 10.0.{}.{} - 4109 - {} - handler_{} - server.py - Request {} served - cache miss\n",
                (i / 60) % 60,
                i % 60,
                i % 1000,
                (i / 256) % 256,
                i % 256,
                LEVELS[i % LEVELS.len()],
                i % 7,
                i
            )
        })
        .collect()
}

fn bench_parse_line(c: &mut Criterion) {
    let line =
        "2025-03-15 01:56:59,303 - 127.0.0.1 - 4109 - INFO - get_dns - server.py - Querying DNS";

    c.bench_function("parse_line", |b| {
        b.iter(|| parse_line(black_box("192.168.0.10"), black_box(line), 1))
    });
}

fn bench_ingest_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_pipeline");

    for size in [10, 100, 1000] {
        let payload = make_payload(size);
        let entries = parse("192.168.0.10", payload.as_bytes()).unwrap();

        group.bench_with_input(BenchmarkId::new("parse", size), &payload, |b, p| {
            b.iter(|| parse(black_box("192.168.0.10"), black_box(p.as_bytes())))
        });
        group.bench_with_input(BenchmarkId::new("render_batch", size), &entries, |b, e| {
            b.iter(|| Batch::render(black_box(e)))
        });
        group.bench_with_input(BenchmarkId::new("bulk_body", size), &entries, |b, e| {
            b.iter(|| bulk_body(black_box("logaggregator-2025-03-15"), black_box(e)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_ingest_pipeline);
criterion_main!(benches);
