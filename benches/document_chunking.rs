use criterion::{Criterion, criterion_group, criterion_main};

use finrag::{Chunker, Document};

fn synthetic_docs(docs: usize, lines: usize) -> Vec<Document> {
    (0..docs)
        .map(|d| {
            let text = (0..lines)
                .map(|i| format!("Company {d} reported Metric{i} of {} USD on 2023-12-31.", i * 7))
                .collect::<Vec<_>>()
                .join("\n");
            Document {
                source: format!("data/processed/{d}.json.txt"),
                text,
            }
        })
        .collect()
}

fn bench_chunk(c: &mut Criterion, name: &str, docs: usize, lines: usize) {
    let docs = synthetic_docs(docs, lines);
    let chunker = Chunker::new().unwrap();

    c.bench_function(name, |b| {
        b.iter(|| {
            let _ = chunker.chunk_all_documents(std::hint::black_box(&docs));
        })
    });
}

fn bench_chunk_small(c: &mut Criterion) {
    bench_chunk(c, "chunk_small", 10, 100);
}

fn bench_chunk_large(c: &mut Criterion) {
    bench_chunk(c, "chunk_large", 4, 20_000);
}

criterion_group! {
    name = chunk_benches;
    config = Criterion::default().sample_size(10);
    targets =
        bench_chunk_small,
        bench_chunk_large
}

criterion_main!(chunk_benches);
